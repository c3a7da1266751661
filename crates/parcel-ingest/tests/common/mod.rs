//! Shared test utilities for parcel-ingest integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated runs against a throwaway registry database
//! - Builders for recording office lines, roll rows and appraiser CSVs

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
