//! Batched writes into the canonical property registry.

pub mod writer;

use std::ops::AddAssign;

use serde::Serialize;

pub use writer::{write_legal_status, write_registry, BatchWriter, MAX_LOGGED_ERRORS};

/// Outcome counters of [`write_registry`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryWriteStats {
    pub inserted: u64,
    pub updated: u64,
    pub errors: u64,
}

/// Outcome counters of [`write_legal_status`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalStatusWriteStats {
    pub updated: u64,
    /// Distress instruments that raise no flag.
    pub skipped: u64,
    pub errors: u64,
}

impl AddAssign for RegistryWriteStats {
    fn add_assign(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.errors += other.errors;
    }
}

impl AddAssign for LegalStatusWriteStats {
    fn add_assign(&mut self, other: Self) {
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.errors += other.errors;
    }
}
