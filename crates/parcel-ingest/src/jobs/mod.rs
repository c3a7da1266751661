//! Import job orchestration: status model, progress streaming, controller.

pub mod controller;
pub mod progress;
pub mod status;

pub use controller::{infer_subtype, ImportJobController, JobHandle};
pub use progress::{ImportPhase, ImportProgressBroadcaster, JobProgressEvent, JobProgressTracker};
pub use status::{DataType, ImportFileStatus, ImportJobStatus};
