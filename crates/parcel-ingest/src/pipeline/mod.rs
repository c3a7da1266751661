pub mod progress;
pub mod runner;

pub use progress::{ChannelProgress, CollectingProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use runner::{open_import, start_import, ImportOptions, ImportOutcome};
