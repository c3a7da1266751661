use std::sync::Mutex;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::detect::FileFormat;
use crate::jobs::progress::ImportPhase;
use crate::parser::ParseStats;

/// Events emitted by the pipeline while a file is imported.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Phase {
        phase: ImportPhase,
        message: String,
    },
    /// Line counters, at the configured cadence and once when a file ends.
    Lines {
        format: FileFormat,
        stats: ParseStats,
        finished: bool,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for callers that do not track progress.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Keeps every event in memory. Useful in tests and one-shot tools.
#[derive(Default)]
pub struct CollectingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingProgress {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Only the line-counter events.
    pub fn line_events(&self) -> Vec<(ParseStats, bool)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Lines {
                    stats, finished, ..
                } => Some((stats, finished)),
                ProgressEvent::Phase { .. } => None,
            })
            .collect()
    }
}

impl ProgressReporter for CollectingProgress {
    fn report(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Forwards events into a bounded channel without ever blocking the parser.
/// Events are dropped while the channel is full.
pub struct ChannelProgress {
    sender: Sender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn bounded(capacity: usize) -> (Self, Receiver<ProgressEvent>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        (Self { sender }, receiver)
    }
}

impl ProgressReporter for ChannelProgress {
    fn report(&self, event: ProgressEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => log::trace!("Progress channel full, event dropped"),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(total: u64) -> ProgressEvent {
        ProgressEvent::Lines {
            format: FileFormat::OfficialRecords,
            stats: ParseStats {
                total_lines: total,
                ..Default::default()
            },
            finished: false,
        }
    }

    #[test]
    fn test_channel_progress_drops_when_full() {
        let (progress, rx) = ChannelProgress::bounded(2);
        progress.report(lines(1));
        progress.report(lines(2));
        progress.report(lines(3));

        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(received, vec![lines(1), lines(2)]);
    }

    #[test]
    fn test_channel_progress_survives_disconnect() {
        let (progress, rx) = ChannelProgress::bounded(1);
        drop(rx);
        progress.report(lines(1));
    }

    #[test]
    fn test_collecting_progress() {
        let progress = CollectingProgress::default();
        progress.report(ProgressEvent::Phase {
            phase: ImportPhase::Parsing,
            message: "Parsing".to_string(),
        });
        progress.report(lines(5));
        assert_eq!(progress.events().len(), 2);
        assert_eq!(progress.line_events()[0].0.total_lines, 5);
    }
}
