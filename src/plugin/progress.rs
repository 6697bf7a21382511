// src/plugin/progress.rs
// =============================================================================
// Result counters and the events a plugin emits.
//
// Every finished work item ends in exactly one of three outcomes, and the
// Tally counts them. The counters only change inside the queue's completion
// hook, which is why a Progress snapshot always satisfies
// passed + failed + skipped == done.
// =============================================================================

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::queue::QueueStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Default)]
pub struct Tally {
    passed: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

impl Tally {
    pub fn record(&self, outcome: ItemOutcome) {
        let counter = match outcome {
            ItemOutcome::Passed => &self.passed,
            ItemOutcome::Failed => &self.failed,
            ItemOutcome::Skipped => &self.skipped,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub fn passed(&self) -> usize {
        self.passed.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Combine the counters with the queue's numbers.
    pub fn progress(&self, stats: &QueueStats) -> Progress {
        Progress {
            total: stats.total,
            done: stats.done,
            passed: self.passed(),
            failed: self.failed(),
            skipped: self.skipped(),
            duration_secs: stats.duration_secs,
        }
    }
}

/// Everything the status line needs, captured at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub total: usize,
    pub done: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_secs: u64,
}

/// Notifications a plugin broadcasts to its subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginEvent {
    /// One work item finished
    Progress(Progress),
    /// The plugin's queue drained
    Idle(Progress),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_outcome_bumps_one_counter() {
        let tally = Tally::default();
        tally.record(ItemOutcome::Passed);
        tally.record(ItemOutcome::Passed);
        tally.record(ItemOutcome::Failed);
        tally.record(ItemOutcome::Skipped);

        assert_eq!(tally.passed(), 2);
        assert_eq!(tally.failed(), 1);
        assert_eq!(tally.skipped(), 1);
    }

    #[test]
    fn test_progress_takes_queue_numbers() {
        let tally = Tally::default();
        tally.record(ItemOutcome::Failed);
        let stats = QueueStats {
            total: 4,
            done: 1,
            running: 3,
            duration_secs: 2,
            ..QueueStats::default()
        };

        let progress = tally.progress(&stats);
        assert_eq!(progress.total, 4);
        assert_eq!(progress.done, 1);
        assert_eq!(progress.failed, 1);
        assert_eq!(progress.duration_secs, 2);
    }
}
