//! Worker pool bookkeeping.

use std::collections::BTreeMap;

use crate::game::CycleOutcome;

/// Outcome counts of one pool iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IterationSummary {
    pub completed: usize,
    pub failed: usize,
    pub terminated: usize,
    /// Workers whose task panicked.
    pub panicked: usize,
}

impl IterationSummary {
    /// Number of workers accounted for.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.completed + self.failed + self.terminated + self.panicked
    }
}

/// State of the worker pool across iterations.
#[derive(Debug, Default)]
pub struct PoolState {
    /// Completed iterations.
    pub iterations: u64,

    /// Summary of the iteration in progress.
    current: IterationSummary,

    /// Accounts refused by the game, with the reason.
    terminated: BTreeMap<String, String>,
}

impl PoolState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts counting a new iteration.
    pub fn begin_iteration(&mut self) {
        self.current = IterationSummary::default();
    }

    /// Records how one account's cycle ended.
    pub fn record(&mut self, title: &str, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::Completed => self.current.completed += 1,
            CycleOutcome::Failed(_) => self.current.failed += 1,
            CycleOutcome::Terminated(reason) => {
                self.current.terminated += 1;
                self.terminated.insert(title.to_owned(), reason.clone());
            }
        }
    }

    /// Records a worker task that panicked.
    pub fn record_panic(&mut self) {
        self.current.panicked += 1;
    }

    /// Closes the iteration and returns its summary.
    pub fn finish_iteration(&mut self) -> IterationSummary {
        self.iterations += 1;
        std::mem::take(&mut self.current)
    }

    #[must_use]
    pub fn is_terminated(&self, title: &str) -> bool {
        self.terminated.contains_key(title)
    }

    /// Terminated accounts and why.
    pub fn terminated(&self) -> impl Iterator<Item = (&str, &str)> {
        self.terminated.iter().map(|(t, r)| (t.as_str(), r.as_str()))
    }
}
