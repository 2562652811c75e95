//! Completion trigger variants.
//!
//! [`DefaultTrigger`] never fires, so the instance is finished only when the job
//! ends. The others finish an instance early, which is what lets unbounded
//! streaming jobs be verified at all.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::ports::CompletionTrigger;

/// Waits for the job to finish on its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTrigger;

impl<T> CompletionTrigger<T> for DefaultTrigger {
    fn on_record(&self, _record: &T, _count: usize) -> bool {
        false
    }
}

/// Fires once the instance has received `limit` records.
#[derive(Debug, Clone, Copy)]
pub struct FinishAtCount {
    limit: usize,
}

impl FinishAtCount {
    /// A limit of 0 behaves like 1: the trigger can only fire on a record.
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl<T> CompletionTrigger<T> for FinishAtCount {
    fn on_record(&self, _record: &T, count: usize) -> bool {
        count >= self.limit
    }
}

/// Fires on the first record matching a predicate. The matching record is kept.
pub struct FinishOnMatch<F> {
    predicate: F,
}

impl<F> FinishOnMatch<F> {
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> fmt::Debug for FinishOnMatch<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinishOnMatch").finish_non_exhaustive()
    }
}

impl<T, F> CompletionTrigger<T> for FinishOnMatch<F>
where
    F: Fn(&T) -> bool + Send + Sync,
{
    fn on_record(&self, record: &T, _count: usize) -> bool {
        (self.predicate)(record)
    }
}

/// Finishes the instance a fixed time after the run starts.
#[derive(Debug, Clone, Copy)]
pub struct FinishAfter {
    after: Duration,
}

impl FinishAfter {
    pub fn new(after: Duration) -> Self {
        Self { after }
    }

    pub fn millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }
}

impl<T> CompletionTrigger<T> for FinishAfter {
    fn on_record(&self, _record: &T, _count: usize) -> bool {
        false
    }

    fn deadline(&self) -> Option<Duration> {
        Some(self.after)
    }
}

/// Fires as soon as any of its members would.
pub struct AnyOf<T> {
    triggers: Vec<Arc<dyn CompletionTrigger<T>>>,
}

impl<T> AnyOf<T> {
    pub fn new() -> Self {
        Self {
            triggers: Vec::new(),
        }
    }

    pub fn with(mut self, trigger: impl CompletionTrigger<T> + 'static) -> Self {
        self.triggers.push(Arc::new(trigger));
        self
    }
}

impl<T> Default for AnyOf<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CompletionTrigger<T> for AnyOf<T> {
    fn on_record(&self, record: &T, count: usize) -> bool {
        self.triggers
            .iter()
            .any(|trigger| trigger.on_record(record, count))
    }

    fn deadline(&self) -> Option<Duration> {
        self.triggers
            .iter()
            .filter_map(|trigger| trigger.deadline())
            .min()
    }
}
