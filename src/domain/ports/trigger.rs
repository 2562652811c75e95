//! Trigger port - decides when an instance has produced enough output.

use std::time::Duration;

/// Per-instance predicate over arriving records.
///
/// `on_record` runs while the instance's slot is locked, with `count` being the
/// number of records accepted so far including `record`. Returning `true`
/// finishes the instance: the firing record is kept, later records for the
/// instance are ignored, and its verifier runs without waiting for the job.
pub trait CompletionTrigger<T>: Send + Sync {
    fn on_record(&self, record: &T, count: usize) -> bool;

    /// Finish the instance this long after the run starts, whatever arrived.
    fn deadline(&self) -> Option<Duration> {
        None
    }
}
