//! Execution context held by a running job.
//!
//! The job acquires a [`JobScope`] when it is spawned and the scope is released
//! when the job's future is dropped: on success, on error and when the task is
//! aborted after cancellation. The runner waits for that release before it
//! reports a verdict.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct ExecutionContext {
    active: AtomicUsize,
    released: Notify,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the context for `run_id`. Released when the scope drops.
    pub fn enter(self: &Arc<Self>, run_id: Uuid) -> JobScope {
        self.active.fetch_add(1, Ordering::AcqRel);
        debug!(%run_id, "Job execution context acquired");
        JobScope {
            context: Arc::clone(self),
            run_id,
            entered_at: Instant::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire) > 0
    }

    /// Wait until every scope has been released.
    pub async fn wait_released(&self) {
        loop {
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.is_active() {
                return;
            }
            notified.await;
        }
    }
}

/// Guard over an acquired [`ExecutionContext`].
#[must_use = "the execution context is released as soon as the scope is dropped"]
#[derive(Debug)]
pub struct JobScope {
    context: Arc<ExecutionContext>,
    run_id: Uuid,
    entered_at: Instant,
}

impl JobScope {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }
}

impl Drop for JobScope {
    fn drop(&mut self) {
        self.context.active.fetch_sub(1, Ordering::AcqRel);
        self.context.released.notify_waiters();
        debug!(
            run_id = %self.run_id,
            held_ms = self.entered_at.elapsed().as_millis() as u64,
            "Job execution context released"
        );
    }
}
