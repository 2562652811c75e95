//! The single transition point shared by the runner and the watchdog.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::models::RunState;
use crate::domain::ports::JobExecutor;

/// Run state guarded by one lock.
///
/// Natural completion, early failure and timeout all go through
/// [`RunControl::transition`], so exactly one of them can move the run out of
/// `Running`.
#[derive(Debug, Default)]
pub struct RunControl {
    state: Mutex<RunState>,
    stopped: AtomicBool,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> RunState {
        *self.lock()
    }

    /// Move `from -> to` if the run is currently in `from`.
    pub fn transition(&self, from: RunState, to: RunState) -> bool {
        let mut state = self.lock();
        if *state != from || !from.can_transition_to(to) {
            return false;
        }
        *state = to;
        if to == RunState::TimedOut {
            self.stopped.store(true, Ordering::Release);
        }
        info!(from = %from, to = %to, "Run state changed");
        true
    }

    /// True iff the run was forcibly terminated by the watchdog.
    pub fn has_been_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Why the runner cancelled the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Timeout,
    AllInstancesFinished,
    VerificationFailed,
}

impl CancelReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::AllInstancesFinished => "all_instances_finished",
            Self::VerificationFailed => "verification_failed",
        }
    }
}

/// Cancels a running job at most once.
pub struct JobCancellation {
    job: Arc<dyn JobExecutor>,
    token: CancellationToken,
    invocations: AtomicUsize,
}

impl JobCancellation {
    pub fn new(job: Arc<dyn JobExecutor>) -> Self {
        Self {
            job,
            token: CancellationToken::new(),
            invocations: AtomicUsize::new(0),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Signal the job and call its cancel capability. Later calls are no-ops
    /// and return `false`.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        if self.invocations.fetch_add(1, Ordering::AcqRel) > 0 {
            return false;
        }
        warn!(job = self.job.name(), reason = reason.as_str(), "Cancelling job");
        self.token.cancel();
        self.job.cancel();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
