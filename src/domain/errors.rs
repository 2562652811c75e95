//! Domain errors for the sinkcheck harness.

use std::time::Duration;
use thiserror::Error;

use super::models::{InstanceId, RunState};

/// Errors surfaced by a test execution.
///
/// Assertion failures, timeouts and engine failures are kept apart so callers
/// can tell "the output was wrong" from "the test was inconclusive" from "the
/// job itself broke".
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Assertion failed for instance {instance_id}: {reason}")]
    AssertionFailure {
        instance_id: InstanceId,
        reason: String,
    },

    #[error("Test inconclusive: timed out after {}ms", .timeout.as_millis())]
    Timeout { timeout: Duration },

    #[error("Listener registration is closed: the run has already started")]
    RegistrationClosed,

    #[error("Runner cannot execute again: run is {0}")]
    AlreadyExecuted(RunState),

    #[error("Blocking execution requested from inside an async runtime; await execute_test instead")]
    BlockingInRuntime,

    #[error("Job execution failed: {0:#}")]
    EngineFailure(anyhow::Error),
}

impl HarnessError {
    pub fn is_assertion_failure(&self) -> bool {
        matches!(self, Self::AssertionFailure { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Instance whose verifier rejected its records, if any.
    pub fn failed_instance(&self) -> Option<InstanceId> {
        match self {
            Self::AssertionFailure { instance_id, .. } => Some(*instance_id),
            _ => None,
        }
    }

    /// The job's own error, unchanged.
    pub fn engine_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::EngineFailure(err) => Some(err),
            _ => None,
        }
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
