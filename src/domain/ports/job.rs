//! Job port - interface to the engine that runs the job under test.

use async_trait::async_trait;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use uuid::Uuid;

/// What the runner hands to the job when it starts it.
#[derive(Debug, Clone)]
pub struct JobContext {
    run_id: Uuid,
    parallelism: usize,
    cancellation: CancellationToken,
}

impl JobContext {
    pub fn new(run_id: Uuid, parallelism: usize, cancellation: CancellationToken) -> Self {
        Self {
            run_id,
            parallelism,
            cancellation,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Degree of parallelism requested by the caller. Not interpreted by the runner.
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves once the runner has cancelled the job.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancellation.cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }
}

/// Capability to run a job to completion and to stop it.
///
/// `execute` returning is the "naturally finished" signal. The runner observes
/// cancellation through the [`JobContext`] token and calls [`JobExecutor::cancel`]
/// at most once per run; implementations must tolerate it arriving after the job
/// already finished.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    fn name(&self) -> &str {
        "job"
    }

    /// Run the job until it finishes on its own or observes cancellation.
    async fn execute(&self, ctx: JobContext) -> anyhow::Result<()>;

    /// Ask the engine to release whatever it holds for the running job.
    fn cancel(&self) {}
}
