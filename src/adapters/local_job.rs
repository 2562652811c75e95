//! In-process job engine.
//!
//! A [`LocalJob`] is a set of named operators, each run as `parallelism`
//! subtasks on the tokio runtime. Operators are added after construction so
//! that a job can be handed to a runner first and wired to that runner's sinks
//! afterwards.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, debug_span, info, warn, Instrument};

use crate::domain::ports::{JobContext, JobExecutor};

type OperatorBody = Arc<dyn Fn(SubtaskContext) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// What one parallel instance of an operator gets to run with.
#[derive(Debug, Clone)]
pub struct SubtaskContext {
    operator: Arc<str>,
    index: usize,
    parallelism: usize,
    cancellation: CancellationToken,
}

impl SubtaskContext {
    pub fn operator(&self) -> &str {
        &self.operator
    }

    /// Zero-based index of this subtask within its operator.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancellation.cancelled()
    }
}

struct Operator {
    name: Arc<str>,
    parallelism: Option<usize>,
    body: OperatorBody,
}

/// Job made of operators running as tokio tasks.
pub struct LocalJob {
    name: String,
    operators: RwLock<Vec<Operator>>,
    cancel_requests: AtomicUsize,
}

impl LocalJob {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operators: RwLock::new(Vec::new()),
            cancel_requests: AtomicUsize::new(0),
        }
    }

    /// Add an operator that runs with the job's parallelism.
    pub fn add_operator<F, Fut>(&self, name: impl Into<String>, body: F) -> &Self
    where
        F: Fn(SubtaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.push(name.into(), None, body)
    }

    /// Add an operator with its own parallelism, e.g. a single source feeding
    /// several parallel sinks.
    pub fn add_operator_with_parallelism<F, Fut>(
        &self,
        name: impl Into<String>,
        parallelism: usize,
        body: F,
    ) -> &Self
    where
        F: Fn(SubtaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.push(name.into(), Some(parallelism.max(1)), body)
    }

    fn push<F, Fut>(&self, name: String, parallelism: Option<usize>, body: F) -> &Self
    where
        F: Fn(SubtaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let body: OperatorBody = Arc::new(move |ctx| body(ctx).boxed());
        self.operators
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Operator {
                name: name.into(),
                parallelism,
                body,
            });
        self
    }

    pub fn operator_count(&self) -> usize {
        self.operators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// How many times the runner asked this job to stop.
    pub fn cancel_requests(&self) -> usize {
        self.cancel_requests.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> Vec<(Arc<str>, Option<usize>, OperatorBody)> {
        self.operators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|op| (Arc::clone(&op.name), op.parallelism, Arc::clone(&op.body)))
            .collect()
    }
}

impl std::fmt::Debug for LocalJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalJob")
            .field("name", &self.name)
            .field("operators", &self.operator_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl JobExecutor for LocalJob {
    fn name(&self) -> &str {
        &self.name
    }

    /// Runs every subtask to completion. The first failing subtask aborts the
    /// rest and fails the job.
    async fn execute(&self, ctx: JobContext) -> anyhow::Result<()> {
        let operators = self.snapshot();
        if operators.is_empty() {
            bail!("job '{}' has no operators", self.name);
        }

        let mut subtasks = JoinSet::new();
        for (operator, parallelism, body) in operators {
            let parallelism = parallelism.unwrap_or_else(|| ctx.parallelism()).max(1);
            for index in 0..parallelism {
                let sub = SubtaskContext {
                    operator: Arc::clone(&operator),
                    index,
                    parallelism,
                    cancellation: ctx.cancellation_token(),
                };
                let body = Arc::clone(&body);
                let label = Arc::clone(&operator);
                let span = debug_span!("subtask", operator = %operator, index);
                subtasks.spawn(
                    async move {
                        body(sub)
                            .await
                            .with_context(|| format!("operator '{label}' subtask {index} failed"))
                    }
                    .instrument(span),
                );
            }
        }

        debug!(subtasks = subtasks.len(), "Job started");
        while let Some(joined) = subtasks.join_next().await {
            let failure = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err,
                Err(join_err) => anyhow!("subtask of job '{}' panicked: {join_err}", self.name),
            };
            warn!(error = %failure, "Subtask failed, aborting the rest");
            subtasks.abort_all();
            return Err(failure);
        }

        debug!("All subtasks finished");
        Ok(())
    }

    fn cancel(&self) {
        let requests = self.cancel_requests.fetch_add(1, Ordering::SeqCst) + 1;
        info!(job = %self.name, requests, "Cancellation requested");
    }
}
