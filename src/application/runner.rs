//! Test runner: drives one job execution to a single verdict.
//!
//! The runner owns the record buffer and the listener registry, starts the job
//! on its own task, arms the timeout watchdog and then supervises three event
//! sources until one of them decides the run:
//!
//! ```text
//!            ┌──────────────┐  append   ┌──────────────┐
//!  producers │  TestSink(s) │ ────────▶ │ RecordBuffer │──┐ instance finished
//!            └──────────────┘           └──────────────┘  │
//!                                                         ▼
//!  ┌───────────┐  returns/errs  ┌───────────────────────────────┐
//!  │ job task  │ ─────────────▶ │        TestRunner loop        │
//!  └───────────┘                │ (RunControl = transition lock)│
//!  ┌───────────┐    expired     └───────────────────────────────┘
//!  │ watchdog  │ ─────────────▶         │ verdict
//!  └───────────┘                        ▼
//!                            Ok(RunReport) / Err(HarnessError)
//! ```

use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

use crate::application::job_scope::ExecutionContext;
use crate::application::run_control::{CancelReason, JobCancellation, RunControl};
use crate::application::test_sink::TestSink;
use crate::application::watchdog::TimeoutWatchdog;
use crate::domain::errors::{HarnessError, HarnessResult};
use crate::domain::models::{HarnessConfig, InstanceId, RunState};
use crate::domain::ports::{CompletionTrigger, JobContext, JobExecutor, OutputVerifier};
use crate::services::listener_registry::{ListenerRegistry, Registration};
use crate::services::record_buffer::RecordBuffer;
use crate::services::triggers::DefaultTrigger;

/// Timeout used until [`TestRunner::set_timeout_interval`] is called.
pub const DEFAULT_TIMEOUT_MS: u64 = 4000;

/// Time a cancelled job gets to wind down before its task is aborted.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(1);

/// Per-instance part of a [`RunReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceReport {
    pub instance_id: InstanceId,
    /// Records the verifier saw.
    pub records: usize,
    /// Finished by its trigger rather than by the job ending.
    pub finished_early: bool,
    /// Appends dropped because they arrived too late.
    pub late_records: u64,
}

/// Summary of a passing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub job: String,
    pub state: RunState,
    pub stopped: bool,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub instances: Vec<InstanceReport>,
}

/// What ended the supervision loop.
enum Outcome {
    JobReturned(Result<anyhow::Result<()>, JoinError>),
    AllInstancesFinished,
    EarlyFailure(HarnessError),
    TimedOut,
}

/// Runs a job under test and turns its output into one verdict.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use sinkcheck::adapters::local_job::LocalJob;
/// use sinkcheck::application::TestRunner;
/// use sinkcheck::services::verifiers::ExpectedRecords;
///
/// # async fn example() -> anyhow::Result<()> {
/// let job = Arc::new(LocalJob::new("squares"));
/// let runner: TestRunner<u64> = TestRunner::new(job.clone(), 1);
/// let sink = runner.create_test_sink(ExpectedRecords::new([1, 4, 9]))?;
///
/// job.add_operator("square", move |_task| {
///     let sink = sink.clone();
///     async move {
///         for value in 1..=3u64 {
///             sink.emit(value * value);
///         }
///         Ok(())
///     }
/// });
///
/// runner.execute_test().await?;
/// # Ok(())
/// # }
/// ```
pub struct TestRunner<T> {
    core: Arc<RunCore<T>>,
    timeout_ms: AtomicU64,
    parallelism: usize,
    cancel_grace: Duration,
}

/// State shared by the runner handle and the task supervising its run.
struct RunCore<T> {
    job: Arc<dyn JobExecutor>,
    buffer: Arc<RecordBuffer<T>>,
    registry: ListenerRegistry<T>,
    control: Arc<RunControl>,
    context: Arc<ExecutionContext>,
}

/// Everything fixed at the moment a run starts.
struct RunPlan<T> {
    run_id: Uuid,
    timeout: Duration,
    parallelism: usize,
    cancel_grace: Duration,
    registrations: Vec<Registration<T>>,
    finished_rx: mpsc::UnboundedReceiver<InstanceId>,
}

impl<T> TestRunner<T>
where
    T: Clone + Send + 'static,
{
    /// Create a runner for `job`. `parallelism` is passed through to the job.
    pub fn new(job: Arc<dyn JobExecutor>, parallelism: usize) -> Self {
        let buffer = Arc::new(RecordBuffer::new());
        Self {
            core: Arc::new(RunCore {
                job,
                registry: ListenerRegistry::new(Arc::clone(&buffer)),
                buffer,
                control: Arc::new(RunControl::new()),
                context: Arc::new(ExecutionContext::new()),
            }),
            timeout_ms: AtomicU64::new(DEFAULT_TIMEOUT_MS),
            parallelism: parallelism.max(1),
            cancel_grace: DEFAULT_CANCEL_GRACE,
        }
    }

    /// Create a runner using timeout, parallelism and grace period from config.
    pub fn from_config(job: Arc<dyn JobExecutor>, config: &HarnessConfig) -> Self {
        let runner = Self::new(job, config.parallelism)
            .with_cancel_grace(Duration::from_millis(config.cancel_grace_ms));
        runner.set_timeout_interval(config.timeout_ms);
        runner
    }

    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    /// Register a verifier and trigger for a new instance.
    ///
    /// Fails with [`HarnessError::RegistrationClosed`] once `execute_test` has
    /// been called.
    pub fn register_listener<V, C>(&self, verifier: V, trigger: C) -> HarnessResult<InstanceId>
    where
        V: OutputVerifier<T> + 'static,
        C: CompletionTrigger<T> + 'static,
    {
        self.core
            .registry
            .register(Arc::new(verifier), Arc::new(trigger))
    }

    /// Register `verifier` with the default trigger and return the sink for it.
    pub fn create_test_sink<V>(&self, verifier: V) -> HarnessResult<TestSink<T>>
    where
        V: OutputVerifier<T> + 'static,
    {
        self.create_test_sink_with_trigger(verifier, DefaultTrigger)
    }

    pub fn create_test_sink_with_trigger<V, C>(
        &self,
        verifier: V,
        trigger: C,
    ) -> HarnessResult<TestSink<T>>
    where
        V: OutputVerifier<T> + 'static,
        C: CompletionTrigger<T> + 'static,
    {
        let instance_id = self.register_listener(verifier, trigger)?;
        Ok(TestSink::new(instance_id, Arc::clone(&self.core.buffer)))
    }

    pub fn buffer(&self) -> Arc<RecordBuffer<T>> {
        Arc::clone(&self.core.buffer)
    }

    pub fn listener_count(&self) -> usize {
        self.core.registry.len()
    }

    /// Timeout in milliseconds.
    pub fn timeout_interval(&self) -> u64 {
        self.timeout_ms.load(Ordering::Acquire)
    }

    /// Takes effect for the next `execute_test`; a run in flight keeps the
    /// value it started with.
    pub fn set_timeout_interval(&self, interval_ms: u64) {
        self.timeout_ms.store(interval_ms, Ordering::Release);
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    pub fn state(&self) -> RunState {
        self.core.control.state()
    }

    /// True if the run was stopped by the watchdog rather than finishing.
    pub fn has_been_stopped(&self) -> bool {
        self.core.control.has_been_stopped()
    }

    /// Whether the job still holds its execution context.
    pub fn is_job_active(&self) -> bool {
        self.core.context.is_active()
    }

    /// Run the job and verify its output.
    ///
    /// The run is supervised on its own task. Dropping the returned future
    /// does not abandon the job: the watchdog still stops it on time and the
    /// run still reaches a terminal state. A runner executes once.
    #[instrument(skip(self), fields(job = %self.core.job.name()))]
    pub async fn execute_test(&self) -> HarnessResult<RunReport> {
        let plan = self.start_run()?;
        let supervisor = tokio::spawn(Arc::clone(&self.core).supervise(plan).in_current_span());

        match supervisor.await {
            Ok(verdict) => verdict,
            Err(join_err) => {
                error!(error = %join_err, "Run supervisor ended abnormally");
                Err(HarnessError::EngineFailure(anyhow::anyhow!(
                    "run supervisor failed: {join_err}"
                )))
            }
        }
    }

    /// Blocking variant of [`TestRunner::execute_test`] for synchronous callers.
    ///
    /// Returns [`HarnessError::BlockingInRuntime`] when called from inside a
    /// tokio runtime; the run is not started in that case.
    pub fn execute_test_blocking(&self) -> HarnessResult<RunReport> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(HarnessError::BlockingInRuntime);
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("sinkcheck-runner")
            .build()
            .map_err(|err| {
                HarnessError::EngineFailure(
                    anyhow::Error::new(err).context("failed to start runner runtime"),
                )
            })?;
        let verdict = runtime.block_on(self.execute_test());
        runtime.shutdown_timeout(self.cancel_grace);
        verdict
    }

    /// Claim the run and freeze what it will use.
    fn start_run(&self) -> HarnessResult<RunPlan<T>> {
        let core = &self.core;
        let Some(finished_rx) = core.buffer.take_finished_receiver() else {
            return Err(HarnessError::AlreadyExecuted(core.control.state()));
        };
        if !core
            .control
            .transition(RunState::NotStarted, RunState::Running)
        {
            return Err(HarnessError::AlreadyExecuted(core.control.state()));
        }

        let plan = RunPlan {
            run_id: Uuid::new_v4(),
            timeout: Duration::from_millis(self.timeout_interval()),
            parallelism: self.parallelism,
            cancel_grace: self.cancel_grace,
            registrations: core.registry.close(),
            finished_rx,
        };

        info!(
            run_id = %plan.run_id,
            instances = plan.registrations.len(),
            timeout_ms = plan.timeout.as_millis() as u64,
            parallelism = plan.parallelism,
            "Starting test execution"
        );
        Ok(plan)
    }
}

impl<T> RunCore<T>
where
    T: Clone + Send + 'static,
{
    async fn supervise(self: Arc<Self>, plan: RunPlan<T>) -> HarnessResult<RunReport> {
        let RunPlan {
            run_id,
            timeout,
            parallelism,
            cancel_grace,
            registrations,
            mut finished_rx,
        } = plan;
        let started = Instant::now();
        let started_at = Utc::now();

        let cancellation = Arc::new(JobCancellation::new(Arc::clone(&self.job)));
        let mut job_handle =
            self.spawn_job(JobContext::new(run_id, parallelism, cancellation.token()));

        let (expired_tx, mut expired_rx) = oneshot::channel::<()>();
        let watchdog = {
            let control = Arc::clone(&self.control);
            let cancellation = Arc::clone(&cancellation);
            TimeoutWatchdog::arm(timeout, move || {
                if !control.transition(RunState::Running, RunState::TimedOut) {
                    return false;
                }
                cancellation.cancel(CancelReason::Timeout);
                let _ = expired_tx.send(());
                true
            })
        };
        let deadlines = self.arm_trigger_deadlines(&registrations);

        let mut finished: HashSet<InstanceId> = HashSet::new();
        let mut watchdog_pending = true;
        let outcome = loop {
            tokio::select! {
                biased;

                expired = &mut expired_rx, if watchdog_pending => {
                    watchdog_pending = false;
                    if expired.is_ok() {
                        break Outcome::TimedOut;
                    }
                }

                Some(instance_id) = finished_rx.recv() => {
                    if !finished.insert(instance_id) {
                        continue;
                    }
                    if let Some(registration) = registrations
                        .iter()
                        .find(|registration| registration.instance_id == instance_id)
                    {
                        if let Err(err) = self.verify_instance(registration) {
                            break Outcome::EarlyFailure(err);
                        }
                    }
                    if finished.len() == registrations.len() {
                        info!("Every instance finished before the job did");
                        break Outcome::AllInstancesFinished;
                    }
                }

                joined = &mut job_handle => break Outcome::JobReturned(joined),
            }
        };

        watchdog.disarm();
        drop(deadlines);

        let job_returned = matches!(outcome, Outcome::JobReturned(_));
        let verdict = self.resolve(outcome, timeout, &cancellation);

        // Whatever the verdict, nothing appended from here on is evidence.
        self.buffer.seal();
        if !job_returned {
            self.shutdown_job(job_handle, cancel_grace).await;
        }
        watchdog.join().await;

        let verdict = verdict.and_then(|()| self.verify_remaining(&registrations, &finished));
        let elapsed = started.elapsed();

        match &verdict {
            Ok(()) => info!(
                state = %self.control.state(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Test passed"
            ),
            Err(err) => warn!(
                state = %self.control.state(),
                stopped = self.control.has_been_stopped(),
                error = %err,
                "Test did not pass"
            ),
        }

        verdict.map(|()| self.report(run_id, started_at, elapsed, &registrations))
    }

    fn spawn_job(&self, ctx: JobContext) -> JoinHandle<anyhow::Result<()>> {
        let job = Arc::clone(&self.job);
        let span = info_span!("job", run_id = %ctx.run_id(), name = %job.name());
        let scope = self.context.enter(ctx.run_id());
        tokio::spawn(
            async move {
                let _scope = scope;
                job.execute(ctx).await
            }
            .instrument(span),
        )
    }

    fn arm_trigger_deadlines(&self, registrations: &[Registration<T>]) -> JoinSet<()> {
        let mut timers = JoinSet::new();
        for registration in registrations {
            let Some(deadline) = registration.trigger.deadline() else {
                continue;
            };
            let buffer = Arc::clone(&self.buffer);
            let instance_id = registration.instance_id;
            timers.spawn(async move {
                tokio::time::sleep(deadline).await;
                if buffer.finish(instance_id) {
                    debug!(instance = %instance_id, "Trigger deadline reached");
                }
            });
        }
        timers
    }

    /// Claim the exit from `Running` for `outcome`. If the watchdog got there
    /// first the run is a timeout, whatever else happened.
    fn resolve(
        &self,
        outcome: Outcome,
        timeout: Duration,
        cancellation: &JobCancellation,
    ) -> HarnessResult<()> {
        let timed_out = HarnessError::Timeout { timeout };
        match outcome {
            Outcome::TimedOut => Err(timed_out),
            Outcome::EarlyFailure(err) => {
                if !self.control.transition(RunState::Running, RunState::Failed) {
                    return Err(timed_out);
                }
                cancellation.cancel(CancelReason::VerificationFailed);
                Err(err)
            }
            Outcome::AllInstancesFinished => {
                if !self.control.transition(RunState::Running, RunState::Verifying) {
                    return Err(timed_out);
                }
                cancellation.cancel(CancelReason::AllInstancesFinished);
                Ok(())
            }
            Outcome::JobReturned(Ok(Ok(()))) => {
                if !self.control.transition(RunState::Running, RunState::Verifying) {
                    return Err(timed_out);
                }
                info!("Job finished");
                Ok(())
            }
            Outcome::JobReturned(Ok(Err(err))) => {
                if !self.control.transition(RunState::Running, RunState::Failed) {
                    return Err(timed_out);
                }
                error!(error = %err, "Job failed");
                Err(HarnessError::EngineFailure(err))
            }
            Outcome::JobReturned(Err(join_err)) => {
                if !self.control.transition(RunState::Running, RunState::Failed) {
                    return Err(timed_out);
                }
                error!(error = %join_err, "Job task panicked");
                Err(HarnessError::EngineFailure(anyhow::anyhow!(
                    "job task panicked: {join_err}"
                )))
            }
        }
    }

    /// Give a cancelled job `grace` to return, then abort it.
    async fn shutdown_job(&self, mut handle: JoinHandle<anyhow::Result<()>>, grace: Duration) {
        match tokio::time::timeout(grace, &mut handle).await {
            Ok(Ok(Ok(()))) => debug!("Job wound down after cancellation"),
            Ok(Ok(Err(err))) => debug!(error = %err, "Job returned an error after cancellation"),
            Ok(Err(err)) => warn!(error = %err, "Job task ended abnormally after cancellation"),
            Err(_) => {
                warn!(
                    grace_ms = grace.as_millis() as u64,
                    "Job ignored cancellation, aborting its task"
                );
                handle.abort();
                let _ = tokio::time::timeout(grace, handle).await;
            }
        }

        if tokio::time::timeout(grace, self.context.wait_released())
            .await
            .is_err()
        {
            error!("Job execution context still held after shutdown");
        }
    }

    /// Verify instances that were not already verified when their trigger
    /// fired, in id order, and settle `Verifying`.
    fn verify_remaining(
        &self,
        registrations: &[Registration<T>],
        verified: &HashSet<InstanceId>,
    ) -> HarnessResult<()> {
        for registration in registrations
            .iter()
            .filter(|registration| !verified.contains(&registration.instance_id))
        {
            if let Err(err) = self.verify_instance(registration) {
                self.control
                    .transition(RunState::Verifying, RunState::Failed);
                return Err(err);
            }
        }
        self.control
            .transition(RunState::Verifying, RunState::Completed);
        Ok(())
    }

    fn verify_instance(&self, registration: &Registration<T>) -> HarnessResult<()> {
        let instance_id = registration.instance_id;
        let records = self.buffer.records_for(instance_id);
        debug!(instance = %instance_id, records = records.len(), "Verifying instance");

        let verifier = &registration.verifier;
        let reason = match panic::catch_unwind(AssertUnwindSafe(|| verifier.verify(&records))) {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(failure)) => failure.reason,
            Err(payload) => panic_message(payload.as_ref()),
        };

        warn!(instance = %instance_id, %reason, "Verification failed");
        Err(HarnessError::AssertionFailure {
            instance_id,
            reason,
        })
    }

    fn report(
        &self,
        run_id: Uuid,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        registrations: &[Registration<T>],
    ) -> RunReport {
        let instances = registrations
            .iter()
            .filter_map(|registration| self.buffer.summary(registration.instance_id))
            .map(|summary| InstanceReport {
                instance_id: summary.instance_id,
                records: summary.records,
                finished_early: summary.finished,
                late_records: summary.late_records,
            })
            .collect();

        RunReport {
            run_id,
            job: self.job.name().to_string(),
            state: self.control.state(),
            stopped: self.control.has_been_stopped(),
            started_at,
            elapsed_ms: elapsed.as_millis() as u64,
            instances,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "verifier panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::VerificationFailure;
    use crate::services::triggers::FinishAtCount;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Emits a fixed list into one sink, or waits forever when `records` is None.
    struct ScriptedJob {
        sink: std::sync::Mutex<Option<TestSink<u32>>>,
        records: Option<Vec<u32>>,
        cancels: AtomicUsize,
    }

    impl ScriptedJob {
        fn new(records: Option<Vec<u32>>) -> Arc<Self> {
            Arc::new(Self {
                sink: std::sync::Mutex::new(None),
                records,
                cancels: AtomicUsize::new(0),
            })
        }

        fn attach(&self, sink: TestSink<u32>) {
            *self.sink.lock().unwrap() = Some(sink);
        }
    }

    #[async_trait]
    impl JobExecutor for ScriptedJob {
        async fn execute(&self, _ctx: JobContext) -> anyhow::Result<()> {
            let sink = self.sink.lock().unwrap().clone();
            match (&self.records, sink) {
                (Some(records), Some(sink)) => {
                    sink.emit_all(records.iter().copied());
                    Ok(())
                }
                (Some(_), None) => Ok(()),
                (None, _) => std::future::pending().await,
            }
        }

        fn cancel(&self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn sum_is(expected: u32) -> impl Fn(&[u32]) -> Result<(), VerificationFailure> {
        move |records: &[u32]| {
            let sum: u32 = records.iter().sum();
            if sum == expected {
                Ok(())
            } else {
                Err(VerificationFailure::new(format!("sum was {sum}")))
            }
        }
    }

    #[tokio::test]
    async fn test_natural_completion_runs_verifiers() {
        let job = ScriptedJob::new(Some(vec![1, 2, 3]));
        let runner: TestRunner<u32> = TestRunner::new(job.clone(), 2);
        job.attach(runner.create_test_sink(sum_is(6)).unwrap());

        let report = runner.execute_test().await.unwrap();

        assert_eq!(report.state, RunState::Completed);
        assert!(!report.stopped);
        assert_eq!(report.instances[0].records, 3);
        assert!(!runner.has_been_stopped());
        assert_eq!(job.cancels.load(Ordering::SeqCst), 0);
        assert!(!runner.is_job_active());
    }

    #[tokio::test]
    async fn test_verifier_rejection_fails_run() {
        let job = ScriptedJob::new(Some(vec![1, 2]));
        let runner: TestRunner<u32> = TestRunner::new(job.clone(), 1);
        let sink = runner.create_test_sink(sum_is(10)).unwrap();
        let instance = sink.instance_id();
        job.attach(sink);

        let err = runner.execute_test().await.unwrap_err();

        assert_eq!(err.failed_instance(), Some(instance));
        assert!(err.to_string().contains("sum was 3"));
        assert_eq!(runner.state(), RunState::Failed);
    }

    #[tokio::test]
    async fn test_panicking_verifier_is_an_assertion_failure() {
        let job = ScriptedJob::new(Some(vec![1]));
        let runner: TestRunner<u32> = TestRunner::new(job.clone(), 1);
        job.attach(
            runner
                .create_test_sink(|records: &[u32]| -> Result<(), VerificationFailure> {
                    assert_eq!(records.len(), 5, "wrong record count");
                    Ok(())
                })
                .unwrap(),
        );

        let err = runner.execute_test().await.unwrap_err();

        assert!(err.is_assertion_failure());
        assert!(err.to_string().contains("wrong record count"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels_job_once() {
        let job = ScriptedJob::new(None);
        let runner: TestRunner<u32> = TestRunner::new(job.clone(), 1)
            .with_cancel_grace(Duration::from_millis(50));
        runner.create_test_sink(sum_is(0)).unwrap();
        runner.set_timeout_interval(500);

        let err = runner.execute_test().await.unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(runner.state(), RunState::TimedOut);
        assert!(runner.has_been_stopped());
        assert_eq!(job.cancels.load(Ordering::SeqCst), 1);
        assert!(!runner.is_job_active());
    }

    #[tokio::test]
    async fn test_all_triggers_fired_cancels_job_early() {
        let job = ScriptedJob::new(None);
        let runner: TestRunner<u32> = TestRunner::new(job.clone(), 1)
            .with_cancel_grace(Duration::from_millis(50));
        let sink = runner
            .create_test_sink_with_trigger(sum_is(3), FinishAtCount::new(2))
            .unwrap();
        runner.set_timeout_interval(10_000);

        let feeder = {
            let sink = sink.clone();
            tokio::spawn(async move {
                for value in 1..=5 {
                    sink.emit(value);
                    tokio::task::yield_now().await;
                }
            })
        };

        let report = runner.execute_test().await.unwrap();
        feeder.await.unwrap();

        assert_eq!(report.state, RunState::Completed);
        assert!(!report.stopped);
        assert!(report.instances[0].finished_early);
        assert_eq!(runner.buffer().records_for(sink.instance_id()), vec![1, 2]);
        assert_eq!(job.cancels.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_registration_closed_after_execution() {
        let job = ScriptedJob::new(Some(vec![]));
        let runner: TestRunner<u32> = TestRunner::new(job, 1);
        runner.create_test_sink(sum_is(0)).unwrap();
        runner.execute_test().await.unwrap();

        let err = runner.create_test_sink(sum_is(0)).unwrap_err();
        assert!(matches!(err, HarnessError::RegistrationClosed));
        assert_eq!(runner.listener_count(), 1);

        let err = runner.execute_test().await.unwrap_err();
        assert!(matches!(err, HarnessError::AlreadyExecuted(RunState::Completed)));
    }

    #[tokio::test]
    async fn test_blocking_execution_refused_inside_runtime() {
        let job = ScriptedJob::new(Some(vec![1, 2]));
        let runner: TestRunner<u32> = TestRunner::new(job.clone(), 1);
        job.attach(runner.create_test_sink(sum_is(3)).unwrap());

        let err = runner.execute_test_blocking().unwrap_err();
        assert!(matches!(err, HarnessError::BlockingInRuntime));
        assert_eq!(runner.state(), RunState::NotStarted);

        // The refused call left the runner untouched.
        let report = runner.execute_test().await.unwrap();
        assert_eq!(report.state, RunState::Completed);
    }

    #[test]
    fn test_from_config_applies_settings() {
        let config = HarnessConfig {
            timeout_ms: 750,
            parallelism: 3,
            ..HarnessConfig::default()
        };
        let runner: TestRunner<u32> = TestRunner::from_config(ScriptedJob::new(None), &config);
        assert_eq!(runner.timeout_interval(), 750);
        assert_eq!(runner.parallelism(), 3);
        assert_eq!(runner.state(), RunState::NotStarted);
    }

    #[test]
    fn test_panic_message_extraction() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&String::from("bang")), "bang");
        assert_eq!(panic_message(&42_u8), "verifier panicked");
    }
}
