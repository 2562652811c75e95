//! sinkcheck - test harness for parallel dataflow jobs
//!
//! A job under test writes its output through [`TestSink`]s. Every sink belongs
//! to one registered instance with its own verifier and completion trigger.
//! The [`TestRunner`] starts the job, stops it on timeout, finishes instances
//! early when their triggers fire, and reduces everything to one verdict.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): records, run states, errors and the
//!   capability traits implemented by callers and job engines
//! - **Service Layer** (`services`): record buffer, listener registry,
//!   ready-made triggers and verifiers
//! - **Application Layer** (`application`): the runner, its watchdog and the
//!   execution-context guard
//! - **Adapters** (`adapters`): the in-process job engine
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sinkcheck::{ExpectedRecords, LocalJob, TestRunner};
//!
//! fn main() -> anyhow::Result<()> {
//!     let job = Arc::new(LocalJob::new("words"));
//!     let runner: TestRunner<String> = TestRunner::new(job.clone(), 2);
//!     let sink = runner.create_test_sink(
//!         ExpectedRecords::new(["a".to_string(), "b".to_string()]).contains_only(),
//!     )?;
//!
//!     job.add_operator_with_parallelism("source", 1, move |_task| {
//!         let sink = sink.clone();
//!         async move {
//!             sink.emit_all(["a", "b"].map(String::from));
//!             Ok(())
//!         }
//!     });
//!
//!     let report = runner.execute_test_blocking()?;
//!     println!("{}", serde_json::to_string(&report)?);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use adapters::{LocalJob, SubtaskContext};
pub use application::{InstanceReport, RunReport, TestRunner, TestSink};
pub use domain::models::{HarnessConfig, InstanceId, LoggingConfig, RunState, TaggedRecord};
pub use domain::ports::{
    CompletionTrigger, JobContext, JobExecutor, OutputVerifier, VerificationFailure,
};
pub use domain::{HarnessError, HarnessResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    AnyOf, DefaultTrigger, ExpectedRecords, FinishAfter, FinishAtCount, FinishOnMatch,
    MatchMode, RecordBuffer, RecordCount,
};
