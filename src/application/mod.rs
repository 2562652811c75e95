pub mod job_scope;
pub mod run_control;
pub mod runner;
pub mod test_sink;
pub mod watchdog;

pub use job_scope::{ExecutionContext, JobScope};
pub use run_control::{CancelReason, JobCancellation, RunControl};
pub use runner::{InstanceReport, RunReport, TestRunner};
pub use test_sink::TestSink;
pub use watchdog::TimeoutWatchdog;
