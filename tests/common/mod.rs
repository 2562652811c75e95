//! Common test utilities for integration tests
//!
//! Shared verifiers and job builders used across the runner test files.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use sinkcheck::{LocalJob, OutputVerifier, TestSink, VerificationFailure};

/// Setup test logging
///
/// Initializes a tracing subscriber writing to the test output. Safe to call
/// from every test.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Verifier that accepts everything and keeps a copy of what it saw.
#[derive(Clone)]
pub struct Capture<T> {
    seen: Arc<Mutex<Option<Vec<T>>>>,
}

impl<T: Clone> Capture<T> {
    pub fn new() -> Self {
        Self {
            seen: Arc::new(Mutex::new(None)),
        }
    }

    /// Records passed to the verifier, or `None` if it never ran.
    pub fn seen(&self) -> Option<Vec<T>> {
        self.seen.lock().unwrap().clone()
    }
}

impl<T> OutputVerifier<T> for Capture<T>
where
    T: Clone + Send + Sync,
{
    fn verify(&self, records: &[T]) -> Result<(), VerificationFailure> {
        *self.seen.lock().unwrap() = Some(records.to_vec());
        Ok(())
    }
}

/// Add a single-subtask source emitting `records` into every sink in order.
/// With `stall` the source then waits for cancellation like an unbounded
/// stream would.
pub fn add_source(job: &LocalJob, sinks: Vec<TestSink<u64>>, records: Vec<u64>, stall: bool) {
    job.add_operator_with_parallelism("source", 1, move |task| {
        let sinks = sinks.clone();
        let records = records.clone();
        async move {
            for record in records {
                for sink in &sinks {
                    sink.emit(record);
                }
                tokio::task::yield_now().await;
            }
            if stall {
                task.cancelled().await;
            }
            Ok(())
        }
    });
}

/// Add a source that emits an increasing counter into every sink until all of
/// them are finished, pausing `pause` between records.
pub fn add_unbounded_source(job: &LocalJob, sinks: Vec<TestSink<u64>>, pause: Duration) {
    job.add_operator_with_parallelism("unbounded-source", 1, move |task| {
        let sinks = sinks.clone();
        async move {
            let mut next = 0u64;
            while !task.is_cancelled() && sinks.iter().any(|sink| !sink.is_finished()) {
                for sink in &sinks {
                    sink.emit(next);
                }
                next += 1;
                tokio::time::sleep(pause).await;
            }
            task.cancelled().await;
            Ok(())
        }
    });
}
