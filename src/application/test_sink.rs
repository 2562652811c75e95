//! Output channel handed to the job's producers.
//!
//! A sink is the explicit context a producer needs: its instance id and the
//! buffer to write into. Clones share the same instance, so every parallel
//! subtask of an output stage can hold one.

use std::sync::Arc;

use tracing::trace;

use crate::domain::models::InstanceId;
use crate::services::record_buffer::{AppendOutcome, RecordBuffer};

pub struct TestSink<T> {
    instance_id: InstanceId,
    buffer: Arc<RecordBuffer<T>>,
}

impl<T> Clone for TestSink<T> {
    fn clone(&self) -> Self {
        Self {
            instance_id: self.instance_id,
            buffer: Arc::clone(&self.buffer),
        }
    }
}

impl<T> std::fmt::Debug for TestSink<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestSink")
            .field("instance_id", &self.instance_id)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> TestSink<T> {
    pub fn new(instance_id: InstanceId, buffer: Arc<RecordBuffer<T>>) -> Self {
        Self {
            instance_id,
            buffer,
        }
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    /// Forward one record. Records arriving after the instance finished or the
    /// run ended are dropped, never an error.
    pub fn emit(&self, record: T) -> AppendOutcome {
        let outcome = self.buffer.append(self.instance_id, record);
        trace!(instance = %self.instance_id, ?outcome, "Record emitted");
        outcome
    }

    /// Forward records until the instance stops accepting them. Returns how many
    /// were stored.
    pub fn emit_all(&self, records: impl IntoIterator<Item = T>) -> usize {
        let mut stored = 0;
        for record in records {
            match self.emit(record) {
                AppendOutcome::Accepted { .. } => stored += 1,
                AppendOutcome::Finished { .. } => return stored + 1,
                AppendOutcome::Ignored(_) => return stored,
            }
        }
        stored
    }

    /// Whether this instance's trigger fired or the run ended. Producers of
    /// unbounded streams use this to stop early.
    pub fn is_finished(&self) -> bool {
        self.buffer.is_sealed() || self.buffer.is_finished(self.instance_id)
    }
}
