//! Shared buffer that collects the output of every registered instance.
//!
//! Producers append from any number of threads or tasks. Each instance has its
//! own slot guarded by a short mutex, so contention is limited to producers of
//! the same instance. The slot map itself is only written at registration time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::domain::models::{InstanceId, TaggedRecord};
use crate::domain::ports::CompletionTrigger;

/// Result of a single append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Record stored; the instance keeps collecting.
    Accepted { sequence: u64 },
    /// Record stored and the instance's trigger fired on it.
    Finished { sequence: u64 },
    /// Record dropped without touching any state.
    Ignored(IgnoreReason),
}

impl AppendOutcome {
    pub fn is_stored(&self) -> bool {
        !matches!(self, Self::Ignored(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The run reached a terminal state.
    Sealed,
    /// The instance's trigger already fired.
    InstanceFinished,
    /// No registration exists for the id.
    UnknownInstance,
}

/// Snapshot of one instance's slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSummary {
    pub instance_id: InstanceId,
    pub records: usize,
    pub finished: bool,
    /// Appends that arrived after the instance finished or the buffer sealed.
    pub late_records: u64,
}

struct SlotState<T> {
    records: Vec<TaggedRecord<T>>,
    finished: bool,
    late_records: u64,
}

struct InstanceSlot<T> {
    trigger: Arc<dyn CompletionTrigger<T>>,
    state: Mutex<SlotState<T>>,
}

impl<T> InstanceSlot<T> {
    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        // A trigger that panicked leaves the records intact.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Tagged record buffer for one test execution.
pub struct RecordBuffer<T> {
    slots: RwLock<HashMap<InstanceId, Arc<InstanceSlot<T>>>>,
    sealed: AtomicBool,
    finished_tx: mpsc::UnboundedSender<InstanceId>,
    finished_rx: Mutex<Option<mpsc::UnboundedReceiver<InstanceId>>>,
}

impl<T: Send + 'static> RecordBuffer<T> {
    pub fn new() -> Self {
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        Self {
            slots: RwLock::new(HashMap::new()),
            sealed: AtomicBool::new(false),
            finished_tx,
            finished_rx: Mutex::new(Some(finished_rx)),
        }
    }

    /// Create the slot for a freshly registered instance.
    pub(crate) fn open_slot(&self, instance_id: InstanceId, trigger: Arc<dyn CompletionTrigger<T>>) {
        let slot = Arc::new(InstanceSlot {
            trigger,
            state: Mutex::new(SlotState {
                records: Vec::new(),
                finished: false,
                late_records: 0,
            }),
        });
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(instance_id, slot);
    }

    fn slot(&self, instance_id: InstanceId) -> Option<Arc<InstanceSlot<T>>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&instance_id)
            .cloned()
    }

    /// Append a record for `instance_id`.
    ///
    /// Never fails: appends after the buffer is sealed, after the instance
    /// finished, or for an unknown id are dropped and reported as
    /// [`AppendOutcome::Ignored`].
    pub fn append(&self, instance_id: InstanceId, payload: T) -> AppendOutcome {
        let Some(slot) = self.slot(instance_id) else {
            debug!(instance = %instance_id, "Dropping record for unregistered instance");
            return AppendOutcome::Ignored(IgnoreReason::UnknownInstance);
        };

        let mut state = slot.lock();
        if self.sealed.load(Ordering::Acquire) {
            state.late_records += 1;
            trace!(instance = %instance_id, "Dropping record appended after run ended");
            return AppendOutcome::Ignored(IgnoreReason::Sealed);
        }
        if state.finished {
            state.late_records += 1;
            return AppendOutcome::Ignored(IgnoreReason::InstanceFinished);
        }

        let sequence = state.records.len() as u64;
        let fired = slot.trigger.on_record(&payload, state.records.len() + 1);
        state
            .records
            .push(TaggedRecord::new(instance_id, sequence, payload));

        if fired {
            state.finished = true;
            drop(state);
            debug!(instance = %instance_id, records = sequence + 1, "Completion trigger fired");
            // The runner may already be gone; stragglers are fine.
            let _ = self.finished_tx.send(instance_id);
            AppendOutcome::Finished { sequence }
        } else {
            AppendOutcome::Accepted { sequence }
        }
    }

    /// Mark an instance finished without a record, e.g. when a trigger deadline
    /// passes. Returns `false` if it was already finished or is unknown.
    pub fn finish(&self, instance_id: InstanceId) -> bool {
        let Some(slot) = self.slot(instance_id) else {
            return false;
        };
        {
            let mut state = slot.lock();
            if state.finished {
                return false;
            }
            state.finished = true;
        }
        let _ = self.finished_tx.send(instance_id);
        true
    }

    pub fn is_finished(&self, instance_id: InstanceId) -> bool {
        self.slot(instance_id)
            .map(|slot| slot.lock().finished)
            .unwrap_or(false)
    }

    /// Stop accepting records. Idempotent.
    pub fn seal(&self) {
        if !self.sealed.swap(true, Ordering::AcqRel) {
            debug!("Record buffer sealed");
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    pub fn record_count(&self, instance_id: InstanceId) -> usize {
        self.slot(instance_id)
            .map(|slot| slot.lock().records.len())
            .unwrap_or(0)
    }

    /// Tagged records of one instance in arrival order.
    pub fn tagged_records_for(&self, instance_id: InstanceId) -> Vec<TaggedRecord<T>>
    where
        T: Clone,
    {
        self.slot(instance_id)
            .map(|slot| slot.lock().records.clone())
            .unwrap_or_default()
    }

    /// Payloads of one instance in arrival order.
    pub fn records_for(&self, instance_id: InstanceId) -> Vec<T>
    where
        T: Clone,
    {
        self.slot(instance_id)
            .map(|slot| {
                slot.lock()
                    .records
                    .iter()
                    .map(|record| record.payload.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn summary(&self, instance_id: InstanceId) -> Option<SlotSummary> {
        self.slot(instance_id).map(|slot| {
            let state = slot.lock();
            SlotSummary {
                instance_id,
                records: state.records.len(),
                finished: state.finished,
                late_records: state.late_records,
            }
        })
    }

    /// Receiver of "instance finished" notifications. Handed out once.
    pub(crate) fn take_finished_receiver(&self) -> Option<mpsc::UnboundedReceiver<InstanceId>> {
        self.finished_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl<T: Send + 'static> Default for RecordBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}
