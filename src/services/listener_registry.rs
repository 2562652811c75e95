//! Registry of (verifier, trigger) pairs, one per output instance.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::domain::errors::{HarnessError, HarnessResult};
use crate::domain::models::InstanceId;
use crate::domain::ports::{CompletionTrigger, OutputVerifier};
use crate::services::record_buffer::RecordBuffer;

/// One registered instance. Immutable once created.
pub struct Registration<T> {
    pub instance_id: InstanceId,
    pub verifier: Arc<dyn OutputVerifier<T>>,
    pub trigger: Arc<dyn CompletionTrigger<T>>,
}

impl<T> Clone for Registration<T> {
    fn clone(&self) -> Self {
        Self {
            instance_id: self.instance_id,
            verifier: Arc::clone(&self.verifier),
            trigger: Arc::clone(&self.trigger),
        }
    }
}

impl<T> std::fmt::Debug for Registration<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("instance_id", &self.instance_id)
            .finish_non_exhaustive()
    }
}

struct RegistryState<T> {
    next_id: u32,
    closed: bool,
    registrations: Vec<Registration<T>>,
}

/// Hands out instance ids and opens the matching buffer slot.
///
/// Registration and closing share one lock, so an instance is either fully
/// registered (id, verifier, buffer slot) before the run starts or rejected.
pub struct ListenerRegistry<T> {
    buffer: Arc<RecordBuffer<T>>,
    state: Mutex<RegistryState<T>>,
}

impl<T: Send + 'static> ListenerRegistry<T> {
    pub fn new(buffer: Arc<RecordBuffer<T>>) -> Self {
        Self {
            buffer,
            state: Mutex::new(RegistryState {
                next_id: 0,
                closed: false,
                registrations: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a listener and return its instance id.
    pub fn register(
        &self,
        verifier: Arc<dyn OutputVerifier<T>>,
        trigger: Arc<dyn CompletionTrigger<T>>,
    ) -> HarnessResult<InstanceId> {
        let mut state = self.lock();
        if state.closed {
            warn!("Listener registration attempted after the run started");
            return Err(HarnessError::RegistrationClosed);
        }

        let instance_id = InstanceId::new(state.next_id);
        state.next_id += 1;
        self.buffer.open_slot(instance_id, Arc::clone(&trigger));
        state.registrations.push(Registration {
            instance_id,
            verifier,
            trigger,
        });

        debug!(instance = %instance_id, "Registered listener");
        Ok(instance_id)
    }

    /// Close registration and return every registration in id order.
    pub fn close(&self) -> Vec<Registration<T>> {
        let mut state = self.lock();
        state.closed = true;
        state.registrations.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn registrations(&self) -> Vec<Registration<T>> {
        self.lock().registrations.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn buffer(&self) -> &Arc<RecordBuffer<T>> {
        &self.buffer
    }
}
