//! Record identity types shared by the buffer, the registry and the sinks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one registered output channel.
///
/// Ids are handed out by the listener registry in registration order and are
/// never reused within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(u32);

impl InstanceId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A payload as it was appended to the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedRecord<T> {
    /// Instance that produced the record.
    pub instance_id: InstanceId,
    /// Per-instance arrival order, starting at 0.
    pub sequence: u64,
    pub payload: T,
}

impl<T> TaggedRecord<T> {
    pub fn new(instance_id: InstanceId, sequence: u64, payload: T) -> Self {
        Self {
            instance_id,
            sequence,
            payload,
        }
    }

    pub fn into_payload(self) -> T {
        self.payload
    }
}
