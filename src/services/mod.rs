pub mod listener_registry;
pub mod record_buffer;
pub mod triggers;
pub mod verifiers;

pub use listener_registry::{ListenerRegistry, Registration};
pub use record_buffer::{AppendOutcome, IgnoreReason, RecordBuffer, SlotSummary};
pub use triggers::{AnyOf, DefaultTrigger, FinishAfter, FinishAtCount, FinishOnMatch};
pub use verifiers::{ExpectedRecords, MatchMode, RecordCount};
