pub mod config;
pub mod record;
pub mod run_state;

pub use config::{HarnessConfig, LogFormat, LoggingConfig, RotationPolicy};
pub use record::{InstanceId, TaggedRecord};
pub use run_state::RunState;
