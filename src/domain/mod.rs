//! Domain layer for the sinkcheck harness
//!
//! Records, run states, configuration models and the capability traits
//! implemented by callers (verifiers, triggers) and by job engines.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{HarnessError, HarnessResult};
