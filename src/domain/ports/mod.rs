//! Capabilities the harness consumes from its callers and from the job engine.

pub mod job;
pub mod trigger;
pub mod verifier;

pub use job::{JobContext, JobExecutor};
pub use trigger::CompletionTrigger;
pub use verifier::{OutputVerifier, VerificationFailure};
