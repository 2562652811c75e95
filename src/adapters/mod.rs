//! Job engine adapters.

pub mod local_job;

pub use local_job::{LocalJob, SubtaskContext};
