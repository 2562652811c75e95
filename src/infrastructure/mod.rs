//! Infrastructure layer module
//!
//! Configuration loading and logging setup for the harness and its binary.

pub mod config;
pub mod logging;
