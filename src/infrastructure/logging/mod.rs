//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber, with optional
//! rotated JSON files through tracing-appender.

pub mod logger;

pub use logger::LoggerGuard;
