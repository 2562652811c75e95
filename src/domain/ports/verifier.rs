//! Verifier port - caller-supplied assertions over one instance's output.

use thiserror::Error;

/// Why a verifier rejected its records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct VerificationFailure {
    pub reason: String,
}

impl VerificationFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<String> for VerificationFailure {
    fn from(reason: String) -> Self {
        Self { reason }
    }
}

impl From<&str> for VerificationFailure {
    fn from(reason: &str) -> Self {
        Self::new(reason)
    }
}

/// Assertion logic evaluated against the records collected for one instance.
///
/// Called once per instance, after the instance is finished. Records arrive in
/// the order they were appended for that instance. A panic inside `verify` is
/// reported as an assertion failure, so `assert!` style verifiers work too.
pub trait OutputVerifier<T>: Send + Sync {
    fn verify(&self, records: &[T]) -> Result<(), VerificationFailure>;
}

impl<T, F> OutputVerifier<T> for F
where
    F: Fn(&[T]) -> Result<(), VerificationFailure> + Send + Sync,
{
    fn verify(&self, records: &[T]) -> Result<(), VerificationFailure> {
        self(records)
    }
}
