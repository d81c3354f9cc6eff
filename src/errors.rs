//! Error types for the suspend engine and its collaborators.
//!
//! Each operation family has its own small error enum so callers can match
//! exhaustively; [`ThreadError`] unifies them for code that does not care
//! which layer failed.

use thiserror::Error;

/// Result type for threading operations.
pub type ThreadResult<T> = Result<T, ThreadError>;

/// Umbrella error type for all threading operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ThreadError {
    /// Suspend request failed
    #[error("suspend failed: {0}")]
    Suspend(#[from] SuspendError),
    /// Resume request failed
    #[error("resume failed: {0}")]
    Resume(#[from] ResumeError),
    /// Registry lookup failed
    #[error("lookup failed: {0}")]
    Lookup(#[from] LookupError),
    /// Thread creation failed
    #[error("spawn failed: {0}")]
    Spawn(#[from] SpawnError),
    /// Runtime configuration was rejected
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Errors returned by `suspend_one`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SuspendError {
    /// The caller named itself as the target. No state was touched.
    #[error("a thread cannot suspend itself")]
    SelfSuspend,
    /// The target identity is stale or the thread is already terminal.
    #[error("target thread not found or already terminated")]
    NotFound,
}

/// Errors returned by `resume_one`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResumeError {
    /// The target identity is stale or the thread is already terminal.
    #[error("target thread not found or already terminated")]
    NotFound,
}

/// Errors returned when pinning or looking up a thread in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The identity does not name a live registry entry.
    #[error("no such thread")]
    NotFound,
}

/// Errors that can occur when spawning threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SpawnError {
    /// Every registry slot is occupied
    #[error("maximum number of threads reached")]
    TooManyThreads,
}

/// Errors raised while building a [`RuntimeConfig`](crate::config::RuntimeConfig).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Registry capacity is zero or exceeds the identity encoding
    #[error("invalid registry capacity: {0}")]
    InvalidCapacity(usize),
}

impl From<LookupError> for SuspendError {
    fn from(error: LookupError) -> Self {
        match error {
            LookupError::NotFound => SuspendError::NotFound,
        }
    }
}

impl From<LookupError> for ResumeError {
    fn from(error: LookupError) -> Self {
        match error {
            LookupError::NotFound => ResumeError::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_lookup_maps_to_not_found() {
        assert_eq!(SuspendError::from(LookupError::NotFound), SuspendError::NotFound);
        assert_eq!(ResumeError::from(LookupError::NotFound), ResumeError::NotFound);
    }

    #[test]
    fn test_umbrella_conversion_and_display() {
        let err: ThreadError = SuspendError::SelfSuspend.into();
        assert_eq!(err, ThreadError::Suspend(SuspendError::SelfSuspend));
        assert_eq!(err.to_string(), "suspend failed: a thread cannot suspend itself");

        let err: ThreadError = ConfigError::InvalidCapacity(0).into();
        assert_eq!(err.to_string(), "invalid configuration: invalid registry capacity: 0");
    }
}
