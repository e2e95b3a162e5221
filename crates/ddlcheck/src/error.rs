//! Error types for ddlcheck

use std::time::Duration;
use thiserror::Error;

/// Result type for ddlcheck operations.
pub type CheckResult<T> = Result<T, CheckError>;

/// Faults that abort a check.
///
/// Rule violations and rejected DDL are not errors: they are reported as
/// [`Diagnostic`](crate::Diagnostic)s. A `CheckError` means the check itself
/// could not be carried out.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The container runtime failed (image pull, container start, inspect, stop).
    #[error("Container runtime error: {0}")]
    Runtime(String),
    /// The ephemeral instance did not become reachable in time.
    #[error("Database instance never became ready (waited {waited:?})")]
    NotReady { waited: Duration },
    /// The instance answered but refused the session for a reason retrying
    /// will not fix (bad credentials, unknown database).
    #[error("Cannot connect to database instance: {0}")]
    Connect(String),
    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),
    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CheckError {
    /// Create a container runtime error.
    pub fn runtime(message: impl Into<String>) -> Self {
        CheckError::Runtime(message.into())
    }

    /// Returns true if this error is an orchestration fault of the ephemeral instance.
    pub fn is_orchestration_fault(&self) -> bool {
        matches!(
            self,
            CheckError::Runtime(_) | CheckError::NotReady { .. } | CheckError::Connect(_)
        )
    }
}

impl From<serde_json::Error> for CheckError {
    fn from(e: serde_json::Error) -> Self {
        CheckError::Serialization(e.to_string())
    }
}
