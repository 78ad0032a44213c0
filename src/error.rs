//! Error types for procwatch.
//!
//! Engine operations return `ProcwatchError`. Calls into a repository's
//! process service fail with `ServiceError`, which the poller turns into a
//! list state transition instead of propagating.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all procwatch operations.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum ProcwatchError {
    /// Engine-level errors (startup, runtime, shutdown).
    #[error("{0}")]
    Engine(String),

    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Unknown or duplicated repository.
    #[error("{0}")]
    Repository(String),

    /// A process service call failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Data conversion errors (JSON, TOML).
    #[error("{0}")]
    Convert(String),

    /// Message queue errors.
    #[error("{0}")]
    Queue(String),
}

/// Failure reported by a repository's process service.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// Network or server side failure, retried on the next tick.
    #[error("transient service error: {0}")]
    Transient(String),

    /// The call did not finish within the configured fetch timeout.
    #[error("service call timed out after {0} ms")]
    Timeout(u64),

    /// The user declined to supply credentials for the repository.
    #[error("authentication declined")]
    AuthDeclined,

    /// No process service handle could be obtained for the repository.
    #[error("process service unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for ProcwatchError {
    fn from(error: serde_json::Error) -> Self {
        ProcwatchError::Convert(error.to_string())
    }
}

impl From<toml::de::Error> for ProcwatchError {
    fn from(error: toml::de::Error) -> Self {
        ProcwatchError::Config(error.to_string())
    }
}
