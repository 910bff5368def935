//! Error types for the state layer.
//!
//! None of these ever reach a caller of the public facades: each facade
//! collapses them into its documented fallback value through [`fallback`].

use std::time::Duration;

use thiserror::Error;

use crate::telemetry;

/// Result type for internal state-layer operations
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while talking to the backing store
#[derive(Debug, Error)]
pub enum StateError {
    /// No store address configured, or the handle has been closed
    #[error("state store is disabled")]
    Disabled,

    /// Connection could not be established or was dropped
    #[error("connection error: {0}")]
    Connection(String),

    /// A single command or pipeline failed against a live connection
    #[error("command error: {0}")]
    Command(#[from] redis::RedisError),

    /// A command did not complete within the configured command timeout
    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    /// Value could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Caller used a key inside a namespace owned by this layer
    #[error("key uses reserved prefix: {0}")]
    ReservedKey(String),

    /// Argument outside the accepted range
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl StateError {
    /// Short, stable label used for telemetry and log fields.
    pub fn reason(&self) -> &'static str {
        match self {
            StateError::Disabled => "disabled",
            StateError::Connection(_) => "connection",
            StateError::Command(_) => "command",
            StateError::Timeout(_) => "timeout",
            StateError::Serialization(_) => "serialization",
            StateError::ReservedKey(_) => "reserved_key",
            StateError::InvalidArgument(_) => "invalid_argument",
        }
    }

    /// Whether this failure says something about the health of the
    /// connection itself, as opposed to a single bad command.
    pub fn is_connection_failure(&self) -> bool {
        match self {
            StateError::Connection(_) | StateError::Timeout(_) => true,
            StateError::Command(e) => {
                e.is_io_error()
                    || e.is_connection_dropped()
                    || e.is_connection_refusal()
                    || e.is_timeout()
            }
            _ => false,
        }
    }
}

/// Collapse an internal result into the operation's fallback value.
///
/// Disabled mode is the expected path when no store is configured, so it is
/// only traced at debug level. Every other failure is logged as a warning.
pub(crate) fn fallback<T>(operation: &'static str, key: &str, result: StateResult<T>, default: T) -> T {
    match result {
        Ok(value) => value,
        Err(StateError::Disabled) => {
            tracing::debug!(operation, key = %key, "state store disabled, using fallback");
            telemetry::record_fallback(operation, "disabled");
            default
        }
        Err(e) => {
            tracing::warn!(operation, key = %key, error = %e, "state store operation failed, using fallback");
            telemetry::record_fallback(operation, e.reason());
            default
        }
    }
}
