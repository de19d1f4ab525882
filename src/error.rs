//! Error types for transaction management
//!
//! Provides the error taxonomy for propagation checks, session lifecycle
//! failures, hook failures and timeouts.

use thiserror::Error;

/// Result type alias for transaction operations
pub type TxResult<T> = Result<T, TxError>;

/// Error types for transaction operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TxError {
    /// A propagation rule rejected the call before any session was acquired
    #[error("Propagation violation: {message}")]
    PropagationViolation { message: String },

    /// A nested scope would exceed the configured depth limit
    #[error("Nested transaction depth {depth} exceeds limit {limit}")]
    NestingLimitExceeded { depth: u32, limit: u32 },

    /// The named datasource is absent or not initialised
    #[error("Datasource '{name}' unavailable: {reason}")]
    DataSourceUnavailable { name: String, reason: String },

    /// The per-call timer elapsed while the body was running
    #[error("Transaction timed out after {timeout_ms}ms (context {context_id})")]
    Timeout { timeout_ms: u64, context_id: String },

    /// Session lifecycle failure (connect, begin, commit, rollback, release)
    #[error("Session error: {0}")]
    Session(String),

    /// A user hook raised an error
    #[error("Hook '{hook}' failed: {message}")]
    Hook { hook: String, message: String },

    /// Invalid or incomplete configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Application-level failure raised by a transactional body
    #[error("{0}")]
    Application(String),
}

impl TxError {
    /// Create a propagation violation error
    pub fn propagation(message: impl Into<String>) -> Self {
        Self::PropagationViolation {
            message: message.into(),
        }
    }

    /// Create a datasource-unavailable error
    pub fn datasource_unavailable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataSourceUnavailable {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a session lifecycle error
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session(message.into())
    }

    /// Create a hook failure error
    pub fn hook(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Hook {
            hook: hook.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an application-level error
    pub fn application(message: impl Into<String>) -> Self {
        Self::Application(message.into())
    }
}
