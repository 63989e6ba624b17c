//! Error types for the latent runtime.
//!
//! Only synchronous failures are Rust errors. Asynchronous failures and
//! cancellations travel as [`TaskOutcome`](latent_types::TaskOutcome) values
//! through the completion router.

use latent_types::{ContextId, TaskToken};

/// Invariant violations inside the task registry.
///
/// These indicate a bug in the caller, not a runtime condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Token already registered: {0}")]
    DuplicateToken(TaskToken),

    #[error("Cannot retire {0} while it is still pending")]
    InvalidTeardown(TaskToken),
}

/// Synchronous errors reported at the call site of an entry point.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{operation} already in progress for {context} ({existing})")]
    AlreadyInProgress {
        operation: String,
        context: ContextId,
        existing: TaskToken,
    },

    #[error("Unknown or disabled entry point: {0}")]
    UnknownEntryPoint(String),

    #[error("Context is no longer alive: {0}")]
    ContextGone(ContextId),

    #[error("Session has shut down")]
    SessionClosed,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl BridgeError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        BridgeError::InvalidArgument(msg.into())
    }
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors loading session configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
