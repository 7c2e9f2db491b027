//! Convergence engine error types

use thiserror::Error;

/// Errors raised while converging a managed resource
#[derive(Error, Debug)]
pub enum CloudError {
    /// The remote counterpart does not exist. A valid state during observe and delete.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A create raced with an earlier create of the same name. Success during create.
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("{operation}: transport error: {message}")]
    Transport { operation: String, message: String },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Malformed version: {0}")]
    MalformedVersion(String),

    #[error("Unknown settings schema: {0}")]
    UnknownSchema(String),

    #[error("Field '{field}' is immutable (current: {from}, requested: {to})")]
    ImmutableFieldChanged {
        field: String,
        from: String,
        to: String,
    },

    #[error("Container is not empty: {0}")]
    NotEmpty(String),

    /// Lock probe answer meaning "no lock configured". Not a failure.
    #[error("No lock configured: {0}")]
    NoLockConfigured(String),

    #[error("Cannot {operation} while {state}")]
    InvalidTransition {
        operation: &'static str,
        state: crate::state::ConvergenceState,
    },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config error: {0}")]
    Config(#[from] skyflow_config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// Transport failure not yet attributed to an engine operation
    pub fn transport(message: impl Into<String>) -> Self {
        CloudError::Transport {
            operation: "remote".to_string(),
            message: message.into(),
        }
    }

    /// Attribute a transport failure to the engine operation that issued it
    pub fn during(self, operation: &str) -> Self {
        match self {
            CloudError::Transport { message, .. } => CloudError::Transport {
                operation: operation.to_string(),
                message,
            },
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, CloudError::AlreadyExists(_))
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
