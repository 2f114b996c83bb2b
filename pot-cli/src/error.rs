//! CLI Error Types

use pot_engine::EngineError;
use pot_rpc::RpcError;
use pot_store::StoreError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Requested record does not exist
    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Engine error: {0}")]
    EngineError(#[from] EngineError),

    #[error("RPC error: {0}")]
    RpcError(#[from] RpcError),

    #[error("Ledger error: {0}")]
    StoreError(#[from] StoreError),

    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub fn config(message: impl Into<String>) -> Self {
        CliError::ConfigError {
            message: message.into(),
        }
    }

    pub fn invalid_arg(message: impl Into<String>) -> Self {
        CliError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        CliError::NotFound { what: what.into() }
    }

    /// Get exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::ConfigError { .. } => 1,
            CliError::InvalidArgument { .. } => 2,
            CliError::NotFound { .. } => 3,
            CliError::EngineError(EngineError::Configuration(_)) => 1,
            CliError::EngineError(e) if e.is_transient() => 4,
            CliError::EngineError(_) => 10,
            CliError::RpcError(_) => 4,
            CliError::StoreError(_) => 11,
            CliError::IoError(_) => 5,
            CliError::JsonError(_) => 6,
        }
    }
}
