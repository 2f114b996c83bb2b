//! Store Error Types

use thiserror::Error;

/// Ledger store error
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying sled failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Multi-tree commit was aborted
    #[error("Transaction aborted: {0}")]
    Transaction(String),

    /// Stored value could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored value has an unexpected shape
    #[error("Corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// Ledger written by a newer schema
    #[error("Unsupported ledger version {found} (supported up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// Backup directory handling failed
    #[error("Backup error: {0}")]
    Backup(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Store result type
pub type StoreResult<T> = Result<T, StoreError>;

impl From<sled::Error> for StoreError {
    fn from(e: sled::Error) -> Self {
        StoreError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<sled::transaction::TransactionError<()>> for StoreError {
    fn from(e: sled::transaction::TransactionError<()>) -> Self {
        match e {
            sled::transaction::TransactionError::Abort(()) => {
                StoreError::Transaction("commit aborted".to_string())
            }
            sled::transaction::TransactionError::Storage(e) => StoreError::Storage(e.to_string()),
        }
    }
}

impl StoreError {
    pub fn corrupt(key: impl Into<String>, reason: impl ToString) -> Self {
        StoreError::Corrupt {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}
