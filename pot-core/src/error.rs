//! Core Error Types

use thiserror::Error;

/// Domain error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Entry price could not be derived
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// Persisted price stamp is not `YYYY-MM-DD:<units>`
    #[error("Invalid price stamp: {0}")]
    InvalidPriceStamp(String),

    /// Calendar arithmetic left the representable range
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Winner info or payout body could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}
