//! RPC Error Types
//!
//! Failures are reported as-is; retry policy belongs to the callers.

use thiserror::Error;

/// Wallet error text for a transfer whose ring members could not be picked
const INSUFFICIENT_DECOYS: &str = "failed to get random outs";

/// RPC error
#[derive(Error, Debug)]
pub enum RpcError {
    /// Transport failure (connect, reset, timeout)
    #[error("RPC connection failed: {0}")]
    Connection(String),

    /// Non-2xx HTTP status
    #[error("RPC HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    /// JSON-RPC error object returned by the service
    #[error("RPC error {code}: {message}")]
    Response { code: i64, message: String },

    /// Body was not a valid JSON-RPC response or lacked a result
    #[error("Malformed RPC payload: {0}")]
    Malformed(String),

    /// Request parameters could not be encoded
    #[error("RPC serialization error: {0}")]
    Serialization(String),

    /// Client misconfiguration
    #[error("RPC configuration error: {0}")]
    Configuration(String),
}

/// RPC result type
pub type RpcResult<T> = Result<T, RpcError>;

impl RpcError {
    /// Transfer failed because not enough decoy outputs were available.
    ///
    /// A split transfer failing this way can still go through as individual
    /// single-destination transfers.
    pub fn is_insufficient_decoys(&self) -> bool {
        match self {
            RpcError::Response { message, .. } => message.contains(INSUFFICIENT_DECOYS),
            RpcError::Status { body, .. } => body.contains(INSUFFICIENT_DECOYS),
            _ => false,
        }
    }

    /// Network-level failure; nothing reached the service
    pub fn is_transient(&self) -> bool {
        matches!(self, RpcError::Connection(_) | RpcError::Status { .. })
    }
}

impl From<reqwest::Error> for RpcError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RpcError::Malformed(e.to_string())
        } else {
            RpcError::Connection(e.to_string())
        }
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(e: serde_json::Error) -> Self {
        RpcError::Malformed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_decoys() {
        let err = RpcError::Response {
            code: -17,
            message: "failed to get random outs: not enough outputs".to_string(),
        };
        assert!(err.is_insufficient_decoys());
        assert!(!err.is_transient());

        let err = RpcError::Response {
            code: -4,
            message: "not enough money".to_string(),
        };
        assert!(!err.is_insufficient_decoys());
    }

    #[test]
    fn test_transient() {
        assert!(RpcError::Connection("refused".to_string()).is_transient());
        assert!(RpcError::Status { status: 502, body: String::new() }.is_transient());
        assert!(!RpcError::Malformed("eof".to_string()).is_transient());
    }
}
