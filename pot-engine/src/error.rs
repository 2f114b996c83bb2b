//! Engine Error Types

use pot_core::CoreError;
use pot_rpc::RpcError;
use pot_store::StoreError;
use thiserror::Error;

/// Engine error
#[derive(Error, Debug)]
pub enum EngineError {
    /// Wallet or daemon call failed
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Ledger storage failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Domain rule rejected an input
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The chain has no block inside the month yet
    #[error("Anchor block for {month} not yet produced")]
    AnchorNotYetProduced { month: String },

    /// Probing did not locate the first block of the month
    #[error("Anchor block for {month} not found after {probes} probes")]
    AnchorNotFound { month: String, probes: u32 },

    /// Entries were credited between scoring and commit
    #[error("Cycle for {month} changed during the draw: scored {scored} entries, now {current}")]
    CycleChanged { month: String, scored: u64, current: u64 },

    /// Part of the wallet balance is still locked
    #[error("Wallet balance locked: balance {balance}, unlocked {unlocked}")]
    LockedBalance { balance: u64, unlocked: u64 },

    /// No entry price available
    #[error("Entry price unavailable: {0}")]
    PriceUnavailable(String),

    /// Payout transfer was rejected by the wallet
    #[error("Payout for {month} failed: {reason}")]
    PayoutFailed { month: String, reason: String },

    /// Alias already held by another account
    #[error("User name already taken: {0}")]
    DuplicateUser(String),

    /// Address rejected by the wallet
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Account id not present in the ledger
    #[error("Unknown account: {0}")]
    UnknownAccount(u64),

    /// Account slot kept changing under concurrent updates
    #[error("Account assignment conflict for {0}")]
    AssignmentConflict(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Background job is no longer running
    #[error("Job stopped: {0}")]
    JobStopped(String),

    /// Blocking task panicked or was cancelled
    #[error("Task failed: {0}")]
    Task(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Engine result type
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Failure that clears up by itself and is retried on the next natural schedule
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::Rpc(e) => e.is_transient(),
            EngineError::AnchorNotYetProduced { .. }
            | EngineError::CycleChanged { .. }
            | EngineError::LockedBalance { .. } => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Serialization(e.to_string())
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(e: tokio::task::JoinError) -> Self {
        EngineError::Task(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let err: EngineError = RpcError::Connection("refused".to_string()).into();
        assert!(err.is_transient());

        let err: EngineError = RpcError::Response {
            code: -4,
            message: "not enough money".to_string(),
        }
        .into();
        assert!(!err.is_transient());

        assert!(EngineError::LockedBalance { balance: 2, unlocked: 1 }.is_transient());
        assert!(!EngineError::DuplicateUser("abc".to_string()).is_transient());
        assert!(EngineError::CycleChanged {
            month: "2021-10".to_string(),
            scored: 2,
            current: 5,
        }
        .is_transient());
    }

    #[test]
    fn test_display() {
        let err = EngineError::AnchorNotFound {
            month: "2021-11".to_string(),
            probes: 5,
        };
        assert_eq!(err.to_string(), "Anchor block for 2021-11 not found after 5 probes");
    }
}
