//! Pot RPC - Wallet and Daemon Client
//!
//! JSON-RPC access to the two external services the pot depends on:
//!
//! - **Wallet**: sub-address issuance, balances, inbound transfers, payouts
//! - **Daemon**: block headers for anchoring the monthly draw
//!
//! Both services are non-reentrant. Wrap clients in [`SerializedWallet`] /
//! [`SerializedDaemon`] so that each service sees one request at a time.
//! Calls are never retried here; retry policy belongs to the caller.

pub mod client;
pub mod config;
pub mod daemon;
pub mod error;
pub mod guard;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod types;
pub mod wallet;

pub use client::JsonRpcClient;
pub use config::RpcEndpointConfig;
pub use daemon::DaemonRpc;
pub use error::{RpcError, RpcResult};
pub use guard::{SerializedDaemon, SerializedWallet};
pub use types::*;
pub use wallet::WalletRpc;
