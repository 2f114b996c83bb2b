//! Pot Engine - Ledger Operations
//!
//! Everything that moves money or entries through the pot ledger:
//!
//! - **Reconciler**: turns inbound wallet transfers into entries
//! - **Auditor**: re-reads transfers below the watermark and credits
//!   anything the reconciler missed
//! - **Draw**: closes the month, anchors it to a block, scores the entries
//!   and pays the winners, referrers and shares
//! - **Accounts**: sub-address slots, aliases and referrals
//! - **Price**: the running entry price, refreshed daily from a USD quote
//! - **Service**: the [`Engine`] facade and its background jobs
//!
//! # Usage
//!
//! ```rust,no_run
//! use pot_engine::{Engine, EngineConfig, LogAlertSink, TradeOgreSource};
//! use pot_rpc::{JsonRpcClient, RpcEndpointConfig};
//! use pot_store::LedgerStore;
//! use std::sync::Arc;
//!
//! async fn example() -> pot_engine::EngineResult<()> {
//!     let config = EngineConfig::from_env();
//!     let store = LedgerStore::open(config.ledger_path())?;
//!     let wallet = Arc::new(JsonRpcClient::new(RpcEndpointConfig::wallet_from_env())?);
//!     let daemon = Arc::new(JsonRpcClient::new(RpcEndpointConfig::daemon_from_env())?);
//!
//!     let engine = Engine::new(
//!         config,
//!         store,
//!         wallet,
//!         daemon,
//!         Arc::new(TradeOgreSource::new()?),
//!         Arc::new(LogAlertSink),
//!     )?;
//!     let runner = engine.start();
//!
//!     tokio::signal::ctrl_c().await?;
//!     runner.stop().await;
//!     Ok(())
//! }
//! ```

pub mod accounts;
pub mod alerts;
pub mod anchor;
pub mod auditor;
pub mod config;
pub mod context;
mod credit;
pub mod draw;
pub mod error;
pub mod notify;
pub mod price;
pub mod reconciler;
pub mod scheduler;
pub mod service;
#[cfg(test)]
mod testing;

pub use accounts::{AccountService, PublishedWinner};
pub use alerts::{Alert, AlertKind, AlertSink, LogAlertSink, RecordingAlertSink};
pub use anchor::find_anchor_block;
pub use auditor::{AuditMode, AuditReport, Auditor};
pub use config::{EngineConfig, PayoutParams, TimeOfDay};
pub use context::EngineContext;
pub use draw::{DrawEngine, DrawOutcome, DrawState};
pub use error::{EngineError, EngineResult};
pub use notify::{LedgerEvent, Notifier};
pub use price::{PriceBook, PriceSource, StaticPriceSource, TradeOgreSource};
pub use reconciler::{ReconcileReport, Reconciler};
pub use scheduler::{Job, JobHandle};
pub use service::{BackupReport, Engine, Runner};
