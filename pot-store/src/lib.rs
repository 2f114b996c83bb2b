//! Pot Store - Ledger Persistence
//!
//! sled-backed storage for the pot ledger:
//!
//! - `accounts`, `entries`, `winners` (keyed by month)
//! - `transactions`: processed transfer ids, append-only
//! - `metadata`: cycle watermarks, entry counter, signing key, price
//!
//! All mutations go through [`LedgerTxn`] so that a reconcile cycle or a
//! draw commit is applied in full or not at all.

pub mod backup;
pub mod error;
pub mod store;
pub mod txn;

pub use backup::prune_backups;
pub use error::{StoreError, StoreResult};
pub use store::{meta, LedgerStore, LEDGER_VERSION};
pub use txn::LedgerTxn;
