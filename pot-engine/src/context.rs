//! Shared Engine Resources
//!
//! Every component borrows the same context: the ledger, the serialized
//! RPC handles, the price book and the locks that order ledger writers.
//!
//! Lock order is `draw_lock` before `ledger_lock`. RPC guards live inside
//! the serialized clients and are never held across a ledger commit.

use chrono::{DateTime, Utc};
use pot_rpc::{DaemonRpc, SerializedDaemon, SerializedWallet, WalletRpc};
use pot_store::LedgerStore;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use crate::alerts::{Alert, AlertSink};
use crate::config::EngineConfig;
use crate::draw::DrawState;
use crate::error::EngineResult;
use crate::notify::Notifier;
use crate::price::{PriceBook, PriceSource};

pub struct EngineContext {
    pub config: EngineConfig,
    pub store: LedgerStore,
    /// Held from `begin` to `commit` of every ledger transaction
    pub ledger_lock: Mutex<()>,
    /// Held for a whole draw attempt
    pub draw_lock: Mutex<()>,
    pub wallet: Arc<dyn WalletRpc>,
    pub daemon: Arc<dyn DaemonRpc>,
    pub prices: PriceBook,
    pub notifier: Notifier,
    pub alerts: Arc<dyn AlertSink>,
    pub draw_state: watch::Sender<DrawState>,
}

impl EngineContext {
    /// Wire the components; the RPC backends are wrapped in per-service guards
    pub fn new(
        config: EngineConfig,
        store: LedgerStore,
        wallet: Arc<dyn WalletRpc>,
        daemon: Arc<dyn DaemonRpc>,
        prices: Arc<dyn PriceSource>,
        alerts: Arc<dyn AlertSink>,
    ) -> EngineResult<Self> {
        let notifier = Notifier::new();
        let prices = PriceBook::new(prices, store.clone(), notifier.clone())?;
        let (draw_state, _) = watch::channel(DrawState::Idle);

        Ok(Self {
            config,
            store,
            ledger_lock: Mutex::new(()),
            draw_lock: Mutex::new(()),
            wallet: Arc::new(SerializedWallet::new(wallet)),
            daemon: Arc::new(SerializedDaemon::new(daemon)),
            prices,
            notifier,
            alerts,
            draw_state,
        })
    }

    pub fn alert(&self, alert: Alert) {
        self.alerts.send(alert);
    }

    /// Current price, fetched for `now`'s date if never set
    pub async fn entry_price(&self, now: DateTime<Utc>) -> EngineResult<u64> {
        self.prices.ensure(now.date_naive()).await
    }
}
