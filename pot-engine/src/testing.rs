//! Test harness: an engine context over in-memory backends

use chrono::{DateTime, TimeZone, Utc};
use pot_core::Account;
use pot_rpc::mock::{mock_address, MockDaemon, MockWallet};
use pot_store::LedgerStore;
use std::sync::Arc;
use tempfile::TempDir;

use crate::alerts::RecordingAlertSink;
use crate::config::{EngineConfig, ADDRESS_LENGTH};
use crate::context::EngineContext;
use crate::price::StaticPriceSource;

/// Entry price produced by the harness quote (250 USD per coin)
pub const PRICE: u64 = 10_000_000_000;

pub fn maintenance_address() -> String {
    format!("9{}", "m".repeat(ADDRESS_LENGTH - 1))
}

pub fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 5, 0).unwrap()
}

pub struct Harness {
    pub ctx: Arc<EngineContext>,
    pub wallet: Arc<MockWallet>,
    pub daemon: Arc<MockDaemon>,
    pub alerts: Arc<RecordingAlertSink>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(|c| c)
    }

    pub fn with_config(f: impl FnOnce(EngineConfig) -> EngineConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = f(EngineConfig::development()
            .with_data_path(dir.path())
            .with_maintenance_address(maintenance_address()));
        let store = LedgerStore::open(config.ledger_path()).unwrap();
        let wallet = Arc::new(MockWallet::new());
        let daemon = Arc::new(MockDaemon::new());
        let alerts = Arc::new(RecordingAlertSink::new());
        let ctx = EngineContext::new(
            config,
            store,
            wallet.clone(),
            daemon.clone(),
            Arc::new(StaticPriceSource(25_000_000_000)),
            alerts.clone(),
        )
        .unwrap();
        Self {
            ctx: Arc::new(ctx),
            wallet,
            daemon,
            alerts,
            dir,
        }
    }

    /// Active account `id` bound to sub-address `id`
    pub fn open_account(&self, id: u64) -> Account {
        let mut account = Account::new(id, id, mock_address(id));
        account.active = true;
        account.user_address = Some(format!("payer{}", id));
        let mut txn = self.ctx.store.begin();
        txn.put_account(account.clone());
        txn.commit().unwrap();
        account
    }

    pub fn account(&self, id: u64) -> Account {
        self.ctx.store.get_account(id).unwrap().unwrap()
    }
}
