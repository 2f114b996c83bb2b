//! Engine Service
//!
//! [`Engine`] wires the ledger, the RPC backends and the price source into
//! one context and exposes every operator operation. [`Engine::start`]
//! launches the background jobs and returns a [`Runner`] to trigger or stop
//! them.

mod runner;

pub use runner::{BackupJob, DrawJob, PriceJob, ReconcileJob, Runner};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use pot_rpc::{DaemonRpc, WalletRpc};
use pot_store::{prune_backups, LedgerStore};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::info;

use crate::accounts::AccountService;
use crate::alerts::AlertSink;
use crate::auditor::{AuditReport, Auditor};
use crate::config::EngineConfig;
use crate::context::EngineContext;
use crate::draw::{DrawEngine, DrawOutcome, DrawState};
use crate::error::EngineResult;
use crate::notify::LedgerEvent;
use crate::price::PriceSource;
use crate::reconciler::{ReconcileReport, Reconciler};

/// Outcome of a backup run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupReport {
    /// New backup directory, `None` if one already existed for this instant
    pub path: Option<PathBuf>,
    /// Expired backups removed
    pub pruned: usize,
}

/// The pot engine
#[derive(Clone)]
pub struct Engine {
    ctx: Arc<EngineContext>,
}

impl Engine {
    /// Validate `config` and wire the components
    pub fn new(
        config: EngineConfig,
        store: LedgerStore,
        wallet: Arc<dyn WalletRpc>,
        daemon: Arc<dyn DaemonRpc>,
        prices: Arc<dyn PriceSource>,
        alerts: Arc<dyn AlertSink>,
    ) -> EngineResult<Self> {
        config.validate()?;
        let ctx = EngineContext::new(config, store, wallet, daemon, prices, alerts)?;
        Ok(Self { ctx: Arc::new(ctx) })
    }

    #[cfg(test)]
    pub(crate) fn from_context(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    pub fn accounts(&self) -> AccountService {
        AccountService::new(self.ctx.clone())
    }

    /// Ledger change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.ctx.notifier.subscribe()
    }

    pub fn draw_state(&self) -> watch::Receiver<DrawState> {
        self.ctx.draw_state.subscribe()
    }

    /// Current entry price, `None` before the first refresh
    pub fn price(&self) -> Option<u64> {
        self.ctx.prices.current()
    }

    pub async fn reconcile_once(&self) -> EngineResult<ReconcileReport> {
        Reconciler::new(self.ctx.clone()).reconcile_once(Utc::now()).await
    }

    pub async fn audit_once(&self) -> EngineResult<AuditReport> {
        Auditor::new(self.ctx.clone()).audit_once(Utc::now()).await
    }

    /// Draw the previous month now
    pub async fn run_draw(&self) -> EngineResult<DrawOutcome> {
        self.run_draw_at(Utc::now()).await
    }

    pub async fn run_draw_at(&self, now: DateTime<Utc>) -> EngineResult<DrawOutcome> {
        DrawEngine::new(self.ctx.clone()).run_draw(now).await
    }

    /// Drop the pending payout of `month`; `false` if none was pending
    pub async fn flush_payout(&self, month: &str) -> EngineResult<bool> {
        DrawEngine::new(self.ctx.clone()).flush_payout(month).await
    }

    /// Audit with the outgoing price, then stamp today's price
    pub async fn refresh_price(&self) -> EngineResult<u64> {
        self.refresh_price_at(Utc::now()).await
    }

    pub async fn refresh_price_at(&self, now: DateTime<Utc>) -> EngineResult<u64> {
        Auditor::new(self.ctx.clone()).audit_once(now).await?;
        self.ctx.prices.refresh(now.date_naive()).await
    }

    pub async fn backup(&self) -> EngineResult<BackupReport> {
        self.backup_at(Utc::now()).await
    }

    /// Copy the ledger and prune expired backups, with writers held off
    pub async fn backup_at(&self, now: DateTime<Utc>) -> EngineResult<BackupReport> {
        let _ledger = self.ctx.ledger_lock.lock().await;
        let store = self.ctx.store.clone();
        let dir = self.ctx.config.backups_dir();
        let retention = ChronoDuration::days(self.ctx.config.backup_retention_days);

        let report = tokio::task::spawn_blocking(move || -> EngineResult<BackupReport> {
            let path = store.backup_to(&dir, now)?;
            let pruned = prune_backups(&dir, now, retention)?;
            Ok(BackupReport { path, pruned })
        })
        .await??;

        info!(path = ?report.path, pruned = report.pruned, "Backup finished");
        Ok(report)
    }

    /// Launch the background jobs
    pub fn start(&self) -> Runner {
        Runner::start(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::RecordingAlertSink;
    use crate::price::StaticPriceSource;
    use crate::testing::{maintenance_address, PRICE};
    use chrono::TimeZone;
    use pot_rpc::mock::{MockDaemon, MockWallet};

    fn engine(dir: &tempfile::TempDir, config: EngineConfig) -> EngineResult<Engine> {
        let store = LedgerStore::open(dir.path().join("ledger"))?;
        Engine::new(
            config,
            store,
            Arc::new(MockWallet::new()),
            Arc::new(MockDaemon::new()),
            Arc::new(StaticPriceSource(25_000_000_000)),
            Arc::new(RecordingAlertSink::new()),
        )
    }

    fn config(dir: &tempfile::TempDir) -> EngineConfig {
        EngineConfig::development()
            .with_data_path(dir.path())
            .with_maintenance_address(maintenance_address())
    }

    #[test]
    fn test_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let bad = EngineConfig::development().with_data_path(dir.path());
        assert!(engine(&dir, bad).is_err());
    }

    #[tokio::test]
    async fn test_refresh_price() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir, config(&dir)).unwrap();
        assert_eq!(engine.price(), None);

        let now = Utc.with_ymd_and_hms(2021, 11, 2, 0, 40, 0).unwrap();
        assert_eq!(engine.refresh_price_at(now).await.unwrap(), PRICE);
        assert_eq!(engine.price(), Some(PRICE));
        // the refresh audits first, which leaves a checkpoint behind
        assert!(engine.context().store.missed_height_check().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_backup_and_prune() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir, config(&dir)).unwrap();

        let old = Utc.with_ymd_and_hms(2021, 1, 1, 23, 30, 0).unwrap();
        let report = engine.backup_at(old).await.unwrap();
        assert!(report.path.is_some());
        assert_eq!(report.pruned, 0);

        // same instant is not copied twice
        assert_eq!(engine.backup_at(old).await.unwrap().path, None);

        let later = old + ChronoDuration::days(61);
        let report = engine.backup_at(later).await.unwrap();
        let path = report.path.unwrap();
        assert_eq!(report.pruned, 1);
        assert!(path.exists());
        assert!(LedgerStore::open(&path).is_ok());
    }
}
