//! Background Runner
//!
//! Four jobs keep the ledger moving:
//! - reconcile: poll inbound transfers, auditing every few ticks first
//! - draw: the monthly draw, retried shortly while a payout is pending
//! - price: daily entry price refresh (audits with the outgoing price first)
//! - backup: daily ledger copy and pruning

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pot_core::calendar::{next_draw_time, next_time_of_day, previous_month_key, until};
use pot_core::CoreResult;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::TimeOfDay;
use crate::draw::DrawOutcome;
use crate::error::EngineResult;
use crate::reconciler::ReconcileReport;
use crate::scheduler::{Job, JobHandle};

use super::{BackupReport, Engine};

/// Delay until `target`, or `fallback` when it could not be computed
fn delay_until(now: DateTime<Utc>, target: CoreResult<DateTime<Utc>>, fallback: Duration) -> Duration {
    match target {
        Ok(target) => until(now, target),
        Err(e) => {
            warn!(error = %e, "Failed to compute next run");
            fallback
        }
    }
}

fn next_daily(now: DateTime<Utc>, at: TimeOfDay, fallback: Duration) -> Duration {
    delay_until(now, next_time_of_day(now, at.hour, at.minute), fallback)
}

/// Delay after a draw attempt
fn draw_delay(result: &EngineResult<DrawOutcome>, now: DateTime<Utc>, retry: Duration) -> Duration {
    match result {
        Ok(outcome) if !outcome.needs_retry() => delay_until(now, next_draw_time(now), retry),
        _ => retry,
    }
}

pub struct ReconcileJob {
    engine: Engine,
    ticks: AtomicU64,
}

impl ReconcileJob {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            ticks: AtomicU64::new(0),
        }
    }

    async fn tick(&self) -> EngineResult<ReconcileReport> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        if tick % self.engine.config().audit_every_ticks == 0 {
            self.engine.audit_once().await?;
        }
        self.engine.reconcile_once().await
    }
}

#[async_trait]
impl Job for ReconcileJob {
    type Output = EngineResult<ReconcileReport>;

    fn name(&self) -> &'static str {
        "reconcile"
    }

    fn first_delay(&self) -> Duration {
        Duration::ZERO
    }

    async fn run(&self) -> (Self::Output, Duration) {
        let result = self.tick().await;
        if let Err(e) = &result {
            error!(error = %e, "Reconcile tick failed");
        }
        (result, self.engine.config().reconcile_interval())
    }
}

pub struct DrawJob {
    engine: Engine,
}

impl DrawJob {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// A payout left pending by the previous process
    fn has_pending_payout(&self, now: DateTime<Utc>) -> bool {
        let store = &self.engine.context().store;
        match previous_month_key(now).map(|month| store.winner(&month)) {
            Ok(Ok(Some(record))) => !record.is_settled(),
            _ => false,
        }
    }
}

#[async_trait]
impl Job for DrawJob {
    type Output = EngineResult<DrawOutcome>;

    fn name(&self) -> &'static str {
        "draw"
    }

    fn first_delay(&self) -> Duration {
        let now = Utc::now();
        if self.has_pending_payout(now) {
            info!("Pending payout found, resuming draw");
            return Duration::ZERO;
        }
        delay_until(now, next_draw_time(now), self.engine.config().retry_delay())
    }

    async fn run(&self) -> (Self::Output, Duration) {
        let result = self.engine.run_draw().await;
        let delay = draw_delay(&result, Utc::now(), self.engine.config().retry_delay());
        (result, delay)
    }
}

pub struct PriceJob {
    engine: Engine,
}

impl PriceJob {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Job for PriceJob {
    type Output = EngineResult<u64>;

    fn name(&self) -> &'static str {
        "price"
    }

    fn first_delay(&self) -> Duration {
        if self.engine.price().is_none() {
            return Duration::ZERO;
        }
        let config = self.engine.config();
        next_daily(Utc::now(), config.price_refresh_at, config.retry_delay())
    }

    async fn run(&self) -> (Self::Output, Duration) {
        let config = self.engine.config();
        let result = self.engine.refresh_price().await;
        let delay = match &result {
            Ok(_) => next_daily(Utc::now(), config.price_refresh_at, config.retry_delay()),
            Err(e) => {
                error!(error = %e, "Price refresh failed");
                config.retry_delay()
            }
        };
        (result, delay)
    }
}

pub struct BackupJob {
    engine: Engine,
}

impl BackupJob {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Job for BackupJob {
    type Output = EngineResult<BackupReport>;

    fn name(&self) -> &'static str {
        "backup"
    }

    fn first_delay(&self) -> Duration {
        let config = self.engine.config();
        next_daily(Utc::now(), config.backup_at, config.retry_delay())
    }

    async fn run(&self) -> (Self::Output, Duration) {
        let result = self.engine.backup().await;
        if let Err(e) = &result {
            error!(error = %e, "Backup failed");
        }
        let config = self.engine.config();
        // a failed backup waits for the next day rather than competing with writers
        (result, next_daily(Utc::now(), config.backup_at, config.retry_delay()))
    }
}

/// Running background jobs
pub struct Runner {
    reconcile: JobHandle<ReconcileJob>,
    draw: JobHandle<DrawJob>,
    price: JobHandle<PriceJob>,
    backup: JobHandle<BackupJob>,
}

impl Runner {
    pub fn start(engine: Engine) -> Self {
        let runner = Self {
            reconcile: JobHandle::spawn(Arc::new(ReconcileJob::new(engine.clone()))),
            draw: JobHandle::spawn(Arc::new(DrawJob::new(engine.clone()))),
            price: JobHandle::spawn(Arc::new(PriceJob::new(engine.clone()))),
            backup: JobHandle::spawn(Arc::new(BackupJob::new(engine))),
        };
        info!("Background jobs started");
        runner
    }

    pub async fn reconcile_now(&self) -> EngineResult<ReconcileReport> {
        self.reconcile.run_now().await?
    }

    /// Run the draw now instead of waiting for the 1st
    pub async fn force_draw(&self) -> EngineResult<DrawOutcome> {
        self.draw.run_now().await?
    }

    pub async fn refresh_price(&self) -> EngineResult<u64> {
        self.price.run_now().await?
    }

    pub async fn backup_now(&self) -> EngineResult<BackupReport> {
        self.backup.run_now().await?
    }

    /// Whether every job is still scheduled
    pub fn is_running(&self) -> bool {
        !(self.reconcile.is_finished()
            || self.draw.is_finished()
            || self.price.is_finished()
            || self.backup.is_finished())
    }

    /// Stop all jobs; a job in the middle of a run finishes it first
    pub async fn stop(self) {
        self.reconcile.stop().await;
        self.draw.stop().await;
        self.price.stop().await;
        self.backup.stop().await;
        info!("Background jobs stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::testing::{Harness, PRICE};
    use chrono::TimeZone;

    fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 11, d, h, m, 0).unwrap()
    }

    #[test]
    fn test_draw_delay() {
        let retry = Duration::from_secs(60);
        let now = at(20, 0, 0);
        let settled = Ok(DrawOutcome::Settled {
            month: "2021-10".to_string(),
            failed: Vec::new(),
        });
        // 2021-12-01 00:05
        let expected = Duration::from_secs((11 * 24 * 60 + 5) * 60);
        assert_eq!(draw_delay(&settled, now, retry), expected);

        let pending = Ok(DrawOutcome::PendingRetry {
            month: "2021-10".to_string(),
            error: "rejected".to_string(),
        });
        assert_eq!(draw_delay(&pending, now, retry), retry);

        let failed = Err(EngineError::LockedBalance {
            balance: 5,
            unlocked: 3,
        });
        assert_eq!(draw_delay(&failed, now, retry), retry);
    }

    #[test]
    fn test_next_daily() {
        let retry = Duration::from_secs(60);
        let time = TimeOfDay::new(0, 40);
        assert_eq!(next_daily(at(2, 0, 30), time, retry), Duration::from_secs(600));
        assert_eq!(
            next_daily(at(2, 0, 50), time, retry),
            Duration::from_secs((24 * 60 - 10) * 60)
        );
    }

    #[tokio::test]
    async fn test_reconcile_job_audits_on_first_tick() {
        let h = Harness::new();
        h.open_account(1);
        h.wallet.push_incoming("a", 1, PRICE, 10);
        let job = ReconcileJob::new(Engine::from_context(h.ctx.clone()));

        let (result, delay) = job.run().await;
        assert_eq!(result.unwrap().new_entries, 1);
        assert_eq!(delay, h.ctx.config.reconcile_interval());
        assert!(h.ctx.store.missed_height_check().unwrap().is_some());

        // development audits every second tick
        let (result, _) = job.run().await;
        assert_eq!(result.unwrap().new_entries, 0);
        assert_eq!(job.ticks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_runner_triggers() {
        let h = Harness::new();
        h.open_account(1);
        let runner = Runner::start(Engine::from_context(h.ctx.clone()));
        assert!(runner.is_running());

        h.wallet.push_incoming("a", 1, 2 * PRICE, 10);
        let report = runner.reconcile_now().await.unwrap();
        // the first scheduled tick may have credited already
        assert_eq!(h.account(1).entries, 2);
        assert!(report.new_entries <= 2);

        assert_eq!(runner.refresh_price().await.unwrap(), PRICE);
        assert!(runner.backup_now().await.unwrap().path.is_some());

        runner.stop().await;
    }
}
