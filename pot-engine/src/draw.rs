//! Monthly Draw
//!
//! Closes the previous month's cycle:
//!
//! ```text
//! Idle -> Auditing -> BlockAnchoring -> Scoring -> Committing -> Paying -> Settled
//!                                                                  \-> PendingRetry
//! ```
//!
//! The commit step writes the winner record (public info plus the pending
//! payout) in the same transaction that resets the cycle. Paying only ever
//! works from the stored payout, so a retried draw resumes at Paying
//! instead of drawing again. A sent payout leaves a `<month>.sent` marker
//! next to its payout file so it is never sent twice.

use chrono::{DateTime, Utc};
use pot_core::calendar::previous_month_key;
use pot_core::distribution::pro_rata;
use pot_core::{score_entries, AccountId, EntryId, Shares, WinnerInfo, WinnerRecord};
use pot_rpc::{Destination, GetBalanceRequest, TransferSplitRequest};
use pot_store::StoreError;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::alerts::{Alert, AlertKind};
use crate::anchor::find_anchor_block;
use crate::auditor::Auditor;
use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult};
use crate::notify::LedgerEvent;

/// Draw progress, published on a watch channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawState {
    Idle,
    Auditing,
    BlockAnchoring,
    Scoring,
    Committing,
    Paying,
    Settled,
    /// Payout stored but not sent; the next trigger retries it
    PendingRetry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DrawOutcome {
    /// The month was drawn and paid before
    AlreadyProcessed { month: String },
    /// Nothing to draw
    EmptyCycle { month: String },
    /// Payout sent; `failed` lists destinations an operator must pay by hand
    Settled { month: String, failed: Vec<Destination> },
    /// Payout rejected and kept for the next attempt
    PendingRetry { month: String, error: String },
}

impl DrawOutcome {
    pub fn month(&self) -> &str {
        match self {
            DrawOutcome::AlreadyProcessed { month }
            | DrawOutcome::EmptyCycle { month }
            | DrawOutcome::Settled { month, .. }
            | DrawOutcome::PendingRetry { month, .. } => month,
        }
    }

    /// Whether another attempt is due soon rather than next month
    pub fn needs_retry(&self) -> bool {
        matches!(self, DrawOutcome::PendingRetry { .. })
    }
}

pub struct DrawEngine {
    ctx: Arc<EngineContext>,
}

impl DrawEngine {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    pub fn state(&self) -> DrawState {
        *self.ctx.draw_state.borrow()
    }

    fn set_state(&self, state: DrawState) {
        self.ctx.draw_state.send_replace(state);
    }

    /// Draw (or finish paying) the month before `now`
    pub async fn run_draw(&self, now: DateTime<Utc>) -> EngineResult<DrawOutcome> {
        let _draw = self.ctx.draw_lock.lock().await;
        let result = self.draw(now).await;

        let state = match &result {
            Ok(DrawOutcome::Settled { .. }) => DrawState::Settled,
            Ok(DrawOutcome::PendingRetry { .. }) | Err(EngineError::LockedBalance { .. }) => {
                DrawState::PendingRetry
            }
            _ => DrawState::Idle,
        };
        self.set_state(state);

        match &result {
            Ok(outcome) => info!(month = outcome.month(), ?outcome, "Draw finished"),
            Err(e) => error!(error = %e, "Draw failed"),
        }
        result
    }

    async fn draw(&self, now: DateTime<Utc>) -> EngineResult<DrawOutcome> {
        let ctx = &self.ctx;
        let month = previous_month_key(now)?;

        self.set_state(DrawState::Auditing);
        Auditor::new(ctx.clone()).audit_once(now).await?;

        if let Some(record) = ctx.store.winner(&month)? {
            debug!(%month, settled = record.is_settled(), "Winner record exists");
            return self.settle(record).await;
        }

        let total = ctx.store.entry_id()?;
        if total == 0 {
            ctx.alert(Alert::new(
                AlertKind::EmptyCycle,
                format!("draw {}", month),
                "cycle closed without entries",
            ));
            return Ok(DrawOutcome::EmptyCycle { month });
        }

        self.set_state(DrawState::BlockAnchoring);
        let anchor = find_anchor_block(ctx.daemon.as_ref(), now).await?;

        self.set_state(DrawState::Scoring);
        let sign_key = ctx.store.sign_key()?;
        let board = score_entries(total, &sign_key, &anchor.hash);
        info!(
            %month,
            block = %anchor.hash,
            height = anchor.height,
            entries = total,
            score = board.highest(),
            winners = ?board.winners(),
            "Scored entries"
        );

        let price = ctx.entry_price(now).await?;
        let balance = ctx.wallet.get_balance(&GetBalanceRequest::default()).await?;
        let shares = Shares::from_balance(balance.unlocked_balance);

        self.set_state(DrawState::Committing);
        let record = {
            let _ledger = ctx.ledger_lock.lock().await;
            self.commit_cycle(&month, total, &sign_key, &anchor.hash, board.winners(), shares, price)?
        };
        ctx.notifier.publish(LedgerEvent::InfoChanged);

        self.settle(record).await
    }

    /// Build the winner record and reset the cycle in one transaction.
    /// Caller holds the ledger lock; `total` is the entry count that was scored.
    #[allow(clippy::too_many_arguments)]
    fn commit_cycle(
        &self,
        month: &str,
        total: u64,
        sign_key: &str,
        block: &str,
        winners: &[EntryId],
        shares: Shares,
        price: u64,
    ) -> EngineResult<WinnerRecord> {
        let ctx = &self.ctx;
        let store = &ctx.store;
        let mut txn = store.begin();

        let current = txn.entry_id()?;
        if current != total {
            warn!(%month, scored = total, current, "Entries credited after scoring, draw postponed");
            return Err(EngineError::CycleChanged {
                month: month.to_string(),
                scored: total,
                current,
            });
        }

        let mut wins: BTreeMap<AccountId, Vec<EntryId>> = BTreeMap::new();
        for &id in winners {
            let entry = store
                .entry(id)?
                .ok_or_else(|| StoreError::corrupt(format!("entry {}", id), "missing from cycle"))?;
            wins.entry(entry.account_id).or_default().push(id);
        }

        let mut info = WinnerInfo {
            sign_key: sign_key.to_string(),
            block: block.to_string(),
            entries: total,
            amount: shares.winner,
            accounts: BTreeMap::new(),
        };
        let mut payouts: BTreeMap<String, u64> = BTreeMap::new();

        for (account_id, ids) in &wins {
            let account = store
                .get_account(*account_id)?
                .ok_or(EngineError::UnknownAccount(*account_id))?;
            let Some(address) = account.user_address else {
                warn!(account_id, "Winning account has no payout address");
                continue;
            };
            let amount = pro_rata(shares.winner, ids.len() as u64, winners.len() as u64);
            *payouts.entry(address.clone()).or_default() += amount;
            info.accounts.entry(address).or_default().extend(ids.iter().copied());
        }

        let accounts = store.accounts()?;
        let mut groups: BTreeMap<AccountId, u64> = BTreeMap::new();
        for account in accounts.iter().filter(|a| a.active && a.entries > 0 && a.has_referrer()) {
            *groups.entry(account.ref_id).or_default() += account.entries;
        }
        for (&referrer_id, &group_entries) in &groups {
            let award = pro_rata(shares.referrals, group_entries, total);
            if award == 0 {
                continue;
            }
            let mut referrer = match txn.account(referrer_id)? {
                Some(account) if account.active => account,
                _ => {
                    warn!(referrer_id, award, "Referrer is gone, award stays in the wallet");
                    continue;
                }
            };
            let payable = award >= price;
            match referrer.user_address.clone() {
                Some(address) if payable => {
                    *payouts.entry(address).or_default() += award;
                }
                _ => {
                    debug!(referrer_id, award, "Referral award credited to balance");
                    referrer.amount += award;
                    txn.put_account(referrer);
                }
            }
        }

        let mut destinations = vec![Destination {
            amount: shares.maintenance,
            address: ctx.config.maintenance_address.clone(),
        }];
        if let Some(fund) = &ctx.config.fund_address {
            destinations.push(Destination {
                amount: shares.fund,
                address: fund.clone(),
            });
        }
        destinations.extend(payouts.into_iter().map(|(address, amount)| Destination { amount, address }));
        destinations.retain(|d| d.amount > 0);

        let payout = &ctx.config.payout;
        let request = TransferSplitRequest {
            destinations,
            account_index: payout.account_index,
            priority: payout.priority,
            mixin: payout.mixin,
            ring_size: payout.ring_size,
            unlock_time: payout.unlock_time,
            new_algorithm: true,
            get_tx_keys: true,
        };
        let record = WinnerRecord {
            date: month.to_string(),
            info,
            transfer_body: Some(serde_json::to_string(&request)?),
        };

        let referrers: BTreeSet<AccountId> = groups.keys().copied().collect();
        let mut deactivated = 0;
        for account in accounts.iter().filter(|a| a.active) {
            let mut account = txn.account(account.id)?.unwrap_or_else(|| account.clone());
            if account.user_name.is_none() || (account.entries == 0 && !referrers.contains(&account.id)) {
                account.deactivate();
                deactivated += 1;
            } else {
                account.entries = 0;
            }
            txn.put_account(account);
        }
        txn.clear_entries();
        txn.set_entry_id(0);
        txn.set_sign_key(block);
        txn.put_winner(record.clone());
        txn.commit()?;

        info!(
            %month,
            winner_share = shares.winner,
            destinations = request.destinations.len(),
            total = request.total(),
            deactivated,
            "Cycle committed"
        );
        Ok(record)
    }

    /// Send the stored payout of a winner record
    async fn settle(&self, record: WinnerRecord) -> EngineResult<DrawOutcome> {
        let ctx = &self.ctx;
        let month = record.date;
        let Some(body) = record.transfer_body else {
            ctx.alert(Alert::new(
                AlertKind::AlreadyProcessed,
                format!("draw {}", month),
                "month already processed",
            ));
            return Ok(DrawOutcome::AlreadyProcessed { month });
        };

        self.set_state(DrawState::Paying);
        if let Some(txs) = self.sent_marker(&month).await? {
            warn!(%month, %txs, "Payout already sent, clearing pending body");
            self.clear_pending(&month).await?;
            return Ok(DrawOutcome::Settled {
                month,
                failed: Vec::new(),
            });
        }
        self.write_payout_file(&month, &body).await?;
        let request: TransferSplitRequest = serde_json::from_str(&body)?;

        let balance = ctx.wallet.get_balance(&GetBalanceRequest::default()).await?;
        if !balance.is_fully_unlocked() {
            warn!(%month, balance = balance.balance, unlocked = balance.unlocked_balance, "Balance locked, payout postponed");
            return Err(EngineError::LockedBalance {
                balance: balance.balance,
                unlocked: balance.unlocked_balance,
            });
        }

        match ctx.wallet.transfer_split(&request).await {
            Ok(response) => {
                info!(%month, txs = ?response.tx_hash_list, total = request.total(), "Payout sent");
                if let Err(e) = self.write_sent_marker(&month, &response.tx_hash_list).await {
                    error!(%month, error = %e, "Payout sent but sent marker not written");
                }
                if let Err(e) = self.clear_pending(&month).await {
                    error!(%month, error = %e, "Payout sent but pending body not cleared");
                    ctx.alert(Alert::new(
                        AlertKind::PayoutFailed,
                        format!("payout {}", month),
                        format!(
                            "payout sent ({}) but record not updated: {}",
                            response.tx_hash_list.join(", "),
                            e
                        ),
                    ));
                    return Err(e);
                }
                Ok(DrawOutcome::Settled {
                    month,
                    failed: Vec::new(),
                })
            }
            Err(e) if e.is_insufficient_decoys() => {
                warn!(%month, error = %e, "Split payout failed, sending destinations one by one");
                self.clear_pending(&month).await?;

                let mut failed = Vec::new();
                let mut report = Vec::new();
                for destination in &request.destinations {
                    if let Err(e) = ctx.wallet.transfer(&request.single(destination.clone())).await {
                        warn!(%month, address = %destination.address, amount = destination.amount, error = %e, "Single payout failed");
                        report.push(format!("{} {}: {}", destination.amount, destination.address, e));
                        failed.push(destination.clone());
                    }
                }
                if !failed.is_empty() {
                    ctx.alert(Alert::new(
                        AlertKind::PartialPayout,
                        format!("payout {}", month),
                        report.join("\n"),
                    ));
                }
                Ok(DrawOutcome::Settled { month, failed })
            }
            Err(e) => {
                ctx.alert(Alert::new(
                    AlertKind::PayoutFailed,
                    format!("payout {}", month),
                    format!("{}\n{}", e, body),
                ));
                Ok(DrawOutcome::PendingRetry {
                    month,
                    error: e.to_string(),
                })
            }
        }
    }

    async fn write_payout_file(&self, month: &str, body: &str) -> EngineResult<()> {
        let dir = self.ctx.config.transfers_dir();
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(format!("{}.json", month)), body).await?;
        Ok(())
    }

    fn sent_marker_path(&self, month: &str) -> std::path::PathBuf {
        self.ctx.config.transfers_dir().join(format!("{}.sent", month))
    }

    async fn write_sent_marker(&self, month: &str, txs: &[String]) -> EngineResult<()> {
        let dir = self.ctx.config.transfers_dir();
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(self.sent_marker_path(month), txs.join("\n")).await?;
        Ok(())
    }

    /// Transaction hashes of an already sent payout
    async fn sent_marker(&self, month: &str) -> EngineResult<Option<String>> {
        match tokio::fs::read_to_string(self.sent_marker_path(month)).await {
            Ok(txs) => Ok(Some(txs)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear_pending(&self, month: &str) -> EngineResult<bool> {
        let _ledger = self.ctx.ledger_lock.lock().await;
        Ok(self.ctx.store.clear_transfer_body(month)?)
    }

    /// Operator override: drop the pending payout of `month` after settling it by hand
    pub async fn flush_payout(&self, month: &str) -> EngineResult<bool> {
        let _draw = self.ctx.draw_lock.lock().await;
        let cleared = self.clear_pending(month).await?;
        if cleared {
            info!(%month, "Pending payout flushed");
        }
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertKind;
    use crate::reconciler::Reconciler;
    use crate::testing::{maintenance_address, Harness, PRICE};
    use chrono::TimeZone;
    use pot_core::{Entry, GENESIS_SIGN_KEY};

    const BLOCK: &str = "6666666666ec1464d3a02ead5e18644030007a0fc664c0a964d30408821a8bb0";
    const MONTH: &str = "2021-10";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 11, 20, 0, 0, 0).unwrap()
    }

    fn anchor_chain(h: &Harness) {
        h.daemon.push_header(2_483_350, 1_635_724_700, "before");
        h.daemon.push_header(2_483_351, 1_635_724_900, BLOCK);
        h.daemon.push_header(2_496_780, 1_637_336_695, "tip");
    }

    /// alice (1) holds entries 1-2, her referral (2) holds entry 3; entry 1 wins
    async fn cycle(h: &Harness) {
        let mut alice = h.open_account(1);
        alice.user_name = Some("alice".to_string());
        let mut referral = h.open_account(2);
        referral.ref_id = 1;
        let mut txn = h.ctx.store.begin();
        txn.put_account(alice);
        txn.put_account(referral);
        txn.commit().unwrap();

        h.wallet.push_incoming("a", 1, 2 * PRICE, 10);
        h.wallet.push_incoming("b", 2, PRICE, 11);
        Reconciler::new(h.ctx.clone()).reconcile_once(now()).await.unwrap();
        assert_eq!(h.ctx.store.entry_id().unwrap(), 3);
        anchor_chain(h);
    }

    /// Same cycle written straight to the ledger, with no price loaded
    fn seeded_cycle(h: &Harness) {
        let mut alice = h.open_account(1);
        alice.user_name = Some("alice".to_string());
        alice.entries = 2;
        let mut referral = h.open_account(2);
        referral.ref_id = 1;
        referral.entries = 1;
        let mut txn = h.ctx.store.begin();
        txn.put_account(alice);
        txn.put_account(referral);
        for (id, account_id) in [(1, 1), (2, 1), (3, 2)] {
            txn.insert_entry(Entry::signed(id, account_id, GENESIS_SIGN_KEY));
        }
        txn.set_entry_id(3);
        txn.commit().unwrap();
        anchor_chain(h);
    }

    fn dest(amount: u64, address: &str) -> Destination {
        Destination {
            amount,
            address: address.to_string(),
        }
    }

    #[tokio::test]
    async fn test_draw_settles_and_resets_cycle() {
        let h = Harness::new();
        cycle(&h).await;
        h.wallet.set_balance(5_000_000_000_000, 5_000_000_000_000);
        let draw = DrawEngine::new(h.ctx.clone());

        let outcome = draw.run_draw(now()).await.unwrap();
        assert_eq!(
            outcome,
            DrawOutcome::Settled {
                month: MONTH.to_string(),
                failed: vec![]
            }
        );
        assert_eq!(draw.state(), DrawState::Settled);

        let record = h.ctx.store.winner(MONTH).unwrap().unwrap();
        assert!(record.is_settled());
        assert_eq!(record.info.entries, 3);
        assert_eq!(record.info.amount, 2_800_000_000_000);
        assert_eq!(record.info.block, BLOCK);
        assert_eq!(record.info.sign_key, GENESIS_SIGN_KEY);
        assert_eq!(record.info.accounts.get("payer1"), Some(&vec![1]));

        let splits = h.wallet.split_requests();
        assert_eq!(splits.len(), 1);
        assert_eq!(
            splits[0].destinations,
            vec![
                dest(400_000_000_000, &maintenance_address()),
                // winner share plus referral award
                dest(3_000_000_000_000, "payer1"),
            ]
        );
        assert_eq!(splits[0].mixin, 8);
        assert_eq!(splits[0].unlock_time, 10);

        assert_eq!(h.ctx.store.entry_id().unwrap(), 0);
        assert_eq!(h.ctx.store.entry_rows(), 0);
        assert_eq!(h.ctx.store.sign_key().unwrap(), BLOCK);
        let alice = h.account(1);
        assert!(alice.active);
        assert_eq!(alice.entries, 0);
        let referral = h.account(2);
        assert!(!referral.active);
        assert_eq!(referral.user_address, None);

        let file = h.ctx.config.transfers_dir().join("2021-10.json");
        let body: TransferSplitRequest = serde_json::from_str(&std::fs::read_to_string(file).unwrap()).unwrap();
        assert_eq!(body, splits[0]);
        let sent = std::fs::read_to_string(h.ctx.config.transfers_dir().join("2021-10.sent")).unwrap();
        assert_eq!(sent, format!("{:064x}", 1));
    }

    #[tokio::test]
    async fn test_small_referral_award_credited() {
        let h = Harness::new();
        cycle(&h).await;
        h.wallet.set_balance(1_010_000_000_000, 1_010_000_000_000);

        DrawEngine::new(h.ctx.clone()).run_draw(now()).await.unwrap();

        let splits = h.wallet.split_requests();
        assert_eq!(
            splits[0].destinations,
            vec![
                dest(1_000_000_000, &maintenance_address()),
                dest(7_000_000_000, "payer1"),
            ]
        );
        assert_eq!(h.account(1).amount, 500_000_000);
    }

    #[tokio::test]
    async fn test_small_referral_award_credited_without_loaded_price() {
        let h = Harness::new();
        seeded_cycle(&h);
        assert_eq!(h.ctx.prices.current(), None);
        h.wallet.set_balance(1_010_000_000_000, 1_010_000_000_000);

        DrawEngine::new(h.ctx.clone()).run_draw(now()).await.unwrap();

        assert_eq!(h.ctx.prices.current(), Some(PRICE));
        let splits = h.wallet.split_requests();
        assert_eq!(
            splits[0].destinations,
            vec![
                dest(1_000_000_000, &maintenance_address()),
                dest(7_000_000_000, "payer1"),
            ]
        );
        assert_eq!(h.account(1).amount, 500_000_000);
    }

    #[tokio::test]
    async fn test_entries_credited_after_scoring_are_kept() {
        let h = Harness::new();
        cycle(&h).await;
        let draw = DrawEngine::new(h.ctx.clone());
        let board = score_entries(3, GENESIS_SIGN_KEY, BLOCK);
        let shares = Shares::from_balance(5_000_000_000_000);

        // a reconcile commits while the draw waits on the wallet
        h.wallet.push_incoming("late", 2, 3 * PRICE, 12);
        Reconciler::new(h.ctx.clone()).reconcile_once(now()).await.unwrap();
        assert_eq!(h.ctx.store.entry_id().unwrap(), 6);

        let err = {
            let _ledger = h.ctx.ledger_lock.lock().await;
            draw.commit_cycle(MONTH, 3, GENESIS_SIGN_KEY, BLOCK, board.winners(), shares, PRICE)
                .unwrap_err()
        };
        assert!(matches!(err, EngineError::CycleChanged { scored: 3, current: 6, .. }));
        assert!(err.is_transient());
        assert!(h.ctx.store.winner(MONTH).unwrap().is_none());
        assert_eq!(h.ctx.store.entry_id().unwrap(), 6);
        assert_eq!(h.ctx.store.entry_rows(), 6);
        assert_eq!(h.account(2).entries, 4);
        assert_eq!(h.ctx.store.sign_key().unwrap(), GENESIS_SIGN_KEY);

        // the retry scores the late entries as well
        h.wallet.set_balance(5_000_000_000_000, 5_000_000_000_000);
        let outcome = draw.run_draw(now()).await.unwrap();
        assert!(matches!(outcome, DrawOutcome::Settled { .. }));
        assert_eq!(h.ctx.store.winner(MONTH).unwrap().unwrap().info.entries, 6);
        assert_eq!(h.ctx.store.entry_rows(), 0);
    }

    #[tokio::test]
    async fn test_sent_payout_is_not_sent_again() {
        let h = Harness::new();
        cycle(&h).await;
        h.wallet.set_balance(5_000_000_000_000, 5_000_000_000_000);
        h.wallet.fail_split(-4, "not enough money");
        let draw = DrawEngine::new(h.ctx.clone());
        draw.run_draw(now()).await.unwrap();
        assert!(!h.ctx.store.winner(MONTH).unwrap().unwrap().is_settled());

        // sent by an earlier attempt that could not update the record
        let marker = h.ctx.config.transfers_dir().join("2021-10.sent");
        std::fs::write(&marker, "aa11").unwrap();
        h.wallet.clear_split_failure();

        let outcome = draw.run_draw(now()).await.unwrap();
        assert_eq!(
            outcome,
            DrawOutcome::Settled {
                month: MONTH.to_string(),
                failed: vec![]
            }
        );
        assert!(h.wallet.split_requests().is_empty());
        assert!(h.ctx.store.winner(MONTH).unwrap().unwrap().is_settled());
    }

    #[tokio::test]
    async fn test_fund_address_paid_when_configured() {
        let fund = format!("5{}", "f".repeat(94));
        let h = Harness::with_config(|c| c.with_fund_address(fund.clone()));
        cycle(&h).await;
        h.wallet.set_balance(5_000_000_000_000, 5_000_000_000_000);

        DrawEngine::new(h.ctx.clone()).run_draw(now()).await.unwrap();

        let splits = h.wallet.split_requests();
        assert_eq!(splits[0].destinations[1], dest(200_000_000_000, &fund));
    }

    #[tokio::test]
    async fn test_rerun_is_already_processed() {
        let h = Harness::new();
        cycle(&h).await;
        h.wallet.set_balance(5_000_000_000_000, 5_000_000_000_000);
        let draw = DrawEngine::new(h.ctx.clone());
        draw.run_draw(now()).await.unwrap();

        let outcome = draw.run_draw(now()).await.unwrap();
        assert_eq!(
            outcome,
            DrawOutcome::AlreadyProcessed {
                month: MONTH.to_string()
            }
        );
        assert_eq!(h.wallet.split_requests().len(), 1);
        assert_eq!(h.alerts.kinds(), vec![AlertKind::AlreadyProcessed]);
        assert_eq!(draw.state(), DrawState::Idle);
    }

    #[tokio::test]
    async fn test_empty_cycle() {
        let h = Harness::new();
        anchor_chain(&h);

        let outcome = DrawEngine::new(h.ctx.clone()).run_draw(now()).await.unwrap();
        assert_eq!(
            outcome,
            DrawOutcome::EmptyCycle {
                month: MONTH.to_string()
            }
        );
        assert!(h.ctx.store.winner(MONTH).unwrap().is_none());
        assert_eq!(h.ctx.store.sign_key().unwrap(), GENESIS_SIGN_KEY);
        assert!(h.daemon.range_calls().is_empty());
        assert_eq!(h.alerts.kinds(), vec![AlertKind::EmptyCycle]);
    }

    #[tokio::test]
    async fn test_rejected_payout_resumes_from_record() {
        let h = Harness::new();
        cycle(&h).await;
        h.wallet.set_balance(5_000_000_000_000, 5_000_000_000_000);
        h.wallet.fail_split(-4, "not enough money");
        let draw = DrawEngine::new(h.ctx.clone());

        let outcome = draw.run_draw(now()).await.unwrap();
        assert!(outcome.needs_retry());
        assert_eq!(draw.state(), DrawState::PendingRetry);
        let record = h.ctx.store.winner(MONTH).unwrap().unwrap();
        assert!(!record.is_settled());
        assert_eq!(h.alerts.kinds(), vec![AlertKind::PayoutFailed]);
        // the cycle was closed regardless
        assert_eq!(h.ctx.store.entry_rows(), 0);

        h.wallet.clear_split_failure();
        let outcome = draw.run_draw(now()).await.unwrap();
        assert!(matches!(outcome, DrawOutcome::Settled { .. }));
        let splits = h.wallet.split_requests();
        assert_eq!(splits.len(), 1);
        assert_eq!(Some(serde_json::to_string(&splits[0]).unwrap()), record.transfer_body);
        assert!(h.ctx.store.winner(MONTH).unwrap().unwrap().is_settled());
    }

    #[tokio::test]
    async fn test_insufficient_decoys_pays_one_by_one() {
        let h = Harness::new();
        cycle(&h).await;
        h.wallet.set_balance(5_000_000_000_000, 5_000_000_000_000);
        h.wallet.fail_split(-17, "failed to get random outs");
        h.wallet.fail_transfers_to(&maintenance_address());

        let outcome = DrawEngine::new(h.ctx.clone()).run_draw(now()).await.unwrap();

        assert_eq!(
            outcome,
            DrawOutcome::Settled {
                month: MONTH.to_string(),
                failed: vec![dest(400_000_000_000, &maintenance_address())],
            }
        );
        let transfers = h.wallet.transfer_requests();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].destinations, vec![dest(3_000_000_000_000, "payer1")]);
        assert!(h.ctx.store.winner(MONTH).unwrap().unwrap().is_settled());

        let alerts = h.alerts.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::PartialPayout);
        assert!(alerts[0].body.contains(&maintenance_address()));
    }

    #[tokio::test]
    async fn test_locked_balance_postpones_payout() {
        let h = Harness::new();
        cycle(&h).await;
        h.wallet.set_balance(5_000_000_000_000, 4_000_000_000_000);
        let draw = DrawEngine::new(h.ctx.clone());

        let err = draw.run_draw(now()).await.unwrap_err();
        assert!(matches!(err, EngineError::LockedBalance { .. }));
        assert_eq!(draw.state(), DrawState::PendingRetry);
        assert!(h.wallet.split_requests().is_empty());
        assert!(!h.ctx.store.winner(MONTH).unwrap().unwrap().is_settled());
    }

    #[tokio::test]
    async fn test_flush_payout() {
        let h = Harness::new();
        cycle(&h).await;
        h.wallet.set_balance(5_000_000_000_000, 5_000_000_000_000);
        h.wallet.fail_split(-4, "not enough money");
        let draw = DrawEngine::new(h.ctx.clone());
        draw.run_draw(now()).await.unwrap();

        assert!(draw.flush_payout(MONTH).await.unwrap());
        assert!(!draw.flush_payout(MONTH).await.unwrap());
        assert!(!draw.flush_payout("2020-01").await.unwrap());

        h.wallet.clear_split_failure();
        let outcome = draw.run_draw(now()).await.unwrap();
        assert!(matches!(outcome, DrawOutcome::AlreadyProcessed { .. }));
        assert!(h.wallet.split_requests().is_empty());
    }

    #[tokio::test]
    async fn test_daemon_failure_keeps_cycle() {
        let h = Harness::new();
        cycle(&h).await;
        h.daemon.set_offline(true);

        let err = DrawEngine::new(h.ctx.clone()).run_draw(now()).await.unwrap_err();
        assert!(matches!(err, EngineError::Rpc(_)));
        assert_eq!(h.ctx.store.entry_id().unwrap(), 3);
        assert!(h.ctx.store.winner(MONTH).unwrap().is_none());
    }
}
