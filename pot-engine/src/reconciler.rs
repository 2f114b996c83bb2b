//! Transfer Reconciler
//!
//! Polls the wallet for inbound transfers since the height watermark and
//! converts them into entries. A cycle either commits everything (entries,
//! remainders, processed ids, watermark) or nothing, so a failed cycle is
//! simply repeated on the next tick.

use chrono::{DateTime, Utc};
use pot_core::AccountId;
use pot_rpc::GetTransfersRequest;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::context::EngineContext;
use crate::credit::credit_accounts;
use crate::error::EngineResult;

/// Outcome of one reconcile cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Transfers returned by the wallet
    pub fetched: usize,
    /// Transfers already processed earlier
    pub skipped: usize,
    /// Transfers to sub-addresses without an active account
    pub unmatched: usize,
    /// Accumulated amount per credited account
    pub credited: BTreeMap<AccountId, u64>,
    pub new_entries: u64,
    /// Watermark after the cycle
    pub last_height: u64,
}

pub struct Reconciler {
    ctx: Arc<EngineContext>,
}

impl Reconciler {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Run one reconcile cycle
    pub async fn reconcile_once(&self, now: DateTime<Utc>) -> EngineResult<ReconcileReport> {
        let ctx = &self.ctx;
        let watermark = ctx.store.last_height()?;
        // min_height is exclusive; transfers at the watermark itself are refetched
        // and dropped by the processed set
        let request = GetTransfersRequest::incoming_above(watermark.saturating_sub(1));
        let transfers = ctx.wallet.get_transfers(&request).await?.incoming;

        let mut report = ReconcileReport {
            fetched: transfers.len(),
            last_height: watermark,
            ..Default::default()
        };
        if transfers.is_empty() {
            debug!(watermark, "No inbound transfers");
            return Ok(report);
        }

        let mut fresh = false;
        for transfer in &transfers {
            if !ctx.store.is_processed(&transfer.txid)? {
                fresh = true;
                break;
            }
        }
        if !fresh {
            report.skipped = transfers.len();
            debug!(watermark, skipped = report.skipped, "All transfers already processed");
            return Ok(report);
        }

        let price = ctx.entry_price(now).await?;

        let ledger = ctx.ledger_lock.lock().await;
        let mut txn = ctx.store.begin();
        let mut height = txn.last_height()?;

        for transfer in &transfers {
            height = height.max(transfer.height);
            if ctx.store.is_processed(&transfer.txid)? {
                report.skipped += 1;
                continue;
            }
            let index = transfer.subaddr_index.minor;
            let account = match ctx.store.account_by_address_index(index)? {
                Some(account) if account.active => account,
                _ => {
                    warn!(txid = %transfer.txid, address_index = index, amount = transfer.amount, "Transfer to unknown sub-address");
                    report.unmatched += 1;
                    continue;
                }
            };
            let amount = report.credited.entry(account.id).or_insert(account.amount);
            *amount = amount.saturating_add(transfer.amount);
            txn.mark_processed(&transfer.txid);
        }

        report.new_entries = if report.credited.is_empty() {
            0
        } else {
            credit_accounts(&mut txn, &report.credited, price)?
        };
        if height > txn.last_height()? {
            txn.set_last_height(height);
        }
        report.last_height = height;
        txn.commit()?;
        drop(ledger);

        if !report.credited.is_empty() {
            ctx.notifier.credited(report.credited.keys().copied());
            info!(
                accounts = report.credited.len(),
                new_entries = report.new_entries,
                last_height = height,
                "Reconciled inbound transfers"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LedgerEvent;
    use crate::testing::{at, Harness, PRICE};

    #[tokio::test]
    async fn test_credits_entries_and_remainder() {
        let h = Harness::new();
        h.open_account(1);
        h.open_account(2);
        h.wallet.push_incoming("a", 1, 2 * PRICE + 7, 10);
        h.wallet.push_incoming("b", 2, PRICE - 1, 12);
        let mut events = h.ctx.notifier.subscribe();

        let report = Reconciler::new(h.ctx.clone())
            .reconcile_once(at(2021, 11, 20))
            .await
            .unwrap();

        assert_eq!(report.fetched, 2);
        assert_eq!(report.new_entries, 2);
        assert_eq!(report.last_height, 12);
        assert_eq!((h.account(1).entries, h.account(1).amount), (2, 7));
        assert_eq!((h.account(2).entries, h.account(2).amount), (0, PRICE - 1));
        assert_eq!(h.ctx.store.last_height().unwrap(), 12);
        assert_eq!(h.ctx.store.entry_id().unwrap(), 2);
        assert!(h.ctx.store.is_processed("a").unwrap());

        // price refreshed on demand
        assert!(matches!(events.recv().await.unwrap(), LedgerEvent::PriceChanged { .. }));
        assert_eq!(events.recv().await.unwrap(), LedgerEvent::Credited { account_id: 1 });
        assert_eq!(events.recv().await.unwrap(), LedgerEvent::Credited { account_id: 2 });
        assert_eq!(events.recv().await.unwrap(), LedgerEvent::InfoChanged);
    }

    #[tokio::test]
    async fn test_processed_transfers_are_noop() {
        let h = Harness::new();
        h.open_account(1);
        h.wallet.push_incoming("a", 1, PRICE, 10);
        let reconciler = Reconciler::new(h.ctx.clone());

        reconciler.reconcile_once(at(2021, 11, 20)).await.unwrap();
        let report = reconciler.reconcile_once(at(2021, 11, 20)).await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.new_entries, 0);
        assert_eq!(h.account(1).entries, 1);
        assert_eq!(h.ctx.store.entry_id().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remainders_accumulate_across_cycles() {
        let h = Harness::new();
        h.open_account(1);
        let reconciler = Reconciler::new(h.ctx.clone());

        h.wallet.push_incoming("a", 1, PRICE / 2, 10);
        reconciler.reconcile_once(at(2021, 11, 20)).await.unwrap();
        assert_eq!((h.account(1).entries, h.account(1).amount), (0, PRICE / 2));

        h.wallet.push_incoming("b", 1, PRICE / 2 + 3, 11);
        reconciler.reconcile_once(at(2021, 11, 20)).await.unwrap();
        assert_eq!((h.account(1).entries, h.account(1).amount), (1, 3));
    }

    #[tokio::test]
    async fn test_unknown_sub_address_skipped() {
        let h = Harness::new();
        h.open_account(1);
        h.wallet.push_incoming("x", 42, PRICE, 10);
        h.wallet.push_incoming("a", 1, PRICE, 11);

        let report = Reconciler::new(h.ctx.clone())
            .reconcile_once(at(2021, 11, 20))
            .await
            .unwrap();

        assert_eq!(report.unmatched, 1);
        assert_eq!(report.new_entries, 1);
        assert!(!h.ctx.store.is_processed("x").unwrap());
        assert_eq!(h.ctx.store.last_height().unwrap(), 11);
    }

    #[tokio::test]
    async fn test_same_txid_multiple_outputs() {
        let h = Harness::new();
        h.open_account(1);
        h.open_account(2);
        h.wallet.push_incoming("multi", 1, PRICE, 10);
        h.wallet.push_incoming("multi", 2, PRICE, 10);

        let report = Reconciler::new(h.ctx.clone())
            .reconcile_once(at(2021, 11, 20))
            .await
            .unwrap();

        assert_eq!(report.new_entries, 2);
        assert_eq!(h.ctx.store.processed_count(), 1);
    }

    #[tokio::test]
    async fn test_wallet_failure_changes_nothing() {
        let h = Harness::new();
        h.open_account(1);
        h.wallet.push_incoming("a", 1, PRICE, 10);
        h.wallet.set_offline(true);

        let reconciler = Reconciler::new(h.ctx.clone());
        assert!(reconciler.reconcile_once(at(2021, 11, 20)).await.is_err());
        assert_eq!(h.ctx.store.last_height().unwrap(), 0);
        assert_eq!(h.account(1).entries, 0);

        h.wallet.set_offline(false);
        let report = reconciler.reconcile_once(at(2021, 11, 20)).await.unwrap();
        assert_eq!(report.new_entries, 1);
    }
}
