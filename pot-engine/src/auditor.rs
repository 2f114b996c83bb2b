//! Missed-Transfer Auditor
//!
//! Re-reads inbound transfers below the reconcile watermark and credits
//! anything the reconciler never recorded. Runs hourly and before every
//! draw.
//!
//! The first audit on a ledger (no `missed_height_check` yet) is a
//! bootstrap pass: it compares the entries an account should hold, given
//! every transfer it ever received, with the entries it holds, and credits
//! the shortfall. Later passes are routine: they add newly found transfer
//! amounts to the account's remainder. Both passes skip processed ids and
//! record new ones in the same commit that creates the entries.

use chrono::{DateTime, Utc};
use pot_core::{entries_from_amount, AccountId};
use pot_rpc::GetTransfersRequest;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::context::EngineContext;
use crate::credit::credit_accounts;
use crate::error::EngineResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditMode {
    /// First audit: lifetime totals against recorded entries
    Bootstrap,
    /// Remainder plus newly found amounts
    Routine,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub mode: AuditMode,
    pub fetched: usize,
    pub credited: BTreeMap<AccountId, u64>,
    pub new_entries: u64,
    /// Audit checkpoint after the pass
    pub checked_height: u64,
}

pub struct Auditor {
    ctx: Arc<EngineContext>,
}

impl Auditor {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Run one audit pass
    pub async fn audit_once(&self, now: DateTime<Utc>) -> EngineResult<AuditReport> {
        let ctx = &self.ctx;
        let checkpoint = ctx.store.missed_height_check()?;
        let mode = match checkpoint {
            None => AuditMode::Bootstrap,
            Some(_) => AuditMode::Routine,
        };
        let from = checkpoint.unwrap_or(0);
        let to = ctx.store.last_height()?;

        let transfers = if to > from {
            ctx.wallet
                .get_transfers(&GetTransfersRequest::incoming_between(from, to))
                .await?
                .incoming
        } else {
            Vec::new()
        };
        let price = if transfers.is_empty() {
            0
        } else {
            ctx.entry_price(now).await?
        };

        let ledger = ctx.ledger_lock.lock().await;
        let mut txn = ctx.store.begin();

        let indices: BTreeSet<u64> = transfers.iter().map(|t| t.subaddr_index.minor).collect();
        let mut accounts = Vec::new();
        for index in indices {
            if let Some(account) = ctx.store.account_by_address_index(index)? {
                if account.active {
                    accounts.push(account);
                }
            }
        }

        // totals keyed by sub-address index
        let mut totals: BTreeMap<u64, u64> = BTreeMap::new();
        if mode == AuditMode::Routine {
            for account in accounts.iter().filter(|a| a.amount > 0) {
                totals.insert(account.address_index, account.amount);
            }
        }

        let mut checked_height = from;
        for transfer in &transfers {
            checked_height = checked_height.max(transfer.height);
            if ctx.store.is_processed(&transfer.txid)? {
                continue;
            }
            let total = totals.entry(transfer.subaddr_index.minor).or_default();
            *total = total.saturating_add(transfer.amount);
            txn.mark_processed(&transfer.txid);
        }

        let mut credited = BTreeMap::new();
        for account in &accounts {
            let Some(&total) = totals.get(&account.address_index) else {
                continue;
            };
            match mode {
                AuditMode::Bootstrap => {
                    let (expected, left) = entries_from_amount(total, price);
                    if account.entries < expected {
                        credited.insert(account.id, (expected - account.entries) * price + left);
                    }
                }
                AuditMode::Routine => {
                    if total > 0 && account.amount < total {
                        credited.insert(account.id, total);
                    }
                }
            }
        }

        let new_entries = if credited.is_empty() {
            0
        } else {
            credit_accounts(&mut txn, &credited, price)?
        };
        txn.set_missed_height_check(checked_height);
        txn.commit()?;
        drop(ledger);

        if credited.is_empty() {
            debug!(?mode, checked_height, fetched = transfers.len(), "Audit found nothing missed");
        } else {
            ctx.notifier.credited(credited.keys().copied());
            info!(?mode, checked_height, accounts = credited.len(), new_entries, "Audit credited missed transfers");
        }

        Ok(AuditReport {
            mode,
            fetched: transfers.len(),
            credited,
            new_entries,
            checked_height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::Reconciler;
    use crate::testing::{at, Harness, PRICE};
    use pot_core::Account;

    #[tokio::test]
    async fn test_bootstrap_credits_shortfall() {
        let h = Harness::new();
        h.open_account(1);
        h.wallet.push_incoming("a", 1, 2 * PRICE, 10);
        h.wallet.push_incoming("b", 1, PRICE + 5, 20);

        // ledger knows the watermark and one entry, but no processed ids
        let mut txn = h.ctx.store.begin();
        let mut account: Account = h.account(1);
        account.entries = 1;
        txn.put_account(account);
        txn.set_last_height(20);
        txn.commit().unwrap();

        let report = Auditor::new(h.ctx.clone()).audit_once(at(2021, 11, 20)).await.unwrap();

        assert_eq!(report.mode, AuditMode::Bootstrap);
        assert_eq!(report.new_entries, 2);
        assert_eq!(report.checked_height, 20);
        assert_eq!((h.account(1).entries, h.account(1).amount), (3, 5));
        assert_eq!(h.ctx.store.missed_height_check().unwrap(), Some(20));
        assert!(h.ctx.store.is_processed("a").unwrap());
        // watermark untouched
        assert_eq!(h.ctx.store.last_height().unwrap(), 20);
    }

    #[tokio::test]
    async fn test_routine_credits_missed_delta() {
        let h = Harness::new();
        h.open_account(1);
        let reconciler = Reconciler::new(h.ctx.clone());
        let auditor = Auditor::new(h.ctx.clone());

        h.wallet.push_incoming("a", 1, PRICE + 4, 10);
        reconciler.reconcile_once(at(2021, 11, 20)).await.unwrap();
        auditor.audit_once(at(2021, 11, 20)).await.unwrap();

        // a transfer the wallet reports late, below the watermark
        h.wallet.push_incoming("b", 1, PRICE - 4, 5);
        h.wallet.push_incoming("c", 1, 1, 12);
        reconciler.reconcile_once(at(2021, 11, 20)).await.unwrap();
        assert!(!h.ctx.store.is_processed("b").unwrap());

        let mut txn = h.ctx.store.begin();
        txn.set_missed_height_check(4);
        txn.commit().unwrap();

        let report = auditor.audit_once(at(2021, 11, 20)).await.unwrap();
        assert_eq!(report.mode, AuditMode::Routine);
        assert_eq!(report.new_entries, 1);
        assert_eq!((h.account(1).entries, h.account(1).amount), (2, 1));
        assert!(h.ctx.store.is_processed("b").unwrap());
    }

    #[tokio::test]
    async fn test_audit_is_idempotent() {
        let h = Harness::new();
        h.open_account(1);
        h.open_account(2);
        h.wallet.push_incoming("a", 1, 3 * PRICE + 1, 10);
        h.wallet.push_incoming("b", 2, PRICE / 3, 11);
        Reconciler::new(h.ctx.clone())
            .reconcile_once(at(2021, 11, 20))
            .await
            .unwrap();
        let before = (h.account(1), h.account(2), h.ctx.store.entry_id().unwrap());

        let auditor = Auditor::new(h.ctx.clone());
        for _ in 0..2 {
            let report = auditor.audit_once(at(2021, 11, 20)).await.unwrap();
            assert_eq!(report.new_entries, 0);
            assert!(report.credited.is_empty());
        }
        let after = (h.account(1), h.account(2), h.ctx.store.entry_id().unwrap());
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_empty_ledger_moves_to_routine() {
        let h = Harness::new();
        let auditor = Auditor::new(h.ctx.clone());
        let report = auditor.audit_once(at(2021, 11, 20)).await.unwrap();
        assert_eq!(report.mode, AuditMode::Bootstrap);
        assert_eq!(h.ctx.store.missed_height_check().unwrap(), Some(0));

        let report = auditor.audit_once(at(2021, 11, 20)).await.unwrap();
        assert_eq!(report.mode, AuditMode::Routine);
    }
}
