//! Account Service
//!
//! Participant-facing lookups: binding a paying address to a slot, alias
//! and referrer bookkeeping, entry listings and published winners.
//!
//! Slots are recycled: an address without an active slot takes the
//! inactive slot with the lowest sub-address index. A new sub-address is
//! only requested from the wallet when no inactive slot is left; it is
//! stored as a spare slot first and then assigned like any other.

use pot_core::{Account, AccountId, Entry, WinnerInfo};
use pot_rpc::{CreateAddressRequest, GetAddressRequest, MakeUriRequest, ValidateAddressRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult};

/// Entries per listing page
pub const ENTRIES_PER_PAGE: usize = 100;

const MAX_ASSIGN_ATTEMPTS: usize = 3;

/// Winner of one month as shown publicly (addresses masked)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedWinner {
    pub date: String,
    #[serde(flatten)]
    pub info: WinnerInfo,
}

pub struct AccountService {
    ctx: Arc<EngineContext>,
}

impl AccountService {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Slot for `user_address`, created or recycled as needed.
    ///
    /// `user_name` is attached when the slot has none; it must not be held by
    /// another account. `referrer` names the referring account's alias and is
    /// only recorded once.
    pub async fn get_or_create(
        &self,
        user_address: &str,
        user_name: Option<&str>,
        referrer: Option<&str>,
    ) -> EngineResult<Account> {
        for attempt in 1..=MAX_ASSIGN_ATTEMPTS {
            {
                let _ledger = self.ctx.ledger_lock.lock().await;
                if let Some(account) = self.assign(user_address, user_name, referrer)? {
                    return Ok(account);
                }
            }

            let issued = self
                .ctx
                .wallet
                .create_address(&CreateAddressRequest::default())
                .await?;

            let _ledger = self.ctx.ledger_lock.lock().await;
            let id = self.ctx.store.next_account_id()?;
            let mut txn = self.ctx.store.begin();
            txn.put_account(Account::new(id, issued.address_index, issued.address));
            txn.commit()?;
            debug!(account_id = id, address_index = issued.address_index, attempt, "Issued spare slot");
        }
        Err(EngineError::AssignmentConflict(user_address.to_string()))
    }

    /// [`get_or_create`](Self::get_or_create) for an address the wallet accepts
    pub async fn register(
        &self,
        user_address: &str,
        user_name: Option<&str>,
        referrer: Option<&str>,
    ) -> EngineResult<Account> {
        if !self.validate_address(user_address).await? {
            return Err(EngineError::InvalidAddress(user_address.to_string()));
        }
        self.get_or_create(user_address, user_name, referrer).await
    }

    /// Bind `user_address` to a slot; `None` when no slot is free.
    /// Caller holds the ledger lock.
    fn assign(
        &self,
        user_address: &str,
        user_name: Option<&str>,
        referrer: Option<&str>,
    ) -> EngineResult<Option<Account>> {
        let store = &self.ctx.store;
        let found = match store.active_account_by_user_address(user_address)? {
            Some(account) => Some(account),
            None => store.first_inactive_account()?,
        };

        let name_taken = |account: Option<&Account>| -> EngineResult<()> {
            if let Some(name) = user_name {
                if account.map_or(true, |a| a.user_name.is_none())
                    && store.account_id_by_user_name(name)?.is_some()
                {
                    return Err(EngineError::DuplicateUser(name.to_string()));
                }
            }
            Ok(())
        };
        name_taken(found.as_ref())?;
        let Some(mut account) = found else {
            return Ok(None);
        };

        let mut changed = false;
        if let (Some(referrer), false) = (referrer, account.has_referrer()) {
            if let Some(ref_id) = store.account_id_by_user_name(referrer)? {
                if ref_id != account.id {
                    account.ref_id = ref_id;
                    changed = true;
                }
            }
        }

        if account.active && account.user_address.as_deref() == Some(user_address) {
            if let (Some(name), None) = (user_name, &account.user_name) {
                account.user_name = Some(name.to_string());
                changed = true;
            }
            if changed {
                self.save(&account)?;
            }
            return Ok(Some(account));
        }

        account.user_name = user_name.map(str::to_string);
        account.user_address = Some(user_address.to_string());
        account.amount = 0;
        account.active = true;
        self.save(&account)?;
        info!(account_id = account.id, address_index = account.address_index, "Slot assigned");
        Ok(Some(account))
    }

    fn save(&self, account: &Account) -> EngineResult<()> {
        let mut txn = self.ctx.store.begin();
        txn.put_account(account.clone());
        txn.commit()?;
        Ok(())
    }

    pub fn account(&self, id: AccountId) -> EngineResult<Account> {
        self.ctx
            .store
            .get_account(id)?
            .ok_or(EngineError::UnknownAccount(id))
    }

    /// Active slot paying from `user_address`
    pub fn find(&self, user_address: &str) -> EngineResult<Option<Account>> {
        Ok(self.ctx.store.active_account_by_user_address(user_address)?)
    }

    /// Entries held this cycle by accounts `account_id` referred
    pub fn referrals(&self, account_id: AccountId) -> EngineResult<u64> {
        Ok(self.ctx.store.referral_entries(account_id)?)
    }

    /// Payment URI for the account's receiving address
    pub async fn payment_uri(&self, account_id: AccountId, amount: Option<u64>) -> EngineResult<String> {
        let account = self.account(account_id)?;
        let response = self
            .ctx
            .wallet
            .make_uri(&MakeUriRequest {
                address: account.address,
                amount,
                ..Default::default()
            })
            .await?;
        Ok(response.uri)
    }

    pub async fn validate_address(&self, address: &str) -> EngineResult<bool> {
        let response = self
            .ctx
            .wallet
            .validate_address(&ValidateAddressRequest {
                address: address.to_string(),
                ..Default::default()
            })
            .await?;
        Ok(response.valid)
    }

    /// Primary wallet address
    pub async fn wallet_address(&self) -> EngineResult<String> {
        let response = self.ctx.wallet.get_address(&GetAddressRequest::default()).await?;
        Ok(response.address)
    }

    /// One page (from 1) of this cycle's entries
    pub fn entries(&self, account_id: Option<AccountId>, page: usize) -> EngineResult<Vec<Entry>> {
        Ok(self
            .ctx
            .store
            .entries_page(account_id, page.max(1), ENTRIES_PER_PAGE)?)
    }

    pub fn total_entries(&self) -> EngineResult<u64> {
        Ok(self.ctx.store.entry_id()?)
    }

    /// Winner of `month` (`YYYY-MM`), or the latest one
    pub fn winner(&self, month: Option<&str>) -> EngineResult<Option<PublishedWinner>> {
        let record = match month {
            Some(month) => self.ctx.store.winner(month)?,
            None => self.ctx.store.latest_winner()?,
        };
        Ok(record.map(|r| PublishedWinner {
            date: r.date,
            info: r.info.masked(),
        }))
    }
}
