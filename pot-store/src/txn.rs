//! Staged Ledger Transactions
//!
//! A [`LedgerTxn`] buffers typed changes and reads its own writes. Nothing
//! reaches the trees until [`LedgerTxn::commit`], which applies one batch per
//! tree inside a single sled transaction: either every change becomes
//! visible or none does. Dropping a transaction discards it.
//!
//! Staging reads the committed state directly, so callers must serialize
//! writers (the engine holds its ledger lock from `begin` to `commit`).

use pot_core::{Account, AccountId, Entry, EntryId, WinnerRecord, GENESIS_SIGN_KEY};
use sled::transaction::{ConflictableTransactionResult, Transactional};
use sled::Batch;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::error::StoreResult;
use crate::store::{id_key, meta, parse_u64, serialize, LedgerStore};

/// Pending set of ledger changes
pub struct LedgerTxn<'a> {
    store: &'a LedgerStore,
    accounts: BTreeMap<AccountId, Account>,
    entries: BTreeMap<EntryId, Entry>,
    entries_cleared: bool,
    winners: BTreeMap<String, WinnerRecord>,
    processed: BTreeSet<String>,
    metadata: BTreeMap<String, String>,
}

impl<'a> LedgerTxn<'a> {
    pub(crate) fn new(store: &'a LedgerStore) -> Self {
        Self {
            store,
            accounts: BTreeMap::new(),
            entries: BTreeMap::new(),
            entries_cleared: false,
            winners: BTreeMap::new(),
            processed: BTreeSet::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Nothing staged
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
            && self.entries.is_empty()
            && !self.entries_cleared
            && self.winners.is_empty()
            && self.processed.is_empty()
            && self.metadata.is_empty()
    }

    pub fn account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        match self.accounts.get(&id) {
            Some(account) => Ok(Some(account.clone())),
            None => self.store.get_account(id),
        }
    }

    pub fn put_account(&mut self, account: Account) {
        self.accounts.insert(account.id, account);
    }

    pub fn insert_entry(&mut self, entry: Entry) {
        self.entries.insert(entry.id, entry);
    }

    /// Delete every entry, committed or staged
    pub fn clear_entries(&mut self) {
        self.entries.clear();
        self.entries_cleared = true;
    }

    pub fn put_winner(&mut self, record: WinnerRecord) {
        self.winners.insert(record.date.clone(), record);
    }

    pub fn is_processed(&self, txid: &str) -> StoreResult<bool> {
        if self.processed.contains(txid) {
            return Ok(true);
        }
        self.store.is_processed(txid)
    }

    pub fn mark_processed(&mut self, txid: &str) {
        self.processed.insert(txid.to_string());
    }

    pub fn meta(&self, key: &str) -> StoreResult<Option<String>> {
        match self.metadata.get(key) {
            Some(value) => Ok(Some(value.clone())),
            None => self.store.meta(key),
        }
    }

    pub fn set_meta(&mut self, key: &str, value: impl ToString) {
        self.metadata.insert(key.to_string(), value.to_string());
    }

    fn meta_u64(&self, key: &str) -> StoreResult<Option<u64>> {
        self.meta(key)?.map(|raw| parse_u64(key, &raw)).transpose()
    }

    pub fn last_height(&self) -> StoreResult<u64> {
        Ok(self.meta_u64(meta::LAST_HEIGHT)?.unwrap_or(0))
    }

    pub fn set_last_height(&mut self, height: u64) {
        self.set_meta(meta::LAST_HEIGHT, height);
    }

    pub fn entry_id(&self) -> StoreResult<u64> {
        Ok(self.meta_u64(meta::ENTRY_ID)?.unwrap_or(0))
    }

    pub fn set_entry_id(&mut self, id: EntryId) {
        self.set_meta(meta::ENTRY_ID, id);
    }

    pub fn sign_key(&self) -> StoreResult<String> {
        Ok(self
            .meta(meta::SIGN_KEY)?
            .unwrap_or_else(|| GENESIS_SIGN_KEY.to_string()))
    }

    pub fn set_sign_key(&mut self, key: &str) {
        self.set_meta(meta::SIGN_KEY, key);
    }

    pub fn missed_height_check(&self) -> StoreResult<Option<u64>> {
        self.meta_u64(meta::MISSED_HEIGHT_CHECK)
    }

    pub fn set_missed_height_check(&mut self, height: u64) {
        self.set_meta(meta::MISSED_HEIGHT_CHECK, height);
    }

    /// Apply every staged change atomically
    pub fn commit(self) -> StoreResult<()> {
        if self.is_empty() {
            return Ok(());
        }
        let store = self.store;

        let mut accounts = Batch::default();
        let mut address_index = Batch::default();
        let mut user_names = Batch::default();
        // removals first so that a name moving between accounts survives
        let mut names_added = Vec::new();
        for (id, account) in &self.accounts {
            let previous = store
                .get_account(*id)?
                .and_then(|a| a.user_name);
            if previous != account.user_name {
                if let Some(old) = previous {
                    user_names.remove(old.as_bytes());
                }
                if let Some(new) = &account.user_name {
                    names_added.push((new.clone(), *id));
                }
            }
            accounts.insert(id_key(*id), serialize(account)?);
            address_index.insert(id_key(account.address_index), id_key(*id));
        }
        for (name, id) in names_added {
            user_names.insert(name.as_bytes(), id_key(id));
        }

        let mut entries = Batch::default();
        if self.entries_cleared {
            for key in store.entries.iter().keys() {
                entries.remove(key?);
            }
        }
        for (id, entry) in &self.entries {
            entries.insert(id_key(*id), serialize(entry)?);
        }

        let mut winners = Batch::default();
        for (month, record) in &self.winners {
            winners.insert(month.as_bytes(), serialize(record)?);
        }

        let mut transactions = Batch::default();
        for txid in &self.processed {
            transactions.insert(txid.as_bytes(), b"1".to_vec());
        }

        let mut metadata = Batch::default();
        for (key, value) in &self.metadata {
            metadata.insert(key.as_bytes(), value.as_bytes());
        }

        (
            &store.accounts,
            &store.address_index,
            &store.user_names,
            &store.entries,
            &store.winners,
            &store.transactions,
            &store.metadata,
        )
            .transaction(
                |(tx_accounts, tx_index, tx_names, tx_entries, tx_winners, tx_transactions, tx_metadata)|
                 -> ConflictableTransactionResult<(), ()> {
                    tx_accounts.apply_batch(&accounts)?;
                    tx_index.apply_batch(&address_index)?;
                    tx_names.apply_batch(&user_names)?;
                    tx_entries.apply_batch(&entries)?;
                    tx_winners.apply_batch(&winners)?;
                    tx_transactions.apply_batch(&transactions)?;
                    tx_metadata.apply_batch(&metadata)?;
                    Ok(())
                },
            )?;
        store.flush()?;

        debug!(
            accounts = self.accounts.len(),
            entries = self.entries.len(),
            entries_cleared = self.entries_cleared,
            winners = self.winners.len(),
            processed = self.processed.len(),
            metadata = self.metadata.len(),
            "Committed ledger transaction"
        );
        Ok(())
    }
}
