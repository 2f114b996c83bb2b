//! Sled Ledger Store
//!
//! One sled tree per logical table. Integer keys are big-endian so that
//! iteration follows numeric order. Reads go straight to the trees; every
//! mutating sequence is staged in a [`LedgerTxn`] and committed at once.

use pot_core::{Account, AccountId, Entry, EntryId, PriceStamp, WinnerRecord, GENESIS_SIGN_KEY};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::txn::LedgerTxn;

const ACCOUNTS_TREE: &str = "accounts";
const ENTRIES_TREE: &str = "entries";
const WINNERS_TREE: &str = "winners";
const TRANSACTIONS_TREE: &str = "transactions";
const METADATA_TREE: &str = "metadata";
const USER_NAMES_TREE: &str = "user_names";
const ADDRESS_INDEX_TREE: &str = "address_index";

/// Metadata keys
pub mod meta {
    /// Reconciler watermark
    pub const LAST_HEIGHT: &str = "last_height";
    /// Running entry counter of the current cycle
    pub const ENTRY_ID: &str = "entry_id";
    /// Entry signing seed of the current cycle
    pub const SIGN_KEY: &str = "sign_key";
    /// `YYYY-MM-DD:<units>`
    pub const CURRENT_PRICE: &str = "current_price";
    /// Auditor watermark, absent until the first audit
    pub const MISSED_HEIGHT_CHECK: &str = "missed_height_check";
    pub const DB_VERSION: &str = "db_version";
}

/// Schema version written by this build
pub const LEDGER_VERSION: u32 = 1;

pub(crate) fn id_key(id: u64) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

pub(crate) fn decode_id(bytes: &[u8]) -> StoreResult<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::corrupt("id", format!("{} byte key", bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}

pub(crate) fn serialize<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

pub(crate) fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

pub(crate) fn parse_u64(key: &str, raw: &str) -> StoreResult<u64> {
    raw.parse::<u64>().map_err(|e| StoreError::corrupt(key, e))
}

/// Persistent ledger
#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: Option<PathBuf>,
    pub(crate) db: sled::Db,
    pub(crate) accounts: sled::Tree,
    pub(crate) entries: sled::Tree,
    pub(crate) winners: sled::Tree,
    pub(crate) transactions: sled::Tree,
    pub(crate) metadata: sled::Tree,
    pub(crate) user_names: sled::Tree,
    pub(crate) address_index: sled::Tree,
}

impl LedgerStore {
    /// Open or create the ledger at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path.as_ref())
            .map_err(|e| StoreError::Storage(format!("Failed to open sled db: {}", e)))?;
        info!(path = %path.as_ref().display(), "Opened ledger");
        Self::from_db(db, Some(path.as_ref().to_path_buf()))
    }

    /// In-memory ledger, discarded on drop
    pub fn temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db, None)
    }

    fn from_db(db: sled::Db, path: Option<PathBuf>) -> StoreResult<Self> {
        let store = Self {
            accounts: db.open_tree(ACCOUNTS_TREE)?,
            entries: db.open_tree(ENTRIES_TREE)?,
            winners: db.open_tree(WINNERS_TREE)?,
            transactions: db.open_tree(TRANSACTIONS_TREE)?,
            metadata: db.open_tree(METADATA_TREE)?,
            user_names: db.open_tree(USER_NAMES_TREE)?,
            address_index: db.open_tree(ADDRESS_INDEX_TREE)?,
            path,
            db,
        };
        store.bootstrap()?;
        Ok(store)
    }

    /// Seed the cycle metadata of a fresh ledger and check the schema version
    fn bootstrap(&self) -> StoreResult<()> {
        if let Some(raw) = self.meta(meta::DB_VERSION)? {
            let found = raw
                .parse::<u32>()
                .map_err(|e| StoreError::corrupt(meta::DB_VERSION, e))?;
            if found > LEDGER_VERSION {
                return Err(StoreError::UnsupportedVersion {
                    found,
                    supported: LEDGER_VERSION,
                });
            }
        }

        let defaults = [
            (meta::LAST_HEIGHT, "0".to_string()),
            (meta::ENTRY_ID, "0".to_string()),
            (meta::SIGN_KEY, GENESIS_SIGN_KEY.to_string()),
            (meta::DB_VERSION, LEDGER_VERSION.to_string()),
        ];
        for (key, value) in defaults {
            let seeded = self
                .metadata
                .compare_and_swap(key, None as Option<&[u8]>, Some(value.as_bytes()))?
                .is_ok();
            if seeded {
                debug!(key, value = %value, "Seeded metadata");
            }
        }
        self.flush()
    }

    /// Directory of an on-disk ledger
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn flush(&self) -> StoreResult<()> {
        self.db
            .flush()
            .map_err(|e| StoreError::Storage(format!("Failed to flush db: {}", e)))?;
        Ok(())
    }

    /// Start staging a set of changes
    pub fn begin(&self) -> LedgerTxn<'_> {
        LedgerTxn::new(self)
    }

    // ==================== Accounts ====================

    pub fn get_account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        match self.accounts.get(id_key(id))? {
            Some(bytes) => Ok(Some(deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All accounts in id order
    pub fn accounts(&self) -> StoreResult<Vec<Account>> {
        let mut accounts = Vec::new();
        for item in self.accounts.iter() {
            let (_, value) = item?;
            accounts.push(deserialize(&value)?);
        }
        Ok(accounts)
    }

    pub fn active_accounts(&self) -> StoreResult<Vec<Account>> {
        Ok(self.accounts()?.into_iter().filter(|a| a.active).collect())
    }

    /// The active account paying from `user_address`
    pub fn active_account_by_user_address(&self, user_address: &str) -> StoreResult<Option<Account>> {
        Ok(self
            .accounts()?
            .into_iter()
            .find(|a| a.active && a.user_address.as_deref() == Some(user_address)))
    }

    pub fn account_id_by_user_name(&self, user_name: &str) -> StoreResult<Option<AccountId>> {
        match self.user_names.get(user_name.as_bytes())? {
            Some(bytes) => Ok(Some(decode_id(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Account bound to wallet sub-address `address_index`
    pub fn account_by_address_index(&self, address_index: u64) -> StoreResult<Option<Account>> {
        match self.address_index.get(id_key(address_index))? {
            Some(bytes) => self.get_account(decode_id(&bytes)?),
            None => Ok(None),
        }
    }

    /// Inactive slot with the lowest sub-address index, if any
    pub fn first_inactive_account(&self) -> StoreResult<Option<Account>> {
        for item in self.address_index.iter() {
            let (_, value) = item?;
            if let Some(account) = self.get_account(decode_id(&value)?)? {
                if !account.active {
                    return Ok(Some(account));
                }
            }
        }
        Ok(None)
    }

    /// Id for a new account (ids start at 1)
    pub fn next_account_id(&self) -> StoreResult<AccountId> {
        match self.accounts.last()? {
            Some((key, _)) => Ok(decode_id(&key)? + 1),
            None => Ok(1),
        }
    }

    /// Entries held this cycle by active accounts referred by `account_id`
    pub fn referral_entries(&self, account_id: AccountId) -> StoreResult<u64> {
        Ok(self
            .active_accounts()?
            .iter()
            .filter(|a| a.ref_id == account_id && a.entries > 0)
            .map(|a| a.entries)
            .sum())
    }

    // ==================== Entries ====================

    pub fn entry(&self, id: EntryId) -> StoreResult<Option<Entry>> {
        match self.entries.get(id_key(id))? {
            Some(bytes) => Ok(Some(deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// One page of entries in id order, optionally restricted to one account.
    /// Pages start at 1.
    pub fn entries_page(
        &self,
        account_id: Option<AccountId>,
        page: usize,
        per_page: usize,
    ) -> StoreResult<Vec<Entry>> {
        let skip = page.saturating_sub(1) * per_page;
        let mut out = Vec::new();
        let mut seen = 0usize;
        for item in self.entries.iter() {
            let (_, value) = item?;
            let entry: Entry = deserialize(&value)?;
            if account_id.map_or(false, |id| entry.account_id != id) {
                continue;
            }
            seen += 1;
            if seen <= skip {
                continue;
            }
            out.push(entry);
            if out.len() == per_page {
                break;
            }
        }
        Ok(out)
    }

    /// Number of stored entry rows
    pub fn entry_rows(&self) -> usize {
        self.entries.len()
    }

    // ==================== Winners ====================

    pub fn winner(&self, month: &str) -> StoreResult<Option<WinnerRecord>> {
        match self.winners.get(month.as_bytes())? {
            Some(bytes) => Ok(Some(deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Most recent month on record
    pub fn latest_winner(&self) -> StoreResult<Option<WinnerRecord>> {
        match self.winners.last()? {
            Some((_, bytes)) => Ok(Some(deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Operator override: drop the pending payout of `month`.
    ///
    /// Returns whether a pending payout was cleared.
    pub fn clear_transfer_body(&self, month: &str) -> StoreResult<bool> {
        let Some(mut record) = self.winner(month)? else {
            return Ok(false);
        };
        if record.transfer_body.is_none() {
            return Ok(false);
        }
        record.transfer_body = None;
        self.winners.insert(month.as_bytes(), serialize(&record)?)?;
        self.flush()?;
        Ok(true)
    }

    // ==================== Processed transfers ====================

    pub fn is_processed(&self, txid: &str) -> StoreResult<bool> {
        Ok(self.transactions.contains_key(txid.as_bytes())?)
    }

    pub fn processed_count(&self) -> usize {
        self.transactions.len()
    }

    // ==================== Metadata ====================

    pub fn meta(&self, key: &str) -> StoreResult<Option<String>> {
        match self.metadata.get(key.as_bytes())? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|e| StoreError::corrupt(key, e)),
            None => Ok(None),
        }
    }

    fn meta_u64(&self, key: &str) -> StoreResult<Option<u64>> {
        self.meta(key)?.map(|raw| parse_u64(key, &raw)).transpose()
    }

    pub fn last_height(&self) -> StoreResult<u64> {
        Ok(self.meta_u64(meta::LAST_HEIGHT)?.unwrap_or(0))
    }

    /// Entries issued this cycle (also the id of the last one)
    pub fn entry_id(&self) -> StoreResult<u64> {
        Ok(self.meta_u64(meta::ENTRY_ID)?.unwrap_or(0))
    }

    pub fn sign_key(&self) -> StoreResult<String> {
        Ok(self
            .meta(meta::SIGN_KEY)?
            .unwrap_or_else(|| GENESIS_SIGN_KEY.to_string()))
    }

    /// `None` until the first audit has run
    pub fn missed_height_check(&self) -> StoreResult<Option<u64>> {
        self.meta_u64(meta::MISSED_HEIGHT_CHECK)
    }

    pub fn current_price(&self) -> StoreResult<Option<PriceStamp>> {
        match self.meta(meta::CURRENT_PRICE)? {
            Some(raw) => PriceStamp::parse(&raw)
                .map(Some)
                .map_err(|e| StoreError::corrupt(meta::CURRENT_PRICE, e)),
            None => Ok(None),
        }
    }

    pub fn set_current_price(&self, stamp: &PriceStamp) -> StoreResult<()> {
        self.metadata
            .insert(meta::CURRENT_PRICE.as_bytes(), stamp.to_string().as_bytes())?;
        self.flush()
    }
}
