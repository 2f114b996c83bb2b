//! Ledger Types
//!
//! Accounts are participant slots bound to a wallet sub-address. The slot
//! outlives its participant: at the end of a cycle an account can be
//! deactivated and later recycled for someone else, but its `address_index`
//! never changes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::scoring::sign_entry;

/// Account identifier (0 means "no account", e.g. no referrer)
pub type AccountId = u64;

/// Entry identifier, monotonically increasing within a cycle
pub type EntryId = u64;

/// Participant slot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Wallet sub-address index (minor), immutable once issued
    pub address_index: u64,
    /// Receiving address for this slot
    pub address: String,
    /// Unique human alias
    pub user_name: Option<String>,
    /// Address the participant pays from; doubles as session identity
    pub user_address: Option<String>,
    /// Unspent remainder below one entry price, atomic units
    pub amount: u64,
    /// Entries held in the current cycle
    pub entries: u64,
    /// Referring account, 0 = none
    pub ref_id: AccountId,
    pub active: bool,
}

impl Account {
    /// Create a fresh, inactive slot for a newly issued sub-address
    pub fn new(id: AccountId, address_index: u64, address: impl Into<String>) -> Self {
        Self {
            id,
            address_index,
            address: address.into(),
            ..Default::default()
        }
    }

    pub fn has_referrer(&self) -> bool {
        self.ref_id != 0
    }

    /// Strip the participant identity, keeping the address binding
    pub fn deactivate(&mut self) {
        self.active = false;
        self.user_name = None;
        self.user_address = None;
        self.amount = 0;
        self.entries = 0;
        self.ref_id = 0;
    }
}

/// One lottery ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub account_id: AccountId,
    /// Digest of (id, cycle signing key)
    pub hash: String,
}

impl Entry {
    pub fn signed(id: EntryId, account_id: AccountId, sign_key: &str) -> Self {
        Self {
            id,
            account_id,
            hash: sign_entry(id, sign_key),
        }
    }
}

/// Public draw outcome for one month
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerInfo {
    /// Signing key of the drawn cycle
    pub sign_key: String,
    /// Anchor block hash
    pub block: String,
    /// Total entries in the cycle
    pub entries: u64,
    /// Winner share of the pot, atomic units
    pub amount: u64,
    /// Winner address -> winning entry ids
    pub accounts: BTreeMap<String, Vec<EntryId>>,
}

impl WinnerInfo {
    /// Copy with winner addresses shortened for public display
    pub fn masked(&self) -> Self {
        Self {
            accounts: self
                .accounts
                .iter()
                .map(|(addr, ids)| (mask_address(addr), ids.clone()))
                .collect(),
            ..self.clone()
        }
    }

    pub fn winning_entries(&self) -> usize {
        self.accounts.values().map(Vec::len).sum()
    }
}

/// Stored winner row, keyed by month (`YYYY-MM`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerRecord {
    pub date: String,
    pub info: WinnerInfo,
    /// Serialized pending payout; `None` once settled or abandoned
    pub transfer_body: Option<String>,
}

impl WinnerRecord {
    pub fn is_settled(&self) -> bool {
        self.transfer_body.is_none()
    }
}

/// Shorten an address to `first5...last5`
pub fn mask_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..5].iter().collect();
    let tail: String = chars[chars.len() - 5..].iter().collect();
    format!("{}...{}", head, tail)
}
