//! Entry Crediting
//!
//! Turns accumulated amounts into entries inside a staged transaction.
//! Accounts are visited in id order so ids are assigned deterministically.

use pot_core::{entries_from_amount, AccountId, Entry};
use pot_store::LedgerTxn;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{EngineError, EngineResult};

/// Convert each account's accumulated amount into entries at `price`.
///
/// The amount replaces the account's remainder: callers include the old
/// remainder when it should count. Returns the number of entries created.
pub(crate) fn credit_accounts(
    txn: &mut LedgerTxn<'_>,
    amounts: &BTreeMap<AccountId, u64>,
    price: u64,
) -> EngineResult<u64> {
    if price == 0 {
        return Err(EngineError::PriceUnavailable("entry price is zero".to_string()));
    }
    let sign_key = txn.sign_key()?;
    let mut next_id = txn.entry_id()?;
    let mut created = 0;

    for (&account_id, &amount) in amounts {
        let mut account = txn
            .account(account_id)?
            .ok_or(EngineError::UnknownAccount(account_id))?;
        let (entries, remainder) = entries_from_amount(amount, price);
        for _ in 0..entries {
            next_id += 1;
            txn.insert_entry(Entry::signed(next_id, account_id, &sign_key));
        }
        account.amount = remainder;
        account.entries += entries;
        txn.put_account(account);
        created += entries;

        debug!(account_id, amount, entries, remainder, "Credited account");
    }

    txn.set_entry_id(next_id);
    Ok(created)
}
