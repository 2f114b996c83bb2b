//! Output Formatting

use pot_core::{format_coins, Account, Entry};
use pot_engine::{AuditReport, BackupReport, DrawOutcome, PublishedWinner, ReconcileReport};
use serde::Serialize;

/// Print as pretty JSON
pub fn print_json<T: Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error formatting JSON: {}", e),
    }
}

pub fn print_reconcile(report: &ReconcileReport, json: bool) {
    if json {
        return print_json(report);
    }
    println!("Reconcile");
    println!("=========");
    println!("Fetched:     {}", report.fetched);
    println!("Skipped:     {}", report.skipped);
    println!("Unmatched:   {}", report.unmatched);
    println!("New entries: {}", report.new_entries);
    println!("Watermark:   {}", report.last_height);
    for (account_id, amount) in &report.credited {
        println!("  - account {}: {}", account_id, format_coins(*amount));
    }
}

pub fn print_audit(report: &AuditReport, json: bool) {
    if json {
        return print_json(report);
    }
    println!("Audit ({:?})", report.mode);
    println!("=================");
    println!("Fetched:     {}", report.fetched);
    println!("New entries: {}", report.new_entries);
    println!("Checkpoint:  {}", report.checked_height);
    for (account_id, amount) in &report.credited {
        println!("  - account {}: {}", account_id, format_coins(*amount));
    }
}

pub fn print_draw(outcome: &DrawOutcome, json: bool) {
    if json {
        return print_json(outcome);
    }
    match outcome {
        DrawOutcome::AlreadyProcessed { month } => println!("{}: already drawn and paid", month),
        DrawOutcome::EmptyCycle { month } => println!("{}: no entries, nothing drawn", month),
        DrawOutcome::Settled { month, failed } if failed.is_empty() => {
            println!("{}: drawn and paid", month)
        }
        DrawOutcome::Settled { month, failed } => {
            println!("{}: drawn, {} destination(s) need a manual payout:", month, failed.len());
            for destination in failed {
                println!("  - {} {}", destination.address, format_coins(destination.amount));
            }
        }
        DrawOutcome::PendingRetry { month, error } => {
            println!("{}: payout pending, will retry ({})", month, error)
        }
    }
}

pub fn print_backup(report: &BackupReport, json: bool) {
    if json {
        return print_json(report);
    }
    match &report.path {
        Some(path) => println!("Backup written to {}", path.display()),
        None => println!("Backup for this instant already exists"),
    }
    println!("Pruned: {}", report.pruned);
}

pub fn print_winner(winner: &PublishedWinner, json: bool) {
    if json {
        return print_json(winner);
    }
    let info = &winner.info;
    println!("Winner {}", winner.date);
    println!("==============");
    println!("Amount:   {}", format_coins(info.amount));
    println!("Entries:  {}", info.entries);
    println!("Block:    {}", info.block);
    println!("Sign key: {}", info.sign_key);
    for (address, entries) in &info.accounts {
        println!("  - {} {:?}", address, entries);
    }
}

pub fn print_account(account: &Account, json: bool) {
    if json {
        return print_json(account);
    }
    println!("Account {}", account.id);
    println!("Deposit address: {}", account.address);
    println!("Entries:         {}", account.entries);
    println!("Remainder:       {}", format_coins(account.amount));
    if let Some(name) = &account.user_name {
        println!("Alias:           {}", name);
    }
}

pub fn print_entries(entries: &[Entry], total: u64, json: bool) {
    if json {
        return print_json(&entries);
    }
    println!("{} of {} entries", entries.len(), total);
    for entry in entries {
        println!("  {:>6} account {:>6} {}", entry.id, entry.account_id, entry.hash);
    }
}
