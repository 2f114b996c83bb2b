//! Pot CLI - Operator Command Line
//!
//! Runs the pot engine as a daemon or performs one operation against the
//! ledger and exits.
//!
//! # Usage
//!
//! ```text
//! pot [OPTIONS] <COMMAND>
//!
//! Commands:
//!   run           Run reconciliation, draw, price and backup jobs until interrupted
//!   reconcile     Credit new inbound transfers once
//!   audit         Re-read transfers below the watermark once
//!   draw          Draw (or finish paying) the previous month now
//!   flush-payout  Drop a pending payout that was settled by hand
//!   backup        Copy the ledger and prune old backups
//!   price         Refresh today's entry price
//!   winner        Show a published winner
//!   account       Get or create the slot for a payer address
//!   entries       List this cycle's entries
//!
//! Options:
//!   -d, --data-path <DIR>  Data directory [env: POT_DATA_PATH]
//!   -j, --json             Print results as JSON
//!   -v, --verbose          Debug logging
//! ```
//!
//! Configuration comes from `POT_*` environment variables (a `.env` file is
//! loaded when present); see `EngineConfig::from_env` and
//! `RpcEndpointConfig::wallet_from_env` / `daemon_from_env`.

pub mod error;
pub mod handler;
pub mod output;

pub use error::{CliError, CliResult};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pot")]
#[command(about = "Monthly pot ledger operator CLI")]
#[command(version)]
pub struct Cli {
    /// Print results as JSON
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Data directory (ledger, payout files, backups)
    #[arg(short, long, global = true, env = "POT_DATA_PATH")]
    pub data_path: Option<PathBuf>,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the background jobs until interrupted
    Run,

    /// Credit new inbound transfers once
    Reconcile,

    /// Re-read transfers below the watermark once
    Audit,

    /// Draw (or finish paying) the previous month now
    Draw,

    /// Drop a pending payout after settling it by hand
    FlushPayout {
        /// Month of the payout (YYYY-MM)
        #[arg(short, long)]
        month: String,
    },

    /// Copy the ledger and prune old backups
    Backup,

    /// Refresh today's entry price
    Price,

    /// Show a published winner
    Winner {
        /// Month (YYYY-MM); the latest winner when omitted
        #[arg(short, long)]
        month: Option<String>,
    },

    /// Get or create the slot for a payer address
    Account {
        /// Payer's refund address
        user_address: String,
        /// Alias to attach
        #[arg(short, long)]
        name: Option<String>,
        /// Alias of the referring account
        #[arg(short, long)]
        referrer: Option<String>,
    },

    /// List this cycle's entries
    Entries {
        /// Only entries of this account
        #[arg(short, long)]
        account: Option<u64>,
        /// Page, from 1
        #[arg(short, long, default_value = "1")]
        page: usize,
    },
}
