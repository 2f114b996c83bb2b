//! Command Handler

use pot_engine::{Engine, EngineConfig, LogAlertSink, TradeOgreSource};
use pot_rpc::{JsonRpcClient, RpcEndpointConfig};
use pot_store::LedgerStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::error::{CliError, CliResult};
use crate::output;
use crate::{Cli, Commands};

/// Build the engine from `POT_*` environment variables
pub fn build_engine(data_path: Option<PathBuf>) -> CliResult<Engine> {
    let mut config = EngineConfig::from_env();
    if let Some(path) = data_path {
        config = config.with_data_path(path);
    }
    if config.maintenance_address.is_empty() {
        return Err(CliError::config("POT_MAINTENANCE_ADDRESS is not set"));
    }
    let store = LedgerStore::open(config.ledger_path())?;
    let wallet = Arc::new(JsonRpcClient::new(RpcEndpointConfig::wallet_from_env())?);
    let daemon = Arc::new(JsonRpcClient::new(RpcEndpointConfig::daemon_from_env())?);

    Ok(Engine::new(
        config,
        store,
        wallet,
        daemon,
        Arc::new(TradeOgreSource::new()?),
        Arc::new(LogAlertSink),
    )?)
}

/// Run a parsed command line
pub async fn run(cli: Cli) -> CliResult<()> {
    let engine = build_engine(cli.data_path)?;
    let json = cli.json;

    match cli.command {
        Commands::Run => {
            let runner = engine.start();
            info!(data_path = %engine.config().data_path.display(), "Pot engine running");
            tokio::signal::ctrl_c().await?;
            info!("Shutdown requested");
            runner.stop().await;
        }
        Commands::Reconcile => output::print_reconcile(&engine.reconcile_once().await?, json),
        Commands::Audit => output::print_audit(&engine.audit_once().await?, json),
        Commands::Draw => output::print_draw(&engine.run_draw().await?, json),
        Commands::FlushPayout { month } => {
            if !engine.flush_payout(&month).await? {
                return Err(CliError::not_found(format!("pending payout for {}", month)));
            }
            println!("Pending payout for {} flushed", month);
        }
        Commands::Backup => output::print_backup(&engine.backup().await?, json),
        Commands::Price => {
            let price = engine.refresh_price().await?;
            if json {
                output::print_json(&serde_json::json!({ "price": price }));
            } else {
                println!("Entry price: {}", pot_core::format_coins(price));
            }
        }
        Commands::Winner { month } => {
            let winner = engine
                .accounts()
                .winner(month.as_deref())?
                .ok_or_else(|| CliError::not_found(month.unwrap_or_else(|| "any winner".to_string())))?;
            output::print_winner(&winner, json);
        }
        Commands::Account {
            user_address,
            name,
            referrer,
        } => {
            if user_address.trim().is_empty() {
                return Err(CliError::invalid_arg("user address is empty"));
            }
            let account = engine
                .accounts()
                .register(&user_address, name.as_deref(), referrer.as_deref())
                .await?;
            output::print_account(&account, json);
        }
        Commands::Entries { account, page } => {
            let accounts = engine.accounts();
            let entries = accounts.entries(account, page)?;
            output::print_entries(&entries, accounts.total_entries()?, json);
        }
    }
    Ok(())
}
