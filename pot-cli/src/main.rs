//! Pot CLI Entry Point
//!
//! Configuration is loaded from environment variables (via .env file).

use clap::Parser;
use pot_cli::{handler, Cli};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = handler::run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "pot=debug,pot_cli=debug,pot_engine=debug,pot_store=debug,pot_rpc=debug"
    } else {
        "pot=info,pot_cli=info,pot_engine=info,pot_store=info,pot_rpc=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
