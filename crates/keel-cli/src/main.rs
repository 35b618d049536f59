//! Keel CLI - Small-business tax and bookkeeping engine
//!
//! Usage:
//!   keel init                          Initialize database and seed reference data
//!   keel ingest --file ledger.csv      Ingest a financial document
//!   keel classify "Office rent" -- -1800   Classify one line item
//!   keel tax --business-type llc       Calculate tax liability
//!   keel serve --port 3000             Start web server

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Ingest { file, state } => {
            commands::cmd_ingest(&cli.db, &cli.data_dir, &file, &state, cli.no_encrypt)
        }
        Commands::Classify {
            description,
            amount,
        } => commands::cmd_classify(&description, amount),
        Commands::Tax {
            business_type,
            state,
        } => commands::cmd_tax(&cli.db, &business_type, &state, cli.no_encrypt),
        Commands::Serve {
            port,
            host,
            no_auth,
            api_key,
        } => {
            commands::cmd_serve(
                &cli.db,
                &cli.data_dir,
                &host,
                port,
                no_auth,
                api_key.as_deref(),
                cli.no_encrypt,
            )
            .await
        }
    }
}
