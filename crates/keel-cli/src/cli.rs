//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in `commands`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Keel - Small-business tax and bookkeeping engine
#[derive(Parser)]
#[command(name = "keel")]
#[command(about = "Self-hosted small-business tax and bookkeeping engine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "keel.db", global = true)]
    pub db: PathBuf,

    /// Directory for uploaded document storage
    #[arg(long, default_value = "documents", global = true)]
    pub data_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set KEEL_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and seed reference data
    Init,

    /// Ingest a financial document (CSV ledger or free text)
    Ingest {
        /// File to ingest
        #[arg(short, long)]
        file: PathBuf,

        /// State scoping tax-code matching for extracted write-offs
        #[arg(short, long, default_value = "CA")]
        state: String,
    },

    /// Classify a single line description and amount
    Classify {
        /// Line description
        description: String,

        /// Amount (sign is the fallback signal when no keyword matches)
        amount: f64,
    },

    /// Calculate the current tax liability
    Tax {
        /// Business type: corporation, llc, sole_proprietorship, partnership
        #[arg(short, long, default_value = "sole_proprietorship")]
        business_type: String,

        /// Two-letter state code
        #[arg(short, long, default_value = "CA")]
        state: String,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a
        /// network. By default the server requires an API key.
        #[arg(long)]
        no_auth: bool,

        /// API key clients must present as a bearer token
        /// (falls back to the KEEL_API_KEY environment variable)
        #[arg(long)]
        api_key: Option<String>,
    },
}
