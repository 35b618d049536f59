//! Keel Core Library
//!
//! Shared functionality for the Keel small-business tax engine:
//! - Database access and migrations
//! - Keyword-frequency transaction classification
//! - Document parsers (delimited ledgers, unstructured line text)
//! - Expense-to-tax-code matching
//! - Income and owners-equity statement aggregation
//! - Federal/state tax liability calculation
//! - Statistical anomaly detection for audits
//! - Pluggable object store for uploaded documents
//! - Pluggable local AI backends for advisory summaries

pub mod ai;
pub mod classify;
pub mod db;
pub mod detect;
pub mod error;
pub mod import;
pub mod ingest;
pub mod models;
pub mod statements;
pub mod store;
pub mod tax;
pub mod taxcode;

pub use ai::{AiBackend, AiClient, MockBackend, OllamaBackend};
pub use classify::{classify, KeywordConfig};
pub use db::Database;
pub use detect::score_items;
pub use error::{Error, Result};
pub use import::{detect_format, parse_document};
pub use ingest::{content_hash, process_document, IngestResult};
pub use statements::{aggregate_equity, aggregate_income};
pub use store::{LocalStore, ObjectStore};
pub use tax::{bracket_tax, TaxConfig, TaxEngine};
pub use taxcode::{match_category, match_tax_code, CategoryKeywords};
