//! Command implementations

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use keel_core::classify::{classify, KeywordConfig};
use keel_core::db::Database;
use keel_core::models::BusinessType;
use keel_core::store::{LocalStore, ObjectStore};
use keel_core::tax::TaxEngine;
use keel_server::ServerConfig;

/// Open the database, honoring the encryption flag
fn open_database(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path = db_path.to_string_lossy();
    let db = if no_encrypt {
        Database::new_unencrypted(&path)?
    } else {
        Database::new(&path)?
    };
    Ok(db)
}

/// Initialize the database and seed reference data
pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    let db = open_database(db_path, no_encrypt)?;
    db.seed_tax_codes()?;
    db.seed_tax_brackets()?;

    println!("Initialized database at {}", db.path());
    if no_encrypt {
        println!("WARNING: database is not encrypted");
    }
    Ok(())
}

/// Ingest a financial document end to end
pub fn cmd_ingest(db_path: &Path, data_dir: &Path, file: &Path, state: &str, no_encrypt: bool) -> Result<()> {
    let db = open_database(db_path, no_encrypt)?;
    db.seed_tax_codes()?;
    db.seed_tax_brackets()?;

    let store = LocalStore::new(data_dir)?;

    let bytes = std::fs::read(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());

    let content_hash = keel_core::content_hash(&bytes);
    let store_path = format!("documents/{}/{}", &content_hash[..8], filename);
    store.upload(&store_path, &bytes, None)?;

    let document_id = db.insert_document(
        &filename,
        &store_path,
        &content_hash,
        None,
        bytes.len() as i64,
        "cli",
    )?;
    info!(document_id, "Document stored");

    let result = keel_core::process_document(&db, &store, document_id, state, "cli")?;

    for finding in &result.findings {
        println!("{}", finding);
    }
    println!(
        "\nProcessed {} transactions: {} write-offs, {} revenue records",
        result.transactions.len(),
        result.write_offs_created,
        result.revenue_records_created
    );
    println!(
        "Income summary: revenue ${:.2}, expenses ${:.2}, net ${:.2}",
        result.income_summary.total_revenue,
        result.income_summary.total_expenses,
        result.income_summary.net_income
    );
    Ok(())
}

/// Classify one description/amount pair and print the result
pub fn cmd_classify(description: &str, amount: f64) -> Result<()> {
    let result = classify(description, amount, &KeywordConfig::default());
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Calculate tax liability and print the result
pub fn cmd_tax(db_path: &Path, business_type: &str, state: &str, no_encrypt: bool) -> Result<()> {
    let business_type: BusinessType = business_type
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let db = open_database(db_path, no_encrypt)?;
    db.seed_tax_brackets()?;

    let result = TaxEngine::new(&db).calculate(business_type, state);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Start the web server
pub async fn cmd_serve(
    db_path: &Path,
    data_dir: &Path,
    host: &str,
    port: u16,
    no_auth: bool,
    api_key: Option<&str>,
    no_encrypt: bool,
) -> Result<()> {
    let db = open_database(db_path, no_encrypt)?;
    db.seed_tax_codes()?;
    db.seed_tax_brackets()?;

    let store = LocalStore::new(data_dir)?;

    let api_key = api_key
        .map(|k| k.to_string())
        .or_else(|| std::env::var("KEEL_API_KEY").ok());
    let config = ServerConfig {
        require_auth: !no_auth,
        allowed_origins: vec![],
        api_keys: api_key.into_iter().collect(),
    };

    if config.require_auth && config.api_keys.is_empty() {
        anyhow::bail!(
            "Authentication is enabled but no API key is configured. \
             Pass --api-key (or set KEEL_API_KEY), or use --no-auth for local development."
        );
    }

    keel_server::serve(db, Box::new(store), host, port, config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cmd_init_creates_database() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("keel.db");

        cmd_init(&db_path, true).unwrap();
        assert!(db_path.exists());

        // Reference data is queryable afterwards
        let db = Database::new_unencrypted(&db_path.to_string_lossy()).unwrap();
        assert!(!db.list_tax_codes().unwrap().is_empty());
    }

    #[test]
    fn test_cmd_ingest_processes_file() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("keel.db");
        let data_dir = dir.path().join("documents");
        let file = dir.path().join("ledger.csv");

        std::fs::write(
            &file,
            "date,description,amount\n2024-01-15,Office Supplies Purchase,-245.50\n",
        )
        .unwrap();

        cmd_ingest(&db_path, &data_dir, &file, "CA", true).unwrap();

        let db = Database::new_unencrypted(&db_path.to_string_lossy()).unwrap();
        assert_eq!(db.list_write_offs(None, 10).unwrap().len(), 1);
        assert_eq!(db.list_documents(10).unwrap().len(), 1);
    }

    #[test]
    fn test_cmd_classify_runs() {
        cmd_classify("Office Supplies Purchase", -245.50).unwrap();
    }

    #[test]
    fn test_cmd_tax_runs() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("keel.db");
        cmd_init(&db_path, true).unwrap();
        cmd_tax(&db_path, "llc", "CA", true).unwrap();
    }
}
