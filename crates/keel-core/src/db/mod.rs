//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `documents` - Uploaded document bookkeeping
//! - `taxcodes` - Tax code and state bracket reference data
//! - `writeoffs` - Write-off CRUD and totals
//! - `revenue` - Revenue record CRUD and totals
//! - `statements` - Income/equity statement rows and tax analysis snapshots
//! - `audits` - Audits and audit item snapshots

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::{Error, Result};

mod audits;
mod documents;
mod revenue;
mod statements;
mod taxcodes;
mod writeoffs;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "KEEL_DB_KEY";

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the
/// same key, regardless of database path. This allows moving/renaming/
/// restoring the database freely.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Fixed application salt - changing this would invalidate all existing
    // encrypted databases
    const APP_SALT: &[u8; 16] = b"keel-salt-v1-fix";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let hash_str = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(hash_str.as_bytes()))
}

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Create a new database connection pool with encryption
    ///
    /// Requires `KEEL_DB_KEY` environment variable to be set. The database
    /// will be encrypted using SQLCipher with a key derived from the
    /// passphrase via Argon2. Use `new_unencrypted()` for development and
    /// testing without encryption.
    pub fn new(path: &str) -> Result<Self> {
        let encryption_key = std::env::var(DB_KEY_ENV).ok();
        match encryption_key {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases (not recommended for production).",
                DB_KEY_ENV
            ))),
        }
    }

    /// Create a new unencrypted database connection pool
    ///
    /// WARNING: This creates an unencrypted database. Only use for
    /// development or testing. For production, use `new()` with
    /// `KEEL_DB_KEY` set.
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Create a new database with an explicit encryption key
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);

        let pool = if let Some(pass) = passphrase {
            let key = derive_key(pass)?;
            let key_pragma = format!("PRAGMA key = 'x\"{}\"';", key);

            // Use with_init to set the key on every new connection
            let manager = manager.with_init(move |conn| {
                conn.execute_batch(&key_pragma)?;
                Ok(())
            });

            Pool::builder().max_size(10).build(manager)?
        } else {
            Pool::builder().max_size(10).build(manager)?
        };

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create an in-memory database (for testing)
    ///
    /// Note: Uses a temporary file rather than `:memory:` because SQLCipher
    /// has issues with in-memory databases in the connection pool.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = format!("/tmp/keel_test_{}.db", id);

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Enable foreign keys
            PRAGMA foreign_keys = ON;

            -- WAL mode: better concurrency, readers don't block writers
            PRAGMA journal_mode = WAL;

            -- Cache size: ~8MB (2000 pages * 4KB default page size)
            PRAGMA cache_size = 2000;

            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Uploaded source documents
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY,
                filename TEXT NOT NULL,
                store_path TEXT NOT NULL,
                content_hash TEXT NOT NULL UNIQUE,
                content_type TEXT,
                size_bytes INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'uploaded',   -- uploaded, processed, failed
                uploaded_by TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status);
            CREATE INDEX IF NOT EXISTS idx_documents_hash ON documents(content_hash);

            -- Tax codes (jurisdiction-scoped reference data)
            CREATE TABLE IF NOT EXISTS tax_codes (
                id INTEGER PRIMARY KEY,
                code TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL,
                category TEXT NOT NULL,
                deduction_type TEXT NOT NULL,
                state TEXT,                                -- NULL = every state
                expense_category TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_tax_codes_category ON tax_codes(category);
            CREATE INDEX IF NOT EXISTS idx_tax_codes_state ON tax_codes(state);

            -- Write-offs (deductible expenses)
            CREATE TABLE IF NOT EXISTS write_offs (
                id INTEGER PRIMARY KEY,
                amount REAL NOT NULL,
                description TEXT NOT NULL,
                date DATE NOT NULL,
                tax_code_id INTEGER REFERENCES tax_codes(id),
                status TEXT NOT NULL DEFAULT 'pending',    -- pending, approved
                source_document_id INTEGER REFERENCES documents(id),
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_write_offs_status ON write_offs(status);
            CREATE INDEX IF NOT EXISTS idx_write_offs_date ON write_offs(date);
            CREATE INDEX IF NOT EXISTS idx_write_offs_document ON write_offs(source_document_id);

            -- Revenue records
            CREATE TABLE IF NOT EXISTS revenue_records (
                id INTEGER PRIMARY KEY,
                amount REAL NOT NULL,
                category TEXT NOT NULL,
                description TEXT NOT NULL,
                date DATE NOT NULL,
                source_document_id INTEGER REFERENCES documents(id),
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_revenue_date ON revenue_records(date);
            CREATE INDEX IF NOT EXISTS idx_revenue_document ON revenue_records(source_document_id);

            -- Progressive state tax brackets
            -- Brackets for a (state, business_type) pair tile [0, inf):
            -- max_income NULL marks the open-ended top bracket
            CREATE TABLE IF NOT EXISTS state_tax_brackets (
                id INTEGER PRIMARY KEY,
                state TEXT NOT NULL,
                business_type TEXT NOT NULL,
                min_income REAL NOT NULL,
                max_income REAL,
                rate REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_brackets_state_type
                ON state_tax_brackets(state, business_type, min_income);

            -- Income statement rows (one per classified transaction)
            CREATE TABLE IF NOT EXISTS income_statements (
                id INTEGER PRIMARY KEY,
                statement_id TEXT NOT NULL,
                category TEXT NOT NULL,
                amount REAL NOT NULL,
                description TEXT NOT NULL,
                computed_by TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_income_statement ON income_statements(statement_id);

            -- Owners equity statement summary rows
            CREATE TABLE IF NOT EXISTS owners_equity_statements (
                id INTEGER PRIMARY KEY,
                statement_id TEXT NOT NULL,
                entry_type TEXT NOT NULL,    -- net_income, owner_withdrawals, owner_investments
                amount REAL NOT NULL,
                computed_by TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_equity_statement ON owners_equity_statements(statement_id);

            -- Tax analysis snapshots (reusable income/expense summaries)
            CREATE TABLE IF NOT EXISTS tax_analysis (
                id INTEGER PRIMARY KEY,
                total_revenue REAL NOT NULL,
                total_expenses REAL NOT NULL,
                net_income REAL NOT NULL,
                computed_by TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Audits over activity snapshots
            CREATE TABLE IF NOT EXISTS audits (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'open',       -- open, completed
                risk_score REAL,
                ai_summary TEXT,
                created_by TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_audits_status ON audits(status);

            -- Audit items (snapshotted at audit-initiation time)
            CREATE TABLE IF NOT EXISTS audit_items (
                id INTEGER PRIMARY KEY,
                audit_id INTEGER NOT NULL REFERENCES audits(id) ON DELETE CASCADE,
                amount REAL NOT NULL,
                category TEXT NOT NULL,
                description TEXT NOT NULL,
                date DATE NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',    -- pending, flagged
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_audit_items_audit ON audit_items(audit_id);
            CREATE INDEX IF NOT EXISTS idx_audit_items_date ON audit_items(date);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}
