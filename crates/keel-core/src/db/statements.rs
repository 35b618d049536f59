//! Statement and tax analysis persistence
//!
//! Statement aggregation writes are all-or-nothing: the per-row inserts and
//! the summary row commit in a single transaction so a failure mid-batch
//! cannot leave inconsistent aggregate rows behind.

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{
    EquityEntryType, EquityStatementEntry, IncomeCategory, IncomeStatementEntry, TaxAnalysis,
};

fn row_to_income_entry(row: &Row) -> rusqlite::Result<IncomeStatementEntry> {
    Ok(IncomeStatementEntry {
        id: row.get(0)?,
        statement_id: row.get(1)?,
        category: row
            .get::<_, String>(2)?
            .parse()
            .unwrap_or(IncomeCategory::Other),
        amount: row.get(3)?,
        description: row.get(4)?,
        computed_by: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

fn row_to_equity_entry(row: &Row) -> rusqlite::Result<EquityStatementEntry> {
    Ok(EquityStatementEntry {
        id: row.get(0)?,
        statement_id: row.get(1)?,
        entry_type: row
            .get::<_, String>(2)?
            .parse()
            .unwrap_or(EquityEntryType::NetIncome),
        amount: row.get(3)?,
        computed_by: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

impl Database {
    /// Persist income statement rows plus the tax analysis snapshot
    /// atomically
    pub fn insert_income_statement(
        &self,
        statement_id: &str,
        entries: &[(IncomeCategory, f64, String)],
        total_revenue: f64,
        total_expenses: f64,
        computed_by: &str,
    ) -> Result<i64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO income_statements (statement_id, category, amount, description, computed_by)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )?;
            for (category, amount, description) in entries {
                stmt.execute(params![
                    statement_id,
                    category.as_str(),
                    amount,
                    description,
                    computed_by
                ])?;
            }
        }

        tx.execute(
            r#"
            INSERT INTO tax_analysis (total_revenue, total_expenses, net_income, computed_by)
            VALUES (?, ?, ?, ?)
            "#,
            params![
                total_revenue,
                total_expenses,
                total_revenue - total_expenses,
                computed_by
            ],
        )?;
        let analysis_id = tx.last_insert_rowid();

        tx.commit()?;
        Ok(analysis_id)
    }

    /// Persist the three equity summary rows atomically
    pub fn insert_equity_statement(
        &self,
        statement_id: &str,
        entries: &[(EquityEntryType, f64)],
        computed_by: &str,
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO owners_equity_statements (statement_id, entry_type, amount, computed_by)
                VALUES (?, ?, ?, ?)
                "#,
            )?;
            for (entry_type, amount) in entries {
                stmt.execute(params![statement_id, entry_type.as_str(), amount, computed_by])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// List income statement rows, newest first
    pub fn list_income_statements(&self, limit: i64) -> Result<Vec<IncomeStatementEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, statement_id, category, amount, description, computed_by, created_at
            FROM income_statements
            ORDER BY id DESC
            LIMIT ?
            "#,
        )?;
        let entries = stmt
            .query_map(params![limit], row_to_income_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// List equity statement rows, newest first
    pub fn list_equity_statements(&self, limit: i64) -> Result<Vec<EquityStatementEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, statement_id, entry_type, amount, computed_by, created_at
            FROM owners_equity_statements
            ORDER BY id DESC
            LIMIT ?
            "#,
        )?;
        let entries = stmt
            .query_map(params![limit], row_to_equity_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Latest tax analysis snapshot, if any
    pub fn latest_tax_analysis(&self) -> Result<Option<TaxAnalysis>> {
        let conn = self.conn()?;
        let analysis = conn
            .query_row(
                r#"
                SELECT id, total_revenue, total_expenses, net_income, computed_by, created_at
                FROM tax_analysis
                ORDER BY id DESC
                LIMIT 1
                "#,
                [],
                |row| {
                    Ok(TaxAnalysis {
                        id: row.get(0)?,
                        total_revenue: row.get(1)?,
                        total_expenses: row.get(2)?,
                        net_income: row.get(3)?,
                        computed_by: row.get(4)?,
                        created_at: parse_datetime(&row.get::<_, String>(5)?),
                    })
                },
            )
            .optional()?;
        Ok(analysis)
    }
}
