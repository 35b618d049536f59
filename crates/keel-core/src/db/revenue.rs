//! Revenue record operations

use rusqlite::{params, Row};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{NewRevenueRecord, RevenueRecord};

fn row_to_revenue(row: &Row) -> rusqlite::Result<RevenueRecord> {
    Ok(RevenueRecord {
        id: row.get(0)?,
        amount: row.get(1)?,
        category: row.get(2)?,
        description: row.get(3)?,
        date: row.get::<_, String>(4)?.parse().unwrap_or_default(),
        source_document_id: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

const REVENUE_COLS: &str =
    "id, amount, category, description, date, source_document_id, created_at";

impl Database {
    /// Insert a revenue record, returning its id
    pub fn insert_revenue_record(&self, record: &NewRevenueRecord) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO revenue_records (amount, category, description, date, source_document_id)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                record.amount,
                record.category,
                record.description,
                record.date.to_string(),
                record.source_document_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert a batch of revenue records in one transaction
    pub fn insert_revenue_records(&self, records: &[NewRevenueRecord]) -> Result<Vec<i64>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(records.len());

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO revenue_records (amount, category, description, date, source_document_id)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )?;
            for record in records {
                stmt.execute(params![
                    record.amount,
                    record.category,
                    record.description,
                    record.date.to_string(),
                    record.source_document_id,
                ])?;
                ids.push(tx.last_insert_rowid());
            }
        }

        tx.commit()?;
        Ok(ids)
    }

    /// Get a revenue record by id
    pub fn get_revenue_record(&self, id: i64) -> Result<RevenueRecord> {
        use rusqlite::OptionalExtension;

        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM revenue_records WHERE id = ?", REVENUE_COLS),
            params![id],
            row_to_revenue,
        )
        .optional()?
        .ok_or_else(|| crate::error::Error::NotFound(format!("Revenue record {}", id)))
    }

    /// List revenue records, newest first
    pub fn list_revenue_records(&self, limit: i64) -> Result<Vec<RevenueRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM revenue_records ORDER BY date DESC, id DESC LIMIT ?",
            REVENUE_COLS
        ))?;
        let records = stmt
            .query_map(params![limit], row_to_revenue)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Sum of all revenue record amounts
    pub fn sum_revenue(&self) -> Result<f64> {
        let conn = self.conn()?;
        let total: f64 = conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM revenue_records",
            [],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}
