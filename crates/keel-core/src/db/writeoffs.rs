//! Write-off operations

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{NewWriteOff, WriteOff, WriteOffStatus};

fn row_to_write_off(row: &Row) -> rusqlite::Result<WriteOff> {
    Ok(WriteOff {
        id: row.get(0)?,
        amount: row.get(1)?,
        description: row.get(2)?,
        date: row
            .get::<_, String>(3)?
            .parse()
            .unwrap_or_default(),
        tax_code_id: row.get(4)?,
        status: row
            .get::<_, String>(5)?
            .parse()
            .unwrap_or(WriteOffStatus::Pending),
        source_document_id: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

const WRITE_OFF_COLS: &str =
    "id, amount, description, date, tax_code_id, status, source_document_id, created_at";

impl Database {
    /// Insert a write-off, returning its id
    pub fn insert_write_off(&self, write_off: &NewWriteOff) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO write_offs (amount, description, date, tax_code_id, status, source_document_id)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                write_off.amount,
                write_off.description,
                write_off.date.to_string(),
                write_off.tax_code_id,
                write_off.status.as_str(),
                write_off.source_document_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert a batch of write-offs in one transaction
    ///
    /// All-or-nothing: a failure on any row rolls the whole batch back so
    /// a partially ingested document never leaves stray rows behind.
    pub fn insert_write_offs(&self, write_offs: &[NewWriteOff]) -> Result<Vec<i64>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(write_offs.len());

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO write_offs (amount, description, date, tax_code_id, status, source_document_id)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )?;
            for write_off in write_offs {
                stmt.execute(params![
                    write_off.amount,
                    write_off.description,
                    write_off.date.to_string(),
                    write_off.tax_code_id,
                    write_off.status.as_str(),
                    write_off.source_document_id,
                ])?;
                ids.push(tx.last_insert_rowid());
            }
        }

        tx.commit()?;
        Ok(ids)
    }

    /// Get a write-off by id
    pub fn get_write_off(&self, id: i64) -> Result<WriteOff> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM write_offs WHERE id = ?", WRITE_OFF_COLS),
            params![id],
            row_to_write_off,
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("Write-off {}", id)))
    }

    /// List write-offs, newest first, optionally filtered by status
    pub fn list_write_offs(
        &self,
        status: Option<WriteOffStatus>,
        limit: i64,
    ) -> Result<Vec<WriteOff>> {
        let conn = self.conn()?;

        let write_offs = match status {
            Some(s) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM write_offs WHERE status = ? ORDER BY date DESC, id DESC LIMIT ?",
                    WRITE_OFF_COLS
                ))?;
                let rows = stmt
                    .query_map(params![s.as_str(), limit], row_to_write_off)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM write_offs ORDER BY date DESC, id DESC LIMIT ?",
                    WRITE_OFF_COLS
                ))?;
                let rows = stmt
                    .query_map(params![limit], row_to_write_off)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };

        Ok(write_offs)
    }

    /// Update a write-off's review status
    pub fn update_write_off_status(&self, id: i64, status: WriteOffStatus) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE write_offs SET status = ? WHERE id = ?",
            params![status.as_str(), id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Write-off {}", id)));
        }
        Ok(())
    }

    /// Sum of approved write-off amounts (total deductions)
    pub fn sum_approved_write_offs(&self) -> Result<f64> {
        let conn = self.conn()?;
        let total: f64 = conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM write_offs WHERE status = 'approved'",
            [],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}
