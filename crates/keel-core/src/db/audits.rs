//! Audit and audit item operations

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Audit, AuditItem, AuditItemStatus, AuditStatus, NewAuditItem};

fn row_to_audit(row: &Row) -> rusqlite::Result<Audit> {
    Ok(Audit {
        id: row.get(0)?,
        title: row.get(1)?,
        status: row
            .get::<_, String>(2)?
            .parse()
            .unwrap_or(AuditStatus::Open),
        risk_score: row.get(3)?,
        ai_summary: row.get(4)?,
        created_by: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

fn row_to_audit_item(row: &Row) -> rusqlite::Result<AuditItem> {
    Ok(AuditItem {
        id: row.get(0)?,
        audit_id: row.get(1)?,
        amount: row.get(2)?,
        category: row.get(3)?,
        description: row.get(4)?,
        date: row.get::<_, String>(5)?.parse().unwrap_or_default(),
        status: row
            .get::<_, String>(6)?
            .parse()
            .unwrap_or(AuditItemStatus::Pending),
        created_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

const AUDIT_COLS: &str = "id, title, status, risk_score, ai_summary, created_by, created_at";
const AUDIT_ITEM_COLS: &str =
    "id, audit_id, amount, category, description, date, status, created_at";

impl Database {
    /// Create an audit and snapshot its items in one transaction
    pub fn create_audit(
        &self,
        title: &str,
        items: &[NewAuditItem],
        created_by: &str,
    ) -> Result<i64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO audits (title, created_by) VALUES (?, ?)",
            params![title, created_by],
        )?;
        let audit_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO audit_items (audit_id, amount, category, description, date)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )?;
            for item in items {
                stmt.execute(params![
                    audit_id,
                    item.amount,
                    item.category,
                    item.description,
                    item.date.to_string(),
                ])?;
            }
        }

        tx.commit()?;
        Ok(audit_id)
    }

    /// Get an audit by id
    pub fn get_audit(&self, id: i64) -> Result<Audit> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM audits WHERE id = ?", AUDIT_COLS),
            params![id],
            row_to_audit,
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("Audit {}", id)))
    }

    /// List audits, newest first
    pub fn list_audits(&self, limit: i64) -> Result<Vec<Audit>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM audits ORDER BY id DESC LIMIT ?",
            AUDIT_COLS
        ))?;
        let audits = stmt
            .query_map(params![limit], row_to_audit)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(audits)
    }

    /// List the items under an audit
    pub fn list_audit_items(&self, audit_id: i64) -> Result<Vec<AuditItem>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM audit_items WHERE audit_id = ? ORDER BY date, id",
            AUDIT_ITEM_COLS
        ))?;
        let items = stmt
            .query_map(params![audit_id], row_to_audit_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    /// Record a scoring run on an audit
    pub fn set_audit_score(
        &self,
        audit_id: i64,
        risk_score: f64,
        ai_summary: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE audits SET risk_score = ?, ai_summary = ? WHERE id = ?",
            params![risk_score, ai_summary, audit_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Audit {}", audit_id)));
        }
        Ok(())
    }

    /// Flag a set of audit items (e.g. the ones implicated by anomalies)
    pub fn flag_audit_items(&self, item_ids: &[i64]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare("UPDATE audit_items SET status = 'flagged' WHERE id = ?")?;
            for id in item_ids {
                stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Mark an audit completed
    pub fn complete_audit(&self, audit_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE audits SET status = 'completed' WHERE id = ?",
            params![audit_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Audit {}", audit_id)));
        }
        Ok(())
    }
}
