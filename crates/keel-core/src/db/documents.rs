//! Uploaded document operations

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Document, DocumentStatus};

fn row_to_document(row: &Row) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        filename: row.get(1)?,
        store_path: row.get(2)?,
        content_hash: row.get(3)?,
        content_type: row.get(4)?,
        size_bytes: row.get(5)?,
        status: row
            .get::<_, String>(6)?
            .parse()
            .unwrap_or(DocumentStatus::Uploaded),
        uploaded_by: row.get(7)?,
        created_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}

const DOCUMENT_COLS: &str =
    "id, filename, store_path, content_hash, content_type, size_bytes, status, uploaded_by, created_at";

impl Database {
    /// Insert a document row, returning its id
    ///
    /// Content is deduplicated by hash: a second upload of identical bytes
    /// is rejected as invalid data rather than silently duplicated.
    pub fn insert_document(
        &self,
        filename: &str,
        store_path: &str,
        content_hash: &str,
        content_type: Option<&str>,
        size_bytes: i64,
        uploaded_by: &str,
    ) -> Result<i64> {
        let conn = self.conn()?;

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM documents WHERE content_hash = ?",
                params![content_hash],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Err(Error::InvalidData(format!(
                "Document content already uploaded as document {}",
                id
            )));
        }

        conn.execute(
            r#"
            INSERT INTO documents (filename, store_path, content_hash, content_type, size_bytes, uploaded_by)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                filename,
                store_path,
                content_hash,
                content_type,
                size_bytes,
                uploaded_by
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Get a document by id
    pub fn get_document(&self, id: i64) -> Result<Document> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM documents WHERE id = ?", DOCUMENT_COLS),
            params![id],
            row_to_document,
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("Document {}", id)))
    }

    /// List documents, newest first
    pub fn list_documents(&self, limit: i64) -> Result<Vec<Document>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM documents ORDER BY created_at DESC, id DESC LIMIT ?",
            DOCUMENT_COLS
        ))?;

        let documents = stmt
            .query_map(params![limit], row_to_document)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(documents)
    }

    /// Update a document's processing status
    pub fn update_document_status(&self, id: i64, status: DocumentStatus) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE documents SET status = ? WHERE id = ?",
            params![status.as_str(), id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Document {}", id)));
        }
        Ok(())
    }
}
