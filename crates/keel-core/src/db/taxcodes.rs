//! Tax code and state bracket reference data

use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

use super::Database;
use crate::error::Result;
use crate::models::{BusinessType, NewTaxCode, StateTaxBracket, TaxCode};

fn row_to_tax_code(row: &Row) -> rusqlite::Result<TaxCode> {
    Ok(TaxCode {
        id: row.get(0)?,
        code: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        deduction_type: row.get(4)?,
        state: row.get(5)?,
        expense_category: row.get(6)?,
    })
}

const TAX_CODE_COLS: &str = "id, code, description, category, deduction_type, state, expense_category";

impl Database {
    /// Insert a tax code row (idempotent on code)
    pub fn insert_tax_code(&self, code: &NewTaxCode) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT OR IGNORE INTO tax_codes (code, description, category, deduction_type, state, expense_category)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                code.code,
                code.description,
                code.category,
                code.deduction_type,
                code.state,
                code.expense_category
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// List every tax code
    pub fn list_tax_codes(&self) -> Result<Vec<TaxCode>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tax_codes ORDER BY category, code",
            TAX_CODE_COLS
        ))?;
        let codes = stmt
            .query_map([], row_to_tax_code)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(codes)
    }

    /// Find the tax code id for an expense category in a state
    ///
    /// Prefers a row scoped to the given state, then falls back to a
    /// stateless (every-state) row.
    pub fn find_tax_code_for_category(&self, category: &str, state: &str) -> Result<Option<i64>> {
        let conn = self.conn()?;
        let id: Option<i64> = conn
            .query_row(
                r#"
                SELECT id FROM tax_codes
                WHERE category = ? AND (state = ? OR state IS NULL)
                ORDER BY state IS NULL
                LIMIT 1
                "#,
                params![category, state],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Fetch the bracket schedule for a (state, business type) pair,
    /// sorted ascending by min_income
    pub fn get_tax_brackets(
        &self,
        state: &str,
        business_type: BusinessType,
    ) -> Result<Vec<StateTaxBracket>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, state, business_type, min_income, max_income, rate
            FROM state_tax_brackets
            WHERE state = ? AND business_type = ?
            ORDER BY min_income ASC
            "#,
        )?;

        let brackets = stmt
            .query_map(params![state, business_type.as_str()], |row| {
                Ok(StateTaxBracket {
                    id: row.get(0)?,
                    state: row.get(1)?,
                    business_type: row
                        .get::<_, String>(2)?
                        .parse()
                        .unwrap_or(BusinessType::SoleProprietorship),
                    min_income: row.get(3)?,
                    max_income: row.get(4)?,
                    rate: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(brackets)
    }

    /// Seed the default tax code reference data (idempotent)
    pub fn seed_tax_codes(&self) -> Result<()> {
        let codes = [
            ("T100", "Vehicle and transportation expenses", "Transportation"),
            ("T110", "Office supplies and materials", "Office Supplies"),
            ("T120", "Business meals and entertainment", "Meals & Entertainment"),
            ("T130", "Business travel", "Travel"),
            ("T140", "Utilities and communications", "Utilities"),
            ("T150", "Professional and legal services", "Professional Services"),
            ("T160", "Business insurance premiums", "Insurance"),
            ("T170", "Rent and lease payments", "Rent & Lease"),
            ("T180", "Advertising and marketing", "Marketing"),
            ("T190", "Equipment and machinery", "Equipment"),
        ];

        for (code, description, category) in codes {
            self.insert_tax_code(&NewTaxCode {
                code: code.to_string(),
                description: description.to_string(),
                category: category.to_string(),
                deduction_type: "standard".to_string(),
                state: None,
                expense_category: Some(category.to_string()),
            })?;
        }

        info!("Tax codes seeded");
        Ok(())
    }

    /// Seed the default state bracket schedules (idempotent)
    ///
    /// Each (state, business_type) schedule tiles [0, inf) with an
    /// open-ended top bracket. Corporations in CA/NY are taxed at a flat
    /// rate by the engine, but a schedule is still seeded so states without
    /// a configured flat rate have something to walk.
    pub fn seed_tax_brackets(&self) -> Result<()> {
        let conn = self.conn()?;

        let existing: i64 =
            conn.query_row("SELECT COUNT(*) FROM state_tax_brackets", [], |row| {
                row.get(0)
            })?;
        if existing > 0 {
            return Ok(());
        }

        // (min, max, rate) triples; None = open-ended top bracket
        let ca: &[(f64, Option<f64>, f64)] = &[
            (0.0, Some(10_000.0), 0.01),
            (10_000.0, Some(50_000.0), 0.02),
            (50_000.0, Some(100_000.0), 0.04),
            (100_000.0, Some(300_000.0), 0.06),
            (300_000.0, Some(1_000_000.0), 0.08),
            (1_000_000.0, None, 0.093),
        ];
        let ny: &[(f64, Option<f64>, f64)] = &[
            (0.0, Some(8_500.0), 0.04),
            (8_500.0, Some(11_700.0), 0.045),
            (11_700.0, Some(13_900.0), 0.0525),
            (13_900.0, Some(80_650.0), 0.0585),
            (80_650.0, Some(215_400.0), 0.0625),
            (215_400.0, Some(1_077_550.0), 0.0685),
            (1_077_550.0, None, 0.0965),
        ];
        // No state income tax
        let tx: &[(f64, Option<f64>, f64)] = &[(0.0, None, 0.0)];

        let business_types = [
            BusinessType::Corporation,
            BusinessType::Llc,
            BusinessType::SoleProprietorship,
            BusinessType::Partnership,
        ];

        let mut stmt = conn.prepare(
            r#"
            INSERT INTO state_tax_brackets (state, business_type, min_income, max_income, rate)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )?;

        for (state, schedule) in [("CA", ca), ("NY", ny), ("TX", tx)] {
            for business_type in business_types {
                for (min_income, max_income, rate) in schedule {
                    stmt.execute(params![
                        state,
                        business_type.as_str(),
                        min_income,
                        max_income,
                        rate
                    ])?;
                }
            }
        }

        info!("State tax brackets seeded");
        Ok(())
    }
}
