//! Tax liability calculation
//!
//! Computes taxable income from approved write-offs and revenue records,
//! applies the flat federal rate, then state tax by business type:
//! corporations get a flat per-state rate, LLCs pay bracket tax plus a
//! revenue-tiered minimum fee, and everything else walks the progressive
//! bracket schedule. A jurisdiction minimum-tax floor and the CA
//! high-income surtax are applied on top.

use tracing::{debug, error};

use crate::db::Database;
use crate::models::{BusinessType, StateTaxBracket, TaxCalculationResult};

/// Tax policy constants
///
/// The federal rate is flat 21% for every business type - the state logic
/// branches by business type but the federal side deliberately does not.
#[derive(Debug, Clone)]
pub struct TaxConfig {
    pub federal_rate: f64,
    /// Franchise-tax floor applied to every filer
    pub minimum_franchise_tax: f64,
    /// Per-state corporate flat rates; states absent here fall back to the
    /// bracket schedule
    pub corporate_flat_rates: Vec<(&'static str, f64)>,
    /// LLC minimum-fee tiers as (revenue threshold, fee), ascending;
    /// revenue below every threshold pays the franchise floor
    pub llc_fee_tiers: Vec<(f64, f64)>,
    pub surtax_state: &'static str,
    pub surtax_threshold: f64,
    pub surtax_rate: f64,
}

impl Default for TaxConfig {
    fn default() -> Self {
        Self {
            federal_rate: 0.21,
            minimum_franchise_tax: 800.0,
            corporate_flat_rates: vec![("CA", 0.0884), ("NY", 0.0725)],
            llc_fee_tiers: vec![
                (250_000.0, 900.0),
                (500_000.0, 2_500.0),
                (1_000_000.0, 6_000.0),
                (5_000_000.0, 11_790.0),
            ],
            surtax_state: "CA",
            surtax_threshold: 1_000_000.0,
            surtax_rate: 0.01,
        }
    }
}

/// Tax calculation engine over persisted revenue and write-off totals
pub struct TaxEngine<'a> {
    db: &'a Database,
    config: TaxConfig,
}

impl<'a> TaxEngine<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            config: TaxConfig::default(),
        }
    }

    pub fn with_config(db: &'a Database, config: TaxConfig) -> Self {
        Self { db, config }
    }

    /// Compute the full tax liability for a business type in a state
    ///
    /// A storage failure degrades to an all-zero result with a logged
    /// error rather than propagating - callers must treat a simultaneously
    /// all-zero result as "calculation unavailable", not zero liability.
    pub fn calculate(&self, business_type: BusinessType, state: &str) -> TaxCalculationResult {
        let (total_expenses, total_revenue, brackets) = match self.fetch_inputs(business_type, state)
        {
            Ok(inputs) => inputs,
            Err(e) => {
                error!(error = %e, %business_type, state, "Tax calculation unavailable");
                return TaxCalculationResult::default();
            }
        };

        let taxable_income = (total_revenue - total_expenses).max(0.0);
        let federal_tax = taxable_income * self.config.federal_rate;

        let computed_state_tax = match business_type {
            BusinessType::Corporation => self
                .corporate_flat_rate(state)
                .map(|rate| taxable_income * rate)
                .unwrap_or_else(|| bracket_tax(&brackets, taxable_income)),
            _ => bracket_tax(&brackets, taxable_income),
        };

        let minimum_tax = match business_type {
            BusinessType::Llc => self.llc_minimum_fee(total_revenue),
            _ => self.config.minimum_franchise_tax,
        };

        let mut state_tax = computed_state_tax.max(minimum_tax);

        if state == self.config.surtax_state && taxable_income > self.config.surtax_threshold {
            state_tax += self.config.surtax_rate * (taxable_income - self.config.surtax_threshold);
        }

        let total_tax = federal_tax + state_tax;
        let effective_rate = if total_revenue > 0.0 {
            total_tax / total_revenue * 100.0
        } else {
            0.0
        };

        debug!(
            %business_type,
            state,
            taxable_income,
            federal_tax,
            state_tax,
            "Tax calculation complete"
        );

        TaxCalculationResult {
            total_revenue,
            total_expenses,
            taxable_income,
            federal_tax,
            state_tax,
            minimum_tax,
            total_tax,
            effective_rate,
        }
    }

    fn fetch_inputs(
        &self,
        business_type: BusinessType,
        state: &str,
    ) -> crate::error::Result<(f64, f64, Vec<StateTaxBracket>)> {
        let total_expenses = self.db.sum_approved_write_offs()?;
        let total_revenue = self.db.sum_revenue()?;
        let brackets = self.db.get_tax_brackets(state, business_type)?;
        Ok((total_expenses, total_revenue, brackets))
    }

    fn corporate_flat_rate(&self, state: &str) -> Option<f64> {
        self.config
            .corporate_flat_rates
            .iter()
            .find(|(s, _)| *s == state)
            .map(|(_, rate)| *rate)
    }

    /// Revenue-tiered LLC minimum fee, defaulting to the franchise floor
    fn llc_minimum_fee(&self, total_revenue: f64) -> f64 {
        self.config
            .llc_fee_tiers
            .iter()
            .rev()
            .find(|(threshold, _)| total_revenue >= *threshold)
            .map(|(_, fee)| *fee)
            .unwrap_or(self.config.minimum_franchise_tax)
    }
}

/// Walk a sorted bracket schedule, taxing each income slice exactly once
///
/// Brackets are taken in ascending min_income order; each taxes
/// min(remaining, bracket width) at its rate, so no slice is taxed twice
/// or skipped as long as the schedule tiles [0, inf).
pub fn bracket_tax(brackets: &[StateTaxBracket], taxable_income: f64) -> f64 {
    let mut remaining = taxable_income;
    let mut tax = 0.0;

    for bracket in brackets {
        if remaining <= 0.0 {
            break;
        }
        let width = match bracket.max_income {
            Some(max) => max - bracket.min_income,
            None => f64::INFINITY,
        };
        let slice = remaining.min(width);
        tax += slice * bracket.rate;
        remaining -= slice;
    }

    tax
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewRevenueRecord, NewWriteOff, WriteOffStatus};
    use chrono::NaiveDate;

    fn bracket(min: f64, max: Option<f64>, rate: f64) -> StateTaxBracket {
        StateTaxBracket {
            id: 0,
            state: "CA".to_string(),
            business_type: BusinessType::SoleProprietorship,
            min_income: min,
            max_income: max,
            rate,
        }
    }

    fn ca_schedule() -> Vec<StateTaxBracket> {
        vec![
            bracket(0.0, Some(10_000.0), 0.01),
            bracket(10_000.0, Some(50_000.0), 0.02),
            bracket(50_000.0, Some(100_000.0), 0.04),
            bracket(100_000.0, Some(300_000.0), 0.06),
            bracket(300_000.0, Some(1_000_000.0), 0.08),
            bracket(1_000_000.0, None, 0.093),
        ]
    }

    #[test]
    fn test_bracket_tax_zero_income() {
        assert_eq!(bracket_tax(&ca_schedule(), 0.0), 0.0);
    }

    #[test]
    fn test_bracket_tax_mid_schedule() {
        // 10k * 1% + 40k * 2% + 10k * 4% = 100 + 800 + 400
        let tax = bracket_tax(&ca_schedule(), 60_000.0);
        assert!((tax - 1300.0).abs() < 1e-9);
    }

    #[test]
    fn test_bracket_tax_top_bracket() {
        // Full schedule below 1M plus the open-ended remainder
        let below = 10_000.0 * 0.01
            + 40_000.0 * 0.02
            + 50_000.0 * 0.04
            + 200_000.0 * 0.06
            + 700_000.0 * 0.08;
        let tax = bracket_tax(&ca_schedule(), 1_500_000.0);
        assert!((tax - (below + 500_000.0 * 0.093)).abs() < 1e-6);
    }

    #[test]
    fn test_bracket_tax_no_double_counting() {
        // Per-slice accumulation must equal the closed-form sum over the
        // schedule for any income - check a grid of incomes.
        let schedule = ca_schedule();
        for income in [5_000.0, 10_000.0, 49_999.0, 100_000.0, 765_432.0] {
            let reference: f64 = schedule
                .iter()
                .map(|b| {
                    let upper = b.max_income.unwrap_or(f64::INFINITY).min(income);
                    (upper - b.min_income).max(0.0) * b.rate
                })
                .sum();
            assert!((bracket_tax(&schedule, income) - reference).abs() < 1e-9);
        }
    }

    fn setup_db(revenue: f64, approved_expenses: f64) -> Database {
        let db = Database::in_memory().unwrap();
        db.seed_tax_brackets().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        if revenue > 0.0 {
            db.insert_revenue_record(&NewRevenueRecord {
                amount: revenue,
                category: "sales".to_string(),
                description: "annual sales".to_string(),
                date,
                source_document_id: None,
            })
            .unwrap();
        }
        if approved_expenses > 0.0 {
            db.insert_write_off(&NewWriteOff {
                amount: approved_expenses,
                description: "operating costs".to_string(),
                date,
                tax_code_id: None,
                status: WriteOffStatus::Approved,
                source_document_id: None,
            })
            .unwrap();
        }
        db
    }

    #[test]
    fn test_taxable_income_never_negative() {
        let db = setup_db(50_000.0, 80_000.0);
        let result = TaxEngine::new(&db).calculate(BusinessType::SoleProprietorship, "CA");
        assert_eq!(result.taxable_income, 0.0);
        assert_eq!(result.federal_tax, 0.0);
        // The franchise floor still applies on zero income
        assert_eq!(result.state_tax, 800.0);
    }

    #[test]
    fn test_pending_write_offs_excluded() {
        let db = setup_db(100_000.0, 0.0);
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        db.insert_write_off(&NewWriteOff {
            amount: 30_000.0,
            description: "unreviewed".to_string(),
            date,
            tax_code_id: None,
            status: WriteOffStatus::Pending,
            source_document_id: None,
        })
        .unwrap();

        let result = TaxEngine::new(&db).calculate(BusinessType::SoleProprietorship, "CA");
        assert_eq!(result.total_expenses, 0.0);
        assert_eq!(result.taxable_income, 100_000.0);
    }

    #[test]
    fn test_corporation_flat_rate_with_surtax() {
        // taxable 1.5M in CA: 8.84% flat plus 1% of the slice over 1M
        let db = setup_db(1_500_000.0, 0.0);
        let result = TaxEngine::new(&db).calculate(BusinessType::Corporation, "CA");

        assert_eq!(result.taxable_income, 1_500_000.0);
        let expected_state = 1_500_000.0 * 0.0884 + 500_000.0 * 0.01;
        assert!((result.state_tax - expected_state).abs() < 1e-6);
        assert!((result.federal_tax - 1_500_000.0 * 0.21).abs() < 1e-6);
        assert!(
            (result.total_tax - (result.federal_tax + result.state_tax)).abs() < 1e-9
        );
    }

    #[test]
    fn test_llc_minimum_fee_floor_wins() {
        // 6M revenue lands in the top fee tier (11,790); with heavy
        // deductions the bracket tax stays small and the floor wins.
        let db = setup_db(6_000_000.0, 5_880_000.0);
        let result = TaxEngine::new(&db).calculate(BusinessType::Llc, "CA");

        assert_eq!(result.taxable_income, 120_000.0);
        assert_eq!(result.minimum_tax, 11_790.0);
        // Bracket tax on 120k is 100 + 800 + 2000 + 1200 = 4100, under the fee
        assert_eq!(result.state_tax, 11_790.0);
    }

    #[test]
    fn test_llc_fee_tiers() {
        let db = Database::in_memory().unwrap();
        let engine = TaxEngine::new(&db);
        assert_eq!(engine.llc_minimum_fee(100_000.0), 800.0);
        assert_eq!(engine.llc_minimum_fee(250_000.0), 900.0);
        assert_eq!(engine.llc_minimum_fee(499_999.0), 900.0);
        assert_eq!(engine.llc_minimum_fee(500_000.0), 2_500.0);
        assert_eq!(engine.llc_minimum_fee(1_000_000.0), 6_000.0);
        assert_eq!(engine.llc_minimum_fee(5_000_000.0), 11_790.0);
        assert_eq!(engine.llc_minimum_fee(6_000_000.0), 11_790.0);
    }

    #[test]
    fn test_state_tax_floor_on_small_income() {
        // Bracket tax on 20k is 100 + 200 = 300, under the 800 floor
        let db = setup_db(20_000.0, 0.0);
        let result = TaxEngine::new(&db).calculate(BusinessType::SoleProprietorship, "CA");
        assert_eq!(result.minimum_tax, 800.0);
        assert_eq!(result.state_tax, 800.0);
    }

    #[test]
    fn test_effective_rate_zero_revenue() {
        let db = setup_db(0.0, 0.0);
        let result = TaxEngine::new(&db).calculate(BusinessType::SoleProprietorship, "CA");
        assert_eq!(result.effective_rate, 0.0);
    }

    #[test]
    fn test_effective_rate() {
        let db = setup_db(200_000.0, 50_000.0);
        let result = TaxEngine::new(&db).calculate(BusinessType::Partnership, "NY");
        assert!(result.effective_rate > 0.0);
        let expected = result.total_tax / 200_000.0 * 100.0;
        assert!((result.effective_rate - expected).abs() < 1e-9);
    }
}
