//! Statement aggregation over classified transactions
//!
//! Rolls a batch of classified transactions up into owners-equity summary
//! rows and per-transaction income statement rows plus a tax analysis
//! snapshot. Persistence for each aggregation is a single atomic batch so
//! concurrent uploads cannot leave partial aggregates behind.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tracing::debug;

use crate::db::Database;
use crate::error::Result;
use crate::models::{
    ClassifiedTransaction, EquityEntryType, EquityStatement, IncomeCategory, IncomeSummary,
    TransactionType,
};

/// Description keywords routing a transaction to the withdrawals bucket
const WITHDRAWAL_KEYWORDS: &[&str] = &["withdrawal", "distribution", "owner draw"];

/// Description keywords routing a transaction to the investments bucket
const INVESTMENT_KEYWORDS: &[&str] = &["investment", "contribution", "capital injection"];

/// Generate a statement grouping key unique within this process
fn next_statement_id(prefix: &str) -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let seq = COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}-{}", prefix, Utc::now().format("%Y%m%d%H%M%S"), seq)
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Aggregate a batch into the three owners-equity summary rows
///
/// Transactions are partitioned by description keyword: withdrawals and
/// distributions, investments and contributions, and everything else as
/// operating activity feeding net income (amounts are already
/// sign-normalized, so the operating sum is net income directly).
pub fn aggregate_equity(
    db: &Database,
    transactions: &[ClassifiedTransaction],
    computed_by: &str,
) -> Result<EquityStatement> {
    let mut net_income = 0.0;
    let mut withdrawals = 0.0;
    let mut investments = 0.0;

    for tx in transactions {
        let text = tx.description.to_lowercase();
        if contains_any(&text, WITHDRAWAL_KEYWORDS) {
            withdrawals += tx.amount.abs();
        } else if contains_any(&text, INVESTMENT_KEYWORDS) {
            investments += tx.amount.abs();
        } else {
            net_income += tx.amount;
        }
    }

    let statement_id = next_statement_id("eq");
    db.insert_equity_statement(
        &statement_id,
        &[
            (EquityEntryType::NetIncome, net_income),
            (EquityEntryType::OwnerWithdrawals, withdrawals),
            (EquityEntryType::OwnerInvestments, investments),
        ],
        computed_by,
    )?;

    debug!(
        statement_id,
        net_income, withdrawals, investments, "Equity statement aggregated"
    );

    Ok(EquityStatement {
        statement_id,
        net_income,
        owner_withdrawals: withdrawals,
        owner_investments: investments,
    })
}

/// Pick the fine income statement category for one transaction
pub fn income_category(tx: &ClassifiedTransaction) -> IncomeCategory {
    let text = tx.description.to_lowercase();
    match tx.tx_type {
        TransactionType::Revenue => {
            if text.contains("interest") {
                IncomeCategory::InterestIncome
            } else if text.contains("investment") || text.contains("dividend") {
                IncomeCategory::InvestmentIncome
            } else {
                IncomeCategory::SalesRevenue
            }
        }
        TransactionType::Expense => {
            if contains_any(&text, &["inventory", "materials", "goods", "supplier"]) {
                IncomeCategory::CostOfGoodsSold
            } else if contains_any(&text, &["salary", "payroll", "wages"]) {
                IncomeCategory::SalaryExpense
            } else if contains_any(&text, &["rent", "lease"]) {
                IncomeCategory::RentExpense
            } else if contains_any(&text, &["utility", "utilities", "electric", "water", "internet", "phone"])
            {
                IncomeCategory::UtilityExpense
            } else {
                IncomeCategory::Other
            }
        }
    }
}

/// Aggregate a batch into income statement rows plus a tax analysis snapshot
///
/// One row per transaction in the fine category set, then the
/// (total_revenue, total_expenses, net_income) summary - persisted together
/// in one transaction and reusable by the tax engine as a snapshot.
pub fn aggregate_income(
    db: &Database,
    transactions: &[ClassifiedTransaction],
    computed_by: &str,
) -> Result<IncomeSummary> {
    let mut entries = Vec::with_capacity(transactions.len());
    let mut total_revenue = 0.0;
    let mut total_expenses = 0.0;

    for tx in transactions {
        match tx.tx_type {
            TransactionType::Revenue => total_revenue += tx.amount.abs(),
            TransactionType::Expense => total_expenses += tx.amount.abs(),
        }
        entries.push((income_category(tx), tx.amount, tx.description.clone()));
    }

    let statement_id = next_statement_id("inc");
    db.insert_income_statement(
        &statement_id,
        &entries,
        total_revenue,
        total_expenses,
        computed_by,
    )?;

    debug!(
        statement_id,
        total_revenue,
        total_expenses,
        entries = entries.len(),
        "Income statement aggregated"
    );

    Ok(IncomeSummary {
        statement_id,
        total_revenue,
        total_expenses,
        net_income: total_revenue - total_expenses,
        entry_count: entries.len(),
    })
}
