//! Domain models for Keel

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Classified transaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Revenue,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::Expense => "expense",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "revenue" => Ok(Self::Revenue),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output of the keyword classifier
///
/// Confidence is a [0,1] strength-of-match heuristic, not a probability.
/// The sign-based fallback always produces exactly 0.5.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub tx_type: TransactionType,
    pub confidence: f64,
}

/// A classified line item extracted from a document
///
/// Transient parser output - consumed by the statement aggregators and the
/// tax-code matcher, never persisted directly. The classifier's `tx_type` is
/// authoritative; `amount` is normalized to negative-for-expense,
/// positive-for-revenue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedTransaction {
    pub amount: f64,
    pub description: String,
    pub tx_type: TransactionType,
    pub confidence: f64,
    /// 1-based data-row or line number within the source document
    pub source_line: usize,
}

/// Parser output: classified transactions plus human-readable findings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub transactions: Vec<ClassifiedTransaction>,
    pub findings: Vec<String>,
}

/// Supported document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Delimited text with a header row (CSV ledgers)
    Delimited,
    /// Unstructured line text (receipts, free text)
    Lines,
}

impl DocumentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delimited => "delimited",
            Self::Lines => "lines",
        }
    }
}

impl std::str::FromStr for DocumentFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "delimited" | "csv" => Ok(Self::Delimited),
            "lines" | "text" => Ok(Self::Lines),
            _ => Err(format!("Unknown document format: {}", s)),
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Processing status of an uploaded document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Uploaded,
    Processed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "uploaded" => Ok(Self::Uploaded),
            "processed" => Ok(Self::Processed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown document status: {}", s)),
        }
    }
}

/// An uploaded source document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub filename: String,
    /// Object-store path the raw bytes live at
    pub store_path: String,
    /// SHA-256 of the content, for deduplication
    pub content_hash: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub status: DocumentStatus,
    pub uploaded_by: String,
    pub created_at: DateTime<Utc>,
}

/// A jurisdiction-scoped tax code (reference data)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxCode {
    pub id: i64,
    pub code: String,
    pub description: String,
    pub category: String,
    pub deduction_type: String,
    /// None = applies in every state
    pub state: Option<String>,
    pub expense_category: Option<String>,
}

/// Seed data for a tax code row
#[derive(Debug, Clone)]
pub struct NewTaxCode {
    pub code: String,
    pub description: String,
    pub category: String,
    pub deduction_type: String,
    pub state: Option<String>,
    pub expense_category: Option<String>,
}

/// Review status of a write-off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WriteOffStatus {
    #[default]
    Pending,
    Approved,
}

impl WriteOffStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
        }
    }
}

impl std::str::FromStr for WriteOffStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            _ => Err(format!("Unknown write-off status: {}", s)),
        }
    }
}

impl std::fmt::Display for WriteOffStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recorded business expense eligible for deduction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteOff {
    pub id: i64,
    pub amount: f64,
    pub description: String,
    pub date: NaiveDate,
    pub tax_code_id: Option<i64>,
    pub status: WriteOffStatus,
    /// Document this write-off was extracted from, if any
    pub source_document_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// A write-off to be inserted
#[derive(Debug, Clone)]
pub struct NewWriteOff {
    pub amount: f64,
    pub description: String,
    pub date: NaiveDate,
    pub tax_code_id: Option<i64>,
    pub status: WriteOffStatus,
    pub source_document_id: Option<i64>,
}

/// A revenue record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueRecord {
    pub id: i64,
    pub amount: f64,
    pub category: String,
    pub description: String,
    pub date: NaiveDate,
    pub source_document_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// A revenue record to be inserted
#[derive(Debug, Clone)]
pub struct NewRevenueRecord {
    pub amount: f64,
    pub category: String,
    pub description: String,
    pub date: NaiveDate,
    pub source_document_id: Option<i64>,
}

/// Business entity type for state tax treatment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessType {
    Corporation,
    Llc,
    SoleProprietorship,
    Partnership,
}

impl BusinessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Corporation => "corporation",
            Self::Llc => "llc",
            Self::SoleProprietorship => "sole_proprietorship",
            Self::Partnership => "partnership",
        }
    }
}

impl std::str::FromStr for BusinessType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "corporation" | "corp" => Ok(Self::Corporation),
            "llc" => Ok(Self::Llc),
            "sole_proprietorship" | "sole-proprietorship" => Ok(Self::SoleProprietorship),
            "partnership" => Ok(Self::Partnership),
            _ => Err(format!("Unknown business type: {}", s)),
        }
    }
}

impl std::fmt::Display for BusinessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One bracket of a progressive state tax schedule
///
/// Brackets for a given (state, business_type) must tile [0, inf) with no
/// gaps or overlaps; `max_income = None` marks the open-ended top bracket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTaxBracket {
    pub id: i64,
    pub state: String,
    pub business_type: BusinessType,
    pub min_income: f64,
    pub max_income: Option<f64>,
    pub rate: f64,
}

/// Result of a tax liability calculation
///
/// An all-zero result paired with a logged error means "calculation
/// unavailable", not zero liability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxCalculationResult {
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub taxable_income: f64,
    pub federal_tax: f64,
    pub state_tax: f64,
    pub minimum_tax: f64,
    pub total_tax: f64,
    /// Percentage of total revenue, 0 when there is no revenue
    pub effective_rate: f64,
}

/// Persisted income/expense summary snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxAnalysis {
    pub id: i64,
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub net_income: f64,
    pub computed_by: String,
    pub created_at: DateTime<Utc>,
}

/// Fine-grained income statement category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeCategory {
    SalesRevenue,
    InterestIncome,
    InvestmentIncome,
    CostOfGoodsSold,
    SalaryExpense,
    RentExpense,
    UtilityExpense,
    Other,
}

impl IncomeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SalesRevenue => "sales_revenue",
            Self::InterestIncome => "interest_income",
            Self::InvestmentIncome => "investment_income",
            Self::CostOfGoodsSold => "cost_of_goods_sold",
            Self::SalaryExpense => "salary_expense",
            Self::RentExpense => "rent_expense",
            Self::UtilityExpense => "utility_expense",
            Self::Other => "other",
        }
    }
}

impl std::str::FromStr for IncomeCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sales_revenue" => Ok(Self::SalesRevenue),
            "interest_income" => Ok(Self::InterestIncome),
            "investment_income" => Ok(Self::InvestmentIncome),
            "cost_of_goods_sold" => Ok(Self::CostOfGoodsSold),
            "salary_expense" => Ok(Self::SalaryExpense),
            "rent_expense" => Ok(Self::RentExpense),
            "utility_expense" => Ok(Self::UtilityExpense),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown income category: {}", s)),
        }
    }
}

impl std::fmt::Display for IncomeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One persisted income statement row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomeStatementEntry {
    pub id: i64,
    /// Groups the rows produced by one aggregation run
    pub statement_id: String,
    pub category: IncomeCategory,
    pub amount: f64,
    pub description: String,
    pub computed_by: String,
    pub created_at: DateTime<Utc>,
}

/// Totals produced by one income aggregation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeSummary {
    pub statement_id: String,
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub net_income: f64,
    pub entry_count: usize,
}

/// Owners-equity statement entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquityEntryType {
    NetIncome,
    OwnerWithdrawals,
    OwnerInvestments,
}

impl EquityEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetIncome => "net_income",
            Self::OwnerWithdrawals => "owner_withdrawals",
            Self::OwnerInvestments => "owner_investments",
        }
    }
}

impl std::str::FromStr for EquityEntryType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "net_income" => Ok(Self::NetIncome),
            "owner_withdrawals" => Ok(Self::OwnerWithdrawals),
            "owner_investments" => Ok(Self::OwnerInvestments),
            _ => Err(format!("Unknown equity entry type: {}", s)),
        }
    }
}

/// One persisted owners-equity statement row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityStatementEntry {
    pub id: i64,
    pub statement_id: String,
    pub entry_type: EquityEntryType,
    pub amount: f64,
    pub computed_by: String,
    pub created_at: DateTime<Utc>,
}

/// Summary of one equity aggregation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityStatement {
    pub statement_id: String,
    pub net_income: f64,
    pub owner_withdrawals: f64,
    pub owner_investments: f64,
}

/// Review status of an audit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    #[default]
    Open,
    Completed,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Completed => "completed",
        }
    }
}

impl std::str::FromStr for AuditStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Unknown audit status: {}", s)),
        }
    }
}

/// An audit over a snapshot of recent activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Audit {
    pub id: i64,
    pub title: String,
    pub status: AuditStatus,
    /// Composite risk score from the last scoring run
    pub risk_score: Option<f64>,
    /// Advisory AI summary, when a backend was available
    pub ai_summary: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Status of an individual audit item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuditItemStatus {
    #[default]
    Pending,
    Flagged,
}

impl AuditItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Flagged => "flagged",
        }
    }
}

impl std::str::FromStr for AuditItemStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "flagged" => Ok(Self::Flagged),
            _ => Err(format!("Unknown audit item status: {}", s)),
        }
    }
}

/// One item under an audit, snapshotted at audit-initiation time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditItem {
    pub id: i64,
    pub audit_id: i64,
    pub amount: f64,
    pub category: String,
    pub description: String,
    pub date: NaiveDate,
    pub status: AuditItemStatus,
    pub created_at: DateTime<Utc>,
}

/// An audit item to be inserted
#[derive(Debug, Clone)]
pub struct NewAuditItem {
    pub amount: f64,
    pub category: String,
    pub description: String,
    pub date: NaiveDate,
}

/// Anomaly classification produced by the risk scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    TimeCluster,
    AmountOutlier,
    CategoryConcentration,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TimeCluster => "time_cluster",
            Self::AmountOutlier => "amount_outlier",
            Self::CategoryConcentration => "category_concentration",
        }
    }
}

/// Anomaly severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

/// A single detected anomaly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub description: String,
    /// Audit item ids implicated (empty for aggregate anomalies)
    pub item_ids: Vec<i64>,
}

/// Per-factor contributions to the composite risk score, each capped at 0.4
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskFactors {
    pub transaction_volume: f64,
    pub large_transactions: f64,
    pub unusual_patterns: f64,
}

/// Output of scoring one audit's items
///
/// `overall_score` is the sum of the capped factors, so it is bounded by
/// [0, 1.2] rather than normalized to 1.0.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskReport {
    pub factors: RiskFactors,
    pub overall_score: f64,
    pub anomalies: Vec<Anomaly>,
}
