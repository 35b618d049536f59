//! Statement report handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::{AppError, AppState, MAX_PAGE_LIMIT};
use keel_core::models::{EquityStatementEntry, IncomeStatementEntry};

/// Query parameters for statement listing
#[derive(Debug, Deserialize)]
pub struct StatementQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

/// GET /api/statements/income - Income statement rows, newest first
pub async fn income_statements(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatementQuery>,
) -> Result<Json<Vec<IncomeStatementEntry>>, AppError> {
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);
    let entries = state.db.list_income_statements(limit)?;
    Ok(Json(entries))
}

/// GET /api/statements/equity - Owners-equity summary rows, newest first
pub async fn equity_statements(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatementQuery>,
) -> Result<Json<Vec<EquityStatementEntry>>, AppError> {
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);
    let entries = state.db.list_equity_statements(limit)?;
    Ok(Json(entries))
}
