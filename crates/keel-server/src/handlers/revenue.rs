//! Revenue record handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{AppError, AppState, MAX_PAGE_LIMIT};
use keel_core::models::{NewRevenueRecord, RevenueRecord};

/// Query parameters for revenue listing
#[derive(Debug, Deserialize)]
pub struct RevenueQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

/// GET /api/revenue - List revenue records
pub async fn list_revenue(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RevenueQuery>,
) -> Result<Json<Vec<RevenueRecord>>, AppError> {
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);
    let records = state.db.list_revenue_records(limit)?;
    Ok(Json(records))
}

/// Request body for manual revenue entry
#[derive(Debug, Deserialize)]
pub struct CreateRevenueRequest {
    pub amount: f64,
    pub category: String,
    pub description: String,
    /// YYYY-MM-DD
    pub date: String,
}

/// POST /api/revenue - Record revenue manually
pub async fn create_revenue(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateRevenueRequest>,
) -> Result<Json<RevenueRecord>, AppError> {
    if body.amount <= 0.0 {
        return Err(AppError::bad_request("Revenue amount must be positive"));
    }

    let date = NaiveDate::parse_from_str(&body.date, "%Y-%m-%d")
        .map_err(|_| AppError::bad_request("Invalid date format (use YYYY-MM-DD)"))?;

    let id = state.db.insert_revenue_record(&NewRevenueRecord {
        amount: body.amount,
        category: body.category,
        description: body.description,
        date,
        source_document_id: None,
    })?;

    let record = state.db.get_revenue_record(id)?;
    Ok(Json(record))
}
