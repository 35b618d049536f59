//! Tax calculation handlers

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::{AppError, AppState};
use keel_core::models::{BusinessType, TaxAnalysis, TaxCalculationResult, TaxCode};
use keel_core::TaxEngine;

/// Request body for tax calculation
#[derive(Debug, Deserialize)]
pub struct CalculateTaxRequest {
    pub business_type: String,
    pub state: String,
}

/// POST /api/tax/calculate - Compute the current tax liability
///
/// An all-zero result indicates the calculation was unavailable (a storage
/// failure was logged server-side), not a zero liability.
pub async fn calculate_tax(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CalculateTaxRequest>,
) -> Result<Json<TaxCalculationResult>, AppError> {
    let business_type: BusinessType = body
        .business_type
        .parse()
        .map_err(|e: String| AppError::bad_request(&e))?;

    if body.state.trim().is_empty() {
        return Err(AppError::bad_request("State must not be empty"));
    }

    let engine = TaxEngine::new(&state.db);
    let result = engine.calculate(business_type, body.state.trim());
    Ok(Json(result))
}

/// GET /api/tax/analysis - Latest persisted income/expense snapshot
pub async fn get_tax_analysis(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TaxAnalysis>, AppError> {
    let analysis = state
        .db
        .latest_tax_analysis()?
        .ok_or_else(|| AppError::not_found("No tax analysis snapshot yet"))?;
    Ok(Json(analysis))
}

/// GET /api/tax-codes - List tax code reference data
pub async fn list_tax_codes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TaxCode>>, AppError> {
    let codes = state.db.list_tax_codes()?;
    Ok(Json(codes))
}
