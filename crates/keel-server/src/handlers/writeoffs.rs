//! Write-off handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::{AppError, AppState, MAX_PAGE_LIMIT};
use keel_core::models::{WriteOff, WriteOffStatus};

/// Query parameters for write-off listing
#[derive(Debug, Deserialize)]
pub struct WriteOffQuery {
    /// Filter by review status
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

/// GET /api/write-offs - List write-offs
pub async fn list_write_offs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WriteOffQuery>,
) -> Result<Json<Vec<WriteOff>>, AppError> {
    let status = params
        .status
        .as_deref()
        .map(|s| s.parse::<WriteOffStatus>())
        .transpose()
        .map_err(|e| AppError::bad_request(&e))?;

    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);
    let write_offs = state.db.list_write_offs(status, limit)?;
    Ok(Json(write_offs))
}

/// Request body for write-off updates
#[derive(Debug, Deserialize)]
pub struct UpdateWriteOffRequest {
    pub status: String,
}

/// PATCH /api/write-offs/:id - Update a write-off's review status
pub async fn update_write_off(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateWriteOffRequest>,
) -> Result<Json<WriteOff>, AppError> {
    let status: WriteOffStatus = body
        .status
        .parse()
        .map_err(|e: String| AppError::bad_request(&e))?;

    state.db.update_write_off_status(id, status)?;
    let write_off = state.db.get_write_off(id)?;
    Ok(Json(write_off))
}
