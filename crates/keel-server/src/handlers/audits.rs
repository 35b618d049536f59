//! Audit handlers
//!
//! An audit snapshots recent activity (write-offs and revenue records) into
//! audit items, which the risk scorer then evaluates. The AI summary is
//! advisory text layered on top of the statistical report - scoring never
//! depends on it.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{get_user, AppError, AppState, MAX_PAGE_LIMIT};
use keel_core::ai::AiBackend;
use keel_core::models::{Audit, AuditItem, NewAuditItem, RiskReport, Severity};
use keel_core::{match_category, score_items, CategoryKeywords};

/// Request body for audit creation
#[derive(Debug, Deserialize)]
pub struct CreateAuditRequest {
    pub title: String,
    /// How many recent write-offs and revenue records to snapshot
    #[serde(default = "default_snapshot_limit")]
    pub limit: i64,
}

fn default_snapshot_limit() -> i64 {
    200
}

/// Response for audit creation
#[derive(Serialize)]
pub struct CreateAuditResponse {
    pub audit_id: i64,
    pub item_count: usize,
}

/// POST /api/audits - Create an audit from a snapshot of recent activity
pub async fn create_audit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateAuditRequest>,
) -> Result<Json<CreateAuditResponse>, AppError> {
    if body.title.trim().is_empty() {
        return Err(AppError::bad_request("Audit title must not be empty"));
    }
    let user = get_user(&headers);
    let limit = body.limit.clamp(1, MAX_PAGE_LIMIT);

    let keywords = CategoryKeywords::default();
    let mut items = Vec::new();

    for write_off in state.db.list_write_offs(None, limit)? {
        let category = match_category(&write_off.description, &keywords)
            .unwrap_or("Uncategorized")
            .to_string();
        items.push(NewAuditItem {
            amount: write_off.amount,
            category,
            description: write_off.description,
            date: write_off.date,
        });
    }

    for record in state.db.list_revenue_records(limit)? {
        items.push(NewAuditItem {
            amount: record.amount,
            category: record.category,
            description: record.description,
            date: record.date,
        });
    }

    let audit_id = state.db.create_audit(body.title.trim(), &items, &user)?;

    Ok(Json(CreateAuditResponse {
        audit_id,
        item_count: items.len(),
    }))
}

/// Query parameters for audit listing
#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

/// GET /api/audits - List audits
pub async fn list_audits(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditQuery>,
) -> Result<Json<Vec<Audit>>, AppError> {
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);
    let audits = state.db.list_audits(limit)?;
    Ok(Json(audits))
}

/// Response for single-audit fetch
#[derive(Serialize)]
pub struct AuditDetail {
    #[serde(flatten)]
    pub audit: Audit,
    pub items: Vec<AuditItem>,
}

/// GET /api/audits/:id - Get an audit with its items
pub async fn get_audit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<AuditDetail>, AppError> {
    let audit = state.db.get_audit(id)?;
    let items = state.db.list_audit_items(id)?;
    Ok(Json(AuditDetail { audit, items }))
}

/// Response for a scoring run
#[derive(Serialize)]
pub struct ScoreResponse {
    pub audit_id: i64,
    #[serde(flatten)]
    pub report: RiskReport,
    /// Advisory summary when an AI backend is configured and reachable
    pub ai_summary: Option<String>,
}

/// POST /api/audits/:id/score - Run the risk scorer over an audit
///
/// Persists the composite score onto the audit, flags the items implicated
/// by high-severity anomalies, and attaches an advisory AI summary when a
/// backend is available.
pub async fn score_audit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ScoreResponse>, AppError> {
    // Existence check before scoring
    state.db.get_audit(id)?;
    let items = state.db.list_audit_items(id)?;

    let report = score_items(&items);

    let flagged: Vec<i64> = report
        .anomalies
        .iter()
        .filter(|a| a.severity == Severity::High)
        .flat_map(|a| a.item_ids.iter().copied())
        .collect();
    if !flagged.is_empty() {
        state.db.flag_audit_items(&flagged)?;
    }

    let ai_summary = match &state.ai {
        Some(ai) => summarize_report(ai, &report, items.len()).await,
        None => None,
    };

    state
        .db
        .set_audit_score(id, report.overall_score, ai_summary.as_deref())?;

    Ok(Json(ScoreResponse {
        audit_id: id,
        report,
        ai_summary,
    }))
}

/// Ask the AI backend for a short advisory summary of a risk report
///
/// Failures degrade to no summary - the statistical report stands alone.
async fn summarize_report(
    ai: &keel_core::AiClient,
    report: &RiskReport,
    item_count: usize,
) -> Option<String> {
    let system = "You are a financial review assistant. Summarize audit risk findings \
                  in two or three sentences for a small-business owner. Be factual and \
                  do not invent numbers.";

    let mut prompt = format!(
        "Audit of {} transactions. Overall risk score {:.2} (volume {:.2}, large \
         transactions {:.2}, unusual patterns {:.2}).\n",
        item_count,
        report.overall_score,
        report.factors.transaction_volume,
        report.factors.large_transactions,
        report.factors.unusual_patterns,
    );
    for anomaly in &report.anomalies {
        prompt.push_str(&format!("- {}\n", anomaly.description));
    }

    match ai.complete(system, &prompt).await {
        Ok(text) => Some(text.trim().to_string()),
        Err(e) => {
            warn!(error = %e, "AI summary unavailable");
            None
        }
    }
}
