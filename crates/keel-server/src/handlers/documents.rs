//! Document upload and processing handlers

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{get_user, AppError, AppState, MAX_PAGE_LIMIT, MAX_UPLOAD_SIZE};
use keel_core::models::Document;
use keel_core::{content_hash, IngestResult};

/// Response for document upload
#[derive(Serialize)]
pub struct UploadResponse {
    pub document_id: i64,
    pub filename: String,
    pub size_bytes: usize,
    pub content_hash: String,
}

/// POST /api/documents - Upload a financial document
///
/// Expects multipart form with:
/// - file: document bytes (required, max 10MB)
///
/// Content is deduplicated by SHA-256; re-uploading identical bytes is a
/// conflict, not a second document.
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let user = get_user(&headers);

    let mut file_data: Option<Vec<u8>> = None;
    let mut filename = "document.csv".to_string();
    let mut content_type: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(&format!("Failed to read form field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            if let Some(fname) = field.file_name() {
                filename = fname.to_string();
            }
            content_type = field.content_type().map(|c| c.to_string());

            let bytes = field
                .bytes()
                .await
                .map_err(|_| AppError::bad_request("Failed to read file data"))?;

            if bytes.len() > MAX_UPLOAD_SIZE {
                return Err(AppError::bad_request(&format!(
                    "File too large. Maximum size is {} MB",
                    MAX_UPLOAD_SIZE / 1024 / 1024
                )));
            }

            file_data = Some(bytes.to_vec());
        }
    }

    let file_data = file_data.ok_or_else(|| AppError::bad_request("Missing file field"))?;
    if file_data.is_empty() {
        return Err(AppError::bad_request("Uploaded file is empty"));
    }

    let content_hash = content_hash(&file_data);
    let store_path = format!("documents/{}/{}", &content_hash[..8], filename);

    state
        .store
        .upload(&store_path, &file_data, content_type.as_deref())?;

    let document_id = state
        .db
        .insert_document(
            &filename,
            &store_path,
            &content_hash,
            content_type.as_deref(),
            file_data.len() as i64,
            &user,
        )
        .map_err(|e| match e {
            keel_core::Error::InvalidData(msg) => AppError::conflict(&msg),
            other => AppError::from_core(other),
        })?;

    Ok(Json(UploadResponse {
        document_id,
        filename,
        size_bytes: file_data.len(),
        content_hash,
    }))
}

/// Request body for JSON document upload
#[derive(Debug, Deserialize)]
pub struct UploadJsonRequest {
    pub filename: String,
    /// Base64-encoded document bytes
    pub content_base64: String,
    pub content_type: Option<String>,
}

/// POST /api/documents/json - Upload a document as base64 JSON
///
/// Alternative to the multipart endpoint for API clients that prefer plain
/// JSON bodies.
pub async fn upload_document_json(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<UploadJsonRequest>,
) -> Result<Json<UploadResponse>, AppError> {
    use base64::Engine;

    let user = get_user(&headers);

    let file_data = base64::engine::general_purpose::STANDARD
        .decode(&body.content_base64)
        .map_err(|_| AppError::bad_request("Invalid base64 content"))?;
    if file_data.is_empty() {
        return Err(AppError::bad_request("Uploaded file is empty"));
    }
    if file_data.len() > MAX_UPLOAD_SIZE {
        return Err(AppError::bad_request(&format!(
            "File too large. Maximum size is {} MB",
            MAX_UPLOAD_SIZE / 1024 / 1024
        )));
    }

    let content_hash = content_hash(&file_data);
    let store_path = format!("documents/{}/{}", &content_hash[..8], body.filename);

    state
        .store
        .upload(&store_path, &file_data, body.content_type.as_deref())?;

    let document_id = state
        .db
        .insert_document(
            &body.filename,
            &store_path,
            &content_hash,
            body.content_type.as_deref(),
            file_data.len() as i64,
            &user,
        )
        .map_err(|e| match e {
            keel_core::Error::InvalidData(msg) => AppError::conflict(&msg),
            other => AppError::from_core(other),
        })?;

    Ok(Json(UploadResponse {
        document_id,
        filename: body.filename,
        size_bytes: file_data.len(),
        content_hash,
    }))
}

/// Request body for document processing
#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    /// State scoping the tax-code lookup for extracted write-offs
    #[serde(default = "default_state")]
    pub state: String,
}

fn default_state() -> String {
    "CA".to_string()
}

/// POST /api/documents/:id/process - Parse, classify, and persist
pub async fn process_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<ProcessRequest>,
) -> Result<Json<IngestResult>, AppError> {
    let user = get_user(&headers);

    let result = keel_core::process_document(&state.db, state.store.as_ref(), id, &body.state, &user)?;

    Ok(Json(result))
}

/// Query parameters for document listing
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

/// GET /api/documents - List uploaded documents
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<Document>>, AppError> {
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);
    let documents = state.db.list_documents(limit)?;
    Ok(Json(documents))
}

/// GET /api/documents/:id - Get one document
pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Document>, AppError> {
    let document = state.db.get_document(id)?;
    Ok(Json(document))
}
