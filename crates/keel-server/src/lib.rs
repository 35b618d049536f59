//! Keel Web Server
//!
//! Axum-based REST API for the Keel small-business tax engine.
//!
//! Security posture:
//! - Optional API-key authentication (constant-time comparison)
//! - Restrictive CORS policy
//! - Input validation (pagination limits, upload size limits)
//! - Sanitized error responses (internals are logged, not returned)

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use keel_core::ai::{AiBackend, AiClient};
use keel_core::db::Database;
use keel_core::store::ObjectStore;

mod handlers;

/// Maximum document upload size (10 MB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Header carrying the acting user's identity
const USER_HEADER: &str = "x-keel-user";

/// Authorization header for API key auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether authentication is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only in production)
    pub allowed_origins: Vec<String>,
    /// API keys for service authentication
    /// Format: "Bearer <key>" in Authorization header
    pub api_keys: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            api_keys: vec![],
        }
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    /// Object store holding uploaded document bytes
    pub store: Box<dyn ObjectStore>,
    /// Optional AI backend for advisory audit summaries
    pub ai: Option<AiClient>,
}

/// Authentication middleware - validates API keys
///
/// API keys are compared using constant-time comparison to prevent timing
/// attacks. With `require_auth` disabled every request passes through
/// (local development).
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.require_auth {
        return next.run(request).await;
    }

    let api_key_valid = request
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|key| validate_api_key(key, &state.config.api_keys))
        .unwrap_or(false);

    if api_key_valid {
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Unauthorized request - no valid auth");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "Authentication required"
        })),
    )
        .into_response()
}

/// Validate an API key against the configured keys using constant-time
/// comparison to prevent timing attacks.
fn validate_api_key(provided: &str, valid_keys: &[String]) -> bool {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();

    for key in valid_keys {
        let key_bytes = key.as_bytes();
        // Only compare if lengths match (constant-time for same-length keys)
        if provided_bytes.len() == key_bytes.len() && bool::from(provided_bytes.ct_eq(key_bytes)) {
            return true;
        }
    }
    false
}

/// Extract the acting user from request headers
///
/// Falls back to "api-key" for key-authenticated requests and "local-user"
/// for unauthenticated local development.
pub fn get_user(headers: &axum::http::HeaderMap) -> String {
    if let Some(user) = headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
    {
        return user.to_string();
    }

    if headers
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .is_some()
    {
        return "api-key".to_string();
    }

    "local-user".to_string()
}

/// GET /api/health - liveness probe
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Create the application router
pub fn create_router(
    db: Database,
    store: Box<dyn ObjectStore>,
    ai: Option<AiClient>,
    config: ServerConfig,
) -> Router {
    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        store,
        ai,
    });

    let api_routes = Router::new()
        .route("/health", get(health))
        .route(
            "/documents",
            get(handlers::list_documents).post(handlers::upload_document),
        )
        .route("/documents/json", post(handlers::upload_document_json))
        .route("/documents/:id", get(handlers::get_document))
        .route("/documents/:id/process", post(handlers::process_document))
        .route("/write-offs", get(handlers::list_write_offs))
        .route("/write-offs/:id", patch(handlers::update_write_off))
        .route(
            "/revenue",
            get(handlers::list_revenue).post(handlers::create_revenue),
        )
        .route("/tax-codes", get(handlers::list_tax_codes))
        .route("/tax/calculate", post(handlers::calculate_tax))
        .route("/tax/analysis", get(handlers::get_tax_analysis))
        .route("/statements/income", get(handlers::income_statements))
        .route("/statements/equity", get(handlers::equity_statements))
        .route(
            "/audits",
            get(handlers::list_audits).post(handlers::create_audit),
        )
        .route("/audits/:id", get(handlers::get_audit))
        .route("/audits/:id/score", post(handlers::score_audit))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE));

    let cors = if config.allowed_origins.is_empty() {
        CorsLayer::new()
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

/// Start the server
pub async fn serve(
    db: Database,
    store: Box<dyn ObjectStore>,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!("Authentication disabled - do not expose to network!");
    }

    let ai = check_ai_connection().await;

    let app = create_router(db, store, ai, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log AI backend connection status
async fn check_ai_connection() -> Option<AiClient> {
    match AiClient::from_env() {
        Some(client) => {
            if client.health_check().await {
                info!(
                    "AI backend connected: {} (model: {})",
                    client.host(),
                    client.model()
                );
            } else {
                warn!(
                    "AI backend configured but not responding: {} (model: {})",
                    client.host(),
                    client.model()
                );
            }
            Some(client)
        }
        None => {
            info!("AI backend not configured (set OLLAMA_HOST to enable advisory summaries)");
            None
        }
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn conflict(msg: &str) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }

    /// Map a core error to the right status code with a safe message
    pub fn from_core(err: keel_core::Error) -> Self {
        use keel_core::Error;
        match &err {
            Error::NotFound(msg) => Self::not_found(msg),
            Error::Import(msg) | Error::InvalidData(msg) => Self::bad_request(msg),
            _ => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "An internal error occurred".to_string(),
                internal: Some(err.into()),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl From<keel_core::Error> for AppError {
    fn from(err: keel_core::Error) -> Self {
        Self::from_core(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}

#[cfg(test)]
mod tests;
