//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use base64::Engine;
use http_body_util::BodyExt;
use keel_core::db::Database;
use keel_core::store::LocalStore;
use tower::ServiceExt;

/// Create a unique store directory per test, mirroring Database::in_memory
fn test_store() -> LocalStore {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let path = std::env::temp_dir().join(format!("keel_store_{}", id));
    let _ = std::fs::remove_dir_all(&path);
    LocalStore::new(path).unwrap()
}

fn setup_test_app() -> Router {
    let db = Database::in_memory().unwrap();
    db.seed_tax_codes().unwrap();
    db.seed_tax_brackets().unwrap();
    let config = ServerConfig {
        require_auth: false,
        allowed_origins: vec![],
        api_keys: vec![],
    };
    create_router(db, Box::new(test_store()), None, config)
}

fn setup_test_app_with_ai() -> Router {
    let db = Database::in_memory().unwrap();
    db.seed_tax_codes().unwrap();
    db.seed_tax_brackets().unwrap();
    let config = ServerConfig {
        require_auth: false,
        allowed_origins: vec![],
        api_keys: vec![],
    };
    create_router(db, Box::new(test_store()), Some(AiClient::mock()), config)
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Upload a document via the JSON endpoint, returning its id
async fn upload_csv(app: &Router, filename: &str, csv: &str) -> i64 {
    let body = serde_json::json!({
        "filename": filename,
        "content_base64": base64::engine::general_purpose::STANDARD.encode(csv),
        "content_type": "text/csv"
    });

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/documents/json", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    json["document_id"].as_i64().unwrap()
}

const SAMPLE_CSV: &str = "date,description,amount\n\
    2024-01-15,Office Supplies Purchase,-245.50\n\
    2024-01-16,Client invoice payment,1200.00\n\
    2024-01-17,Fuel for delivery vehicle,-60.00";

// ========== Health / Auth ==========

#[tokio::test]
async fn test_health() {
    let app = setup_test_app();
    let response = app.oneshot(get_request("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_auth_required() {
    let db = Database::in_memory().unwrap();
    let config = ServerConfig {
        require_auth: true,
        allowed_origins: vec![],
        api_keys: vec!["secret-key".to_string()],
    };
    let app = create_router(db, Box::new(test_store()), None, config);

    // No credentials
    let response = app
        .clone()
        .oneshot(get_request("/api/documents"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Wrong key
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/documents")
                .header("authorization", "Bearer wrong-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Valid key
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/documents")
                .header("authorization", "Bearer secret-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ========== Document API Tests ==========

#[tokio::test]
async fn test_upload_document_json() {
    let app = setup_test_app();
    let id = upload_csv(&app, "ledger.csv", SAMPLE_CSV).await;

    let response = app
        .clone()
        .oneshot(get_request(&format!("/api/documents/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["filename"].as_str().unwrap(), "ledger.csv");
    assert_eq!(json["status"].as_str().unwrap(), "uploaded");
}

#[tokio::test]
async fn test_upload_document_multipart() {
    let app = setup_test_app();

    let boundary = "X-KEEL-BOUNDARY";
    let body = format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"ledger.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         {csv}\r\n\
         --{b}--\r\n",
        b = boundary,
        csv = SAMPLE_CSV
    );

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/documents")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={}", boundary),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["filename"].as_str().unwrap(), "ledger.csv");
    assert!(json["document_id"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_upload_duplicate_conflict() {
    let app = setup_test_app();
    upload_csv(&app, "ledger.csv", SAMPLE_CSV).await;

    let body = serde_json::json!({
        "filename": "copy.csv",
        "content_base64": base64::engine::general_purpose::STANDARD.encode(SAMPLE_CSV),
    });
    let response = app
        .oneshot(json_request("POST", "/api/documents/json", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_upload_invalid_base64() {
    let app = setup_test_app();
    let body = serde_json::json!({
        "filename": "x.csv",
        "content_base64": "not valid base64!!!",
    });
    let response = app
        .oneshot(json_request("POST", "/api/documents/json", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_process_document_full_flow() {
    let app = setup_test_app();
    let id = upload_csv(&app, "ledger.csv", SAMPLE_CSV).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/documents/{}/process", id),
            serde_json::json!({ "state": "CA" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["transactions"].as_array().unwrap().len(), 3);
    assert_eq!(json["findings"].as_array().unwrap().len(), 3);
    assert_eq!(json["write_offs_created"].as_u64().unwrap(), 2);
    assert_eq!(json["revenue_records_created"].as_u64().unwrap(), 1);

    // Findings mention the classified type and formatted amount
    let findings: Vec<&str> = json["findings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f.as_str().unwrap())
        .collect();
    assert!(findings[0].contains("expense"));
    assert!(findings[0].contains("$245.50"));

    // Document is now marked processed
    let response = app
        .clone()
        .oneshot(get_request(&format!("/api/documents/{}", id)))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["status"].as_str().unwrap(), "processed");

    // Write-offs were created pending with matched tax codes
    let response = app
        .clone()
        .oneshot(get_request("/api/write-offs"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    let write_offs = json.as_array().unwrap();
    assert_eq!(write_offs.len(), 2);
    assert!(write_offs.iter().all(|w| w["status"] == "pending"));
    assert!(write_offs.iter().all(|w| !w["tax_code_id"].is_null()));

    // Statements and the tax analysis snapshot exist
    let response = app
        .clone()
        .oneshot(get_request("/api/statements/equity"))
        .await
        .unwrap();
    assert_eq!(get_body_json(response).await.as_array().unwrap().len(), 3);

    let response = app
        .clone()
        .oneshot(get_request("/api/statements/income"))
        .await
        .unwrap();
    assert_eq!(get_body_json(response).await.as_array().unwrap().len(), 3);

    let response = app
        .oneshot(get_request("/api/tax/analysis"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["total_revenue"].as_f64().unwrap(), 1200.0);
    assert_eq!(json["total_expenses"].as_f64().unwrap(), 305.5);
}

#[tokio::test]
async fn test_process_missing_document() {
    let app = setup_test_app();
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/documents/999/process",
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ========== Write-off API Tests ==========

#[tokio::test]
async fn test_update_write_off_status() {
    let app = setup_test_app();
    let id = upload_csv(&app, "ledger.csv", SAMPLE_CSV).await;
    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/documents/{}/process", id),
            serde_json::json!({}),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(get_request("/api/write-offs?status=pending"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    let write_off_id = json.as_array().unwrap()[0]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/api/write-offs/{}", write_off_id),
            serde_json::json!({ "status": "approved" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["status"].as_str().unwrap(), "approved");

    // Invalid status rejected
    let response = app
        .oneshot(json_request(
            "PATCH",
            &format!("/api/write-offs/{}", write_off_id),
            serde_json::json!({ "status": "bogus" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ========== Revenue API Tests ==========

#[tokio::test]
async fn test_create_revenue_manual() {
    let app = setup_test_app();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/revenue",
            serde_json::json!({
                "amount": 2500.0,
                "category": "sales_revenue",
                "description": "Contract milestone",
                "date": "2024-03-15"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["amount"].as_f64().unwrap(), 2500.0);

    let response = app.oneshot(get_request("/api/revenue")).await.unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_revenue_validation() {
    let app = setup_test_app();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/revenue",
            serde_json::json!({
                "amount": -10.0,
                "category": "sales_revenue",
                "description": "negative",
                "date": "2024-03-15"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/revenue",
            serde_json::json!({
                "amount": 10.0,
                "category": "sales_revenue",
                "description": "bad date",
                "date": "15/03/2024"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ========== Tax API Tests ==========

#[tokio::test]
async fn test_list_tax_codes() {
    let app = setup_test_app();
    let response = app.oneshot(get_request("/api/tax-codes")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert!(json.as_array().unwrap().len() >= 10);
}

#[tokio::test]
async fn test_calculate_tax_corporation() {
    let app = setup_test_app();

    app.clone()
        .oneshot(json_request(
            "POST",
            "/api/revenue",
            serde_json::json!({
                "amount": 1500000.0,
                "category": "sales_revenue",
                "description": "Annual revenue",
                "date": "2024-12-31"
            }),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/tax/calculate",
            serde_json::json!({ "business_type": "corporation", "state": "CA" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["taxable_income"].as_f64().unwrap(), 1_500_000.0);
    // 8.84% flat plus the 1% surtax on the slice over 1M
    let expected_state = 1_500_000.0 * 0.0884 + 500_000.0 * 0.01;
    assert!((json["state_tax"].as_f64().unwrap() - expected_state).abs() < 1e-6);
    assert!((json["federal_tax"].as_f64().unwrap() - 315_000.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_calculate_tax_empty_db_is_floor() {
    let app = setup_test_app();
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/tax/calculate",
            serde_json::json!({ "business_type": "llc", "state": "CA" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["taxable_income"].as_f64().unwrap(), 0.0);
    // No revenue lands in the lowest LLC fee tier
    assert_eq!(json["state_tax"].as_f64().unwrap(), 800.0);
}

#[tokio::test]
async fn test_calculate_tax_invalid_business_type() {
    let app = setup_test_app();
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/tax/calculate",
            serde_json::json!({ "business_type": "nonprofit", "state": "CA" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tax_analysis_empty() {
    let app = setup_test_app();
    let response = app.oneshot(get_request("/api/tax/analysis")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ========== Audit API Tests ==========

async fn seed_and_create_audit(app: &Router) -> i64 {
    let id = upload_csv(app, "ledger.csv", SAMPLE_CSV).await;
    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/documents/{}/process", id),
            serde_json::json!({}),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/audits",
            serde_json::json!({ "title": "Quarterly review" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["item_count"].as_u64().unwrap(), 3);
    json["audit_id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_create_and_get_audit() {
    let app = setup_test_app();
    let audit_id = seed_and_create_audit(&app).await;

    let response = app
        .oneshot(get_request(&format!("/api/audits/{}", audit_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["title"].as_str().unwrap(), "Quarterly review");
    assert_eq!(json["items"].as_array().unwrap().len(), 3);
    assert!(json["risk_score"].is_null());
}

#[tokio::test]
async fn test_create_audit_empty_title() {
    let app = setup_test_app();
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/audits",
            serde_json::json!({ "title": "  " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_score_audit() {
    let app = setup_test_app();
    let audit_id = seed_and_create_audit(&app).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/audits/{}/score", audit_id),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert!(json["overall_score"].as_f64().unwrap() >= 0.0);
    assert!(json["overall_score"].as_f64().unwrap() <= 1.2);
    // No AI backend configured, so no summary
    assert!(json["ai_summary"].is_null());

    // Score persisted onto the audit
    let response = app
        .oneshot(get_request(&format!("/api/audits/{}", audit_id)))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert!(json["risk_score"].as_f64().is_some());
}

#[tokio::test]
async fn test_score_audit_with_ai_summary() {
    let app = setup_test_app_with_ai();
    let audit_id = seed_and_create_audit(&app).await;

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/api/audits/{}/score", audit_id),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert!(json["ai_summary"].as_str().unwrap().contains("Mock analysis"));
}

#[tokio::test]
async fn test_score_missing_audit() {
    let app = setup_test_app();
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/audits/999/score",
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
