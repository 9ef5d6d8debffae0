use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;

use ocr_service::state::AppState;

/// Helper: build a fresh AppState backed by a test Postgres database.
/// Requires DATABASE_URL env var to be set.
async fn test_state() -> AppState {
    dotenvy::dotenv().ok();
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL required for integration tests");
    let pool = PgPool::connect(&database_url)
        .await
        .expect("failed to connect to test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");
    AppState::new(pool).await
}

fn app(state: AppState) -> axum::Router {
    ocr_service::create_router(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn multipart_body(boundary: &str, document_type: &str, email: &str, file_bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"documentType\"\r\n\r\n");
    body.extend_from_slice(document_type.as_bytes());
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"email\"\r\n\r\n");
    body.extend_from_slice(email.as_bytes());
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"file\"; filename=\"scan.png\"\r\n",
    );
    body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
    body.extend_from_slice(file_bytes);
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

// ═══════════════════════════════════════════════════════════════════════════
//  GET /api/health
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn health_returns_200() {
    let state = test_state().await;
    let response = app(state)
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_has_correct_fields() {
    let state = test_state().await;
    let response = app(state)
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["uptimeSeconds"].is_u64());
}

// ═══════════════════════════════════════════════════════════════════════════
//  GET /api/health/ready
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn readiness_is_503_before_mark_ready() {
    // test_state() never calls mark_ready()
    let state = test_state().await;
    let response = app(state)
        .oneshot(Request::builder().uri("/api/health/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn readiness_is_200_after_mark_ready() {
    let state = test_state().await;
    state.mark_ready();
    let response = app(state)
        .oneshot(Request::builder().uri("/api/health/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

// ═══════════════════════════════════════════════════════════════════════════
//  GET /api/metrics
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn metrics_returns_plaintext_gauges() {
    let state = test_state().await;
    let response = app(state)
        .oneshot(Request::builder().uri("/api/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("ocr_jobs_pending"));
    assert!(text.contains("ocr_workers_in_flight"));
}

// ═══════════════════════════════════════════════════════════════════════════
//  GET /api/openapi
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn openapi_document_is_served() {
    let state = test_state().await;
    let response = app(state)
        .oneshot(Request::builder().uri("/api/openapi").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["paths"]["/api/upload"].is_object());
}

// ═══════════════════════════════════════════════════════════════════════════
//  POST /api/upload
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn upload_rejects_missing_fields() {
    let state = test_state().await;
    let boundary = "X-TEST-BOUNDARY";
    let body = format!("--{boundary}--\r\n");

    let response = app(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/upload")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Validation failed");
    assert!(json["details"].is_array());
}

#[tokio::test]
async fn upload_rejects_invalid_email() {
    let state = test_state().await;
    let boundary = "X-TEST-BOUNDARY";
    // a 1x1 PNG
    let png: &[u8] = &[
        0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90,
        0x77, 0x53, 0xde, 0x00, 0x00, 0x00, 0x0c, 0x49, 0x44, 0x41, 0x54, 0x08, 0xd7, 0x63, 0xf8,
        0xcf, 0xc0, 0x00, 0x00, 0x00, 0x03, 0x00, 0x01, 0x6e, 0x3a, 0xed, 0x00, 0x00, 0x00, 0x00,
        0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
    ];
    let body = multipart_body(boundary, "invoice", "not-an-email", png);

    let response = app(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/upload")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_then_status_round_trip() {
    let state = test_state().await;
    let boundary = "X-TEST-BOUNDARY";
    let png: &[u8] = &[
        0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90,
        0x77, 0x53, 0xde, 0x00, 0x00, 0x00, 0x0c, 0x49, 0x44, 0x41, 0x54, 0x08, 0xd7, 0x63, 0xf8,
        0xcf, 0xc0, 0x00, 0x00, 0x00, 0x03, 0x00, 0x01, 0x6e, 0x3a, 0xed, 0x00, 0x00, 0x00, 0x00,
        0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
    ];
    let body = multipart_body(boundary, "invoice", "person@example.com", png);

    let upload_resp = app(state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/upload")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(upload_resp.status(), StatusCode::CREATED);
    let upload_json = body_json(upload_resp).await;
    let id = upload_json["id"].as_str().unwrap().to_string();
    assert_eq!(upload_json["status"], "PENDING");

    let status_resp = app(state)
        .oneshot(
            Request::builder()
                .uri(format!("/api/status/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(status_resp.status(), StatusCode::OK);
    let status_json = body_json(status_resp).await;
    assert_eq!(status_json["id"], id);
    assert_eq!(status_json["status"], "PENDING");
}

#[tokio::test]
async fn status_unknown_id_is_404() {
    let state = test_state().await;
    let missing = uuid::Uuid::new_v4();
    let response = app(state)
        .oneshot(
            Request::builder()
                .uri(format!("/api/status/{missing}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ═══════════════════════════════════════════════════════════════════════════
//  Admin routes
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn admin_stats_returns_200() {
    let state = test_state().await;
    let response = app(state)
        .oneshot(Request::builder().uri("/api/admin/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["pending"].is_i64());
}

#[tokio::test]
async fn admin_list_jobs_rejects_unknown_status() {
    let state = test_state().await;
    let response = app(state)
        .oneshot(
            Request::builder()
                .uri("/api/admin/jobs?status=BOGUS")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_get_delete_unknown_job_is_404() {
    let state = test_state().await;
    let missing = uuid::Uuid::new_v4();

    let get_resp = app(state.clone())
        .oneshot(
            Request::builder()
                .uri(format!("/api/admin/jobs/{missing}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(get_resp.status(), StatusCode::NOT_FOUND);

    let delete_resp = app(state)
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/admin/jobs/{missing}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(delete_resp.status(), StatusCode::NOT_FOUND);
}

// ═══════════════════════════════════════════════════════════════════════════
//  404 for unknown routes
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn unknown_route_returns_404() {
    let state = test_state().await;
    let response = app(state)
        .oneshot(Request::builder().uri("/api/nonexistent").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
