use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use utoipa::OpenApi;

use crate::state::AppState;
use crate::ApiDoc;

/// Serves the OpenAPI document with `servers[0]` rewritten to the
/// requesting origin, so generated clients hit the same host the browser
/// used rather than whatever `APP_DOMAIN` happened to be at startup.
pub async fn openapi(State(_state): State<AppState>, headers: HeaderMap) -> Json<serde_json::Value> {
    let mut doc = ApiDoc::openapi();

    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let scheme = if host.starts_with("localhost") || host.starts_with("127.0.0.1") {
        "http"
    } else {
        "https"
    };
    let origin = format!("{scheme}://{host}");

    doc.servers = Some(vec![utoipa::openapi::ServerBuilder::new().url(origin).build()]);

    Json(serde_json::to_value(doc).unwrap_or_default())
}
