use axum::extract::State;
use axum::Json;

use crate::models::HealthResponse;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is alive", body = HealthResponse)),
    tag = "health"
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

#[utoipa::path(
    get,
    path = "/api/health/ready",
    responses(
        (status = 200, description = "Ready to accept work", body = HealthResponse),
        (status = 503, description = "Not ready yet"),
    ),
    tag = "health"
)]
pub async fn readiness(State(state): State<AppState>) -> (axum::http::StatusCode, Json<HealthResponse>) {
    let body = HealthResponse {
        status: if state.is_ready() { "ready" } else { "starting" }.to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    };
    let status = if state.is_ready() {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

pub async fn metrics(State(state): State<AppState>) -> String {
    let counts = state.store.status_counts().await.unwrap_or_default();
    let uptime = state.start_time.elapsed().as_secs();
    let in_flight = state.in_flight.load(std::sync::atomic::Ordering::Relaxed);

    format!(
        "# HELP ocr_jobs_pending Jobs waiting to be claimed\n\
         # TYPE ocr_jobs_pending gauge\n\
         ocr_jobs_pending {}\n\
         # HELP ocr_jobs_processing Jobs currently being worked\n\
         # TYPE ocr_jobs_processing gauge\n\
         ocr_jobs_processing {}\n\
         # HELP ocr_jobs_completed Jobs completed since the store was created\n\
         # TYPE ocr_jobs_completed gauge\n\
         ocr_jobs_completed {}\n\
         # HELP ocr_jobs_failed Jobs failed since the store was created\n\
         # TYPE ocr_jobs_failed gauge\n\
         ocr_jobs_failed {}\n\
         # HELP ocr_workers_in_flight Worker tasks currently executing\n\
         # TYPE ocr_workers_in_flight gauge\n\
         ocr_workers_in_flight {}\n\
         # HELP uptime_seconds Service uptime in seconds\n\
         # TYPE uptime_seconds counter\n\
         uptime_seconds {}\n",
        counts.pending, counts.processing, counts.completed, counts.failed, in_flight, uptime,
    )
}
