pub mod enricher;
pub mod error;
pub mod handlers;
pub mod models;
pub mod ocr_engine;
pub mod pdf;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod validator;
pub mod watchdog;
pub mod webhook;
pub mod worker;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use state::AppState;

/// Assigns a UUID correlation ID to every request: records it on the
/// current tracing span and echoes it back as `X-Request-Id`.
pub async fn request_id_middleware(
    request: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let request_id = uuid::Uuid::new_v4().to_string();

    tracing::Span::current().record("request_id", tracing::field::display(&request_id));
    tracing::debug!(request_id = %request_id, "assigned correlation ID");

    let mut response = next.run(request).await;

    if let Ok(val) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", val);
    }

    response
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "OCR Service API",
        version = "0.1.0",
        description = "Asynchronous document OCR service",
        license(name = "MIT")
    ),
    paths(
        handlers::health,
        handlers::readiness,
        handlers::upload,
        handlers::status,
        handlers::stats,
        handlers::list_jobs,
        handlers::get_job,
        handlers::delete_job,
        handlers::patch_job,
    ),
    components(schemas(
        models::HealthResponse,
        models::UploadResponse,
        models::StatusResponse,
        models::AdminStatsResponse,
        models::AdminJobListResponse,
        models::AdminJobSummary,
        models::AdminJobDetail,
        models::PatchJobRequest,
        models::DeleteJobResponse,
        models::JobStatus,
        models::ValidationErrorResponse,
        models::ValidationErrorDetail,
    )),
    tags(
        (name = "health", description = "Liveness & readiness"),
        (name = "ingress", description = "Document submission"),
        (name = "status", description = "Job status polling"),
        (name = "admin", description = "Job queue administration"),
    )
)]
pub struct ApiDoc;

/// Builds the application router with the given state. Extracted from
/// `main()` so integration tests can drive it without binding a port.
pub fn create_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/health/ready", get(handlers::readiness))
        .route("/api/metrics", get(handlers::metrics))
        .route("/api/openapi", get(handlers::openapi))
        .route("/api/upload", post(handlers::upload))
        .route("/api/status/{id}", get(handlers::status));

    let admin = Router::new()
        .route("/api/admin/stats", get(handlers::stats))
        .route("/api/admin/jobs", get(handlers::list_jobs))
        .route(
            "/api/admin/jobs/{id}",
            get(handlers::get_job)
                .delete(handlers::delete_job)
                .patch(handlers::patch_job),
        );

    public
        .merge(admin)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}
