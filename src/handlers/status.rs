use axum::extract::{Path, State};
use axum::Json;

use crate::error::ApiError;
use crate::models::StatusResponse;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/status/{id}",
    params(("id" = uuid::Uuid, Path, description = "Job id")),
    responses(
        (status = 200, description = "Job status", body = StatusResponse),
        (status = 400, description = "Malformed job id"),
        (status = 404, description = "Job not found"),
    ),
    tag = "status"
)]
pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<Json<StatusResponse>, ApiError> {
    let job = state
        .store
        .get_job(id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound(format!("job {id} not found")))?;

    Ok(Json(StatusResponse::from(&job)))
}
