use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::error::ApiError;
use crate::models::{
    AdminJobDetail, AdminJobListResponse, AdminJobSummary, AdminStatsResponse, DeleteJobResponse,
    JobStatus, PatchJobRequest,
};
use crate::state::AppState;
use crate::store::{self, DeleteOutcome};

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    status: Option<String>,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct DeleteJobQuery {
    #[serde(default)]
    force: bool,
}

#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses((status = 200, description = "Aggregate job stats", body = AdminStatsResponse)),
    tag = "admin"
)]
pub async fn stats(State(state): State<AppState>) -> Result<Json<AdminStatsResponse>, ApiError> {
    let counts = state.store.status_counts().await?;
    let created_last_hour = state.store.created_last_hour().await?;
    let stuck_job_ids = state.store.stuck_job_ids().await?;
    let avg_processing_time_ms = state.store.avg_processing_time_ms().await?;

    Ok(Json(AdminStatsResponse {
        pending: counts.pending,
        processing: counts.processing,
        completed: counts.completed,
        failed: counts.failed,
        created_last_hour,
        stuck_job_ids,
        avg_processing_time_ms,
    }))
}

#[utoipa::path(
    get,
    path = "/api/admin/jobs",
    params(
        ("status" = Option<String>, Query, description = "Filter by job status"),
        ("limit" = Option<i64>, Query, description = "Page size"),
        ("offset" = Option<i64>, Query, description = "Page offset"),
    ),
    responses((status = 200, description = "Job listing", body = AdminJobListResponse)),
    tag = "admin"
)]
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<AdminJobListResponse>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(|s| s.parse::<JobStatus>())
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let limit = query.limit.clamp(1, 500);
    let offset = query.offset.max(0);

    let (rows, total) = state.store.list_jobs(status, limit, offset).await?;
    let now = Utc::now();

    let jobs = rows
        .into_iter()
        .map(|row| {
            let status = row.status.parse::<JobStatus>().unwrap_or(JobStatus::Failed);
            let is_stuck = store::is_stuck(status, row.updated_at, now);
            let processing_time_ms = row
                .processed_at
                .map(|p| (p - row.created_at).num_milliseconds());
            AdminJobSummary {
                id: row.id,
                status,
                document_type: row.document_type,
                email: row.email,
                file_name: row.file_name,
                mime_type: row.mime_type,
                file_size_bytes: row.file_size_bytes,
                error_message: row.error_message,
                created_at: row.created_at,
                updated_at: row.updated_at,
                processed_at: row.processed_at,
                processing_time_ms,
                is_stuck,
                age_seconds: (now - row.created_at).num_seconds(),
            }
        })
        .collect::<Vec<_>>();

    let has_more = offset + (jobs.len() as i64) < total;

    Ok(Json(AdminJobListResponse {
        jobs,
        total,
        limit,
        offset,
        has_more,
    }))
}

#[utoipa::path(
    get,
    path = "/api/admin/jobs/{id}",
    params(("id" = uuid::Uuid, Path, description = "Job id")),
    responses(
        (status = 200, description = "Job detail", body = AdminJobDetail),
        (status = 404, description = "Job not found"),
    ),
    tag = "admin"
)]
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<Json<AdminJobDetail>, ApiError> {
    let job = state
        .store
        .get_job(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("job {id} not found")))?;
    Ok(Json(AdminJobDetail::from(&job)))
}

#[utoipa::path(
    delete,
    path = "/api/admin/jobs/{id}",
    params(
        ("id" = uuid::Uuid, Path, description = "Job id"),
        ("force" = Option<bool>, Query, description = "Force-delete a PROCESSING job"),
    ),
    responses(
        (status = 200, description = "Deleted", body = DeleteJobResponse),
        (status = 400, description = "Job is PROCESSING and force was not set"),
        (status = 404, description = "Job not found"),
    ),
    tag = "admin"
)]
pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Query(query): Query<DeleteJobQuery>,
) -> Result<Json<DeleteJobResponse>, ApiError> {
    match state.store.delete_job(id, query.force).await? {
        DeleteOutcome::Deleted => Ok(Json(DeleteJobResponse {
            message: "job deleted".to_string(),
            id,
        })),
        DeleteOutcome::NotFound => Err(ApiError::NotFound(format!("job {id} not found"))),
        DeleteOutcome::Conflict => Err(ApiError::BadRequest(
            "job is PROCESSING; pass force=true to delete anyway".to_string(),
        )),
    }
}

#[utoipa::path(
    patch,
    path = "/api/admin/jobs/{id}",
    params(("id" = uuid::Uuid, Path, description = "Job id")),
    request_body = PatchJobRequest,
    responses(
        (status = 200, description = "Updated job", body = AdminJobDetail),
        (status = 400, description = "Invalid status"),
        (status = 404, description = "Job not found"),
    ),
    tag = "admin"
)]
pub async fn patch_job(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Json(body): Json<PatchJobRequest>,
) -> Result<Json<AdminJobDetail>, ApiError> {
    let applied = if body.status == JobStatus::Pending {
        state.store.reset_to_pending(id).await?
    } else {
        state
            .store
            .set_status(id, body.status, body.error_message.as_deref())
            .await?
    };

    if !applied {
        return Err(ApiError::NotFound(format!("job {id} not found")));
    }

    let job = state
        .store
        .get_job(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("job {id} not found")))?;
    Ok(Json(AdminJobDetail::from(&job)))
}
