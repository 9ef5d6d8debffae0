use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{validation_failed, ApiError, ApiErrorWithDetails, FieldError};
use crate::models::{JobStatus, UploadResponse};
use crate::state::AppState;
use crate::validator;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap()
});

struct UploadFields {
    file_data: Option<Vec<u8>>,
    file_name: Option<String>,
    claimed_mime: Option<String>,
    document_type: Option<String>,
    email: Option<String>,
    callback_webhook: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content = String, description = "multipart/form-data: file, documentType, email, callbackWebhook?", content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Job accepted", body = UploadResponse),
        (status = 400, description = "Validation failed"),
    ),
    tag = "ingress"
)]
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiErrorWithDetails> {
    let mut fields = UploadFields {
        file_data: None,
        file_name: None,
        claimed_mime: None,
        document_type: None,
        email: None,
        callback_webhook: None,
    };

    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?;
        let Some(field) = field else { break };

        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                fields.file_name = field.file_name().map(|s| s.to_string());
                fields.claimed_mime = field.content_type().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read file field: {e}")))?;
                fields.file_data = Some(bytes.to_vec());
            }
            "documentType" => {
                fields.document_type = Some(text_field(field).await?);
            }
            "email" => {
                fields.email = Some(text_field(field).await?);
            }
            "callbackWebhook" => {
                let value = text_field(field).await?;
                if !value.is_empty() {
                    fields.callback_webhook = Some(value);
                }
            }
            _ => {}
        }
    }

    let mut errors = Vec::new();

    let file_data = fields.file_data.clone().unwrap_or_default();
    if file_data.is_empty() {
        errors.push(FieldError::new("file", "file is required"));
    } else if file_data.len() > validator::MAX_FILE_SIZE_BYTES {
        errors.push(FieldError::new("file", "file exceeds the maximum allowed size"));
    }

    let document_type = fields.document_type.clone().unwrap_or_default();
    if document_type.trim().is_empty() {
        errors.push(FieldError::new("documentType", "documentType is required"));
    }

    let email = fields.email.clone().unwrap_or_default();
    if !EMAIL_RE.is_match(&email) {
        errors.push(FieldError::new("email", "email must be a syntactically valid address"));
    }

    if let Some(url) = &fields.callback_webhook {
        if let Err(e) = validator::validate_webhook_url(url) {
            errors.push(FieldError::new("callbackWebhook", e.to_string()));
        }
    }

    let claimed_mime = fields.claimed_mime.clone().unwrap_or_default();
    let validated = if errors.is_empty() {
        match validator::validate_file(&file_data, &claimed_mime) {
            Ok(v) => Some(v),
            Err(e) => {
                errors.push(FieldError::new("file", e.to_string()));
                None
            }
        }
    } else {
        None
    };

    if !errors.is_empty() {
        return Err(validation_failed(errors));
    }

    let validated = validated.expect("validated is Some when errors is empty");
    let file_name = fields.file_name.unwrap_or_else(|| "upload".to_string());

    let id = state
        .store
        .create_job(
            &document_type,
            &email,
            fields.callback_webhook.as_deref(),
            &file_data,
            &file_name,
            &validated.detected_mime,
        )
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            id,
            status: JobStatus::Pending,
            message: "Job accepted for processing".to_string(),
        }),
    ))
}

async fn text_field(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read text field: {e}")))
}
