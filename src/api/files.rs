//! File transfer routes.

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};

use crate::http::error::{ApiError, ApiResult};
use crate::http::server::AppState;
use crate::platform::FileMetadata;

/// Multipart field carrying the upload, also the default file name.
pub const UPLOAD_FIELD: &str = "file";

pub async fn download(State(state): State<AppState>, Path(file_id): Path<String>) -> ApiResult<Response> {
    let file = state
        .platform
        .files
        .download(&file_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("file [{}] not found", file_id)))?;

    let content_type = HeaderValue::from_str(&file.metadata.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    tracing::info!(file_id = %file_id, length = file.metadata.length, "File downloaded");
    Ok(([(header::CONTENT_TYPE, content_type)], file.content).into_response())
}

pub async fn metadata(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> ApiResult<Json<FileMetadata>> {
    let metadata = state
        .platform
        .files
        .metadata(&file_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("file [{}] not found", file_id)))?;
    Ok(Json(metadata))
}

/// Accepts a multipart form with a `file` field, or the raw bytes as body.
pub async fn upload(State(state): State<AppState>, request: Request) -> ApiResult<Json<FileMetadata>> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let (file_name, file_type, content) = match content_type.as_deref() {
        Some(ct) if ct.starts_with("multipart/form-data") => {
            let multipart = Multipart::from_request(request, &state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            read_upload_field(multipart).await?
        }
        _ => {
            let body = Bytes::from_request(request, &state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            (UPLOAD_FIELD.to_string(), content_type, body)
        }
    };

    if content.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file can not be processed".to_string()));
    }

    let metadata = state
        .platform
        .files
        .upload(&file_name, file_type.as_deref(), content)
        .await?;
    tracing::info!(file_id = %metadata.file_id, file_name = %metadata.file_name, "File uploaded");
    Ok(Json(metadata))
}

async fn read_upload_field(mut multipart: Multipart) -> ApiResult<(String, Option<String>, Bytes)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or(UPLOAD_FIELD).to_string();
        let content_type = field.content_type().map(str::to_string);
        let content = field.bytes().await.map_err(|e| ApiError::BadRequest(e.body_text()))?;
        return Ok((file_name, content_type, content));
    }
    Err(ApiError::BadRequest(format!("multipart field [{}] is missing", UPLOAD_FIELD)))
}
