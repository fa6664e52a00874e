//! `POST /api/v1/upload` — multipart upload of a PDF plus its metadata.

use crate::{
    errors::AppError,
    services::upload_service::{UploadRequest, UploadedFile},
    state::AppState,
};
use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

/// Accepts `title`, `description?`, `user_id` and a `file` part.
///
/// Unknown parts are skipped. A `file` part without a filename counts as no file.
pub async fn upload_textbook(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
    let mut multipart = multipart.map_err(|e| AppError::bad_request(e.body_text()))?;
    let mut request = UploadRequest::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => request.title = Some(field.text().await.map_err(multipart_error)?),
            "description" => {
                request.description = Some(field.text().await.map_err(multipart_error)?)
            }
            "user_id" => request.user_id = Some(field.text().await.map_err(multipart_error)?),
            "file" => {
                let Some(filename) = field.file_name().map(str::to_string) else {
                    continue;
                };
                let content = field.bytes().await.map_err(multipart_error)?;
                request.file = Some(UploadedFile { filename, content });
            }
            other => tracing::debug!(field = other, "ignoring unknown multipart field"),
        }
    }

    let textbook = state.uploads.upload(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Textbook uploaded successfully",
            "textbook": textbook,
        })),
    ))
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::new(err.status(), err.body_text())
}
