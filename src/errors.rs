use crate::services::{
    object_store::ObjectStoreError, record_store::RecordError, upload_service::UploadError,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
///
/// Messages on 5xx responses are sanitized; the underlying error is only
/// written to the operator log.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Log `detail` and return a 500 carrying only `public`.
    pub fn internal_logged(detail: &dyn std::error::Error, public: &str) -> Self {
        tracing::error!(error = %detail, "{}", public);
        Self::internal(public)
    }

    /// Map a record-store error, using `failure` as the public 500 message.
    pub fn from_record(err: RecordError, failure: &str) -> Self {
        match err {
            RecordError::Validation(msg) => Self::bad_request(msg),
            RecordError::NotFound { entity, .. } => {
                Self::not_found(format!("{} not found", capitalize(entity)))
            }
            other @ (RecordError::Conflict(_) | RecordError::Sqlx(_)) => {
                Self::internal_logged(&other, failure)
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<RecordError> for AppError {
    fn from(err: RecordError) -> Self {
        AppError::from_record(err, "Database error")
    }
}

impl From<ObjectStoreError> for AppError {
    fn from(err: ObjectStoreError) -> Self {
        match err {
            ObjectStoreError::InvalidFileType { .. } | ObjectStoreError::InvalidKey(_) => {
                AppError::bad_request(err.to_string())
            }
            ObjectStoreError::NotFound(_) => AppError::not_found("Object not found"),
            ObjectStoreError::Url { .. } => {
                AppError::internal_logged(&err, "Failed to generate download URL")
            }
            ObjectStoreError::Write { .. } => AppError::internal_logged(&err, "Failed to upload file"),
            ObjectStoreError::Delete { .. } | ObjectStoreError::Unavailable(_) => {
                AppError::internal_logged(&err, "Storage error")
            }
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Validation(msg) => AppError::bad_request(msg),
            UploadError::Storage(inner) => inner.into(),
            UploadError::Persist { .. } => {
                AppError::internal_logged(&err, "Failed to create textbook record")
            }
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
