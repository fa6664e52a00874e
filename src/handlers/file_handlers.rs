//! Serves objects from the local backend through presigned URLs.
//! Streams bodies to avoid buffering whole PDFs in memory.

use crate::{errors::AppError, services::local_store::ObjectMeta, state::AppState};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use chrono::Utc;
use serde::Deserialize;
use tokio_util::io::ReaderStream;

#[derive(Debug, Deserialize)]
pub struct PresignedQuery {
    pub expires: Option<i64>,
    pub signature: Option<String>,
}

/// GET `/files/{*key}?expires=&signature=`
pub async fn get_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(q): Query<PresignedQuery>,
) -> Result<Response, AppError> {
    let Some(store) = state.local_files.as_ref() else {
        return Err(AppError::not_found("Not found"));
    };

    let (Some(expires), Some(signature)) = (q.expires, q.signature.as_deref()) else {
        return Err(AppError::new(StatusCode::FORBIDDEN, "Missing signature"));
    };
    if !store.verify_signature(&key, expires, signature, Utc::now()) {
        return Err(AppError::new(
            StatusCode::FORBIDDEN,
            "Invalid or expired signature",
        ));
    }

    let (meta, file) = store.open(&key).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &meta);
    Ok(response)
}

fn set_object_headers(headers: &mut HeaderMap, meta: &ObjectMeta) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&meta.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.size_bytes));

    if !meta.etag.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", meta.etag)) {
            headers.insert(header::ETAG, value);
        }
    }

    let filename = meta.original_filename.replace(['"', '\\'], "_");
    if let Ok(value) = HeaderValue::from_str(&format!("inline; filename=\"{}\"", filename)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
}
