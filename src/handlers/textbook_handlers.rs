//! HTTP handlers for textbook metadata. Object content is never touched here;
//! deleting a textbook leaves its PDF in the object store.

use crate::{
    config::max_presign_ttl,
    errors::AppError,
    models::textbook::{NewTextbook, TextbookPatch},
    services::record_store::TextbookFilter,
    state::AppState,
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

/// Query params accepted by `GET /api/v1/textbooks`.
#[derive(Debug, Deserialize)]
pub struct ListTextbooksQuery {
    pub user_id: Option<String>,
}

/// Query params accepted by `GET /api/v1/textbooks/{id}/download`.
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub ttl_secs: Option<u64>,
}

/// GET `/api/v1/textbooks` — list, optionally filtered by `?user_id=`.
pub async fn list_textbooks(
    State(state): State<AppState>,
    query: Result<Query<ListTextbooksQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(q) = query.map_err(|e| AppError::bad_request(e.body_text()))?;
    let filter = TextbookFilter::parse(q.user_id.as_deref())?;

    let textbooks = state
        .records
        .find_all(filter)
        .await
        .map_err(|e| AppError::from_record(e, "Failed to fetch textbooks"))?;
    Ok(Json(textbooks))
}

/// POST `/api/v1/textbooks` — create a metadata-only record.
pub async fn create_textbook(
    State(state): State<AppState>,
    payload: Result<Json<NewTextbook>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(new) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;

    let textbook = state
        .records
        .create(new)
        .await
        .map_err(|e| AppError::from_record(e, "Failed to create textbook"))?;
    Ok((StatusCode::CREATED, Json(textbook)))
}

/// GET `/api/v1/textbooks/{id}`
pub async fn get_textbook(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_textbook_id(&id)?;
    let textbook = state.records.find_by_id(id).await?;
    Ok(Json(textbook))
}

/// PUT `/api/v1/textbooks/{id}` — partial update; omitted fields are kept.
pub async fn update_textbook(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TextbookPatch>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_textbook_id(&id)?;
    let Json(patch) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;

    let textbook = state
        .records
        .update(id, patch)
        .await
        .map_err(|e| AppError::from_record(e, "Failed to update textbook"))?;
    Ok(Json(textbook))
}

/// DELETE `/api/v1/textbooks/{id}` — removes the row only.
pub async fn delete_textbook(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_textbook_id(&id)?;
    state
        .records
        .delete(id)
        .await
        .map_err(|e| AppError::from_record(e, "Failed to delete textbook"))?;
    Ok(Json(json!({ "message": "Textbook deleted successfully" })))
}

/// GET `/api/v1/textbooks/{id}/download` — time-limited read URL for the PDF.
pub async fn download_url(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_textbook_id(&id)?;
    let Query(q) = query.map_err(|e| AppError::bad_request(e.body_text()))?;

    let ttl = match q.ttl_secs {
        Some(secs) => Duration::from_secs(secs),
        None => state.config.storage.presign_ttl,
    };
    if ttl.is_zero() || ttl > max_presign_ttl() {
        return Err(AppError::bad_request(format!(
            "ttl_secs must be between 1 and {}",
            max_presign_ttl().as_secs()
        )));
    }

    let textbook = state.records.find_by_id(id).await?;
    let url = state.objects.presign(&textbook.file_path, ttl).await?;
    Ok(Json(json!({ "url": url, "expires_in": ttl.as_secs() })))
}

fn parse_textbook_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::bad_request("Invalid textbook ID format"))
}
