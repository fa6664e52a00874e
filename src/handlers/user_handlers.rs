//! Minimal user endpoints backing the textbook owner join.

use crate::{errors::AppError, models::user::NewUser, state::AppState};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// POST `/api/v1/users`
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(new) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;
    let user = state
        .users
        .create(new)
        .await
        .map_err(|e| AppError::from_record(e, "Failed to create user"))?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET `/api/v1/users/{id}`
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = Uuid::parse_str(&id).map_err(|_| AppError::bad_request("Invalid user ID format"))?;
    Ok(Json(state.users.find_by_id(id).await?))
}
