//! Liveness, health & readiness handlers.
//!
//! - GET /        -> static liveness message
//! - GET /health  -> database health, always 200 with `{status, message|error}`
//! - GET /readyz  -> readiness that checks the database and the object store

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;

/// `GET /`
pub async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Hello World" }))
}

/// `GET /health`
///
/// Reports database connectivity in the body; the HTTP status is always 200.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let body = match state.records.ping().await {
        Ok(()) => HealthResponse {
            status: "up",
            message: Some("Database is healthy".into()),
            error: None,
        },
        Err(e) => HealthResponse {
            status: "down",
            message: None,
            error: Some(format!("db ping failed: {}", e)),
        },
    };
    (StatusCode::OK, Json(body))
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Runs a lightweight query against SQLite (`SELECT 1`).
/// 2. Asks the object store backend for its own check.
///
/// Returns JSON describing each check. HTTP 200 when all checks pass,
/// HTTP 503 when any check fails.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let sqlite_check = match state.records.ping().await {
        Ok(()) => CheckStatus {
            ok: true,
            error: None,
        },
        Err(e) => CheckStatus {
            ok: false,
            error: Some(format!("error: {}", e)),
        },
    };

    let storage_check = match state.objects.check().await {
        Ok(()) => CheckStatus {
            ok: true,
            error: None,
        },
        Err(e) => CheckStatus {
            ok: false,
            error: Some(e.to_string()),
        },
    };

    let overall_ok = sqlite_check.ok && storage_check.ok;

    let mut checks = HashMap::new();
    checks.insert("sqlite", sqlite_check);
    checks.insert(state.objects.backend(), storage_check);

    let body = ReadyResponse {
        status: if overall_ok { "ok" } else { "error" },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
