//! Defines routes for the textbook API and the middleware stack around them.
//!
//! ## Structure
//! - **Service endpoints**
//!   - `GET    /`        — liveness message
//!   - `GET    /health`  — database health
//!   - `GET    /readyz`  — database + object store readiness
//!
//! - **Textbook endpoints** (`/api/v1`)
//!   - `GET    /textbooks`               — list (optional `?user_id=`)
//!   - `POST   /textbooks`               — create metadata only
//!   - `GET    /textbooks/{id}`          — fetch one
//!   - `PUT    /textbooks/{id}`          — partial update
//!   - `DELETE /textbooks/{id}`          — delete metadata
//!   - `GET    /textbooks/{id}/download` — presigned read URL
//!   - `POST   /upload`                  — multipart PDF upload
//!   - `POST   /users`, `GET /users/{id}`
//!
//! - **Presigned objects**
//!   - `GET    /files/{*key}` — local backend only

use crate::{
    config::AppConfig,
    handlers::{
        file_handlers::get_file,
        health_handlers::{health, readyz, root},
        textbook_handlers::{
            create_textbook, delete_textbook, download_url, get_textbook, list_textbooks,
            update_textbook,
        },
        upload_handlers::upload_textbook,
        user_handlers::{create_user, get_user},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{
        HeaderValue, Method, StatusCode,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::{RequestBodyTimeoutLayer, TimeoutLayer},
    trace::TraceLayer,
};

/// Build the router for all routes.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .route("/textbooks", get(list_textbooks).post(create_textbook))
        .route(
            "/textbooks/{id}",
            get(get_textbook).put(update_textbook).delete(delete_textbook),
        )
        .route("/textbooks/{id}/download", get(download_url))
        .route("/upload", post(upload_textbook))
        .route("/users", post(create_user))
        .route("/users/{id}", get(get_user));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/readyz", get(readyz))
        .route("/files/{*key}", get(get_file))
        .nest("/api/v1", api)
}

/// The complete application: routes, middleware and state.
pub fn app(state: AppState) -> Router {
    let config = state.config.clone();
    routes()
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(RequestBodyTimeoutLayer::new(config.read_timeout))
        .layer(request_timeout_layer(config.request_timeout))
        .layer(build_cors_layer(&config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Requests still running after `timeout` are answered with 408.
fn request_timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// Builds a CORS tower layer from configuration.
///
/// Credentials are allowed, so a `*` origin mirrors the request origin
/// instead of sending a wildcard.
pub fn build_cors_layer(config: &AppConfig) -> CorsLayer {
    let origin = if config.cors_origins.iter().any(|o| o == "*") {
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
            Method::PATCH,
        ])
        .allow_headers([ACCEPT, AUTHORIZATION, CONTENT_TYPE])
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    #[tokio::test]
    async fn slow_requests_time_out_with_408() {
        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
            .layer(request_timeout_layer(Duration::from_millis(50)));

        let response = app
            .oneshot(Request::get("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
