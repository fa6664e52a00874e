//! Router-level tests driving the full middleware stack with `oneshot`.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use std::{path::PathBuf, sync::Arc};
use tempfile::TempDir;
use textbook_service::{
    app,
    config::{AppConfig, Args},
    db,
    services::local_store::LocalObjectStore,
    state::AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

const BOUNDARY: &str = "----textbook-test-boundary";

struct TestApp {
    router: Router,
    pool: Arc<SqlitePool>,
    storage_dir: PathBuf,
    _dir: TempDir,
}

struct TestResponse {
    status: StatusCode,
    headers: header::HeaderMap,
    bytes: Vec<u8>,
}

impl TestResponse {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or(Value::Null)
    }
}

impl TestApp {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let storage_dir = dir.path().join("objects");
        let args = Args {
            database_url: Some("sqlite::memory:".into()),
            storage_dir: Some(storage_dir.display().to_string()),
            ..Default::default()
        };
        let cfg = AppConfig::resolve(args, |name| match name {
            "TEXTBOOK_PRESIGN_SECRET" => Some("integration-secret".into()),
            _ => None,
        })
        .unwrap();

        let pool = db::connect(&cfg.database_url, 1).await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        let store = LocalObjectStore::new(
            &storage_dir,
            cfg.storage.public_url.clone(),
            cfg.storage.presign_secret.clone(),
        )
        .await
        .unwrap();
        let state = AppState::with_local_store(pool.clone(), store, Arc::new(cfg));

        Self {
            router: app(state),
            pool,
            storage_dir,
            _dir: dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        TestResponse {
            status,
            headers,
            bytes,
        }
    }

    async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn json(&self, method: &str, uri: &str, body: Value) -> TestResponse {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn upload(&self, fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> TestResponse {
        self.send(
            Request::post("/api/v1/upload")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(multipart_body(fields, file)))
                .unwrap(),
        )
        .await
    }

    fn stored_files(&self) -> Vec<PathBuf> {
        fn walk(dir: &std::path::Path, out: &mut Vec<PathBuf>) {
            let Ok(entries) = std::fs::read_dir(dir) else {
                return;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    walk(&path, out);
                } else {
                    out.push(path);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.storage_dir, &mut out);
        out
    }
}

fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, content)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

#[tokio::test]
async fn root_and_health_respond() {
    let app = TestApp::new().await;

    let root = app.get("/").await;
    assert_eq!(root.status, StatusCode::OK);
    assert_eq!(root.json()["message"], "Hello World");

    let health = app.get("/health").await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.json()["status"], "up");
    assert_eq!(health.json()["message"], "Database is healthy");

    let ready = app.get("/readyz").await;
    assert_eq!(ready.status, StatusCode::OK);
    assert_eq!(ready.json()["checks"]["local"]["ok"], true);
}

#[tokio::test]
async fn upload_example_round_trips_through_get() {
    let app = TestApp::new().await;
    let user_id = Uuid::new_v4().to_string();

    let response = app
        .upload(
            &[("title", "Calc I"), ("user_id", &user_id)],
            Some(("notes.pdf", b"%PDF-1.4\n\n")),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let body = response.json();
    assert_eq!(body["message"], "Textbook uploaded successfully");
    let textbook = &body["textbook"];
    let file_path = textbook["file_path"].as_str().unwrap().to_string();
    let (prefix, name) = file_path.split_once('/').unwrap();
    assert_eq!(prefix, user_id);
    assert!(Uuid::parse_str(name.strip_suffix(".pdf").unwrap()).is_ok());

    let on_disk = std::fs::read(app.storage_dir.join(&file_path)).unwrap();
    assert_eq!(on_disk.len(), 10);

    let id = textbook["id"].as_str().unwrap();
    let fetched = app.get(&format!("/api/v1/textbooks/{}", id)).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.json()["file_path"], file_path.as_str());
    assert_eq!(fetched.json()["title"], "Calc I");
}

#[tokio::test]
async fn upload_rejects_non_pdf_without_writing() {
    let app = TestApp::new().await;
    let user_id = Uuid::new_v4().to_string();

    let response = app
        .upload(
            &[("title", "Essay"), ("user_id", &user_id)],
            Some(("essay.docx", b"not a pdf")),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.json()["error"].as_str().unwrap().contains("Only PDF"));
    assert!(app.stored_files().is_empty());
    assert_eq!(app.get("/api/v1/textbooks").await.json(), json!([]));
}

#[tokio::test]
async fn upload_validation_errors_are_400() {
    let app = TestApp::new().await;
    let user_id = Uuid::new_v4().to_string();

    let missing_title = app
        .upload(&[("user_id", &user_id)], Some(("a.pdf", b"pdf")))
        .await;
    assert_eq!(missing_title.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing_title.json()["error"], "Title and user_id are required");

    let bad_user = app
        .upload(&[("title", "T"), ("user_id", "42")], Some(("a.pdf", b"pdf")))
        .await;
    assert_eq!(bad_user.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_user.json()["error"], "Invalid user_id format");

    let no_file = app.upload(&[("title", "T"), ("user_id", &user_id)], None).await;
    assert_eq!(no_file.status, StatusCode::BAD_REQUEST);
    assert_eq!(no_file.json()["error"], "No file uploaded");

    let not_multipart = app.json("POST", "/api/v1/upload", json!({})).await;
    assert_eq!(not_multipart.status, StatusCode::BAD_REQUEST);

    assert!(app.stored_files().is_empty());
}

#[tokio::test]
async fn upload_compensates_when_insert_fails() {
    let app = TestApp::new().await;
    sqlx::query("DROP TABLE textbooks")
        .execute(&*app.pool)
        .await
        .unwrap();

    let response = app
        .upload(
            &[("title", "Calc I"), ("user_id", &Uuid::new_v4().to_string())],
            Some(("notes.pdf", b"0123456789")),
        )
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json()["error"], "Failed to create textbook record");
    assert!(app.stored_files().is_empty());
}

#[tokio::test]
async fn metadata_crud_lifecycle() {
    let app = TestApp::new().await;
    let owner = Uuid::new_v4();

    let created = app
        .json(
            "POST",
            "/api/v1/textbooks",
            json!({
                "title": "Linear Algebra",
                "description": "vectors",
                "file_path": format!("{}/manual.pdf", owner),
                "user_id": owner,
            }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let created = created.json();
    assert_eq!(created["created_at"], created["updated_at"]);
    let uri = format!("/api/v1/textbooks/{}", created["id"].as_str().unwrap());

    let updated = app
        .json("PUT", &uri, json!({ "title": "Linear Algebra II", "description": null }))
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    let updated = updated.json();
    assert_eq!(updated["title"], "Linear Algebra II");
    assert_eq!(updated["description"], Value::Null);
    assert_eq!(updated["file_path"], created["file_path"]);
    assert_eq!(updated["id"], created["id"]);

    let deleted = app
        .send(Request::delete(&uri).body(Body::empty()).unwrap())
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.json()["message"], "Textbook deleted successfully");

    assert_eq!(app.get(&uri).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_rejects_bad_payloads_with_400() {
    let app = TestApp::new().await;

    let malformed = app
        .send(
            Request::post("/api/v1/textbooks")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);

    let bad_user = app
        .json(
            "POST",
            "/api/v1/textbooks",
            json!({ "title": "T", "file_path": "k.pdf", "user_id": "nope" }),
        )
        .await;
    assert_eq!(bad_user.status, StatusCode::BAD_REQUEST);

    let missing_title = app
        .json(
            "POST",
            "/api/v1/textbooks",
            json!({ "file_path": "k.pdf", "user_id": Uuid::new_v4() }),
        )
        .await;
    assert_eq!(missing_title.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing_title.json()["error"], "title is required");
}

#[tokio::test]
async fn id_and_filter_validation() {
    let app = TestApp::new().await;

    let bad_id = app.get("/api/v1/textbooks/not-a-uuid").await;
    assert_eq!(bad_id.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_id.json()["error"], "Invalid textbook ID format");

    let missing = app
        .get(&format!("/api/v1/textbooks/{}", Uuid::new_v4()))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.json()["error"], "Textbook not found");

    let delete_missing = app
        .send(
            Request::delete(format!("/api/v1/textbooks/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(delete_missing.status, StatusCode::NOT_FOUND);

    let bad_filter = app.get("/api/v1/textbooks?user_id=abc").await;
    assert_eq!(bad_filter.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_filter.json()["error"], "Invalid user_id format");
}

#[tokio::test]
async fn list_filters_by_owner_and_embeds_user() {
    let app = TestApp::new().await;

    let user = app
        .json(
            "POST",
            "/api/v1/users",
            json!({ "email": "ada@example.com", "name": "Ada" }),
        )
        .await;
    assert_eq!(user.status, StatusCode::CREATED);
    let user = user.json();
    let owner = user["id"].as_str().unwrap().to_string();
    let other = Uuid::new_v4().to_string();

    for (title, user_id) in [("A", &owner), ("B", &other), ("C", &owner)] {
        let response = app
            .upload(
                &[("title", title), ("user_id", user_id)],
                Some(("book.pdf", b"%PDF")),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
    }

    let listed = app
        .get(&format!("/api/v1/textbooks?user_id={}", owner))
        .await
        .json();
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 2);
    for book in listed {
        assert_eq!(book["user_id"], owner.as_str());
        assert_eq!(book["user"]["email"], "ada@example.com");
    }

    let all = app.get("/api/v1/textbooks").await.json();
    assert_eq!(all.as_array().unwrap().len(), 3);
    let unowned = all
        .as_array()
        .unwrap()
        .iter()
        .find(|b| b["user_id"] == other.as_str())
        .unwrap();
    assert!(unowned.get("user").is_none());

    let fetched_user = app.get(&format!("/api/v1/users/{}", owner)).await;
    assert_eq!(fetched_user.status, StatusCode::OK);
    assert_eq!(fetched_user.json()["name"], "Ada");
}

#[tokio::test]
async fn presigned_download_serves_the_pdf() {
    let app = TestApp::new().await;
    let uploaded = app
        .upload(
            &[("title", "Calc I"), ("user_id", &Uuid::new_v4().to_string())],
            Some(("notes.pdf", b"%PDF-1.4 body")),
        )
        .await
        .json();
    let id = uploaded["textbook"]["id"].as_str().unwrap();

    let link = app
        .get(&format!("/api/v1/textbooks/{}/download?ttl_secs=60", id))
        .await;
    assert_eq!(link.status, StatusCode::OK);
    assert_eq!(link.json()["expires_in"], 60);
    let url = link.json()["url"].as_str().unwrap().to_string();
    let path = url.strip_prefix("http://localhost:8080").unwrap();

    let file = app.get(path).await;
    assert_eq!(file.status, StatusCode::OK);
    assert_eq!(file.headers[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(file.bytes, b"%PDF-1.4 body");

    let tampered = path.replace("signature=", "signature=x");
    assert_eq!(app.get(&tampered).await.status, StatusCode::FORBIDDEN);

    let unsigned = path.split('?').next().unwrap();
    assert_eq!(app.get(unsigned).await.status, StatusCode::FORBIDDEN);

    let bad_ttl = app
        .get(&format!("/api/v1/textbooks/{}/download?ttl_secs=0", id))
        .await;
    assert_eq!(bad_ttl.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cors_preflight_allows_configured_origin() {
    let app = TestApp::new().await;

    let response = app
        .send(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/v1/textbooks")
                .header(header::ORIGIN, "http://localhost:3000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PUT")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
    assert_eq!(
        response.headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
        "true"
    );
}
