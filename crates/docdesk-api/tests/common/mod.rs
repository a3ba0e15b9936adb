#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, Bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use docdesk_api::auth::issue_token;
use docdesk_api::{AppState, AppStateInner, Settings, Storage};
use docdesk_db::Database;
use docdesk_types::models::Role;

pub const MAX_UPLOAD_BYTES: u64 = 1024;
const BOUNDARY: &str = "docdesk-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _dir: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or(Value::Null)
    }

    pub fn message(&self) -> String {
        self.json()["message"].as_str().unwrap_or_default().to_string()
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_error_details(true).await
    }

    pub async fn with_error_details(expose_error_details: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("uploads")).await.unwrap();
        let db = Database::open_in_memory().unwrap();
        let settings = Settings {
            jwt_secret: "integration-test-secret".into(),
            token_ttl: chrono::Duration::hours(1),
            max_upload_bytes: MAX_UPLOAD_BYTES,
            expose_error_details,
        };
        let state = AppStateInner::new(db, storage, settings);
        Self {
            router: docdesk_api::router(state.clone()),
            state,
            _dir: dir,
        }
    }

    /// Inserts an account directly (no hashing) and returns its id and a token.
    pub fn add_user(&self, name: &str, email: &str, role: Role) -> (i64, String) {
        let id = self.state.db.create_user(name, email, "unused-hash", role).unwrap();
        (id, self.token_for(id, role))
    }

    pub fn token_for(&self, id: i64, role: Role) -> String {
        issue_token(&self.state.settings, id, role).unwrap()
    }

    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        TestResponse {
            status,
            headers,
            bytes,
        }
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(req).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.call(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.call(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> TestResponse {
        self.call(Method::DELETE, uri, Some(token), None).await
    }

    /// Uploads `content` as the `document` field.
    pub async fn upload(&self, token: &str, filename: &str, content: &[u8]) -> TestResponse {
        self.upload_field(token, "document", Some(filename), content).await
    }

    pub async fn upload_field(
        &self,
        token: &str,
        field: &str,
        filename: Option<&str>,
        content: &[u8],
    ) -> TestResponse {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/documents/upload")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(field, filename, content)))
            .unwrap();
        self.send(req).await
    }
}

pub fn multipart_body(field: &str, filename: Option<&str>, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    match filename {
        Some(name) => body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{name}\"\r\n\
                 Content-Type: text/plain\r\n\r\n"
            )
            .as_bytes(),
        ),
        None => body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{field}\"\r\n\r\n").as_bytes(),
        ),
    }
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}
