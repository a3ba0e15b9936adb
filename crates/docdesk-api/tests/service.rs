mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
    middleware::from_fn_with_state,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use common::TestApp;
use docdesk_api::RateLimiter;
use docdesk_api::rate_limit::enforce;
use docdesk_types::models::Role;

#[tokio::test]
async fn health_reports_running() {
    let app = TestApp::new().await;
    let res = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Server is running");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn unknown_routes_get_json_404() {
    let app = TestApp::new().await;
    let res = app.call(Method::GET, "/api/nowhere", None, None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(
        res.json(),
        serde_json::json!({"success": false, "message": "Route not found"})
    );
}

#[tokio::test]
async fn malformed_json_uses_envelope() {
    let app = TestApp::new().await;
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let res = app.send(req).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["success"], false);
    assert_eq!(res.message(), "Invalid request body");
    assert!(res.json()["error"].is_string());
}

#[tokio::test]
async fn rate_limit_answers_429_after_budget() {
    let app = TestApp::new().await;
    let limiter = Arc::new(RateLimiter::new(2, Duration::from_secs(60)));
    let router = app.router.clone().layer(from_fn_with_state(limiter, enforce));

    let mut statuses = Vec::new();
    let mut last_body = Value::Null;
    for _ in 0..3 {
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let res = router.clone().oneshot(req).await.unwrap();
        statuses.push(res.status());
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        last_body = serde_json::from_slice(&bytes).unwrap();
    }

    assert_eq!(statuses, [StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]);
    assert_eq!(
        last_body["message"],
        "Too many requests from this IP, please try again later."
    );
}

fn break_messages_table(app: &TestApp) {
    app.state
        .db
        .with_conn(|conn| Ok(conn.execute_batch("DROP TABLE messages")?))
        .unwrap();
}

#[tokio::test]
async fn internal_errors_show_detail_in_development() {
    let app = TestApp::with_error_details(true).await;
    let (_, token) = app.add_user("Ada", "ada@example.com", Role::User);
    break_messages_table(&app);

    let res = app.get("/api/messages/inbox", &token).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.message(), "Failed to load inbox");
    let detail = res.json()["error"].as_str().unwrap_or_default().to_string();
    assert!(detail.contains("messages"), "{detail}");
}

#[tokio::test]
async fn internal_errors_hide_detail_in_production() {
    let app = TestApp::with_error_details(false).await;
    let (_, token) = app.add_user("Ada", "ada@example.com", Role::User);
    break_messages_table(&app);

    let res = app.get("/api/messages/inbox", &token).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.json()["error"], "Something went wrong");
}
