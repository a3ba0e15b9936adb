pub mod access;
pub mod auth;
pub mod config;
pub mod documents;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod rate_limit;
pub mod state;
pub mod storage;
pub mod users;
pub mod validate;
pub mod views;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{delete, get, patch, post},
};
use docdesk_types::api::{ApiResponse, HealthResponse};

use crate::middleware::{require_admin, require_auth};

pub use crate::config::{Config, ConfigError, Environment};
pub use crate::rate_limit::RateLimiter;
pub use crate::state::{AppState, AppStateInner, Settings};
pub use crate::storage::Storage;

/// JSON bodies are capped here; the upload route carries its own limit.
pub const JSON_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Multipart framing on top of the file bytes.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Assembles every `/api` route plus `/health` and the JSON 404 fallback.
///
/// Transport concerns (CORS, tracing, rate limiting, security headers) are
/// layered on by the server binary.
pub fn router(state: AppState) -> Router {
    let upload_limit = usize::try_from(state.settings.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let public_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/admin/login", post(auth::admin_login));

    let protected_routes = Router::new()
        .route("/api/auth/profile", get(auth::profile))
        .route("/api/auth/admin-users", get(auth::admin_users))
        .route(
            "/api/documents/upload",
            post(documents::upload_document)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/documents/my-documents", get(documents::my_documents))
        .route("/api/documents/download/{document_id}", get(documents::download_document))
        .route("/api/documents/{document_id}", delete(documents::delete_document))
        .route("/api/messages/send", post(messages::send_message))
        .route("/api/messages/inbox", get(messages::inbox))
        .route("/api/messages/sent", get(messages::sent))
        .route(
            "/api/messages/{message_id}",
            get(messages::get_message).delete(messages::delete_message),
        )
        .route("/api/messages/{message_id}/read", patch(messages::mark_as_read))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let admin_routes = Router::new()
        .route("/api/auth/admin/users", get(users::list_users))
        .route("/api/auth/admin/users/{user_id}", delete(users::delete_user))
        .route("/api/documents/admin/all-documents", get(documents::all_documents))
        .route("/api/documents/admin/user-documents", post(documents::user_documents))
        .route("/api/messages/admin/all", get(messages::all_messages))
        .route("/api/messages/admin/broadcast", post(messages::broadcast))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let expose_errors = state.settings.expose_error_details;

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .route("/health", get(health))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .with_state(state);

    if expose_errors {
        app.layer(from_fn(error::expose_internal_errors))
    } else {
        app
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        message: "Server is running".into(),
        timestamp: chrono::Utc::now(),
    })
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::failure("Route not found", None)),
    )
}
