use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;

use docdesk_types::api::{ApiResponse, UsersData};

use crate::access::Caller;
use crate::error::ApiError;
use crate::state::{AppState, run_blocking};
use crate::views;

/// GET /api/auth/admin/users
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = run_blocking(&state, "Failed to load users", |db| db.list_users(None)).await?;

    Ok(Json(ApiResponse::data(UsersData {
        users: rows.into_iter().map(views::user).collect(),
    })))
}

/// DELETE /api/auth/admin/users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Path(user_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    if user_id == caller.id {
        return Err(ApiError::BadRequest("You cannot delete your own account".into()));
    }

    let paths = run_blocking(&state, "Failed to delete user", move |db| db.delete_user(user_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    let removed = state.storage.delete_files(paths).await;

    info!(
        "Admin {} deleted user {} ({} stored files removed)",
        caller.id, user_id, removed
    );

    Ok(Json(ApiResponse::<()>::message("User deleted successfully")))
}
