use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejection,
};
use docdesk_types::models::Role;
use tracing::{debug, warn};

use crate::access::Caller;
use crate::auth::verify_token;
use crate::error::ApiError;
use crate::state::{AppState, run_blocking};

/// Validates the bearer token, then loads the account it names.
///
/// The role comes from the users table, not the token, so demoting or
/// deleting an account takes effect on its next request.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) =
        bearer.map_err(|_| ApiError::Unauthorized("Access token required".into()))?;

    let claims = verify_token(&state.settings, bearer.token()).map_err(|e| {
        debug!("Rejected token: {}", e);
        ApiError::Unauthorized("Invalid or expired token".into())
    })?;

    let user = run_blocking(&state, "Authentication failed", move |db| {
        db.get_user_by_id(claims.sub)
    })
    .await?
    .ok_or_else(|| ApiError::Unauthorized("User no longer exists".into()))?;

    let role: Role = user.role.parse().map_err(|e| {
        warn!("Corrupt role on user {}: {}", user.id, e);
        ApiError::Unauthorized("Invalid account role".into())
    })?;

    req.extensions_mut().insert(Caller {
        id: user.id,
        name: user.name,
        email: user.email,
        role,
    });
    Ok(next.run(req).await)
}

/// Admin gate. Must sit inside `require_auth`.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    let caller = req
        .extensions()
        .get::<Caller>()
        .ok_or_else(|| ApiError::Unauthorized("Access token required".into()))?;

    if !caller.is_admin() {
        warn!("User {} denied admin route {}", caller.id, req.uri().path());
        return Err(ApiError::Forbidden("Admin access required".into()));
    }

    Ok(next.run(req).await)
}
