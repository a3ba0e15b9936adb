use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{info, warn};

use docdesk_db::models::UserRow;
use docdesk_types::api::{
    AdminAuthData, ApiResponse, AuthData, Claims, LoginRequest, ProfileData, RegisterRequest,
    UsersData,
};
use docdesk_types::models::Role;

use crate::access::Caller;
use crate::error::ApiError;
use crate::state::{AppState, Settings, run_blocking};
use crate::{validate, views};

// -- Passwords --

/// Argon2id with a fresh salt. CPU-bound, so callers run it on the blocking pool.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?;
    Ok(hash.to_string())
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
pub fn verify_password(password: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| anyhow::anyhow!("stored password hash is malformed: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

async fn hash_off_thread(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(ApiError::internal("Registration failed"))?
        .map_err(ApiError::internal("Registration failed"))
}

async fn verify_off_thread(password: String, stored: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(ApiError::internal("Login failed"))?
        .map_err(ApiError::internal("Login failed"))
}

// -- Tokens --

pub fn issue_token(settings: &Settings, user_id: i64, role: Role) -> anyhow::Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        role,
        iat: now.timestamp().max(0) as usize,
        exp: (now + settings.token_ttl).timestamp().max(0) as usize,
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn verify_token(settings: &Settings, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.jwt_secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(data.claims)
}

fn token_for(settings: &Settings, user: &UserRow, role: Role) -> Result<String, ApiError> {
    issue_token(settings, user.id, role).map_err(ApiError::internal("Failed to issue token"))
}

// -- Handlers --

fn duplicate_email() -> ApiError {
    ApiError::BadRequest("User with this email already exists".into())
}

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let name = validate::name(&req.name)?;
    let email = validate::email(&req.email)?;
    validate::password(&req.password)?;

    let lookup = email.clone();
    let existing = run_blocking(&state, "Registration failed", move |db| {
        db.get_user_by_email(&lookup)
    })
    .await?;
    if existing.is_some() {
        return Err(duplicate_email());
    }

    let password_hash = hash_off_thread(req.password).await?;

    let user = run_blocking(&state, "Registration failed", move |db| {
        let id = match db.create_user(&name, &email, &password_hash, Role::User) {
            Ok(id) => id,
            // Another registration for this email landed after the check above.
            Err(e) if docdesk_db::is_unique_violation(&e) => return Ok(None),
            Err(e) => return Err(e),
        };
        let user = db
            .get_user_by_id(id)?
            .ok_or_else(|| anyhow::anyhow!("user {id} vanished after insert"))?;
        Ok(Some(user))
    })
    .await?
    .ok_or_else(duplicate_email)?;

    let token = token_for(&state.settings, &user, Role::User)?;
    info!("Registered user {} ({})", user.id, user.email);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "User registered successfully",
            AuthData {
                user: views::user_summary(&user),
                token,
            },
        )),
    ))
}

/// Looks the account up and checks the password. `None` covers both an
/// unknown email and a wrong password.
async fn authenticate(
    state: &AppState,
    req: LoginRequest,
) -> Result<Option<(UserRow, Role)>, ApiError> {
    let email = validate::normalize_email(&req.email);
    let Some(user) = run_blocking(state, "Login failed", move |db| db.get_user_by_email(&email)).await?
    else {
        return Ok(None);
    };

    let role: Role = user
        .role
        .parse()
        .map_err(ApiError::internal("Login failed"))?;

    if verify_off_thread(req.password, user.password.clone()).await? {
        Ok(Some((user, role)))
    } else {
        Ok(None)
    }
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let attempted = validate::normalize_email(&req.email);
    let Some((user, role)) = authenticate(&state, req).await? else {
        warn!("Failed login for {}", attempted);
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    };

    let token = token_for(&state.settings, &user, role)?;
    info!("User {} logged in", user.id);

    Ok(Json(ApiResponse::with_message(
        "Login successful",
        AuthData {
            user: views::user_summary(&user),
            token,
        },
    )))
}

pub async fn admin_login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let attempted = validate::normalize_email(&req.email);
    let (user, role) = match authenticate(&state, req).await? {
        Some((user, Role::Admin)) => (user, Role::Admin),
        _ => {
            warn!("Failed admin login for {}", attempted);
            return Err(ApiError::Unauthorized("Invalid admin credentials".into()));
        }
    };

    let token = token_for(&state.settings, &user, role)?;
    info!("Admin {} logged in", user.id);

    Ok(Json(ApiResponse::with_message(
        "Admin login successful",
        AdminAuthData {
            admin: views::user_summary(&user),
            token,
        },
    )))
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let user = run_blocking(&state, "Failed to load profile", move |db| {
        db.get_user_by_id(caller.id)
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(ApiResponse::data(ProfileData {
        user: views::user(user),
    })))
}

/// Admin directory for picking a message recipient.
pub async fn admin_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let admins = run_blocking(&state, "Failed to load admin users", |db| {
        db.list_users(Some(Role::Admin))
    })
    .await?;

    Ok(Json(ApiResponse::data(UsersData {
        users: admins.iter().map(views::user_summary).collect(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(ttl: chrono::Duration) -> Settings {
        Settings {
            jwt_secret: "test-secret".into(),
            token_ttl: ttl,
            max_upload_bytes: 1024,
            expose_error_details: true,
        }
    }

    #[test]
    fn token_round_trip_carries_id_and_role() {
        let s = settings(chrono::Duration::hours(1));
        let token = issue_token(&s, 42, Role::Admin).unwrap();
        let claims = verify_token(&s, &token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, Role::Admin);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn token_rejected_with_other_secret_or_after_expiry() {
        let s = settings(chrono::Duration::hours(1));
        let token = issue_token(&s, 1, Role::User).unwrap();
        let other = Settings {
            jwt_secret: "another-secret".into(),
            ..s.clone()
        };
        assert!(verify_token(&other, &token).is_err());

        let expired = settings(chrono::Duration::hours(-2));
        let token = issue_token(&expired, 1, Role::User).unwrap();
        assert!(verify_token(&expired, &token).is_err());

        assert!(verify_token(&s, "not-a-token").is_err());
    }

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
        assert!(verify_password("x", "not-a-hash").is_err());
    }
}
