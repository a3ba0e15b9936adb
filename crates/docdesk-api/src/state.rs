use std::sync::Arc;

use docdesk_db::Database;
use tracing::error;

use crate::error::ApiError;
use crate::storage::Storage;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub storage: Storage,
    pub settings: Settings,
}

impl AppStateInner {
    pub fn new(db: Database, storage: Storage, settings: Settings) -> AppState {
        Arc::new(Self {
            db,
            storage,
            settings,
        })
    }
}

/// Request-handling knobs resolved from configuration at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub max_upload_bytes: u64,
    /// Echo internal error text in 500 responses. Off in production.
    pub expose_error_details: bool,
}

/// Runs blocking database work off the async runtime.
///
/// Any failure, including a panicked or cancelled task, becomes a 500 that
/// carries `context` as its message.
pub async fn run_blocking<F, T>(state: &AppState, context: &'static str, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::internal(context)(e)
        })?
        .map_err(ApiError::internal(context))
}
