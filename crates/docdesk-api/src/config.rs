use std::path::PathBuf;
use std::str::FromStr;

use crate::state::Settings;

/// JWT secrets that ship in examples and must never guard a real deployment.
pub const PLACEHOLDER_SECRETS: &[&str] = &[
    "dev-secret-change-me",
    "change-me-to-a-random-string",
    "your-secret-key",
];

const DEFAULT_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid {var} `{value}`: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("DOCDESK_JWT_SECRET is unset or still a placeholder; refusing to start in production")]
    PlaceholderSecret,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("expected development or production, got `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub jwt_secret: String,
    pub jwt_expires_hours: i64,
    pub max_upload_mb: u64,
    pub environment: Environment,
    pub allowed_origins: Vec<String>,
    /// Requests per IP per window; 0 disables limiting.
    pub rate_limit: u32,
    pub rate_window_secs: u64,
}

impl Config {
    /// Reads `DOCDESK_*` variables. Load `.env` before calling this.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let config = Config {
            host: text("DOCDESK_HOST", "0.0.0.0"),
            port: parse(&lookup, "DOCDESK_PORT", "3000")?,
            db_path: PathBuf::from(text("DOCDESK_DB_PATH", "docdesk.db")),
            upload_dir: PathBuf::from(text("DOCDESK_UPLOAD_DIR", "./uploads")),
            jwt_secret: lookup("DOCDESK_JWT_SECRET").unwrap_or_else(|| DEFAULT_SECRET.into()),
            jwt_expires_hours: parse(&lookup, "DOCDESK_JWT_EXPIRES_HOURS", "24")?,
            max_upload_mb: parse(&lookup, "DOCDESK_MAX_UPLOAD_MB", "10")?,
            environment: parse(&lookup, "DOCDESK_ENV", "development")?,
            allowed_origins: text(
                "DOCDESK_ALLOWED_ORIGINS",
                "http://localhost:5173,http://localhost:3000",
            )
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect(),
            rate_limit: parse(&lookup, "DOCDESK_RATE_LIMIT", "100")?,
            rate_window_secs: parse(&lookup, "DOCDESK_RATE_WINDOW_SECS", "900")?,
        };

        if config.jwt_expires_hours <= 0 {
            return Err(ConfigError::Invalid {
                var: "DOCDESK_JWT_EXPIRES_HOURS",
                value: config.jwt_expires_hours.to_string(),
                reason: "must be positive".into(),
            });
        }
        if config.rate_window_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "DOCDESK_RATE_WINDOW_SECS",
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }

        Ok(config)
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn has_placeholder_secret(&self) -> bool {
        let secret = self.jwt_secret.trim();
        secret.is_empty() || PLACEHOLDER_SECRETS.contains(&secret)
    }

    /// A placeholder secret is fatal in production; elsewhere the caller
    /// just warns.
    pub fn check_secret(&self) -> Result<(), ConfigError> {
        if self.is_production() && self.has_placeholder_secret() {
            return Err(ConfigError::PlaceholderSecret);
        }
        Ok(())
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn settings(&self) -> Settings {
        Settings {
            jwt_secret: self.jwt_secret.clone(),
            token_ttl: chrono::Duration::hours(self.jwt_expires_hours),
            max_upload_bytes: self.max_upload_bytes(),
            expose_error_details: !self.is_production(),
        }
    }
}

fn parse<F, T>(lookup: &F, var: &'static str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string());
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
        value: raw.clone(),
    })
}
