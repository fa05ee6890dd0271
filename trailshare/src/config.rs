//! Runtime configuration read from the environment once at startup.

use std::{env, fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr};

use thiserror::Error;
use tracing::info;

const DEFAULT_BIND: &str = "0.0.0.0:3000";
const DEFAULT_DATABASE_URL: &str = "sqlite://trailshare.db?mode=rwc";
const DEFAULT_TOKEN_TTL_MINUTES: &str = "1440";
const DEFAULT_STORAGE_ROOT: &str = "./storage";
const DEFAULT_STORAGE_PUBLIC_URL: &str = "/files";
const DEFAULT_MAX_UPLOAD_BYTES: &str = "10485760";
const DEFAULT_LLM_MODEL: &str = "claude-3-5-haiku-latest";
const DEFAULT_MAIL_FROM: &str = "Trailshare <noreply@trailshare.local>";
const DEFAULT_CORS_ORIGINS: &str = "*";
const DEFAULT_RECENTLY_VIEWED_LIMIT: &str = "20";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable `{key}` is not set")]
    Missing { key: &'static str },

    #[error("invalid value for `{key}`: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub storage_root: PathBuf,
    /// URL prefix stored files are served under, without trailing slash
    pub storage_public_url: String,
    pub max_upload_bytes: usize,
    pub anthropic_api_key: Option<String>,
    pub llm_model: String,
    pub mapbox_token: Option<String>,
    pub resend_api_key: Option<String>,
    pub mail_from: String,
    /// Empty means any origin
    pub cors_origins: Vec<String>,
    pub recently_viewed_limit: usize,
}

impl Config {
    /// Load every setting from the environment, falling back to defaults.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when `JWT_SECRET` is missing or a value fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = optional("JWT_SECRET").ok_or(ConfigError::Missing { key: "JWT_SECRET" })?;
        if jwt_secret.len() < 16 {
            return Err(ConfigError::Invalid {
                key: "JWT_SECRET",
                message: "must be at least 16 characters".to_string(),
            });
        }

        let token_ttl_minutes: i64 = try_load("TOKEN_TTL_MINUTES", DEFAULT_TOKEN_TTL_MINUTES)?;
        if token_ttl_minutes <= 0 {
            return Err(ConfigError::Invalid {
                key: "TOKEN_TTL_MINUTES",
                message: "must be positive".to_string(),
            });
        }

        Ok(Self {
            bind_addr: try_load("TRAILSHARE_BIND", DEFAULT_BIND)?,
            database_url: try_load("DATABASE_URL", DEFAULT_DATABASE_URL)?,
            jwt_secret,
            token_ttl_minutes,
            storage_root: try_load("STORAGE_ROOT", DEFAULT_STORAGE_ROOT)?,
            storage_public_url: try_load::<String>("STORAGE_PUBLIC_URL", DEFAULT_STORAGE_PUBLIC_URL)?
                .trim_end_matches('/')
                .to_string(),
            max_upload_bytes: load_positive("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            anthropic_api_key: optional("ANTHROPIC_API_KEY"),
            llm_model: try_load("LLM_MODEL", DEFAULT_LLM_MODEL)?,
            mapbox_token: optional("MAPBOX_TOKEN"),
            resend_api_key: optional("RESEND_API_KEY"),
            mail_from: try_load("MAIL_FROM", DEFAULT_MAIL_FROM)?,
            cors_origins: parse_origins(&try_load::<String>("CORS_ORIGINS", DEFAULT_CORS_ORIGINS)?),
            recently_viewed_limit: load_positive("RECENTLY_VIEWED_LIMIT", DEFAULT_RECENTLY_VIEWED_LIMIT)?,
        })
    }

    /// Deterministic configuration for tests: in-memory database, no outbound services.
    #[must_use]
    pub fn for_tests(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "test-secret-with-enough-length".to_string(),
            token_ttl_minutes: 60,
            storage_root: storage_root.into(),
            storage_public_url: DEFAULT_STORAGE_PUBLIC_URL.to_string(),
            max_upload_bytes: 1024 * 1024,
            anthropic_api_key: None,
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            mapbox_token: None,
            resend_api_key: None,
            mail_from: DEFAULT_MAIL_FROM.to_string(),
            cors_origins: Vec::new(),
            recently_viewed_limit: 20,
        }
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    optional(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
        })
}

fn load_positive(key: &'static str, default: &str) -> Result<usize, ConfigError> {
    match try_load::<usize>(key, default)? {
        0 => Err(ConfigError::Invalid {
            key,
            message: "must be at least 1".to_string(),
        }),
        value => Ok(value),
    }
}

/// `*` (or nothing) allows any origin
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty() && *origin != "*")
        .map(ToString::to_string)
        .collect()
}
