use crate::domain::auth::DEFAULT_SAFETY_MARGIN_SECS;
use crate::domain::workout::DEFAULT_PAGE_SIZE;
use crate::error::{AppError, AppResult};
use crate::infrastructure::oauth::TokenRequestEncoding;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Thirty days
pub const MAX_SAFETY_MARGIN_SECS: i64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // OAuth
    pub token_url: String,
    pub authorize_url: Option<String>,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
    pub redirect_uri: Option<String>,
    pub token_request_encoding: TokenRequestEncoding,
    pub tokens_file: PathBuf,
    pub token_safety_margin_secs: i64,
    // Fitness API
    pub api_base_url: String,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub workout_page_size: u32,
    // Database, only needed by `sync`
    pub database_url: Option<String>,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            token_url: required("OAUTH_TOKEN_URL")?,
            authorize_url: optional("OAUTH_AUTHORIZE_URL"),
            client_id: required("OAUTH_CLIENT_ID")?,
            client_secret: optional("OAUTH_CLIENT_SECRET"),
            scope: optional("OAUTH_SCOPE"),
            redirect_uri: optional("OAUTH_REDIRECT_URI"),
            token_request_encoding: match optional("OAUTH_REQUEST_ENCODING")
                .map(|s| s.to_lowercase())
                .as_deref()
            {
                None | Some("form") => TokenRequestEncoding::Form,
                Some("json") => TokenRequestEncoding::Json,
                Some(other) => {
                    return Err(AppError::Config(format!(
                        "OAUTH_REQUEST_ENCODING must be 'form' or 'json', got '{}'",
                        other
                    )))
                }
            },
            tokens_file: PathBuf::from(
                optional("TOKENS_FILE").unwrap_or_else(|| "tokens.json".to_string()),
            ),
            token_safety_margin_secs: parsed(
                "TOKEN_SAFETY_MARGIN_SECS",
                DEFAULT_SAFETY_MARGIN_SECS,
            )?,
            api_base_url: required("API_BASE_URL")?,
            http_timeout_secs: parsed("HTTP_TIMEOUT_SECS", 30)?,
            user_agent: env::var("HTTP_USER_AGENT")
                .unwrap_or_else(|_| format!("workout-sync/{}", env!("CARGO_PKG_VERSION"))),
            workout_page_size: parsed("WORKOUT_PAGE_SIZE", DEFAULT_PAGE_SIZE)?,
            database_url: optional("DATABASE_URL"),
            log_format: match optional("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        if !(0..=MAX_SAFETY_MARGIN_SECS).contains(&config.token_safety_margin_secs) {
            return Err(AppError::Config(format!(
                "TOKEN_SAFETY_MARGIN_SECS must be between 0 and {}",
                MAX_SAFETY_MARGIN_SECS
            )));
        }

        Ok(config)
    }

    /// Database URL, required by commands that write workouts
    pub fn require_database_url(&self) -> AppResult<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| AppError::Config("DATABASE_URL is not set".to_string()))
    }
}

fn required(name: &str) -> AppResult<String> {
    optional(name).ok_or_else(|| AppError::Config(format!("{} is not set", name)))
}

/// Unset and blank are treated the same
fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parsed<T>(name: &str, default: T) -> AppResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{} is invalid: {}", name, e))),
    }
}
