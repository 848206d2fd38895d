use crate::domain::auth::OAuthErrorBody;

/// Main application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication failed ({status}): {error}")]
    Auth { status: u16, error: OAuthErrorBody },

    #[error("Refresh token rejected ({status}): {error}")]
    Refresh { status: u16, error: OAuthErrorBody },

    #[error("No refresh token available")]
    MissingRefreshToken,

    #[error("Not authenticated: no stored token and no client secret configured")]
    NotAuthenticated,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unauthorized after token refresh: {0}")]
    Unauthorized(String),

    #[error("Upstream request {path} failed ({status}): {body}")]
    Upstream {
        path: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Token storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Auth { .. } | Self::NotAuthenticated => 3,
            Self::Refresh { .. } | Self::MissingRefreshToken => 4,
            Self::Unauthorized(_) => 5,
            Self::Network(_) => 6,
            Self::Upstream { .. } | Self::InvalidResponse(_) => 7,
            Self::Storage(_) => 8,
            Self::Database(_) => 9,
        }
    }

    /// Whether the caller has to go through a fresh authorization flow
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            Self::Refresh { .. } | Self::MissingRefreshToken | Self::NotAuthenticated
        )
    }
}

/// Custom result type for the application
pub type AppResult<T> = Result<T, AppError>;
