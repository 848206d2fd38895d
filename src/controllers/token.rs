use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    domain::workout::UserProfile,
    error::{AppError, AppResult},
    infrastructure::repositories::WorkoutApiRepository,
};

/// Stored token summary for `status`
#[derive(Debug, Clone, PartialEq)]
pub struct TokenStatus {
    pub expires_at: DateTime<Utc>,
    pub expired: bool,
    pub has_refresh_token: bool,
}

/// Token lifecycle commands
pub struct TokenController {
    api: WorkoutApiRepository,
}

impl TokenController {
    pub fn new(api: WorkoutApiRepository) -> Self {
        Self { api }
    }

    /// `refresh` - refresh the stored token and validate it against `/api/me`
    pub async fn refresh(&mut self) -> AppResult<UserProfile> {
        let exchange = self.api.exchange_mut();
        let refresh_token = exchange
            .restore()
            .await?
            .ok_or(AppError::NotAuthenticated)?
            .refresh_token
            .clone()
            .ok_or_else(|| {
                tracing::error!("No refresh token found in the tokens file");
                AppError::MissingRefreshToken
            })?;

        exchange.refresh(&refresh_token).await?;

        tracing::info!("Validating new token");
        let user = self.api.me().await?;

        println!("Token refreshed and validated");
        println!("User ID: {}", user.id);
        println!("Username: {}", user.username.as_deref().unwrap_or("Unknown"));

        Ok(user)
    }

    /// `login` - authorization-code grant when a code is given, client
    /// credentials otherwise
    pub async fn login(&mut self, code: Option<&str>, redirect_uri: Option<&str>) -> AppResult<()> {
        let exchange = self.api.exchange_mut();
        let credentials = exchange.credentials().clone();

        let record = match code {
            Some(code) => {
                let redirect_uri = redirect_uri.ok_or_else(|| {
                    AppError::Config("A redirect URI is required with --code".to_string())
                })?;
                exchange
                    .authenticate_authorization_code(
                        code,
                        redirect_uri,
                        &credentials.client_id,
                        credentials.client_secret.as_deref(),
                    )
                    .await?
            }
            None => {
                let secret = credentials.client_secret.as_deref().ok_or_else(|| {
                    AppError::Config(
                        "OAUTH_CLIENT_SECRET is required for the client credentials grant"
                            .to_string(),
                    )
                })?;
                exchange
                    .authenticate_client_credentials(
                        &credentials.client_id,
                        secret,
                        credentials.scope.as_deref(),
                    )
                    .await?
            }
        };

        println!("Logged in, token expires at {}", record.expires_at);
        Ok(())
    }

    /// `authorize-url` - URL to open in a browser to obtain a code
    pub fn authorize_url(&self, redirect_uri: Option<&str>, state: Option<&str>) -> AppResult<String> {
        let exchange = self.api.exchange();
        let credentials = exchange.credentials();
        let redirect_uri = redirect_uri.ok_or_else(|| {
            AppError::Config("OAUTH_REDIRECT_URI is not set".to_string())
        })?;
        let state = state
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

        exchange.oauth_client().authorization_url(
            &credentials.client_id,
            redirect_uri,
            credentials.scope.as_deref(),
            &state,
        )
    }

    /// `status` - expiry of the stored token, no network calls
    pub async fn status(&mut self) -> AppResult<TokenStatus> {
        let exchange = self.api.exchange_mut();
        let record = exchange
            .restore()
            .await?
            .ok_or(AppError::NotAuthenticated)?;

        let expires_at = record.expires_at;
        let has_refresh_token = record.refresh_token.is_some();

        Ok(TokenStatus {
            expires_at,
            expired: exchange.is_expired(),
            has_refresh_token,
        })
    }
}
