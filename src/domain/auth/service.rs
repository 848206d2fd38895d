use super::clock::{Clock, SystemClock};
use super::model::TokenRecord;
use crate::{
    error::{AppError, AppResult},
    infrastructure::{
        oauth::{OAuthTokenClient, TokenGrant},
        repositories::TokenRepository,
    },
};
use chrono::Duration;
use reqwest::{header::AUTHORIZATION, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

pub const DEFAULT_SAFETY_MARGIN_SECS: i64 = 60;

/// Client identity used for refresh and re-authentication
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
}

/// Owns the current token record and keeps it valid.
///
/// Every successful grant replaces the record and is persisted through the
/// token repository before the call returns. A failed grant leaves the
/// previous record untouched.
pub struct TokenExchange {
    oauth_client: Arc<OAuthTokenClient>,
    token_repo: Arc<dyn TokenRepository>,
    credentials: ClientCredentials,
    clock: Arc<dyn Clock>,
    api_client: reqwest::Client,
    api_base: String,
    safety_margin: Duration,
    current: Option<TokenRecord>,
}

impl TokenExchange {
    pub fn new(
        oauth_client: Arc<OAuthTokenClient>,
        token_repo: Arc<dyn TokenRepository>,
        credentials: ClientCredentials,
        api_base: String,
    ) -> Self {
        Self {
            oauth_client,
            token_repo,
            credentials,
            clock: Arc::new(SystemClock),
            api_client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            safety_margin: Duration::seconds(DEFAULT_SAFETY_MARGIN_SECS),
            current: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_safety_margin(mut self, margin: Duration) -> Self {
        self.safety_margin = margin;
        self
    }

    pub fn with_api_client(mut self, api_client: reqwest::Client) -> Self {
        self.api_client = api_client;
        self
    }

    pub fn current(&self) -> Option<&TokenRecord> {
        self.current.as_ref()
    }

    pub fn credentials(&self) -> &ClientCredentials {
        &self.credentials
    }

    pub fn oauth_client(&self) -> &OAuthTokenClient {
        &self.oauth_client
    }

    /// Load the persisted record, if any, as the current one
    pub async fn restore(&mut self) -> AppResult<Option<&TokenRecord>> {
        self.current = self.token_repo.load().await?;
        Ok(self.current.as_ref())
    }

    /// Client-credentials grant
    pub async fn authenticate_client_credentials(
        &mut self,
        client_id: &str,
        client_secret: &str,
        scope: Option<&str>,
    ) -> AppResult<&TokenRecord> {
        tracing::info!(client_id = %client_id, "Authenticating with client credentials");
        let grant = TokenGrant::ClientCredentials {
            client_id,
            client_secret,
            scope,
        };
        self.exchange(&grant, None).await
    }

    /// Authorization-code grant
    pub async fn authenticate_authorization_code(
        &mut self,
        code: &str,
        redirect_uri: &str,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> AppResult<&TokenRecord> {
        tracing::info!(client_id = %client_id, "Exchanging authorization code");
        let grant = TokenGrant::AuthorizationCode {
            code,
            redirect_uri,
            client_id,
            client_secret,
        };
        self.exchange(&grant, None).await
    }

    /// Refresh-token grant. On rejection the current record is kept as is.
    pub async fn refresh(&mut self, refresh_token: &str) -> AppResult<&TokenRecord> {
        tracing::info!("Attempting to refresh token");
        let credentials = self.credentials.clone();
        let grant = TokenGrant::RefreshToken {
            refresh_token,
            client_id: &credentials.client_id,
            client_secret: credentials.client_secret.as_deref(),
        };
        let previous = self.current.clone();
        let record = self.exchange(&grant, previous.as_ref()).await?;

        if record.refresh_token.as_deref() != Some(refresh_token) {
            tracing::info!("Received new refresh token (token rotation active)");
        } else {
            tracing::info!("No new refresh token received; keeping existing one");
        }
        Ok(record)
    }

    /// True when there is no token or it is within the safety margin of expiry
    pub fn is_expired(&self) -> bool {
        match &self.current {
            Some(record) => record.is_expired_at(self.clock.now(), self.safety_margin),
            None => true,
        }
    }

    /// Return a usable token, renewing it first when it has expired.
    ///
    /// No network call is made while the current token is valid.
    pub async fn ensure_valid(&mut self) -> AppResult<&TokenRecord> {
        if self.is_expired() {
            match &self.current {
                Some(record) => tracing::info!(
                    expires_at = %record.expires_at,
                    "Token is expired or expiring soon, renewing"
                ),
                None => tracing::info!("No token available, authenticating"),
            }
            self.renew().await?;
        } else {
            tracing::debug!("Current access token is valid");
        }

        self.current.as_ref().ok_or(AppError::NotAuthenticated)
    }

    /// Send a request to the API with the bearer token attached.
    ///
    /// A 401 triggers exactly one renewal and one retry. Non-2xx answers
    /// are returned as errors.
    pub async fn make_authenticated_request(
        &mut self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> AppResult<reqwest::Response> {
        let authorization = self.ensure_valid().await?.authorization_header();
        let response = self.send(method.clone(), path, body, &authorization).await?;

        let response = if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(path = %path, "Request unauthorized, refreshing token and retrying once");
            let authorization = self.renew().await?.authorization_header();
            let retried = self.send(method, path, body, &authorization).await?;

            if retried.status() == StatusCode::UNAUTHORIZED {
                tracing::error!(path = %path, "Request still unauthorized after token refresh");
                return Err(AppError::Unauthorized(path.to_string()));
            }
            retried
        } else {
            response
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(path = %path, status = status.as_u16(), "Upstream request failed");
            return Err(AppError::Upstream {
                path: path.to_string(),
                status: status.as_u16(),
                body: body.chars().take(300).collect(),
            });
        }

        Ok(response)
    }

    /// Authenticated GET decoding a JSON body
    pub async fn get_json<T: DeserializeOwned>(&mut self, path: &str) -> AppResult<T> {
        let response = self
            .make_authenticated_request(Method::GET, path, None)
            .await?;
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| AppError::InvalidResponse(format!("Failed to parse {}: {}", path, e)))
    }

    /// Obtain a replacement token: refresh when possible, fall back to client
    /// credentials when the refresh token is missing or rejected and a secret
    /// is configured.
    async fn renew(&mut self) -> AppResult<&TokenRecord> {
        let refresh_token = self
            .current
            .as_ref()
            .and_then(|record| record.refresh_token.clone());

        let failure = match refresh_token {
            Some(refresh_token) => match self.refresh(&refresh_token).await {
                Ok(_) => None,
                Err(err @ AppError::Refresh { .. }) => Some(err),
                Err(err) => return Err(err),
            },
            None => Some(if self.current.is_some() {
                AppError::MissingRefreshToken
            } else {
                AppError::NotAuthenticated
            }),
        };

        if let Some(err) = failure {
            let credentials = self.credentials.clone();
            match credentials.client_secret.as_deref() {
                Some(secret) => {
                    tracing::warn!(error = %err, "Falling back to client credentials");
                    self.authenticate_client_credentials(
                        &credentials.client_id,
                        secret,
                        credentials.scope.as_deref(),
                    )
                    .await?;
                }
                None => return Err(err),
            }
        }

        self.current.as_ref().ok_or(AppError::NotAuthenticated)
    }

    async fn exchange(
        &mut self,
        grant: &TokenGrant<'_>,
        previous: Option<&TokenRecord>,
    ) -> AppResult<&TokenRecord> {
        let issued_at = self.clock.now();
        let response = self.oauth_client.request_token(grant).await?;
        let record = TokenRecord::from_grant(response, issued_at, previous)?;

        tracing::info!(
            grant_type = grant.grant_type(),
            expires_at = %record.expires_at,
            has_refresh_token = record.refresh_token.is_some(),
            "Token obtained"
        );

        let record = self.current.insert(record);
        self.token_repo.save(record).await?;
        Ok(record)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        authorization: &str,
    ) -> AppResult<reqwest::Response> {
        let url = format!("{}{}", self.api_base, path);
        let mut request = self
            .api_client
            .request(method, &url)
            .header(AUTHORIZATION, authorization);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }
}
