use crate::domain::auth::{OAuthErrorBody, TokenEndpointResponse};
use crate::error::{AppError, AppResult};
use serde::Deserialize;

/// How grant parameters are encoded in the token request body
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenRequestEncoding {
    /// `application/x-www-form-urlencoded`, the RFC 6749 default
    #[default]
    Form,
    /// JSON body, accepted by Auth0-style servers
    Json,
}

/// A token request, one variant per supported grant type
#[derive(Debug, Clone)]
pub enum TokenGrant<'a> {
    ClientCredentials {
        client_id: &'a str,
        client_secret: &'a str,
        scope: Option<&'a str>,
    },
    AuthorizationCode {
        code: &'a str,
        redirect_uri: &'a str,
        client_id: &'a str,
        client_secret: Option<&'a str>,
    },
    RefreshToken {
        refresh_token: &'a str,
        client_id: &'a str,
        client_secret: Option<&'a str>,
    },
}

impl<'a> TokenGrant<'a> {
    pub fn grant_type(&self) -> &'static str {
        match self {
            Self::ClientCredentials { .. } => "client_credentials",
            Self::AuthorizationCode { .. } => "authorization_code",
            Self::RefreshToken { .. } => "refresh_token",
        }
    }

    /// Body parameters in a stable order
    pub fn params(&self) -> Vec<(&'static str, &'a str)> {
        let mut params = vec![("grant_type", self.grant_type())];
        match *self {
            Self::ClientCredentials {
                client_id,
                client_secret,
                scope,
            } => {
                params.push(("client_id", client_id));
                params.push(("client_secret", client_secret));
                if let Some(scope) = scope {
                    params.push(("scope", scope));
                }
            }
            Self::AuthorizationCode {
                code,
                redirect_uri,
                client_id,
                client_secret,
            } => {
                params.push(("client_id", client_id));
                if let Some(secret) = client_secret {
                    params.push(("client_secret", secret));
                }
                params.push(("code", code));
                params.push(("redirect_uri", redirect_uri));
            }
            Self::RefreshToken {
                refresh_token,
                client_id,
                client_secret,
            } => {
                params.push(("client_id", client_id));
                if let Some(secret) = client_secret {
                    params.push(("client_secret", secret));
                }
                params.push(("refresh_token", refresh_token));
            }
        }
        params
    }
}

/// HTTP client for an OAuth 2.0 token endpoint
pub struct OAuthTokenClient {
    token_url: String,
    authorize_url: Option<String>,
    encoding: TokenRequestEncoding,
    http_client: reqwest::Client,
}

impl OAuthTokenClient {
    pub fn new(token_url: String, encoding: TokenRequestEncoding) -> Self {
        Self {
            token_url,
            authorize_url: None,
            encoding,
            http_client: reqwest::Client::new(),
        }
    }

    pub fn with_authorize_url(mut self, authorize_url: Option<String>) -> Self {
        self.authorize_url = authorize_url;
        self
    }

    pub fn with_http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = http_client;
        self
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Generate the browser URL for the authorization-code flow
    pub fn authorization_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
        scope: Option<&str>,
        state: &str,
    ) -> AppResult<String> {
        let base = self.authorize_url.as_deref().ok_or_else(|| {
            AppError::Config("OAUTH_AUTHORIZE_URL is not configured".to_string())
        })?;

        let mut url = format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&state={}",
            base,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state),
        );
        if let Some(scope) = scope {
            url.push_str("&scope=");
            url.push_str(&urlencoding::encode(scope));
        }
        Ok(url)
    }

    /// POST a grant to the token endpoint.
    ///
    /// A 4xx answer to a refresh grant is reported as [`AppError::Refresh`];
    /// every other non-2xx answer as [`AppError::Auth`]. Nothing is retried.
    pub async fn request_token(&self, grant: &TokenGrant<'_>) -> AppResult<TokenEndpointResponse> {
        let params = grant.params();

        tracing::debug!(
            grant_type = grant.grant_type(),
            token_url = %self.token_url,
            "Requesting token"
        );

        let request = self
            .http_client
            .post(&self.token_url)
            .header(reqwest::header::ACCEPT, "application/json");

        let request = match self.encoding {
            TokenRequestEncoding::Form => request.form(&params),
            TokenRequestEncoding::Json => {
                let body: serde_json::Map<String, serde_json::Value> = params
                    .iter()
                    .map(|(k, v)| (k.to_string(), serde_json::Value::from(*v)))
                    .collect();
                request.json(&body)
            }
        };

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let error = OAuthErrorBody::from_response_body(status.as_u16(), &error_text);

            tracing::error!(
                grant_type = grant.grant_type(),
                status = status.as_u16(),
                error = %error,
                "Token endpoint rejected grant"
            );

            return Err(match grant {
                TokenGrant::RefreshToken { .. } if status.is_client_error() => AppError::Refresh {
                    status: status.as_u16(),
                    error,
                },
                _ => AppError::Auth {
                    status: status.as_u16(),
                    error,
                },
            });
        }

        let body = response.text().await?;
        serde_json::from_str::<TokenEndpointResponse>(&body)
            .map_err(|e| AppError::InvalidResponse(format!("Failed to parse token response: {}", e)))
    }
}
