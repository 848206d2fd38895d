use super::dto::TokenEndpointResponse;
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// The current OAuth credential set, as persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute expiry, stored as unix seconds
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Fields written by other tools, carried through on rewrite
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_string()
}

impl TokenRecord {
    /// Build a record from a grant response received at `issued_at`.
    ///
    /// When `previous` is given (refresh), its refresh token, token type,
    /// scope and extra fields survive unless the response replaces them.
    ///
    /// A lifetime that cannot be represented as an instant is rejected as an
    /// invalid response.
    pub fn from_grant(
        response: TokenEndpointResponse,
        issued_at: DateTime<Utc>,
        previous: Option<&TokenRecord>,
    ) -> AppResult<Self> {
        let expires_in = response.expires_in.unwrap_or(0).max(0);
        let expires_at = Duration::try_seconds(expires_in)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .ok_or_else(|| {
                AppError::InvalidResponse(format!(
                    "Token lifetime out of range: expires_in={}",
                    expires_in
                ))
            })?;

        let refresh_token = response
            .refresh_token
            .filter(|token| !token.is_empty())
            .or_else(|| previous.and_then(|p| p.refresh_token.clone()));

        let token_type = response
            .token_type
            .filter(|t| !t.is_empty())
            .or_else(|| previous.map(|p| p.token_type.clone()))
            .unwrap_or_else(default_token_type);

        let scope = response
            .scope
            .or_else(|| previous.and_then(|p| p.scope.clone()));

        Ok(Self {
            access_token: response.access_token,
            refresh_token,
            expires_at,
            token_type,
            scope,
            extra: previous.map(|p| p.extra.clone()).unwrap_or_default(),
        })
    }

    /// True once `now` is within `margin` of the expiry (or past it)
    pub fn is_expired_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        match self.expires_at.checked_sub_signed(margin) {
            Some(threshold) => now >= threshold,
            None => true,
        }
    }

    /// Value for the `Authorization` header
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}
