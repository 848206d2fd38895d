use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Successful token endpoint response (RFC 6749 section 5.1)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEndpointResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds. Some servers send it as a string.
    #[serde(default, deserialize_with = "deserialize_expires_in")]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Error payload returned by the token endpoint (RFC 6749 section 5.2)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthErrorBody {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl OAuthErrorBody {
    /// Parse the server payload, falling back to the raw body when it is not
    /// a standard OAuth error document.
    pub fn from_response_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<OAuthErrorBody>(body) {
            Ok(parsed) => parsed,
            Err(_) => {
                let trimmed = body.trim();
                Self {
                    error: format!("http_{}", status),
                    error_description: if trimmed.is_empty() {
                        None
                    } else {
                        Some(trimmed.chars().take(500).collect())
                    },
                }
            }
        }
    }
}

impl fmt::Display for OAuthErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{}: {}", self.error, description),
            None => write!(f, "{}", self.error),
        }
    }
}

fn deserialize_expires_in<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(i64),
        Float(f64),
        String(String),
    }

    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::Float(f)) if f.is_finite() => Ok(Some(f as i64)),
        Some(NumberOrString::Float(f)) => Err(serde::de::Error::custom(format!(
            "expires_in is not a finite number: {}",
            f
        ))),
        Some(NumberOrString::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
