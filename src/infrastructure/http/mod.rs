use std::time::Duration;

use crate::error::AppResult;
use crate::infrastructure::config::Config;

/// Shared HTTP client for the token endpoint and the fitness API
pub fn build_http_client(config: &Config) -> AppResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()?;

    tracing::debug!(
        user_agent = %config.user_agent,
        timeout_secs = config.http_timeout_secs,
        "HTTP client built"
    );

    Ok(client)
}
