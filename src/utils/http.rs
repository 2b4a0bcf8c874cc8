// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::MediaConfig;

/// Create a configured asynchronous HTTP client for media downloads.
pub fn create_client(config: &MediaConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Download a response body, mapping non-success statuses to a media error.
pub async fn fetch_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::media(url, format!("HTTP status {}", status)));
    }
    Ok(response.bytes().await?.to_vec())
}
