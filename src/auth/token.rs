//! Token service client

use std::fmt;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use serde::Deserialize;

/// Identity and bearer token issued by the token service.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub token: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    /// Expiry as sent by the service (usually RFC 3339).
    #[serde(rename = "expiresOn")]
    pub expires_on: String,
}

impl Credentials {
    /// Expiry for display: local time when it parses, verbatim otherwise.
    pub fn expiry_display(&self) -> String {
        match DateTime::parse_from_rfc3339(&self.expires_on) {
            Ok(t) => t
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            Err(_) => self.expires_on.clone(),
        }
    }
}

// Keep the token out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Parse a token service response.
///
/// Accepts the credential object directly, or wrapped as a JSON string in a
/// `content` field (the shape some function hosts return).
pub fn parse_credentials(body: &str) -> Result<Credentials> {
    let v: serde_json::Value =
        serde_json::from_str(body).context("Token response is not valid JSON")?;

    if let Some(content) = v.get("content").and_then(|c| c.as_str()) {
        return serde_json::from_str(content).context("Failed to parse token response content");
    }

    serde_json::from_value(v).context("Token response missing token/userId/expiresOn")
}

/// Supplies credentials on demand.
#[allow(async_fn_in_trait)]
pub trait TokenProvider {
    async fn fetch(&self) -> Result<Credentials>;
}

/// Fetches credentials with a plain GET. No retries.
pub struct HttpTokenProvider {
    http: reqwest::Client,
    url: String,
}

impl HttpTokenProvider {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

impl TokenProvider for HttpTokenProvider {
    async fn fetch(&self) -> Result<Credentials> {
        tracing::debug!("Fetching token from {}", self.url);

        let resp = self
            .http
            .get(&self.url)
            .header("Content-Type", "application/json")
            .send()
            .await
            .with_context(|| format!("Token GET {} failed", self.url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "Token fetch failed (HTTP {}): {}",
                status.as_u16(),
                body
            );
        }

        let body = resp
            .text()
            .await
            .context("Failed to read token response")?;
        let credentials = parse_credentials(&body)?;
        tracing::info!("Fetched token for {}", credentials.user_id);
        Ok(credentials)
    }
}
