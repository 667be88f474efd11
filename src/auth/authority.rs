//! Client for the external authorization service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;

use super::{token_fingerprint, AuthError};

/// Source of definitive yes/no answers for a bearer token
#[async_trait]
pub trait Authority: Send + Sync {
    /// `Ok(true)` when the token is accepted, `Ok(false)` when refused.
    /// Transport failures and timeouts are errors, never `Ok(false)`.
    async fn authorize(&self, token: &str) -> Result<bool, AuthError>;
}

/// Calls `POST <url>` with `Authorization: Bearer <token>` and an empty body
pub struct HttpAuthority {
    client: Client,
    url: String,
}

impl HttpAuthority {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Client(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Authority for HttpAuthority {
    async fn authorize(&self, token: &str) -> Result<bool, AuthError> {
        let fingerprint = token_fingerprint(token);

        let response = self
            .client
            .post(&self.url)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(token = %fingerprint, error = %e, "Authorization request failed");
                AuthError::Authority(e)
            })?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(token = %fingerprint, status = status.as_u16(), "Authorization service accepted token");
            return Ok(true);
        }

        // Body is only read for diagnostics
        let body = response.text().await.unwrap_or_default();
        tracing::info!(
            token = %fingerprint,
            status = status.as_u16(),
            body = %body,
            "Authorization service refused token"
        );
        Ok(false)
    }
}
