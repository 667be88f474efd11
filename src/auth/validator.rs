//! Cached bearer-token validation.

use std::sync::Arc;
use std::time::Duration;

use crate::metrics::AuthMetrics;

use super::{token_fingerprint, AuthError, Authority, TokenCache};

/// Validates tokens against the authorization service, shielding it with a cache.
///
/// A cache hit answers without any external call. On a miss the authority is
/// asked once and its definitive verdict is cached for `ttl`. Authority
/// failures are returned as errors and leave the cache untouched.
pub struct TokenValidator {
    authority: Arc<dyn Authority>,
    cache: Arc<dyn TokenCache>,
    ttl: Duration,
}

impl TokenValidator {
    pub fn new(authority: Arc<dyn Authority>, cache: Arc<dyn TokenCache>, ttl: Duration) -> Self {
        Self {
            authority,
            cache,
            ttl,
        }
    }

    /// TTL applied to newly cached verdicts
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[tracing::instrument(
        name = "auth.validate",
        skip(self, token),
        fields(token = %token_fingerprint(token))
    )]
    pub async fn validate(&self, token: &str) -> Result<bool, AuthError> {
        if let Some(valid) = self.cache.get(token).await? {
            AuthMetrics::record_cache_hit();
            tracing::debug!(valid, "Token verdict served from cache");
            return Ok(valid);
        }

        AuthMetrics::record_cache_miss();
        tracing::debug!("Token not cached, calling authorization service");

        let valid = match self.authority.authorize(token).await {
            Ok(valid) => valid,
            Err(e) => {
                AuthMetrics::record_authority_call("error");
                tracing::warn!(error = %e, "Authorization service call failed");
                return Err(e);
            }
        };
        AuthMetrics::record_authority_call(if valid { "valid" } else { "invalid" });

        if self.ttl.as_secs() == 0 {
            tracing::debug!(valid, "Cache TTL is zero, verdict not cached");
            return Ok(valid);
        }

        // The verdict stands even if it could not be cached
        match self.cache.put(token, valid, self.ttl).await {
            Ok(()) => tracing::info!(valid, ttl_secs = self.ttl.as_secs(), "Token verdict cached"),
            Err(e) => tracing::warn!(valid, error = %e, "Failed to cache token verdict"),
        }

        Ok(valid)
    }
}
