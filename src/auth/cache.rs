//! Token verdict cache backends.
//!
//! Expiry is owned by the backing store: Redis `SET EX` for the Redis
//! backend, a stored deadline for the in-memory one. Entries are only
//! written for definitive verdicts.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;

use crate::pubsub::RedisBackend;

use super::AuthError;

const VALID: &str = "valid";
const INVALID: &str = "invalid";

/// Storage for token verdicts
#[async_trait]
pub trait TokenCache: Send + Sync {
    /// Cached verdict, `None` on a miss or after expiry
    async fn get(&self, token: &str) -> Result<Option<bool>, AuthError>;

    /// Store a verdict for `ttl`
    async fn put(&self, token: &str, valid: bool, ttl: Duration) -> Result<(), AuthError>;
}

/// Verdicts stored as `valid` / `invalid` strings keyed by the raw token
pub struct RedisTokenCache {
    backend: Arc<RedisBackend>,
}

impl RedisTokenCache {
    pub fn new(backend: Arc<RedisBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl TokenCache for RedisTokenCache {
    async fn get(&self, token: &str) -> Result<Option<bool>, AuthError> {
        let cached: Option<String> = self
            .backend
            .execute(|mut conn| async move { conn.get(token).await })
            .await
            .map_err(|e| AuthError::Cache(e.to_string()))?;

        Ok(cached.map(|v| v == VALID))
    }

    async fn put(&self, token: &str, valid: bool, ttl: Duration) -> Result<(), AuthError> {
        let value = if valid { VALID } else { INVALID };
        let seconds = ttl.as_secs();

        self.backend
            .execute(|mut conn| async move { conn.set_ex::<_, _, ()>(token, value, seconds).await })
            .await
            .map_err(|e| AuthError::Cache(e.to_string()))
    }
}

/// Upper bound for entries whose TTL does not fit in an `Instant`
const MAX_MEMORY_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Process-local cache; expired entries are dropped on read and on every write
#[derive(Default)]
pub struct MemoryTokenCache {
    entries: DashMap<String, (bool, Instant)>,
}

impl MemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl TokenCache for MemoryTokenCache {
    async fn get(&self, token: &str) -> Result<Option<bool>, AuthError> {
        let now = Instant::now();
        let verdict = match self.entries.get(token) {
            Some(entry) if entry.1 > now => return Ok(Some(entry.0)),
            Some(_) => None,
            None => return Ok(None),
        };

        self.entries.remove_if(token, |_, (_, expires)| *expires <= now);
        Ok(verdict)
    }

    async fn put(&self, token: &str, valid: bool, ttl: Duration) -> Result<(), AuthError> {
        let now = Instant::now();
        self.entries.retain(|_, (_, expires)| *expires > now);

        let expires = now.checked_add(ttl).unwrap_or(now + MAX_MEMORY_TTL);
        self.entries.insert(token.to_string(), (valid, expires));
        Ok(())
    }
}
