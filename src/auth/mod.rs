//! Bearer-token validation against an external authorization service.

mod authority;
mod cache;
mod validator;

pub use authority::{Authority, HttpAuthority};
pub use cache::{MemoryTokenCache, RedisTokenCache, TokenCache};
pub use validator::TokenValidator;

use thiserror::Error;

/// Errors that leave a token's validity undetermined.
///
/// A refused token is not an error; it is `Ok(false)`.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authorization service call failed: {0}")]
    Authority(#[from] reqwest::Error),

    #[error("Token cache error: {0}")]
    Cache(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Short, log-safe prefix of a token
pub(crate) fn token_fingerprint(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{}***", prefix)
}
