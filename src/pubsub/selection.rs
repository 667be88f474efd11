//! Backend selection policy

/// Chooses which backend serves a given key (channel name or token).
///
/// Implementations must be deterministic for a key so a subscription is
/// served by exactly one backend.
pub trait BackendSelector: Send + Sync {
    /// Index into a backend list of length `count`, `None` when empty
    fn select(&self, key: &str, count: usize) -> Option<usize>;
}

/// Always the first configured backend
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstBackend;

impl BackendSelector for FirstBackend {
    fn select(&self, _key: &str, count: usize) -> Option<usize> {
        (count > 0).then_some(0)
    }
}
