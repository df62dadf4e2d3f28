//! Error types for the burst cache.

use thiserror::Error;

/// Errors raised by [`CacheStore`](super::CacheStore) operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    /// `serve` was called for a key with no entry. Callers check
    /// [`status`](super::CacheStore::status) first; seeing this means the
    /// entry decayed in between.
    #[error("no cache entry for key `{key}`")]
    MissingEntry { key: String },
}

/// Errors produced while loading or validating a [`BurstConfig`](super::BurstConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ttl must be greater than zero")]
    ZeroTtl,

    #[error("invalid burst cache configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
