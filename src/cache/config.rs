//! Burst cache configuration.
//!
//! Two durations drive every entry: `ttl` (how long it stays fresh) and `ttd`
//! (how long it stays servable once stale). Both are fixed at construction.

use std::time::Duration;

use serde::Deserialize;

use super::error::ConfigError;

const DEFAULT_TTL_MS: u64 = 250;
const DEFAULT_TTD_MS: u64 = 750;

/// Burst cache configuration.
///
/// Tuning:
///
/// - `ttl_ms` acts as a throttle on the downstream handler. At most one
///   regeneration per key starts per TTL window, so 4 req/s of downstream
///   capacity means a TTL of 250 ms.
/// - `ttl_ms + ttd_ms` is the longest a client can be served stale data.
///   Tolerating one second of staleness at a 250 ms TTL gives a TTD of 750 ms.
/// - `ttd_ms` should also exceed the typical regeneration time with some margin,
///   otherwise entries die while their replacement is still being produced.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BurstConfig {
    /// Pass every request straight through when `false`.
    pub enabled: bool,
    /// Freshness window in milliseconds.
    pub ttl_ms: u64,
    /// Stale grace window in milliseconds, counted from the end of the TTL.
    pub ttd_ms: u64,
    /// Set the cached-marker header on responses served from the cache.
    pub mark_cached: bool,
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_ms: DEFAULT_TTL_MS,
            ttd_ms: DEFAULT_TTD_MS,
            mark_cached: true,
        }
    }
}

impl BurstConfig {
    /// Builds a configuration from durations, truncated to whole milliseconds.
    pub fn new(ttl: Duration, ttd: Duration) -> Self {
        Self {
            ttl_ms: millis(ttl),
            ttd_ms: millis(ttd),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_mark_cached(mut self, mark_cached: bool) -> Self {
        self.mark_cached = mark_cached;
        self
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn ttd(&self) -> Duration {
        Duration::from_millis(self.ttd_ms)
    }

    /// Rejects configurations that can never serve a fresh hit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl_ms == 0 {
            return Err(ConfigError::ZeroTtl);
        }
        Ok(())
    }

    /// Parses a JSON document such as `{"ttl_ms": 1000, "ttd_ms": 4000}` and
    /// validates it. Missing fields take their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
