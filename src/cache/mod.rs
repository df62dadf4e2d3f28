//! Burst cache — short-lived response caching with stampede protection.
//!
//! Entries move through four states:
//!
//! | State                   | Served?         | Next transition                          |
//! |-------------------------|-----------------|------------------------------------------|
//! | absent                  | no, filled live | first request regenerates synchronously  |
//! | fresh                   | yes, marked     | stale after `ttl`                        |
//! | stale, idle             | yes, marked     | next request claims a regeneration       |
//! | stale, regenerating     | yes, marked     | replaced when the regeneration finishes  |
//!
//! A stale entry nobody regenerates within `ttd` is removed and the key is
//! absent again.
//!
//! - [`BurstCache`] — the [`Middleware`](crate::middleware::Middleware).
//! - [`CacheStore`] — lock-guarded map of [`RecordedResponse`]s.
//! - [`Keyer`], [`PathKey`], [`ScopedKey`] — key derivation.
//! - [`DecaySchedule`] — the per-regeneration TTL/TTD timer task.
//! - [`BurstConfig`] — TTL, TTD, and the cached-marker toggle.

mod config;
mod decay;
mod error;
mod keys;
mod lock;
mod middleware;
mod recorded;
mod store;

pub use config::BurstConfig;
pub use decay::DecaySchedule;
pub use error::{CacheError, ConfigError};
pub use keys::{KEY_HEADER, Keyer, PathKey, SCOPE_HEADER, ScopedKey};
pub use middleware::BurstCache;
pub use recorded::{CACHED_MARKER_HEADER, CACHED_MARKER_VALUE, InstanceId, RecordedResponse};
pub use store::{CacheStore, EntryStatus};
