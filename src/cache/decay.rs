//! Two-phase decay of a regenerated entry.
//!
//! Each regeneration spawns one detached task keyed by `(key, id)`. After the
//! TTL it marks the entry stale, and after a further TTD it removes it. Both
//! steps are no-ops once a newer regeneration has replaced the entry, because
//! the store only applies them to the instance that scheduled them. Tasks are
//! never cancelled.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

use super::recorded::InstanceId;
use super::store::CacheStore;

/// Timing of one entry's decay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecaySchedule {
    pub ttl: Duration,
    pub ttd: Duration,
}

impl DecaySchedule {
    /// Spawns the decay task for instance `id` of `key`.
    ///
    /// Dropping the returned handle detaches the task; it still runs to
    /// completion.
    pub fn spawn(self, store: Arc<CacheStore>, key: String, id: InstanceId) -> JoinHandle<()> {
        tokio::spawn(async move {
            sleep(self.ttl).await;
            if store.mark_stale(&key, id) {
                debug!(cache = "burst", key = %key, %id, "entry went stale");
            } else {
                debug!(cache = "burst", key = %key, %id, "stale timer superseded");
            }

            sleep(self.ttd).await;
            if store.kill(&key, id) {
                debug!(cache = "burst", key = %key, %id, "entry died");
            } else {
                debug!(cache = "burst", key = %key, %id, "death timer superseded");
            }
        })
    }
}
