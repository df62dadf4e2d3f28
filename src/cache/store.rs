//! The cache store: one map from key to [`RecordedResponse`] behind one lock.
//!
//! Every operation takes the lock once and releases it before returning, so
//! each is atomic with respect to the others and no reference to an entry
//! ever leaves the store. Guarded transitions (`mark_stale`,
//! `mark_regenerating`, `kill`, `abandon`) check the expected [`InstanceId`]
//! inside the same critical section that applies the change.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::warn;

use crate::http::ResponseWriter;

use super::error::CacheError;
use super::lock::{rw_read, rw_write};
use super::recorded::{InstanceId, RecordedResponse};

const SOURCE: &str = "cache::store";

/// Snapshot of an entry's lifecycle flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryStatus {
    pub id: InstanceId,
    pub fresh: bool,
    pub regenerating: bool,
}

impl EntryStatus {
    /// Stale and nobody is regenerating it yet.
    pub fn needs_regeneration(&self) -> bool {
        !self.fresh && !self.regenerating
    }
}

#[derive(Debug, Default)]
pub struct CacheStore {
    entries: RwLock<HashMap<String, RecordedResponse>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry's flags, or `None` when nothing is cached for `key`.
    pub fn status(&self, key: &str) -> Option<EntryStatus> {
        rw_read(&self.entries, SOURCE, "status")
            .get(key)
            .map(|entry| EntryStatus {
                id: entry.id(),
                fresh: entry.is_fresh(),
                regenerating: entry.is_regenerating(),
            })
    }

    /// Stores `entry` under `key`, replacing whatever was there.
    pub fn swap(&self, key: &str, entry: RecordedResponse) {
        rw_write(&self.entries, SOURCE, "swap").insert(key.to_owned(), entry);
    }

    /// Marks the entry stale if it is still the fresh entry of instance `id`.
    ///
    /// Returns `true` if the entry changed.
    pub fn mark_stale(&self, key: &str, id: InstanceId) -> bool {
        let mut entries = rw_write(&self.entries, SOURCE, "mark_stale");
        match entries.get_mut(key) {
            Some(entry) if entry.id() == id && entry.is_fresh() => {
                entry.mark_stale();
                true
            }
            _ => false,
        }
    }

    /// Flags the entry as regenerating if it is instance `id`, stale, and not
    /// already regenerating.
    ///
    /// Of any number of concurrent callers for the same entry, exactly one
    /// gets `true`; that caller owns the regeneration.
    pub fn mark_regenerating(&self, key: &str, id: InstanceId) -> bool {
        let mut entries = rw_write(&self.entries, SOURCE, "mark_regenerating");
        match entries.get_mut(key) {
            Some(entry) if entry.id() == id && !entry.is_fresh() && !entry.is_regenerating() => {
                entry.mark_regenerating();
                true
            }
            _ => false,
        }
    }

    /// Removes the entry if it is instance `id`, stale, and not regenerating.
    ///
    /// Returns `true` if the entry was removed.
    pub fn kill(&self, key: &str, id: InstanceId) -> bool {
        let mut entries = rw_write(&self.entries, SOURCE, "kill");
        let dead = entries
            .get(key)
            .is_some_and(|entry| entry.id() == id && !entry.is_fresh() && !entry.is_regenerating());
        if dead {
            entries.remove(key);
        }
        dead
    }

    /// Removes the entry if it is instance `id` and still flagged as
    /// regenerating, i.e. the regeneration that claimed it never finished.
    ///
    /// Returns `true` if the entry was removed.
    pub fn abandon(&self, key: &str, id: InstanceId) -> bool {
        let mut entries = rw_write(&self.entries, SOURCE, "abandon");
        let stuck = entries
            .get(key)
            .is_some_and(|entry| entry.id() == id && entry.is_regenerating());
        if stuck {
            entries.remove(key);
        }
        stuck
    }

    /// Replays the entry for `key` onto `target`, with the cached marker when
    /// `mark` is set.
    ///
    /// # Errors
    ///
    /// [`CacheError::MissingEntry`] if nothing is stored under `key`; `target`
    /// is left untouched in that case.
    pub fn serve<W>(&self, key: &str, target: &mut W, mark: bool) -> Result<(), CacheError>
    where
        W: ResponseWriter + ?Sized,
    {
        let entries = rw_read(&self.entries, SOURCE, "serve");
        let Some(entry) = entries.get(key) else {
            warn!(cache = "burst", key, "serve requested for missing entry");
            return Err(CacheError::MissingEntry {
                key: key.to_owned(),
            });
        };
        entry.serve(target, mark);
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        rw_read(&self.entries, SOURCE, "contains").contains_key(key)
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::recorded::InstanceIds;
    use crate::http::{Response, StatusCode};

    fn entry(id: InstanceId, body: &str) -> RecordedResponse {
        RecordedResponse::record(id, Response::new(StatusCode::Ok).body(body.to_owned()))
    }

    #[test]
    fn status_of_missing_key_is_none() {
        let store = CacheStore::new();
        assert_eq!(store.status("/nope"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn swap_creates_fresh_entry() {
        let ids = InstanceIds::default();
        let store = CacheStore::new();
        let id = ids.next();
        store.swap("/a", entry(id, "one"));
        assert_eq!(
            store.status("/a"),
            Some(EntryStatus {
                id,
                fresh: true,
                regenerating: false
            })
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn swap_replaces_wholesale() {
        let ids = InstanceIds::default();
        let store = CacheStore::new();
        let first = ids.next();
        store.swap("/a", entry(first, "one"));
        assert!(store.mark_stale("/a", first));
        assert!(store.mark_regenerating("/a", first));

        let second = ids.next();
        store.swap("/a", entry(second, "two"));
        let status = store.status("/a").unwrap();
        assert_eq!(status.id, second);
        assert!(status.fresh);
        assert!(!status.regenerating);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn mark_stale_requires_matching_fresh_instance() {
        let ids = InstanceIds::default();
        let store = CacheStore::new();
        let old = ids.next();
        let current = ids.next();
        store.swap("/a", entry(current, "x"));

        assert!(!store.mark_stale("/a", old));
        assert!(store.status("/a").unwrap().fresh);

        assert!(store.mark_stale("/a", current));
        assert!(!store.mark_stale("/a", current));
        assert!(!store.mark_stale("/missing", current));
    }

    #[test]
    fn mark_regenerating_only_once_and_only_when_stale() {
        let ids = InstanceIds::default();
        let store = CacheStore::new();
        let id = ids.next();
        store.swap("/a", entry(id, "x"));

        assert!(!store.mark_regenerating("/a", id), "fresh entries are not regenerated");
        store.mark_stale("/a", id);
        assert!(store.mark_regenerating("/a", id));
        assert!(!store.mark_regenerating("/a", id));

        let status = store.status("/a").unwrap();
        assert!(status.regenerating);
        assert!(!status.fresh);
    }

    #[test]
    fn kill_requires_stale_idle_matching_instance() {
        let ids = InstanceIds::default();
        let store = CacheStore::new();
        let id = ids.next();
        store.swap("/a", entry(id, "x"));

        assert!(!store.kill("/a", id), "fresh entries survive");
        store.mark_stale("/a", id);
        assert!(!store.kill("/a", ids.next()), "other instances cannot kill");
        assert!(store.kill("/a", id));
        assert!(!store.contains("/a"));
        assert_eq!(store.status("/a"), None);
    }

    #[test]
    fn kill_spares_regenerating_entry() {
        let ids = InstanceIds::default();
        let store = CacheStore::new();
        let id = ids.next();
        store.swap("/a", entry(id, "x"));
        store.mark_stale("/a", id);
        store.mark_regenerating("/a", id);
        assert!(!store.kill("/a", id));
        assert!(store.contains("/a"));
    }

    #[test]
    fn abandon_removes_only_the_claimed_regenerating_entry() {
        let ids = InstanceIds::default();
        let store = CacheStore::new();
        let id = ids.next();
        store.swap("/a", entry(id, "x"));

        store.mark_stale("/a", id);
        assert!(!store.abandon("/a", id), "unclaimed stale entries stay");
        store.mark_regenerating("/a", id);
        assert!(!store.abandon("/a", ids.next()));
        assert!(store.abandon("/a", id));
        assert_eq!(store.status("/a"), None);
    }

    #[test]
    fn abandon_after_swap_is_a_no_op() {
        let ids = InstanceIds::default();
        let store = CacheStore::new();
        let old = ids.next();
        store.swap("/a", entry(old, "x"));
        store.mark_stale("/a", old);
        store.mark_regenerating("/a", old);
        let new = ids.next();
        store.swap("/a", entry(new, "y"));

        assert!(!store.abandon("/a", old));
        assert_eq!(store.status("/a").unwrap().id, new);
    }

    #[test]
    fn serve_replays_entry() {
        let ids = InstanceIds::default();
        let store = CacheStore::new();
        store.swap("/a", entry(ids.next(), "payload"));
        let mut live = Response::default();
        store.serve("/a", &mut live, true).unwrap();
        assert_eq!(live.text(), Some("payload"));
        assert_eq!(live.headers().get("x-from-burstcache"), Some("1"));
    }

    #[test]
    fn serve_missing_entry_is_an_error() {
        let store = CacheStore::new();
        let mut live = Response::new(StatusCode::Accepted);
        let err = store.serve("/gone", &mut live, true).unwrap_err();
        assert_eq!(
            err,
            CacheError::MissingEntry {
                key: "/gone".to_owned()
            }
        );
        assert_eq!(live.status(), StatusCode::Accepted);
        assert!(live.headers().is_empty());
    }
}
