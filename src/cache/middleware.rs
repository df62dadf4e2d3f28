//! The burst cache middleware.
//!
//! Per request:
//!
//! 1. derive the key;
//! 2. no entry: run the downstream chain, store its output, and serve it
//!    **unmarked**;
//! 3. fresh entry, or stale entry already being regenerated: serve it marked;
//! 4. stale entry nobody is regenerating: claim the regeneration, serve the
//!    stale copy marked, and regenerate on a background task.
//!
//! Every regeneration schedules its own [`DecaySchedule`]. Regenerations of
//! the same key are not ordered: a slow one finishing after a faster, later
//! one overwrites the newer output.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{Instrument, debug, debug_span, warn};

use crate::context::Context;
use crate::http::{Headers, Response};
use crate::middleware::{BoxResponse, Middleware, Next};

use super::config::BurstConfig;
use super::decay::DecaySchedule;
use super::keys::{Keyer, PathKey};
use super::recorded::{InstanceId, InstanceIds, RecordedResponse};
use super::store::CacheStore;

/// Stale-while-regenerate response cache for bursts of duplicate requests.
///
/// Cloning is cheap; clones share the same store.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use burstcache::{BurstCache, BurstConfig, Context, Method, Request, Response, StatusCode};
/// use burstcache::cache::ScopedKey;
/// use burstcache::middleware::{Next, endpoint, from_middleware};
///
/// # async fn run() {
/// let cache = BurstCache::with_keyer(
///     BurstConfig::new(Duration::from_millis(250), Duration::from_millis(750)),
///     ScopedKey::new(),
/// );
/// let chain = vec![
///     from_middleware(Arc::new(cache)),
///     endpoint(|_ctx| async { Response::new(StatusCode::Ok).body("expensive") }),
/// ];
///
/// let request = Request::new(Method::Get, "/report");
/// let response = Next::new(chain).run(Context::new(request)).await;
/// assert_eq!(response.text(), Some("expensive"));
/// # }
/// ```
#[derive(Clone)]
pub struct BurstCache {
    inner: Arc<Inner>,
}

struct Inner {
    config: BurstConfig,
    keyer: Box<dyn Keyer>,
    store: Arc<CacheStore>,
    ids: InstanceIds,
}

impl BurstCache {
    /// Creates a cache keyed by request path.
    pub fn new(config: BurstConfig) -> Self {
        Self::with_keyer(config, PathKey)
    }

    /// Creates a cache using `keyer` to derive keys.
    pub fn with_keyer<K>(config: BurstConfig, keyer: K) -> Self
    where
        K: Keyer + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                config,
                keyer: Box::new(keyer),
                store: Arc::new(CacheStore::new()),
                ids: InstanceIds::default(),
            }),
        }
    }

    pub fn config(&self) -> &BurstConfig {
        &self.inner.config
    }

    /// The underlying store, for inspection.
    pub fn store(&self) -> &CacheStore {
        &self.inner.store
    }
}

impl Middleware for BurstCache {
    fn handle(&self, ctx: Context, next: Next) -> BoxResponse {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { inner.respond(ctx, next).await })
    }
}

/// Held by a background regeneration for the stale instance it claimed.
///
/// If the task ends without swapping in a new entry (the downstream chain
/// panicked), dropping the claim removes the stale entry so the key is
/// filled afresh instead of serving the old copy forever. After a successful
/// swap the stored id differs and the drop is a no-op.
struct Claim {
    store: Arc<CacheStore>,
    key: String,
    id: InstanceId,
}

impl Drop for Claim {
    fn drop(&mut self) {
        if self.store.abandon(&self.key, self.id) {
            warn!(cache = "burst", key = %self.key, id = %self.id, "regeneration abandoned, dropped stale entry");
        }
    }
}

impl Inner {
    async fn respond(self: Arc<Self>, ctx: Context, next: Next) -> Response {
        if !self.config.enabled {
            return next.run(ctx).await;
        }

        let mut outgoing = Headers::new();
        let key = self.keyer.key(&mut outgoing, ctx.request());
        let mut response = Response::default();
        response.headers_mut().extend_from(&outgoing);

        let Some(status) = self.store.status(&key) else {
            debug!(cache = "burst", outcome = "miss", key = %key, "filling entry");
            return self.fill(key, ctx, next, response).await;
        };

        let mark = self.config.mark_cached;
        if status.needs_regeneration() && self.store.mark_regenerating(&key, status.id) {
            return match self.store.serve(&key, &mut response, mark) {
                Ok(()) => {
                    debug!(cache = "burst", outcome = "stale", key = %key, id = %status.id, "serving stale entry, regenerating");
                    self.spawn_regeneration(key, status.id, ctx, next);
                    response
                }
                Err(err) => {
                    warn!(cache = "burst", key = %key, error = %err, "claimed entry vanished, filling");
                    self.fill(key, ctx, next, response).await
                }
            };
        }

        match self.store.serve(&key, &mut response, mark) {
            Ok(()) => {
                debug!(cache = "burst", outcome = "hit", key = %key, fresh = status.fresh, "serving cached entry");
                response
            }
            Err(err) => {
                warn!(cache = "burst", key = %key, error = %err, "entry died before serve, filling");
                self.fill(key, ctx, next, response).await
            }
        }
    }

    /// Regenerates in the foreground and serves the result without the marker.
    async fn fill(&self, key: String, ctx: Context, next: Next, mut response: Response) -> Response {
        let captured = self.regenerate(&key, ctx, next).await;
        if let Err(err) = self.store.serve(&key, &mut response, false) {
            warn!(cache = "burst", key = %key, error = %err, "entry decayed before first serve, replaying capture");
            captured.serve(&mut response, false);
        }
        response
    }

    /// Regenerates on a detached task. `claimed` is the stale instance this
    /// request flagged as regenerating.
    fn spawn_regeneration(self: Arc<Self>, key: String, claimed: InstanceId, ctx: Context, next: Next) {
        let span = debug_span!("burst_regenerate", key = %key);
        let claim = Claim {
            store: Arc::clone(&self.store),
            key: key.clone(),
            id: claimed,
        };
        tokio::spawn(
            async move {
                let _claim = claim;
                self.regenerate(&key, ctx, next).await;
            }
            .instrument(span),
        );
    }

    /// Runs the downstream chain, swaps its output in, and schedules decay.
    async fn regenerate(&self, key: &str, ctx: Context, next: Next) -> RecordedResponse {
        let id = self.ids.next();
        let started = Instant::now();

        let captured = RecordedResponse::record(id, next.run(ctx).await);
        self.store.swap(key, captured.clone());

        debug!(
            cache = "burst",
            key,
            %id,
            status = captured.status().map(u16::from),
            elapsed = ?started.elapsed(),
            "entry regenerated"
        );

        DecaySchedule {
            ttl: self.config.ttl(),
            ttd: self.config.ttd(),
        }
        .spawn(Arc::clone(&self.store), key.to_owned(), id);

        captured
    }
}
