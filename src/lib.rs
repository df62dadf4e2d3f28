//! # burstcache
//!
//! Stale-while-regenerate response caching middleware, tuned for sub-second
//! windows: enough to absorb a burst of identical requests without ever
//! serving data older than `ttl + ttd`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use burstcache::{BurstCache, BurstConfig, Context, Method, Request, Response, StatusCode};
//! use burstcache::middleware::{Next, endpoint, from_middleware};
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache = BurstCache::new(BurstConfig::default());
//!     let chain = vec![
//!         from_middleware(Arc::new(cache)),
//!         endpoint(|_ctx| async { Response::new(StatusCode::Ok).body("Hello, World!") }),
//!     ];
//!
//!     let request = Request::new(Method::Get, "/hello");
//!     let response = Next::new(chain.clone()).run(Context::new(request)).await;
//!     assert!(!response.headers().contains("X-From-BurstCache"));
//!
//!     let request = Request::new(Method::Get, "/hello");
//!     let response = Next::new(chain).run(Context::new(request)).await;
//!     assert_eq!(response.headers().get("X-From-BurstCache"), Some("1"));
//! }
//! ```

pub mod cache;
pub mod context;
pub mod http;
pub mod middleware;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{BurstCache, BurstConfig};
pub use context::Context;
pub use http::{Headers, Method, Request, Response, StatusCode};
