//! Cache key derivation.
//!
//! A [`Keyer`] reduces a request to the string the cache stores its entry
//! under. It also receives the outgoing response headers, so it can echo the
//! key (or anything else) back to the client.

use crate::http::{Headers, Request};

/// Default request header read by [`ScopedKey`].
pub const SCOPE_HEADER: &str = "X-Scope-Id";

/// Response header [`ScopedKey`] writes the derived key to when echoing.
pub const KEY_HEADER: &str = "X-Burstcache-Key";

/// Derives cache keys from requests.
///
/// Implementations must be stable: the same logical resource maps to the same
/// key for the lifetime of the process.
///
/// Closures with the matching signature implement `Keyer` directly:
///
/// ```
/// use burstcache::cache::Keyer;
/// use burstcache::http::{Headers, Method, Request};
///
/// let by_method = |_: &mut Headers, req: &Request| format!("{} {}", req.method(), req.path());
/// let key = by_method.key(&mut Headers::new(), &Request::new(Method::Get, "/a?b=c"));
/// assert_eq!(key, "GET /a");
/// ```
pub trait Keyer: Send + Sync {
    fn key(&self, headers: &mut Headers, request: &Request) -> String;
}

impl<F> Keyer for F
where
    F: Fn(&mut Headers, &Request) -> String + Send + Sync,
{
    fn key(&self, headers: &mut Headers, request: &Request) -> String {
        self(headers, request)
    }
}

/// Keys on the request path alone; the query string is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathKey;

impl Keyer for PathKey {
    fn key(&self, _headers: &mut Headers, request: &Request) -> String {
        request.path().to_owned()
    }
}

/// Keys on the path prefixed with a scope (tenant) id taken from a request
/// header, so tenants never share entries.
///
/// Requests without the header, or with an empty one, fall back to the bare
/// path.
#[derive(Debug, Clone)]
pub struct ScopedKey {
    header: String,
    echo: bool,
}

impl Default for ScopedKey {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopedKey {
    /// Reads the scope from [`SCOPE_HEADER`].
    pub fn new() -> Self {
        Self {
            header: SCOPE_HEADER.to_owned(),
            echo: false,
        }
    }

    /// Reads the scope from `header` instead.
    #[must_use]
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    /// Writes the derived key to the [`KEY_HEADER`] response header.
    #[must_use]
    pub fn echo_key(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }
}

impl Keyer for ScopedKey {
    fn key(&self, headers: &mut Headers, request: &Request) -> String {
        let key = match request.headers().get(&self.header) {
            Some(scope) if !scope.is_empty() => format!("{scope}:{}", request.path()),
            _ => request.path().to_owned(),
        };
        if self.echo {
            headers.set(KEY_HEADER, key.as_str());
        }
        key
    }
}
