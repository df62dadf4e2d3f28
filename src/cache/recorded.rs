//! Recorded responses — the value stored under each cache key.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::BytesMut;

use crate::http::{Headers, Response, ResponseWriter, StatusCode};

/// Header set on every response served out of the cache.
pub const CACHED_MARKER_HEADER: &str = "X-From-BurstCache";

/// Value of [`CACHED_MARKER_HEADER`].
pub const CACHED_MARKER_VALUE: &str = "1";

/// Identifies one regeneration of a key.
///
/// Decay timers carry the id of the regeneration that scheduled them and only
/// act on an entry that still carries the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic source of [`InstanceId`]s, shared by every key of one cache.
#[derive(Debug, Default)]
pub(crate) struct InstanceIds {
    last: AtomicU64,
}

impl InstanceIds {
    pub(crate) fn next(&self) -> InstanceId {
        InstanceId(self.last.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// A captured response plus its lifecycle flags.
///
/// While a regeneration runs it is a [`ResponseWriter`] sink:
///
/// - the first status write wins, later ones are ignored;
/// - body bytes written before any status record an implicit `200 OK`;
/// - [`flush`](ResponseWriter::flush) marks the recording done but keeps
///   accepting writes.
///
/// Once stored it is a source: [`serve`](Self::serve) replays the capture onto
/// any other writer.
///
/// # Examples
///
/// ```
/// use burstcache::cache::RecordedResponse;
/// use burstcache::http::{Response, StatusCode};
///
/// let captured = RecordedResponse::from_response(
///     Response::new(StatusCode::Created).header("X-A", "1").body("made"),
/// );
///
/// let mut live = Response::default();
/// captured.serve(&mut live, true);
///
/// assert_eq!(live.status(), StatusCode::Created);
/// assert_eq!(live.headers().get("x-from-burstcache"), Some("1"));
/// assert_eq!(live.text(), Some("made"));
/// ```
#[derive(Debug, Clone)]
pub struct RecordedResponse {
    id: InstanceId,
    status: Option<StatusCode>,
    headers: Headers,
    body: BytesMut,
    done: bool,
    fresh: bool,
    regenerating: bool,
}

impl RecordedResponse {
    /// Creates an empty, fresh recording for regeneration `id`.
    pub fn new(id: InstanceId) -> Self {
        Self {
            id,
            status: None,
            headers: Headers::new(),
            body: BytesMut::new(),
            done: false,
            fresh: true,
            regenerating: false,
        }
    }

    /// Records a complete downstream response for regeneration `id`.
    pub fn record(id: InstanceId, response: Response) -> Self {
        let mut recording = Self::new(id);
        recording.headers.extend_from(response.headers());
        recording.write_status(response.status());
        recording.write(response.content());
        recording.flush();
        recording
    }

    /// Records a response outside of any cache, under the id `0`.
    pub fn from_response(response: Response) -> Self {
        Self::record(InstanceId(0), response)
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// The recorded status, `None` until the first write.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Whether [`flush`](ResponseWriter::flush) has been called.
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    pub fn is_regenerating(&self) -> bool {
        self.regenerating
    }

    pub(crate) fn mark_stale(&mut self) {
        self.fresh = false;
    }

    // Only stale entries get regenerated.
    pub(crate) fn mark_regenerating(&mut self) {
        self.fresh = false;
        self.regenerating = true;
    }

    /// Replays status, headers and body onto `target`.
    ///
    /// Every captured header value is appended in its recorded order. When
    /// `mark` is set, `target` ends up with exactly one [`CACHED_MARKER_HEADER`].
    /// A recording that never saw a status write replays as `200 OK`.
    pub fn serve<W>(&self, target: &mut W, mark: bool)
    where
        W: ResponseWriter + ?Sized,
    {
        let headers = target.headers_mut();
        headers.extend_from(&self.headers);
        if mark {
            headers.set(CACHED_MARKER_HEADER, CACHED_MARKER_VALUE);
        }
        target.write_status(self.status.unwrap_or(StatusCode::Ok));
        target.write(&self.body);
    }
}

impl ResponseWriter for RecordedResponse {
    fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    fn write_status(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        if self.status.is_none() {
            self.write_status(StatusCode::Ok);
        }
        self.body.extend_from_slice(buf);
        buf.len()
    }

    fn flush(&mut self) {
        if self.status.is_none() {
            self.write_status(StatusCode::Ok);
        }
        self.done = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> RecordedResponse {
        RecordedResponse::new(InstanceIds::default().next())
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let ids = InstanceIds::default();
        let a = ids.next();
        let b = ids.next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn new_recording_is_fresh_and_unset() {
        let r = recording();
        assert!(r.is_fresh());
        assert!(!r.is_regenerating());
        assert!(!r.is_done());
        assert_eq!(r.status(), None);
    }

    #[test]
    fn first_status_write_wins() {
        let mut r = recording();
        r.write_status(StatusCode::NotFound);
        r.write_status(StatusCode::Ok);
        assert_eq!(r.status(), Some(StatusCode::NotFound));
    }

    #[test]
    fn body_write_implies_200() {
        let mut r = recording();
        r.write(b"hi");
        r.write_status(StatusCode::InternalServerError);
        assert_eq!(r.status(), Some(StatusCode::Ok));
    }

    #[test]
    fn body_bytes_append_in_order() {
        let mut r = recording();
        assert_eq!(r.write(b"ab"), 2);
        r.write(b"cd");
        assert_eq!(r.body(), b"abcd");
    }

    #[test]
    fn flush_marks_done_and_keeps_accepting_writes() {
        let mut r = recording();
        r.flush();
        assert!(r.is_done());
        assert_eq!(r.status(), Some(StatusCode::Ok));
        r.write(b"late");
        assert_eq!(r.body(), b"late");
    }

    #[test]
    fn record_captures_response() {
        let response = Response::new(StatusCode::Gone)
            .header("Set-Cookie", "a=1")
            .header("Set-Cookie", "b=2")
            .body("bye");
        let r = RecordedResponse::record(InstanceId(9), response);
        assert_eq!(r.id().get(), 9);
        assert_eq!(r.status(), Some(StatusCode::Gone));
        assert_eq!(r.headers().get_all("set-cookie").count(), 2);
        assert_eq!(r.body(), b"bye");
        assert!(r.is_done());
    }

    #[test]
    fn serve_replays_every_header_value() {
        let r = RecordedResponse::from_response(
            Response::new(StatusCode::Ok)
                .header("Set-Cookie", "a=1")
                .header("Set-Cookie", "b=2"),
        );
        let mut live = Response::default();
        r.serve(&mut live, false);
        let cookies: Vec<_> = live.headers().get_all("set-cookie").collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
        assert!(!live.headers().contains(CACHED_MARKER_HEADER));
    }

    #[test]
    fn marker_is_set_exactly_once() {
        let r = RecordedResponse::from_response(
            Response::new(StatusCode::Ok)
                .header(CACHED_MARKER_HEADER, "1")
                .header("x-from-burstcache", "1")
                .header("X-Other", "o"),
        );
        let mut live = Response::default();
        live.add_header(CACHED_MARKER_HEADER, "1");
        r.serve(&mut live, true);
        assert_eq!(live.headers().get_all(CACHED_MARKER_HEADER).count(), 1);
        assert_eq!(live.headers().get(CACHED_MARKER_HEADER), Some(CACHED_MARKER_VALUE));
    }

    #[test]
    fn unset_status_replays_as_200() {
        let r = recording();
        let mut live = Response::new(StatusCode::BadGateway);
        r.serve(&mut live, false);
        assert_eq!(live.status(), StatusCode::Ok);
    }

    #[test]
    fn regenerating_implies_stale() {
        let mut r = recording();
        r.mark_regenerating();
        assert!(r.is_regenerating());
        assert!(!r.is_fresh());
    }
}
