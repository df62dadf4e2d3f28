//! The response sink surface shared by live responses and cache recordings.

use super::{Headers, Response, StatusCode};

/// A sink accepting header mutations, a status code, and body bytes.
///
/// The cache records downstream output into one implementation
/// ([`RecordedResponse`](crate::cache::RecordedResponse)) and replays it onto
/// another (usually a live [`Response`]).
pub trait ResponseWriter {
    /// Mutable access to the outgoing headers.
    fn headers_mut(&mut self) -> &mut Headers;

    /// Writes the status code.
    fn write_status(&mut self, status: StatusCode);

    /// Appends body bytes, returning how many were accepted.
    fn write(&mut self, buf: &[u8]) -> usize;

    /// Signals that the response is complete. Further writes are still accepted.
    fn flush(&mut self) {}
}

impl ResponseWriter for Response {
    fn headers_mut(&mut self) -> &mut Headers {
        Response::headers_mut(self)
    }

    fn write_status(&mut self, status: StatusCode) {
        self.set_status(status);
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        self.append_body(buf);
        buf.len()
    }
}
