//! Reply and dispatch types.
//!
//! A [`Reply`] is the finished form of a response: an immutable
//! (status, headers, body) triple. A [`Dispatch`] is what a downstream
//! handler returns — either a final reply or the pending sentinel meaning
//! "the reply will arrive later through the async-completion slot".

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;

/// An immutable, finished HTTP response: status, headers, body.
///
/// Replies are cheap to clone (the body is reference-counted), which is what
/// lets completion observers each receive the resolved value.
///
/// # Example
///
/// ```
/// use amphi_core::Reply;
/// use http::StatusCode;
///
/// let reply = Reply::text(StatusCode::OK, "hello");
/// assert_eq!(reply.status(), StatusCode::OK);
/// assert_eq!(&reply.body()[..], b"hello");
/// ```
#[derive(Debug, Clone)]
pub struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Reply {
    /// Creates a reply from its three parts.
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Creates a `200 OK` reply with the given body and no headers.
    #[must_use]
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, HeaderMap::new(), body)
    }

    /// Creates an empty reply with the given status.
    #[must_use]
    pub fn with_status(status: StatusCode) -> Self {
        Self::new(status, HeaderMap::new(), Bytes::new())
    }

    /// Creates a plain-text reply.
    #[must_use]
    pub fn text(status: StatusCode, message: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        Self::new(status, headers, message.to_string())
    }

    /// Creates a JSON reply from a `serde_json` value.
    #[must_use]
    pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self::new(status, headers, value.to_string())
    }

    /// Returns a copy of this reply with an additional header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decomposes the reply into its three parts.
    #[must_use]
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Bytes) {
        (self.status, self.headers, self.body)
    }

    /// Converts the reply into a server-facing `http` response.
    #[must_use]
    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut response = http::Response::new(Full::new(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// The result of invoking a downstream handler.
///
/// A handler either finished synchronously, yielding [`Dispatch::Final`],
/// or it is still pending and will deliver its reply later through the
/// request's async-completion slot. Anything receiving a `Dispatch` must
/// match on it before treating the value as final.
#[derive(Debug)]
pub enum Dispatch {
    /// The handler completed on the current call stack with this reply.
    Final(Reply),
    /// The pending sentinel: the reply arrives later via the
    /// async-completion slot.
    Pending,
}

impl Dispatch {
    /// Returns `true` if this dispatch carries a final reply.
    #[must_use]
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Final(_))
    }

    /// Returns `true` if this is the pending sentinel.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl From<Reply> for Dispatch {
    fn from(reply: Reply) -> Self {
        Self::Final(reply)
    }
}
