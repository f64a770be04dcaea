//! Request context types.
//!
//! The [`RequestContext`] is the mutable per-request bag that flows from
//! the server through the interceptor and into the downstream handler. It
//! owns the request's async-completion slot; the interceptor takes an
//! exclusive, request-scoped write lease on that slot when it rewires the
//! callback chain.

use crate::CompletionSlot;
use http::{HeaderMap, Method, Uri};
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which makes it ideal for request tracking
/// and log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID.
    ///
    /// Useful when the ID was propagated from an upstream service.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<RequestId> for Uuid {
    fn from(id: RequestId) -> Self {
        id.0
    }
}

/// Mutable per-request context.
///
/// Created by the server before the interceptor runs. Besides the request
/// line data it carries exactly one async-completion slot, pre-armed with
/// the server's upstream callback, and a type-keyed extension map that
/// aroundware hooks can use to stash per-request state between
/// pre-processing and the handler.
///
/// # Example
///
/// ```
/// use amphi_core::RequestContext;
/// use http::{HeaderMap, Method, Uri};
///
/// let ctx = RequestContext::new(Method::GET, Uri::from_static("/users/42"), HeaderMap::new());
/// assert_eq!(ctx.path(), "/users/42");
/// ```
pub struct RequestContext {
    request_id: RequestId,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    started_at: Instant,
    completion: CompletionSlot,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl RequestContext {
    /// Creates a new request context with a fresh request ID and an
    /// unarmed completion slot.
    #[must_use]
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            request_id: RequestId::new(),
            method,
            uri,
            headers,
            started_at: Instant::now(),
            completion: CompletionSlot::new(),
            extensions: HashMap::new(),
        }
    }

    /// Replaces the request ID.
    ///
    /// Useful when the ID was provided by a client or upstream service.
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    /// Arms the completion slot with the server's upstream callback.
    #[must_use]
    pub fn with_upstream(self, callback: impl FnOnce(crate::Reply) + Send + 'static) -> Self {
        self.completion.install(callback);
        self
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the path portion of the URI.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Returns the query string if present.
    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Returns the request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a specific header value as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns how long this request has been in flight.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Returns a handle to the async-completion slot.
    ///
    /// Clones of the handle share one interior, so a handler that keeps a
    /// clone across a suspension point delivers into whatever callback is
    /// installed at completion time.
    #[must_use]
    pub fn completion(&self) -> &CompletionSlot {
        &self.completion
    }

    /// Stores a typed extension value, replacing any previous value of the
    /// same type.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Returns a reference to the extension value of type `T`, if set.
    #[must_use]
    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref())
    }

    /// Removes and returns the extension value of type `T`, if set.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast().ok())
            .map(|boxed| *boxed)
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("completion", &self.completion)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Reply;

    fn make_ctx(path: &'static str) -> RequestContext {
        RequestContext::new(Method::GET, Uri::from_static(path), HeaderMap::new())
    }

    #[test]
    fn test_request_id_roundtrip() {
        let uuid = Uuid::now_v7();
        let id = RequestId::from_uuid(uuid);
        assert_eq!(Uuid::from(id), uuid);
        assert_eq!(id.to_string(), uuid.to_string());
    }

    #[test]
    fn test_context_accessors() {
        let ctx = make_ctx("/users/42?page=2");
        assert_eq!(ctx.method(), &Method::GET);
        assert_eq!(ctx.path(), "/users/42");
        assert_eq!(ctx.query_string(), Some("page=2"));
        assert!(ctx.header("x-missing").is_none());
    }

    #[test]
    fn test_with_upstream_arms_the_slot() {
        let (tx, rx) = std::sync::mpsc::channel();
        let ctx = make_ctx("/ping").with_upstream(move |reply: Reply| {
            tx.send(reply.status()).unwrap();
        });

        assert!(ctx.completion().is_armed());
        ctx.completion().complete(Reply::ok("pong"));
        assert_eq!(rx.recv().unwrap(), http::StatusCode::OK);
    }

    #[test]
    fn test_extensions() {
        #[derive(Debug, PartialEq)]
        struct Deadline(u64);

        let mut ctx = make_ctx("/work");
        assert!(ctx.extension::<Deadline>().is_none());

        ctx.set_extension(Deadline(30));
        assert_eq!(ctx.extension::<Deadline>(), Some(&Deadline(30)));

        assert_eq!(ctx.remove_extension::<Deadline>(), Some(Deadline(30)));
        assert!(ctx.extension::<Deadline>().is_none());
    }
}
