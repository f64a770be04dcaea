//! The async-completion slot.
//!
//! Every request context carries exactly one [`CompletionSlot`]: the
//! rewritable callback through which the final [`Reply`] is eventually
//! delivered. The server arms the slot with its upstream callback before
//! handing the request to the interceptor; the interceptor then swaps in a
//! callback of its own ([`CompletionSlot::install`]) so the downstream
//! handler's completion is routed through the aroundware first.
//!
//! The slot handle is cheaply cloneable and all clones share one interior.
//! That sharing is load-bearing: a downstream handler that captured the
//! handle before the rewire still delivers into the *current* callback, not
//! a stale copy.

use crate::Reply;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// The callback a completion slot holds.
///
/// Invoked at most once, with the final reply.
pub type UpstreamCallback = Box<dyn FnOnce(Reply) + Send + 'static>;

/// A single rewritable callback slot, shared between all clones.
///
/// # Example
///
/// ```
/// use amphi_core::{CompletionSlot, Reply};
/// use std::sync::mpsc;
///
/// let (tx, rx) = mpsc::channel();
/// let slot = CompletionSlot::new();
/// slot.install(move |reply: Reply| {
///     tx.send(reply.status()).unwrap();
/// });
///
/// slot.complete(Reply::ok("done"));
/// assert_eq!(rx.recv().unwrap(), http::StatusCode::OK);
/// ```
#[derive(Clone, Default)]
pub struct CompletionSlot {
    inner: Arc<Mutex<Option<UpstreamCallback>>>,
}

impl CompletionSlot {
    /// Creates an empty (unarmed) slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a slot already armed with a callback.
    #[must_use]
    pub fn armed(callback: impl FnOnce(Reply) + Send + 'static) -> Self {
        let slot = Self::new();
        slot.install(callback);
        slot
    }

    /// Swaps in a new callback, returning the one previously installed.
    ///
    /// This is the rewiring primitive: the interceptor saves the returned
    /// callback (the server's upstream callback) and delivers the final
    /// reply through it once post-processing is done. While the rewire is
    /// in effect no other component may read the slot.
    pub fn install(
        &self,
        callback: impl FnOnce(Reply) + Send + 'static,
    ) -> Option<UpstreamCallback> {
        let previous = self.inner.lock().replace(Box::new(callback));
        tracing::debug!(rewired = previous.is_some(), "completion slot installed");
        previous
    }

    /// Takes the current callback and invokes it with the final reply.
    ///
    /// Completing a slot whose callback was already consumed (or never
    /// installed) drops the reply with a warning; the slot never fires
    /// twice.
    pub fn complete(&self, reply: Reply) {
        let callback = self.inner.lock().take();
        match callback {
            Some(callback) => callback(reply),
            None => {
                tracing::warn!(
                    status = %reply.status(),
                    "async-completion slot has no callback; dropping reply"
                );
            }
        }
    }

    /// Returns `true` if a callback is currently installed.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.inner.lock().is_some()
    }
}

impl fmt::Debug for CompletionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSlot")
            .field("armed", &self.is_armed())
            .finish()
    }
}
