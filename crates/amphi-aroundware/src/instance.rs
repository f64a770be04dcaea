//! Per-request aroundware instance.
//!
//! An [`AroundwareInstance`] pairs one [`Aroundware`] hook object with one
//! [`CompletionCell`] for exactly one request. It is created fresh at
//! request entry, resolved at most once, and dropped once post-processing
//! and the upstream delivery have both fired. Instances are never reused
//! across requests.

use crate::aroundware::Aroundware;
use crate::cell::CompletionCell;
use amphi_core::{ErrorSignal, Reply, RequestContext};

/// One request's pairing of hooks and completion state.
///
/// Downstream replies resolve the cell as *success* outcomes, even when
/// they carry an error status code; the failure side of the cell is
/// reserved for synthesized error replies produced when a hook's
/// [`ErrorSignal`] is caught on a callback-chain edge.
pub struct AroundwareInstance {
    hooks: Box<dyn Aroundware>,
    cell: CompletionCell<Reply, Reply>,
}

impl AroundwareInstance {
    /// Creates an instance around the given hook object.
    #[must_use]
    pub fn new(hooks: Box<dyn Aroundware>) -> Self {
        Self {
            hooks,
            cell: CompletionCell::new(),
        }
    }

    /// Runs the pre-process hook.
    pub fn pre_process(&self, ctx: &mut RequestContext) -> Result<(), ErrorSignal> {
        self.hooks.pre_process(ctx)
    }

    /// Runs the post-process hook on the resolved reply.
    pub fn post_process(&self, reply: Reply) -> Result<Reply, ErrorSignal> {
        self.hooks.post_process(reply)
    }

    /// The resolution trigger: accepts the downstream reply and resolves
    /// the cell as a success.
    ///
    /// Called exactly once per request — either directly by the
    /// interceptor when the handler finished synchronously, or through the
    /// rewired async-completion slot when it finished later. A second call
    /// is an idempotent no-op.
    pub fn accept(&self, reply: Reply) {
        tracing::trace!(status = %reply.status(), "downstream reply accepted");
        self.cell.succeed(reply);
    }

    /// Resolves the cell as a failure with a synthesized error reply.
    ///
    /// Used when a hook failed before any downstream reply existed; the
    /// failure observers deliver the error reply upstream unmodified.
    pub fn reject(&self, error_reply: Reply) {
        tracing::trace!(status = %error_reply.status(), "request rejected before downstream reply");
        self.cell.fail(error_reply);
    }

    /// Registers a success observer on the completion cell.
    pub fn on_success(&self, observer: impl FnOnce(Reply) + Send + 'static) {
        self.cell.on_success(observer);
    }

    /// Registers a failure observer on the completion cell.
    pub fn on_failure(&self, observer: impl FnOnce(Reply) + Send + 'static) {
        self.cell.on_failure(observer);
    }

    /// Returns `true` once the instance has been resolved, either way.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.cell.is_resolved()
    }
}

impl std::fmt::Debug for AroundwareInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AroundwareInstance")
            .field("cell", &self.cell)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aroundware::{FnAroundware, Passthrough};
    use http::StatusCode;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_accept_resolves_success_observers() {
        let instance = AroundwareInstance::new(Box::new(Passthrough));
        let seen = Arc::new(Mutex::new(None));

        let seen_clone = seen.clone();
        instance.on_success(move |reply| {
            *seen_clone.lock() = Some(reply.status());
        });

        assert!(!instance.is_resolved());
        instance.accept(Reply::with_status(StatusCode::OK));
        assert!(instance.is_resolved());
        assert_eq!(*seen.lock(), Some(StatusCode::OK));
    }

    #[test]
    fn test_reject_resolves_failure_observers() {
        let instance = AroundwareInstance::new(Box::new(Passthrough));
        let seen = Arc::new(Mutex::new(None));

        let seen_clone = seen.clone();
        instance.on_failure(move |reply| {
            *seen_clone.lock() = Some(reply.status());
        });

        instance.reject(Reply::with_status(StatusCode::UNAUTHORIZED));
        assert_eq!(*seen.lock(), Some(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_second_accept_is_ignored() {
        let instance = AroundwareInstance::new(Box::new(Passthrough));
        let count = Arc::new(Mutex::new(0));

        let count_clone = count.clone();
        instance.on_success(move |_reply| {
            *count_clone.lock() += 1;
        });

        instance.accept(Reply::ok("first"));
        instance.accept(Reply::ok("second"));
        instance.reject(Reply::with_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_hooks_are_reachable_through_the_instance() {
        let instance = AroundwareInstance::new(Box::new(FnAroundware::new(
            |_ctx: &mut RequestContext| Ok(()),
            |reply: Reply| Ok(Reply::text(reply.status(), "post-processed")),
        )));

        let reply = instance
            .post_process(Reply::ok("raw"))
            .expect("post-process ok");
        assert_eq!(&reply.body()[..], b"post-processed");
    }
}
