//! The interceptor: callback-chain rewiring and completion coordination.
//!
//! For every request the interceptor:
//!
//! ```text
//! process(ctx) ── builds AroundwareInstance
//!     │
//!     ├─ pre_process()            (safe invocation)
//!     ├─ rewires ctx's async-completion slot → instance.accept
//!     ├─ registers success/failure observers → post_process + deliver
//!     ├─ invokes the downstream handler
//!     │     ├─ Final(reply)  → instance.accept(reply) directly
//!     │     └─ Pending       → reply arrives later through the rewired slot
//!     └─ returns Pending, always
//! ```
//!
//! The guarantees, per request: the upstream callback fires exactly once
//! with the final reply; post-process runs exactly once, strictly after
//! pre-process and after resolution; an error signal raised in any hook
//! becomes a normal error reply instead of corrupting the chain.

use crate::aroundware::{Aroundware, Passthrough};
use crate::instance::AroundwareInstance;
use amphi_core::{guard, Dispatch, Reply, RequestContext, RequestId, UpstreamCallback};
use parking_lot::Mutex;
use std::sync::Arc;

/// A downstream request handler.
///
/// Returns [`Dispatch::Final`] when it completed on the current call
/// stack, or [`Dispatch::Pending`] when the reply will arrive later — in
/// which case the handler must eventually complete the context's *current*
/// async-completion slot (read via [`RequestContext::completion`] at call
/// time, so it picks up the rewired callback) exactly once.
pub trait Handler: Send + Sync + 'static {
    /// Processes the request.
    fn call(&self, ctx: &mut RequestContext) -> Dispatch;
}

/// A handler built from a closure.
pub struct FnHandler<F> {
    func: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&mut RequestContext) -> Dispatch + Send + Sync + 'static,
{
    /// Creates a handler from a closure.
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&mut RequestContext) -> Dispatch + Send + Sync + 'static,
{
    fn call(&self, ctx: &mut RequestContext) -> Dispatch {
        (self.func)(ctx)
    }
}

/// Builds a fresh aroundware hook object for every request.
///
/// Implemented for any `Fn() -> Box<dyn Aroundware>` closure; fixed
/// per-interceptor arguments are simply captured by the closure.
pub trait AroundwareFactory: Send + Sync + 'static {
    /// Builds the hook object for one request.
    fn build(&self) -> Box<dyn Aroundware>;
}

impl<F> AroundwareFactory for F
where
    F: Fn() -> Box<dyn Aroundware> + Send + Sync + 'static,
{
    fn build(&self) -> Box<dyn Aroundware> {
        self()
    }
}

/// What to do when pre-processing raises an [`ErrorSignal`].
///
/// [`ErrorSignal`]: amphi_core::ErrorSignal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreFailurePolicy {
    /// Deliver the error reply upstream and never invoke the downstream
    /// handler. The default.
    #[default]
    ShortCircuit,
    /// Log the signal and invoke the downstream handler anyway; the
    /// signal is advisory only.
    ContinueDownstream,
}

/// Splices an aroundware between the server's upstream callback and the
/// downstream handler's completion.
///
/// # Example
///
/// ```
/// use amphi_aroundware::{Aroundware, FnHandler, Interceptor};
/// use amphi_core::{Dispatch, Reply};
///
/// struct Audit;
/// impl Aroundware for Audit {}
///
/// let interceptor = Interceptor::builder()
///     .handler(FnHandler::new(|_ctx| Dispatch::Final(Reply::ok("ok"))))
///     .factory(|| Box::new(Audit) as Box<dyn Aroundware>)
///     .build();
/// ```
pub struct Interceptor {
    handler: Arc<dyn Handler>,
    factory: Arc<dyn AroundwareFactory>,
    pre_failure: PreFailurePolicy,
}

/// Holds the saved upstream callback for exactly-once delivery.
///
/// The success and failure observers share one link; whichever fires takes
/// the callback, so the upstream side can never be invoked twice.
struct UpstreamLink {
    request_id: RequestId,
    callback: Mutex<Option<UpstreamCallback>>,
}

impl UpstreamLink {
    fn deliver(&self, reply: Reply) {
        match self.callback.lock().take() {
            Some(callback) => {
                tracing::trace!(
                    request_id = %self.request_id,
                    status = %reply.status(),
                    "delivering final reply upstream"
                );
                callback(reply);
            }
            None => {
                tracing::warn!(
                    request_id = %self.request_id,
                    "no upstream callback available; dropping final reply"
                );
            }
        }
    }
}

impl Interceptor {
    /// Creates an interceptor with the default pre-failure policy.
    #[must_use]
    pub fn new(handler: impl Handler, factory: impl AroundwareFactory) -> Self {
        Self {
            handler: Arc::new(handler),
            factory: Arc::new(factory),
            pre_failure: PreFailurePolicy::default(),
        }
    }

    /// Creates a builder.
    #[must_use]
    pub fn builder() -> InterceptorBuilder {
        InterceptorBuilder::new()
    }

    /// Runs one request through the interception protocol.
    ///
    /// Always returns [`Dispatch::Pending`]: the caller-visible result of
    /// this method is never synchronously final. The true reply is
    /// delivered exactly once through the upstream callback that was
    /// installed in the context's async-completion slot — possibly before
    /// `process` returns (synchronous downstream completion), possibly
    /// much later (asynchronous completion through the rewired slot).
    pub fn process(&self, ctx: &mut RequestContext) -> Dispatch {
        let request_id = ctx.request_id();
        let instance = Arc::new(AroundwareInstance::new(self.factory.build()));
        tracing::debug!(request_id = %request_id, path = ctx.path(), "aroundware instance created");

        let pre_failure = guard::safely(ctx, |ctx| instance.pre_process(ctx)).err();

        // Rewire: route the downstream completion through the instance and
        // keep the server's callback for final delivery. From here until
        // delivery the slot belongs to this interceptor.
        let original = {
            let instance = instance.clone();
            ctx.completion()
                .install(move |reply: Reply| instance.accept(reply))
        };
        let upstream = Arc::new(UpstreamLink {
            request_id,
            callback: Mutex::new(original),
        });

        {
            let post_instance = instance.clone();
            let upstream = upstream.clone();
            instance.on_success(move |reply| {
                let final_reply =
                    match guard::safely_traced(request_id, || post_instance.post_process(reply)) {
                        Ok(reply) => reply,
                        Err(error_reply) => error_reply,
                    };
                upstream.deliver(final_reply);
            });
        }
        {
            let upstream = upstream.clone();
            instance.on_failure(move |error_reply| upstream.deliver(error_reply));
        }

        if let Some(error_reply) = pre_failure {
            match self.pre_failure {
                PreFailurePolicy::ShortCircuit => {
                    tracing::debug!(
                        request_id = %request_id,
                        status = %error_reply.status(),
                        "pre-process failed; short-circuiting downstream"
                    );
                    instance.reject(error_reply);
                    return Dispatch::Pending;
                }
                PreFailurePolicy::ContinueDownstream => {
                    tracing::warn!(
                        request_id = %request_id,
                        status = %error_reply.status(),
                        "pre-process failed; continuing downstream by policy"
                    );
                }
            }
        }

        // Synchronous downstream completion never touches the rewired
        // slot; feed the reply straight into the resolution trigger.
        if let Dispatch::Final(reply) = self.handler.call(ctx) {
            instance.accept(reply);
        }

        Dispatch::Pending
    }
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("pre_failure", &self.pre_failure)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Interceptor`].
pub struct InterceptorBuilder {
    handler: Option<Arc<dyn Handler>>,
    factory: Option<Arc<dyn AroundwareFactory>>,
    pre_failure: PreFailurePolicy,
}

impl InterceptorBuilder {
    /// Creates a builder with the default pre-failure policy and a
    /// passthrough aroundware.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handler: None,
            factory: None,
            pre_failure: PreFailurePolicy::default(),
        }
    }

    /// Sets the downstream handler. Required.
    #[must_use]
    pub fn handler(mut self, handler: impl Handler) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Sets the aroundware factory. Defaults to [`Passthrough`].
    #[must_use]
    pub fn factory(mut self, factory: impl AroundwareFactory) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Sets the pre-failure policy.
    #[must_use]
    pub fn pre_failure_policy(mut self, policy: PreFailurePolicy) -> Self {
        self.pre_failure = policy;
        self
    }

    /// Builds the interceptor.
    ///
    /// # Panics
    ///
    /// Panics if no handler was set.
    #[must_use]
    pub fn build(self) -> Interceptor {
        Interceptor {
            handler: self.handler.expect("handler is required"),
            factory: self
                .factory
                .unwrap_or_else(|| Arc::new(|| Box::new(Passthrough) as Box<dyn Aroundware>)),
            pre_failure: self.pre_failure,
        }
    }
}

impl Default for InterceptorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
