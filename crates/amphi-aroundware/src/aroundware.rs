//! The aroundware hook interface.
//!
//! An aroundware sees a request twice: once before the downstream handler
//! runs ([`Aroundware::pre_process`]) and once after the handler's reply
//! has been resolved ([`Aroundware::post_process`]). Both hooks return
//! explicit results — an [`ErrorSignal`] is the only sanctioned way for a
//! hook to reject a request, and it is converted into a normal error reply
//! by the interceptor's safe-invocation wrapper rather than tearing down
//! the callback chain.
//!
//! Post-processing may run later, off the original call stack, so the hook
//! object itself carries any per-request state it wants to see again (each
//! instance is built fresh per request by an
//! [`AroundwareFactory`](crate::AroundwareFactory)).

use amphi_core::{ErrorSignal, Reply, RequestContext};

/// Hooks that run around a downstream handler.
///
/// # Example
///
/// ```
/// use amphi_aroundware::Aroundware;
/// use amphi_core::{ErrorSignal, Reply, RequestContext};
/// use http::header::{HeaderName, HeaderValue};
///
/// struct ServerStamp;
///
/// impl Aroundware for ServerStamp {
///     fn post_process(&self, reply: Reply) -> Result<Reply, ErrorSignal> {
///         Ok(reply.with_header(
///             HeaderName::from_static("x-served-by"),
///             HeaderValue::from_static("amphi"),
///         ))
///     }
/// }
/// ```
pub trait Aroundware: Send + Sync + 'static {
    /// Runs once, before the downstream handler.
    ///
    /// Has mutable access to the request context (the handler has not
    /// started yet). Returning an [`ErrorSignal`] rejects the request
    /// according to the interceptor's pre-failure policy.
    fn pre_process(&self, ctx: &mut RequestContext) -> Result<(), ErrorSignal> {
        let _ = ctx;
        Ok(())
    }

    /// Runs once, after the downstream reply has been resolved.
    ///
    /// Receives the resolved reply and returns the (possibly transformed)
    /// reply to deliver upstream. Returning an [`ErrorSignal`] replaces the
    /// reply with a synthesized error reply.
    fn post_process(&self, reply: Reply) -> Result<Reply, ErrorSignal> {
        Ok(reply)
    }
}

/// An aroundware that observes nothing and transforms nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Aroundware for Passthrough {}

/// An aroundware built from a pair of closures.
///
/// # Example
///
/// ```
/// use amphi_aroundware::FnAroundware;
/// use amphi_core::Reply;
///
/// let aroundware = FnAroundware::new(
///     |_ctx| Ok(()),
///     |reply: Reply| Ok(reply),
/// );
/// ```
pub struct FnAroundware<Pre, Post> {
    pre: Pre,
    post: Post,
}

impl<Pre, Post> FnAroundware<Pre, Post>
where
    Pre: Fn(&mut RequestContext) -> Result<(), ErrorSignal> + Send + Sync + 'static,
    Post: Fn(Reply) -> Result<Reply, ErrorSignal> + Send + Sync + 'static,
{
    /// Creates an aroundware from pre- and post-process closures.
    pub const fn new(pre: Pre, post: Post) -> Self {
        Self { pre, post }
    }
}

impl<Pre, Post> Aroundware for FnAroundware<Pre, Post>
where
    Pre: Fn(&mut RequestContext) -> Result<(), ErrorSignal> + Send + Sync + 'static,
    Post: Fn(Reply) -> Result<Reply, ErrorSignal> + Send + Sync + 'static,
{
    fn pre_process(&self, ctx: &mut RequestContext) -> Result<(), ErrorSignal> {
        (self.pre)(ctx)
    }

    fn post_process(&self, reply: Reply) -> Result<Reply, ErrorSignal> {
        (self.post)(reply)
    }
}
