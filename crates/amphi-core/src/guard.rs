//! Safe invocation.
//!
//! Every hook that sits on a callback-chain edge runs through [`safely`]
//! (or [`safely_traced`] once the request context is out of reach): if the
//! hook fails with an [`ErrorSignal`] the failure is converted into a final
//! error [`Reply`] instead of escaping, so one request's rejection can
//! never break the shared reactor thread or leave a completion cell
//! unresolved. Panics are deliberately not caught — an unexpected failure
//! is the server's problem, not this layer's.

use crate::{ErrorSignal, Reply, RequestContext, RequestId};

/// Runs `thunk` against the request context, converting an [`ErrorSignal`]
/// failure into its error [`Reply`] rendering.
///
/// # Example
///
/// ```
/// use amphi_core::{guard, ErrorSignal, RequestContext};
/// use http::{HeaderMap, Method, StatusCode, Uri};
///
/// let mut ctx = RequestContext::new(Method::GET, Uri::from_static("/"), HeaderMap::new());
/// let outcome: Result<(), _> =
///     guard::safely(&mut ctx, |_ctx| Err(ErrorSignal::unauthorized("no token")));
///
/// let reply = outcome.unwrap_err();
/// assert_eq!(reply.status(), StatusCode::UNAUTHORIZED);
/// ```
pub fn safely<T, F>(ctx: &mut RequestContext, thunk: F) -> Result<T, Reply>
where
    F: FnOnce(&mut RequestContext) -> Result<T, ErrorSignal>,
{
    let request_id = ctx.request_id();
    safely_traced(request_id, || thunk(ctx))
}

/// Like [`safely`], for edges where only the request ID is still in scope
/// (observers firing after the interceptor has returned).
pub fn safely_traced<T, F>(request_id: RequestId, thunk: F) -> Result<T, Reply>
where
    F: FnOnce() -> Result<T, ErrorSignal>,
{
    match thunk() {
        Ok(value) => Ok(value),
        Err(signal) => {
            tracing::warn!(
                request_id = %request_id,
                status = %signal.status(),
                detail = signal.message(),
                "hook raised an error signal"
            );
            let request_id = request_id.to_string();
            Err(signal.into_reply(Some(&request_id)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Method, StatusCode, Uri};

    fn make_ctx() -> RequestContext {
        RequestContext::new(Method::GET, Uri::from_static("/guarded"), HeaderMap::new())
    }

    #[test]
    fn test_normal_return_passes_through() {
        let mut ctx = make_ctx();
        let value = safely(&mut ctx, |_ctx| Ok(7)).expect("thunk succeeded");
        assert_eq!(value, 7);
    }

    #[test]
    fn test_signal_becomes_error_reply() {
        let mut ctx = make_ctx();
        let request_id = ctx.request_id().to_string();

        let reply = safely(&mut ctx, |_ctx| -> Result<(), ErrorSignal> {
            Err(ErrorSignal::forbidden("denied"))
        })
        .unwrap_err();

        assert_eq!(reply.status(), StatusCode::FORBIDDEN);
        let body = String::from_utf8_lossy(reply.body());
        assert!(body.contains("\"code\":\"FORBIDDEN\""));
        assert!(body.contains(&request_id));
    }

    #[test]
    fn test_thunk_may_mutate_the_context() {
        let mut ctx = make_ctx();
        safely(&mut ctx, |ctx| {
            ctx.set_extension(42_u64);
            Ok(())
        })
        .expect("thunk succeeded");
        assert_eq!(ctx.extension::<u64>(), Some(&42));
    }

    #[test]
    fn test_traced_variant_builds_same_reply() {
        let reply = safely_traced(RequestId::new(), || -> Result<(), ErrorSignal> {
            Err(ErrorSignal::too_many_requests("slow down"))
        })
        .unwrap_err();
        assert_eq!(reply.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
