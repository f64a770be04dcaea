//! # Amphi
//!
//! **Request interception layer for event-driven HTTP servers**
//!
//! Amphi splices an "aroundware" object into a server's callback chain so
//! it observes a request before the downstream handler runs and transforms
//! the reply after the handler completes — whether the handler finished on
//! the current call stack or hands its reply back later through a
//! callback.
//!
//! ## Quick Start
//!
//! ```
//! use amphi::prelude::*;
//! use http::{HeaderMap, Method, StatusCode, Uri};
//!
//! struct Audit;
//!
//! impl Aroundware for Audit {
//!     fn post_process(&self, reply: Reply) -> Result<Reply, ErrorSignal> {
//!         // Inspect or transform the finished reply here.
//!         Ok(reply)
//!     }
//! }
//!
//! let interceptor = Interceptor::builder()
//!     .handler(FnHandler::new(|_ctx| Dispatch::Final(Reply::ok("hello"))))
//!     .factory(|| Box::new(Audit) as Box<dyn Aroundware>)
//!     .build();
//!
//! let mut ctx = RequestContext::new(Method::GET, Uri::from_static("/"), HeaderMap::new())
//!     .with_upstream(|reply| assert_eq!(reply.status(), StatusCode::OK));
//! interceptor.process(&mut ctx);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! server ──► Interceptor ──► pre_process ──► downstream handler
//!               ▲                                  │ sync or async
//!               │ upstream callback                ▼
//!               └── post_process ◄── CompletionCell ◄── accept
//! ```

#![doc(html_root_url = "https://docs.rs/amphi/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use amphi_core as core;

// Re-export the aroundware protocol
pub use amphi_aroundware as aroundware;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```
/// use amphi::prelude::*;
/// ```
pub mod prelude {
    pub use amphi_aroundware::{
        Aroundware, AroundwareFactory, AroundwareInstance, CompletionCell, FnAroundware,
        FnHandler, Handler, Interceptor, InterceptorBuilder, Passthrough, PreFailurePolicy,
    };
    pub use amphi_core::{
        guard, CompletionSlot, Dispatch, ErrorSignal, Reply, RequestContext, RequestId,
    };
}
