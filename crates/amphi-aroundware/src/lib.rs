//! # Amphi Aroundware
//!
//! The interception protocol for the Amphi framework: an "aroundware"
//! observes and transforms a request both before a downstream handler runs
//! and after it completes, while the handler itself may finish
//! synchronously or deliver its reply later through a callback.
//!
//! ```text
//! server ──► Interceptor::process(ctx)
//!              │  pre_process
//!              │  rewire async-completion slot ──► AroundwareInstance
//!              ▼                                        │
//!        downstream handler ── Final ──► accept ────────┤
//!              │                                        ▼
//!              └─ Pending … later … slot ──► accept ─► CompletionCell
//!                                                       │ resolve
//!                                                       ▼
//!                                     post_process ─► upstream callback
//! ```
//!
//! ## Key Guarantees
//!
//! - The upstream callback fires exactly once per request, whether the
//!   handler completed synchronously or asynchronously
//! - Post-processing runs exactly once, strictly after pre-processing and
//!   after the downstream reply has been resolved
//! - An error signal raised in any hook becomes a normal HTTP error reply
//!   instead of corrupting or dropping the callback chain
//! - Resolving an already-resolved request is an idempotent no-op

#![doc(html_root_url = "https://docs.rs/amphi-aroundware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod aroundware;
pub mod cell;
pub mod instance;
pub mod interceptor;

// Re-export main types at crate root
pub use aroundware::{Aroundware, FnAroundware, Passthrough};
pub use cell::CompletionCell;
pub use instance::AroundwareInstance;
pub use interceptor::{
    AroundwareFactory, FnHandler, Handler, Interceptor, InterceptorBuilder, PreFailurePolicy,
};
