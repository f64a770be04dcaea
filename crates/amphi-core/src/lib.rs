//! # Amphi Core
//!
//! Core types for the Amphi request interception layer.
//!
//! This crate provides the foundational types used throughout Amphi:
//!
//! - [`Reply`] - Immutable (status, headers, body) response triple
//! - [`Dispatch`] - Downstream handler result: final reply or pending sentinel
//! - [`RequestContext`] - Per-request context carrying the async-completion slot
//! - [`RequestId`] - UUID v7 request identifier
//! - [`CompletionSlot`] - The rewritable async-completion callback slot
//! - [`ErrorSignal`] - HTTP-shaped failure raised by hooks
//! - [`guard`] - Safe invocation: convert an error signal into an error reply

#![doc(html_root_url = "https://docs.rs/amphi-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod error;
pub mod guard;
mod reply;
mod slot;

pub use context::{RequestContext, RequestId};
pub use error::{ErrorDetail, ErrorEnvelope, ErrorSignal};
pub use reply::{Dispatch, Reply};
pub use slot::{CompletionSlot, UpstreamCallback};
