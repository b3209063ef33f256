//! # Dispatcher Module
//!
//! Handler invocation and response resolution.
//!
//! A matched, bound and resolved request reaches its [`Handler`] as a
//! [`HandlerRequest`]. The handler returns a [`Reply`], which
//! [`resolve_reply`] turns into the final [`HandlerResponse`] according to the
//! route's [`ResponseMeta`]:
//!
//! - `Reply::Response` is used as-is
//! - `Reply::Json` is rendered in the declared kind (JSON by default) at the
//!   route's success status and checked against the response schema
//! - `Reply::Empty` is `204` with no body unless a kind is declared
//!
//! ## Error Handling
//!
//! Handler panics are caught and become `Internal` errors, which the
//! exception mapper turns into a generic 500; the panic message is logged,
//! never sent to the client.

mod core;
mod reply;

pub use core::{
    Handler, HandlerRequest, HandlerResponse, HeaderVec, ResponseBody, MAX_INLINE_HEADERS,
};
pub use reply::{resolve_reply, Reply, ResponseKind, ResponseMeta};
