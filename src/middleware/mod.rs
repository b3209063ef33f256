//! # Middleware Module
//!
//! Ordered before/after hooks around the dispatch pipeline.
//!
//! Each [`Middleware`] receives the request context and a [`Next`] handle to
//! the rest of the chain. The first registered middleware is the outermost:
//! it runs first on the way in and last on the way out.
//!
//! Built-in middlewares:
//!
//! - [`TracingMiddleware`]: `request` span plus one completion log line
//! - [`MetricsMiddleware`]: request count, average latency, status classes
//! - [`RequestIdMiddleware`]: echoes `x-request-id` on the response

mod core;
mod metrics;
mod request_id;
mod tracing;

pub(crate) use self::core::Endpoint;
pub use self::core::{from_fn, FnMiddleware, Middleware, MiddlewareResult, Next};
pub use metrics::MetricsMiddleware;
pub use request_id::RequestIdMiddleware;
pub use self::tracing::TracingMiddleware;
