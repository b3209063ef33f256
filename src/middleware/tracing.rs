use std::time::Instant;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{field, info, info_span, warn, Instrument};

use super::{Middleware, MiddlewareResult, Next};
use crate::context::RequestContext;

/// Opens a `request` span around the rest of the chain and logs one line per
/// request with its status and latency.
///
/// Responses slower than `slow_threshold_us` are logged at `warn`.
pub struct TracingMiddleware {
    slow_threshold_us: u64,
}

impl Default for TracingMiddleware {
    fn default() -> Self {
        Self {
            slow_threshold_us: 500_000,
        }
    }
}

impl TracingMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn slow_threshold_us(mut self, threshold: u64) -> Self {
        self.slow_threshold_us = threshold;
        self
    }
}

impl Middleware for TracingMiddleware {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, MiddlewareResult> {
        let span = info_span!(
            "request",
            request_id = %ctx.request_id,
            method = %ctx.request().method,
            path = %ctx.request().path,
            phase = field::Empty,
            status = field::Empty,
            latency_us = field::Empty,
        );
        let request_id = ctx.request_id;
        let method = ctx.request().method.clone();
        let path = ctx.request().path.clone();
        let slow_threshold_us = self.slow_threshold_us;

        async move {
            let start = Instant::now();
            let result = next.run(ctx).await;
            let latency_us = start.elapsed().as_micros() as u64;
            let status = match &result {
                Ok(resp) => resp.status,
                Err(err) => err.status(),
            };

            let span = tracing::Span::current();
            span.record("status", status);
            span.record("latency_us", latency_us);
            if latency_us > slow_threshold_us {
                warn!(
                    request_id = %request_id,
                    method = %method,
                    path = %path,
                    status,
                    latency_us,
                    "Slow request"
                );
            } else {
                info!(
                    request_id = %request_id,
                    method = %method,
                    path = %path,
                    status,
                    latency_us,
                    "Request completed"
                );
            }
            result
        }
        .instrument(span)
        .boxed()
    }

    fn name(&self) -> &str {
        "tracing"
    }
}
