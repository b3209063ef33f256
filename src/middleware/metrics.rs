use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::FutureExt;

use super::{Middleware, MiddlewareResult, Next};
use crate::context::RequestContext;

/// Request counters shared by every request task.
///
/// All counters use atomic operations, so the middleware is lock-free and
/// never blocks a request; it only observes.
///
/// Metrics collected:
/// - Total request count
/// - Average latency of the wrapped chain
/// - Responses per status class (`2xx`, `3xx`, `4xx`, `5xx`)
/// - Authentication failures (401 and 403 responses)
#[derive(Default)]
pub struct MetricsMiddleware {
    request_count: AtomicUsize,
    total_latency_ns: AtomicU64,
    status_classes: [AtomicUsize; 5],
    auth_failures: AtomicUsize,
}

impl MetricsMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the total number of requests processed
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Mean time spent in the wrapped chain; zero before the first request.
    pub fn average_latency(&self) -> Duration {
        let count = self.request_count.load(Ordering::Relaxed) as u64;
        if count == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }

    /// Responses whose status starts with `class` (1 through 5).
    pub fn status_class_count(&self, class: u16) -> usize {
        match class {
            1..=5 => self.status_classes[usize::from(class - 1)].load(Ordering::Relaxed),
            _ => 0,
        }
    }

    /// Get the total number of authentication failures
    pub fn auth_failures(&self) -> usize {
        self.auth_failures.load(Ordering::Relaxed)
    }

    fn record(&self, status: u16, latency: Duration) {
        self.total_latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
        if let Some(counter) = self
            .status_classes
            .get(usize::from(status / 100).wrapping_sub(1))
        {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        if status == 401 || status == 403 {
            self.auth_failures.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Middleware for MetricsMiddleware {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, MiddlewareResult> {
        async move {
            self.request_count.fetch_add(1, Ordering::Relaxed);
            let start = Instant::now();
            let result = next.run(ctx).await;
            let status = match &result {
                Ok(resp) => resp.status,
                Err(err) => err.status(),
            };
            self.record(status, start.elapsed());
            result
        }
        .boxed()
    }

    fn name(&self) -> &str {
        "metrics"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes_and_auth_failures() {
        let metrics = MetricsMiddleware::new();
        metrics.request_count.fetch_add(4, Ordering::Relaxed);
        metrics.record(200, Duration::from_millis(2));
        metrics.record(204, Duration::from_millis(2));
        metrics.record(401, Duration::from_millis(2));
        metrics.record(503, Duration::from_millis(2));
        assert_eq!(metrics.status_class_count(2), 2);
        assert_eq!(metrics.status_class_count(4), 1);
        assert_eq!(metrics.status_class_count(5), 1);
        assert_eq!(metrics.status_class_count(9), 0);
        assert_eq!(metrics.auth_failures(), 1);
        assert_eq!(metrics.average_latency(), Duration::from_millis(2));
    }

    #[test]
    fn test_average_latency_zero_without_requests() {
        let metrics = MetricsMiddleware::default();
        assert_eq!(metrics.average_latency(), Duration::ZERO);
    }
}
