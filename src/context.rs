//! Per-request state threaded through the middleware chain and the core
//! pipeline.

use crate::background::BackgroundTasks;
use crate::dependency::DependencyCache;
use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::server::RawRequest;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, Span};

/// Where a request currently is in its lifecycle.
///
/// `Received -> Matching -> Binding -> Invoking -> Resolved -> Sent`, with
/// `Mapping` reachable from any state and always followed by `Sent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestPhase {
    Received,
    Matching,
    /// Parameter binding and dependency resolution
    Binding,
    Invoking,
    Resolved,
    Mapping,
    Sent,
}

impl RequestPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RequestPhase::Received => "received",
            RequestPhase::Matching => "matching",
            RequestPhase::Binding => "binding",
            RequestPhase::Invoking => "invoking",
            RequestPhase::Resolved => "resolved",
            RequestPhase::Mapping => "mapping",
            RequestPhase::Sent => "sent",
        }
    }
}

impl fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State owned by exactly one request, dropped once the response is sent.
pub struct RequestContext {
    pub request_id: RequestId,
    request: Arc<RawRequest>,
    /// Typed values middlewares attach for later stages
    pub extensions: http::Extensions,
    phase: RequestPhase,
    dependency_cache: DependencyCache,
    background: BackgroundTasks,
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("method", &self.request.method)
            .field("path", &self.request.path)
            .field("phase", &self.phase)
            .field("cached_dependencies", &self.dependency_cache.len())
            .finish_non_exhaustive()
    }
}

impl RequestContext {
    /// Take the request id from `x-request-id` when it holds a valid ULID,
    /// otherwise mint a new one.
    #[must_use]
    pub fn new(request: RawRequest) -> Self {
        let request_id = RequestId::from_header_or_new(request.get_header(REQUEST_ID_HEADER));
        Self {
            request_id,
            request: Arc::new(request),
            extensions: http::Extensions::new(),
            phase: RequestPhase::Received,
            dependency_cache: DependencyCache::default(),
            background: BackgroundTasks::default(),
        }
    }

    #[must_use]
    pub fn request(&self) -> &RawRequest {
        &self.request
    }

    /// Shared handle to the request for stages that outlive a borrow.
    #[must_use]
    pub fn request_arc(&self) -> Arc<RawRequest> {
        Arc::clone(&self.request)
    }

    /// Mutable access for middlewares rewriting the request before matching.
    pub fn request_mut(&mut self) -> &mut RawRequest {
        Arc::make_mut(&mut self.request)
    }

    #[must_use]
    pub fn phase(&self) -> RequestPhase {
        self.phase
    }

    /// Move to `phase`, recording it on the current span.
    pub fn set_phase(&mut self, phase: RequestPhase) {
        debug!(request_id = %self.request_id, from = %self.phase, to = %phase, "Request phase");
        self.phase = phase;
        Span::current().record("phase", phase.as_str());
    }

    #[must_use]
    pub fn dependency_cache(&self) -> &DependencyCache {
        &self.dependency_cache
    }

    #[must_use]
    pub fn background(&self) -> &BackgroundTasks {
        &self.background
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_taken_from_header() {
        let id = RequestId::new();
        let ctx = RequestContext::new(RawRequest::get("/").header("X-Request-Id", id.to_string()));
        assert_eq!(ctx.request_id, id);
        assert_eq!(ctx.phase(), RequestPhase::Received);
    }

    #[test]
    fn test_request_mut_rewrites_path() {
        let mut ctx = RequestContext::new(RawRequest::get("/old"));
        ctx.request_mut().path = "/new".into();
        assert_eq!(ctx.request().path, "/new");
    }

    #[test]
    fn test_extensions_round_trip() {
        #[derive(Clone, Debug, PartialEq)]
        struct Tenant(&'static str);

        let mut ctx = RequestContext::new(RawRequest::get("/"));
        ctx.extensions.insert(Tenant("acme"));
        assert_eq!(ctx.extensions.get::<Tenant>(), Some(&Tenant("acme")));
    }
}
