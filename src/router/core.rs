//! Router core - hot path for request routing.

use crate::error::{DispatchError, RegistrationError};
use crate::route::Route;
use http::Method;
use smallvec::SmallVec;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::radix::{RadixMatch, RadixRouter};

/// Maximum number of path parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Names are `Arc<str>` shared with the route template; values are the
/// per-request, percent-decoded captures.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// A route plus the raw path-parameter captures for one request.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    /// Captures in template order, percent-decoded
    pub path_params: ParamVec,
}

impl RouteMatch {
    /// Get a path parameter by name.
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn handler_name(&self) -> &str {
        &self.route.meta.handler_name
    }
}

/// Outcome of [`Router::route`].
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Matched(RouteMatch),
    /// The path exists under other methods only; sorted by method name
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

/// Immutable routing table built once from compiled routes.
pub struct Router {
    radix: RadixRouter,
    routes: Vec<Arc<Route>>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.path_patterns())
            .finish()
    }
}

impl Router {
    /// Insert every route into the radix tree.
    ///
    /// Fails with [`RegistrationError::AmbiguousRoute`] when two routes share
    /// a method and a structurally identical template.
    pub fn new(routes: Vec<Route>) -> Result<Self, RegistrationError> {
        let mut radix = RadixRouter::default();
        let mut stored = Vec::with_capacity(routes.len());
        for route in routes {
            let route = Arc::new(route);
            radix.insert(Arc::clone(&route))?;
            stored.push(route);
        }

        let routes_summary: Vec<String> = stored
            .iter()
            .take(10)
            .map(|r| format!("{} {}", r.meta.method, r.meta.path_pattern))
            .collect();
        info!(
            routes_count = stored.len(),
            routes_summary = ?routes_summary,
            routing_algorithm = "radix_tree",
            "Routing table loaded"
        );

        Ok(Self {
            radix,
            routes: stored,
        })
    }

    /// Match `method` and `path` (no query string) against the table.
    #[must_use]
    pub fn route(&self, method: &Method, path: &str) -> MatchOutcome {
        debug!(method = %method, path = %path, "Route match attempt");
        let match_start = Instant::now();

        let outcome = match self.radix.route(method, path) {
            RadixMatch::Found(route, captures) => {
                let path_params: ParamVec = route
                    .template
                    .param_names()
                    .zip(captures)
                    .map(|(name, raw)| (Arc::clone(name), percent_decode(raw)))
                    .collect();
                MatchOutcome::Matched(RouteMatch { route, path_params })
            }
            RadixMatch::WrongMethod(allowed) => MatchOutcome::MethodNotAllowed(allowed),
            RadixMatch::Missing => MatchOutcome::NotFound,
        };

        let match_duration = match_start.elapsed();
        match &outcome {
            MatchOutcome::Matched(m) => {
                if match_duration > Duration::from_millis(1) {
                    warn!(
                        method = %method,
                        path = %path,
                        handler_name = %m.route.meta.handler_name,
                        route_pattern = %m.route.meta.path_pattern,
                        duration_us = match_duration.as_micros(),
                        "Slow route matching detected"
                    );
                } else {
                    debug!(
                        method = %method,
                        path = %path,
                        handler_name = %m.route.meta.handler_name,
                        route_pattern = %m.route.meta.path_pattern,
                        path_params = ?m.path_params,
                        duration_us = match_duration.as_micros(),
                        "Route matched"
                    );
                }
            }
            MatchOutcome::MethodNotAllowed(allowed) => {
                debug!(
                    method = %method,
                    path = %path,
                    allowed = ?allowed,
                    duration_us = match_duration.as_micros(),
                    "Path matched under other methods only"
                );
            }
            MatchOutcome::NotFound => {
                debug!(
                    method = %method,
                    path = %path,
                    duration_us = match_duration.as_micros(),
                    "No route matched"
                );
            }
        }
        outcome
    }

    /// [`route`](Self::route) with the failure outcomes as errors.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<RouteMatch, DispatchError> {
        match self.route(method, path) {
            MatchOutcome::Matched(m) => Ok(m),
            MatchOutcome::MethodNotAllowed(allowed) => Err(DispatchError::MethodNotAllowed {
                method: method.clone(),
                path: path.to_string(),
                allowed,
            }),
            MatchOutcome::NotFound => Err(DispatchError::NotFound {
                method: method.clone(),
                path: path.to_string(),
            }),
        }
    }

    /// `METHOD template` for every registered route, in registration order.
    #[must_use]
    pub fn path_patterns(&self) -> Vec<String> {
        self.routes
            .iter()
            .map(|r| format!("{} {}", r.meta.method, r.meta.path_pattern))
            .collect()
    }

    #[must_use]
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

/// Decode `%XX` escapes; text that does not decode to UTF-8 is kept raw.
fn percent_decode(raw: &str) -> String {
    if !raw.contains('%') {
        return raw.to_string();
    }
    urlencoding::decode(raw)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| raw.to_string())
}
