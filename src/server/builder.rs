use super::service::AppService;
use crate::config::AppConfig;
use crate::dependency::{Dependency, DependencyOverrides};
use crate::dispatcher::{Handler, HandlerResponse};
use crate::error::{DispatchError, ErrorKind, ExceptionMapper, RegistrationError};
use crate::middleware::Middleware;
use crate::route::{compile_routes, RouteMeta};
use crate::router::Router;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Collects routes, middlewares, overrides and error handlers, then
/// compiles them into an immutable [`AppService`].
///
/// ```rust
/// use fastroute::dispatcher::Handler;
/// use fastroute::server::AppBuilder;
/// use serde_json::json;
///
/// let app = AppBuilder::new()
///     .get("/health", "health", Handler::sync(|_req| Ok(json!({"status": "ok"}))))
///     .build()
///     .expect("valid routes");
/// assert_eq!(app.router().route_count(), 1);
/// ```
#[derive(Default)]
pub struct AppBuilder {
    routes: Vec<RouteMeta>,
    middlewares: Vec<Arc<dyn Middleware>>,
    overrides: DependencyOverrides,
    mapper: ExceptionMapper,
    config: AppConfig,
}

impl AppBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn route(mut self, meta: RouteMeta) -> Self {
        self.routes.push(meta);
        self
    }

    #[must_use]
    pub fn get(self, path: &str, name: &str, handler: Handler) -> Self {
        self.route(RouteMeta::get(path, name, handler))
    }

    #[must_use]
    pub fn post(self, path: &str, name: &str, handler: Handler) -> Self {
        self.route(RouteMeta::post(path, name, handler))
    }

    #[must_use]
    pub fn put(self, path: &str, name: &str, handler: Handler) -> Self {
        self.route(RouteMeta::put(path, name, handler))
    }

    #[must_use]
    pub fn patch(self, path: &str, name: &str, handler: Handler) -> Self {
        self.route(RouteMeta::patch(path, name, handler))
    }

    #[must_use]
    pub fn delete(self, path: &str, name: &str, handler: Handler) -> Self {
        self.route(RouteMeta::delete(path, name, handler))
    }

    /// Append a middleware. The first one added is the outermost.
    #[must_use]
    pub fn middleware<M: Middleware + 'static>(self, middleware: M) -> Self {
        self.middleware_arc(Arc::new(middleware))
    }

    /// Append a shared middleware, e.g. a [`MetricsMiddleware`] the caller
    /// keeps a handle to.
    ///
    /// [`MetricsMiddleware`]: crate::middleware::MetricsMiddleware
    #[must_use]
    pub fn middleware_arc(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Use `replacement` wherever `original` is referenced, at any depth.
    #[must_use]
    pub fn dependency_override(mut self, original: &Dependency, replacement: Dependency) -> Self {
        self.overrides.insert(original.id(), replacement);
        self
    }

    /// Replace the default response rule for one kind of error.
    #[must_use]
    pub fn exception_handler<F>(mut self, kind: ErrorKind, handler: F) -> Self
    where
        F: Fn(&DispatchError) -> HandlerResponse + Send + Sync + 'static,
    {
        self.mapper.register(kind, handler);
        self
    }

    /// Compile templates, parameters and dependency graphs.
    ///
    /// # Errors
    ///
    /// Any [`RegistrationError`]: invalid or ambiguous templates, unknown
    /// or duplicate parameters, bad patterns or schemas, dependency cycles.
    pub fn build(self) -> Result<AppService, RegistrationError> {
        let start = Instant::now();
        let (routes, graph) = compile_routes(self.routes, &self.overrides)?;
        let router = Router::new(routes)?;
        let mapper = self.mapper.with_allow_header(self.config.allow_header);

        info!(
            service = %self.config.service_name,
            routes = router.route_count(),
            dependencies = graph.len(),
            middlewares = self.middlewares.len(),
            overrides = self.overrides.len(),
            duration_us = start.elapsed().as_micros() as u64,
            "Application built"
        );
        Ok(AppService::new(
            router,
            graph,
            self.middlewares,
            mapper,
            self.config,
        ))
    }
}
