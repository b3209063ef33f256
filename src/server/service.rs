use super::request::RawRequest;
use super::response::{ResponseSink, WireResponse};
use crate::background::BackgroundTasks;
use crate::binder::bind_route;
use crate::config::AppConfig;
use crate::context::{RequestContext, RequestPhase};
use crate::dependency::{DependencyGraph, Resolver};
use crate::dispatcher::{resolve_reply, HandlerRequest, HandlerResponse};
use crate::error::{ExceptionMapper, HttpError};
use crate::ids::RequestId;
use crate::middleware::{Endpoint, Middleware, MiddlewareResult, Next};
use crate::router::Router;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, field, info_span, warn, Instrument};

/// Immutable snapshot of a built application, shared by every request task.
///
/// Cloning is cheap: all state lives behind one `Arc`.
#[derive(Clone)]
pub struct AppService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    router: Router,
    graph: DependencyGraph,
    middlewares: Vec<Arc<dyn Middleware>>,
    mapper: ExceptionMapper,
    config: AppConfig,
}

/// Result of [`AppService::dispatch`]: the final response plus the work to
/// run once it has been sent.
#[derive(Debug)]
pub struct Dispatched {
    pub request_id: RequestId,
    pub response: HandlerResponse,
    pub background: BackgroundTasks,
}

impl AppService {
    pub(crate) fn new(
        router: Router,
        graph: DependencyGraph,
        middlewares: Vec<Arc<dyn Middleware>>,
        mapper: ExceptionMapper,
        config: AppConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                router,
                graph,
                middlewares,
                mapper,
                config,
            }),
        }
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.inner.router
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn dependency_graph(&self) -> &DependencyGraph {
        &self.inner.graph
    }

    /// Names of the registered middlewares, outermost first.
    #[must_use]
    pub fn middleware_names(&self) -> Vec<&str> {
        self.inner.middlewares.iter().map(|m| m.name()).collect()
    }

    /// Run one request through the middleware chain and the pipeline.
    ///
    /// Never fails: every error has been mapped to a response by the time
    /// this returns. Background tasks are handed back, not started.
    pub async fn dispatch(&self, request: RawRequest) -> Dispatched {
        let mut ctx = RequestContext::new(request);
        let request_id = ctx.request_id;
        let span = info_span!(
            "dispatch",
            service = %self.inner.config.service_name,
            request_id = %request_id,
            method = %ctx.request().method,
            path = %ctx.request().path,
            phase = field::Empty,
        );

        let inner = &self.inner;
        let response = async {
            let start = Instant::now();
            let pipeline = Pipeline {
                router: &inner.router,
                graph: &inner.graph,
                max_body_bytes: inner.config.max_body_bytes,
            };
            let response = match Next::new(&inner.middlewares, &pipeline, &inner.mapper)
                .run(&mut ctx)
                .await
            {
                Ok(response) => response,
                Err(err) => inner.mapper.handle(&err),
            };
            ctx.set_phase(RequestPhase::Sent);
            debug!(
                request_id = %request_id,
                status = response.status,
                duration_us = start.elapsed().as_micros() as u64,
                "Request dispatched"
            );
            response
        }
        .instrument(span)
        .await;

        Dispatched {
            request_id,
            response,
            background: ctx.background().clone(),
        }
    }

    /// Dispatch, write the response through `sink`, then spawn the queued
    /// background tasks on the tokio runtime.
    ///
    /// When the sink fails the background tasks are dropped unrun.
    pub async fn serve<S: ResponseSink>(
        &self,
        request: RawRequest,
        sink: S,
    ) -> io::Result<Option<JoinHandle<()>>> {
        let Dispatched {
            request_id,
            response,
            background,
        } = self.dispatch(request).await;
        if let Err(e) = sink.send(WireResponse::from(response)) {
            warn!(
                request_id = %request_id,
                error = %e,
                dropped_tasks = background.len(),
                "Failed to hand response to transport"
            );
            return Err(e);
        }
        Ok(background.spawn())
    }
}

/// Innermost stage of every chain: body limit, match, bind, resolve,
/// invoke and render.
struct Pipeline<'s> {
    router: &'s Router,
    graph: &'s DependencyGraph,
    max_body_bytes: usize,
}

impl Pipeline<'_> {
    async fn run(&self, ctx: &mut RequestContext) -> MiddlewareResult {
        let request = ctx.request_arc();
        if self.max_body_bytes > 0 && request.body.len() > self.max_body_bytes {
            return Err(HttpError::new(413, "Request body too large").into());
        }

        ctx.set_phase(RequestPhase::Matching);
        let matched = self.router.resolve(&request.method, &request.path)?;
        let route = Arc::clone(&matched.route);

        ctx.set_phase(RequestPhase::Binding);
        let bound = bind_route(&route, self.graph, &request, &matched.path_params)?;
        let dependencies = Resolver::new(
            self.graph,
            ctx.dependency_cache(),
            &bound,
            Arc::clone(&request),
            ctx.request_id,
            ctx.background().clone(),
        )
        .resolve_plan(&route.plan)
        .await?;

        ctx.set_phase(RequestPhase::Invoking);
        let handler_request = HandlerRequest {
            request_id: ctx.request_id,
            method: request.method.clone(),
            path: request.path.clone(),
            route_pattern: route.meta.path_pattern.clone(),
            handler_name: route.meta.handler_name.clone(),
            path_params: matched.path_params,
            params: Arc::clone(&bound.route),
            dependencies: Arc::new(dependencies),
            request: Arc::clone(&request),
            background: ctx.background().clone(),
        };
        let reply = route.meta.handler.invoke(handler_request).await?;

        ctx.set_phase(RequestPhase::Resolved);
        resolve_reply(
            reply,
            &route.meta.response,
            route.response_validator.as_ref(),
        )
    }
}

impl Endpoint for Pipeline<'_> {
    fn call<'c>(&'c self, ctx: &'c mut RequestContext) -> BoxFuture<'c, MiddlewareResult> {
        self.run(ctx).boxed()
    }
}
