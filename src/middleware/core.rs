use crate::context::{RequestContext, RequestPhase};
use crate::dispatcher::HandlerResponse;
use crate::error::{DispatchError, ExceptionMapper};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use tracing::debug;

/// Outcome of a middleware or of the pipeline it wraps.
pub type MiddlewareResult = Result<HandlerResponse, DispatchError>;

/// A before/after hook around the rest of the pipeline.
///
/// Middlewares compose in registration order, the first registered being the
/// outermost. A middleware may:
///
/// - mutate the context, then call [`Next::run`]
/// - return its own response without calling `next` (short-circuit)
/// - inspect or change the response `next` produced
///
/// An error returned here is mapped to a response by the exception mapper at
/// this layer's boundary, so outer middlewares always see a response.
pub trait Middleware: Send + Sync {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, MiddlewareResult>;

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// The innermost stage every middleware chain ends in.
pub(crate) trait Endpoint: Send + Sync {
    fn call<'c>(&'c self, ctx: &'c mut RequestContext) -> BoxFuture<'c, MiddlewareResult>;
}

/// The remainder of the chain below the current middleware.
pub struct Next<'a> {
    remaining: &'a [Arc<dyn Middleware>],
    endpoint: &'a dyn Endpoint,
    mapper: &'a ExceptionMapper,
}

impl<'a> Next<'a> {
    pub(crate) fn new(
        middlewares: &'a [Arc<dyn Middleware>],
        endpoint: &'a dyn Endpoint,
        mapper: &'a ExceptionMapper,
    ) -> Self {
        Self {
            remaining: middlewares,
            endpoint,
            mapper,
        }
    }

    /// Number of middlewares still ahead of the endpoint.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    /// Run the rest of the chain. Errors from below are mapped to responses
    /// before they reach the caller.
    pub fn run<'b>(self, ctx: &'b mut RequestContext) -> BoxFuture<'b, MiddlewareResult>
    where
        'a: 'b,
    {
        async move {
            let result = match self.remaining.split_first() {
                Some((middleware, rest)) => {
                    let next = Next {
                        remaining: rest,
                        endpoint: self.endpoint,
                        mapper: self.mapper,
                    };
                    middleware.handle(&mut *ctx, next).await
                }
                None => self.endpoint.call(&mut *ctx).await,
            };
            match result {
                Ok(response) => Ok(response),
                Err(err) => {
                    ctx.set_phase(RequestPhase::Mapping);
                    debug!(
                        request_id = %ctx.request_id,
                        kind = ?err.kind(),
                        status = err.status(),
                        depth = self.remaining.len(),
                        "Mapping error at middleware boundary"
                    );
                    Ok(self.mapper.handle(&err))
                }
            }
        }
        .boxed()
    }
}

/// Middleware built from a closure, see [`from_fn`].
pub struct FnMiddleware<F> {
    name: String,
    f: F,
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut RequestContext, Next<'a>) -> BoxFuture<'a, MiddlewareResult>
        + Send
        + Sync,
{
    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, MiddlewareResult> {
        (self.f)(ctx, next)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Adapt an async closure into a [`Middleware`].
///
/// ```rust
/// use fastroute::error::DispatchError;
/// use fastroute::middleware::from_fn;
/// use futures::FutureExt;
///
/// let stamp = from_fn("stamp", |ctx, next| {
///     async move {
///         let mut resp = next.run(ctx).await?;
///         resp.set_header("x-stamp", "1");
///         Ok::<_, DispatchError>(resp)
///     }
///     .boxed()
/// });
/// ```
pub fn from_fn<F>(name: impl Into<String>, f: F) -> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut RequestContext, Next<'a>) -> BoxFuture<'a, MiddlewareResult>
        + Send
        + Sync,
{
    FnMiddleware {
        name: name.into(),
        f,
    }
}
