use futures::future::BoxFuture;
use futures::FutureExt;

use super::{Middleware, MiddlewareResult, Next};
use crate::context::RequestContext;
use crate::ids::REQUEST_ID_HEADER;

/// Echoes the request id on every response.
///
/// The id was taken from an incoming `x-request-id` header when one parsed
/// as a ULID, otherwise freshly generated when the context was created.
/// A response that already carries the header is left alone.
#[derive(Debug, Default)]
pub struct RequestIdMiddleware;

impl Middleware for RequestIdMiddleware {
    fn handle<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, MiddlewareResult> {
        async move {
            let request_id = ctx.request_id;
            let mut resp = next.run(ctx).await?;
            if resp.get_header(REQUEST_ID_HEADER).is_none() {
                resp.set_header(REQUEST_ID_HEADER, request_id.to_string());
            }
            Ok(resp)
        }
        .boxed()
    }

    fn name(&self) -> &str {
        "request_id"
    }
}
