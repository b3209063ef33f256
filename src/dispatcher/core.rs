//! Dispatcher core - handler invocation on the hot path.

use super::reply::Reply;
use crate::background::{panic_message, BackgroundTasks};
use crate::dependency::{downcast_dependency, extract_params, DepValue};
use crate::error::DispatchError;
use crate::ids::RequestId;
use crate::router::ParamVec;
use crate::server::RawRequest;
use futures::future::BoxFuture;
use futures::FutureExt;
use http::Method;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

/// Maximum inline headers/cookies before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header/cookie storage for the hot path.
///
/// Header names are `Arc<str>` so repeated names clone in O(1); values are
/// per-request data.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Everything a handler receives: the bound parameters, resolved
/// dependencies and the raw request they came from.
#[derive(Clone)]
pub struct HandlerRequest {
    pub request_id: RequestId,
    pub method: Method,
    /// Request path as received
    pub path: String,
    /// Template of the matched route
    pub route_pattern: String,
    pub handler_name: String,
    /// Percent-decoded captures in template order
    pub path_params: ParamVec,
    /// Bound and validated route parameters, keyed by declared name
    pub params: Arc<Map<String, Value>>,
    /// Resolved dependencies, keyed by the name they were declared under
    pub dependencies: Arc<HashMap<String, DepValue>>,
    pub request: Arc<RawRequest>,
    pub background: BackgroundTasks,
}

impl fmt::Debug for HandlerRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRequest")
            .field("request_id", &self.request_id)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("handler_name", &self.handler_name)
            .field("params", &self.params)
            .field("dependencies", &self.dependencies.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl HandlerRequest {
    /// Raw path capture by name. Last occurrence wins.
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// A bound parameter, already coerced and validated.
    #[inline]
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Deserialize the bound parameters into `T`.
    ///
    /// Binding already validated every value, so a failure here means `T`
    /// disagrees with the route declaration and is reported as internal.
    pub fn extract<T: DeserializeOwned>(&self) -> Result<T, DispatchError> {
        extract_params(&self.params)
    }

    /// A resolved dependency value.
    pub fn dependency<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, DispatchError> {
        downcast_dependency(&self.dependencies, name)
    }

    /// Header by name (case-insensitive per RFC 7230).
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.request.get_header(name)
    }

    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<String> {
        self.request.get_cookie(name)
    }

    /// Last value of a query parameter (`?limit=10&limit=20` gives `20`).
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<String> {
        self.request.query_value(name)
    }

    #[must_use]
    pub fn query_values(&self, name: &str) -> Vec<String> {
        self.request.query_values(name)
    }

    #[must_use]
    pub fn body_bytes(&self) -> &[u8] {
        &self.request.body
    }

    #[must_use]
    pub fn raw(&self) -> &RawRequest {
        &self.request
    }

    /// Queue for work that runs after the response was sent.
    #[must_use]
    pub fn background(&self) -> &BackgroundTasks {
        &self.background
    }
}

type SyncHandlerFn = dyn Fn(HandlerRequest) -> Result<Reply, DispatchError> + Send + Sync;
type SuspendingHandlerFn =
    dyn Fn(HandlerRequest) -> BoxFuture<'static, Result<Reply, DispatchError>> + Send + Sync;

/// A route's endpoint body.
///
/// Sync handlers run inline on the request task; suspending handlers are
/// awaited. Panics in either are caught and become `Internal` errors.
#[derive(Clone)]
pub enum Handler {
    Sync(Arc<SyncHandlerFn>),
    Suspending(Arc<SuspendingHandlerFn>),
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Sync(_) => f.write_str("Handler::Sync"),
            Handler::Suspending(_) => f.write_str("Handler::Suspending"),
        }
    }
}

impl Handler {
    /// ```rust
    /// use fastroute::dispatcher::Handler;
    /// use serde_json::json;
    ///
    /// let handler = Handler::sync(|req| {
    ///     Ok(json!({ "item_id": req.param("item_id") }))
    /// });
    /// assert!(!handler.is_suspending());
    /// ```
    pub fn sync<F, R>(f: F) -> Self
    where
        F: Fn(HandlerRequest) -> Result<R, DispatchError> + Send + Sync + 'static,
        R: Into<Reply>,
    {
        Handler::Sync(Arc::new(move |req: HandlerRequest| {
            f(req).map(Into::<Reply>::into)
        }))
    }

    pub fn suspending<F, Fut, R>(f: F) -> Self
    where
        F: Fn(HandlerRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, DispatchError>> + Send + 'static,
        R: Into<Reply>,
    {
        Handler::Suspending(Arc::new(move |req: HandlerRequest| {
            let fut = f(req);
            async move { fut.await.map(Into::<Reply>::into) }.boxed()
        }))
    }

    #[must_use]
    pub fn is_suspending(&self) -> bool {
        matches!(self, Handler::Suspending(_))
    }

    /// Run the handler, converting a panic into an `Internal` error.
    pub async fn invoke(&self, req: HandlerRequest) -> Result<Reply, DispatchError> {
        let request_id = req.request_id;
        let handler_name = req.handler_name.clone();
        let start = Instant::now();

        let outcome = match self {
            Handler::Sync(f) => std::panic::catch_unwind(AssertUnwindSafe(|| f(req))),
            Handler::Suspending(f) => {
                AssertUnwindSafe(async move { f(req).await })
                    .catch_unwind()
                    .await
            }
        };

        match outcome {
            Ok(result) => {
                debug!(
                    request_id = %request_id,
                    handler_name = %handler_name,
                    ok = result.is_ok(),
                    duration_us = start.elapsed().as_micros() as u64,
                    "Handler execution complete"
                );
                result
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(
                    request_id = %request_id,
                    handler_name = %handler_name,
                    panic_message = %message,
                    "Handler panicked"
                );
                Err(DispatchError::internal(format!(
                    "handler '{handler_name}' panicked: {message}"
                )))
            }
        }
    }
}

/// Body of a [`HandlerResponse`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResponseBody {
    #[default]
    Empty,
    Json(Value),
    Text(String),
    Bytes(Vec<u8>),
}

impl ResponseBody {
    /// Serialized form written to the transport.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            ResponseBody::Empty => Vec::new(),
            ResponseBody::Json(v) => v.to_string().into_bytes(),
            ResponseBody::Text(s) => s.as_bytes().to_vec(),
            ResponseBody::Bytes(b) => b.clone(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            ResponseBody::Empty => true,
            ResponseBody::Json(_) => false,
            ResponseBody::Text(s) => s.is_empty(),
            ResponseBody::Bytes(b) => b.is_empty(),
        }
    }
}

/// Status, headers and body of a response.
///
/// Headers keep insertion order; lookup is case-insensitive and
/// [`append_header`](Self::append_header) allows duplicates such as several
/// `set-cookie` lines.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerResponse {
    pub status: u16,
    pub headers: HeaderVec,
    pub body: ResponseBody,
}

impl HandlerResponse {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: ResponseBody) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    fn with_content_type(status: u16, content_type: &str, body: ResponseBody) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), content_type.to_string()));
        Self::new(status, headers, body)
    }

    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        Self::with_content_type(status, "application/json", ResponseBody::Json(body))
    }

    #[must_use]
    pub fn html(status: u16, body: impl Into<String>) -> Self {
        Self::with_content_type(
            status,
            "text/html; charset=utf-8",
            ResponseBody::Text(body.into()),
        )
    }

    #[must_use]
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::with_content_type(
            status,
            "text/plain; charset=utf-8",
            ResponseBody::Text(body.into()),
        )
    }

    #[must_use]
    pub fn bytes(status: u16, content_type: &str, body: Vec<u8>) -> Self {
        Self::with_content_type(status, content_type, ResponseBody::Bytes(body))
    }

    /// `307 Temporary Redirect` to `location`.
    #[must_use]
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::redirect_with_status(307, location)
    }

    #[must_use]
    pub fn redirect_with_status(status: u16, location: impl Into<String>) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("location"), location.into()));
        Self::new(status, headers, ResponseBody::Empty)
    }

    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self::new(status, HeaderVec::new(), ResponseBody::Empty)
    }

    /// `{"detail": message}` with `status`.
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "detail": message }))
    }

    /// First header with this name (case-insensitive).
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn get_header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Replace every header with this name.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.into()));
    }

    /// Add a header line, keeping existing ones with the same name.
    pub fn append_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.push((Arc::from(name), value.into()));
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    #[must_use]
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn body_bytes(&self) -> Vec<u8> {
        self.body.to_bytes()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Status, header lines and serialized body, for the transport.
    #[must_use]
    pub fn into_parts(self) -> (u16, Vec<(String, String)>, Vec<u8>) {
        let body = self.body.to_bytes();
        let headers = self
            .headers
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        (self.status, headers, body)
    }
}
