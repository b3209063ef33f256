//! # fastroute
//!
//! **fastroute** is the request-dispatch core of a declarative HTTP service
//! framework. Routes declare their typed parameters, dependencies and
//! response shape; the core matches each request, binds and validates its
//! inputs, resolves the dependency graph, runs the handler inside an ordered
//! middleware chain and turns the result (or any error) into a response.
//!
//! ## Architecture
//!
//! - **[`router`]** - radix-tree path matching with literal-first backtracking
//! - **[`binder`]** - parameter extraction from path, query, header, cookie and
//!   body, with coercion and constraint checks
//! - **[`dependency`]** - dependency graphs compiled at registration and
//!   resolved per request with identity-keyed caching
//! - **[`middleware`]** - ordered before/after hooks around the pipeline
//! - **[`error`]** - the error taxonomy and the exception mapper
//! - **[`dispatcher`]** - handlers, their request/response types and reply
//!   resolution
//! - **[`server`]** - [`AppBuilder`](server::AppBuilder) and the immutable
//!   [`AppService`](server::AppService) transports call into
//! - **[`security`]** - credential providers for scoped dependencies
//! - **[`typed`]** - handlers over serde types instead of raw requests
//!
//! ### Request Handling Flow
//!
//! ```text
//! RawRequest
//!   -> middleware chain (outermost first)
//!     -> body limit (413)
//!     -> router: Matched | 404 | 405
//!     -> binder + dependency resolver: one aggregated 422, 401/403
//!     -> handler (panics become 500)
//!     -> reply resolution (status, kind, response schema)
//!   <- middleware chain unwinding, errors mapped at every boundary
//! -> ResponseSink, then background tasks
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use fastroute::dispatcher::Handler;
//! use fastroute::route::{ParamType, ParameterMeta, RouteMeta};
//! use fastroute::server::{AppBuilder, RawRequest};
//! use serde_json::json;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let app = AppBuilder::new()
//!     .route(
//!         RouteMeta::get(
//!             "/items/{item_id:int}",
//!             "get_item",
//!             Handler::sync(|req| Ok(json!({ "item_id": req.param("item_id") }))),
//!         )
//!         .param(ParameterMeta::query("q", ParamType::String).optional()),
//!     )
//!     .build()
//!     .expect("valid routes");
//!
//! let ok = app.dispatch(RawRequest::get("/items/42")).await;
//! assert_eq!(ok.response.status, 200);
//! assert_eq!(ok.response.json_body(), Some(&json!({ "item_id": 42 })));
//!
//! let bad = app.dispatch(RawRequest::get("/items/abc")).await;
//! assert_eq!(bad.response.status, 422);
//! # });
//! ```
//!
//! ## Runtime Considerations
//!
//! Every request is an independent task on the tokio runtime. The built
//! [`AppService`](server::AppService) is immutable and shared behind an
//! `Arc`; per-request state lives in a
//! [`RequestContext`](context::RequestContext) that is dropped once the
//! response is sent.

pub mod background;
pub mod binder;
pub mod config;
pub mod context;
pub mod dependency;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod route;
pub mod router;
pub mod security;
pub mod server;
pub mod typed;
pub mod validator;

pub use background::BackgroundTasks;
pub use config::AppConfig;
pub use context::{RequestContext, RequestPhase};
pub use dependency::{DepRef, Dependency, DependencyArgs};
pub use dispatcher::{Handler, HandlerRequest, HandlerResponse, Reply, ResponseKind};
pub use error::{DispatchError, ErrorKind, HttpError, RegistrationError};
pub use ids::RequestId;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use route::{ParamType, ParameterLocation, ParameterMeta, RouteMeta};
pub use security::{SecurityProvider, SecurityRequest};
pub use server::{AppBuilder, AppService, RawRequest};
