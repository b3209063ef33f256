//! Transport-facing surface: the request type transports build, the
//! application builder, and the service that dispatches requests.

mod builder;
mod request;
mod response;
mod service;

pub use builder::AppBuilder;
pub use request::{parse_cookies, RawRequest};
pub use response::{status_reason, ResponseSink, WireResponse};
pub use service::{AppService, Dispatched};
