//! # Typed Module
//!
//! Type-safe request and response handling. Instead of reading values out
//! of a raw [`HandlerRequest`](crate::dispatcher::HandlerRequest), a typed
//! handler declares the struct it wants and the struct it returns:
//!
//! ```rust
//! use fastroute::error::DispatchError;
//! use fastroute::route::{ParamType, ParameterMeta, RouteMeta};
//! use fastroute::typed::{into_handler, Handler, Params, TypedHandlerRequest};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize)]
//! struct GetItem {
//!     item_id: i64,
//! }
//!
//! #[derive(Serialize)]
//! struct Item {
//!     id: i64,
//!     name: String,
//! }
//!
//! struct GetItemHandler;
//!
//! impl Handler for GetItemHandler {
//!     type Request = Params<GetItem>;
//!     type Response = Item;
//!
//!     fn handle(&self, req: TypedHandlerRequest<Params<GetItem>>) -> Result<Item, DispatchError> {
//!         Ok(Item { id: req.data.0.item_id, name: "widget".into() })
//!     }
//! }
//!
//! let route = RouteMeta::get("/items/{item_id:int}", "get_item", into_handler(GetItemHandler))
//!     .param(ParameterMeta::path("item_id", ParamType::Integer));
//! ```
//!
//! Binding has already coerced and validated every value by the time the
//! typed request is built, so deserialization only fails when the struct
//! disagrees with the route declaration; that is an internal error.

mod core;

pub use self::core::{into_handler, Handler, Params, TypedHandlerRequest};
