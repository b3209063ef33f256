//! # Route Module
//!
//! Route and parameter declarations, and their compilation into the
//! immutable [`Route`]s the router and binder work with.
//!
//! Everything that can fail is checked here, once, while the application is
//! built: templates, duplicate or unknown parameters, regex patterns, JSON
//! schemas and the dependency graph.

mod compile;
mod types;

pub use compile::{compile_routes, Route};
pub use types::{
    CompiledParameter, Constraints, ParamType, ParameterLocation, ParameterMeta, RouteMeta,
};
