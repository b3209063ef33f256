//! # Dependency Module
//!
//! Reusable callables that handlers and other dependencies declare as inputs.
//!
//! ## Registration
//!
//! [`GraphBuilder`] interns every dependency reachable from any route into one
//! arena, the [`DependencyGraph`], with exactly one node per identity. Identity
//! is the shared allocation behind a [`Dependency`] handle, never its name, so
//! two dependencies with the same name stay distinct and one dependency
//! referenced from several places becomes a single node. Overrides are applied
//! while interning; a cycle introduced through an override is rejected with
//! [`RegistrationError::DependencyCycle`](crate::error::RegistrationError).
//!
//! ## Per request
//!
//! The [`Resolver`] walks a route's [`RoutePlan`]:
//!
//! 1. sub-dependencies first, siblings concurrently
//! 2. security: the node's provider authenticates and the accumulated scopes
//!    are checked before the body runs (401 / 403)
//! 3. cached nodes are evaluated at most once per request through a
//!    [`DependencyCache`] gate; `no_cache` nodes at every reference
//! 4. panics in a body become `Internal` errors

mod cache;
mod graph;
mod resolver;
mod types;


pub use cache::DependencyCache;
pub use graph::{DependencyGraph, DependencyOverrides, GraphBuilder, RoutePlan};
pub use resolver::Resolver;
pub use types::{DepRef, DepValue, Dependency, DependencyArgs, DependencyBuilder, DependencyId};

pub(crate) use types::{downcast_dependency, extract_params};
