//! # Router Module
//!
//! Path matching for the dispatch pipeline.
//!
//! Route templates such as `/items/{item_id:int}` are parsed into
//! [`PathTemplate`]s and inserted into a radix tree when the application is
//! built. Each request path is then walked segment by segment:
//!
//! - literal children are tried before the placeholder child, with
//!   backtracking, so `/items/new` wins over `/items/{id}`
//! - a placeholder matches any non-empty segment and captures its
//!   percent-decoded text
//! - empty segments (`//`, trailing `/`) are ignored
//!
//! A path that matches some route's shape under other methods only yields
//! [`MatchOutcome::MethodNotAllowed`] (405) with the permitted methods; no
//! shape match at all is [`MatchOutcome::NotFound`] (404).
//!
//! Two routes with the same method and structurally identical templates
//! (same literals, placeholders at the same positions) are rejected at
//! registration with `RegistrationError::AmbiguousRoute`.

mod core;
mod radix;
mod template;
#[cfg(test)]
mod tests;

pub use core::{MatchOutcome, ParamVec, RouteMatch, Router, MAX_INLINE_PARAMS};
pub use template::{PathTemplate, Segment};
