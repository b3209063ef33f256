//! Radix tree for segment-wise route matching.
//!
//! Each node represents one path segment. Literal children are tried before
//! the single placeholder child at every branch point, and the search
//! backtracks when a branch dead-ends, so `/items/new` beats `/items/{id}`
//! while `/items/new/reviews` can still fall through to `/items/{id}/reviews`.
//!
//! Placeholders at the same position share one node regardless of their
//! names: captures are collected positionally and named afterwards from the
//! matched route's own template.

use http::Method;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;

use super::template::Segment;
use crate::error::RegistrationError;
use crate::route::Route;

/// Positional captures; most templates have few placeholders.
pub(crate) type Captures<'p> = SmallVec<[&'p str; 8]>;

#[derive(Default)]
struct RadixNode {
    /// Literal children, matched verbatim
    children: Vec<(String, RadixNode)>,
    /// Placeholder child shared by every template with a placeholder here
    param_child: Option<Box<RadixNode>>,
    /// Routes ending at this node, keyed by method
    routes: HashMap<Method, Arc<Route>>,
}

impl RadixNode {
    fn insert(&mut self, segments: &[Segment], route: Arc<Route>) -> Result<(), RegistrationError> {
        let Some((first, rest)) = segments.split_first() else {
            if let Some(existing) = self.routes.get(&route.meta.method) {
                return Err(RegistrationError::AmbiguousRoute {
                    method: route.meta.method.clone(),
                    template: route.meta.path_pattern.clone(),
                    existing: existing.meta.path_pattern.clone(),
                });
            }
            self.routes.insert(route.meta.method.clone(), route);
            return Ok(());
        };

        match first {
            Segment::Param { .. } => self
                .param_child
                .get_or_insert_with(Box::default)
                .insert(rest, route),
            Segment::Literal(text) => {
                if let Some((_, child)) = self.children.iter_mut().find(|(s, _)| s == text) {
                    return child.insert(rest, route);
                }
                let mut child = RadixNode::default();
                child.insert(rest, route)?;
                self.children.push((text.clone(), child));
                Ok(())
            }
        }
    }

    /// Depth-first, literal-first search.
    ///
    /// Returns the first route registered for `method`. Terminal nodes that
    /// match the path shape but not the method add their methods to
    /// `allowed` so the caller can tell 405 from 404.
    fn search<'p>(
        &self,
        segments: &[&'p str],
        method: &Method,
        captures: &mut Captures<'p>,
        allowed: &mut Vec<Method>,
    ) -> Option<Arc<Route>> {
        let Some((first, rest)) = segments.split_first() else {
            if let Some(route) = self.routes.get(method) {
                return Some(Arc::clone(route));
            }
            allowed.extend(self.routes.keys().cloned());
            return None;
        };

        for (text, child) in &self.children {
            if text.as_str() == *first {
                if let Some(route) = child.search(rest, method, captures, allowed) {
                    return Some(route);
                }
            }
        }

        if let Some(child) = &self.param_child {
            captures.push(*first);
            if let Some(route) = child.search(rest, method, captures, allowed) {
                return Some(route);
            }
            // Backtrack
            captures.pop();
        }

        None
    }
}

/// Result of walking the tree for one request.
pub(crate) enum RadixMatch<'p> {
    Found(Arc<Route>, Captures<'p>),
    /// The shape matched but only under these methods
    WrongMethod(Vec<Method>),
    Missing,
}

#[derive(Default)]
pub(crate) struct RadixRouter {
    root: RadixNode,
}

impl RadixRouter {
    pub(crate) fn insert(&mut self, route: Arc<Route>) -> Result<(), RegistrationError> {
        let shape = Arc::clone(&route);
        self.root.insert(shape.template.segments(), route)
    }

    pub(crate) fn route<'p>(&self, method: &Method, path: &'p str) -> RadixMatch<'p> {
        let segments: SmallVec<[&str; 16]> = path.split('/').filter(|s| !s.is_empty()).collect();

        let mut captures = Captures::new();
        let mut allowed = Vec::new();
        if let Some(route) = self.root.search(&segments, method, &mut captures, &mut allowed) {
            return RadixMatch::Found(route, captures);
        }
        if allowed.is_empty() {
            return RadixMatch::Missing;
        }
        allowed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        allowed.dedup();
        RadixMatch::WrongMethod(allowed)
    }
}
