use super::graph::{DependencyGraph, Edge, RoutePlan};
use super::types::{Callable, DepValue, Dependency, DependencyArgs};
use super::DependencyCache;
use crate::background::{panic_message, BackgroundTasks};
use crate::binder::BoundRequest;
use crate::error::DispatchError;
use crate::ids::RequestId;
use crate::security::{Authentication, Credentials, SecurityRequest, SecurityScopes};
use crate::server::RawRequest;
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Executes a route's [`RoutePlan`] for one request.
///
/// Sub-dependencies are resolved before their dependent, siblings
/// concurrently. Cached identities go through the request's
/// [`DependencyCache`] gate so concurrent branches share one evaluation.
pub struct Resolver<'a> {
    graph: &'a DependencyGraph,
    cache: &'a DependencyCache,
    bound: &'a BoundRequest,
    request: Arc<RawRequest>,
    request_id: RequestId,
    background: BackgroundTasks,
}

impl<'a> Resolver<'a> {
    pub fn new(
        graph: &'a DependencyGraph,
        cache: &'a DependencyCache,
        bound: &'a BoundRequest,
        request: Arc<RawRequest>,
        request_id: RequestId,
        background: BackgroundTasks,
    ) -> Self {
        Self {
            graph,
            cache,
            bound,
            request,
            request_id,
            background,
        }
    }

    /// Resolve every root of `plan`, keyed by the name each was declared under.
    pub async fn resolve_plan(
        &self,
        plan: &RoutePlan,
    ) -> Result<HashMap<String, DepValue>, DispatchError> {
        if plan.roots.is_empty() {
            return Ok(HashMap::new());
        }
        let start = Instant::now();
        let values = try_join_all(
            plan.roots
                .iter()
                .map(|edge| self.resolve_edge(edge, Vec::new())),
        )
        .await?;
        debug!(
            request_id = %self.request_id,
            roots = plan.roots.len(),
            cached = self.cache.len(),
            duration_us = start.elapsed().as_micros() as u64,
            "Dependencies resolved"
        );
        Ok(plan
            .roots
            .iter()
            .map(|edge| edge.name.clone())
            .zip(values)
            .collect())
    }

    fn resolve_edge<'s>(
        &'s self,
        edge: &'s Edge,
        inherited: Vec<String>,
    ) -> BoxFuture<'s, Result<DepValue, DispatchError>> {
        async move {
            let dependency = &self.graph.nodes[edge.node].dependency;

            let security_scopes = accumulate(inherited, edge, dependency);
            // Checked per reference: each site may demand different scopes.
            let credentials = self.authorize(dependency, &security_scopes)?;

            if !dependency.uses_cache() {
                return self.evaluate(edge.node, security_scopes, credentials).await;
            }
            let required = security_scopes.scopes().to_vec();
            let gate = self.cache.gate(dependency.id());
            let mut evaluated_here = false;
            let value = gate
                .get_or_try_init(|| {
                    evaluated_here = true;
                    self.evaluate(edge.node, security_scopes, credentials)
                })
                .await?;
            if !evaluated_here {
                // A cached value was produced under another site's scopes.
                self.authorize_below(edge.node, &required)?;
            }
            Ok(Arc::clone(value))
        }
        .boxed()
    }

    /// Check every provider beneath `idx` against the scopes this reference
    /// accumulates on the way down, without evaluating anything.
    fn authorize_below(&self, idx: usize, inherited: &[String]) -> Result<(), DispatchError> {
        for edge in &self.graph.nodes[idx].edges {
            let dependency = &self.graph.nodes[edge.node].dependency;
            let security_scopes = accumulate(inherited.to_vec(), edge, dependency);
            self.authorize(dependency, &security_scopes)?;
            self.authorize_below(edge.node, security_scopes.scopes())?;
        }
        Ok(())
    }

    fn authorize(
        &self,
        dependency: &Dependency,
        scopes: &SecurityScopes,
    ) -> Result<Option<Arc<Credentials>>, DispatchError> {
        let Some(provider) = &dependency.inner.provider else {
            return Ok(None);
        };
        match provider.authenticate(&SecurityRequest::new(&self.request)) {
            Authentication::Missing => Err(DispatchError::Unauthenticated {
                detail: "Not authenticated".to_string(),
            }),
            Authentication::Invalid(reason) => {
                debug!(
                    request_id = %self.request_id,
                    dependency = %dependency.name(),
                    provider = %provider.name(),
                    reason = %reason,
                    "Credentials rejected"
                );
                Err(DispatchError::Unauthenticated {
                    detail: "Could not validate credentials".to_string(),
                })
            }
            Authentication::Granted(credentials) => {
                let missing = scopes.missing_from(&credentials);
                if !missing.is_empty() {
                    debug!(
                        request_id = %self.request_id,
                        dependency = %dependency.name(),
                        required = %scopes.scope_str(),
                        missing = ?missing,
                        "Insufficient scopes"
                    );
                    return Err(DispatchError::Forbidden {
                        detail: "Not enough permissions".to_string(),
                        missing_scopes: missing,
                    });
                }
                Ok(Some(Arc::new(credentials)))
            }
        }
    }

    async fn evaluate(
        &self,
        idx: usize,
        security_scopes: SecurityScopes,
        credentials: Option<Arc<Credentials>>,
    ) -> Result<DepValue, DispatchError> {
        let node = &self.graph.nodes[idx];
        let inherited = security_scopes.scopes().to_vec();
        let children = try_join_all(
            node.edges
                .iter()
                .map(|edge| self.resolve_edge(edge, inherited.clone())),
        )
        .await?;
        let resolved: HashMap<String, DepValue> = node
            .edges
            .iter()
            .map(|edge| edge.name.clone())
            .zip(children)
            .collect();

        let args = DependencyArgs {
            params: self.bound.node(idx),
            resolved: Arc::new(resolved),
            request: Arc::clone(&self.request),
            request_id: self.request_id,
            security_scopes,
            credentials,
            background: self.background.clone(),
        };

        let name = node.dependency.name();
        let start = Instant::now();
        let result = match &node.dependency.inner.callable {
            Callable::Sync(f) => std::panic::catch_unwind(AssertUnwindSafe(|| f(&args)))
                .unwrap_or_else(|payload| Err(self.panicked(name, payload.as_ref()))),
            Callable::Suspending(f) => AssertUnwindSafe(async move { f(args).await })
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(self.panicked(name, payload.as_ref()))),
        };
        debug!(
            request_id = %self.request_id,
            dependency = %name,
            ok = result.is_ok(),
            duration_us = start.elapsed().as_micros() as u64,
            "Dependency evaluated"
        );
        result
    }

    fn panicked(&self, name: &str, payload: &(dyn std::any::Any + Send)) -> DispatchError {
        let message = panic_message(payload);
        warn!(
            request_id = %self.request_id,
            dependency = %name,
            panic = %message,
            "Dependency panicked"
        );
        DispatchError::internal(format!("dependency '{name}' panicked: {message}"))
    }
}

/// Scopes required at `edge`: those inherited from above, the site's own and
/// the dependency's, first occurrence kept.
fn accumulate(mut scopes: Vec<String>, edge: &Edge, dependency: &Dependency) -> SecurityScopes {
    for scope in edge.scopes.iter().chain(dependency.scopes()) {
        if !scopes.contains(scope) {
            scopes.push(scope.clone());
        }
    }
    SecurityScopes::new(scopes)
}
