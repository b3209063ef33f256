use super::types::{DepRef, Dependency, DependencyId};
use crate::error::RegistrationError;
use crate::route::CompiledParameter;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Replacement dependencies keyed by the identity they replace.
pub type DependencyOverrides = HashMap<DependencyId, Dependency>;

/// Reference from a dependent to a graph node.
#[derive(Debug, Clone)]
pub(crate) struct Edge {
    /// Key the value is exposed under to the dependent
    pub(crate) name: String,
    pub(crate) node: usize,
    /// Scopes added at this invocation site
    pub(crate) scopes: Vec<String>,
}

pub(crate) struct Node {
    pub(crate) dependency: Dependency,
    pub(crate) params: Vec<CompiledParameter>,
    pub(crate) edges: Vec<Edge>,
}

/// Arena of every dependency reachable from any route, one node per identity.
///
/// Built once by [`GraphBuilder`]; immutable and shared by all requests.
#[derive(Default)]
pub struct DependencyGraph {
    pub(crate) nodes: Vec<Node>,
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.nodes.iter().map(|n| n.dependency.name()))
            .finish()
    }
}

impl DependencyGraph {
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Names of the nodes in arena order (dependencies before dependents).
    #[must_use]
    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.dependency.name()).collect()
    }
}

/// The dependencies one route needs.
#[derive(Debug, Clone, Default)]
pub struct RoutePlan {
    /// The route's direct references, in declaration order
    pub(crate) roots: Vec<Edge>,
    /// Every node reachable from `roots`, each once
    pub(crate) reachable: Vec<usize>,
}

impl RoutePlan {
    #[must_use]
    pub fn reachable_count(&self) -> usize {
        self.reachable.len()
    }
}

/// Interns dependencies into a [`DependencyGraph`], applying overrides and
/// rejecting cycles.
pub struct GraphBuilder<'o> {
    overrides: &'o DependencyOverrides,
    nodes: Vec<Node>,
    index: HashMap<DependencyId, usize>,
    /// Identities on the current traversal path, with their names
    visiting: Vec<(DependencyId, String)>,
}

impl<'o> GraphBuilder<'o> {
    #[must_use]
    pub fn new(overrides: &'o DependencyOverrides) -> Self {
        Self {
            overrides,
            nodes: Vec::new(),
            index: HashMap::new(),
            visiting: Vec::new(),
        }
    }

    /// Compile the dependency references of one route.
    pub fn plan(&mut self, refs: &[DepRef]) -> Result<RoutePlan, RegistrationError> {
        let mut roots = Vec::with_capacity(refs.len());
        for dep_ref in refs {
            roots.push(self.edge(dep_ref)?);
        }

        let mut reachable = Vec::new();
        let mut seen = HashSet::new();
        let mut stack: Vec<usize> = roots.iter().rev().map(|e| e.node).collect();
        while let Some(idx) = stack.pop() {
            if !seen.insert(idx) {
                continue;
            }
            reachable.push(idx);
            stack.extend(self.nodes[idx].edges.iter().rev().map(|e| e.node));
        }

        Ok(RoutePlan { roots, reachable })
    }

    #[must_use]
    pub fn finish(self) -> DependencyGraph {
        debug!(nodes = self.nodes.len(), "Dependency graph compiled");
        DependencyGraph { nodes: self.nodes }
    }

    /// Parameters of a node interned by this builder.
    pub(crate) fn node_params(&self, idx: usize) -> &[CompiledParameter] {
        &self.nodes[idx].params
    }

    pub(crate) fn node_name(&self, idx: usize) -> &str {
        self.nodes[idx].dependency.name()
    }

    fn edge(&mut self, dep_ref: &DepRef) -> Result<Edge, RegistrationError> {
        Ok(Edge {
            name: dep_ref.name.clone(),
            node: self.intern(&dep_ref.dependency)?,
            scopes: dep_ref.scopes.clone(),
        })
    }

    fn intern(&mut self, dep: &Dependency) -> Result<usize, RegistrationError> {
        let effective = self
            .overrides
            .get(&dep.id())
            .cloned()
            .unwrap_or_else(|| dep.clone());
        let id = effective.id();

        if let Some(&idx) = self.index.get(&id) {
            return Ok(idx);
        }
        if let Some(pos) = self.visiting.iter().position(|(v, _)| *v == id) {
            let mut cycle: Vec<String> = self.visiting[pos..]
                .iter()
                .map(|(_, name)| name.clone())
                .collect();
            cycle.push(effective.name().to_string());
            return Err(RegistrationError::DependencyCycle { cycle });
        }

        let inner = &effective.inner;
        if !inner.scopes.is_empty() && inner.provider.is_none() {
            return Err(RegistrationError::MissingSecurityProvider {
                dependency: inner.name.clone(),
            });
        }

        let mut params = Vec::with_capacity(inner.parameters.len());
        let mut declared = HashSet::new();
        for p in &inner.parameters {
            // Path names are checked against each using route's template later.
            if !declared.insert((p.location, p.name.clone())) {
                return Err(RegistrationError::DuplicateParameter {
                    owner: inner.name.clone(),
                    name: p.name.clone(),
                    location: p.location.to_string(),
                });
            }
            params.push(p.compile(&inner.name)?);
        }

        self.visiting.push((id, inner.name.clone()));
        let mut edges = Vec::with_capacity(inner.dependencies.len());
        for sub in &inner.dependencies {
            match self.edge(sub) {
                Ok(edge) => edges.push(edge),
                Err(e) => {
                    self.visiting.pop();
                    return Err(e);
                }
            }
        }
        self.visiting.pop();

        let idx = self.nodes.len();
        self.nodes.push(Node {
            dependency: effective.clone(),
            params,
            edges,
        });
        self.index.insert(id, idx);
        debug!(dependency = %effective.name(), node = idx, "Dependency interned");
        Ok(idx)
    }
}
