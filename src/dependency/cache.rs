use super::{DepValue, DependencyId};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Per-request map from dependency identity to its evaluation gate.
///
/// The first branch to reach a gate evaluates the dependency; concurrent
/// branches wait on the same gate and share the value. Lives on the
/// `RequestContext` and is dropped with it.
#[derive(Default)]
pub struct DependencyCache {
    cells: DashMap<DependencyId, Arc<OnceCell<DepValue>>>,
}

impl DependencyCache {
    /// The gate for `id`, created empty on first use.
    pub(crate) fn gate(&self, id: DependencyId) -> Arc<OnceCell<DepValue>> {
        // Clone out of the entry so no shard lock is held across an await.
        Arc::clone(self.cells.entry(id).or_default().value())
    }

    /// The value cached for `id`, if it was already evaluated.
    #[must_use]
    pub fn get(&self, id: DependencyId) -> Option<DepValue> {
        self.cells
            .get(&id)
            .and_then(|cell| cell.get().map(Arc::clone))
    }

    /// Number of identities with a gate (evaluated or in flight).
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
