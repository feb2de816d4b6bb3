use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::{BlockHelper, ReturnHelper, ReturnHelperAdapter};
use crate::path::PathId;

/// A strategy that may claim a helper name the configuration does not know.
pub trait HelperResolver: Send + Sync {
    fn try_resolve_block_helper(&self, path: &PathId) -> Option<Arc<dyn BlockHelper>>;
}

pub struct ResolverFn<F>(F);

impl<F> ResolverFn<F>
where
    F: Fn(&PathId) -> Option<Arc<dyn BlockHelper>> + Send + Sync,
{
    pub fn new(resolver: F) -> Self {
        Self(resolver)
    }
}

impl<F> HelperResolver for ResolverFn<F>
where
    F: Fn(&PathId) -> Option<Arc<dyn BlockHelper>> + Send + Sync,
{
    fn try_resolve_block_helper(&self, path: &PathId) -> Option<Arc<dyn BlockHelper>> {
        (self.0)(path)
    }
}

/// Resolvers in registration order. The first one to claim a name wins and
/// later ones are never asked.
#[derive(Default)]
pub struct ResolverChain {
    resolvers: RwLock<Vec<Arc<dyn HelperResolver>>>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, resolver: Arc<dyn HelperResolver>) {
        self.resolvers.write().push(resolver);
    }

    pub fn len(&self) -> usize {
        self.resolvers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn resolve(&self, path: &PathId) -> Option<Arc<dyn BlockHelper>> {
        // No resolver runs while the chain lock is held.
        let resolvers = self.resolvers.read().clone();
        for (index, resolver) in resolvers.iter().enumerate() {
            if let Some(helper) = resolver.try_resolve_block_helper(path) {
                trace!(helper = path.name(), resolver = index, "resolver claimed helper");
                return Some(helper);
            }
        }
        None
    }
}

/// Value-returning helpers registered on a configuration.
#[derive(Default)]
pub struct HelperTable {
    helpers: RwLock<HashMap<PathId, Arc<dyn ReturnHelper>>>,
}

impl HelperTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: PathId, helper: Arc<dyn ReturnHelper>) {
        self.helpers.write().insert(path, helper);
    }

    pub fn get(&self, path: &PathId) -> Option<Arc<dyn ReturnHelper>> {
        self.helpers.read().get(path).cloned()
    }

    pub fn contains(&self, path: &PathId) -> bool {
        self.helpers.read().contains_key(path)
    }
}

/// Lets a value helper be referenced in block position.
pub struct ReturnHelperResolver {
    helpers: Arc<HelperTable>,
}

impl ReturnHelperResolver {
    pub fn new(helpers: Arc<HelperTable>) -> Self {
        Self { helpers }
    }
}

impl HelperResolver for ReturnHelperResolver {
    fn try_resolve_block_helper(&self, path: &PathId) -> Option<Arc<dyn BlockHelper>> {
        let helper = self.helpers.get(path)?;
        Some(Arc::new(ReturnHelperAdapter::new(path.clone(), helper)))
    }
}
