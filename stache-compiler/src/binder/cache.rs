use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::late_bind::LateBind;
use crate::ast::SourceSpan;
use crate::error::RenderError;
use crate::helpers::{Arguments, BlockHelper, BlockHelperOptions, CallContext, HelperKind};
use crate::path::PathId;
use crate::runtime::EncodedWriter;

/// What a resolution cell currently points at.
#[derive(Clone)]
pub enum HelperBinding {
    Resolved(Arc<dyn BlockHelper>),
    LateBind(LateBind),
}

impl HelperBinding {
    pub fn late_bind(path: &PathId) -> Self {
        HelperBinding::LateBind(LateBind::new(path.clone()))
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, HelperBinding::Resolved(_))
    }

    /// True for a resolved helper that owns both of its bodies.
    pub fn is_block_aware(&self) -> bool {
        match self {
            HelperBinding::Resolved(helper) => helper.kind() == HelperKind::Block,
            HelperBinding::LateBind(_) => false,
        }
    }
}

impl fmt::Debug for HelperBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HelperBinding::Resolved(helper) => {
                write!(f, "Resolved({:?})", helper.kind())
            }
            HelperBinding::LateBind(late) => write!(f, "LateBind({})", late.path()),
        }
    }
}

/// Shared slot holding the current binding for one helper name. Every call
/// site referencing the name holds the same cell, so replacing the binding
/// is visible to all of them without recompiling.
pub struct ResolutionCell {
    path: PathId,
    binding: RwLock<HelperBinding>,
}

impl ResolutionCell {
    pub fn new(path: PathId, binding: HelperBinding) -> Self {
        Self {
            path,
            binding: RwLock::new(binding),
        }
    }

    pub fn path(&self) -> &PathId {
        &self.path
    }

    pub fn binding(&self) -> HelperBinding {
        self.binding.read().clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.binding.read().is_resolved()
    }

    pub fn replace(&self, binding: HelperBinding) -> HelperBinding {
        std::mem::replace(&mut *self.binding.write(), binding)
    }

    /// Swaps a late-bind placeholder for `helper`. If another thread or a
    /// registration got there first, the binding already in the cell wins.
    pub(crate) fn resolve_in_place(&self, helper: Arc<dyn BlockHelper>) -> Arc<dyn BlockHelper> {
        let mut binding = self.binding.write();
        match &*binding {
            HelperBinding::Resolved(current) => Arc::clone(current),
            HelperBinding::LateBind(_) => {
                debug!(helper = self.path.name(), "late-bound helper resolved");
                *binding = HelperBinding::Resolved(Arc::clone(&helper));
                helper
            }
        }
    }

    /// Dispatches through whatever the cell holds at call time. The lock is
    /// released before the helper runs.
    pub fn invoke(
        &self,
        writer: &mut EncodedWriter,
        options: &BlockHelperOptions<'_>,
        context: &CallContext<'_>,
        arguments: &Arguments,
        span: SourceSpan,
    ) -> Result<(), RenderError> {
        let binding = self.binding();
        match binding {
            HelperBinding::Resolved(helper) => helper.invoke(writer, options, context, arguments),
            HelperBinding::LateBind(late) => {
                late.invoke(self, writer, options, context, arguments, span)
            }
        }
    }
}

impl fmt::Debug for ResolutionCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let binding = self.binding();
        f.debug_struct("ResolutionCell")
            .field("path", &self.path)
            .field("binding", &binding)
            .finish()
    }
}

/// At most one [`ResolutionCell`] per helper name, for the lifetime of the
/// owning configuration.
#[derive(Default)]
pub struct ResolutionCache {
    cells: RwLock<HashMap<PathId, Arc<ResolutionCell>>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &PathId) -> Option<Arc<ResolutionCell>> {
        self.cells.read().get(path).cloned()
    }

    /// Returns the cell for `path`, creating it with a late-bind placeholder
    /// if the name has not been seen.
    pub fn get_or_create(&self, path: &PathId) -> Arc<ResolutionCell> {
        if let Some(cell) = self.get(path) {
            return cell;
        }

        let mut cells = self.cells.write();
        Arc::clone(cells.entry(path.clone()).or_insert_with(|| {
            debug!(helper = path.name(), "created late-bind cell");
            Arc::new(ResolutionCell::new(
                path.clone(),
                HelperBinding::late_bind(path),
            ))
        }))
    }

    /// Inserts a cell holding `binding` unless `path` already has one. The
    /// existing cell is returned untouched, so a binding registered in the
    /// meantime is never overwritten.
    pub fn insert_if_absent(&self, path: &PathId, binding: HelperBinding) -> Arc<ResolutionCell> {
        let mut inserted = false;
        let cell = {
            let mut cells = self.cells.write();
            Arc::clone(cells.entry(path.clone()).or_insert_with(|| {
                inserted = true;
                Arc::new(ResolutionCell::new(path.clone(), binding))
            }))
        };
        if inserted {
            debug!(helper = path.name(), "inserted helper binding");
        }
        cell
    }

    /// Overwrites the binding of the cell for `path`, creating the cell if
    /// needed. Existing holders of the cell observe the new binding.
    pub fn add_or_replace(&self, path: &PathId, binding: HelperBinding) -> Arc<ResolutionCell> {
        let (cell, replaced) = {
            let mut cells = self.cells.write();
            match cells.get(path) {
                Some(cell) => {
                    cell.replace(binding);
                    (Arc::clone(cell), true)
                }
                None => {
                    let cell = Arc::new(ResolutionCell::new(path.clone(), binding));
                    cells.insert(path.clone(), Arc::clone(&cell));
                    (cell, false)
                }
            }
        };
        if replaced {
            debug!(helper = path.name(), "replaced helper binding");
        } else {
            debug!(helper = path.name(), "registered helper binding");
        }
        cell
    }

    pub fn contains(&self, path: &PathId) -> bool {
        self.cells.read().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.cells.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
