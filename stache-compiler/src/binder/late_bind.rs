use tracing::warn;

use super::cache::ResolutionCell;
use crate::ast::SourceSpan;
use crate::error::RenderError;
use crate::helpers::{Arguments, BlockHelperOptions, CallContext};
use crate::path::PathId;
use crate::runtime::EncodedWriter;

/// Placeholder for a helper name nothing could resolve at compile time.
///
/// On every invocation the resolver chain is consulted again. A hit is
/// written back into the owning cell so later calls skip the lookup; a miss
/// leaves the cell untouched and fails the render.
#[derive(Debug, Clone)]
pub struct LateBind {
    path: PathId,
}

impl LateBind {
    pub fn new(path: PathId) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathId {
        &self.path
    }

    pub(crate) fn invoke(
        &self,
        cell: &ResolutionCell,
        writer: &mut EncodedWriter,
        options: &BlockHelperOptions<'_>,
        context: &CallContext<'_>,
        arguments: &Arguments,
        span: SourceSpan,
    ) -> Result<(), RenderError> {
        let resolvers = context.frame.configuration().resolvers();
        let Some(helper) = resolvers.resolve(&self.path) else {
            warn!(helper = self.path.name(), %span, "block helper not found");
            return Err(RenderError::HelperNotFound {
                name: self.path.name().to_string(),
                span,
            });
        };
        let helper = cell.resolve_in_place(helper);
        helper.invoke(writer, options, context, arguments)
    }
}
