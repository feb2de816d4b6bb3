//! Binding of block helper call sites.
//!
//! Each `{{#name}}` or `{{^name}}` node is turned into a [`CallArtifact`]
//! that holds its compiled bodies and a shared [`ResolutionCell`] for
//! `name`. The cell is looked up in the configuration's [`ResolutionCache`];
//! names nothing can resolve yet get a [`LateBind`] placeholder that retries
//! on every call.

mod cache;
mod call_site;
mod direction;
mod late_bind;

use std::sync::Arc;

use tracing::{debug, trace};

use crate::ast::{BlockHelperNode, BlockNode, Node};
use crate::compiler::{CompilationContext, CompiledArguments, CompiledBody, FunctionBuilder};
use crate::error::CompileError;
use crate::helpers::INLINE_PARTIAL;
use crate::path::PathStore;

pub use cache::{HelperBinding, ResolutionCache, ResolutionCell};
pub use call_site::{CallArtifact, ContextMode};
pub use direction::{is_inverted_section, strip_block_prefix, BlockDirection};
pub use late_bind::LateBind;

pub struct BlockHelperBinder<'a> {
    context: &'a CompilationContext,
}

impl<'a> BlockHelperBinder<'a> {
    pub fn new(context: &'a CompilationContext) -> Self {
        Self { context }
    }

    pub fn bind(&self, node: &BlockHelperNode) -> Result<CallArtifact, CompileError> {
        let name = strip_block_prefix(node)?;
        let path = PathStore::intern(name);

        let nested = self.context.derive();
        let body = self.compile_block(node, Some(&*node.body), &nested)?;
        let inversion = self.compile_block(node, node.inversion.as_deref(), &nested)?;

        let configuration = self.context.configuration();
        let cache = configuration.block_helpers();
        let cell = match cache.get(&path) {
            Some(cell) => cell,
            None => match configuration.resolvers().resolve(&path) {
                Some(helper) => {
                    debug!(helper = path.name(), "resolved block helper at compile time");
                    let cell = cache
                        .insert_if_absent(&path, HelperBinding::Resolved(Arc::clone(&helper)));
                    // A late-bind cell created since the lookup takes the
                    // helper. A registered binding is kept.
                    cell.resolve_in_place(helper);
                    cell
                }
                None => cache.get_or_create(&path),
            },
        };

        let direction = BlockDirection::for_call_site(node, &cell.binding());
        let (primary, alternate) = direction.order(body, inversion);
        let context_mode = if node.helper_name == INLINE_PARTIAL {
            ContextMode::Frame
        } else {
            ContextMode::Value
        };
        trace!(helper = path.name(), ?direction, ?context_mode, "bound call site");

        Ok(CallArtifact {
            path,
            direction,
            primary,
            alternate,
            block_params: node.block_params.clone(),
            arguments: CompiledArguments::compile(&node.arguments, &node.hash, node.span),
            context_mode,
            cell,
            span: node.span,
        })
    }

    /// A missing section compiles to an empty body.
    fn compile_block(
        &self,
        node: &BlockHelperNode,
        section: Option<&Node>,
        context: &CompilationContext,
    ) -> Result<CompiledBody, CompileError> {
        match section {
            None => Ok(CompiledBody::default()),
            Some(Node::Block(BlockNode { statements, .. })) => {
                FunctionBuilder::compile(statements, context)
            }
            Some(other) => Err(CompileError::MalformedBlockNode {
                helper: node.helper_name.clone(),
                span: other.span(),
            }),
        }
    }
}
