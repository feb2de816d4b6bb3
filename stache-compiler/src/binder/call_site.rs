use std::sync::Arc;

use super::cache::ResolutionCell;
use super::direction::BlockDirection;
use crate::ast::SourceSpan;
use crate::compiler::{CompiledArguments, CompiledBody};
use crate::error::RenderError;
use crate::helpers::{BlockHelperOptions, CallContext};
use crate::path::PathId;
use crate::runtime::{BindingFrame, EncodedWriter};

/// What the helper receives as its evaluation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMode {
    Value,
    Frame,
}

/// A bound block helper call site, ready to execute against a frame.
///
/// The bodies are stored already ordered by `direction`. The helper itself is
/// not stored here; every execution goes through the shared cell.
#[derive(Debug)]
pub struct CallArtifact {
    pub(crate) path: PathId,
    pub(crate) direction: BlockDirection,
    pub(crate) primary: CompiledBody,
    pub(crate) alternate: CompiledBody,
    pub(crate) block_params: Vec<String>,
    pub(crate) arguments: CompiledArguments,
    pub(crate) context_mode: ContextMode,
    pub(crate) cell: Arc<ResolutionCell>,
    pub(crate) span: SourceSpan,
}

impl CallArtifact {
    pub fn path(&self) -> &PathId {
        &self.path
    }

    pub fn direction(&self) -> BlockDirection {
        self.direction
    }

    /// Passed to the helper as `template`.
    pub fn primary(&self) -> &CompiledBody {
        &self.primary
    }

    /// Passed to the helper as `inverse`.
    pub fn alternate(&self) -> &CompiledBody {
        &self.alternate
    }

    pub fn block_params(&self) -> &[String] {
        &self.block_params
    }

    pub fn context_mode(&self) -> ContextMode {
        self.context_mode
    }

    pub fn cell(&self) -> &Arc<ResolutionCell> {
        &self.cell
    }

    pub fn span(&self) -> SourceSpan {
        self.span
    }

    pub fn execute(
        &self,
        writer: &mut EncodedWriter,
        frame: &BindingFrame<'_>,
    ) -> Result<(), RenderError> {
        let arguments = self.arguments.evaluate(frame)?;
        let options = BlockHelperOptions {
            name: &self.path,
            template: &self.primary,
            inverse: &self.alternate,
            block_params: &self.block_params,
            frame,
        };
        let context = match self.context_mode {
            ContextMode::Value => CallContext::for_value(frame),
            ContextMode::Frame => CallContext::for_frame(frame),
        };
        self.cell
            .invoke(writer, &options, &context, &arguments, self.span)
    }
}
