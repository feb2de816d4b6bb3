use thiserror::Error;

use crate::ast::SourceSpan;

/// Structural problems found while binding a template. Compilation of the
/// current template stops at the first one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("helper '{name}' referenced with unknown prefix at {span}")]
    UnknownHelperPrefix { name: String, span: SourceSpan },

    #[error("helper '{helper}' expected a block body at {span}")]
    MalformedBlockNode { helper: String, span: SourceSpan },
}

impl CompileError {
    pub fn span(&self) -> SourceSpan {
        match self {
            CompileError::UnknownHelperPrefix { span, .. }
            | CompileError::MalformedBlockNode { span, .. } => *span,
        }
    }
}

/// A lexing or parsing failure at a known position in the source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at {span}")]
pub struct SyntaxError {
    pub message: String,
    pub span: SourceSpan,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    pub fn at(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::new(message, SourceSpan::single_point(line, column))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// Late binding exhausted every resolver. `span` is the referencing call
    /// site, captured when the template was compiled.
    #[error("template references a helper that cannot be resolved: '{name}' at {span}")]
    HelperNotFound { name: String, span: SourceSpan },

    #[error("template references '{path}' which cannot be resolved at {span}")]
    UnresolvedBinding { path: String, span: SourceSpan },

    #[error("partial '{name}' could not be found at {span}")]
    PartialNotFound { name: String, span: SourceSpan },

    #[error("{message}")]
    Helper { helper: String, message: String },
}

impl RenderError {
    pub fn helper(helper: impl Into<String>, message: impl Into<String>) -> Self {
        RenderError::Helper {
            helper: helper.into(),
            message: message.into(),
        }
    }
}
