mod ast;
mod binder;
mod compiler;
mod config;
mod diagnostics;
mod engine;
mod error;
mod helpers;
mod lexer;
mod parser;
mod path;
mod runtime;
mod source;

pub use crate::ast::{
    Argument, BlockHelperNode, BlockNode, ExpressionNode, HashArgument, Node, PartialNode,
    PathExpression, SourceSpan, Template as TemplateAst, TextNode,
};
pub use crate::binder::{
    is_inverted_section, strip_block_prefix, BlockDirection, BlockHelperBinder, CallArtifact,
    ContextMode, HelperBinding, LateBind, ResolutionCache, ResolutionCell,
};
pub use crate::compiler::{
    CompilationContext, CompileOptions, CompiledArgument, CompiledArguments, CompiledBody,
    CompiledStatement, Compiler, FunctionBuilder,
};
pub use crate::config::{Configuration, EngineOptions};
pub use crate::diagnostics::{Diagnostic, DiagnosticLevel, Diagnostics};
pub use crate::engine::{Stache, Template};
pub use crate::error::{CompileError, RenderError, SyntaxError};
pub use crate::helpers::{
    register_builtins, Arguments, BlockHelper, BlockHelperFn, BlockHelperOptions, CallContext,
    EvaluationContext, HelperKind, HelperResolver, HelperTable, ResolverChain, ResolverFn,
    ReturnHelper, ReturnHelperAdapter, ReturnHelperFn, ReturnHelperResolver, INLINE_PARTIAL,
};
pub use crate::lexer::{Lexer, Token, TokenKind};
pub use crate::parser::Parser;
pub use crate::path::{trim_sigil, PathId, PathInfo, PathStore, BLOCK_SIGIL, INVERSE_SIGIL};
pub use crate::runtime::{is_truthy, BindingFrame, EncodedWriter};
pub use crate::source::{SourceId, TemplateSource};
