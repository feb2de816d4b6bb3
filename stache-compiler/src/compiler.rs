use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use serde_json::Value;

use crate::ast::{Argument, HashArgument, Node, PathExpression, SourceSpan, Template};
use crate::binder::{BlockHelperBinder, CallArtifact};
use crate::config::Configuration;
use crate::diagnostics::Diagnostics;
use crate::error::{CompileError, RenderError, SyntaxError};
use crate::helpers::{Arguments, CallContext};
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::path::{PathId, PathStore};
use crate::runtime::{BindingFrame, EncodedWriter};
use crate::source::TemplateSource;

#[derive(Debug, Default)]
pub struct CompileOptions {
    pub dump_tokens: bool,
}

/// State threaded through compilation of one template. Nested bodies are
/// compiled under a context derived from their parent's.
#[derive(Clone)]
pub struct CompilationContext {
    configuration: Arc<Configuration>,
    depth: usize,
}

impl CompilationContext {
    pub fn new(configuration: Arc<Configuration>) -> Self {
        Self {
            configuration,
            depth: 0,
        }
    }

    pub fn derive(&self) -> Self {
        Self {
            configuration: Arc::clone(&self.configuration),
            depth: self.depth + 1,
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// An executable sequence of compiled statements. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct CompiledBody {
    statements: Arc<[CompiledStatement]>,
}

impl CompiledBody {
    pub fn new(statements: Vec<CompiledStatement>) -> Self {
        Self {
            statements: statements.into(),
        }
    }

    pub fn statements(&self) -> &[CompiledStatement] {
        &self.statements
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn render(
        &self,
        writer: &mut EncodedWriter,
        frame: &BindingFrame<'_>,
    ) -> Result<(), RenderError> {
        for statement in self.statements.iter() {
            statement.render(writer, frame)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum CompiledStatement {
    Text(String),
    /// Plain lookup. `helper` is set for bare names so a value helper
    /// registered under that name takes precedence at render time.
    Value {
        path: PathExpression,
        helper: Option<PathId>,
        escaped: bool,
        span: SourceSpan,
    },
    HelperCall {
        name: PathId,
        arguments: CompiledArguments,
        escaped: bool,
        span: SourceSpan,
    },
    Block(CallArtifact),
    Partial {
        name: String,
        span: SourceSpan,
    },
}

impl CompiledStatement {
    fn render(&self, writer: &mut EncodedWriter, frame: &BindingFrame<'_>) -> Result<(), RenderError> {
        match self {
            CompiledStatement::Text(text) => {
                writer.write_safe(text);
                Ok(())
            }
            CompiledStatement::Value {
                path,
                helper,
                escaped,
                span,
            } => {
                let configuration = frame.configuration();
                if let Some(helper) = helper.as_ref().and_then(|name| configuration.helper(name)) {
                    let value = helper.invoke(&CallContext::for_value(frame), &Arguments::default())?;
                    writer.write_value(&value, *escaped);
                    return Ok(());
                }
                match frame.lookup(path) {
                    Some(value) => writer.write_value(&value, *escaped),
                    None if configuration.options().strict => {
                        return Err(RenderError::UnresolvedBinding {
                            path: path.original.clone(),
                            span: *span,
                        });
                    }
                    None => {}
                }
                Ok(())
            }
            CompiledStatement::HelperCall {
                name,
                arguments,
                escaped,
                span,
            } => {
                let Some(helper) = frame.configuration().helper(name) else {
                    return Err(RenderError::HelperNotFound {
                        name: name.name().to_string(),
                        span: *span,
                    });
                };
                let arguments = arguments.evaluate(frame)?;
                let value = helper.invoke(&CallContext::for_value(frame), &arguments)?;
                writer.write_value(&value, *escaped);
                Ok(())
            }
            CompiledStatement::Block(call) => call.execute(writer, frame),
            CompiledStatement::Partial { name, span } => {
                let body = frame
                    .inline_partial(name)
                    .or_else(|| frame.configuration().partial(name))
                    .ok_or_else(|| RenderError::PartialNotFound {
                        name: name.clone(),
                        span: *span,
                    })?;
                body.render(writer, frame)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum CompiledArgument {
    Literal(Value),
    Path(PathExpression),
}

impl CompiledArgument {
    fn compile(argument: &Argument) -> Self {
        match argument {
            Argument::Literal(value) => CompiledArgument::Literal(value.clone()),
            Argument::Path(path) => CompiledArgument::Path(path.clone()),
        }
    }

    fn evaluate(&self, frame: &BindingFrame<'_>, span: SourceSpan) -> Result<Value, RenderError> {
        match self {
            CompiledArgument::Literal(value) => Ok(value.clone()),
            CompiledArgument::Path(path) => match frame.lookup(path) {
                Some(value) => Ok(value),
                None if frame.configuration().options().strict => {
                    Err(RenderError::UnresolvedBinding {
                        path: path.original.clone(),
                        span,
                    })
                }
                None => Ok(Value::Null),
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompiledArguments {
    positional: Vec<CompiledArgument>,
    hash: Vec<(String, CompiledArgument)>,
    span: SourceSpan,
}

impl CompiledArguments {
    pub fn compile(arguments: &[Argument], hash: &[HashArgument], span: SourceSpan) -> Self {
        Self {
            positional: arguments.iter().map(CompiledArgument::compile).collect(),
            hash: hash
                .iter()
                .map(|entry| (entry.key.clone(), CompiledArgument::compile(&entry.value)))
                .collect(),
            span,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.hash.is_empty()
    }

    pub fn evaluate(&self, frame: &BindingFrame<'_>) -> Result<Arguments, RenderError> {
        let positional = self
            .positional
            .iter()
            .map(|argument| argument.evaluate(frame, self.span))
            .collect::<Result<Vec<_>, _>>()?;
        let mut hash = BTreeMap::new();
        for (key, argument) in &self.hash {
            hash.insert(key.clone(), argument.evaluate(frame, self.span)?);
        }
        Ok(Arguments { positional, hash })
    }
}

/// Compiles statements into a [`CompiledBody`]. Block helpers are handed to
/// the [`BlockHelperBinder`], which calls back in here for their bodies.
pub struct FunctionBuilder;

impl FunctionBuilder {
    pub fn compile(
        statements: &[Node],
        context: &CompilationContext,
    ) -> Result<CompiledBody, CompileError> {
        let mut compiled = Vec::with_capacity(statements.len());
        Self::compile_into(statements, context, &mut compiled)?;
        Ok(CompiledBody::new(compiled))
    }

    fn compile_into(
        statements: &[Node],
        context: &CompilationContext,
        compiled: &mut Vec<CompiledStatement>,
    ) -> Result<(), CompileError> {
        for node in statements {
            match node {
                Node::Text(text) => compiled.push(CompiledStatement::Text(text.value.clone())),
                Node::Expression(expression) => {
                    let simple = expression.path.simple_name();
                    if expression.arguments.is_empty() && expression.hash.is_empty() {
                        compiled.push(CompiledStatement::Value {
                            path: expression.path.clone(),
                            helper: simple.map(PathStore::intern),
                            escaped: expression.escaped,
                            span: expression.span,
                        });
                    } else {
                        let name = simple.unwrap_or(&expression.path.original);
                        compiled.push(CompiledStatement::HelperCall {
                            name: PathStore::intern(name),
                            arguments: CompiledArguments::compile(
                                &expression.arguments,
                                &expression.hash,
                                expression.span,
                            ),
                            escaped: expression.escaped,
                            span: expression.span,
                        });
                    }
                }
                Node::BlockHelper(block) => {
                    let call = BlockHelperBinder::new(context).bind(block)?;
                    compiled.push(CompiledStatement::Block(call));
                }
                Node::Partial(partial) => compiled.push(CompiledStatement::Partial {
                    name: partial.name.clone(),
                    span: partial.span,
                }),
                Node::Block(block) => Self::compile_into(&block.statements, context, compiled)?,
            }
        }
        Ok(())
    }
}

/// Drives lexing, parsing and binding of one template source, recording
/// failures as diagnostics.
pub struct Compiler {
    diagnostics: Diagnostics,
    options: CompileOptions,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            diagnostics: Diagnostics::new(),
            options,
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn parse(&mut self, source: &TemplateSource) -> Result<Template> {
        let tokens = match Lexer::new(source).tokenize() {
            Ok(tokens) => tokens,
            Err(err) => {
                self.record_syntax_error(&err);
                bail!("Lexing failed");
            }
        };

        if self.options.dump_tokens {
            for token in &tokens {
                println!("{token:?}");
            }
        }

        match Parser::new(tokens).parse() {
            Ok(template) => Ok(template),
            Err(err) => {
                self.record_syntax_error(&err);
                bail!("Parsing failed");
            }
        }
    }

    fn record_syntax_error(&mut self, err: &anyhow::Error) {
        if let Some(syntax) = err.downcast_ref::<SyntaxError>() {
            self.diagnostics
                .push_error_with_span(syntax.message.clone(), Some(syntax.span));
        } else {
            self.diagnostics.push_error_with_span(err.to_string(), None);
        }
    }

    pub fn compile(
        &mut self,
        source: &TemplateSource,
        configuration: &Arc<Configuration>,
    ) -> Result<CompiledBody> {
        let template = self.parse(source)?;
        let context = CompilationContext::new(Arc::clone(configuration));
        match FunctionBuilder::compile(&template.statements, &context) {
            Ok(body) => {
                self.warn_late_bound(&body);
                Ok(body)
            }
            Err(err) => {
                self.diagnostics
                    .push_error_with_span(err.to_string(), Some(err.span()));
                Err(anyhow::Error::new(err).context("Binding failed"))
            }
        }
    }

    /// Block call sites whose helper nothing has claimed yet still compile,
    /// but are reported so a misspelt name shows up before the first render.
    fn warn_late_bound(&mut self, body: &CompiledBody) {
        for statement in body.statements() {
            let CompiledStatement::Block(call) = statement else {
                continue;
            };
            if !call.cell().is_resolved() {
                self.diagnostics.push_warning_with_span(
                    format!(
                        "Block helper '{}' is not registered and will be bound when first rendered",
                        call.path()
                    ),
                    Some(call.span()),
                );
            }
            self.warn_late_bound(call.primary());
            self.warn_late_bound(call.alternate());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineOptions;
    use crate::diagnostics::DiagnosticLevel;

    fn configuration() -> Arc<Configuration> {
        Arc::new(Configuration::new(EngineOptions::default()))
    }

    #[test]
    fn nested_blocks_flatten_into_parent_body() {
        let context = CompilationContext::new(configuration());
        let statements = vec![Node::Block(crate::ast::BlockNode::new(
            vec![Node::Text(crate::ast::TextNode {
                value: "hi".to_string(),
                span: SourceSpan::default(),
            })],
            SourceSpan::default(),
        ))];
        let body = FunctionBuilder::compile(&statements, &context).expect("compile");
        assert_eq!(body.statements().len(), 1);
        assert!(matches!(&body.statements()[0], CompiledStatement::Text(text) if text == "hi"));
    }

    #[test]
    fn parse_errors_are_recorded_as_diagnostics() {
        let mut compiler = Compiler::new(CompileOptions::default());
        let result = compiler.compile(&TemplateSource::inline("{{> missing"), &configuration());
        assert!(result.is_err());
        assert!(compiler.diagnostics().has_errors());
    }

    #[test]
    fn syntax_errors_are_recorded_with_their_position() {
        let mut compiler = Compiler::new(CompileOptions::default());
        let result = compiler.compile(
            &TemplateSource::inline("ok\n  {{^if x}}{{/each}}"),
            &configuration(),
        );
        assert!(result.is_err());

        let diagnostic = &compiler.diagnostics().entries()[0];
        assert_eq!(diagnostic.level, DiagnosticLevel::Error);
        assert_eq!(
            diagnostic.message,
            "'each' does not match the open block 'if'"
        );
        let span = diagnostic.span.expect("parse errors carry a span");
        assert_eq!((span.line, span.column), (2, 12));

        let mut compiler = Compiler::new(CompileOptions::default());
        let _ = compiler.compile(&TemplateSource::inline("{{name %}}"), &configuration());
        let span = compiler.diagnostics().entries()[0]
            .span
            .expect("lex errors carry a span");
        assert_eq!((span.line, span.column), (1, 8));
    }

    #[test]
    fn late_bound_sites_are_reported_as_warnings() {
        let mut compiler = Compiler::new(CompileOptions::default());
        let body = compiler
            .compile(
                &TemplateSource::inline("{{#each xs}}{{#unheard}}x{{/unheard}}{{/each}}"),
                &configuration(),
            )
            .expect("late-bound helpers still compile");
        assert_eq!(body.statements().len(), 1);

        let entries = compiler.diagnostics().entries();
        assert_eq!(entries.len(), 1, "only the unknown helper is reported: {entries:?}");
        assert_eq!(entries[0].level, DiagnosticLevel::Warning);
        assert!(entries[0].message.contains("'unheard'"), "{}", entries[0].message);
        assert!(!compiler.diagnostics().has_errors());
    }

    #[test]
    fn derived_context_is_one_level_deeper() {
        let context = CompilationContext::new(configuration());
        assert_eq!(context.derive().derive().depth(), 2);
    }
}
