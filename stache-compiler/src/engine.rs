use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tracing::debug;

use crate::compiler::{CompileOptions, CompiledBody, Compiler};
use crate::config::{Configuration, EngineOptions};
use crate::error::RenderError;
use crate::helpers::{
    Arguments, BlockHelper, BlockHelperFn, BlockHelperOptions, CallContext, HelperResolver,
    ReturnHelper, ReturnHelperFn,
};
use crate::runtime::{BindingFrame, EncodedWriter};
use crate::source::TemplateSource;

/// A template engine: one [`Configuration`] plus the templates compiled
/// against it.
#[derive(Clone)]
pub struct Stache {
    configuration: Arc<Configuration>,
}

impl Default for Stache {
    fn default() -> Self {
        Self::new()
    }
}

impl Stache {
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            configuration: Arc::new(Configuration::new(options)),
        }
    }

    pub fn configuration(&self) -> &Arc<Configuration> {
        &self.configuration
    }

    pub fn register_helper(&self, name: &str, helper: Arc<dyn ReturnHelper>) {
        self.configuration.register_helper(name, helper);
    }

    pub fn register_helper_fn<F>(&self, name: &str, helper: F)
    where
        F: Fn(&CallContext<'_>, &Arguments) -> Result<Value, RenderError> + Send + Sync + 'static,
    {
        self.register_helper(name, Arc::new(ReturnHelperFn::new(helper)));
    }

    pub fn register_block_helper(&self, name: &str, helper: Arc<dyn BlockHelper>) {
        self.configuration.register_block_helper(name, helper);
    }

    pub fn register_block_helper_fn<F>(&self, name: &str, helper: F)
    where
        F: Fn(
                &mut EncodedWriter,
                &BlockHelperOptions<'_>,
                &CallContext<'_>,
                &Arguments,
            ) -> Result<(), RenderError>
            + Send
            + Sync
            + 'static,
    {
        self.register_block_helper(name, Arc::new(BlockHelperFn::new(helper)));
    }

    pub fn register_resolver(&self, resolver: Arc<dyn HelperResolver>) {
        self.configuration.register_resolver(resolver);
    }

    pub fn register_partial(&self, name: &str, source: &str) -> Result<()> {
        let template = self.compile(source)?;
        self.configuration.register_partial(name, template.body);
        Ok(())
    }

    pub fn compile(&self, source: &str) -> Result<Template> {
        self.compile_source(&TemplateSource::inline(source), CompileOptions::default())
    }

    pub fn compile_source(
        &self,
        source: &TemplateSource,
        options: CompileOptions,
    ) -> Result<Template> {
        let mut compiler = Compiler::new(options);
        self.compile_with(&mut compiler, source).map_err(|err| {
            let details = compiler
                .diagnostics()
                .entries()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n");
            if details.is_empty() {
                err
            } else {
                err.context(format!("{}:\n{}", source.display_name(), details))
            }
        })
    }

    /// Compiles through a caller-owned [`Compiler`] so its diagnostics stay
    /// available after a failure.
    pub fn compile_with(&self, compiler: &mut Compiler, source: &TemplateSource) -> Result<Template> {
        let body = compiler.compile(source, &self.configuration)?;
        debug!(template = %source.display_name(), "compiled template");
        Ok(Template {
            body,
            configuration: Arc::clone(&self.configuration),
        })
    }
}

/// A compiled template. Rendering only reads shared state, so one template
/// can be rendered from several threads at once.
#[derive(Clone)]
pub struct Template {
    body: CompiledBody,
    configuration: Arc<Configuration>,
}

impl Template {
    pub fn body(&self) -> &CompiledBody {
        &self.body
    }

    pub fn render(&self, data: &Value) -> Result<String, RenderError> {
        let mut writer = EncodedWriter::new(!self.configuration.options().no_escape);
        self.render_to(&mut writer, data)?;
        Ok(writer.into_string())
    }

    pub fn render_to(&self, writer: &mut EncodedWriter, data: &Value) -> Result<(), RenderError> {
        let frame = BindingFrame::root(&self.configuration, data.clone());
        self.body.render(writer, &frame)
    }
}
