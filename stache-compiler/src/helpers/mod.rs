//! Helper descriptors and the values they are invoked with.
//!
//! A block call site always dispatches through a [`BlockHelper`]. Helpers
//! that only return a value are exposed to block call sites through
//! [`ReturnHelperAdapter`].

mod builtins;
mod resolver;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::compiler::CompiledBody;
use crate::error::RenderError;
use crate::path::PathId;
use crate::runtime::{is_truthy, BindingFrame, EncodedWriter};

pub use builtins::{register_builtins, INLINE_PARTIAL};
pub use resolver::{HelperResolver, HelperTable, ResolverChain, ResolverFn, ReturnHelperResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperKind {
    /// Owns both bodies and decides which one to render.
    Block,
    /// A value-returning helper adapted for block position.
    Return,
}

pub trait BlockHelper: Send + Sync {
    fn kind(&self) -> HelperKind {
        HelperKind::Block
    }

    fn invoke(
        &self,
        writer: &mut EncodedWriter,
        options: &BlockHelperOptions<'_>,
        context: &CallContext<'_>,
        arguments: &Arguments,
    ) -> Result<(), RenderError>;
}

pub trait ReturnHelper: Send + Sync {
    fn invoke(&self, context: &CallContext<'_>, arguments: &Arguments)
        -> Result<Value, RenderError>;
}

/// Everything a block helper needs besides its arguments. `template` and
/// `inverse` are already ordered by the call site's direction.
pub struct BlockHelperOptions<'a> {
    pub name: &'a PathId,
    pub template: &'a CompiledBody,
    pub inverse: &'a CompiledBody,
    pub block_params: &'a [String],
    pub frame: &'a BindingFrame<'a>,
}

impl<'a> BlockHelperOptions<'a> {
    pub fn render_template(
        &self,
        writer: &mut EncodedWriter,
        frame: &BindingFrame<'_>,
    ) -> Result<(), RenderError> {
        self.template.render(writer, frame)
    }

    pub fn render_inverse(
        &self,
        writer: &mut EncodedWriter,
        frame: &BindingFrame<'_>,
    ) -> Result<(), RenderError> {
        self.inverse.render(writer, frame)
    }
}

/// The context the helper runs against.
pub enum EvaluationContext<'a> {
    /// The value of the current frame; what ordinary block helpers see.
    Value(&'a Value),
    /// The binding context itself; only the inline partial helper gets this.
    Frame(&'a BindingFrame<'a>),
}

impl<'a> EvaluationContext<'a> {
    pub fn value(&self) -> &Value {
        match self {
            EvaluationContext::Value(value) => *value,
            EvaluationContext::Frame(frame) => frame.value(),
        }
    }

    pub fn as_frame(&self) -> Option<&'a BindingFrame<'a>> {
        match self {
            EvaluationContext::Frame(frame) => Some(*frame),
            EvaluationContext::Value(_) => None,
        }
    }
}

pub struct CallContext<'a> {
    pub frame: &'a BindingFrame<'a>,
    pub context: EvaluationContext<'a>,
}

impl<'a> CallContext<'a> {
    pub fn for_value(frame: &'a BindingFrame<'a>) -> Self {
        Self {
            frame,
            context: EvaluationContext::Value(frame.value()),
        }
    }

    pub fn for_frame(frame: &'a BindingFrame<'a>) -> Self {
        Self {
            frame,
            context: EvaluationContext::Frame(frame),
        }
    }

    pub fn value(&self) -> &Value {
        self.context.value()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    pub positional: Vec<Value>,
    pub hash: BTreeMap<String, Value>,
}

impl Arguments {
    pub fn new(positional: Vec<Value>) -> Self {
        Self {
            positional,
            hash: BTreeMap::new(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn hash_value(&self, key: &str) -> Option<&Value> {
        self.hash.get(key)
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty()
    }
}

pub struct BlockHelperFn<F>(F);

impl<F> BlockHelperFn<F>
where
    F: Fn(
            &mut EncodedWriter,
            &BlockHelperOptions<'_>,
            &CallContext<'_>,
            &Arguments,
        ) -> Result<(), RenderError>
        + Send
        + Sync,
{
    pub fn new(helper: F) -> Self {
        Self(helper)
    }
}

impl<F> BlockHelper for BlockHelperFn<F>
where
    F: Fn(
            &mut EncodedWriter,
            &BlockHelperOptions<'_>,
            &CallContext<'_>,
            &Arguments,
        ) -> Result<(), RenderError>
        + Send
        + Sync,
{
    fn invoke(
        &self,
        writer: &mut EncodedWriter,
        options: &BlockHelperOptions<'_>,
        context: &CallContext<'_>,
        arguments: &Arguments,
    ) -> Result<(), RenderError> {
        (self.0)(writer, options, context, arguments)
    }
}

pub struct ReturnHelperFn<F>(F);

impl<F> ReturnHelperFn<F>
where
    F: Fn(&CallContext<'_>, &Arguments) -> Result<Value, RenderError> + Send + Sync,
{
    pub fn new(helper: F) -> Self {
        Self(helper)
    }
}

impl<F> ReturnHelper for ReturnHelperFn<F>
where
    F: Fn(&CallContext<'_>, &Arguments) -> Result<Value, RenderError> + Send + Sync,
{
    fn invoke(
        &self,
        context: &CallContext<'_>,
        arguments: &Arguments,
    ) -> Result<Value, RenderError> {
        (self.0)(context, arguments)
    }
}

/// Presents a value-returning helper as a block descriptor.
///
/// Condition style: a truthy result renders the `inverse` slot, anything
/// else renders `template`. Call sites that are not known to target a block
/// helper swap their bodies, so the source body lands in `inverse`.
pub struct ReturnHelperAdapter {
    name: PathId,
    helper: Arc<dyn ReturnHelper>,
}

impl ReturnHelperAdapter {
    pub fn new(name: PathId, helper: Arc<dyn ReturnHelper>) -> Self {
        Self { name, helper }
    }
}

impl fmt::Debug for ReturnHelperAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReturnHelperAdapter")
            .field("name", &self.name)
            .finish()
    }
}

impl BlockHelper for ReturnHelperAdapter {
    fn kind(&self) -> HelperKind {
        HelperKind::Return
    }

    fn invoke(
        &self,
        writer: &mut EncodedWriter,
        options: &BlockHelperOptions<'_>,
        context: &CallContext<'_>,
        arguments: &Arguments,
    ) -> Result<(), RenderError> {
        let value = self.helper.invoke(context, arguments)?;
        if !is_truthy(&value) {
            return options.render_template(writer, options.frame);
        }
        match value {
            Value::Bool(_) => options.render_inverse(writer, options.frame),
            other => {
                let frame = options.frame.child(other);
                options.render_inverse(writer, &frame)
            }
        }
    }
}
