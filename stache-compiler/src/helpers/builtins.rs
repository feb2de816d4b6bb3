use std::sync::Arc;

use serde_json::Value;
use stache_support::helper_error;

use super::{Arguments, BlockHelper, BlockHelperOptions, CallContext};
use crate::binder::{HelperBinding, ResolutionCache};
use crate::error::RenderError;
use crate::path::PathStore;
use crate::runtime::{is_truthy, EncodedWriter};

/// Helper name of the inline partial construct, `{{#*inline "name"}}`.
pub const INLINE_PARTIAL: &str = "#*inline";

pub fn register_builtins(cache: &ResolutionCache) {
    let builtins: [(&str, Arc<dyn BlockHelper>); 5] = [
        ("each", Arc::new(EachHelper)),
        ("if", Arc::new(IfHelper { negate: false })),
        ("unless", Arc::new(IfHelper { negate: true })),
        ("with", Arc::new(WithHelper)),
        (INLINE_PARTIAL, Arc::new(InlinePartialHelper)),
    ];
    for (name, helper) in builtins {
        cache.add_or_replace(&PathStore::intern(name), HelperBinding::Resolved(helper));
    }
}

struct EachHelper;

impl BlockHelper for EachHelper {
    fn invoke(
        &self,
        writer: &mut EncodedWriter,
        options: &BlockHelperOptions<'_>,
        _context: &CallContext<'_>,
        arguments: &Arguments,
    ) -> Result<(), RenderError> {
        let target = arguments.get(0).cloned().unwrap_or(Value::Null);
        match target {
            Value::Array(items) if !items.is_empty() => {
                let last = items.len() - 1;
                for (index, item) in items.into_iter().enumerate() {
                    let frame = options
                        .frame
                        .child(item.clone())
                        .with_data("index", Value::from(index))
                        .with_data("first", Value::Bool(index == 0))
                        .with_data("last", Value::Bool(index == last))
                        .with_block_params(options.block_params, vec![item, Value::from(index)]);
                    options.render_template(writer, &frame)?;
                }
                Ok(())
            }
            Value::Object(entries) if !entries.is_empty() => {
                let last = entries.len() - 1;
                for (index, (key, item)) in entries.into_iter().enumerate() {
                    let frame = options
                        .frame
                        .child(item.clone())
                        .with_data("key", Value::String(key.clone()))
                        .with_data("index", Value::from(index))
                        .with_data("first", Value::Bool(index == 0))
                        .with_data("last", Value::Bool(index == last))
                        .with_block_params(options.block_params, vec![item, Value::String(key)]);
                    options.render_template(writer, &frame)?;
                }
                Ok(())
            }
            _ => options.render_inverse(writer, options.frame),
        }
    }
}

struct IfHelper {
    negate: bool,
}

impl BlockHelper for IfHelper {
    fn invoke(
        &self,
        writer: &mut EncodedWriter,
        options: &BlockHelperOptions<'_>,
        _context: &CallContext<'_>,
        arguments: &Arguments,
    ) -> Result<(), RenderError> {
        let condition = arguments.get(0).map(is_truthy).unwrap_or(false);
        if condition != self.negate {
            options.render_template(writer, options.frame)
        } else {
            options.render_inverse(writer, options.frame)
        }
    }
}

struct WithHelper;

impl BlockHelper for WithHelper {
    fn invoke(
        &self,
        writer: &mut EncodedWriter,
        options: &BlockHelperOptions<'_>,
        _context: &CallContext<'_>,
        arguments: &Arguments,
    ) -> Result<(), RenderError> {
        match arguments.get(0) {
            Some(value) if is_truthy(value) => {
                let frame = options
                    .frame
                    .child(value.clone())
                    .with_block_params(options.block_params, vec![value.clone()]);
                options.render_template(writer, &frame)
            }
            _ => options.render_inverse(writer, options.frame),
        }
    }
}

/// Registers its body on the raw binding context so later `{{> name}}`
/// calls in the same scope can render it.
struct InlinePartialHelper;

impl BlockHelper for InlinePartialHelper {
    fn invoke(
        &self,
        _writer: &mut EncodedWriter,
        options: &BlockHelperOptions<'_>,
        context: &CallContext<'_>,
        arguments: &Arguments,
    ) -> Result<(), RenderError> {
        let Some(Value::String(name)) = arguments.get(0) else {
            return Err(RenderError::helper(
                INLINE_PARTIAL,
                helper_error(INLINE_PARTIAL, "register", "expected a partial name string"),
            ));
        };
        let Some(frame) = context.context.as_frame() else {
            return Err(RenderError::helper(
                INLINE_PARTIAL,
                helper_error(INLINE_PARTIAL, "register", "requires the binding context"),
            ));
        };
        frame.register_inline_partial(name, options.template.clone());
        Ok(())
    }
}
