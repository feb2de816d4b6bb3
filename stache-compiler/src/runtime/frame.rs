use std::cell::RefCell;
use std::collections::HashMap;

use serde_json::Value;

use crate::ast::PathExpression;
use crate::compiler::CompiledBody;
use crate::config::Configuration;

/// The binding context of a render: the current value plus everything
/// reachable through enclosing frames.
pub struct BindingFrame<'a> {
    configuration: &'a Configuration,
    value: Value,
    parent: Option<&'a BindingFrame<'a>>,
    block_params: HashMap<String, Value>,
    data: HashMap<String, Value>,
    inline_partials: RefCell<HashMap<String, CompiledBody>>,
}

impl<'a> BindingFrame<'a> {
    pub fn root(configuration: &'a Configuration, value: Value) -> Self {
        Self {
            configuration,
            value,
            parent: None,
            block_params: HashMap::new(),
            data: HashMap::new(),
            inline_partials: RefCell::new(HashMap::new()),
        }
    }

    pub fn child<'b>(&'b self, value: Value) -> BindingFrame<'b> {
        BindingFrame {
            configuration: self.configuration,
            value,
            parent: Some(self),
            block_params: HashMap::new(),
            data: HashMap::new(),
            inline_partials: RefCell::new(HashMap::new()),
        }
    }

    /// Binds `names` positionally to `values`; extra names stay unbound.
    pub fn with_block_params(mut self, names: &[String], values: Vec<Value>) -> Self {
        for (name, value) in names.iter().zip(values) {
            self.block_params.insert(name.clone(), value);
        }
        self
    }

    pub fn with_data(mut self, key: &str, value: Value) -> Self {
        self.data.insert(key.to_string(), value);
        self
    }

    pub fn configuration(&self) -> &'a Configuration {
        self.configuration
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn parent(&self) -> Option<&'a BindingFrame<'a>> {
        self.parent
    }

    pub fn root_frame(&self) -> &BindingFrame<'a> {
        let mut frame = self;
        while let Some(parent) = frame.parent {
            frame = parent;
        }
        frame
    }

    pub fn register_inline_partial(&self, name: &str, body: CompiledBody) {
        self.inline_partials
            .borrow_mut()
            .insert(name.to_string(), body);
    }

    /// Inline partials are visible to the frame that registered them and to
    /// every frame nested inside it.
    pub fn inline_partial(&self, name: &str) -> Option<CompiledBody> {
        let mut frame = Some(self);
        while let Some(current) = frame {
            if let Some(body) = current.inline_partials.borrow().get(name) {
                return Some(body.clone());
            }
            frame = current.parent;
        }
        None
    }

    fn ancestor(&self, depth: usize) -> Option<&BindingFrame<'a>> {
        let mut frame = self;
        for _ in 0..depth {
            frame = frame.parent?;
        }
        Some(frame)
    }

    fn block_param(&self, name: &str) -> Option<&Value> {
        let mut frame = Some(self);
        while let Some(current) = frame {
            if let Some(value) = current.block_params.get(name) {
                return Some(value);
            }
            frame = current.parent;
        }
        None
    }

    fn data_value(&self, name: &str) -> Option<Value> {
        if name == "root" {
            return Some(self.root_frame().value.clone());
        }
        let mut frame = Some(self);
        while let Some(current) = frame {
            if let Some(value) = current.data.get(name) {
                return Some(value.clone());
            }
            frame = current.parent;
        }
        None
    }

    /// Resolves `path` against this frame. Block parameters shadow members
    /// of the current value.
    pub fn lookup(&self, path: &PathExpression) -> Option<Value> {
        let frame = self.ancestor(path.depth)?;
        let mut segments = path.segments.iter();

        let base = if path.data {
            let first = segments.next()?;
            frame.data_value(first)?
        } else if path.is_context_reference() {
            return Some(frame.value.clone());
        } else {
            let first = segments.next()?;
            match frame.block_param(first) {
                Some(value) => value.clone(),
                None => member(&frame.value, first)?.clone(),
            }
        };

        let mut current = base;
        for segment in segments {
            current = member(&current, segment)?.clone();
        }
        Some(current)
    }
}

fn member<'v>(value: &'v Value, segment: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get(index)),
        _ => None,
    }
}

/// Falsy values: `false`, `null`, `""`, `0` and `[]`.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(value) => *value,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}
