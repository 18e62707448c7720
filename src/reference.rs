//! JSON Reference nodes.
//!
//! A value is classified once into a [`Node`] and the crawlers match on
//! that, instead of probing for a `$ref` key at every step.

use serde_json::{Map, Value};

/// The key that marks an object as a JSON Reference.
pub const REF_KEY: &str = "$ref";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A document value as seen by the crawlers.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    /// An object carrying a non-empty string `$ref`.
    Ref(Reference<'a>),
    Object(&'a Map<String, Value>),
    Array(&'a [Value]),
    Scalar(&'a Value),
}

impl<'a> Node<'a> {
    pub fn of(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => match map.get(REF_KEY) {
                Some(Value::String(target)) if !target.is_empty() => {
                    Node::Ref(Reference { target, node: map })
                }
                _ => Node::Object(map),
            },
            Value::Array(items) => Node::Array(items),
            other => Node::Scalar(other),
        }
    }
}

/// A `{"$ref": "...", ...extensions}` object.
#[derive(Debug, Clone, Copy)]
pub struct Reference<'a> {
    target: &'a str,
    node: &'a Map<String, Value>,
}

impl<'a> Reference<'a> {
    /// The raw `$ref` string.
    pub fn target(&self) -> &'a str {
        self.target
    }

    /// The whole reference object, `$ref` included.
    pub fn node(&self) -> &'a Map<String, Value> {
        self.node
    }

    /// A reference that only points into the document containing it.
    pub fn is_internal(&self) -> bool {
        self.target.starts_with('#')
    }

    /// Extended references carry keys besides `$ref`.
    pub fn is_extended(&self) -> bool {
        self.node.len() > 1
    }

    /// Keys other than `$ref`, in document order.
    pub fn extensions(&self) -> impl Iterator<Item = (&'a String, &'a Value)> {
        self.node.iter().filter(|(key, _)| key.as_str() != REF_KEY)
    }

    /// The value this reference stands for once its target is known.
    ///
    /// Plain references are replaced by the target outright. Extended
    /// references over an object target yield the extension keys first,
    /// followed by the target's keys the extensions do not override.
    pub fn merge(&self, resolved: &Value) -> Value {
        match resolved {
            Value::Object(target) if self.is_extended() => {
                let mut merged: Map<String, Value> = self
                    .extensions()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                for (key, value) in target {
                    if !merged.contains_key(key) {
                        merged.insert(key.clone(), value.clone());
                    }
                }
                Value::Object(merged)
            }
            _ => resolved.clone(),
        }
    }

    /// A copy of the reference object pointing at `target` instead.
    pub fn retarget(&self, target: impl Into<String>) -> Value {
        let mut node = self.node.clone();
        node.insert(REF_KEY.to_string(), Value::String(target.into()));
        Value::Object(node)
    }
}
