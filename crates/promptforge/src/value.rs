//! Closed value model for template bindings
//!
//! Bindings are a tagged union rather than free-form JSON so the renderer can
//! pattern-match exhaustively instead of duck-typing at runtime.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value bound to a template variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    String(String),
    Sequence(Vec<Value>),
    Mapping(BTreeMap<String, Value>),
}

/// Variable name → value map supplied by the caller for one render.
pub type Bindings = BTreeMap<String, Value>;

impl Value {
    /// Truthiness used by `{{#if}}` guards: false, zero, empty string,
    /// empty sequence and empty mapping are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Sequence(items) => !items.is_empty(),
            Value::Mapping(map) => !map.is_empty(),
        }
    }

    /// Stringified form used by `{{name}}` interpolation.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => {
                // Whole numbers print without a trailing ".0"
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 9e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Value::String(s) => s.clone(),
            Value::Sequence(_) | Value::Mapping(_) => {
                serde_json::to_string(self).unwrap_or_default()
            }
        }
    }

    /// Walk a dotted path into nested mappings, e.g. `user.name`.
    pub fn get_path(&self, segments: &[&str]) -> Option<&Value> {
        let mut current = self;
        for segment in segments {
            match current {
                Value::Mapping(map) => current = map.get(*segment)?,
                _ => return None,
            }
        }
        Some(current)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(items)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            // JSON null carries no content; treat it as a falsy signal
            serde_json::Value::Null => Value::Bool(false),
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Mapping(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            ),
        }
    }
}

/// Convert a JSON object into bindings. Returns `None` when the value is not
/// an object, since bindings are always a name → value map.
pub fn bindings_from_json(json: serde_json::Value) -> Option<Bindings> {
    match json {
        serde_json::Value::Object(map) => Some(
            map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
        ),
        _ => None,
    }
}
