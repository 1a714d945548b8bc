//! Values that may only be known at deploy time.
//!
//! A setting that is not present in the context store is backed by a stack
//! parameter. Its value is not known while the graph is being declared, so it
//! travels through the declarations as `Deferred::Pending` and is rendered as a
//! reference in the synthesized template.

use serde_json::{json, Value};

/// Identifier of a deploy-time placeholder (a stack parameter)
pub type PlaceholderId = String;

/// A value that is either known now or supplied at deploy time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deferred<T> {
    /// Resolved at declaration time
    Known(T),

    /// Resolved at deploy time from the named placeholder
    Pending(PlaceholderId),
}

impl<T> Deferred<T> {
    /// Whether the value is only available at deploy time
    pub fn is_pending(&self) -> bool {
        matches!(self, Deferred::Pending(_))
    }

    /// The known value, if any
    pub fn known(&self) -> Option<&T> {
        match self {
            Deferred::Known(value) => Some(value),
            Deferred::Pending(_) => None,
        }
    }
}

impl Deferred<String> {
    /// Render as a string usable inside other strings.
    ///
    /// Pending values become `${PlaceholderId}` so the enclosing string can be
    /// rendered with [`render_str`].
    pub fn interpolate(&self) -> String {
        match self {
            Deferred::Known(value) => value.clone(),
            Deferred::Pending(id) => format!("${{{}}}", id),
        }
    }

    /// Render into a template value
    pub fn render(&self) -> Value {
        match self {
            Deferred::Known(value) => render_str(value),
            Deferred::Pending(id) => reference(id),
        }
    }
}

impl From<&str> for Deferred<String> {
    fn from(value: &str) -> Self {
        Deferred::Known(value.to_string())
    }
}

impl From<String> for Deferred<String> {
    fn from(value: String) -> Self {
        Deferred::Known(value)
    }
}

/// Whether a string carries `${...}` references that resolve at deploy time
pub fn is_unresolved(value: &str) -> bool {
    value.contains("${")
}

/// Render a string, substituting embedded `${...}` references at deploy time
pub fn render_str(value: &str) -> Value {
    if is_unresolved(value) {
        json!({ "Fn::Sub": value })
    } else {
        Value::String(value.to_string())
    }
}

/// Reference to a parameter or to the primary identifier of a resource
pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// Reference to an attribute of a declared resource
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}
