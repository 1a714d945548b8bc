//! Named configuration values and the placeholders that back them.

use std::fmt;

use serde::Serialize;
use serde_json::{json, Value};

use super::deferred::Deferred;

/// Display value used for sensitive settings
pub const REDACTED: &str = "******";

/// Where a setting's value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SettingSource {
    /// Found in the context store
    ExplicitContext,

    /// A placeholder with this id was already declared in the graph
    ExistingPlaceholder,

    /// A placeholder was declared by this resolution
    NewlyCreatedPlaceholder,
}

impl fmt::Display for SettingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingSource::ExplicitContext => write!(f, "context"),
            SettingSource::ExistingPlaceholder => write!(f, "existing placeholder"),
            SettingSource::NewlyCreatedPlaceholder => write!(f, "new placeholder"),
        }
    }
}

/// Static definition of a setting the resolver knows how to fall back for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingDef {
    /// Flat context key and placeholder id
    pub id: &'static str,

    /// Description carried by the placeholder
    pub description: &'static str,

    /// Never echo the placeholder's value
    pub sensitive: bool,
}

/// A resolved configuration value
#[derive(Clone, PartialEq, Eq)]
pub struct LogicalSetting {
    pub id: String,
    pub value: Deferred<String>,
    pub source: SettingSource,
    pub sensitive: bool,
}

impl LogicalSetting {
    /// Value safe to print or log
    pub fn display_value(&self) -> String {
        if self.sensitive {
            REDACTED.to_string()
        } else {
            self.value.interpolate()
        }
    }
}

impl fmt::Debug for LogicalSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogicalSetting")
            .field("id", &self.id)
            .field("value", &self.display_value())
            .field("source", &self.source)
            .finish()
    }
}

/// A deploy-time placeholder declared in the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub id: String,
    pub description: String,
    pub no_echo: bool,
    pub default: Option<String>,
    pub allowed_values: Vec<String>,
}

impl Parameter {
    /// A string parameter with no default
    pub fn string(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            no_echo: false,
            default: None,
            allowed_values: Vec::new(),
        }
    }

    /// Mark the parameter value as never echoed
    pub fn no_echo(mut self, no_echo: bool) -> Self {
        self.no_echo = no_echo;
        self
    }

    /// Set a default value
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Restrict the accepted values
    pub fn with_allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// The parameter's value as seen by declarations
    pub fn value(&self) -> Deferred<String> {
        Deferred::Pending(self.id.clone())
    }

    /// Render the template `Parameters` entry
    pub fn to_template(&self) -> Value {
        let mut entry = json!({
            "Type": "String",
            "Description": self.description,
        });
        if self.no_echo {
            entry["NoEcho"] = json!(true);
        }
        if let Some(ref default) = self.default {
            entry["Default"] = json!(default);
        }
        if !self.allowed_values.is_empty() {
            entry["AllowedValues"] = json!(self.allowed_values);
        }
        entry
    }
}
