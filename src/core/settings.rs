//! Configuration resolution with layered precedence.
//!
//! A setting is resolved, in order, from:
//! 1. A placeholder with the same id already declared in the graph
//! 2. The context store (nested group objects before flat keys)
//! 3. A newly declared placeholder, filled in at deploy time
//!
//! Resolution never fails. Repeated resolution of one id never declares a
//! second placeholder.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::{Deferred, LogicalSetting, Parameter, SettingDef, SettingSource};

/// Name or ARN of the source topic
pub const SOURCE_TOPIC: SettingDef = SettingDef {
    id: "SourceSNSTopic",
    description: "The name or ARN of the SNS topic that will be used as the source for the pipe.",
    sensitive: false,
};

pub const MESSAGE_TITLE: SettingDef = SettingDef {
    id: "GoogleChatMessageTitle",
    description: "The title used on the Google Chat message that is sent.",
    sensitive: false,
};

pub const MESSAGE_ICON: SettingDef = SettingDef {
    id: "GoogleChatMessageIcon",
    description: "The icon used on the Google Chat message that is sent.",
    sensitive: false,
};

pub const SPACE_LABEL: SettingDef = SettingDef {
    id: "GoogleChatSpaceLabel",
    description: "The label for the Google Chat space to send messages to (e.g. \"Alerts\").",
    sensitive: false,
};

/// Webhook URL; carries the key and token query parameters
pub const SPACE_ENDPOINT: SettingDef = SettingDef {
    id: "GoogleChatSpaceEndpoint",
    description: "The endpoint of the Google Chat space to send messages to that includes key and token query parameters (e.g. https://chat.googleapis.com/v1/spaces/AAAA/messages?key=KEY&token=TOKEN).",
    sensitive: true,
};

/// Context key of the nested chat configuration object
pub const CHAT_CONFIG_KEY: &str = "GoogleChatConfig";

/// External declarative context: nested objects and flat keys
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextStore {
    values: Map<String, Value>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Set a value, replacing any existing one
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Merge `other` over this store
    pub fn merge(&mut self, other: ContextStore) {
        self.values.extend(other.values);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Follow a path of object keys
    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.values.get(*first)?, |value, key| value.get(*key))
    }

    /// Flat string lookup; empty strings count as absent
    pub fn get_str(&self, key: &str) -> Option<String> {
        scalar_to_string(self.values.get(key)?).filter(|s| !s.is_empty())
    }

    /// Boolean lookup accepting `true` or `"true"`
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// List lookup accepting an array or a comma-separated string
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        match self.values.get(key)? {
            Value::Array(items) => Some(items.iter().filter_map(scalar_to_string).collect()),
            Value::String(s) => Some(
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            ),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Graph-scoped resolver owning the context store and the declared placeholders
#[derive(Debug, Default)]
pub struct SettingResolver {
    context: ContextStore,
    placeholders: Vec<Parameter>,
    index: HashMap<String, usize>,
}

impl SettingResolver {
    pub fn new(context: ContextStore) -> Self {
        Self {
            context,
            ..Default::default()
        }
    }

    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    /// Resolve a single setting
    pub fn resolve(&mut self, def: &SettingDef) -> LogicalSetting {
        let (value, source) = if let Some(existing) = self.placeholder(def.id) {
            (existing.value(), SettingSource::ExistingPlaceholder)
        } else if let Some(value) = self.context.get_str(def.id) {
            (Deferred::Known(value), SettingSource::ExplicitContext)
        } else {
            let param = Parameter::string(def.id, def.description).no_echo(def.sensitive);
            (self.declare(param), SettingSource::NewlyCreatedPlaceholder)
        };

        let setting = LogicalSetting {
            id: def.id.to_string(),
            value,
            source,
            sensitive: def.sensitive,
        };
        debug!(id = %setting.id, source = %setting.source, value = %setting.display_value(), "Resolved setting");
        setting
    }

    /// Resolve a setting that may also live in a nested context object.
    ///
    /// An already declared placeholder still wins. Otherwise a member present
    /// at `path` is kept as given, and the flat resolution of
    /// [`resolve`](Self::resolve) applies to the rest.
    pub fn resolve_nested(&mut self, path: &[&str], def: &SettingDef) -> LogicalSetting {
        if self.placeholder(def.id).is_some() {
            return self.resolve(def);
        }
        match self.context.get_path(path).and_then(scalar_to_string) {
            Some(value) => {
                let setting = LogicalSetting {
                    id: def.id.to_string(),
                    value: Deferred::Known(value),
                    source: SettingSource::ExplicitContext,
                    sensitive: def.sensitive,
                };
                debug!(id = %setting.id, path = %path.join("."), value = %setting.display_value(), "Resolved nested setting");
                setting
            }
            None => self.resolve(def),
        }
    }

    /// Resolve a group of settings as a unit.
    ///
    /// `members` pairs each member key inside the group object at `group` with
    /// its flat definition. If the group object is absent every member falls
    /// back to flat resolution; if present, only its missing members do.
    pub fn resolve_group(&mut self, group: &[&str], members: &[(&str, SettingDef)]) -> Vec<LogicalSetting> {
        let present = self.context.get_path(group).is_some_and(Value::is_object);
        members
            .iter()
            .map(|(key, def)| {
                if present {
                    let mut path = group.to_vec();
                    path.push(*key);
                    self.resolve_nested(&path, def)
                } else {
                    self.resolve(def)
                }
            })
            .collect()
    }

    /// Declare a placeholder, returning the existing one's value if the id is taken
    pub fn declare(&mut self, param: Parameter) -> Deferred<String> {
        if let Some(existing) = self.placeholder(&param.id) {
            return existing.value();
        }
        debug!(id = %param.id, no_echo = param.no_echo, "Declared placeholder");
        let value = param.value();
        self.index.insert(param.id.clone(), self.placeholders.len());
        self.placeholders.push(param);
        value
    }

    /// A declared placeholder by id
    pub fn placeholder(&self, id: &str) -> Option<&Parameter> {
        self.index.get(id).map(|&i| &self.placeholders[i])
    }

    /// Declared placeholders in declaration order
    pub fn placeholders(&self) -> &[Parameter] {
        &self.placeholders
    }
}

/// Destination space settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceConfig {
    pub label: LogicalSetting,
    pub endpoint: LogicalSetting,
}

/// Chat message and destination settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub message_title: LogicalSetting,
    pub message_icon: LogicalSetting,
    pub space: SpaceConfig,
}

impl ChatConfig {
    /// Resolve from the `GoogleChatConfig` object, flat keys, or placeholders
    pub fn resolve(resolver: &mut SettingResolver) -> Self {
        let message_title = resolver.resolve_nested(&[CHAT_CONFIG_KEY, "MessageTitle"], &MESSAGE_TITLE);
        let message_icon = resolver.resolve_nested(&[CHAT_CONFIG_KEY, "MessageIcon"], &MESSAGE_ICON);

        let mut space = resolver
            .resolve_group(
                &[CHAT_CONFIG_KEY, "Space"],
                &[("Label", SPACE_LABEL), ("Endpoint", SPACE_ENDPOINT)],
            )
            .into_iter();

        // resolve_group returns one setting per member, in order
        let label = space.next().unwrap_or_else(|| resolver.resolve(&SPACE_LABEL));
        let endpoint = space.next().unwrap_or_else(|| resolver.resolve(&SPACE_ENDPOINT));

        Self {
            message_title,
            message_icon,
            space: SpaceConfig { label, endpoint },
        }
    }

    /// All settings, for display
    pub fn settings(&self) -> [&LogicalSetting; 4] {
        [
            &self.message_title,
            &self.message_icon,
            &self.space.label,
            &self.space.endpoint,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(value: Value) -> ContextStore {
        match value {
            Value::Object(map) => ContextStore::from_map(map),
            _ => panic!("context must be an object"),
        }
    }

    #[test]
    fn test_repeated_resolution_declares_one_placeholder() {
        let mut resolver = SettingResolver::new(ContextStore::new());

        let first = resolver.resolve(&MESSAGE_TITLE);
        let second = resolver.resolve(&MESSAGE_TITLE);

        assert_eq!(first.value, second.value);
        assert_eq!(first.source, SettingSource::NewlyCreatedPlaceholder);
        assert_eq!(second.source, SettingSource::ExistingPlaceholder);
        assert_eq!(resolver.placeholders().len(), 1);
    }

    #[test]
    fn test_flat_context_wins_over_new_placeholder() {
        let mut resolver = SettingResolver::new(context(json!({ "GoogleChatMessageTitle": "ProjectA" })));

        let title = resolver.resolve(&MESSAGE_TITLE);
        assert_eq!(title.value, Deferred::Known("ProjectA".to_string()));
        assert_eq!(title.source, SettingSource::ExplicitContext);
        assert!(resolver.placeholders().is_empty());
    }

    #[test]
    fn test_empty_flat_value_is_absent() {
        let mut resolver = SettingResolver::new(context(json!({ "GoogleChatMessageTitle": "" })));
        let title = resolver.resolve(&MESSAGE_TITLE);
        assert!(title.value.is_pending());
    }

    #[test]
    fn test_existing_placeholder_wins_over_context() {
        let mut resolver = SettingResolver::new(context(json!({ "GoogleChatMessageIcon": "icon.png" })));
        resolver.declare(Parameter::string("GoogleChatMessageIcon", "declared elsewhere"));

        let icon = resolver.resolve(&MESSAGE_ICON);
        assert_eq!(icon.source, SettingSource::ExistingPlaceholder);
        assert!(icon.value.is_pending());
    }

    #[test]
    fn test_nested_before_flat() {
        let mut resolver = SettingResolver::new(context(json!({
            "GoogleChatConfig": { "MessageTitle": "Nested" },
            "GoogleChatMessageTitle": "Flat",
        })));

        let title = resolver.resolve_nested(&[CHAT_CONFIG_KEY, "MessageTitle"], &MESSAGE_TITLE);
        assert_eq!(title.value, Deferred::Known("Nested".to_string()));
    }

    #[test]
    fn test_existing_placeholder_wins_over_nested_context() {
        let mut resolver = SettingResolver::new(context(json!({
            "GoogleChatConfig": { "MessageTitle": "Nested" },
        })));
        resolver.declare(Parameter::string("GoogleChatMessageTitle", "declared elsewhere"));

        let title = resolver.resolve_nested(&[CHAT_CONFIG_KEY, "MessageTitle"], &MESSAGE_TITLE);
        assert_eq!(title.source, SettingSource::ExistingPlaceholder);
        assert_eq!(title.value, Deferred::Pending("GoogleChatMessageTitle".to_string()));
        assert_eq!(resolver.placeholders().len(), 1);
    }

    #[test]
    fn test_group_merges_missing_members() {
        let mut resolver = SettingResolver::new(context(json!({ "Space": { "Label": "A" } })));

        let space = resolver.resolve_group(&["Space"], &[("Label", SPACE_LABEL), ("Endpoint", SPACE_ENDPOINT)]);

        assert_eq!(space[0].value, Deferred::Known("A".to_string()));
        assert_eq!(space[0].source, SettingSource::ExplicitContext);
        assert_eq!(space[1].value, Deferred::Pending("GoogleChatSpaceEndpoint".to_string()));
        assert_eq!(space[1].source, SettingSource::NewlyCreatedPlaceholder);

        let endpoint = resolver.placeholder("GoogleChatSpaceEndpoint").unwrap();
        assert!(endpoint.no_echo);
        assert_eq!(resolver.placeholders().len(), 1);
    }

    #[test]
    fn test_absent_group_creates_all_members() {
        let mut resolver = SettingResolver::new(ContextStore::new());
        let space = resolver.resolve_group(&["Space"], &[("Label", SPACE_LABEL), ("Endpoint", SPACE_ENDPOINT)]);

        assert!(space.iter().all(|s| s.source == SettingSource::NewlyCreatedPlaceholder));
        assert_eq!(resolver.placeholders().len(), 2);
    }

    #[test]
    fn test_chat_config_from_flat_keys() {
        let mut resolver = SettingResolver::new(context(json!({
            "GoogleChatMessageTitle": "ProjectA",
            "GoogleChatMessageIcon": "https://projecta.com/favicon.png",
            "GoogleChatSpaceLabel": "ProjectA_Alerts",
            "GoogleChatSpaceEndpoint": "https://chat.googleapis.com/v1/spaces/A/messages?key=k&token=t",
        })));

        let config = ChatConfig::resolve(&mut resolver);
        assert_eq!(config.space.label.value, Deferred::Known("ProjectA_Alerts".to_string()));
        assert!(config.space.endpoint.sensitive);
        assert!(config.settings().iter().all(|s| s.source == SettingSource::ExplicitContext));
        assert!(resolver.placeholders().is_empty());
    }

    #[test]
    fn test_context_list_and_bool() {
        let store = context(json!({ "States": "OK, ALARM", "List": ["OK"], "On": "true", "Off": false }));

        assert_eq!(store.get_list("States"), Some(vec!["OK".to_string(), "ALARM".to_string()]));
        assert_eq!(store.get_list("List"), Some(vec!["OK".to_string()]));
        assert_eq!(store.get_bool("On"), Some(true));
        assert_eq!(store.get_bool("Off"), Some(false));
        assert_eq!(store.get_bool("Missing"), None);
    }
}
