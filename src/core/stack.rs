//! The declaration graph.
//!
//! A `Stack` owns everything one declaration pass builds up: the context
//! store and its placeholders, the topic cache, and the declared resources.
//! Nothing is global, so independent stacks can be declared side by side in
//! one process.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::domain::{Declared, Deferred, LogicalSetting, Parameter, Resource, SettingDef};

use super::error::{DeclarationError, DeclarationResult};
use super::hash::{short_id, DEFAULT_SHORT_ID_BYTES};
use super::settings::{ChatConfig, ContextStore, SettingResolver};
use super::topics::{TopicCache, TopicRef, TopicReference};

/// Longest template key the platform accepts
pub const MAX_LOGICAL_ID_LEN: usize = 255;

/// Deployment target of a stack
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    pub region: Option<String>,
    pub account: Option<String>,
}

impl Environment {
    pub const PSEUDO_REGION: &'static str = "${AWS::Region}";
    pub const PSEUDO_ACCOUNT: &'static str = "${AWS::AccountId}";

    pub fn new(region: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            region: Some(region.into()),
            account: Some(account.into()),
        }
    }

    /// Region and account left to deploy time
    pub fn agnostic() -> Self {
        Self::default()
    }

    pub fn region_or_pseudo(&self) -> String {
        self.region.clone().unwrap_or_else(|| Self::PSEUDO_REGION.to_string())
    }

    pub fn account_or_pseudo(&self) -> String {
        self.account.clone().unwrap_or_else(|| Self::PSEUDO_ACCOUNT.to_string())
    }
}

/// Derive a template key from a construct path.
///
/// Non-alphanumeric characters are dropped. A path with nothing left becomes
/// `Construct` plus a short hash of the path. Keys over the platform limit are
/// truncated and suffixed with a short hash of the full path.
pub fn logical_id_for(path: &str) -> String {
    let id: String = path.chars().filter(char::is_ascii_alphanumeric).collect();
    if id.is_empty() {
        return format!("Construct{}", short_id(path, DEFAULT_SHORT_ID_BYTES));
    }
    if id.len() <= MAX_LOGICAL_ID_LEN {
        return id;
    }
    let suffix = short_id(path, DEFAULT_SHORT_ID_BYTES);
    format!("{}{}", &id[..MAX_LOGICAL_ID_LEN - suffix.len()], suffix)
}

/// A declaration graph and its synthesized template
#[derive(Debug)]
pub struct Stack {
    name: String,
    description: Option<String>,
    env: Environment,
    settings: SettingResolver,
    topics: TopicCache,
    resources: Vec<Declared>,
    by_path: HashMap<String, usize>,
    by_logical_id: HashMap<String, usize>,
    conditions: BTreeMap<String, Value>,
    metadata: BTreeMap<String, String>,
    chat_config: Option<ChatConfig>,
}

impl Stack {
    pub fn new(name: impl Into<String>, env: Environment, context: ContextStore) -> Self {
        Self {
            name: name.into(),
            description: None,
            env,
            settings: SettingResolver::new(context),
            topics: TopicCache::new(),
            resources: Vec::new(),
            by_path: HashMap::new(),
            by_logical_id: HashMap::new(),
            conditions: BTreeMap::new(),
            metadata: BTreeMap::new(),
            chat_config: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn context(&self) -> &ContextStore {
        self.settings.context()
    }

    pub fn settings(&self) -> &SettingResolver {
        &self.settings
    }

    /// Resolve a setting against this graph
    pub fn resolve_setting(&mut self, def: &SettingDef) -> LogicalSetting {
        self.settings.resolve(def)
    }

    /// Declare a placeholder; an existing one with the same id is reused
    pub fn add_parameter(&mut self, param: Parameter) -> Deferred<String> {
        self.settings.declare(param)
    }

    /// The chat configuration, resolved on first access
    pub fn chat_config(&mut self) -> ChatConfig {
        if let Some(ref config) = self.chat_config {
            return config.clone();
        }
        let config = ChatConfig::resolve(&mut self.settings);
        self.chat_config = Some(config.clone());
        config
    }

    /// Resolve a topic reference through the graph's topic cache
    pub fn resolve_topic(
        &mut self,
        reference: impl Into<TopicRef>,
        account_agnostic: bool,
    ) -> DeclarationResult<Rc<TopicReference>> {
        self.topics.resolve(&self.env, reference.into(), account_agnostic)
    }

    pub fn topics(&self) -> &TopicCache {
        &self.topics
    }

    /// Declare a resource at `path`, returning its template key
    pub fn add_resource(&mut self, path: impl Into<String>, resource: Resource) -> DeclarationResult<String> {
        let path = path.into();
        if self.is_declared(&path) {
            return Err(DeclarationError::DuplicateConstruct { path });
        }
        let logical_id = logical_id_for(&path);

        debug!(%path, %logical_id, kind = resource.type_name(), "Declared resource");
        let index = self.resources.len();
        self.by_path.insert(path.clone(), index);
        self.by_logical_id.insert(logical_id.clone(), index);
        self.resources.push(Declared {
            path,
            logical_id: logical_id.clone(),
            resource,
            condition: None,
            suppressions: Vec::new(),
        });
        Ok(logical_id)
    }

    /// Whether `path`, or another path with the same template key, is taken
    pub fn is_declared(&self, path: &str) -> bool {
        self.by_path.contains_key(path) || self.by_logical_id.contains_key(&logical_id_for(path))
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Declared> {
        self.by_logical_id.get(logical_id).map(|&i| &self.resources[i])
    }

    pub fn resource_mut(&mut self, logical_id: &str) -> Option<&mut Declared> {
        self.by_logical_id.get(logical_id).map(|&i| &mut self.resources[i])
    }

    /// Gate a declared resource on a named condition; false if no such resource
    pub fn set_condition(&mut self, logical_id: &str, condition: &str) -> bool {
        match self.resource_mut(logical_id) {
            Some(declared) => {
                declared.condition = Some(condition.to_string());
                true
            }
            None => false,
        }
    }

    pub fn resources(&self) -> &[Declared] {
        &self.resources
    }

    /// Declare a named condition
    pub fn add_condition(&mut self, name: impl Into<String>, expression: Value) -> String {
        let name = name.into();
        self.conditions.insert(name.clone(), expression);
        name
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Render the deployment template
    pub fn synth(&self) -> Value {
        let mut template = Map::new();
        if let Some(ref description) = self.description {
            template.insert("Description".into(), json!(description));
        }
        if !self.metadata.is_empty() {
            template.insert("Metadata".into(), json!(self.metadata));
        }

        let params = self.settings.placeholders();
        if !params.is_empty() {
            let rendered: Map<String, Value> = params.iter().map(|p| (p.id.clone(), p.to_template())).collect();
            template.insert("Parameters".into(), Value::Object(rendered));
        }
        if !self.conditions.is_empty() {
            template.insert("Conditions".into(), json!(self.conditions));
        }

        let resources: Map<String, Value> = self
            .resources
            .iter()
            .map(|r| (r.logical_id.clone(), r.to_template()))
            .collect();
        template.insert("Resources".into(), Value::Object(resources));

        Value::Object(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Queue;

    #[test]
    fn test_logical_id_from_path() {
        assert_eq!(
            logical_id_for("GoogleChat-CloudWatchAlarm-OK/Queue"),
            "GoogleChatCloudWatchAlarmOKQueue"
        );
    }

    #[test]
    fn test_long_logical_id_is_shortened() {
        let path = format!("{}/Queue", "Segment".repeat(50));
        let id = logical_id_for(&path);

        assert_eq!(id.len(), MAX_LOGICAL_ID_LEN);
        assert!(id.ends_with(&short_id(&path, DEFAULT_SHORT_ID_BYTES)));
        assert_eq!(id, logical_id_for(&path));
    }

    #[test]
    fn test_path_without_alphanumerics_gets_hashed_id() {
        let id = logical_id_for("---");
        assert_eq!(id, format!("Construct{}", short_id("---", DEFAULT_SHORT_ID_BYTES)));
        assert_ne!(logical_id_for("警报"), logical_id_for("---"));
    }

    #[test]
    fn test_duplicate_path_is_rejected() {
        let mut stack = Stack::new("Test", Environment::agnostic(), ContextStore::new());
        let queue = || Resource::Queue(Queue { managed_encryption: true });

        stack.add_resource("Pipe/Queue", queue()).unwrap();
        let err = stack.add_resource("Pipe/Queue", queue()).unwrap_err();
        assert_eq!(
            err,
            DeclarationError::DuplicateConstruct {
                path: "Pipe/Queue".to_string()
            }
        );
    }

    #[test]
    fn test_chat_config_is_memoized() {
        let mut stack = Stack::new("Test", Environment::agnostic(), ContextStore::new());

        let first = stack.chat_config();
        let second = stack.chat_config();

        assert_eq!(first, second);
        assert_eq!(stack.settings().placeholders().len(), 4);
    }

    #[test]
    fn test_synth_sections() {
        let mut stack = Stack::new("Test", Environment::agnostic(), ContextStore::new())
            .with_description("test stack");
        stack.add_metadata("repo", "https://example.com/repo");
        stack.add_resource("Pipe/Queue", Resource::Queue(Queue { managed_encryption: true })).unwrap();

        let template = stack.synth();
        assert_eq!(template["Description"], "test stack");
        assert_eq!(template["Metadata"]["repo"], "https://example.com/repo");
        assert_eq!(template["Resources"]["PipeQueue"]["Type"], "AWS::SQS::Queue");
        assert!(template.get("Parameters").is_none());
        assert!(template.get("Conditions").is_none());
    }
}
