//! Topic reference resolution and caching.
//!
//! Topics can be referenced by bare name, by fully-qualified ARN, or by an
//! already-resolved handle. All spellings of one physical topic normalize to
//! the same canonical ARN and resolve to the same cached handle, so a graph
//! never imports one topic twice.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::domain::Deferred;

use super::error::{DeclarationError, DeclarationResult};
use super::hash::{short_id, DEFAULT_SHORT_ID_BYTES};
use super::stack::Environment;

static TOPIC_ARN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^arn:(aws|aws-cn|aws-us-gov):sns:[a-z]{2}(-gov)?-[a-z]{4,10}-\d:\d{12}:([a-zA-Z0-9_-]{3,256}(\.fifo)?)$",
    )
    .expect("hard-coded regular expression to be valid")
});

/// Longest topic name, `.fifo` suffix included
pub const MAX_TOPIC_NAME_LEN: usize = 256;

static TOPIC_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_-]{3,256}(\.fifo)?$").expect("hard-coded regular expression to be valid")
});

/// Canonical handle to a pub/sub topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicReference {
    /// Declaration key of the imported topic
    pub logical_id: String,

    /// Fully-qualified identifier (pending when bound to a placeholder)
    pub arn: Deferred<String>,

    /// Whether region/account are left to deploy time
    pub account_agnostic: bool,

    /// FIFO topic
    pub fifo: bool,
}

impl TopicReference {
    /// Bind a deploy-time value without validation
    pub fn external(logical_id: impl Into<String>, arn: Deferred<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            arn,
            account_agnostic: true,
            fifo: false,
        }
    }

    /// Canonical ARN, with `${...}` references for deploy-time parts
    pub fn canonical_arn(&self) -> String {
        self.arn.interpolate()
    }

    /// Topic name (last ARN segment)
    pub fn topic_name(&self) -> String {
        match self.arn {
            Deferred::Known(ref arn) => arn.rsplit(':').next().unwrap_or(arn).to_string(),
            Deferred::Pending(_) => self.arn.interpolate(),
        }
    }
}

/// A topic reference as given by a caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicRef {
    /// A bare topic name or a topic ARN
    Raw(String),

    /// A handle that was already resolved
    Resolved(Rc<TopicReference>),
}

impl From<&str> for TopicRef {
    fn from(value: &str) -> Self {
        TopicRef::Raw(value.to_string())
    }
}

impl From<String> for TopicRef {
    fn from(value: String) -> Self {
        TopicRef::Raw(value)
    }
}

impl From<Rc<TopicReference>> for TopicRef {
    fn from(value: Rc<TopicReference>) -> Self {
        TopicRef::Resolved(value)
    }
}

/// Normalize a topic name or ARN to its canonical ARN.
///
/// Bare names are expanded with the environment's region and account, or with
/// deploy-time pseudo references when `account_agnostic` is set or the
/// environment leaves them unspecified.
pub fn canonical_topic_arn(
    env: &Environment,
    reference: &str,
    account_agnostic: bool,
) -> DeclarationResult<String> {
    if let Some(caps) = TOPIC_ARN.captures(reference) {
        if caps[3].len() <= MAX_TOPIC_NAME_LEN {
            return Ok(reference.to_string());
        }
        return Err(DeclarationError::InvalidReferenceFormat {
            reference: reference.to_string(),
        });
    }

    if reference.len() > MAX_TOPIC_NAME_LEN || !TOPIC_NAME.is_match(reference) {
        return Err(DeclarationError::InvalidReferenceFormat {
            reference: reference.to_string(),
        });
    }

    let (region, account) = if account_agnostic {
        (Environment::PSEUDO_REGION.to_string(), Environment::PSEUDO_ACCOUNT.to_string())
    } else {
        (env.region_or_pseudo(), env.account_or_pseudo())
    };

    Ok(format!("arn:aws:sns:{}:{}:{}", region, account, reference))
}

/// Graph-scoped cache of resolved topic handles, keyed by canonical ARN
#[derive(Debug, Default)]
pub struct TopicCache {
    topics: HashMap<String, Rc<TopicReference>>,
}

impl TopicCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a topic reference to its canonical handle.
    ///
    /// Resolved handles are returned unchanged. Raw strings are normalized and
    /// looked up by canonical ARN; a new handle is materialized only on the
    /// first request for that ARN.
    pub fn resolve(
        &mut self,
        env: &Environment,
        reference: TopicRef,
        account_agnostic: bool,
    ) -> DeclarationResult<Rc<TopicReference>> {
        let raw = match reference {
            TopicRef::Resolved(handle) => return Ok(handle),
            TopicRef::Raw(raw) => raw,
        };

        let arn = canonical_topic_arn(env, &raw, account_agnostic)?;

        if let Some(existing) = self.topics.get(&arn) {
            debug!(reference = %raw, %arn, "Topic reference served from cache");
            return Ok(Rc::clone(existing));
        }

        let handle = Rc::new(TopicReference {
            logical_id: short_id(&arn, DEFAULT_SHORT_ID_BYTES),
            fifo: arn.ends_with(".fifo"),
            account_agnostic: account_agnostic || arn.contains(Environment::PSEUDO_REGION),
            arn: Deferred::Known(arn.clone()),
        });
        debug!(reference = %raw, %arn, logical_id = %handle.logical_id, "Imported topic");

        self.topics.insert(arn, Rc::clone(&handle));
        Ok(handle)
    }

    /// Look up a cached handle by canonical ARN
    pub fn get(&self, arn: &str) -> Option<Rc<TopicReference>> {
        self.topics.get(arn).cloned()
    }

    /// Number of distinct topics imported
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}
