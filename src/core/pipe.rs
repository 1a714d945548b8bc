//! Topic-to-webhook pipeline composition.
//!
//! Pipes cannot read from a topic directly, so every pipeline gets its own
//! intermediary queue subscribed to the source topic:
//!
//! ```text
//! topic -> (filtered subscription) -> queue -> pipe (input template) -> API destination
//! ```
//!
//! The queue belongs to exactly one pipeline and is never shared or looked up.

use std::rc::Rc;

use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::domain::deferred::{get_att, is_unresolved};
use crate::domain::{
    Deferred, DesiredState, FilterPolicyScope, Pipe, Queue, QueuePolicy, Resource, Role, Subscription,
    Suppression,
};

use super::destination::ApiDestinationHandle;
use super::error::{DeclarationError, DeclarationResult};
use super::stack::{logical_id_for, Stack};
use super::templates::TRANSFORM_SQS_BODY_SNS_RAW;
use super::topics::{TopicRef, TopicReference};

/// Filter policy applied to a subscription
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionFilter {
    /// Evaluated against message attributes
    Attributes(Value),

    /// Evaluated against the JSON message body
    MessageBody(Value),
}

impl SubscriptionFilter {
    /// Match messages whose body carries `attribute`
    pub fn body_attribute_exists(attribute: &str) -> Self {
        SubscriptionFilter::MessageBody(json!({ attribute: [{ "exists": true }] }))
    }
}

/// Caller-supplied subscription settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionOptions {
    /// Deliver the message without the topic envelope (default `true`)
    pub raw_message_delivery: Option<bool>,
    pub filter: Option<SubscriptionFilter>,
    pub dead_letter_queue_arn: Option<Deferred<String>>,
}

/// Source side of a pipeline
#[derive(Debug, Clone)]
pub struct PipeSource {
    /// Topic name, ARN, handle, or a deploy-time placeholder
    pub topic: Deferred<TopicRef>,
    pub subscription: SubscriptionOptions,

    /// Expand bare topic names with deploy-time region and account
    pub account_agnostic: bool,
}

impl PipeSource {
    pub fn new(topic: Deferred<TopicRef>) -> Self {
        Self {
            topic,
            subscription: SubscriptionOptions::default(),
            account_agnostic: false,
        }
    }
}

/// A destination bound to the transformation applied before delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiDestinationTarget {
    pub destination: ApiDestinationHandle,
    pub input_template: String,
}

impl ApiDestinationTarget {
    /// Bind a destination, extracting the raw message when no template is given
    pub fn new(destination: ApiDestinationHandle, input_template: Option<String>) -> Self {
        Self {
            destination,
            input_template: input_template.unwrap_or_else(|| TRANSFORM_SQS_BODY_SNS_RAW.to_string()),
        }
    }

    /// Deploy-time reference to the target ARN
    pub fn target_arn(&self) -> String {
        self.destination.arn()
    }
}

/// Target side of a pipeline
#[derive(Debug, Clone)]
pub enum PipeTarget {
    /// Used as given
    Bound(ApiDestinationTarget),

    /// Wrapped with `input_template`, or the raw message extraction
    Destination {
        destination: ApiDestinationHandle,
        input_template: Option<String>,
    },
}

/// Optional pipe settings
#[derive(Debug, Clone, Default)]
pub struct PipeOptions {
    pub name: Option<String>,
    pub desired_state: Option<DesiredState>,
    pub batch_size: Option<u32>,
}

/// Everything needed to compose one pipeline
#[derive(Debug, Clone)]
pub struct PipelineSpecInput {
    /// Construct id; prefixes every declared path
    pub id: String,
    pub source: PipeSource,
    pub target: PipeTarget,
    pub description: Option<String>,
    pub options: PipeOptions,
}

/// A composed pipeline
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    pub id: String,
    pub source: Rc<TopicReference>,
    pub target: ApiDestinationTarget,
    pub description: String,

    /// Template keys of the declared resources
    pub buffer: String,
    pub buffer_policy: String,
    pub subscription: String,
    pub role: String,
    pub pipe: String,

    pub enablement_condition: Option<String>,
}

impl PipelineSpec {
    /// Gate the buffer and the pipe on `condition`.
    ///
    /// Both resources always carry the same condition so the pipeline is
    /// toggled as one unit.
    pub fn add_condition(&mut self, stack: &mut Stack, condition: &str) {
        for logical_id in [&self.pipe, &self.buffer] {
            stack.set_condition(logical_id, condition);
        }
        self.enablement_condition = Some(condition.to_string());
    }
}

/// Resolve the source topic of a pipeline
fn resolve_source(stack: &mut Stack, id: &str, source: &PipeSource) -> DeclarationResult<Rc<TopicReference>> {
    let external = |arn: Deferred<String>| {
        Rc::new(TopicReference::external(logical_id_for(&format!("{}/Source", id)), arn))
    };

    match source.topic {
        Deferred::Pending(ref placeholder) => Ok(external(Deferred::Pending(placeholder.clone()))),
        Deferred::Known(TopicRef::Raw(ref raw)) if is_unresolved(raw) => Ok(external(Deferred::Known(raw.clone()))),
        Deferred::Known(ref reference) => stack.resolve_topic(reference.clone(), source.account_agnostic),
    }
}

/// Compose a pipeline into `stack`
#[instrument(skip(stack, input), fields(pipe = %input.id))]
pub fn compose(stack: &mut Stack, input: PipelineSpecInput) -> DeclarationResult<PipelineSpec> {
    let PipelineSpecInput {
        id,
        source,
        target,
        description,
        options,
    } = input;

    let raw_message_delivery = source.subscription.raw_message_delivery.unwrap_or(true);

    let topic = resolve_source(stack, &id, &source)?;

    let (target, target_name) = match target {
        PipeTarget::Bound(bound) => {
            let name = bound.target_arn();
            (bound, name)
        }
        PipeTarget::Destination {
            destination,
            input_template,
        } => {
            let name = destination.name();
            (ApiDestinationTarget::new(destination, input_template), name)
        }
    };

    let paths = [
        format!("{}/Queue", id),
        format!("{}/Queue/Policy", id),
        format!("{}/Queue/Subscription", id),
        format!("{}/Pipe/Role", id),
        format!("{}/Pipe", id),
    ];
    // Nothing is declared unless every path is free
    if let Some(taken) = paths.iter().find(|path| stack.is_declared(path)) {
        return Err(DeclarationError::DuplicateConstruct { path: taken.clone() });
    }
    let [queue_path, policy_path, subscription_path, role_path, pipe_path] = paths;

    let buffer = stack.add_resource(
        queue_path,
        Resource::Queue(Queue {
            managed_encryption: true,
        }),
    )?;
    if let Some(declared) = stack.resource_mut(&buffer) {
        declared.suppressions.push(Suppression {
            id: "AwsSolutions-SQS3".to_string(),
            reason: "The queue only buffers deliveries for a pipe and is not a dead-letter queue".to_string(),
        });
    }

    let buffer_policy = stack.add_resource(
        policy_path,
        Resource::QueuePolicy(QueuePolicy {
            queue: buffer.clone(),
            topic_arn: topic.arn.clone(),
            enforce_ssl: true,
        }),
    )?;

    let (filter_policy, filter_policy_scope) = match source.subscription.filter {
        Some(SubscriptionFilter::Attributes(policy)) => (Some(policy), None),
        Some(SubscriptionFilter::MessageBody(policy)) => (Some(policy), Some(FilterPolicyScope::MessageBody)),
        None => (None, None),
    };
    let subscription = stack.add_resource(
        subscription_path,
        Resource::Subscription(Subscription {
            topic_arn: topic.arn.clone(),
            queue: buffer.clone(),
            raw_message_delivery,
            filter_policy,
            filter_policy_scope,
            dead_letter_queue_arn: source.subscription.dead_letter_queue_arn,
        }),
    )?;

    let role = stack.add_resource(
        role_path,
        Resource::Role(Role {
            service_principal: "pipes.amazonaws.com".to_string(),
            statements: vec![
                json!({
                    "Action": ["sqs:ReceiveMessage", "sqs:DeleteMessage", "sqs:GetQueueAttributes"],
                    "Effect": "Allow",
                    "Resource": get_att(&buffer, "Arn"),
                }),
                json!({
                    "Action": "events:InvokeApiDestination",
                    "Effect": "Allow",
                    "Resource": get_att(&target.destination.logical_id, "Arn"),
                }),
            ],
        }),
    )?;

    let description = description
        .unwrap_or_else(|| format!("Forward messages from {} to {}", topic.topic_name(), target_name));

    let pipe = stack.add_resource(
        pipe_path,
        Resource::Pipe(Pipe {
            source_queue: buffer.clone(),
            target: target.destination.logical_id.clone(),
            input_template: target.input_template.clone(),
            description: description.clone(),
            role: role.clone(),
            name: options.name,
            desired_state: options.desired_state,
            batch_size: options.batch_size,
        }),
    )?;

    info!(source = %topic.canonical_arn(), %pipe, "Composed pipeline");

    Ok(PipelineSpec {
        id,
        source: topic,
        target,
        description,
        buffer,
        buffer_policy,
        subscription,
        role,
        pipe,
        enablement_condition: None,
    })
}
