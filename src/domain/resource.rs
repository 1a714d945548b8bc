//! Resources declared in the graph and their rendering into the synthesized template.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::deferred::{get_att, reference, render_str, Deferred};

/// A lint rule suppression attached to a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suppression {
    pub id: String,
    pub reason: String,
}

/// Where a subscription filter policy is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterPolicyScope {
    MessageAttributes,
    MessageBody,
}

/// Desired running state of a pipe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DesiredState {
    Running,
    Stopped,
}

/// Intermediary buffer queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queue {
    /// SQS-managed server-side encryption
    pub managed_encryption: bool,
}

/// Queue access policy: TLS-only access plus send rights for the source topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePolicy {
    pub queue: String,
    pub topic_arn: Deferred<String>,
    pub enforce_ssl: bool,
}

/// Topic subscription delivering into a queue
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub topic_arn: Deferred<String>,
    pub queue: String,
    pub raw_message_delivery: bool,
    pub filter_policy: Option<Value>,
    pub filter_policy_scope: Option<FilterPolicyScope>,
    pub dead_letter_queue_arn: Option<Deferred<String>>,
}

/// Webhook connection carrying authorization and invocation headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub description: Option<String>,
    pub api_key_name: String,
    pub api_key_value: String,
    pub headers: BTreeMap<String, String>,
}

/// HTTP endpoint invoked through a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiDestination {
    pub connection: String,
    pub endpoint: Deferred<String>,
    pub description: Option<String>,
    pub rate_limit_per_second: Option<u32>,
}

/// Service role assumed by a pipe
#[derive(Debug, Clone, PartialEq)]
pub struct Role {
    pub service_principal: String,
    pub statements: Vec<Value>,
}

/// Forwarding unit from a queue to an API destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipe {
    pub source_queue: String,
    pub target: String,
    pub input_template: String,
    pub description: String,
    pub role: String,
    pub name: Option<String>,
    pub desired_state: Option<DesiredState>,
    pub batch_size: Option<u32>,
}

/// Any resource that can be declared in a graph
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Queue(Queue),
    QueuePolicy(QueuePolicy),
    Subscription(Subscription),
    Connection(Connection),
    ApiDestination(ApiDestination),
    Role(Role),
    Pipe(Pipe),
}

impl Resource {
    /// Template type name
    pub fn type_name(&self) -> &'static str {
        match self {
            Resource::Queue(_) => "AWS::SQS::Queue",
            Resource::QueuePolicy(_) => "AWS::SQS::QueuePolicy",
            Resource::Subscription(_) => "AWS::SNS::Subscription",
            Resource::Connection(_) => "AWS::Events::Connection",
            Resource::ApiDestination(_) => "AWS::Events::ApiDestination",
            Resource::Role(_) => "AWS::IAM::Role",
            Resource::Pipe(_) => "AWS::Pipes::Pipe",
        }
    }

    /// Template `Properties` block
    pub fn properties(&self) -> Value {
        match self {
            Resource::Queue(queue) => json!({ "SqsManagedSseEnabled": queue.managed_encryption }),
            Resource::QueuePolicy(policy) => {
                let queue_arn = get_att(&policy.queue, "Arn");
                let mut statements = Vec::new();
                if policy.enforce_ssl {
                    statements.push(json!({
                        "Action": "sqs:*",
                        "Condition": { "Bool": { "aws:SecureTransport": "false" } },
                        "Effect": "Deny",
                        "Principal": { "AWS": "*" },
                        "Resource": queue_arn,
                    }));
                }
                statements.push(json!({
                    "Action": "sqs:SendMessage",
                    "Condition": { "ArnEquals": { "aws:SourceArn": policy.topic_arn.render() } },
                    "Effect": "Allow",
                    "Principal": { "Service": "sns.amazonaws.com" },
                    "Resource": queue_arn,
                }));
                json!({
                    "PolicyDocument": { "Statement": statements, "Version": "2012-10-17" },
                    "Queues": [reference(&policy.queue)],
                })
            }
            Resource::Subscription(sub) => {
                let mut props = Map::new();
                props.insert("Protocol".into(), json!("sqs"));
                props.insert("TopicArn".into(), sub.topic_arn.render());
                props.insert("Endpoint".into(), get_att(&sub.queue, "Arn"));
                if sub.raw_message_delivery {
                    props.insert("RawMessageDelivery".into(), json!(true));
                }
                if let Some(ref policy) = sub.filter_policy {
                    props.insert("FilterPolicy".into(), policy.clone());
                }
                if let Some(scope) = sub.filter_policy_scope {
                    props.insert("FilterPolicyScope".into(), json!(scope));
                }
                if let Some(ref dlq) = sub.dead_letter_queue_arn {
                    props.insert(
                        "RedrivePolicy".into(),
                        json!({ "deadLetterTargetArn": dlq.render() }),
                    );
                }
                Value::Object(props)
            }
            Resource::Connection(conn) => {
                let headers: Vec<Value> = conn
                    .headers
                    .iter()
                    .map(|(key, value)| json!({ "Key": key, "Value": render_str(value), "IsValueSecret": false }))
                    .collect();
                let mut props = json!({
                    "AuthorizationType": "API_KEY",
                    "AuthParameters": {
                        "ApiKeyAuthParameters": {
                            "ApiKeyName": conn.api_key_name,
                            "ApiKeyValue": conn.api_key_value,
                        },
                        "InvocationHttpParameters": { "HeaderParameters": headers },
                    },
                });
                if let Some(ref description) = conn.description {
                    props["Description"] = render_str(description);
                }
                props
            }
            Resource::ApiDestination(dest) => {
                let mut props = json!({
                    "ConnectionArn": get_att(&dest.connection, "Arn"),
                    "HttpMethod": "POST",
                    "InvocationEndpoint": dest.endpoint.render(),
                });
                if let Some(ref description) = dest.description {
                    props["Description"] = render_str(description);
                }
                if let Some(limit) = dest.rate_limit_per_second {
                    props["InvocationRateLimitPerSecond"] = json!(limit);
                }
                props
            }
            Resource::Role(role) => json!({
                "AssumeRolePolicyDocument": {
                    "Statement": [{
                        "Action": "sts:AssumeRole",
                        "Effect": "Allow",
                        "Principal": { "Service": role.service_principal },
                    }],
                    "Version": "2012-10-17",
                },
                "Policies": [{
                    "PolicyDocument": { "Statement": role.statements, "Version": "2012-10-17" },
                    "PolicyName": "PipePolicy",
                }],
            }),
            Resource::Pipe(pipe) => {
                let mut props = json!({
                    "Source": get_att(&pipe.source_queue, "Arn"),
                    "Target": get_att(&pipe.target, "Arn"),
                    "RoleArn": get_att(&pipe.role, "Arn"),
                    "Description": render_str(&pipe.description),
                    "TargetParameters": { "InputTemplate": render_str(&pipe.input_template) },
                });
                if let Some(ref name) = pipe.name {
                    props["Name"] = json!(name);
                }
                if let Some(state) = pipe.desired_state {
                    props["DesiredState"] = json!(state);
                }
                if let Some(size) = pipe.batch_size {
                    props["SourceParameters"] = json!({ "SqsQueueParameters": { "BatchSize": size } });
                }
                props
            }
        }
    }
}

/// A resource placed in the graph under a construct path
#[derive(Debug, Clone, PartialEq)]
pub struct Declared {
    /// Construct path, e.g. `GoogleChat-CloudWatchAlarm-OK/Queue`
    pub path: String,

    /// Template key derived from the path
    pub logical_id: String,

    pub resource: Resource,

    /// Name of a condition gating the resource
    pub condition: Option<String>,

    /// Lint rule suppressions
    pub suppressions: Vec<Suppression>,
}

impl Declared {
    /// Render the template `Resources` entry
    pub fn to_template(&self) -> Value {
        let mut entry = json!({
            "Type": self.resource.type_name(),
            "Properties": self.resource.properties(),
        });
        if let Some(ref condition) = self.condition {
            entry["Condition"] = json!(condition);
        }
        let mut metadata = json!({ "aws:cdk:path": self.path });
        if !self.suppressions.is_empty() {
            metadata["cdk_nag"] = json!({ "rules_to_suppress": self.suppressions });
        }
        entry["Metadata"] = metadata;
        entry
    }
}
