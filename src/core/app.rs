//! CloudWatch alarm notifications to a chat space.
//!
//! Declares one webhook destination for the configured space and one pipeline
//! per alarm state, each rendering the state's payload template.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{info, instrument};

use crate::domain::{Deferred, Parameter};

use super::destination::{chat_api_destination, webhook_connection, ChatDestinationProps, ConnectionOptions};
use super::pipe::{
    compose, PipeOptions, PipeSource, PipeTarget, PipelineSpec, PipelineSpecInput, SubscriptionFilter,
    SubscriptionOptions,
};
use super::settings::{ContextStore, SOURCE_TOPIC};
use super::stack::{Environment, Stack};
use super::templates::{get_template, AlarmState};
use super::topics::TopicRef;

pub const STACK_NAME: &str = "CloudWatchAlertsToGoogleChatSpaceStack";

pub const STACK_DESCRIPTION: &str =
    "Forwards CloudWatch alarm notifications from an SNS topic to a Google Chat space or Slack webhook.";

/// Context key listing the alarm states that get a pipeline
pub const ALARM_STATES_KEY: &str = "AlarmStates";

/// Context key; `true` gates every pipeline on a deploy-time parameter.
/// The gate covers all five resources of each pipeline.
pub const PIPES_ENABLED_KEY: &str = "PipesEnabled";

/// Context key; `true` expands a bare source topic name at deploy time
pub const ACCOUNT_AGNOSTIC_KEY: &str = "AccountAgnostic";

/// Context key carrying the repository URL recorded in the template metadata
pub const REPO_METADATA_KEY: &str = "metadata:repo";

const PIPES_ENABLED_CONDITION: &str = "PipesEnabledCondition";

const DEFAULT_STATES: [AlarmState; 2] = [AlarmState::Ok, AlarmState::Alarm];

/// The declared alarm stack
#[derive(Debug)]
pub struct AlarmApp {
    pub stack: Stack,
    pub pipelines: Vec<PipelineSpec>,
}

fn alarm_states(context: &ContextStore) -> Result<Vec<AlarmState>> {
    match context.get_list(ALARM_STATES_KEY) {
        Some(states) if !states.is_empty() => states
            .iter()
            .map(|s| s.parse::<AlarmState>())
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Invalid {} context value", ALARM_STATES_KEY)),
        _ => Ok(DEFAULT_STATES.to_vec()),
    }
}

/// Declare the alarm-to-chat stack
#[instrument(skip(env, context))]
pub fn build_alarm_stack(env: Environment, context: ContextStore) -> Result<AlarmApp> {
    let states = alarm_states(&context)?;
    let account_agnostic = context.get_bool(ACCOUNT_AGNOSTIC_KEY).unwrap_or(false);
    let gated = context.get_bool(PIPES_ENABLED_KEY).unwrap_or(false);
    let repo = context.get_str(REPO_METADATA_KEY);

    let mut stack = Stack::new(STACK_NAME, env, context).with_description(STACK_DESCRIPTION);
    if let Some(repo) = repo {
        stack.add_metadata("repo", repo);
    }

    let source = match stack.resolve_setting(&SOURCE_TOPIC).value {
        Deferred::Known(topic) => Deferred::Known(TopicRef::Raw(topic)),
        Deferred::Pending(id) => Deferred::Pending(id),
    };

    let config = stack.chat_config();
    let label = config.space.label.value.interpolate();

    let connection = webhook_connection(&mut stack, &config.space.label.value, ConnectionOptions::default())?;
    let destination = chat_api_destination(
        &mut stack,
        "ApiDestination",
        ChatDestinationProps {
            connection: Some(connection),
            space: config.space.label.value.clone(),
            endpoint: config.space.endpoint.value.clone(),
            description: Some(format!("Forward messages to Google Chat space {}", label)),
            rate_limit_per_second: None,
        },
    )?;

    let condition = gated.then(|| {
        stack.add_parameter(
            Parameter::string(PIPES_ENABLED_KEY, "Whether the alarm pipes are deployed.")
                .with_default("true")
                .with_allowed_values(["true", "false"]),
        );
        stack.add_condition(
            PIPES_ENABLED_CONDITION,
            json!({ "Fn::Equals": [{ "Ref": PIPES_ENABLED_KEY }, "true"] }),
        )
    });

    let substitutions = BTreeMap::from([
        ("title".to_string(), config.message_title.value.interpolate()),
        ("icon".to_string(), config.message_icon.value.interpolate()),
    ]);

    let mut pipelines = Vec::with_capacity(states.len());
    for state in states {
        let template = get_template(state, Some(&substitutions));

        let mut filter = json!({ "AlarmArn": [{ "exists": true }] });
        filter["NewStateValue"] = json!([state.to_string()]);

        let mut pipeline = compose(
            &mut stack,
            PipelineSpecInput {
                id: format!("GoogleChat-CloudWatchAlarm-{}", state),
                source: PipeSource {
                    topic: source.clone(),
                    subscription: SubscriptionOptions {
                        filter: Some(SubscriptionFilter::MessageBody(filter)),
                        ..Default::default()
                    },
                    account_agnostic,
                },
                target: PipeTarget::Destination {
                    destination: destination.clone(),
                    input_template: Some(template.input_template),
                },
                description: Some(format!(
                    "Forward CloudWatch Alert messages from SNS to Google Chat space {}",
                    label
                )),
                options: PipeOptions::default(),
            },
        )?;

        if let Some(ref condition) = condition {
            pipeline.add_condition(&mut stack, condition);
            // Everything referencing the buffer must go with it
            for logical_id in [&pipeline.buffer_policy, &pipeline.subscription, &pipeline.role] {
                stack.set_condition(logical_id, condition);
            }
        }
        pipelines.push(pipeline);
    }

    info!(pipelines = pipelines.len(), resources = stack.resources().len(), "Declared alarm stack");
    Ok(AlarmApp { stack, pipelines })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_states() {
        assert_eq!(alarm_states(&ContextStore::new()).unwrap(), DEFAULT_STATES.to_vec());
    }

    #[test]
    fn test_states_from_context() {
        let mut context = ContextStore::new();
        context.insert(ALARM_STATES_KEY, json!("ALARM,INSUFFICIENT_DATA"));
        assert_eq!(
            alarm_states(&context).unwrap(),
            vec![AlarmState::Alarm, AlarmState::InsufficientData]
        );

        context.insert(ALARM_STATES_KEY, json!(["BROKEN"]));
        assert!(alarm_states(&context).is_err());
    }
}
