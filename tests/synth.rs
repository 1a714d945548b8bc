//! Alarm Stack Integration Tests
//!
//! End-to-end tests declaring the alarm stack and inspecting the template.

use alarmpipe::core::app::STACK_NAME;
use alarmpipe::core::{ContextStore, Environment};
use alarmpipe::build_alarm_stack;
use serde_json::{json, Map, Value};

fn context(values: Value) -> ContextStore {
    let Value::Object(map) = values else {
        panic!("context must be an object");
    };
    ContextStore::from_map(map)
}

/// Collect the resource keys named by `Ref` and `Fn::GetAtt` inside `value`
fn referenced_ids(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(id)) = map.get("Ref") {
                out.push(id.clone());
            }
            if let Some(Value::String(id)) = map.get("Fn::GetAtt").and_then(|att| att.get(0)) {
                out.push(id.clone());
            }
            map.values().for_each(|v| referenced_ids(v, out));
        }
        Value::Array(items) => items.iter().for_each(|v| referenced_ids(v, out)),
        _ => {}
    }
}

/// Every resource must carry the condition of each resource it references
fn assert_conditions_consistent(resources: &Map<String, Value>) {
    for (key, resource) in resources {
        let mut refs = Vec::new();
        referenced_ids(&resource["Properties"], &mut refs);
        for target in refs.iter().filter(|id| resources.contains_key(*id)) {
            let wanted = resources[target].get("Condition");
            if wanted.is_some() {
                assert_eq!(
                    resource.get("Condition"),
                    wanted,
                    "{} references conditioned {} without the same condition",
                    key,
                    target
                );
            }
        }
    }
}

fn full_context() -> ContextStore {
    context(json!({
        "SourceSNSTopic": "cloudwatch-alarms",
        "GoogleChatConfig": {
            "MessageTitle": "ProjectA",
            "MessageIcon": "https://projecta.com/favicon.png",
            "Space": {
                "Label": "ProjectA_Alerts",
                "Endpoint": "https://chat.googleapis.com/v1/spaces/A/messages?key=k&token=t"
            }
        }
    }))
}

#[test]
fn test_fully_configured_stack_needs_no_parameters() {
    let app = build_alarm_stack(Environment::new("us-east-1", "123456789012"), full_context()).unwrap();
    assert_eq!(app.stack.name(), STACK_NAME);
    assert_eq!(app.pipelines.len(), 2);

    let template = app.stack.synth();
    assert!(template.get("Parameters").is_none());
    assert!(template.get("Conditions").is_none());

    let resources = template["Resources"].as_object().unwrap();
    // connection + destination + five resources per pipeline
    assert_eq!(resources.len(), 12);
    assert_eq!(resources["ProjectAAlerts"]["Type"], "AWS::Events::Connection");
    assert_eq!(
        resources["ApiDestination"]["Properties"]["InvocationEndpoint"],
        "https://chat.googleapis.com/v1/spaces/A/messages?key=k&token=t"
    );

    for state in ["OK", "ALARM"] {
        let subscription = &resources[&format!("GoogleChatCloudWatchAlarm{}QueueSubscription", state)];
        assert_eq!(
            subscription["Properties"]["TopicArn"],
            "arn:aws:sns:us-east-1:123456789012:cloudwatch-alarms"
        );
        assert_eq!(
            subscription["Properties"]["FilterPolicy"]["NewStateValue"],
            json!([state])
        );
    }
}

#[test]
fn test_substitutions_applied_to_payload() {
    let app = build_alarm_stack(Environment::new("us-east-1", "123456789012"), full_context()).unwrap();
    let template = app.stack.synth();

    let input = template["Resources"]["GoogleChatCloudWatchAlarmALARMPipe"]["Properties"]["TargetParameters"]
        ["InputTemplate"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(input.contains("ProjectA"));
    assert!(input.contains("https://projecta.com/favicon.png"));
    assert!(!input.contains("{{title}}"));
    assert!(!input.contains("{{icon}}"));
    assert!(input.contains("<$.body."));
}

#[test]
fn test_empty_context_becomes_parameters() {
    let app = build_alarm_stack(Environment::agnostic(), ContextStore::new()).unwrap();
    let template = app.stack.synth();

    let params = template["Parameters"].as_object().unwrap();
    for id in [
        "SourceSNSTopic",
        "GoogleChatMessageTitle",
        "GoogleChatMessageIcon",
        "GoogleChatSpaceLabel",
        "GoogleChatSpaceEndpoint",
    ] {
        assert_eq!(params[id]["Type"], "String", "missing parameter {}", id);
    }
    assert_eq!(params["GoogleChatSpaceEndpoint"]["NoEcho"], true);
    assert!(params["GoogleChatSpaceLabel"].get("NoEcho").is_none());

    let resources = &template["Resources"];
    assert_eq!(resources["Connection"]["Type"], "AWS::Events::Connection");
    assert_eq!(
        resources["ApiDestination"]["Properties"]["InvocationEndpoint"],
        json!({ "Ref": "GoogleChatSpaceEndpoint" })
    );
    assert_eq!(
        resources["GoogleChatCloudWatchAlarmOKQueueSubscription"]["Properties"]["TopicArn"],
        json!({ "Ref": "SourceSNSTopic" })
    );

    let input = &resources["GoogleChatCloudWatchAlarmOKPipe"]["Properties"]["TargetParameters"]["InputTemplate"];
    let sub = input["Fn::Sub"].as_str().unwrap();
    assert!(sub.contains("${GoogleChatMessageTitle}"));
}

#[test]
fn test_pipes_enabled_gates_every_pipeline() {
    let mut ctx = full_context();
    ctx.insert("PipesEnabled", json!(true));
    let app = build_alarm_stack(Environment::new("us-east-1", "123456789012"), ctx).unwrap();

    for pipeline in &app.pipelines {
        assert_eq!(pipeline.enablement_condition.as_deref(), Some("PipesEnabledCondition"));
    }

    let template = app.stack.synth();
    assert_eq!(template["Parameters"]["PipesEnabled"]["Default"], "true");
    assert_eq!(
        template["Conditions"]["PipesEnabledCondition"],
        json!({ "Fn::Equals": [{ "Ref": "PipesEnabled" }, "true"] })
    );
    let resources = &template["Resources"];
    assert_eq!(resources["GoogleChatCloudWatchAlarmOKPipe"]["Condition"], "PipesEnabledCondition");
    assert_eq!(resources["GoogleChatCloudWatchAlarmOKQueue"]["Condition"], "PipesEnabledCondition");
    assert!(resources["ApiDestination"].get("Condition").is_none());
    for suffix in ["QueuePolicy", "QueueSubscription", "PipeRole"] {
        assert_eq!(
            resources[&format!("GoogleChatCloudWatchAlarmOK{}", suffix)]["Condition"],
            "PipesEnabledCondition"
        );
    }
}

#[test]
fn test_gated_resources_are_never_referenced_ungated() {
    for context in [full_context(), ContextStore::new()] {
        let mut ctx = context;
        ctx.insert("PipesEnabled", json!("true"));
        let app = build_alarm_stack(Environment::agnostic(), ctx).unwrap();
        let template = app.stack.synth();

        let resources = template["Resources"].as_object().unwrap();
        assert!(resources.values().any(|r| r.get("Condition").is_some()));
        assert_conditions_consistent(resources);
    }
}

#[test]
fn test_ungated_stack_has_no_conditions() {
    let app = build_alarm_stack(Environment::agnostic(), full_context()).unwrap();
    let template = app.stack.synth();

    let resources = template["Resources"].as_object().unwrap();
    assert!(resources.values().all(|r| r.get("Condition").is_none()));
    assert_conditions_consistent(resources);
}

#[test]
fn test_alarm_states_select_pipelines() {
    let mut ctx = full_context();
    ctx.insert("AlarmStates", json!(["ALARM", "INSUFFICIENT_DATA"]));
    let app = build_alarm_stack(Environment::new("us-east-1", "123456789012"), ctx).unwrap();

    let ids: Vec<&str> = app.pipelines.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "GoogleChat-CloudWatchAlarm-ALARM",
            "GoogleChat-CloudWatchAlarm-INSUFFICIENT_DATA"
        ]
    );
    assert_eq!(app.pipelines[0].target.input_template, app.pipelines[1].target.input_template);
}

#[test]
fn test_invalid_source_topic_fails() {
    let mut ctx = full_context();
    ctx.insert("SourceSNSTopic", json!("!!"));
    let err = build_alarm_stack(Environment::new("us-east-1", "123456789012"), ctx).unwrap_err();
    assert!(err.to_string().contains("Invalid SNS Topic ARN or Topic Name"));
}

#[test]
fn test_repository_metadata_recorded_when_given() {
    let mut ctx = full_context();
    ctx.insert("metadata:repo", json!("https://example.com/repo"));
    let app = build_alarm_stack(Environment::agnostic(), ctx).unwrap();

    assert_eq!(app.stack.synth()["Metadata"]["repo"], "https://example.com/repo");
}
