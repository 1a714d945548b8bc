//! Alarm-state payload templates.
//!
//! Each recognized alarm state maps to a JSON payload template containing
//! `{{name}}` markers. Markers are replaced at declaration time; the
//! `<$.body...>` paths inside the templates are left for the pipe to fill in
//! per message.

use std::collections::BTreeMap;
use std::sync::{LazyLock, OnceLock};

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{([^{}]+)\}\}").expect("hard-coded regular expression to be valid")
});

const ALARM_TEMPLATE: &str = include_str!("../../templates/cloudwatch-alarm-ALARM.json");
const OK_TEMPLATE: &str = include_str!("../../templates/cloudwatch-alarm-OK.json");

/// Extract the message of an SQS event whose body is a raw SNS delivery
pub const TRANSFORM_SQS_BODY_SNS_RAW: &str = "<$.body.Message>";

/// Extract the SQS message body. Only works when the body is a plain string.
pub const TRANSFORM_SQS_BODY: &str = "<$.body>";

/// Wrap the SQS message body so it is parsed as JSON
pub const TRANSFORM_SQS_BODY_TO_DATA: &str = r#"{"_data_":<$.body>}"#;

/// CloudWatch alarm states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmState {
    Ok,
    Alarm,
    InsufficientData,
}

impl AlarmState {
    pub const ALL: [AlarmState; 3] = [AlarmState::Ok, AlarmState::Alarm, AlarmState::InsufficientData];

    /// Raw template text for this state.
    ///
    /// `InsufficientData` deliberately reuses the `Alarm` template: a missing
    /// datapoint is reported the same way as a breach.
    fn raw_template(self) -> &'static str {
        static ALARM: OnceLock<String> = OnceLock::new();
        static OK: OnceLock<String> = OnceLock::new();

        match self {
            AlarmState::Ok => OK.get_or_init(|| minify(OK_TEMPLATE)),
            AlarmState::Alarm | AlarmState::InsufficientData => ALARM.get_or_init(|| minify(ALARM_TEMPLATE)),
        }
    }
}

impl std::fmt::Display for AlarmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlarmState::Ok => write!(f, "OK"),
            AlarmState::Alarm => write!(f, "ALARM"),
            AlarmState::InsufficientData => write!(f, "INSUFFICIENT_DATA"),
        }
    }
}

impl std::str::FromStr for AlarmState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "OK" => Ok(AlarmState::Ok),
            "ALARM" => Ok(AlarmState::Alarm),
            "INSUFFICIENT_DATA" => Ok(AlarmState::InsufficientData),
            _ => anyhow::bail!("Unknown alarm state: {}", s),
        }
    }
}

/// Compact a JSON document; text that does not parse is kept as is
fn minify(raw: &str) -> String {
    serde_json::from_str::<serde_json::Value>(raw)
        .map(|value| value.to_string())
        .unwrap_or_else(|_| raw.trim().to_string())
}

/// A state-keyed payload template with its substitutions applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadTemplate {
    pub state: AlarmState,
    pub raw_template: String,
    pub substitutions: BTreeMap<String, String>,

    /// `raw_template` after substitution
    pub input_template: String,
}

impl PayloadTemplate {
    /// A template that is not tied to an alarm state
    pub fn custom(state: AlarmState, template: impl Into<String>) -> Self {
        let raw_template = template.into();
        Self {
            state,
            input_template: raw_template.clone(),
            raw_template,
            substitutions: BTreeMap::new(),
        }
    }
}

/// Replace every `{{name}}` marker whose name is in `substitutions`.
///
/// Markers are matched whole in a single pass, so replaced text is never
/// rescanned and one name can never match part of another. Unknown markers
/// are left verbatim.
pub fn substitute(template: &str, substitutions: &BTreeMap<String, String>) -> String {
    MARKER
        .replace_all(template, |caps: &Captures| match substitutions.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Look up the template for `state`, applying `substitutions` if given
pub fn get_template(state: AlarmState, substitutions: Option<&BTreeMap<String, String>>) -> PayloadTemplate {
    let raw_template = state.raw_template().to_string();
    let (input_template, substitutions) = match substitutions {
        Some(subs) => (substitute(&raw_template, subs), subs.clone()),
        None => (raw_template.clone(), BTreeMap::new()),
    };

    PayloadTemplate {
        state,
        raw_template,
        substitutions,
        input_template,
    }
}
