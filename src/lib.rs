//! alarmpipe - Declarative SNS-to-webhook pipeline composer
//!
//! Composes the resources that forward messages published on an SNS topic to
//! an HTTP(S) webhook, with a payload template per CloudWatch alarm state.
//! Nothing is executed: the result is a deployment template describing the
//! pipeline topology and its resolved configuration.
//!
//! # Architecture
//!
//! One declaration pass walks a graph (`Stack`) that owns all caches:
//! - Settings resolve from context, existing placeholders, or new placeholders
//! - Topic references normalize to one cached handle per canonical ARN
//! - Each pipeline gets its own buffer queue between topic and pipe
//!
//! # Modules
//!
//! - `core`: Resolution, composition and synthesis
//! - `domain`: Data structures (Deferred, LogicalSetting, Resource)
//! - `config`: Context file and environment loading
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Synthesize with settings from cdk.context.json
//! alarmpipe synth > template.json
//!
//! # Override a setting
//! alarmpipe --context SourceSNSTopic=alerts synth
//!
//! # Show what will be asked for at deploy time
//! alarmpipe config
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use self::core::{
    build_alarm_stack, compose, get_template, short_id, AlarmState, DeclarationError, Environment, PipelineSpec,
    Stack, TopicRef, TopicReference,
};
pub use domain::{Deferred, LogicalSetting, SettingSource};
