//! Core declaration logic.
//!
//! This module contains:
//! - Hash: short identifiers for long names
//! - Topics: topic reference resolution and caching
//! - Settings: layered configuration resolution
//! - Templates: alarm-state payload templates
//! - Pipe: topic-to-webhook pipeline composition
//! - Destination: webhook connections and API destinations
//! - Stack: the declaration graph and template synthesis
//! - App: the alarm-to-chat stack

pub mod app;
pub mod destination;
pub mod error;
pub mod hash;
pub mod pipe;
pub mod settings;
pub mod stack;
pub mod templates;
pub mod topics;

// Re-export commonly used types
pub use app::{build_alarm_stack, AlarmApp};
pub use destination::{chat_api_destination, webhook_connection, ApiDestinationHandle, ChatDestinationProps, ConnectionOptions};
pub use error::{DeclarationError, DeclarationResult};
pub use hash::{short_id, DEFAULT_SHORT_ID_BYTES};
pub use pipe::{
    compose, ApiDestinationTarget, PipeOptions, PipeSource, PipeTarget, PipelineSpec, PipelineSpecInput,
    SubscriptionFilter, SubscriptionOptions,
};
pub use settings::{ChatConfig, ContextStore, SettingResolver, SpaceConfig};
pub use stack::{logical_id_for, Environment, Stack};
pub use templates::{get_template, substitute, AlarmState, PayloadTemplate};
pub use topics::{canonical_topic_arn, TopicCache, TopicRef, TopicReference};
