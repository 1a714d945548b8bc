//! Domain types for the pipeline composer.
//!
//! This module contains the core data structures:
//! - Deferred: values known now or only at deploy time
//! - Setting: resolved configuration values and their placeholders
//! - Resource: declared resources and their template rendering

pub mod deferred;
pub mod resource;
pub mod setting;

// Re-export commonly used types
pub use deferred::{Deferred, PlaceholderId};
pub use resource::{
    ApiDestination, Connection, Declared, DesiredState, FilterPolicyScope, Pipe, Queue, QueuePolicy,
    Resource, Role, Subscription, Suppression,
};
pub use setting::{LogicalSetting, Parameter, SettingDef, SettingSource, REDACTED};
