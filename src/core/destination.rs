//! Webhook destinations.
//!
//! Chat webhooks authenticate with `key` and `token` query parameters in the
//! endpoint URL. The platform still requires every connection to declare an
//! authorization scheme, so connections carry a placeholder API key that the
//! webhook ignores.

use std::collections::BTreeMap;

use tracing::info;

use crate::domain::{ApiDestination, Connection, Deferred, Resource};

use super::error::DeclarationResult;
use super::hash::{short_id, DEFAULT_SHORT_ID_BYTES};
use super::stack::Stack;

pub const CONTENT_TYPE_JSON: &str = "application/json;charset=utf-8";

const DUMMY_API_KEY_NAME: &str = "dummy";
const DUMMY_API_KEY_VALUE: &str = "key";

/// Optional connection settings
#[derive(Debug, Clone, Default)]
pub struct ConnectionOptions {
    pub description: Option<String>,

    /// Extra invocation headers; these override the defaults
    pub headers: BTreeMap<String, String>,
}

/// Declare a webhook connection for a space.
///
/// The construct id is the space label, or `Connection` when the label is
/// only known at deploy time. A label with no ASCII letters or digits is
/// replaced by `Connection` plus a short hash of the label.
pub fn webhook_connection(
    stack: &mut Stack,
    space: &Deferred<String>,
    options: ConnectionOptions,
) -> DeclarationResult<String> {
    let path = match space {
        Deferred::Known(label) if label.chars().any(|c| c.is_ascii_alphanumeric()) => label.clone(),
        Deferred::Known(label) => format!("Connection{}", short_id(label, DEFAULT_SHORT_ID_BYTES)),
        Deferred::Pending(_) => "Connection".to_string(),
    };

    let mut headers = BTreeMap::from([("content-type".to_string(), CONTENT_TYPE_JSON.to_string())]);
    headers.extend(options.headers);

    stack.add_resource(
        path,
        Resource::Connection(Connection {
            description: options.description,
            api_key_name: DUMMY_API_KEY_NAME.to_string(),
            api_key_value: DUMMY_API_KEY_VALUE.to_string(),
            headers,
        }),
    )
}

/// A declared API destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiDestinationHandle {
    pub logical_id: String,
}

impl ApiDestinationHandle {
    /// Deploy-time reference to the destination ARN
    pub fn arn(&self) -> String {
        format!("${{{}.Arn}}", self.logical_id)
    }

    /// Deploy-time reference to the destination name
    pub fn name(&self) -> String {
        format!("${{{}}}", self.logical_id)
    }
}

/// Properties of a chat space destination
#[derive(Debug, Clone)]
pub struct ChatDestinationProps {
    /// Existing connection; one is declared for the space when absent
    pub connection: Option<String>,
    pub space: Deferred<String>,
    pub endpoint: Deferred<String>,
    pub description: Option<String>,
    pub rate_limit_per_second: Option<u32>,
}

/// Declare a POST destination for a chat space
pub fn chat_api_destination(
    stack: &mut Stack,
    id: &str,
    props: ChatDestinationProps,
) -> DeclarationResult<ApiDestinationHandle> {
    let connection = match props.connection {
        Some(connection) => connection,
        None => webhook_connection(stack, &props.space, ConnectionOptions::default())?,
    };

    let logical_id = stack.add_resource(
        id,
        Resource::ApiDestination(ApiDestination {
            connection,
            endpoint: props.endpoint,
            description: props.description,
            rate_limit_per_second: props.rate_limit_per_second,
        }),
    )?;
    info!(space = %props.space.interpolate(), %logical_id, "Declared chat destination");

    Ok(ApiDestinationHandle { logical_id })
}
