//! Context and environment configuration.
//!
//! Context sources (highest priority first):
//! 1. `--context KEY=VALUE` command-line overrides
//! 2. Context file named by ALARMPIPE_CONTEXT
//! 3. Discovered context file (cdk.context.json, alarmpipe.context.json,
//!    .alarmpipe/context.yaml) in the current directory or a parent
//! 4. Empty context
//!
//! The deployment environment comes from CDK_DEFAULT_REGION and
//! CDK_DEFAULT_ACCOUNT unless overridden on the command line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use crate::core::{ContextStore, Environment};

/// Environment variable naming an explicit context file
pub const CONTEXT_ENV_VAR: &str = "ALARMPIPE_CONTEXT";

const REGION_ENV_VAR: &str = "CDK_DEFAULT_REGION";
const ACCOUNT_ENV_VAR: &str = "CDK_DEFAULT_ACCOUNT";

/// File names searched for, in order, in each directory
const CONTEXT_FILE_NAMES: [&str; 3] = ["cdk.context.json", "alarmpipe.context.json", ".alarmpipe/context.yaml"];

/// Configuration resolved from all sources
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub context: ContextStore,

    /// Context file that was loaded (if any)
    pub context_file: Option<PathBuf>,

    pub env: Environment,
}

/// Command-line overrides
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Raw `KEY=VALUE` context pairs
    pub context: Vec<String>,
    pub context_file: Option<PathBuf>,
    pub region: Option<String>,
    pub account: Option<String>,
}

/// Find a context file by searching `start` and its parents
fn find_context_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        for name in CONTEXT_FILE_NAMES {
            let candidate = current.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse a context file (YAML by extension, JSON otherwise)
pub fn load_context_file(path: &Path) -> Result<ContextStore> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read context file: {}", path.display()))?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let values: Map<String, Value> = if is_yaml {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse context file: {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse context file: {}", path.display()))?
    };

    Ok(ContextStore::from_map(values))
}

/// Parse a `KEY=VALUE` override. Values starting with `{` or `[` are parsed as JSON.
pub fn parse_context_override(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("Context override must be KEY=VALUE: {}", raw))?;

    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Context override has an empty key: {}", raw);
    }

    let value = if value.starts_with('{') || value.starts_with('[') {
        serde_json::from_str(value).with_context(|| format!("Invalid JSON in context override: {}", key))?
    } else {
        Value::String(value.to_string())
    };

    Ok((key.to_string(), value))
}

/// Load configuration from all sources, searching for context files from `cwd`
pub fn load_config_from(cwd: &Path, overrides: &Overrides) -> Result<ResolvedConfig> {
    let context_file = overrides
        .context_file
        .clone()
        .or_else(|| std::env::var_os(CONTEXT_ENV_VAR).map(PathBuf::from))
        .or_else(|| find_context_file(cwd));

    let mut context = match context_file {
        Some(ref path) => load_context_file(path)?,
        None => ContextStore::new(),
    };

    for raw in &overrides.context {
        let (key, value) = parse_context_override(raw)?;
        context.insert(key, value);
    }

    let env = Environment {
        region: overrides
            .region
            .clone()
            .or_else(|| std::env::var(REGION_ENV_VAR).ok()),
        account: overrides
            .account
            .clone()
            .or_else(|| std::env::var(ACCOUNT_ENV_VAR).ok()),
    };

    Ok(ResolvedConfig {
        context,
        context_file,
        env,
    })
}

/// Load configuration, searching for context files from the current directory
pub fn load_config(overrides: &Overrides) -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    load_config_from(&cwd, overrides)
}
