//! Command-line interface for alarmpipe.
//!
//! Provides commands for synthesizing the alarm-to-chat template, inspecting
//! resolved configuration, rendering payload templates and deriving short ids.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use crate::config::{self, Overrides, ResolvedConfig};
use crate::core::app::STACK_NAME;
use crate::core::settings::SOURCE_TOPIC;
use crate::core::{build_alarm_stack, get_template, short_id, AlarmState, Stack, DEFAULT_SHORT_ID_BYTES};

/// alarmpipe - Declarative SNS-to-webhook pipeline composer
#[derive(Parser, Debug)]
#[command(name = "alarmpipe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Configuration flags shared by all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Context override (KEY=VALUE); may be repeated
    #[arg(short, long = "context", global = true)]
    pub context: Vec<String>,

    /// Context file to load instead of searching for one
    #[arg(long, global = true, env = "ALARMPIPE_CONTEXT")]
    pub context_file: Option<PathBuf>,

    /// Deployment region (defaults to CDK_DEFAULT_REGION)
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Deployment account (defaults to CDK_DEFAULT_ACCOUNT)
    #[arg(long, global = true)]
    pub account: Option<String>,
}

impl From<GlobalArgs> for Overrides {
    fn from(args: GlobalArgs) -> Self {
        Self {
            context: args.context,
            context_file: args.context_file,
            region: args.region,
            account: args.account,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synthesize the deployment template
    Synth {
        /// Write the template to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Show resolved configuration (sensitive values are redacted)
    Config,

    /// Render the payload template for an alarm state
    Template {
        /// Alarm state (OK, ALARM, INSUFFICIENT_DATA)
        state: AlarmState,

        /// Value for {{title}}
        #[arg(long)]
        title: Option<String>,

        /// Value for {{icon}}
        #[arg(long)]
        icon: Option<String>,
    },

    /// Derive a short identifier from a long name
    Hash {
        input: String,

        /// Number of digest bytes to output
        #[arg(short, long, default_value_t = DEFAULT_SHORT_ID_BYTES)]
        length: usize,
    },
}

/// Template output format
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        let overrides = Overrides::from(self.global);
        match self.command {
            Commands::Synth { output, format } => synth(&overrides, output, format),
            Commands::Config => show_config(&overrides),
            Commands::Template { state, title, icon } => render_template(state, title, icon),
            Commands::Hash { input, length } => {
                println!("{}", short_id(&input, length));
                Ok(())
            }
        }
    }
}

/// Synthesize the alarm stack template
fn synth(overrides: &Overrides, output: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let ResolvedConfig { context, env, .. } = config::load_config(overrides)?;
    let app = build_alarm_stack(env, context)?;
    let template = app.stack.synth();

    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&template)?,
        OutputFormat::Yaml => serde_yaml::to_string(&template)?,
    };

    match output {
        Some(path) => {
            std::fs::write(&path, rendered)
                .with_context(|| format!("Failed to write template: {}", path.display()))?;
            info!(path = %path.display(), "Wrote template");
        }
        None => println!("{}", rendered),
    }

    Ok(())
}

/// Show the resolved context and settings
fn show_config(overrides: &Overrides) -> Result<()> {
    let cfg = config::load_config(overrides)?;

    println!("alarmpipe configuration");
    println!();
    println!(
        "Context file: {}",
        cfg.context_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );
    println!("Region:       {}", cfg.env.region.as_deref().unwrap_or("(deploy time)"));
    println!("Account:      {}", cfg.env.account.as_deref().unwrap_or("(deploy time)"));
    println!();

    let mut stack = Stack::new(STACK_NAME, cfg.env, cfg.context);
    let source = stack.resolve_setting(&SOURCE_TOPIC);
    let chat = stack.chat_config();

    println!("Settings:");
    for setting in std::iter::once(&source).chain(chat.settings()) {
        println!("  {:<24} {:<40} ({})", setting.id, setting.display_value(), setting.source);
    }

    let params = stack.settings().placeholders();
    if !params.is_empty() {
        println!();
        println!("Deploy-time parameters required:");
        for param in params {
            println!("  {}{}", param.id, if param.no_echo { " (no echo)" } else { "" });
        }
    }

    Ok(())
}

/// Print one payload template
fn render_template(state: AlarmState, title: Option<String>, icon: Option<String>) -> Result<()> {
    let substitutions: BTreeMap<String, String> = [("title", title), ("icon", icon)]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
        .collect();

    let template = get_template(state, (!substitutions.is_empty()).then_some(&substitutions));
    let pretty: serde_json::Value = serde_json::from_str(&template.input_template)
        .context("Payload template is not valid JSON")?;
    println!("{}", serde_json::to_string_pretty(&pretty)?);

    Ok(())
}
