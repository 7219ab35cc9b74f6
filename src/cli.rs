use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::services::LifecycleAction;

#[derive(Parser)]
#[command(name = "cluster-agent")]
#[command(author = "Cluster Agent Developers")]
#[command(version)]
#[command(about = "Configure, start, stop and health-check cluster services", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a lifecycle action for a component
    Apply(ApplyArgs),

    /// Preview what an action would change
    Diff(DiffArgs),

    /// Run an alert check and print its result
    Alert(AlertArgs),

    /// List the configuration tokens an alert check needs
    Tokens {
        #[arg(value_enum)]
        check: CheckName,
    },

    /// Render a template against JSON bindings
    Render(RenderArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Lifecycle
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ComponentName {
    Datanode,
    Kafka,
    /// Falcon server; status only
    Falcon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ActionArg {
    Configure,
    Start,
    Stop,
    Status,
}

impl From<ActionArg> for LifecycleAction {
    fn from(action: ActionArg) -> Self {
        match action {
            ActionArg::Configure => Self::Configure,
            ActionArg::Start => Self::Start,
            ActionArg::Stop => Self::Stop,
            ActionArg::Status => Self::Status,
        }
    }
}

/// Where the cluster command document comes from
#[derive(Args, Debug, Clone)]
pub struct ConfigArg {
    /// Cluster command document (JSON or TOML)
    #[arg(short, long, env = "CLUSTER_AGENT_COMMAND")]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[arg(value_enum)]
    pub component: ComponentName,

    #[arg(value_enum)]
    pub action: ActionArg,

    /// Dry run - show what would be done
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Only apply resources matching `type` or `type:name`
    #[arg(short, long)]
    pub target: Option<String>,

    #[command(flatten)]
    pub config: ConfigArg,
}

#[derive(Args)]
pub struct DiffArgs {
    #[arg(value_enum)]
    pub component: ComponentName,

    #[arg(value_enum, default_value = "start")]
    pub action: ActionArg,

    /// Only show resources matching `type` or `type:name`
    #[arg(short, long)]
    pub target: Option<String>,

    #[command(flatten)]
    pub config: ConfigArg,
}

// ============================================================================
// Alerts
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CheckName {
    Oozie,
}

#[derive(Args)]
pub struct AlertArgs {
    #[arg(value_enum)]
    pub check: CheckName,

    /// Script parameter as KEY=VALUE (repeatable)
    #[arg(short, long = "param", value_parser = parse_param)]
    pub params: Vec<(String, String)>,

    /// Host the check reports for; defaults to the document's hostname
    #[arg(long)]
    pub host_name: Option<String>,

    #[command(flatten)]
    pub config: ConfigArg,
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))
}

// ============================================================================
// Templates
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TemplateKind {
    Text,
    Xml,
    Properties,
}

#[derive(Args)]
pub struct RenderArgs {
    /// Template source; only read for `text`
    pub template: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value = "text")]
    pub kind: TemplateKind,

    /// JSON object of bindings
    #[arg(short, long)]
    pub bindings: Option<PathBuf>,
}
