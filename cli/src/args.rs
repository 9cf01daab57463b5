//! CLI command definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use wallbounce_domain::TaskType;

/// Output format for analysis results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable answer with approval details
    Text,
    /// Full response as JSON
    Json,
}

/// Who decides results that need review
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReviewerKind {
    /// Approve every result that needs review
    AutoApprove,
    /// Deny every result that needs review
    AutoDeny,
    /// Ask on the terminal
    Interactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TaskTypeArg {
    Basic,
    Premium,
    Critical,
}

impl From<TaskTypeArg> for TaskType {
    fn from(arg: TaskTypeArg) -> Self {
        match arg {
            TaskTypeArg::Basic => TaskType::Basic,
            TaskTypeArg::Premium => TaskType::Premium,
            TaskTypeArg::Critical => TaskType::Critical,
        }
    }
}

/// CLI arguments for wallbounce
#[derive(Parser, Debug)]
#[command(name = "wallbounce")]
#[command(author, version, about = "Bounce a question off several AI providers and gate the consensus")]
#[command(long_about = r#"
wallbounce sends one prompt to several independent providers, scores how
much they agree, and adds providers until the answer clears the configured
quality gate. The synthesized answer is then risk-assessed and approved,
sent to review, or denied; every step is written to the audit trail.

Configuration files are loaded from (in priority order):
1. WALLBOUNCE_* environment variables
2. --config <path>       Explicit config file
3. ./wallbounce.toml     Project-level config
4. ~/.config/wallbounce/config.toml   Global config

Example:
  wallbounce "Why does this query need a sequential scan?"
  wallbounce --task-type premium --sensitive production-change "Plan the failover"
  wallbounce --sequential --output json "Review this migration"
"#)]
pub struct Cli {
    /// The prompt to analyze
    pub prompt: Option<String>,

    /// Task type: sets how many providers must agree
    #[arg(short, long, value_enum, default_value = "basic")]
    pub task_type: TaskTypeArg,

    /// Chain providers, each seeing the previous answer
    #[arg(long)]
    pub sequential: bool,

    /// Session id; keeps rollout routing stable across requests
    #[arg(long, value_name = "ID")]
    pub session: Option<String>,

    /// Upper bound on generated tokens per provider
    #[arg(long, value_name = "N")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    #[arg(long, value_name = "T")]
    pub temperature: Option<f32>,

    /// Sensitive operation the answer will drive (can be specified multiple times)
    #[arg(long, value_name = "MARKER")]
    pub sensitive: Vec<String>,

    /// Reviewer for results that need approval
    #[arg(long, value_enum, default_value = "interactive")]
    pub review: ReviewerKind,

    /// Route this request through the engine whatever the rollout percentage
    #[arg(long)]
    pub full_traffic: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,

    /// Health-check every configured provider and exit
    #[arg(long)]
    pub check_providers: bool,

    /// Also write diagnostic logs to a daily rolling file in this directory
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}
