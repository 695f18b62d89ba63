//! Clap derive structures for the `unistate` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// unistate -- declarative state management for UniFi-style controllers
#[derive(Debug, Parser)]
#[command(
    name = "unistate",
    version,
    about = "Converge a network controller to a declared configuration",
    long_about = "Converge a network controller to a declared configuration.\n\n\
        Validates a desired-state document, diffs it against the live\n\
        controller, and applies the minimal ordered changeset. Entities\n\
        created by other means are never deleted.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Controller profile to use
    #[arg(long, short = 'p', env = "UNISTATE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Controller URL (overrides profile)
    #[arg(long, short = 'c', env = "UNISTATE_CONTROLLER", global = true)]
    pub controller: Option<String>,

    /// Site to operate on
    #[arg(long, short = 's', env = "UNISTATE_SITE", global = true)]
    pub site: Option<String>,

    /// API key
    #[arg(long, env = "UNISTATE_API_KEY", global = true, hide_env = true)]
    pub api_key: Option<String>,

    /// Username for session auth (password via UNISTATE_PASSWORD)
    #[arg(long, short = 'u', env = "UNISTATE_USERNAME", global = true)]
    pub username: Option<String>,

    /// Directory of extracted schema descriptors
    #[arg(long, env = "UNISTATE_SCHEMA_DIR", global = true)]
    pub schema_dir: Option<PathBuf>,

    /// Secrets file (key=value lines) for secret references
    #[arg(long, env = "UNISTATE_SECRETS_FILE", global = true)]
    pub secrets_file: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "UNISTATE_OUTPUT",
        default_value = "text",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "UNISTATE_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "UNISTATE_TIMEOUT", default_value = "30", global = true)]
    pub timeout: u64,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default)
    Text,
    /// Pretty-printed JSON
    Json,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate a desired-state document (no controller contact)
    #[command(alias = "check")]
    Validate(ValidateArgs),

    /// Show the changeset that would converge the controller
    #[command(alias = "plan")]
    Diff(DiffArgs),

    /// Apply the changeset to the controller
    #[command(alias = "apply")]
    Deploy(DeployArgs),

    /// Inspect extracted schema descriptors
    Schema(SchemaArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Desired-state document (JSON or YAML)
    pub config: PathBuf,
}

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Desired-state document (JSON or YAML)
    pub config: PathBuf,
}

#[derive(Debug, Args)]
pub struct DeployArgs {
    /// Desired-state document (JSON or YAML)
    pub config: PathBuf,

    /// Plan every operation without mutating the controller
    #[arg(long)]
    pub dry_run: bool,

    /// Concurrent in-flight operations per stage
    #[arg(long, default_value = "4")]
    pub concurrency: usize,
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    #[command(subcommand)]
    pub command: SchemaCommand,
}

#[derive(Debug, Subcommand)]
pub enum SchemaCommand {
    /// List known schema versions
    List,
    /// Show one descriptor's collections and fields
    #[command(disable_version_flag = true)]
    Show {
        /// Version to show (defaults to latest)
        version: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
