//! Clap derive structures for the `panrule` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.
//! This file is also compiled by `build.rs` for man pages, so it may only
//! depend on clap, clap_complete and humantime.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// panrule -- keep ordered groups of PAN-OS policy rules in place
#[derive(Debug, Parser)]
#[command(
    name = "panrule",
    version,
    about = "Manage PAN-OS policy rule groups from the command line",
    long_about = "Reconciles declared groups of security, NAT and decryption rules\n\
        against firewall and Panorama rulebases, leaving rules owned by\n\
        anyone else untouched.",
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
    /// Appliance profile to use
    #[arg(long, short = 'p', env = "PANRULE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Management URL or hostname (overrides profile)
    #[arg(long, short = 'H', env = "PANRULE_HOST", global = true)]
    pub host: Option<String>,

    /// API key (overrides profile credentials)
    #[arg(long, env = "PANRULE_API_KEY", global = true, hide_env = true)]
    pub api_key: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "PANRULE_OUTPUT",
        default_value = "table",
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
    #[arg(long, short = 'k', env = "PANRULE_INSECURE", global = true)]
    pub insecure: bool,

    /// Per-request timeout in seconds (overrides profile)
    #[arg(long, env = "PANRULE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Deadline for a whole operation, e.g. "90s" or "10m"
    #[arg(long, global = true)]
    pub operation_timeout: Option<humantime::Duration>,

    /// Skip platform detection and assume this topology
    #[arg(long, env = "PANRULE_TOPOLOGY", global = true)]
    pub topology: Option<TopologyArg>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
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

// ── Domain value enums ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FamilyArg {
    Security,
    Nat,
    Decryption,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TopologyArg {
    /// A single firewall
    Standalone,
    /// Panorama
    Controller,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RulebaseArg {
    Rulebase,
    PreRulebase,
    PostRulebase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PositionArg {
    Top,
    Bottom,
    Before,
    DirectlyBefore,
    After,
    DirectlyAfter,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage a contiguous group of rules inside a shared rulebase
    #[command(alias = "g")]
    Group(GroupArgs),

    /// Manage a whole rulebase as one resource
    Policy(PolicyArgs),

    /// Inspect and reorder rules directly
    #[command(alias = "r")]
    Rules(RulesArgs),

    /// Print the attribute schema of a resource
    Schema(SchemaArgs),

    /// Decode and encode resource identities offline
    #[command(alias = "id")]
    Identity(IdentityArgs),

    /// Inspect CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared Arguments ─────────────────────────────────────────────────

/// Where the local state of one resource lives.
#[derive(Debug, Args)]
pub struct StateArgs {
    /// State file (JSON)
    #[arg(long, short = 's')]
    pub state: PathBuf,

    /// Rule family; taken from the state file when omitted
    #[arg(long, short = 'f')]
    pub family: Option<FamilyArg>,
}

/// Rulebase selection for commands that address rules directly.
#[derive(Debug, Args)]
pub struct LocationArgs {
    /// Rule family
    #[arg(long, short = 'f', default_value = "security")]
    pub family: FamilyArg,

    /// Panorama device group
    #[arg(long, short = 'd')]
    pub device_group: Option<String>,

    /// Rulebase slot
    #[arg(long)]
    pub rulebase: Option<RulebaseArg>,

    /// Firewall virtual system
    #[arg(long)]
    pub vsys: Option<String>,
}

// ── Resource commands ────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GroupArgs {
    #[command(subcommand)]
    pub command: ResourceCommand,
}

#[derive(Debug, Args)]
pub struct PolicyArgs {
    #[command(subcommand)]
    pub command: ResourceCommand,
}

#[derive(Debug, Subcommand)]
pub enum ResourceCommand {
    /// Create or update from a declaration file
    Apply {
        #[command(flatten)]
        state: StateArgs,

        /// Declared attributes (YAML or JSON)
        #[arg(long = "file", short = 'F')]
        file: PathBuf,
    },

    /// Refresh the state file from the appliance
    Read {
        #[command(flatten)]
        state: StateArgs,
    },

    /// Delete the managed rules and the state file
    Delete {
        #[command(flatten)]
        state: StateArgs,
    },

    /// Upgrade a state file written by an older version, offline
    Migrate {
        #[command(flatten)]
        state: StateArgs,
    },
}

// ── Rules ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommand,
}

#[derive(Debug, Subcommand)]
pub enum RulesCommand {
    /// List every rule in a rulebase, in order
    #[command(alias = "ls")]
    List {
        #[command(flatten)]
        location: LocationArgs,
    },

    /// Move existing rules into one contiguous run
    Move {
        #[command(flatten)]
        location: LocationArgs,

        /// Where the run goes
        #[arg(long)]
        position: Option<PositionArg>,

        /// Reference rule for before/after positions
        #[arg(long)]
        reference: Option<String>,

        /// Rules to move, in their desired order
        #[arg(required = true)]
        names: Vec<String>,
    },
}

// ── Schema ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SchemaResource {
    Group,
    Policy,
    Rules,
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// Rule family
    #[arg(long, short = 'f', default_value = "security")]
    pub family: FamilyArg,

    /// Which resource
    #[arg(long, short = 'r', default_value = "group")]
    pub resource: SchemaResource,
}

// ── Identity ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct IdentityArgs {
    #[command(subcommand)]
    pub command: IdentityCommand,
}

#[derive(Debug, Subcommand)]
pub enum IdentityCommand {
    /// Decode a group or policy identity, including historical layouts
    Decode {
        /// The identity string
        id: String,

        /// Rule family
        #[arg(long, short = 'f', default_value = "security")]
        family: FamilyArg,

        /// Decode as a policy identity
        #[arg(long)]
        policy: bool,
    },

    /// Build a group identity in the current layout
    Encode {
        #[command(flatten)]
        location: LocationArgs,

        #[arg(long)]
        position: Option<PositionArg>,

        #[arg(long)]
        reference: Option<String>,

        /// Rule names, in order
        names: Vec<String>,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Print the effective configuration with secrets masked
    Show,

    /// List configured profiles
    Profiles,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
