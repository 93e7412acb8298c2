//! Clap derive structures for the `unitstate` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use unitstate_core::{Mode, Who};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// unitstate -- live view of systemd units
#[derive(Debug, Parser)]
#[command(
    name = "unitstate",
    version,
    about = "Inspect, watch and control systemd units",
    long_about = "Mirrors systemd unit properties over D-Bus.\n\n\
        Reads go through a local property cache; `watch` follows\n\
        PropertiesChanged signals and prints lifecycle transitions as they happen.",
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
    /// Talk to the per-user manager on the session bus
    #[arg(long, global = true, conflicts_with = "address")]
    pub user: bool,

    /// Talk to the system manager (default)
    #[arg(long, global = true, conflicts_with_all = ["user", "address"])]
    pub system: bool,

    /// Explicit D-Bus address
    #[arg(long, env = "UNITSTATE_ADDRESS", global = true)]
    pub address: Option<String>,

    /// Output format [default: from config, else table]
    #[arg(long, short = 'o', env = "UNITSTATE_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output [default: from config, else auto]
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Manager call timeout in seconds [default: from config]
    #[arg(long, env = "UNITSTATE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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
    /// Show the lifecycle state of units
    #[command(alias = "st")]
    Status(UnitsArgs),

    /// Read unit properties
    Get(GetArgs),

    /// Follow lifecycle transitions until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Start units
    Start(VerbArgs),

    /// Stop units
    Stop(VerbArgs),

    /// Restart units
    Restart(VerbArgs),

    /// Reload unit configuration
    Reload(VerbArgs),

    /// Restart units that are running
    TryRestart(VerbArgs),

    /// Reload units if supported, otherwise restart them
    ReloadOrRestart(VerbArgs),

    /// Reload units if supported, otherwise restart them if running
    ReloadOrTryRestart(VerbArgs),

    /// Send a signal to unit processes
    Kill(KillArgs),

    /// Clear the failed state of units
    ResetFailed(UnitsArgs),

    /// Manage configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Unit commands ────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct UnitsArgs {
    /// Unit names; a name without suffix means `.service`
    #[arg(required = true)]
    pub units: Vec<String>,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Unit name
    pub unit: String,

    /// Property names (all properties if omitted)
    pub properties: Vec<String>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Unit names
    #[arg(required = true)]
    pub units: Vec<String>,

    /// Exit after this many transitions
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

#[derive(Debug, Args)]
pub struct VerbArgs {
    /// Unit names
    #[arg(required = true)]
    pub units: Vec<String>,

    /// Job mode (replace, fail, isolate, ignore-dependencies, ignore-requirements)
    #[arg(long, short = 'm')]
    pub mode: Option<Mode>,

    /// Wait for each unit to settle before returning
    #[arg(long)]
    pub wait: bool,

    /// Upper bound on --wait, in seconds
    #[arg(long, default_value = "90", requires = "wait")]
    pub wait_timeout: u64,
}

#[derive(Debug, Args)]
pub struct KillArgs {
    /// Unit names
    #[arg(required = true)]
    pub units: Vec<String>,

    /// Which processes to signal (main, control, all)
    #[arg(long, default_value = "all")]
    pub who: Who,

    /// Signal number
    #[arg(long, short = 's', default_value = "15")]
    pub signal: i32,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Print the config file path
    Path,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: Shell,
}
