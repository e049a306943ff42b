use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "steward")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative macOS provisioning - converge the machine toward its manifest", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile the system toward the manifest
    Apply(ApplyArgs),

    /// Show current state vs the manifest, without changing anything
    Status(StatusArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Manifest path (default: ~/.config/steward/steward.toml)
    #[arg(short, long, env = "STEWARD_MANIFEST")]
    pub config: Option<PathBuf>,

    /// Preview changes without applying them
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip resources requiring root (and their dependents)
    #[arg(long)]
    pub user_only: bool,

    /// Stop scheduling further resources after the first failure
    #[arg(long)]
    pub halt: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Emit the run report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct StatusArgs {
    /// Manifest path (default: ~/.config/steward/steward.toml)
    #[arg(short, long, env = "STEWARD_MANIFEST")]
    pub config: Option<PathBuf>,

    /// Emit the status as JSON
    #[arg(long)]
    pub json: bool,
}
