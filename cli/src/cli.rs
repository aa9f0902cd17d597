//! Command-line interface definition.
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Declarative dotfile and tool installation engine.
#[derive(Parser, Debug)]
#[command(
    name = "dotfile",
    about = "Declarative, idempotent dotfile and tool installation engine",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Override the repository root directory
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Manifest file (default: <root>/dotfiles.toml)
    #[arg(long, global = true)]
    pub manifest: Option<PathBuf>,

    /// Override the home directory
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Local override directory (default: <home>/.dotfiles.local)
    #[arg(long, global = true)]
    pub local_dir: Option<PathBuf>,

    /// Evaluate against another platform (macos, linux, arch_linux, windows, unknown)
    #[arg(long, global = true)]
    pub os: Option<String>,

    /// Enable a target option (`windowed` or `emacs.windowed`); repeatable
    #[arg(long = "with", global = true, value_name = "OPTION")]
    pub with: Vec<String>,

    /// Number of targets run concurrently (default: available CPUs)
    #[arg(short, long, global = true)]
    pub jobs: Option<usize>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check, install and configure targets
    Run(RunOpts),
    /// Evaluate checks only and report which targets are satisfied
    Check(CheckOpts),
    /// Print the resolved execution order
    List(ListOpts),
    /// Print a shell completion script
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
    /// Print version information
    Version,
}

/// Options for the `run` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct RunOpts {
    /// Targets to run (default: all)
    pub targets: Vec<String>,

    /// Print the report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

/// Options for the `check` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct CheckOpts {
    /// Targets to check (default: all)
    pub targets: Vec<String>,
}

/// Options for the `list` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct ListOpts {
    /// Targets to list with their closure (default: all)
    pub targets: Vec<String>,
}

impl Command {
    /// Name used for the log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Run(_) => "run",
            Self::Check(_) => "check",
            Self::List(_) => "list",
            Self::Completions { .. } => "completions",
            Self::Version => "version",
        }
    }
}
