use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::phases::{Phase, RunOptions};

/// Log directory for real installs
pub const DEFAULT_LOG_DIR: &str = "/var/log/gentoo-install";

/// Gentoo Linux installer
#[derive(Parser, Debug)]
#[command(name = "gentoo-install")]
#[command(about = "Installs Gentoo Linux from a live medium, one logged step at a time")]
#[command(version)]
pub struct Cli {
    /// JSON configuration file (built-in defaults when omitted)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Record and log every command without running anything destructive.
    ///
    /// File edits are skipped as well; lookups such as `eselect ... list`
    /// are answered from canned output.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Directory for the per-phase log files
    /// [default: /var/log/gentoo-install, or the current directory with --dry-run]
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Partition, bootstrap and configure the base system
    Base(StepSelection),
    /// Install and configure programs on the installed system
    Programs(StepSelection),
    /// List the steps of a phase
    Steps {
        /// Phase to list (base, programs)
        phase: Phase,
    },
    /// Configuration file tools
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// `--from` / `--only` for the phase commands
#[derive(Args, Debug, Clone, Default)]
pub struct StepSelection {
    /// Resume at this step
    #[arg(long, value_name = "STEP", conflicts_with = "only")]
    pub from: Option<String>,

    /// Run only this step
    #[arg(long, value_name = "STEP")]
    pub only: Option<String>,
}

impl From<StepSelection> for RunOptions {
    fn from(selection: StepSelection) -> Self {
        RunOptions {
            from: selection.from,
            only: selection.only,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write the default configuration to a file
    Init {
        file: PathBuf,
    },
    /// Check a configuration file
    Validate {
        file: PathBuf,
    },
    /// Print the effective configuration as JSON
    Show,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Where the phase log goes. A dry run needs no root-owned directory.
    pub fn effective_log_dir(&self) -> PathBuf {
        match (&self.log_dir, self.dry_run) {
            (Some(dir), _) => dir.clone(),
            (None, true) => PathBuf::from("."),
            (None, false) => PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}
