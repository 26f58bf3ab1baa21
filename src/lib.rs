//! Gentoo Linux installer library
//!
//! Installation is split into two phases of ordered, logged steps. Every
//! external program runs through an [`executor::Executor`], which either
//! executes it or records it for dry runs and tests.

pub mod chroot;
pub mod cli;
pub mod config_file;
pub mod context;
pub mod download;
pub mod error;
pub mod eselect;
pub mod executor;
pub mod hardware;
pub mod install_state;
pub mod logging;
pub mod partition;
pub mod phases;
pub mod process_guard;
pub mod prompt;
pub mod sanity;
pub mod step;
pub mod steps;
pub mod substitute;
pub mod tool_args;
pub mod tools;
pub mod types;

// Re-export main types for convenience
pub use config_file::InstallConfig;
pub use context::InstallContext;
pub use error::{InstallError, Result};
pub use executor::{Cmd, CmdOutput, Executor, RecordingExecutor, SystemExecutor};
pub use hardware::{FirmwareMode, NetworkState};
pub use install_state::{PhaseProgress, PhaseStatus, ProgressError};
pub use phases::{list_steps, run_phase, select_steps, Phase, RunOptions};
pub use process_guard::{ChildRegistry, CommandProcessGroup};
pub use step::Step;
pub use tool_args::ToolArgs;
pub use types::{BootMode, Filesystem, InitSystem, KernelMethod, Toggle};
