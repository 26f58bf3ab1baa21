//! Phase orchestration
//!
//! A phase is a fixed, ordered table of steps. Running a phase runs the
//! selected steps in table order and stops at the first failure.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tracing::{error, info};

use crate::context::InstallContext;
use crate::error::{InstallError, Result};
use crate::install_state::PhaseProgress;
use crate::step::{format_elapsed, run_step, Step};
use crate::steps::{base, boot, disk, kernel, programs, system};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Partition, bootstrap and configure the new system from the live medium
    #[strum(serialize = "base")]
    Base,
    /// Set up the user's programs on the installed system
    #[strum(serialize = "programs")]
    Programs,
}

impl Phase {
    /// File name stem of this phase's log.
    pub fn log_name(self) -> &'static str {
        match self {
            Self::Base => "install-base",
            Self::Programs => "install-programs",
        }
    }

    pub fn steps(self) -> &'static [Step] {
        match self {
            Self::Base => BASE_STEPS,
            Self::Programs => PROGRAM_STEPS,
        }
    }

    /// Whether the phase runs against the live medium and needs its tools.
    pub fn runs_from_live_medium(self) -> bool {
        matches!(self, Self::Base)
    }
}

pub static BASE_STEPS: &[Step] = &[
    Step::new("sync_clock", "Synchronizing the system clock", base::sync_clock),
    Step::new(
        "create_partition_table",
        "Creating a GPT partition table",
        disk::create_partition_table,
    ),
    Step::new("create_boot_partition", "Creating the boot partition", disk::create_boot_partition),
    Step::new("create_swap_partition", "Creating the swap partition", disk::create_swap_partition),
    Step::new("create_root_partition", "Creating the root partition", disk::create_root_partition),
    Step::new("format_partitions", "Formatting partitions", disk::format_partitions),
    Step::new("mount_root", "Mounting the root partition", disk::mount_root),
    Step::new("get_stage3_tarball", "Downloading the stage3 tarball", base::get_stage3_tarball),
    Step::new("extract_stage3", "Extracting the stage3 tarball", base::extract_stage3),
    Step::new("configure_make_conf", "Configuring make.conf", base::configure_make_conf),
    Step::new("copy_dns_info", "Copying DNS information", base::copy_dns_info),
    Step::new(
        "mount_system_filesystems",
        "Mounting the necessary filesystems",
        disk::mount_system_filesystems,
    ),
    Step::new("mount_boot", "Mounting the boot partition", disk::mount_boot),
    Step::new("sync_portage", "Syncing the Portage tree", base::sync_portage),
    Step::new("select_profile", "Selecting a profile", base::select_profile),
    Step::new("update_world", "Updating the @world set", base::update_world),
    Step::new("set_timezone", "Setting the timezone", system::set_timezone),
    Step::new("set_locales", "Configuring locales", system::set_locales),
    Step::new("install_firmware", "Installing firmware", kernel::install_firmware),
    Step::new("build_kernel", "Installing the kernel", kernel::build_kernel),
    Step::new("generate_fstab", "Generating fstab", system::generate_fstab),
    Step::new("set_hostname", "Setting the hostname", system::set_hostname),
    Step::new("set_keymap", "Setting the keymap", system::set_keymap),
    Step::new("configure_network", "Configuring the network", system::configure_network),
    Step::new("install_system_tools", "Installing system tools", system::install_system_tools),
    Step::new("set_root_password", "Setting the root password", system::set_root_password),
    Step::new("install_bootloader", "Installing the bootloader", boot::install_bootloader),
    Step::new("create_user", "Creating the user", system::create_user),
    Step::new("unmount_filesystems", "Unmounting filesystems", disk::unmount_filesystems),
];

pub static PROGRAM_STEPS: &[Step] = &[
    Step::new("install_packages", "Installing packages", programs::install_packages),
    Step::new("clone_dotfiles", "Cloning dotfiles", programs::clone_dotfiles),
    Step::new(
        "install_editor_plugins",
        "Installing editor plugins",
        programs::install_editor_plugins,
    ),
    Step::new("setup_audio", "Setting up audio", programs::setup_audio),
    Step::new("setup_fbsplash", "Setting up the boot splash", programs::setup_fbsplash),
    Step::new("fix_home_ownership", "Fixing home ownership", programs::fix_home_ownership),
];

/// Which part of a phase to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Resume at this step and run everything after it
    pub from: Option<String>,
    /// Run only this step
    pub only: Option<String>,
}

fn position_of(steps: &[Step], phase: Phase, name: &str) -> Result<usize> {
    steps.iter().position(|s| s.name == name).ok_or_else(|| {
        InstallError::validation(format!(
            "unknown step '{}' for phase {} (see `gentoo-install steps {}`)",
            name, phase, phase
        ))
    })
}

/// The steps of `phase` that `options` selects, in table order.
pub fn select_steps(phase: Phase, options: &RunOptions) -> Result<&'static [Step]> {
    let steps = phase.steps();
    match (&options.from, &options.only) {
        (Some(_), Some(_)) => Err(InstallError::validation("--from and --only cannot be combined")),
        (Some(from), None) => Ok(&steps[position_of(steps, phase, from)?..]),
        (None, Some(only)) => {
            let at = position_of(steps, phase, only)?;
            Ok(&steps[at..=at])
        }
        (None, None) => Ok(steps),
    }
}

/// Run the selected steps of `phase`, aborting on the first failure.
///
/// The returned progress is complete on success. On failure the step error
/// is returned; the failing step is logged together with what did finish.
pub fn run_phase(
    phase: Phase,
    ctx: &mut InstallContext,
    options: &RunOptions,
) -> Result<PhaseProgress> {
    let selected = select_steps(phase, options)?;
    let mut progress = PhaseProgress::new(selected.iter().map(|s| s.name).collect());
    progress.finish_if_empty();

    info!(
        "Starting phase {} ({} step(s){})",
        phase,
        selected.len(),
        if ctx.dry_run() { ", dry run" } else { "" }
    );
    let started = Instant::now();

    let total = selected.len();
    for (i, step) in selected.iter().enumerate() {
        progress.start(step.name)?;
        match run_step(step, ctx, i + 1, total) {
            Ok(elapsed) => progress.complete(elapsed)?,
            Err(e) => {
                progress.fail()?;
                error!(
                    "Phase {} aborted at {} after {} completed step(s)",
                    phase,
                    step.name,
                    progress.completed().len()
                );
                info!(
                    "Fix the problem, then resume with: gentoo-install {} --from {}",
                    phase, step.name
                );
                return Err(e);
            }
        }
    }

    info!("Phase {} finished in {}", phase, format_elapsed(started.elapsed()));
    Ok(progress)
}

/// Human-readable table of a phase's steps.
pub fn list_steps(phase: Phase) -> String {
    let steps = phase.steps();
    let width = steps.iter().map(|s| s.name.len()).max().unwrap_or(0);
    let mut out = format!("Steps of phase {}:\n", phase);
    for (i, step) in steps.iter().enumerate() {
        out.push_str(&format!(
            "{:>3}  {:<width$}  {}\n",
            i + 1,
            step.name,
            step.description,
            width = width
        ));
    }
    out
}
