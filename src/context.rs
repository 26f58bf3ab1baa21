//! Everything a step needs: configuration, the executor, prompting and
//! fetching, plus derived facts such as the firmware mode and the partition
//! layout.

use std::path::{Path, PathBuf};

use crate::chroot;
use crate::config_file::InstallConfig;
use crate::download::Fetcher;
use crate::error::Result;
use crate::executor::{Cmd, CmdOutput, Executor};
use crate::hardware::FirmwareMode;
use crate::partition::{self, PartitionKind, PartitionSpec};
use crate::prompt::Prompter;
use crate::tool_args::ToolArgs;

/// Environment variable presetting the root password
pub const ROOT_PASSWORD_ENV: &str = "GENTOO_ROOT_PASSWORD";
/// Environment variable presetting the regular user's password
pub const USER_PASSWORD_ENV: &str = "GENTOO_USER_PASSWORD";

/// Partition numbers and device nodes derived from the disk config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionLayout {
    pub boot: PartitionSpec,
    pub swap: Option<PartitionSpec>,
    pub root: PartitionSpec,
    disk: PathBuf,
}

impl PartitionLayout {
    pub fn new(config: &InstallConfig, firmware: FirmwareMode) -> Self {
        let boot_kind = match firmware {
            FirmwareMode::Uefi => PartitionKind::Efi,
            FirmwareMode::Bios => PartitionKind::BiosBoot,
        };
        // A BIOS boot partition only holds GRUB's core image.
        let boot_size = match firmware {
            FirmwareMode::Uefi => config.disk.boot_size.clone(),
            FirmwareMode::Bios => "+1M".to_string(),
        };
        let swap = config.has_swap().then(|| PartitionSpec {
            number: 2,
            size: Some(config.disk.swap_size.trim().to_string()),
            kind: PartitionKind::Swap,
        });
        let root_number = if swap.is_some() { 3 } else { 2 };
        Self {
            boot: PartitionSpec {
                number: 1,
                size: Some(boot_size),
                kind: boot_kind,
            },
            swap,
            root: PartitionSpec {
                number: root_number,
                size: None,
                kind: PartitionKind::Linux,
            },
            disk: PathBuf::from(&config.disk.device),
        }
    }

    pub fn boot_device(&self) -> PathBuf {
        partition::partition_device(&self.disk, self.boot.number)
    }

    pub fn swap_device(&self) -> Option<PathBuf> {
        self.swap
            .as_ref()
            .map(|spec| partition::partition_device(&self.disk, spec.number))
    }

    pub fn root_device(&self) -> PathBuf {
        partition::partition_device(&self.disk, self.root.number)
    }
}

/// Shared state handed to every step.
pub struct InstallContext {
    pub config: InstallConfig,
    pub exec: Box<dyn Executor>,
    pub prompter: Box<dyn Prompter>,
    pub fetcher: Box<dyn Fetcher>,
    pub firmware: FirmwareMode,
    /// Preset passwords for unattended runs
    pub root_password: Option<String>,
    pub user_password: Option<String>,
}

impl InstallContext {
    pub fn new(
        config: InstallConfig,
        exec: Box<dyn Executor>,
        prompter: Box<dyn Prompter>,
        fetcher: Box<dyn Fetcher>,
        firmware: FirmwareMode,
    ) -> Self {
        Self {
            config,
            exec,
            prompter,
            fetcher,
            firmware,
            root_password: None,
            user_password: None,
        }
    }

    /// Take preset passwords from `GENTOO_ROOT_PASSWORD` / `GENTOO_USER_PASSWORD`.
    pub fn with_env_passwords(mut self) -> Self {
        self.root_password = std::env::var(ROOT_PASSWORD_ENV).ok();
        self.user_password = std::env::var(USER_PASSWORD_ENV).ok();
        self
    }

    pub fn with_passwords(mut self, root: Option<String>, user: Option<String>) -> Self {
        self.root_password = root;
        self.user_password = user;
        self
    }

    pub fn dry_run(&self) -> bool {
        self.exec.dry_run()
    }

    pub fn disk(&self) -> PathBuf {
        PathBuf::from(&self.config.disk.device)
    }

    pub fn layout(&self) -> PartitionLayout {
        PartitionLayout::new(&self.config, self.firmware)
    }

    /// Mount point of the new system on the live host.
    pub fn root(&self) -> &Path {
        Path::new(&self.config.disk.mount_point)
    }

    /// Host path of a file inside the new system.
    pub fn target_path(&self, inside: &str) -> PathBuf {
        chroot::target_path(self.root(), inside)
    }

    /// Where the ESP is mounted inside the new system.
    pub fn efi_dir(&self) -> &'static str {
        "/efi"
    }

    pub fn run(&self, cmd: &Cmd) -> Result<CmdOutput> {
        self.exec.run(cmd)
    }

    pub fn run_tool(&self, args: &dyn ToolArgs) -> Result<CmdOutput> {
        self.exec.run_tool(args)
    }

    /// Run inside the new system.
    pub fn chroot(&self, cmd: &Cmd) -> Result<CmdOutput> {
        self.exec.run(&chroot::chroot_cmd(self.root(), cmd))
    }

    pub fn chroot_tool(&self, args: &dyn ToolArgs) -> Result<CmdOutput> {
        self.chroot(&args.to_cmd())
    }

    /// Run inside the new system and return trimmed stdout.
    pub fn chroot_capture(&self, cmd: &Cmd) -> Result<String> {
        self.exec.capture(&chroot::chroot_cmd(self.root(), cmd))
    }

    // ========================================================================
    // Program phase target
    // ========================================================================

    /// Root the program phase works on, if not the running system.
    pub fn program_root(&self) -> Option<&Path> {
        self.config.programs.root.as_deref().map(Path::new)
    }

    /// Run on the program phase target: chrooted when a root is configured.
    pub fn target_run(&self, args: &dyn ToolArgs) -> Result<CmdOutput> {
        let cmd = args.to_cmd();
        match self.program_root() {
            Some(root) => self.exec.run(&chroot::chroot_cmd(root, &cmd)),
            None => self.exec.run(&cmd),
        }
    }

    /// Host path of a file on the program phase target.
    pub fn target_file(&self, inside: &str) -> PathBuf {
        match self.program_root() {
            Some(root) => chroot::target_path(root, inside),
            None => PathBuf::from(inside),
        }
    }

    /// Home directory of the configured user, as seen from the target.
    pub fn home_dir(&self) -> String {
        format!("/home/{}", self.config.user.username)
    }
}
