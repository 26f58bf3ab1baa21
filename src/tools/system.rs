//! Type-safe arguments for system tools.
//!
//! - `TarExtractArgs` for unpacking the stage3 tarball
//! - `CopyArgs`, `MkdirArgs`, `SymlinkArgs` for file plumbing
//! - `ChronydArgs` for the one-shot clock sync
//! - `ServiceArgs` for `rc-update` / `systemctl`
//! - `GrubInstallArgs`, `GrubMkconfigArgs` for the bootloader

use std::path::PathBuf;

use crate::tool_args::ToolArgs;
use crate::types::InitSystem;

// ============================================================================
// Files
// ============================================================================

/// `tar xpf <archive> --xattrs-include='*.*' --numeric-owner -C <target>`
///
/// `p` keeps permissions, `--numeric-owner` keeps IDs from the tarball
/// instead of mapping names through the live system's passwd.
#[derive(Debug, Clone)]
pub struct TarExtractArgs {
    pub archive: PathBuf,
    pub target: PathBuf,
}

impl ToolArgs for TarExtractArgs {
    fn program(&self) -> &str {
        "tar"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "xpf".to_string(),
            self.archive.display().to_string(),
            "--xattrs-include=*.*".to_string(),
            "--numeric-owner".to_string(),
            "-C".to_string(),
            self.target.display().to_string(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct CopyArgs {
    pub source: PathBuf,
    pub dest: PathBuf,
    /// `--dereference`: copy the file a symlink points to
    pub dereference: bool,
}

impl ToolArgs for CopyArgs {
    fn program(&self) -> &str {
        "cp"
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.dereference {
            args.push("--dereference".to_string());
        }
        args.push(self.source.display().to_string());
        args.push(self.dest.display().to_string());
        args
    }
}

/// `mkdir -p <path>`
#[derive(Debug, Clone)]
pub struct MkdirArgs {
    pub path: PathBuf,
}

impl ToolArgs for MkdirArgs {
    fn program(&self) -> &str {
        "mkdir"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["-p".to_string(), self.path.display().to_string()]
    }
}

/// `ln -sfn <target> <link>`
#[derive(Debug, Clone)]
pub struct SymlinkArgs {
    pub target: PathBuf,
    pub link: PathBuf,
}

impl ToolArgs for SymlinkArgs {
    fn program(&self) -> &str {
        "ln"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "-sfn".to_string(),
            self.target.display().to_string(),
            self.link.display().to_string(),
        ]
    }
}

/// `chronyd -q`: set the clock once and exit.
#[derive(Debug, Clone, Default)]
pub struct ChronydArgs;

impl ToolArgs for ChronydArgs {
    fn program(&self) -> &str {
        "chronyd"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["-q".to_string()]
    }
}

// ============================================================================
// Services
// ============================================================================

/// Enable a service at boot.
///
/// | Init    | Command                              |
/// |---------|--------------------------------------|
/// | OpenRC  | `rc-update add <service> <runlevel>` |
/// | systemd | `systemctl enable <service>`         |
#[derive(Debug, Clone)]
pub struct ServiceArgs {
    pub init: InitSystem,
    pub service: String,
    /// OpenRC runlevel; ignored by systemd
    pub runlevel: String,
}

impl ServiceArgs {
    pub fn enable(init: InitSystem, service: &str) -> Self {
        Self {
            init,
            service: service.to_string(),
            runlevel: "default".to_string(),
        }
    }

    pub fn enable_at(init: InitSystem, service: &str, runlevel: &str) -> Self {
        Self {
            init,
            service: service.to_string(),
            runlevel: runlevel.to_string(),
        }
    }
}

impl ToolArgs for ServiceArgs {
    fn program(&self) -> &str {
        match self.init {
            InitSystem::OpenRc => "rc-update",
            InitSystem::Systemd => "systemctl",
        }
    }

    fn to_cli_args(&self) -> Vec<String> {
        match self.init {
            InitSystem::OpenRc => vec![
                "add".to_string(),
                self.service.clone(),
                self.runlevel.clone(),
            ],
            InitSystem::Systemd => vec!["enable".to_string(), self.service.clone()],
        }
    }
}

// ============================================================================
// Bootloader
// ============================================================================

/// Where GRUB goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrubTarget {
    /// `--target=x86_64-efi --efi-directory=<dir>`
    Efi { efi_directory: PathBuf },
    /// `--target=i386-pc <disk>`
    Bios { disk: PathBuf },
}

#[derive(Debug, Clone)]
pub struct GrubInstallArgs {
    pub target: GrubTarget,
    /// EFI boot entry name
    pub bootloader_id: String,
}

impl ToolArgs for GrubInstallArgs {
    fn program(&self) -> &str {
        "grub-install"
    }

    fn to_cli_args(&self) -> Vec<String> {
        match self.target {
            GrubTarget::Efi { ref efi_directory } => vec![
                "--target=x86_64-efi".to_string(),
                format!("--efi-directory={}", efi_directory.display()),
                format!("--bootloader-id={}", self.bootloader_id),
            ],
            GrubTarget::Bios { ref disk } => {
                vec!["--target=i386-pc".to_string(), disk.display().to_string()]
            }
        }
    }
}

/// `grub-mkconfig -o <output>`
#[derive(Debug, Clone)]
pub struct GrubMkconfigArgs {
    pub output: PathBuf,
}

impl Default for GrubMkconfigArgs {
    fn default() -> Self {
        Self {
            output: PathBuf::from("/boot/grub/grub.cfg"),
        }
    }
}

impl ToolArgs for GrubMkconfigArgs {
    fn program(&self) -> &str {
        "grub-mkconfig"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["-o".to_string(), self.output.display().to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tar_extract_args() {
        let args = TarExtractArgs {
            archive: PathBuf::from("/mnt/gentoo/stage3-amd64-openrc-20240929T163611Z.tar.xz"),
            target: PathBuf::from("/mnt/gentoo"),
        };
        let cli = args.to_cli_args();
        assert_eq!(cli[0], "xpf");
        assert!(cli.contains(&"--numeric-owner".to_string()));
        assert_eq!(cli[cli.len() - 2..], ["-C".to_string(), "/mnt/gentoo".to_string()]);
    }

    #[test]
    fn test_service_args_per_init() {
        let openrc = ServiceArgs::enable(InitSystem::OpenRc, "dhcpcd");
        assert_eq!(openrc.program(), "rc-update");
        assert_eq!(openrc.to_cli_args(), vec!["add", "dhcpcd", "default"]);

        let boot = ServiceArgs::enable_at(InitSystem::OpenRc, "alsasound", "boot");
        assert_eq!(boot.to_cli_args(), vec!["add", "alsasound", "boot"]);

        let systemd = ServiceArgs::enable(InitSystem::Systemd, "dhcpcd");
        assert_eq!(systemd.program(), "systemctl");
        assert_eq!(systemd.to_cli_args(), vec!["enable", "dhcpcd"]);
    }

    #[test]
    fn test_grub_install_targets() {
        let efi = GrubInstallArgs {
            target: GrubTarget::Efi {
                efi_directory: PathBuf::from("/efi"),
            },
            bootloader_id: "Gentoo".to_string(),
        };
        assert_eq!(
            efi.to_cli_args(),
            vec!["--target=x86_64-efi", "--efi-directory=/efi", "--bootloader-id=Gentoo"]
        );

        let bios = GrubInstallArgs {
            target: GrubTarget::Bios {
                disk: PathBuf::from("/dev/sda"),
            },
            bootloader_id: "Gentoo".to_string(),
        };
        assert_eq!(bios.to_cli_args(), vec!["--target=i386-pc", "/dev/sda"]);
    }

    #[test]
    fn test_grub_mkconfig_default_output() {
        assert_eq!(
            GrubMkconfigArgs::default().to_cli_args(),
            vec!["-o", "/boot/grub/grub.cfg"]
        );
    }
}
