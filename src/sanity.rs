//! Pre-flight sanity checks for the runtime environment
//!
//! Before a phase touches anything this module verifies:
//! - The tools the phase drives are present in PATH
//! - The installer runs with root privileges (EUID 0)
//!
//! A failed check becomes `InstallError::Preflight` listing every problem
//! and the Gentoo package that provides each missing tool.

use std::process::Command;

use tracing::{debug, info, warn};

use crate::config_file::InstallConfig;
use crate::error::{InstallError, Result};
use crate::process_guard::CommandProcessGroup;

/// Result of environment verification
#[derive(Debug)]
pub struct SanityCheckResult {
    pub missing_binaries: Vec<String>,
    pub is_root: bool,
}

impl SanityCheckResult {
    /// Returns true if all checks passed
    pub fn is_ok(&self) -> bool {
        self.missing_binaries.is_empty() && self.is_root
    }

    /// Human-readable list of problems, one per line
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.is_root {
            problems.push("root privileges required (run with sudo or as root)".to_string());
        }
        for binary in &self.missing_binaries {
            problems.push(format!(
                "missing {} (emerge {})",
                binary,
                get_package_for_binary(binary)
            ));
        }
        problems
    }

    /// `Ok` when every check passed, otherwise a preflight error
    pub fn into_result(self) -> Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(InstallError::Preflight(self.problems().join("; ")))
        }
    }
}

/// Tools driven by the base-system phase
pub const BASE_BINARIES: &[&str] = &[
    "fdisk", "wipefs", "lsblk", "blkid", "mkfs.vfat", "mkswap", "swapon", "mount", "umount",
    "chroot", "tar", "cp", "mkdir",
];

/// Tools driven by the program phase on the booted system
pub const PROGRAM_BINARIES: &[&str] = &["emerge", "git", "chown"];

/// Base-phase tools for this configuration: the fixed set plus the root
/// filesystem's mkfs and, when the clock is synced, chronyd.
pub fn base_binaries(config: &InstallConfig) -> Vec<&'static str> {
    let mut binaries = BASE_BINARIES.to_vec();
    binaries.push(config.disk.root_filesystem.mkfs_program());
    if config.system.sync_clock.is_yes() {
        binaries.push("chronyd");
    }
    binaries
}

/// Check if a binary is available in PATH
fn binary_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .in_new_process_group()
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn is_running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Check root privileges and the presence of `binaries`
pub fn verify_environment(binaries: &[&str]) -> SanityCheckResult {
    let missing = binaries
        .iter()
        .filter(|binary| !binary_exists(binary))
        .map(|binary| binary.to_string())
        .collect();

    SanityCheckResult {
        missing_binaries: missing,
        is_root: is_running_as_root(),
    }
}

/// Map binary names to the Gentoo packages providing them
fn get_package_for_binary(binary: &str) -> &'static str {
    match binary {
        "fdisk" | "wipefs" | "lsblk" | "blkid" | "mkswap" | "swapon" | "mount" | "umount" => {
            "sys-apps/util-linux"
        }
        "mkfs.vfat" => "sys-fs/dosfstools",
        "mkfs.ext4" => "sys-fs/e2fsprogs",
        "mkfs.xfs" => "sys-fs/xfsprogs",
        "mkfs.btrfs" => "sys-fs/btrfs-progs",
        "mkfs.f2fs" => "sys-fs/f2fs-tools",
        "chroot" | "cp" | "mkdir" | "chown" => "sys-apps/coreutils",
        "tar" => "app-arch/tar",
        "chronyd" => "net-misc/chrony",
        "emerge" => "sys-apps/portage",
        "git" => "dev-vcs/git",
        _ => "unknown",
    }
}

/// Skip the root check (development/testing)
/// Set GENTOO_INSTALL_SKIP_ROOT_CHECK=1 to skip
pub fn should_skip_root_check() -> bool {
    std::env::var("GENTOO_INSTALL_SKIP_ROOT_CHECK")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}

/// Run pre-flight checks for a phase needing `binaries`
pub fn run_preflight_checks(binaries: &[&str], skip_root: bool) -> Result<()> {
    debug!("Running pre-flight sanity checks (skip_root={})...", skip_root);

    let mut result = verify_environment(binaries);
    if skip_root || should_skip_root_check() {
        warn!("Root check skipped");
        result.is_root = true;
    }
    result.into_result()?;

    info!("Pre-flight checks passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_exists_sh() {
        assert!(binary_exists("sh"), "sh should be available");
    }

    #[test]
    fn test_binary_exists_nonexistent() {
        assert!(!binary_exists("this_binary_definitely_does_not_exist_12345"));
    }

    #[test]
    fn test_verify_environment_reports_missing() {
        let result = verify_environment(&["sh", "this_binary_definitely_does_not_exist_12345"]);
        assert_eq!(
            result.missing_binaries,
            vec!["this_binary_definitely_does_not_exist_12345".to_string()]
        );
    }

    #[test]
    fn test_base_binaries_follow_config() {
        let mut config = InstallConfig::default();
        config.disk.root_filesystem = crate::types::Filesystem::Xfs;
        config.system.sync_clock = crate::types::Toggle::No;
        let binaries = base_binaries(&config);
        assert!(binaries.contains(&"mkfs.xfs"));
        assert!(binaries.contains(&"fdisk"));
        assert!(!binaries.contains(&"chronyd"));
    }

    #[test]
    fn test_package_mapping() {
        assert_eq!(get_package_for_binary("fdisk"), "sys-apps/util-linux");
        assert_eq!(get_package_for_binary("mkfs.vfat"), "sys-fs/dosfstools");
        assert_eq!(get_package_for_binary("git"), "dev-vcs/git");
    }

    #[test]
    fn test_sanity_result_into_result() {
        let ok_result = SanityCheckResult {
            missing_binaries: vec![],
            is_root: true,
        };
        assert!(ok_result.into_result().is_ok());

        let bad = SanityCheckResult {
            missing_binaries: vec!["mkfs.vfat".to_string()],
            is_root: false,
        };
        let message = bad.into_result().unwrap_err().to_string();
        assert!(message.contains("root privileges required"));
        assert!(message.contains("missing mkfs.vfat (emerge sys-fs/dosfstools)"));
    }
}
