//! Type-safe arguments for disk tools.
//!
//! - `FdiskArgs` for `fdisk` (scripted through stdin)
//! - `WipefsArgs` for `wipefs`
//! - `MkfsArgs` / `MkfsVfatArgs` for `mkfs.*`
//! - `MkswapArgs` / `SwaponArgs` for swap
//! - `MountArgs` / `UmountArgs` for mounts
//! - `LsblkArgs` / `BlkidArgs` for inspection

use std::path::PathBuf;

use crate::tool_args::ToolArgs;
use crate::types::Filesystem;

/// Locale pinned for tools whose output or dialog we depend on.
fn c_locale() -> Vec<(String, String)> {
    vec![("LC_ALL".to_string(), "C".to_string())]
}

// ============================================================================
// fdisk
// ============================================================================

/// Type-safe arguments for `fdisk`, driven by a keystroke script on stdin.
///
/// `--wipe always` and `--wipe-partitions always` stop fdisk from asking
/// whether to remove old signatures, a question the script would not answer.
#[derive(Debug, Clone)]
pub struct FdiskArgs {
    /// Whole-disk device (e.g. `/dev/sda`).
    pub disk: PathBuf,
    /// Keystrokes, one answer per line, ending with `w`.
    pub script: String,
}

impl ToolArgs for FdiskArgs {
    fn program(&self) -> &str {
        "fdisk"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "--wipe".to_string(),
            "always".to_string(),
            "--wipe-partitions".to_string(),
            "always".to_string(),
            self.disk.display().to_string(),
        ]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        c_locale()
    }

    fn stdin_input(&self) -> Option<String> {
        Some(self.script.clone())
    }
}

/// `wipefs -a <device>`: drop all filesystem and partition-table signatures.
#[derive(Debug, Clone)]
pub struct WipefsArgs {
    pub device: PathBuf,
}

impl ToolArgs for WipefsArgs {
    fn program(&self) -> &str {
        "wipefs"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["-a".to_string(), self.device.display().to_string()]
    }
}

// ============================================================================
// Filesystems
// ============================================================================

/// Type-safe arguments for `mkfs.<fs>` on the root partition.
///
/// | Filesystem | Program      | Force | Label flag |
/// |------------|--------------|-------|------------|
/// | ext4       | `mkfs.ext4`  | none  | `-L`       |
/// | xfs        | `mkfs.xfs`   | `-f`  | `-L`       |
/// | btrfs      | `mkfs.btrfs` | `-f`  | `-L`       |
/// | f2fs       | `mkfs.f2fs`  | `-f`  | `-l`       |
#[derive(Debug, Clone)]
pub struct MkfsArgs {
    pub device: PathBuf,
    pub filesystem: Filesystem,
    pub label: Option<String>,
}

impl ToolArgs for MkfsArgs {
    fn program(&self) -> &str {
        self.filesystem.mkfs_program()
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(flag) = self.filesystem.force_flag() {
            args.push(flag.to_string());
        }
        if let Some(ref label) = self.label {
            let flag = match self.filesystem {
                Filesystem::F2fs => "-l",
                _ => "-L",
            };
            args.push(flag.to_string());
            args.push(label.clone());
        }
        args.push(self.device.display().to_string());
        args
    }
}

/// `mkfs.vfat -F 32` for the EFI System Partition.
#[derive(Debug, Clone)]
pub struct MkfsVfatArgs {
    pub device: PathBuf,
    pub label: Option<String>,
}

impl ToolArgs for MkfsVfatArgs {
    fn program(&self) -> &str {
        "mkfs.vfat"
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec!["-F".to_string(), "32".to_string()];
        if let Some(ref label) = self.label {
            args.push("-n".to_string());
            args.push(label.clone());
        }
        args.push(self.device.display().to_string());
        args
    }
}

#[derive(Debug, Clone)]
pub struct MkswapArgs {
    pub device: PathBuf,
}

impl ToolArgs for MkswapArgs {
    fn program(&self) -> &str {
        "mkswap"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![self.device.display().to_string()]
    }
}

#[derive(Debug, Clone)]
pub struct SwaponArgs {
    pub device: PathBuf,
}

impl ToolArgs for SwaponArgs {
    fn program(&self) -> &str {
        "swapon"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![self.device.display().to_string()]
    }
}

// ============================================================================
// Mounts
// ============================================================================

/// Extra behaviour flags for `mount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountFlag {
    Bind,
    Rbind,
    MakeSlave,
    MakeRslave,
}

impl MountFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            MountFlag::Bind => "--bind",
            MountFlag::Rbind => "--rbind",
            MountFlag::MakeSlave => "--make-slave",
            MountFlag::MakeRslave => "--make-rslave",
        }
    }
}

/// Type-safe arguments for `mount`.
///
/// Output order: flags, `--types`, `-o`, source, target. A propagation
/// change (`--make-rslave`) has no source.
#[derive(Debug, Clone)]
pub struct MountArgs {
    pub source: Option<String>,
    pub target: PathBuf,
    pub fs_type: Option<String>,
    pub options: Option<String>,
    pub flags: Vec<MountFlag>,
}

impl MountArgs {
    /// Plain `mount <device> <target>`.
    pub fn device(source: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: Some(source.into()),
            target: target.into(),
            fs_type: None,
            options: None,
            flags: vec![],
        }
    }

    /// `mount --types <fs_type> <fs_type> <target>` for pseudo filesystems.
    pub fn pseudo(fs_type: &str, target: impl Into<PathBuf>) -> Self {
        Self {
            source: Some(fs_type.to_string()),
            target: target.into(),
            fs_type: Some(fs_type.to_string()),
            options: None,
            flags: vec![],
        }
    }

    /// `mount <flag> <source> <target>` (bind mounts).
    pub fn bind(flag: MountFlag, source: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: Some(source.into()),
            target: target.into(),
            fs_type: None,
            options: None,
            flags: vec![flag],
        }
    }

    /// `mount <flag> <target>` (propagation changes).
    pub fn propagation(flag: MountFlag, target: impl Into<PathBuf>) -> Self {
        Self {
            source: None,
            target: target.into(),
            fs_type: None,
            options: None,
            flags: vec![flag],
        }
    }
}

impl ToolArgs for MountArgs {
    fn program(&self) -> &str {
        "mount"
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args: Vec<String> = self.flags.iter().map(|f| f.as_str().to_string()).collect();
        if let Some(ref fs_type) = self.fs_type {
            args.push("--types".to_string());
            args.push(fs_type.clone());
        }
        if let Some(ref options) = self.options {
            args.push("-o".to_string());
            args.push(options.clone());
        }
        if let Some(ref source) = self.source {
            args.push(source.clone());
        }
        args.push(self.target.display().to_string());
        args
    }
}

#[derive(Debug, Clone)]
pub struct UmountArgs {
    pub target: PathBuf,
    /// `-R`: unmount everything below target too
    pub recursive: bool,
    /// `-l`: detach now, clean up when no longer busy
    pub lazy: bool,
}

impl ToolArgs for UmountArgs {
    fn program(&self) -> &str {
        "umount"
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.lazy {
            args.push("-l".to_string());
        }
        if self.recursive {
            args.push("-R".to_string());
        }
        args.push(self.target.display().to_string());
        args
    }
}

// ============================================================================
// Inspection
// ============================================================================

/// `lsblk -n -r -o NAME,TYPE <disk>`: one `name type` pair per line.
#[derive(Debug, Clone)]
pub struct LsblkArgs {
    pub disk: PathBuf,
}

impl ToolArgs for LsblkArgs {
    fn program(&self) -> &str {
        "lsblk"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "-n".to_string(),
            "-r".to_string(),
            "-o".to_string(),
            "NAME,TYPE".to_string(),
            self.disk.display().to_string(),
        ]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        c_locale()
    }
}

/// `blkid -s <tag> -o value <device>`: print a single tag value.
#[derive(Debug, Clone)]
pub struct BlkidArgs {
    pub device: PathBuf,
    /// Tag to print (`UUID`, `PARTUUID`)
    pub tag: &'static str,
}

impl ToolArgs for BlkidArgs {
    fn program(&self) -> &str {
        "blkid"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "-s".to_string(),
            self.tag.to_string(),
            "-o".to_string(),
            "value".to_string(),
            self.device.display().to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fdisk_args_wipe_flags_and_stdin() {
        let args = FdiskArgs {
            disk: PathBuf::from("/dev/sda"),
            script: "g\nw\n".to_string(),
        };
        assert_eq!(
            args.to_cli_args(),
            vec!["--wipe", "always", "--wipe-partitions", "always", "/dev/sda"]
        );
        assert_eq!(args.stdin_input().as_deref(), Some("g\nw\n"));
        assert_eq!(args.get_env_vars()[0].0, "LC_ALL");
    }

    #[test]
    fn test_mkfs_args_per_filesystem() {
        let ext4 = MkfsArgs {
            device: PathBuf::from("/dev/sda3"),
            filesystem: Filesystem::Ext4,
            label: Some("rootfs".to_string()),
        };
        assert_eq!(ext4.program(), "mkfs.ext4");
        assert_eq!(ext4.to_cli_args(), vec!["-L", "rootfs", "/dev/sda3"]);

        let f2fs = MkfsArgs {
            device: PathBuf::from("/dev/nvme0n1p3"),
            filesystem: Filesystem::F2fs,
            label: Some("rootfs".to_string()),
        };
        assert_eq!(f2fs.to_cli_args(), vec!["-f", "-l", "rootfs", "/dev/nvme0n1p3"]);

        let xfs = MkfsArgs {
            device: PathBuf::from("/dev/sda3"),
            filesystem: Filesystem::Xfs,
            label: None,
        };
        assert_eq!(xfs.to_cli_args(), vec!["-f", "/dev/sda3"]);
    }

    #[test]
    fn test_mkfs_vfat_is_fat32() {
        let args = MkfsVfatArgs {
            device: PathBuf::from("/dev/sda1"),
            label: None,
        };
        assert_eq!(args.to_cli_args(), vec!["-F", "32", "/dev/sda1"]);
    }

    #[test]
    fn test_mount_variants() {
        assert_eq!(
            MountArgs::pseudo("proc", "/mnt/gentoo/proc").to_cli_args(),
            vec!["--types", "proc", "proc", "/mnt/gentoo/proc"]
        );
        assert_eq!(
            MountArgs::bind(MountFlag::Rbind, "/sys", "/mnt/gentoo/sys").to_cli_args(),
            vec!["--rbind", "/sys", "/mnt/gentoo/sys"]
        );
        assert_eq!(
            MountArgs::propagation(MountFlag::MakeRslave, "/mnt/gentoo/sys").to_cli_args(),
            vec!["--make-rslave", "/mnt/gentoo/sys"]
        );
        assert_eq!(
            MountArgs::device("/dev/sda3", "/mnt/gentoo").to_cli_args(),
            vec!["/dev/sda3", "/mnt/gentoo"]
        );
    }

    #[test]
    fn test_umount_flags() {
        let args = UmountArgs {
            target: PathBuf::from("/mnt/gentoo"),
            recursive: true,
            lazy: true,
        };
        assert_eq!(args.to_cli_args(), vec!["-l", "-R", "/mnt/gentoo"]);
    }

    #[test]
    fn test_blkid_args() {
        let args = BlkidArgs {
            device: PathBuf::from("/dev/sda3"),
            tag: "UUID",
        };
        assert_eq!(args.to_cli_args(), vec!["-s", "UUID", "-o", "value", "/dev/sda3"]);
    }
}
