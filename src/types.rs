//! Type-safe configuration types for the installer
//!
//! Stringly-typed shell constants become enums with exhaustive matching.
//! Each enum serializes to the lowercase token used in the JSON config.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Boot firmware mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
pub enum BootMode {
    /// Detect from `/sys/firmware/efi` at runtime
    #[default]
    #[strum(serialize = "auto")]
    Auto,
    #[strum(serialize = "uefi")]
    Uefi,
    #[strum(serialize = "bios")]
    Bios,
}

/// Filesystem type for the root partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
pub enum Filesystem {
    #[default]
    #[strum(serialize = "ext4")]
    Ext4,
    #[strum(serialize = "xfs")]
    Xfs,
    #[strum(serialize = "btrfs")]
    Btrfs,
    #[strum(serialize = "f2fs")]
    F2fs,
}

impl Filesystem {
    /// The `mkfs.<fs>` program that creates this filesystem
    pub fn mkfs_program(self) -> &'static str {
        match self {
            Self::Ext4 => "mkfs.ext4",
            Self::Xfs => "mkfs.xfs",
            Self::Btrfs => "mkfs.btrfs",
            Self::F2fs => "mkfs.f2fs",
        }
    }

    /// Flag that makes mkfs overwrite an existing signature without asking
    pub fn force_flag(self) -> Option<&'static str> {
        match self {
            Self::Ext4 => None,
            Self::Xfs | Self::Btrfs | Self::F2fs => Some("-f"),
        }
    }

    /// fsck pass number for the root entry in /etc/fstab
    pub fn fstab_pass(self) -> u8 {
        match self {
            Self::Ext4 => 1,
            Self::Xfs | Self::Btrfs | Self::F2fs => 0,
        }
    }
}

/// Init system; selects the stage3 flavour and service commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
pub enum InitSystem {
    #[default]
    #[strum(serialize = "openrc")]
    OpenRc,
    #[strum(serialize = "systemd")]
    Systemd,
}

/// How the kernel is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "kebab-case")]
pub enum KernelMethod {
    /// Prebuilt distribution kernel (`sys-kernel/gentoo-kernel-bin`)
    #[default]
    #[strum(serialize = "dist-kernel-bin")]
    DistKernelBin,
    /// Distribution kernel built from source (`sys-kernel/gentoo-kernel`)
    #[strum(serialize = "dist-kernel")]
    DistKernel,
    /// `sys-kernel/gentoo-sources` built with genkernel
    #[strum(serialize = "genkernel")]
    Genkernel,
}

impl KernelMethod {
    /// Package atom emerged for this method
    pub fn package(self) -> &'static str {
        match self {
            Self::DistKernelBin => "sys-kernel/gentoo-kernel-bin",
            Self::DistKernel => "sys-kernel/gentoo-kernel",
            Self::Genkernel => "sys-kernel/gentoo-sources",
        }
    }
}

/// Generic yes/no toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    #[default]
    #[strum(serialize = "no")]
    No,
    #[strum(serialize = "yes")]
    Yes,
}

impl Toggle {
    pub fn is_yes(self) -> bool {
        matches!(self, Self::Yes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_filesystem_programs() {
        assert_eq!(Filesystem::Ext4.mkfs_program(), "mkfs.ext4");
        assert_eq!(Filesystem::Xfs.force_flag(), Some("-f"));
        assert_eq!(Filesystem::Ext4.force_flag(), None);
        assert_eq!(Filesystem::Ext4.fstab_pass(), 1);
        assert_eq!(Filesystem::Btrfs.fstab_pass(), 0);
    }

    #[test]
    fn test_kernel_method_tokens() {
        assert_eq!(KernelMethod::from_str("genkernel").unwrap(), KernelMethod::Genkernel);
        assert_eq!(KernelMethod::DistKernelBin.to_string(), "dist-kernel-bin");
        assert_eq!(KernelMethod::Genkernel.package(), "sys-kernel/gentoo-sources");
    }

    #[test]
    fn test_serde_matches_strum() {
        let json = serde_json::to_string(&KernelMethod::DistKernelBin).unwrap();
        assert_eq!(json, "\"dist-kernel-bin\"");
        let json = serde_json::to_string(&InitSystem::OpenRc).unwrap();
        assert_eq!(json, "\"openrc\"");
        let mode: BootMode = serde_json::from_str("\"uefi\"").unwrap();
        assert_eq!(mode, BootMode::Uefi);
    }
}
