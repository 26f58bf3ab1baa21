//! Hardware environment detection
//!
//! Detects firmware mode (UEFI vs BIOS) and network connectivity using
//! std primitives only. The firmware mode decides the boot partition type,
//! whether an ESP is formatted and mounted, and how GRUB is installed.

use std::fmt;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::types::BootMode;

/// Detected firmware mode of the system.
///
/// The kernel exposes `/sys/firmware/efi` only when booted in UEFI mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FirmwareMode {
    /// UEFI firmware: ESP + `grub-install --target=x86_64-efi`
    Uefi,
    /// Legacy BIOS: BIOS boot partition + `grub-install --target=i386-pc`
    Bios,
}

impl FirmwareMode {
    pub fn is_uefi(self) -> bool {
        matches!(self, Self::Uefi)
    }

    pub fn is_bios(self) -> bool {
        matches!(self, Self::Bios)
    }
}

impl fmt::Display for FirmwareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uefi => write!(f, "UEFI"),
            Self::Bios => write!(f, "BIOS"),
        }
    }
}

/// Network connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    Online,
    Offline,
}

impl NetworkState {
    pub fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

impl fmt::Display for NetworkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "Online"),
            Self::Offline => write!(f, "Offline"),
        }
    }
}

/// Firmware mode under a given sysfs root.
pub fn firmware_mode_at(sys_root: &Path) -> FirmwareMode {
    if sys_root.join("firmware/efi").exists() {
        FirmwareMode::Uefi
    } else {
        FirmwareMode::Bios
    }
}

/// Detect firmware mode by checking for the EFI sysfs directory.
pub fn detect_firmware_mode() -> FirmwareMode {
    let mode = firmware_mode_at(Path::new("/sys"));
    match mode {
        FirmwareMode::Uefi => info!("UEFI firmware detected (/sys/firmware/efi exists)"),
        FirmwareMode::Bios => info!("BIOS firmware detected (/sys/firmware/efi not found)"),
    }
    mode
}

/// Apply the configured boot mode; `auto` detects it.
pub fn resolve_boot_mode(configured: BootMode) -> FirmwareMode {
    match configured {
        BootMode::Uefi => FirmwareMode::Uefi,
        BootMode::Bios => FirmwareMode::Bios,
        BootMode::Auto => detect_firmware_mode(),
    }
}

/// Detect network connectivity with a TCP connect to `host:443`.
///
/// Any resolution or connection failure counts as offline.
pub fn detect_internet(host: &str) -> NetworkState {
    let addrs = match (host, 443).to_socket_addrs() {
        Ok(addrs) => addrs,
        Err(e) => {
            warn!("Cannot resolve {}: {}", host, e);
            return NetworkState::Offline;
        }
    };

    for addr in addrs {
        if TcpStream::connect_timeout(&addr, Duration::from_secs(5)).is_ok() {
            info!("Network connectivity confirmed (TCP to {}:443)", host);
            return NetworkState::Online;
        }
    }
    warn!("Network connectivity check to {} failed", host);
    NetworkState::Offline
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_firmware_mode_display() {
        assert_eq!(FirmwareMode::Uefi.to_string(), "UEFI");
        assert_eq!(FirmwareMode::Bios.to_string(), "BIOS");
    }

    #[test]
    fn test_firmware_mode_at() {
        let sys = TempDir::new().unwrap();
        assert_eq!(firmware_mode_at(sys.path()), FirmwareMode::Bios);

        std::fs::create_dir_all(sys.path().join("firmware/efi")).unwrap();
        assert_eq!(firmware_mode_at(sys.path()), FirmwareMode::Uefi);
    }

    #[test]
    fn test_resolve_boot_mode_explicit() {
        assert_eq!(resolve_boot_mode(BootMode::Uefi), FirmwareMode::Uefi);
        assert_eq!(resolve_boot_mode(BootMode::Bios), FirmwareMode::Bios);
        let detected = resolve_boot_mode(BootMode::Auto);
        assert!(detected.is_uefi() || detected.is_bios());
    }

    #[test]
    fn test_unresolvable_host_is_offline() {
        assert_eq!(detect_internet("host.invalid"), NetworkState::Offline);
    }
}
