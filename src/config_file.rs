//! Configuration file handling for saving and loading installation configs.
//!
//! `InstallConfig::default()` carries the built-in constants; a JSON file may
//! override any subset of them (every section and field has a default).
//! Values that name a fixed set of choices are enums from `types`.

use std::fs;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{InstallError, Result};
use crate::types::{BootMode, Filesystem, InitSystem, KernelMethod, Toggle};

/// Complete installer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InstallConfig {
    pub disk: DiskConfig,
    pub system: SystemConfig,
    pub portage: PortageConfig,
    pub user: UserConfig,
    pub programs: ProgramsConfig,
}

/// Target disk layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskConfig {
    /// Whole-disk device, e.g. `/dev/sda` or `/dev/nvme0n1`
    pub device: String,
    pub boot_mode: BootMode,
    /// Erase existing signatures and partitions first
    pub wipe_disk: Toggle,
    /// fdisk size of the boot partition (`+512M`)
    pub boot_size: String,
    /// fdisk size of the swap partition; empty for no swap
    pub swap_size: String,
    pub root_filesystem: Filesystem,
    /// Where the new root is mounted on the live system
    pub mount_point: String,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            device: "/dev/sda".to_string(),
            boot_mode: BootMode::Auto,
            wipe_disk: Toggle::No,
            boot_size: "+1G".to_string(),
            swap_size: "+4G".to_string(),
            root_filesystem: Filesystem::Ext4,
            mount_point: "/mnt/gentoo".to_string(),
        }
    }
}

/// A system service package and the service it installs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemTool {
    pub package: String,
    /// Service to enable; `None` for tools without a daemon
    #[serde(default)]
    pub service: Option<String>,
}

impl SystemTool {
    fn new(package: &str, service: Option<&str>) -> Self {
        Self {
            package: package.to_string(),
            service: service.map(str::to_string),
        }
    }
}

/// Base system settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub init: InitSystem,
    /// Mirror serving `releases/amd64/autobuilds`
    pub mirror: String,
    /// Profile to select; `None` asks interactively
    pub profile: Option<String>,
    /// Zone under /usr/share/zoneinfo, e.g. `Europe/Berlin`
    pub timezone: String,
    /// Lines enabled in /etc/locale.gen
    pub locales: Vec<String>,
    /// System LANG as listed by `eselect locale list`
    pub lang: String,
    pub keymap: String,
    pub hostname: String,
    pub kernel: KernelMethod,
    /// Step the clock with `chronyd -q` before anything else
    pub sync_clock: Toggle,
    /// Unmount the new system at the end of the base phase
    pub unmount_when_done: Toggle,
    pub system_tools: Vec<SystemTool>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            init: InitSystem::OpenRc,
            mirror: "https://distfiles.gentoo.org".to_string(),
            profile: None,
            timezone: "UTC".to_string(),
            locales: vec!["en_US.UTF-8 UTF-8".to_string()],
            lang: "en_US.utf8".to_string(),
            keymap: "us".to_string(),
            hostname: "gentoo".to_string(),
            kernel: KernelMethod::DistKernelBin,
            sync_clock: Toggle::Yes,
            unmount_when_done: Toggle::Yes,
            system_tools: vec![
                SystemTool::new("app-admin/sysklogd", Some("sysklogd")),
                SystemTool::new("sys-process/cronie", Some("cronie")),
                SystemTool::new("sys-apps/mlocate", None),
                SystemTool::new("net-misc/chrony", Some("chronyd")),
            ],
        }
    }
}

/// Values written to /etc/portage/make.conf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortageConfig {
    pub common_flags: String,
    pub makeopts: String,
    pub use_flags: String,
    pub accept_license: String,
    pub video_cards: String,
    pub input_devices: String,
    /// Defaults to `efi-64` or `pc` from the firmware mode
    pub grub_platforms: Option<String>,
    pub l10n: String,
    pub gentoo_mirrors: String,
}

impl Default for PortageConfig {
    fn default() -> Self {
        Self {
            common_flags: "-march=native -O2 -pipe".to_string(),
            makeopts: "-j4".to_string(),
            use_flags: String::new(),
            accept_license: "-* @FREE @BINARY-REDISTRIBUTABLE".to_string(),
            video_cards: String::new(),
            input_devices: "libinput".to_string(),
            grub_platforms: None,
            l10n: "en".to_string(),
            gentoo_mirrors: "https://distfiles.gentoo.org".to_string(),
        }
    }
}

/// The regular user created at the end of the base phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub username: String,
    pub groups: Vec<String>,
    pub shell: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            username: "larry".to_string(),
            groups: ["users", "wheel", "audio", "video", "usb"]
                .iter()
                .map(|g| g.to_string())
                .collect(),
            shell: "/bin/bash".to_string(),
        }
    }
}

/// A dotfiles repository and the files linked from it into $HOME
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DotfilesConfig {
    pub url: String,
    /// Checkout directory relative to the home directory
    #[serde(default = "default_dotfiles_dir")]
    pub dir: String,
    /// Paths inside the checkout linked to the same path under $HOME
    #[serde(default)]
    pub links: Vec<String>,
}

fn default_dotfiles_dir() -> String {
    ".dotfiles".to_string()
}

/// Post-install program setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramsConfig {
    /// Run inside this root via chroot instead of on the running system
    pub root: Option<String>,
    pub packages: Vec<String>,
    pub dotfiles: Option<DotfilesConfig>,
    /// Git URLs cloned into ~/.vim/pack/plugins/start
    pub editor_plugins: Vec<String>,
    pub audio: Toggle,
    /// fbsplash theme; `None` skips splash setup
    pub fbsplash_theme: Option<String>,
}

impl Default for ProgramsConfig {
    fn default() -> Self {
        Self {
            root: None,
            packages: vec![
                "app-editors/vim".to_string(),
                "dev-vcs/git".to_string(),
                "app-admin/sudo".to_string(),
            ],
            dotfiles: None,
            editor_plugins: vec![],
            audio: Toggle::Yes,
            fbsplash_theme: None,
        }
    }
}

// ============================================================================
// Load / save / validate
// ============================================================================

impl InstallConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).map_err(|e| {
            InstallError::config(format!(
                "failed to write configuration to {}: {}",
                path.as_ref().display(),
                e
            ))
        })
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).map_err(|e| {
            InstallError::config(format!(
                "failed to read configuration from {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            InstallError::config(format!(
                "failed to parse {}: {}",
                path.as_ref().display(),
                e
            ))
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.validate_disk()?;
        self.validate_system()?;
        self.validate_user()?;
        self.validate_programs()
    }

    fn validate_disk(&self) -> Result<()> {
        let disk = &self.disk;
        if !disk.device.starts_with("/dev/") || disk.device.trim().len() <= "/dev/".len() {
            return Err(InstallError::validation(format!(
                "disk device must be a /dev path, got '{}'",
                disk.device
            )));
        }
        if disk.device.contains(char::is_whitespace) {
            return Err(InstallError::validation("disk device cannot contain whitespace"));
        }

        let size = size_pattern()?;
        if !size.is_match(&disk.boot_size) {
            return Err(InstallError::validation(format!(
                "boot size must look like +512M, got '{}'",
                disk.boot_size
            )));
        }
        if !disk.swap_size.is_empty() && !size.is_match(&disk.swap_size) {
            return Err(InstallError::validation(format!(
                "swap size must look like +4G or be empty, got '{}'",
                disk.swap_size
            )));
        }
        if !disk.mount_point.starts_with('/') || disk.mount_point == "/" {
            return Err(InstallError::validation(format!(
                "mount point must be an absolute path other than /, got '{}'",
                disk.mount_point
            )));
        }
        Ok(())
    }

    fn validate_system(&self) -> Result<()> {
        let system = &self.system;
        if !system.mirror.starts_with("http://") && !system.mirror.starts_with("https://") {
            return Err(InstallError::validation(
                "mirror must start with http:// or https://",
            ));
        }

        let hostname = system.hostname.trim();
        if hostname.is_empty() || hostname.len() > 63 {
            return Err(InstallError::validation("hostname must be 1-63 characters long"));
        }
        if !hostname.starts_with(|c: char| c.is_ascii_alphanumeric())
            || hostname.ends_with('-')
            || !hostname.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(InstallError::validation(format!(
                "hostname '{}' may only contain letters, digits and inner hyphens",
                hostname
            )));
        }

        if system.timezone.trim().is_empty()
            || system.timezone.contains("..")
            || system.timezone.starts_with('/')
        {
            return Err(InstallError::validation(format!(
                "invalid timezone '{}'",
                system.timezone
            )));
        }
        if system.locales.iter().all(|l| l.trim().is_empty()) {
            return Err(InstallError::validation("at least one locale is required"));
        }
        if system.lang.trim().is_empty() {
            return Err(InstallError::validation("lang must be specified"));
        }
        if system.keymap.trim().is_empty() {
            return Err(InstallError::validation("keymap must be specified"));
        }
        Ok(())
    }

    fn validate_user(&self) -> Result<()> {
        let username = self.user.username.trim();
        if username.is_empty() || username.len() > 32 {
            return Err(InstallError::validation("username must be 1-32 characters long"));
        }
        if !username.starts_with(|c: char| c.is_ascii_lowercase() || c == '_') {
            return Err(InstallError::validation(
                "username must start with a lowercase letter or underscore",
            ));
        }
        if !username
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(InstallError::validation(
                "username can only contain lowercase letters, digits, underscores and hyphens",
            ));
        }
        if username == "root" {
            return Err(InstallError::validation("username cannot be root"));
        }
        if !self.user.shell.starts_with('/') {
            return Err(InstallError::validation("shell must be an absolute path"));
        }
        Ok(())
    }

    fn validate_programs(&self) -> Result<()> {
        if let Some(ref root) = self.programs.root {
            if !root.starts_with('/') {
                return Err(InstallError::validation("programs.root must be an absolute path"));
            }
        }
        let urls = self
            .programs
            .dotfiles
            .iter()
            .map(|d| &d.url)
            .chain(self.programs.editor_plugins.iter());
        for url in urls {
            if !is_git_url(url) {
                return Err(InstallError::validation(format!(
                    "git URL must start with http://, https://, git:// or ssh://, got '{}'",
                    url
                )));
            }
        }
        Ok(())
    }

    /// Whether a swap partition is part of the layout
    pub fn has_swap(&self) -> bool {
        !self.disk.swap_size.trim().is_empty()
    }
}

fn size_pattern() -> Result<Regex> {
    Regex::new(r"^\+[1-9][0-9]*[KMGT]$")
        .map_err(|e| InstallError::validation(format!("invalid size pattern: {}", e)))
}

fn is_git_url(url: &str) -> bool {
    let url = url.trim();
    ["http://", "https://", "git://", "ssh://"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
}
