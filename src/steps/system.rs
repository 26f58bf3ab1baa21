//! Configuring the new system inside the chroot: time, locale, fstab,
//! identity, network, services and accounts.

use std::path::PathBuf;

use tracing::info;

use crate::context::InstallContext;
use crate::error::{InstallError, Result};
use crate::hardware::FirmwareMode;
use crate::prompt;
use crate::steps::base::eselect_choose;
use crate::substitute;
use crate::tool_args::ToolArgs;
use crate::tools::disk::BlkidArgs;
use crate::tools::portage::{EmergeArgs, EnvUpdateArgs, LocaleGenArgs};
use crate::tools::system::{ServiceArgs, SymlinkArgs};
use crate::tools::user::{ChpasswdArgs, UseraddArgs};
use crate::types::{Filesystem, InitSystem};

pub fn set_timezone(ctx: &mut InstallContext) -> Result<()> {
    let timezone = ctx.config.system.timezone.clone();
    match ctx.config.system.init {
        InitSystem::OpenRc => {
            substitute::write_file(
                ctx.exec.as_ref(),
                &ctx.target_path("/etc/timezone"),
                &format!("{}\n", timezone),
            )?;
            ctx.chroot_tool(&EmergeArgs::configure("sys-libs/timezone-data"))?;
        }
        InitSystem::Systemd => {
            ctx.chroot_tool(&SymlinkArgs {
                target: PathBuf::from(format!("../usr/share/zoneinfo/{}", timezone)),
                link: PathBuf::from("/etc/localtime"),
            })?;
        }
    }
    Ok(())
}

pub fn set_locales(ctx: &mut InstallContext) -> Result<()> {
    let locale_gen = ctx.target_path("/etc/locale.gen");
    for locale in &ctx.config.system.locales {
        if locale.trim().is_empty() {
            continue;
        }
        substitute::enable_line(ctx.exec.as_ref(), &locale_gen, locale)?;
    }
    ctx.chroot_tool(&LocaleGenArgs)?;

    let lang = ctx.config.system.lang.clone();
    eselect_choose(ctx, "locale", Some(&lang))?;
    ctx.chroot_tool(&EnvUpdateArgs)?;
    Ok(())
}

// ============================================================================
// fstab
// ============================================================================

/// One /etc/fstab line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FstabEntry {
    pub uuid: String,
    pub mount_point: String,
    pub fs_type: String,
    pub options: String,
    pub pass: u8,
}

/// Render /etc/fstab.
pub fn fstab_contents(entries: &[FstabEntry]) -> String {
    let mut out = String::from("# <fs>\t<mountpoint>\t<type>\t<opts>\t<dump>\t<pass>\n");
    for entry in entries {
        out.push_str(&format!(
            "UUID={}\t{}\t{}\t{}\t0\t{}\n",
            entry.uuid, entry.mount_point, entry.fs_type, entry.options, entry.pass
        ));
    }
    out
}

fn partition_uuid(ctx: &InstallContext, device: PathBuf) -> Result<String> {
    let display = device.display().to_string();
    let uuid = ctx.exec.capture(&BlkidArgs { device, tag: "UUID" }.to_cmd())?;
    if uuid.is_empty() {
        return Err(InstallError::parse(format!("blkid printed no UUID for {}", display)));
    }
    Ok(uuid)
}

pub fn generate_fstab(ctx: &mut InstallContext) -> Result<()> {
    let layout = ctx.layout();
    let root_fs: Filesystem = ctx.config.disk.root_filesystem;
    let mut entries = Vec::new();

    if ctx.firmware == FirmwareMode::Uefi {
        entries.push(FstabEntry {
            uuid: partition_uuid(ctx, layout.boot_device())?,
            mount_point: ctx.efi_dir().to_string(),
            fs_type: "vfat".to_string(),
            options: "umask=0077".to_string(),
            pass: 2,
        });
    }
    if let Some(swap) = layout.swap_device() {
        entries.push(FstabEntry {
            uuid: partition_uuid(ctx, swap)?,
            mount_point: "none".to_string(),
            fs_type: "swap".to_string(),
            options: "sw".to_string(),
            pass: 0,
        });
    }
    entries.push(FstabEntry {
        uuid: partition_uuid(ctx, layout.root_device())?,
        mount_point: "/".to_string(),
        fs_type: root_fs.to_string(),
        options: "defaults,noatime".to_string(),
        pass: root_fs.fstab_pass(),
    });

    substitute::write_file(
        ctx.exec.as_ref(),
        &ctx.target_path("/etc/fstab"),
        &fstab_contents(&entries),
    )
}

// ============================================================================
// Identity
// ============================================================================

pub fn set_hostname(ctx: &mut InstallContext) -> Result<()> {
    let hostname = ctx.config.system.hostname.trim().to_string();
    match ctx.config.system.init {
        InitSystem::OpenRc => substitute::set_variable(
            ctx.exec.as_ref(),
            &ctx.target_path("/etc/conf.d/hostname"),
            "hostname",
            &hostname,
        ),
        InitSystem::Systemd => substitute::write_file(
            ctx.exec.as_ref(),
            &ctx.target_path("/etc/hostname"),
            &format!("{}\n", hostname),
        ),
    }
}

pub fn set_keymap(ctx: &mut InstallContext) -> Result<()> {
    let keymap = ctx.config.system.keymap.clone();
    match ctx.config.system.init {
        InitSystem::OpenRc => substitute::set_variable(
            ctx.exec.as_ref(),
            &ctx.target_path("/etc/conf.d/keymaps"),
            "keymap",
            &keymap,
        ),
        InitSystem::Systemd => substitute::write_file(
            ctx.exec.as_ref(),
            &ctx.target_path("/etc/vconsole.conf"),
            &format!("KEYMAP={}\n", keymap),
        ),
    }
}

// ============================================================================
// Network and services
// ============================================================================

pub fn configure_network(ctx: &mut InstallContext) -> Result<()> {
    let init = ctx.config.system.init;
    ctx.chroot_tool(&EmergeArgs::install(["net-misc/dhcpcd"]))?;
    ctx.chroot_tool(&ServiceArgs::enable(init, "dhcpcd"))?;
    Ok(())
}

pub fn install_system_tools(ctx: &mut InstallContext) -> Result<()> {
    let tools = ctx.config.system.system_tools.clone();
    if tools.is_empty() {
        info!("No system tools configured");
        return Ok(());
    }
    let init = ctx.config.system.init;
    ctx.chroot_tool(&EmergeArgs::install(tools.iter().map(|t| t.package.clone())))?;
    for service in tools.iter().filter_map(|t| t.service.as_deref()) {
        ctx.chroot_tool(&ServiceArgs::enable(init, service))?;
    }
    Ok(())
}

// ============================================================================
// Accounts
// ============================================================================

pub fn set_root_password(ctx: &mut InstallContext) -> Result<()> {
    let password = prompt::new_password(ctx.prompter.as_ref(), "root", ctx.root_password.clone())?;
    ctx.chroot_tool(&ChpasswdArgs {
        username: "root".to_string(),
        password,
    })?;
    Ok(())
}

pub fn create_user(ctx: &mut InstallContext) -> Result<()> {
    let user = ctx.config.user.clone();
    ctx.chroot_tool(&UseraddArgs {
        username: user.username.clone(),
        groups: user.groups.clone(),
        shell: user.shell.clone(),
    })?;

    let password =
        prompt::new_password(ctx.prompter.as_ref(), &user.username, ctx.user_password.clone())?;
    ctx.chroot_tool(&ChpasswdArgs {
        username: user.username,
        password,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fstab_contents() {
        let entries = vec![
            FstabEntry {
                uuid: "AAAA-BBBB".to_string(),
                mount_point: "/efi".to_string(),
                fs_type: "vfat".to_string(),
                options: "umask=0077".to_string(),
                pass: 2,
            },
            FstabEntry {
                uuid: "1234".to_string(),
                mount_point: "/".to_string(),
                fs_type: "ext4".to_string(),
                options: "defaults,noatime".to_string(),
                pass: 1,
            },
        ];
        let fstab = fstab_contents(&entries);
        let lines: Vec<&str> = fstab.lines().collect();
        assert!(lines[0].starts_with('#'));
        assert_eq!(lines[1], "UUID=AAAA-BBBB\t/efi\tvfat\tumask=0077\t0\t2");
        assert_eq!(lines[2], "UUID=1234\t/\text4\tdefaults,noatime\t0\t1");
    }
}
