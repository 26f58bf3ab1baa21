//! Partitioning, formatting and mounting the target disk.

use tracing::info;

use crate::chroot;
use crate::context::InstallContext;
use crate::error::Result;
use crate::hardware::FirmwareMode;
use crate::partition;
use crate::tools::disk::{MkfsArgs, MkfsVfatArgs, MkswapArgs, MountArgs, SwaponArgs};
use crate::tools::system::MkdirArgs;

pub fn create_partition_table(ctx: &mut InstallContext) -> Result<()> {
    let wipe = ctx.config.disk.wipe_disk.is_yes();
    partition::create_partition_table(ctx.exec.as_ref(), &ctx.disk(), wipe)
}

pub fn create_boot_partition(ctx: &mut InstallContext) -> Result<()> {
    let layout = ctx.layout();
    let device = partition::create_partition(ctx.exec.as_ref(), &ctx.disk(), &layout.boot)?;
    info!("Boot partition ({}): {}", ctx.firmware, device.display());
    Ok(())
}

pub fn create_swap_partition(ctx: &mut InstallContext) -> Result<()> {
    let Some(swap) = ctx.layout().swap else {
        info!("No swap size configured, skipping swap partition");
        return Ok(());
    };
    let device = partition::create_partition(ctx.exec.as_ref(), &ctx.disk(), &swap)?;
    info!("Swap partition: {}", device.display());
    Ok(())
}

pub fn create_root_partition(ctx: &mut InstallContext) -> Result<()> {
    let layout = ctx.layout();
    let device = partition::create_partition(ctx.exec.as_ref(), &ctx.disk(), &layout.root)?;
    info!("Root partition: {}", device.display());
    Ok(())
}

pub fn format_partitions(ctx: &mut InstallContext) -> Result<()> {
    let layout = ctx.layout();

    match ctx.firmware {
        FirmwareMode::Uefi => {
            ctx.run_tool(&MkfsVfatArgs {
                device: layout.boot_device(),
                label: Some("EFI".to_string()),
            })?;
        }
        // GRUB writes its core image to the raw BIOS boot partition.
        FirmwareMode::Bios => info!("BIOS boot partition needs no filesystem"),
    }

    if let Some(swap) = layout.swap_device() {
        ctx.run_tool(&MkswapArgs {
            device: swap.clone(),
        })?;
        ctx.run_tool(&SwaponArgs { device: swap })?;
    }

    ctx.run_tool(&MkfsArgs {
        device: layout.root_device(),
        filesystem: ctx.config.disk.root_filesystem,
        label: Some("rootfs".to_string()),
    })?;
    Ok(())
}

pub fn mount_root(ctx: &mut InstallContext) -> Result<()> {
    let root = ctx.root().to_path_buf();
    ctx.run_tool(&MkdirArgs { path: root.clone() })?;
    ctx.run_tool(&MountArgs::device(
        ctx.layout().root_device().display().to_string(),
        root,
    ))?;
    Ok(())
}

pub fn mount_boot(ctx: &mut InstallContext) -> Result<()> {
    if ctx.firmware.is_bios() {
        info!("BIOS install, no ESP to mount");
        return Ok(());
    }
    let efi = ctx.target_path(ctx.efi_dir());
    ctx.run_tool(&MkdirArgs { path: efi.clone() })?;
    ctx.run_tool(&MountArgs::device(
        ctx.layout().boot_device().display().to_string(),
        efi,
    ))?;
    Ok(())
}

pub fn mount_system_filesystems(ctx: &mut InstallContext) -> Result<()> {
    chroot::mount_system_filesystems(ctx.exec.as_ref(), ctx.root())
}

pub fn unmount_filesystems(ctx: &mut InstallContext) -> Result<()> {
    if !ctx.config.system.unmount_when_done.is_yes() {
        info!("Leaving {} mounted", ctx.root().display());
        return Ok(());
    }
    chroot::unmount_all(ctx.exec.as_ref(), ctx.root())
}
