//! GRUB installation.

use std::path::PathBuf;

use crate::context::InstallContext;
use crate::error::Result;
use crate::hardware::FirmwareMode;
use crate::tools::portage::EmergeArgs;
use crate::tools::system::{GrubInstallArgs, GrubMkconfigArgs, GrubTarget};

/// Where `grub-install` puts GRUB for the detected firmware.
pub fn grub_target(ctx: &InstallContext) -> GrubTarget {
    match ctx.firmware {
        FirmwareMode::Uefi => GrubTarget::Efi {
            efi_directory: PathBuf::from(ctx.efi_dir()),
        },
        FirmwareMode::Bios => GrubTarget::Bios { disk: ctx.disk() },
    }
}

pub fn install_bootloader(ctx: &mut InstallContext) -> Result<()> {
    ctx.chroot_tool(&EmergeArgs::install(["sys-boot/grub"]))?;
    ctx.chroot_tool(&GrubInstallArgs {
        target: grub_target(ctx),
        bootloader_id: "Gentoo".to_string(),
    })?;
    ctx.chroot_tool(&GrubMkconfigArgs::default())?;
    Ok(())
}
