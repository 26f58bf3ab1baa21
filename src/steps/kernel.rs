//! Firmware and kernel.

use tracing::info;

use crate::context::InstallContext;
use crate::error::Result;
use crate::substitute;
use crate::tools::portage::{EmergeArgs, EselectArgs, GenkernelArgs};
use crate::types::KernelMethod;

pub fn install_firmware(ctx: &mut InstallContext) -> Result<()> {
    ctx.chroot_tool(&EmergeArgs::install(["sys-kernel/linux-firmware"]))?;
    Ok(())
}

/// Distribution kernels hand off to installkernel, which needs to know
/// about the initramfs generator and the bootloader.
fn configure_installkernel(ctx: &InstallContext) -> Result<()> {
    substitute::append_line(
        ctx.exec.as_ref(),
        &ctx.target_path("/etc/portage/package.use/installkernel"),
        "sys-kernel/installkernel dracut grub",
    )
}

pub fn build_kernel(ctx: &mut InstallContext) -> Result<()> {
    let method = ctx.config.system.kernel;
    info!("Kernel method: {} ({})", method, method.package());
    match method {
        KernelMethod::DistKernelBin | KernelMethod::DistKernel => {
            configure_installkernel(ctx)?;
            ctx.chroot_tool(&EmergeArgs::install([
                "sys-kernel/installkernel",
                method.package(),
            ]))?;
        }
        KernelMethod::Genkernel => {
            ctx.chroot_tool(&EmergeArgs::install([method.package(), "sys-kernel/genkernel"]))?;
            ctx.chroot_tool(&EselectArgs::set("kernel", 1))?;
            ctx.chroot_tool(&GenkernelArgs { install: true })?;
        }
    }
    Ok(())
}
