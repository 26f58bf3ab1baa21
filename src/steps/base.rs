//! Bootstrapping the new root: clock, stage3, make.conf, Portage tree and
//! profile.

use std::fs;

use tracing::{info, warn};

use crate::context::InstallContext;
use crate::download;
use crate::error::{InstallError, Result};
use crate::eselect;
use crate::hardware::FirmwareMode;
use crate::substitute;
use crate::tool_args::ToolArgs;
use crate::tools::portage::{EmergeArgs, EselectArgs, WebrsyncArgs};
use crate::tools::system::{ChronydArgs, CopyArgs, TarExtractArgs};

pub fn sync_clock(ctx: &mut InstallContext) -> Result<()> {
    if !ctx.config.system.sync_clock.is_yes() {
        info!("Clock sync disabled");
        return Ok(());
    }
    ctx.run_tool(&ChronydArgs)?;
    Ok(())
}

pub fn get_stage3_tarball(ctx: &mut InstallContext) -> Result<()> {
    let mirror = ctx.config.system.mirror.clone();
    let init = ctx.config.system.init;
    if ctx.dry_run() {
        info!(
            "[dry-run] fetch {} and the tarball it names",
            download::index_url(&mirror, init)
        );
        return Ok(());
    }
    let stage3 = download::fetch_stage3(ctx.fetcher.as_ref(), &mirror, init, ctx.root())?;
    info!("Stage3 ready: {}", stage3.tarball.display());
    Ok(())
}

pub fn extract_stage3(ctx: &mut InstallContext) -> Result<()> {
    let root = ctx.root().to_path_buf();
    let tarball = match download::find_stage3_tarball(&root)? {
        Some(path) => path,
        None if ctx.dry_run() => root.join("stage3-amd64.tar.xz"),
        None => {
            return Err(InstallError::guard(format!(
                "no stage3 tarball found in {}",
                root.display()
            )));
        }
    };

    ctx.run_tool(&TarExtractArgs {
        archive: tarball.clone(),
        target: root,
    })?;

    if ctx.dry_run() {
        info!("[dry-run] remove {}", tarball.display());
        return Ok(());
    }
    fs::remove_file(&tarball)?;
    let digests = tarball.with_file_name(format!(
        "{}.DIGESTS",
        tarball.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
    ));
    if let Err(e) = fs::remove_file(&digests) {
        warn!("Could not remove {}: {}", digests.display(), e);
    }
    Ok(())
}

/// `GRUB_PLATFORMS` value: configured, or derived from the firmware.
pub fn grub_platforms(ctx: &InstallContext) -> String {
    ctx.config
        .portage
        .grub_platforms
        .clone()
        .unwrap_or_else(|| match ctx.firmware {
            FirmwareMode::Uefi => "efi-64".to_string(),
            FirmwareMode::Bios => "pc".to_string(),
        })
}

pub fn configure_make_conf(ctx: &mut InstallContext) -> Result<()> {
    let path = ctx.target_path("/etc/portage/make.conf");
    let portage = &ctx.config.portage;
    let settings = [
        ("COMMON_FLAGS", portage.common_flags.clone()),
        ("MAKEOPTS", portage.makeopts.clone()),
        ("USE", portage.use_flags.clone()),
        ("ACCEPT_LICENSE", portage.accept_license.clone()),
        ("VIDEO_CARDS", portage.video_cards.clone()),
        ("INPUT_DEVICES", portage.input_devices.clone()),
        ("GRUB_PLATFORMS", grub_platforms(ctx)),
        ("L10N", portage.l10n.clone()),
        ("GENTOO_MIRRORS", portage.gentoo_mirrors.clone()),
    ];
    for (key, value) in settings {
        if value.trim().is_empty() {
            continue;
        }
        substitute::set_variable(ctx.exec.as_ref(), &path, key, &value)?;
    }
    Ok(())
}

pub fn copy_dns_info(ctx: &mut InstallContext) -> Result<()> {
    ctx.run_tool(&CopyArgs {
        source: "/etc/resolv.conf".into(),
        dest: ctx.target_path("/etc/"),
        dereference: true,
    })?;
    Ok(())
}

pub fn sync_portage(ctx: &mut InstallContext) -> Result<()> {
    ctx.chroot_tool(&WebrsyncArgs)?;
    Ok(())
}

/// List `module` choices in the new system, pick one and `eselect set` it.
///
/// `wanted` selects by name; without it the operator is asked, with the
/// current selection as default.
pub fn eselect_choose(ctx: &InstallContext, module: &str, wanted: Option<&str>) -> Result<String> {
    let output = ctx.chroot_capture(&EselectArgs::list(module).to_cmd())?;
    let entries = eselect::parse_list(&output)?;

    let entry = match wanted {
        Some(name) => eselect::find(&entries, name).ok_or_else(|| {
            InstallError::validation(format!("{} '{}' is not available", module, name))
        })?,
        None => {
            let names: Vec<String> = entries.iter().map(|e| e.name.clone()).collect();
            let default = eselect::selected_position(&entries).unwrap_or(0);
            let chosen = ctx
                .prompter
                .select(&format!("Select {}", module), &names, default)?;
            entries
                .get(chosen)
                .ok_or_else(|| InstallError::prompt(format!("no {} entry {}", module, chosen)))?
        }
    };

    info!("Selecting {} [{}] {}", module, entry.index, entry.name);
    ctx.chroot(&EselectArgs::set(module, entry.index).to_cmd())?;
    Ok(entry.name.clone())
}

pub fn select_profile(ctx: &mut InstallContext) -> Result<()> {
    let wanted = ctx.config.system.profile.clone();
    eselect_choose(ctx, "profile", wanted.as_deref())?;
    Ok(())
}

pub fn update_world(ctx: &mut InstallContext) -> Result<()> {
    ctx.chroot_tool(&EmergeArgs::update_world())?;
    Ok(())
}
