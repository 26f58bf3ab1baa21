//! Post-install program setup for the regular user.
//!
//! Runs on the booted system, or chrooted into `programs.root`.

use std::path::PathBuf;

use tracing::info;

use crate::context::InstallContext;
use crate::error::{InstallError, Result};
use crate::substitute;
use crate::tools::portage::EmergeArgs;
use crate::tools::system::{GrubMkconfigArgs, MkdirArgs, ServiceArgs, SymlinkArgs};
use crate::tools::user::{ChownArgs, GitCloneArgs, GpasswdArgs};
use crate::types::InitSystem;

/// Directory Vim 8+ loads packages from automatically.
pub const VIM_PLUGIN_DIR: &str = ".vim/pack/plugins/start";

/// Kernel arguments enabling a silent fbsplash with `theme`.
pub fn splash_cmdline(theme: &str) -> String {
    format!("splash=silent,theme:{} console=tty1 quiet", theme)
}

/// Checkout directory name for a plugin URL (`.../vim-fugitive.git` -> `vim-fugitive`).
pub fn plugin_name(url: &str) -> Option<&str> {
    let last = url.trim_end_matches('/').rsplit('/').next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    (!name.is_empty()).then_some(name)
}

pub fn install_packages(ctx: &mut InstallContext) -> Result<()> {
    let packages = ctx.config.programs.packages.clone();
    if packages.is_empty() {
        info!("No packages configured");
        return Ok(());
    }
    ctx.target_run(&EmergeArgs::install(packages))?;
    Ok(())
}

pub fn clone_dotfiles(ctx: &mut InstallContext) -> Result<()> {
    let Some(dotfiles) = ctx.config.programs.dotfiles.clone() else {
        info!("No dotfiles repository configured");
        return Ok(());
    };
    let home = PathBuf::from(ctx.home_dir());
    let checkout = home.join(&dotfiles.dir);

    ctx.target_run(&GitCloneArgs {
        url: dotfiles.url.clone(),
        dest: checkout.clone(),
        depth: None,
        branch: None,
    })?;
    for link in &dotfiles.links {
        ctx.target_run(&SymlinkArgs {
            target: checkout.join(link),
            link: home.join(link),
        })?;
    }
    Ok(())
}

pub fn install_editor_plugins(ctx: &mut InstallContext) -> Result<()> {
    let plugins = ctx.config.programs.editor_plugins.clone();
    if plugins.is_empty() {
        info!("No editor plugins configured");
        return Ok(());
    }
    let plugin_dir = PathBuf::from(ctx.home_dir()).join(VIM_PLUGIN_DIR);
    ctx.target_run(&MkdirArgs {
        path: plugin_dir.clone(),
    })?;

    for url in &plugins {
        let name = plugin_name(url)
            .ok_or_else(|| InstallError::validation(format!("cannot name plugin from '{}'", url)))?;
        ctx.target_run(&GitCloneArgs {
            url: url.clone(),
            dest: plugin_dir.join(name),
            depth: Some(1),
            branch: None,
        })?;
    }
    Ok(())
}

pub fn setup_audio(ctx: &mut InstallContext) -> Result<()> {
    if !ctx.config.programs.audio.is_yes() {
        info!("Audio setup disabled");
        return Ok(());
    }
    let init = ctx.config.system.init;
    ctx.target_run(&EmergeArgs::install(["media-sound/alsa-utils"]))?;
    match init {
        InitSystem::OpenRc => {
            ctx.target_run(&ServiceArgs::enable_at(init, "alsasound", "boot"))?;
        }
        // alsa-restore.service is pulled in by udev.
        InitSystem::Systemd => info!("systemd restores ALSA state on its own"),
    }
    ctx.target_run(&GpasswdArgs {
        username: ctx.config.user.username.clone(),
        group: "audio".to_string(),
    })?;
    Ok(())
}

pub fn setup_fbsplash(ctx: &mut InstallContext) -> Result<()> {
    let Some(theme) = ctx.config.programs.fbsplash_theme.clone() else {
        info!("No fbsplash theme configured");
        return Ok(());
    };
    ctx.target_run(&EmergeArgs::install(["media-gfx/splashutils"]))?;
    substitute::set_variable(
        ctx.exec.as_ref(),
        &ctx.target_file("/etc/conf.d/splash"),
        "SPLASH_THEME",
        &theme,
    )?;
    substitute::extend_variable(
        ctx.exec.as_ref(),
        &ctx.target_file("/etc/default/grub"),
        "GRUB_CMDLINE_LINUX_DEFAULT",
        &splash_cmdline(&theme),
    )?;
    ctx.target_run(&GrubMkconfigArgs::default())?;
    Ok(())
}

pub fn fix_home_ownership(ctx: &mut InstallContext) -> Result<()> {
    let username = ctx.config.user.username.clone();
    ctx.target_run(&ChownArgs {
        owner: format!("{}:{}", username, username),
        path: PathBuf::from(ctx.home_dir()),
        recursive: true,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_name() {
        assert_eq!(
            plugin_name("https://github.com/tpope/vim-fugitive.git"),
            Some("vim-fugitive")
        );
        assert_eq!(plugin_name("https://github.com/preservim/nerdtree/"), Some("nerdtree"));
        assert_eq!(plugin_name("https://example.com/.git"), None);
    }

    #[test]
    fn test_splash_cmdline() {
        assert_eq!(
            splash_cmdline("natural_gentoo"),
            "splash=silent,theme:natural_gentoo console=tty1 quiet"
        );
    }
}
