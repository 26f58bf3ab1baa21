//! Chroot plumbing: pseudo-filesystem mounts and the command wrapper.
//!
//! Commands for the target system run as
//! `chroot <root> /bin/bash -c 'source /etc/profile && <command>'`, so the
//! target's own environment (PATH, Portage variables) applies.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::executor::{Cmd, Executor};
use crate::tools::disk::{MountArgs, MountFlag, UmountArgs};

/// Wrap `inner` so it runs inside `root`.
///
/// Stdin and the secret flag carry over; env assignments are part of the
/// inner command line.
pub fn chroot_cmd(root: &Path, inner: &Cmd) -> Cmd {
    let script = format!("source /etc/profile && {}", inner.command_line());
    let mut cmd = Cmd::new("chroot")
        .arg(root.display().to_string())
        .args(["/bin/bash", "-c"])
        .arg(script);
    if let Some(input) = inner.get_stdin() {
        cmd = cmd.stdin(input);
    }
    if inner.is_secret() {
        cmd = cmd.secret();
    }
    if inner.is_quiet() {
        cmd = cmd.quiet();
    }
    cmd
}

/// `root` joined with an absolute path inside the target.
pub fn target_path(root: &Path, inside: &str) -> PathBuf {
    root.join(inside.trim_start_matches('/'))
}

/// Mount commands that make `root` usable as a chroot, in order.
pub fn system_mounts(root: &Path) -> Vec<MountArgs> {
    let proc = target_path(root, "/proc");
    let sys = target_path(root, "/sys");
    let dev = target_path(root, "/dev");
    let run = target_path(root, "/run");
    vec![
        MountArgs::pseudo("proc", proc),
        MountArgs::bind(MountFlag::Rbind, "/sys", sys.clone()),
        MountArgs::propagation(MountFlag::MakeRslave, sys),
        MountArgs::bind(MountFlag::Rbind, "/dev", dev.clone()),
        MountArgs::propagation(MountFlag::MakeRslave, dev),
        MountArgs::bind(MountFlag::Bind, "/run", run.clone()),
        MountArgs::propagation(MountFlag::MakeSlave, run),
    ]
}

/// Mount `/proc`, `/sys`, `/dev` and `/run` into `root`.
pub fn mount_system_filesystems(exec: &dyn Executor, root: &Path) -> Result<()> {
    for mount in system_mounts(root) {
        exec.run_tool(&mount)?;
    }
    Ok(())
}

/// Detach the bind-mounted `/dev` tree, then everything under `root`.
pub fn unmount_all(exec: &dyn Executor, root: &Path) -> Result<()> {
    for inside in ["/dev/shm", "/dev/pts", "/dev"] {
        exec.run_tool(&UmountArgs {
            target: target_path(root, inside),
            recursive: false,
            lazy: true,
        })?;
    }
    exec.run_tool(&UmountArgs {
        target: root.to_path_buf(),
        recursive: true,
        lazy: false,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RecordingExecutor;

    #[test]
    fn test_chroot_cmd_wraps_command_line() {
        let inner = Cmd::new("emerge").args(["--config", "sys-libs/timezone-data"]);
        let cmd = chroot_cmd(Path::new("/mnt/gentoo"), &inner);
        assert_eq!(cmd.program(), "chroot");
        assert_eq!(
            cmd.get_args(),
            [
                "/mnt/gentoo",
                "/bin/bash",
                "-c",
                "source /etc/profile && emerge --config sys-libs/timezone-data"
            ]
        );
    }

    #[test]
    fn test_chroot_cmd_keeps_env_stdin_and_secret() {
        let inner = Cmd::new("chpasswd").env("LC_ALL", "C").stdin("root:pw\n").secret();
        let cmd = chroot_cmd(Path::new("/mnt/gentoo"), &inner);
        assert!(cmd.get_args()[3].ends_with("LC_ALL=C chpasswd"));
        assert_eq!(cmd.get_stdin(), Some("root:pw\n"));
        assert!(cmd.is_secret());
        assert!(!cmd.to_string().contains("root:pw"));
    }

    #[test]
    fn test_target_path() {
        assert_eq!(
            target_path(Path::new("/mnt/gentoo"), "/etc/portage/make.conf"),
            PathBuf::from("/mnt/gentoo/etc/portage/make.conf")
        );
    }

    #[test]
    fn test_system_mount_order() {
        let exec = RecordingExecutor::new();
        mount_system_filesystems(&exec, Path::new("/mnt/gentoo")).unwrap();
        assert_eq!(
            exec.commands(),
            vec![
                "mount --types proc proc /mnt/gentoo/proc",
                "mount --rbind /sys /mnt/gentoo/sys",
                "mount --make-rslave /mnt/gentoo/sys",
                "mount --rbind /dev /mnt/gentoo/dev",
                "mount --make-rslave /mnt/gentoo/dev",
                "mount --bind /run /mnt/gentoo/run",
                "mount --make-slave /mnt/gentoo/run",
            ]
        );
    }

    #[test]
    fn test_unmount_all() {
        let exec = RecordingExecutor::new();
        unmount_all(&exec, Path::new("/mnt/gentoo")).unwrap();
        assert_eq!(
            exec.commands(),
            vec![
                "umount -l /mnt/gentoo/dev/shm",
                "umount -l /mnt/gentoo/dev/pts",
                "umount -l /mnt/gentoo/dev",
                "umount -R /mnt/gentoo",
            ]
        );
    }
}
