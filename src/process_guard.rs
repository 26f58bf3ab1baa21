//! Child process lifecycle
//!
//! An interrupted installer must not leave `fdisk`, `mkfs` or a half-done
//! `emerge` running behind its back. Every child is started in its own
//! process group with a parent-death signal, its PID is tracked in a global
//! registry, and a signal to the installer tears the tracked groups down:
//! SIGTERM first, SIGKILL for whatever is still alive after the grace period.

use nix::libc;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::time::{Duration, Instant};

static CHILD_REGISTRY: OnceLock<Mutex<ChildRegistry>> = OnceLock::new();

/// PIDs of the children currently running (each one leads its own group)
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: HashSet<u32>,
    terminating: bool,
}

impl ChildRegistry {
    /// The process-wide registry
    pub fn global() -> MutexGuard<'static, ChildRegistry> {
        CHILD_REGISTRY
            .get_or_init(|| Mutex::new(ChildRegistry::default()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Track `pid` in the global registry
    pub fn register_global(pid: u32) {
        Self::global().register(pid);
    }

    /// Stop tracking `pid` in the global registry
    pub fn unregister_global(pid: u32) {
        Self::global().unregister(pid);
    }

    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        tracing::debug!("tracking child process group {}", pid);
    }

    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        tracing::debug!("child process {} finished", pid);
    }

    pub fn count(&self) -> usize {
        self.pids.len()
    }

    /// Terminate every tracked process group. Runs at most once.
    pub fn terminate_all(&mut self, grace_period: Duration) {
        if self.terminating {
            return;
        }
        self.terminating = true;

        if self.pids.is_empty() {
            return;
        }

        let pids: Vec<u32> = self.pids.drain().collect();
        tracing::warn!("terminating {} running command(s)", pids.len());

        for &pid in &pids {
            if signal_group(pid, Signal::SIGTERM).is_err() {
                let _ = signal_pid(pid, Signal::SIGTERM);
            }
        }

        let start = Instant::now();
        while start.elapsed() < grace_period {
            if pids.iter().all(|&pid| !is_process_alive(pid)) {
                tracing::info!("all running commands terminated");
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        for &pid in pids.iter().filter(|&&pid| is_process_alive(pid)) {
            tracing::warn!("process group {} ignored SIGTERM, sending SIGKILL", pid);
            if signal_group(pid, Signal::SIGKILL).is_err() {
                let _ = signal_pid(pid, Signal::SIGKILL);
            }
        }
    }
}

fn signal_pid(pid: u32, signal: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(pid as i32), signal)
}

/// Negative PID addresses the whole group, so grandchildren (e.g. the
/// compilers under emerge) get the signal too.
fn signal_group(pgid: u32, signal: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(-(pgid as i32)), signal)
}

/// Alive means it exists and is neither a zombie nor dead.
fn is_process_alive(pid: u32) -> bool {
    if signal::kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        // Field 3 is the state letter
        Ok(stat) => stat
            .split_whitespace()
            .nth(2)
            .is_none_or(|state| !matches!(state, "Z" | "X")),
        Err(_) => true,
    }
}

/// Install handlers for SIGINT, SIGTERM and SIGHUP that kill the tracked
/// children and exit with `128 + signal`.
pub fn install_signal_handlers() -> std::io::Result<()> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            tracing::error!("interrupted by signal {}, stopping installation", sig);
            ChildRegistry::global().terminate_all(Duration::from_secs(3));
            std::process::exit(128 + sig);
        }
    });

    Ok(())
}

/// Extension trait for `std::process::Command` to isolate children
pub trait CommandProcessGroup {
    /// Run the command as leader of a new process group that dies with us
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for std::process::Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        // SAFETY: the closure only calls async-signal-safe syscalls
        // (setpgid, prctl) between fork and exec.
        unsafe {
            self.pre_exec(|| {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(std::io::Error::from)?;
                if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn wait_for_exit(child: &mut std::process::Child, timeout: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if let Ok(Some(_)) = child.try_wait() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_registry_register_unregister() {
        let mut registry = ChildRegistry::default();
        registry.register(1234);
        registry.register(5678);
        assert_eq!(registry.count(), 2);

        registry.unregister(1234);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_terminate_all_kills_process_group() {
        let mut child = Command::new("sleep")
            .arg("60")
            .in_new_process_group()
            .spawn()
            .expect("spawn sleep");

        let mut registry = ChildRegistry::default();
        registry.register(child.id());
        registry.terminate_all(Duration::from_millis(500));

        assert!(wait_for_exit(&mut child, Duration::from_secs(3)));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_terminate_all_runs_once() {
        let mut registry = ChildRegistry::default();
        registry.terminate_all(Duration::from_millis(10));
        assert!(registry.terminating);

        // Registered after termination began: left alone
        registry.register(999_999);
        registry.terminate_all(Duration::from_millis(10));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_dead_pid_is_not_alive() {
        let mut child = Command::new("true").spawn().expect("spawn true");
        let pid = child.id();
        child.wait().expect("wait");
        assert!(!is_process_alive(pid));
        assert!(signal_pid(pid, Signal::SIGTERM).is_err());
    }
}
