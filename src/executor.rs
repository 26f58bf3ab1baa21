//! Traced command execution.
//!
//! `Executor::run` is the single gate every external command goes through.
//! It logs the command text before anything happens, streams the command's
//! output into the log, and turns a non-zero exit into
//! `InstallError::Command` so the running phase stops at the first failure.
//!
//! Two executors exist:
//!
//! - `SystemExecutor` spawns real processes, each in its own process group
//!   and registered with `ChildRegistry` so a signal to the installer takes
//!   its children down too.
//! - `RecordingExecutor` records commands without running them. It backs
//!   `--dry-run` and the test-suite, and can script outputs and failures.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, info};

use crate::error::{InstallError, Result};
use crate::process_guard::{ChildRegistry, CommandProcessGroup};
use crate::tool_args::ToolArgs;

// ============================================================================
// Command description
// ============================================================================

/// A fully described external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    stdin: Option<String>,
    secret: bool,
    quiet: bool,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Text written to the command's stdin.
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Stdin carries credentials: never log it.
    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    /// Output is only interesting to the caller: log it at debug level.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_envs(&self) -> &[(String, String)] {
        &self.envs
    }

    pub fn get_stdin(&self) -> Option<&str> {
        self.stdin.as_deref()
    }

    pub fn is_secret(&self) -> bool {
        self.secret
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Shell-quoted command line, env assignments first.
    pub fn command_line(&self) -> String {
        let mut parts: Vec<String> = self
            .envs
            .iter()
            .map(|(k, v)| format!("{}={}", k, shell_quote(v)))
            .collect();
        parts.push(shell_quote(&self.program));
        parts.extend(self.args.iter().map(|a| shell_quote(a)));
        parts.join(" ")
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command_line())?;
        match (&self.stdin, self.secret) {
            (Some(_), true) => write!(f, " <<< [redacted]"),
            (Some(input), false) => write!(f, " <<< {}", shell_quote(input)),
            (None, _) => Ok(()),
        }
    }
}

/// Quote a word for display the way a POSIX shell would need it.
pub fn shell_quote(word: &str) -> String {
    if word.is_empty() {
        return "''".to_string();
    }
    let safe = word
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

// ============================================================================
// Command output
// ============================================================================

/// Output from a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmdOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code (None if terminated by signal).
    pub code: Option<i32>,
}

impl CmdOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            code: Some(0),
        }
    }

    /// Failed output with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            code: Some(code),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a non-zero exit into `InstallError::Command`.
    pub fn ensure_success(self, cmd: &Cmd) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(InstallError::Command {
                command: cmd.command_line(),
                code: self.code,
                stderr: self.stderr,
            })
        }
    }
}

// ============================================================================
// Executor trait
// ============================================================================

pub trait Executor {
    /// Run the command and report its output without judging the exit status.
    fn execute(&self, cmd: &Cmd) -> Result<CmdOutput>;

    /// Whether side effects are suppressed.
    fn dry_run(&self) -> bool {
        false
    }

    /// Log the command, run it, and fail on a non-zero exit.
    fn run(&self, cmd: &Cmd) -> Result<CmdOutput> {
        if self.dry_run() {
            info!("[dry-run] $ {}", cmd);
        } else {
            info!("$ {}", cmd);
        }
        self.execute(cmd)?.ensure_success(cmd)
    }

    /// Run a typed tool invocation.
    fn run_tool(&self, args: &dyn ToolArgs) -> Result<CmdOutput> {
        self.run(&args.to_cmd())
    }

    /// Run quietly and return trimmed stdout.
    fn capture(&self, cmd: &Cmd) -> Result<String> {
        let output = self.run(&cmd.clone().quiet())?;
        Ok(output.stdout.trim().to_string())
    }

    /// Run a command that may legitimately fail; returns whether it succeeded.
    fn probe(&self, cmd: &Cmd) -> Result<bool> {
        debug!("probe $ {}", cmd);
        Ok(self.execute(&cmd.clone().quiet())?.success())
    }
}

/// Shared executors, so a caller can keep a handle on a recorder it hands
/// to an `InstallContext`.
impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, cmd: &Cmd) -> Result<CmdOutput> {
        (**self).execute(cmd)
    }

    fn dry_run(&self) -> bool {
        (**self).dry_run()
    }
}

// ============================================================================
// System executor
// ============================================================================

/// Runs commands on the host.
#[derive(Debug, Default)]
pub struct SystemExecutor;

impl SystemExecutor {
    pub fn new() -> Self {
        Self
    }
}

/// Read a pipe line by line into the log, returning everything read.
fn log_lines<R: Read>(pipe: R, quiet: bool) -> String {
    let mut reader = BufReader::new(pipe);
    let mut collected = String::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let trimmed = line.trim_end_matches(['\n', '\r']);
                if quiet {
                    debug!(target: "gentoo_install::cmd", "{}", trimmed);
                } else {
                    info!(target: "gentoo_install::cmd", "{}", trimmed);
                }
                collected.push_str(&line);
            }
        }
    }
    collected
}

/// Drain a pipe on its own thread, logging through the caller's subscriber.
fn drain<R: Read + Send + 'static>(pipe: R, quiet: bool) -> thread::JoinHandle<String> {
    let dispatch = tracing::dispatcher::get_default(|current| current.clone());
    thread::spawn(move || {
        tracing::dispatcher::with_default(&dispatch, || log_lines(pipe, quiet))
    })
}

impl Executor for SystemExecutor {
    fn execute(&self, cmd: &Cmd) -> Result<CmdOutput> {
        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .envs(cmd.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(if cmd.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .in_new_process_group();

        let mut child = command.spawn().map_err(|e| {
            InstallError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to spawn {}: {}", cmd.program, e),
            ))
        })?;
        let pid = child.id();
        ChildRegistry::register_global(pid);

        let writer = match (child.stdin.take(), cmd.stdin.clone()) {
            (Some(mut stdin), Some(input)) => Some(thread::spawn(move || {
                // The child may exit before reading everything; that shows up in its status.
                let _ = stdin.write_all(input.as_bytes());
            })),
            _ => None,
        };
        let stdout = child.stdout.take().map(|pipe| drain(pipe, cmd.quiet));
        let stderr = child.stderr.take().map(|pipe| drain(pipe, cmd.quiet));

        let status = child.wait();
        ChildRegistry::unregister_global(pid);
        let status = status?;

        if let Some(handle) = writer {
            let _ = handle.join();
        }
        let stdout = stdout
            .map(|h| h.join().unwrap_or_default())
            .unwrap_or_default();
        let stderr = stderr
            .map(|h| h.join().unwrap_or_default())
            .unwrap_or_default();

        Ok(CmdOutput {
            stdout,
            stderr,
            code: status.code(),
        })
    }
}

// ============================================================================
// Recording executor
// ============================================================================

/// Records commands instead of running them.
///
/// Responses are matched by substring of the command line, in registration
/// order. A queued response is consumed; the last one for a pattern sticks.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    dry_run: bool,
    recorded: Mutex<Vec<Cmd>>,
    responses: Mutex<Vec<(String, VecDeque<CmdOutput>)>>,
}

impl RecordingExecutor {
    /// Recorder that reports side effects as live (file edits still happen).
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorder for `--dry-run`: in-process side effects are skipped as well.
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }

    /// Script stdout for commands whose line contains `pattern`.
    pub fn respond(&self, pattern: &str, stdout: &str) -> &Self {
        self.push_response(pattern, CmdOutput::ok(stdout));
        self
    }

    /// Make commands whose line contains `pattern` exit with `code`.
    pub fn fail_on(&self, pattern: &str, code: i32) -> &Self {
        self.push_response(pattern, CmdOutput::failed(code, format!("{} failed", pattern)));
        self
    }

    fn push_response(&self, pattern: &str, output: CmdOutput) {
        let mut responses = lock(&self.responses);
        match responses.iter_mut().find(|(p, _)| p == pattern) {
            Some((_, queue)) => queue.push_back(output),
            None => responses.push((pattern.to_string(), VecDeque::from([output]))),
        }
    }

    /// Every command executed so far.
    pub fn recorded(&self) -> Vec<Cmd> {
        lock(&self.recorded).clone()
    }

    /// Command lines executed so far.
    pub fn commands(&self) -> Vec<String> {
        lock(&self.recorded).iter().map(Cmd::command_line).collect()
    }

    /// Position of the first command line containing `needle`.
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.commands().iter().position(|c| c.contains(needle))
    }

    fn response_for(&self, line: &str) -> CmdOutput {
        let mut responses = lock(&self.responses);
        for (pattern, queue) in responses.iter_mut() {
            if line.contains(pattern.as_str()) {
                return if queue.len() > 1 {
                    queue.pop_front().unwrap_or_default()
                } else {
                    queue.front().cloned().unwrap_or_default()
                };
            }
        }
        CmdOutput::ok("")
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Executor for RecordingExecutor {
    fn execute(&self, cmd: &Cmd) -> Result<CmdOutput> {
        lock(&self.recorded).push(cmd.clone());
        Ok(self.response_for(&cmd.command_line()))
    }

    fn dry_run(&self) -> bool {
        self.dry_run
    }
}

// Map of canned outputs used by `--dry-run` so steps that parse tool output
// still have something to chew on.
pub(crate) fn dry_run_fixtures() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        (
            "eselect profile list",
            "Available profile symlink targets:\n\
             \x20 [1]   default/linux/amd64/23.0 (stable) *\n\
             \x20 [2]   default/linux/amd64/23.0/systemd (stable)\n",
        ),
        (
            "eselect locale list",
            "Available targets for the LANG variable:\n\
             \x20 [1]   C\n\
             \x20 [2]   C.utf8\n\
             \x20 [3]   en_US.utf8\n\
             \x20 [ ]   (free form)\n",
        ),
        ("blkid", "00000000-0000-0000-0000-000000000000"),
    ])
}

impl RecordingExecutor {
    /// Dry-run recorder preloaded with plausible tool output.
    pub fn dry_run_with_fixtures() -> Self {
        let executor = Self::dry_run();
        for (pattern, stdout) in dry_run_fixtures() {
            executor.respond(pattern, stdout);
        }
        executor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/dev/sda1"), "/dev/sda1");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("-O2 -pipe"), "'-O2 -pipe'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("--xattrs-include=*.*"), "'--xattrs-include=*.*'");
    }

    #[test]
    fn test_command_line_and_display() {
        let cmd = Cmd::new("fdisk")
            .arg("/dev/sda")
            .env("LC_ALL", "C")
            .stdin("g\nw\n");
        assert_eq!(cmd.command_line(), "LC_ALL=C fdisk /dev/sda");
        assert_eq!(cmd.to_string(), "LC_ALL=C fdisk /dev/sda <<< 'g\nw\n'");
    }

    #[test]
    fn test_secret_stdin_is_redacted() {
        let cmd = Cmd::new("chpasswd").stdin("root:hunter2\n").secret();
        assert_eq!(cmd.to_string(), "chpasswd <<< [redacted]");

        // Arguments stay visible so the log shows what ran
        let cmd = Cmd::new("chroot")
            .args(["/mnt/gentoo", "/bin/bash", "-c", "chpasswd"])
            .stdin("larry:hunter2\n")
            .secret();
        assert_eq!(
            cmd.to_string(),
            "chroot /mnt/gentoo /bin/bash -c chpasswd <<< [redacted]"
        );
    }

    #[test]
    fn test_ensure_success() {
        let cmd = Cmd::new("false");
        assert!(CmdOutput::ok("").ensure_success(&cmd).is_ok());

        let err = CmdOutput::failed(1, "nope").ensure_success(&cmd).unwrap_err();
        assert_eq!(err.command_exit_code(), Some(1));
    }

    #[test]
    fn test_recording_executor_records_in_order() {
        let exec = RecordingExecutor::new();
        exec.run(&Cmd::new("mkswap").arg("/dev/sda2")).unwrap();
        exec.run(&Cmd::new("swapon").arg("/dev/sda2")).unwrap();
        assert_eq!(exec.commands(), vec!["mkswap /dev/sda2", "swapon /dev/sda2"]);
        assert_eq!(exec.position("swapon"), Some(1));
        assert!(!exec.dry_run());
    }

    #[test]
    fn test_recording_executor_scripted_responses() {
        let exec = RecordingExecutor::new();
        exec.respond("lsblk", "first").respond("lsblk", "second");

        let cmd = Cmd::new("lsblk").arg("/dev/sda");
        assert_eq!(exec.capture(&cmd).unwrap(), "first");
        assert_eq!(exec.capture(&cmd).unwrap(), "second");
        // Last response sticks
        assert_eq!(exec.capture(&cmd).unwrap(), "second");
    }

    #[test]
    fn test_recording_executor_failure() {
        let exec = RecordingExecutor::new();
        exec.fail_on("emerge", 1);
        let err = exec.run(&Cmd::new("emerge").arg("@world")).unwrap_err();
        assert!(matches!(err, InstallError::Command { code: Some(1), .. }));
        assert!(!exec.probe(&Cmd::new("emerge")).unwrap());
    }

    #[test]
    fn test_dry_run_fixtures_loaded() {
        let exec = RecordingExecutor::dry_run_with_fixtures();
        assert!(exec.dry_run());
        let out = exec
            .capture(&Cmd::new("eselect").args(["profile", "list"]))
            .unwrap();
        assert!(out.contains("default/linux/amd64/23.0"));
    }

    #[test]
    fn test_system_executor_captures_stdout_and_stdin() {
        let exec = SystemExecutor::new();
        let out = exec.capture(&Cmd::new("cat").stdin("hello\n")).unwrap();
        assert_eq!(out, "hello");
    }

    #[test]
    fn test_system_executor_propagates_exit_code() {
        let exec = SystemExecutor::new();
        let err = exec
            .run(&Cmd::new("sh").args(["-c", "echo oops >&2; exit 3"]))
            .unwrap_err();
        match err {
            InstallError::Command { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert!(stderr.contains("oops"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
