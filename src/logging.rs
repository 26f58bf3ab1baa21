//! Console + file logging
//!
//! Every observable action goes to two sinks: the console and an
//! append-only log file, one per phase invocation. Both sinks are layers on
//! a single `tracing` subscriber, so any `tracing::info!` anywhere in the
//! crate is mirrored to the file.
//!
//! `RUST_LOG` overrides the default level through `EnvFilter`.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::error::{InstallError, Result};

/// Logging setup for one invocation
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Directory holding the log files
    pub log_dir: PathBuf,
    /// Log file stem, usually the phase name (`install-base`)
    pub name: String,
    /// Show debug output (command output captured for parsing, etc.)
    pub verbose: bool,
}

impl LogOptions {
    /// Full path of the log file for these options
    pub fn log_path(&self) -> PathBuf {
        log_path(&self.log_dir, &self.name)
    }
}

/// Path of the log file `<dir>/<name>.log`
pub fn log_path(log_dir: &Path, name: &str) -> PathBuf {
    log_dir.join(format!("{}.log", name))
}

/// Default filter directive when `RUST_LOG` is unset
fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "gentoo_install=debug,gentoo_install::cmd=debug,info"
    } else {
        "info"
    }
}

/// Open the log file for appending, creating its directory first.
pub fn open_log_file(options: &LogOptions) -> Result<(PathBuf, File)> {
    fs::create_dir_all(&options.log_dir)?;
    let path = options.log_path();
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((path, file))
}

/// Plain-text layer writing timestamped lines to `file`
fn file_layer<S>(file: File) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file))
}

/// Install the global subscriber: console layer plus append-only file layer.
///
/// Returns the path of the log file. Fails if the file cannot be opened or a
/// subscriber is already installed.
pub fn init(options: &LogOptions) -> Result<PathBuf> {
    let (path, file) = open_log_file(options)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(options.verbose)));

    let console = fmt::layer()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stdout);

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer(file))
        .try_init()
        .map_err(|e| InstallError::config(format!("failed to initialize logging: {}", e)))?;

    tracing::info!("==== {} started (log: {}) ====", options.name, path.display());
    Ok(path)
}

/// Console-only logging for commands that don't run a phase (`steps`, `config`)
pub fn init_console(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).without_time())
        .try_init();
}
