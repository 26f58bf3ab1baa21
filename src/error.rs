//! Error handling module for the Gentoo installer
//!
//! Every leaf utility and step returns `error::Result`. A failing wrapped
//! command surfaces as `InstallError::Command` and aborts the running phase.

use thiserror::Error;

/// Main error type for the installer
#[derive(Error, Debug)]
pub enum InstallError {
    /// IO errors (file operations, spawning processes, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP errors while fetching stage3 files
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration errors (loading, parsing)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors (config values, step names)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A wrapped command exited with a non-zero status
    #[error(
        "Command failed (exit code {}): {command}{}",
        exit_code_label(.code),
        stderr_suffix(.stderr)
    )]
    Command {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// A state guard refused to continue (e.g. unexpected partition count)
    #[error("Refusing to continue: {0}")]
    Guard(String),

    /// Downloaded file does not match its published digest
    #[error("Checksum mismatch for {file}: expected {expected}, got {actual}")]
    Checksum {
        file: String,
        expected: String,
        actual: String,
    },

    /// Download errors that are not plain HTTP failures
    #[error("Download error: {0}")]
    Download(String),

    /// Tool output that could not be understood
    #[error("Parse error: {0}")]
    Parse(String),

    /// Interactive prompt errors (no terminal, retries exhausted)
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Preflight environment checks failed
    #[error("Preflight check failed: {0}")]
    Preflight(String),

    /// A step failed; wraps the underlying cause
    #[error("Step '{step}' failed")]
    Step {
        step: String,
        #[source]
        source: Box<InstallError>,
    },
}

fn exit_code_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

/// Result type alias for installer operations
pub type Result<T> = std::result::Result<T, InstallError>;

// Convenient error constructors
impl InstallError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a guard error
    pub fn guard(msg: impl Into<String>) -> Self {
        Self::Guard(msg.into())
    }

    /// Create a download error
    pub fn download(msg: impl Into<String>) -> Self {
        Self::Download(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a prompt error
    pub fn prompt(msg: impl Into<String>) -> Self {
        Self::Prompt(msg.into())
    }

    /// Wrap an error with the name of the step it happened in
    pub fn in_step(self, step: &str) -> Self {
        Self::Step {
            step: step.to_string(),
            source: Box::new(self),
        }
    }

    /// Exit code of the failing command, if this error came from one
    pub fn command_exit_code(&self) -> Option<i32> {
        match self {
            Self::Command { code, .. } => *code,
            Self::Step { source, .. } => source.command_exit_code(),
            _ => None,
        }
    }
}
