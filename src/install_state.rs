//! Phase progress state machine
//!
//! Tracks how far a phase run has come. Steps may only be started in the
//! order the phase table lists them, and a failure is terminal: nothing can
//! be started or completed after it.
//!
//! ```text
//! NotStarted
//!     ↓ start(step 1)
//! Running(step 1) → complete → Running(step 2) → ... → Completed
//!     ↓ fail
//! Failed(step)
//! ```

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::error::InstallError;

/// Where a phase run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStatus {
    NotStarted,
    /// A step is executing
    Running(&'static str),
    /// Between two steps
    Idle,
    Completed,
    Failed(&'static str),
}

impl PhaseStatus {
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::Running(step) => write!(f, "running {}", step),
            Self::Idle => write!(f, "between steps"),
            Self::Completed => write!(f, "completed"),
            Self::Failed(step) => write!(f, "failed at {}", step),
        }
    }
}

/// Invalid transitions of a [`PhaseProgress`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgressError {
    #[error("Cannot change a finished phase ({status})")]
    Finished { status: PhaseStatus },

    #[error("Step {expected} must run before {requested}")]
    OutOfOrder {
        expected: &'static str,
        requested: &'static str,
    },

    #[error("Step {requested} is not part of this run")]
    UnknownStep { requested: &'static str },

    #[error("No step is running")]
    NothingRunning,

    #[error("Step {running} is still running")]
    StillRunning { running: &'static str },
}

impl From<ProgressError> for InstallError {
    fn from(err: ProgressError) -> Self {
        InstallError::Guard(err.to_string())
    }
}

/// Progress of one phase run over a fixed, ordered list of step names.
///
/// ```
/// use gentoo_install::install_state::{PhaseProgress, PhaseStatus};
///
/// let mut progress = PhaseProgress::new(vec!["sync_clock", "mount_root"]);
/// progress.start("sync_clock").unwrap();
/// progress.complete(std::time::Duration::from_secs(1)).unwrap();
///
/// // mount_root is next; nothing may jump ahead of it
/// assert!(progress.start("sync_clock").is_err());
/// progress.start("mount_root").unwrap();
/// progress.fail().unwrap();
/// assert_eq!(progress.status(), PhaseStatus::Failed("mount_root"));
/// ```
#[derive(Debug, Clone)]
pub struct PhaseProgress {
    planned: Vec<&'static str>,
    status: PhaseStatus,
    /// Completed steps with their run time
    completed: Vec<(&'static str, Duration)>,
}

impl PhaseProgress {
    pub fn new(planned: Vec<&'static str>) -> Self {
        Self {
            planned,
            status: PhaseStatus::NotStarted,
            completed: Vec::new(),
        }
    }

    pub fn status(&self) -> PhaseStatus {
        self.status
    }

    pub fn planned(&self) -> &[&'static str] {
        &self.planned
    }

    pub fn completed(&self) -> &[(&'static str, Duration)] {
        &self.completed
    }

    pub fn completed_names(&self) -> Vec<&'static str> {
        self.completed.iter().map(|(name, _)| *name).collect()
    }

    pub fn failed_step(&self) -> Option<&'static str> {
        match self.status {
            PhaseStatus::Failed(step) => Some(step),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == PhaseStatus::Completed
    }

    pub fn total_elapsed(&self) -> Duration {
        self.completed.iter().map(|(_, d)| *d).sum()
    }

    /// The step that has to run next, if any.
    pub fn next_step(&self) -> Option<&'static str> {
        if self.status.is_terminal() {
            return None;
        }
        self.planned.get(self.completed.len()).copied()
    }

    /// Mark `step` as running. It must be the next planned step.
    pub fn start(&mut self, step: &'static str) -> Result<(), ProgressError> {
        match self.status {
            s if s.is_terminal() => return Err(ProgressError::Finished { status: s }),
            PhaseStatus::Running(running) => return Err(ProgressError::StillRunning { running }),
            _ => {}
        }
        if !self.planned.contains(&step) {
            return Err(ProgressError::UnknownStep { requested: step });
        }
        match self.next_step() {
            Some(expected) if expected == step => {
                self.status = PhaseStatus::Running(step);
                Ok(())
            }
            Some(expected) => Err(ProgressError::OutOfOrder {
                expected,
                requested: step,
            }),
            None => Err(ProgressError::UnknownStep { requested: step }),
        }
    }

    /// Mark the running step as done. Completes the phase after the last step.
    pub fn complete(&mut self, elapsed: Duration) -> Result<(), ProgressError> {
        let PhaseStatus::Running(step) = self.status else {
            return match self.status {
                s if s.is_terminal() => Err(ProgressError::Finished { status: s }),
                _ => Err(ProgressError::NothingRunning),
            };
        };
        self.completed.push((step, elapsed));
        self.status = if self.completed.len() == self.planned.len() {
            PhaseStatus::Completed
        } else {
            PhaseStatus::Idle
        };
        Ok(())
    }

    /// Mark the running step as failed. Terminal.
    pub fn fail(&mut self) -> Result<(), ProgressError> {
        match self.status {
            PhaseStatus::Running(step) => {
                self.status = PhaseStatus::Failed(step);
                Ok(())
            }
            s if s.is_terminal() => Err(ProgressError::Finished { status: s }),
            _ => Err(ProgressError::NothingRunning),
        }
    }

    /// An empty selection is complete without running anything.
    pub fn finish_if_empty(&mut self) {
        if self.planned.is_empty() && self.status == PhaseStatus::NotStarted {
            self.status = PhaseStatus::Completed;
        }
    }
}
