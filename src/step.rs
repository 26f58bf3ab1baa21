//! A step: one named, logged unit of installation work.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::context::InstallContext;
use crate::error::Result;

pub type StepFn = fn(&mut InstallContext) -> Result<()>;

#[derive(Clone, Copy)]
pub struct Step {
    /// Stable identifier used by `--from` / `--only`
    pub name: &'static str,
    pub description: &'static str,
    pub run: StepFn,
}

impl Step {
    pub const fn new(name: &'static str, description: &'static str, run: StepFn) -> Self {
        Self {
            name,
            description,
            run,
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// `1m 05s` / `3.2s`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}

/// Run one step between a start and an end log line.
///
/// A failure is logged and returned wrapped in `InstallError::Step`.
pub fn run_step(
    step: &Step,
    ctx: &mut InstallContext,
    position: usize,
    total: usize,
) -> Result<Duration> {
    info!("==> [{}/{}] {}", position, total, step.description);
    let started = Instant::now();
    match (step.run)(ctx) {
        Ok(()) => {
            let elapsed = started.elapsed();
            info!("<== {} done ({})", step.name, format_elapsed(elapsed));
            Ok(elapsed)
        }
        Err(e) => {
            error!("<== {} failed after {}: {}", step.name, format_elapsed(started.elapsed()), e);
            Err(e.in_step(step.name))
        }
    }
}
