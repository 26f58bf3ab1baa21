//! Step functions, grouped by what they work on.
//!
//! Every function here has the `StepFn` signature and is listed in a phase
//! table in `phases`.

pub mod base;
pub mod boot;
pub mod disk;
pub mod kernel;
pub mod programs;
pub mod system;
