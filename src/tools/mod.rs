//! Typed argument structs for every external tool the installer drives.
//!
//! Each struct implements `ToolArgs` and maps its fields to the exact flags
//! the tool expects.

pub mod disk;
pub mod portage;
pub mod system;
pub mod user;
