//! Partition naming, inspection and fdisk dialog generation.
//!
//! Partitions are created one at a time by feeding fdisk a keystroke script.
//! fdisk's dialog depends on how many partitions already exist (the `t`
//! command only asks for a partition number when there is more than one),
//! so every creation first counts what is on the disk and refuses to run
//! unless the count is exactly what the partition number implies.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{InstallError, Result};
use crate::executor::Executor;
use crate::tool_args::ToolArgs;
use crate::tools::disk::{FdiskArgs, LsblkArgs, WipefsArgs};

/// GPT partition types by their fdisk alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKind {
    /// EFI System Partition
    Efi,
    /// BIOS boot partition (GRUB core image on GPT disks)
    BiosBoot,
    Swap,
    Linux,
}

impl PartitionKind {
    /// Alias accepted by fdisk's `t` command for GPT labels.
    pub fn fdisk_alias(self) -> &'static str {
        match self {
            Self::Efi => "uefi",
            Self::BiosBoot => "bios",
            Self::Swap => "swap",
            Self::Linux => "linux",
        }
    }
}

/// One partition to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSpec {
    /// 1-based partition number
    pub number: u32,
    /// fdisk last-sector answer (`+512M`); `None` takes the rest of the disk
    pub size: Option<String>,
    pub kind: PartitionKind,
}

/// Device node of partition `number` on `disk`.
///
/// Disks whose name ends in a digit (`nvme0n1`, `mmcblk0`, `loop0`) separate
/// the partition number with a `p`.
pub fn partition_device(disk: &Path, number: u32) -> PathBuf {
    let disk = disk.display().to_string();
    let separator = if disk.ends_with(|c: char| c.is_ascii_digit()) {
        "p"
    } else {
        ""
    };
    PathBuf::from(format!("{}{}{}", disk, separator, number))
}

/// Count `part` rows in `lsblk -n -r -o NAME,TYPE` output.
pub fn parse_partition_count(lsblk_output: &str) -> usize {
    lsblk_output
        .lines()
        .filter(|line| line.split_whitespace().nth(1) == Some("part"))
        .count()
}

/// Number of partitions currently on `disk`.
pub fn count_partitions(exec: &dyn Executor, disk: &Path) -> Result<usize> {
    let output = exec.capture(&LsblkArgs {
        disk: disk.to_path_buf(),
    }
    .to_cmd())?;
    let count = parse_partition_count(&output);
    debug!("{} has {} partition(s)", disk.display(), count);
    Ok(count)
}

/// Refuse to create partition `number` unless exactly `number - 1` exist.
pub fn check_partition_guard(disk: &Path, existing: usize, number: u32) -> Result<()> {
    let expected = number.saturating_sub(1) as usize;
    if existing == expected {
        Ok(())
    } else {
        Err(InstallError::guard(format!(
            "cannot create partition {} on {}: expected {} existing partition(s), found {}",
            number,
            disk.display(),
            expected,
            existing
        )))
    }
}

/// fdisk dialog that writes a fresh GPT label.
pub fn partition_table_script() -> String {
    "g\nw\n".to_string()
}

/// fdisk dialog that adds `spec` to a disk already holding `existing`
/// partitions.
pub fn new_partition_script(spec: &PartitionSpec, existing: usize) -> String {
    let mut lines = vec![
        "n".to_string(),
        spec.number.to_string(),
        // first sector: default
        String::new(),
        spec.size.clone().unwrap_or_default(),
        "t".to_string(),
    ];
    // After `n` the disk holds existing + 1 partitions.
    if existing >= 1 {
        lines.push(spec.number.to_string());
    }
    lines.push(spec.kind.fdisk_alias().to_string());
    lines.push("w".to_string());
    let mut script = lines.join("\n");
    script.push('\n');
    script
}

/// Existing partition count, trusting the plan when nothing really runs.
fn existing_partitions(exec: &dyn Executor, disk: &Path, assumed: usize) -> Result<usize> {
    if exec.dry_run() {
        info!("[dry-run] assuming {} existing partition(s) on {}", assumed, disk.display());
        return Ok(assumed);
    }
    count_partitions(exec, disk)
}

/// Write a new GPT label on `disk`.
///
/// A disk that already carries partitions is only touched when `wipe` is
/// set, in which case all signatures are erased first.
pub fn create_partition_table(exec: &dyn Executor, disk: &Path, wipe: bool) -> Result<()> {
    let existing = existing_partitions(exec, disk, 0)?;
    if existing > 0 && !wipe {
        return Err(InstallError::guard(format!(
            "{} already holds {} partition(s); set wipe_disk to overwrite it",
            disk.display(),
            existing
        )));
    }
    if wipe {
        exec.run_tool(&WipefsArgs {
            device: disk.to_path_buf(),
        })?;
    }
    exec.run_tool(&FdiskArgs {
        disk: disk.to_path_buf(),
        script: partition_table_script(),
    })?;
    Ok(())
}

/// Create one partition after checking the disk is in the expected state.
pub fn create_partition(exec: &dyn Executor, disk: &Path, spec: &PartitionSpec) -> Result<PathBuf> {
    let assumed = spec.number.saturating_sub(1) as usize;
    let existing = existing_partitions(exec, disk, assumed)?;
    check_partition_guard(disk, existing, spec.number)?;

    exec.run_tool(&FdiskArgs {
        disk: disk.to_path_buf(),
        script: new_partition_script(spec, existing),
    })?;
    Ok(partition_device(disk, spec.number))
}
