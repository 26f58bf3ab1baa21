//! Parsing of `eselect <module> list` output.
//!
//! ```text
//! Available profile symlink targets:
//!   [1]   default/linux/amd64/23.0 (stable) *
//!   [2]   default/linux/amd64/23.0/systemd (stable)
//!   [ ]   (free form)
//! ```
//!
//! Each numbered row becomes an `EselectEntry`; the trailing `*` marks the
//! current selection. Rows without a number are skipped.

use crate::error::{InstallError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EselectEntry {
    /// Number to pass to `eselect <module> set`
    pub index: usize,
    pub name: String,
    pub selected: bool,
}

/// Parse `eselect <module> list` output; at least one entry is required.
pub fn parse_list(output: &str) -> Result<Vec<EselectEntry>> {
    let entries: Vec<EselectEntry> = output.lines().filter_map(parse_row).collect();
    if entries.is_empty() {
        return Err(InstallError::parse("eselect listed no selectable entries"));
    }
    Ok(entries)
}

fn parse_row(line: &str) -> Option<EselectEntry> {
    let rest = line.trim_start().strip_prefix('[')?;
    let (number, rest) = rest.split_once(']')?;
    let index = number.trim().parse().ok()?;
    let name = rest.split_whitespace().next()?.to_string();
    let selected = rest.trim_end().ends_with('*');
    Some(EselectEntry {
        index,
        name,
        selected,
    })
}

/// Locale names as eselect prints them (`en_US.utf8`) vs as configured
/// (`en_US.UTF-8`).
fn normalize(name: &str) -> String {
    name.to_ascii_lowercase().replace('-', "")
}

/// Entry named `wanted`, matching exactly first, then loosely.
pub fn find<'a>(entries: &'a [EselectEntry], wanted: &str) -> Option<&'a EselectEntry> {
    entries.iter().find(|e| e.name == wanted).or_else(|| {
        let wanted = normalize(wanted);
        entries.iter().find(|e| normalize(&e.name) == wanted)
    })
}

/// Position of the currently selected entry, if any.
pub fn selected_position(entries: &[EselectEntry]) -> Option<usize> {
    entries.iter().position(|e| e.selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILES: &str = "\
Available profile symlink targets:
  [1]   default/linux/amd64/23.0 (stable) *
  [2]   default/linux/amd64/23.0/systemd (stable)
  [3]   default/linux/amd64/23.0/desktop (stable)
";

    const LOCALES: &str = "\
Available targets for the LANG variable:
  [1]   C
  [2]   C.utf8
  [3]   en_US.utf8
  [4]   POSIX
  [ ]   (free form)
";

    #[test]
    fn test_parse_profiles() {
        let entries = parse_list(PROFILES).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name, "default/linux/amd64/23.0");
        assert!(entries[0].selected);
        assert!(!entries[1].selected);
        assert_eq!(entries[2].index, 3);
        assert_eq!(selected_position(&entries), Some(0));
    }

    #[test]
    fn test_parse_locales_skips_free_form() {
        let entries = parse_list(LOCALES).unwrap();
        assert_eq!(entries.len(), 4);
        assert!(entries.iter().all(|e| e.name != "(free"));
        assert_eq!(selected_position(&entries), None);
    }

    #[test]
    fn test_parse_empty_output_fails() {
        assert!(matches!(
            parse_list("Available targets:\n").unwrap_err(),
            InstallError::Parse(_)
        ));
    }

    #[test]
    fn test_find_exact_and_loose() {
        let entries = parse_list(LOCALES).unwrap();
        assert_eq!(find(&entries, "en_US.utf8").map(|e| e.index), Some(3));
        assert_eq!(find(&entries, "en_US.UTF-8").map(|e| e.index), Some(3));
        assert!(find(&entries, "de_DE.UTF-8").is_none());

        let profiles = parse_list(PROFILES).unwrap();
        assert_eq!(
            find(&profiles, "default/linux/amd64/23.0/systemd").map(|e| e.index),
            Some(2)
        );
    }
}
