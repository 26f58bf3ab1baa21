//! In-place edits of configuration files.
//!
//! Shell-style `KEY="value"` files (`make.conf`, `conf.d/*`) and line lists
//! (`locale.gen`) are edited in process rather than through `sed`. Each edit
//! touches only the lines it targets; everything else is written back
//! byte for byte.
//!
//! The pure `*_text` functions do the work; the file wrappers add logging and
//! honour dry-run.

use std::fs;
use std::path::Path;

use regex::Regex;
use tracing::info;

use crate::error::{InstallError, Result};
use crate::executor::Executor;

fn pattern(source: &str) -> Result<Regex> {
    Regex::new(source).map_err(|e| InstallError::validation(format!("invalid pattern: {}", e)))
}

fn keep_trailing_newline(original: &str, mut edited: String) -> String {
    if original.ends_with('\n') && !edited.ends_with('\n') {
        edited.push('\n');
    }
    edited
}

/// Set `KEY="value"`: replace every assignment of `key` (commented out or
/// not), or append one when the key is absent.
pub fn set_variable_text(text: &str, key: &str, value: &str) -> Result<String> {
    let re = pattern(&format!(r"^\s*#?\s*{}=.*$", regex::escape(key)))?;
    let assignment = format!("{}=\"{}\"", key, value);

    let mut found = false;
    let lines: Vec<String> = text
        .lines()
        .map(|line| {
            if re.is_match(line) {
                found = true;
                assignment.clone()
            } else {
                line.to_string()
            }
        })
        .collect();

    let mut out = lines.join("\n");
    if !found {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&assignment);
        out.push('\n');
        return Ok(out);
    }
    Ok(keep_trailing_newline(text, out))
}

/// Value of the last uncommented `KEY=...` assignment, quotes removed.
pub fn variable_value(text: &str, key: &str) -> Option<String> {
    let prefix = format!("{}=", key);
    text.lines()
        .filter_map(|line| line.trim_start().strip_prefix(prefix.as_str()))
        .last()
        .map(|value| value.trim().trim_matches(|c: char| c == '"' || c == '\'').to_string())
}

fn word_name(word: &str) -> &str {
    word.split_once('=').map_or(word, |(name, _)| name)
}

/// Merge the space-separated `words` into the value of `key`.
///
/// Words already there stay in place. A `name=value` word replaces an
/// existing word with the same `name`; other words are appended.
pub fn extend_variable_text(text: &str, key: &str, words: &str) -> Result<String> {
    let mut merged: Vec<String> = variable_value(text, key)
        .map(|value| value.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    for word in words.split_whitespace() {
        match merged.iter_mut().find(|w| word_name(w) == word_name(word)) {
            Some(existing) => *existing = word.to_string(),
            None => merged.push(word.to_string()),
        }
    }
    set_variable_text(text, key, &merged.join(" "))
}

/// Replace every match of the regular expression `find` with `replace`.
///
/// Returns the new text and the number of lines changed.
pub fn replace_text(text: &str, find: &str, replace: &str) -> Result<(String, usize)> {
    let re = pattern(find)?;
    let mut changed = 0;
    let lines: Vec<String> = text
        .lines()
        .map(|line| {
            let edited = re.replace_all(line, replace);
            if edited != line {
                changed += 1;
            }
            edited.into_owned()
        })
        .collect();
    Ok((keep_trailing_newline(text, lines.join("\n")), changed))
}

/// Remove a leading `#` from lines whose content equals `line`.
///
/// Returns the new text and whether a commented line was found.
pub fn uncomment_text(text: &str, line: &str) -> (String, bool) {
    let mut found = false;
    let lines: Vec<String> = text
        .lines()
        .map(|current| {
            let body = current.trim_start().trim_start_matches('#').trim();
            if current.trim_start().starts_with('#') && body == line.trim() {
                found = true;
                line.trim().to_string()
            } else {
                current.to_string()
            }
        })
        .collect();
    (keep_trailing_newline(text, lines.join("\n")), found)
}

/// Append `line` unless an identical uncommented line already exists.
pub fn append_line_text(text: &str, line: &str) -> String {
    if text.lines().any(|l| l.trim() == line.trim()) {
        return text.to_string();
    }
    let mut out = text.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(line);
    out.push('\n');
    out
}

/// Enable `line`: uncomment it if present, otherwise append it.
pub fn enable_line_text(text: &str, line: &str) -> String {
    let (uncommented, found) = uncomment_text(text, line);
    if found {
        uncommented
    } else {
        append_line_text(text, line)
    }
}

// ============================================================================
// File wrappers
// ============================================================================

fn read_or_empty(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}

fn edit_file<F>(exec: &dyn Executor, path: &Path, what: &str, edit: F) -> Result<()>
where
    F: FnOnce(&str) -> Result<String>,
{
    if exec.dry_run() {
        info!("[dry-run] edit {}: {}", path.display(), what);
        return Ok(());
    }
    info!("Editing {}: {}", path.display(), what);
    let original = read_or_empty(path)?;
    let edited = edit(&original)?;
    if edited != original {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, edited)?;
    }
    Ok(())
}

/// Set `KEY="value"` in a file.
pub fn set_variable(exec: &dyn Executor, path: &Path, key: &str, value: &str) -> Result<()> {
    edit_file(exec, path, &format!("{}=\"{}\"", key, value), |text| {
        set_variable_text(text, key, value)
    })
}

/// Add `words` to a `KEY="..."` list in a file, keeping the words already set.
pub fn extend_variable(exec: &dyn Executor, path: &Path, key: &str, words: &str) -> Result<()> {
    edit_file(exec, path, &format!("{} += \"{}\"", key, words), |text| {
        extend_variable_text(text, key, words)
    })
}

/// Regex replace in a file; fails if nothing matched.
pub fn replace(exec: &dyn Executor, path: &Path, find: &str, with: &str) -> Result<()> {
    edit_file(exec, path, &format!("s/{}/{}/", find, with), |text| {
        let (edited, changed) = replace_text(text, find, with)?;
        if changed == 0 {
            return Err(InstallError::validation(format!(
                "pattern '{}' not found in {}",
                find,
                path.display()
            )));
        }
        Ok(edited)
    })
}

/// Uncomment `line` in a file, appending it if it is not there at all.
pub fn enable_line(exec: &dyn Executor, path: &Path, line: &str) -> Result<()> {
    edit_file(exec, path, &format!("enable '{}'", line), |text| {
        Ok(enable_line_text(text, line))
    })
}

/// Append `line` to a file unless already present.
pub fn append_line(exec: &dyn Executor, path: &Path, line: &str) -> Result<()> {
    edit_file(exec, path, &format!("append '{}'", line), |text| {
        Ok(append_line_text(text, line))
    })
}

/// Replace a file's contents.
pub fn write_file(exec: &dyn Executor, path: &Path, contents: &str) -> Result<()> {
    if exec.dry_run() {
        info!("[dry-run] write {} ({} bytes)", path.display(), contents.len());
        return Ok(());
    }
    info!("Writing {}", path.display());
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RecordingExecutor;
    use tempfile::TempDir;

    const MAKE_CONF: &str = "\
# These settings were set by the catalyst build script
COMMON_FLAGS=\"-O2 -pipe\"
CFLAGS=\"${COMMON_FLAGS}\"
#MAKEOPTS=\"-j2\"

LC_MESSAGES=C.utf8
";

    #[test]
    fn test_set_variable_replaces_existing() {
        let out = set_variable_text(MAKE_CONF, "COMMON_FLAGS", "-march=native -O2 -pipe").unwrap();
        assert!(out.contains("COMMON_FLAGS=\"-march=native -O2 -pipe\"\n"));
        assert!(out.contains("CFLAGS=\"${COMMON_FLAGS}\"\n"));
        assert!(out.starts_with("# These settings"));
        assert!(out.ends_with("LC_MESSAGES=C.utf8\n"));
    }

    #[test]
    fn test_set_variable_activates_commented_assignment() {
        let out = set_variable_text(MAKE_CONF, "MAKEOPTS", "-j8").unwrap();
        assert!(out.contains("\nMAKEOPTS=\"-j8\"\n"));
        assert!(!out.contains("#MAKEOPTS"));
        assert_eq!(out.lines().count(), MAKE_CONF.lines().count());
    }

    #[test]
    fn test_set_variable_appends_missing_key() {
        let out = set_variable_text(MAKE_CONF, "VIDEO_CARDS", "amdgpu radeonsi").unwrap();
        assert!(out.ends_with("LC_MESSAGES=C.utf8\nVIDEO_CARDS=\"amdgpu radeonsi\"\n"));
    }

    #[test]
    fn test_set_variable_does_not_touch_prefixed_keys() {
        let text = "USE=\"a\"\nUSE_EXPAND=\"b\"\n";
        let out = set_variable_text(text, "USE", "x").unwrap();
        assert_eq!(out, "USE=\"x\"\nUSE_EXPAND=\"b\"\n");
    }

    #[test]
    fn test_extend_variable_keeps_existing_words() {
        const KEY: &str = "GRUB_CMDLINE_LINUX_DEFAULT";
        let text = "GRUB_TIMEOUT=5\nGRUB_CMDLINE_LINUX_DEFAULT=\"root=/dev/sda3 nomodeset\"\n";
        let out = extend_variable_text(text, KEY, "splash=silent quiet").unwrap();
        assert_eq!(
            out,
            "GRUB_TIMEOUT=5\n\
             GRUB_CMDLINE_LINUX_DEFAULT=\"root=/dev/sda3 nomodeset splash=silent quiet\"\n"
        );

        // Running again changes nothing; a new value for a named word replaces it
        let again = extend_variable_text(&out, KEY, "splash=silent quiet").unwrap();
        assert_eq!(again, out);
        let themed = extend_variable_text(&out, KEY, "splash=verbose").unwrap();
        assert_eq!(
            variable_value(&themed, KEY).as_deref(),
            Some("root=/dev/sda3 nomodeset splash=verbose quiet")
        );
    }

    #[test]
    fn test_extend_variable_ignores_commented_value() {
        let text = "#GRUB_CMDLINE_LINUX_DEFAULT=\"old\"\n";
        assert_eq!(variable_value(text, "GRUB_CMDLINE_LINUX_DEFAULT"), None);
        let out = extend_variable_text(text, "GRUB_CMDLINE_LINUX_DEFAULT", "quiet").unwrap();
        assert_eq!(out, "GRUB_CMDLINE_LINUX_DEFAULT=\"quiet\"\n");
    }

    #[test]
    fn test_replace_text_counts_changes() {
        let text = "keymap=\"us\"\nwindowkeys=\"YES\"\n";
        let (out, changed) = replace_text(text, r#"^keymap=".*""#, "keymap=\"de\"").unwrap();
        assert_eq!(out, "keymap=\"de\"\nwindowkeys=\"YES\"\n");
        assert_eq!(changed, 1);

        let (_, changed) = replace_text(text, "^nothing", "x").unwrap();
        assert_eq!(changed, 0);
    }

    #[test]
    fn test_uncomment_and_enable() {
        let text = "# en_US ISO-8859-1\n#en_US.UTF-8 UTF-8\n";
        let (out, found) = uncomment_text(text, "en_US.UTF-8 UTF-8");
        assert!(found);
        assert_eq!(out, "# en_US ISO-8859-1\nen_US.UTF-8 UTF-8\n");

        let out = enable_line_text(text, "de_DE.UTF-8 UTF-8");
        assert_eq!(out, "# en_US ISO-8859-1\n#en_US.UTF-8 UTF-8\nde_DE.UTF-8 UTF-8\n");
    }

    #[test]
    fn test_append_line_is_idempotent() {
        let once = append_line_text("a\n", "b");
        assert_eq!(once, "a\nb\n");
        assert_eq!(append_line_text(&once, "b"), once);
        assert_eq!(append_line_text("a", "b"), "a\nb\n");
    }

    #[test]
    fn test_file_edits_and_dry_run() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("make.conf");
        fs::write(&path, MAKE_CONF).unwrap();

        let dry = RecordingExecutor::dry_run();
        set_variable(&dry, &path, "USE", "X").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), MAKE_CONF);

        let live = RecordingExecutor::new();
        set_variable(&live, &path, "USE", "X").unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("USE=\"X\""));

        let err = replace(&live, &path, "^NOPE=", "x").unwrap_err();
        assert!(matches!(err, InstallError::Validation(_)));
    }

    #[test]
    fn test_write_file_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("etc/conf.d/hostname");
        write_file(&RecordingExecutor::new(), &path, "hostname=\"gentoo\"\n").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "hostname=\"gentoo\"\n");
    }
}
