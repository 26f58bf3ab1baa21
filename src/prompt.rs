//! Interactive input: passwords and list selection.
//!
//! `TerminalPrompter` asks on the terminal through dialoguer.
//! `ScriptedPrompter` replays canned answers, for tests and unattended runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use dialoguer::{Password, Select};
use tracing::{info, warn};

use crate::error::{InstallError, Result};

/// How many times a mistyped password may be re-entered.
pub const PASSWORD_ATTEMPTS: usize = 3;

pub trait Prompter {
    /// Read one hidden line.
    fn password(&self, prompt: &str) -> Result<String>;

    /// Pick one of `items`; returns its position.
    fn select(&self, prompt: &str, items: &[String], default: usize) -> Result<usize>;
}

/// Prompts on the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn password(&self, prompt: &str) -> Result<String> {
        Password::new()
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()
            .map_err(|e| InstallError::prompt(format!("failed to read password: {}", e)))
    }

    fn select(&self, prompt: &str, items: &[String], default: usize) -> Result<usize> {
        Select::new()
            .with_prompt(prompt)
            .items(items)
            .default(default)
            .interact_opt()
            .map_err(|e| InstallError::prompt(format!("failed to read selection: {}", e)))?
            .ok_or_else(|| InstallError::prompt("selection cancelled"))
    }
}

/// Never asks: takes the default entry and a placeholder password.
///
/// Used by `--dry-run`, where nothing reaches the target system.
#[derive(Debug, Default)]
pub struct UnattendedPrompter;

/// Password handed out by `UnattendedPrompter`
pub const PLACEHOLDER_PASSWORD: &str = "dry-run";

impl Prompter for UnattendedPrompter {
    fn password(&self, prompt: &str) -> Result<String> {
        info!("[dry-run] {}: using a placeholder", prompt);
        Ok(PLACEHOLDER_PASSWORD.to_string())
    }

    fn select(&self, prompt: &str, items: &[String], default: usize) -> Result<usize> {
        let chosen = items
            .get(default)
            .ok_or_else(|| InstallError::prompt(format!("nothing to choose for '{}'", prompt)))?;
        info!("[dry-run] {}: {}", prompt, chosen);
        Ok(default)
    }
}

/// One canned answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Password(String),
    Select(usize),
}

/// Replays answers in order; running out is a prompt error.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<Answer>>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
        }
    }

    /// Prompter that fails on any question.
    pub fn empty() -> Self {
        Self::default()
    }

    fn next(&self, prompt: &str) -> Result<Answer> {
        self.answers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .ok_or_else(|| InstallError::prompt(format!("no answer scripted for '{}'", prompt)))
    }

    pub fn remaining(&self) -> usize {
        self.answers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl Prompter for ScriptedPrompter {
    fn password(&self, prompt: &str) -> Result<String> {
        match self.next(prompt)? {
            Answer::Password(p) => Ok(p),
            other => Err(InstallError::prompt(format!(
                "expected a password for '{}', got {:?}",
                prompt, other
            ))),
        }
    }

    fn select(&self, prompt: &str, items: &[String], _default: usize) -> Result<usize> {
        match self.next(prompt)? {
            Answer::Select(i) if i < items.len() => Ok(i),
            other => Err(InstallError::prompt(format!(
                "invalid selection for '{}': {:?}",
                prompt, other
            ))),
        }
    }
}

/// Ask for a new password for `account`, typed twice.
///
/// `preset` (from the environment) wins without prompting. Empty or
/// mismatching entries are retried up to `PASSWORD_ATTEMPTS` times.
pub fn new_password(
    prompter: &dyn Prompter,
    account: &str,
    preset: Option<String>,
) -> Result<String> {
    if let Some(password) = preset.filter(|p| !p.is_empty()) {
        info!("Using preset password for {}", account);
        return Ok(password);
    }

    for attempt in 1..=PASSWORD_ATTEMPTS {
        let first = prompter.password(&format!("New password for {}", account))?;
        if first.is_empty() {
            warn!("Empty password for {} (attempt {}/{})", account, attempt, PASSWORD_ATTEMPTS);
            continue;
        }
        let second = prompter.password(&format!("Retype password for {}", account))?;
        if first == second {
            return Ok(first);
        }
        warn!("Passwords do not match (attempt {}/{})", attempt, PASSWORD_ATTEMPTS);
    }

    Err(InstallError::prompt(format!(
        "no password set for {} after {} attempts",
        account, PASSWORD_ATTEMPTS
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pw(s: &str) -> Answer {
        Answer::Password(s.to_string())
    }

    #[test]
    fn test_password_match_first_time() {
        let prompter = ScriptedPrompter::new([pw("secret"), pw("secret")]);
        assert_eq!(new_password(&prompter, "root", None).unwrap(), "secret");
        assert_eq!(prompter.remaining(), 0);
    }

    #[test]
    fn test_password_mismatch_then_match() {
        let prompter = ScriptedPrompter::new([pw("one"), pw("two"), pw("three"), pw("three")]);
        assert_eq!(new_password(&prompter, "larry", None).unwrap(), "three");
    }

    #[test]
    fn test_password_empty_is_retried() {
        let prompter = ScriptedPrompter::new([pw(""), pw("ok"), pw("ok")]);
        assert_eq!(new_password(&prompter, "root", None).unwrap(), "ok");
    }

    #[test]
    fn test_password_retries_exhausted() {
        let prompter = ScriptedPrompter::new([
            pw("a"),
            pw("b"),
            pw("c"),
            pw("d"),
            pw("e"),
            pw("f"),
        ]);
        let err = new_password(&prompter, "root", None).unwrap_err();
        assert!(matches!(err, InstallError::Prompt(_)));
        assert!(err.to_string().contains("after 3 attempts"));
    }

    #[test]
    fn test_preset_password_skips_prompt() {
        let prompter = ScriptedPrompter::empty();
        assert_eq!(
            new_password(&prompter, "root", Some("fromenv".to_string())).unwrap(),
            "fromenv"
        );
        // Empty preset falls through to prompting
        assert!(new_password(&prompter, "root", Some(String::new())).is_err());
    }

    #[test]
    fn test_unattended_prompter_never_asks() {
        let prompter = UnattendedPrompter;
        assert_eq!(new_password(&prompter, "root", None).unwrap(), PLACEHOLDER_PASSWORD);

        let items = vec!["default/linux/amd64/23.0".to_string(), "systemd".to_string()];
        assert_eq!(prompter.select("Select profile", &items, 1).unwrap(), 1);
        assert!(prompter.select("Select profile", &[], 0).is_err());
    }

    #[test]
    fn test_scripted_select_bounds() {
        let items = vec!["a".to_string(), "b".to_string()];
        let prompter = ScriptedPrompter::new([Answer::Select(1), Answer::Select(5)]);
        assert_eq!(prompter.select("pick", &items, 0).unwrap(), 1);
        assert!(prompter.select("pick", &items, 0).is_err());
    }
}
