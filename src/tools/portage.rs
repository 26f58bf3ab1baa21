//! Type-safe arguments for Portage and its helpers.
//!
//! - `EmergeArgs` for `emerge`
//! - `WebrsyncArgs` for `emerge-webrsync`
//! - `EselectArgs` for `eselect <module> list|set`
//! - `LocaleGenArgs`, `EnvUpdateArgs`, `GenkernelArgs`

use crate::tool_args::ToolArgs;

/// Type-safe arguments for `emerge`.
///
/// # Field to Flag Mapping
///
/// | Field        | Flag          |
/// |--------------|---------------|
/// | `verbose`    | `--verbose`   |
/// | `update`     | `--update`    |
/// | `deep`       | `--deep`      |
/// | `newuse`     | `--newuse`    |
/// | `noreplace`  | `--noreplace` |
/// | `config`     | `--config`    |
///
/// Atoms come last. `--ask` is never passed: every run is unattended.
#[derive(Debug, Clone, Default)]
pub struct EmergeArgs {
    pub atoms: Vec<String>,
    pub verbose: bool,
    pub update: bool,
    pub deep: bool,
    pub newuse: bool,
    pub noreplace: bool,
    /// Run the package's `pkg_config` phase instead of installing
    pub config: bool,
}

impl EmergeArgs {
    /// `emerge --noreplace <atoms>`: install if missing, keep otherwise.
    pub fn install<I, S>(atoms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            atoms: atoms.into_iter().map(Into::into).collect(),
            noreplace: true,
            ..Self::default()
        }
    }

    /// `emerge --verbose --update --deep --newuse @world`
    pub fn update_world() -> Self {
        Self {
            atoms: vec!["@world".to_string()],
            verbose: true,
            update: true,
            deep: true,
            newuse: true,
            ..Self::default()
        }
    }

    /// `emerge --config <atom>`
    pub fn configure(atom: &str) -> Self {
        Self {
            atoms: vec![atom.to_string()],
            config: true,
            ..Self::default()
        }
    }
}

impl ToolArgs for EmergeArgs {
    fn program(&self) -> &str {
        "emerge"
    }

    fn to_cli_args(&self) -> Vec<String> {
        let flags = [
            (self.verbose, "--verbose"),
            (self.update, "--update"),
            (self.deep, "--deep"),
            (self.newuse, "--newuse"),
            (self.noreplace, "--noreplace"),
            (self.config, "--config"),
        ];
        let mut args: Vec<String> = flags
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, flag)| flag.to_string())
            .collect();
        args.extend(self.atoms.iter().cloned());
        args
    }
}

/// `emerge-webrsync`: fetch the latest Portage snapshot over HTTP.
#[derive(Debug, Clone, Default)]
pub struct WebrsyncArgs;

impl ToolArgs for WebrsyncArgs {
    fn program(&self) -> &str {
        "emerge-webrsync"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![]
    }
}

/// What to ask `eselect` for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EselectAction {
    List,
    /// 1-based index as printed by `list`
    Set(usize),
}

/// Type-safe arguments for `eselect <module> list` / `eselect <module> set N`.
///
/// `list` runs with `LC_ALL=C` and `NOCOLOR=yes` so the output parser sees
/// plain text.
#[derive(Debug, Clone)]
pub struct EselectArgs {
    pub module: String,
    pub action: EselectAction,
}

impl EselectArgs {
    pub fn list(module: &str) -> Self {
        Self {
            module: module.to_string(),
            action: EselectAction::List,
        }
    }

    pub fn set(module: &str, index: usize) -> Self {
        Self {
            module: module.to_string(),
            action: EselectAction::Set(index),
        }
    }
}

impl ToolArgs for EselectArgs {
    fn program(&self) -> &str {
        "eselect"
    }

    fn to_cli_args(&self) -> Vec<String> {
        match self.action {
            EselectAction::List => vec![self.module.clone(), "list".to_string()],
            EselectAction::Set(index) => {
                vec![self.module.clone(), "set".to_string(), index.to_string()]
            }
        }
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        match self.action {
            EselectAction::List => vec![
                ("LC_ALL".to_string(), "C".to_string()),
                ("NOCOLOR".to_string(), "yes".to_string()),
            ],
            EselectAction::Set(_) => vec![],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LocaleGenArgs;

impl ToolArgs for LocaleGenArgs {
    fn program(&self) -> &str {
        "locale-gen"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![]
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnvUpdateArgs;

impl ToolArgs for EnvUpdateArgs {
    fn program(&self) -> &str {
        "env-update"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![]
    }
}

/// `genkernel [--install] all`
#[derive(Debug, Clone)]
pub struct GenkernelArgs {
    pub install: bool,
}

impl ToolArgs for GenkernelArgs {
    fn program(&self) -> &str {
        "genkernel"
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.install {
            args.push("--install".to_string());
        }
        args.push("all".to_string());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_world_flags() {
        assert_eq!(
            EmergeArgs::update_world().to_cli_args(),
            vec!["--verbose", "--update", "--deep", "--newuse", "@world"]
        );
    }

    #[test]
    fn test_install_uses_noreplace() {
        let args = EmergeArgs::install(["sys-kernel/linux-firmware", "net-misc/dhcpcd"]);
        assert_eq!(
            args.to_cli_args(),
            vec!["--noreplace", "sys-kernel/linux-firmware", "net-misc/dhcpcd"]
        );
    }

    #[test]
    fn test_configure() {
        assert_eq!(
            EmergeArgs::configure("sys-libs/timezone-data").to_cli_args(),
            vec!["--config", "sys-libs/timezone-data"]
        );
    }

    #[test]
    fn test_eselect_list_and_set() {
        let list = EselectArgs::list("profile");
        assert_eq!(list.to_cli_args(), vec!["profile", "list"]);
        assert!(list.get_env_vars().iter().any(|(k, v)| k == "NOCOLOR" && v == "yes"));

        let set = EselectArgs::set("locale", 4);
        assert_eq!(set.to_cli_args(), vec!["locale", "set", "4"]);
        assert!(set.get_env_vars().is_empty());
    }

    #[test]
    fn test_genkernel() {
        assert_eq!(GenkernelArgs { install: true }.to_cli_args(), vec!["--install", "all"]);
    }
}
