//! Type-safe arguments for user and home-directory tools.
//!
//! - `UseraddArgs` for `useradd`
//! - `ChpasswdArgs` for `chpasswd` (password on stdin, never logged)
//! - `GpasswdArgs` for group membership
//! - `GitCloneArgs` for dotfiles and editor plugins
//! - `ChownArgs` for handing files to the user

use std::path::PathBuf;

use crate::tool_args::ToolArgs;

/// `useradd -m -G <groups> -s <shell> <username>`
#[derive(Debug, Clone)]
pub struct UseraddArgs {
    pub username: String,
    /// Supplementary groups, joined with commas
    pub groups: Vec<String>,
    pub shell: String,
}

impl ToolArgs for UseraddArgs {
    fn program(&self) -> &str {
        "useradd"
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec!["-m".to_string()];
        if !self.groups.is_empty() {
            args.push("-G".to_string());
            args.push(self.groups.join(","));
        }
        args.push("-s".to_string());
        args.push(self.shell.clone());
        args.push(self.username.clone());
        args
    }
}

/// Sets a password by feeding `user:password` to `chpasswd`.
///
/// The password travels on stdin only; the command is marked secret so the
/// log shows `<<< [redacted]`.
#[derive(Clone)]
pub struct ChpasswdArgs {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ChpasswdArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChpasswdArgs")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}

impl ToolArgs for ChpasswdArgs {
    fn program(&self) -> &str {
        "chpasswd"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![]
    }

    fn stdin_input(&self) -> Option<String> {
        Some(format!("{}:{}\n", self.username, self.password))
    }

    fn is_secret(&self) -> bool {
        true
    }
}

/// `gpasswd -a <user> <group>`
#[derive(Debug, Clone)]
pub struct GpasswdArgs {
    pub username: String,
    pub group: String,
}

impl ToolArgs for GpasswdArgs {
    fn program(&self) -> &str {
        "gpasswd"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["-a".to_string(), self.username.clone(), self.group.clone()]
    }
}

/// `git clone [--depth N] [--branch B] <url> <dest>`
#[derive(Debug, Clone)]
pub struct GitCloneArgs {
    pub url: String,
    pub dest: PathBuf,
    pub depth: Option<u32>,
    pub branch: Option<String>,
}

impl ToolArgs for GitCloneArgs {
    fn program(&self) -> &str {
        "git"
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec!["clone".to_string()];
        if let Some(depth) = self.depth {
            args.push("--depth".to_string());
            args.push(depth.to_string());
        }
        if let Some(ref branch) = self.branch {
            args.push("--branch".to_string());
            args.push(branch.clone());
        }
        args.push(self.url.clone());
        args.push(self.dest.display().to_string());
        args
    }
}

/// `chown [-R] <owner> <path>`
#[derive(Debug, Clone)]
pub struct ChownArgs {
    pub owner: String,
    pub path: PathBuf,
    pub recursive: bool,
}

impl ToolArgs for ChownArgs {
    fn program(&self) -> &str {
        "chown"
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.recursive {
            args.push("-R".to_string());
        }
        args.push(self.owner.clone());
        args.push(self.path.display().to_string());
        args
    }
}
