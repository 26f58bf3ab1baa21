//! Type-safe tool argument contracts.
//!
//! Each external program the installer drives (`fdisk`, `mkfs.*`, `emerge`,
//! `eselect`, ...) gets a struct implementing `ToolArgs`. The struct is the
//! contract: field names map to exact flags, so a typo in a flag is a
//! compile error instead of a failed install half way through.
//!
//! # Contract
//!
//! - `program()`: the executable name, resolved through `PATH`.
//! - `to_cli_args()`: arguments exactly as the program expects them.
//! - `get_env_vars()`: environment the program needs (e.g. `LC_ALL=C` for
//!   output that gets parsed).
//! - `stdin_input()`: text fed to the program's standard input (fdisk
//!   dialogs, `chpasswd` lines).
//! - `is_secret()`: stdin carries credentials and must not be logged.
//!
//! # Example
//!
//! ```
//! use gentoo_install::tool_args::ToolArgs;
//! use gentoo_install::tools::disk::MkswapArgs;
//!
//! let args = MkswapArgs { device: "/dev/sda2".into() };
//! assert_eq!(args.program(), "mkswap");
//! assert_eq!(args.to_cli_args(), vec!["/dev/sda2"]);
//! ```

use crate::executor::Cmd;

pub trait ToolArgs {
    /// Executable name (e.g. `"mkfs.ext4"`).
    fn program(&self) -> &str;

    /// Convert struct fields to CLI arguments.
    fn to_cli_args(&self) -> Vec<String>;

    /// Environment variables required by the program.
    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![]
    }

    /// Text written to the program's stdin, if any.
    fn stdin_input(&self) -> Option<String> {
        None
    }

    /// Whether stdin carries credentials.
    fn is_secret(&self) -> bool {
        false
    }

    /// Build the executable command for these arguments.
    fn to_cmd(&self) -> Cmd {
        let mut cmd = Cmd::new(self.program()).args(self.to_cli_args());
        for (key, value) in self.get_env_vars() {
            cmd = cmd.env(key, value);
        }
        if let Some(input) = self.stdin_input() {
            cmd = cmd.stdin(input);
        }
        if self.is_secret() {
            cmd = cmd.secret();
        }
        cmd
    }
}
