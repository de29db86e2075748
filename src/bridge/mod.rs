pub mod adb;

pub use adb::{parse_devices, AdbBridge};

use crate::error::Result;

/// Captured result of one bridge invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// The device bridge, treated as an opaque external command.
///
/// Implementations run one invocation to completion and report its exit code
/// and decoded output. A non-zero exit is not an error at this level; only a
/// failure to run the command at all is.
pub trait Bridge {
    fn run(&self, args: &[String]) -> Result<CommandOutput>;
}

/// Arguments for `shell su -c "<command>"`.
///
/// The command is wrapped in double quotes for the remote shell, so callers
/// must only pass commands built from validated identifiers and paths.
pub fn privileged_shell_args(command: &str) -> Vec<String> {
    vec!["shell".to_string(), format!("su -c \"{}\"", command)]
}

/// Arguments for `pull <remote> <local>`.
pub fn pull_args(remote: &str, local: &str) -> Vec<String> {
    vec!["pull".to_string(), remote.to_string(), local.to_string()]
}
