use super::{Bridge, CommandOutput};
use crate::error::{ExtractError, Result};
use std::process::{Command, Stdio};
use tracing::debug;

const DEVICES_HEADER: &str = "List of devices attached";

/// Runs the `adb` executable as a blocking subprocess.
#[derive(Debug, Clone)]
pub struct AdbBridge {
    program: String,
}

impl AdbBridge {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for AdbBridge {
    fn default() -> Self {
        Self::new("adb")
    }
}

impl Bridge for AdbBridge {
    fn run(&self, args: &[String]) -> Result<CommandOutput> {
        debug!(program = %self.program, args = ?args, "running bridge command");

        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ExtractError::BridgeUnavailable {
                bridge: self.program.clone(),
                source,
            })?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!(code = ?result.code, "bridge command finished");
        Ok(result)
    }
}

/// Device serials from `adb devices` output.
///
/// Everything up to and including the header line is skipped, as are blank
/// lines; the first whitespace-delimited token of each remaining line is the
/// serial. Without a header the first line is treated as one.
pub fn parse_devices(stdout: &str) -> Vec<String> {
    let lines: Vec<&str> = stdout.lines().collect();
    let start = lines
        .iter()
        .position(|line| line.trim_start().starts_with(DEVICES_HEADER))
        .map(|index| index + 1)
        .unwrap_or(1);

    lines
        .iter()
        .skip(start)
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}
