use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("No device connected")]
    NoDevice,

    #[error("Failed to run bridge command {bridge}: {source}")]
    BridgeUnavailable {
        bridge: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command `{command}` exited with {}: {stderr}", exit_label(.code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Invalid manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid quick app identifier: {identifier:?}")]
    InvalidIdentifier { identifier: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for ExtractError {
    fn user_message(&self) -> String {
        match self {
            ExtractError::NoDevice => "No device detected".to_string(),
            ExtractError::BridgeUnavailable { bridge, .. } => {
                format!("Could not run the bridge executable: {}", bridge)
            }
            ExtractError::CommandFailed { command, stderr, .. } => {
                format!("Device command failed ({}): {}", command, stderr.trim())
            }
            ExtractError::InvalidIdentifier { identifier } => {
                format!("Not a valid quick app identifier: {}", identifier)
            }
            ExtractError::Config { message } => {
                format!("Configuration error: {}", message)
            }
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            ExtractError::NoDevice => Some(
                "Connect the device over USB, enable USB debugging and check `adb devices`.".to_string()
            ),
            ExtractError::BridgeUnavailable { .. } => Some(
                "Install the Android platform tools or point --bridge at the adb executable.".to_string()
            ),
            ExtractError::CommandFailed { .. } => Some(
                "The device must be rooted and `su` must be granted to the adb shell.".to_string()
            ),
            ExtractError::InvalidIdentifier { .. } => Some(
                "Use a name exactly as printed by the `list` command.".to_string()
            ),
            ExtractError::Config { .. } => Some(
                "Check your configuration file syntax, or regenerate one with --generate-config.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for ExtractError {
    fn from(error: toml::de::Error) -> Self {
        ExtractError::Config {
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}
