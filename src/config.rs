use crate::error::{ExtractError, Result};
use crate::extractor::ExtractorConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const DEFAULT_PACKAGE: &str = "com.miui.hybrid";
pub const DEFAULT_STAGING_DIR: &str = "/sdcard/quickapp_temp";
pub const DEFAULT_OUTPUT_DIR: &str = "extracted_quickapps";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,
    pub paths: PathConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Bridge executable, resolved through PATH when not absolute
    pub bridge: String,
    /// Target device; the first attached device is used when unset
    pub serial: Option<String>,
    /// Package whose app_resource directory holds the cached quick apps
    pub package: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathConfig {
    /// Overrides the remote root derived from `device.package`
    pub source_dir: Option<String>,
    pub staging_dir: String,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            paths: PathConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            bridge: "adb".to_string(),
            serial: None,
            package: DEFAULT_PACKAGE.to_string(),
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            source_dir: None,
            staging_dir: DEFAULT_STAGING_DIR.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "human".to_string(),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ExtractError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ExtractError::Config {
                message: format!("Failed to read config file {}: {}", path.display(), e),
            })?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ExtractError::Config {
                message: format!("Failed to parse config file {}: {}", path.display(), e),
            })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = [
                    "quickapp-extract.toml",
                    ".quickapp-extract.toml",
                ];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref bridge) = cli_args.bridge {
            self.device.bridge = bridge.clone();
        }

        if let Some(ref serial) = cli_args.serial {
            self.device.serial = Some(serial.clone());
        }

        if let Some(ref source_dir) = cli_args.source_dir {
            self.paths.source_dir = Some(source_dir.clone());
        }

        if let Some(ref output_dir) = cli_args.output_dir {
            self.paths.output_dir = output_dir.clone();
        }

        if let Some(ref format) = cli_args.format {
            self.output.format = format.clone();
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| ExtractError::Config {
                message: format!("Failed to serialize config: {}", e),
            })?;

        std::fs::write(path, content)
            .map_err(|e| ExtractError::Config {
                message: format!("Failed to write config file {}: {}", path.display(), e),
            })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.device.bridge.trim().is_empty() {
            return Err(ExtractError::Config {
                message: "Bridge executable must not be empty".to_string(),
            });
        }

        if let Some(ref serial) = self.device.serial {
            if serial.trim().is_empty() || serial.chars().any(char::is_whitespace) {
                return Err(ExtractError::Config {
                    message: format!("Invalid device serial: {:?}", serial),
                });
            }
        }

        if !is_safe_component(&self.device.package) {
            return Err(ExtractError::Config {
                message: format!("Invalid package name: {:?}", self.device.package),
            });
        }

        // Remote paths end up inside `su -c "..."`
        let source_dir = self.source_dir();
        if !is_safe_remote_path(&source_dir) {
            return Err(ExtractError::Config {
                message: format!("Remote source directory must be an absolute plain path: {}", source_dir),
            });
        }

        if !is_safe_remote_path(&self.paths.staging_dir) {
            return Err(ExtractError::Config {
                message: format!(
                    "Remote staging directory must be an absolute plain path: {}",
                    self.paths.staging_dir
                ),
            });
        }

        if self.paths.output_dir.as_os_str().is_empty() {
            return Err(ExtractError::Config {
                message: "Output directory must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Remote directory holding one subdirectory per cached quick app.
    pub fn source_dir(&self) -> String {
        match self.paths.source_dir {
            Some(ref dir) => dir.trim_end_matches('/').to_string(),
            None => format!("/data/data/{}/app_resource", self.device.package),
        }
    }

    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            source_dir: self.source_dir(),
            staging_dir: self.paths.staging_dir.trim_end_matches('/').to_string(),
            output_dir: self.paths.output_dir.clone(),
        }
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

fn remote_path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^/[A-Za-z0-9._/-]*$").expect("valid remote path regex"))
}

fn is_safe_remote_path(path: &str) -> bool {
    remote_path_pattern().is_match(path) && !path.split('/').any(|segment| segment == "..")
}

fn is_safe_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub bridge: Option<String>,
    pub serial: Option<String>,
    pub source_dir: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub format: Option<String>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bridge(mut self, bridge: Option<String>) -> Self {
        self.bridge = bridge;
        self
    }

    pub fn with_serial(mut self, serial: Option<String>) -> Self {
        self.serial = serial;
        self
    }

    pub fn with_source_dir(mut self, source_dir: Option<String>) -> Self {
        self.source_dir = source_dir;
        self
    }

    pub fn with_output_dir(mut self, output_dir: Option<PathBuf>) -> Self {
        self.output_dir = output_dir;
        self
    }

    pub fn with_format(mut self, format: Option<String>) -> Self {
        self.format = format;
        self
    }
}
