use crate::config::{CliOverrides, Config};
use crate::error::Result;
use crate::ui::OutputMode;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "quickapp-extract")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Pull cached quick-app resources off a rooted Android device")]
#[command(
    long_about = "quickapp-extract copies the quick-app resource bundles cached by the hybrid \
                  app runtime off a rooted device over adb, and names each copy after the app's \
                  manifest."
)]
#[command(after_help = "EXAMPLES:\n  \
    quickapp-extract extract\n  \
    quickapp-extract extract com.example.weather\n  \
    quickapp-extract list --output-format json\n  \
    quickapp-extract clear --serial R58M123ABC")]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Configuration file path
    #[arg(short, long, global = true, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// adb executable
    #[arg(long, global = true, env = "QUICKAPP_ADB")]
    pub bridge: Option<String>,

    /// Device serial (defaults to the first attached device)
    #[arg(short, long, global = true, env = "ANDROID_SERIAL")]
    pub serial: Option<String>,

    /// Remote directory holding the cached quick apps
    #[arg(long, global = true)]
    pub source_dir: Option<String>,

    /// Local directory receiving the extracted quick apps
    #[arg(short, long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Output format for results
    #[arg(long, value_enum, global = true)]
    pub output_format: Option<OutputFormat>,

    /// Verbose output level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    pub quiet: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Generate a sample configuration file")]
    pub generate_config: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Extract one quick app, or every cached quick app when none is given
    Extract {
        /// Quick app identifier as printed by `list`
        identifier: Option<String>,
    },
    /// List cached quick apps with their display names
    List,
    /// Delete all cached quick apps from the device after confirmation
    Clear,
    /// Print this help
    Help,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Human => "human",
            OutputFormat::Json => "json",
            OutputFormat::Plain => "plain",
        }
    }
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        CliOverrides::new()
            .with_bridge(self.bridge.clone())
            .with_serial(self.serial.clone())
            .with_source_dir(self.source_dir.clone())
            .with_output_dir(self.output_dir.clone())
            .with_format(self.output_format.map(|f| f.as_str().to_string()))
    }

    pub fn output_mode(&self, config: &Config) -> OutputMode {
        OutputMode::from_string(&config.output.format)
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}

pub fn usage() -> String {
    Cli::command().render_help().to_string()
}
