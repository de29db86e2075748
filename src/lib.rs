pub mod bridge;
pub mod cli;
pub mod config;
pub mod error;
pub mod extractor;
pub mod logging;
pub mod ui;

// Public API re-exports
pub use cli::{Cli, Command, OutputFormat};
pub use config::{CliOverrides, Config, DeviceConfig, OutputConfig, PathConfig};
pub use error::{ExtractError, Result, UserFriendlyError};

// Core functionality re-exports
pub use bridge::{AdbBridge, Bridge, CommandOutput};
pub use extractor::{ClearOutcome, ExtractionResult, Extractor, ExtractorConfig, PackageEntry, RunSummary};
pub use ui::{OutputFormatter, OutputMode};

use std::path::Path;

/// Build an extractor talking to the configured adb executable.
pub fn extractor_from_config(config: &Config, formatter: OutputFormatter) -> Extractor<AdbBridge> {
    Extractor::new(
        AdbBridge::new(config.device.bridge.clone()),
        config.extractor_config(),
        formatter,
    )
    .with_serial(config.device.serial.clone())
}

/// Generate sample configuration file
pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
    let sample_config = Config::create_sample_config();
    std::fs::write(output_path.as_ref(), sample_config)?;
    Ok(())
}
