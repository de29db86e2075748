use crate::bridge::{parse_devices, privileged_shell_args, pull_args, Bridge, CommandOutput};
use crate::config::{DEFAULT_OUTPUT_DIR, DEFAULT_PACKAGE, DEFAULT_STAGING_DIR};
use crate::error::{ExtractError, Result};
use crate::extractor::manifest::{parse_manifest_name, sanitize_display_name};
use crate::extractor::report::{ExtractionResult, PackageEntry, RunSummary};
use crate::ui::OutputFormatter;
use regex::Regex;
use std::cell::RefCell;
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{debug, error, info, warn};

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Locations the extractor works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorConfig {
    /// Remote directory with one subdirectory per cached quick app
    pub source_dir: String,
    /// Remote parent directory used for the world-readable copy
    pub staging_dir: String,
    /// Local root that receives `<name>_<timestamp>` directories
    pub output_dir: PathBuf,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            source_dir: format!("/data/data/{}/app_resource", DEFAULT_PACKAGE),
            staging_dir: DEFAULT_STAGING_DIR.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

/// How a `clear` run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    NoDevice,
    NothingToClear,
    Cancelled,
    Cleared { succeeded: usize, total: usize },
}

/// Pulls cached quick apps off the device through a [`Bridge`].
///
/// Every operation is sequential and blocking. Failures of individual device
/// commands are logged and reported as `false`, empty lists or fallbacks;
/// nothing here returns an error to the caller.
pub struct Extractor<B> {
    bridge: B,
    config: ExtractorConfig,
    formatter: OutputFormatter,
    pinned_serial: Option<String>,
    selected_serial: RefCell<Option<String>>,
}

impl<B: Bridge> Extractor<B> {
    pub fn new(bridge: B, config: ExtractorConfig, formatter: OutputFormatter) -> Self {
        Self {
            bridge,
            config,
            formatter,
            pinned_serial: None,
            selected_serial: RefCell::new(None),
        }
    }

    /// Targets every command at `serial` instead of the first attached device.
    pub fn with_serial(mut self, serial: Option<String>) -> Self {
        self.selected_serial = RefCell::new(serial.clone());
        self.pinned_serial = serial;
        self
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    pub fn selected_device(&self) -> Option<String> {
        self.selected_serial.borrow().clone()
    }

    /// True when at least one device is attached.
    pub fn check_device(&self) -> bool {
        let output = match self.bridge.run(&["devices".to_string()]) {
            Ok(output) => output,
            Err(e) => {
                error!("Failed to query devices: {}", e);
                return false;
            }
        };

        if !output.success() {
            error!("Failed to query devices: {}", output.stderr.trim());
            return false;
        }

        let devices = parse_devices(&output.stdout);
        let Some(first) = devices.first() else {
            error!("No device detected");
            return false;
        };

        if let Some(ref pinned) = self.pinned_serial {
            if !devices.contains(pinned) {
                error!("Device {} is not attached (found: {})", pinned, devices.join(", "));
                return false;
            }
            info!("Using device: {}", pinned);
            return true;
        }

        if devices.len() > 1 {
            warn!("{} devices detected, using the first one", devices.len());
        }

        info!("Connected device: {}", first);
        *self.selected_serial.borrow_mut() = Some(first.clone());
        true
    }

    /// Identifiers of the cached quick apps, one per remote subdirectory.
    pub fn list_remote_apps(&self) -> Vec<String> {
        let output = match self.shell(&format!("ls {}", self.config.source_dir)) {
            Ok(output) => output,
            Err(e) => {
                error!("Failed to list quick app directory: {}", e);
                return Vec::new();
            }
        };

        if !output.success() {
            error!("Failed to list quick app directory: {}", output.stderr.trim());
            return Vec::new();
        }

        let apps: Vec<String> = output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        info!("Found {} quick app resource directories", apps.len());
        apps
    }

    /// Human-readable name from the app's manifest, or `identifier` itself.
    pub fn read_manifest_name(&self, identifier: &str) -> String {
        if validate_identifier(identifier).is_err() {
            return identifier.to_string();
        }

        let command = format!("cat {}/{}/manifest.json", self.config.source_dir, identifier);
        let output = match self.shell(&command) {
            Ok(output) if output.success() => output,
            Ok(_) => return identifier.to_string(),
            Err(e) => {
                warn!("Failed to read manifest.json for {}: {}, using package name", identifier, e);
                return identifier.to_string();
            }
        };

        match parse_manifest_name(&output.stdout) {
            Ok(Some(name)) => name,
            Ok(None) => identifier.to_string(),
            Err(e) => {
                warn!("Failed to parse manifest.json for {}: {}, using package name", identifier, e);
                identifier.to_string()
            }
        }
    }

    pub fn extract_one(&self, identifier: &str) -> bool {
        let result = self.extract_one_detailed(identifier);
        if result.success {
            self.formatter.success(&format!(
                "Extracted {} to {}",
                result.display_name,
                result.output_path.display()
            ));
        } else {
            self.formatter.error(&format!("Failed to extract {}", identifier));
        }
        result.success
    }

    /// Copies one quick app to `<output_dir>/<display name>_<timestamp>`.
    pub fn extract_one_detailed(&self, identifier: &str) -> ExtractionResult {
        if let Err(e) = validate_identifier(identifier) {
            error!("Failed to extract quick app {}: {}", identifier, e);
            return ExtractionResult::failed(identifier, self.config.output_dir.clone(), e.to_string());
        }

        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        let local_dir = self.config.output_dir.join(format!("{}_{}", identifier, timestamp));

        match self.try_extract(identifier, &timestamp, &local_dir) {
            Ok(result) => result,
            Err(e) => {
                error!("Failed to extract quick app {}: {}", identifier, e);
                // Only removes the directory if the pull never wrote into it
                let _ = fs::remove_dir(&local_dir);
                ExtractionResult::failed(identifier, local_dir, e.to_string())
            }
        }
    }

    fn try_extract(&self, identifier: &str, timestamp: &str, local_dir: &Path) -> Result<ExtractionResult> {
        self.ensure_output_dir()?;
        fs::create_dir_all(local_dir)?;

        let source_path = format!("{}/{}", self.config.source_dir, identifier);
        let staging_path = format!("{}/{}", self.config.staging_dir, identifier);

        self.advise(&format!("mkdir -p {}", self.config.staging_dir));

        self.shell_checked(&format!("cp -r {} {}", source_path, staging_path))?;

        if let Err(e) = self.shell_checked(&format!("chmod -R 777 {}", staging_path)) {
            self.advise(&format!("rm -rf {}", staging_path));
            return Err(e);
        }

        let local = local_dir.to_string_lossy();
        let pull = self.run(pull_args(&staging_path, &local));

        // Staging copy is removed whatever the pull did
        self.advise(&format!("rm -rf {}", staging_path));

        let pull = pull?;
        if !pull.success() {
            return Err(ExtractError::CommandFailed {
                command: format!("pull {} {}", staging_path, local),
                code: pull.code,
                stderr: pull.stderr.trim().to_string(),
            });
        }

        let raw_name = self.read_manifest_name(identifier);
        let display_name = sanitize_display_name(&raw_name, identifier);
        let target_dir = self.config.output_dir.join(format!("{}_{}", display_name, timestamp));

        let output_path = if target_dir == local_dir {
            local_dir.to_path_buf()
        } else if target_dir.exists() {
            warn!(
                "{} already exists, keeping {} for {}",
                target_dir.display(),
                local_dir.display(),
                identifier
            );
            local_dir.to_path_buf()
        } else {
            fs::rename(local_dir, &target_dir)?;
            target_dir
        };

        info!(
            "Extracted quick app: {} ({}) -> {}",
            display_name,
            identifier,
            output_path.display()
        );

        Ok(ExtractionResult::succeeded(identifier, display_name, output_path))
    }

    /// Extracts every cached quick app, one after another.
    ///
    /// Returns `None` without touching the device further when no device is
    /// attached or nothing is cached.
    pub fn extract_all(&self) -> Option<RunSummary> {
        if !self.check_device() {
            return None;
        }

        let apps = self.list_remote_apps();
        if apps.is_empty() {
            return None;
        }

        if let Err(e) = self.ensure_output_dir() {
            error!("Failed to create output directory {}: {}", self.config.output_dir.display(), e);
            return None;
        }

        let start = Instant::now();
        let results: Vec<ExtractionResult> = apps
            .iter()
            .map(|app| self.extract_one_detailed(app))
            .collect();

        let summary = RunSummary::from_results(results, start.elapsed());
        info!("Extraction finished: succeeded {}/{}", summary.succeeded, summary.total);
        self.formatter.print_run_summary(&summary);

        Some(summary)
    }

    /// Prints and returns every cached quick app with its display name.
    pub fn list_packages(&self) -> Vec<PackageEntry> {
        let entries: Vec<PackageEntry> = self
            .list_remote_apps()
            .into_iter()
            .map(|identifier| PackageEntry {
                display_name: self.read_manifest_name(&identifier),
                identifier,
            })
            .collect();

        self.formatter.print_catalogue(&entries);
        entries
    }

    /// Deletes every cached quick app after a `y` read from `input`.
    pub fn clear_cache<R: BufRead>(&self, input: &mut R) -> ClearOutcome {
        if !self.check_device() {
            return ClearOutcome::NoDevice;
        }

        let apps = self.list_remote_apps();
        if apps.is_empty() {
            self.formatter.info("No quick app caches to clear");
            return ClearOutcome::NothingToClear;
        }

        self.formatter.print_pending_deletions(&apps);
        self.formatter.prompt("Delete these quick app caches?");

        let mut answer = String::new();
        if let Err(e) = input.read_line(&mut answer) {
            debug!("Failed to read confirmation: {}", e);
            answer.clear();
        }

        if !is_confirmation(&answer) {
            info!("Clear cancelled");
            self.formatter.info("Cancelled, nothing was deleted");
            return ClearOutcome::Cancelled;
        }

        let mut succeeded = 0;
        for app in &apps {
            match self.remove_remote_app(app) {
                Ok(()) => {
                    succeeded += 1;
                    info!("Cleared quick app cache: {}", app);
                }
                Err(e) => error!("Failed to clear quick app cache {}: {}", app, e),
            }
        }

        info!("Clear finished: succeeded {}/{}", succeeded, apps.len());
        if succeeded == apps.len() {
            self.formatter.success(&format!("Cleared {} quick app caches", succeeded));
        } else {
            self.formatter.warning(&format!(
                "Cleared {}/{} quick app caches, see the log for failures",
                succeeded,
                apps.len()
            ));
        }
        ClearOutcome::Cleared {
            succeeded,
            total: apps.len(),
        }
    }

    fn remove_remote_app(&self, identifier: &str) -> Result<()> {
        validate_identifier(identifier)?;
        self.shell_checked(&format!("rm -rf {}/{}", self.config.source_dir, identifier))?;
        Ok(())
    }

    fn ensure_output_dir(&self) -> Result<()> {
        let output_dir = &self.config.output_dir;
        if !output_dir.exists() {
            fs::create_dir_all(output_dir)?;
            info!("Created output directory: {}", output_dir.display());
        }
        Ok(())
    }

    fn run(&self, args: Vec<String>) -> Result<CommandOutput> {
        let args = match self.selected_serial.borrow().as_ref() {
            Some(serial) => {
                let mut targeted = vec!["-s".to_string(), serial.clone()];
                targeted.extend(args);
                targeted
            }
            None => args,
        };
        self.bridge.run(&args)
    }

    fn shell(&self, command: &str) -> Result<CommandOutput> {
        self.run(privileged_shell_args(command))
    }

    fn shell_checked(&self, command: &str) -> Result<CommandOutput> {
        let output = self.shell(command)?;
        if output.success() {
            Ok(output)
        } else {
            Err(ExtractError::CommandFailed {
                command: command.to_string(),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }

    /// Runs a privileged command for its side effect only.
    ///
    /// Advisory commands (staging mkdir, staging cleanup) never affect the
    /// outcome of an extraction; failures are logged at debug level.
    fn advise(&self, command: &str) {
        match self.shell(command) {
            Ok(output) if output.success() => {}
            Ok(output) => debug!("Advisory command `{}` failed: {}", command, output.stderr.trim()),
            Err(e) => debug!("Advisory command `{}` failed: {}", command, e),
        }
    }
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("valid identifier regex"))
}

/// Identifiers are interpolated into root shell commands, so only plain
/// directory names are accepted.
pub fn validate_identifier(identifier: &str) -> Result<()> {
    if identifier == "." || identifier == ".." || !identifier_pattern().is_match(identifier) {
        return Err(ExtractError::InvalidIdentifier {
            identifier: identifier.to_string(),
        });
    }
    Ok(())
}

fn is_confirmation(answer: &str) -> bool {
    answer.trim_end_matches(['\r', '\n']).eq_ignore_ascii_case("y")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::testing::{fail, ok, ScriptedBridge, UnavailableBridge};
    use crate::ui::OutputMode;
    use std::io::Cursor;
    use tempfile::TempDir;

    const DEVICES: &str = "List of devices attached\nR58M123ABC\tdevice\n";

    fn extractor(bridge: ScriptedBridge, output_dir: &Path) -> Extractor<ScriptedBridge> {
        let config = ExtractorConfig {
            output_dir: output_dir.to_path_buf(),
            ..ExtractorConfig::default()
        };
        Extractor::new(bridge, config, OutputFormatter::new(OutputMode::Plain, 0, true))
    }

    /// A healthy rooted device holding `apps`, with manifests from `names`.
    fn device(apps: &'static [&'static str], names: &'static [(&'static str, &'static str)]) -> ScriptedBridge {
        ScriptedBridge::new(move |args| {
            let line = args.join(" ");
            if line.ends_with("devices") {
                ok(DEVICES)
            } else if line.contains("su -c \"ls ") {
                ok(&apps.iter().map(|a| format!("{}\n", a)).collect::<String>())
            } else if line.contains("su -c \"cat ") {
                names
                    .iter()
                    .find(|(id, _)| line.contains(&format!("/{}/manifest.json", id)))
                    .map(|(_, manifest)| ok(manifest))
                    .unwrap_or_else(|| fail("No such file or directory"))
            } else if args.iter().any(|a| a == "pull") {
                let local = PathBuf::from(args.last().unwrap());
                fs::create_dir_all(local.join("res")).unwrap();
                fs::write(local.join("res").join("app.js"), "x").unwrap();
                ok("1 file pulled")
            } else {
                ok("")
            }
        })
    }

    fn entries_with_prefix(dir: &Path, prefix: &str) -> Vec<String> {
        fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .filter(|name| name.starts_with(prefix))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn test_check_device_none() {
        let bridge = ScriptedBridge::new(|_| ok("List of devices attached\n\n"));
        let temp_dir = TempDir::new().unwrap();
        let extractor = extractor(bridge, temp_dir.path());

        assert!(!extractor.check_device());
        assert!(extractor.selected_device().is_none());
    }

    #[test]
    fn test_check_device_uses_first_of_many() {
        let bridge = ScriptedBridge::new(|args| {
            if args.iter().any(|a| a == "devices") {
                ok("List of devices attached\nemulator-5554\tdevice\nR58M123ABC\tdevice\n")
            } else {
                ok("")
            }
        });
        let temp_dir = TempDir::new().unwrap();
        let extractor = extractor(bridge, temp_dir.path());

        assert!(extractor.check_device());
        assert_eq!(extractor.selected_device().as_deref(), Some("emulator-5554"));

        extractor.list_remote_apps();
        let calls = extractor.bridge().calls();
        assert_eq!(&calls[1][..2], &["-s".to_string(), "emulator-5554".to_string()]);
    }

    #[test]
    fn test_check_device_pinned_serial_must_be_attached() {
        let bridge = ScriptedBridge::new(|_| ok(DEVICES));
        let temp_dir = TempDir::new().unwrap();
        let extractor = extractor(bridge, temp_dir.path()).with_serial(Some("other".to_string()));

        assert!(!extractor.check_device());
    }

    #[test]
    fn test_check_device_killed_by_signal() {
        let bridge = ScriptedBridge::new(|_| CommandOutput {
            code: None,
            stdout: String::new(),
            stderr: "killed".to_string(),
        });
        let temp_dir = TempDir::new().unwrap();

        assert!(!extractor(bridge, temp_dir.path()).check_device());
    }

    #[test]
    fn test_bridge_cannot_start() {
        let temp_dir = TempDir::new().unwrap();
        let config = ExtractorConfig {
            output_dir: temp_dir.path().join("out"),
            ..ExtractorConfig::default()
        };
        let extractor = Extractor::new(
            UnavailableBridge,
            config,
            OutputFormatter::new(OutputMode::Plain, 0, true),
        );

        assert!(!extractor.check_device());
        assert!(extractor.selected_device().is_none());
        assert!(extractor.list_remote_apps().is_empty());
        assert_eq!(extractor.read_manifest_name("com.a.app"), "com.a.app");
        assert!(extractor.extract_all().is_none());
        assert!(!temp_dir.path().join("out").exists());
    }

    #[test]
    fn test_list_remote_apps_trims_lines() {
        let bridge = ScriptedBridge::new(|_| ok("com.a.app\r\n\n  com.b.app  \n\n"));
        let temp_dir = TempDir::new().unwrap();
        let apps = extractor(bridge, temp_dir.path()).list_remote_apps();

        assert_eq!(apps, vec!["com.a.app", "com.b.app"]);
        assert!(apps.iter().all(|a| !a.is_empty() && a.trim() == a));
    }

    #[test]
    fn test_list_remote_apps_failure_is_empty() {
        let bridge = ScriptedBridge::new(|_| fail("su: not found"));
        let temp_dir = TempDir::new().unwrap();

        assert!(extractor(bridge, temp_dir.path()).list_remote_apps().is_empty());
    }

    #[test]
    fn test_read_manifest_name_fallbacks() {
        let temp_dir = TempDir::new().unwrap();

        let extractor_ok = extractor(device(&[], &[("com.a.app", r#"{"name": "Weather"}"#)]), temp_dir.path());
        assert_eq!(extractor_ok.read_manifest_name("com.a.app"), "Weather");
        // non-zero exit
        assert_eq!(extractor_ok.read_manifest_name("com.b.app"), "com.b.app");

        let not_json = extractor(device(&[], &[("com.a.app", "<html>")]), temp_dir.path());
        assert_eq!(not_json.read_manifest_name("com.a.app"), "com.a.app");

        let no_name = extractor(device(&[], &[("com.a.app", r#"{"versionName": "1.0"}"#)]), temp_dir.path());
        assert_eq!(no_name.read_manifest_name("com.a.app"), "com.a.app");
    }

    #[test]
    fn test_extract_one_renames_to_display_name() {
        let temp_dir = TempDir::new().unwrap();
        let output_dir = temp_dir.path().join("extracted_quickapps");
        let extractor = extractor(device(&["com.a.app"], &[("com.a.app", r#"{"name": "Weather"}"#)]), &output_dir);

        let result = extractor.extract_one_detailed("com.a.app");

        assert!(result.success);
        assert_eq!(result.display_name, "Weather");
        assert_eq!(result.files, 1);
        assert_eq!(entries_with_prefix(&output_dir, "Weather_").len(), 1);
        assert!(entries_with_prefix(&output_dir, "com.a.app_").is_empty());

        let name = result.output_path.file_name().unwrap().to_string_lossy().to_string();
        let timestamp = name.trim_start_matches("Weather_");
        assert_eq!(timestamp.len(), 15);
        assert!(chrono::NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).is_ok());
    }

    #[test]
    fn test_extract_one_keeps_identifier_without_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let extractor = extractor(device(&["com.a.app"], &[]), temp_dir.path());

        assert!(extractor.extract_one("com.a.app"));
        assert_eq!(entries_with_prefix(temp_dir.path(), "com.a.app_").len(), 1);
    }

    #[test]
    fn test_extract_one_copy_failure() {
        let bridge = ScriptedBridge::new(|args| {
            if args.join(" ").contains("cp -r") {
                fail("cp: Permission denied")
            } else {
                ok("")
            }
        });
        let temp_dir = TempDir::new().unwrap();
        let extractor = extractor(bridge, temp_dir.path());

        let result = extractor.extract_one_detailed("com.a.app");

        assert!(!result.success);
        assert!(result.error.unwrap().contains("Permission denied"));
        assert_eq!(extractor.bridge().count_matching("pull"), 0);
        assert!(entries_with_prefix(temp_dir.path(), "").is_empty());
    }

    #[test]
    fn test_extract_one_chmod_failure() {
        let bridge = ScriptedBridge::new(|args| {
            if args.join(" ").contains("chmod -R 777") {
                fail("chmod: Operation not permitted")
            } else {
                ok("")
            }
        });
        let temp_dir = TempDir::new().unwrap();
        let extractor = extractor(bridge, temp_dir.path());

        assert!(!extractor.extract_one("com.a.app"));
        assert_eq!(extractor.bridge().count_matching("pull"), 0);
    }

    #[test]
    fn test_extract_one_pull_failure_still_cleans_up() {
        let bridge = ScriptedBridge::new(|args| {
            if args.iter().any(|a| a == "pull") {
                fail("adb: error: failed to stat remote object")
            } else {
                ok("")
            }
        });
        let temp_dir = TempDir::new().unwrap();
        let extractor = extractor(bridge, temp_dir.path());

        assert!(!extractor.extract_one("com.a.app"));
        assert_eq!(
            extractor.bridge().count_matching("rm -rf /sdcard/quickapp_temp/com.a.app"),
            1
        );
        // no manifest lookup or rename after a failed pull
        assert_eq!(extractor.bridge().count_matching("manifest.json"), 0);
    }

    #[test]
    fn test_extract_one_command_order() {
        let temp_dir = TempDir::new().unwrap();
        let extractor = extractor(device(&["com.a.app"], &[]), temp_dir.path());
        assert!(extractor.extract_one("com.a.app"));

        let calls: Vec<String> = extractor.bridge().calls().iter().map(|c| c.join(" ")).collect();
        assert_eq!(calls[0], "shell su -c \"mkdir -p /sdcard/quickapp_temp\"");
        assert_eq!(
            calls[1],
            "shell su -c \"cp -r /data/data/com.miui.hybrid/app_resource/com.a.app /sdcard/quickapp_temp/com.a.app\""
        );
        assert_eq!(calls[2], "shell su -c \"chmod -R 777 /sdcard/quickapp_temp/com.a.app\"");
        assert!(calls[3].starts_with("pull /sdcard/quickapp_temp/com.a.app "));
        assert_eq!(calls[4], "shell su -c \"rm -rf /sdcard/quickapp_temp/com.a.app\"");
        assert!(calls[5].contains("cat /data/data/com.miui.hybrid/app_resource/com.a.app/manifest.json"));
    }

    #[test]
    fn test_extract_one_rejects_unsafe_identifier() {
        let bridge = ScriptedBridge::new(|_| ok(""));
        let temp_dir = TempDir::new().unwrap();
        let extractor = extractor(bridge, temp_dir.path());

        assert!(!extractor.extract_one("com.a.app; reboot"));
        assert!(!extractor.extract_one(".."));
        assert!(extractor.bridge().calls().is_empty());
    }

    #[test]
    fn test_extract_all_counts_successes() {
        let temp_dir = TempDir::new().unwrap();
        let extractor = extractor(device(&["com.a.app", "com.b.app"], &[]), temp_dir.path());

        let summary = extractor.extract_all().unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(extractor.bridge().count_matching("pull"), 2);
    }

    #[test]
    fn test_extract_all_partial_failure() {
        let bridge = ScriptedBridge::new(|args| {
            let line = args.join(" ");
            if line.ends_with("devices") {
                ok(DEVICES)
            } else if line.contains("su -c \"ls ") {
                ok("com.a.app\ncom.b.app\n")
            } else if line.contains("cp -r") && line.contains("com.b.app") {
                fail("No such file or directory")
            } else {
                ok("")
            }
        });
        let temp_dir = TempDir::new().unwrap();
        let extractor = extractor(bridge, temp_dir.path());

        let summary = extractor.extract_all().unwrap();
        let successes = summary.results.iter().filter(|r| r.success).count();

        assert_eq!(summary.succeeded, successes);
        assert_eq!(summary.succeeded, 1);
        assert!(summary.succeeded <= summary.total);
    }

    #[test]
    fn test_extract_all_without_device_does_nothing() {
        let bridge = ScriptedBridge::new(|_| ok("List of devices attached\n"));
        let temp_dir = TempDir::new().unwrap();
        let extractor = extractor(bridge, temp_dir.path());

        assert!(extractor.extract_all().is_none());
        assert_eq!(extractor.bridge().calls().len(), 1);
    }

    #[test]
    fn test_extract_all_without_apps() {
        let temp_dir = TempDir::new().unwrap();
        let extractor = extractor(device(&[], &[]), temp_dir.path());

        assert!(extractor.extract_all().is_none());
        assert_eq!(extractor.bridge().count_matching("cp -r"), 0);
    }

    #[test]
    fn test_list_packages_resolves_names() {
        let temp_dir = TempDir::new().unwrap();
        let extractor = extractor(
            device(&["com.a.app", "com.b.app"], &[("com.a.app", r#"{"name": "Weather"}"#)]),
            temp_dir.path(),
        );

        let entries = extractor.list_packages();
        assert_eq!(
            entries,
            vec![
                PackageEntry {
                    identifier: "com.a.app".to_string(),
                    display_name: "Weather".to_string(),
                },
                PackageEntry {
                    identifier: "com.b.app".to_string(),
                    display_name: "com.b.app".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_clear_cache_requires_confirmation() {
        let temp_dir = TempDir::new().unwrap();

        for answer in ["n\n", "\n", "yes\n", " y\n", ""] {
            let extractor = extractor(device(&["com.a.app"], &[]), temp_dir.path());
            let outcome = extractor.clear_cache(&mut Cursor::new(answer));

            assert_eq!(outcome, ClearOutcome::Cancelled, "answer {:?}", answer);
            assert_eq!(extractor.bridge().count_matching("rm -rf"), 0);
        }
    }

    #[test]
    fn test_clear_cache_confirmed() {
        let temp_dir = TempDir::new().unwrap();

        for answer in ["y\n", "Y\r\n", "y"] {
            let extractor = extractor(device(&["com.a.app", "com.b.app"], &[]), temp_dir.path());
            let outcome = extractor.clear_cache(&mut Cursor::new(answer));

            assert_eq!(outcome, ClearOutcome::Cleared { succeeded: 2, total: 2 });
            assert_eq!(
                extractor
                    .bridge()
                    .count_matching("rm -rf /data/data/com.miui.hybrid/app_resource/com.a.app"),
                1
            );
        }
    }

    #[test]
    fn test_clear_cache_counts_partial_failures() {
        let bridge = ScriptedBridge::new(|args| {
            let line = args.join(" ");
            if line.ends_with("devices") {
                ok(DEVICES)
            } else if line.contains("su -c \"ls ") {
                ok("com.a.app\ncom.b.app\n")
            } else if line.contains("rm -rf /data/data/com.miui.hybrid/app_resource/com.b.app") {
                fail("rm: Read-only file system")
            } else {
                ok("")
            }
        });
        let temp_dir = TempDir::new().unwrap();
        let extractor = extractor(bridge, temp_dir.path());

        let outcome = extractor.clear_cache(&mut Cursor::new("Y\n"));

        assert_eq!(outcome, ClearOutcome::Cleared { succeeded: 1, total: 2 });
        assert_eq!(extractor.bridge().count_matching("rm -rf"), 2);
    }

    #[test]
    fn test_clear_cache_without_device() {
        let bridge = ScriptedBridge::new(|_| ok("List of devices attached\n"));
        let temp_dir = TempDir::new().unwrap();
        let extractor = extractor(bridge, temp_dir.path());

        assert_eq!(extractor.clear_cache(&mut Cursor::new("y\n")), ClearOutcome::NoDevice);
        assert_eq!(extractor.bridge().calls().len(), 1);
    }

    #[test]
    fn test_clear_cache_nothing_to_clear() {
        let temp_dir = TempDir::new().unwrap();
        let extractor = extractor(device(&[], &[]), temp_dir.path());

        assert_eq!(extractor.clear_cache(&mut Cursor::new("y\n")), ClearOutcome::NothingToClear);
    }

    #[test]
    fn test_absolute_identifier_never_touches_outside_output() {
        let temp_dir = TempDir::new().unwrap();
        let output_dir = temp_dir.path().join("out");
        let outside = temp_dir.path().join("victim");

        // Empty directories shaped like the local dir the identifier would map to
        let now = chrono::Local::now();
        let mut decoys = Vec::new();
        for offset in 0..3 {
            let stamp = (now + chrono::Duration::seconds(offset)).format(TIMESTAMP_FORMAT);
            let decoy = PathBuf::from(format!("{}_{}", outside.display(), stamp));
            fs::create_dir_all(&decoy).unwrap();
            decoys.push(decoy);
        }

        let extractor = extractor(device(&[], &[]), &output_dir);
        let identifier = outside.to_string_lossy().to_string();
        let result = extractor.extract_one_detailed(&identifier);

        assert!(!result.success);
        assert!(result.output_path.starts_with(&output_dir));
        assert!(extractor.bridge().calls().is_empty());
        assert!(decoys.iter().all(|decoy| decoy.is_dir()));
        assert!(!output_dir.exists());
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("com.miui.weather").is_ok());
        assert!(validate_identifier("com.example.app-2_beta").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("a/b").is_err());
        assert!(validate_identifier("a\"b").is_err());
        assert!(validate_identifier("$(reboot)").is_err());
    }
}
