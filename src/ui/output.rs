use crate::error::{ExtractError, UserFriendlyError};
use crate::extractor::{PackageEntry, RunSummary};
use console::{style, Emoji, Term};
use std::io::Write;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

impl OutputMode {
    pub fn from_string(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputMode::Json,
            "plain" => OutputMode::Plain,
            _ => OutputMode::Human,
        }
    }
}

// Emojis with text fallbacks
static CHECKMARK: Emoji = Emoji("✅ ", "✓ ");
static CROSS: Emoji = Emoji("❌ ", "✗ ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static WARNING: Emoji = Emoji("⚠️  ", "! ");
static PACKAGE: Emoji = Emoji("📦 ", "* ");

#[derive(Debug, Clone)]
pub struct OutputFormatter {
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let use_colors = match mode {
            OutputMode::Human => Term::stdout().features().colors_supported() && !quiet,
            _ => false,
        };

        Self {
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    // Core messaging methods
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Success, message),
            OutputMode::Json => self.print_json_message("success", message),
            OutputMode::Plain => println!("SUCCESS: {}", message),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Error, message),
            OutputMode::Json => self.print_json_message("error", message),
            OutputMode::Plain => eprintln!("ERROR: {}", message),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Warning, message),
                OutputMode::Json => self.print_json_message("warning", message),
                OutputMode::Plain => println!("WARNING: {}", message),
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => println!("INFO: {}", message),
            }
        }
    }

    pub fn print_user_friendly_error(&self, error: &ExtractError) {
        self.error(&error.user_message());

        if let Some(suggestion) = error.suggestion() {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        eprintln!("{}{}", INFO, style(format!("Suggestion: {}", suggestion)).cyan());
                    } else {
                        eprintln!("Suggestion: {}", suggestion);
                    }
                }
                OutputMode::Json => {
                    self.print_json_object(&serde_json::json!({
                        "type": "suggestion",
                        "message": suggestion
                    }));
                }
                OutputMode::Plain => eprintln!("SUGGESTION: {}", suggestion),
            }
        }
    }

    /// Cached quick apps with their resolved display names.
    pub fn print_catalogue(&self, entries: &[PackageEntry]) {
        match self.mode {
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "catalogue",
                    "packages": entries,
                }));
            }
            _ if entries.is_empty() => println!("No cached quick apps found"),
            OutputMode::Human => {
                println!();
                if self.use_colors {
                    println!("{}{}", PACKAGE, style("Cached quick apps:").bold().cyan());
                } else {
                    println!("Cached quick apps:");
                }
                for entry in entries {
                    if self.use_colors {
                        println!(
                            "- {} {}",
                            style(&entry.display_name).bold(),
                            style(format!("({})", entry.identifier)).dim()
                        );
                    } else {
                        println!("- {} ({})", entry.display_name, entry.identifier);
                    }
                }
            }
            OutputMode::Plain => {
                for entry in entries {
                    println!("{}\t{}", entry.identifier, entry.display_name);
                }
            }
        }
    }

    pub fn print_pending_deletions(&self, identifiers: &[String]) {
        match self.mode {
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "pending_deletion",
                    "packages": identifiers,
                }));
            }
            _ => {
                println!();
                if self.use_colors {
                    println!("{}{}", WARNING, style("The following quick app caches will be deleted:").yellow().bold());
                } else {
                    println!("The following quick app caches will be deleted:");
                }
                for identifier in identifiers {
                    println!("- {}", identifier);
                }
            }
        }
    }

    /// Writes a yes/no prompt without a trailing newline.
    ///
    /// In JSON mode the prompt goes to stderr so stdout stays parseable.
    pub fn prompt(&self, question: &str) {
        let text = format!("\n{} [y/N] ", question);
        if self.mode == OutputMode::Json {
            eprint!("{}", text);
            std::io::stderr().flush().ok();
        } else {
            print!("{}", text);
            std::io::stdout().flush().ok();
        }
    }

    pub fn print_run_summary(&self, summary: &RunSummary) {
        if self.quiet && self.mode != OutputMode::Json {
            return;
        }

        match self.mode {
            OutputMode::Human => self.print_human_summary(summary),
            OutputMode::Json => {
                let json_output = serde_json::to_string_pretty(summary)
                    .unwrap_or_else(|_| "{}".to_string());
                println!("{}", json_output);
            }
            OutputMode::Plain => self.print_plain_summary(summary),
        }
    }

    pub fn print_separator(&self) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                if self.use_colors {
                    println!("{}", style("─".repeat(60)).dim());
                } else {
                    println!("{}", "-".repeat(60));
                }
            }
            OutputMode::Plain => println!("{}", "-".repeat(60)),
            OutputMode::Json => {}
        }
    }

    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        if self.use_colors {
            let (emoji, styled) = match msg_type {
                MessageType::Success => (&CHECKMARK, style(message).green().bold()),
                MessageType::Error => (&CROSS, style(message).red().bold()),
                MessageType::Warning => (&WARNING, style(message).yellow().bold()),
                MessageType::Info => (&INFO, style(message).cyan()),
            };

            match msg_type {
                MessageType::Error => eprintln!("{}{}", emoji, styled),
                _ => println!("{}{}", emoji, styled),
            }
        } else {
            let prefix = match msg_type {
                MessageType::Success => "✓",
                MessageType::Error => "✗",
                MessageType::Warning => "!",
                MessageType::Info => "i",
            };

            match msg_type {
                MessageType::Error => eprintln!("{} {}", prefix, message),
                _ => println!("{} {}", prefix, message),
            }
        }
    }

    fn print_json_message(&self, level: &str, message: &str) {
        self.print_json_object(&serde_json::json!({
            "type": "message",
            "level": level,
            "message": message,
            "timestamp": chrono::Local::now().to_rfc3339()
        }));
    }

    fn print_json_object(&self, obj: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string())
        );
    }

    fn print_human_summary(&self, summary: &RunSummary) {
        println!();
        self.print_separator();

        let headline = format!("Extraction finished: {}/{} succeeded", summary.succeeded, summary.total);
        if self.use_colors {
            let styled = if summary.failed == 0 {
                style(headline).green().bold()
            } else {
                style(headline).yellow().bold()
            };
            println!("{}", styled);
        } else {
            println!("{}", headline);
        }

        for result in &summary.results {
            if result.success {
                println!(
                    "  {}{} -> {} ({} files, {})",
                    CHECKMARK,
                    result.display_name,
                    result.output_path.display(),
                    result.files,
                    format_bytes(result.bytes)
                );
            } else {
                println!("  {}{}", CROSS, result.identifier);
            }
        }

        println!("  Time taken: {}", format_duration(summary.elapsed));
        self.print_separator();
    }

    fn print_plain_summary(&self, summary: &RunSummary) {
        println!("COMPLETED: {}/{} succeeded", summary.succeeded, summary.total);
        for result in &summary.results {
            let status = if result.success { "OK" } else { "FAILED" };
            println!("{}\t{}\t{}", status, result.identifier, result.output_path.display());
        }
        println!("Duration: {:?}", summary.elapsed);
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Success,
    Error,
    Warning,
    Info,
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", duration.as_millis())
    }
}
