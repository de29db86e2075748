use clap::error::ErrorKind;
use clap::Parser;
use quickapp_extract::{
    cli, extractor_from_config, logging, ClearOutcome, Cli, Command, ExtractError, OutputFormatter,
    OutputMode, UserFriendlyError,
};
use std::ffi::OsString;
use std::io;
use std::process;

fn main() {
    let exit_code = run(std::env::args_os());
    process::exit(exit_code);
}

fn run<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => return handle_parse_error(e),
    };

    logging::init(cli.verbose, cli.quiet);

    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let command = match cli.command.clone() {
        None | Some(Command::Help) => {
            println!("{}", cli::usage());
            return 0;
        }
        Some(command) => command,
    };

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            print_startup_error(&e);
            return 1;
        }
    };

    let formatter = OutputFormatter::new(cli.output_mode(&config), cli.verbosity_level(), cli.quiet);
    let extractor = extractor_from_config(&config, formatter.clone());

    match command {
        Command::Extract { identifier: Some(identifier) } => {
            extractor.extract_one(&identifier);
        }
        Command::Extract { identifier: None } => {
            extractor.extract_all();
        }
        Command::List => {
            extractor.list_packages();
        }
        Command::Clear => {
            let stdin = io::stdin();
            if extractor.clear_cache(&mut stdin.lock()) == ClearOutcome::NoDevice {
                formatter.print_user_friendly_error(&ExtractError::NoDevice);
            }
        }
        Command::Help => println!("{}", cli::usage()),
    }

    0
}

/// Every argument problem still exits 0; unknown commands get the usage text.
fn handle_parse_error(error: clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::InvalidSubcommand | ErrorKind::UnknownArgument => {
            println!("invalid command");
            println!("{}", cli::usage());
        }
        _ => {
            let _ = error.print();
        }
    }
    0
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "quickapp-extract.toml".to_string());

    match quickapp_extract::generate_sample_config(&config_path) {
        Ok(()) => {
            println!("Generated sample configuration file: {}", config_path);
            println!("\nTo use this configuration:");
            println!("  quickapp-extract extract --config {}", config_path);
            0
        }
        Err(e) => {
            eprintln!("Failed to generate configuration file: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            1
        }
    }
}

fn print_startup_error(error: &ExtractError) {
    let formatter = OutputFormatter::new(OutputMode::Human, 0, false);
    formatter.print_user_friendly_error(error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_help_and_no_arguments_exit_zero() {
        assert_eq!(run(["quickapp-extract"]), 0);
        assert_eq!(run(["quickapp-extract", "help"]), 0);
    }

    #[test]
    fn test_invalid_command_exits_zero() {
        assert_eq!(run(["quickapp-extract", "frobnicate"]), 0);
    }

    #[test]
    fn test_generate_config_command() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");
        let config_arg = config_path.to_string_lossy().to_string();

        let exit_code = run(["quickapp-extract", "--generate-config", "--config", config_arg.as_str()]);
        assert_eq!(exit_code, 0);

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[device]"));
    }

    #[test]
    fn test_broken_config_exits_one() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "[paths\nstaging_dir = ").unwrap();
        let config_arg = config_path.to_string_lossy().to_string();

        assert_eq!(run(["quickapp-extract", "list", "--config", config_arg.as_str()]), 1);
    }

    #[test]
    fn test_unreachable_bridge_exits_zero() {
        let temp_dir = TempDir::new().unwrap();
        let output_arg = temp_dir.path().join("out").to_string_lossy().to_string();

        let exit_code = run([
            "quickapp-extract",
            "extract",
            "--bridge",
            "/nonexistent/platform-tools/adb",
            "--output-dir",
            output_arg.as_str(),
        ]);
        assert_eq!(exit_code, 0);
    }
}
