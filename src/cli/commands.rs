//! Command definitions for the shutdown button daemon.
//!
//! Uses clap derive macro for argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Default daemon name used in the startup log line.
pub const DEFAULT_DAEMON_NAME: &str = "pi-shutdown-button";

// ============================================================================
// CLI Structure
// ============================================================================

/// Raspberry Pi shutdown button daemon
#[derive(Parser, Debug)]
#[command(
    name = "pi-shutdown-button",
    version,
    about = "Power the Raspberry Pi off with a long press on a GPIO button",
    long_about = "Watches a push-button on board pin 12 and lights a status LED on board pin 16.\n\
                  Holding the button for 5 seconds runs `shutdown -h now`.",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write debug-level logs to this file (no log file is written by default)
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(flatten)]
    pub run: RunArgs,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the daemon in the foreground
    Run,

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Run Arguments
// ============================================================================

/// Options for running the daemon
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Name reported in the startup log line
    #[arg(
        long,
        global = true,
        env = "DAEMON_NAME",
        default_value = DEFAULT_DAEMON_NAME,
        value_parser = validate_daemon_name
    )]
    pub daemon_name: String,

    /// Log the shutdown instead of powering off
    #[arg(long, global = true)]
    pub dry_run: bool,
}

/// Validates the daemon name.
///
/// - Must not be blank
/// - Must not exceed 64 characters
fn validate_daemon_name(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        return Err("daemon name must not be empty".to_string());
    }
    if s.chars().count() > 64 {
        return Err("daemon name must be at most 64 characters".to_string());
    }
    Ok(s.to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_no_args() {
        let cli = Cli::try_parse_from(["pi-shutdown-button"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
        assert!(cli.log_file.is_none());
        assert!(!cli.run.dry_run);
    }

    #[test]
    fn test_default_daemon_name() {
        let cli = Cli::try_parse_from(["pi-shutdown-button", "run"]).unwrap();
        if std::env::var_os("DAEMON_NAME").is_none() {
            assert_eq!(cli.run.daemon_name, DEFAULT_DAEMON_NAME);
        }
    }

    #[test]
    fn test_parse_verbose_flag() {
        let cli = Cli::parse_from(["pi-shutdown-button", "-v"]);
        assert!(cli.verbose);
    }

    #[test]
    fn test_parse_run_with_options() {
        let cli = Cli::parse_from([
            "pi-shutdown-button",
            "run",
            "--daemon-name",
            "garage-pi",
            "--dry-run",
            "--log-file",
            "/tmp/button.log",
        ]);
        assert!(matches!(cli.command, Some(Commands::Run)));
        assert_eq!(cli.run.daemon_name, "garage-pi");
        assert!(cli.run.dry_run);
        assert_eq!(cli.log_file, Some(PathBuf::from("/tmp/button.log")));
    }

    #[test]
    fn test_parse_completions() {
        let cli = Cli::parse_from(["pi-shutdown-button", "completions", "bash"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Completions {
                shell: clap_complete::Shell::Bash
            })
        ));
    }

    #[test]
    fn test_reject_blank_daemon_name() {
        let result = Cli::try_parse_from(["pi-shutdown-button", "--daemon-name", "  "]);
        assert!(result.is_err());
    }

    #[test]
    fn test_reject_unknown_command() {
        let result = Cli::try_parse_from(["pi-shutdown-button", "reboot"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_daemon_name_length() {
        assert!(validate_daemon_name(&"a".repeat(64)).is_ok());
        assert!(validate_daemon_name(&"a".repeat(65)).is_err());
    }
}
