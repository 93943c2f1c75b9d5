//! Raspberry Pi shutdown button daemon.
//!
//! Watches a push-button on a GPIO pin and powers the board off when it is
//! held for five seconds:
//! - status LED lit while the daemon runs
//! - short presses are logged and otherwise ignored
//! - SIGINT/SIGTERM release the pins and exit

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tracing::{error, info};

use pi_shutdown_button::cli::{Cli, Commands, RunArgs};

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    if let Err(e) = init_tracing(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    // Execute command
    if let Err(e) = execute(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber for logging.
fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(LevelFilter::DEBUG),
            )
        }
        None => None,
    };

    // The file always records debug detail; stderr follows RUST_LOG/--verbose.
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_filter(filter))
        .with(file_layer)
        .init();

    Ok(())
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    if cli.verbose {
        tracing::debug!("Verbose mode enabled");
    }
    tracing::debug!("Command: {:?}", cli.command);

    match cli.command {
        Some(Commands::Completions { shell }) => generate_completions(shell),
        Some(Commands::Run) | None => run_daemon(cli.run).await?,
    }

    Ok(())
}

/// Runs the daemon until SIGINT or SIGTERM.
#[cfg(target_os = "linux")]
async fn run_daemon(args: RunArgs) -> Result<()> {
    use std::sync::Arc;

    use pi_shutdown_button::daemon::PressDaemon;
    use pi_shutdown_button::gpio::RppalGpioPort;
    use pi_shutdown_button::shutdown::{DryRunShutdown, ShutdownInvoker, SystemShutdown};

    info!("Starting daemon: {}", args.daemon_name);

    let port = RppalGpioPort::new().unwrap_or_else(|e| {
        error!("{} ({})", e, e.suggestion());
        RppalGpioPort::unavailable(e.to_string())
    });

    let shutdown: Arc<dyn ShutdownInvoker> = if args.dry_run {
        Arc::new(DryRunShutdown)
    } else {
        Arc::new(SystemShutdown::new())
    };

    let mut daemon = PressDaemon::new(port, shutdown);
    daemon.start();
    daemon.run(termination_signal()).await;

    info!("Daemon stopped");
    Ok(())
}

#[cfg(not(target_os = "linux"))]
async fn run_daemon(args: RunArgs) -> Result<()> {
    anyhow::bail!("{}: GPIO access requires Linux", args.daemon_name)
}

/// Completes on SIGINT or SIGTERM.
#[cfg(target_os = "linux")]
async fn termination_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received interrupt"),
        _ = terminate => info!("Received terminate"),
    }
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_args() {
        let cli = Cli::parse_from(["pi-shutdown-button"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::parse_from(["pi-shutdown-button", "run"]);
        assert!(matches!(cli.command, Some(Commands::Run)));
    }

    #[test]
    fn test_cli_parse_verbose() {
        let cli = Cli::parse_from(["pi-shutdown-button", "--verbose", "run"]);
        assert!(cli.verbose);
    }
}
