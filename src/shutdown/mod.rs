//! Operating-system shutdown invocation.
//!
//! Powering off is a single fire-and-forget process launch. The daemon does
//! not wait for the command to finish and never retries it; a launch failure
//! is reported back so the caller can log it.

use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use thiserror::Error;
use tracing::{info, warn};

/// Path to the shutdown binary.
pub const SHUTDOWN_PATH: &str = "/sbin/shutdown";

/// Arguments for an immediate halt.
pub const SHUTDOWN_ARGS: [&str; 2] = ["-h", "now"];

/// Errors that can occur while requesting a shutdown.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShutdownError {
    /// The shutdown command could not be started.
    #[error("failed to launch {0}: {1}")]
    LaunchFailed(String, String),
}

/// Something that can power the host off.
pub trait ShutdownInvoker: Send + Sync {
    /// Requests a shutdown without waiting for it to complete.
    fn request_shutdown(&self) -> Result<(), ShutdownError>;
}

// ============================================================================
// SystemShutdown
// ============================================================================

/// Launches `/sbin/shutdown -h now`.
#[derive(Debug, Clone)]
pub struct SystemShutdown {
    program: String,
    args: Vec<String>,
}

impl Default for SystemShutdown {
    fn default() -> Self {
        Self::with_command(SHUTDOWN_PATH, &SHUTDOWN_ARGS)
    }
}

impl SystemShutdown {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a different program, e.g. `systemctl poweroff` wrappers.
    #[must_use]
    pub fn with_command(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    /// Returns the program that will be launched.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the arguments passed to the program.
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl ShutdownInvoker for SystemShutdown {
    fn request_shutdown(&self) -> Result<(), ShutdownError> {
        info!("Launching {} {}", self.program, self.args.join(" "));

        // The child is not waited on; the host is going down.
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_child| ())
            .map_err(|e| ShutdownError::LaunchFailed(self.program.clone(), e.to_string()))
    }
}

// ============================================================================
// DryRunShutdown
// ============================================================================

/// Logs the shutdown request instead of powering off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunShutdown;

impl ShutdownInvoker for DryRunShutdown {
    fn request_shutdown(&self) -> Result<(), ShutdownError> {
        warn!(
            "Dry run: would launch {} {}",
            SHUTDOWN_PATH,
            SHUTDOWN_ARGS.join(" ")
        );
        Ok(())
    }
}

// ============================================================================
// MockShutdown
// ============================================================================

/// Counts shutdown requests.
#[derive(Debug, Default)]
pub struct MockShutdown {
    calls: AtomicUsize,
    should_fail: AtomicBool,
}

impl MockShutdown {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ShutdownInvoker for MockShutdown {
    fn request_shutdown(&self) -> Result<(), ShutdownError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(ShutdownError::LaunchFailed(
                "mock".to_string(),
                "simulated failure".to_string(),
            ));
        }
        Ok(())
    }
}

impl<T: ShutdownInvoker + ?Sized> ShutdownInvoker for std::sync::Arc<T> {
    fn request_shutdown(&self) -> Result<(), ShutdownError> {
        (**self).request_shutdown()
    }
}
