//! CLI module for the shutdown button daemon.
//!
//! This module provides the command-line interface:
//! - `commands`: Command definitions using clap derive

pub mod commands;

pub use commands::{Cli, Commands, RunArgs, DEFAULT_DAEMON_NAME};
