//! CLI module for the torchsdf build orchestrator
//!
//! ## Commands
//!
//! - `build [--dry-run]` - Stamp the version, plan and compile the native extension, write the manifest
//! - `plan` - Print the extension plan as JSON without writing anything
//! - `version [--stamp]` - Print the resolved package version
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use miette::Diagnostic;

use crate::config::BuildConfig;
use crate::version::SETUP_VERSION;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    /// Create a new CLI error with a message and exit code.
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }

    /// Render a library error with its diagnostic code and help text.
    pub fn from_diagnostic<E>(err: E) -> Self
    where
        E: Diagnostic + Send + Sync + 'static,
    {
        Self::failure(format!("{:?}", miette::Report::new(err)))
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Build orchestrator for the torchsdf package
#[derive(Parser, Debug)]
#[command(name = "torchsdf-setup")]
#[command(version = SETUP_VERSION)]
#[command(about = "Build the torchsdf package and its optional C++/CUDA extension", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Project root containing version.txt and the torchsdf package (default: current directory)
    #[arg(long = "project-root", value_name = "DIR", global = true)]
    pub project_root: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stamp the version, build the native extension (if possible) and write the setup manifest
    Build {
        /// Log compiler commands instead of running them; write nothing
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the extension plan as JSON
    Plan,

    /// Print the resolved package version
    Version {
        /// Also write torchsdf/version.py
        #[arg(long)]
        stamp: bool,
    },
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    let Some(command) = cli.command else {
        // No command - show help
        let mut cmd = <Cli as clap::CommandFactory>::command();
        let _ = cmd.print_help();
        return Err(CliError::new("", ExitCode::FAILURE));
    };

    let config = load_config(cli.project_root)?;
    match command {
        Command::Build { dry_run } => commands::build(&config, dry_run),
        Command::Plan => commands::plan(&config),
        Command::Version { stamp } => commands::version(&config, stamp),
    }
}

/// Read the environment into a [`BuildConfig`] rooted at `project_root` (or the current directory).
fn load_config(project_root: Option<PathBuf>) -> CliResult<BuildConfig> {
    let root = match project_root {
        Some(root) => root,
        None => env::current_dir()
            .map_err(|e| CliError::failure(format!("Cannot determine current directory: {}", e)))?,
    };
    if !root.is_dir() {
        return Err(CliError::failure(format!(
            "Project root '{}' is not a directory",
            root.display()
        )));
    }
    Ok(BuildConfig::from_env().with_project_root(root))
}

// ============================================================================
// Tests
// ============================================================================
