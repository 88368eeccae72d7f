//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use crate::config::BuildConfig;
use crate::plan::plan_extensions;
use crate::setup::{self, SetupError};
use crate::toolchain::DefaultToolchain;
use crate::version;

use super::{CliError, CliResult, ExitCode};

/// Run the full build and print a short summary.
pub fn build(config: &BuildConfig, dry_run: bool) -> CliResult<ExitCode> {
    let toolchain = DefaultToolchain::new(config);
    let manifest = setup::build_package(config, &toolchain, dry_run).map_err(CliError::from_diagnostic)?;

    if manifest.ext_modules.is_empty() {
        println!("{} {} (pure, no native ops)", manifest.name, manifest.version);
    } else {
        for artifact in &manifest.artifacts {
            println!("{} {} -> {}", manifest.name, manifest.version, artifact.display());
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Print the extension plan as JSON. Writes nothing.
pub fn plan(config: &BuildConfig) -> CliResult<ExitCode> {
    let toolchain = DefaultToolchain::new(config);
    let plan = plan_extensions(config, &toolchain).map_err(|e| CliError::from_diagnostic(SetupError::from(e)))?;
    let json = serde_json::to_string_pretty(&plan)
        .map_err(|e| CliError::failure(format!("Error serializing plan: {}", e)))?;
    println!("{}", json);
    Ok(ExitCode::SUCCESS)
}

/// Print the resolved version, optionally stamping the version module.
pub fn version(config: &BuildConfig, stamp: bool) -> CliResult<ExitCode> {
    let resolved = version::resolve_version(config)
        .map_err(|e| CliError::failure(format!("Error reading version: {}", e)))?;

    if stamp {
        let path = version::stamp_version(&config.project_root, &resolved)
            .map_err(|e| CliError::failure(format!("Error writing version module: {}", e)))?;
        tracing::info!("wrote {}", path.display());
    }
    println!("{}", resolved);
    Ok(ExitCode::SUCCESS)
}
