//! Package version resolution and stamping.
//!
//! The version is resolved once per invocation and written into the generated version module, which is
//! the single source of truth the package reads at import time.
//!
//! ## Notes
//!
//! - Resolution order: first line of `version.txt` (trimmed) → `TORCHSDF_VERSION` → `0.0.0`.
//! - The value is not validated or parsed.
//! - File-system errors propagate to the caller.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use torchsdf_core::package::{DEFAULT_VERSION, VERSION_FILE, VERSION_MODULE, render_version_module};

use crate::config::BuildConfig;

/// Version of the orchestrator itself (for example, `0.1.0`).
pub const SETUP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve the package version for `config.project_root`.
pub fn resolve_version(config: &BuildConfig) -> io::Result<String> {
    if let Some(version) = read_version_file(&config.project_root)? {
        return Ok(version);
    }
    Ok(config
        .version_override
        .clone()
        .unwrap_or_else(|| DEFAULT_VERSION.to_string()))
}

/// Read the first line of the version file, trimmed. `\n`, `\r\n` and a lone `\r` all end a line.
///
/// Returns `Ok(None)` when the file does not exist. An empty file yields `Some("")`.
pub fn read_version_file(project_root: &Path) -> io::Result<Option<String>> {
    let path = project_root.join(VERSION_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(&path)?;
    let first_line = contents.split(['\r', '\n']).next().unwrap_or("");
    Ok(Some(first_line.trim().to_string()))
}

/// Write the generated version module, overwriting any previous copy.
///
/// Returns the path that was written.
#[tracing::instrument(skip_all, fields(version = version))]
pub fn stamp_version(project_root: &Path, version: &str) -> io::Result<PathBuf> {
    let path = project_root.join(VERSION_MODULE);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, render_version_module(version))?;
    tracing::debug!("wrote {}", path.display());
    Ok(path)
}
