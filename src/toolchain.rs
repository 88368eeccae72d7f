//! Native toolchain probing
//!
//! The [`Toolchain`] trait is the seam between the build plan and the host: the planner only asks whether
//! a compiler exists, whether a GPU is visible, and what `nvcc -V` prints. [`DefaultToolchain`] answers by
//! inspecting the host; tests substitute their own implementation.
//!
//! All probes are blocking subprocess calls with no timeout and no retry.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;
use torchsdf_core::cuda::{DEFAULT_CUDA_HOME, NVCC_RELATIVE_PATH};

use crate::config::BuildConfig;

/// Host triple recorded by the build script.
const HOST_TARGET: &str = env!("TORCHSDF_SETUP_TARGET");

/// Errors raised while probing the native toolchain
#[derive(Debug, Error, Diagnostic)]
pub enum ToolchainError {
    #[error("no usable C++ compiler: {0}")]
    #[diagnostic(
        code(torchsdf::toolchain::no_compiler),
        help("install a C++ compiler (or set CXX), or set TORCHSDF_BUILD_EXT=0 to skip native ops")
    )]
    CompilerNotFound(String),

    #[error("nvcc not found at {}", path.display())]
    #[diagnostic(code(torchsdf::toolchain::no_nvcc), help("set CUDA_HOME to the CUDA toolkit directory"))]
    NvccNotFound { path: PathBuf },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}")]
    ProbeFailed { program: String, status: ExitStatus },
}

/// What the probe found on the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolchainInfo {
    /// Host C++ compiler driver
    pub cxx: PathBuf,
    /// CUDA toolkit home, if one was configured or discovered
    pub cuda_home: Option<PathBuf>,
    /// Whether a CUDA device is visible at build time
    pub cuda_available: bool,
}

/// Native toolchain queries used by the planner.
pub trait Toolchain {
    /// Check that a native build can be attempted at all.
    ///
    /// An error here makes the planner fall back to a pure package.
    fn probe(&self) -> Result<ToolchainInfo, ToolchainError>;

    /// Return the raw `nvcc -V` banner of the toolkit at `cuda_home`.
    fn nvcc_version(&self, cuda_home: &Path) -> Result<String, ToolchainError>;
}

/// Host toolchain (current behavior).
#[derive(Debug, Clone, Default)]
pub struct DefaultToolchain {
    /// Configured toolkit home (`CUDA_HOME` / `CUDA_PATH`)
    cuda_home: Option<PathBuf>,
}

impl DefaultToolchain {
    pub fn new(config: &BuildConfig) -> Self {
        Self {
            cuda_home: config.cuda_home.clone(),
        }
    }

    /// Locate the host C++ compiler the way `cc` would for this target.
    fn find_cxx(&self) -> Result<PathBuf, ToolchainError> {
        let tool = cc::Build::new()
            .cpp(true)
            .target(HOST_TARGET)
            .host(HOST_TARGET)
            .opt_level(3)
            .cargo_metadata(false)
            .cargo_warnings(false)
            .try_get_compiler()
            .map_err(|e| ToolchainError::CompilerNotFound(e.to_string()))?;

        which::which(tool.path())
            .map_err(|e| ToolchainError::CompilerNotFound(format!("{}: {}", tool.path().display(), e)))
    }
}

impl Toolchain for DefaultToolchain {
    #[tracing::instrument(skip_all)]
    fn probe(&self) -> Result<ToolchainInfo, ToolchainError> {
        let cxx = self.find_cxx()?;
        let cuda_home = find_cuda_home(self.cuda_home.as_deref());
        let cuda_available = cuda_device_visible();
        tracing::debug!(
            cxx = %cxx.display(),
            cuda_home = ?cuda_home,
            cuda_available,
            "toolchain probe complete"
        );
        Ok(ToolchainInfo {
            cxx,
            cuda_home,
            cuda_available,
        })
    }

    fn nvcc_version(&self, cuda_home: &Path) -> Result<String, ToolchainError> {
        let nvcc = cuda_home.join(NVCC_RELATIVE_PATH);
        if !nvcc.exists() {
            return Err(ToolchainError::NvccNotFound { path: nvcc });
        }
        let program = nvcc.display().to_string();
        let output = Command::new(&nvcc).arg("-V").output().map_err(|source| ToolchainError::Spawn {
            program: program.clone(),
            source,
        })?;
        if !output.status.success() {
            return Err(ToolchainError::ProbeFailed {
                program,
                status: output.status,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Resolve the CUDA toolkit home.
///
/// Priority: configured directory > parent of `nvcc` on `PATH` > `/usr/local/cuda` (if present).
pub fn find_cuda_home(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(home) = configured {
        return Some(home.to_path_buf());
    }
    // <home>/bin/nvcc
    if let Ok(nvcc) = which::which("nvcc") {
        if let Some(home) = nvcc.parent().and_then(Path::parent) {
            return Some(home.to_path_buf());
        }
    }
    let default = Path::new(DEFAULT_CUDA_HOME);
    if default.is_dir() {
        return Some(default.to_path_buf());
    }
    None
}

/// Whether `nvidia-smi -L` lists at least one GPU.
fn cuda_device_visible() -> bool {
    let Ok(smi) = which::which("nvidia-smi") else {
        return false;
    };
    match Command::new(smi).arg("-L").output() {
        Ok(output) => output.status.success() && String::from_utf8_lossy(&output.stdout).contains("GPU"),
        Err(e) => {
            tracing::debug!("nvidia-smi failed: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_cuda_home_wins() {
        let home = find_cuda_home(Some(Path::new("/opt/cuda-11.8")));
        assert_eq!(home, Some(PathBuf::from("/opt/cuda-11.8")));
    }

    #[test]
    fn test_nvcc_version_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let err = DefaultToolchain::default().nvcc_version(dir.path()).unwrap_err();
        match err {
            ToolchainError::NvccNotFound { path } => assert!(path.ends_with("bin/nvcc")),
            other => panic!("expected NvccNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_default_toolchain_takes_configured_home() {
        let config = BuildConfig::new().with_cuda_home("/opt/cuda");
        let toolchain = DefaultToolchain::new(&config);
        assert_eq!(toolchain.cuda_home, Some(PathBuf::from("/opt/cuda")));
    }

    #[test]
    fn test_error_messages() {
        let err = ToolchainError::CompilerNotFound("c++ not found".to_string());
        assert_eq!(err.to_string(), "no usable C++ compiler: c++ not found");
        let err = ToolchainError::NvccNotFound {
            path: PathBuf::from("/usr/local/cuda/bin/nvcc"),
        };
        assert_eq!(err.to_string(), "nvcc not found at /usr/local/cuda/bin/nvcc");
    }
}
