//! Build configuration
//!
//! All environment inputs are read once into a [`BuildConfig`] and passed explicitly through the build
//! procedure. Nothing downstream reads or writes the process environment.

use std::env;
use std::path::{Path, PathBuf};

use torchsdf_core::env::{self as vars, EnvVarId};

/// Inputs to a single build invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Directory holding `version.txt` and the `torchsdf/` package
    pub project_root: PathBuf,
    /// Whether a native build is attempted at all
    pub build_ext: bool,
    /// Version used when the version file is absent
    pub version_override: Option<String>,
    /// Build CUDA sources even without a visible GPU
    pub force_cuda: bool,
    /// Explicit target architecture list; an empty string still counts as configured
    pub cuda_arch_list: Option<String>,
    /// CUDA toolkit home directory
    pub cuda_home: Option<PathBuf>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            build_ext: vars::flag_enabled(EnvVarId::BuildExt, None),
            version_override: None,
            force_cuda: vars::flag_enabled(EnvVarId::ForceCuda, None),
            cuda_arch_list: None,
            cuda_home: None,
        }
    }
}

impl BuildConfig {
    /// Create a config with default settings rooted at the current directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    ///
    /// `lookup` receives variable names from the [`torchsdf_core::env`] registry and returns `None` for unset
    /// variables.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |id: EnvVarId| lookup(vars::as_str(id));

        let cuda_home = get(EnvVarId::CudaHome)
            .or_else(|| get(EnvVarId::CudaPath))
            .filter(|home| !home.is_empty())
            .map(PathBuf::from);

        Self {
            project_root: PathBuf::from("."),
            build_ext: vars::flag_enabled(EnvVarId::BuildExt, get(EnvVarId::BuildExt).as_deref()),
            version_override: get(EnvVarId::Version),
            force_cuda: vars::flag_enabled(EnvVarId::ForceCuda, get(EnvVarId::ForceCuda).as_deref()),
            cuda_arch_list: get(EnvVarId::CudaArchList),
            cuda_home,
        }
    }

    /// Set the project root
    pub fn with_project_root(mut self, root: impl AsRef<Path>) -> Self {
        self.project_root = root.as_ref().to_path_buf();
        self
    }

    /// Enable or disable the native build
    pub fn with_build_ext(mut self, enabled: bool) -> Self {
        self.build_ext = enabled;
        self
    }

    /// Set the version override
    pub fn with_version_override(mut self, version: impl Into<String>) -> Self {
        self.version_override = Some(version.into());
        self
    }

    /// Force accelerator mode
    pub fn with_force_cuda(mut self, force: bool) -> Self {
        self.force_cuda = force;
        self
    }

    /// Set an explicit architecture list
    pub fn with_cuda_arch_list(mut self, list: impl Into<String>) -> Self {
        self.cuda_arch_list = Some(list.into());
        self
    }

    /// Set the CUDA toolkit home
    pub fn with_cuda_home(mut self, home: impl AsRef<Path>) -> Self {
        self.cuda_home = Some(home.as_ref().to_path_buf());
        self
    }
}
