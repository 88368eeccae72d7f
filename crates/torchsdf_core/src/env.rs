//! Environment variable registry.
//!
//! Every variable the orchestrator reads is listed here once, with its default and sentinel. Callers work
//! with [`EnvVarId`] and look spellings up via [`as_str`] instead of repeating string literals.
//!
//! ## Examples
//! ```rust
//! use torchsdf_core::env::{self, EnvVarId};
//!
//! assert_eq!(env::as_str(EnvVarId::ForceCuda), "FORCE_CUDA");
//! assert_eq!(env::from_str("FORCE_CUDA"), Some(EnvVarId::ForceCuda));
//! ```

/// Stable identifier for an environment variable read by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvVarId {
    /// Build toggle; native compilation is attempted only when set to [`ENABLED`].
    BuildExt,
    /// Version override used when the version file is absent.
    Version,
    /// Force accelerator mode even without a runtime GPU.
    ForceCuda,
    /// Explicit target architecture list for nvcc.
    CudaArchList,
    /// Toolchain home directory.
    CudaHome,
    /// Alternative spelling of the toolchain home directory.
    CudaPath,
}

/// Sentinel value that switches a flag variable on.
pub const ENABLED: &str = "1";

/// Metadata entry for an environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvVarInfo {
    pub id: EnvVarId,
    pub name: &'static str,
    /// Value assumed when the variable is unset (`None` = no value).
    pub default: Option<&'static str>,
    pub description: &'static str,
}

/// Registry of environment variables.
pub const ENV_VARS: &[EnvVarInfo] = &[
    EnvVarInfo {
        id: EnvVarId::BuildExt,
        name: "TORCHSDF_BUILD_EXT",
        default: Some(ENABLED),
        description: "Attempt the native build (`1`) or install the pure package only (anything else).",
    },
    EnvVarInfo {
        id: EnvVarId::Version,
        name: "TORCHSDF_VERSION",
        default: None,
        description: "Package version used when `version.txt` is absent.",
    },
    EnvVarInfo {
        id: EnvVarId::ForceCuda,
        name: "FORCE_CUDA",
        default: Some("0"),
        description: "Build CUDA sources even when no GPU is visible (`1`).",
    },
    EnvVarInfo {
        id: EnvVarId::CudaArchList,
        name: "TORCH_CUDA_ARCH_LIST",
        default: None,
        description: "Semicolon separated compute capabilities, e.g. `7.5;8.6+PTX`.",
    },
    EnvVarInfo {
        id: EnvVarId::CudaHome,
        name: "CUDA_HOME",
        default: None,
        description: "CUDA toolkit installation directory.",
    },
    EnvVarInfo {
        id: EnvVarId::CudaPath,
        name: "CUDA_PATH",
        default: None,
        description: "CUDA toolkit installation directory (fallback for `CUDA_HOME`).",
    },
];

/// Resolve a variable name to its stable id.
pub fn from_str(name: &str) -> Option<EnvVarId> {
    ENV_VARS.iter().find(|v| v.name == name).map(|v| v.id)
}

/// Return the spelling of a variable.
pub fn as_str(id: EnvVarId) -> &'static str {
    info_for(id).name
}

/// Return the default value of a variable, if any.
pub fn default_for(id: EnvVarId) -> Option<&'static str> {
    info_for(id).default
}

/// Return the metadata entry for a variable.
pub fn info_for(id: EnvVarId) -> &'static EnvVarInfo {
    // Every id has exactly one entry; guarded by `test_every_id_has_an_entry`.
    match ENV_VARS.iter().find(|v| v.id == id) {
        Some(info) => info,
        None => unreachable!("environment variable info missing for {id:?}"),
    }
}

/// Interpret a flag value: `true` only for the exact [`ENABLED`] sentinel.
///
/// Unset flags fall back to the registry default.
pub fn flag_enabled(id: EnvVarId, value: Option<&str>) -> bool {
    value.or(default_for(id)) == Some(ENABLED)
}
