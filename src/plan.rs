//! Conditional native-extension assembly
//!
//! [`plan_extensions`] decides whether the `torchsdf._C` extension is built and, if so, how:
//!
//! - Build toggle off → empty plan; the toolchain is never probed.
//! - Toolchain probe fails → warning, empty plan; the package installs without native ops.
//! - Otherwise one [`Extension`] is assembled. Accelerator (CUDA) mode is chosen when a GPU is visible
//!   or `FORCE_CUDA=1`.
//!
//! When cross-compiling (CUDA forced, no GPU, no explicit architecture list) the default architecture
//! table is chosen from the toolkit's `nvcc -V` banner. The selected list is returned in the plan; the
//! process environment is never modified.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use glob::MatchOptions;
use serde::Serialize;
use thiserror::Error;
use torchsdf_core::cuda::{self, CUDA_MACROS, DEFAULT_CUDA_HOME, OPT_FLAG};
use torchsdf_core::package::{BUILD_EXT_COMMAND, CPP_SOURCES_GLOB, CUDA_SOURCES_GLOB, extension_name};

use crate::config::BuildConfig;
use crate::toolchain::{Toolchain, ToolchainInfo};

/// Compile-args key for the host C++ compiler.
pub const CXX_ARGS_KEY: &str = "cxx";

/// Compile-args key for nvcc.
pub const NVCC_ARGS_KEY: &str = "nvcc";

/// Errors that occur after the toolchain probe succeeded
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("invalid source pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("failed to enumerate sources: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("source path {} is outside the project root", .0.display())]
    OutsideRoot(PathBuf),

    #[error("project root {} is not valid UTF-8", .0.display())]
    NonUtf8Root(PathBuf),
}

/// Which toolchain compiles the extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionKind {
    /// Host C++ compiler only
    Cpp,
    /// Host C++ compiler plus nvcc
    Cuda,
}

/// A single native extension to build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extension {
    /// Fully-qualified module name (`torchsdf._C`)
    pub name: String,
    pub kind: ExtensionKind,
    /// Source files relative to the project root: C++ sources, then CUDA sources, each sorted
    pub sources: Vec<PathBuf>,
    /// Preprocessor definitions, `(name, value)`
    pub define_macros: Vec<(String, Option<String>)>,
    /// Extra compiler flags keyed by toolchain (`cxx`, `nvcc`)
    pub extra_compile_args: BTreeMap<String, Vec<String>>,
    pub include_dirs: Vec<PathBuf>,
}

impl Extension {
    /// Module-local file stem of the built artifact (`_C` for `torchsdf._C`).
    pub fn module_stem(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Package path segments leading to the artifact (`["torchsdf"]` for `torchsdf._C`).
    pub fn package_segments(&self) -> Vec<&str> {
        let mut segments: Vec<&str> = self.name.split('.').collect();
        segments.pop();
        segments
    }

    pub fn compile_args(&self, key: &str) -> &[String] {
        self.extra_compile_args.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Options for the `build_ext` command customization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildExtOptions {
    /// Name artifacts `_C.so` instead of `_C.<abi-tag>.so`
    pub no_python_abi_suffix: bool,
}

/// Result of planning: what to build and how
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtensionPlan {
    pub extensions: Vec<Extension>,
    /// Build-command customizations handed to the packaging entry point
    pub cmdclass: BTreeMap<String, BuildExtOptions>,
    /// Target architectures for nvcc; `None` leaves the choice to nvcc
    pub cuda_arch_list: Option<String>,
    /// Toolchain the extensions will be built with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolchain: Option<ToolchainInfo>,
}

impl ExtensionPlan {
    /// Plan for a pure package without native ops
    pub fn pure() -> Self {
        Self::default()
    }

    pub fn is_pure(&self) -> bool {
        self.extensions.is_empty()
    }
}

/// Include directories added in accelerator mode. Currently none.
pub fn include_dirs() -> Vec<PathBuf> {
    Vec::new()
}

/// Assemble the extension plan for `config`.
///
/// ## Errors
///
/// Never fails for a missing toolchain. Errors raised after a successful probe (bad source pattern,
/// unreadable directory entry) propagate.
#[tracing::instrument(skip_all, fields(root = %config.project_root.display()))]
pub fn plan_extensions(config: &BuildConfig, toolchain: &dyn Toolchain) -> Result<ExtensionPlan, PlanError> {
    if !config.build_ext {
        tracing::info!("native build disabled; building a pure package without native ops");
        return Ok(ExtensionPlan::pure());
    }

    let info = match toolchain.probe() {
        Ok(info) => info,
        Err(e) => {
            tracing::warn!(
                "C++ extension toolchain not available during build ({}). Building a pure package without native ops.",
                e
            );
            return Ok(ExtensionPlan::pure());
        }
    };

    let mut sources = collect_sources(&config.project_root, CPP_SOURCES_GLOB)?;
    let mut define_macros = Vec::new();
    let mut extra_compile_args = BTreeMap::new();
    extra_compile_args.insert(CXX_ARGS_KEY.to_string(), vec![OPT_FLAG.to_string()]);
    let mut include = Vec::new();
    let mut cuda_arch_list = None;

    let use_cuda = info.cuda_available || config.force_cuda;
    let kind = if use_cuda {
        define_macros.extend(CUDA_MACROS.iter().map(|m| (m.to_string(), None)));
        sources.extend(collect_sources(&config.project_root, CUDA_SOURCES_GLOB)?);

        let mut nvcc_args = vec![OPT_FLAG.to_string()];
        nvcc_args.extend(CUDA_MACROS.iter().map(|m| format!("-D{m}")));
        extra_compile_args.insert(NVCC_ARGS_KEY.to_string(), nvcc_args);
        include = include_dirs();

        cuda_arch_list = match &config.cuda_arch_list {
            Some(list) => Some(list.clone()),
            None if !info.cuda_available && config.force_cuda => cross_compile_arch_list(&info, toolchain),
            None => None,
        };
        ExtensionKind::Cuda
    } else {
        ExtensionKind::Cpp
    };

    tracing::info!(
        kind = ?kind,
        sources = sources.len(),
        arch_list = cuda_arch_list.as_deref().unwrap_or("<toolchain default>"),
        "planned {}",
        extension_name()
    );

    let extension = Extension {
        name: extension_name(),
        kind,
        sources,
        define_macros,
        extra_compile_args,
        include_dirs: include,
    };

    let mut cmdclass = BTreeMap::new();
    cmdclass.insert(
        BUILD_EXT_COMMAND.to_string(),
        BuildExtOptions {
            no_python_abi_suffix: true,
        },
    );

    Ok(ExtensionPlan {
        extensions: vec![extension],
        cmdclass,
        cuda_arch_list,
        toolchain: Some(info),
    })
}

/// Pick the default architecture table from the installed toolkit's version.
///
/// Any probe or parse failure is reported as a warning and leaves the list unset.
fn cross_compile_arch_list(info: &ToolchainInfo, toolchain: &dyn Toolchain) -> Option<String> {
    let home = info
        .cuda_home
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CUDA_HOME));

    let banner = match toolchain.nvcc_version(&home) {
        Ok(banner) => banner,
        Err(e) => {
            tracing::warn!("could not query nvcc version ({}); nvcc will use its default architectures", e);
            return None;
        }
    };
    let Some(version) = cuda::parse_nvcc_release(&banner) else {
        tracing::warn!("could not parse nvcc release from banner; nvcc will use its default architectures");
        return None;
    };

    let list = cuda::default_arch_list(version);
    tracing::info!(
        "cross-compiling for CUDA {}.{}: architectures {}",
        version.major,
        version.minor,
        list
    );
    Some(list)
}

/// Expand `pattern` under `root`, returning sorted paths relative to `root`.
///
/// The root is matched literally. Hidden files and anything under a hidden directory are skipped.
fn collect_sources(root: &Path, pattern: &str) -> Result<Vec<PathBuf>, PlanError> {
    let root_str = root.to_str().ok_or_else(|| PlanError::NonUtf8Root(root.to_path_buf()))?;
    let full = Path::new(&glob::Pattern::escape(root_str)).join(pattern);
    let full = full.to_string_lossy();
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };
    let entries = glob::glob_with(&full, options).map_err(|source| PlanError::Pattern {
        pattern: full.to_string(),
        source,
    })?;

    let mut sources = Vec::new();
    for entry in entries {
        let path = entry?;
        let relative = path
            .strip_prefix(root)
            .map_err(|_| PlanError::OutsideRoot(path.clone()))?;
        if is_hidden(relative) {
            tracing::debug!("skipping hidden source {}", relative.display());
            continue;
        }
        sources.push(relative.to_path_buf());
    }
    sources.sort();
    Ok(sources)
}

fn is_hidden(relative: &Path) -> bool {
    relative
        .components()
        .any(|c| c.as_os_str().to_str().is_some_and(|name| name.starts_with('.')))
}
