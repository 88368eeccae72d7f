//! Packaging entry point
//!
//! [`setup`] receives the package metadata and the extension plan, compiles every planned extension and
//! records the result in `build/setup-manifest.json`. [`build_package`] runs the whole procedure: version
//! stamping, planning and setup.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;
use torchsdf_core::package::{BUILD_DIR, LICENSE, MANIFEST_FILE, PACKAGE_NAME, ZIP_SAFE};

use crate::builder::{BuildError, ExtensionBuilder};
use crate::config::BuildConfig;
use crate::plan::{BuildExtOptions, Extension, ExtensionPlan, PlanError, plan_extensions};
use crate::toolchain::Toolchain;
use crate::version;

/// Errors that abort packaging
#[derive(Debug, Error, Diagnostic)]
pub enum SetupError {
    #[error("failed to resolve or stamp the package version: {0}")]
    Version(#[source] io::Error),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Build(#[from] BuildError),

    #[error("plan contains extensions but no toolchain")]
    MissingToolchain,

    #[error("failed to serialize setup manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Package metadata plus everything that was built
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupManifest {
    pub name: String,
    pub version: String,
    pub license: String,
    pub zip_safe: bool,
    pub ext_modules: Vec<Extension>,
    pub cmdclass: BTreeMap<String, BuildExtOptions>,
    pub cuda_arch_list: Option<String>,
    /// Built shared libraries, relative to the project root
    pub artifacts: Vec<PathBuf>,
}

impl SetupManifest {
    /// Manifest for `version` and `plan`, before anything is built
    pub fn new(version: &str, plan: &ExtensionPlan) -> Self {
        Self {
            name: PACKAGE_NAME.to_string(),
            version: version.to_string(),
            license: LICENSE.to_string(),
            zip_safe: ZIP_SAFE,
            ext_modules: plan.extensions.clone(),
            cmdclass: plan.cmdclass.clone(),
            cuda_arch_list: plan.cuda_arch_list.clone(),
            artifacts: Vec::new(),
        }
    }

    /// Render as pretty-printed JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Path of the manifest file under `project_root`
pub fn manifest_path(project_root: &Path) -> PathBuf {
    project_root.join(BUILD_DIR).join(MANIFEST_FILE)
}

/// Compile every extension in `plan` and write the setup manifest.
///
/// A pure plan builds nothing and still produces a manifest. With `dry_run` the compiler commands are
/// only logged and no file is written.
#[tracing::instrument(skip_all, fields(version = version, extensions = plan.extensions.len()))]
pub fn setup(
    project_root: &Path,
    version: &str,
    plan: &ExtensionPlan,
    dry_run: bool,
) -> Result<SetupManifest, SetupError> {
    let mut manifest = SetupManifest::new(version, plan);

    if !plan.is_pure() {
        let toolchain = plan.toolchain.as_ref().ok_or(SetupError::MissingToolchain)?;
        let builder = ExtensionBuilder::new(project_root, toolchain, plan.cuda_arch_list.as_deref())?
            .with_dry_run(dry_run);
        for ext in &plan.extensions {
            let artifact = builder.build(ext)?;
            tracing::info!("built {} -> {}", ext.name, artifact.display());
            manifest.artifacts.push(artifact);
        }
    }

    if dry_run {
        return Ok(manifest);
    }

    let path = manifest_path(project_root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, manifest.to_json()?)?;
    tracing::info!("wrote {}", path.display());

    Ok(manifest)
}

/// Run the full build: resolve and stamp the version, plan the extensions, then [`setup`].
///
/// With `dry_run` nothing is written, including the version module.
pub fn build_package(
    config: &BuildConfig,
    toolchain: &dyn Toolchain,
    dry_run: bool,
) -> Result<SetupManifest, SetupError> {
    let root = &config.project_root;
    let version = version::resolve_version(config).map_err(SetupError::Version)?;
    if !dry_run {
        version::stamp_version(root, &version).map_err(SetupError::Version)?;
    }
    tracing::info!("{} {}", PACKAGE_NAME, version);

    let plan = plan_extensions(config, toolchain)?;
    setup(root, &version, &plan, dry_run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::{ToolchainError, ToolchainInfo};

    struct NoToolchain;

    impl Toolchain for NoToolchain {
        fn probe(&self) -> Result<ToolchainInfo, ToolchainError> {
            Err(ToolchainError::CompilerNotFound("simulated".to_string()))
        }

        fn nvcc_version(&self, cuda_home: &Path) -> Result<String, ToolchainError> {
            Err(ToolchainError::NvccNotFound {
                path: cuda_home.join("bin/nvcc"),
            })
        }
    }

    #[test]
    fn test_pure_setup_writes_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = setup(dir.path(), "1.0.0", &ExtensionPlan::pure(), false).unwrap();
        assert_eq!(manifest.name, "torchsdf");
        assert_eq!(manifest.license, "Apache-2.0");
        assert!(!manifest.zip_safe);
        assert!(manifest.ext_modules.is_empty());
        assert!(manifest.cmdclass.is_empty());

        let written = fs::read_to_string(manifest_path(dir.path())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["version"], "1.0.0");
        assert_eq!(value["ext_modules"], serde_json::json!([]));
        assert_eq!(value["cmdclass"], serde_json::json!({}));
    }

    #[test]
    fn test_extensions_without_toolchain_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut plan = ExtensionPlan::pure();
        plan.extensions.push(Extension {
            name: "torchsdf._C".to_string(),
            kind: crate::plan::ExtensionKind::Cpp,
            sources: Vec::new(),
            define_macros: Vec::new(),
            extra_compile_args: BTreeMap::new(),
            include_dirs: Vec::new(),
        });
        assert!(matches!(
            setup(dir.path(), "1.0.0", &plan, true),
            Err(SetupError::MissingToolchain)
        ));
    }

    #[test]
    fn test_build_package_without_toolchain() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("version.txt"), "1.2.3\n").unwrap();
        let config = BuildConfig::new().with_project_root(dir.path());

        let manifest = build_package(&config, &NoToolchain, false).unwrap();
        assert_eq!(manifest.version, "1.2.3");
        assert!(manifest.ext_modules.is_empty());
        assert_eq!(
            fs::read_to_string(dir.path().join("torchsdf/version.py")).unwrap(),
            "__version__ = '1.2.3'\n"
        );
        assert!(manifest_path(dir.path()).exists());
    }

    #[test]
    fn test_build_package_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig::new().with_project_root(dir.path());
        let manifest = build_package(&config, &NoToolchain, true).unwrap();
        assert_eq!(manifest.version, "0.0.0");
        assert!(!dir.path().join("torchsdf").exists());
        assert!(!dir.path().join("build").exists());
    }
}
