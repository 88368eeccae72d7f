//! Package-level constants for `torchsdf`.
//!
//! Paths are relative to the project root (the directory holding `version.txt`).

/// Distribution name handed to the packaging entry point.
pub const PACKAGE_NAME: &str = "torchsdf";

/// SPDX license identifier recorded in the setup manifest.
pub const LICENSE: &str = "Apache-2.0";

/// The package is never installed as a zipped archive (it ships a native module).
pub const ZIP_SAFE: bool = false;

/// Version used when neither the version file nor the override is present.
pub const DEFAULT_VERSION: &str = "0.0.0";

/// Optional plain-text version file; only its first line is read.
pub const VERSION_FILE: &str = "version.txt";

/// Generated module consumed by the package at import time.
pub const VERSION_MODULE: &str = "torchsdf/version.py";

/// Module-local name of the native extension (`torchsdf._C`).
pub const EXTENSION_MODULE: &str = "_C";

/// Glob for C++ sources, compiled in every native build.
pub const CPP_SOURCES_GLOB: &str = "torchsdf/csrc/**/*.cpp";

/// Glob for CUDA sources, compiled only in accelerator mode.
pub const CUDA_SOURCES_GLOB: &str = "torchsdf/csrc/**/*.cu";

/// Directory receiving intermediate objects, built artifacts and the manifest.
pub const BUILD_DIR: &str = "build";

/// File name of the setup manifest inside [`BUILD_DIR`].
pub const MANIFEST_FILE: &str = "setup-manifest.json";

/// Name of the build-command customization key in the cmdclass map.
pub const BUILD_EXT_COMMAND: &str = "build_ext";

/// Fully-qualified extension name, e.g. `torchsdf._C`.
pub fn extension_name() -> String {
    format!("{PACKAGE_NAME}.{EXTENSION_MODULE}")
}

/// Render the generated version module for `version`.
///
/// The value is written verbatim; no escaping or validation is applied.
pub fn render_version_module(version: &str) -> String {
    format!("__version__ = '{version}'\n")
}
