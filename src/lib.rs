#![forbid(unsafe_code)]
//! torchsdf build orchestrator
//!
//! Builds the `torchsdf` package: stamps the version module, decides whether the optional C++/CUDA
//! extension is compiled, and hands the resulting plan to the packaging entry point. When no native
//! toolchain is available the package degrades to pure (interpreted) code without native ops.
//!
//! ## Pipeline
//!
//! 1. [`version`] resolves and stamps the package version.
//! 2. [`config`] captures every environment input once, as a [`BuildConfig`].
//! 3. [`plan`] probes the [`toolchain`] and assembles the extension descriptors.
//! 4. [`setup`] compiles them through the [`builder`] and writes the setup manifest.
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.

pub mod builder;
pub mod cli;
pub mod config;
pub mod plan;
pub mod setup;
pub mod toolchain;
pub mod version;

pub use builder::{CompileCommand, ExtensionBuilder};
pub use config::BuildConfig;
pub use plan::{Extension, ExtensionKind, ExtensionPlan, plan_extensions};
pub use setup::{SetupManifest, setup};
pub use toolchain::{DefaultToolchain, Toolchain, ToolchainInfo};
