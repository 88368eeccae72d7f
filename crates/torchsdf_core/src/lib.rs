//! Provide the canonical build vocabulary and pure helpers for the torchsdf build orchestrator.
//!
//! This crate is intentionally small and dependency-free. It holds the spellings and tables that both the
//! orchestrator and its tests agree on:
//! - package constants (name, license, version file locations, source globs),
//! - the environment variable registry (names, defaults, sentinels),
//! - CUDA helpers (nvcc release banner parsing, default architecture table, `-gencode` rendering).
//!
//! ## Notes
//!
//! - **No IO**, no global state, no process spawning. Callers read the environment and the file system and
//!   pass plain values in.

pub mod cuda;
pub mod env;
pub mod package;

pub use cuda::{CudaVersion, default_arch_list, parse_nvcc_release};
pub use env::EnvVarId;
