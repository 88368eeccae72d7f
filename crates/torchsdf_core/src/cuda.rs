//! CUDA vocabulary: macros, nvcc release parsing, and target architecture tables.
//!
//! ## Notes
//!
//! - Architecture lists use the `TORCH_CUDA_ARCH_LIST` syntax: compute capabilities `X.Y`, optionally
//!   suffixed with `+PTX`, separated by `;` or whitespace.

use std::fmt;

/// Preprocessor macros defined for every accelerator-mode build (no values).
pub const CUDA_MACROS: &[&str] = &["WITH_CUDA", "THRUST_IGNORE_CUB_VERSION_CHECK"];

/// Optimization flag shared by the host and device compilers.
pub const OPT_FLAG: &str = "-O3";

/// Toolkit location probed when no home directory is configured or discovered.
pub const DEFAULT_CUDA_HOME: &str = "/usr/local/cuda";

/// Compiler driver path relative to the toolkit home.
pub const NVCC_RELATIVE_PATH: &str = "bin/nvcc";

/// Runtime library directory relative to the toolkit home.
pub const CUDA_LIB_DIR: &str = "lib64";

/// Architectures every fallback table starts with.
const BASE_ARCHES: &str = "6.0;6.1;6.2;7.0;7.5";

/// Toolkit version as reported by the `release X.Y` token of `nvcc -V`.
///
/// `minor` is the first digit of the minor component only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CudaVersion {
    pub major: u32,
    pub minor: u32,
}

/// Extract the toolkit version from an `nvcc -V` banner.
///
/// ## Returns
/// - `Some(version)` when a `release` token is followed by `MAJOR.MINOR` (a trailing comma is ignored).
/// - `None` when the token is missing or malformed (including `MAJOR.MINOR.PATCH`).
///
/// ## Examples
/// ```rust
/// use torchsdf_core::cuda::{CudaVersion, parse_nvcc_release};
///
/// let banner = "Cuda compilation tools, release 11.8, V11.8.89";
/// assert_eq!(parse_nvcc_release(banner), Some(CudaVersion { major: 11, minor: 8 }));
/// ```
pub fn parse_nvcc_release(banner: &str) -> Option<CudaVersion> {
    let mut tokens = banner.split_whitespace();
    tokens.find(|t| *t == "release")?;
    let release = tokens.next()?.trim_end_matches(',');

    let (major, minor) = release.split_once('.')?;
    if minor.contains('.') {
        return None;
    }
    let major = major.parse().ok()?;
    let minor = minor.chars().next()?.to_digit(10)?;
    Some(CudaVersion { major, minor })
}

/// Select the architecture list used when cross-compiling without a visible GPU.
///
/// - CUDA 11.0 adds `8.0`.
/// - Later CUDA 11 releases add `8.0;8.6`.
/// - Every other major version gets the base table only.
pub fn default_arch_list(version: CudaVersion) -> String {
    match version {
        CudaVersion { major: 11, minor: 0 } => format!("{BASE_ARCHES};8.0"),
        CudaVersion { major: 11, .. } => format!("{BASE_ARCHES};8.0;8.6"),
        _ => BASE_ARCHES.to_string(),
    }
}

/// Named GPU generations and the capabilities they stand for, as PyTorch expands them.
pub const NAMED_ARCHES: &[(&str, &str)] = &[
    ("Kepler+Tesla", "3.7"),
    ("Kepler", "3.5+PTX"),
    ("Maxwell+Tegra", "5.3"),
    ("Maxwell", "5.0;5.2+PTX"),
    ("Pascal", "6.0;6.1+PTX"),
    ("Volta+Tegra", "7.2"),
    ("Volta", "7.0+PTX"),
    ("Turing", "7.5+PTX"),
    ("Ampere+Tegra", "8.7"),
    ("Ampere", "8.0;8.6+PTX"),
    ("Ada", "8.9+PTX"),
    ("Hopper", "9.0+PTX"),
];

/// One entry of an architecture list, e.g. `8.6+PTX` or `9.0a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CudaArch {
    pub major: u32,
    pub minor: u32,
    /// Feature-set suffix (`a` in `9.0a`, `f` in `10.0f`).
    pub suffix: Option<char>,
    /// Also embed PTX for forward compatibility.
    pub ptx: bool,
}

impl CudaArch {
    /// Numeric compute capability, e.g. `86` for `8.6`.
    pub fn capability(&self) -> u32 {
        self.major * 10 + self.minor
    }

    /// Capability as spelled in `sm_`/`compute_` targets, e.g. `86` or `90a`.
    pub fn target(&self) -> String {
        match self.suffix {
            Some(suffix) => format!("{}{}", self.capability(), suffix),
            None => self.capability().to_string(),
        }
    }
}

impl fmt::Display for CudaArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if let Some(suffix) = self.suffix {
            write!(f, "{suffix}")?;
        }
        if self.ptx {
            write!(f, "+PTX")?;
        }
        Ok(())
    }
}

/// Error for an architecture list entry that is neither a capability nor a named generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchParseError {
    pub entry: String,
}

impl fmt::Display for ArchParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid CUDA architecture '{}' (expected e.g. 7.5, 9.0a, 8.6+PTX or Ampere)",
            self.entry
        )
    }
}

impl std::error::Error for ArchParseError {}

/// Parse an architecture list.
///
/// Named generations expand to their capabilities; `Name+PTX` embeds PTX for the last one. Empty entries
/// are skipped, so `""` parses to an empty list. Duplicates are dropped, keeping the first occurrence.
pub fn parse_arch_list(list: &str) -> Result<Vec<CudaArch>, ArchParseError> {
    let mut arches = Vec::new();
    for entry in list.split(|c: char| c == ';' || c.is_whitespace()) {
        if entry.is_empty() {
            continue;
        }
        for arch in parse_entry(entry)? {
            if !arches.contains(&arch) {
                arches.push(arch);
            }
        }
    }
    Ok(arches)
}

fn parse_entry(entry: &str) -> Result<Vec<CudaArch>, ArchParseError> {
    if let Some(expansion) = named_arch(entry) {
        return expand_named(expansion, false);
    }
    if let Some(expansion) = entry.strip_suffix("+PTX").and_then(named_arch) {
        return expand_named(expansion, true);
    }
    parse_arch(entry).map(|arch| vec![arch])
}

fn named_arch(name: &str) -> Option<&'static str> {
    NAMED_ARCHES
        .iter()
        .find(|(named, _)| *named == name)
        .map(|(_, expansion)| *expansion)
}

fn expand_named(expansion: &str, ptx: bool) -> Result<Vec<CudaArch>, ArchParseError> {
    let mut arches = expansion.split(';').map(parse_arch).collect::<Result<Vec<_>, _>>()?;
    if let Some(last) = arches.last_mut() {
        last.ptx |= ptx;
    }
    Ok(arches)
}

fn parse_arch(entry: &str) -> Result<CudaArch, ArchParseError> {
    let err = || ArchParseError {
        entry: entry.to_string(),
    };
    let (number, ptx) = match entry.strip_suffix("+PTX") {
        Some(number) => (number, true),
        None => (entry, false),
    };
    let (number, suffix) = match number.chars().last() {
        Some(c) if c.is_ascii_lowercase() => (&number[..number.len() - 1], Some(c)),
        _ => (number, None),
    };
    let (major, minor) = number.split_once('.').ok_or_else(err)?;
    if !major.bytes().all(|b| b.is_ascii_digit()) || !minor.bytes().all(|b| b.is_ascii_digit()) {
        return Err(err());
    }
    let major: u32 = major.parse().map_err(|_| err())?;
    let minor: u32 = minor.parse().map_err(|_| err())?;
    if major > 99 || minor > 9 {
        return Err(err());
    }
    Ok(CudaArch {
        major,
        minor,
        suffix,
        ptx,
    })
}

/// Render nvcc `-gencode` flags for an architecture list.
///
/// Each arch yields SASS for its target; `+PTX` entries additionally embed PTX.
pub fn gencode_flags(arches: &[CudaArch]) -> Vec<String> {
    let mut flags = Vec::new();
    for arch in arches {
        let target = arch.target();
        flags.push(format!("-gencode=arch=compute_{target},code=sm_{target}"));
        if arch.ptx {
            flags.push(format!("-gencode=arch=compute_{target},code=compute_{target}"));
        }
    }
    flags
}
