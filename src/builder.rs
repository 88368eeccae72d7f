//! Extension builder - turns an [`Extension`] into compiler invocations
//!
//! Produces, per extension:
//! - one object per `.cpp` source (host C++ compiler),
//! - one object per `.cu` source (nvcc, with `-gencode` flags from the architecture list),
//! - one `-shared` link step into `build/lib/<package>/<module>.so`.
//!
//! Commands run with the project root as working directory, so every path in them is relative to it.
//! Artifacts carry no interpreter ABI tag in their file name.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use miette::Diagnostic;
use thiserror::Error;
use torchsdf_core::cuda::{self, ArchParseError, CUDA_LIB_DIR, CudaArch, NVCC_RELATIVE_PATH};
use torchsdf_core::package::BUILD_DIR;

use crate::plan::{CXX_ARGS_KEY, Extension, ExtensionKind, NVCC_ARGS_KEY};
use crate::toolchain::ToolchainInfo;

/// Language standard for both host and device code.
const CXX_STANDARD: &str = "-std=c++17";

/// Errors raised while compiling an extension
#[derive(Debug, Error, Diagnostic)]
pub enum BuildError {
    #[error(transparent)]
    #[diagnostic(code(torchsdf::build::arch_list), help("use entries like 7.5, 9.0a, 8.6+PTX or Ampere separated by ';'"))]
    ArchList(#[from] ArchParseError),

    #[error("{extension} has no source files")]
    #[diagnostic(code(torchsdf::build::no_sources), help("add .cpp or .cu files under torchsdf/csrc"))]
    NoSources { extension: String },

    #[error("{extension} needs nvcc but no CUDA toolkit was found")]
    #[diagnostic(code(torchsdf::build::no_cuda_home), help("set CUDA_HOME, or unset FORCE_CUDA"))]
    MissingCudaHome { extension: String },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}\n{stderr}")]
    CommandFailed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A single compiler or linker invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// File the command produces, relative to the project root
    pub output: PathBuf,
}

impl fmt::Display for CompileCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Compiles planned extensions into loadable shared libraries
#[derive(Debug, Clone)]
pub struct ExtensionBuilder {
    /// Working directory for every command
    project_root: PathBuf,
    /// Build directory, relative to the project root
    build_dir: PathBuf,
    cxx: PathBuf,
    cuda_home: Option<PathBuf>,
    arches: Vec<CudaArch>,
    /// Print commands instead of running them
    dry_run: bool,
}

impl ExtensionBuilder {
    /// Create a builder for the toolchain found by the planner.
    ///
    /// ## Errors
    ///
    /// Fails if `arch_list` contains an entry that is neither a capability (`8.6`, `9.0a`, optionally
    /// `+PTX`) nor a named generation (`Ampere`).
    pub fn new(
        project_root: impl AsRef<Path>,
        toolchain: &ToolchainInfo,
        arch_list: Option<&str>,
    ) -> Result<Self, BuildError> {
        let arches = match arch_list {
            Some(list) => cuda::parse_arch_list(list)?,
            None => Vec::new(),
        };
        Ok(Self {
            project_root: project_root.as_ref().to_path_buf(),
            build_dir: PathBuf::from(BUILD_DIR),
            cxx: toolchain.cxx.clone(),
            cuda_home: toolchain.cuda_home.clone(),
            arches,
            dry_run: false,
        })
    }

    /// Only log the commands, do not run them
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Path of the built shared library, relative to the project root
    pub fn artifact_path(&self, ext: &Extension) -> PathBuf {
        let mut path = self.build_dir.join("lib");
        for segment in ext.package_segments() {
            path.push(segment);
        }
        let suffix = if cfg!(windows) { "pyd" } else { "so" };
        path.join(format!("{}.{}", ext.module_stem(), suffix))
    }

    fn object_path(&self, source: &Path) -> PathBuf {
        let mut name = source.as_os_str().to_os_string();
        name.push(".o");
        self.build_dir.join("temp").join(name)
    }

    fn nvcc(&self, ext: &Extension) -> Result<PathBuf, BuildError> {
        self.cuda_home
            .as_ref()
            .map(|home| home.join(NVCC_RELATIVE_PATH))
            .ok_or_else(|| BuildError::MissingCudaHome {
                extension: ext.name.clone(),
            })
    }

    /// Plan every command needed to build `ext`, in execution order.
    ///
    /// An extension without sources is an error; it would link an empty library.
    pub fn commands(&self, ext: &Extension) -> Result<Vec<CompileCommand>, BuildError> {
        if ext.sources.is_empty() {
            return Err(BuildError::NoSources {
                extension: ext.name.clone(),
            });
        }

        let mut defines: Vec<String> = ext
            .define_macros
            .iter()
            .map(|(name, value)| match value {
                Some(value) => format!("-D{name}={value}"),
                None => format!("-D{name}"),
            })
            .collect();
        defines.extend(ext.include_dirs.iter().map(|dir| format!("-I{}", dir.display())));

        let mut commands = Vec::new();
        let mut objects = Vec::new();

        for source in &ext.sources {
            let output = self.object_path(source);
            let is_cuda = source.extension().is_some_and(|e| e == "cu");

            let (program, mut args) = if is_cuda {
                (
                    self.nvcc(ext)?,
                    vec!["-Xcompiler".to_string(), "-fPIC".to_string()],
                )
            } else {
                (self.cxx.clone(), vec!["-fPIC".to_string()])
            };
            args.push(CXX_STANDARD.to_string());
            args.extend(defines.iter().cloned());
            if is_cuda {
                args.extend(cuda::gencode_flags(&self.arches));
                args.extend(ext.compile_args(NVCC_ARGS_KEY).iter().cloned());
            } else {
                args.extend(ext.compile_args(CXX_ARGS_KEY).iter().cloned());
            }
            args.extend([
                "-c".to_string(),
                source.display().to_string(),
                "-o".to_string(),
                output.display().to_string(),
            ]);

            objects.push(output.clone());
            commands.push(CompileCommand { program, args, output });
        }

        let artifact = self.artifact_path(ext);
        let mut link_args = vec!["-shared".to_string()];
        link_args.extend(objects.iter().map(|o| o.display().to_string()));
        if ext.kind == ExtensionKind::Cuda {
            if let Some(home) = &self.cuda_home {
                link_args.push(format!("-L{}", home.join(CUDA_LIB_DIR).display()));
            }
            link_args.push("-lcudart".to_string());
        }
        link_args.extend(["-o".to_string(), artifact.display().to_string()]);
        commands.push(CompileCommand {
            program: self.cxx.clone(),
            args: link_args,
            output: artifact,
        });

        Ok(commands)
    }

    /// Build `ext` and return the artifact path (relative to the project root).
    #[tracing::instrument(skip_all, fields(extension = %ext.name))]
    pub fn build(&self, ext: &Extension) -> Result<PathBuf, BuildError> {
        let commands = self.commands(ext)?;
        for command in &commands {
            if self.dry_run {
                tracing::info!("[dry-run] {}", command);
                continue;
            }
            self.run(command)?;
        }
        commands
            .last()
            .map(|link| link.output.clone())
            .ok_or_else(|| BuildError::Io(io::Error::other("no link step planned")))
    }

    fn run(&self, command: &CompileCommand) -> Result<(), BuildError> {
        if let Some(parent) = command.output.parent() {
            fs::create_dir_all(self.project_root.join(parent))?;
        }
        tracing::debug!("{}", command);

        let program = command.program.display().to_string();
        let output = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&self.project_root)
            .output()
            .map_err(|source| BuildError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(BuildError::CommandFailed {
                program,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn toolchain(cuda_home: Option<&str>) -> ToolchainInfo {
        ToolchainInfo {
            cxx: PathBuf::from("/usr/bin/c++"),
            cuda_home: cuda_home.map(PathBuf::from),
            cuda_available: false,
        }
    }

    fn extension(kind: ExtensionKind, sources: &[&str]) -> Extension {
        let mut extra_compile_args = BTreeMap::new();
        extra_compile_args.insert(CXX_ARGS_KEY.to_string(), vec!["-O3".to_string()]);
        let mut define_macros = Vec::new();
        if kind == ExtensionKind::Cuda {
            extra_compile_args.insert(
                NVCC_ARGS_KEY.to_string(),
                vec!["-O3".to_string(), "-DWITH_CUDA".to_string()],
            );
            define_macros.push(("WITH_CUDA".to_string(), None));
        }
        Extension {
            name: "torchsdf._C".to_string(),
            kind,
            sources: sources.iter().map(PathBuf::from).collect(),
            define_macros,
            extra_compile_args,
            include_dirs: Vec::new(),
        }
    }

    #[test]
    fn test_artifact_has_no_abi_suffix() {
        let builder = ExtensionBuilder::new("/proj", &toolchain(None), None).unwrap();
        let ext = extension(ExtensionKind::Cpp, &[]);
        let artifact = builder.artifact_path(&ext);
        let expected = if cfg!(windows) { "_C.pyd" } else { "_C.so" };
        assert_eq!(artifact, PathBuf::from("build/lib/torchsdf").join(expected));
    }

    #[test]
    fn test_cpp_commands() {
        let builder = ExtensionBuilder::new("/proj", &toolchain(None), None).unwrap();
        let ext = extension(ExtensionKind::Cpp, &["torchsdf/csrc/a.cpp", "torchsdf/csrc/b.cpp"]);
        let commands = builder.commands(&ext).unwrap();

        assert_eq!(commands.len(), 3);
        assert_eq!(commands[0].program, PathBuf::from("/usr/bin/c++"));
        assert_eq!(commands[0].output, PathBuf::from("build/temp/torchsdf/csrc/a.cpp.o"));
        assert!(commands[0].args.contains(&"-O3".to_string()));
        let link = &commands[2];
        assert_eq!(link.args[0], "-shared");
        assert!(!link.args.contains(&"-lcudart".to_string()));
    }

    #[test]
    fn test_cuda_commands_use_nvcc_and_gencode() {
        let builder = ExtensionBuilder::new("/proj", &toolchain(Some("/opt/cuda")), Some("7.5;8.6+PTX")).unwrap();
        let ext = extension(ExtensionKind::Cuda, &["torchsdf/csrc/a.cpp", "torchsdf/csrc/k.cu"]);
        let commands = builder.commands(&ext).unwrap();

        let nvcc = &commands[1];
        assert_eq!(nvcc.program, PathBuf::from("/opt/cuda/bin/nvcc"));
        assert!(nvcc.args.contains(&"-gencode=arch=compute_75,code=sm_75".to_string()));
        assert!(nvcc.args.contains(&"-gencode=arch=compute_86,code=compute_86".to_string()));
        assert!(nvcc.args.contains(&"-DWITH_CUDA".to_string()));

        // Host sources never see gencode flags.
        assert!(!commands[0].args.iter().any(|a| a.starts_with("-gencode")));

        let link = commands.last().unwrap();
        assert!(link.args.contains(&"-L/opt/cuda/lib64".to_string()));
        assert!(link.args.contains(&"-lcudart".to_string()));
    }

    #[test]
    fn test_cuda_source_without_toolkit() {
        let builder = ExtensionBuilder::new("/proj", &toolchain(None), None).unwrap();
        let ext = extension(ExtensionKind::Cuda, &["torchsdf/csrc/k.cu"]);
        assert!(matches!(
            builder.commands(&ext),
            Err(BuildError::MissingCudaHome { .. })
        ));
    }

    #[test]
    fn test_bad_arch_list_rejected() {
        let err = ExtensionBuilder::new("/proj", &toolchain(None), Some("7.5;Hoppers")).unwrap_err();
        assert!(matches!(err, BuildError::ArchList(_)));
    }

    #[test]
    fn test_named_and_suffixed_arches_accepted() {
        let builder =
            ExtensionBuilder::new("/proj", &toolchain(Some("/opt/cuda")), Some("Turing;Ampere+PTX;9.0a")).unwrap();
        let ext = extension(ExtensionKind::Cuda, &["torchsdf/csrc/k.cu"]);
        let nvcc = &builder.commands(&ext).unwrap()[0];
        let gencode: Vec<&str> = nvcc
            .args
            .iter()
            .map(String::as_str)
            .filter(|a| a.starts_with("-gencode"))
            .collect();
        assert_eq!(
            gencode,
            [
                "-gencode=arch=compute_75,code=sm_75",
                "-gencode=arch=compute_75,code=compute_75",
                "-gencode=arch=compute_80,code=sm_80",
                "-gencode=arch=compute_86,code=sm_86",
                "-gencode=arch=compute_86,code=compute_86",
                "-gencode=arch=compute_90a,code=sm_90a",
            ]
        );
    }

    #[test]
    fn test_extension_without_sources_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let builder = ExtensionBuilder::new(dir.path(), &toolchain(None), None).unwrap();
        let ext = extension(ExtensionKind::Cpp, &[]);
        assert!(matches!(builder.commands(&ext), Err(BuildError::NoSources { .. })));
        assert!(matches!(builder.build(&ext), Err(BuildError::NoSources { .. })));
        assert!(!dir.path().join("build").exists());
    }

    #[test]
    fn test_macro_with_value() {
        let builder = ExtensionBuilder::new("/proj", &toolchain(None), None).unwrap();
        let mut ext = extension(ExtensionKind::Cpp, &["torchsdf/csrc/a.cpp"]);
        ext.define_macros.push(("TILE".to_string(), Some("16".to_string())));
        ext.include_dirs.push(PathBuf::from("third_party/eigen"));
        let commands = builder.commands(&ext).unwrap();
        assert!(commands[0].args.contains(&"-DTILE=16".to_string()));
        assert!(commands[0].args.contains(&"-Ithird_party/eigen".to_string()));
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let builder = ExtensionBuilder::new(dir.path(), &toolchain(None), None)
            .unwrap()
            .with_dry_run(true);
        let ext = extension(ExtensionKind::Cpp, &["torchsdf/csrc/a.cpp"]);
        let artifact = builder.build(&ext).unwrap();
        assert_eq!(artifact, builder.artifact_path(&ext));
        assert!(!dir.path().join("build").exists());
    }

    #[test]
    fn test_failing_compiler_reports_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut info = toolchain(None);
        info.cxx = PathBuf::from("/definitely/not/a/compiler");
        let builder = ExtensionBuilder::new(dir.path(), &info, None).unwrap();
        let ext = extension(ExtensionKind::Cpp, &["torchsdf/csrc/a.cpp"]);
        assert!(matches!(builder.build(&ext), Err(BuildError::Spawn { .. })));
    }
}
