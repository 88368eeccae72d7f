//! Golden snapshot tests for rendered build artifacts
//!
//! These render the setup manifest and the compiler command lines and compare
//! them against stored snapshots, so changes to either are reviewed and intentional.
//!
//! Review changes: `cargo insta review`

use std::fs;
use std::path::{Path, PathBuf};

use torchsdf_setup::plan::ExtensionPlan;
use torchsdf_setup::setup::SetupManifest;
use torchsdf_setup::toolchain::{Toolchain, ToolchainError, ToolchainInfo};
use torchsdf_setup::{BuildConfig, ExtensionBuilder, plan_extensions};

/// Toolchain with fixed paths and a visible GPU.
struct GpuHost;

impl Toolchain for GpuHost {
    fn probe(&self) -> Result<ToolchainInfo, ToolchainError> {
        Ok(ToolchainInfo {
            cxx: PathBuf::from("/usr/bin/c++"),
            cuda_home: Some(PathBuf::from("/usr/local/cuda")),
            cuda_available: true,
        })
    }

    fn nvcc_version(&self, _cuda_home: &Path) -> Result<String, ToolchainError> {
        Ok("Cuda compilation tools, release 12.1, V12.1.105".to_string())
    }
}

#[test]
fn test_pure_manifest_json() {
    let manifest = SetupManifest::new("1.2.3", &ExtensionPlan::pure());
    insta::assert_snapshot!(manifest.to_json().unwrap(), @r#"
    {
      "name": "torchsdf",
      "version": "1.2.3",
      "license": "Apache-2.0",
      "zip_safe": false,
      "ext_modules": [],
      "cmdclass": {},
      "cuda_arch_list": null,
      "artifacts": []
    }
    "#);
}

#[cfg(unix)]
#[test]
fn test_cuda_compile_commands() {
    let dir = tempfile::tempdir().unwrap();
    let csrc = dir.path().join("torchsdf/csrc");
    fs::create_dir_all(csrc.join("ops")).unwrap();
    fs::write(csrc.join("bindings.cpp"), "").unwrap();
    fs::write(csrc.join("ops/sdf_kernel.cu"), "").unwrap();

    let config = BuildConfig::new()
        .with_project_root(dir.path())
        .with_cuda_arch_list("7.5;8.6+PTX");
    let plan = plan_extensions(&config, &GpuHost).unwrap();
    let toolchain = plan.toolchain.as_ref().unwrap();
    let builder = ExtensionBuilder::new(dir.path(), toolchain, plan.cuda_arch_list.as_deref()).unwrap();

    let rendered: Vec<String> = builder
        .commands(&plan.extensions[0])
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();

    insta::assert_snapshot!(rendered.join("\n"), @r"
    /usr/bin/c++ -fPIC -std=c++17 -DWITH_CUDA -DTHRUST_IGNORE_CUB_VERSION_CHECK -O3 -c torchsdf/csrc/bindings.cpp -o build/temp/torchsdf/csrc/bindings.cpp.o
    /usr/local/cuda/bin/nvcc -Xcompiler -fPIC -std=c++17 -DWITH_CUDA -DTHRUST_IGNORE_CUB_VERSION_CHECK -gencode=arch=compute_75,code=sm_75 -gencode=arch=compute_86,code=sm_86 -gencode=arch=compute_86,code=compute_86 -O3 -DWITH_CUDA -DTHRUST_IGNORE_CUB_VERSION_CHECK -c torchsdf/csrc/ops/sdf_kernel.cu -o build/temp/torchsdf/csrc/ops/sdf_kernel.cu.o
    /usr/bin/c++ -shared build/temp/torchsdf/csrc/bindings.cpp.o build/temp/torchsdf/csrc/ops/sdf_kernel.cu.o -L/usr/local/cuda/lib64 -lcudart -o build/lib/torchsdf/_C.so
    ");
}
