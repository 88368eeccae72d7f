//! Build script for torchsdf-setup.
//!
//! Records the host target triple so the C++ compiler probe can configure `cc` outside of a build script.

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Cargo always sets TARGET for build scripts.
    let target = std::env::var("TARGET").unwrap_or_default();
    println!("cargo:rustc-env=TORCHSDF_SETUP_TARGET={target}");
}
