#![no_main]

use libfuzzer_sys::fuzz_target;
use torchsdf_core::cuda::{default_arch_list, gencode_flags, parse_arch_list, parse_nvcc_release};

fuzz_target!(|data: &[u8]| {
    // Convert bytes to UTF-8 string (ignore invalid UTF-8)
    if let Ok(s) = std::str::from_utf8(data) {
        // Any parsed release must select a table that parses back
        if let Some(version) = parse_nvcc_release(s) {
            let list = default_arch_list(version);
            assert!(parse_arch_list(&list).is_ok());
        }
        // Arbitrary arch lists either parse or error, never panic
        if let Ok(arches) = parse_arch_list(s) {
            let _ = gencode_flags(&arches);
        }
    }
});
