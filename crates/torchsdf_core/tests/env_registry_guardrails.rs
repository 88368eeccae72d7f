use std::collections::HashMap;

use torchsdf_core::env::{self, ENV_VARS, EnvVarId};

#[test]
fn env_var_spellings_unique_and_resolvable() {
    let mut seen: HashMap<&'static str, EnvVarId> = HashMap::new();

    for info in ENV_VARS {
        assert_eq!(
            env::from_str(info.name),
            Some(info.id),
            "variable spelling not resolvable: {}",
            info.name
        );
        assert_eq!(env::as_str(info.id), info.name, "as_str mismatch for {:?}", info.id);

        if let Some(prev) = seen.insert(info.name, info.id) {
            panic!("duplicate variable spelling {:?}: {:?} and {:?}", info.name, prev, info.id);
        }
    }
}

#[test]
fn env_var_names_are_shell_safe() {
    for info in ENV_VARS {
        assert!(
            info.name.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'),
            "variable name not shell-safe: {}",
            info.name
        );
        assert!(!info.description.is_empty(), "missing description for {}", info.name);
    }
}

#[test]
fn flag_defaults_are_sentinels_or_off() {
    for id in [EnvVarId::BuildExt, EnvVarId::ForceCuda] {
        let default = env::default_for(id);
        assert!(matches!(default, Some("0") | Some(env::ENABLED)), "{id:?} default {default:?}");
    }
}
