//! TOML loading with `${VAR}` substitution.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::ConfigError;
use crate::schema::Config;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid"));

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::load_str(&content)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::NotFound(_)) => Ok(Config::default()),
            other => other,
        }
    }

    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        let substituted = substitute_env(content)?;
        Ok(toml::from_str(&substituted)?)
    }

    /// `~/.webrefactor` → `/home/<user>/.webrefactor`.
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).into_owned()
    }
}

/// Replace every `${VAR}` with its value. The first unset variable is an
/// error.
fn substitute_env(content: &str) -> Result<String, ConfigError> {
    let mut missing = None;
    let out = PLACEHOLDER.replace_all(content, |caps: &Captures<'_>| {
        match std::env::var(&caps[1]) {
            Ok(value) => value,
            Err(_) => {
                missing.get_or_insert_with(|| caps[1].to_string());
                String::new()
            }
        }
    });
    match missing {
        Some(name) => Err(ConfigError::UnsetVariable(name)),
        None => Ok(out.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ProviderKind;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = ConfigLoader::load_str("").unwrap();
        assert_eq!(config.pipeline.max_attempts, 2);
        assert_eq!(config.settings.max_tokens, 2000);
        assert!(!config.settings.enable_auto_refactor);
    }

    #[test]
    fn test_settings_accept_both_key_styles() {
        let snake = ConfigLoader::load_str(
            r#"
            [settings]
            provider = "anthropic"
            api_key = "sk-test"
            enable_auto_refactor = true
            "#,
        )
        .unwrap();
        assert_eq!(snake.settings.provider, ProviderKind::Anthropic);
        assert!(snake.settings.enable_auto_refactor);

        let camel = ConfigLoader::load_str(
            r#"
            [settings]
            apiKey = "sk-camel"
            maxMemoryEntries = 7
            "#,
        )
        .unwrap();
        assert_eq!(camel.settings.api_key, "sk-camel");
        assert_eq!(camel.settings.max_memory_entries, 7);
    }

    #[test]
    fn test_partial_detector_section_keeps_other_defaults() {
        let config = ConfigLoader::load_str("[detector]\ntext_collapse_min_before = 1000\n").unwrap();
        assert_eq!(config.detector.text_collapse_min_before, 1000);
        assert_eq!(config.detector.warnings_required, 3);
    }

    #[test]
    fn test_load_file_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("webrefactor.toml");
        std::fs::write(&path, "[pipeline]\nsub_batch_size = 5\n").unwrap();
        assert_eq!(ConfigLoader::load(&path).unwrap().pipeline.sub_batch_size, 5);

        let missing = dir.path().join("absent.toml");
        assert!(matches!(ConfigLoader::load(&missing), Err(ConfigError::NotFound(p)) if p == missing));
        assert_eq!(ConfigLoader::load_or_default(&missing).unwrap().pipeline.max_attempts, 2);
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            ConfigLoader::load_str("max_attempts = [2"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_placeholder_substitution() {
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("WEBREFACTOR_LOADER_KEY", "from-env") };
        let config = ConfigLoader::load_str("[settings]\napi_key = \"${WEBREFACTOR_LOADER_KEY}\"").unwrap();
        assert_eq!(config.settings.api_key, "from-env");
        unsafe { std::env::remove_var("WEBREFACTOR_LOADER_KEY") };
    }

    #[test]
    fn test_unset_placeholder_is_reported() {
        let err = substitute_env("a = \"${WEBREFACTOR_UNSET_1}\"\nb = \"${WEBREFACTOR_UNSET_2}\"").unwrap_err();
        assert!(matches!(err, ConfigError::UnsetVariable(name) if name == "WEBREFACTOR_UNSET_1"));
    }

    #[test]
    fn test_tilde_is_expanded() {
        let expanded = ConfigLoader::expand_path("~/webrefactor");
        assert!(!expanded.starts_with('~'));
        assert!(expanded.ends_with("/webrefactor"));
    }
}
