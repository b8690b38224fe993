//! Configuration validation.

use url::Url;

use crate::error::ConfigError;
use crate::schema::Config;

/// A century.
const MAX_SENSIBLE_RETENTION_DAYS: u32 = 36_500;

/// One finding: the dotted config path it concerns and what is wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub path: String,
    pub message: String,
}

/// Everything a validation pass found. Errors make the config unusable;
/// warnings are reported and otherwise ignored.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: &str, message: impl Into<String>) {
        self.errors.push(Issue {
            path: path.to_string(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: &str, message: impl Into<String>) {
        self.warnings.push(Issue {
            path: path.to_string(),
            message: message.into(),
        });
    }
}

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();
        Self::validate_settings(config, &mut result);
        Self::validate_pipeline(config, &mut result);
        Self::validate_detector(config, &mut result);
        Self::validate_protection(config, &mut result);
        result
    }

    /// [`validate`](Self::validate), failing on the first error.
    pub fn ensure_valid(config: &Config) -> Result<ValidationResult, ConfigError> {
        let result = Self::validate(config);
        match result.errors.first() {
            Some(first) => Err(ConfigError::Invalid {
                field: first.path.clone(),
                message: first.message.clone(),
            }),
            None => Ok(result),
        }
    }

    fn validate_settings(config: &Config, result: &mut ValidationResult) {
        let settings = &config.settings;

        if settings.api_key.trim().is_empty() {
            result.warn(
                "settings.api_key",
                "API key is not set; refactor requests fail until it is configured",
            );
            if settings.enable_auto_refactor {
                result.warn(
                    "settings.enable_auto_refactor",
                    "Auto refactor is enabled but no API key is set",
                );
            }
        }

        if !settings.api_url.trim().is_empty() {
            Self::check_http_url("settings.api_url", &settings.api_url, result);
        }

        if let Some(proxy) = settings.proxy() {
            Self::check_http_url("settings.proxy_url", proxy, result);
        }

        if settings.max_tokens == 0 {
            result.error("settings.max_tokens", "max_tokens must be greater than 0");
        }

        if settings.max_memory_entries == 0 {
            result.warn(
                "settings.max_memory_entries",
                "max_memory_entries is 0; memory history stays empty",
            );
        }

        if settings.memory_retention_days > MAX_SENSIBLE_RETENTION_DAYS {
            result.warn(
                "settings.memory_retention_days",
                format!(
                    "memory_retention_days is {}; history is effectively never pruned by age",
                    settings.memory_retention_days
                ),
            );
        }
    }

    fn validate_pipeline(config: &Config, result: &mut ValidationResult) {
        let pipeline = &config.pipeline;

        if pipeline.max_attempts == 0 {
            result.error("pipeline.max_attempts", "max_attempts must be at least 1");
        }

        if pipeline.max_attempts > 5 {
            result.warn(
                "pipeline.max_attempts",
                "max_attempts above 5 means many model calls per refactor",
            );
        }

        if pipeline.sub_batch_size == 0 {
            result.error("pipeline.sub_batch_size", "sub_batch_size must be greater than 0");
        }

        if pipeline.inject_attempts == 0 {
            result.error("pipeline.inject_attempts", "inject_attempts must be at least 1");
        }

        if pipeline.request_timeout_ms == 0 || pipeline.probe_timeout_ms == 0 {
            result.error("pipeline", "request and probe timeouts must be greater than 0");
        }
    }

    fn validate_detector(config: &Config, result: &mut ValidationResult) {
        let d = &config.detector;
        let ratios = [
            ("detector.text_collapse_ratio", d.text_collapse_ratio),
            ("detector.significant_collapse_ratio", d.significant_collapse_ratio),
            ("detector.warn_text_ratio", d.warn_text_ratio),
            ("detector.warn_visible_ratio", d.warn_visible_ratio),
        ];
        for (path, ratio) in ratios {
            if !(0.0..=1.0).contains(&ratio) {
                result.error(path, format!("ratio must be between 0 and 1, got {ratio}"));
            }
        }

        if d.warnings_required == 0 {
            result.error("detector.warnings_required", "warnings_required must be at least 1");
        }
    }

    fn validate_protection(config: &Config, result: &mut ValidationResult) {
        if config
            .protection
            .protected_substrings
            .iter()
            .any(|s| s.trim().is_empty())
        {
            result.warn(
                "protection.protected_substrings",
                "An empty substring protects every element with an id or class",
            );
        }
    }

    fn check_http_url(path: &str, raw: &str, result: &mut ValidationResult) {
        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => result.error(
                path,
                format!("URL must use http or https, got '{}'", url.scheme()),
            ),
            Err(e) => result.error(path, format!("Invalid URL: {e}")),
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
