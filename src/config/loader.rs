// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use std::path::{Path, PathBuf};
use tracing::debug;
use validator::Validate;

use super::core::AppConfig;
use crate::errors::ConfigError;

pub struct ConfigLoader {
    config_path: PathBuf,
    format: ConfigFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}

impl ConfigFormat {
    fn label(self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "YAML",
            ConfigFormat::Toml => "TOML",
            ConfigFormat::Json => "JSON",
        }
    }
}

impl ConfigLoader {
    pub fn new<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let path = config_path.as_ref().to_path_buf();
        let format = Self::detect_format(&path)?;

        Ok(Self {
            config_path: path,
            format,
        })
    }

    fn detect_format(path: &Path) -> Result<ConfigFormat, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;

        match extension {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "toml" => Ok(ConfigFormat::Toml),
            "json" => Ok(ConfigFormat::Json),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn load_config(&self) -> Result<AppConfig, ConfigError> {
        let content =
            std::fs::read_to_string(&self.config_path).map_err(|e| ConfigError::Read {
                path: self.config_path.display().to_string(),
                reason: e.to_string(),
            })?;

        let mut config = self.parse(&content)?;
        apply_env_overrides(&mut config)?;
        validate(&config)?;

        debug!("Loaded configuration from {:?}", self.config_path);
        Ok(config)
    }

    fn parse(&self, content: &str) -> Result<AppConfig, ConfigError> {
        let parse_error = |reason: String| ConfigError::Parse {
            format: self.format.label(),
            reason,
        };

        match self.format {
            ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string())),
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| parse_error(e.to_string())),
        }
    }
}

/// Load from `path` when given, otherwise start from defaults. Environment
/// overrides and validation apply in both cases.
pub fn load_config_with_overrides(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => ConfigLoader::new(path)?.load_config(),
        None => {
            let mut config = AppConfig::default();
            apply_env_overrides(&mut config)?;
            validate(&config)?;
            Ok(config)
        }
    }
}

fn apply_env_overrides(config: &mut AppConfig) -> Result<(), ConfigError> {
    if let Ok(value) = std::env::var("UPLOAD_INTEL_MAX_ATTEMPTS") {
        config.director.max_attempts = parse_override("UPLOAD_INTEL_MAX_ATTEMPTS", &value)?;
    }

    if let Ok(value) = std::env::var("UPLOAD_INTEL_TIMEOUT_SECS") {
        config.http.timeout_secs = parse_override("UPLOAD_INTEL_TIMEOUT_SECS", &value)?;
    }

    if let Ok(log_level) = std::env::var("UPLOAD_INTEL_LOG_LEVEL") {
        config.observability.log_level = log_level;
    }

    if let Ok(path) = std::env::var("UPLOAD_INTEL_READ_FILE") {
        config.payload.read_file = Some(path);
    }

    Ok(())
}

fn parse_override<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidOverride {
        var: var.to_string(),
        value: value.to_string(),
    })
}

fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    config
        .validate()
        .map_err(|e| ConfigError::Validation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(
            ConfigLoader::detect_format(Path::new("scan.yml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigLoader::detect_format(Path::new("scan.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert!(ConfigLoader::detect_format(Path::new("scan.ini")).is_err());
    }

    #[test]
    fn test_load_yaml_partial_config() {
        let file = write_config(
            ".yaml",
            "director:\n  max_attempts: 3\n  continuation_threshold: 0.5\npayload:\n  read_file: /home/carlos/secret\n",
        );
        let config = ConfigLoader::new(file.path()).unwrap().load_config().unwrap();
        assert_eq!(config.director.max_attempts, 3);
        assert_eq!(config.director.retry_threshold, 0.9);
        assert_eq!(config.payload.read_file.as_deref(), Some("/home/carlos/secret"));
        assert_eq!(config.director.probes.len(), 2);
    }

    #[test]
    fn test_load_toml_config() {
        let file = write_config(
            ".toml",
            "[http]\ntimeout_secs = 20\n\n[[director.probes]]\nfilename = \"probe.phtml\"\ncontent = \"<?php echo 1; ?>\"\n",
        );
        let config = ConfigLoader::new(file.path()).unwrap().load_config().unwrap();
        assert_eq!(config.http.timeout_secs, 20);
        assert_eq!(config.director.probes.len(), 1);
        assert_eq!(config.director.probes[0].filename, "probe.phtml");
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let file = write_config(".json", r#"{"director": {"max_attempts": 0}}"#);
        let err = ConfigLoader::new(file.path()).unwrap().load_config().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let file = write_config(".json", "{ not json");
        let err = ConfigLoader::new(file.path()).unwrap().load_config().unwrap_err();
        assert!(matches!(err, ConfigError::Parse { format: "JSON", .. }));
    }
}
