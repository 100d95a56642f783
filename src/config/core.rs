// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::http_client::MAX_BODY_SIZE;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    #[serde(default)]
    pub http: HttpSettings,

    #[validate(nested)]
    #[serde(default)]
    pub director: DirectorSettings,

    #[validate(nested)]
    #[serde(default)]
    pub payload: PayloadSettings,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HttpSettings {
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub user_agent: Option<String>,

    #[serde(default = "default_false")]
    pub accept_invalid_certs: bool,

    #[validate(range(min = 1024))]
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl HttpSettings {
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Attack loop policy.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DirectorSettings {
    /// Hard cap on strategy executions per scan.
    #[validate(range(min = 1, max = 50))]
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// The loop goes on only while an untried strategy scores at least this.
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_continuation_threshold")]
    pub continuation_threshold: f64,

    /// A failed strategy may be retried once when its score exceeds this.
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_retry_threshold")]
    pub retry_threshold: f64,

    #[validate(nested)]
    #[serde(default = "default_baseline_probe")]
    pub baseline: ProbeSpec,

    #[validate(nested)]
    #[serde(default = "default_recon_probes")]
    pub probes: Vec<ProbeSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ProbeSpec {
    #[validate(length(min = 1))]
    pub filename: String,

    pub content: String,

    #[serde(default)]
    pub content_type: Option<String>,
}

impl ProbeSpec {
    pub fn new(filename: &str, content: &str) -> Self {
        Self {
            filename: filename.to_string(),
            content: content.to_string(),
            content_type: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PayloadSettings {
    #[validate(length(min = 3))]
    #[serde(default = "default_execution_marker")]
    pub execution_marker: String,

    /// File whose content the execution payload prints.
    #[serde(default)]
    pub read_file: Option<String>,

    #[validate(length(min = 1))]
    #[serde(default = "default_upload_dirs")]
    pub upload_dirs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_false")]
    pub log_json: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: None,
            accept_invalid_certs: false,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for DirectorSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            continuation_threshold: default_continuation_threshold(),
            retry_threshold: default_retry_threshold(),
            baseline: default_baseline_probe(),
            probes: default_recon_probes(),
        }
    }
}

impl Default for PayloadSettings {
    fn default() -> Self {
        Self {
            execution_marker: default_execution_marker(),
            read_file: None,
            upload_dirs: default_upload_dirs(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

fn default_false() -> bool {
    false
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_body_bytes() -> usize {
    MAX_BODY_SIZE
}

fn default_max_attempts() -> usize {
    5
}

fn default_continuation_threshold() -> f64 {
    0.4
}

fn default_retry_threshold() -> f64 {
    0.9
}

fn default_baseline_probe() -> ProbeSpec {
    ProbeSpec {
        filename: "baseline.jpg".to_string(),
        content: "FAKE_JPEG_DATA".to_string(),
        content_type: Some("image/jpeg".to_string()),
    }
}

fn default_recon_probes() -> Vec<ProbeSpec> {
    vec![
        ProbeSpec::new("test.php", "<?php echo 'TEST'; ?>"),
        ProbeSpec::new("test.jsp", "<% out.println('TEST'); %>"),
    ]
}

fn default_execution_marker() -> String {
    "EXEC_OK".to_string()
}

fn default_upload_dirs() -> Vec<String> {
    vec![
        "/files/avatars/".to_string(),
        "/uploads/".to_string(),
        "/files/uploads/".to_string(),
    ]
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.director.max_attempts, 5);
        assert_eq!(config.director.probes.len(), 2);
        assert_eq!(config.director.baseline.filename, "baseline.jpg");
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let mut config = AppConfig::default();
        config.director.continuation_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = AppConfig::default();
        config.director.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
