// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Upload Intelligence Error Types
 * Typed errors for transport, configuration and rule tables
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use std::time::Duration;
use thiserror::Error;

/// Top-level error for a scan run.
///
/// A scan itself always finishes with a `ScanResult`; this type surfaces
/// from setup (config, client construction, authentication) and from
/// external interruption.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Rule table error: {0}")]
    RuleTable(#[from] RuleTableError),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Scan interrupted")]
    Interrupted,
}

/// Failures of the HTTP collaborator.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("Connection refused for {url}")]
    ConnectionRefused { url: String },

    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },
}

impl TransportError {
    /// Classify a reqwest failure against the URL it was issued for.
    pub fn from_reqwest(err: reqwest::Error, url: &str, timeout: Duration) -> Self {
        let url = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| url.to_string());

        if err.is_timeout() {
            TransportError::Timeout { url, timeout }
        } else if err.is_connect() {
            TransportError::ConnectionRefused { url }
        } else {
            TransportError::Request {
                url,
                reason: err.to_string(),
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Unsupported config file format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to parse {format} config: {reason}")]
    Parse { format: &'static str, reason: String },

    #[error("Invalid value for {var}: {value}")]
    InvalidOverride { var: String, value: String },

    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Raised when a built-in rule table violates its own invariants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleTableError {
    #[error("Confidence {value} for {hypothesis} in {table} is outside [0, 1]")]
    ConfidenceOutOfRange {
        table: &'static str,
        hypothesis: String,
        value: f64,
    },

    #[error("Conflict between {left} and {right} is not declared symmetrically")]
    AsymmetricConflict { left: String, right: String },

    #[error("Hypothesis {0} is declared to conflict with itself")]
    SelfConflict(String),
}

