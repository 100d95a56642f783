// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of one strategy execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyStatus {
    Success,
    Failure,
    Inconclusive,
}

impl StrategyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyStatus::Success => "SUCCESS",
            StrategyStatus::Failure => "FAILURE",
            StrategyStatus::Inconclusive => "INCONCLUSIVE",
        }
    }
}

impl std::fmt::Display for StrategyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Director phases, strictly sequential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    Initialization,
    Baseline,
    Reconnaissance,
    Attack,
    Complete,
}

/// What we currently know we can do against the target.
///
/// Variants are declared weakest first; the derived ordering is the
/// strength order used to keep the state from regressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttackState {
    TargetReady,
    FilterDetected,
    ConfirmedLfi,
    AdvancedExploitation,
    CodeExecution,
    PostExploit,
}

impl AttackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttackState::TargetReady => "TARGET_READY",
            AttackState::FilterDetected => "FILTER_DETECTED",
            AttackState::ConfirmedLfi => "CONFIRMED_LFI",
            AttackState::AdvancedExploitation => "ADVANCED_EXPLOITATION",
            AttackState::CodeExecution => "CODE_EXECUTION",
            AttackState::PostExploit => "POST_EXPLOIT",
        }
    }
}

/// Estimated technology stack of the target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechStack {
    pub web_server: Option<String>,
    pub server_version: Option<String>,
    pub language: Option<String>,
    pub language_version: Option<String>,
    pub framework: Option<String>,
    pub os: Option<String>,
    pub confidence: f64,
    pub detection_sources: Vec<String>,
    #[serde(default)]
    pub raw_headers: BTreeMap<String, String>,
}

impl TechStack {
    pub fn component_count(&self) -> usize {
        [
            self.web_server.is_some(),
            self.language.is_some(),
            self.framework.is_some(),
            self.os.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.component_count() == 0
    }

    /// Major component of the language version, e.g. `7` for `7.4.33`.
    pub fn language_major(&self) -> Option<&str> {
        self.language_version
            .as_deref()
            .and_then(|v| v.split('.').next())
            .filter(|major| !major.is_empty())
    }

    pub fn summary(&self) -> String {
        fn part(name: &Option<String>, version: &Option<String>) -> Option<String> {
            name.as_ref().map(|n| match version {
                Some(v) => format!("{}/{}", n, v),
                None => n.clone(),
            })
        }

        let parts: Vec<String> = [
            part(&self.web_server, &self.server_version),
            part(&self.language, &self.language_version),
            self.framework.clone(),
            self.os.clone(),
        ]
        .into_iter()
        .flatten()
        .collect();

        if parts.is_empty() {
            "unknown".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Detected filtering appliance in front of the upload endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WafProfile {
    pub detected: bool,
    pub vendor: String,
    pub confidence: f64,
    pub signatures: Vec<String>,
    pub bypass_techniques: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilityProfile {
    pub upload_supported: bool,
    pub can_write_files: bool,
    pub can_read_files: bool,
    pub can_execute_code: bool,
    /// Extensions the endpoint accepted, in the order they were seen.
    pub allowed_extensions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterProfile {
    pub extension_forced: bool,
    pub mime_checked: bool,
    pub size_limited: bool,
    pub waf_blocking: bool,
    /// The stored name was cut at an injected null byte.
    pub null_byte_truncation: bool,
}

impl FilterProfile {
    pub fn any_filter_detected(&self) -> bool {
        self.extension_forced || self.mime_checked || self.size_limited || self.waf_blocking
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisSummary {
    pub name: String,
    pub confidence: f64,
}

/// Final result of a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub vulnerabilities_found: bool,
    pub successful_strategy: Option<String>,
    pub secret_extracted: Option<String>,
    pub observations_count: usize,
    pub strategies_tried: usize,
    pub attack_state: AttackState,
    pub tech_stack: Option<String>,
    pub waf_vendor: Option<String>,
    pub top_hypotheses: Vec<HypothesisSummary>,
    pub strategy_results: BTreeMap<String, StrategyStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attack_state_strength_order() {
        assert!(AttackState::TargetReady < AttackState::FilterDetected);
        assert!(AttackState::AdvancedExploitation < AttackState::CodeExecution);
        assert!(AttackState::CodeExecution < AttackState::PostExploit);
    }

    #[test]
    fn test_tech_stack_summary_and_major() {
        let tech = TechStack {
            web_server: Some("Apache".to_string()),
            server_version: Some("2.4.41".to_string()),
            language: Some("PHP".to_string()),
            language_version: Some("7.4.3".to_string()),
            ..Default::default()
        };
        assert_eq!(tech.component_count(), 2);
        assert_eq!(tech.language_major(), Some("7"));
        assert_eq!(tech.summary(), "Apache/2.4.41, PHP/7.4.3");
        assert_eq!(TechStack::default().summary(), "unknown");
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&StrategyStatus::Inconclusive).unwrap();
        assert_eq!(json, "\"INCONCLUSIVE\"");
    }
}
