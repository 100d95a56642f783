// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::confidence_policy::{clamp_unit, HypothesisPolicy};

/// Every belief the engine can hold about a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HypothesisName {
    UploadEnabled,
    FilterBypassed,
    SecurityFilterActive,
    ExtensionValidationActive,
    BlacklistFilter,
    WhitelistFilter,
    WeakExtensionCheck,
    MimeValidation,
    ContentValidation,
    MagicByteCheck,
    SizeLimitEnforced,
    WafMaybe,
    WafPresent,
    NoWaf,
    BypassRequired,
    ApacheServer,
    NginxServer,
    IisServer,
    HtaccessPossible,
    AspnetMaybe,
    PhpEnabled,
    PhpBelow8,
    Php8OrAbove,
    NullByteVulnerable,
    NullByteNotVulnerable,
    StaticFileServing,
    CodeExecutionPossible,
    CodeExecutionImpossible,
    VulnerableServer,
}

impl HypothesisName {
    pub const ALL: &'static [HypothesisName] = &[
        HypothesisName::UploadEnabled,
        HypothesisName::FilterBypassed,
        HypothesisName::SecurityFilterActive,
        HypothesisName::ExtensionValidationActive,
        HypothesisName::BlacklistFilter,
        HypothesisName::WhitelistFilter,
        HypothesisName::WeakExtensionCheck,
        HypothesisName::MimeValidation,
        HypothesisName::ContentValidation,
        HypothesisName::MagicByteCheck,
        HypothesisName::SizeLimitEnforced,
        HypothesisName::WafMaybe,
        HypothesisName::WafPresent,
        HypothesisName::NoWaf,
        HypothesisName::BypassRequired,
        HypothesisName::ApacheServer,
        HypothesisName::NginxServer,
        HypothesisName::IisServer,
        HypothesisName::HtaccessPossible,
        HypothesisName::AspnetMaybe,
        HypothesisName::PhpEnabled,
        HypothesisName::PhpBelow8,
        HypothesisName::Php8OrAbove,
        HypothesisName::NullByteVulnerable,
        HypothesisName::NullByteNotVulnerable,
        HypothesisName::StaticFileServing,
        HypothesisName::CodeExecutionPossible,
        HypothesisName::CodeExecutionImpossible,
        HypothesisName::VulnerableServer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HypothesisName::UploadEnabled => "upload_enabled",
            HypothesisName::FilterBypassed => "filter_bypassed",
            HypothesisName::SecurityFilterActive => "security_filter_active",
            HypothesisName::ExtensionValidationActive => "extension_validation_active",
            HypothesisName::BlacklistFilter => "blacklist_filter",
            HypothesisName::WhitelistFilter => "whitelist_filter",
            HypothesisName::WeakExtensionCheck => "weak_extension_check",
            HypothesisName::MimeValidation => "mime_validation",
            HypothesisName::ContentValidation => "content_validation",
            HypothesisName::MagicByteCheck => "magic_byte_check",
            HypothesisName::SizeLimitEnforced => "size_limit_enforced",
            HypothesisName::WafMaybe => "waf_maybe",
            HypothesisName::WafPresent => "waf_present",
            HypothesisName::NoWaf => "no_waf",
            HypothesisName::BypassRequired => "bypass_required",
            HypothesisName::ApacheServer => "apache_server",
            HypothesisName::NginxServer => "nginx_server",
            HypothesisName::IisServer => "iis_server",
            HypothesisName::HtaccessPossible => "htaccess_possible",
            HypothesisName::AspnetMaybe => "aspnet_maybe",
            HypothesisName::PhpEnabled => "php_enabled",
            HypothesisName::PhpBelow8 => "php_below_8",
            HypothesisName::Php8OrAbove => "php_8_or_above",
            HypothesisName::NullByteVulnerable => "null_byte_vulnerable",
            HypothesisName::NullByteNotVulnerable => "null_byte_not_vulnerable",
            HypothesisName::StaticFileServing => "static_file_serving",
            HypothesisName::CodeExecutionPossible => "code_execution_possible",
            HypothesisName::CodeExecutionImpossible => "code_execution_impossible",
            HypothesisName::VulnerableServer => "vulnerable_server",
        }
    }

    /// Unknown names yield `None`; callers treat them as absent.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|h| h.as_str() == name)
    }
}

impl std::fmt::Display for HypothesisName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, confidence-scored belief about the target.
///
/// Confidence is kept inside [0, 1] by every mutating method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    name: HypothesisName,
    confidence: f64,
    evidence: Vec<String>,
    contradictions: Vec<String>,
    suggested_strategies: Vec<String>,
    last_updated: DateTime<Utc>,
}

impl Hypothesis {
    pub fn new(name: HypothesisName, confidence: f64) -> Self {
        Self {
            name,
            confidence: clamp_unit(confidence),
            evidence: Vec::new(),
            contradictions: Vec::new(),
            suggested_strategies: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    /// Seed evidence without the support boost.
    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        let evidence = evidence.into();
        if !self.evidence.contains(&evidence) {
            self.evidence.push(evidence);
        }
        self
    }

    pub fn name(&self) -> HypothesisName {
        self.name
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn evidence(&self) -> &[String] {
        &self.evidence
    }

    pub fn contradictions(&self) -> &[String] {
        &self.contradictions
    }

    pub fn suggested_strategies(&self) -> &[String] {
        &self.suggested_strategies
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// New supporting evidence raises confidence by the policy's boost;
    /// repeats change nothing.
    pub fn add_evidence(&mut self, evidence: impl Into<String>, policy: &HypothesisPolicy) -> bool {
        let evidence = evidence.into();
        if self.evidence.contains(&evidence) {
            return false;
        }
        self.evidence.push(evidence);
        self.set_confidence(self.confidence + policy.evidence_boost);
        true
    }

    /// New contradicting evidence lowers confidence; repeats change nothing.
    pub fn add_contradiction(
        &mut self,
        contradiction: impl Into<String>,
        policy: &HypothesisPolicy,
    ) -> bool {
        if !self.note_contradiction(contradiction) {
            return false;
        }
        self.set_confidence(self.confidence - policy.contradiction_penalty);
        true
    }

    /// Record a contradiction without touching confidence.
    pub fn note_contradiction(&mut self, contradiction: impl Into<String>) -> bool {
        let contradiction = contradiction.into();
        if self.contradictions.contains(&contradiction) {
            return false;
        }
        self.contradictions.push(contradiction);
        self.last_updated = Utc::now();
        true
    }

    pub fn adjust_confidence(&mut self, delta: f64) {
        self.set_confidence(self.confidence + delta);
    }

    pub fn scale_confidence(&mut self, factor: f64) {
        self.set_confidence(self.confidence * factor);
    }

    /// Raise confidence to at least `floor`.
    pub fn raise_to(&mut self, floor: f64) {
        if floor > self.confidence {
            self.set_confidence(floor);
        }
    }

    pub fn suggest_strategy(&mut self, strategy: &str) {
        if !self.suggested_strategies.iter().any(|s| s == strategy) {
            self.suggested_strategies.push(strategy.to_string());
        }
    }

    fn set_confidence(&mut self, value: f64) {
        self.confidence = clamp_unit(value);
        self.last_updated = Utc::now();
    }

    /// Multi-line human-readable account of this belief.
    pub fn explain(&self) -> String {
        let mut lines = vec![format!("{} (confidence {:.2})", self.name, self.confidence)];
        if !self.evidence.is_empty() {
            lines.push(format!("  evidence: {}", self.evidence.join("; ")));
        }
        if !self.contradictions.is_empty() {
            lines.push(format!("  contradictions: {}", self.contradictions.join("; ")));
        }
        if !self.suggested_strategies.is_empty() {
            lines.push(format!("  suggests: {}", self.suggested_strategies.join(", ")));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::confidence_policy::STANDARD_POLICY;

    const POLICY: &HypothesisPolicy = &STANDARD_POLICY.hypothesis;

    #[test]
    fn test_names_round_trip() {
        for name in HypothesisName::ALL {
            assert_eq!(HypothesisName::parse(name.as_str()), Some(*name));
        }
        assert_eq!(HypothesisName::parse("no_such_belief"), None);
    }

    #[test]
    fn test_evidence_boost_and_dedup() {
        let mut h = Hypothesis::new(HypothesisName::BlacklistFilter, 0.5);
        assert!(h.add_evidence("Observation: EXTENSION_FORCED", POLICY));
        assert!((h.confidence() - 0.6).abs() < 1e-9);
        assert!(!h.add_evidence("Observation: EXTENSION_FORCED", POLICY));
        assert!((h.confidence() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_custom_policy_weights() {
        let policy = HypothesisPolicy {
            evidence_boost: 0.25,
            contradiction_penalty: 0.5,
            ..STANDARD_POLICY.hypothesis
        };
        let mut h = Hypothesis::new(HypothesisName::MimeValidation, 0.5);
        h.add_evidence("Observation: MIME_TYPE_REJECTED", &policy);
        assert!((h.confidence() - 0.75).abs() < 1e-9);
        h.add_contradiction("Contradicted by CONTENT_TYPE_BYPASS_SUCCESS", &policy);
        assert!((h.confidence() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_contradiction_penalty_and_floor() {
        let mut h = Hypothesis::new(HypothesisName::Php8OrAbove, 0.2);
        h.add_contradiction("null byte accepted", POLICY);
        assert!((h.confidence() - 0.05).abs() < 1e-9);
        h.add_contradiction("null byte executed", POLICY);
        assert_eq!(h.confidence(), 0.0);
        assert_eq!(h.contradictions().len(), 2);
    }

    #[test]
    fn test_confidence_stays_in_unit_interval() {
        let mut h = Hypothesis::new(HypothesisName::WafPresent, 1.4);
        assert_eq!(h.confidence(), 1.0);

        // Deterministic walk over every mutator
        let deltas = [0.7, -2.0, 0.33, 5.0, -0.01, -0.9, 0.45];
        for (i, delta) in deltas.iter().cycle().take(200).enumerate() {
            match i % 4 {
                0 => {
                    h.add_evidence(format!("e{}", i), POLICY);
                }
                1 => {
                    h.add_contradiction(format!("c{}", i), POLICY);
                }
                2 => h.adjust_confidence(*delta),
                _ => h.scale_confidence(delta.abs() * 2.0),
            }
            assert!((0.0..=1.0).contains(&h.confidence()), "step {}", i);
        }
    }

    #[test]
    fn test_note_contradiction_keeps_confidence() {
        let mut h = Hypothesis::new(HypothesisName::WhitelistFilter, 0.4);
        h.note_contradiction("Conflicts with blacklist_filter");
        assert_eq!(h.confidence(), 0.4);
        assert!(h.explain().contains("Conflicts with blacklist_filter"));
    }
}
