// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analysis::confidence_policy::{LevelPolicy, STANDARD_POLICY};

/// Kind of evidence extracted from a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObservationType {
    BaselineEstablished,
    UploadSuccess,
    UploadRejected,
    ExtensionForced,
    MimeTypeRejected,
    SizeLimitExceeded,
    FilterDetected,
    WafDetected,
    TechStackDetected,
    StructuralChange,
    FileReadConfirmed,
    CodeExecutionDetected,
    NullByteRemoved,
    NullByteSuccess,
    DoubleExtensionSuccess,
    CaseManipulationSuccess,
    MagicBytesSuccess,
    ContentTypeBypassSuccess,
    HtaccessOverrideSuccess,
}

impl ObservationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationType::BaselineEstablished => "BASELINE_ESTABLISHED",
            ObservationType::UploadSuccess => "UPLOAD_SUCCESS",
            ObservationType::UploadRejected => "UPLOAD_REJECTED",
            ObservationType::ExtensionForced => "EXTENSION_FORCED",
            ObservationType::MimeTypeRejected => "MIME_TYPE_REJECTED",
            ObservationType::SizeLimitExceeded => "SIZE_LIMIT_EXCEEDED",
            ObservationType::FilterDetected => "FILTER_DETECTED",
            ObservationType::WafDetected => "WAF_DETECTED",
            ObservationType::TechStackDetected => "TECH_STACK_DETECTED",
            ObservationType::StructuralChange => "STRUCTURAL_CHANGE",
            ObservationType::FileReadConfirmed => "FILE_READ_CONFIRMED",
            ObservationType::CodeExecutionDetected => "CODE_EXECUTION_DETECTED",
            ObservationType::NullByteRemoved => "NULL_BYTE_REMOVED",
            ObservationType::NullByteSuccess => "NULL_BYTE_SUCCESS",
            ObservationType::DoubleExtensionSuccess => "DOUBLE_EXTENSION_SUCCESS",
            ObservationType::CaseManipulationSuccess => "CASE_MANIPULATION_SUCCESS",
            ObservationType::MagicBytesSuccess => "MAGIC_BYTES_SUCCESS",
            ObservationType::ContentTypeBypassSuccess => "CONTENT_TYPE_BYPASS_SUCCESS",
            ObservationType::HtaccessOverrideSuccess => "HTACCESS_OVERRIDE_SUCCESS",
        }
    }

    /// Whether this observation proves the target is exploitable.
    pub fn is_security_critical(&self) -> bool {
        matches!(
            self,
            ObservationType::CodeExecutionDetected
                | ObservationType::FileReadConfirmed
                | ObservationType::NullByteSuccess
                | ObservationType::DoubleExtensionSuccess
                | ObservationType::CaseManipulationSuccess
                | ObservationType::MagicBytesSuccess
                | ObservationType::ContentTypeBypassSuccess
                | ObservationType::HtaccessOverrideSuccess
        )
    }

    pub fn is_bypass_success(&self) -> bool {
        self.is_security_critical()
            && !matches!(
                self,
                ObservationType::CodeExecutionDetected | ObservationType::FileReadConfirmed
            )
    }
}

impl std::fmt::Display for ObservationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn score(&self) -> f64 {
        self.score_with(&STANDARD_POLICY.levels)
    }

    pub fn score_with(&self, levels: &LevelPolicy) -> f64 {
        match self {
            ConfidenceLevel::Low => levels.low_score,
            ConfidenceLevel::Medium => levels.medium_score,
            ConfidenceLevel::High => levels.high_score,
        }
    }

    /// Bucket a raw confidence: >= 0.8 HIGH, >= 0.5 MEDIUM, otherwise LOW.
    pub fn from_score(value: f64) -> Self {
        Self::from_score_with(value, &STANDARD_POLICY.levels)
    }

    pub fn from_score_with(value: f64, levels: &LevelPolicy) -> Self {
        if value >= levels.high_threshold {
            ConfidenceLevel::High
        } else if value >= levels.medium_threshold {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "LOW",
            ConfidenceLevel::Medium => "MEDIUM",
            ConfidenceLevel::High => "HIGH",
        }
    }
}

/// One piece of evidence extracted from one response.
///
/// Type and confidence level are fixed at creation; only the Observer
/// creates observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    observation_type: ObservationType,
    confidence: ConfidenceLevel,
    evidence: Vec<String>,
    pub uploaded_filename: Option<String>,
    pub stored_filename: Option<String>,
    pub file_url: Option<String>,
    pub execution_confirmed: bool,
    pub metadata: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl Observation {
    pub(crate) fn new(observation_type: ObservationType, confidence: ConfidenceLevel) -> Self {
        Self {
            observation_type,
            confidence,
            evidence: Vec::new(),
            uploaded_filename: None,
            stored_filename: None,
            file_url: None,
            execution_confirmed: false,
            metadata: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub(crate) fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.add_evidence(evidence);
        self
    }

    pub(crate) fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn observation_type(&self) -> ObservationType {
        self.observation_type
    }

    pub fn confidence(&self) -> ConfidenceLevel {
        self.confidence
    }

    pub fn confidence_score(&self) -> f64 {
        self.confidence.score()
    }

    pub fn evidence(&self) -> &[String] {
        &self.evidence
    }

    /// Append evidence unless the same text is already recorded.
    pub fn add_evidence(&mut self, evidence: impl Into<String>) {
        let evidence = evidence.into();
        if !self.evidence.contains(&evidence) {
            self.evidence.push(evidence);
        }
    }

    pub fn is_security_critical(&self) -> bool {
        self.observation_type.is_security_critical()
    }
}

impl std::fmt::Display for Observation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.observation_type, self.confidence.as_str())?;
        if let Some(first) = self.evidence.first() {
            write!(f, ": {}", first)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_buckets() {
        assert_eq!(ConfidenceLevel::from_score(0.9), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.8), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.79), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.5), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.49), ConfidenceLevel::Low);
    }

    #[test]
    fn test_level_scores() {
        assert_eq!(ConfidenceLevel::Low.score(), 0.3);
        assert_eq!(ConfidenceLevel::Medium.score(), 0.6);
        assert_eq!(ConfidenceLevel::High.score(), 0.9);
    }

    #[test]
    fn test_evidence_dedup() {
        let mut obs = Observation::new(ObservationType::UploadRejected, ConfidenceLevel::High)
            .with_evidence("HTTP 403");
        obs.add_evidence("HTTP 403");
        obs.add_evidence("Error pattern matched: extension_blocked");
        assert_eq!(obs.evidence().len(), 2);
    }

    #[test]
    fn test_security_critical_types() {
        assert!(ObservationType::CodeExecutionDetected.is_security_critical());
        assert!(ObservationType::NullByteSuccess.is_bypass_success());
        assert!(!ObservationType::CodeExecutionDetected.is_bypass_success());
        assert!(!ObservationType::UploadSuccess.is_security_critical());
    }
}
