// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Every numeric confidence constant the pipeline uses, in one table.
//!
//! Components hold a copy of [`ConfidencePolicy`] (the standard one unless a
//! caller swaps it), so tuning happens here and nowhere else.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidencePolicy {
    pub hypothesis: HypothesisPolicy,
    pub levels: LevelPolicy,
    pub fingerprint: FingerprintPolicy,
    pub blocking: BlockingPolicy,
    pub ranking: RankingPolicy,
}

/// Belief updates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HypothesisPolicy {
    /// Added per new supporting evidence item.
    pub evidence_boost: f64,
    /// Subtracted per new contradiction.
    pub contradiction_penalty: f64,
    /// Multiplier applied to the losing side of a conflict.
    pub conflict_decay: f64,
    /// `bypass_required` relative to the WAF confidence.
    pub waf_bypass_factor: f64,
    /// Strategy factor for techniques a tech rule favours.
    pub tech_boost_factor: f64,
    /// Strategy factor for techniques a tech rule rules out.
    pub tech_penalty_factor: f64,
    pub confirmed_threshold: f64,
    pub rejected_threshold: f64,
}

/// Scores behind the LOW / MEDIUM / HIGH buckets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelPolicy {
    pub low_score: f64,
    pub medium_score: f64,
    pub high_score: f64,
    /// Raw confidences at or above this bucket as MEDIUM.
    pub medium_threshold: f64,
    /// Raw confidences at or above this bucket as HIGH.
    pub high_threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FingerprintPolicy {
    pub server_weight: f64,
    pub server_version_bonus: f64,
    pub language_weight: f64,
    pub language_version_bonus: f64,
    pub framework_weight: f64,
    pub os_weight: f64,
    pub multi_component_boost: f64,
    pub multi_component_min: usize,
    /// A fingerprint is written to the context only above this.
    pub acceptance_threshold: f64,
}

/// Baseline-diff blocking detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockingPolicy {
    pub status_rejection_weight: f64,
    pub length_delta_ratio: f64,
    pub length_delta_weight: f64,
    pub error_pattern_factor: f64,
    pub waf_weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingPolicy {
    pub hypothesis_weight: f64,
    pub tech_weight: f64,
    pub history_weight: f64,
    pub base_weight: f64,

    pub hypothesis_neutral: f64,
    pub hypothesis_absent: f64,
    pub corroboration_bonus: f64,

    pub tech_neutral: f64,
    pub language_match: f64,
    pub language_mismatch: f64,
    pub version_satisfied: f64,
    pub version_violated: f64,

    pub history_empty: f64,
    pub history_untried: f64,
    pub history_success: f64,
    pub history_failure: f64,
    pub history_inconclusive: f64,

    pub default_confidence_gain: f64,
}

pub const STANDARD_POLICY: ConfidencePolicy = ConfidencePolicy {
    hypothesis: HypothesisPolicy {
        evidence_boost: 0.10,
        contradiction_penalty: 0.15,
        conflict_decay: 0.5,
        waf_bypass_factor: 0.9,
        tech_boost_factor: 1.5,
        tech_penalty_factor: 0.2,
        confirmed_threshold: 0.8,
        rejected_threshold: 0.2,
    },
    levels: LevelPolicy {
        low_score: 0.3,
        medium_score: 0.6,
        high_score: 0.9,
        medium_threshold: 0.5,
        high_threshold: 0.8,
    },
    fingerprint: FingerprintPolicy {
        server_weight: 0.25,
        server_version_bonus: 0.05,
        language_weight: 0.30,
        language_version_bonus: 0.10,
        framework_weight: 0.15,
        os_weight: 0.15,
        multi_component_boost: 1.1,
        multi_component_min: 3,
        acceptance_threshold: 0.3,
    },
    blocking: BlockingPolicy {
        status_rejection_weight: 0.5,
        length_delta_ratio: 0.5,
        length_delta_weight: 0.2,
        error_pattern_factor: 0.2,
        waf_weight: 0.4,
    },
    ranking: RankingPolicy {
        hypothesis_weight: 0.5,
        tech_weight: 0.3,
        history_weight: 0.15,
        base_weight: 0.05,

        hypothesis_neutral: 0.5,
        hypothesis_absent: 0.3,
        corroboration_bonus: 1.2,

        tech_neutral: 0.5,
        language_match: 0.3,
        language_mismatch: -0.3,
        version_satisfied: 0.2,
        version_violated: -0.4,

        history_empty: 0.5,
        history_untried: 0.6,
        history_success: 0.9,
        history_failure: 0.1,
        history_inconclusive: 0.4,

        default_confidence_gain: 0.5,
    },
};

impl Default for ConfidencePolicy {
    fn default() -> Self {
        STANDARD_POLICY
    }
}

pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranking_weights_sum_to_one() {
        let r = STANDARD_POLICY.ranking;
        let sum = r.hypothesis_weight + r.tech_weight + r.history_weight + r.base_weight;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_level_thresholds_ordered() {
        let l = STANDARD_POLICY.levels;
        assert!(l.low_score < l.medium_score && l.medium_score < l.high_score);
        assert!(l.medium_threshold < l.high_threshold);
    }

    #[test]
    fn test_clamp_unit() {
        assert_eq!(clamp_unit(1.7), 1.0);
        assert_eq!(clamp_unit(-0.2), 0.0);
        assert_eq!(clamp_unit(f64::NAN), 0.0);
    }
}
