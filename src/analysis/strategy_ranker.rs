// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Strategy ranking against the current belief state.
//!
//! Each strategy gets a weighted score from four factors, each clamped to
//! [0, 1] before weighting:
//! 1. Hypothesis match - confidence of the beliefs the strategy targets
//! 2. Tech fit - declared language and version bounds, then tech rule factors
//! 3. History - how this strategy fared earlier in the scan
//! 4. Base gain - the strategy's declared confidence gain
//!
//! Ranking is deterministic: ties keep registry order.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::confidence_policy::{clamp_unit, ConfidencePolicy, STANDARD_POLICY};
use super::hypothesis::HypothesisName;
use super::hypothesis_rules::HypothesisRules;
use crate::context::AttackContext;
use crate::strategies::{Strategy, StrategyMetadata};
use crate::types::StrategyStatus;

#[derive(Debug, Clone, PartialEq)]
pub struct RankedStrategy {
    pub name: &'static str,
    /// Position of the strategy in the slice passed to [`StrategyRanker::rank`].
    pub index: usize,
    pub score: f64,
    pub reasoning: String,
    pub hypothesis_matches: Vec<HypothesisName>,
    pub factors: BTreeMap<String, f64>,
}

impl RankedStrategy {
    pub fn tier(&self) -> &'static str {
        tier(self.score)
    }
}

pub struct StrategyRanker {
    rules: Arc<HypothesisRules>,
    policy: ConfidencePolicy,
}

impl StrategyRanker {
    pub fn new(rules: Arc<HypothesisRules>) -> Self {
        Self {
            rules,
            policy: STANDARD_POLICY,
        }
    }

    pub fn with_policy(mut self, policy: ConfidencePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Score every strategy and sort, best first.
    pub fn rank<S: Strategy>(&self, strategies: &[S], context: &AttackContext) -> Vec<RankedStrategy> {
        let mut ranked: Vec<RankedStrategy> = strategies
            .iter()
            .enumerate()
            .map(|(index, strategy)| self.score(index, strategy.metadata(), context))
            .collect();

        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        ranked
    }

    fn score(&self, index: usize, meta: &StrategyMetadata, context: &AttackContext) -> RankedStrategy {
        let r = &self.policy.ranking;

        let (hypothesis_score, hypothesis_matches) = self.hypothesis_score(meta, context);
        let tech_score = self.tech_score(meta, context);
        let history_score = self.history_score(meta, context);
        let base_score = clamp_unit(meta.confidence_gain.unwrap_or(r.default_confidence_gain));

        let score = clamp_unit(
            hypothesis_score * r.hypothesis_weight
                + tech_score * r.tech_weight
                + history_score * r.history_weight
                + base_score * r.base_weight,
        );

        let mut factors = BTreeMap::new();
        factors.insert("hypothesis".to_string(), hypothesis_score);
        factors.insert("tech".to_string(), tech_score);
        factors.insert("history".to_string(), history_score);
        factors.insert("base".to_string(), base_score);

        RankedStrategy {
            name: meta.name,
            index,
            score,
            reasoning: reasoning(meta.name, score, &hypothesis_matches, context),
            hypothesis_matches,
            factors,
        }
    }

    fn hypothesis_score(
        &self,
        meta: &StrategyMetadata,
        context: &AttackContext,
    ) -> (f64, Vec<HypothesisName>) {
        let r = &self.policy.ranking;
        if meta.targets_hypotheses.is_empty() {
            return (r.hypothesis_neutral, Vec::new());
        }

        let matched: Vec<(HypothesisName, f64)> = meta
            .targets_hypotheses
            .iter()
            .filter_map(|name| context.hypothesis(*name).map(|h| (*name, h.confidence())))
            .collect();
        if matched.is_empty() {
            return (r.hypothesis_absent, Vec::new());
        }

        let mut score = matched.iter().map(|(_, c)| c).sum::<f64>() / matched.len() as f64;
        if matched.len() >= 2 {
            score *= r.corroboration_bonus;
        }
        (clamp_unit(score), matched.into_iter().map(|(name, _)| name).collect())
    }

    fn tech_score(&self, meta: &StrategyMetadata, context: &AttackContext) -> f64 {
        let r = &self.policy.ranking;
        let mut score = r.tech_neutral;
        let Some(tech) = context.tech_stack() else {
            return score;
        };
        let req = &meta.tech_requirements;

        if let (Some(wanted), Some(detected)) = (req.language, tech.language.as_deref()) {
            if wanted.eq_ignore_ascii_case(detected) {
                score += r.language_match;
            } else {
                score += r.language_mismatch;
            }
        }

        if let Some(version) = tech.language_version.as_deref() {
            if let Some(max) = req.version_max {
                if compare_versions(version, max) == Ordering::Less {
                    score += r.version_satisfied;
                } else {
                    score += r.version_violated;
                }
            }
            if let Some(min) = req.version_min {
                if compare_versions(version, min) != Ordering::Less {
                    score += r.version_satisfied;
                } else {
                    score += r.version_violated;
                }
            }
        }

        score = clamp_unit(score);
        clamp_unit(score * self.rules.strategy_factor(tech, meta.name, &self.policy.hypothesis))
    }

    fn history_score(&self, meta: &StrategyMetadata, context: &AttackContext) -> f64 {
        let r = &self.policy.ranking;
        if context.strategy_history().is_empty() {
            return r.history_empty;
        }
        match context.strategy_status(meta.name) {
            None => r.history_untried,
            Some(StrategyStatus::Success) => r.history_success,
            Some(StrategyStatus::Failure) => r.history_failure,
            Some(StrategyStatus::Inconclusive) => r.history_inconclusive,
        }
    }
}

fn tier(score: f64) -> &'static str {
    if score >= 0.8 {
        "CRITICAL"
    } else if score >= 0.6 {
        "HIGH"
    } else if score >= 0.4 {
        "MEDIUM"
    } else {
        "LOW"
    }
}

fn reasoning(
    name: &str,
    score: f64,
    matches: &[HypothesisName],
    context: &AttackContext,
) -> String {
    let mut parts = vec![format!("[{}] {} scores {:.2}", tier(score), name, score)];

    if !matches.is_empty() {
        let listed: Vec<String> = matches
            .iter()
            .map(|m| format!("{} ({:.2})", m, context.hypothesis_confidence(*m)))
            .collect();
        parts.push(format!("matches {}", listed.join(", ")));
    }

    if let Some(tech) = context.tech_stack() {
        parts.push(format!("tech {}", tech.summary()));
    }

    if let Some(status) = context.strategy_status(name) {
        parts.push(format!("previously {}", status));
    }

    parts.join("; ")
}

/// Compare dotted versions numerically; missing components count as 0 and
/// a component's trailing non-digits are ignored.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    fn components(v: &str) -> Vec<u64> {
        v.trim()
            .split('.')
            .map(|part| {
                let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
                digits.parse().unwrap_or(0)
            })
            .collect()
    }

    let (a, b) = (components(a), components(b));
    let len = a.len().max(b.len());
    for i in 0..len {
        let ord = a.get(i).unwrap_or(&0).cmp(b.get(i).unwrap_or(&0));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
