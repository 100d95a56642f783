// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Hypothesis Engine - evidence fusion for upload targets
//!
//! Beliefs about the target are derived from everything recorded in the
//! [`AttackContext`]:
//! 1. Observations, weighted by their confidence level
//! 2. The detected tech stack, weighted by fingerprint confidence
//! 3. A detected WAF, which implies that a bypass is required
//!
//! Conflicting beliefs are resolved after each rebuild by halving the
//! weaker side of every conflicting pair.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::confidence_policy::{HypothesisPolicy, STANDARD_POLICY};
use super::hypothesis::{Hypothesis, HypothesisName};
use super::hypothesis_rules::HypothesisRules;
use crate::context::AttackContext;
use crate::observer::Observation;

const CONFLICT_NOTE_PREFIX: &str = "Conflicts with";
const WAF_STRATEGIES: &[&str] = &["encoding_bypass", "fragmentation"];
const WAF_BYPASS_SUGGESTIONS: usize = 3;

/// Summary counts over the current belief map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    pub total: usize,
    /// Hypotheses first created by this engine over its lifetime.
    pub created: usize,
    pub confirmed: usize,
    pub rejected: usize,
    pub average_confidence: f64,
}

pub struct HypothesisEngine {
    rules: Arc<HypothesisRules>,
    policy: HypothesisPolicy,
    created: usize,
}

impl HypothesisEngine {
    pub fn new(rules: Arc<HypothesisRules>) -> Self {
        Self {
            rules,
            policy: STANDARD_POLICY.hypothesis,
            created: 0,
        }
    }

    pub fn with_policy(mut self, policy: HypothesisPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn rules(&self) -> &HypothesisRules {
        &self.rules
    }

    /// Rebuild every hypothesis from the full context and store the result.
    ///
    /// A rebuilt hypothesis keeps the evidence trail and the contradictions
    /// recorded on its previous version. Hypotheses no rule derives are
    /// retained unchanged.
    pub fn analyze<'c>(
        &mut self,
        context: &'c mut AttackContext,
    ) -> &'c BTreeMap<HypothesisName, Hypothesis> {
        let mut rebuilt: BTreeMap<HypothesisName, Hypothesis> = BTreeMap::new();

        for obs in context.observations() {
            let score = obs.confidence_score();
            let label = evidence_label(obs);
            for (name, base) in self.rules.hypotheses_for(obs.observation_type()) {
                Self::merge(&mut rebuilt, &self.policy, *name, base * score, &label);
            }
        }

        if let Some(tech) = context.tech_stack() {
            for rule in self.rules.tech_rules_for(tech) {
                let label = format!("Tech stack: {}", rule.key);
                for (name, base) in rule.hypotheses {
                    let confidence = base * tech.confidence;
                    Self::merge(&mut rebuilt, &self.policy, *name, confidence, &label);
                }
            }
        }

        if let Some(waf) = context.waf_profile().filter(|w| w.detected) {
            let label = format!("WAF detected: {}", waf.vendor);
            let present = HypothesisName::WafPresent;
            Self::merge(&mut rebuilt, &self.policy, present, waf.confidence, &label);
            if let Some(h) = rebuilt.get_mut(&HypothesisName::WafPresent) {
                for signature in &waf.signatures {
                    h.add_evidence(format!("Signature: {}", signature), &self.policy);
                }
                for strategy in WAF_STRATEGIES {
                    h.suggest_strategy(strategy);
                }
            }

            let required = waf.confidence * self.policy.waf_bypass_factor;
            let bypass = HypothesisName::BypassRequired;
            Self::merge(&mut rebuilt, &self.policy, bypass, required, &label);
            if let Some(h) = rebuilt.get_mut(&HypothesisName::BypassRequired) {
                for technique in waf.bypass_techniques.iter().take(WAF_BYPASS_SUGGESTIONS) {
                    h.suggest_strategy(technique);
                }
            }
        }

        let mut merged = context.hypotheses().clone();
        for (name, mut fresh) in rebuilt {
            match merged.remove(&name) {
                Some(previous) => {
                    for evidence in previous.evidence() {
                        fresh = fresh.with_evidence(evidence.clone());
                    }
                    for contradiction in previous.contradictions() {
                        if !contradiction.starts_with(CONFLICT_NOTE_PREFIX) {
                            fresh.add_contradiction(contradiction.clone(), &self.policy);
                        }
                    }
                    for strategy in previous.suggested_strategies() {
                        fresh.suggest_strategy(strategy);
                    }
                }
                None => self.created += 1,
            }
            merged.insert(name, fresh);
        }

        self.resolve_conflicts(&mut merged);
        self.attach_strategies(merged.values_mut());

        info!(
            "Hypotheses rebuilt: {} from {} observation(s)",
            merged.len(),
            context.observations().len()
        );
        context.replace_hypotheses(merged);
        context.hypotheses()
    }

    /// Fold a batch of fresh observations into the existing beliefs.
    pub fn update(&mut self, context: &mut AttackContext, observations: &[Observation]) {
        for obs in observations {
            let obs_type = obs.observation_type();
            let label = evidence_label(obs);

            for (name, base) in self.rules.hypotheses_for(obs_type) {
                match context.hypothesis_mut(*name) {
                    Some(h) => {
                        if self.rules.supports(obs_type, *name)
                            && h.add_evidence(label.clone(), &self.policy)
                        {
                            debug!("{} supported by {} -> {:.2}", name, obs_type, h.confidence());
                        }
                    }
                    None => {
                        let mut h = Hypothesis::new(*name, *base).with_evidence(label.clone());
                        self.attach_strategies(std::iter::once(&mut h));
                        debug!("New hypothesis {} at {:.2}", name, h.confidence());
                        context.insert_hypothesis(h);
                        self.created += 1;
                    }
                }
            }

            for name in self.rules.contradicted_by(obs_type) {
                if let Some(h) = context.hypothesis_mut(*name) {
                    if h.add_contradiction(format!("Contradicted by {}", obs_type), &self.policy) {
                        debug!("{} contradicted by {} -> {:.2}", name, obs_type, h.confidence());
                    }
                }
            }
        }
    }

    pub fn stats(&self, context: &AttackContext) -> EngineStats {
        let hypotheses = context.hypotheses();
        let total = hypotheses.len();
        let sum: f64 = hypotheses.values().map(Hypothesis::confidence).sum();
        EngineStats {
            total,
            created: self.created,
            confirmed: hypotheses
                .values()
                .filter(|h| h.confidence() >= self.policy.confirmed_threshold)
                .count(),
            rejected: hypotheses
                .values()
                .filter(|h| h.confidence() <= self.policy.rejected_threshold)
                .count(),
            average_confidence: if total == 0 { 0.0 } else { sum / total as f64 },
        }
    }

    fn merge(
        map: &mut BTreeMap<HypothesisName, Hypothesis>,
        policy: &HypothesisPolicy,
        name: HypothesisName,
        confidence: f64,
        evidence: &str,
    ) {
        match map.get_mut(&name) {
            Some(existing) => {
                existing.raise_to(confidence);
                existing.add_evidence(evidence, policy);
            }
            None => {
                map.insert(name, Hypothesis::new(name, confidence).with_evidence(evidence));
            }
        }
    }

    /// Halve the weaker side of each conflicting pair. Ties go to the side
    /// with more evidence, then to the name declared first. A recorded
    /// conflict note is never applied twice.
    fn resolve_conflicts(&self, map: &mut BTreeMap<HypothesisName, Hypothesis>) {
        for (left, right) in self.rules.conflict_pairs() {
            let (Some(a), Some(b)) = (map.get(&left), map.get(&right)) else {
                continue;
            };

            let left_wins = if a.confidence() != b.confidence() {
                a.confidence() > b.confidence()
            } else {
                a.evidence().len() >= b.evidence().len()
            };
            let (winner, loser) = if left_wins { (left, right) } else { (right, left) };

            if let Some(h) = map.get_mut(&loser) {
                if h.note_contradiction(format!("{} {}", CONFLICT_NOTE_PREFIX, winner)) {
                    h.scale_confidence(self.policy.conflict_decay);
                    debug!("Conflict {} vs {}: {} -> {:.2}", winner, loser, loser, h.confidence());
                }
            }
        }
    }

    fn attach_strategies<'a>(&self, hypotheses: impl Iterator<Item = &'a mut Hypothesis>) {
        for h in hypotheses {
            for (strategy, _) in self.rules.strategies_for(h.name()) {
                h.suggest_strategy(strategy);
            }
        }
    }
}

/// One evidence line per observation, so distinct observations of the same
/// type each count as support.
fn evidence_label(obs: &Observation) -> String {
    let subject = obs
        .uploaded_filename
        .as_deref()
        .or_else(|| obs.evidence().first().map(String::as_str));
    match subject {
        Some(subject) => format!("Observation: {} ({})", obs.observation_type(), subject),
        None => format!("Observation: {}", obs.observation_type()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{ConfidenceLevel, ObservationType};
    use crate::types::{TechStack, WafProfile};

    fn engine() -> HypothesisEngine {
        HypothesisEngine::new(Arc::new(HypothesisRules::load().unwrap()))
    }

    fn obs(obs_type: ObservationType, level: ConfidenceLevel, file: &str) -> Observation {
        let mut o = Observation::new(obs_type, level);
        o.uploaded_filename = Some(file.to_string());
        o
    }

    fn ctx() -> AttackContext {
        AttackContext::new("https://lab.test/my-account/avatar", "https://lab.test")
    }

    #[test]
    fn test_analyze_weights_by_observation_confidence() {
        let mut engine = engine();
        let mut ctx = ctx();
        ctx.add_observation(obs(ObservationType::ExtensionForced, ConfidenceLevel::High, "test.php"));
        engine.analyze(&mut ctx);

        let blacklist = ctx.hypothesis(HypothesisName::BlacklistFilter).unwrap();
        assert!((blacklist.confidence() - 0.7 * 0.9).abs() < 1e-9);
        assert!(blacklist.suggested_strategies().iter().any(|s| s == "null_byte"));
    }

    #[test]
    fn test_repeated_derivation_merges() {
        let mut engine = engine();
        let mut ctx = ctx();
        ctx.add_observation(obs(ObservationType::ExtensionForced, ConfidenceLevel::High, "test.php"));
        ctx.add_observation(obs(ObservationType::ExtensionForced, ConfidenceLevel::High, "test.jsp"));
        engine.analyze(&mut ctx);

        let blacklist = ctx.hypothesis(HypothesisName::BlacklistFilter).unwrap();
        assert_eq!(blacklist.evidence().len(), 2);
        assert!((blacklist.confidence() - (0.63 + 0.1)).abs() < 1e-9);
        assert_eq!(
            ctx.hypotheses().keys().filter(|k| **k == HypothesisName::BlacklistFilter).count(),
            1
        );
    }

    #[test]
    fn test_analyze_is_idempotent() {
        let mut engine = engine();
        let mut ctx = ctx();
        ctx.add_observation(obs(ObservationType::UploadRejected, ConfidenceLevel::High, "test.php"));
        ctx.add_observation(obs(ObservationType::NullByteSuccess, ConfidenceLevel::High, "x.php%00.jpg"));
        ctx.set_tech_stack(TechStack {
            language: Some("PHP".into()),
            language_version: Some("8.1.0".into()),
            confidence: 0.4,
            ..Default::default()
        });

        engine.analyze(&mut ctx);
        let first: Vec<_> = ctx.hypotheses().values().map(|h| (h.name(), h.confidence())).collect();
        engine.analyze(&mut ctx);
        let second: Vec<_> = ctx.hypotheses().values().map(|h| (h.name(), h.confidence())).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_conflict_halves_weaker() {
        let mut engine = engine();
        let mut ctx = ctx();
        ctx.add_observation(obs(ObservationType::NullByteSuccess, ConfidenceLevel::High, "x.php%00.jpg"));
        ctx.set_tech_stack(TechStack {
            language: Some("PHP".into()),
            language_version: Some("8.2".into()),
            confidence: 0.4,
            ..Default::default()
        });
        engine.analyze(&mut ctx);

        // php_8_or_above at 0.38 loses to php_below_8 and null_byte_vulnerable
        let php8 = ctx.hypothesis(HypothesisName::Php8OrAbove).unwrap();
        assert!((php8.confidence() - 0.95 * 0.4 * 0.25).abs() < 1e-9);
        assert!(php8.contradictions().iter().any(|c| c == "Conflicts with php_below_8"));
        assert!(php8.contradictions().iter().any(|c| c == "Conflicts with null_byte_vulnerable"));
        let below = ctx.hypothesis(HypothesisName::PhpBelow8).unwrap();
        assert!((below.confidence() - 0.9 * 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_conflict_tie_halves_later_name() {
        let mut engine = engine();
        let mut ctx = ctx();
        ctx.add_observation(obs(ObservationType::ExtensionForced, ConfidenceLevel::High, "test.php"));
        ctx.insert_hypothesis(
            Hypothesis::new(HypothesisName::WhitelistFilter, 0.7 * 0.9).with_evidence("manual"),
        );
        engine.analyze(&mut ctx);

        let white = ctx.hypothesis(HypothesisName::WhitelistFilter).unwrap();
        assert!((white.confidence() - 0.315).abs() < 1e-9);
        let black = ctx.hypothesis(HypothesisName::BlacklistFilter).unwrap();
        assert!(black.contradictions().is_empty());

        // Retained hypotheses are not halved again
        engine.analyze(&mut ctx);
        let white = ctx.hypothesis(HypothesisName::WhitelistFilter).unwrap();
        assert!((white.confidence() - 0.315).abs() < 1e-9);
    }

    #[test]
    fn test_waf_profile_synthesizes_beliefs() {
        let mut engine = engine();
        let mut ctx = ctx();
        ctx.set_waf_profile(WafProfile {
            detected: true,
            vendor: "Cloudflare".into(),
            confidence: 0.8,
            signatures: vec!["header:cf-ray".into()],
            bypass_techniques: vec!["a".into(), "b".into(), "c".into(), "d".into()],
        });
        engine.analyze(&mut ctx);

        let waf = ctx.hypothesis(HypothesisName::WafPresent).unwrap();
        assert!((waf.confidence() - 0.9).abs() < 1e-9);
        assert!(waf.suggested_strategies().iter().any(|s| s == "encoding_bypass"));

        let bypass = ctx.hypothesis(HypothesisName::BypassRequired).unwrap();
        assert!((bypass.confidence() - 0.72).abs() < 1e-9);
        assert_eq!(bypass.suggested_strategies(), ["a", "b", "c"]);
    }

    #[test]
    fn test_update_supports_creates_and_contradicts() {
        let mut engine = engine();
        let mut ctx = ctx();
        ctx.insert_hypothesis(Hypothesis::new(HypothesisName::Php8OrAbove, 0.6));
        ctx.insert_hypothesis(Hypothesis::new(HypothesisName::BlacklistFilter, 0.5));

        let batch = vec![obs(ObservationType::NullByteSuccess, ConfidenceLevel::High, "x.php%00.jpg")];
        engine.update(&mut ctx, &batch);

        assert!((ctx.hypothesis_confidence(HypothesisName::Php8OrAbove) - 0.45).abs() < 1e-9);
        assert!((ctx.hypothesis_confidence(HypothesisName::BlacklistFilter) - 0.6).abs() < 1e-9);
        assert!((ctx.hypothesis_confidence(HypothesisName::NullByteVulnerable) - 0.95).abs() < 1e-9);

        // Same observation again adds nothing
        engine.update(&mut ctx, &batch);
        assert!((ctx.hypothesis_confidence(HypothesisName::Php8OrAbove) - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_update_applies_engine_policy() {
        let policy = HypothesisPolicy {
            evidence_boost: 0.0,
            contradiction_penalty: 0.3,
            ..STANDARD_POLICY.hypothesis
        };
        let mut engine = engine().with_policy(policy);
        let mut ctx = ctx();
        ctx.insert_hypothesis(Hypothesis::new(HypothesisName::Php8OrAbove, 0.6));
        ctx.insert_hypothesis(Hypothesis::new(HypothesisName::BlacklistFilter, 0.5));

        let batch = vec![obs(ObservationType::NullByteSuccess, ConfidenceLevel::High, "x.php%00.jpg")];
        engine.update(&mut ctx, &batch);

        assert!((ctx.hypothesis_confidence(HypothesisName::Php8OrAbove) - 0.3).abs() < 1e-9);
        assert!((ctx.hypothesis_confidence(HypothesisName::BlacklistFilter) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_stats() {
        let mut engine = engine();
        let mut ctx = ctx();
        ctx.add_observation(obs(ObservationType::WafDetected, ConfidenceLevel::High, "a.jpg"));
        engine.analyze(&mut ctx);
        let stats = engine.stats(&ctx);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.created, 2);
        assert_eq!(stats.confirmed, 2);
        assert_eq!(stats.rejected, 0);
    }
}
