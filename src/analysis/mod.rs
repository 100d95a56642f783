// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Analysis Module
 * Belief fusion and strategy ranking for upload targets
 * © 2026 Bountyy Oy
 */

pub mod confidence_policy;
pub mod hypothesis;
pub mod hypothesis_engine;
pub mod hypothesis_rules;
pub mod strategy_ranker;

pub use confidence_policy::{ConfidencePolicy, STANDARD_POLICY};
pub use hypothesis::{Hypothesis, HypothesisName};
pub use hypothesis_engine::{EngineStats, HypothesisEngine};
pub use hypothesis_rules::{HypothesisRules, TechRule, TechRuleKind};
pub use strategy_ranker::{compare_versions, RankedStrategy, StrategyRanker};
