// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Rule tables that turn evidence into beliefs.
//!
//! The tables are plain constants; [`HypothesisRules::load`] indexes them and
//! checks their invariants (confidences within [0, 1], no self-conflicts).
//! Conflicts are declared once per unordered pair and indexed both ways.

use std::collections::BTreeMap;

use super::confidence_policy::HypothesisPolicy;
use super::hypothesis::HypothesisName;
use crate::errors::RuleTableError;
use crate::observer::ObservationType;
use crate::types::TechStack;

use super::hypothesis::HypothesisName as H;
use crate::observer::ObservationType as O;

const OBSERVATION_RULES: &[(ObservationType, &[(HypothesisName, f64)])] = &[
    (O::ExtensionForced, &[(H::BlacklistFilter, 0.7), (H::ExtensionValidationActive, 0.9)]),
    (O::UploadSuccess, &[(H::UploadEnabled, 0.95), (H::FilterBypassed, 0.5)]),
    (O::UploadRejected, &[(H::SecurityFilterActive, 0.6), (H::ExtensionValidationActive, 0.5)]),
    (O::FilterDetected, &[(H::SecurityFilterActive, 0.8), (H::WafMaybe, 0.3)]),
    (O::WafDetected, &[(H::WafPresent, 0.95), (H::BypassRequired, 0.9)]),
    (O::MimeTypeRejected, &[(H::MimeValidation, 0.85), (H::ContentValidation, 0.6)]),
    (O::SizeLimitExceeded, &[(H::SizeLimitEnforced, 0.9)]),
    (O::FileReadConfirmed, &[(H::StaticFileServing, 0.8)]),
    (
        O::CodeExecutionDetected,
        &[
            (H::CodeExecutionPossible, 0.95),
            (H::PhpEnabled, 0.8),
            (H::VulnerableServer, 0.85),
        ],
    ),
    (O::NullByteRemoved, &[(H::NullByteVulnerable, 0.8), (H::BlacklistFilter, 0.6)]),
    (
        O::NullByteSuccess,
        &[
            (H::NullByteVulnerable, 0.95),
            (H::PhpBelow8, 0.9),
            (H::BlacklistFilter, 0.85),
        ],
    ),
    (O::DoubleExtensionSuccess, &[(H::WeakExtensionCheck, 0.9), (H::BlacklistFilter, 0.8)]),
    (O::CaseManipulationSuccess, &[(H::BlacklistFilter, 0.85), (H::WeakExtensionCheck, 0.8)]),
    (O::MagicBytesSuccess, &[(H::MagicByteCheck, 0.85), (H::ContentValidation, 0.8)]),
    (O::ContentTypeBypassSuccess, &[(H::MimeValidation, 0.9)]),
    (
        O::HtaccessOverrideSuccess,
        &[
            (H::HtaccessPossible, 0.95),
            (H::ApacheServer, 0.8),
            (H::BlacklistFilter, 0.7),
        ],
    ),
];

const CONTRADICTION_RULES: &[(ObservationType, &[HypothesisName])] = &[
    (O::NullByteSuccess, &[H::Php8OrAbove, H::NullByteNotVulnerable]),
    (O::NullByteRemoved, &[H::NullByteNotVulnerable]),
    (O::CodeExecutionDetected, &[H::CodeExecutionImpossible, H::StaticFileServing]),
    (O::WafDetected, &[H::NoWaf]),
    (O::CaseManipulationSuccess, &[H::WhitelistFilter]),
    (O::HtaccessOverrideSuccess, &[H::WhitelistFilter]),
];

const CONFLICT_PAIRS: &[(HypothesisName, HypothesisName)] = &[
    (H::BlacklistFilter, H::WhitelistFilter),
    (H::PhpBelow8, H::Php8OrAbove),
    (H::Php8OrAbove, H::NullByteVulnerable),
    (H::NullByteVulnerable, H::NullByteNotVulnerable),
    (H::CodeExecutionPossible, H::CodeExecutionImpossible),
    (H::CodeExecutionPossible, H::StaticFileServing),
    (H::WafPresent, H::NoWaf),
];

const STRATEGY_RULES: &[(HypothesisName, &[(&str, f64)])] = &[
    (
        H::BlacklistFilter,
        &[("null_byte", 0.9), ("double_extension", 0.8), ("case_manipulation", 0.7)],
    ),
    (
        H::WhitelistFilter,
        &[("polyglot", 0.9), ("magic_bytes", 0.8), ("content_type_override", 0.7)],
    ),
    (
        H::WafPresent,
        &[("encoding_bypass", 0.8), ("fragmentation", 0.7), ("time_delay", 0.6)],
    ),
    (H::PhpBelow8, &[("null_byte", 0.95)]),
    (H::NullByteVulnerable, &[("null_byte", 0.95)]),
    (H::ApacheServer, &[("htaccess_upload", 0.8), ("null_byte", 0.7)]),
    (H::HtaccessPossible, &[("htaccess_upload", 0.9)]),
    (H::NginxServer, &[("double_extension", 0.8), ("case_manipulation", 0.6)]),
    (H::IisServer, &[("case_manipulation", 0.8)]),
    (H::MimeValidation, &[("content_type_override", 0.9), ("magic_bytes", 0.7)]),
    (H::ContentValidation, &[("magic_bytes", 0.9)]),
    (H::MagicByteCheck, &[("magic_bytes", 0.9)]),
    (
        H::WeakExtensionCheck,
        &[("double_extension", 0.85), ("case_manipulation", 0.8)],
    ),
    (
        H::ExtensionValidationActive,
        &[("double_extension", 0.7), ("case_manipulation", 0.7), ("null_byte", 0.6)],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TechRuleKind {
    /// Key is a substring of the detected server name.
    Server,
    /// Key is `"{language}/{major_version}"`.
    Language,
}

#[derive(Debug)]
pub struct TechRule {
    pub key: &'static str,
    pub kind: TechRuleKind,
    pub hypotheses: &'static [(HypothesisName, f64)],
    pub boost: &'static [&'static str],
    pub penalize: &'static [&'static str],
}

const TECH_RULES: &[TechRule] = &[
    TechRule {
        key: "Apache",
        kind: TechRuleKind::Server,
        hypotheses: &[(H::HtaccessPossible, 0.8), (H::ApacheServer, 0.95)],
        boost: &["htaccess_upload"],
        penalize: &[],
    },
    TechRule {
        key: "Nginx",
        kind: TechRuleKind::Server,
        hypotheses: &[(H::NginxServer, 0.95)],
        boost: &["double_extension"],
        penalize: &["htaccess_upload"],
    },
    TechRule {
        key: "IIS",
        kind: TechRuleKind::Server,
        hypotheses: &[(H::IisServer, 0.95), (H::AspnetMaybe, 0.6)],
        boost: &["case_manipulation"],
        penalize: &["htaccess_upload"],
    },
    TechRule {
        key: "PHP/5",
        kind: TechRuleKind::Language,
        hypotheses: &[(H::PhpBelow8, 0.95), (H::NullByteVulnerable, 0.9)],
        boost: &["null_byte"],
        penalize: &[],
    },
    TechRule {
        key: "PHP/7",
        kind: TechRuleKind::Language,
        hypotheses: &[(H::PhpBelow8, 0.95), (H::NullByteVulnerable, 0.9)],
        boost: &["null_byte"],
        penalize: &[],
    },
    TechRule {
        key: "PHP/8",
        kind: TechRuleKind::Language,
        hypotheses: &[(H::Php8OrAbove, 0.95), (H::NullByteNotVulnerable, 0.9)],
        boost: &[],
        penalize: &["null_byte"],
    },
];

/// Indexed, validated rule tables.
#[derive(Debug)]
pub struct HypothesisRules {
    observation: BTreeMap<ObservationType, Vec<(HypothesisName, f64)>>,
    contradictions: BTreeMap<ObservationType, Vec<HypothesisName>>,
    conflicts: BTreeMap<HypothesisName, Vec<HypothesisName>>,
    strategies: BTreeMap<HypothesisName, Vec<(&'static str, f64)>>,
    tech: &'static [TechRule],
}

impl HypothesisRules {
    /// Index the built-in tables and check them.
    pub fn load() -> Result<Self, RuleTableError> {
        let mut observation = BTreeMap::new();
        for (obs_type, hypotheses) in OBSERVATION_RULES {
            observation.insert(*obs_type, hypotheses.to_vec());
        }

        let mut contradictions = BTreeMap::new();
        for (obs_type, names) in CONTRADICTION_RULES {
            contradictions.insert(*obs_type, names.to_vec());
        }

        let mut conflicts: BTreeMap<HypothesisName, Vec<HypothesisName>> = BTreeMap::new();
        for (left, right) in CONFLICT_PAIRS {
            conflicts.entry(*left).or_default().push(*right);
            conflicts.entry(*right).or_default().push(*left);
        }

        let mut strategies = BTreeMap::new();
        for (name, list) in STRATEGY_RULES {
            let mut list = list.to_vec();
            list.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            strategies.insert(*name, list);
        }

        let rules = Self {
            observation,
            contradictions,
            conflicts,
            strategies,
            tech: TECH_RULES,
        };
        rules.validate()?;
        Ok(rules)
    }

    pub fn validate(&self) -> Result<(), RuleTableError> {
        fn check(table: &'static str, name: HypothesisName, value: f64) -> Result<(), RuleTableError> {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(RuleTableError::ConfidenceOutOfRange {
                    table,
                    hypothesis: name.to_string(),
                    value,
                })
            }
        }

        for hypotheses in self.observation.values() {
            for (name, value) in hypotheses {
                check("observation rules", *name, *value)?;
            }
        }
        for rule in self.tech {
            for (name, value) in rule.hypotheses {
                check("tech rules", *name, *value)?;
            }
        }
        for (name, list) in &self.strategies {
            for (_, weight) in list {
                check("strategy rules", *name, *weight)?;
            }
        }
        for (name, others) in &self.conflicts {
            for other in others {
                if other == name {
                    return Err(RuleTableError::SelfConflict(name.to_string()));
                }
                let mirrored = self
                    .conflicts
                    .get(other)
                    .map(|back| back.contains(name))
                    .unwrap_or(false);
                if !mirrored {
                    return Err(RuleTableError::AsymmetricConflict {
                        left: name.to_string(),
                        right: other.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// `(hypothesis, base confidence)` pairs an observation type suggests.
    pub fn hypotheses_for(&self, obs_type: ObservationType) -> &[(HypothesisName, f64)] {
        self.observation.get(&obs_type).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `obs_type` is among the triggers of `name`.
    pub fn supports(&self, obs_type: ObservationType, name: HypothesisName) -> bool {
        self.hypotheses_for(obs_type).iter().any(|(h, _)| *h == name)
    }

    pub fn contradicted_by(&self, obs_type: ObservationType) -> &[HypothesisName] {
        self.contradictions.get(&obs_type).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn conflicts_of(&self, name: HypothesisName) -> &[HypothesisName] {
        self.conflicts.get(&name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Each conflicting pair once, smaller name first, in name order.
    pub fn conflict_pairs(&self) -> Vec<(HypothesisName, HypothesisName)> {
        let mut pairs = Vec::new();
        for (name, others) in &self.conflicts {
            for other in others {
                if name < other {
                    pairs.push((*name, *other));
                }
            }
        }
        pairs
    }

    /// Strategy names suggested by a hypothesis, strongest first.
    pub fn strategies_for(&self, name: HypothesisName) -> &[(&'static str, f64)] {
        self.strategies.get(&name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tech rules whose key matches the stack.
    pub fn tech_rules_for(&self, tech: &TechStack) -> Vec<&'static TechRule> {
        let server = tech.web_server.as_deref().map(str::to_lowercase);
        let language_key = match (tech.language.as_deref(), tech.language_major()) {
            (Some(language), Some(major)) => Some(format!("{}/{}", language, major).to_lowercase()),
            _ => None,
        };

        self.tech
            .iter()
            .filter(|rule| match rule.kind {
                TechRuleKind::Server => server
                    .as_deref()
                    .map(|s| s.contains(&rule.key.to_lowercase()))
                    .unwrap_or(false),
                TechRuleKind::Language => language_key.as_deref() == Some(&rule.key.to_lowercase()),
            })
            .collect()
    }

    /// Product of tech boost/penalty factors for one strategy; 1.0 when no
    /// rule mentions it.
    pub fn strategy_factor(&self, tech: &TechStack, strategy: &str, policy: &HypothesisPolicy) -> f64 {
        self.tech_rules_for(tech)
            .iter()
            .fold(1.0, |factor, rule| {
                let mut factor = factor;
                if rule.boost.contains(&strategy) {
                    factor *= policy.tech_boost_factor;
                }
                if rule.penalize.contains(&strategy) {
                    factor *= policy.tech_penalty_factor;
                }
                factor
            })
    }
}
