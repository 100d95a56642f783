// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Per-scan belief state.
//!
//! One [`AttackContext`] is created per scan and threaded by reference
//! through every phase. All mutation goes through its methods.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::analysis::{Hypothesis, HypothesisName};
use crate::http_client::HttpResponse;
use crate::observer::{Observation, ObservationType};
use crate::types::{
    AttackState, CapabilityProfile, FilterProfile, StrategyStatus, TechStack, WafProfile,
};

/// One strategy execution, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyAttempt {
    pub strategy: String,
    pub status: StrategyStatus,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AttackContext {
    target_url: String,
    base_url: String,
    state: AttackState,
    observations: Vec<Observation>,
    hypotheses: BTreeMap<HypothesisName, Hypothesis>,
    tech_stack: Option<TechStack>,
    waf_profile: Option<WafProfile>,
    baseline_response: Option<HttpResponse>,
    strategy_results: BTreeMap<String, StrategyStatus>,
    strategy_history: Vec<StrategyAttempt>,
    secret: Option<String>,
    capabilities: CapabilityProfile,
    filters: FilterProfile,
    metadata: BTreeMap<String, String>,
    started_at: DateTime<Utc>,
}

impl AttackContext {
    pub fn new(target_url: &str, base_url: &str) -> Self {
        Self {
            target_url: target_url.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            state: AttackState::TargetReady,
            observations: Vec::new(),
            hypotheses: BTreeMap::new(),
            tech_stack: None,
            waf_profile: None,
            baseline_response: None,
            strategy_results: BTreeMap::new(),
            strategy_history: Vec::new(),
            secret: None,
            capabilities: CapabilityProfile::default(),
            filters: FilterProfile::default(),
            metadata: BTreeMap::new(),
            started_at: Utc::now(),
        }
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn state(&self) -> AttackState {
        self.state
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn tech_stack(&self) -> Option<&TechStack> {
        self.tech_stack.as_ref()
    }

    pub fn waf_profile(&self) -> Option<&WafProfile> {
        self.waf_profile.as_ref()
    }

    pub fn baseline_response(&self) -> Option<&HttpResponse> {
        self.baseline_response.as_ref()
    }

    pub fn capabilities(&self) -> &CapabilityProfile {
        &self.capabilities
    }

    pub fn filters(&self) -> &FilterProfile {
        &self.filters
    }

    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }

    pub fn strategy_results(&self) -> &BTreeMap<String, StrategyStatus> {
        &self.strategy_results
    }

    pub fn strategy_history(&self) -> &[StrategyAttempt] {
        &self.strategy_history
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Append to the observation log and fold the observation into the
    /// attack state, capabilities and filter profile.
    pub fn add_observation(&mut self, observation: Observation) {
        debug!("Observation: {}", observation);
        let obs_type = observation.observation_type();

        if let Some(state) = state_for(obs_type) {
            self.advance_state(state);
        }

        match obs_type {
            ObservationType::UploadSuccess => {
                self.capabilities.upload_supported = true;
                self.capabilities.can_write_files = true;
                let name = observation
                    .stored_filename
                    .as_deref()
                    .or(observation.uploaded_filename.as_deref());
                if let Some(ext) = name.and_then(extension_of) {
                    if !self.capabilities.allowed_extensions.contains(&ext) {
                        self.capabilities.allowed_extensions.push(ext);
                    }
                }
            }
            ObservationType::ExtensionForced => self.filters.extension_forced = true,
            ObservationType::MimeTypeRejected => self.filters.mime_checked = true,
            ObservationType::SizeLimitExceeded => self.filters.size_limited = true,
            ObservationType::WafDetected => self.filters.waf_blocking = true,
            ObservationType::NullByteRemoved => self.filters.null_byte_truncation = true,
            ObservationType::FileReadConfirmed => self.capabilities.can_read_files = true,
            ObservationType::CodeExecutionDetected => {
                self.capabilities.can_execute_code = true;
                self.capabilities.can_read_files = true;
            }
            _ => {}
        }

        if observation.is_security_critical() {
            info!("[DETECTED] {}", observation);
        }
        self.observations.push(observation);
    }

    pub fn add_observations(&mut self, observations: Vec<Observation>) {
        for observation in observations {
            self.add_observation(observation);
        }
    }

    /// The state only moves towards stronger capability.
    fn advance_state(&mut self, candidate: AttackState) {
        if candidate > self.state {
            debug!("Attack state {} -> {}", self.state.as_str(), candidate.as_str());
            self.state = candidate;
        }
    }

    /// Store the first fingerprint; later calls are ignored. Returns whether
    /// the value was stored.
    pub fn set_tech_stack(&mut self, tech: TechStack) -> bool {
        if self.tech_stack.is_some() {
            return false;
        }
        self.tech_stack = Some(tech);
        true
    }

    /// Same write-once discipline as [`Self::set_tech_stack`].
    pub fn set_waf_profile(&mut self, profile: WafProfile) -> bool {
        if self.waf_profile.is_some() {
            return false;
        }
        self.waf_profile = Some(profile);
        true
    }

    pub fn set_baseline_response(&mut self, response: HttpResponse) {
        self.baseline_response = Some(response);
    }

    pub fn record_strategy(&mut self, strategy: &str, status: StrategyStatus) {
        self.strategy_results.insert(strategy.to_string(), status);
        self.strategy_history.push(StrategyAttempt {
            strategy: strategy.to_string(),
            status,
            at: Utc::now(),
        });
    }

    pub fn strategy_status(&self, strategy: &str) -> Option<StrategyStatus> {
        self.strategy_results.get(strategy).copied()
    }

    pub fn record_secret(&mut self, secret: &str) {
        info!("[SUCCESS] Secret captured ({} bytes)", secret.len());
        self.secret = Some(secret.to_string());
        self.advance_state(AttackState::PostExploit);
    }

    pub fn set_metadata(&mut self, key: &str, value: impl Into<String>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub fn hypotheses(&self) -> &BTreeMap<HypothesisName, Hypothesis> {
        &self.hypotheses
    }

    pub fn hypothesis(&self, name: HypothesisName) -> Option<&Hypothesis> {
        self.hypotheses.get(&name)
    }

    /// Confidence of `name`, zero when absent.
    pub fn hypothesis_confidence(&self, name: HypothesisName) -> f64 {
        self.hypotheses.get(&name).map(Hypothesis::confidence).unwrap_or(0.0)
    }

    pub fn hypothesis_mut(&mut self, name: HypothesisName) -> Option<&mut Hypothesis> {
        self.hypotheses.get_mut(&name)
    }

    pub fn insert_hypothesis(&mut self, hypothesis: Hypothesis) {
        self.hypotheses.insert(hypothesis.name(), hypothesis);
    }

    pub fn replace_hypotheses(&mut self, hypotheses: BTreeMap<HypothesisName, Hypothesis>) {
        self.hypotheses = hypotheses;
    }

    pub fn update_hypothesis_confidence(&mut self, name: HypothesisName, delta: f64) -> bool {
        match self.hypotheses.get_mut(&name) {
            Some(h) => {
                h.adjust_confidence(delta);
                true
            }
            None => false,
        }
    }

    /// Highest-confidence hypotheses first; ties keep name order.
    pub fn top_hypotheses(&self, n: usize) -> Vec<&Hypothesis> {
        let mut sorted: Vec<&Hypothesis> = self.hypotheses.values().collect();
        sorted.sort_by(|a, b| {
            b.confidence()
                .partial_cmp(&a.confidence())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted.truncate(n);
        sorted
    }

    pub fn high_confidence_hypotheses(&self, threshold: f64) -> Vec<&Hypothesis> {
        self.hypotheses
            .values()
            .filter(|h| h.confidence() >= threshold)
            .collect()
    }

    pub fn has_successful_strategy(&self) -> bool {
        self.strategy_results
            .values()
            .any(|s| *s == StrategyStatus::Success)
    }

    /// Successful strategies in execution order.
    pub fn successful_strategies(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for attempt in &self.strategy_history {
            if attempt.status == StrategyStatus::Success && !names.contains(&attempt.strategy.as_str()) {
                names.push(&attempt.strategy);
            }
        }
        names
    }
}

fn state_for(obs_type: ObservationType) -> Option<AttackState> {
    match obs_type {
        ObservationType::ExtensionForced
        | ObservationType::MimeTypeRejected
        | ObservationType::SizeLimitExceeded
        | ObservationType::UploadRejected
        | ObservationType::FilterDetected
        | ObservationType::WafDetected => Some(AttackState::FilterDetected),
        ObservationType::FileReadConfirmed => Some(AttackState::ConfirmedLfi),
        ObservationType::NullByteRemoved
        | ObservationType::NullByteSuccess
        | ObservationType::DoubleExtensionSuccess
        | ObservationType::CaseManipulationSuccess
        | ObservationType::MagicBytesSuccess
        | ObservationType::ContentTypeBypassSuccess
        | ObservationType::HtaccessOverrideSuccess => Some(AttackState::AdvancedExploitation),
        ObservationType::CodeExecutionDetected => Some(AttackState::CodeExecution),
        _ => None,
    }
}

/// Lower-cased extension after the last dot, if any.
fn extension_of(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() || ext.contains('/') {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
