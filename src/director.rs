// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Scan director.
//!
//! Drives one scan through its phases in order:
//! 1. Baseline - upload a benign file and remember the response
//! 2. Reconnaissance - upload fixed probes to learn the filter
//! 3. Attack - rank strategies and execute them one at a time
//!
//! The attack loop stops on success, at the attempt cap, or when no untried
//! strategy clears the continuation threshold and no failed strategy is
//! left to retry above the retry threshold.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::analysis::{HypothesisEngine, HypothesisRules, RankedStrategy, StrategyRanker};
use crate::config::{AppConfig, DirectorSettings, PayloadSettings, ProbeSpec};
use crate::context::AttackContext;
use crate::errors::ScanError;
use crate::http_client::{Transport, UploadFile};
use crate::observer::{Observation, Observer, PayloadInfo, ProbePhase};
use crate::strategies::{Strategy, StrategyTools, UploadStrategy};
use crate::types::{HypothesisSummary, ScanPhase, ScanResult, StrategyStatus};

const REPORT_TOP_HYPOTHESES: usize = 5;

pub struct Director {
    context: AttackContext,
    transport: Arc<dyn Transport>,
    observer: Observer,
    engine: HypothesisEngine,
    ranker: StrategyRanker,
    strategies: Vec<UploadStrategy>,
    settings: DirectorSettings,
    payload: PayloadSettings,
    phase: ScanPhase,
    attempts: usize,
    retried: BTreeSet<&'static str>,
}

impl Director {
    pub fn new(
        target_url: &str,
        base_url: &str,
        transport: Arc<dyn Transport>,
        config: &AppConfig,
    ) -> Result<Self, ScanError> {
        let rules = Arc::new(HypothesisRules::load()?);
        Ok(Self {
            context: AttackContext::new(target_url, base_url),
            transport,
            observer: Observer::new().with_marker(&config.payload.execution_marker),
            engine: HypothesisEngine::new(Arc::clone(&rules)),
            ranker: StrategyRanker::new(rules),
            strategies: UploadStrategy::registry(),
            settings: config.director.clone(),
            payload: config.payload.clone(),
            phase: ScanPhase::Initialization,
            attempts: 0,
            retried: BTreeSet::new(),
        })
    }

    /// Restrict the attack phase to `strategies`, in this registry order.
    pub fn with_strategies(mut self, strategies: Vec<UploadStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn context(&self) -> &AttackContext {
        &self.context
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn engine(&self) -> &HypothesisEngine {
        &self.engine
    }

    /// Run every phase. Transport failures are logged and absorbed, so the
    /// scan always ends with a result.
    pub async fn run(&mut self) -> ScanResult {
        info!("Starting upload scan of {}", self.context.target_url());

        self.enter(ScanPhase::Baseline);
        self.run_baseline().await;

        self.enter(ScanPhase::Reconnaissance);
        self.run_recon().await;

        self.enter(ScanPhase::Attack);
        self.run_attack().await;

        self.enter(ScanPhase::Complete);
        let result = self.result();
        info!(
            "Scan complete: {} attempt(s), {} observation(s), state {}",
            self.attempts,
            result.observations_count,
            result.attack_state.as_str()
        );
        result
    }

    fn enter(&mut self, phase: ScanPhase) {
        debug!("Phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    async fn run_baseline(&mut self) {
        let file = probe_file(&self.settings.baseline);
        let response = match self.transport.upload(&file).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Baseline upload failed: {}", e);
                return;
            }
        };

        let info = PayloadInfo::upload(ProbePhase::Baseline, &file.filename, self.context.target_url());
        let batch = self.observer.analyze_response(&response, &mut self.context, &info);
        self.context.set_baseline_response(response);
        self.context.add_observations(batch);
        self.engine.analyze(&mut self.context);
    }

    async fn run_recon(&mut self) {
        let probes = self.settings.probes.clone();
        for probe in &probes {
            let file = probe_file(probe);
            let response = match self.transport.upload(&file).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Probe {} failed: {}", file.filename, e);
                    continue;
                }
            };

            let info = PayloadInfo::upload(ProbePhase::Recon, &file.filename, self.context.target_url());
            let batch = self.observer.analyze_response(&response, &mut self.context, &info);
            info!(
                "Probe {} -> HTTP {} ({} observation(s))",
                file.filename,
                response.status_code,
                batch.len()
            );
            self.context.add_observations(batch.clone());
            self.engine.update(&mut self.context, &batch);
        }
    }

    async fn run_attack(&mut self) {
        while self.attempts < self.settings.max_attempts {
            self.engine.analyze(&mut self.context);
            let ranked = self.ranker.rank(&self.strategies, &self.context);
            let Some(choice) = self.select(&ranked) else {
                info!("No strategy left to try");
                break;
            };

            let strategy = self.strategies[choice.index];
            self.attempts += 1;
            info!(
                "[{}/{}] Executing {} (score {:.2})",
                self.attempts,
                self.settings.max_attempts,
                strategy.name(),
                choice.score
            );
            debug!("{}", choice.reasoning);

            let before = self.context.observations().len();
            let mut tools = StrategyTools {
                transport: self.transport.as_ref(),
                observer: &mut self.observer,
                payload: &self.payload,
            };
            let status = match strategy.execute(&mut self.context, &mut tools).await {
                Ok(status) => status,
                Err(e) => {
                    warn!("{} aborted: {}", strategy.name(), e);
                    StrategyStatus::Failure
                }
            };
            self.context.record_strategy(strategy.name(), status);

            let fresh: Vec<Observation> = self.context.observations()[before..].to_vec();
            self.engine.update(&mut self.context, &fresh);

            if status == StrategyStatus::Success {
                info!("[SUCCESS] Filter bypassed with {}", strategy.name());
                break;
            }
            if !self.should_continue() {
                info!(
                    "No strategy above {:.2} left to try or retry",
                    self.settings.continuation_threshold
                );
                break;
            }
        }

        if self.attempts >= self.settings.max_attempts {
            info!("Attempt cap of {} reached", self.settings.max_attempts);
        }
    }

    /// The best applicable untried strategy, else one failed strategy whose
    /// score now clears the retry threshold. Each strategy is retried once.
    fn select<'r>(&mut self, ranked: &'r [RankedStrategy]) -> Option<&'r RankedStrategy> {
        if let Some(next) = self.next_untried(ranked) {
            return Some(next);
        }

        let retry = self.retry_candidate(ranked)?;
        info!("Retrying {} (score {:.2})", retry.name, retry.score);
        self.retried.insert(retry.name);
        Some(retry)
    }

    fn next_untried<'r>(&self, ranked: &'r [RankedStrategy]) -> Option<&'r RankedStrategy> {
        ranked.iter().find(|r| {
            self.context.strategy_status(r.name).is_none()
                && self.strategies[r.index].applicable(&self.context)
        })
    }

    fn retry_candidate<'r>(&self, ranked: &'r [RankedStrategy]) -> Option<&'r RankedStrategy> {
        ranked.iter().find(|r| {
            self.context.strategy_status(r.name) == Some(StrategyStatus::Failure)
                && !self.retried.contains(r.name)
                && r.score > self.settings.retry_threshold
                && self.strategies[r.index].applicable(&self.context)
        })
    }

    /// True while an untried strategy clears the continuation threshold or a
    /// failed one is still eligible for its retry.
    fn should_continue(&self) -> bool {
        let ranked = self.ranker.rank(&self.strategies, &self.context);
        let untried = ranked.iter().any(|r| {
            self.context.strategy_status(r.name).is_none()
                && self.strategies[r.index].applicable(&self.context)
                && r.score >= self.settings.continuation_threshold
        });
        untried || self.retry_candidate(&ranked).is_some()
    }

    pub fn result(&self) -> ScanResult {
        let ctx = &self.context;
        ScanResult {
            vulnerabilities_found: ctx.has_successful_strategy(),
            successful_strategy: ctx.successful_strategies().first().map(|s| s.to_string()),
            secret_extracted: ctx.secret().map(str::to_string),
            observations_count: ctx.observations().len(),
            strategies_tried: ctx.strategy_history().len(),
            attack_state: ctx.state(),
            tech_stack: ctx.tech_stack().map(|t| t.summary()),
            waf_vendor: ctx.waf_profile().map(|w| w.vendor.clone()),
            top_hypotheses: ctx
                .top_hypotheses(REPORT_TOP_HYPOTHESES)
                .into_iter()
                .map(|h| HypothesisSummary {
                    name: h.name().to_string(),
                    confidence: h.confidence(),
                })
                .collect(),
            strategy_results: ctx.strategy_results().clone(),
        }
    }

    /// Human-readable summary of what the scan learned.
    pub fn intelligence_report(&self) -> String {
        let ctx = &self.context;
        let stats = self.engine.stats(ctx);
        let mut lines = vec![
            "=== Upload Intelligence Report ===".to_string(),
            format!("Target: {}", ctx.target_url()),
            format!("Attack state: {}", ctx.state().as_str()),
        ];

        match ctx.tech_stack() {
            Some(tech) => lines.push(format!(
                "Tech stack: {} (confidence {:.2})",
                tech.summary(),
                tech.confidence
            )),
            None => lines.push("Tech stack: unknown".to_string()),
        }
        match ctx.waf_profile() {
            Some(waf) => lines.push(format!("WAF: {} (confidence {:.2})", waf.vendor, waf.confidence)),
            None => lines.push("WAF: none detected".to_string()),
        }

        let filters = ctx.filters();
        if filters.any_filter_detected() || filters.null_byte_truncation {
            lines.push(format!(
                "Filters: extension={} mime={} size={} waf={} null_byte_truncation={}",
                filters.extension_forced,
                filters.mime_checked,
                filters.size_limited,
                filters.waf_blocking,
                filters.null_byte_truncation
            ));
        }

        lines.push(format!(
            "Hypotheses: {} total, {} confirmed, {} rejected",
            stats.total, stats.confirmed, stats.rejected
        ));
        for h in ctx.top_hypotheses(REPORT_TOP_HYPOTHESES) {
            lines.push(format!("  {:<30} {:.2}", h.name().as_str(), h.confidence()));
        }

        if !ctx.strategy_history().is_empty() {
            lines.push("Strategies:".to_string());
            for attempt in ctx.strategy_history() {
                lines.push(format!("  {:<30} {}", attempt.strategy, attempt.status));
            }
        }

        if let Some(secret) = ctx.secret() {
            lines.push(format!("Secret: {}", secret));
        }
        lines.join("\n")
    }
}

fn probe_file(probe: &ProbeSpec) -> UploadFile {
    let file = UploadFile::new(probe.filename.clone(), probe.content.clone().into_bytes());
    match &probe.content_type {
        Some(content_type) => file.with_content_type(content_type.clone()),
        None => file,
    }
}
