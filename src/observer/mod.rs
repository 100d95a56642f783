// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Response analysis pipeline.
//!
//! The [`Observer`] turns one HTTP response into a batch of
//! [`Observation`]s by running independent passes:
//! 1. Upload-result classification
//! 2. Error-message mapping
//! 3. Baseline-diff blocking detection
//! 4. Tech stack and WAF detection (once per scan)
//! 5. Execution analysis (access phase)
//! 6. Upload-path extraction (upload phase)
//! 7. Content-size heuristics

pub mod fingerprinter;
pub mod observation;
pub mod pattern_matcher;
pub mod signatures;

pub use fingerprinter::{Detection, Fingerprinter};
pub use observation::{ConfidenceLevel, Observation, ObservationType};
pub use pattern_matcher::{ErrorMatch, ExecutionCheck, PatternMatcher, WafMatch};

use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::analysis::confidence_policy::{clamp_unit, ConfidencePolicy, STANDARD_POLICY};
use crate::context::AttackContext;
use crate::http_client::HttpResponse;
use crate::types::{TechStack, WafProfile};

const LARGE_BODY_BYTES: usize = 50_000;
const TINY_BODY_BYTES: usize = 10;
const MAX_PARTIAL_FINGERPRINTS: usize = 16;
const JSON_PATH_KEYS: &[&str] = &["filename", "file", "path", "url", "location"];

/// Which step of the scan produced the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbePhase {
    Baseline,
    Recon,
    Upload,
    Access,
}

impl ProbePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbePhase::Baseline => "baseline",
            ProbePhase::Recon => "recon",
            ProbePhase::Upload => "upload",
            ProbePhase::Access => "access",
        }
    }

    fn is_upload_response(&self) -> bool {
        !matches!(self, ProbePhase::Access)
    }
}

/// What was sent to produce a response.
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadInfo {
    pub phase: ProbePhase,
    pub filename: Option<String>,
    /// URL the request went to, used to resolve relative paths.
    pub request_url: Option<String>,
}

impl PayloadInfo {
    pub fn new(phase: ProbePhase) -> Self {
        Self {
            phase,
            filename: None,
            request_url: None,
        }
    }

    pub fn upload(phase: ProbePhase, filename: &str, request_url: &str) -> Self {
        Self {
            phase,
            filename: Some(filename.to_string()),
            request_url: Some(request_url.to_string()),
        }
    }

    pub fn access(filename: &str, url: &str) -> Self {
        Self::upload(ProbePhase::Access, filename, url)
    }
}

/// Result of comparing a response with the baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockingAnalysis {
    pub blocked: bool,
    pub block_type: Option<String>,
    pub confidence: f64,
    pub evidence: Vec<String>,
}

/// A technique whose success a strategy has confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassTechnique {
    NullByte,
    DoubleExtension,
    CaseManipulation,
    MagicBytes,
    ContentTypeOverride,
    HtaccessOverride,
}

impl BypassTechnique {
    fn observation_type(&self) -> ObservationType {
        match self {
            BypassTechnique::NullByte => ObservationType::NullByteSuccess,
            BypassTechnique::DoubleExtension => ObservationType::DoubleExtensionSuccess,
            BypassTechnique::CaseManipulation => ObservationType::CaseManipulationSuccess,
            BypassTechnique::MagicBytes => ObservationType::MagicBytesSuccess,
            BypassTechnique::ContentTypeOverride => ObservationType::ContentTypeBypassSuccess,
            BypassTechnique::HtaccessOverride => ObservationType::HtaccessOverrideSuccess,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Observer {
    matcher: PatternMatcher,
    fingerprinter: Fingerprinter,
    policy: ConfidencePolicy,
    /// Fingerprints not yet confident enough to store.
    partial_fingerprints: Vec<TechStack>,
}

impl Observer {
    pub fn new() -> Self {
        Self {
            matcher: PatternMatcher::new(),
            fingerprinter: Fingerprinter::new(),
            policy: STANDARD_POLICY,
            partial_fingerprints: Vec::new(),
        }
    }

    pub fn with_marker(mut self, marker: &str) -> Self {
        self.matcher = self.matcher.with_marker(marker);
        self
    }

    pub fn with_policy(mut self, policy: ConfidencePolicy) -> Self {
        self.fingerprinter = Fingerprinter::with_policy(policy.fingerprint);
        self.policy = policy;
        self
    }

    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    /// Analyze one response. Tech stack and WAF profile are written into
    /// `context` on first confident detection; the returned batch is not
    /// recorded, callers add it to the context.
    pub fn analyze_response(
        &mut self,
        response: &HttpResponse,
        context: &mut AttackContext,
        payload: &PayloadInfo,
    ) -> Vec<Observation> {
        let mut batch = Vec::new();

        if payload.phase == ProbePhase::Baseline {
            batch.push(
                self.observation(ObservationType::BaselineEstablished, 0.9)
                    .with_evidence(format!("Baseline HTTP {}", response.status_code))
                    .with_metadata("status", response.status_code.to_string())
                    .with_metadata("length", response.body.len().to_string()),
            );
        }

        let errors = self.matcher.match_errors(&response.body);

        if payload.phase.is_upload_response() {
            let classified = self.classify_upload(response, &errors);
            let success_classified = classified
                .as_ref()
                .is_some_and(|o| o.observation_type() == ObservationType::UploadSuccess);
            batch.extend(classified);
            batch.extend(
                self.map_errors(&errors)
                    .into_iter()
                    .filter(|o| !(success_classified && o.observation_type() == ObservationType::UploadSuccess)),
            );

            if let Some(baseline) = context.baseline_response() {
                let blocking = self.detect_blocking(response, baseline);
                if blocking.blocked {
                    let mut obs = self
                        .observation(ObservationType::FilterDetected, blocking.confidence)
                        .with_metadata("confidence", format!("{:.2}", blocking.confidence));
                    if let Some(block_type) = &blocking.block_type {
                        obs = obs.with_metadata("block_type", block_type.clone());
                    }
                    for evidence in blocking.evidence {
                        obs.add_evidence(evidence);
                    }
                    batch.push(obs);
                }
            }
        }

        batch.extend(self.detect_tech_and_waf(response, context));

        if payload.phase == ProbePhase::Access && (200..300).contains(&response.status_code) {
            batch.extend(self.analyze_execution(response, payload));
        }

        if payload.phase == ProbePhase::Upload {
            self.extract_upload_path(response, payload, &mut batch);
        }

        batch.extend(self.content_heuristics(response));

        for obs in &mut batch {
            if obs.uploaded_filename.is_none() {
                obs.uploaded_filename = payload.filename.clone();
            }
        }

        debug!(
            "[{}] HTTP {} -> {} observation(s)",
            payload.phase.as_str(),
            response.status_code,
            batch.len()
        );
        batch
    }

    /// Confirm a bypass technique a strategy proved to work.
    pub fn confirm_bypass(
        &self,
        technique: BypassTechnique,
        filename: &str,
        file_url: Option<&str>,
    ) -> Observation {
        let mut obs = Observation::new(technique.observation_type(), ConfidenceLevel::High)
            .with_evidence(format!("Executed upload {}", filename));
        obs.uploaded_filename = Some(filename.to_string());
        obs.file_url = file_url.map(str::to_string);
        obs.execution_confirmed = true;
        obs
    }

    /// Compare `response` with the baseline.
    pub fn detect_blocking(&self, response: &HttpResponse, baseline: &HttpResponse) -> BlockingAnalysis {
        let p = &self.policy.blocking;
        let mut confidence = 0.0;
        let mut evidence = Vec::new();
        let mut block_type = None;

        if baseline.status_code == 200 && matches!(response.status_code, 403 | 406 | 500) {
            confidence += p.status_rejection_weight;
            block_type = Some("status_code_rejection".to_string());
            evidence.push(format!(
                "Status changed {} -> {}",
                baseline.status_code, response.status_code
            ));
        }

        let baseline_len = baseline.body.len() as f64;
        let delta = (response.body.len() as f64 - baseline_len).abs();
        if baseline_len > 0.0 && delta > baseline_len * p.length_delta_ratio {
            confidence += p.length_delta_weight;
            evidence.push(format!(
                "Length changed {} -> {}",
                baseline.body.len(),
                response.body.len()
            ));
        }

        for error in self.matcher.match_errors(&response.body) {
            if error.label == "upload_success" {
                continue;
            }
            confidence += error.confidence * p.error_pattern_factor;
            evidence.push(format!("Error pattern: {}", error.label));
            if block_type.is_none() {
                block_type = Some("content_filtering".to_string());
            }
        }

        if let Some(waf) = self
            .matcher
            .match_waf(&response.headers, &response.body, response.status_code)
            .first()
        {
            confidence += p.waf_weight;
            evidence.push(format!("WAF signature: {}", waf.vendor));
            if block_type.is_none() {
                block_type = Some("waf_block".to_string());
            }
        }

        let confidence = clamp_unit(confidence);
        let blocked = confidence > 0.0;
        BlockingAnalysis {
            blocked,
            block_type: if blocked {
                block_type.or_else(|| Some("response_anomaly".to_string()))
            } else {
                None
            },
            confidence,
            evidence,
        }
    }

    fn observation(&self, obs_type: ObservationType, confidence: f64) -> Observation {
        Observation::new(
            obs_type,
            ConfidenceLevel::from_score_with(confidence, &self.policy.levels),
        )
    }

    fn classify_upload(&self, response: &HttpResponse, errors: &[ErrorMatch]) -> Option<Observation> {
        let status = response.status_code;
        let success_keyword = errors.iter().any(|e| e.label == "upload_success");

        if matches!(status, 200 | 201) && success_keyword {
            Some(
                Observation::new(ObservationType::UploadSuccess, ConfidenceLevel::High)
                    .with_evidence(format!("HTTP {} with success message", status)),
            )
        } else if matches!(status, 302 | 303) {
            let mut obs = Observation::new(ObservationType::UploadSuccess, ConfidenceLevel::Medium)
                .with_evidence(format!("HTTP {} redirect after upload", status));
            if let Some(location) = response.header("location") {
                obs = obs.with_metadata("location", location);
            }
            Some(obs)
        } else if matches!(status, 403 | 406 | 415) {
            Some(
                Observation::new(ObservationType::UploadRejected, ConfidenceLevel::High)
                    .with_evidence(format!("HTTP {} rejected upload", status)),
            )
        } else {
            None
        }
    }

    fn map_errors(&self, errors: &[ErrorMatch]) -> Vec<Observation> {
        errors
            .iter()
            .filter_map(|error| {
                let obs_type = match error.label {
                    "extension_blocked" => ObservationType::ExtensionForced,
                    "mime_type_rejected" => ObservationType::MimeTypeRejected,
                    "size_limit" => ObservationType::SizeLimitExceeded,
                    "upload_success" => ObservationType::UploadSuccess,
                    _ => return None,
                };
                Some(
                    self.observation(obs_type, error.confidence)
                        .with_evidence(format!("Error pattern matched: {}", error.label)),
                )
            })
            .collect()
    }

    fn detect_tech_and_waf(
        &mut self,
        response: &HttpResponse,
        context: &mut AttackContext,
    ) -> Vec<Observation> {
        let mut batch = Vec::new();

        if context.tech_stack().is_none() {
            let fingerprint = self.fingerprinter.fingerprint(response);
            if !fingerprint.is_empty() && !self.partial_fingerprints.contains(&fingerprint) {
                if self.partial_fingerprints.len() == MAX_PARTIAL_FINGERPRINTS {
                    self.partial_fingerprints.remove(0);
                }
                self.partial_fingerprints.push(fingerprint);
            }
            let combined = self.fingerprinter.combine_fingerprints(&self.partial_fingerprints);
            if let Some(tech) = combined {
                if tech.confidence > self.policy.fingerprint.acceptance_threshold {
                    info!("[DETECTED] Tech stack: {} ({:.2})", tech.summary(), tech.confidence);
                    let mut obs = self
                        .observation(ObservationType::TechStackDetected, tech.confidence)
                        .with_evidence(format!("Tech stack: {}", tech.summary()));
                    for source in &tech.detection_sources {
                        obs.add_evidence(source.clone());
                    }
                    batch.push(obs);
                    context.set_tech_stack(tech);
                    self.partial_fingerprints.clear();
                }
            }
        }

        if context.waf_profile().is_none() {
            let matches =
                self.matcher
                    .match_waf(&response.headers, &response.body, response.status_code);
            if let Some(top) = matches.into_iter().next() {
                info!("[DETECTED] WAF: {} ({:.2})", top.vendor, top.confidence);
                let mut obs = self
                    .observation(ObservationType::WafDetected, top.confidence)
                    .with_evidence(format!("WAF vendor: {}", top.vendor))
                    .with_metadata("vendor", top.vendor);
                for signature in &top.signatures {
                    obs.add_evidence(signature.clone());
                }
                batch.push(obs);
                context.set_waf_profile(WafProfile {
                    detected: true,
                    vendor: top.vendor.to_string(),
                    confidence: top.confidence,
                    signatures: top.signatures,
                    bypass_techniques: top.bypass_techniques,
                });
            }
        }

        batch
    }

    fn analyze_execution(&self, response: &HttpResponse, payload: &PayloadInfo) -> Vec<Observation> {
        let check = self.matcher.check_execution(&response.body);
        let file_url = payload.request_url.clone();

        if check.executed {
            let mut obs = self
                .observation(ObservationType::CodeExecutionDetected, check.confidence)
                .with_evidence(check.evidence);
            obs.execution_confirmed = true;
            obs.file_url = file_url;
            vec![obs]
        } else if check.confidence >= 0.9 {
            let mut obs = self
                .observation(ObservationType::FileReadConfirmed, check.confidence)
                .with_evidence(check.evidence);
            obs.file_url = file_url;
            vec![obs]
        } else {
            Vec::new()
        }
    }

    /// Attach the recovered stored name and URL to the batch's upload
    /// successes, and flag a null byte that truncated the stored name.
    fn extract_upload_path(
        &self,
        response: &HttpResponse,
        payload: &PayloadInfo,
        batch: &mut Vec<Observation>,
    ) {
        let Some(path) = self.find_upload_path(response, payload) else {
            return;
        };

        let stored = path
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let file_url = resolve_url(payload.request_url.as_deref(), &path);

        for obs in batch.iter_mut() {
            if obs.observation_type() == ObservationType::UploadSuccess {
                obs.stored_filename = stored.clone();
                obs.file_url = file_url.clone();
                obs.add_evidence(format!("Stored at {}", path));
            }
        }

        if let (Some(uploaded), Some(stored)) = (payload.filename.as_deref(), stored.as_deref()) {
            if let Some(prefix) = null_byte_prefix(uploaded) {
                if stored == prefix {
                    let mut obs =
                        Observation::new(ObservationType::NullByteRemoved, ConfidenceLevel::Medium)
                            .with_evidence(format!("{} stored as {}", uploaded, stored));
                    obs.stored_filename = Some(stored.to_string());
                    obs.file_url = file_url;
                    batch.push(obs);
                }
            }
        }
    }

    fn find_upload_path(&self, response: &HttpResponse, payload: &PayloadInfo) -> Option<String> {
        let stem = payload.filename.as_deref().and_then(upload_stem);

        if let Some(location) = response.header("location") {
            if names_stored_file(&location, stem) {
                return Some(location);
            }
        }

        let paths = self.matcher.extract_upload_paths(&response.body);
        if !paths.is_empty() {
            let preferred = stem.and_then(|stem| paths.iter().find(|p| p.contains(stem)));
            return preferred.or_else(|| paths.first()).cloned();
        }

        let json: Value = serde_json::from_str(&response.body).ok()?;
        let object = json.as_object()?;
        object.iter().find_map(|(key, value)| {
            let key = key.to_ascii_lowercase();
            if JSON_PATH_KEYS.contains(&key.as_str()) {
                value.as_str().filter(|s| !s.is_empty()).map(str::to_string)
            } else {
                None
            }
        })
    }

    fn content_heuristics(&self, response: &HttpResponse) -> Vec<Observation> {
        let len = response.body.len();
        if len > LARGE_BODY_BYTES {
            vec![Observation::new(ObservationType::StructuralChange, ConfidenceLevel::Medium)
                .with_evidence("Large response: possible inclusion/leak")
                .with_metadata("length", len.to_string())]
        } else if len < TINY_BODY_BYTES {
            vec![Observation::new(ObservationType::StructuralChange, ConfidenceLevel::Low)
                .with_evidence("Tiny response: possible silent execution")
                .with_metadata("length", len.to_string())]
        } else {
            Vec::new()
        }
    }
}

impl Default for Observer {
    fn default() -> Self {
        Self::new()
    }
}

/// The part of `filename` before an injected null byte, if there is one.
fn null_byte_prefix(filename: &str) -> Option<&str> {
    let idx = filename.find("%00").or_else(|| filename.find('\0'))?;
    Some(&filename[..idx])
}

/// `exploit` for `exploit.php%00.jpg`.
fn upload_stem(filename: &str) -> Option<&str> {
    filename.split(['.', '%', '\0']).next().filter(|s| !s.is_empty())
}

/// A redirect target names the stored file only when its last segment has
/// an extension or carries the uploaded stem. `/my-account` does neither.
fn names_stored_file(location: &str, stem: Option<&str>) -> bool {
    let path = location.split(['?', '#']).next().unwrap_or(location);
    let Some(last) = path.rsplit('/').next().filter(|s| !s.is_empty()) else {
        return false;
    };
    let has_extension = last.rfind('.').is_some_and(|idx| idx > 0 && idx + 1 < last.len());
    has_extension || stem.is_some_and(|stem| last.contains(stem))
}

fn resolve_url(request_url: Option<&str>, path: &str) -> Option<String> {
    if let Ok(url) = Url::parse(path) {
        return Some(url.to_string());
    }
    let base = Url::parse(request_url?).ok()?;
    base.join(path).ok().map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(batch: &[Observation]) -> Vec<ObservationType> {
        batch.iter().map(|o| o.observation_type()).collect()
    }

    fn recon(filename: &str) -> PayloadInfo {
        PayloadInfo::upload(ProbePhase::Recon, filename, "https://lab.test/my-account/avatar")
    }

    #[test]
    fn test_blocking_status_rejection() {
        let observer = Observer::new();
        let baseline = HttpResponse::new(200, "The file avatars/baseline.jpg has been uploaded.");
        let blocked = HttpResponse::new(403, "Forbidden");
        let analysis = observer.detect_blocking(&blocked, &baseline);
        assert!(analysis.blocked);
        assert_eq!(analysis.block_type.as_deref(), Some("status_code_rejection"));
        assert!(analysis.confidence > 0.0 && analysis.confidence <= 1.0);
    }

    #[test]
    fn test_blocking_same_response_is_clean() {
        let observer = Observer::new();
        let baseline = HttpResponse::new(200, "The file has been uploaded.");
        let analysis = observer.detect_blocking(&baseline.clone(), &baseline);
        assert!(!analysis.blocked);
        assert!(analysis.block_type.is_none());
    }

    #[test]
    fn test_rejected_probe_observations() {
        let mut observer = Observer::new();
        let mut ctx = AttackContext::new("https://lab.test/my-account/avatar", "https://lab.test");
        ctx.set_baseline_response(HttpResponse::new(200, "File uploaded successfully uploaded"));

        let response = HttpResponse::new(403, "Sorry, invalid file type. Only JPG & PNG files are allowed.");
        let batch = observer.analyze_response(&response, &mut ctx, &recon("test.php"));
        let found = types(&batch);

        assert!(found.contains(&ObservationType::UploadRejected));
        assert!(found.contains(&ObservationType::ExtensionForced));
        assert!(found.contains(&ObservationType::FilterDetected));
        let filter = batch
            .iter()
            .find(|o| o.observation_type() == ObservationType::FilterDetected)
            .unwrap();
        assert_eq!(filter.metadata.get("block_type").map(String::as_str), Some("status_code_rejection"));
        assert!(batch.iter().all(|o| o.uploaded_filename.as_deref() == Some("test.php")));
    }

    #[test]
    fn test_redirect_is_medium_success() {
        let mut observer = Observer::new();
        let mut ctx = AttackContext::new("u", "b");
        let response = HttpResponse::new(302, "").with_header("Location", "/my-account");
        let batch = observer.analyze_response(&response, &mut ctx, &recon("a.jpg"));
        let success = batch
            .iter()
            .find(|o| o.observation_type() == ObservationType::UploadSuccess)
            .unwrap();
        assert_eq!(success.confidence(), ConfidenceLevel::Medium);
    }

    #[test]
    fn test_redirect_to_account_page_is_not_a_file_location() {
        let mut observer = Observer::new();
        let mut ctx = AttackContext::new("https://lab.test/my-account/avatar", "https://lab.test");
        let info = PayloadInfo::upload(ProbePhase::Upload, "exploit.php%00.jpg", ctx.target_url());

        let response = HttpResponse::new(302, "").with_header("Location", "/my-account?id=wiener");
        let batch = observer.analyze_response(&response, &mut ctx, &info);
        let success = batch
            .iter()
            .find(|o| o.observation_type() == ObservationType::UploadSuccess)
            .unwrap();
        assert!(success.file_url.is_none());
        assert!(success.stored_filename.is_none());

        let response = HttpResponse::new(302, "").with_header("Location", "/files/avatars/exploit.php");
        let batch = observer.analyze_response(&response, &mut ctx, &info);
        let success = batch
            .iter()
            .find(|o| o.observation_type() == ObservationType::UploadSuccess)
            .unwrap();
        assert_eq!(
            success.file_url.as_deref(),
            Some("https://lab.test/files/avatars/exploit.php")
        );
        assert!(types(&batch).contains(&ObservationType::NullByteRemoved));
    }

    #[test]
    fn test_names_stored_file() {
        assert!(!names_stored_file("/my-account", Some("exploit")));
        assert!(!names_stored_file("/my-account/", Some("exploit")));
        assert!(names_stored_file("/files/avatars/shell.phtml", Some("exploit")));
        assert!(names_stored_file("/uploads/exploit", Some("exploit")));
        assert!(!names_stored_file("/uploads/exploit", None));
        assert_eq!(upload_stem("exploit.php%00.jpg"), Some("exploit"));
    }

    #[test]
    fn test_tech_detection_runs_once() {
        let mut observer = Observer::new();
        let mut ctx = AttackContext::new("u", "b");
        let apache = HttpResponse::new(200, "The file has been uploaded.")
            .with_header("Server", "Apache/2.4.41")
            .with_header("X-Powered-By", "PHP/7.4.3");
        let batch = observer.analyze_response(&apache, &mut ctx, &PayloadInfo::new(ProbePhase::Baseline));
        assert!(types(&batch).contains(&ObservationType::TechStackDetected));

        let nginx = HttpResponse::new(200, "ok ok ok ok ok").with_header("Server", "nginx/1.25.0");
        let batch = observer.analyze_response(&nginx, &mut ctx, &recon("b.jpg"));
        assert!(!types(&batch).contains(&ObservationType::TechStackDetected));
        assert_eq!(ctx.tech_stack().unwrap().web_server.as_deref(), Some("Apache"));
    }

    #[test]
    fn test_partial_fingerprints_stay_bounded() {
        let mut observer = Observer::new();
        let mut ctx = AttackContext::new("u", "b");
        for i in 0..40 {
            let caddy = HttpResponse::new(200, "hello there").with_header("Server", "Caddy");
            observer.analyze_response(&caddy, &mut ctx, &recon(&format!("{}.jpg", i)));
        }
        assert_eq!(observer.partial_fingerprints.len(), 1);

        // Per-response headers defeat dedup; the list is capped instead
        for i in 0..40 {
            let request_id = format!("req-{}", i);
            let response = HttpResponse::new(200, "hello there")
                .with_header("Server", "Caddy")
                .with_header("X-Request-Id", &request_id);
            observer.analyze_response(&response, &mut ctx, &recon("a.jpg"));
        }
        assert!(ctx.tech_stack().is_none());
        assert_eq!(observer.partial_fingerprints.len(), MAX_PARTIAL_FINGERPRINTS);
    }

    #[test]
    fn test_weak_fingerprints_accumulate() {
        let mut observer = Observer::new();
        let mut ctx = AttackContext::new("u", "b");
        let server_only = HttpResponse::new(200, "hello there").with_header("Server", "Caddy");
        observer.analyze_response(&server_only, &mut ctx, &recon("a.jpg"));
        assert!(ctx.tech_stack().is_none());

        let php = HttpResponse::new(200, "hello there").with_header("X-Powered-By", "PHP/8.1.2");
        observer.analyze_response(&php, &mut ctx, &recon("b.jpg"));
        let tech = ctx.tech_stack().unwrap();
        assert_eq!(tech.web_server.as_deref(), Some("Caddy"));
        assert_eq!(tech.language_version.as_deref(), Some("8.1.2"));
    }

    #[test]
    fn test_execution_only_in_access_phase() {
        let mut observer = Observer::new();
        let mut ctx = AttackContext::new("u", "b");
        let response = HttpResponse::new(200, "EXEC_OK and more output here");

        let batch = observer.analyze_response(&response, &mut ctx, &recon("x.php"));
        assert!(!types(&batch).contains(&ObservationType::CodeExecutionDetected));

        let access = PayloadInfo::access("x.php", "https://lab.test/files/avatars/x.php");
        let batch = observer.analyze_response(&response, &mut ctx, &access);
        let exec = batch
            .iter()
            .find(|o| o.observation_type() == ObservationType::CodeExecutionDetected)
            .unwrap();
        assert!(exec.execution_confirmed);
        assert_eq!(exec.file_url.as_deref(), Some("https://lab.test/files/avatars/x.php"));
    }

    #[test]
    fn test_source_served_is_file_read() {
        let mut observer = Observer::new();
        let mut ctx = AttackContext::new("u", "b");
        let response = HttpResponse::new(200, "<?php echo file_get_contents('/home/carlos/secret'); ?>");
        let batch = observer.analyze_response(
            &response,
            &mut ctx,
            &PayloadInfo::access("x.php", "https://lab.test/files/avatars/x.php"),
        );
        assert!(types(&batch).contains(&ObservationType::FileReadConfirmed));
    }

    #[test]
    fn test_upload_path_from_body_and_null_byte_truncation() {
        let mut observer = Observer::new();
        let mut ctx = AttackContext::new("u", "b");
        let response = HttpResponse::new(
            200,
            r#"<p>The file has been uploaded.</p><img src="/files/avatars/exploit.php">"#,
        );
        let payload = PayloadInfo::upload(
            ProbePhase::Upload,
            "exploit.php%00.jpg",
            "https://lab.test/my-account/avatar",
        );
        let batch = observer.analyze_response(&response, &mut ctx, &payload);

        let success = batch
            .iter()
            .find(|o| o.observation_type() == ObservationType::UploadSuccess)
            .unwrap();
        assert_eq!(success.stored_filename.as_deref(), Some("exploit.php"));
        assert_eq!(
            success.file_url.as_deref(),
            Some("https://lab.test/files/avatars/exploit.php")
        );
        assert!(types(&batch).contains(&ObservationType::NullByteRemoved));
    }

    #[test]
    fn test_upload_path_from_json() {
        let mut observer = Observer::new();
        let mut ctx = AttackContext::new("u", "b");
        let response = HttpResponse::new(201, r#"{"status":"file uploaded","Path":"/storage/a1/x.jpg"}"#);
        let payload = PayloadInfo::upload(ProbePhase::Upload, "x.jpg", "https://api.test/v1/upload");
        let batch = observer.analyze_response(&response, &mut ctx, &payload);
        let success = batch
            .iter()
            .find(|o| o.observation_type() == ObservationType::UploadSuccess)
            .unwrap();
        assert_eq!(success.file_url.as_deref(), Some("https://api.test/storage/a1/x.jpg"));
    }

    #[test]
    fn test_size_heuristics() {
        let mut observer = Observer::new();
        let mut ctx = AttackContext::new("u", "b");
        let tiny = HttpResponse::new(204, "");
        let batch = observer.analyze_response(&tiny, &mut ctx, &recon("a.jpg"));
        let structural = batch
            .iter()
            .find(|o| o.observation_type() == ObservationType::StructuralChange)
            .unwrap();
        assert_eq!(structural.confidence(), ConfidenceLevel::Low);

        let large = HttpResponse::new(200, "x".repeat(60_000));
        let batch = observer.analyze_response(&large, &mut ctx, &recon("a.jpg"));
        assert!(batch.iter().any(|o| o.observation_type() == ObservationType::StructuralChange
            && o.confidence() == ConfidenceLevel::Medium));
    }

    #[test]
    fn test_confirm_bypass() {
        let observer = Observer::new();
        let obs = observer.confirm_bypass(BypassTechnique::NullByte, "exploit.php%00.jpg", None);
        assert_eq!(obs.observation_type(), ObservationType::NullByteSuccess);
        assert!(obs.execution_confirmed);
        assert!(obs.is_security_critical());
    }
}
