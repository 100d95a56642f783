// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Technology-stack fingerprinting from single responses.
//!
//! Detection order for the language is header, then error text, then body
//! pattern. Fingerprints from several responses can be merged with
//! [`Fingerprinter::combine_fingerprints`].

use std::collections::BTreeMap;
use tracing::debug;

use super::pattern_matcher::header_lines;
use super::signatures::{ERROR_VERSION_RE, FRAMEWORK_RULES, LANGUAGE_RULES, OS_RULES, SERVER_RULES};
use crate::analysis::confidence_policy::{clamp_unit, FingerprintPolicy, STANDARD_POLICY};
use crate::http_client::HttpResponse;
use crate::types::TechStack;

/// A single detected component.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub value: String,
    pub version: Option<String>,
    pub source: String,
}

impl Detection {
    fn new(value: &str, version: Option<String>, source: &str) -> Self {
        Self {
            value: value.to_string(),
            version,
            source: source.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Fingerprinter {
    policy: FingerprintPolicy,
}

impl Fingerprinter {
    pub fn new() -> Self {
        Self {
            policy: STANDARD_POLICY.fingerprint,
        }
    }

    pub fn with_policy(policy: FingerprintPolicy) -> Self {
        Self { policy }
    }

    pub fn fingerprint(&self, response: &HttpResponse) -> TechStack {
        let headers = &response.headers;
        let body = response.body.as_str();

        let mut tech = TechStack {
            raw_headers: headers.clone(),
            ..Default::default()
        };

        if let Some(server) = self.detect_server(headers) {
            tech.detection_sources.push(format!("server: {}", server.source));
            tech.web_server = Some(server.value);
            tech.server_version = server.version;
        }

        if let Some(language) = self.detect_language(headers, body) {
            tech.detection_sources.push(format!("language: {}", language.source));
            tech.language = Some(language.value);
            tech.language_version = language.version;
        }

        if let Some(framework) = self.detect_framework(headers, body) {
            tech.detection_sources.push(format!("framework: {}", framework.source));
            tech.framework = Some(match framework.version {
                Some(v) => format!("{} {}", framework.value, v),
                None => framework.value,
            });
        }

        if let Some(os) = self.detect_os(headers, body) {
            tech.detection_sources.push(format!("os: {}", os.source));
            tech.os = Some(match os.version {
                Some(v) => format!("{} {}", os.value, v),
                None => os.value,
            });
        }

        tech.confidence = self.calculate_confidence(&tech);
        if !tech.is_empty() {
            debug!("Fingerprint: {} (confidence {:.2})", tech.summary(), tech.confidence);
        }
        tech
    }

    /// Fingerprint from error text alone, e.g. a stack trace.
    pub fn fingerprint_from_error(&self, text: &str) -> TechStack {
        let mut tech = TechStack::default();

        if let Some(language) = self.language_from_errors(text) {
            tech.detection_sources.push(format!("language: {}", language.source));
            tech.language = Some(language.value);
            tech.language_version = language.version;
        }

        if let Some(framework) = self.detect_framework(&BTreeMap::new(), text) {
            tech.detection_sources.push(format!("framework: {}", framework.source));
            tech.framework = Some(framework.value);
        }

        if let Some(os) = self.detect_os(&BTreeMap::new(), text) {
            tech.detection_sources.push(format!("os: {}", os.source));
            tech.os = Some(os.value);
        }

        tech.confidence = self.calculate_confidence(&tech);
        tech
    }

    pub fn detect_server(&self, headers: &BTreeMap<String, String>) -> Option<Detection> {
        let server = headers.get("server")?.trim();
        if server.is_empty() {
            return None;
        }

        for (name, patterns) in SERVER_RULES.iter() {
            for re in patterns {
                if let Some(caps) = re.captures(server) {
                    let version = caps.get(1).map(|m| m.as_str().to_string());
                    return Some(Detection::new(name, version, "Server header"));
                }
            }
        }

        Some(Detection::new(server, None, "Server header (unknown)"))
    }

    pub fn detect_language(
        &self,
        headers: &BTreeMap<String, String>,
        body: &str,
    ) -> Option<Detection> {
        let lines = header_lines(headers);

        for rule in LANGUAGE_RULES.iter() {
            for re in &rule.headers {
                for line in &lines {
                    if let Some(caps) = re.captures(line) {
                        let version = caps.get(1).map(|m| m.as_str().to_string());
                        return Some(Detection::new(rule.name, version, "header"));
                    }
                }
            }
        }

        if let Some(detection) = self.language_from_errors(body) {
            return Some(detection);
        }

        LANGUAGE_RULES
            .iter()
            .find(|rule| rule.body.iter().any(|re| re.is_match(body)))
            .map(|rule| Detection::new(rule.name, None, "body pattern"))
    }

    fn language_from_errors(&self, text: &str) -> Option<Detection> {
        let rule = LANGUAGE_RULES
            .iter()
            .find(|rule| rule.errors.iter().any(|re| re.is_match(text)))?;

        let version = ERROR_VERSION_RE
            .as_ref()
            .and_then(|re| re.captures(text))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());

        Some(Detection::new(rule.name, version, "error message"))
    }

    pub fn detect_framework(
        &self,
        headers: &BTreeMap<String, String>,
        body: &str,
    ) -> Option<Detection> {
        let mut text = header_lines(headers).join("\n");
        text.push('\n');
        text.push_str(body);

        for (name, patterns, version_re) in FRAMEWORK_RULES.iter() {
            if patterns.iter().any(|re| re.is_match(&text)) {
                let version = version_re
                    .as_ref()
                    .and_then(|re| re.captures(&text))
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string());
                return Some(Detection::new(name, version, "header/body pattern"));
            }
        }
        None
    }

    pub fn detect_os(&self, headers: &BTreeMap<String, String>, body: &str) -> Option<Detection> {
        let mut text = header_lines(headers).join("\n");
        text.push('\n');
        text.push_str(body);

        for (name, patterns, version_re) in OS_RULES.iter() {
            if patterns.iter().any(|re| re.is_match(&text)) {
                let version = version_re
                    .as_ref()
                    .and_then(|re| re.captures(&text))
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string());
                return Some(Detection::new(name, version, "path/keyword heuristic"));
            }
        }
        None
    }

    pub fn calculate_confidence(&self, tech: &TechStack) -> f64 {
        let p = &self.policy;
        let mut confidence = 0.0;

        if tech.web_server.is_some() {
            confidence += p.server_weight;
            if tech.server_version.is_some() {
                confidence += p.server_version_bonus;
            }
        }
        if tech.language.is_some() {
            confidence += p.language_weight;
            if tech.language_version.is_some() {
                confidence += p.language_version_bonus;
            }
        }
        if tech.framework.is_some() {
            confidence += p.framework_weight;
        }
        if tech.os.is_some() {
            confidence += p.os_weight;
        }

        if tech.component_count() >= p.multi_component_min {
            confidence *= p.multi_component_boost;
        }

        clamp_unit(confidence)
    }

    /// Merge fingerprints field by field, preferring entries that carry a
    /// version. Returns `None` for an empty slice.
    pub fn combine_fingerprints(&self, fingerprints: &[TechStack]) -> Option<TechStack> {
        if fingerprints.is_empty() {
            return None;
        }

        let mut merged = TechStack::default();

        let server = fingerprints
            .iter()
            .find(|f| f.web_server.is_some() && f.server_version.is_some())
            .or_else(|| fingerprints.iter().find(|f| f.web_server.is_some()));
        if let Some(f) = server {
            merged.web_server = f.web_server.clone();
            merged.server_version = f.server_version.clone();
        }

        let language = fingerprints
            .iter()
            .find(|f| f.language.is_some() && f.language_version.is_some())
            .or_else(|| fingerprints.iter().find(|f| f.language.is_some()));
        if let Some(f) = language {
            merged.language = f.language.clone();
            merged.language_version = f.language_version.clone();
        }

        merged.framework = fingerprints.iter().find_map(|f| f.framework.clone());
        merged.os = fingerprints.iter().find_map(|f| f.os.clone());

        for f in fingerprints {
            for source in &f.detection_sources {
                if !merged.detection_sources.contains(source) {
                    merged.detection_sources.push(source.clone());
                }
            }
            for (name, value) in &f.raw_headers {
                merged
                    .raw_headers
                    .entry(name.clone())
                    .or_insert_with(|| value.clone());
            }
        }

        merged.confidence = self.calculate_confidence(&merged);
        Some(merged)
    }
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new()
    }
}
