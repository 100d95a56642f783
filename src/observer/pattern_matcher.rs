// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use std::collections::BTreeMap;

use super::signatures::{
    compile, ERROR_RULES, EXECUTION_MARKERS, FILE_CONTENT_RULES, SOURCE_VISIBLE_RULES,
    UPLOAD_PATH_RULES, WAF_RULES,
};

const SHORT_OUTPUT_LIMIT: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMatch {
    pub label: &'static str,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WafMatch {
    pub vendor: &'static str,
    pub confidence: f64,
    pub signatures: Vec<String>,
    pub bypass_techniques: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionCheck {
    pub executed: bool,
    pub evidence: String,
    pub confidence: f64,
}

/// Stateless regex matching against the signature tables.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    execution_markers: Vec<String>,
}

impl PatternMatcher {
    pub fn new() -> Self {
        Self {
            execution_markers: EXECUTION_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// Also treat `marker` as proof that uploaded code ran.
    pub fn with_marker(mut self, marker: &str) -> Self {
        if !marker.is_empty() && !self.execution_markers.iter().any(|m| m == marker) {
            self.execution_markers.insert(0, marker.to_string());
        }
        self
    }

    /// Error categories found in `text`. Each category reports at most once.
    pub fn match_errors(&self, text: &str) -> Vec<ErrorMatch> {
        ERROR_RULES
            .iter()
            .filter(|rule| rule.patterns.iter().any(|re| re.is_match(text)))
            .map(|rule| ErrorMatch {
                label: rule.label,
                confidence: rule.confidence,
            })
            .collect()
    }

    /// Vendors matched by at least two of: header, status code, body.
    /// Sorted by confidence, highest first.
    pub fn match_waf(
        &self,
        headers: &BTreeMap<String, String>,
        body: &str,
        status_code: u16,
    ) -> Vec<WafMatch> {
        let lines = header_lines(headers);
        let mut matches = Vec::new();

        for rule in WAF_RULES.iter() {
            let sig = rule.signature;
            let mut signatures = Vec::new();
            let mut total_classes = 0usize;
            let mut matched_classes = 0usize;

            if !rule.headers.is_empty() {
                total_classes += 1;
                let hit = rule
                    .headers
                    .iter()
                    .find(|(_, re)| lines.iter().any(|line| re.is_match(line)));
                if let Some((label, _)) = hit {
                    matched_classes += 1;
                    signatures.push(format!("header:{}", label));
                }
            }

            if !sig.status_codes.is_empty() {
                total_classes += 1;
                if sig.status_codes.contains(&status_code) {
                    matched_classes += 1;
                    signatures.push(format!("status:{}", status_code));
                }
            }

            if !rule.body.is_empty() {
                total_classes += 1;
                if let Some((label, _)) = rule.body.iter().find(|(_, re)| re.is_match(body)) {
                    matched_classes += 1;
                    signatures.push(format!("body:{}", label));
                }
            }

            if matched_classes >= 2 {
                let confidence =
                    (matched_classes as f64 / total_classes as f64) * sig.confidence_boost;
                matches.push(WafMatch {
                    vendor: sig.vendor,
                    confidence: confidence.min(1.0),
                    signatures,
                    bypass_techniques: sig.bypass_techniques.iter().map(|t| t.to_string()).collect(),
                });
            }
        }

        // Stable sort keeps table order among equal confidences
        matches.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches
    }

    /// Decide whether a fetched upload ran.
    ///
    /// Visible source wins over every later signal.
    pub fn check_execution(&self, body: &str) -> ExecutionCheck {
        if let Some(re) = SOURCE_VISIBLE_RULES.iter().find(|re| re.is_match(body)) {
            return ExecutionCheck {
                executed: false,
                evidence: format!("Source code visible: {}", re.as_str()),
                confidence: 0.95,
            };
        }

        for (category, rules) in FILE_CONTENT_RULES.iter() {
            if let Some(re) = rules.iter().find(|re| re.is_match(body)) {
                return ExecutionCheck {
                    executed: true,
                    evidence: format!("System file content ({}): {}", category, re.as_str()),
                    confidence: 0.9,
                };
            }
        }

        if let Some(marker) = self.execution_markers.iter().find(|m| body.contains(m.as_str())) {
            return ExecutionCheck {
                executed: true,
                evidence: format!("Execution marker found: {}", marker),
                confidence: 0.95,
            };
        }

        let trimmed = body.trim();
        if !trimmed.is_empty() && trimmed.len() <= SHORT_OUTPUT_LIMIT && !looks_like_html(trimmed) {
            return ExecutionCheck {
                executed: true,
                evidence: "Short non-HTML output without visible source".to_string(),
                confidence: 0.6,
            };
        }

        ExecutionCheck {
            executed: false,
            evidence: "Inconclusive".to_string(),
            confidence: 0.5,
        }
    }

    /// Upload paths referenced in `text`, in discovery order, deduplicated.
    pub fn extract_upload_paths(&self, text: &str) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        for re in UPLOAD_PATH_RULES.iter() {
            for caps in re.captures_iter(text) {
                if let Some(m) = caps.get(1) {
                    let path = m.as_str().to_string();
                    if !paths.contains(&path) {
                        paths.push(path);
                    }
                }
            }
        }
        paths
    }

    /// Ad-hoc case-insensitive test; an invalid pattern never matches.
    pub fn matches(&self, pattern: &str, text: &str) -> bool {
        compile(pattern).map(|re| re.is_match(text)).unwrap_or(false)
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// `name: value` lines, one per `set-cookie` value.
pub fn header_lines(headers: &BTreeMap<String, String>) -> Vec<String> {
    let mut lines = Vec::with_capacity(headers.len());
    for (name, value) in headers {
        if name == "set-cookie" {
            lines.extend(value.lines().map(|v| format!("{}: {}", name, v)));
        } else {
            lines.push(format!("{}: {}", name, value));
        }
    }
    lines
}

fn looks_like_html(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    ["<html", "<!doctype", "<body", "<head", "<div", "<p>"]
        .iter()
        .any(|tag| lower.contains(tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_match_errors_one_per_category() {
        let matcher = PatternMatcher::new();
        let matches = matcher.match_errors("Invalid file type. Only JPG and PNG allowed");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].label, "extension_blocked");
        assert_eq!(matches[0].confidence, 0.9);
    }

    #[test]
    fn test_match_errors_independent_categories() {
        let matcher = PatternMatcher::new();
        let labels: Vec<_> = matcher
            .match_errors("Unsupported file type and file too large")
            .into_iter()
            .map(|m| m.label)
            .collect();
        assert_eq!(labels, vec!["extension_blocked", "size_limit"]);
    }

    #[test]
    fn test_waf_single_signal_is_not_reported() {
        let matcher = PatternMatcher::new();
        let h = headers(&[("CF-RAY", "7d1a2b3c4d5e6f70-AMS")]);
        assert!(matcher.match_waf(&h, "ok", 200).is_empty());
        assert!(matcher.match_waf(&BTreeMap::new(), "forbidden", 403).is_empty());
    }

    #[test]
    fn test_waf_two_signals_reported() {
        let matcher = PatternMatcher::new();
        let h = headers(&[("CF-RAY", "7d1a2b3c4d5e6f70-AMS")]);
        let matches = matcher.match_waf(&h, "Attention Required! | Cloudflare", 403);
        assert_eq!(matches[0].vendor, "Cloudflare");
        assert!((matches[0].confidence - 0.95).abs() < 1e-9);
        assert_eq!(matches[0].signatures.len(), 3);
        assert!(matches[0].bypass_techniques.contains(&"origin_ip".to_string()));
    }

    #[test]
    fn test_waf_results_sorted_descending() {
        let matcher = PatternMatcher::new();
        let h = headers(&[("X-Amzn-RequestId", "abc")]);
        let matches = matcher.match_waf(&h, "Access Denied", 403);
        assert!(!matches.is_empty());
        for pair in matches.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
        assert_eq!(matches[0].vendor, "AWS WAF");
    }

    #[test]
    fn test_source_visible_overrides_markers() {
        let matcher = PatternMatcher::new();
        let check = matcher.check_execution("<?php echo 'EXEC_OK'; ?>");
        assert!(!check.executed);
        assert_eq!(check.confidence, 0.95);
    }

    #[test]
    fn test_file_content_implies_execution() {
        let matcher = PatternMatcher::new();
        let check = matcher.check_execution("root:x:0:0:root:/root:/bin/bash\ndaemon:x:1:1");
        assert!(check.executed);
        assert_eq!(check.confidence, 0.9);
    }

    #[test]
    fn test_custom_marker() {
        let matcher = PatternMatcher::new().with_marker("PWNED_42");
        let check = matcher.check_execution("<html><body>PWNED_42</body></html>");
        assert!(check.executed);
        assert_eq!(check.confidence, 0.95);
    }

    #[test]
    fn test_short_output_heuristic_and_inconclusive() {
        let matcher = PatternMatcher::new();
        let short = matcher.check_execution("G7x9kQ2mP4vR8sT1wY6zA3bC5dE0fH2j");
        assert!(short.executed);
        assert_eq!(short.confidence, 0.6);

        let page = matcher.check_execution("<html><body>Welcome to my account</body></html>");
        assert!(!page.executed);
        assert_eq!(page.confidence, 0.5);

        assert!(!matcher.check_execution("   ").executed);
    }

    #[test]
    fn test_extract_upload_paths() {
        let matcher = PatternMatcher::new();
        let html = r#"<img src="/files/avatars/shell.php" class=avatar> see /uploads/a.png"#;
        let paths = matcher.extract_upload_paths(html);
        assert_eq!(paths[0], "/files/avatars/shell.php");
        assert!(paths.contains(&"/uploads/a.png".to_string()));
    }

    #[test]
    fn test_header_lines_split_cookies() {
        let h = headers(&[("Set-Cookie", "a=1\nPHPSESSID=xyz")]);
        let lines = header_lines(&h);
        assert_eq!(lines, vec!["set-cookie: a=1", "set-cookie: PHPSESSID=xyz"]);
    }
}
