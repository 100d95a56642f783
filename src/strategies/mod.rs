// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Upload Bypass Strategies
 * Closed set of filter bypass techniques, ranked and executed by the director
 * © 2026 Bountyy Oy
 */

pub mod case_manipulation;
pub mod common;
pub mod content_type;
pub mod double_extension;
pub mod htaccess;
pub mod magic_bytes;
pub mod null_byte;

use async_trait::async_trait;

use crate::analysis::HypothesisName;
use crate::config::PayloadSettings;
use crate::context::AttackContext;
use crate::errors::TransportError;
use crate::http_client::Transport;
use crate::observer::Observer;
use crate::types::StrategyStatus;

pub use case_manipulation::CaseManipulation;
pub use content_type::ContentTypeOverride;
pub use double_extension::DoubleExtension;
pub use htaccess::HtaccessUpload;
pub use magic_bytes::MagicBytes;
pub use null_byte::NullByte;

/// Technology a strategy needs. `version_max` is exclusive, `version_min`
/// inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TechRequirements {
    pub language: Option<&'static str>,
    pub version_min: Option<&'static str>,
    pub version_max: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyMetadata {
    pub name: &'static str,
    pub description: &'static str,
    pub targets_hypotheses: &'static [HypothesisName],
    pub tech_requirements: TechRequirements,
    pub confidence_gain: Option<f64>,
}

/// What a strategy may use while it runs.
pub struct StrategyTools<'a> {
    pub transport: &'a dyn Transport,
    pub observer: &'a mut Observer,
    pub payload: &'a PayloadSettings,
}

#[async_trait]
pub trait Strategy: Send + Sync {
    fn metadata(&self) -> &'static StrategyMetadata;

    fn name(&self) -> &'static str {
        self.metadata().name
    }

    fn applicable(&self, _context: &AttackContext) -> bool {
        true
    }

    /// Run the technique. Observations go straight into `context`; a
    /// transport error ends the attempt.
    async fn execute(
        &self,
        context: &mut AttackContext,
        tools: &mut StrategyTools<'_>,
    ) -> Result<StrategyStatus, TransportError>;
}

/// Every strategy the director can pick from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStrategy {
    Htaccess(HtaccessUpload),
    NullByte(NullByte),
    DoubleExtension(DoubleExtension),
    MagicBytes(MagicBytes),
    ContentType(ContentTypeOverride),
    CaseManipulation(CaseManipulation),
}

impl UploadStrategy {
    /// All strategies in registry order. Ranking ties resolve in this order.
    pub fn registry() -> Vec<UploadStrategy> {
        vec![
            UploadStrategy::Htaccess(HtaccessUpload),
            UploadStrategy::NullByte(NullByte),
            UploadStrategy::DoubleExtension(DoubleExtension),
            UploadStrategy::MagicBytes(MagicBytes),
            UploadStrategy::ContentType(ContentTypeOverride),
            UploadStrategy::CaseManipulation(CaseManipulation),
        ]
    }

    pub fn by_name(name: &str) -> Option<UploadStrategy> {
        Self::registry().into_iter().find(|s| s.name() == name)
    }

    fn inner(&self) -> &dyn Strategy {
        match self {
            UploadStrategy::Htaccess(s) => s,
            UploadStrategy::NullByte(s) => s,
            UploadStrategy::DoubleExtension(s) => s,
            UploadStrategy::MagicBytes(s) => s,
            UploadStrategy::ContentType(s) => s,
            UploadStrategy::CaseManipulation(s) => s,
        }
    }
}

#[async_trait]
impl Strategy for UploadStrategy {
    fn metadata(&self) -> &'static StrategyMetadata {
        self.inner().metadata()
    }

    fn applicable(&self, context: &AttackContext) -> bool {
        self.inner().applicable(context)
    }

    async fn execute(
        &self,
        context: &mut AttackContext,
        tools: &mut StrategyTools<'_>,
    ) -> Result<StrategyStatus, TransportError> {
        self.inner().execute(context, tools).await
    }
}
