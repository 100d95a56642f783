// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Upload Intelligence Library
 * Confidence-guided file upload filter analysis
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

pub mod analysis;
pub mod auth;
pub mod config;
pub mod context;
pub mod director;
pub mod errors;
pub mod http_client;
pub mod observer;
pub mod strategies;
pub mod types;

pub use analysis::{HypothesisEngine, HypothesisRules, StrategyRanker};
pub use config::AppConfig;
pub use context::AttackContext;
pub use director::Director;
pub use errors::{ScanError, TransportError};
pub use http_client::{HttpClient, HttpResponse, Transport, UploadFile};
pub use observer::Observer;
pub use types::ScanResult;
