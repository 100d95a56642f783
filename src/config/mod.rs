// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

pub mod core;
pub mod loader;

pub use core::{
    AppConfig, DirectorSettings, HttpSettings, ObservabilityConfig, PayloadSettings, ProbeSpec,
};

pub use loader::{load_config_with_overrides, ConfigFormat, ConfigLoader};
