use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::FeatureSettings;
use crate::error::Result;

use super::result_codes::RulePhase;

pub const IMPROVED_BULK_VALIDATION: &str = "improved_bulk_validation";
pub const BULK_ADD_VALIDATE_PHASE2: &str = "bulk_add_validate_phase2";

/// Source of boolean feature toggles.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeatureFlagProvider: Send + Sync {
    async fn is_enabled(&self, flag: &str) -> Result<bool>;
}

/// Flags read from the `features` section of the settings.
#[derive(Debug, Clone, Default)]
pub struct SettingsFeatureFlags {
    features: FeatureSettings,
}

impl SettingsFeatureFlags {
    pub fn new(features: FeatureSettings) -> Self {
        Self { features }
    }
}

#[async_trait]
impl FeatureFlagProvider for SettingsFeatureFlags {
    async fn is_enabled(&self, flag: &str) -> Result<bool> {
        Ok(match flag {
            IMPROVED_BULK_VALIDATION => self.features.improved_bulk_validation,
            BULK_ADD_VALIDATE_PHASE2 => self.features.bulk_add_validate_phase2,
            _ => false,
        })
    }
}

/// How entities are loaded and written during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterializationStrategy {
    /// Per-record reads and writes.
    Legacy,
    /// One staged bulk fetch and batched writes.
    Optimized,
}

impl MaterializationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterializationStrategy::Legacy => "legacy",
            MaterializationStrategy::Optimized => "optimized",
        }
    }
}

/// Flag values resolved once at the start of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOptions {
    pub strategy: MaterializationStrategy,
    pub phase: RulePhase,
}

impl ValidationOptions {
    pub fn new(strategy: MaterializationStrategy, phase: RulePhase) -> Self {
        Self { strategy, phase }
    }

    pub async fn resolve(flags: &dyn FeatureFlagProvider) -> Result<Self> {
        let strategy = if flags
            .is_enabled(IMPROVED_BULK_VALIDATION)
            .await
            .map_err(|e| e.context(format!("{} feature flag", IMPROVED_BULK_VALIDATION)))?
        {
            MaterializationStrategy::Optimized
        } else {
            MaterializationStrategy::Legacy
        };

        let phase = if flags
            .is_enabled(BULK_ADD_VALIDATE_PHASE2)
            .await
            .map_err(|e| e.context(format!("{} feature flag", BULK_ADD_VALIDATE_PHASE2)))?
        {
            RulePhase::Phase2
        } else {
            RulePhase::Phase1
        };

        Ok(Self { strategy, phase })
    }
}
