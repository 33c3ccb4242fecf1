//! Tunables for a describe cycle
//!
//! Values come from `ECS_INFO_*` environment variables and fall back to the
//! provider's documented limits.

use crate::{EcsInfoError, Result};
use serde::Deserialize;

/// Largest id count any batched description call accepts
pub const MAX_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DescribeConfig {
    /// Ids per batched description call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Concurrent description calls while recovering deregistered hosts
    #[serde(default = "default_concurrency")]
    pub recovery_concurrency: usize,

    /// Concurrent load balancer health queries
    #[serde(default = "default_concurrency")]
    pub enrichment_concurrency: usize,

    /// Concurrent task definition lookups
    #[serde(default = "default_concurrency")]
    pub definition_concurrency: usize,

    /// Region used when neither the caller nor the cluster ARN names one
    #[serde(default)]
    pub default_region: Option<String>,
}

fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}

fn default_concurrency() -> usize {
    10
}

impl Default for DescribeConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            recovery_concurrency: default_concurrency(),
            enrichment_concurrency: default_concurrency(),
            definition_concurrency: default_concurrency(),
            default_region: None,
        }
    }
}

impl DescribeConfig {
    /// Load configuration from `ECS_INFO_*` environment variables
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("ECS_INFO").try_parsing(true))
            .build()
            .map_err(|e| EcsInfoError::ConfigError(e.to_string()))?;

        let loaded: DescribeConfig = settings
            .try_deserialize()
            .map_err(|e| EcsInfoError::ConfigError(e.to_string()))?;

        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(EcsInfoError::ConfigError(format!(
                "batch_size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, self.batch_size
            )));
        }

        for (name, value) in [
            ("recovery_concurrency", self.recovery_concurrency),
            ("enrichment_concurrency", self.enrichment_concurrency),
            ("definition_concurrency", self.definition_concurrency),
        ] {
            if value == 0 {
                return Err(EcsInfoError::ConfigError(format!(
                    "{} must be at least 1",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Pick the region for a cluster: explicit, then ARN segment, then default
    pub fn region_for(&self, cluster: &str, explicit: Option<&str>) -> Option<String> {
        explicit
            .map(str::to_string)
            .or_else(|| region_from_arn(cluster))
            .or_else(|| self.default_region.clone())
    }
}

/// `arn:aws:ecs:us-east-1:123456789012:cluster/name` -> `us-east-1`
pub fn region_from_arn(arn: &str) -> Option<String> {
    let parts: Vec<&str> = arn.split(':').collect();
    if parts.len() > 5 && parts[0] == "arn" && !parts[3].is_empty() {
        Some(parts[3].to_string())
    } else {
        None
    }
}
