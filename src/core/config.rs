//! Configuration parsing and validation.
//!
//! Configuration is loaded from TOML files with CLI overrides. Every section
//! is optional; an empty document yields the default configuration.

use crate::partition::Partitioner;
use crate::shard::cache::DEFAULT_SHARD_CACHE_CAPACITY;
use crate::shard::fanout::FanoutPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Shard coordinator cache.
    #[serde(default)]
    pub shard_cache: ShardCacheConfig,

    /// Replica fan-out.
    #[serde(default)]
    pub fanout: FanoutPolicy,

    /// Transaction log partitioning.
    #[serde(default)]
    pub partitioning: PartitioningConfig,

    /// Replica readiness polling.
    #[serde(default)]
    pub readiness: ReadinessConfig,

    /// Logging.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Shard cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardCacheConfig {
    /// Maximum number of live shard coordinators.
    #[serde(default = "default_shard_cache_capacity")]
    pub capacity: usize,
}

impl Default for ShardCacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_shard_cache_capacity(),
        }
    }
}

/// Partitioning configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitioningConfig {
    /// Number of transaction log partitions.
    #[serde(default = "default_partitions")]
    pub partitions: u32,

    /// Seed of the partition hash.
    #[serde(default)]
    pub hash_seed: u64,
}

impl PartitioningConfig {
    pub fn partitioner(&self) -> Partitioner {
        Partitioner::new(self.partitions, self.hash_seed)
    }
}

impl Default for PartitioningConfig {
    fn default() -> Self {
        Self {
            partitions: default_partitions(),
            hash_seed: 0,
        }
    }
}

/// Readiness polling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessConfig {
    /// Polling rounds before giving up.
    #[serde(default = "default_readiness_attempts")]
    pub attempts: u32,

    /// Pause between rounds in milliseconds.
    #[serde(default = "default_readiness_interval_ms")]
    pub interval_ms: u64,
}

impl ReadinessConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            attempts: default_readiness_attempts(),
            interval_ms: default_readiness_interval_ms(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_shard_cache_capacity() -> usize {
    DEFAULT_SHARD_CACHE_CAPACITY
}

fn default_partitions() -> u32 {
    1
}

fn default_readiness_attempts() -> u32 {
    30
}

fn default_readiness_interval_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).with_context(|| "failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).with_context(|| "failed to serialize config")
    }

    /// Apply CLI overrides to the configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref log_level) = overrides.log_level {
            self.telemetry.log_level = log_level.clone();
        }
        if let Some(capacity) = overrides.shard_cache_capacity {
            self.shard_cache.capacity = capacity;
        }
        if let Some(partitions) = overrides.partitions {
            self.partitioning.partitions = partitions;
        }
        if let Some(strategy) = overrides.fanout_strategy {
            self.fanout.strategy = strategy;
        }
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<()> {
        if self.shard_cache.capacity == 0 {
            anyhow::bail!("shard_cache.capacity must be > 0");
        }

        if self.partitioning.partitions == 0 {
            anyhow::bail!("partitioning.partitions must be > 0");
        }

        if self.readiness.attempts == 0 {
            anyhow::bail!("readiness.attempts must be > 0");
        }

        self.validate_telemetry()
    }

    fn validate_telemetry(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.telemetry.log_level.as_str()) {
            anyhow::bail!(
                "telemetry.log_level must be one of {:?}, got: {}",
                valid_levels,
                self.telemetry.log_level
            );
        }
        Ok(())
    }
}

/// CLI override options that can be applied to configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override log level.
    pub log_level: Option<String>,
    /// Override shard cache capacity.
    pub shard_cache_capacity: Option<usize>,
    /// Override partition count.
    pub partitions: Option<u32>,
    /// Override fan-out strategy.
    pub fanout_strategy: Option<crate::shard::fanout::FanoutStrategy>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shard::fanout::{FanoutStrategy, ReplicaFailurePolicy};

    #[test]
    fn empty_document_is_default() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.shard_cache.capacity, 100);
        assert_eq!(config.readiness.attempts, 30);
        assert_eq!(config.readiness.interval(), Duration::from_secs(1));
        assert_eq!(config.fanout, FanoutPolicy::sequential());
    }

    #[test]
    fn sections_parse() {
        let config = Config::from_toml(
            r#"
[shard_cache]
capacity = 8

[fanout]
strategy = "concurrent"
on_replica_failure = "continue"

[partitioning]
partitions = 4
hash_seed = 9
"#,
        )
        .unwrap();
        assert_eq!(config.shard_cache.capacity, 8);
        assert_eq!(config.fanout.strategy, FanoutStrategy::Concurrent);
        assert_eq!(
            config.fanout.on_replica_failure,
            ReplicaFailurePolicy::Continue
        );
        assert_eq!(config.partitioning.partitioner(), Partitioner::new(4, 9));
    }

    #[test]
    fn generated_config_round_trips() {
        let rendered = Config::default().to_toml().unwrap();
        assert_eq!(Config::from_toml(&rendered).unwrap(), Config::default());
    }

    #[test]
    fn overrides_apply() {
        let mut config = Config::default();
        config.apply_overrides(&ConfigOverrides {
            log_level: Some("debug".to_string()),
            partitions: Some(3),
            ..Default::default()
        });
        assert_eq!(config.telemetry.log_level, "debug");
        assert_eq!(config.partitioning.partitions, 3);
        assert_eq!(config.shard_cache.capacity, 100);
    }
}
