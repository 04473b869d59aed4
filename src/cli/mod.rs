//! Command-line interface.
//!
//! Operator tooling for the shard write path: configuration handling,
//! partition lookups and an in-process fan-out simulation.

pub mod commands;

use crate::core::config::ConfigOverrides;
use crate::shard::FanoutStrategy;
use clap::{Parser, Subcommand};

/// kbshard - knowledge-box shard write path.
#[derive(Parser, Debug)]
#[command(name = "kbshard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path.
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Override the shard cache capacity.
    #[arg(long, global = true)]
    pub cache_capacity: Option<usize>,

    /// Override the transaction log partition count.
    #[arg(long, global = true)]
    pub partitions: Option<u32>,

    /// Override the replica fan-out strategy.
    #[arg(long, global = true, value_enum)]
    pub fanout: Option<FanoutStrategy>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Config overrides carried by the global flags.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            log_level: self.log_level.clone(),
            shard_cache_capacity: self.cache_capacity,
            partitions: self.partitions,
            fanout_strategy: self.fanout,
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configuration operations.
    Config(commands::ConfigArgs),
    /// Show the transaction log partition of a resource.
    Partition(commands::PartitionArgs),
    /// Run a replica fan-out against in-process nodes.
    Simulate(commands::SimulateArgs),
}

/// Initialize the tracing subscriber if the telemetry feature is enabled.
///
/// `RUST_LOG` wins over `level`.
#[cfg(feature = "telemetry")]
pub fn init_tracing(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

#[cfg(not(feature = "telemetry"))]
pub fn init_tracing(_level: &str) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "kbshard",
            "partition",
            "--kbid",
            "kb1",
            "--rid",
            "r1",
            "--partitions",
            "4",
            "--fanout",
            "concurrent",
            "--cache-capacity",
            "12",
        ])
        .unwrap();

        let overrides = cli.overrides();
        assert_eq!(overrides.partitions, Some(4));
        assert_eq!(overrides.shard_cache_capacity, Some(12));
        assert_eq!(overrides.fanout_strategy, Some(FanoutStrategy::Concurrent));
        assert!(overrides.log_level.is_none());
    }

    #[test]
    fn unknown_fanout_is_rejected() {
        let parsed = Cli::try_parse_from(["kbshard", "--fanout", "random", "simulate"]);
        assert!(parsed.is_err());
    }
}
