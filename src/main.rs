//! kbshard - unified CLI entrypoint.
//!
//! Usage:
//!   kbshard config validate --config config/kbshard.toml
//!   kbshard config show [--format json]
//!   kbshard config generate [--env prod] [--output FILE]
//!   kbshard partition --kbid KB --rid RESOURCE [--partitions 16]
//!   kbshard simulate --replicas 3 [--fanout concurrent] [--fail-count-on node-2] [--delete] [--probe]

use anyhow::{Context, Result};
use clap::Parser;
use kbshard::cli::commands::{run_config, run_partition, run_simulate};
use kbshard::cli::{init_tracing, Cli, Commands};
use kbshard::config::{Config, ConfigOverrides};
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_ref().map(PathBuf::from);
    let overrides = cli.overrides();

    match cli.command {
        Commands::Config(args) => run_config(args, config_path.as_deref()),
        Commands::Partition(args) => {
            let config = load_config(config_path.as_deref(), &overrides)?;
            run_partition(args, &config)
        }
        Commands::Simulate(args) => {
            let config = load_config(config_path.as_deref(), &overrides)?;
            let report = run_simulate(args, &config).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            println!("{}", report.metrics.export_prometheus());
            Ok(())
        }
    }
}

/// Load the config (defaults when no path is given), apply CLI overrides and
/// start logging.
fn load_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Config> {
    let mut config =
        Config::load(path).with_context(|| format!("failed to load config from {:?}", path))?;
    config.apply_overrides(overrides);
    config.validate()?;
    init_tracing(&config.telemetry.log_level);
    Ok(config)
}
