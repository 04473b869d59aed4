//! Config command implementation.

use crate::core::config::Config;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

/// Configuration operations.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate the configuration file given with --config.
    Validate,
    /// Print the effective configuration, defaults included.
    Show {
        /// Output format (toml, json).
        #[arg(long, default_value = "toml")]
        format: String,
    },
    /// Generate a configuration template.
    Generate {
        /// Output file path.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Environment (dev, prod).
        #[arg(long, default_value = "dev")]
        env: String,
    },
}

/// Run the config command.
pub fn run_config(args: ConfigArgs, config_path: Option<&Path>) -> Result<()> {
    match args.command {
        ConfigCommand::Validate => {
            let path = config_path.context("config validate requires --config <path>")?;
            validate_config(path)
        }
        ConfigCommand::Show { format } => show_config(config_path, &format),
        ConfigCommand::Generate { output, env } => generate_config(output.as_deref(), &env),
    }
}

fn validate_config(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("Config file not found: {:?}", path);
    }

    let config = Config::from_file(path)?;
    println!("✓ Configuration is valid");
    println!("  shard_cache.capacity = {}", config.shard_cache.capacity);
    println!("  partitioning.partitions = {}", config.partitioning.partitions);
    println!(
        "  fanout = {:?} / {:?}",
        config.fanout.strategy, config.fanout.on_replica_failure
    );
    Ok(())
}

fn show_config(path: Option<&Path>, format: &str) -> Result<()> {
    let config = Config::load(path)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&config)?),
        _ => print!("{}", config.to_toml()?),
    }

    Ok(())
}

fn generate_config(output: Option<&Path>, env: &str) -> Result<()> {
    let template = match env {
        "prod" | "production" => prod_template(),
        _ => dev_template(),
    };

    match output {
        Some(path) => {
            std::fs::write(path, template)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Generated {} config template: {:?}", env, path);
        }
        None => print!("{}", template),
    }

    Ok(())
}

fn dev_template() -> &'static str {
    r#"# kbshard development configuration

[shard_cache]
capacity = 100

[fanout]
strategy = "sequential"
on_replica_failure = "abort"

[partitioning]
partitions = 1
hash_seed = 0

[readiness]
attempts = 30
interval_ms = 1000

[telemetry]
log_level = "debug"
"#
}

fn prod_template() -> &'static str {
    r#"# kbshard production configuration

[shard_cache]
capacity = 1000

[fanout]
strategy = "concurrent"
on_replica_failure = "abort"

[partitioning]
partitions = 16
hash_seed = 0

[readiness]
attempts = 30
interval_ms = 1000

[telemetry]
log_level = "info"
"#
}
