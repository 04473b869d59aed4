//! Partition command implementation.

use crate::core::config::Config;
use anyhow::Result;
use clap::Args;

/// Show which transaction log partition a resource maps to.
#[derive(Args, Debug)]
pub struct PartitionArgs {
    /// Knowledge box id.
    #[arg(long)]
    pub kbid: String,

    /// Resource id.
    #[arg(long)]
    pub rid: String,
}

/// Run the partition command.
pub fn run_partition(args: PartitionArgs, config: &Config) -> Result<()> {
    let partitioner = config.partitioning.partitioner();
    let partition = partitioner.partition_for(&args.kbid, &args.rid);
    println!(
        "kbid={} rid={} partition={} (of {}, seed {})",
        args.kbid,
        args.rid,
        partition,
        partitioner.partitions(),
        partitioner.hash_seed()
    );
    Ok(())
}
