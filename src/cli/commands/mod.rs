//! CLI command implementations.

mod config;
mod partition;
mod simulate;

pub use config::{run_config, ConfigArgs, ConfigCommand};
pub use partition::{run_partition, PartitionArgs};
pub use simulate::{run_simulate, SimulateArgs, SimulationReport};
