//! Shard write path.
//!
//! - [`cache`] - Bounded LRU cache of shard coordinators
//! - [`coordinator`] - Replica fan-out of adds and deletes
//! - [`fanout`] - Fan-out strategy and replica failure policy
//! - [`manager`] - Lazy resolution of shard ids to coordinators
//! - [`readiness`] - Polling replicas until they report indexed resources

pub mod cache;
pub mod coordinator;
pub mod fanout;
pub mod manager;
pub mod readiness;

pub use cache::{ShardCache, DEFAULT_SHARD_CACHE_CAPACITY};
pub use coordinator::{Shard, ShardServices};
pub use fanout::{FanoutPolicy, FanoutStrategy, ReplicaFailurePolicy};
pub use manager::{ShardManager, TopologySource};
pub use readiness::{ReadinessProbe, ReadinessReport};
