//! Typed node capabilities.
//!
//! A node exposes up to three independent clients. Each accessor on
//! [`Node`](super::Node) returns either the client or an explicit
//! `CapabilityUnavailable` error; there is no dynamic attribute lookup.

use crate::core::error::KbResult;
use crate::model::{Counter, ReplicaShardId, ResourcePayload, ShardInfo};
use futures::future::BoxFuture;

/// Read-side client of a node.
pub trait ReaderClient: Send + Sync {
    /// Get the state of a replica hosted on this node.
    fn get_shard(&self, shard: &ReplicaShardId) -> BoxFuture<'_, KbResult<ShardInfo>>;
}

/// Direct write client of a node.
///
/// The shard write path never uses it: every mutation travels through the
/// indexing transport so that it is ordered by transaction id.
pub trait WriterClient: Send + Sync {
    /// Write a resource straight into the replica named by its shard id.
    fn set_resource(&self, resource: ResourcePayload) -> BoxFuture<'_, KbResult<()>>;

    /// Remove a resource straight from a replica.
    fn remove_resource(
        &self,
        shard: &ReplicaShardId,
        resource_id: &str,
    ) -> BoxFuture<'_, KbResult<()>>;
}

/// Node-local auxiliary service exposing counters.
pub trait SidecarClient: Send + Sync {
    /// Get the resource count of a replica.
    fn get_count(&self, shard: &ReplicaShardId) -> BoxFuture<'_, KbResult<Counter>>;
}
