//! Process-wide node registry.
//!
//! Maps node ids to capability handles. Entries are owned by cluster
//! membership; the write path only looks nodes up.

use super::capabilities::{ReaderClient, SidecarClient, WriterClient};
use crate::core::error::{Capability, KbError, KbResult};
use crate::model::{Counter, NodeId, ReplicaShardId, ShardInfo};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Capability handle for one node.
pub struct Node {
    id: NodeId,
    reader: Option<Arc<dyn ReaderClient>>,
    writer: Option<Arc<dyn WriterClient>>,
    sidecar: Option<Arc<dyn SidecarClient>>,
}

impl Node {
    /// Create a node handle with no capabilities.
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            reader: None,
            writer: None,
            sidecar: None,
        }
    }

    pub fn with_reader(mut self, reader: Arc<dyn ReaderClient>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn with_writer(mut self, writer: Arc<dyn WriterClient>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn with_sidecar(mut self, sidecar: Arc<dyn SidecarClient>) -> Self {
        self.sidecar = Some(sidecar);
        self
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Get the reader client, or `CapabilityUnavailable`.
    pub fn reader(&self) -> KbResult<Arc<dyn ReaderClient>> {
        self.reader
            .clone()
            .ok_or_else(|| self.unavailable(Capability::Reader))
    }

    /// Get the writer client, or `CapabilityUnavailable`.
    pub fn writer(&self) -> KbResult<Arc<dyn WriterClient>> {
        self.writer
            .clone()
            .ok_or_else(|| self.unavailable(Capability::Writer))
    }

    /// Get the sidecar client, or `CapabilityUnavailable`.
    pub fn sidecar(&self) -> KbResult<Arc<dyn SidecarClient>> {
        self.sidecar
            .clone()
            .ok_or_else(|| self.unavailable(Capability::Sidecar))
    }

    fn unavailable(&self, capability: Capability) -> KbError {
        KbError::CapabilityUnavailable {
            node_id: self.id.clone(),
            capability,
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("reader", &self.reader.is_some())
            .field("writer", &self.writer.is_some())
            .field("sidecar", &self.sidecar.is_some())
            .finish()
    }
}

/// Registry of node handles keyed by node id.
#[derive(Default)]
pub struct NodeRegistry {
    nodes: RwLock<HashMap<NodeId, Arc<Node>>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node, replacing any previous handle with the same id.
    pub fn register(&self, node: Node) -> Option<Arc<Node>> {
        let id = node.id().clone();
        tracing::debug!(node_id = %id, "node registered");
        self.nodes.write().insert(id, Arc::new(node))
    }

    /// Remove a node.
    pub fn remove(&self, node_id: &NodeId) -> Option<Arc<Node>> {
        self.nodes.write().remove(node_id)
    }

    /// Look a node up.
    pub fn get(&self, node_id: &NodeId) -> Option<Arc<Node>> {
        self.nodes.read().get(node_id).cloned()
    }

    /// Look a node up, failing with `NodeUnavailable` when it is missing.
    pub fn require(&self, node_id: &NodeId) -> KbResult<Arc<Node>> {
        self.get(node_id).ok_or_else(|| KbError::NodeUnavailable {
            node_id: node_id.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Registered node ids, sorted.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Query a replica's resource count through its node's sidecar.
    pub async fn sidecar_get_count(
        &self,
        node_id: &NodeId,
        shard: &ReplicaShardId,
    ) -> KbResult<Counter> {
        let sidecar = self.require(node_id)?.sidecar()?;
        sidecar.get_count(shard).await
    }

    /// Query a replica's state through its node's reader.
    pub async fn reader_get_shard(
        &self,
        node_id: &NodeId,
        shard: &ReplicaShardId,
    ) -> KbResult<ShardInfo> {
        let reader = self.require(node_id)?.reader()?;
        reader.get_shard(shard).await
    }

    /// Query a replica's count for advisory use.
    ///
    /// Never fails: any error becomes [`CountOutcome::Unknown`]. Errors that
    /// are not node-level unavailability are logged at error level so they
    /// stay visible.
    pub async fn advisory_count(&self, node_id: &NodeId, shard: &ReplicaShardId) -> CountOutcome {
        match self.sidecar_get_count(node_id, shard).await {
            Ok(counter) => CountOutcome::Observed(counter),
            Err(err) if err.is_advisory_tolerated() => {
                tracing::warn!(
                    node_id = %node_id,
                    shard = %shard,
                    error = %err,
                    "replica count unavailable"
                );
                CountOutcome::Unknown
            }
            Err(err) => {
                tracing::error!(
                    node_id = %node_id,
                    shard = %shard,
                    error = %err,
                    "unexpected failure in replica count query"
                );
                CountOutcome::Unknown
            }
        }
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("nodes", &self.node_ids())
            .finish()
    }
}

/// Outcome of an advisory count query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountOutcome {
    /// The replica answered.
    Observed(Counter),
    /// The replica could not be asked or did not answer.
    Unknown,
}

impl CountOutcome {
    pub fn resources(&self) -> Option<u64> {
        match self {
            Self::Observed(counter) => Some(counter.resources),
            Self::Unknown => None,
        }
    }
}
