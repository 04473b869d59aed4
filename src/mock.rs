//! In-process collaborators for tests and the `simulate` command.
//!
//! Every mock records what it was asked to do and can be told to fail, so
//! fan-out behavior can be asserted without a cluster.

use crate::core::error::{Capability, KbError, KbResult};
use crate::indexing::{IndexStorage, IndexingTransport};
use crate::model::{
    Counter, IndexMessage, IndexMessageKind, NodeId, ReplicaShardId, ResourcePayload, ShardId,
    ShardInfo, ShardObject,
};
use crate::node::{ReaderClient, SidecarClient, WriterClient};
use crate::shard::manager::TopologySource;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

/// Index message accepted by [`MockIndexingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub message: IndexMessage,
    pub node: NodeId,
}

/// Indexing transport that records accepted messages.
#[derive(Default)]
pub struct MockIndexingTransport {
    accepted: RwLock<Vec<Submission>>,
    failing: RwLock<HashSet<NodeId>>,
}

impl MockIndexingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every message addressed at `node`.
    pub fn fail_node(&self, node: &NodeId) {
        self.failing.write().insert(node.clone());
    }

    /// Accept messages for `node` again.
    pub fn heal_node(&self, node: &NodeId) {
        self.failing.write().remove(node);
    }

    /// Accepted messages, in submission order.
    pub fn messages(&self) -> Vec<Submission> {
        self.accepted.read().clone()
    }

    /// Accepted messages addressed at `node`.
    pub fn messages_for(&self, node: &NodeId) -> Vec<IndexMessage> {
        self.accepted
            .read()
            .iter()
            .filter(|submission| &submission.node == node)
            .map(|submission| submission.message.clone())
            .collect()
    }
}

impl IndexingTransport for MockIndexingTransport {
    fn index(&self, message: IndexMessage, node: &NodeId) -> BoxFuture<'_, KbResult<()>> {
        let result = if self.failing.read().contains(node) {
            Err(KbError::transport(node, "node rejected index message"))
        } else {
            self.accepted.write().push(Submission {
                message,
                node: node.clone(),
            });
            Ok(())
        };
        Box::pin(async move { result })
    }
}

/// Storage call recorded by [`MockIndexStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCall {
    pub payload: ResourcePayload,
    pub node: NodeId,
    pub shard: ReplicaShardId,
    /// Set on the fresh indexing path.
    pub txid: Option<u64>,
    /// Set on the re-indexing path.
    pub reindex_id: Option<String>,
}

/// Index storage that builds upsert messages without persisting anything.
#[derive(Default)]
pub struct MockIndexStorage {
    prepared: RwLock<Vec<PreparedCall>>,
    failure: RwLock<Option<String>>,
}

impl MockIndexStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every subsequent prepare call.
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.failure.write() = Some(reason.into());
    }

    /// Recorded prepare calls, in call order.
    pub fn prepared(&self) -> Vec<PreparedCall> {
        self.prepared.read().clone()
    }

    fn prepare(&self, call: PreparedCall) -> KbResult<IndexMessage> {
        if let Some(reason) = self.failure.read().clone() {
            return Err(KbError::storage_prepare(call.shard.as_str(), reason));
        }

        let version = match (&call.reindex_id, call.txid) {
            (Some(reindex_id), _) => reindex_id.clone(),
            (None, txid) => txid.unwrap_or_default().to_string(),
        };
        let message = IndexMessage {
            node: call.node.clone(),
            shard: call.shard.clone(),
            txid: call.txid.unwrap_or_default(),
            resource: call.payload.resource_id.clone(),
            kind: IndexMessageKind::Upsert,
            reindex_id: call.reindex_id.clone(),
            storage_key: Some(format!(
                "{}/{}/{}/{}",
                call.payload.kbid, call.payload.resource_id, call.shard, version
            )),
        };
        self.prepared.write().push(call);
        Ok(message)
    }
}

impl IndexStorage for MockIndexStorage {
    fn prepare_index(
        &self,
        resource: ResourcePayload,
        node: &NodeId,
        shard: &ReplicaShardId,
        txid: u64,
    ) -> BoxFuture<'_, KbResult<IndexMessage>> {
        let result = self.prepare(PreparedCall {
            payload: resource,
            node: node.clone(),
            shard: shard.clone(),
            txid: Some(txid),
            reindex_id: None,
        });
        Box::pin(async move { result })
    }

    fn prepare_reindex(
        &self,
        resource: ResourcePayload,
        node: &NodeId,
        shard: &ReplicaShardId,
        reindex_id: &str,
    ) -> BoxFuture<'_, KbResult<IndexMessage>> {
        let result = self.prepare(PreparedCall {
            payload: resource,
            node: node.clone(),
            shard: shard.clone(),
            txid: None,
            reindex_id: Some(reindex_id.to_string()),
        });
        Box::pin(async move { result })
    }
}

/// Sidecar reporting configured per-replica counts.
pub struct MockSidecar {
    node: NodeId,
    counts: RwLock<HashMap<ReplicaShardId, u64>>,
    failure: RwLock<Option<String>>,
}

impl MockSidecar {
    pub fn new() -> Self {
        Self::for_node(NodeId::new("mock-node"))
    }

    /// Sidecar whose errors name `node`.
    pub fn for_node(node: NodeId) -> Self {
        Self {
            node,
            counts: RwLock::new(HashMap::new()),
            failure: RwLock::new(None),
        }
    }

    pub fn set_count(&self, shard: &ReplicaShardId, resources: u64) {
        self.counts.write().insert(shard.clone(), resources);
    }

    /// Fail every subsequent count query.
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.failure.write() = Some(reason.into());
    }
}

impl Default for MockSidecar {
    fn default() -> Self {
        Self::new()
    }
}

impl SidecarClient for MockSidecar {
    fn get_count(&self, shard: &ReplicaShardId) -> BoxFuture<'_, KbResult<Counter>> {
        let result = match self.failure.read().clone() {
            Some(reason) => Err(KbError::node_request(&self.node, Capability::Sidecar, reason)),
            None => self
                .counts
                .read()
                .get(shard)
                .map(|resources| Counter {
                    resources: *resources,
                })
                .ok_or_else(|| {
                    KbError::node_request(
                        &self.node,
                        Capability::Sidecar,
                        format!("replica {shard} not hosted"),
                    )
                }),
        };
        Box::pin(async move { result })
    }
}

/// Reader reporting configured per-replica resource counts.
#[derive(Default)]
pub struct MockReader {
    resources: RwLock<HashMap<ReplicaShardId, u64>>,
    calls: AtomicU64,
}

impl MockReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_resources(&self, shard: &ReplicaShardId, resources: u64) {
        self.resources.write().insert(shard.clone(), resources);
    }

    /// Number of `get_shard` calls served.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl ReaderClient for MockReader {
    fn get_shard(&self, shard: &ReplicaShardId) -> BoxFuture<'_, KbResult<ShardInfo>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let resources = self.resources.read().get(shard).copied().unwrap_or(0);
        let info = ShardInfo {
            shard: shard.clone(),
            resources,
            paragraphs: resources,
        };
        Box::pin(async move { Ok(info) })
    }
}

/// Writer that records direct writes.
#[derive(Default)]
pub struct MockWriter {
    written: RwLock<Vec<ResourcePayload>>,
    removed: RwLock<Vec<(ReplicaShardId, String)>>,
}

impl MockWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> Vec<ResourcePayload> {
        self.written.read().clone()
    }

    pub fn removed(&self) -> Vec<(ReplicaShardId, String)> {
        self.removed.read().clone()
    }
}

impl WriterClient for MockWriter {
    fn set_resource(&self, resource: ResourcePayload) -> BoxFuture<'_, KbResult<()>> {
        let result = if resource.shard_id.is_none() {
            Err(KbError::InvalidRequest {
                message: format!("resource {} has no replica shard", resource.resource_id),
            })
        } else {
            self.written.write().push(resource);
            Ok(())
        };
        Box::pin(async move { result })
    }

    fn remove_resource(
        &self,
        shard: &ReplicaShardId,
        resource_id: &str,
    ) -> BoxFuture<'_, KbResult<()>> {
        self.removed
            .write()
            .push((shard.clone(), resource_id.to_string()));
        Box::pin(async move { Ok(()) })
    }
}

/// Fixed topology metadata.
#[derive(Default)]
pub struct StaticTopology {
    shards: RwLock<HashMap<ShardId, ShardObject>>,
    active: RwLock<HashMap<String, ShardId>>,
    loads: AtomicU64,
}

impl StaticTopology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a shard record.
    pub fn insert(&self, shard: ShardObject) {
        self.shards.write().insert(shard.shard_id, shard);
    }

    /// Route writes of `kbid` to `shard_id`.
    pub fn set_active(&self, kbid: impl Into<String>, shard_id: ShardId) {
        self.active.write().insert(kbid.into(), shard_id);
    }

    /// Number of `load_shard` calls served.
    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }
}

impl TopologySource for StaticTopology {
    fn load_shard<'a>(
        &'a self,
        _kbid: &'a str,
        shard_id: &'a ShardId,
    ) -> BoxFuture<'a, KbResult<Option<ShardObject>>> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        let shard = self.shards.read().get(shard_id).cloned();
        Box::pin(async move { Ok(shard) })
    }

    fn active_shard<'a>(&'a self, kbid: &'a str) -> BoxFuture<'a, KbResult<Option<ShardId>>> {
        let shard_id = self.active.read().get(kbid).copied();
        Box::pin(async move { Ok(shard_id) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writer_rejects_unstamped_payload() {
        let writer = MockWriter::new();
        assert!(writer
            .set_resource(ResourcePayload::new("kb1", "r1"))
            .await
            .is_err());

        let mut payload = ResourcePayload::new("kb1", "r1");
        payload.stamp_shard(&ReplicaShardId::new("s1"));
        writer.set_resource(payload).await.unwrap();
        writer
            .remove_resource(&ReplicaShardId::new("s1"), "r1")
            .await
            .unwrap();
        assert_eq!(writer.written().len(), 1);
        assert_eq!(
            writer.removed(),
            vec![(ReplicaShardId::new("s1"), "r1".to_string())]
        );
    }

    #[tokio::test]
    async fn storage_failure_names_replica() {
        let storage = MockIndexStorage::new();
        storage.fail_with("bucket unavailable");
        let err = storage
            .prepare_index(
                ResourcePayload::new("kb1", "r1"),
                &NodeId::new("node-a"),
                &ReplicaShardId::new("s9"),
                1,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, KbError::StoragePrepare { ref replica_shard, .. } if replica_shard == "s9"));
        assert!(storage.prepared().is_empty());
    }
}
