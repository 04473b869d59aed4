//! Shard coordinator: replica fan-out of resource mutations.
//!
//! A [`Shard`] owns the replica topology of one logical shard and fans every
//! add/delete out to each replica. It holds no state between calls; the
//! replica list is fixed at construction so cached instances can be shared by
//! concurrent callers. Topology changes build a new instance.
//!
//! # Per-replica add protocol
//!
//! 1. Check the replica's node is a registered cluster member, then stamp
//!    a copy of the payload with the replica's shard id.
//! 2. Ask storage for the replica's index message (fresh or re-index path).
//! 3. Submit the message to the indexing transport, addressed at the node.
//! 4. Ask the node's sidecar for the replica count (advisory, never fails).
//!
//! Submissions carry one transaction id per call. Ordering across calls is
//! not guaranteed here; downstream indexing is keyed by transaction id.

use crate::core::error::{KbError, KbResult};
use crate::indexing::{IndexPath, IndexStorage, IndexingTransport};
use crate::model::{
    IndexMessage, NodeId, ObservedCount, ResourcePayload, ShardId, ShardObject, ShardReplica,
};
use crate::node::{CountOutcome, NodeRegistry};
use crate::ops::metrics::WritePathMetrics;
use crate::shard::fanout::{FanoutPolicy, FanoutStrategy, ReplicaFailurePolicy};
use futures::future::{join_all, try_join_all};
use std::sync::Arc;

/// Collaborators shared by every coordinator of a process.
pub struct ShardServices {
    pub indexing: Arc<dyn IndexingTransport>,
    pub storage: Arc<dyn IndexStorage>,
    pub nodes: Arc<NodeRegistry>,
    pub metrics: Arc<WritePathMetrics>,
    pub fanout: FanoutPolicy,
}

impl ShardServices {
    /// Create services with default fan-out and fresh metrics.
    pub fn new(
        indexing: Arc<dyn IndexingTransport>,
        storage: Arc<dyn IndexStorage>,
        nodes: Arc<NodeRegistry>,
    ) -> Self {
        Self {
            indexing,
            storage,
            nodes,
            metrics: Arc::new(WritePathMetrics::new()),
            fanout: FanoutPolicy::default(),
        }
    }

    pub fn with_fanout(mut self, fanout: FanoutPolicy) -> Self {
        self.fanout = fanout;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<WritePathMetrics>) -> Self {
        self.metrics = metrics;
        self
    }
}

/// Coordinator for one logical shard.
pub struct Shard {
    shard_id: ShardId,
    kbid: String,
    replicas: Arc<[ShardReplica]>,
    services: Arc<ShardServices>,
}

impl Shard {
    /// Build a coordinator from an authoritative topology record.
    pub fn new(object: ShardObject, services: Arc<ShardServices>) -> Self {
        Self {
            shard_id: object.shard_id,
            kbid: object.kbid,
            replicas: object.replicas.into(),
            services,
        }
    }

    pub fn shard_id(&self) -> ShardId {
        self.shard_id
    }

    pub fn kbid(&self) -> &str {
        &self.kbid
    }

    /// Replicas in topology order.
    pub fn replicas(&self) -> &[ShardReplica] {
        &self.replicas
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    /// Remove a resource from every replica.
    ///
    /// Issues one deletion message per replica in topology order. The first
    /// transport failure is returned immediately.
    pub async fn delete_resource(&self, resource_id: &str, txid: u64) -> KbResult<()> {
        match self.services.fanout.strategy {
            FanoutStrategy::Sequential => {
                for replica in self.replicas.iter() {
                    self.delete_from_replica(replica, resource_id, txid).await?;
                }
            }
            FanoutStrategy::Concurrent => {
                try_join_all(
                    self.replicas
                        .iter()
                        .map(|replica| self.delete_from_replica(replica, resource_id, txid)),
                )
                .await?;
            }
        }

        tracing::debug!(
            shard_id = %self.shard_id,
            resource = resource_id,
            txid,
            replicas = self.replicas.len(),
            "resource deletion fanned out"
        );
        Ok(())
    }

    /// Index a resource on every replica.
    ///
    /// Returns the maximum resource count reported by the replicas that
    /// answered the advisory count query, or an unknown count when none did.
    /// Count query failures never fail the call. Storage and transport
    /// failures do, according to the configured [`ReplicaFailurePolicy`].
    pub async fn add_resource(
        &self,
        resource: &ResourcePayload,
        txid: u64,
        reindex_id: Option<&str>,
    ) -> KbResult<ObservedCount> {
        let path = IndexPath::for_add(txid, reindex_id);
        let fanout = self.services.fanout;

        let count = match (fanout.strategy, fanout.on_replica_failure) {
            (FanoutStrategy::Sequential, ReplicaFailurePolicy::Abort) => {
                let mut count = ObservedCount::unknown();
                for replica in self.replicas.iter() {
                    let outcome = self.add_to_replica(replica, resource, path).await?;
                    if let Some(resources) = outcome.resources() {
                        count.observe(resources);
                    }
                }
                count
            }
            (FanoutStrategy::Sequential, ReplicaFailurePolicy::Continue) => {
                let mut results = Vec::with_capacity(self.replicas.len());
                for replica in self.replicas.iter() {
                    results.push(self.add_to_replica(replica, resource, path).await);
                }
                fold_replica_results(results)?
            }
            (FanoutStrategy::Concurrent, ReplicaFailurePolicy::Abort) => {
                let outcomes = try_join_all(
                    self.replicas
                        .iter()
                        .map(|replica| self.add_to_replica(replica, resource, path)),
                )
                .await?;
                fold_replica_results(outcomes.into_iter().map(Ok).collect())?
            }
            (FanoutStrategy::Concurrent, ReplicaFailurePolicy::Continue) => {
                let results = join_all(
                    self.replicas
                        .iter()
                        .map(|replica| self.add_to_replica(replica, resource, path)),
                )
                .await;
                fold_replica_results(results)?
            }
        };

        tracing::debug!(
            shard_id = %self.shard_id,
            resource = %resource.resource_id,
            txid,
            reindex = reindex_id.is_some(),
            count = %count,
            "resource indexing fanned out"
        );
        Ok(count)
    }

    async fn add_to_replica(
        &self,
        replica: &ShardReplica,
        resource: &ResourcePayload,
        path: IndexPath<'_>,
    ) -> KbResult<CountOutcome> {
        self.require_member(replica)?;
        let mut payload = resource.clone();
        payload.stamp_shard(&replica.shard);

        let message = path
            .prepare(
                self.services.storage.as_ref(),
                payload,
                &replica.node,
                &replica.shard,
            )
            .await?;
        self.submit(message, &replica.node).await?;

        let outcome = self
            .services
            .nodes
            .advisory_count(&replica.node, &replica.shard)
            .await;
        self.services
            .metrics
            .record_count_query(matches!(outcome, CountOutcome::Observed(_)));
        Ok(outcome)
    }

    async fn delete_from_replica(
        &self,
        replica: &ShardReplica,
        resource_id: &str,
        txid: u64,
    ) -> KbResult<()> {
        self.require_member(replica)?;
        let message = IndexMessage::deletion(replica, resource_id, txid);
        self.submit(message, &replica.node).await
    }

    /// Index writes to a node outside the registry are lost writes.
    fn require_member(&self, replica: &ShardReplica) -> KbResult<()> {
        if let Err(err) = self.services.nodes.require(&replica.node) {
            self.services.metrics.record_index_failure();
            tracing::warn!(
                shard_id = %self.shard_id,
                node_id = %replica.node,
                replica = %replica.shard,
                "replica node is not registered"
            );
            return Err(err);
        }
        Ok(())
    }

    async fn submit(&self, message: IndexMessage, node: &NodeId) -> KbResult<()> {
        let shard = message.shard.clone();
        match self.services.indexing.index(message, node).await {
            Ok(()) => {
                self.services.metrics.record_index_sent();
                tracing::debug!(
                    shard_id = %self.shard_id,
                    node_id = %node,
                    replica = %shard,
                    "index message submitted"
                );
                Ok(())
            }
            Err(err) => {
                self.services.metrics.record_index_failure();
                tracing::warn!(
                    shard_id = %self.shard_id,
                    node_id = %node,
                    replica = %shard,
                    error = %err,
                    "index message submission failed"
                );
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for Shard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shard")
            .field("shard_id", &self.shard_id)
            .field("kbid", &self.kbid)
            .field("replicas", &self.replicas)
            .finish()
    }
}

/// Aggregate per-replica results in topology order.
///
/// The first error wins; otherwise the count is the maximum over the
/// replicas that answered.
fn fold_replica_results(results: Vec<KbResult<CountOutcome>>) -> KbResult<ObservedCount> {
    let mut count = ObservedCount::unknown();
    let mut first_error: Option<KbError> = None;
    for result in results {
        match result {
            Ok(outcome) => {
                if let Some(resources) = outcome.resources() {
                    count.observe(resources);
                }
            }
            Err(err) => {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(count),
    }
}
