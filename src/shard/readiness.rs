//! Replica readiness polling.
//!
//! After a resource is indexed, replicas catch up asynchronously. The probe
//! asks each replica's reader for its shard state until every replica
//! reports at least one resource or the attempt budget runs out.

use crate::model::{ReplicaShardId, ShardReplica};
use crate::node::NodeRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Result of a readiness poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessReport {
    /// Every replica reported resources.
    pub ready: bool,
    /// Per-replica readiness, sorted by replica shard id.
    pub replicas: Vec<(ReplicaShardId, bool)>,
    /// Polling rounds performed.
    pub attempts: u32,
}

/// Polls replica readers until they report indexed resources.
#[derive(Debug, Clone)]
pub struct ReadinessProbe {
    nodes: Arc<NodeRegistry>,
    attempts: u32,
    interval: Duration,
}

impl ReadinessProbe {
    pub fn new(nodes: Arc<NodeRegistry>, attempts: u32, interval: Duration) -> Self {
        Self {
            nodes,
            attempts: attempts.max(1),
            interval,
        }
    }

    /// Poll `replicas` until each distinct replica reports `resources > 0`.
    pub async fn wait_ready(&self, replicas: &[ShardReplica]) -> ReadinessReport {
        let mut status: BTreeMap<ReplicaShardId, (&ShardReplica, bool)> = BTreeMap::new();
        for replica in replicas {
            status
                .entry(replica.shard.clone())
                .or_insert((replica, false));
        }

        let mut attempts = 0;
        while attempts < self.attempts {
            if attempts > 0 {
                tokio::time::sleep(self.interval).await;
            }
            attempts += 1;

            for (replica, ready) in status.values_mut() {
                if !*ready {
                    *ready = self.replica_ready(replica).await;
                }
            }

            if status.values().all(|(_, ready)| *ready) {
                break;
            }
        }

        let replicas: Vec<(ReplicaShardId, bool)> = status
            .into_iter()
            .map(|(shard, (_, ready))| (shard, ready))
            .collect();
        let ready = replicas.iter().all(|(_, ready)| *ready);
        if ready {
            tracing::debug!(attempts, "replicas ready");
        } else {
            tracing::warn!(
                attempts,
                pending = replicas.iter().filter(|(_, ready)| !*ready).count(),
                "replicas not ready after polling"
            );
        }

        ReadinessReport {
            ready,
            replicas,
            attempts,
        }
    }

    async fn replica_ready(&self, replica: &ShardReplica) -> bool {
        match self
            .nodes
            .reader_get_shard(&replica.node, &replica.shard)
            .await
        {
            Ok(info) => info.resources > 0,
            Err(err) => {
                tracing::debug!(
                    node_id = %replica.node,
                    shard = %replica.shard,
                    error = %err,
                    "replica state unavailable"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockReader;
    use crate::model::NodeId;
    use crate::node::Node;

    fn registry_with_reader(node: &str, reader: Arc<MockReader>) -> Arc<NodeRegistry> {
        let registry = Arc::new(NodeRegistry::new());
        registry.register(Node::new(NodeId::new(node)).with_reader(reader));
        registry
    }

    #[tokio::test]
    async fn ready_on_first_attempt() {
        let reader = Arc::new(MockReader::new());
        reader.set_resources(&ReplicaShardId::new("s1"), 1);
        let probe = ReadinessProbe::new(
            registry_with_reader("node-a", reader),
            5,
            Duration::from_millis(1),
        );

        let report = probe
            .wait_ready(&[ShardReplica::new("node-a", "s1")])
            .await;
        assert!(report.ready);
        assert_eq!(report.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_node_exhausts_attempts() {
        let reader = Arc::new(MockReader::new());
        reader.set_resources(&ReplicaShardId::new("s1"), 3);
        let probe = ReadinessProbe::new(
            registry_with_reader("node-a", reader),
            3,
            Duration::from_secs(1),
        );

        let report = probe
            .wait_ready(&[
                ShardReplica::new("node-a", "s1"),
                ShardReplica::new("ghost", "s2"),
            ])
            .await;
        assert!(!report.ready);
        assert_eq!(report.attempts, 3);
        assert_eq!(
            report.replicas,
            vec![
                (ReplicaShardId::new("s1"), true),
                (ReplicaShardId::new("s2"), false),
            ]
        );
    }

    #[tokio::test]
    async fn duplicate_replicas_are_polled_once() {
        let reader = Arc::new(MockReader::new());
        reader.set_resources(&ReplicaShardId::new("s1"), 2);
        let probe = ReadinessProbe::new(
            registry_with_reader("node-a", reader.clone()),
            2,
            Duration::from_millis(1),
        );

        let report = probe
            .wait_ready(&[
                ShardReplica::new("node-a", "s1"),
                ShardReplica::new("node-a", "s1"),
            ])
            .await;
        assert!(report.ready);
        assert_eq!(report.replicas.len(), 1);
        assert_eq!(reader.calls(), 1);
    }
}
