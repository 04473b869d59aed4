//! Common test utilities.
//!
//! This module contains shared helpers for integration tests.
//! Import with `mod common;` in test files.

use kbshard::config::Config;
use kbshard::mock::{MockIndexStorage, MockIndexingTransport, MockSidecar, StaticTopology};
use kbshard::model::{NodeId, ReplicaShardId, ShardId, ShardObject, ShardReplica};
use kbshard::node::{Node, NodeRegistry};
use kbshard::ops::WritePathMetrics;
use kbshard::shard::{FanoutPolicy, Shard, ShardCache, ShardManager, ShardServices};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Write a configuration document to a temp file.
pub fn create_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file
}

/// Load a config from a temp file.
pub fn load_config(file: &NamedTempFile) -> Config {
    Config::from_file(file.path()).expect("Failed to load config")
}

/// Replica of a test shard and the count its sidecar reports.
pub struct ReplicaSpec {
    pub node: &'static str,
    pub shard: &'static str,
    /// `None` registers a sidecar that fails every query.
    pub count: Option<u64>,
}

pub fn replica(node: &'static str, shard: &'static str, count: Option<u64>) -> ReplicaSpec {
    ReplicaSpec { node, shard, count }
}

/// In-process cluster hosting one shard of knowledge box `kb1`.
pub struct TestCluster {
    pub transport: Arc<MockIndexingTransport>,
    pub storage: Arc<MockIndexStorage>,
    pub nodes: Arc<NodeRegistry>,
    pub topology: Arc<StaticTopology>,
    pub metrics: Arc<WritePathMetrics>,
    pub manager: Arc<ShardManager>,
    pub shard_id: ShardId,
}

impl TestCluster {
    pub fn new(replicas: &[ReplicaSpec], fanout: FanoutPolicy) -> Self {
        let transport = Arc::new(MockIndexingTransport::new());
        let storage = Arc::new(MockIndexStorage::new());
        let nodes = Arc::new(NodeRegistry::new());
        let metrics = Arc::new(WritePathMetrics::new());

        for entry in replicas {
            let node_id = NodeId::new(entry.node);
            let sidecar = Arc::new(MockSidecar::for_node(node_id.clone()));
            match entry.count {
                Some(count) => sidecar.set_count(&ReplicaShardId::new(entry.shard), count),
                None => sidecar.fail_with("sidecar unreachable"),
            }
            nodes.register(Node::new(node_id).with_sidecar(sidecar));
        }

        let shard_id = ShardId::new_v4();
        let topology = Arc::new(StaticTopology::new());
        topology.insert(ShardObject {
            shard_id,
            kbid: "kb1".to_string(),
            replicas: replicas
                .iter()
                .map(|entry| ShardReplica::new(entry.node, entry.shard))
                .collect(),
        });
        topology.set_active("kb1", shard_id);

        let services = ShardServices::new(transport.clone(), storage.clone(), nodes.clone())
            .with_fanout(fanout)
            .with_metrics(metrics.clone());
        let cache = Arc::new(ShardCache::with_metrics(100, metrics.clone()));
        let manager = Arc::new(ShardManager::new(cache, topology.clone(), Arc::new(services)));

        Self {
            transport,
            storage,
            nodes,
            topology,
            metrics,
            manager,
            shard_id,
        }
    }

    /// Resolve the cluster's shard.
    pub async fn shard(&self) -> Arc<Shard> {
        self.manager
            .resolve("kb1", &self.shard_id)
            .await
            .expect("Failed to resolve shard")
    }
}
