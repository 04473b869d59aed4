//! Simulate command implementation.
//!
//! Wires the full write path against in-process nodes: a mutation is
//! committed to an in-memory transaction log, applied by the ingest
//! processor and fanned out to every replica of the active shard.

use crate::core::config::Config;
use crate::ingest::{ApplyOutcome, IngestProcessor};
use crate::mock::{
    MockIndexStorage, MockIndexingTransport, MockReader, MockSidecar, StaticTopology,
};
use crate::model::{
    IndexMessage, NodeId, ObservedCount, ResourcePayload, ShardId, ShardObject, ShardReplica,
};
use crate::node::{Node, NodeRegistry};
use crate::ops::metrics::{MetricsSnapshot, WritePathMetrics};
use crate::partition::{InMemoryTransactionLog, Mutation, TransactionLog};
use crate::shard::{ReadinessProbe, ReadinessReport, ShardCache, ShardManager, ShardServices};
use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::sync::Arc;

/// Run one add (and optionally a delete) against in-process replicas.
#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Number of replicas of the simulated shard.
    #[arg(long, default_value_t = 2)]
    pub replicas: usize,

    /// Knowledge box id.
    #[arg(long, default_value = "kb-sim")]
    pub kbid: String,

    /// Resource id.
    #[arg(long, default_value = "resource-1")]
    pub rid: String,

    /// Resource count the first replica's sidecar reports; replica i reports base + i.
    #[arg(long, default_value_t = 10)]
    pub base_count: u64,

    /// Node whose sidecar count queries fail (repeatable).
    #[arg(long = "fail-count-on")]
    pub fail_count_on: Vec<String>,

    /// Node whose indexing submissions fail (repeatable).
    #[arg(long = "fail-index-on")]
    pub fail_index_on: Vec<String>,

    /// Delete the resource after indexing it.
    #[arg(long)]
    pub delete: bool,

    /// Poll replica readers after indexing.
    #[arg(long)]
    pub probe: bool,
}

impl Default for SimulateArgs {
    fn default() -> Self {
        Self {
            replicas: 2,
            kbid: "kb-sim".to_string(),
            rid: "resource-1".to_string(),
            base_count: 10,
            fail_count_on: Vec::new(),
            fail_index_on: Vec::new(),
            delete: false,
            probe: false,
        }
    }
}

/// Outcome of a simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub shard_id: ShardId,
    pub replicas: Vec<ShardReplica>,
    pub partition: u32,
    /// Advisory count returned by the add, `-1` when unknown.
    pub observed_count: i64,
    /// Error of the add, when it failed.
    pub add_error: Option<String>,
    pub deleted: bool,
    /// Index messages accepted by the transport, in submission order.
    pub index_messages: Vec<IndexMessage>,
    pub readiness: Option<ReadinessReport>,
    pub metrics: MetricsSnapshot,
}

/// Run the simulate command.
pub async fn run_simulate(args: SimulateArgs, config: &Config) -> Result<SimulationReport> {
    if args.replicas == 0 {
        anyhow::bail!("--replicas must be > 0");
    }

    let metrics = Arc::new(WritePathMetrics::new());
    let transport = Arc::new(MockIndexingTransport::new());
    let nodes = Arc::new(NodeRegistry::new());
    let readers: Vec<Arc<MockReader>> = (0..args.replicas)
        .map(|_| Arc::new(MockReader::new()))
        .collect();

    let replicas: Vec<ShardReplica> = (1..=args.replicas)
        .map(|i| ShardReplica::new(format!("node-{i}"), format!("replica-{i}")))
        .collect();

    for (offset, (replica, reader)) in replicas.iter().zip(&readers).enumerate() {
        let sidecar = Arc::new(MockSidecar::for_node(replica.node.clone()));
        let count = args.base_count.saturating_add(offset as u64);
        sidecar.set_count(&replica.shard, count);
        if args.fail_count_on.iter().any(|n| n == replica.node.as_str()) {
            sidecar.fail_with("sidecar unavailable");
        }
        nodes.register(
            Node::new(replica.node.clone())
                .with_sidecar(sidecar)
                .with_reader(reader.clone()),
        );
    }
    for node in &args.fail_index_on {
        transport.fail_node(&NodeId::new(node.as_str()));
    }

    let services = ShardServices::new(
        transport.clone(),
        Arc::new(MockIndexStorage::new()),
        nodes.clone(),
    )
    .with_fanout(config.fanout)
    .with_metrics(metrics.clone());
    let topology = Arc::new(StaticTopology::new());
    let shard_id = ShardId::new_v4();
    topology.insert(ShardObject {
        shard_id,
        kbid: args.kbid.clone(),
        replicas: replicas.clone(),
    });
    topology.set_active(args.kbid.clone(), shard_id);

    let cache = Arc::new(ShardCache::with_metrics(
        config.shard_cache.capacity,
        metrics.clone(),
    ));
    let manager = Arc::new(ShardManager::new(cache, topology, Arc::new(services)));
    let partitioner = config.partitioning.partitioner();
    let log = InMemoryTransactionLog::new(partitioner);
    let processor = IngestProcessor::new(manager, partitioner);

    let payload = ResourcePayload::new(args.kbid.as_str(), args.rid.as_str())
        .with_text("title", "simulated resource");
    let committed = log
        .commit(Mutation::upsert(payload))
        .await
        .context("failed to commit upsert")?;
    tracing::info!(
        partition = committed.partition,
        seqid = committed.seqid,
        replicas = args.replicas,
        "simulating resource upsert"
    );

    let (observed_count, add_error) = match processor.apply(&committed).await {
        Ok(ApplyOutcome::Indexed { count }) => (count.as_i64(), None),
        Ok(other) => anyhow::bail!("unexpected apply outcome: {other:?}"),
        Err(err) => (ObservedCount::UNKNOWN, Some(err.to_string())),
    };

    for (replica, reader) in replicas.iter().zip(&readers) {
        if !transport.messages_for(&replica.node).is_empty() {
            reader.set_resources(&replica.shard, 1);
        }
    }

    let readiness = if args.probe {
        let probe = ReadinessProbe::new(
            nodes,
            config.readiness.attempts,
            config.readiness.interval(),
        );
        Some(probe.wait_ready(&replicas).await)
    } else {
        None
    };

    let mut deleted = false;
    if args.delete && add_error.is_none() {
        let committed = log
            .commit(Mutation::delete(args.kbid.as_str(), args.rid.as_str()))
            .await
            .context("failed to commit delete")?;
        processor
            .apply(&committed)
            .await
            .context("delete fan-out failed")?;
        deleted = true;
    }

    Ok(SimulationReport {
        shard_id,
        replicas,
        partition: committed.partition,
        observed_count,
        add_error,
        deleted,
        index_messages: transport
            .messages()
            .into_iter()
            .map(|submission| submission.message)
            .collect(),
        readiness,
        metrics: metrics.snapshot(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn two_replicas_report_highest_count() {
        let report = run_simulate(SimulateArgs::default(), &Config::default())
            .await
            .unwrap();
        assert_eq!(report.observed_count, 11);
        assert!(report.add_error.is_none());
        assert_eq!(report.metrics.index_messages_sent, 2);
        assert_eq!(report.index_messages.len(), 2);
    }

    #[tokio::test]
    async fn failing_sidecars_yield_unknown_count() {
        let args = SimulateArgs {
            fail_count_on: vec!["node-1".to_string(), "node-2".to_string()],
            ..Default::default()
        };
        let report = run_simulate(args, &Config::default()).await.unwrap();
        assert_eq!(report.observed_count, -1);
        assert!(report.add_error.is_none());
        assert_eq!(report.metrics.count_queries_unknown, 2);
    }

    #[tokio::test]
    async fn huge_base_count_saturates() {
        let args = SimulateArgs {
            base_count: u64::MAX,
            ..Default::default()
        };
        let report = run_simulate(args, &Config::default()).await.unwrap();
        assert_eq!(report.observed_count, i64::MAX);
    }

    #[tokio::test]
    async fn failing_transport_is_reported() {
        let args = SimulateArgs {
            fail_index_on: vec!["node-2".to_string()],
            delete: true,
            ..Default::default()
        };
        let report = run_simulate(args, &Config::default()).await.unwrap();
        assert!(report.add_error.is_some());
        assert!(!report.deleted);
        assert_eq!(report.metrics.index_failures, 1);
    }
}
