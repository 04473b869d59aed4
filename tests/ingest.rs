//! Ordered ingest tests: transaction log, partitioning and apply cursor.

mod common;

use common::{replica, TestCluster};
use kbshard::error::KbError;
use kbshard::ingest::{ApplyOutcome, IngestProcessor};
use kbshard::model::{IndexMessageKind, NodeId, ResourcePayload};
use kbshard::partition::{InMemoryTransactionLog, Mutation, Partitioner, TransactionLog};
use kbshard::shard::FanoutPolicy;

fn processor(cluster: &TestCluster, partitioner: Partitioner) -> IngestProcessor {
    IngestProcessor::new(cluster.manager.clone(), partitioner)
}

#[tokio::test]
async fn log_order_is_index_order_per_partition() {
    let cluster = TestCluster::new(
        &[replica("node-a", "1", Some(1)), replica("node-b", "2", Some(1))],
        FanoutPolicy::concurrent(),
    );
    let partitioner = Partitioner::new(4, 0);
    let log = InMemoryTransactionLog::new(partitioner);
    let processor = processor(&cluster, partitioner);

    for i in 0..12 {
        let rid = format!("r{i}");
        log.commit(Mutation::upsert(ResourcePayload::new("kb1", rid.as_str())))
            .await
            .unwrap();
        if i % 3 == 0 {
            log.commit(Mutation::delete("kb1", rid.as_str())).await.unwrap();
        }
    }

    let outcomes = processor.apply_all(&log.records()).await.unwrap();
    assert_eq!(outcomes.len(), log.len());
    assert_eq!(
        outcomes
            .iter()
            .filter(|outcome| **outcome == ApplyOutcome::Deleted)
            .count(),
        4
    );

    for partition in 0..4 {
        let expected: Vec<(String, u64)> = log
            .records_for(partition)
            .into_iter()
            .map(|record| (record.mutation.resource_id, record.seqid))
            .collect();
        let on_node_a: Vec<(String, u64)> = cluster
            .transport
            .messages_for(&NodeId::new("node-a"))
            .into_iter()
            .filter(|message| partitioner.partition_for("kb1", &message.resource) == partition)
            .map(|message| (message.resource, message.txid))
            .collect();
        assert_eq!(on_node_a, expected);
        assert_eq!(
            processor.cursor().last_applied(partition),
            log.last_seqid(partition)
        );
    }
}

#[tokio::test]
async fn replaying_the_log_is_idempotent() {
    let cluster = TestCluster::new(&[replica("node-a", "1", Some(1))], FanoutPolicy::sequential());
    let log = InMemoryTransactionLog::default();
    let processor = processor(&cluster, Partitioner::default());

    log.commit(Mutation::upsert(ResourcePayload::new("kb1", "r1")))
        .await
        .unwrap();
    log.commit(Mutation::delete("kb1", "r1")).await.unwrap();

    processor.apply_all(&log.records()).await.unwrap();
    let replayed = processor.apply_all(&log.records()).await.unwrap();
    assert!(replayed
        .iter()
        .all(|outcome| *outcome == ApplyOutcome::Skipped));
    assert_eq!(cluster.transport.messages().len(), 2);
}

#[tokio::test]
async fn failure_halts_batch_and_retry_resumes() {
    let cluster = TestCluster::new(&[replica("node-a", "1", Some(1))], FanoutPolicy::sequential());
    let log = InMemoryTransactionLog::default();
    let processor = processor(&cluster, Partitioner::default());

    for rid in ["r1", "r2", "r3"] {
        log.commit(Mutation::delete("kb1", rid)).await.unwrap();
    }
    let records = log.records();

    processor.apply(&records[0]).await.unwrap();
    cluster.transport.fail_node(&NodeId::new("node-a"));
    let err = processor.apply_all(&records[1..]).await.unwrap_err();
    assert!(err.is_retriable());
    assert_eq!(processor.cursor().last_applied(0), 1);

    let err = processor.apply(&records[2]).await.unwrap_err();
    assert!(matches!(err, KbError::OrderingGap { expected: 2, got: 3, .. }));

    cluster.transport.heal_node(&NodeId::new("node-a"));
    processor.apply_all(&records[1..]).await.unwrap();
    let seqids: Vec<u64> = cluster
        .transport
        .messages()
        .iter()
        .filter(|s| s.message.kind == IndexMessageKind::Deletion)
        .map(|s| s.message.txid)
        .collect();
    assert_eq!(seqids, vec![1, 2, 3]);
}
