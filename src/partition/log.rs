//! Transaction log contract.
//!
//! The log is the durable ordering authority of the write path. Every
//! committed mutation gets a `(partition, seqid)` pair; seqids start at 1
//! and increase by exactly one per partition. The index layer uses the
//! seqid as the transaction id of every index message it sends.

use super::partitioner::Partitioner;
use crate::core::error::KbResult;
use crate::model::ResourcePayload;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Mutation of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MutationKind {
    /// Index or re-index the payload.
    Upsert { resource: ResourcePayload },
    /// Remove the resource.
    Delete,
}

/// Mutation submitted to the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutation {
    pub kbid: String,
    pub resource_id: String,
    pub kind: MutationKind,
}

impl Mutation {
    /// Upsert of a payload; ids are taken from it.
    pub fn upsert(resource: ResourcePayload) -> Self {
        Self {
            kbid: resource.kbid.clone(),
            resource_id: resource.resource_id.clone(),
            kind: MutationKind::Upsert { resource },
        }
    }

    pub fn delete(kbid: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            kbid: kbid.into(),
            resource_id: resource_id.into(),
            kind: MutationKind::Delete,
        }
    }
}

/// Mutation with its position in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedMutation {
    pub partition: u32,
    pub seqid: u64,
    pub mutation: Mutation,
}

/// Durable, per-partition ordered mutation log.
pub trait TransactionLog: Send + Sync {
    /// Commit a mutation and return its assigned position.
    fn commit(&self, mutation: Mutation) -> BoxFuture<'_, KbResult<CommittedMutation>>;
}

#[derive(Debug, Default)]
struct LogState {
    last_seqid: HashMap<u32, u64>,
    records: Vec<CommittedMutation>,
}

/// In-process transaction log.
#[derive(Debug)]
pub struct InMemoryTransactionLog {
    partitioner: Partitioner,
    state: Mutex<LogState>,
}

impl InMemoryTransactionLog {
    pub fn new(partitioner: Partitioner) -> Self {
        Self {
            partitioner,
            state: Mutex::new(LogState::default()),
        }
    }

    /// Commit synchronously.
    pub fn append(&self, mutation: Mutation) -> CommittedMutation {
        let partition = self
            .partitioner
            .partition_for(&mutation.kbid, &mutation.resource_id);

        let mut state = self.state.lock();
        let seqid = {
            let last = state.last_seqid.entry(partition).or_insert(0);
            *last += 1;
            *last
        };
        let committed = CommittedMutation {
            partition,
            seqid,
            mutation,
        };
        state.records.push(committed.clone());
        drop(state);

        tracing::debug!(
            partition,
            seqid,
            kbid = %committed.mutation.kbid,
            resource = %committed.mutation.resource_id,
            "mutation committed"
        );
        committed
    }

    /// Highest seqid committed on a partition, 0 when empty.
    pub fn last_seqid(&self, partition: u32) -> u64 {
        self.state
            .lock()
            .last_seqid
            .get(&partition)
            .copied()
            .unwrap_or(0)
    }

    /// Committed records of one partition, in commit order.
    pub fn records_for(&self, partition: u32) -> Vec<CommittedMutation> {
        self.state
            .lock()
            .records
            .iter()
            .filter(|record| record.partition == partition)
            .cloned()
            .collect()
    }

    /// Every committed record, in commit order.
    pub fn records(&self) -> Vec<CommittedMutation> {
        self.state.lock().records.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().records.is_empty()
    }
}

impl Default for InMemoryTransactionLog {
    fn default() -> Self {
        Self::new(Partitioner::default())
    }
}

impl TransactionLog for InMemoryTransactionLog {
    fn commit(&self, mutation: Mutation) -> BoxFuture<'_, KbResult<CommittedMutation>> {
        Box::pin(async move { Ok(self.append(mutation)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seqids_start_at_one_and_increase_per_partition() {
        let log = InMemoryTransactionLog::new(Partitioner::new(4, 0));
        let mut expected: HashMap<u32, u64> = HashMap::new();

        for i in 0..40 {
            let committed = log
                .commit(Mutation::delete("kb1", format!("r{i}")))
                .await
                .unwrap();
            let next = expected.entry(committed.partition).or_insert(0);
            *next += 1;
            assert_eq!(committed.seqid, *next);
        }

        for (partition, last) in expected {
            assert_eq!(log.last_seqid(partition), last);
            let seqids: Vec<u64> = log
                .records_for(partition)
                .iter()
                .map(|record| record.seqid)
                .collect();
            assert_eq!(seqids, (1..=last).collect::<Vec<_>>());
        }
    }

    #[test]
    fn same_resource_stays_on_one_partition() {
        let log = InMemoryTransactionLog::new(Partitioner::new(8, 3));
        let first = log.append(Mutation::upsert(ResourcePayload::new("kb1", "r1")));
        let second = log.append(Mutation::delete("kb1", "r1"));
        assert_eq!(first.partition, second.partition);
        assert_eq!(second.seqid, first.seqid + 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn upsert_takes_ids_from_payload() {
        let mutation = Mutation::upsert(ResourcePayload::new("kb1", "r7"));
        assert_eq!(mutation.kbid, "kb1");
        assert_eq!(mutation.resource_id, "r7");
    }
}
