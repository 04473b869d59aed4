//! Ingest processor.
//!
//! Consumes committed mutations from the transaction log and applies them to
//! the active shard of their knowledge box. The partition cursor moves only
//! after a fan-out succeeds, so a failed apply is retried with the same
//! seqid and the index layer never sees a partition out of order.

use crate::core::error::{KbError, KbResult};
use crate::model::{ObservedCount, ResourcePayload};
use crate::partition::{CommittedMutation, MutationKind, PartitionCursor, Partitioner, SeqCheck};
use crate::shard::ShardManager;
use std::sync::Arc;

/// Result of applying one committed mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The resource was indexed on every replica.
    Indexed { count: ObservedCount },
    /// The resource was removed from every replica.
    Deleted,
    /// The seqid was applied before.
    Skipped,
}

/// Applies committed mutations in partition order.
pub struct IngestProcessor {
    shards: Arc<ShardManager>,
    cursor: Arc<PartitionCursor>,
    partitioner: Partitioner,
}

impl IngestProcessor {
    pub fn new(shards: Arc<ShardManager>, partitioner: Partitioner) -> Self {
        Self {
            shards,
            cursor: Arc::new(PartitionCursor::new()),
            partitioner,
        }
    }

    /// Share an existing cursor, e.g. one restored from a checkpoint.
    pub fn with_cursor(mut self, cursor: Arc<PartitionCursor>) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn cursor(&self) -> &Arc<PartitionCursor> {
        &self.cursor
    }

    /// Apply one committed mutation.
    pub async fn apply(&self, committed: &CommittedMutation) -> KbResult<ApplyOutcome> {
        let CommittedMutation {
            partition,
            seqid,
            mutation,
        } = committed;

        if self.cursor.check(*partition, *seqid)? == SeqCheck::AlreadyApplied {
            tracing::debug!(partition, seqid, "mutation already applied");
            return Ok(ApplyOutcome::Skipped);
        }

        if let MutationKind::Upsert { resource } = &mutation.kind {
            if resource.kbid != mutation.kbid || resource.resource_id != mutation.resource_id {
                return Err(KbError::InvalidRequest {
                    message: format!(
                        "upsert of {}/{} carries payload for {}/{}",
                        mutation.kbid, mutation.resource_id, resource.kbid, resource.resource_id
                    ),
                });
            }
        }

        let shard = self.shards.active(&mutation.kbid).await?;
        let outcome = match &mutation.kind {
            MutationKind::Upsert { resource } => {
                let count = shard.add_resource(resource, *seqid, None).await?;
                ApplyOutcome::Indexed { count }
            }
            MutationKind::Delete => {
                shard
                    .delete_resource(&mutation.resource_id, *seqid)
                    .await?;
                ApplyOutcome::Deleted
            }
        };

        self.cursor.advance(*partition, *seqid);
        tracing::info!(
            partition,
            seqid,
            kbid = %mutation.kbid,
            resource = %mutation.resource_id,
            shard_id = %shard.shard_id(),
            "mutation applied"
        );
        Ok(outcome)
    }

    /// Apply a batch in order, stopping at the first failure.
    pub async fn apply_all(&self, batch: &[CommittedMutation]) -> KbResult<Vec<ApplyOutcome>> {
        let mut outcomes = Vec::with_capacity(batch.len());
        for committed in batch {
            outcomes.push(self.apply(committed).await?);
        }
        Ok(outcomes)
    }

    /// Resubmit already-extracted content of a resource to its active shard.
    ///
    /// The transaction id is the last seqid applied on the resource's
    /// partition.
    pub async fn reindex(
        &self,
        kbid: &str,
        resource: &ResourcePayload,
        reindex_id: &str,
    ) -> KbResult<ObservedCount> {
        let partition = self.partitioner.partition_for(kbid, &resource.resource_id);
        let txid = self.cursor.last_applied(partition);
        let shard = self.shards.active(kbid).await?;
        let count = shard
            .add_resource(resource, txid, Some(reindex_id))
            .await?;
        tracing::info!(
            kbid,
            resource = %resource.resource_id,
            reindex_id,
            txid,
            "resource reindexed"
        );
        Ok(count)
    }
}

impl std::fmt::Debug for IngestProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestProcessor")
            .field("partitioner", &self.partitioner)
            .field("cursor", &self.cursor)
            .finish()
    }
}
