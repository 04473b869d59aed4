//! Indexing transport and storage contracts.
//!
//! Both collaborators are external. Storage persists a replica's payload and
//! builds the index message that points at it; the transport delivers index
//! messages to the node hosting a replica.

use crate::core::error::KbResult;
use crate::model::{IndexMessage, NodeId, ReplicaShardId, ResourcePayload};
use futures::future::BoxFuture;

/// Delivery of index messages to nodes.
pub trait IndexingTransport: Send + Sync {
    /// Submit an index message addressed at `node`.
    fn index(&self, message: IndexMessage, node: &NodeId) -> BoxFuture<'_, KbResult<()>>;
}

/// Payload persistence and index message preparation.
pub trait IndexStorage: Send + Sync {
    /// Persist a freshly submitted payload and build its index message.
    fn prepare_index(
        &self,
        resource: ResourcePayload,
        node: &NodeId,
        shard: &ReplicaShardId,
        txid: u64,
    ) -> BoxFuture<'_, KbResult<IndexMessage>>;

    /// Resubmit already-extracted content under a new indexing identifier.
    fn prepare_reindex(
        &self,
        resource: ResourcePayload,
        node: &NodeId,
        shard: &ReplicaShardId,
        reindex_id: &str,
    ) -> BoxFuture<'_, KbResult<IndexMessage>>;
}

/// Which storage path prepares an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPath<'a> {
    /// Fresh submission keyed by transaction id.
    Fresh { txid: u64 },
    /// Re-indexing of extracted content.
    Reindex { reindex_id: &'a str },
}

impl<'a> IndexPath<'a> {
    /// Pick the path for an add call.
    pub fn for_add(txid: u64, reindex_id: Option<&'a str>) -> Self {
        match reindex_id {
            Some(reindex_id) => Self::Reindex { reindex_id },
            None => Self::Fresh { txid },
        }
    }

    /// Ask storage for the replica's index message along this path.
    pub async fn prepare(
        &self,
        storage: &dyn IndexStorage,
        resource: ResourcePayload,
        node: &NodeId,
        shard: &ReplicaShardId,
    ) -> KbResult<IndexMessage> {
        match *self {
            Self::Fresh { txid } => storage.prepare_index(resource, node, shard, txid).await,
            Self::Reindex { reindex_id } => {
                storage
                    .prepare_reindex(resource, node, shard, reindex_id)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reindex_id_selects_reindex_path() {
        assert_eq!(IndexPath::for_add(42, None), IndexPath::Fresh { txid: 42 });
        assert_eq!(
            IndexPath::for_add(42, Some("reindex-1")),
            IndexPath::Reindex {
                reindex_id: "reindex-1"
            }
        );
    }
}
