//! Error types for the shard write path.
//!
//! Errors split into two groups. Write-path failures (transport, storage,
//! ordering) always reach the caller: the mutation is still durable in the
//! upstream transaction log and can be retried. Advisory failures (count
//! queries against a node's sidecar) are only ever tolerated on the count path
//! and are never surfaced from `add_resource`.

use crate::model::{NodeId, ShardId};
use thiserror::Error;

/// Common error conditions of the shard write path.
#[derive(Debug, Error)]
pub enum KbError {
    /// Submitting an index message to the indexing transport failed.
    #[error("index submission to node {node_id} failed: {reason}")]
    Transport { node_id: NodeId, reason: String },

    /// Storage could not prepare the index message for a replica.
    #[error("storage failed to prepare index message for replica {replica_shard}: {reason}")]
    StoragePrepare {
        replica_shard: String,
        reason: String,
    },

    /// The node id is not present in the node registry.
    #[error("node {node_id} is not registered")]
    NodeUnavailable { node_id: NodeId },

    /// The node is registered but does not expose the requested capability.
    #[error("node {node_id} has no {capability} capability")]
    CapabilityUnavailable {
        node_id: NodeId,
        capability: Capability,
    },

    /// A call against a node capability failed.
    #[error("{capability} request to node {node_id} failed: {reason}")]
    NodeRequest {
        node_id: NodeId,
        capability: Capability,
        reason: String,
    },

    /// Topology metadata has no record of this shard.
    #[error("shard {shard_id} not found in topology metadata")]
    ShardNotFound { shard_id: ShardId },

    /// The knowledge box has no shard accepting writes.
    #[error("knowledge box {kbid} has no active shard")]
    NoActiveShard { kbid: String },

    /// Applying this seqid would skip committed mutations of the partition.
    #[error("ordering gap on partition {partition}: expected seqid {expected}, got {got}")]
    OrderingGap {
        partition: u32,
        expected: u64,
        got: u64,
    },

    /// Invalid request.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// Internal error.
    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Node capability kinds exposed through the node registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Read path (shard info used by readiness checks).
    Reader,
    /// Direct write path.
    Writer,
    /// Auxiliary counters.
    Sidecar,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reader => write!(f, "reader"),
            Self::Writer => write!(f, "writer"),
            Self::Sidecar => write!(f, "sidecar"),
        }
    }
}

impl KbError {
    /// Create a Transport error.
    pub fn transport(node_id: &NodeId, reason: impl Into<String>) -> Self {
        Self::Transport {
            node_id: node_id.clone(),
            reason: reason.into(),
        }
    }

    /// Create a StoragePrepare error.
    pub fn storage_prepare(replica_shard: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StoragePrepare {
            replica_shard: replica_shard.into(),
            reason: reason.into(),
        }
    }

    /// Create a NodeRequest error.
    pub fn node_request(
        node_id: &NodeId,
        capability: Capability,
        reason: impl Into<String>,
    ) -> Self {
        Self::NodeRequest {
            node_id: node_id.clone(),
            capability,
            reason: reason.into(),
        }
    }

    /// Create an Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if the failed operation can be retried as-is.
    ///
    /// The mutation is still recorded in the transaction log, so any failure
    /// of the index layer itself is retriable with the same seqid.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::StoragePrepare { .. }
                | Self::NodeUnavailable { .. }
                | Self::NodeRequest { .. }
                | Self::OrderingGap { .. }
        )
    }

    /// Check if this error may be swallowed by the advisory count path.
    ///
    /// Only node-level unavailability and node request failures qualify;
    /// anything else is a bug and must not be hidden.
    pub fn is_advisory_tolerated(&self) -> bool {
        matches!(
            self,
            Self::NodeUnavailable { .. }
                | Self::CapabilityUnavailable { .. }
                | Self::NodeRequest { .. }
        )
    }
}

/// Result type using KbError.
pub type KbResult<T> = Result<T, KbError>;
