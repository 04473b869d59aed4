//! Shard topology and index message types.
//!
//! A knowledge box (tenant, `kbid`) owns shards. Each shard is identified by
//! a UUID and is physically stored as an ordered list of replicas, one per
//! node. Index messages are addressed at a single replica.

use crate::core::error::KbError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of a logical shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardId(Uuid);

impl ShardId {
    /// Generate a fresh random shard id.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for ShardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for ShardId {
    type Err = KbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|err| KbError::InvalidRequest {
                message: format!("invalid shard id {s:?}: {err}"),
            })
    }
}

/// Identifier of a node in the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one physical replica of a shard, as known by its node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReplicaShardId(String);

impl ReplicaShardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReplicaShardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One physical copy of a shard on one node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardReplica {
    /// Node hosting the replica.
    pub node: NodeId,
    /// Replica shard id on that node.
    pub shard: ReplicaShardId,
}

impl ShardReplica {
    pub fn new(node: impl Into<String>, shard: impl Into<String>) -> Self {
        Self {
            node: NodeId::new(node),
            shard: ReplicaShardId::new(shard),
        }
    }
}

/// Authoritative topology record of a shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardObject {
    /// Logical shard id.
    pub shard_id: ShardId,
    /// Owning knowledge box.
    pub kbid: String,
    /// Replicas in topology order.
    pub replicas: Vec<ShardReplica>,
}

/// Operation carried by an index message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexMessageKind {
    /// Insert or replace the resource in the replica.
    Upsert,
    /// Remove the resource from the replica.
    Deletion,
}

/// Envelope submitted to the indexing transport for one replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMessage {
    /// Node the message is addressed at.
    pub node: NodeId,
    /// Replica shard that must apply the message.
    pub shard: ReplicaShardId,
    /// Transaction id (seqid) of the mutation.
    pub txid: u64,
    /// Resource id.
    pub resource: String,
    /// Operation kind.
    pub kind: IndexMessageKind,
    /// Re-indexing identifier, when resubmitting already-extracted content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reindex_id: Option<String>,
    /// Storage location of the persisted payload, for upserts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
}

impl IndexMessage {
    /// Build a deletion message for one replica.
    pub fn deletion(replica: &ShardReplica, resource: impl Into<String>, txid: u64) -> Self {
        Self {
            node: replica.node.clone(),
            shard: replica.shard.clone(),
            txid,
            resource: resource.into(),
            kind: IndexMessageKind::Deletion,
            reindex_id: None,
            storage_key: None,
        }
    }
}

/// Indexable representation of a resource, sent to every replica.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePayload {
    /// Resource id.
    pub resource_id: String,
    /// Owning knowledge box.
    pub kbid: String,
    /// Replica shard this copy is addressed to.
    #[serde(default)]
    pub shard_id: Option<ReplicaShardId>,
    /// Extracted texts keyed by field id.
    #[serde(default)]
    pub texts: BTreeMap<String, String>,
    /// Resource labels.
    #[serde(default)]
    pub labels: Vec<String>,
}

impl ResourcePayload {
    pub fn new(kbid: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            kbid: kbid.into(),
            ..Default::default()
        }
    }

    /// Add an extracted text field.
    pub fn with_text(mut self, field: impl Into<String>, text: impl Into<String>) -> Self {
        self.texts.insert(field.into(), text.into());
        self
    }

    /// Address this copy of the payload to a replica shard.
    pub fn stamp_shard(&mut self, shard: &ReplicaShardId) {
        self.shard_id = Some(shard.clone());
    }
}

/// Resource-count snapshot reported by a replica's sidecar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub resources: u64,
}

/// Replica state reported by a node reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardInfo {
    pub shard: ReplicaShardId,
    pub resources: u64,
    pub paragraphs: u64,
}

/// Advisory resource count aggregated across replicas.
///
/// Holds the maximum count reported by any replica that answered, or
/// nothing when no replica answered. Unknown is never zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedCount(Option<u64>);

impl ObservedCount {
    /// Integer form of an unknown count.
    pub const UNKNOWN: i64 = -1;

    /// A count nobody reported.
    pub const fn unknown() -> Self {
        Self(None)
    }

    /// Fold a replica's reported count into the running maximum.
    pub fn observe(&mut self, resources: u64) {
        self.0 = Some(self.0.map_or(resources, |current| current.max(resources)));
    }

    /// Get the count if at least one replica answered.
    pub const fn get(&self) -> Option<u64> {
        self.0
    }

    pub const fn is_known(&self) -> bool {
        self.0.is_some()
    }

    /// Integer form: the count, or `-1` when unknown.
    pub fn as_i64(&self) -> i64 {
        self.0
            .map_or(Self::UNKNOWN, |count| i64::try_from(count).unwrap_or(i64::MAX))
    }
}

impl std::fmt::Display for ObservedCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(count) => write!(f, "{count}"),
            None => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observed_count_keeps_maximum() {
        let mut count = ObservedCount::unknown();
        assert_eq!(count.as_i64(), -1);
        count.observe(3);
        count.observe(7);
        count.observe(2);
        assert_eq!(count.get(), Some(7));
        assert_eq!(count.as_i64(), 7);
    }

    #[test]
    fn observed_zero_is_not_unknown() {
        let mut count = ObservedCount::unknown();
        count.observe(0);
        assert!(count.is_known());
        assert_eq!(count.as_i64(), 0);
        assert_eq!(count.to_string(), "0");
        assert_eq!(ObservedCount::unknown().to_string(), "unknown");
    }

    #[test]
    fn shard_id_parses_and_displays() {
        let id = ShardId::new_v4();
        let parsed: ShardId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<ShardId>().is_err());
    }

    #[test]
    fn stamping_sets_replica_shard() {
        let mut payload = ResourcePayload::new("kb1", "r1");
        assert!(payload.shard_id.is_none());
        payload.stamp_shard(&ReplicaShardId::new("replica-1"));
        assert_eq!(payload.shard_id, Some(ReplicaShardId::new("replica-1")));
    }

    #[test]
    fn index_message_kind_serializes_upper_case() {
        let json = serde_json::to_string(&IndexMessageKind::Deletion).unwrap();
        assert_eq!(json, "\"DELETION\"");
    }
}
