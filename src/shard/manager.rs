//! Lazy shard resolution.
//!
//! Coordinators are materialized from topology metadata on first use and
//! kept in the shard cache. A topology change never mutates a live
//! coordinator; `replace` builds a new one and swaps it into the cache.

use crate::core::error::{KbError, KbResult};
use crate::model::{ShardId, ShardObject};
use crate::shard::cache::ShardCache;
use crate::shard::coordinator::{Shard, ShardServices};
use futures::future::BoxFuture;
use std::sync::Arc;

/// Authoritative shard topology metadata.
pub trait TopologySource: Send + Sync {
    /// Load the topology record of a shard owned by `kbid`.
    fn load_shard<'a>(
        &'a self,
        kbid: &'a str,
        shard_id: &'a ShardId,
    ) -> BoxFuture<'a, KbResult<Option<ShardObject>>>;

    /// Get the shard currently receiving writes for `kbid`.
    fn active_shard<'a>(&'a self, kbid: &'a str) -> BoxFuture<'a, KbResult<Option<ShardId>>>;
}

/// Resolves shard ids to cached coordinators.
pub struct ShardManager {
    cache: Arc<ShardCache<Shard>>,
    topology: Arc<dyn TopologySource>,
    services: Arc<ShardServices>,
}

impl ShardManager {
    pub fn new(
        cache: Arc<ShardCache<Shard>>,
        topology: Arc<dyn TopologySource>,
        services: Arc<ShardServices>,
    ) -> Self {
        Self {
            cache,
            topology,
            services,
        }
    }

    /// Get the coordinator of a shard, loading its topology on a cache miss.
    pub async fn resolve(&self, kbid: &str, shard_id: &ShardId) -> KbResult<Arc<Shard>> {
        if let Some(shard) = self.cache.get(shard_id) {
            return Ok(shard);
        }
        self.materialize(kbid, shard_id).await
    }

    /// Get the coordinator of the shard receiving writes for `kbid`.
    pub async fn active(&self, kbid: &str) -> KbResult<Arc<Shard>> {
        let shard_id = self
            .topology
            .active_shard(kbid)
            .await?
            .ok_or_else(|| KbError::NoActiveShard {
                kbid: kbid.to_string(),
            })?;
        self.resolve(kbid, &shard_id).await
    }

    /// Drop the cached coordinator of a shard.
    ///
    /// Operations already holding it run to completion on the old topology.
    pub fn invalidate(&self, shard_id: &ShardId) -> bool {
        let dropped = self.cache.invalidate(shard_id).is_some();
        if dropped {
            tracing::info!(shard_id = %shard_id, "shard coordinator invalidated");
        }
        dropped
    }

    /// Reload a shard's topology and swap in a fresh coordinator.
    pub async fn replace(&self, kbid: &str, shard_id: &ShardId) -> KbResult<Arc<Shard>> {
        let shard = self.materialize(kbid, shard_id).await?;
        tracing::info!(
            shard_id = %shard_id,
            kbid,
            replicas = shard.replica_count(),
            "shard coordinator replaced"
        );
        Ok(shard)
    }

    async fn materialize(&self, kbid: &str, shard_id: &ShardId) -> KbResult<Arc<Shard>> {
        let object = self
            .topology
            .load_shard(kbid, shard_id)
            .await?
            .ok_or(KbError::ShardNotFound {
                shard_id: *shard_id,
            })?;

        if object.kbid != kbid {
            return Err(KbError::InvalidRequest {
                message: format!(
                    "shard {shard_id} belongs to knowledge box {}, not {kbid}",
                    object.kbid
                ),
            });
        }

        let shard = Arc::new(Shard::new(object, self.services.clone()));
        self.cache.put(*shard_id, shard.clone());
        tracing::debug!(
            shard_id = %shard_id,
            kbid,
            replicas = shard.replica_count(),
            "shard coordinator materialized"
        );
        Ok(shard)
    }
}

impl std::fmt::Debug for ShardManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardManager")
            .field("cache", &self.cache)
            .finish()
    }
}
