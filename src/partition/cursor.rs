//! Per-partition apply cursor.
//!
//! Tracks the last seqid applied to the index layer for each partition.
//! Redelivered seqids are skipped and gaps are refused, so the index layer
//! sees every partition's mutations exactly in log order.

use crate::core::error::{KbError, KbResult};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Verdict for an incoming seqid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqCheck {
    /// The seqid directly follows the last applied one.
    Next,
    /// The seqid was already applied.
    AlreadyApplied,
}

/// Last applied seqid per partition.
#[derive(Debug, Default)]
pub struct PartitionCursor {
    applied: RwLock<HashMap<u32, u64>>,
}

impl PartitionCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last applied seqid of a partition, 0 when nothing was applied.
    pub fn last_applied(&self, partition: u32) -> u64 {
        self.applied.read().get(&partition).copied().unwrap_or(0)
    }

    /// Classify `seqid` against the partition's position.
    pub fn check(&self, partition: u32, seqid: u64) -> KbResult<SeqCheck> {
        let last = self.last_applied(partition);
        if seqid <= last {
            return Ok(SeqCheck::AlreadyApplied);
        }
        let expected = last + 1;
        if seqid != expected {
            return Err(KbError::OrderingGap {
                partition,
                expected,
                got: seqid,
            });
        }
        Ok(SeqCheck::Next)
    }

    /// Record `seqid` as applied. Never moves the cursor backwards.
    pub fn advance(&self, partition: u32, seqid: u64) -> u64 {
        let mut applied = self.applied.write();
        let last = applied.entry(partition).or_insert(0);
        if seqid > *last {
            *last = seqid;
        }
        *last
    }

    /// Applied positions of every partition seen so far.
    pub fn positions(&self) -> Vec<(u32, u64)> {
        let mut positions: Vec<(u32, u64)> = self
            .applied
            .read()
            .iter()
            .map(|(partition, seqid)| (*partition, *seqid))
            .collect();
        positions.sort_unstable();
        positions
    }
}
