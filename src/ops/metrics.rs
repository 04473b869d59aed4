//! Write-path counters.
//!
//! Metric namespaces:
//! - kbshard.index.*  (index message submissions)
//! - kbshard.count.*  (advisory replica counts)
//! - kbshard.cache.*  (shard cache)

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared by the shard cache and coordinators.
#[derive(Debug, Default)]
pub struct WritePathMetrics {
    index_messages_sent: AtomicU64,
    index_failures: AtomicU64,
    count_queries_answered: AtomicU64,
    count_queries_unknown: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_evictions: AtomicU64,
}

impl WritePathMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_index_sent(&self) {
        self.index_messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_index_failure(&self) {
        self.index_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of one advisory count query.
    pub fn record_count_query(&self, answered: bool) {
        if answered {
            self.count_queries_answered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.count_queries_unknown.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_eviction(&self) {
        self.cache_evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            index_messages_sent: self.index_messages_sent.load(Ordering::Relaxed),
            index_failures: self.index_failures.load(Ordering::Relaxed),
            count_queries_answered: self.count_queries_answered.load(Ordering::Relaxed),
            count_queries_unknown: self.count_queries_unknown.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_evictions: self.cache_evictions.load(Ordering::Relaxed),
        }
    }
}

/// Counter values at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub index_messages_sent: u64,
    pub index_failures: u64,
    pub count_queries_answered: u64,
    pub count_queries_unknown: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_evictions: u64,
}

impl MetricsSnapshot {
    /// Export in Prometheus text format.
    pub fn export_prometheus(&self) -> String {
        let counters = [
            ("kbshard_index_messages_sent", self.index_messages_sent),
            ("kbshard_index_failures", self.index_failures),
            ("kbshard_count_queries_answered", self.count_queries_answered),
            ("kbshard_count_queries_unknown", self.count_queries_unknown),
            ("kbshard_cache_hits", self.cache_hits),
            ("kbshard_cache_misses", self.cache_misses),
            ("kbshard_cache_evictions", self.cache_evictions),
        ];

        let mut output = String::new();
        for (name, value) in counters {
            output.push_str(&format!("# TYPE {name} counter\n{name} {value}\n"));
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let metrics = WritePathMetrics::new();
        metrics.record_index_sent();
        metrics.record_index_sent();
        metrics.record_index_failure();
        metrics.record_count_query(true);
        metrics.record_count_query(false);
        metrics.record_cache_miss();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.index_messages_sent, 2);
        assert_eq!(snapshot.index_failures, 1);
        assert_eq!(snapshot.count_queries_answered, 1);
        assert_eq!(snapshot.count_queries_unknown, 1);
        assert_eq!(snapshot.cache_misses, 1);
        assert_eq!(snapshot.cache_hits, 0);
    }

    #[test]
    fn prometheus_export_lists_every_counter() {
        let metrics = WritePathMetrics::new();
        metrics.record_cache_eviction();
        let text = metrics.snapshot().export_prometheus();
        assert!(text.contains("# TYPE kbshard_cache_evictions counter\nkbshard_cache_evictions 1\n"));
        assert_eq!(text.matches("# TYPE").count(), 7);
    }
}
