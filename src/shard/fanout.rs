//! Replica fan-out policy.
//!
//! The strategy decides how replicas of one call are driven; the failure
//! policy decides what an `add_resource` call does with the remaining
//! replicas once one of them fails. Whatever the combination, every replica
//! gets a payload stamped with its own shard id and the advisory count is the
//! maximum over the replicas that answered.

use serde::{Deserialize, Serialize};

/// How the replicas of one call are driven.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FanoutStrategy {
    /// One replica after another, in topology order.
    #[default]
    Sequential,
    /// All replicas at once, bounded by the replica count.
    Concurrent,
}

/// What `add_resource` does after a replica fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicaFailurePolicy {
    /// Stop at the first failing replica and return its error.
    #[default]
    Abort,
    /// Keep submitting to the remaining replicas, then return the first
    /// error in topology order.
    Continue,
}

/// Fan-out settings shared by every coordinator built from one config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanoutPolicy {
    #[serde(default)]
    pub strategy: FanoutStrategy,
    #[serde(default)]
    pub on_replica_failure: ReplicaFailurePolicy,
}

impl FanoutPolicy {
    pub fn new(strategy: FanoutStrategy, on_replica_failure: ReplicaFailurePolicy) -> Self {
        Self {
            strategy,
            on_replica_failure,
        }
    }

    /// Sequential, abort on first failure.
    pub fn sequential() -> Self {
        Self::default()
    }

    /// Concurrent, abort on first failure.
    pub fn concurrent() -> Self {
        Self::new(FanoutStrategy::Concurrent, ReplicaFailurePolicy::Abort)
    }

    pub fn with_failure_policy(mut self, policy: ReplicaFailurePolicy) -> Self {
        self.on_replica_failure = policy;
        self
    }
}
