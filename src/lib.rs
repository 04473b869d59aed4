//! kbshard - knowledge-box shard write path.
//!
//! A knowledge box (tenant) stores its resources in logical shards, each
//! physically replicated across index nodes. This crate is the write-side
//! coordination core: it routes resource mutations to every replica of a
//! shard through an asynchronous indexing transport and reports an advisory
//! resource count gathered from the nodes' sidecars.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │              Transaction log (partition, seqid)                 │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Ingest processor                          │
//! │          ordering cursor │ active shard resolution              │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │            Shard manager + LRU cache of coordinators            │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Shard coordinator                          │
//! │   storage prepare │ indexing transport │ sidecar count (advisory)│
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! ## Core
//! - [`core::config`] - Configuration parsing and validation
//! - [`core::error`] - Error types and classification
//! - [`model`] - Shard topology, payloads and index messages
//!
//! ## Write path
//! - [`shard::cache`] - Bounded LRU cache of shard coordinators
//! - [`shard::coordinator`] - Replica fan-out of adds and deletes
//! - [`shard::manager`] - Lazy shard resolution from topology metadata
//! - [`shard::readiness`] - Replica readiness polling
//! - [`indexing`] - Indexing transport and storage contracts
//! - [`node`] - Node registry and typed node capabilities
//!
//! ## Ordering
//! - [`partition`] - Partitioner, transaction log and apply cursor
//! - [`ingest`] - Applies committed mutations in partition order
//!
//! ## Operations
//! - [`ops::metrics`] - Write-path counters
//! - [`mock`] - In-process collaborators
//! - [`cli::commands`] - CLI command implementations
//!
//! # Key Invariants
//!
//! - Every replica receives a payload stamped with its own shard id.
//! - The advisory count is the maximum over answering replicas, `-1` when
//!   none answered; count failures never fail an add.
//! - Transport and storage failures always reach the caller.
//! - The apply cursor never skips or regresses a partition's seqids.

// Core infrastructure
pub mod core;

// Topology and message types
pub mod model;

// Node registry
pub mod node;

// Indexing collaborators
pub mod indexing;

// Shard write path
pub mod shard;

// Transaction log ordering
pub mod partition;
pub mod ingest;

// Operations and observability
pub mod ops;

// Test doubles
pub mod mock;

// CLI
pub mod cli;

// Re-exports for convenience
pub use self::core::{config, error};
pub use error::{KbError, KbResult};
pub use ingest::{ApplyOutcome, IngestProcessor};
pub use model::{
    IndexMessage, IndexMessageKind, NodeId, ObservedCount, ReplicaShardId, ResourcePayload,
    ShardId, ShardObject, ShardReplica,
};
pub use shard::{Shard, ShardCache, ShardManager, ShardServices};
