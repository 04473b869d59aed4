//! Partitioned transaction log and apply ordering.
//!
//! - [`partitioner`] - Hash routing of resources to partitions
//! - [`log`] - Transaction log contract and in-memory log
//! - [`cursor`] - Last applied seqid per partition

pub mod cursor;
pub mod log;
pub mod partitioner;

pub use cursor::{PartitionCursor, SeqCheck};
pub use log::{CommittedMutation, InMemoryTransactionLog, Mutation, MutationKind, TransactionLog};
pub use partitioner::Partitioner;
