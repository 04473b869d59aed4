//! Node registry and node capabilities.
//!
//! - [`capabilities`] - Reader, writer and sidecar client traits
//! - [`registry`] - Node handles and the node-id keyed registry

pub mod capabilities;
pub mod registry;

pub use capabilities::{ReaderClient, SidecarClient, WriterClient};
pub use registry::{CountOutcome, Node, NodeRegistry};
