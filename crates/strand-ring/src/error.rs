//! Error types for the ring crate.

use strand_types::NodeId;

/// Errors produced by the ring engine and the node actor.
#[derive(Debug, thiserror::Error)]
pub enum RingError {
    /// The destination is not present in the directory.
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    /// A network-level error.
    #[error("network error: {0}")]
    Net(#[from] strand_net::NetError),

    /// The node's actor task has stopped.
    #[error("node task stopped")]
    NodeStopped,
}
