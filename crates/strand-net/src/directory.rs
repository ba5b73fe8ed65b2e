//! Node identifier ↔ network address resolution.

use std::collections::HashMap;
use std::net::SocketAddr;

use strand_types::NodeId;

/// Bidirectional mapping between logical node identifiers and network
/// addresses.
///
/// Both directions return `None` for unknown entries; callers treat an
/// unresolved destination as an immediate, synchronous failure rather
/// than a timeout.
pub trait Directory: Send + Sync {
    /// Resolve an identifier to its network address.
    fn resolve(&self, id: &NodeId) -> Option<SocketAddr>;

    /// Reverse-resolve a source address to the identifier behind it.
    fn reverse(&self, addr: &SocketAddr) -> Option<NodeId>;
}

/// Fixed roster directory built from configuration.
#[derive(Debug, Default, Clone)]
pub struct StaticDirectory {
    by_id: HashMap<NodeId, SocketAddr>,
    by_addr: HashMap<SocketAddr, NodeId>,
}

impl StaticDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node's address, replacing any previous entry.
    pub fn insert(&mut self, id: NodeId, addr: SocketAddr) {
        self.by_addr.insert(addr, id.clone());
        self.by_id.insert(id, addr);
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl FromIterator<(NodeId, SocketAddr)> for StaticDirectory {
    fn from_iter<I: IntoIterator<Item = (NodeId, SocketAddr)>>(iter: I) -> Self {
        let mut dir = Self::new();
        for (id, addr) in iter {
            dir.insert(id, addr);
        }
        dir
    }
}

impl Directory for StaticDirectory {
    fn resolve(&self, id: &NodeId) -> Option<SocketAddr> {
        self.by_id.get(id).copied()
    }

    fn reverse(&self, addr: &SocketAddr) -> Option<NodeId> {
        self.by_addr.get(addr).cloned()
    }
}
