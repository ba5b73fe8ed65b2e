//! Core identifiers for the Strand ring.
//!
//! This crate defines the identity space every other Strand crate builds
//! on: logical node identifiers ([`NodeId`]), their position on the ring
//! ([`Digest`]), and the hash that maps one to the other ([`KeySpace`]).
//!
//! Ring ordering is the unsigned big-endian ordering of digests. The
//! ring-aware half-open interval test lives on [`Digest::in_interval`]
//! so that every placement decision in the protocol wraps consistently.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha1::{Digest as _, Sha1};

/// Length of a ring digest in bytes (SHA-1 width).
pub const DIGEST_LEN: usize = 20;

/// Opaque identifier for a logical ring participant.
///
/// Assigned externally (by the operator or the directory roster) and
/// immutable for the lifetime of the node. Two distinct identifiers are
/// assumed to hash to distinct digests.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    /// Create an identifier from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Return the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the identifier's UTF-8 bytes (the hash input).
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Position of a node on the ring: a 160-bit digest of its [`NodeId`].
///
/// Compared as an unsigned big-endian integer (the derived lexicographic
/// byte ordering is exactly that).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// Return the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Ring-aware membership test for the half-open interval `(lo, hi]`.
    ///
    /// Wraps around the top of the digest space when `hi < lo`. The
    /// degenerate interval `(x, x]` denotes the full ring and contains
    /// everything.
    pub fn in_interval(&self, lo: &Digest, hi: &Digest) -> bool {
        if lo == hi {
            true
        } else if lo < hi {
            lo < self && self <= hi
        } else {
            self > lo || self <= hi
        }
    }
}

impl From<[u8; DIGEST_LEN]> for Digest {
    fn from(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({self})")
    }
}

/// Deterministic one-way mapping from identifiers onto the ring.
///
/// The protocol treats the mapping as injective; a collision between two
/// live identifiers is undefined behaviour for the ring.
pub trait KeySpace: Send + Sync {
    /// Hash an identifier to its ring position.
    fn digest(&self, id: &NodeId) -> Digest;
}

/// Production keyspace: SHA-1 of the identifier's UTF-8 bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha1KeySpace;

impl KeySpace for Sha1KeySpace {
    fn digest(&self, id: &NodeId) -> Digest {
        Digest(Sha1::digest(id.as_bytes()).into())
    }
}

/// Deterministic keyspace for simulations: a decimal node name maps to
/// its numeric value, big-endian in the digest's trailing bytes, so that
/// node "2" sits between "1" and "3" by construction. Non-numeric names
/// fall back to SHA-1.
#[derive(Debug, Default, Clone, Copy)]
pub struct SeqKeySpace;

impl KeySpace for SeqKeySpace {
    fn digest(&self, id: &NodeId) -> Digest {
        match id.as_str().parse::<u64>() {
            Ok(n) => {
                let mut bytes = [0u8; DIGEST_LEN];
                bytes[DIGEST_LEN - 8..].copy_from_slice(&n.to_be_bytes());
                Digest(bytes)
            }
            Err(_) => Sha1KeySpace.digest(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(n: u64) -> Digest {
        SeqKeySpace.digest(&NodeId::new(n.to_string()))
    }

    #[test]
    fn sha1_digest_is_deterministic() {
        let ks = Sha1KeySpace;
        let id = NodeId::new("node-7");
        assert_eq!(ks.digest(&id), ks.digest(&id));
        assert_ne!(ks.digest(&id), ks.digest(&NodeId::new("node-8")));
    }

    #[test]
    fn digest_orders_as_big_endian_integer() {
        let mut lo = [0u8; DIGEST_LEN];
        let mut hi = [0u8; DIGEST_LEN];
        lo[19] = 0xff;
        hi[0] = 0x01;
        assert!(Digest::from(lo) < Digest::from(hi));
    }

    #[test]
    fn seq_keyspace_orders_numeric_names() {
        assert!(seq(1) < seq(2));
        assert!(seq(2) < seq(3));
        assert!(seq(9) < seq(10));
    }

    #[test]
    fn interval_without_wrap() {
        assert!(seq(2).in_interval(&seq(1), &seq(3)));
        assert!(seq(3).in_interval(&seq(1), &seq(3)));
        assert!(!seq(1).in_interval(&seq(1), &seq(3)));
        assert!(!seq(4).in_interval(&seq(1), &seq(3)));
    }

    #[test]
    fn interval_wraps_past_ring_maximum() {
        // (3, 1] covers everything above 3 and everything up to 1.
        assert!(seq(4).in_interval(&seq(3), &seq(1)));
        assert!(seq(1).in_interval(&seq(3), &seq(1)));
        assert!(seq(0).in_interval(&seq(3), &seq(1)));
        assert!(!seq(2).in_interval(&seq(3), &seq(1)));
        assert!(!seq(3).in_interval(&seq(3), &seq(1)));
    }

    #[test]
    fn degenerate_interval_is_full_ring() {
        assert!(seq(5).in_interval(&seq(2), &seq(2)));
        assert!(seq(2).in_interval(&seq(2), &seq(2)));
    }

    #[test]
    fn digest_display_is_lowercase_hex() {
        let mut bytes = [0u8; DIGEST_LEN];
        bytes[0] = 0xab;
        let shown = Digest::from(bytes).to_string();
        assert_eq!(shown.len(), DIGEST_LEN * 2);
        assert!(shown.starts_with("ab"));
    }
}
