//! Network layer for the Strand ring.
//!
//! This crate implements everything between the protocol engine and the
//! wire:
//!
//! - [`RingMessage`] / [`Envelope`] — the tagged message union and its
//!   explicit byte codec (type tag first, fixed field order, exact
//!   encode/decode round-trip).
//! - [`Transport`] — best-effort datagram sends, with [`UdpTransport`]
//!   as the production implementation.
//! - [`Directory`] — identifier ↔ address resolution, with
//!   [`StaticDirectory`] backed by a configured roster.

mod codec;
mod directory;
mod error;
mod message;
mod transport;

pub use directory::{Directory, StaticDirectory};
pub use error::{CodecError, NetError};
pub use message::{Envelope, MessageType, RingMessage};
pub use transport::{Transport, UdpTransport};

/// Upper bound on a single protocol datagram.
///
/// Every message is a handful of short identifier strings; 8 KiB leaves
/// generous headroom while staying well inside a UDP datagram.
pub const MAX_DATAGRAM_SIZE: usize = 8 * 1024;
