//! Error types for the wire protocol and transport.

/// Errors raised while encoding or decoding an [`Envelope`].
///
/// All decode failures are recoverable: the node logs and drops the
/// offending datagram, it never terminates.
///
/// [`Envelope`]: crate::Envelope
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The leading type tag does not name a known message type.
    #[error("unknown message type tag: {0}")]
    UnknownType(u8),

    /// The buffer ended before the announced fields did.
    #[error("truncated message")]
    Truncated,

    /// A string field exceeds the 16-bit length prefix.
    #[error("string field of {0} bytes exceeds the wire limit")]
    StringTooLong(usize),

    /// A string field is not valid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Bytes were left over after the payload was fully decoded.
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
}

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// A socket-level I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding or decoding a message failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The payload does not fit in a single datagram.
    #[error("datagram of {0} bytes exceeds the transport limit")]
    OversizedDatagram(usize),
}
