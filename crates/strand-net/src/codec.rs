//! Wire codec for [`Envelope`].
//!
//! Layout: a 1-byte message-type tag, a 4-byte big-endian transaction
//! id, then the payload fields in the fixed order of the message's
//! definition. Strings are a 2-byte big-endian length prefix followed
//! by UTF-8 bytes. Decode is the exact inverse of encode; anything
//! malformed surfaces as a [`CodecError`].

use bytes::{BufMut, Bytes, BytesMut};
use strand_types::NodeId;

use crate::error::CodecError;
use crate::message::{Envelope, MessageType, RingMessage};

impl Envelope {
    /// Encode the envelope into a single datagram payload.
    pub fn encode(&self) -> Result<Bytes, CodecError> {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u8(self.message.message_type() as u8);
        buf.put_u32(self.txn_id);

        match &self.message {
            RingMessage::PingReq { text } | RingMessage::PingRsp { text } => {
                put_string(&mut buf, text)?;
            }
            RingMessage::JoinReq { node_id }
            | RingMessage::NotifySuc { node_id }
            | RingMessage::NotifyPred { node_id } => {
                put_id(&mut buf, node_id)?;
            }
            RingMessage::JoinRsp {
                successor,
                predecessor,
            } => {
                put_id(&mut buf, successor)?;
                put_id(&mut buf, predecessor)?;
            }
            RingMessage::FindSucReq { target, asker } => {
                put_id(&mut buf, target)?;
                put_id(&mut buf, asker)?;
            }
            RingMessage::FindSucRsp {
                origin,
                successor,
                predecessor,
            } => {
                put_id(&mut buf, origin)?;
                put_id(&mut buf, successor)?;
                put_id(&mut buf, predecessor)?;
            }
            RingMessage::GetPredSucReq { asker } => {
                put_id(&mut buf, asker)?;
            }
            RingMessage::GetPredSucRsp { predecessor } => {
                put_id(&mut buf, predecessor)?;
            }
            RingMessage::RingState { origin } => {
                put_id(&mut buf, origin)?;
            }
        }

        Ok(buf.freeze())
    }

    /// Decode an envelope from a full datagram payload.
    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        let mut reader = Reader(payload);
        let message_type = MessageType::try_from(reader.u8()?)?;
        let txn_id = reader.u32()?;

        let message = match message_type {
            MessageType::PingReq => RingMessage::PingReq {
                text: reader.string()?,
            },
            MessageType::PingRsp => RingMessage::PingRsp {
                text: reader.string()?,
            },
            MessageType::JoinReq => RingMessage::JoinReq {
                node_id: reader.id()?,
            },
            MessageType::JoinRsp => RingMessage::JoinRsp {
                successor: reader.id()?,
                predecessor: reader.id()?,
            },
            MessageType::FindSucReq => RingMessage::FindSucReq {
                target: reader.id()?,
                asker: reader.id()?,
            },
            MessageType::FindSucRsp => RingMessage::FindSucRsp {
                origin: reader.id()?,
                successor: reader.id()?,
                predecessor: reader.id()?,
            },
            MessageType::GetPredSucReq => RingMessage::GetPredSucReq {
                asker: reader.id()?,
            },
            MessageType::GetPredSucRsp => RingMessage::GetPredSucRsp {
                predecessor: reader.id()?,
            },
            MessageType::NotifySuc => RingMessage::NotifySuc {
                node_id: reader.id()?,
            },
            MessageType::NotifyPred => RingMessage::NotifyPred {
                node_id: reader.id()?,
            },
            MessageType::RingState => RingMessage::RingState {
                origin: reader.id()?,
            },
        };

        if !reader.0.is_empty() {
            return Err(CodecError::TrailingBytes(reader.0.len()));
        }

        Ok(Envelope::new(txn_id, message))
    }
}

fn put_string(buf: &mut BytesMut, s: &str) -> Result<(), CodecError> {
    let bytes = s.as_bytes();
    if bytes.len() > u16::MAX as usize {
        return Err(CodecError::StringTooLong(bytes.len()));
    }
    buf.put_u16(bytes.len() as u16);
    buf.put_slice(bytes);
    Ok(())
}

fn put_id(buf: &mut BytesMut, id: &NodeId) -> Result<(), CodecError> {
    put_string(buf, id.as_str())
}

/// Checked cursor over a datagram payload.
struct Reader<'a>(&'a [u8]);

impl Reader<'_> {
    fn take(&mut self, n: usize) -> Result<&[u8], CodecError> {
        if self.0.len() < n {
            return Err(CodecError::Truncated);
        }
        let (head, tail) = self.0.split_at(n);
        self.0 = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn string(&mut self) -> Result<String, CodecError> {
        let len_bytes = self.take(2)?;
        let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
        let bytes = self.take(len)?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    fn id(&mut self) -> Result<NodeId, CodecError> {
        Ok(NodeId::from(self.string()?))
    }
}
