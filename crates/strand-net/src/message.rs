//! Protocol messages exchanged between Strand nodes.
//!
//! One [`RingMessage`] variant per wire message type, carrying only the
//! fields relevant to that type. Every message travels inside an
//! [`Envelope`] that adds the transaction id used to correlate requests
//! with responses (liveness probes match on it; ring messages carry it
//! for diagnostics only).

use strand_types::NodeId;

use crate::error::CodecError;

/// Wire tag of a message, recoverable before the payload is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    PingReq = 1,
    PingRsp = 2,
    JoinReq = 3,
    JoinRsp = 4,
    FindSucReq = 5,
    FindSucRsp = 6,
    GetPredSucReq = 7,
    GetPredSucRsp = 8,
    NotifySuc = 9,
    NotifyPred = 10,
    RingState = 11,
}

impl TryFrom<u8> for MessageType {
    type Error = CodecError;

    fn try_from(tag: u8) -> Result<Self, CodecError> {
        match tag {
            1 => Ok(Self::PingReq),
            2 => Ok(Self::PingRsp),
            3 => Ok(Self::JoinReq),
            4 => Ok(Self::JoinRsp),
            5 => Ok(Self::FindSucReq),
            6 => Ok(Self::FindSucRsp),
            7 => Ok(Self::GetPredSucReq),
            8 => Ok(Self::GetPredSucRsp),
            9 => Ok(Self::NotifySuc),
            10 => Ok(Self::NotifyPred),
            11 => Ok(Self::RingState),
            other => Err(CodecError::UnknownType(other)),
        }
    }
}

/// A ring or liveness protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RingMessage {
    /// Liveness probe request.
    PingReq {
        /// Caller-supplied text, echoed back verbatim.
        text: String,
    },

    /// Liveness probe response, echoing the request's text.
    PingRsp {
        /// Text copied from the matching [`RingMessage::PingReq`].
        text: String,
    },

    /// First message of a join: "please find my place in the ring".
    JoinReq {
        /// Identifier of the node that wants to join.
        node_id: NodeId,
    },

    /// Terminal join message: the neighbours the joiner should adopt.
    JoinRsp {
        /// The joiner's new successor.
        successor: NodeId,
        /// The joiner's new predecessor.
        predecessor: NodeId,
    },

    /// One hop of the linear walk locating a joiner's insertion point.
    FindSucReq {
        /// The node whose place is being searched for.
        target: NodeId,
        /// The node that started the walk on the joiner's behalf.
        asker: NodeId,
    },

    /// Walk result travelling back toward the joiner; repackaged into a
    /// [`RingMessage::JoinRsp`] by whoever receives it.
    FindSucRsp {
        /// The joining node the result is destined for.
        origin: NodeId,
        /// Discovered successor for the joiner.
        successor: NodeId,
        /// Discovered predecessor for the joiner.
        predecessor: NodeId,
    },

    /// Stabilize pull: "who is your predecessor?".
    GetPredSucReq {
        /// The node asking (the sender).
        asker: NodeId,
    },

    /// Stabilize answer carrying the responder's predecessor.
    GetPredSucRsp {
        /// The responder's current predecessor.
        predecessor: NodeId,
    },

    /// "Adopt the carried node as your predecessor" — sent to a
    /// successor by the node that believes it now precedes it.
    NotifySuc {
        /// The predecessor the receiver should adopt.
        node_id: NodeId,
    },

    /// "Adopt the carried node as your successor" — sent to a
    /// predecessor by the node that believes it now follows it.
    NotifyPred {
        /// The successor the receiver should adopt.
        node_id: NodeId,
    },

    /// Diagnostic ring-walk token, forwarded successor to successor
    /// until it returns to the originator.
    RingState {
        /// The node that started the walk.
        origin: NodeId,
    },
}

impl RingMessage {
    /// Return the wire tag for this message.
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::PingReq { .. } => MessageType::PingReq,
            Self::PingRsp { .. } => MessageType::PingRsp,
            Self::JoinReq { .. } => MessageType::JoinReq,
            Self::JoinRsp { .. } => MessageType::JoinRsp,
            Self::FindSucReq { .. } => MessageType::FindSucReq,
            Self::FindSucRsp { .. } => MessageType::FindSucRsp,
            Self::GetPredSucReq { .. } => MessageType::GetPredSucReq,
            Self::GetPredSucRsp { .. } => MessageType::GetPredSucRsp,
            Self::NotifySuc { .. } => MessageType::NotifySuc,
            Self::NotifyPred { .. } => MessageType::NotifyPred,
            Self::RingState { .. } => MessageType::RingState,
        }
    }
}

/// A message plus its transaction id, as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Sender-allocated correlation id, echoed in responses.
    pub txn_id: u32,
    /// The message itself.
    pub message: RingMessage,
}

impl Envelope {
    /// Wrap a message with its transaction id.
    pub fn new(txn_id: u32, message: RingMessage) -> Self {
        Self { txn_id, message }
    }
}
