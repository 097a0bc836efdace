//! Type definitions for the channel bus

use serde::{Deserialize, Serialize};
use std::fmt;

/// Participant identifier (0 is the coordinator, 1..N-1 are workers)
pub type ParticipantId = u8;

/// Lamport logical time as carried in frame headers
pub type Timestamp = i32;

/// Id of the coordinating participant
pub const COORDINATOR_ID: ParticipantId = 0;

/// Upper bound on fabric size (coordinator + 10 workers)
pub const MAX_PARTICIPANTS: usize = 11;

/// Magic constant opening every frame header
pub const MESSAGE_MAGIC: u32 = 0xAFAF;

/// Encoded header size: magic u32 | type u16 | local_time i32 | payload_len u16
pub const HEADER_LEN: usize = 4 + 2 + 4 + 2;

/// Maximum payload capacity of a single frame
pub const MAX_PAYLOAD_LEN: usize = 8192;

/// Message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// Participant finished its setup
    Started,
    /// Participant finished its useful work
    Done,
    /// Transfer reached its destination
    Ack,
    /// Coordinator asks workers to wind down
    Stop,
    /// Transfer order (coordinator → source, source → destination)
    Transfer,
    /// Serialized balance history (worker → coordinator)
    BalanceHistory,
    /// Tag this build does not know about
    Unknown(u16),
}

impl MessageType {
    /// Wire tag
    pub fn to_wire(self) -> u16 {
        match self {
            MessageType::Started => 0,
            MessageType::Done => 1,
            MessageType::Ack => 2,
            MessageType::Stop => 3,
            MessageType::Transfer => 4,
            MessageType::BalanceHistory => 5,
            MessageType::Unknown(tag) => tag,
        }
    }

    /// Parse a wire tag; unrecognised tags map to `Unknown`
    pub fn from_wire(tag: u16) -> Self {
        match tag {
            0 => MessageType::Started,
            1 => MessageType::Done,
            2 => MessageType::Ack,
            3 => MessageType::Stop,
            4 => MessageType::Transfer,
            5 => MessageType::BalanceHistory,
            other => MessageType::Unknown(other),
        }
    }

    /// Stable label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            MessageType::Started => "STARTED",
            MessageType::Done => "DONE",
            MessageType::Ack => "ACK",
            MessageType::Stop => "STOP",
            MessageType::Transfer => "TRANSFER",
            MessageType::BalanceHistory => "BALANCE_HISTORY",
            MessageType::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Unknown(tag) => write!(f, "UNKNOWN({})", tag),
            other => f.write_str(other.label()),
        }
    }
}
