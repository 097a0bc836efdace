//! Error types for the bank participants

use ipc_bus::{MessageType, ParticipantId, Timestamp};
use thiserror::Error;

use crate::types::Balance;

/// Result type for bank operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure classes driving the abort policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Channel read/write failure, peer gone
    Io,
    /// Framing or payload corruption
    Protocol,
    /// Local business rule violation; the participant keeps running
    Logic,
    /// Termination handshake violated
    Termination,
    /// Local invariant, configuration or runtime failure
    Internal,
}

/// Bank errors
#[derive(Error, Debug)]
pub enum Error {
    /// Channel bus error
    #[error("Bus error: {0}")]
    Bus(#[from] ipc_bus::Error),

    /// Payload could not be decoded
    #[error("Wire error: {0}")]
    Wire(String),

    /// Source balance below the transfer amount
    #[error("Insufficient funds at participant {participant}: balance {balance}, amount {amount}")]
    InsufficientFunds {
        /// Source participant
        participant: ParticipantId,
        /// Balance at the time of the order
        balance: Balance,
        /// Requested amount
        amount: Balance,
    },

    /// A second STOP reached a worker
    #[error("Participant {participant} received STOP twice")]
    DuplicateStop {
        /// Worker id
        participant: ParticipantId,
    },

    /// Barrier finished a round below quorum
    #[error("Barrier at participant {participant} counted {counted}/{quorum} {expected} messages")]
    BarrierShortfall {
        /// Participant running the barrier
        participant: ParticipantId,
        /// Message type being counted
        expected: MessageType,
        /// Matching messages seen
        counted: usize,
        /// Required count
        quorum: usize,
    },

    /// A strict receive got a different message type
    #[error("Participant {participant} expected {expected} from {from}, got {got}")]
    UnexpectedMessage {
        /// Receiving participant
        participant: ParticipantId,
        /// Sender
        from: ParticipantId,
        /// Expected type
        expected: MessageType,
        /// Received type
        got: MessageType,
    },

    /// Balance history owner does not match the channel it came from
    #[error("History from channel {channel} is owned by {owner}")]
    HistoryOwnerMismatch {
        /// Sending channel
        channel: ParticipantId,
        /// Owner recorded in the payload
        owner: ParticipantId,
    },

    /// Transfer order rejected before sending
    #[error("Invalid transfer: {0}")]
    InvalidTransfer(String),

    /// Ledger append went back in logical time
    #[error("Time regression: last entry at {last}, append at {time}")]
    TimeRegression {
        /// Last recorded time
        last: Timestamp,
        /// Rejected time
        time: Timestamp,
    },

    /// Ledger capacity exhausted
    #[error("Balance history full ({capacity} entries)")]
    HistoryFull {
        /// Maximum entries
        capacity: usize,
    },

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Concurrency error (participant thread panicked, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Failure class
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Bus(e) if e.is_protocol() => ErrorClass::Protocol,
            Error::Bus(_) | Error::Io(_) => ErrorClass::Io,
            Error::Wire(_) | Error::HistoryOwnerMismatch { .. } => ErrorClass::Protocol,
            Error::InsufficientFunds { .. } => ErrorClass::Logic,
            Error::DuplicateStop { .. }
            | Error::BarrierShortfall { .. }
            | Error::UnexpectedMessage { .. } => ErrorClass::Termination,
            Error::InvalidTransfer(_)
            | Error::TimeRegression { .. }
            | Error::HistoryFull { .. }
            | Error::Metrics(_)
            | Error::Config(_)
            | Error::Concurrency(_) => ErrorClass::Internal,
        }
    }

    /// Whether the owning participant must stop
    pub fn is_fatal(&self) -> bool {
        self.class() != ErrorClass::Logic
    }

    /// Failure caused by another participant aborting: a closed channel or
    /// a tripped interrupt
    pub fn is_knock_on(&self) -> bool {
        matches!(self, Error::Bus(e) if e.is_disconnect())
    }
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::Metrics(err.to_string())
    }
}
