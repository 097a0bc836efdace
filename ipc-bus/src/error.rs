//! Error types for the channel bus

use crate::types::ParticipantId;
use thiserror::Error;

/// Channel bus error
#[derive(Debug, Error)]
pub enum Error {
    /// OS-level channel failure (read/write/creation)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Writer end of a channel closed and every buffered frame was consumed
    #[error("Peer {from} closed its channel to {to}")]
    PeerClosed {
        /// Source of the closed channel
        from: ParticipantId,
        /// Destination of the closed channel
        to: ParticipantId,
    },

    /// A write accepted fewer bytes than the frame holds
    #[error("Short write on channel {from}->{to}: wrote {written} of {expected} bytes")]
    WriteTruncated {
        /// Source id
        from: ParticipantId,
        /// Destination id
        to: ParticipantId,
        /// Bytes accepted by the OS
        written: usize,
        /// Full frame size
        expected: usize,
    },

    /// Channel buffer full; no backpressure is modelled
    #[error("Channel {from}->{to} is full")]
    WouldBlockOnWrite {
        /// Source id
        from: ParticipantId,
        /// Destination id
        to: ParticipantId,
    },

    /// Frame header carried the wrong magic constant
    #[error("Bad magic: expected {expected:#06x}, got {got:#06x}")]
    BadMagic {
        /// Expected constant
        expected: u32,
        /// Received value
        got: u32,
    },

    /// Declared or supplied payload exceeds the maximum capacity
    #[error("Payload too large: {len} bytes (max {max})")]
    PayloadTooLarge {
        /// Payload length
        len: usize,
        /// Capacity
        max: usize,
    },

    /// Payload length does not match what the header declares or the type requires
    #[error("Payload length mismatch: expected {expected} bytes, got {actual}")]
    PayloadLength {
        /// Expected byte count
        expected: usize,
        /// Actual byte count
        actual: usize,
    },

    /// Participant id outside the fabric or equal to self
    #[error("Unknown peer {peer} for participant {local}")]
    UnknownPeer {
        /// Calling participant
        local: ParticipantId,
        /// Requested peer
        peer: ParticipantId,
    },

    /// Every inbound channel is closed; nothing can arrive any more
    #[error("All peers of participant {local} closed their channels")]
    AllPeersClosed {
        /// Calling participant
        local: ParticipantId,
    },

    /// Fabric size outside 2..=MAX_PARTICIPANTS
    #[error("Invalid fabric size {participants} (expected 2..={max})")]
    FabricSize {
        /// Requested participant count
        participants: usize,
        /// Upper bound
        max: usize,
    },

    /// Wait was interrupted from outside
    #[error("Wait interrupted")]
    Interrupted,

    /// Multicast stopped at the first failing destination
    #[error("Multicast from {from} failed at peer {failed_peer}: {source}")]
    Multicast {
        /// Sender id
        from: ParticipantId,
        /// First destination that failed
        failed_peer: ParticipantId,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Framing corruption (bad magic, length violations)
    pub fn is_protocol(&self) -> bool {
        match self {
            Error::BadMagic { .. } | Error::PayloadTooLarge { .. } | Error::PayloadLength { .. } => {
                true
            }
            Error::Multicast { source, .. } => source.is_protocol(),
            _ => false,
        }
    }

    /// The other side went away or the wait was aborted
    pub fn is_disconnect(&self) -> bool {
        match self {
            Error::PeerClosed { .. } | Error::AllPeersClosed { .. } | Error::Interrupted => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::BrokenPipe,
            Error::Multicast { source, .. } => source.is_disconnect(),
            _ => false,
        }
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_classification() {
        assert!(Error::BadMagic { expected: 1, got: 2 }.is_protocol());
        assert!(Error::PayloadLength { expected: 6, actual: 4 }.is_protocol());
        assert!(!Error::Interrupted.is_protocol());
        assert!(!Error::PeerClosed { from: 1, to: 0 }.is_protocol());

        let wrapped = Error::Multicast {
            from: 0,
            failed_peer: 2,
            source: Box::new(Error::PayloadTooLarge { len: 10, max: 5 }),
        };
        assert!(wrapped.is_protocol());
    }

    #[test]
    fn test_disconnect_classification() {
        assert!(Error::Interrupted.is_disconnect());
        assert!(Error::AllPeersClosed { local: 1 }.is_disconnect());
        assert!(Error::Io(std::io::ErrorKind::BrokenPipe.into()).is_disconnect());
        assert!(!Error::BadMagic { expected: 1, got: 2 }.is_disconnect());

        let wrapped = Error::Multicast {
            from: 1,
            failed_peer: 0,
            source: Box::new(Error::PeerClosed { from: 1, to: 0 }),
        };
        assert!(wrapped.is_disconnect());
    }
}
