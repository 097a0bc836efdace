//! Fixed-layout message framing
//!
//! Every frame is a 12-byte little-endian header followed by exactly
//! `payload_len` raw payload bytes:
//!
//! ```text
//! ┌────────────┬───────────┬─────────────────┬──────────────────┬───────────────┐
//! │ magic u32  │ type u16  │ local_time i32  │ payload_len u16  │ payload bytes │
//! └────────────┴───────────┴─────────────────┴──────────────────┴───────────────┘
//! ```
//!
//! No varints, no compression. A header that fails validation is framing
//! corruption and is never retried.

use crate::{
    types::{MessageType, Timestamp, HEADER_LEN, MAX_PAYLOAD_LEN, MESSAGE_MAGIC},
    Error, Result,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Magic constant (always `MESSAGE_MAGIC` once validated)
    pub magic: u32,
    /// Message type
    pub message_type: MessageType,
    /// Sender's Lamport time at send
    pub local_time: Timestamp,
    /// Number of payload bytes following the header
    pub payload_len: u16,
}

impl MessageHeader {
    /// Append the wire form of this header to `buf`
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.magic);
        buf.put_u16_le(self.message_type.to_wire());
        buf.put_i32_le(self.local_time);
        buf.put_u16_le(self.payload_len);
    }

    /// Decode and validate a header
    pub fn decode(raw: &[u8; HEADER_LEN]) -> Result<Self> {
        let mut cursor = &raw[..];
        let magic = cursor.get_u32_le();
        let message_type = MessageType::from_wire(cursor.get_u16_le());
        let local_time = cursor.get_i32_le();
        let payload_len = cursor.get_u16_le();

        if magic != MESSAGE_MAGIC {
            return Err(Error::BadMagic {
                expected: MESSAGE_MAGIC,
                got: magic,
            });
        }
        if payload_len as usize > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLarge {
                len: payload_len as usize,
                max: MAX_PAYLOAD_LEN,
            });
        }

        Ok(Self {
            magic,
            message_type,
            local_time,
            payload_len,
        })
    }
}

/// A single framed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    header: MessageHeader,
    payload: Bytes,
}

impl Message {
    /// Create a message without payload
    pub fn new(message_type: MessageType, local_time: Timestamp) -> Self {
        Self {
            header: MessageHeader {
                magic: MESSAGE_MAGIC,
                message_type,
                local_time,
                payload_len: 0,
            },
            payload: Bytes::new(),
        }
    }

    /// Create a message carrying `payload`
    pub fn with_payload(
        message_type: MessageType,
        local_time: Timestamp,
        payload: impl Into<Bytes>,
    ) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }

        let mut message = Self::new(message_type, local_time);
        // Bounded by MAX_PAYLOAD_LEN above, which fits u16.
        message.header.payload_len = payload.len() as u16;
        message.payload = payload;
        Ok(message)
    }

    /// Assemble a message from a validated header and the payload that followed it
    pub fn from_parts(header: MessageHeader, payload: Bytes) -> Result<Self> {
        if payload.len() != header.payload_len as usize {
            return Err(Error::PayloadLength {
                expected: header.payload_len as usize,
                actual: payload.len(),
            });
        }
        Ok(Self { header, payload })
    }

    /// Header
    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    /// Message type
    pub fn message_type(&self) -> MessageType {
        self.header.message_type
    }

    /// Sender's Lamport time
    pub fn local_time(&self) -> Timestamp {
        self.header.local_time
    }

    /// Restamp before forwarding
    pub fn set_local_time(&mut self, local_time: Timestamp) {
        self.header.local_time = local_time;
    }

    /// Raw payload
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload as UTF-8 text, if it is
    pub fn payload_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Encoded frame size
    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Encode header + payload into one contiguous frame
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.frame_len());
        self.header.encode(&mut buf);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    /// Decode exactly one frame
    pub fn from_bytes(frame: &[u8]) -> Result<Self> {
        if frame.len() < HEADER_LEN {
            return Err(Error::PayloadLength {
                expected: HEADER_LEN,
                actual: frame.len(),
            });
        }

        let mut raw = [0u8; HEADER_LEN];
        raw.copy_from_slice(&frame[..HEADER_LEN]);
        let header = MessageHeader::decode(&raw)?;
        Self::from_parts(header, Bytes::copy_from_slice(&frame[HEADER_LEN..]))
    }
}
