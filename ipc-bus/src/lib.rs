//! Channel bus for in-machine participants
//!
//! Provides point-to-point messaging with:
//! - A full mesh of unidirectional, non-blocking byte channels
//! - Fixed-layout framing (12-byte header + bounded payload)
//! - Send, multicast, receive and receive-any primitives
//! - Interruptible waiting instead of tight spinning
//! - Observability via Prometheus metrics
//!
//! # Invariants
//!
//! - FIFO within a channel, no ordering across channels
//! - One writer and one reader per channel, never shared
//! - A frame is written with a single write call

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod error;
pub mod fabric;
pub mod frame;
pub mod message;
pub mod metrics;
pub mod transport;
pub mod types;
pub mod wait;

pub use error::{Error, Result};
pub use fabric::ChannelFabric;
pub use message::{Message, MessageHeader};
pub use transport::{Endpoint, Transport};
pub use types::{
    MessageType, ParticipantId, Timestamp, COORDINATOR_ID, HEADER_LEN, MAX_PARTICIPANTS,
    MAX_PAYLOAD_LEN, MESSAGE_MAGIC,
};
pub use wait::{Interrupt, WaitConfig};
