//! Incremental frame assembly over non-blocking byte streams
//!
//! Channels carry no message boundaries of their own, so every read first
//! completes the fixed header and then exactly the payload length it
//! declares. Partial progress is kept between polls: a short read is a frame
//! still in flight, not an error.

use crate::{
    message::{Message, MessageHeader},
    types::HEADER_LEN,
    Error, Result,
};
use bytes::Bytes;
use std::io::{self, Read};

/// Outcome of one non-blocking read cycle
#[derive(Debug)]
pub enum FramePoll {
    /// A complete frame arrived
    Ready(Message),
    /// No complete frame yet; retry later
    Pending,
    /// Writer closed the stream at a frame boundary
    Closed,
}

/// Per-channel reassembly state
#[derive(Debug)]
pub struct FrameAssembler {
    header: [u8; HEADER_LEN],
    header_read: usize,
    pending: Option<MessageHeader>,
    payload: Vec<u8>,
    payload_read: usize,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    /// Create an empty assembler
    pub fn new() -> Self {
        Self {
            header: [0u8; HEADER_LEN],
            header_read: 0,
            pending: None,
            payload: Vec::new(),
            payload_read: 0,
        }
    }

    /// True while part of a frame has been consumed
    pub fn is_mid_frame(&self) -> bool {
        self.header_read > 0
    }

    /// Bytes of the current frame consumed so far
    pub fn buffered(&self) -> usize {
        self.header_read + self.payload_read
    }

    /// Read as much of the current frame as is available without blocking.
    ///
    /// Never reads past the end of the current frame, so bytes of the next
    /// frame stay in the channel.
    pub fn poll_read<R: Read>(&mut self, reader: &mut R) -> Result<FramePoll> {
        loop {
            match self.pending {
                None => {
                    let n = match reader.read(&mut self.header[self.header_read..]) {
                        Ok(0) if self.header_read == 0 => return Ok(FramePoll::Closed),
                        Ok(0) => return Err(truncated("frame header truncated")),
                        Ok(n) => n,
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                            return Ok(FramePoll::Pending)
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => return Err(e.into()),
                    };
                    self.header_read += n;

                    if self.header_read == HEADER_LEN {
                        let header = MessageHeader::decode(&self.header)?;
                        self.payload = vec![0u8; header.payload_len as usize];
                        self.payload_read = 0;
                        self.pending = Some(header);
                    }
                }
                Some(header) => {
                    if self.payload_read == self.payload.len() {
                        let payload = Bytes::from(std::mem::take(&mut self.payload));
                        self.reset();
                        return Message::from_parts(header, payload).map(FramePoll::Ready);
                    }

                    let n = match reader.read(&mut self.payload[self.payload_read..]) {
                        Ok(0) => return Err(truncated("frame payload truncated")),
                        Ok(n) => n,
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                            return Ok(FramePoll::Pending)
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => return Err(e.into()),
                    };
                    self.payload_read += n;
                }
            }
        }
    }

    fn reset(&mut self) {
        self.header_read = 0;
        self.pending = None;
        self.payload_read = 0;
    }
}

fn truncated(what: &'static str) -> Error {
    Error::Io(io::Error::new(io::ErrorKind::UnexpectedEof, what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageType;
    use std::collections::VecDeque;

    enum Step {
        Data(Vec<u8>),
        WouldBlock,
        Eof,
    }

    /// Reader that replays a script of chunks, would-blocks and EOFs
    struct ScriptedReader {
        steps: VecDeque<Step>,
    }

    impl ScriptedReader {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: steps.into(),
            }
        }
    }

    impl Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.steps.pop_front() {
                Some(Step::Data(mut chunk)) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.steps.push_front(Step::Data(chunk.split_off(n)));
                    }
                    Ok(n)
                }
                Some(Step::Eof) => Ok(0),
                Some(Step::WouldBlock) | None => Err(io::ErrorKind::WouldBlock.into()),
            }
        }
    }

    fn frame(kind: MessageType, time: i32, payload: &[u8]) -> Vec<u8> {
        Message::with_payload(kind, time, payload.to_vec())
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    #[test]
    fn test_whole_frame_in_one_read() {
        let mut reader = ScriptedReader::new(vec![Step::Data(frame(MessageType::Done, 4, b"ok"))]);
        let mut assembler = FrameAssembler::new();

        match assembler.poll_read(&mut reader).unwrap() {
            FramePoll::Ready(msg) => {
                assert_eq!(msg.message_type(), MessageType::Done);
                assert_eq!(msg.local_time(), 4);
                assert_eq!(msg.payload().as_ref(), b"ok");
            }
            other => panic!("expected frame, got {:?}", other),
        }
        assert!(!assembler.is_mid_frame());
    }

    #[test]
    fn test_short_reads_accumulate_across_polls() {
        let bytes = frame(MessageType::Transfer, 9, &[1, 2, 3, 4, 5, 6]);
        let mut reader = ScriptedReader::new(vec![
            Step::Data(bytes[..5].to_vec()),
            Step::WouldBlock,
            Step::Data(bytes[5..14].to_vec()),
            Step::WouldBlock,
            Step::Data(bytes[14..].to_vec()),
        ]);
        let mut assembler = FrameAssembler::new();

        assert!(matches!(assembler.poll_read(&mut reader).unwrap(), FramePoll::Pending));
        assert!(assembler.is_mid_frame());
        assert_eq!(assembler.buffered(), 5);
        assert!(matches!(assembler.poll_read(&mut reader).unwrap(), FramePoll::Pending));
        assert_eq!(assembler.buffered(), 14);

        match assembler.poll_read(&mut reader).unwrap() {
            FramePoll::Ready(msg) => assert_eq!(msg.payload().as_ref(), &[1, 2, 3, 4, 5, 6]),
            other => panic!("expected frame, got {:?}", other),
        }
        assert_eq!(assembler.buffered(), 0);
    }

    #[test]
    fn test_does_not_consume_next_frame() {
        let mut both = frame(MessageType::Started, 1, b"");
        both.extend(frame(MessageType::Done, 2, b"x"));
        let mut reader = ScriptedReader::new(vec![Step::Data(both)]);
        let mut assembler = FrameAssembler::new();

        let first = match assembler.poll_read(&mut reader).unwrap() {
            FramePoll::Ready(msg) => msg,
            other => panic!("expected frame, got {:?}", other),
        };
        let second = match assembler.poll_read(&mut reader).unwrap() {
            FramePoll::Ready(msg) => msg,
            other => panic!("expected frame, got {:?}", other),
        };
        assert_eq!(first.message_type(), MessageType::Started);
        assert_eq!(second.message_type(), MessageType::Done);
    }

    #[test]
    fn test_eof_at_boundary_is_closed() {
        let mut reader = ScriptedReader::new(vec![Step::Eof]);
        let mut assembler = FrameAssembler::new();
        assert!(matches!(assembler.poll_read(&mut reader).unwrap(), FramePoll::Closed));
    }

    #[test]
    fn test_eof_mid_frame_is_io_error() {
        let bytes = frame(MessageType::Transfer, 1, &[0; 6]);
        let mut reader = ScriptedReader::new(vec![Step::Data(bytes[..15].to_vec()), Step::Eof]);
        let mut assembler = FrameAssembler::new();

        let err = assembler.poll_read(&mut reader).unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn test_corrupt_header_is_protocol_error() {
        let mut bytes = frame(MessageType::Ack, 1, b"");
        bytes[1] ^= 0xFF;
        let mut reader = ScriptedReader::new(vec![Step::Data(bytes)]);
        let mut assembler = FrameAssembler::new();

        let err = assembler.poll_read(&mut reader).unwrap_err();
        assert!(err.is_protocol());
    }
}
