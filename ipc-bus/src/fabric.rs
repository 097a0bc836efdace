//! Full-mesh channel fabric
//!
//! One unidirectional, non-blocking byte stream per ordered pair of
//! participants (`N * (N - 1)` channels). The fabric is built once, before
//! any protocol activity, and then split so that every participant holds
//! only the write ends of its outgoing channels and the read ends of its
//! incoming ones. Every other end is dropped at split time.

use crate::{
    frame::{FrameAssembler, FramePoll},
    transport::Endpoint,
    types::{ParticipantId, MAX_PARTICIPANTS},
    wait::{Interrupt, WaitConfig},
    Error, Result,
};
use std::io::{self, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use tracing::debug;

/// Write end of a channel
#[derive(Debug)]
pub struct ChannelWriter {
    from: ParticipantId,
    to: ParticipantId,
    stream: UnixStream,
}

impl ChannelWriter {
    /// Write a complete frame with a single write call.
    ///
    /// Frames are far below the socket buffer size, so a write is either
    /// taken whole or the channel is broken; partial writes are not resumed.
    pub fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        loop {
            match self.stream.write(frame) {
                Ok(n) if n == frame.len() => return Ok(()),
                Ok(n) => {
                    return Err(Error::WriteTruncated {
                        from: self.from,
                        to: self.to,
                        written: n,
                        expected: frame.len(),
                    })
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Err(Error::WouldBlockOnWrite {
                        from: self.from,
                        to: self.to,
                    })
                }
                // Nothing was written; the single write is retried as is
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Read end of a channel with its frame reassembly state
#[derive(Debug)]
pub struct ChannelReader {
    from: ParticipantId,
    to: ParticipantId,
    stream: UnixStream,
    assembler: FrameAssembler,
    closed: bool,
}

impl ChannelReader {
    /// One non-blocking read cycle
    pub fn poll(&mut self) -> Result<FramePoll> {
        if self.closed {
            return Ok(FramePoll::Closed);
        }

        let poll = self.assembler.poll_read(&mut self.stream)?;
        if matches!(poll, FramePoll::Closed) {
            debug!(from = self.from, to = self.to, "channel closed by writer");
            self.closed = true;
        }
        Ok(poll)
    }

    /// Bytes of a partly received frame held for the next poll
    pub fn buffered(&self) -> usize {
        self.assembler.buffered()
    }

    /// Writer closed and every frame was consumed
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// The N×N matrix of unidirectional channels
#[derive(Debug)]
pub struct ChannelFabric {
    participants: usize,
    writers: Vec<Vec<Option<ChannelWriter>>>,
    readers: Vec<Vec<Option<ChannelReader>>>,
}

impl ChannelFabric {
    /// Create every channel and configure both ends non-blocking
    pub fn new(participants: usize) -> Result<Self> {
        if !(2..=MAX_PARTICIPANTS).contains(&participants) {
            return Err(Error::FabricSize {
                participants,
                max: MAX_PARTICIPANTS,
            });
        }

        let mut writers: Vec<Vec<Option<ChannelWriter>>> = (0..participants)
            .map(|_| (0..participants).map(|_| None).collect())
            .collect();
        let mut readers: Vec<Vec<Option<ChannelReader>>> = (0..participants)
            .map(|_| (0..participants).map(|_| None).collect())
            .collect();

        for src in 0..participants {
            for dst in 0..participants {
                if src == dst {
                    continue;
                }

                let (write_end, read_end) = UnixStream::pair()?;
                write_end.set_nonblocking(true)?;
                read_end.set_nonblocking(true)?;
                write_end.shutdown(Shutdown::Read)?;
                read_end.shutdown(Shutdown::Write)?;

                let (from, to) = (src as ParticipantId, dst as ParticipantId);
                writers[src][dst] = Some(ChannelWriter {
                    from,
                    to,
                    stream: write_end,
                });
                readers[src][dst] = Some(ChannelReader {
                    from,
                    to,
                    stream: read_end,
                    assembler: FrameAssembler::new(),
                    closed: false,
                });

                debug!(from, to, "channel initialized");
            }
        }

        Ok(Self {
            participants,
            writers,
            readers,
        })
    }

    /// Number of participants the fabric connects
    pub fn participants(&self) -> usize {
        self.participants
    }

    /// Number of channels (`N * (N - 1)`)
    pub fn channel_count(&self) -> usize {
        self.participants * (self.participants - 1)
    }

    /// Split into per-participant endpoints.
    ///
    /// Endpoint `i` owns the write ends `i→j` and the read ends `j→i`.
    pub fn into_endpoints_with(mut self, wait: WaitConfig, interrupt: &Interrupt) -> Vec<Endpoint> {
        let n = self.participants;
        let mut endpoints = Vec::with_capacity(n);

        for local in 0..n {
            let outgoing: Vec<Option<ChannelWriter>> =
                (0..n).map(|peer| self.writers[local][peer].take()).collect();
            let incoming: Vec<Option<ChannelReader>> =
                (0..n).map(|peer| self.readers[peer][local].take()).collect();

            endpoints.push(Endpoint::new(
                local as ParticipantId,
                n,
                outgoing,
                incoming,
                wait,
                interrupt.clone(),
            ));
        }

        endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fabric_size_bounds() {
        assert!(matches!(ChannelFabric::new(1), Err(Error::FabricSize { .. })));
        assert!(matches!(
            ChannelFabric::new(MAX_PARTICIPANTS + 1),
            Err(Error::FabricSize { .. })
        ));

        let fabric = ChannelFabric::new(4).unwrap();
        assert_eq!(fabric.participants(), 4);
        assert_eq!(fabric.channel_count(), 12);
    }

    #[test]
    fn test_reader_reports_pending_then_closed() {
        let fabric = ChannelFabric::new(2).unwrap();
        let mut writers = fabric.writers;
        let mut readers = fabric.readers;

        let writer = writers[0][1].take().unwrap();
        let mut reader = readers[0][1].take().unwrap();

        assert!(matches!(reader.poll().unwrap(), FramePoll::Pending));
        drop(writer);
        assert!(matches!(reader.poll().unwrap(), FramePoll::Closed));
        assert!(reader.is_closed());
    }

    #[test]
    fn test_channel_is_fifo() {
        use crate::message::Message;
        use crate::types::MessageType;

        let fabric = ChannelFabric::new(2).unwrap();
        let mut writers = fabric.writers;
        let mut readers = fabric.readers;
        let mut writer = writers[1][0].take().unwrap();
        let mut reader = readers[1][0].take().unwrap();

        for t in 1..=3 {
            writer
                .write_frame(&Message::new(MessageType::Done, t).to_bytes())
                .unwrap();
        }

        for t in 1..=3 {
            match reader.poll().unwrap() {
                FramePoll::Ready(msg) => assert_eq!(msg.local_time(), t),
                other => panic!("expected frame, got {:?}", other),
            }
        }
    }
}
