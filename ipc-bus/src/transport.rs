//! Send / multicast / receive / receive-any over the channel fabric

use crate::{
    fabric::{ChannelReader, ChannelWriter},
    frame::FramePoll,
    message::Message,
    metrics,
    types::ParticipantId,
    wait::{Interrupt, WaitConfig, Waiter},
    Error, Result,
};
use tracing::{debug, trace};

/// Point-to-point messaging as seen by one participant
pub trait Transport {
    /// Id of the participant owning this transport
    fn local_id(&self) -> ParticipantId;

    /// Total participants in the fabric
    fn participants(&self) -> usize;

    /// Single write to the `self → to` channel
    fn send(&mut self, to: ParticipantId, message: &Message) -> Result<()>;

    /// Block until a whole message arrives on the `from → self` channel
    fn receive(&mut self, from: ParticipantId) -> Result<Message>;

    /// Block until any inbound channel yields a whole message.
    ///
    /// Channels are swept in ascending id order; the first complete message
    /// of a sweep wins.
    fn receive_any(&mut self) -> Result<(ParticipantId, Message)>;

    /// Send to every other participant in ascending order, stopping at the
    /// first failure
    fn multicast(&mut self, message: &Message) -> Result<()> {
        let local = self.local_id();
        for peer in 0..self.participants() {
            let peer = peer as ParticipantId;
            if peer == local {
                continue;
            }
            self.send(peer, message).map_err(|e| Error::Multicast {
                from: local,
                failed_peer: peer,
                source: Box::new(e),
            })?;
        }
        Ok(())
    }
}

/// One participant's share of the fabric
#[derive(Debug)]
pub struct Endpoint {
    id: ParticipantId,
    participants: usize,
    writers: Vec<Option<ChannelWriter>>,
    readers: Vec<Option<ChannelReader>>,
    wait: WaitConfig,
    interrupt: Interrupt,
}

impl Endpoint {
    pub(crate) fn new(
        id: ParticipantId,
        participants: usize,
        writers: Vec<Option<ChannelWriter>>,
        readers: Vec<Option<ChannelReader>>,
        wait: WaitConfig,
        interrupt: Interrupt,
    ) -> Self {
        Self {
            id,
            participants,
            writers,
            readers,
            wait,
            interrupt,
        }
    }
}

impl Transport for Endpoint {
    fn local_id(&self) -> ParticipantId {
        self.id
    }

    fn participants(&self) -> usize {
        self.participants
    }

    fn send(&mut self, to: ParticipantId, message: &Message) -> Result<()> {
        let local = self.id;
        let writer = match self.writers.get_mut(to as usize).and_then(Option::as_mut) {
            Some(writer) => writer,
            None => return Err(Error::UnknownPeer { local, peer: to }),
        };

        let frame = message.to_bytes();
        let result = writer.write_frame(&frame);
        let label = message.message_type().label();
        metrics::record_send(label, frame.len(), result.is_ok());

        trace!(
            from = local,
            to,
            message_type = label,
            time = message.local_time(),
            "frame sent"
        );
        result
    }

    fn receive(&mut self, from: ParticipantId) -> Result<Message> {
        let local = self.id;
        let mut waiter = Waiter::new(&self.wait, &self.interrupt);
        let reader = match self.readers.get_mut(from as usize).and_then(Option::as_mut) {
            Some(reader) => reader,
            None => return Err(Error::UnknownPeer { local, peer: from }),
        };

        loop {
            let before = reader.buffered();
            match reader.poll()? {
                FramePoll::Ready(message) => {
                    metrics::record_receive(message.message_type().label());
                    trace!(from, to = local, message_type = %message.message_type(), "frame received");
                    return Ok(message);
                }
                // Part of a frame arrived; the rest is likely close behind
                FramePoll::Pending if reader.buffered() > before => waiter.reset(),
                FramePoll::Pending => waiter.wait()?,
                FramePoll::Closed => return Err(Error::PeerClosed { from, to: local }),
            }
        }
    }

    fn receive_any(&mut self) -> Result<(ParticipantId, Message)> {
        let local = self.id;
        let mut waiter = Waiter::new(&self.wait, &self.interrupt);

        loop {
            let mut open = 0usize;
            let mut progressed = false;

            for (from, slot) in self.readers.iter_mut().enumerate() {
                let reader = match slot {
                    Some(reader) => reader,
                    None => continue,
                };
                let from = from as ParticipantId;
                let before = reader.buffered();

                match reader.poll()? {
                    FramePoll::Ready(message) => {
                        metrics::record_receive(message.message_type().label());
                        trace!(from, to = local, message_type = %message.message_type(), "frame received");
                        return Ok((from, message));
                    }
                    FramePoll::Pending => {
                        open += 1;
                        progressed |= reader.buffered() > before;
                    }
                    // Writer finished; buffered frames were already consumed
                    FramePoll::Closed => {}
                }
            }

            if open == 0 {
                return Err(Error::AllPeersClosed { local });
            }
            if progressed {
                waiter.reset();
            } else {
                waiter.wait()?;
            }
        }
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        let outgoing = self.writers.iter().filter(|w| w.is_some()).count();
        let incoming = self.readers.iter().filter(|r| r.is_some()).count();
        debug!(
            participant = self.id,
            outgoing, incoming, "closing channel ends"
        );
    }
}
