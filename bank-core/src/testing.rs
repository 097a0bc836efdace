//! In-memory transport for unit tests

use ipc_bus::{Message, ParticipantId, Transport};
use std::collections::VecDeque;

/// Transport fed from per-peer queues; an empty queue reads as a closed peer
#[derive(Debug)]
pub(crate) struct ScriptedTransport {
    id: ParticipantId,
    participants: usize,
    inbound: Vec<VecDeque<Message>>,
    pub(crate) sent: Vec<(ParticipantId, Message)>,
}

impl ScriptedTransport {
    pub(crate) fn new(id: ParticipantId, participants: usize) -> Self {
        Self {
            id,
            participants,
            inbound: vec![VecDeque::new(); participants],
            sent: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, from: ParticipantId, message: Message) {
        self.inbound[from as usize].push_back(message);
    }

    pub(crate) fn sent_to(&self, to: ParticipantId) -> Vec<&Message> {
        self.sent
            .iter()
            .filter(|(peer, _)| *peer == to)
            .map(|(_, m)| m)
            .collect()
    }

    pub(crate) fn pending(&self) -> usize {
        self.inbound.iter().map(VecDeque::len).sum()
    }
}

impl Transport for ScriptedTransport {
    fn local_id(&self) -> ParticipantId {
        self.id
    }

    fn participants(&self) -> usize {
        self.participants
    }

    fn send(&mut self, to: ParticipantId, message: &Message) -> ipc_bus::Result<()> {
        if to == self.id || to as usize >= self.participants {
            return Err(ipc_bus::Error::UnknownPeer {
                local: self.id,
                peer: to,
            });
        }
        self.sent.push((to, message.clone()));
        Ok(())
    }

    fn receive(&mut self, from: ParticipantId) -> ipc_bus::Result<Message> {
        self.inbound
            .get_mut(from as usize)
            .and_then(VecDeque::pop_front)
            .ok_or(ipc_bus::Error::PeerClosed { from, to: self.id })
    }

    fn receive_any(&mut self) -> ipc_bus::Result<(ParticipantId, Message)> {
        for (from, queue) in self.inbound.iter_mut().enumerate() {
            if let Some(message) = queue.pop_front() {
                return Ok((from as ParticipantId, message));
            }
        }
        Err(ipc_bus::Error::AllPeersClosed { local: self.id })
    }
}
