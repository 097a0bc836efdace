//! State shared by both participant roles

use ipc_bus::{Message, MessageType, Transport};
use std::sync::Arc;

use crate::{
    barrier,
    clock::LamportClock,
    events::{BankEvent, EventRecord, EventSink},
    metrics::Metrics,
    types::{worker_ids, ParticipantId, Timestamp},
    Result,
};

/// One participant's transport, clock and reporting handles.
///
/// Owned by exactly one thread; nothing in here is shared mutably.
#[derive(Debug)]
pub struct Participant<T: Transport> {
    pub(crate) transport: T,
    pub(crate) clock: LamportClock,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) metrics: Metrics,
}

impl<T: Transport> Participant<T> {
    /// Wrap a transport with a fresh clock
    pub fn new(transport: T, sink: Arc<dyn EventSink>, metrics: Metrics) -> Self {
        Self {
            transport,
            clock: LamportClock::new(),
            sink,
            metrics,
        }
    }

    /// Participant id
    pub fn id(&self) -> ParticipantId {
        self.transport.local_id()
    }

    /// Participants in the run
    pub fn participants(&self) -> usize {
        self.transport.participants()
    }

    /// Current logical time
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Worker ids, ascending
    pub fn worker_ids(&self) -> Vec<ParticipantId> {
        worker_ids(self.participants()).collect()
    }

    /// Report `event` at the current logical time
    pub(crate) fn emit(&self, event: BankEvent) {
        let record = EventRecord::new(self.clock.now(), self.id(), event);
        self.sink.record(&record);
    }

    /// Tick and build an empty message stamped with the new time
    pub(crate) fn stamp(&mut self, message_type: MessageType) -> Message {
        Message::new(message_type, self.clock.tick())
    }

    /// Tick, report `event` at the new time and carry its log line as payload
    pub(crate) fn stamp_event(&mut self, message_type: MessageType, event: BankEvent) -> Result<Message> {
        let time = self.clock.tick();
        let record = EventRecord::new(time, self.id(), event);
        self.sink.record(&record);
        Ok(Message::with_payload(message_type, time, record.to_string())?)
    }

    /// Block until every other worker sent `expected`
    pub(crate) fn barrier(&mut self, expected: MessageType) -> Result<usize> {
        barrier::await_quorum(&mut self.transport, &mut self.clock, &self.metrics, expected)
    }
}
