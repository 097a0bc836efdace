//! Participant event records and sinks
//!
//! Every observable step of a participant is reported as an [`EventRecord`].
//! Its `Display` form is the classic one-line event log, e.g.
//! `"3: process 1 has STARTED with balance $10"`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::types::{Balance, ParticipantId, Timestamp};

/// What happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BankEvent {
    /// Initial balance announced
    Started {
        /// Opening balance
        balance: Balance,
    },

    /// STARTED barrier complete
    ReceivedAllStarted,

    /// Money left this worker
    TransferOut {
        /// Receiving worker
        dst: ParticipantId,
        /// Amount moved
        amount: Balance,
    },

    /// Money arrived at this worker
    TransferIn {
        /// Sending worker
        src: ParticipantId,
        /// Amount moved
        amount: Balance,
    },

    /// Transfer refused, nothing changed
    InsufficientFunds {
        /// Intended receiver
        dst: ParticipantId,
        /// Requested amount
        amount: Balance,
        /// Balance at the time of the order
        balance: Balance,
    },

    /// STOP received from the coordinator
    StopReceived,

    /// DONE announced
    Done {
        /// Closing balance
        balance: Balance,
    },

    /// DONE barrier complete
    ReceivedAllDone,

    /// Coordinator collected one worker's history
    HistoryReceived {
        /// Worker the history belongs to
        from: ParticipantId,
        /// Entry count
        entries: usize,
    },
}

/// One event stamped with the participant's logical time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Logical time at which the event happened
    pub time: Timestamp,

    /// Participant reporting the event
    pub participant: ParticipantId,

    /// Wall-clock capture time
    pub recorded_at: DateTime<Utc>,

    /// The event
    pub event: BankEvent,
}

impl EventRecord {
    /// Record `event` now
    pub fn new(time: Timestamp, participant: ParticipantId, event: BankEvent) -> Self {
        Self {
            time,
            participant,
            recorded_at: Utc::now(),
            event,
        }
    }
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (t, id) = (self.time, self.participant);
        match &self.event {
            BankEvent::Started { balance } => {
                write!(f, "{}: process {} has STARTED with balance ${}", t, id, balance)
            }
            BankEvent::ReceivedAllStarted => {
                write!(f, "{}: process {} received all STARTED messages", t, id)
            }
            BankEvent::TransferOut { dst, amount } => {
                write!(f, "{}: process {} transferred ${} to process {}", t, id, amount, dst)
            }
            BankEvent::TransferIn { src, amount } => {
                write!(f, "{}: process {} received ${} from process {}", t, id, amount, src)
            }
            BankEvent::InsufficientFunds {
                dst,
                amount,
                balance,
            } => write!(
                f,
                "{}: process {} cannot transfer ${} to process {} with balance ${}",
                t, id, amount, dst, balance
            ),
            BankEvent::StopReceived => write!(f, "{}: process {} received STOP", t, id),
            BankEvent::Done { balance } => {
                write!(f, "{}: process {} has DONE with balance ${}", t, id, balance)
            }
            BankEvent::ReceivedAllDone => {
                write!(f, "{}: process {} received all DONE messages", t, id)
            }
            BankEvent::HistoryReceived { from, entries } => write!(
                f,
                "{}: process {} received balance history of process {} ({} entries)",
                t, id, from, entries
            ),
        }
    }
}

/// Destination for event records, shared by every participant thread
pub trait EventSink: Send + Sync + fmt::Debug {
    /// Accept one record
    fn record(&self, record: &EventRecord);
}

/// Emits records as `tracing` events under the `bank::events` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, record: &EventRecord) {
        info!(
            target: "bank::events",
            participant = record.participant,
            time = record.time,
            "{}",
            record
        );
    }
}

/// Keeps records in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<EventRecord>>,
}

impl MemorySink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record so far
    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().clone()
    }

    /// Records of one participant, in emission order
    pub fn records_of(&self, participant: ParticipantId) -> Vec<EventRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.participant == participant)
            .cloned()
            .collect()
    }

    /// Rendered log lines of one participant
    pub fn lines_of(&self, participant: ParticipantId) -> Vec<String> {
        self.records_of(participant)
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}

impl EventSink for MemorySink {
    fn record(&self, record: &EventRecord) {
        self.records.lock().push(record.clone());
    }
}
