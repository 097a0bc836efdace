//! Per-worker balance history
//!
//! The history holds one entry per logical tick from the first recorded time
//! to the last one. Ticks with no activity are filled in with the previous
//! balance and nothing in flight, so the coordinator can line up histories
//! from every worker at any tick.
//!
//! # Invariants
//!
//! - Times strictly increase by exactly one between neighbouring entries
//! - At most [`MAX_HISTORY_LEN`] entries

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    types::{Balance, ParticipantId, Timestamp},
    wire::{BALANCE_STATE_LEN, HISTORY_HEADER_LEN},
};

/// Maximum entries in one history; the encoded history fits one frame
pub const MAX_HISTORY_LEN: usize = 682;

const _: () = assert!(
    HISTORY_HEADER_LEN + MAX_HISTORY_LEN * BALANCE_STATE_LEN <= ipc_bus::MAX_PAYLOAD_LEN
);

/// Balance of one worker at one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceState {
    /// Logical time of the entry
    pub time: Timestamp,

    /// Balance after the event at `time`
    pub balance: Balance,

    /// Amount moved by the event at `time`, 0 for filler entries
    pub pending_in: Balance,
}

/// Dense balance history of one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceHistory {
    owner: ParticipantId,
    states: Vec<BalanceState>,
}

impl BalanceHistory {
    /// Empty history for `owner`
    pub fn new(owner: ParticipantId) -> Self {
        Self {
            owner,
            states: Vec::new(),
        }
    }

    /// Rebuild a history from decoded entries, rejecting gaps and overflow
    pub fn from_states(owner: ParticipantId, states: Vec<BalanceState>) -> Result<Self> {
        if states.len() > MAX_HISTORY_LEN {
            return Err(Error::HistoryFull {
                capacity: MAX_HISTORY_LEN,
            });
        }
        for pair in states.windows(2) {
            if pair[1].time != pair[0].time + 1 {
                return Err(Error::Wire(format!(
                    "history of {} jumps from {} to {}",
                    owner, pair[0].time, pair[1].time
                )));
            }
        }
        Ok(Self { owner, states })
    }

    /// Record the balance at `time`, filling any skipped ticks first
    pub fn append(&mut self, time: Timestamp, balance: Balance, pending_in: Balance) -> Result<()> {
        let entry = BalanceState {
            time,
            balance,
            pending_in,
        };

        let last = match self.states.last_mut() {
            Some(last) => last,
            None => {
                self.states.push(entry);
                return Ok(());
            }
        };

        if time < last.time {
            return Err(Error::TimeRegression {
                last: last.time,
                time,
            });
        }
        if time == last.time {
            *last = entry;
            return Ok(());
        }

        let (last_time, last_balance) = (last.time, last.balance);
        let added = (time - last_time) as usize;
        if self.states.len() + added > MAX_HISTORY_LEN {
            return Err(Error::HistoryFull {
                capacity: MAX_HISTORY_LEN,
            });
        }

        self.states.extend((last_time + 1..time).map(|t| BalanceState {
            time: t,
            balance: last_balance,
            pending_in: 0,
        }));
        self.states.push(entry);
        Ok(())
    }

    /// Worker the history belongs to
    pub fn owner(&self) -> ParticipantId {
        self.owner
    }

    /// Entries in time order
    pub fn states(&self) -> &[BalanceState] {
        &self.states
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// No entries yet
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Most recent entry
    pub fn last(&self) -> Option<&BalanceState> {
        self.states.last()
    }

    /// Time of the first entry
    pub fn first_time(&self) -> Option<Timestamp> {
        self.states.first().map(|s| s.time)
    }

    /// Time of the last entry
    pub fn last_time(&self) -> Option<Timestamp> {
        self.states.last().map(|s| s.time)
    }

    /// Entry recorded at exactly `time`
    pub fn state_at(&self, time: Timestamp) -> Option<&BalanceState> {
        let first = self.first_time()?;
        if time < first {
            return None;
        }
        self.states.get((time - first) as usize)
    }

    /// Balance at `time`; after the last entry the final balance carries forward
    pub fn balance_at(&self, time: Timestamp) -> Option<Balance> {
        match self.state_at(time) {
            Some(state) => Some(state.balance),
            None => self
                .last()
                .filter(|last| time > last.time)
                .map(|last| last.balance),
        }
    }

    /// Every neighbouring pair is one tick apart
    pub fn is_dense(&self) -> bool {
        self.states
            .windows(2)
            .all(|pair| pair[1].time == pair[0].time + 1)
    }
}
