//! Lamport logical clock

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Per-participant Lamport counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LamportClock {
    time: Timestamp,
}

impl LamportClock {
    /// Clock at time 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance for a local send and return the new time.
    ///
    /// Saturates at `Timestamp::MAX`; a run that far out has long overflowed
    /// every balance history.
    pub fn tick(&mut self) -> Timestamp {
        self.time = self.time.saturating_add(1);
        self.time
    }

    /// Merge a received time, then advance
    pub fn observe(&mut self, remote: Timestamp) -> Timestamp {
        self.time = self.time.max(remote).saturating_add(1);
        self.time
    }

    /// Current time
    pub fn now(&self) -> Timestamp {
        self.time
    }
}
