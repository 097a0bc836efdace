//! Core types for the bank
//!
//! Identifiers and timestamps come from the channel bus so that both crates
//! agree on their wire widths.

use serde::{Deserialize, Serialize};
use std::fmt;

pub use ipc_bus::{ParticipantId, Timestamp, COORDINATOR_ID, MAX_PARTICIPANTS};

/// Money amount in whole units
pub type Balance = i32;

/// Largest number of workers in one run
pub const MAX_WORKERS: usize = MAX_PARTICIPANTS - 1;

/// Instruction to move `amount` from `src` to `dst`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferOrder {
    /// Debited worker
    pub src: ParticipantId,

    /// Credited worker
    pub dst: ParticipantId,

    /// Amount, strictly positive
    pub amount: Balance,
}

impl TransferOrder {
    /// Create a transfer order
    pub fn new(src: ParticipantId, dst: ParticipantId, amount: Balance) -> Self {
        Self { src, dst, amount }
    }

    /// Check the order against a run with `participants` ids
    pub fn validate(&self, participants: usize) -> crate::Result<()> {
        let is_worker = |id: ParticipantId| id != COORDINATOR_ID && (id as usize) < participants;

        if !is_worker(self.src) {
            return Err(crate::Error::InvalidTransfer(format!(
                "source {} is not a worker",
                self.src
            )));
        }
        if !is_worker(self.dst) {
            return Err(crate::Error::InvalidTransfer(format!(
                "destination {} is not a worker",
                self.dst
            )));
        }
        if self.src == self.dst {
            return Err(crate::Error::InvalidTransfer(format!(
                "source and destination are both {}",
                self.src
            )));
        }
        if self.amount <= 0 {
            return Err(crate::Error::InvalidTransfer(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        Ok(())
    }
}

impl fmt::Display for TransferOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${} from {} to {}", self.amount, self.src, self.dst)
    }
}

/// Worker ids of a run with `participants` ids, ascending
pub fn worker_ids(participants: usize) -> impl Iterator<Item = ParticipantId> {
    (1..participants).map(|id| id as ParticipantId)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_validation() {
        assert!(TransferOrder::new(1, 2, 5).validate(3).is_ok());
        assert!(TransferOrder::new(0, 2, 5).validate(3).is_err());
        assert!(TransferOrder::new(1, 3, 5).validate(3).is_err());
        assert!(TransferOrder::new(1, 1, 5).validate(3).is_err());
        assert!(TransferOrder::new(1, 2, 0).validate(3).is_err());
        assert!(TransferOrder::new(1, 2, -4).validate(3).is_err());
    }

    #[test]
    fn test_worker_ids() {
        assert_eq!(worker_ids(4).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(worker_ids(1).count(), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(TransferOrder::new(1, 2, 5).to_string(), "$5 from 1 to 2");
    }
}
