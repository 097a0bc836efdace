//! Balance history collection and the final report

use ipc_bus::{MessageType, Transport};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    events::BankEvent,
    ledger::BalanceHistory,
    participant::Participant,
    types::{Balance, ParticipantId, Timestamp, COORDINATOR_ID},
    wire, Error, Result,
};

/// Receives every worker's history in ascending id order
#[derive(Debug, Clone)]
pub struct SnapshotCollector {
    workers: Vec<ParticipantId>,
}

impl SnapshotCollector {
    /// Collector expecting one history from each of `workers`
    pub fn new(mut workers: Vec<ParticipantId>) -> Self {
        workers.sort_unstable();
        Self { workers }
    }

    /// Receive and validate every history
    pub fn collect<T: Transport>(&self, core: &mut Participant<T>) -> Result<SnapshotReport> {
        let local = core.id();
        let mut histories = Vec::with_capacity(self.workers.len());

        for &worker in &self.workers {
            let message = core.transport.receive(worker)?;
            if message.message_type() != MessageType::BalanceHistory {
                return Err(Error::UnexpectedMessage {
                    participant: local,
                    from: worker,
                    expected: MessageType::BalanceHistory,
                    got: message.message_type(),
                });
            }
            core.clock.observe(message.local_time());

            let history = wire::decode_history(message.payload())?;
            if history.owner() != worker {
                return Err(Error::HistoryOwnerMismatch {
                    channel: worker,
                    owner: history.owner(),
                });
            }

            core.emit(BankEvent::HistoryReceived {
                from: worker,
                entries: history.len(),
            });
            core.metrics.record_history_collected();
            debug!(participant = local, worker, entries = history.len(), "history collected");
            histories.push(history);
        }

        Ok(SnapshotReport::new(histories))
    }
}

/// One tick across every worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineRow {
    /// Logical time
    pub time: Timestamp,
    /// Balance of each worker, in worker id order
    pub balances: Vec<Balance>,
    /// Amount moved at this tick by each worker, in worker id order
    pub pending_in: Vec<Balance>,
}

/// Histories of every worker, ascending by owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotReport {
    histories: Vec<BalanceHistory>,
}

impl SnapshotReport {
    /// Report over `histories`
    pub fn new(mut histories: Vec<BalanceHistory>) -> Self {
        histories.sort_by_key(BalanceHistory::owner);
        Self { histories }
    }

    /// Every history, ascending by owner
    pub fn histories(&self) -> &[BalanceHistory] {
        &self.histories
    }

    /// History of `worker`
    pub fn history(&self, worker: ParticipantId) -> Option<&BalanceHistory> {
        if worker == COORDINATOR_ID {
            return None;
        }
        self.histories.iter().find(|h| h.owner() == worker)
    }

    /// Closing balance of each worker
    pub fn final_balances(&self) -> Vec<(ParticipantId, Balance)> {
        self.histories
            .iter()
            .filter_map(|h| h.last().map(|s| (h.owner(), s.balance)))
            .collect()
    }

    /// Sum of closing balances
    pub fn total_balance(&self) -> i64 {
        self.final_balances()
            .iter()
            .map(|&(_, balance)| i64::from(balance))
            .sum()
    }

    /// Latest tick recorded by any worker
    pub fn max_time(&self) -> Option<Timestamp> {
        self.histories.iter().filter_map(BalanceHistory::last_time).max()
    }

    /// Per-tick rows from the earliest to the latest recorded tick.
    ///
    /// Histories that end early carry their closing balance forward.
    pub fn timeline(&self) -> Vec<TimelineRow> {
        let start = self.histories.iter().filter_map(BalanceHistory::first_time).min();
        let (start, end) = match (start, self.max_time()) {
            (Some(start), Some(end)) => (start, end),
            _ => return Vec::new(),
        };

        (start..=end)
            .map(|time| TimelineRow {
                time,
                balances: self
                    .histories
                    .iter()
                    .map(|h| h.balance_at(time).unwrap_or(0))
                    .collect(),
                pending_in: self
                    .histories
                    .iter()
                    .map(|h| h.state_at(time).map_or(0, |s| s.pending_in))
                    .collect(),
            })
            .collect()
    }

    /// Every history is gap-free
    pub fn is_dense(&self) -> bool {
        self.histories.iter().all(BalanceHistory::is_dense)
    }
}
