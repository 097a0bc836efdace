//! Worker role
//!
//! ```text
//! AwaitStartBarrier ──all STARTED──► Active ──STOP──► Stopping ──all DONE──► Terminated
//! ```
//!
//! A worker holds one balance and its history. It forwards outgoing
//! transfers straight to the receiver, acknowledges incoming ones to the
//! coordinator, and hands its history to the coordinator once every other
//! worker reported DONE.

use ipc_bus::{Message, MessageType, Transport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::{
    barrier,
    events::{BankEvent, EventSink},
    ledger::BalanceHistory,
    metrics::Metrics,
    participant::Participant,
    types::{Balance, ParticipantId, Timestamp, TransferOrder, COORDINATOR_ID},
    wire, Error, Result,
};

/// Worker lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    /// Waiting for STARTED from every other worker
    AwaitStartBarrier,
    /// Serving transfers
    Active,
    /// STOP seen, waiting for DONE from every other worker
    Stopping,
    /// History handed to the coordinator
    Terminated,
}

/// What a worker leaves behind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerOutcome {
    /// Worker id
    pub id: ParticipantId,
    /// Closing balance
    pub balance: Balance,
    /// Logical time when the history was sent
    pub final_time: Timestamp,
    /// Full balance history
    pub history: BalanceHistory,
}

/// How a dispatched message was counted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatch {
    Handled,
    Ignored,
}

/// One worker participant
#[derive(Debug)]
pub struct Worker<T: Transport> {
    core: Participant<T>,
    balance: Balance,
    history: BalanceHistory,
    state: WorkerState,
    stopped: bool,
    done_received: usize,
}

impl<T: Transport> Worker<T> {
    /// Worker over `transport` opening with `balance`
    pub fn new(transport: T, balance: Balance, sink: Arc<dyn EventSink>, metrics: Metrics) -> Self {
        let core = Participant::new(transport, sink, metrics);
        let history = BalanceHistory::new(core.id());
        Self {
            core,
            balance,
            history,
            state: WorkerState::AwaitStartBarrier,
            stopped: false,
            done_received: 0,
        }
    }

    /// Worker id
    pub fn id(&self) -> ParticipantId {
        self.core.id()
    }

    /// Current balance
    pub fn balance(&self) -> Balance {
        self.balance
    }

    /// History so far
    pub fn history(&self) -> &BalanceHistory {
        &self.history
    }

    /// Lifecycle state
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Current logical time
    pub fn now(&self) -> Timestamp {
        self.core.now()
    }

    /// Run the whole protocol and return the closing state
    pub fn run(mut self) -> Result<WorkerOutcome> {
        let id = self.id();
        let result = self.run_protocol();
        if let Err(e) = &result {
            error!(participant = id, time = self.now(), class = ?e.class(), error = %e, "worker aborted");
        }
        result
    }

    fn run_protocol(&mut self) -> Result<WorkerOutcome> {
        self.start()?;

        self.core.barrier(MessageType::Started)?;
        self.core.emit(BankEvent::ReceivedAllStarted);
        self.state = WorkerState::Active;

        while !self.is_finished() {
            let (from, message) = self.core.transport.receive_any()?;
            self.handle(from, message)?;
        }

        self.finish()
    }

    /// Record the opening balance and announce STARTED
    pub(crate) fn start(&mut self) -> Result<()> {
        self.history.append(self.core.now(), self.balance, 0)?;
        let started = self
            .core
            .stamp_event(MessageType::Started, BankEvent::Started { balance: self.balance })?;
        self.core.transport.multicast(&started)?;
        info!(participant = self.id(), balance = self.balance, "worker started");
        Ok(())
    }

    /// STOP seen and DONE collected from every other worker
    pub(crate) fn is_finished(&self) -> bool {
        self.stopped && self.done_received >= barrier::quorum(self.id(), self.core.participants())
    }

    /// Merge the sender's time, then dispatch one message
    pub(crate) fn handle(&mut self, from: ParticipantId, message: Message) -> Result<()> {
        self.core.clock.observe(message.local_time());
        let label = message.message_type().label();

        match self.dispatch(from, message) {
            Err(e) if !e.is_fatal() => {
                warn!(participant = self.id(), time = self.now(), error = %e, "message rejected");
                Ok(())
            }
            Err(e) => Err(e),
            Ok(Dispatch::Handled) => {
                self.core.metrics.record_handled(self.id(), label);
                Ok(())
            }
            Ok(Dispatch::Ignored) => {
                self.core.metrics.record_ignored(self.id(), label);
                Ok(())
            }
        }
    }

    fn dispatch(&mut self, from: ParticipantId, message: Message) -> Result<Dispatch> {
        let id = self.id();
        match message.message_type() {
            MessageType::Transfer => {
                let order = wire::decode_transfer(message.payload())?;
                if order.src == id {
                    self.transfer_out(order, message)?;
                } else if order.dst == id {
                    self.transfer_in(order)?;
                } else {
                    warn!(participant = id, from, %order, "transfer names neither side as this worker");
                    return Ok(Dispatch::Ignored);
                }
            }
            MessageType::Stop => self.stop()?,
            MessageType::Done => {
                self.done_received += 1;
                debug!(participant = id, from, done = self.done_received, "DONE received");
            }
            other => {
                warn!(participant = id, from, message_type = %other, "ignoring message");
                return Ok(Dispatch::Ignored);
            }
        }
        Ok(Dispatch::Handled)
    }

    fn transfer_out(&mut self, order: TransferOrder, mut message: Message) -> Result<()> {
        let id = self.id();
        if self.balance < order.amount {
            self.core.metrics.record_insufficient_funds(id);
            self.core.emit(BankEvent::InsufficientFunds {
                dst: order.dst,
                amount: order.amount,
                balance: self.balance,
            });
            return Err(Error::InsufficientFunds {
                participant: id,
                balance: self.balance,
                amount: order.amount,
            });
        }

        let time = self.core.clock.tick();
        let balance = self.balance - order.amount;
        self.history.append(time, balance, order.amount)?;
        self.balance = balance;
        self.core.emit(BankEvent::TransferOut {
            dst: order.dst,
            amount: order.amount,
        });

        message.set_local_time(time);
        self.core.transport.send(order.dst, &message)?;
        self.core.metrics.record_transfer_out(id);
        Ok(())
    }

    fn transfer_in(&mut self, order: TransferOrder) -> Result<()> {
        let balance = self.balance + order.amount;
        self.history.append(self.core.now(), balance, order.amount)?;
        self.balance = balance;
        self.core.emit(BankEvent::TransferIn {
            src: order.src,
            amount: order.amount,
        });

        let ack = self.core.stamp(MessageType::Ack);
        self.core.transport.send(COORDINATOR_ID, &ack)?;
        self.core.metrics.record_transfer_in(self.id());
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if self.stopped {
            return Err(Error::DuplicateStop {
                participant: self.id(),
            });
        }
        self.stopped = true;
        self.state = WorkerState::Stopping;
        self.core.emit(BankEvent::StopReceived);

        let done = self
            .core
            .stamp_event(MessageType::Done, BankEvent::Done { balance: self.balance })?;
        self.core.transport.multicast(&done)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<WorkerOutcome> {
        self.history.append(self.core.now(), self.balance, 0)?;
        self.core.emit(BankEvent::ReceivedAllDone);

        let time = self.core.clock.tick();
        let message = Message::with_payload(
            MessageType::BalanceHistory,
            time,
            wire::encode_history(&self.history),
        )?;
        self.core.transport.send(COORDINATOR_ID, &message)?;
        self.state = WorkerState::Terminated;

        info!(
            participant = self.id(),
            balance = self.balance,
            entries = self.history.len(),
            "worker terminated"
        );
        Ok(WorkerOutcome {
            id: self.id(),
            balance: self.balance,
            final_time: time,
            history: self.history.clone(),
        })
    }
}
