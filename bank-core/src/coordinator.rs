//! Coordinator role
//!
//! ```text
//! AwaitStartBarrier ─► Driving ─► AwaitDoneBarrier ─► Collecting ─► Done
//! ```
//!
//! The coordinator never holds money. It waits for every worker to start,
//! lets a driver issue transfers one at a time, stops the workers and gathers
//! their balance histories into a [`SnapshotReport`].

use ipc_bus::{Message, MessageType, Transport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::{
    driver::{TransferDriver, TransferIssuer},
    events::{BankEvent, EventSink},
    metrics::Metrics,
    participant::Participant,
    snapshot::{SnapshotCollector, SnapshotReport},
    types::{Balance, ParticipantId, Timestamp, TransferOrder},
    wire, Error, Result,
};

/// Coordinator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinatorState {
    /// Waiting for STARTED from every worker
    AwaitStartBarrier,
    /// Driver is issuing transfers
    Driving,
    /// STOP sent, waiting for DONE from every worker
    AwaitDoneBarrier,
    /// Receiving balance histories
    Collecting,
    /// Report assembled
    Done,
}

/// The coordinator participant (id 0)
#[derive(Debug)]
pub struct Coordinator<T: Transport> {
    core: Participant<T>,
    state: CoordinatorState,
}

impl<T: Transport> Coordinator<T> {
    /// Coordinator over `transport`
    pub fn new(transport: T, sink: Arc<dyn EventSink>, metrics: Metrics) -> Self {
        Self {
            core: Participant::new(transport, sink, metrics),
            state: CoordinatorState::AwaitStartBarrier,
        }
    }

    /// Lifecycle state
    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Current logical time
    pub fn now(&self) -> Timestamp {
        self.core.now()
    }

    /// Run the whole protocol with `driver` supplying transfers
    pub fn run(mut self, driver: &mut dyn TransferDriver) -> Result<SnapshotReport> {
        let result = self.run_protocol(driver);
        if let Err(e) = &result {
            error!(
                participant = self.core.id(),
                time = self.now(),
                state = ?self.state,
                class = ?e.class(),
                error = %e,
                "coordinator aborted"
            );
        }
        result
    }

    fn run_protocol(&mut self, driver: &mut dyn TransferDriver) -> Result<SnapshotReport> {
        self.core.barrier(MessageType::Started)?;
        self.core.emit(BankEvent::ReceivedAllStarted);

        self.state = CoordinatorState::Driving;
        driver.drive(self)?;

        let stop = self.core.stamp(MessageType::Stop);
        self.core.transport.multicast(&stop)?;
        info!(participant = self.core.id(), time = stop.local_time(), "STOP sent");

        self.state = CoordinatorState::AwaitDoneBarrier;
        self.core.barrier(MessageType::Done)?;
        self.core.emit(BankEvent::ReceivedAllDone);

        self.state = CoordinatorState::Collecting;
        let report = SnapshotCollector::new(self.core.worker_ids()).collect(&mut self.core)?;

        self.state = CoordinatorState::Done;
        info!(
            workers = report.histories().len(),
            total = report.total_balance(),
            "snapshot collected"
        );
        Ok(report)
    }
}

impl<T: Transport> TransferIssuer for Coordinator<T> {
    fn issue_transfer(&mut self, src: ParticipantId, dst: ParticipantId, amount: Balance) -> Result<()> {
        let order = TransferOrder::new(src, dst, amount);
        order.validate(self.core.participants())?;

        let time = self.core.clock.tick();
        let message = Message::with_payload(MessageType::Transfer, time, wire::encode_transfer(&order))?;
        self.core.transport.send(src, &message)?;

        let reply = self.core.transport.receive(dst)?;
        self.core.clock.observe(reply.local_time());
        if reply.message_type() != MessageType::Ack {
            return Err(Error::UnexpectedMessage {
                participant: self.core.id(),
                from: dst,
                expected: MessageType::Ack,
                got: reply.message_type(),
            });
        }

        self.core
            .metrics
            .record_handled(self.core.id(), MessageType::Ack.label());
        debug!(%order, sent_at = time, acked_at = self.now(), "transfer acknowledged");
        Ok(())
    }

    fn worker_ids(&self) -> Vec<ParticipantId> {
        self.core.worker_ids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::ScriptedDriver;
    use crate::events::MemorySink;
    use crate::ledger::BalanceHistory;
    use crate::testing::ScriptedTransport;
    use crate::types::COORDINATOR_ID;

    fn coordinator(participants: usize) -> (Coordinator<ScriptedTransport>, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let coordinator = Coordinator::new(
            ScriptedTransport::new(COORDINATOR_ID, participants),
            sink.clone(),
            Metrics::new().unwrap(),
        );
        (coordinator, sink)
    }

    fn transport(coordinator: &mut Coordinator<ScriptedTransport>) -> &mut ScriptedTransport {
        &mut coordinator.core.transport
    }

    #[test]
    fn test_issue_transfer_waits_for_ack() {
        let (mut coordinator, _) = coordinator(3);
        transport(&mut coordinator).push(2, Message::new(MessageType::Ack, 7));

        coordinator.issue_transfer(1, 2, 5).unwrap();

        let sent = transport(&mut coordinator).sent_to(1);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].local_time(), 1);
        assert_eq!(
            wire::decode_transfer(sent[0].payload()).unwrap(),
            TransferOrder::new(1, 2, 5)
        );
        assert_eq!(coordinator.now(), 8);
    }

    #[test]
    fn test_invalid_transfer_sends_nothing() {
        let (mut coordinator, _) = coordinator(3);
        for (src, dst, amount) in [(1, 1, 5), (0, 2, 5), (1, 3, 5), (1, 2, 0)] {
            let err = coordinator.issue_transfer(src, dst, amount).unwrap_err();
            assert!(matches!(err, Error::InvalidTransfer(_)));
        }
        assert!(transport(&mut coordinator).sent.is_empty());
        assert_eq!(coordinator.now(), 0);
    }

    #[test]
    fn test_non_ack_reply_is_fatal() {
        let (mut coordinator, _) = coordinator(3);
        transport(&mut coordinator).push(2, Message::new(MessageType::Done, 7));

        let err = coordinator.issue_transfer(1, 2, 5).unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedMessage {
                expected: MessageType::Ack,
                got: MessageType::Done,
                ..
            }
        ));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_full_run() {
        let (mut coordinator, sink) = coordinator(3);
        let mut one = BalanceHistory::new(1);
        one.append(0, 10, 0).unwrap();
        let mut two = BalanceHistory::new(2);
        two.append(0, 20, 0).unwrap();
        {
            let t = transport(&mut coordinator);
            t.push(1, Message::new(MessageType::Started, 1));
            t.push(2, Message::new(MessageType::Started, 1));
            t.push(2, Message::new(MessageType::Ack, 7));
            t.push(1, Message::new(MessageType::Done, 10));
            t.push(2, Message::new(MessageType::Done, 10));
            t.push(
                1,
                Message::with_payload(MessageType::BalanceHistory, 12, wire::encode_history(&one)).unwrap(),
            );
            t.push(
                2,
                Message::with_payload(MessageType::BalanceHistory, 12, wire::encode_history(&two)).unwrap(),
            );
        }

        let mut driver = ScriptedDriver::new(vec![TransferOrder::new(1, 2, 5)]);
        let report = coordinator.run(&mut driver).unwrap();
        assert_eq!(report.histories(), &[one, two]);

        let lines = sink.lines_of(COORDINATOR_ID);
        // observe(1) -> 2, observe(1) -> 3
        assert_eq!(lines[0], "3: process 0 received all STARTED messages");
        assert!(lines.contains(&"12: process 0 received all DONE messages".to_string()));
    }

    #[test]
    fn test_stop_reaches_every_worker() {
        let (mut coordinator, _) = coordinator(4);
        for id in 1..4 {
            transport(&mut coordinator).push(id, Message::new(MessageType::Started, 1));
        }

        let mut driver = ScriptedDriver::default();
        // No DONE queued, so the run fails at the DONE barrier after STOP went out
        let err = coordinator.run_protocol(&mut driver).unwrap_err();
        assert!(matches!(err, Error::Bus(ipc_bus::Error::PeerClosed { from: 1, .. })));
        assert_eq!(coordinator.state(), CoordinatorState::AwaitDoneBarrier);

        for id in 1..4 {
            let sent = transport(&mut coordinator).sent_to(id);
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].message_type(), MessageType::Stop);
            // Barrier observed 1 three times -> 4, STOP at 5
            assert_eq!(sent[0].local_time(), 5);
        }
    }
}
