//! Quorum barrier over the worker channels
//!
//! A barrier round receives exactly one message from every worker other than
//! the caller, in ascending id order. Only messages of the expected type count
//! toward the quorum; anything else is discarded and not requeued, so a stray
//! message ahead of the expected one in a channel makes the round fall short.

use ipc_bus::{MessageType, Transport};
use tracing::{debug, warn};

use crate::{
    clock::LamportClock,
    metrics::Metrics,
    types::{worker_ids, ParticipantId, COORDINATOR_ID},
    Error, Result,
};

/// Messages a participant must collect: every worker except itself
pub fn quorum(local: ParticipantId, participants: usize) -> usize {
    let workers = participants.saturating_sub(1);
    if local == COORDINATOR_ID {
        workers
    } else {
        workers.saturating_sub(1)
    }
}

/// Run one barrier round for `expected`, observing the time of each counted message
pub fn await_quorum<T: Transport>(
    transport: &mut T,
    clock: &mut LamportClock,
    metrics: &Metrics,
    expected: MessageType,
) -> Result<usize> {
    let local = transport.local_id();
    let participants = transport.participants();
    let required = quorum(local, participants);
    let mut counted = 0usize;

    for peer in worker_ids(participants).filter(|&id| id != local) {
        let message = transport.receive(peer)?;

        if message.message_type() == expected {
            clock.observe(message.local_time());
            counted += 1;
            metrics.record_handled(local, expected.label());
        } else {
            warn!(
                participant = local,
                peer,
                expected = %expected,
                got = %message.message_type(),
                "discarding message during barrier"
            );
            metrics.record_ignored(local, message.message_type().label());
        }
    }

    if counted != required {
        return Err(Error::BarrierShortfall {
            participant: local,
            expected,
            counted,
            quorum: required,
        });
    }

    debug!(participant = local, time = clock.now(), barrier = %expected, counted, "barrier complete");
    Ok(counted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use ipc_bus::Message;

    #[test]
    fn test_quorum() {
        assert_eq!(quorum(COORDINATOR_ID, 4), 3);
        assert_eq!(quorum(2, 4), 2);
        assert_eq!(quorum(1, 2), 0);
    }

    #[test]
    fn test_worker_barrier_excludes_coordinator_and_self() {
        let metrics = Metrics::new().unwrap();
        let mut transport = ScriptedTransport::new(2, 4);
        transport.push(1, Message::new(MessageType::Started, 1));
        transport.push(3, Message::new(MessageType::Started, 5));
        // Never read by a worker barrier
        transport.push(0, Message::new(MessageType::Transfer, 9));

        let mut clock = LamportClock::new();
        clock.tick();
        let counted = await_quorum(&mut transport, &mut clock, &metrics, MessageType::Started).unwrap();

        assert_eq!(counted, 2);
        // observe(1) -> 2, observe(5) -> 6
        assert_eq!(clock.now(), 6);
        assert_eq!(transport.pending(), 1);
    }

    #[test]
    fn test_coordinator_barrier_counts_all_workers() {
        let metrics = Metrics::new().unwrap();
        let mut transport = ScriptedTransport::new(0, 4);
        for id in 1..4 {
            transport.push(id, Message::new(MessageType::Done, id as i32 * 2));
        }

        let mut clock = LamportClock::new();
        assert_eq!(
            await_quorum(&mut transport, &mut clock, &metrics, MessageType::Done).unwrap(),
            3
        );
        assert_eq!(clock.now(), 7);
    }

    #[test]
    fn test_mismatched_message_is_discarded() {
        let metrics = Metrics::new().unwrap();
        let mut transport = ScriptedTransport::new(0, 3);
        transport.push(1, Message::new(MessageType::Ack, 4));
        transport.push(1, Message::new(MessageType::Done, 5));
        transport.push(2, Message::new(MessageType::Done, 6));

        let mut clock = LamportClock::new();
        let err = await_quorum(&mut transport, &mut clock, &metrics, MessageType::Done).unwrap_err();
        match err {
            Error::BarrierShortfall { counted, quorum, .. } => {
                assert_eq!(counted, 1);
                assert_eq!(quorum, 2);
            }
            other => panic!("expected shortfall, got {:?}", other),
        }
        // The DONE behind the discarded ACK stays queued
        assert_eq!(transport.pending(), 1);
        assert_eq!(clock.now(), 7);
    }

    #[test]
    fn test_coordinator_shortfall_with_three_workers() {
        let metrics = Metrics::new().unwrap();
        let mut transport = ScriptedTransport::new(COORDINATOR_ID, 4);
        transport.push(1, Message::new(MessageType::Started, 2));
        transport.push(2, Message::new(MessageType::Transfer, 30));
        transport.push(3, Message::new(MessageType::Started, 4));

        let mut clock = LamportClock::new();
        let err = await_quorum(&mut transport, &mut clock, &metrics, MessageType::Started).unwrap_err();
        assert!(matches!(
            err,
            Error::BarrierShortfall {
                participant: COORDINATOR_ID,
                expected: MessageType::Started,
                counted: 2,
                quorum: 3,
            }
        ));
        assert!(err.is_fatal());
        // One receive per worker; the TRANSFER is dropped without merging its time
        assert_eq!(transport.pending(), 0);
        assert_eq!(clock.now(), 5);
    }

    #[test]
    fn test_single_worker_barrier_is_empty() {
        let metrics = Metrics::new().unwrap();
        let mut transport = ScriptedTransport::new(1, 2);
        let mut clock = LamportClock::new();
        assert_eq!(
            await_quorum(&mut transport, &mut clock, &metrics, MessageType::Started).unwrap(),
            0
        );
        assert_eq!(clock.now(), 0);
    }
}
