//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `bank_transfers_out_total` - Transfers debited, per worker
//! - `bank_transfers_in_total` - Transfers credited, per worker
//! - `bank_insufficient_funds_total` - Refused transfers, per worker
//! - `bank_messages_handled_total` - Messages dispatched, per participant and type
//! - `bank_messages_ignored_total` - Messages dropped by dispatch or barriers
//! - `bank_histories_collected_total` - Histories received by the coordinator

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use std::fmt;
use std::sync::Arc;

use crate::types::ParticipantId;

/// Metrics collector, cloned into every participant
#[derive(Clone)]
pub struct Metrics {
    /// Transfers debited
    pub transfers_out: IntCounterVec,

    /// Transfers credited
    pub transfers_in: IntCounterVec,

    /// Refused transfers
    pub insufficient_funds: IntCounterVec,

    /// Messages dispatched
    pub messages_handled: IntCounterVec,

    /// Messages dropped
    pub messages_ignored: IntCounterVec,

    /// Histories received by the coordinator
    pub histories_collected: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transfers_out = IntCounterVec::new(
            Opts::new("bank_transfers_out_total", "Transfers debited"),
            &["participant"],
        )?;
        registry.register(Box::new(transfers_out.clone()))?;

        let transfers_in = IntCounterVec::new(
            Opts::new("bank_transfers_in_total", "Transfers credited"),
            &["participant"],
        )?;
        registry.register(Box::new(transfers_in.clone()))?;

        let insufficient_funds = IntCounterVec::new(
            Opts::new("bank_insufficient_funds_total", "Transfers refused for lack of funds"),
            &["participant"],
        )?;
        registry.register(Box::new(insufficient_funds.clone()))?;

        let messages_handled = IntCounterVec::new(
            Opts::new("bank_messages_handled_total", "Messages dispatched"),
            &["participant", "message_type"],
        )?;
        registry.register(Box::new(messages_handled.clone()))?;

        let messages_ignored = IntCounterVec::new(
            Opts::new("bank_messages_ignored_total", "Messages dropped without effect"),
            &["participant", "message_type"],
        )?;
        registry.register(Box::new(messages_ignored.clone()))?;

        let histories_collected = IntCounter::new(
            "bank_histories_collected_total",
            "Balance histories received by the coordinator",
        )?;
        registry.register(Box::new(histories_collected.clone()))?;

        Ok(Self {
            transfers_out,
            transfers_in,
            insufficient_funds,
            messages_handled,
            messages_ignored,
            histories_collected,
            registry,
        })
    }

    /// Record a debit
    pub fn record_transfer_out(&self, participant: ParticipantId) {
        self.transfers_out
            .with_label_values(&[&participant.to_string()])
            .inc();
    }

    /// Record a credit
    pub fn record_transfer_in(&self, participant: ParticipantId) {
        self.transfers_in
            .with_label_values(&[&participant.to_string()])
            .inc();
    }

    /// Record a refused transfer
    pub fn record_insufficient_funds(&self, participant: ParticipantId) {
        self.insufficient_funds
            .with_label_values(&[&participant.to_string()])
            .inc();
    }

    /// Record a dispatched message
    pub fn record_handled(&self, participant: ParticipantId, message_type: &str) {
        self.messages_handled
            .with_label_values(&[&participant.to_string(), message_type])
            .inc();
    }

    /// Record a dropped message
    pub fn record_ignored(&self, participant: ParticipantId, message_type: &str) {
        self.messages_ignored
            .with_label_values(&[&participant.to_string(), message_type])
            .inc();
    }

    /// Record a collected history
    pub fn record_history_collected(&self) {
        self.histories_collected.inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("histories_collected", &self.histories_collected.get())
            .finish_non_exhaustive()
    }
}
