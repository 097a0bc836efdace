//! Lamport Bank Core
//!
//! A coordinator and a set of workers move money over a private channel
//! fabric, ordering events with Lamport clocks, and finish by assembling
//! every worker's balance history into one report.
//!
//! # Architecture
//!
//! - **One thread per participant**: no shared mutable state, only messages
//! - **Synchronous transfers**: the coordinator waits for the receiver's ACK
//!   before issuing the next order
//! - **Barriers**: STARTED before any transfer, DONE before collection
//! - **Dense histories**: one entry per logical tick per worker
//!
//! # Invariants
//!
//! - Money conservation: Σ(closing balances) == Σ(opening balances)
//! - Clock strictly increases on every send and every processed receive
//! - A refused transfer changes nothing and is never acknowledged

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod barrier;
pub mod bootstrap;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod driver;
pub mod error;
pub mod events;
pub mod ledger;
pub mod metrics;
pub mod participant;
pub mod snapshot;
pub mod types;
pub mod wire;
pub mod worker;

#[cfg(test)]
mod testing;

// Re-exports
pub use bootstrap::{Simulation, SimulationOutcome};
pub use clock::LamportClock;
pub use config::{Config, TransportConfig};
pub use coordinator::{Coordinator, CoordinatorState};
pub use driver::{RingDriver, ScriptedDriver, TransferDriver, TransferIssuer};
pub use error::{Error, ErrorClass, Result};
pub use events::{BankEvent, EventRecord, EventSink, MemorySink, TracingSink};
pub use ledger::{BalanceHistory, BalanceState, MAX_HISTORY_LEN};
pub use metrics::Metrics;
pub use snapshot::{SnapshotCollector, SnapshotReport, TimelineRow};
pub use types::{Balance, TransferOrder, COORDINATOR_ID};
pub use worker::{Worker, WorkerOutcome, WorkerState};
