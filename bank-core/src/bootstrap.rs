//! Wiring a complete run: fabric, worker threads and the coordinator

use ipc_bus::{ChannelFabric, Interrupt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use tracing::{error, info};

use crate::{
    config::Config,
    coordinator::Coordinator,
    driver::{ScriptedDriver, TransferDriver},
    events::{EventSink, TracingSink},
    metrics::Metrics,
    snapshot::SnapshotReport,
    worker::{Worker, WorkerOutcome},
    Error, Result,
};

/// Everything a finished run produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationOutcome {
    /// Report assembled by the coordinator
    pub report: SnapshotReport,
    /// Closing state of each worker, ascending by id
    pub workers: Vec<WorkerOutcome>,
}

/// One bank run over a private channel fabric.
///
/// Workers run on dedicated OS threads; the coordinator runs on the calling
/// thread. If any participant fails, the shared [`Interrupt`] is tripped so
/// every other participant stops waiting. The run returns the failure that
/// started the abort, not the closed channels it left behind.
#[derive(Debug)]
pub struct Simulation {
    config: Config,
    sink: Arc<dyn EventSink>,
    metrics: Metrics,
    interrupt: Interrupt,
}

impl Simulation {
    /// Validate `config` and prepare a run
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sink: Arc::new(TracingSink),
            metrics: Metrics::new()?,
            interrupt: Interrupt::new(),
        })
    }

    /// Send participant events to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Handle that aborts the run from another thread
    pub fn interrupt(&self) -> Interrupt {
        self.interrupt.clone()
    }

    /// Metrics shared by every participant
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Run with the transfers from the configuration
    pub fn run(self) -> Result<SimulationOutcome> {
        let mut driver = ScriptedDriver::new(self.config.transfer_plan());
        self.run_with(&mut driver)
    }

    /// Run with a custom driver
    pub fn run_with(self, driver: &mut dyn TransferDriver) -> Result<SimulationOutcome> {
        let participants = self.config.participants();
        let fabric = ChannelFabric::new(participants)?;
        info!(
            service = %self.config.service_name,
            participants,
            channels = fabric.channel_count(),
            "starting simulation"
        );

        let mut endpoints = fabric
            .into_endpoints_with(self.config.transport.wait_config(), &self.interrupt)
            .into_iter();
        let coordinator_endpoint = endpoints
            .next()
            .ok_or_else(|| Error::Config("fabric has no coordinator endpoint".to_string()))?;

        let mut handles = Vec::with_capacity(self.config.workers());
        for (index, endpoint) in endpoints.enumerate() {
            let id = index + 1;
            let balance = self
                .config
                .balance_of(id)
                .ok_or_else(|| Error::Config(format!("no opening balance for worker {}", id)))?;
            let sink = self.sink.clone();
            let metrics = self.metrics.clone();
            let interrupt = self.interrupt.clone();

            let spawned = thread::Builder::new()
                .name(format!("participant-{}", id))
                .spawn(move || {
                    let result = Worker::new(endpoint, balance, sink, metrics).run();
                    if result.is_err() {
                        interrupt.trip();
                    }
                    result
                });
            match spawned {
                Ok(handle) => handles.push((id, handle)),
                Err(e) => {
                    self.interrupt.trip();
                    join_workers(handles);
                    return Err(Error::Io(e));
                }
            }
        }

        let coordinator = Coordinator::new(coordinator_endpoint, self.sink.clone(), self.metrics.clone());
        let report = coordinator.run(driver);
        if report.is_err() {
            self.interrupt.trip();
        }

        let (report, workers) = match (report, join_workers(handles)) {
            (Ok(report), Ok(workers)) => (report, workers),
            (Err(e), Err(worker)) if e.is_knock_on() && !worker.is_knock_on() => return Err(worker),
            (Err(e), _) | (Ok(_), Err(e)) => return Err(e),
        };

        info!(
            workers = workers.len(),
            total = report.total_balance(),
            last_tick = ?report.max_time(),
            "simulation finished"
        );
        Ok(SimulationOutcome { report, workers })
    }
}

/// Join every worker thread, returning the first root-cause failure
fn join_workers(handles: Vec<(usize, thread::JoinHandle<Result<WorkerOutcome>>)>) -> Result<Vec<WorkerOutcome>> {
    let mut outcomes = Vec::with_capacity(handles.len());
    let mut first_error: Option<Error> = None;

    for (id, handle) in handles {
        let result = match handle.join() {
            Ok(result) => result,
            Err(_) => Err(Error::Concurrency(format!("worker {} panicked", id))),
        };
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                error!(worker = id, error = %e, "worker failed");
                let replace = match &first_error {
                    None => true,
                    Some(first) => first.is_knock_on() && !e.is_knock_on(),
                };
                if replace {
                    first_error = Some(e);
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(outcomes),
    }
}
