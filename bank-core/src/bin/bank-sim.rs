//! Bank simulation binary

use bank_core::{Config, Simulation, TracingSink};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting Lamport bank simulation");

    // Load configuration
    let config = match std::env::var("BANK_CONFIG") {
        Ok(path) => Config::from_file(path)?,
        Err(_) => Config::from_env()?,
    };

    let simulation = Simulation::new(config)?.with_sink(Arc::new(TracingSink));
    let interrupt = simulation.interrupt();

    // Participants block on channel polls, keep them off the async workers
    let mut run = tokio::task::spawn_blocking(move || simulation.run());

    let outcome = tokio::select! {
        joined = &mut run => joined??,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::warn!("Interrupt received, stopping participants");
            interrupt.trip();
            run.await??
        }
    };

    for row in outcome.report.timeline() {
        tracing::debug!(time = row.time, balances = ?row.balances, pending_in = ?row.pending_in, "timeline");
    }
    println!("{}", serde_json::to_string_pretty(&outcome.report)?);

    tracing::info!(
        total = outcome.report.total_balance(),
        "Simulation complete"
    );
    Ok(())
}
