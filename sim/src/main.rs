//! The integration binary: builds the kernel from environment-derived
//! config, starts the tick loop, and tears it down on `ctrl_c` —
//! matching this codebase's existing `main.rs` shutdown pattern. This
//! binary is a bare runner; the `cli` crate is the thin external
//! command surface that actually maps onto §6's control commands for
//! manual/integration-test driving.

use std::sync::Arc;

use sim::Sim;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    common::logger::init("sim", sim::bootstrap::json_logs_from_env());

    let cfg = sim::bootstrap::config_from_env()?;
    let seed = sim::bootstrap::seed_from_env();

    tracing::info!(seed, "assembling simulation kernel");
    let kernel = Sim::build(cfg, seed)?;

    kernel.start();

    let runner = Arc::clone(&kernel);
    let tick_loop = tokio::spawn(async move { runner.run().await });

    tracing::info!("simulation running; waiting for shutdown signal");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    kernel.shutdown();
    tick_loop.await?;

    Ok(())
}
