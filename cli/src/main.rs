pub mod cli;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Command};
use sim::Sim;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    common::logger::init("cli", sim::bootstrap::json_logs_from_env());

    let cli = Cli::parse();
    let cfg = sim::bootstrap::config_from_env()?;
    let kernel = Sim::build(cfg, cli.seed)?;

    match cli.command {
        Command::Run => {
            kernel.start();

            let runner = Arc::clone(&kernel);
            let tick_loop = tokio::spawn(async move { runner.run().await });

            tracing::info!("simulation running; waiting for shutdown signal");
            tokio::signal::ctrl_c().await?;
            tracing::info!("shutdown signal received");

            kernel.shutdown();
            tick_loop.await?;
        }
        Command::Drive { dt, ticks } => {
            kernel.start();
            for _ in 0..ticks {
                kernel.tick(dt);
            }
            kernel.shutdown();
            println!("{:#?}", kernel.status());
        }
    }

    Ok(())
}
