use clap::{Parser, Subcommand};

/// External command surface (spec §6): a thin wrapper that parses
/// arguments and calls straight through to the matching `Sim` control
/// command. Command parsing itself is an external collaborator, not
/// part of the simulation core.
#[derive(Debug, Parser)]
#[clap(name = "warehouse-sim", version)]
pub struct Cli {
    /// Deterministic seed for inventory layout and order sampling.
    #[clap(long, default_value_t = sim::bootstrap::DEFAULT_SEED)]
    pub seed: u64,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build the kernel and run until a shutdown signal arrives.
    Run,
    /// Build the kernel, drive it for a fixed number of ticks, then
    /// print a final status snapshot. Useful for smoke-testing a config
    /// without waiting on ctrl-c.
    Drive {
        /// Simulated seconds advanced per tick.
        #[clap(long, default_value_t = 1.0)]
        dt: f64,
        /// Number of ticks to drive.
        #[clap(long, default_value_t = 3600)]
        ticks: u64,
    },
}
