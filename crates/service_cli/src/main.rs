//! biasrun - Command Line Operations for Variance-Reduced Slab Simulations
//!
//! Loads a TOML scenario and runs it through the reference slab kernel,
//! with or without the biasing engine.
//!
//! # Commands
//!
//! - `biasrun run <scenario>` - Run a scenario and print its tallies
//! - `biasrun compare <scenario>` - Run the scenario biased and unbiased
//!   and compare the estimates
//! - `biasrun check <scenario>` - Validate a scenario without running it
//!
//! # Architecture
//!
//! As the service layer, this crate only parses arguments, loads files and
//! formats reports; all transport and biasing happens in `bias_kernel` and
//! `bias_engine`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;
mod scenario;

pub use error::{CliError, Result};

/// Variance-reduced photon transport through a water slab
#[derive(Parser)]
#[command(name = "biasrun")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output (debug-level logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Run-size overrides shared by the running commands.
#[derive(clap::Args, Debug, Default)]
struct RunArgs {
    /// Override the number of source histories
    #[arg(short = 'n', long)]
    histories: Option<u64>,

    /// Override the number of workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Override the run seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table")]
    format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario
    Run {
        /// Scenario file (TOML)
        scenario: PathBuf,

        /// Ignore the [biasing] table and run the unbiased reference
        #[arg(long)]
        unbiased: bool,

        /// Write the JSON report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        args: RunArgs,
    },

    /// Run biased and unbiased and compare the estimates
    Compare {
        /// Scenario file (TOML)
        scenario: PathBuf,

        #[command(flatten)]
        args: RunArgs,
    },

    /// Validate a scenario and resolve its biasing volumes
    Check {
        /// Scenario file (TOML)
        scenario: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    match cli.command {
        Commands::Run {
            scenario,
            unbiased,
            output,
            args,
        } => commands::run::run(
            &scenario,
            &args.overrides(),
            unbiased,
            &args.format,
            output.as_deref(),
        )?,
        Commands::Compare { scenario, args } => {
            commands::compare::run(&scenario, &args.overrides(), &args.format)?
        }
        Commands::Check { scenario } => commands::check::run(&scenario)?,
    }
    Ok(())
}

impl RunArgs {
    fn overrides(&self) -> scenario::Overrides {
        scenario::Overrides {
            histories: self.histories,
            workers: self.workers,
            seed: self.seed,
        }
    }
}
