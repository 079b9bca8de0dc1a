//! Run command implementation
//!
//! Runs a scenario through the slab kernel and prints its tallies.

use std::path::Path;

use bias_kernel::{run_parallel, RunReport, ScenarioConfig};
use tracing::info;

use super::{table, OutputFormat};
use crate::scenario::{self, Overrides};
use crate::Result;

/// Run the run command
pub fn run(
    path: &Path,
    overrides: &Overrides,
    unbiased: bool,
    format: &str,
    output: Option<&Path>,
) -> Result<()> {
    let format = OutputFormat::parse(format)?;
    let scenario = scenario::load(path, overrides)?;
    info!("Running scenario {}", path.display());

    let report = execute(scenario, unbiased)?;

    if let Some(output) = output {
        std::fs::write(output, serde_json::to_string_pretty(&report)?)?;
        info!("Report written to {}", output.display());
    }
    println!("{}", render(&report, format)?);
    Ok(())
}

/// Runs `scenario`, dropping its biasing table when `unbiased` is set.
pub fn execute(mut scenario: ScenarioConfig, unbiased: bool) -> Result<RunReport> {
    if unbiased {
        scenario.biasing = None;
    }
    Ok(run_parallel(&scenario)?)
}

/// Formats a report for stdout.
pub fn render(report: &RunReport, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Table => format!(
            "\nSeed {}, {} worker(s), policy: {}\n{}\n{}",
            report.seed,
            report.workers,
            report.policy.as_deref().unwrap_or("none"),
            table::tallies(report),
            table::counters(report)
        ),
    })
}
