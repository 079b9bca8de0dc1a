//! Compare command implementation
//!
//! Runs a scenario with and without its biasing table and checks that the
//! two estimates agree. The variance ratio measures what the biasing buys
//! per history.

use std::path::Path;

use bias_kernel::{Estimate, RunReport};
use serde::Serialize;
use tracing::{info, warn};

use super::{run::execute, table, OutputFormat};
use crate::scenario::{self, Overrides};
use crate::{CliError, Result};

/// Largest |z| accepted as agreement.
pub const AGREEMENT_SIGMAS: f64 = 4.0;

/// Biased against unbiased estimate of one tally.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TallyComparison {
    /// Biased run estimate.
    pub biased: Estimate,
    /// Unbiased run estimate.
    pub unbiased: Estimate,
    /// Difference in units of the combined standard error.
    pub z_score: f64,
    /// Unbiased over biased variance; above 1 means the biasing helps.
    pub variance_ratio: f64,
}

impl TallyComparison {
    /// Compares two estimates of the same quantity.
    pub fn new(biased: Estimate, unbiased: Estimate) -> Self {
        let combined = biased.std_error.hypot(unbiased.std_error);
        let difference = biased.mean - unbiased.mean;
        let z_score = if combined > 0.0 {
            difference / combined
        } else if difference == 0.0 {
            0.0
        } else {
            f64::INFINITY.copysign(difference)
        };
        let variance_ratio = if biased.std_error > 0.0 {
            (unbiased.std_error / biased.std_error).powi(2)
        } else {
            f64::INFINITY
        };
        Self {
            biased,
            unbiased,
            z_score,
            variance_ratio,
        }
    }

    /// Whether the estimates agree within [`AGREEMENT_SIGMAS`].
    pub fn agrees(&self) -> bool {
        self.z_score.abs() <= AGREEMENT_SIGMAS
    }
}

/// Comparison of every tally.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Comparison {
    /// Biasing policy of the biased run.
    pub policy: String,
    /// Transmission comparison.
    pub transmission: TallyComparison,
    /// Deposit comparison.
    pub deposit: TallyComparison,
    /// Detector comparison.
    pub detector: TallyComparison,
}

impl Comparison {
    /// Compares a biased report against its unbiased reference.
    pub fn new(biased: &RunReport, unbiased: &RunReport) -> Self {
        Self {
            policy: biased.policy.clone().unwrap_or_default(),
            transmission: TallyComparison::new(
                biased.tally.transmission,
                unbiased.tally.transmission,
            ),
            deposit: TallyComparison::new(biased.tally.deposit, unbiased.tally.deposit),
            detector: TallyComparison::new(biased.tally.detector, unbiased.tally.detector),
        }
    }

    fn rows(&self) -> [(&'static str, &TallyComparison); 3] {
        [
            ("Transmission", &self.transmission),
            ("Deposit (MeV)", &self.deposit),
            ("Detector", &self.detector),
        ]
    }

    /// Whether every tally agrees.
    pub fn agrees(&self) -> bool {
        self.rows().iter().all(|(_, c)| c.agrees())
    }
}

/// Run the compare command
pub fn run(path: &Path, overrides: &Overrides, format: &str) -> Result<()> {
    let format = OutputFormat::parse(format)?;
    let scenario = scenario::load(path, overrides)?;
    if scenario.biasing.is_none() {
        return Err(CliError::InvalidArgument(format!(
            "{} has no [biasing] table to compare",
            path.display()
        )));
    }

    info!("Running biased scenario...");
    let biased = execute(scenario.clone(), false)?;
    info!("Running unbiased reference...");
    let unbiased = execute(scenario, true)?;

    let comparison = Comparison::new(&biased, &unbiased);
    for (label, tally) in comparison.rows() {
        if !tally.agrees() {
            warn!(
                tally = label,
                z_score = tally.z_score,
                "biased and unbiased estimates disagree"
            );
        }
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&comparison)?),
        OutputFormat::Table => println!("\nPolicy: {}\n{}", comparison.policy, render(&comparison)),
    }
    Ok(())
}

/// Box-drawn comparison table.
pub fn render(comparison: &Comparison) -> String {
    let rows: Vec<(String, Vec<String>)> = comparison
        .rows()
        .iter()
        .map(|(label, c)| {
            (
                label.to_string(),
                vec![
                    table::number(c.biased.mean),
                    table::number(c.unbiased.mean),
                    format!("{:+.2}", c.z_score),
                    format!("{:.2}", c.variance_ratio),
                ],
            )
        })
        .collect();
    table::render(&["Tally", "Biased", "Unbiased", "z", "Var. ratio"], &rows)
}
