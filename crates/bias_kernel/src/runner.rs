//! Multi-worker run driver.
//!
//! Every worker owns its kernel, physics list, random stream and biasing
//! engine; nothing is shared while tracking except the read-only world and
//! configuration. Engine counters meet at the run-wide
//! [`RunStatistics`] sink; tallies are merged in worker order so that a run
//! is reproducible for a given seed and worker count.

use std::sync::Arc;

use bias_core::{EventId, TransportRng};
use bias_engine::stats::{RunStatistics, RunSummary};
use bias_engine::BiasingWorker;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::KernelError;
use crate::kernel::{KernelStats, TransportKernel};
use crate::physics::standard_physics;
use crate::scenario::ScenarioConfig;
use crate::tally::{SlabTally, TallyReport};

/// Result of a complete run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Run seed.
    pub seed: u64,
    /// Workers used.
    pub workers: usize,
    /// Biasing policy, `None` for the unbiased reference.
    pub policy: Option<String>,
    /// Estimates.
    pub tally: TallyReport,
    /// Transport counters.
    pub kernel: KernelStats,
    /// Engine counters, when biasing was on.
    pub biasing: Option<RunSummary>,
}

/// Events handled by `worker` out of `total` split over `workers`.
fn event_range(total: u64, workers: usize, worker: usize) -> std::ops::Range<u64> {
    let workers = workers as u64;
    let worker = worker as u64;
    let base = total / workers;
    let extra = total % workers;
    let start = worker * base + worker.min(extra);
    let len = base + u64::from(worker < extra);
    start..start + len
}

/// Runs `scenario` on `scenario.workers` rayon tasks.
///
/// # Errors
///
/// Returns the first [`KernelError`] raised while building the scenario or
/// by any worker.
///
/// # Examples
///
/// ```rust
/// use bias_kernel::runner::run_parallel;
/// use bias_kernel::scenario::ScenarioConfig;
///
/// let scenario = ScenarioConfig::from_toml_str(
///     r#"
///     histories = 40
///     workers = 2
///     [slab]
///     thickness = 5.0
///     half_width = 50.0
///     [source]
///     energy = 0.5
///     position = [0.0, 0.0, -10.0]
///     direction = [0.0, 0.0, 1.0]
///     "#,
/// )
/// .unwrap();
///
/// let report = run_parallel(&scenario).unwrap();
/// assert_eq!(report.tally.histories, 40);
/// assert!(report.biasing.is_none());
/// ```
pub fn run_parallel(scenario: &ScenarioConfig) -> Result<RunReport, KernelError> {
    scenario.validate()?;
    let world = Arc::new(scenario.build_world()?);
    let source = scenario.build_source()?;
    let biasing = scenario.biasing_config()?;
    let run = RunStatistics::new();

    info!(
        seed = scenario.seed,
        histories = scenario.histories,
        workers = scenario.workers,
        policy = biasing.as_ref().map(|c| c.policy().as_str()),
        "run started"
    );

    let results: Vec<(SlabTally, KernelStats)> = (0..scenario.workers)
        .into_par_iter()
        .map(|index| -> Result<(SlabTally, KernelStats), KernelError> {
            let engine = biasing
                .as_ref()
                .map(|config| BiasingWorker::new(Arc::clone(config), index));
            let mut kernel = TransportKernel::new(
                Arc::clone(&world),
                standard_physics(scenario.electron_density),
                source.clone(),
                engine,
                TransportRng::stream(scenario.seed, index as u64),
            );
            kernel.start_run()?;
            for event in event_range(scenario.histories, scenario.workers, index) {
                kernel.run_event(EventId(event))?;
            }
            Ok(kernel.end_run(&run))
        })
        .collect::<Result<_, _>>()?;

    let mut tally = SlabTally::new();
    let mut kernel = KernelStats::default();
    for (worker_tally, worker_stats) in &results {
        tally.merge(worker_tally);
        kernel.merge(worker_stats);
    }

    let report = RunReport {
        seed: scenario.seed,
        workers: scenario.workers,
        policy: biasing.as_ref().map(|c| c.policy().as_str().to_string()),
        tally: tally.report(),
        kernel,
        biasing: biasing.is_some().then(|| run.snapshot()),
    };
    info!(
        histories = report.tally.histories,
        transmission = report.tally.transmission.mean,
        deposit = report.tally.deposit.mean,
        "run finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_ranges_cover_all_events() {
        let ranges: Vec<_> = (0..3).map(|w| event_range(10, 3, w)).collect();
        assert_eq!(ranges, vec![0..4, 4..7, 7..10]);

        let ranges: Vec<_> = (0..4).map(|w| event_range(2, 4, w)).collect();
        assert_eq!(ranges, vec![0..1, 1..2, 2..2, 2..2]);
    }
}
