//! Check command implementation
//!
//! Validates a scenario, builds its world and resolves the biasing volumes
//! against it without transporting anything.

use std::path::Path;
use std::sync::Arc;

use bias_core::PhysicsList;
use bias_engine::BiasingWorker;
use bias_kernel::physics::standard_physics;
use bias_kernel::{KernelError, ScenarioConfig};
use tracing::info;

use crate::scenario::{self, Overrides};
use crate::Result;

/// Run the check command
pub fn run(path: &Path) -> Result<()> {
    let scenario = scenario::load(path, &Overrides::default())?;
    for line in summary(&scenario)? {
        println!("{}", line);
    }
    info!("Scenario {} is valid", path.display());
    Ok(())
}

/// Builds every run-time object of `scenario` and describes it.
pub fn summary(scenario: &ScenarioConfig) -> Result<Vec<String>> {
    let world = scenario.build_world()?;
    let source = scenario.build_source()?;
    let physics = standard_physics(scenario.electron_density);

    let mut lines = vec![
        format!(
            "Histories: {} on {} worker(s), seed {}",
            scenario.histories, scenario.workers, scenario.seed
        ),
        format!(
            "Source: {} at {:.3} MeV, {}",
            source.particle(),
            scenario.source.energy,
            if scenario.source.direction.is_some() {
                "pencil beam"
            } else {
                "isotropic"
            }
        ),
        format!(
            "Slab: {} mm thick, detector: {}",
            scenario.slab.thickness,
            if world.has_detector() { "yes" } else { "no" }
        ),
        format!(
            "Processes: {}",
            physics.process_names(source.particle()).join(", ")
        ),
    ];

    match scenario.biasing_config()? {
        None => lines.push("Biasing: none".to_string()),
        Some(config) => {
            let mut worker = BiasingWorker::new(Arc::clone(&config), 0);
            worker.start_run(world.store()).map_err(KernelError::from)?;
            lines.push(format!(
                "Biasing: {} in [{}], splitting factor {}",
                config.policy().as_str(),
                config.regions().join(", "),
                config.splitting_factor().value()
            ));
            if let Some(acceptance) = config.acceptance() {
                lines.push(format!(
                    "Acceptance gate: volume '{}', up to {} trials",
                    acceptance.volume, acceptance.max_trials
                ));
            }
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::tests::SCENARIO;
    use crate::CliError;

    #[test]
    fn test_summary_describes_biasing() {
        let scenario = scenario::parse(SCENARIO, &Overrides::default()).unwrap();
        let lines = summary(&scenario).unwrap();
        assert!(lines.iter().any(|l| l.contains("pencil beam")));
        assert!(lines
            .iter()
            .any(|l| l == "Biasing: force-collision in [slab], splitting factor 1"));
    }

    #[test]
    fn test_unknown_region_fails() {
        let document = SCENARIO.replace("regions = [\"slab\"]", "regions = [\"collimator\"]");
        let scenario = scenario::parse(&document, &Overrides::default()).unwrap();
        assert!(matches!(
            summary(&scenario),
            Err(CliError::Kernel(KernelError::Engine(_)))
        ));
    }
}
