//! Scenario loading with command-line overrides.

use std::path::Path;

use bias_kernel::ScenarioConfig;

use crate::{CliError, Result};

/// Values the command line may override in a scenario file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Source histories.
    pub histories: Option<u64>,
    /// Worker count.
    pub workers: Option<usize>,
    /// Run seed.
    pub seed: Option<u64>,
}

impl Overrides {
    /// Writes the overrides into `scenario`.
    pub fn apply(&self, scenario: &mut ScenarioConfig) {
        if let Some(histories) = self.histories {
            scenario.histories = histories;
        }
        if let Some(workers) = self.workers {
            scenario.workers = workers;
        }
        if let Some(seed) = self.seed {
            scenario.seed = seed;
        }
    }
}

/// Reads, overrides and validates the scenario at `path`.
pub fn load(path: &Path, overrides: &Overrides) -> Result<ScenarioConfig> {
    if !path.exists() {
        return Err(CliError::FileNotFound(path.display().to_string()));
    }
    let document = std::fs::read_to_string(path)?;
    parse(&document, overrides)
}

/// Parses, overrides and validates a scenario document.
pub fn parse(document: &str, overrides: &Overrides) -> Result<ScenarioConfig> {
    let mut scenario = ScenarioConfig::from_toml_str(document)?;
    overrides.apply(&mut scenario);
    scenario.validate()?;
    Ok(scenario)
}
