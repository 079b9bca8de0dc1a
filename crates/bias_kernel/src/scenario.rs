//! Slab scenario configuration.
//!
//! A scenario is read once from a TOML document:
//!
//! ```toml
//! seed = 42
//! histories = 10000
//! workers = 4
//!
//! [slab]
//! thickness = 10.0
//! half_width = 100.0
//!
//! [source]
//! particle = "gamma"
//! energy = 1.0
//! position = [0.0, 0.0, -20.0]
//! direction = [0.0, 0.0, 1.0]
//!
//! [biasing]
//! policy = "force-collision"
//! regions = ["slab"]
//! ```
//!
//! Omitting `[biasing]` runs the unbiased reference. Omitting
//! `source.direction` makes the source isotropic.

use std::sync::Arc;

use bias_core::{ParticleKind, Vec3};
use bias_engine::config::BiasingSettings;
use bias_engine::BiasingConfig;
use serde::{Deserialize, Serialize};

use crate::error::KernelError;
use crate::physics::WATER_ELECTRON_DENSITY;
use crate::source::Source;
use crate::world::SlabWorld;

/// Water slab centred on the origin, faces normal to z.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlabSettings {
    /// Full thickness along z (mm).
    pub thickness: f64,
    /// Half-width in x and y (mm).
    pub half_width: f64,
}

/// Thin vacuum plane downstream of the slab.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetectorSettings {
    /// Gap between the slab's downstream face and the plane (mm).
    pub distance: f64,
    /// Full thickness along z (mm).
    pub thickness: f64,
    /// Half-width in x and y (mm).
    pub half_width: f64,
}

/// Point source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSettings {
    /// Particle name (`"gamma"`, `"e-"`, `"e+"`).
    #[serde(default = "default_particle")]
    pub particle: String,
    /// Kinetic energy (MeV).
    pub energy: f64,
    /// Position (mm).
    pub position: [f64; 3],
    /// Beam direction; isotropic when absent.
    pub direction: Option<[f64; 3]>,
}

fn default_particle() -> String {
    "gamma".to_string()
}

fn default_seed() -> u64 {
    1
}

fn default_workers() -> usize {
    1
}

fn default_electron_density() -> f64 {
    WATER_ELECTRON_DENSITY
}

/// Complete scenario.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Run seed; worker streams are derived from it.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Number of source events.
    pub histories: u64,
    /// Number of transport workers.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Slab geometry.
    pub slab: SlabSettings,
    /// Optional detector plane.
    pub detector: Option<DetectorSettings>,
    /// Source.
    pub source: SourceSettings,
    /// Electron density of the slab (electrons/mm³).
    #[serde(default = "default_electron_density")]
    pub electron_density: f64,
    /// Biasing settings; `None` for the unbiased reference.
    pub biasing: Option<BiasingSettings>,
}

impl ScenarioConfig {
    /// Parses and validates a TOML scenario.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Parse`] for malformed documents and
    /// [`KernelError::InvalidScenario`] for out-of-range parameters.
    pub fn from_toml_str(document: &str) -> Result<Self, KernelError> {
        let scenario: ScenarioConfig =
            toml::from_str(document).map_err(|e| KernelError::Parse(e.to_string()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Checks every numeric parameter.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidScenario`] naming the first offending
    /// parameter.
    pub fn validate(&self) -> Result<(), KernelError> {
        if self.histories == 0 {
            return Err(KernelError::invalid("histories", "must be positive"));
        }
        if self.workers == 0 {
            return Err(KernelError::invalid("workers", "must be positive"));
        }
        positive("slab.thickness", self.slab.thickness)?;
        positive("slab.half_width", self.slab.half_width)?;
        if let Some(detector) = &self.detector {
            if !(detector.distance >= 0.0 && detector.distance.is_finite()) {
                return Err(KernelError::invalid(
                    "detector.distance",
                    format!("must be non-negative, got {}", detector.distance),
                ));
            }
            positive("detector.thickness", detector.thickness)?;
            positive("detector.half_width", detector.half_width)?;
        }
        if !(self.source.energy >= 0.0 && self.source.energy.is_finite()) {
            return Err(KernelError::invalid(
                "source.energy",
                format!("must be non-negative, got {}", self.source.energy),
            ));
        }
        if self.source.position.iter().any(|x| !x.is_finite()) {
            return Err(KernelError::invalid("source.position", "must be finite"));
        }
        if let Some(direction) = self.source.direction {
            let norm = Vec3::from(direction).norm();
            if !(norm > 0.0 && norm.is_finite()) {
                return Err(KernelError::invalid(
                    "source.direction",
                    "must be a non-zero finite vector",
                ));
            }
        }
        positive("electron_density", self.electron_density)?;
        self.particle()?;
        Ok(())
    }

    /// Source particle species.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidScenario`] for an unknown name.
    pub fn particle(&self) -> Result<ParticleKind, KernelError> {
        self.source
            .particle
            .parse::<ParticleKind>()
            .map_err(|e| KernelError::invalid("source.particle", e.to_string()))
    }

    /// Builds the slab world around the source.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Geometry`] for degenerate boxes.
    pub fn build_world(&self) -> Result<SlabWorld, KernelError> {
        SlabWorld::build(
            &self.slab,
            self.detector.as_ref(),
            &Vec3::from(self.source.position),
        )
    }

    /// Builds the source.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidScenario`] for an unknown particle.
    pub fn build_source(&self) -> Result<Source, KernelError> {
        Ok(Source::new(
            self.particle()?,
            self.source.energy,
            Vec3::from(self.source.position),
            self.source.direction.map(Vec3::from),
        ))
    }

    /// Validated biasing configuration, or `None` for the unbiased run.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Config`] if the `[biasing]` table is rejected.
    pub fn biasing_config(&self) -> Result<Option<Arc<BiasingConfig>>, KernelError> {
        self.biasing
            .clone()
            .map(|settings| settings.into_config().map(Arc::new))
            .transpose()
            .map_err(KernelError::from)
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), KernelError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(KernelError::invalid(
            name,
            format!("must be positive, got {value}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bias_engine::{BiasingPolicy, ConfigError};

    const BEAM: &str = r#"
        histories = 100

        [slab]
        thickness = 10.0
        half_width = 100.0

        [source]
        energy = 1.0
        position = [0.0, 0.0, -20.0]
        direction = [0.0, 0.0, 1.0]
    "#;

    #[test]
    fn test_defaults() {
        let scenario = ScenarioConfig::from_toml_str(BEAM).unwrap();
        assert_eq!(scenario.seed, 1);
        assert_eq!(scenario.workers, 1);
        assert_eq!(scenario.electron_density, WATER_ELECTRON_DENSITY);
        assert_eq!(scenario.particle().unwrap(), ParticleKind::Gamma);
        assert!(scenario.biasing_config().unwrap().is_none());
        assert!(scenario.detector.is_none());
    }

    #[test]
    fn test_biasing_table() {
        let document = format!(
            "{BEAM}\n[biasing]\npolicy = \"compton-splitting\"\nregions = [\"slab\"]\nsplitting_factor = 4.0\n"
        );
        let scenario = ScenarioConfig::from_toml_str(&document).unwrap();
        let config = scenario.biasing_config().unwrap().unwrap();
        assert_eq!(config.policy(), BiasingPolicy::ComptonSplitting);
        assert_eq!(config.splitting_factor().whole(), 4);
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let document = format!("{BEAM}\n[biasing]\npolicy = \"importance\"\nregions = [\"slab\"]\n");
        let scenario = ScenarioConfig::from_toml_str(&document).unwrap();
        assert_eq!(
            scenario.biasing_config().unwrap_err(),
            KernelError::Config(ConfigError::UnknownPolicy("importance".to_string()))
        );
    }

    #[test]
    fn test_invalid_parameters() {
        let zero = BEAM.replace("histories = 100", "histories = 0");
        assert!(matches!(
            ScenarioConfig::from_toml_str(&zero),
            Err(KernelError::InvalidScenario { name: "histories", .. })
        ));

        let flat = BEAM.replace("thickness = 10.0", "thickness = 0.0");
        assert!(matches!(
            ScenarioConfig::from_toml_str(&flat),
            Err(KernelError::InvalidScenario { name: "slab.thickness", .. })
        ));

        let still = BEAM.replace("direction = [0.0, 0.0, 1.0]", "direction = [0.0, 0.0, 0.0]");
        assert!(matches!(
            ScenarioConfig::from_toml_str(&still),
            Err(KernelError::InvalidScenario { name: "source.direction", .. })
        ));

        let muon = BEAM.replace("energy = 1.0", "energy = 1.0\nparticle = \"mu-\"");
        assert!(matches!(
            ScenarioConfig::from_toml_str(&muon),
            Err(KernelError::InvalidScenario { name: "source.particle", .. })
        ));
    }

    #[test]
    fn test_unknown_key_is_parse_error() {
        let document = format!("{BEAM}\ncolour = \"blue\"\n");
        assert!(matches!(
            ScenarioConfig::from_toml_str(&document),
            Err(KernelError::Parse(_))
        ));
    }

    #[test]
    fn test_world_contains_source() {
        let scenario = ScenarioConfig::from_toml_str(BEAM).unwrap();
        let world = scenario.build_world().unwrap();
        assert_eq!(world.locate(&Vec3::new(0.0, 0.0, -20.0)), Some(crate::world::WORLD));
    }
}
