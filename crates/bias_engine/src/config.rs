//! Biasing configuration.
//!
//! The configuration is read once at initialisation and shared read-only
//! by every worker. It can be assembled three ways, all funnelling through
//! the same validation:
//!
//! - [`BiasingConfig::builder`] for programmatic use
//! - [`BiasingConfig::from_toml_str`] for TOML documents
//! - [`BiasingConfig::from_key_values`] for a flat key/value map

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bias_core::{ParticleKind, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::process::{InterestingProcess, ProcessCatalogue};
use crate::roulette::BiasCone;

/// Default cap on nested splitting.
pub const DEFAULT_MAX_REPLAY_LEVEL: u32 = 1;

/// Biasing policy attached to the region(s) of interest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BiasingPolicy {
    /// Cloning on entry, forced interaction for the clone, forced free
    /// flight for the original.
    ForceCollision,
    /// Multiplicative splitting of Compton scattering.
    ComptonSplitting,
    /// Multiplicative splitting of bremsstrahlung.
    BremSplitting,
    /// Multiplicative splitting of pair production.
    PairSplitting,
    /// Multiplicative splitting of every interaction.
    GenericSplitting,
    /// Forced free flight through the region, without cloning.
    FreeFlight,
    /// Deferred splitting of the last interesting vertex on region exit.
    LastVertexSplitting,
}

impl BiasingPolicy {
    /// Configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BiasingPolicy::ForceCollision => "force-collision",
            BiasingPolicy::ComptonSplitting => "compton-splitting",
            BiasingPolicy::BremSplitting => "brem-splitting",
            BiasingPolicy::PairSplitting => "pair-splitting",
            BiasingPolicy::GenericSplitting => "generic-splitting",
            BiasingPolicy::FreeFlight => "free-flight",
            BiasingPolicy::LastVertexSplitting => "last-vertex-splitting",
        }
    }

    /// Returns `true` if this splitting policy splits interactions of `class`.
    pub fn splits(&self, class: InterestingProcess) -> bool {
        match self {
            BiasingPolicy::ComptonSplitting => class == InterestingProcess::Compton,
            BiasingPolicy::BremSplitting => class == InterestingProcess::Bremsstrahlung,
            BiasingPolicy::PairSplitting => class == InterestingProcess::PairProduction,
            BiasingPolicy::GenericSplitting => true,
            _ => false,
        }
    }
}

impl fmt::Display for BiasingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BiasingPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "force-collision" => Ok(BiasingPolicy::ForceCollision),
            "compton-splitting" => Ok(BiasingPolicy::ComptonSplitting),
            "brem-splitting" => Ok(BiasingPolicy::BremSplitting),
            "pair-splitting" => Ok(BiasingPolicy::PairSplitting),
            "generic-splitting" => Ok(BiasingPolicy::GenericSplitting),
            "free-flight" => Ok(BiasingPolicy::FreeFlight),
            "last-vertex-splitting" => Ok(BiasingPolicy::LastVertexSplitting),
            _ => Err(ConfigError::UnknownPolicy(s.to_string())),
        }
    }
}

/// Splitting factor `N >= 1`, possibly fractional.
///
/// # Examples
///
/// ```rust
/// use bias_engine::config::SplittingFactor;
///
/// let n = SplittingFactor::new(2.5).unwrap();
/// assert_eq!(n.whole(), 2);
/// assert!((n.fraction() - 0.5).abs() < 1e-12);
/// assert!(SplittingFactor::new(0.5).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplittingFactor(f64);

impl SplittingFactor {
    /// No splitting.
    pub const UNITY: SplittingFactor = SplittingFactor(1.0);

    /// Validates and wraps a factor.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSplittingFactor`] for values below one
    /// or not finite.
    pub fn new(value: f64) -> Result<Self, ConfigError> {
        if value.is_finite() && value >= 1.0 && value <= u32::MAX as f64 {
            Ok(Self(value))
        } else {
            Err(ConfigError::InvalidSplittingFactor(value))
        }
    }

    /// The factor `N`.
    #[inline]
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Integer part `k`.
    #[inline]
    pub fn whole(&self) -> u32 {
        self.0.floor() as u32
    }

    /// Fractional remainder `f = N - k`.
    #[inline]
    pub fn fraction(&self) -> f64 {
        self.0 - self.0.floor()
    }

    /// Returns `true` when no splitting takes place.
    #[inline]
    pub fn is_unity(&self) -> bool {
        self.0 == 1.0
    }
}

impl Default for SplittingFactor {
    fn default() -> Self {
        Self::UNITY
    }
}

/// What happens when the acceptance gate rejects every trial.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExhaustionPolicy {
    /// The event produces no primary.
    #[default]
    SkipEvent,
    /// The primary is emitted with zero kinetic energy.
    ZeroEnergy,
}

impl FromStr for ExhaustionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "skip-event" | "skip" => Ok(ExhaustionPolicy::SkipEvent),
            "zero-energy" => Ok(ExhaustionPolicy::ZeroEnergy),
            _ => Err(ConfigError::UnknownExhaustionPolicy(s.to_string())),
        }
    }
}

/// Acceptance-angle test configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct AcceptanceConfig {
    /// Volume a ray must hit to be accepted.
    pub volume: String,
    /// Largest accepted angle between the ray and the inward surface
    /// normal at the hit point (degrees); `None` disables the check.
    pub max_incidence_angle_deg: Option<f64>,
    /// Trial cap per event (mandatory, at least one).
    pub max_trials: u32,
    /// Behaviour when every trial is rejected.
    pub exhaustion: ExhaustionPolicy,
}

impl AcceptanceConfig {
    /// Creates an acceptance test against `volume` with a trial cap.
    pub fn new(volume: impl Into<String>, max_trials: u32) -> Self {
        Self {
            volume: volume.into(),
            max_incidence_angle_deg: None,
            max_trials,
            exhaustion: ExhaustionPolicy::default(),
        }
    }

    /// Sets the incidence-angle tolerance (builder style).
    pub fn with_max_incidence_angle(mut self, degrees: f64) -> Self {
        self.max_incidence_angle_deg = Some(degrees);
        self
    }

    /// Sets the exhaustion policy (builder style).
    pub fn with_exhaustion(mut self, exhaustion: ExhaustionPolicy) -> Self {
        self.exhaustion = exhaustion;
        self
    }

    /// Validates the trial cap and angle.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `max_trials` is 0 or the angle is outside
    /// [0, 90] degrees.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_trials == 0 {
            return Err(ConfigError::ZeroMaxTrials);
        }
        if let Some(angle) = self.max_incidence_angle_deg {
            if !(0.0..=90.0).contains(&angle) {
                return Err(ConfigError::InvalidIncidenceAngle(angle));
            }
        }
        Ok(())
    }
}

/// Validated biasing configuration.
///
/// Use [`BiasingConfig::builder`] to construct instances.
///
/// # Examples
///
/// ```rust
/// use bias_engine::config::{BiasingConfig, BiasingPolicy};
///
/// let config = BiasingConfig::builder()
///     .policy(BiasingPolicy::ForceCollision)
///     .region("slab")
///     .splitting_factor(8.0)
///     .build()
///     .expect("valid configuration");
///
/// assert_eq!(config.policy(), BiasingPolicy::ForceCollision);
/// assert_eq!(config.splitting_factor().whole(), 8);
/// assert_eq!(config.regions(), ["slab".to_string()]);
/// ```
#[derive(Clone, Debug)]
pub struct BiasingConfig {
    policy: BiasingPolicy,
    regions: Vec<String>,
    particles: Vec<ParticleKind>,
    splitting_factor: SplittingFactor,
    max_replay_level: u32,
    russian_roulette: bool,
    bias_cone: Option<BiasCone>,
    free_flight_weight_threshold: Option<f64>,
    interesting_processes: Vec<InterestingProcess>,
    catalogue: ProcessCatalogue,
    acceptance: Option<AcceptanceConfig>,
}

impl BiasingConfig {
    /// Creates a new configuration builder.
    #[inline]
    pub fn builder() -> BiasingConfigBuilder {
        BiasingConfigBuilder::default()
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] for malformed documents and any
    /// validation error otherwise.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bias_engine::config::{BiasingConfig, BiasingPolicy};
    ///
    /// let config = BiasingConfig::from_toml_str(r#"
    ///     policy = "compton-splitting"
    ///     regions = ["collimator"]
    ///     splitting_factor = 20
    ///     russian_roulette = true
    ///
    ///     [bias_cone]
    ///     direction = [0.0, 0.0, 1.0]
    ///     half_angle_deg = 15.0
    /// "#).unwrap();
    ///
    /// assert_eq!(config.policy(), BiasingPolicy::ComptonSplitting);
    /// assert!(config.russian_roulette());
    /// ```
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        let settings: BiasingSettings =
            toml::from_str(document).map_err(|e| ConfigError::Toml(e.to_string()))?;
        settings.into_config()
    }

    /// Builds a configuration from a flat key/value map.
    ///
    /// Lists are comma separated; vectors are three comma-separated numbers;
    /// native process aliases use `process_alias.<native-name>` keys.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownKey`] for keys outside the
    /// configuration surface, [`ConfigError::InvalidValue`] for unparsable
    /// values and any validation error otherwise.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bias_engine::config::BiasingConfig;
    ///
    /// let config = BiasingConfig::from_key_values([
    ///     ("policy", "last-vertex-splitting"),
    ///     ("regions", "collimator"),
    ///     ("splitting_factor", "10"),
    ///     ("max_replay_level", "2"),
    ///     ("interesting_processes", "compton,annihilation"),
    /// ]).unwrap();
    ///
    /// assert_eq!(config.max_replay_level(), 2);
    /// assert_eq!(config.interesting_processes().len(), 2);
    /// ```
    pub fn from_key_values<I, K, V>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut settings = BiasingSettings::default();
        let mut cone_direction: Option<[f64; 3]> = None;
        let mut cone_angle: Option<f64> = None;
        let mut acceptance = AcceptanceSettings::default();
        let mut has_acceptance = false;

        for (key, value) in pairs {
            let key = key.as_ref().trim();
            let value = value.as_ref().trim();
            match key {
                "policy" => settings.policy = Some(value.to_string()),
                "regions" => settings.regions = split_list(value),
                "particles" => settings.particles = split_list(value),
                "splitting_factor" => settings.splitting_factor = Some(parse_value(key, value)?),
                "max_replay_level" => settings.max_replay_level = Some(parse_value(key, value)?),
                "russian_roulette" => settings.russian_roulette = parse_value(key, value)?,
                "bias_cone.direction" => cone_direction = Some(parse_vector(key, value)?),
                "bias_cone.half_angle_deg" => cone_angle = Some(parse_value(key, value)?),
                "free_flight_weight_threshold" => {
                    settings.free_flight_weight_threshold = Some(parse_value(key, value)?)
                }
                "interesting_processes" => settings.interesting_processes = split_list(value),
                "acceptance.volume" => {
                    has_acceptance = true;
                    acceptance.volume = value.to_string();
                }
                "acceptance.max_incidence_angle_deg" => {
                    has_acceptance = true;
                    acceptance.max_incidence_angle_deg = Some(parse_value(key, value)?);
                }
                "acceptance.max_trials" => {
                    has_acceptance = true;
                    acceptance.max_trials = Some(parse_value(key, value)?);
                }
                "acceptance.exhaustion" => {
                    has_acceptance = true;
                    acceptance.exhaustion = Some(value.to_string());
                }
                other => match other.strip_prefix("process_alias.") {
                    Some(native) if !native.is_empty() => {
                        settings
                            .process_alias
                            .insert(native.to_string(), value.to_string());
                    }
                    _ => return Err(ConfigError::UnknownKey(other.to_string())),
                },
            }
        }

        settings.bias_cone = match (cone_direction, cone_angle) {
            (Some(direction), Some(half_angle_deg)) => Some(BiasConeSettings {
                direction,
                half_angle_deg,
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingOption("bias_cone.half_angle_deg")),
            (None, Some(_)) => return Err(ConfigError::MissingOption("bias_cone.direction")),
        };
        if has_acceptance {
            settings.acceptance = Some(acceptance);
        }
        settings.into_config()
    }

    /// Biasing policy.
    #[inline]
    pub fn policy(&self) -> BiasingPolicy {
        self.policy
    }

    /// Names of the regions of interest.
    #[inline]
    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    /// Particles the policy applies to.
    #[inline]
    pub fn particles(&self) -> &[ParticleKind] {
        &self.particles
    }

    /// Returns `true` if the policy applies to `particle`.
    #[inline]
    pub fn applies_to(&self, particle: ParticleKind) -> bool {
        self.particles.contains(&particle)
    }

    /// Splitting factor.
    #[inline]
    pub fn splitting_factor(&self) -> SplittingFactor {
        self.splitting_factor
    }

    /// Maximum nested replay level.
    #[inline]
    pub fn max_replay_level(&self) -> u32 {
        self.max_replay_level
    }

    /// Whether angular Russian roulette is played on split products.
    #[inline]
    pub fn russian_roulette(&self) -> bool {
        self.russian_roulette
    }

    /// Bias cone, if configured.
    #[inline]
    pub fn bias_cone(&self) -> Option<&BiasCone> {
        self.bias_cone.as_ref()
    }

    /// Weight threshold for post-free-flight roulette.
    #[inline]
    pub fn free_flight_weight_threshold(&self) -> Option<f64> {
        self.free_flight_weight_threshold
    }

    /// Interaction classes recorded by last-vertex replay.
    #[inline]
    pub fn interesting_processes(&self) -> &[InterestingProcess] {
        &self.interesting_processes
    }

    /// Returns `true` if `class` is recorded by last-vertex replay.
    #[inline]
    pub fn is_interesting(&self, class: InterestingProcess) -> bool {
        self.interesting_processes.contains(&class)
    }

    /// Native name to interaction class table.
    #[inline]
    pub fn catalogue(&self) -> &ProcessCatalogue {
        &self.catalogue
    }

    /// Acceptance test, if configured.
    #[inline]
    pub fn acceptance(&self) -> Option<&AcceptanceConfig> {
        self.acceptance.as_ref()
    }

    /// Returns `true` if `volume` is one of the regions of interest.
    #[inline]
    pub fn is_region(&self, volume: Option<&str>) -> bool {
        volume.is_some_and(|v| self.regions.iter().any(|r| r == v))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - no region is configured
    /// - the maximum replay level is 0
    /// - roulette is enabled without a survival region (cone or acceptance)
    /// - the free-flight weight threshold is not positive
    /// - last-vertex splitting has no interesting process
    /// - the acceptance test is invalid
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.regions.is_empty() {
            return Err(ConfigError::MissingOption("regions"));
        }
        if self.max_replay_level == 0 {
            return Err(ConfigError::InvalidReplayLevel(0));
        }
        if self.russian_roulette && self.bias_cone.is_none() && self.acceptance.is_none() {
            return Err(ConfigError::MissingOption("bias_cone"));
        }
        if let Some(threshold) = self.free_flight_weight_threshold {
            if !(threshold.is_finite() && threshold > 0.0) {
                return Err(ConfigError::InvalidWeightThreshold(threshold));
            }
        }
        if self.policy == BiasingPolicy::LastVertexSplitting && self.interesting_processes.is_empty()
        {
            return Err(ConfigError::MissingOption("interesting_processes"));
        }
        if let Some(acceptance) = &self.acceptance {
            acceptance.validate()?;
        }
        Ok(())
    }
}

/// Builder for [`BiasingConfig`].
#[derive(Clone, Debug, Default)]
pub struct BiasingConfigBuilder {
    policy: Option<BiasingPolicy>,
    regions: Vec<String>,
    particles: Vec<ParticleKind>,
    splitting_factor: Option<f64>,
    max_replay_level: Option<u32>,
    russian_roulette: bool,
    bias_cone: Option<(Vec3, f64)>,
    free_flight_weight_threshold: Option<f64>,
    interesting_processes: Vec<InterestingProcess>,
    aliases: Vec<(String, InterestingProcess)>,
    acceptance: Option<AcceptanceConfig>,
}

impl BiasingConfigBuilder {
    /// Sets the policy.
    #[inline]
    pub fn policy(mut self, policy: BiasingPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Adds a region of interest.
    #[inline]
    pub fn region(mut self, volume: impl Into<String>) -> Self {
        self.regions.push(volume.into());
        self
    }

    /// Adds a particle the policy applies to (default: gamma only).
    #[inline]
    pub fn particle(mut self, particle: ParticleKind) -> Self {
        self.particles.push(particle);
        self
    }

    /// Sets the splitting factor.
    #[inline]
    pub fn splitting_factor(mut self, factor: f64) -> Self {
        self.splitting_factor = Some(factor);
        self
    }

    /// Sets the maximum nested replay level.
    #[inline]
    pub fn max_replay_level(mut self, level: u32) -> Self {
        self.max_replay_level = Some(level);
        self
    }

    /// Enables or disables angular Russian roulette.
    #[inline]
    pub fn russian_roulette(mut self, enabled: bool) -> Self {
        self.russian_roulette = enabled;
        self
    }

    /// Sets the bias cone.
    #[inline]
    pub fn bias_cone(mut self, direction: Vec3, half_angle_deg: f64) -> Self {
        self.bias_cone = Some((direction, half_angle_deg));
        self
    }

    /// Sets the free-flight weight threshold.
    #[inline]
    pub fn free_flight_weight_threshold(mut self, threshold: f64) -> Self {
        self.free_flight_weight_threshold = Some(threshold);
        self
    }

    /// Adds an interaction class recorded by last-vertex replay.
    #[inline]
    pub fn interesting_process(mut self, class: InterestingProcess) -> Self {
        if !self.interesting_processes.contains(&class) {
            self.interesting_processes.push(class);
        }
        self
    }

    /// Maps a native process name onto an interaction class.
    #[inline]
    pub fn process_alias(mut self, native: impl Into<String>, class: InterestingProcess) -> Self {
        self.aliases.push((native.into(), class));
        self
    }

    /// Sets the acceptance test.
    #[inline]
    pub fn acceptance(mut self, acceptance: AcceptanceConfig) -> Self {
        self.acceptance = Some(acceptance);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the policy is missing or any parameter is
    /// invalid (see [`BiasingConfig::validate`]).
    pub fn build(self) -> Result<BiasingConfig, ConfigError> {
        let policy = self.policy.ok_or(ConfigError::MissingOption("policy"))?;
        let splitting_factor = match self.splitting_factor {
            Some(value) => SplittingFactor::new(value)?,
            None => SplittingFactor::UNITY,
        };
        let bias_cone = self
            .bias_cone
            .map(|(direction, angle)| BiasCone::new(direction, angle))
            .transpose()?;
        let particles = if self.particles.is_empty() {
            vec![ParticleKind::Gamma]
        } else {
            self.particles
        };
        let mut catalogue = ProcessCatalogue::default();
        for (native, class) in self.aliases {
            catalogue.insert(native, class);
        }

        let config = BiasingConfig {
            policy,
            regions: self.regions,
            particles,
            splitting_factor,
            max_replay_level: self.max_replay_level.unwrap_or(DEFAULT_MAX_REPLAY_LEVEL),
            russian_roulette: self.russian_roulette,
            bias_cone,
            free_flight_weight_threshold: self.free_flight_weight_threshold,
            interesting_processes: self.interesting_processes,
            catalogue,
            acceptance: self.acceptance,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Bias-cone table of a TOML document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BiasConeSettings {
    /// Cone axis.
    pub direction: [f64; 3],
    /// Half-angle (degrees).
    pub half_angle_deg: f64,
}

/// Acceptance table of a TOML document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcceptanceSettings {
    /// Target volume.
    #[serde(default)]
    pub volume: String,
    /// Incidence-angle tolerance (degrees).
    pub max_incidence_angle_deg: Option<f64>,
    /// Trial cap (required).
    pub max_trials: Option<u32>,
    /// `"skip-event"` or `"zero-energy"`.
    pub exhaustion: Option<String>,
}

/// Unvalidated biasing settings as they appear in a TOML document.
///
/// Embedded by front-ends in larger documents; convert with
/// [`BiasingSettings::into_config`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BiasingSettings {
    /// Policy name.
    pub policy: Option<String>,
    /// Region volume names.
    #[serde(default)]
    pub regions: Vec<String>,
    /// Particle names.
    #[serde(default)]
    pub particles: Vec<String>,
    /// Splitting factor.
    pub splitting_factor: Option<f64>,
    /// Maximum nested replay level.
    pub max_replay_level: Option<u32>,
    /// Angular Russian roulette switch.
    #[serde(default)]
    pub russian_roulette: bool,
    /// Bias cone.
    pub bias_cone: Option<BiasConeSettings>,
    /// Free-flight weight threshold.
    pub free_flight_weight_threshold: Option<f64>,
    /// Interesting process classes.
    #[serde(default)]
    pub interesting_processes: Vec<String>,
    /// Acceptance test.
    pub acceptance: Option<AcceptanceSettings>,
    /// Native process name to class.
    #[serde(default)]
    pub process_alias: BTreeMap<String, String>,
}

impl BiasingSettings {
    /// Parses names and validates.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unknown names and invalid parameters.
    pub fn into_config(self) -> Result<BiasingConfig, ConfigError> {
        let policy: BiasingPolicy = self
            .policy
            .as_deref()
            .ok_or(ConfigError::MissingOption("policy"))?
            .parse()?;

        let mut builder = BiasingConfig::builder()
            .policy(policy)
            .russian_roulette(self.russian_roulette);
        for region in self.regions {
            builder = builder.region(region);
        }
        for particle in &self.particles {
            builder = builder.particle(particle.parse()?);
        }
        if let Some(factor) = self.splitting_factor {
            builder = builder.splitting_factor(factor);
        }
        if let Some(level) = self.max_replay_level {
            builder = builder.max_replay_level(level);
        }
        if let Some(cone) = self.bias_cone {
            let [x, y, z] = cone.direction;
            builder = builder.bias_cone(Vec3::new(x, y, z), cone.half_angle_deg);
        }
        if let Some(threshold) = self.free_flight_weight_threshold {
            builder = builder.free_flight_weight_threshold(threshold);
        }
        for class in &self.interesting_processes {
            builder = builder.interesting_process(class.parse()?);
        }
        for (native, class) in &self.process_alias {
            builder = builder.process_alias(native.clone(), class.parse()?);
        }
        if let Some(acceptance) = self.acceptance {
            if acceptance.volume.is_empty() {
                return Err(ConfigError::MissingOption("acceptance.volume"));
            }
            let max_trials = acceptance
                .max_trials
                .ok_or(ConfigError::MissingOption("acceptance.max_trials"))?;
            let mut parsed = AcceptanceConfig::new(acceptance.volume, max_trials);
            if let Some(angle) = acceptance.max_incidence_angle_deg {
                parsed = parsed.with_max_incidence_angle(angle);
            }
            if let Some(exhaustion) = acceptance.exhaustion {
                parsed = parsed.with_exhaustion(exhaustion.parse()?);
            }
            builder = builder.acceptance(parsed);
        }
        builder.build()
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::invalid(key, value))
}

fn parse_vector(key: &str, value: &str) -> Result<[f64; 3], ConfigError> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|s| parse_value(key, s.trim()))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        [x, y, z] => Ok([*x, *y, *z]),
        _ => Err(ConfigError::invalid(key, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_names_round_trip() {
        for policy in [
            BiasingPolicy::ForceCollision,
            BiasingPolicy::ComptonSplitting,
            BiasingPolicy::BremSplitting,
            BiasingPolicy::PairSplitting,
            BiasingPolicy::GenericSplitting,
            BiasingPolicy::FreeFlight,
            BiasingPolicy::LastVertexSplitting,
        ] {
            assert_eq!(policy.as_str().parse::<BiasingPolicy>().unwrap(), policy);
        }
        assert_eq!(
            "Force_Collision".parse::<BiasingPolicy>().unwrap(),
            BiasingPolicy::ForceCollision
        );
        assert_eq!(
            "importance-sampling".parse::<BiasingPolicy>(),
            Err(ConfigError::UnknownPolicy("importance-sampling".to_string()))
        );
    }

    #[test]
    fn test_missing_policy_and_region() {
        assert_eq!(
            BiasingConfig::builder().region("slab").build().unwrap_err(),
            ConfigError::MissingOption("policy")
        );
        assert_eq!(
            BiasingConfig::builder()
                .policy(BiasingPolicy::FreeFlight)
                .build()
                .unwrap_err(),
            ConfigError::MissingOption("regions")
        );
    }

    #[test]
    fn test_defaults() {
        let config = BiasingConfig::builder()
            .policy(BiasingPolicy::ForceCollision)
            .region("slab")
            .build()
            .unwrap();
        assert_eq!(config.particles(), &[ParticleKind::Gamma]);
        assert!(config.splitting_factor().is_unity());
        assert_eq!(config.max_replay_level(), DEFAULT_MAX_REPLAY_LEVEL);
        assert!(config.is_region(Some("slab")));
        assert!(!config.is_region(Some("world")));
        assert!(!config.is_region(None));
    }

    #[test]
    fn test_invalid_parameters() {
        let base = || {
            BiasingConfig::builder()
                .policy(BiasingPolicy::ComptonSplitting)
                .region("slab")
        };
        assert_eq!(
            base().splitting_factor(0.5).build().unwrap_err(),
            ConfigError::InvalidSplittingFactor(0.5)
        );
        assert_eq!(
            base().max_replay_level(0).build().unwrap_err(),
            ConfigError::InvalidReplayLevel(0)
        );
        assert_eq!(
            base().russian_roulette(true).build().unwrap_err(),
            ConfigError::MissingOption("bias_cone")
        );
        assert_eq!(
            base().bias_cone(Vec3::z(), 0.0).build().unwrap_err(),
            ConfigError::InvalidConeAngle(0.0)
        );
        assert_eq!(
            base().free_flight_weight_threshold(-1.0).build().unwrap_err(),
            ConfigError::InvalidWeightThreshold(-1.0)
        );
        assert_eq!(
            base()
                .acceptance(AcceptanceConfig::new("detector", 0))
                .build()
                .unwrap_err(),
            ConfigError::ZeroMaxTrials
        );
    }

    #[test]
    fn test_last_vertex_requires_interesting_processes() {
        let err = BiasingConfig::builder()
            .policy(BiasingPolicy::LastVertexSplitting)
            .region("collimator")
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingOption("interesting_processes"));
    }

    #[test]
    fn test_toml_document() {
        let config = BiasingConfig::from_toml_str(
            r#"
            policy = "last-vertex-splitting"
            regions = ["collimator"]
            particles = ["gamma"]
            splitting_factor = 12.5
            max_replay_level = 3
            russian_roulette = true
            interesting_processes = ["compton", "annihilation"]

            [acceptance]
            volume = "detector"
            max_incidence_angle_deg = 30.0
            max_trials = 1000
            exhaustion = "zero-energy"

            [process_alias]
            "my-compton" = "compton"
            "#,
        )
        .unwrap();

        assert_eq!(config.policy(), BiasingPolicy::LastVertexSplitting);
        assert_eq!(config.splitting_factor().value(), 12.5);
        assert_eq!(config.max_replay_level(), 3);
        assert!(config.is_interesting(InterestingProcess::Annihilation));
        assert!(!config.is_interesting(InterestingProcess::PairProduction));
        let acceptance = config.acceptance().unwrap();
        assert_eq!(acceptance.max_trials, 1000);
        assert_eq!(acceptance.exhaustion, ExhaustionPolicy::ZeroEnergy);
        assert_eq!(
            config.catalogue().classify("my-compton"),
            InterestingProcess::Compton
        );
    }

    #[test]
    fn test_toml_rejects_unknown_fields() {
        let err = BiasingConfig::from_toml_str("policy = \"free-flight\"\nregion = \"slab\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_acceptance_trial_cap_is_mandatory() {
        let err = BiasingConfig::from_key_values([
            ("policy", "force-collision"),
            ("regions", "slab"),
            ("acceptance.volume", "slab"),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::MissingOption("acceptance.max_trials"));
    }

    #[test]
    fn test_key_values() {
        let config = BiasingConfig::from_key_values([
            ("policy", "compton-splitting"),
            ("regions", "slab, shield"),
            ("particles", "gamma"),
            ("splitting_factor", "4"),
            ("russian_roulette", "true"),
            ("bias_cone.direction", "0, 0, 2"),
            ("bias_cone.half_angle_deg", "20"),
            ("free_flight_weight_threshold", "0.01"),
            ("process_alias.Compton", "compton"),
        ])
        .unwrap();

        assert_eq!(config.regions().len(), 2);
        let cone = config.bias_cone().unwrap();
        assert!((cone.axis().z - 1.0).abs() < 1e-12);
        assert_eq!(config.free_flight_weight_threshold(), Some(0.01));
        assert_eq!(config.catalogue().classify("Compton"), InterestingProcess::Compton);
    }

    #[test]
    fn test_key_values_errors() {
        assert_eq!(
            BiasingConfig::from_key_values([("policy", "free-flight"), ("colour", "red")])
                .unwrap_err(),
            ConfigError::UnknownKey("colour".to_string())
        );
        assert_eq!(
            BiasingConfig::from_key_values([("splitting_factor", "many")]).unwrap_err(),
            ConfigError::InvalidValue {
                key: "splitting_factor".to_string(),
                value: "many".to_string()
            }
        );
        assert_eq!(
            BiasingConfig::from_key_values([
                ("policy", "compton-splitting"),
                ("regions", "slab"),
                ("bias_cone.direction", "0,0,1"),
            ])
            .unwrap_err(),
            ConfigError::MissingOption("bias_cone.half_angle_deg")
        );
        assert!(matches!(
            BiasingConfig::from_key_values([
                ("policy", "force-collision"),
                ("regions", "slab"),
                ("particles", "graviton"),
            ]),
            Err(ConfigError::Particle(_))
        ));
    }
}
