//! Particle species.

use std::fmt;
use std::str::FromStr;

use super::error::UnknownParticle;
use super::ELECTRON_MASS;

/// Particle species distinguished by the engine.
///
/// Anything the engine never treats specially is carried as
/// `Other(pdg_code)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParticleKind {
    /// Photon.
    Gamma,
    /// Electron.
    Electron,
    /// Positron.
    Positron,
    /// Any other species, by PDG code.
    Other(i32),
}

impl ParticleKind {
    /// PDG Monte Carlo particle code.
    pub fn pdg_code(&self) -> i32 {
        match self {
            ParticleKind::Gamma => 22,
            ParticleKind::Electron => 11,
            ParticleKind::Positron => -11,
            ParticleKind::Other(code) => *code,
        }
    }

    /// Rest mass in MeV (zero for species the engine does not model).
    pub fn mass(&self) -> f64 {
        match self {
            ParticleKind::Gamma | ParticleKind::Other(_) => 0.0,
            ParticleKind::Electron | ParticleKind::Positron => ELECTRON_MASS,
        }
    }

    /// Conventional short name.
    pub fn name(&self) -> &'static str {
        match self {
            ParticleKind::Gamma => "gamma",
            ParticleKind::Electron => "e-",
            ParticleKind::Positron => "e+",
            ParticleKind::Other(_) => "other",
        }
    }

    /// Returns `true` for photons.
    #[inline]
    pub fn is_photon(&self) -> bool {
        matches!(self, ParticleKind::Gamma)
    }
}

impl fmt::Display for ParticleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticleKind::Other(code) => write!(f, "pdg:{}", code),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for ParticleKind {
    type Err = UnknownParticle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gamma" | "photon" => Ok(ParticleKind::Gamma),
            "e-" | "electron" => Ok(ParticleKind::Electron),
            "e+" | "positron" => Ok(ParticleKind::Positron),
            other => other
                .strip_prefix("pdg:")
                .and_then(|code| code.parse().ok())
                .map(ParticleKind::Other)
                .ok_or_else(|| UnknownParticle(s.to_string())),
        }
    }
}
