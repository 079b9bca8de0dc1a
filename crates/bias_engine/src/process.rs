//! Interaction classes the engine treats specially.
//!
//! Native process names are resolved to an [`InterestingProcess`] once, at
//! configuration time, through a [`ProcessCatalogue`]. Biasing decisions
//! then match on the enum rather than on strings.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Closed set of interaction classes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterestingProcess {
    /// Incoherent (Compton) scattering.
    Compton,
    /// Bremsstrahlung.
    Bremsstrahlung,
    /// Pair production (gamma conversion).
    PairProduction,
    /// Positron annihilation.
    Annihilation,
    /// Everything else.
    Other,
}

/// How a replayed interaction's outcomes are combined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitMode {
    /// The interacting particle is itself one of the split products
    /// (scattering): every replay yields a down-weighted copy of it.
    ScatteredPrimary,
    /// Only the secondaries are split; the interacting particle keeps its
    /// weight (emission and absorption processes).
    SecondariesOnly,
}

impl InterestingProcess {
    /// All classes, in declaration order.
    pub const ALL: [InterestingProcess; 5] = [
        InterestingProcess::Compton,
        InterestingProcess::Bremsstrahlung,
        InterestingProcess::PairProduction,
        InterestingProcess::Annihilation,
        InterestingProcess::Other,
    ];

    /// Configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            InterestingProcess::Compton => "compton",
            InterestingProcess::Bremsstrahlung => "bremsstrahlung",
            InterestingProcess::PairProduction => "pair-production",
            InterestingProcess::Annihilation => "annihilation",
            InterestingProcess::Other => "other",
        }
    }

    /// How splitting combines replays of this class.
    pub fn split_mode(&self) -> SplitMode {
        match self {
            InterestingProcess::Compton | InterestingProcess::Other => SplitMode::ScatteredPrimary,
            InterestingProcess::Bremsstrahlung
            | InterestingProcess::PairProduction
            | InterestingProcess::Annihilation => SplitMode::SecondariesOnly,
        }
    }
}

impl fmt::Display for InterestingProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterestingProcess {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "compton" | "compt" => Ok(InterestingProcess::Compton),
            "bremsstrahlung" | "brem" | "ebrem" => Ok(InterestingProcess::Bremsstrahlung),
            "pair-production" | "pair" | "conv" => Ok(InterestingProcess::PairProduction),
            "annihilation" | "annihil" => Ok(InterestingProcess::Annihilation),
            "other" => Ok(InterestingProcess::Other),
            _ => Err(ConfigError::UnknownProcessClass(s.to_string())),
        }
    }
}

/// Lookup table from native process names to [`InterestingProcess`].
///
/// # Examples
///
/// ```rust
/// use bias_engine::process::{InterestingProcess, ProcessCatalogue};
///
/// let catalogue = ProcessCatalogue::default().with_alias("Compton", InterestingProcess::Compton);
///
/// assert_eq!(catalogue.classify("compt"), InterestingProcess::Compton);
/// assert_eq!(catalogue.classify("Compton"), InterestingProcess::Compton);
/// assert_eq!(catalogue.classify("phot"), InterestingProcess::Other);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessCatalogue {
    table: HashMap<String, InterestingProcess>,
}

impl Default for ProcessCatalogue {
    fn default() -> Self {
        let table = [
            ("compt", InterestingProcess::Compton),
            ("eBrem", InterestingProcess::Bremsstrahlung),
            ("conv", InterestingProcess::PairProduction),
            ("annihil", InterestingProcess::Annihilation),
        ]
        .into_iter()
        .map(|(name, class)| (name.to_string(), class))
        .collect();
        Self { table }
    }
}

impl ProcessCatalogue {
    /// Maps an additional native name (builder style).
    pub fn with_alias(mut self, native: impl Into<String>, class: InterestingProcess) -> Self {
        self.insert(native, class);
        self
    }

    /// Maps an additional native name.
    pub fn insert(&mut self, native: impl Into<String>, class: InterestingProcess) {
        self.table.insert(native.into(), class);
    }

    /// Class of the native process `name`; unknown names are [`InterestingProcess::Other`].
    #[inline]
    pub fn classify(&self, name: &str) -> InterestingProcess {
        self.table
            .get(name)
            .copied()
            .unwrap_or(InterestingProcess::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_class_names() {
        assert_eq!("Compton".parse::<InterestingProcess>().unwrap(), InterestingProcess::Compton);
        assert_eq!("eBrem".parse::<InterestingProcess>().unwrap(), InterestingProcess::Bremsstrahlung);
        assert_eq!("pair".parse::<InterestingProcess>().unwrap(), InterestingProcess::PairProduction);
        assert!(matches!(
            "rayleigh".parse::<InterestingProcess>(),
            Err(ConfigError::UnknownProcessClass(_))
        ));
        for class in InterestingProcess::ALL {
            assert_eq!(class.as_str().parse::<InterestingProcess>().unwrap(), class);
        }
    }

    #[test]
    fn test_split_modes() {
        assert_eq!(InterestingProcess::Compton.split_mode(), SplitMode::ScatteredPrimary);
        assert_eq!(InterestingProcess::Bremsstrahlung.split_mode(), SplitMode::SecondariesOnly);
        assert_eq!(InterestingProcess::PairProduction.split_mode(), SplitMode::SecondariesOnly);
    }

    #[test]
    fn test_alias_overrides_default() {
        let catalogue = ProcessCatalogue::default().with_alias("compt", InterestingProcess::Other);
        assert_eq!(catalogue.classify("compt"), InterestingProcess::Other);
        assert_eq!(catalogue.classify("conv"), InterestingProcess::PairProduction);
    }
}
