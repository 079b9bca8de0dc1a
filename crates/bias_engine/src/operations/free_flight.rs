//! Forced free-flight operation.
//!
//! A track in free flight crosses the region without interacting: every
//! candidate process reports an infinite interaction length. The weight
//! the track would have lost to interactions is accounted for by the
//! survival probability
//!
//! ```text
//! S = exp(-Σ_i ∫ rate_i dl)
//! ```
//!
//! accumulated step by step, and applied once when the track leaves the
//! region.

use std::collections::HashMap;

use bias_core::{ParticleChange, Track, TrackId, TransportRng};

use crate::roulette::weight_roulette;

/// Free-flight bookkeeping of one track.
#[derive(Clone, Debug, PartialEq)]
pub struct FreeFlightRecord {
    /// Weight the track had when free flight began.
    pub initial_weight: f64,
    /// Accumulated survival probability.
    pub survival: f64,
    /// Set once the weight has been restored.
    pub restored: bool,
    rates: HashMap<String, f64>,
}

impl FreeFlightRecord {
    fn new(initial_weight: f64) -> Self {
        Self {
            initial_weight,
            survival: 1.0,
            restored: false,
            rates: HashMap::new(),
        }
    }

    /// Weight to restore: `initial_weight * survival`.
    #[inline]
    pub fn weight(&self) -> f64 {
        self.initial_weight * self.survival
    }
}

/// What happened when free flight ended.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Restoration {
    /// Weight restored (and possibly raised by threshold roulette).
    Restored {
        /// New weight of the track.
        weight: f64,
    },
    /// Killed by the weight-threshold roulette.
    Killed,
}

/// Forced free flight for every track of one worker.
///
/// # Examples
///
/// ```rust
/// use bias_core::{ParticleKind, Track, TrackId, TransportRng, Vec3};
/// use bias_engine::operations::{FreeFlightOperation, Restoration};
///
/// let track = Track::new(TrackId(1), ParticleKind::Gamma, Vec3::zeros(), Vec3::z(), 1.0);
/// let mut free_flight = FreeFlightOperation::new(None);
/// let mut rng = TransportRng::from_seed(1);
///
/// free_flight.begin(track.id, 1.0);
/// free_flight.record_rate(track.id, "compt", 0.01);
/// free_flight.accumulate(track.id, "compt", 10.0);
///
/// let (_, restoration) = free_flight.restore(&track, &mut rng).unwrap();
/// assert_eq!(restoration, Restoration::Restored { weight: (-0.1f64).exp() });
/// ```
#[derive(Clone, Debug, Default)]
pub struct FreeFlightOperation {
    weight_threshold: Option<f64>,
    records: HashMap<TrackId, FreeFlightRecord>,
}

impl FreeFlightOperation {
    /// Creates the operation; weights restored below `weight_threshold`
    /// play Russian roulette.
    pub fn new(weight_threshold: Option<f64>) -> Self {
        Self {
            weight_threshold,
            records: HashMap::new(),
        }
    }

    /// Interaction length reported for every process during free flight.
    #[inline]
    pub fn interaction_length(&self) -> f64 {
        f64::INFINITY
    }

    /// Starts (or restarts, after a previous restoration) free flight for
    /// `id`, remembering `initial_weight`.
    pub fn begin(&mut self, id: TrackId, initial_weight: f64) {
        self.records.insert(id, FreeFlightRecord::new(initial_weight));
    }

    /// Returns `true` while `id` is in an unrestored free flight.
    #[inline]
    pub fn is_active(&self, id: TrackId) -> bool {
        self.records.get(&id).is_some_and(|r| !r.restored)
    }

    /// Bookkeeping of `id`.
    #[inline]
    pub fn record(&self, id: TrackId) -> Option<&FreeFlightRecord> {
        self.records.get(&id)
    }

    /// Stores the current rate of `process` for the next move.
    pub fn record_rate(&mut self, id: TrackId, process: &str, rate: f64) {
        if let Some(record) = self.records.get_mut(&id) {
            record.rates.insert(process.to_string(), rate.max(0.0));
        }
    }

    /// Multiplies the survival probability by `exp(-rate * length)` for the
    /// rate last recorded for `process`.
    pub fn accumulate(&mut self, id: TrackId, process: &str, length: f64) {
        if let Some(record) = self.records.get_mut(&id) {
            if record.restored {
                return;
            }
            if let Some(rate) = record.rates.get(process) {
                record.survival *= (-rate * length).exp();
            }
        }
    }

    /// Ends free flight for `track` and produces the restoring final state.
    ///
    /// Returns `None` if the track is not in free flight or its weight was
    /// already restored.
    pub fn restore(
        &mut self,
        track: &Track,
        rng: &mut TransportRng,
    ) -> Option<(ParticleChange, Restoration)> {
        let record = self.records.get_mut(&track.id)?;
        if record.restored {
            return None;
        }
        record.restored = true;

        let weight = record.weight();
        let restoration = match self.weight_threshold {
            Some(threshold) if weight > 0.0 => match weight_roulette(weight, threshold, rng) {
                Some(weight) => Restoration::Restored { weight },
                None => Restoration::Killed,
            },
            Some(_) => Restoration::Killed,
            None => Restoration::Restored { weight },
        };

        let change = match restoration {
            Restoration::Restored { weight } => {
                let mut change = ParticleChange::new();
                change.propose_weight(weight);
                change
            }
            Restoration::Killed => {
                let mut change = ParticleChange::kill();
                change.propose_weight(0.0);
                change
            }
        };
        Some((change, restoration))
    }

    /// Drops the bookkeeping of a finished track. Returns it if the weight
    /// was never restored.
    pub fn forget(&mut self, id: TrackId) -> Option<FreeFlightRecord> {
        self.records.remove(&id).filter(|r| !r.restored)
    }

    /// Drops every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}
