//! History-based scoring.
//!
//! Every primary history contributes one [`HistoryScore`]. Histories the
//! acceptance gate rejected count as zero-score histories so that means
//! stay normalised per source particle.

use serde::{Deserialize, Serialize};

/// Weighted scores of one history.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryScore {
    /// Photon weight leaving the slab through its downstream face.
    pub transmitted: f64,
    /// Weighted energy deposited in the slab (MeV).
    pub deposited: f64,
    /// Photon weight entering the detector plane.
    pub detected: f64,
}

/// Sample mean and its standard error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    /// Mean per history.
    pub mean: f64,
    /// Standard error of the mean.
    pub std_error: f64,
}

impl Estimate {
    /// Half-width of the 95% confidence interval.
    #[inline]
    pub fn confidence_95(&self) -> f64 {
        1.96 * self.std_error
    }

    /// Standard error relative to the mean (0 for a zero mean).
    #[inline]
    pub fn relative_error(&self) -> f64 {
        if self.mean == 0.0 {
            0.0
        } else {
            self.std_error / self.mean.abs()
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Moments {
    sum: f64,
    sum_sq: f64,
}

impl Moments {
    #[inline]
    fn add(&mut self, x: f64) {
        self.sum += x;
        self.sum_sq += x * x;
    }

    #[inline]
    fn merge(&mut self, other: &Moments) {
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
    }

    fn estimate(&self, n: u64) -> Estimate {
        if n == 0 {
            return Estimate::default();
        }
        let n = n as f64;
        let mean = self.sum / n;
        let std_error = if n > 1.0 {
            let variance = (self.sum_sq - self.sum * mean) / (n - 1.0);
            (variance.max(0.0) / n).sqrt()
        } else {
            0.0
        };
        Estimate { mean, std_error }
    }
}

/// Accumulated scores of the slab scenario.
///
/// # Examples
///
/// ```rust
/// use bias_kernel::tally::{HistoryScore, SlabTally};
///
/// let mut tally = SlabTally::new();
/// tally.record(&HistoryScore { transmitted: 1.0, ..HistoryScore::default() });
/// tally.record_empty(1);
///
/// let report = tally.report();
/// assert_eq!(report.histories, 2);
/// assert_eq!(report.transmission.mean, 0.5);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SlabTally {
    histories: u64,
    transmitted: Moments,
    deposited: Moments,
    detected: Moments,
}

/// Serialisable summary of a [`SlabTally`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TallyReport {
    /// Histories scored, including zero-score gate rejections.
    pub histories: u64,
    /// Transmitted photon weight per history.
    pub transmission: Estimate,
    /// Energy deposited in the slab per history (MeV).
    pub deposit: Estimate,
    /// Photon weight reaching the detector per history.
    pub detector: Estimate,
}

impl SlabTally {
    /// Creates an empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one history.
    pub fn record(&mut self, score: &HistoryScore) {
        self.histories += 1;
        self.transmitted.add(score.transmitted);
        self.deposited.add(score.deposited);
        self.detected.add(score.detected);
    }

    /// Adds `count` histories that scored nothing.
    #[inline]
    pub fn record_empty(&mut self, count: u64) {
        self.histories += count;
    }

    /// Folds another worker's tally into this one.
    pub fn merge(&mut self, other: &SlabTally) {
        self.histories += other.histories;
        self.transmitted.merge(&other.transmitted);
        self.deposited.merge(&other.deposited);
        self.detected.merge(&other.detected);
    }

    /// Histories scored so far.
    #[inline]
    pub fn histories(&self) -> u64 {
        self.histories
    }

    /// Transmission estimate.
    pub fn transmission(&self) -> Estimate {
        self.transmitted.estimate(self.histories)
    }

    /// Deposit estimate.
    pub fn deposit(&self) -> Estimate {
        self.deposited.estimate(self.histories)
    }

    /// Detector estimate.
    pub fn detector(&self) -> Estimate {
        self.detected.estimate(self.histories)
    }

    /// Summary of all estimates.
    pub fn report(&self) -> TallyReport {
        TallyReport {
            histories: self.histories,
            transmission: self.transmission(),
            deposit: self.deposit(),
            detector: self.detector(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn transmitted(x: f64) -> HistoryScore {
        HistoryScore {
            transmitted: x,
            ..HistoryScore::default()
        }
    }

    #[test]
    fn test_mean_and_standard_error() {
        let mut tally = SlabTally::new();
        for x in [1.0, 2.0, 3.0, 4.0] {
            tally.record(&transmitted(x));
        }
        let estimate = tally.transmission();
        assert_relative_eq!(estimate.mean, 2.5);
        // Sample variance 5/3, standard error sqrt(5/12).
        assert_relative_eq!(estimate.std_error, (5.0f64 / 12.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_empty_histories_dilute_mean() {
        let mut tally = SlabTally::new();
        tally.record(&transmitted(3.0));
        tally.record_empty(2);
        assert_eq!(tally.histories(), 3);
        assert_relative_eq!(tally.transmission().mean, 1.0);
    }

    #[test]
    fn test_merge_equals_single_tally() {
        let scores: Vec<_> = (0..10).map(|i| transmitted(i as f64 * 0.1)).collect();
        let mut whole = SlabTally::new();
        let mut left = SlabTally::new();
        let mut right = SlabTally::new();
        for (i, score) in scores.iter().enumerate() {
            whole.record(score);
            if i < 4 {
                left.record(score);
            } else {
                right.record(score);
            }
        }
        left.merge(&right);
        assert_eq!(left.histories(), whole.histories());
        assert_relative_eq!(left.transmission().mean, whole.transmission().mean, epsilon = 1e-15);
        assert_relative_eq!(
            left.transmission().std_error,
            whole.transmission().std_error,
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_empty_tally_reports_zero() {
        let report = SlabTally::new().report();
        assert_eq!(report.histories, 0);
        assert_eq!(report.deposit, Estimate::default());
        assert_eq!(report.deposit.relative_error(), 0.0);
    }
}
