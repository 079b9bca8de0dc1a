//! Per-worker counters and their run-wide merge.
//!
//! Workers never share state while tracking. Each owns a [`WorkerStats`];
//! at end of run the counters are merged into [`RunStatistics`] under its
//! mutex, the only synchronisation point of a run.

use std::sync::Mutex;

use bias_core::EventId;
use serde::{Deserialize, Serialize};

/// Counters collected by one worker.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    /// Events started.
    pub events: u64,
    /// Tracks cloned on region entry.
    pub clones: u64,
    /// Forced interactions performed.
    pub forced_interactions: u64,
    /// Forced episodes abandoned (zero length or zero rate).
    pub abandoned_episodes: u64,
    /// Forced-law lengths clamped after repeated rounding onto the bound.
    pub clamped_samples: u64,
    /// Forced episodes re-initialised after an outside momentum change.
    pub law_reinitialisations: u64,
    /// Free-flight weights restored at region exit.
    pub free_flights_restored: u64,
    /// Tracks killed by the free-flight weight threshold.
    pub threshold_kills: u64,
    /// Interactions split.
    pub split_interactions: u64,
    /// Replays performed while splitting.
    pub split_replays: u64,
    /// Products emitted by splitting.
    pub split_secondaries: u64,
    /// Replays the process declined.
    pub declined_replays: u64,
    /// Products that survived angular roulette off-region.
    pub roulette_survivals: u64,
    /// Products killed by angular roulette.
    pub roulette_kills: u64,
    /// Interaction vertices recorded for last-vertex replay.
    pub vertices_recorded: u64,
    /// Last-vertex replays performed.
    pub vertex_replays: u64,
    /// Siblings discarded because a replay regenerates them.
    pub discarded_siblings: u64,
    /// Annihilation twins postponed.
    pub postponed_twins: u64,
    /// Splits or replays refused at the maximum replay level.
    pub replay_cap_exhaustions: u64,
    /// Acceptance trials drawn.
    pub acceptance_trials: u64,
    /// Acceptance trials rejected.
    pub acceptance_rejections: u64,
    /// Events whose acceptance trials were exhausted.
    pub acceptance_exhaustions: u64,
    /// Invariant violations healed.
    pub invariant_violations: u64,
    /// Events flagged for audit.
    pub audited_events: u64,
}

impl WorkerStats {
    /// Adds `other` into `self`.
    pub fn merge(&mut self, other: &WorkerStats) {
        self.events += other.events;
        self.clones += other.clones;
        self.forced_interactions += other.forced_interactions;
        self.abandoned_episodes += other.abandoned_episodes;
        self.clamped_samples += other.clamped_samples;
        self.law_reinitialisations += other.law_reinitialisations;
        self.free_flights_restored += other.free_flights_restored;
        self.threshold_kills += other.threshold_kills;
        self.split_interactions += other.split_interactions;
        self.split_replays += other.split_replays;
        self.split_secondaries += other.split_secondaries;
        self.declined_replays += other.declined_replays;
        self.roulette_survivals += other.roulette_survivals;
        self.roulette_kills += other.roulette_kills;
        self.vertices_recorded += other.vertices_recorded;
        self.vertex_replays += other.vertex_replays;
        self.discarded_siblings += other.discarded_siblings;
        self.postponed_twins += other.postponed_twins;
        self.replay_cap_exhaustions += other.replay_cap_exhaustions;
        self.acceptance_trials += other.acceptance_trials;
        self.acceptance_rejections += other.acceptance_rejections;
        self.acceptance_exhaustions += other.acceptance_exhaustions;
        self.invariant_violations += other.invariant_violations;
        self.audited_events += other.audited_events;
    }
}

/// Event flagged because an invariant violation was healed during it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Worker index.
    pub worker: usize,
    /// Flagged event.
    pub event: EventId,
}

/// Merged totals of a run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Workers merged so far.
    pub workers: usize,
    /// Summed counters.
    pub stats: WorkerStats,
    /// Events flagged for audit.
    pub audit: Vec<AuditEntry>,
}

/// Run-wide statistics sink shared by all workers.
///
/// # Examples
///
/// ```rust
/// use bias_engine::stats::{RunStatistics, WorkerStats};
///
/// let run = RunStatistics::new();
/// let stats = WorkerStats { clones: 3, ..WorkerStats::default() };
/// run.merge(0, &stats, &[]);
/// run.merge(1, &stats, &[]);
///
/// let summary = run.snapshot();
/// assert_eq!(summary.workers, 2);
/// assert_eq!(summary.stats.clones, 6);
/// ```
#[derive(Debug, Default)]
pub struct RunStatistics {
    inner: Mutex<RunSummary>,
}

impl RunStatistics {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one worker's counters and audit list.
    pub fn merge(&self, worker: usize, stats: &WorkerStats, audit: &[EventId]) {
        let mut summary = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        summary.workers += 1;
        summary.stats.merge(stats);
        summary
            .audit
            .extend(audit.iter().map(|&event| AuditEntry { worker, event }));
    }

    /// Copy of the merged totals.
    pub fn snapshot(&self) -> RunSummary {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_merge_adds_every_counter() {
        let mut a = WorkerStats {
            clones: 1,
            split_secondaries: 8,
            audited_events: 1,
            ..WorkerStats::default()
        };
        let b = WorkerStats {
            clones: 2,
            split_secondaries: 16,
            vertex_replays: 4,
            ..WorkerStats::default()
        };
        a.merge(&b);
        assert_eq!(a.clones, 3);
        assert_eq!(a.split_secondaries, 24);
        assert_eq!(a.vertex_replays, 4);
        assert_eq!(a.audited_events, 1);
    }

    #[test]
    fn test_concurrent_merge() {
        let run = Arc::new(RunStatistics::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let run = Arc::clone(&run);
                thread::spawn(move || {
                    let stats = WorkerStats {
                        events: 100,
                        ..WorkerStats::default()
                    };
                    run.merge(worker, &stats, &[EventId(worker as u64)]);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let summary = run.snapshot();
        assert_eq!(summary.workers, 8);
        assert_eq!(summary.stats.events, 800);
        assert_eq!(summary.audit.len(), 8);
    }

    #[test]
    fn test_stats_serialise() {
        let stats = WorkerStats {
            forced_interactions: 5,
            ..WorkerStats::default()
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"forced_interactions\":5"));
        let back: WorkerStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stats);
    }
}
