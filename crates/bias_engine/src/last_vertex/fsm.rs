//! Replay state machine of one track under last-vertex splitting.
//!
//! ```text
//!             Start               Exit                End
//!   Pending ────────► Tracking ────────► Replaying ────────► Finished{replayed}
//!     │  ▲               │ End
//!     │  │ Resume        └──────────────────────────────────► Finished
//!     │  │
//!     ├──┴─► SuspendedForAnnihilation ──Start──► (postponed, unchanged)
//!     │                │
//!     └── Discard ─────┴──► Discard ──Start/End──► Finished
//! ```

use bias_core::TrackId;
use thiserror::Error;

/// Replay state of a track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReplayState {
    /// Known, not yet tracked.
    #[default]
    Pending,
    /// Annihilation twin waiting for its leader to finish.
    SuspendedForAnnihilation {
        /// The twin being tracked first.
        leader: TrackId,
    },
    /// Regenerated by a replay; killed when popped.
    Discard,
    /// Being transported.
    Tracking,
    /// Exited the region and is being replaced by a replay.
    Replaying,
    /// Done.
    Finished {
        /// Whether the track's exit triggered a replay.
        replayed: bool,
    },
}

impl ReplayState {
    /// Returns `true` once the track has ended.
    #[inline]
    pub fn is_finished(&self) -> bool {
        matches!(self, ReplayState::Finished { .. })
    }
}

/// Inputs of the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplayEvent {
    /// The kernel popped the track.
    Start,
    /// The annihilation twin `leader` started first.
    Suspend {
        /// Leading twin.
        leader: TrackId,
    },
    /// The leading twin ended without replaying.
    Resume,
    /// A replay regenerates this track.
    Discard,
    /// The track left the region and its vertex is replayed.
    Exit,
    /// The kernel finished the track.
    End,
}

/// A state/event pair the machine does not accept.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("replay event {event:?} not allowed in state {state:?}")]
pub struct InvalidReplayTransition {
    /// Current state.
    pub state: ReplayState,
    /// Rejected event.
    pub event: ReplayEvent,
}

/// Next state for `event` in `state`.
///
/// A suspended twin that is popped early stays suspended; the caller
/// postpones it.
///
/// # Errors
///
/// Returns [`InvalidReplayTransition`] for every pair not in the diagram.
pub fn transition(
    state: ReplayState,
    event: ReplayEvent,
) -> Result<ReplayState, InvalidReplayTransition> {
    use ReplayEvent as E;
    use ReplayState as S;

    let next = match (state, event) {
        (S::Pending, E::Start) => S::Tracking,
        (S::Pending, E::Suspend { leader }) => S::SuspendedForAnnihilation { leader },
        (S::Pending, E::Discard) => S::Discard,
        (S::SuspendedForAnnihilation { .. }, E::Start) => state,
        (S::SuspendedForAnnihilation { .. }, E::Resume) => S::Pending,
        (S::SuspendedForAnnihilation { .. }, E::Discard) => S::Discard,
        (S::Discard, E::Start) | (S::Discard, E::Discard) => S::Discard,
        (S::Discard, E::End) => S::Finished { replayed: false },
        (S::Tracking, E::Exit) => S::Replaying,
        (S::Tracking, E::End) => S::Finished { replayed: false },
        (S::Replaying, E::End) => S::Finished { replayed: true },
        _ => return Err(InvalidReplayTransition { state, event }),
    };
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replayed_lifecycle() {
        let mut state = ReplayState::Pending;
        for event in [ReplayEvent::Start, ReplayEvent::Exit, ReplayEvent::End] {
            state = transition(state, event).unwrap();
        }
        assert_eq!(state, ReplayState::Finished { replayed: true });
    }

    #[test]
    fn test_suspended_twin_paths() {
        let leader = TrackId(3);
        let suspended = transition(ReplayState::Pending, ReplayEvent::Suspend { leader }).unwrap();
        assert_eq!(suspended, ReplayState::SuspendedForAnnihilation { leader });
        assert_eq!(transition(suspended, ReplayEvent::Start), Ok(suspended));
        assert_eq!(
            transition(suspended, ReplayEvent::Resume),
            Ok(ReplayState::Pending)
        );
        assert_eq!(
            transition(suspended, ReplayEvent::Discard),
            Ok(ReplayState::Discard)
        );
    }

    #[test]
    fn test_discarded_track_finishes_unreplayed() {
        let state = transition(ReplayState::Discard, ReplayEvent::Start).unwrap();
        assert_eq!(
            transition(state, ReplayEvent::End),
            Ok(ReplayState::Finished { replayed: false })
        );
    }

    #[test]
    fn test_invalid_pairs_rejected() {
        let finished = ReplayState::Finished { replayed: false };
        assert!(transition(finished, ReplayEvent::Start).is_err());
        assert!(transition(ReplayState::Pending, ReplayEvent::Exit).is_err());
        assert!(transition(ReplayState::Tracking, ReplayEvent::Discard).is_err());
        assert!(transition(ReplayState::Replaying, ReplayEvent::Exit).is_err());
        let err = transition(ReplayState::Pending, ReplayEvent::End).unwrap_err();
        assert_eq!(err.state, ReplayState::Pending);
        assert_eq!(err.event, ReplayEvent::End);
    }
}
