//! Track state registry.
//!
//! Per-track auxiliary biasing state lives in a side-table keyed by
//! [`TrackId`]; the host kernel owns the tracks themselves. Every slot
//! carries a generation number so that a [`TrackKey`] captured for one
//! track can never be mistaken for a later track that reuses the id.

use std::collections::HashMap;
use std::fmt;

use bias_core::TrackId;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Auxiliary biasing state of a track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuxState {
    /// Not being biased.
    #[default]
    Free,
    /// About to be cloned on region entry.
    ToBeCloned,
    /// Clone whose next interaction is forced inside the region.
    ToBeForced,
    /// Track crossing the region without interacting.
    ToBeFreeFlight,
}

impl AuxState {
    /// Returns `true` for every state except [`AuxState::Free`].
    #[inline]
    pub fn is_biasing(&self) -> bool {
        *self != AuxState::Free
    }

    /// Returns `true` if the state machine allows `self -> next`.
    pub fn can_transition_to(&self, next: AuxState) -> bool {
        use AuxState::*;
        matches!(
            (*self, next),
            (_, Free)
                | (Free, ToBeCloned)
                | (Free, ToBeForced)
                | (Free, ToBeFreeFlight)
                | (ToBeCloned, ToBeFreeFlight)
                | (ToBeCloned, ToBeCloned)
                | (ToBeForced, ToBeForced)
                | (ToBeFreeFlight, ToBeFreeFlight)
        )
    }
}

/// Identifier of the operator that owns a track's state (diagnostics only).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperatorId(pub u32);

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operator-{}", self.0)
    }
}

/// Generation-checked handle on a registry slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TrackKey {
    /// Track identifier.
    pub id: TrackId,
    generation: u64,
}

#[derive(Clone, Debug)]
struct Slot {
    state: AuxState,
    owner: Option<OperatorId>,
    generation: u64,
    split_level: u32,
}

/// Side-table of auxiliary states.
///
/// # Examples
///
/// ```rust
/// use bias_core::TrackId;
/// use bias_engine::registry::{AuxState, OperatorId, TrackStateRegistry};
///
/// let mut registry = TrackStateRegistry::new();
/// let key = registry.attach(TrackId(4));
/// assert_eq!(registry.state(TrackId(4)), AuxState::Free);
///
/// registry.transition(TrackId(4), AuxState::ToBeFreeFlight, OperatorId(0)).unwrap();
/// assert_eq!(registry.evict(TrackId(4)), Some(AuxState::ToBeFreeFlight));
///
/// // Same id, new track: the old key no longer resolves.
/// registry.attach(TrackId(4));
/// assert!(!registry.is_current(key));
/// ```
#[derive(Clone, Debug, Default)]
pub struct TrackStateRegistry {
    slots: HashMap<TrackId, Slot>,
    next_generation: u64,
}

impl TrackStateRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a `Free` slot for `id` unless one already exists, and
    /// returns its key.
    pub fn attach(&mut self, id: TrackId) -> TrackKey {
        let next_generation = &mut self.next_generation;
        let slot = self.slots.entry(id).or_insert_with(|| {
            *next_generation += 1;
            Slot {
                state: AuxState::Free,
                owner: None,
                generation: *next_generation,
                split_level: 0,
            }
        });
        TrackKey {
            id,
            generation: slot.generation,
        }
    }

    /// Key of the current slot for `id`, if attached.
    pub fn key(&self, id: TrackId) -> Option<TrackKey> {
        self.slots.get(&id).map(|slot| TrackKey {
            id,
            generation: slot.generation,
        })
    }

    /// Returns `true` if `key` still designates a live slot.
    #[inline]
    pub fn is_current(&self, key: TrackKey) -> bool {
        self.slots
            .get(&key.id)
            .is_some_and(|slot| slot.generation == key.generation)
    }

    /// Current state of `id` (`Free` when not attached).
    #[inline]
    pub fn state(&self, id: TrackId) -> AuxState {
        self.slots.get(&id).map_or(AuxState::Free, |slot| slot.state)
    }

    /// State behind `key`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StaleTrackKey`] if the slot was recycled.
    pub fn state_of(&self, key: TrackKey) -> Result<AuxState, EngineError> {
        match self.slots.get(&key.id) {
            Some(slot) if slot.generation == key.generation => Ok(slot.state),
            _ => Err(EngineError::StaleTrackKey(key.id)),
        }
    }

    /// Operator that last moved `id` out of `Free`.
    #[inline]
    pub fn owner(&self, id: TrackId) -> Option<OperatorId> {
        self.slots.get(&id).and_then(|slot| slot.owner)
    }

    /// Moves `id` to `next`, attaching it first if needed. Returns the
    /// previous state.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidTransition`] for transitions the state
    /// machine forbids; the slot is left unchanged.
    pub fn transition(
        &mut self,
        id: TrackId,
        next: AuxState,
        owner: OperatorId,
    ) -> Result<AuxState, EngineError> {
        self.attach(id);
        let slot = self
            .slots
            .get_mut(&id)
            .ok_or(EngineError::StaleTrackKey(id))?;
        let previous = slot.state;
        if !previous.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                from: previous,
                to: next,
            });
        }
        slot.state = next;
        slot.owner = if next.is_biasing() { Some(owner) } else { None };
        Ok(previous)
    }

    /// Resets `id` to `Free`; returns the previous state.
    pub fn clear(&mut self, id: TrackId) -> AuxState {
        match self.slots.get_mut(&id) {
            Some(slot) => {
                slot.owner = None;
                std::mem::replace(&mut slot.state, AuxState::Free)
            }
            None => AuxState::Free,
        }
    }

    /// Nested split level of `id` (0 for unsplit tracks).
    #[inline]
    pub fn split_level(&self, id: TrackId) -> u32 {
        self.slots.get(&id).map_or(0, |slot| slot.split_level)
    }

    /// Records the nested split level of `id`, attaching it if needed.
    pub fn set_split_level(&mut self, id: TrackId, level: u32) {
        self.attach(id);
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.split_level = level;
        }
    }

    /// Removes the slot of a dying track; returns its last state.
    pub fn evict(&mut self, id: TrackId) -> Option<AuxState> {
        self.slots.remove(&id).map(|slot| slot.state)
    }

    /// Discards every slot. Returns how many slots were still attached.
    ///
    /// Generations keep increasing, so keys from the previous event stay
    /// stale.
    pub fn reset_event(&mut self) -> usize {
        let stale = self.slots.len();
        self.slots.clear();
        stale
    }

    /// Number of attached slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no slot is attached.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
