//! Track and event identity.

use std::fmt;

/// Numeric track identifier.
///
/// Identifiers are unique within an event only. The host kernel restarts
/// numbering at every event, so any side-table keyed by `TrackId` must be
/// reset or generation-checked across events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackId(pub u32);

impl TrackId {
    /// Placeholder carried by secondaries until the kernel stacks them.
    pub const UNASSIGNED: TrackId = TrackId(0);

    /// Returns `true` once the kernel has assigned a real identifier.
    #[inline]
    pub fn is_assigned(self) -> bool {
        self != Self::UNASSIGNED
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Event (history) identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event {}", self.0)
    }
}

/// Per-event track id allocator owned by the host kernel.
///
/// # Examples
///
/// ```rust
/// use bias_core::types::{TrackId, TrackIdAllocator};
///
/// let mut ids = TrackIdAllocator::new();
/// assert_eq!(ids.allocate(), TrackId(1));
/// assert_eq!(ids.allocate(), TrackId(2));
///
/// ids.reset();
/// assert_eq!(ids.allocate(), TrackId(1));
/// ```
#[derive(Clone, Debug, Default)]
pub struct TrackIdAllocator {
    last: u32,
}

impl TrackIdAllocator {
    /// Creates an allocator whose first id is `TrackId(1)`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next free identifier.
    #[inline]
    pub fn allocate(&mut self) -> TrackId {
        self.last += 1;
        TrackId(self.last)
    }

    /// Restarts numbering; called by the kernel at every event start.
    #[inline]
    pub fn reset(&mut self) {
        self.last = 0;
    }

    /// Number of identifiers handed out since the last reset.
    #[inline]
    pub fn allocated(&self) -> u32 {
        self.last
    }
}
