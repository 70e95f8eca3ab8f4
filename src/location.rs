//! Memory locations: the things actions read from and write to.
//!
//! A `Location` is deliberately tiny — the engine never reasons about the
//! actual bytes stored, only about which actions touch the same location and
//! under what memory order (spec §3). Locations are owned by a [`crate::graph::Graph`]
//! arena and referenced everywhere else by [`LocationId`].

use std::fmt;

/// Stable index-based handle to a [`Location`] inside its owning `Graph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocationId(pub(crate) u32);

impl LocationId {
    /// Raw arena index, for diagnostics.
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// What kind of memory location this is; determines which edge relations
/// (`mo`, `lo`) apply and whether a racing pair of accesses is even legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    /// Plain non-atomic memory: any two unordered accesses where at least one
    /// is a write is a data race, not a candidate execution to enumerate.
    NonAtomic,
    /// A `std::atomic<T>` object: `mo` is the total or partial order of
    /// writes the engine enumerates.
    Atomic,
    /// A mutex: ordered by `lo` (lock order) rather than `mo`.
    Mutex,
}

/// A single memory location in the subject program.
#[derive(Debug, Clone)]
pub struct Location {
    id: LocationId,
    name: String,
    kind: LocationKind,
}

impl Location {
    pub(crate) fn new(id: LocationId, name: impl Into<String>, kind: LocationKind) -> Self {
        Location { id, name: name.into(), kind }
    }

    /// This location's id.
    pub fn id(&self) -> LocationId {
        self.id
    }

    /// The source-level name used for diagnostics (e.g. `"x"`, `"mtx"`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// What kind of location this is.
    pub fn kind(&self) -> LocationKind {
        self.kind
    }

    /// Whether two accesses to this location can legally race (only ever
    /// true for atomics/mutexes — a race on a non-atomic location is a
    /// program bug the engine doesn't enumerate executions for).
    pub fn allows_unordered_access(&self) -> bool {
        !matches!(self.kind, LocationKind::NonAtomic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_atomic_does_not_allow_unordered_access() {
        let loc = Location::new(LocationId(0), "x", LocationKind::NonAtomic);
        assert!(!loc.allows_unordered_access());
    }

    #[test]
    fn atomic_allows_unordered_access() {
        let loc = Location::new(LocationId(0), "y", LocationKind::Atomic);
        assert!(loc.allows_unordered_access());
    }
}
