//! The three properties a [`crate::read_from_graph::ReadFromGraph`] DFS
//! tracks while walking backward along rf/mo edges, and how they combine
//! when two paths rejoin at a node with more than one child.
//!
//! Ported from `original_source/src/Property.{h,cxx}`. A `Property` records
//! one in-flight fact about a single DFS path:
//!
//! - [`PropertyKind::CausalLoop`]: the path has crossed a non-release/acquire
//!   rf edge at some location; if it crosses a *second*, different, such
//!   location the path is broken (two independent relaxed dependencies can't
//!   both close a causal loop).
//! - [`PropertyKind::ReadsFrom`]: the path is looking for the write node that
//!   a particular read reads from; if an intervening write to the same
//!   location is found first, the original write is "hidden" (its value is
//!   no longer the visible side effect) and the property is void from then
//!   on.
//! - [`PropertyKind::ReleaseSequence`]: the path is following a release
//!   sequence from a read-acquire backward; `not_synced_yet` while still
//!   inside relaxed writes to the same location, `broken` if a differently
//!   threaded non-release write appears before the sequence's head.

use crate::boolean::Expression;
use crate::location::LocationId;
use crate::action::ActionId;
use crate::thread::ThreadId;

/// Which kind of fact a [`Property`] is tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    CausalLoop,
    ReleaseSequence,
    ReadsFrom,
}

/// One in-flight fact being propagated along a single DFS path.
#[derive(Debug, Clone)]
pub struct Property {
    kind: PropertyKind,
    /// The node this property is ultimately "about": the node where the loop
    /// was first detected (causal_loop), the acquiring read (release_sequence),
    /// or the write being read (reads_from).
    end_point: ActionId,
    /// The condition under which this property holds on this path.
    path_condition: Expression,
    /// causal_loop: the non-rel/acq location crossed, if any.
    /// release_sequence: the location not yet synced.
    /// reads_from: the location being read.
    location: Option<LocationId>,
    not_synced_yet: bool,
    broken_release_sequence: bool,
    hidden: bool,
    /// release_sequence only: the thread of the candidate store this
    /// property started from, i.e. the one thread allowed to keep extending
    /// the sequence with further relaxed writes without breaking it.
    release_sequence_thread: Option<ThreadId>,
}

impl Property {
    /// A fresh causal-loop property, created the moment dfs closes a cycle at
    /// `end_point`. `location` is `Some` only if the edge that closed the
    /// cycle was itself a non-release/acquire rf crossing; a cycle closed by
    /// a plain sb/asw back-edge, or by a proper release/acquire rf pair,
    /// starts with no location committed yet.
    pub fn causal_loop(end_point: ActionId, path_condition: Expression, location: Option<LocationId>) -> Self {
        Property {
            kind: PropertyKind::CausalLoop,
            end_point,
            path_condition,
            location,
            not_synced_yet: false,
            broken_release_sequence: false,
            hidden: false,
            release_sequence_thread: None,
        }
    }

    /// A fresh release-sequence property, started the moment a non-rel-acq
    /// rf edge is crossed: `read_acquire` is the end point (the acquiring
    /// read whose release sequence is being tracked), `location` is the
    /// location of the candidate store that the acquire read from.
    pub fn release_sequence(read_acquire: ActionId, path_condition: Expression, location: LocationId, candidate_store_thread: ThreadId) -> Self {
        Property {
            kind: PropertyKind::ReleaseSequence,
            end_point: read_acquire,
            path_condition,
            location: Some(location),
            not_synced_yet: true,
            broken_release_sequence: false,
            hidden: false,
            release_sequence_thread: Some(candidate_store_thread),
        }
    }

    /// A fresh reads-from property, tracking whether `write` stays the
    /// visible side effect seen by the read that spawned this path.
    pub fn reads_from(write: ActionId, path_condition: Expression, location: LocationId) -> Self {
        Property {
            kind: PropertyKind::ReadsFrom,
            end_point: write,
            path_condition,
            location: Some(location),
            not_synced_yet: false,
            broken_release_sequence: false,
            hidden: false,
            release_sequence_thread: None,
        }
    }

    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    pub fn end_point(&self) -> ActionId {
        self.end_point
    }

    pub fn path_condition(&self) -> &Expression {
        &self.path_condition
    }

    pub fn location(&self) -> Option<LocationId> {
        self.location
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_broken_release_sequence(&self) -> bool {
        self.broken_release_sequence
    }

    pub fn is_not_synced_yet(&self) -> bool {
        self.not_synced_yet
    }

    /// release_sequence only: the thread of the candidate store this
    /// property is tracking from.
    pub fn release_sequence_thread(&self) -> Option<ThreadId> {
        self.release_sequence_thread
    }

    /// Rescope this property onto a new path with condition `path_condition`
    /// (used when a node has multiple parents and the same property must be
    /// copied onward once per incoming edge).
    pub fn rescoped(&self, path_condition: Expression) -> Self {
        Property { path_condition, ..self.clone() }
    }

    /// Advance a [`PropertyKind::CausalLoop`] property across another rf edge
    /// at `crossed_location` with release/acquire strength `rel_acq`. Breaks
    /// the property (returns `false`, meaning "discard") if it would have to
    /// cross a *second*, different, non-rel/acq location.
    pub fn advance_causal_loop(&mut self, crossed_location: LocationId, rel_acq: bool) -> bool {
        debug_assert_eq!(self.kind, PropertyKind::CausalLoop);
        if rel_acq {
            return true;
        }
        match self.location {
            None => {
                self.location = Some(crossed_location);
                true
            }
            Some(loc) if loc == crossed_location => true,
            Some(_) => false,
        }
    }

    /// Advance a [`PropertyKind::ReadsFrom`] property across a write to
    /// `touched_location` found before reaching `self.end_point`: hides the
    /// original write if it's the same location and a different action.
    /// Reaching the endpoint again un-hides it (the search is about to
    /// discard the property there anyway; see [`Property::invalidates`]).
    pub fn advance_reads_from(&mut self, touched_location: LocationId, touching_action: ActionId) {
        debug_assert_eq!(self.kind, PropertyKind::ReadsFrom);
        if touching_action == self.end_point {
            return;
        }
        if Some(touched_location) == self.location {
            self.hidden = true;
        }
    }

    /// Advance a [`PropertyKind::ReleaseSequence`] property across an action
    /// at `touched_location` on `thread`, per the 7-state row of the
    /// synchronizes-with table (spec §4.8): a release write on the tracked
    /// location ends `not_synced_yet`; a relaxed write on a *different*
    /// thread while `not_synced_yet` breaks the sequence.
    pub fn advance_release_sequence(&mut self, touched_location: LocationId, is_release_write: bool, same_thread_as_tail: bool) {
        debug_assert_eq!(self.kind, PropertyKind::ReleaseSequence);
        if Some(touched_location) != self.location {
            return;
        }
        if is_release_write {
            self.not_synced_yet = false;
        } else if self.not_synced_yet && !same_thread_as_tail {
            self.broken_release_sequence = true;
        }
    }

    /// Whether this property still matters to the search (discard otherwise):
    /// a reads_from property that's permanently hidden, or a causal_loop
    /// property broken by crossing two distinct locations, can be dropped.
    pub fn is_relevant(&self) -> bool {
        match self.kind {
            PropertyKind::ReadsFrom => true,
            PropertyKind::CausalLoop => true,
            PropertyKind::ReleaseSequence => !self.broken_release_sequence || self.not_synced_yet,
        }
    }

    /// Whether, having just arrived back at `current` (its own end point),
    /// this property makes `current` reject the candidate execution under
    /// `self.path_condition` (spec §4.6/§4.8): a causal loop always does; a
    /// reads_from property does only if it ended up hidden along the way (its
    /// write stopped being the visible side effect before the read saw it); a
    /// release_sequence reaching its own acquire never directly invalidates —
    /// its `broken_release_sequence` flag is surfaced separately.
    pub fn invalidates(&self, current: ActionId) -> bool {
        if self.end_point != current {
            return false;
        }
        match self.kind {
            PropertyKind::CausalLoop => true,
            PropertyKind::ReadsFrom => self.hidden,
            PropertyKind::ReleaseSequence => false,
        }
    }

    fn discriminant_key(&self) -> (PropertyKind, ActionId, bool) {
        (self.kind, self.end_point, self.hidden)
    }
}

/// Internal state bucket used by the merge table: `0` broken+synced, `1`
/// clean+synced, `2` clean+not-synced, `3` broken+not-synced (never produced
/// by `advance_release_sequence` but kept for totality of the table,
/// mirroring the original's `internal_state`).
fn internal_state(p: &Property) -> u8 {
    (if p.broken_release_sequence { 0 } else { 1 }) + (if p.not_synced_yet { 2 } else { 0 })
}

/// Merge a newly-arrived property `incoming` into the `existing` properties
/// already collected at a node (spec §4.8 "Property merging"): two
/// properties with the same `(kind, end_point, hidden)` describe the same
/// conceptual fact reached via two different paths. For causal_loop and
/// reads_from this is a plain OR of their path conditions; release_sequence
/// properties instead go through [`merge_release_sequence`]'s 4x4 table.
pub fn merge_into(existing: &mut Vec<Property>, incoming: Property) {
    if incoming.path_condition.is_zero() {
        return;
    }
    if incoming.kind == PropertyKind::ReleaseSequence {
        merge_release_sequence(existing, incoming);
        return;
    }
    let key = incoming.discriminant_key();
    if let Some(slot) = existing.iter_mut().find(|p| p.discriminant_key() == key) {
        slot.path_condition = slot.path_condition.add(&incoming.path_condition);
        if slot.location.is_none() {
            slot.location = incoming.location;
        }
    } else {
        existing.push(incoming);
    }
}

/// Merge a newly-arrived release-sequence property `incoming` into the
/// `existing` properties already collected at a join node, per
/// `Property::merge_into`'s 4x4 table (spec §4.8, §9 "highest-value test
/// target"). A release-sequence property's current state is one of four
/// conditions — A: broken+synced, B: clean+synced, C: broken+not-synced, D:
/// clean+not-synced — that partition the full path-condition space reaching
/// this `(end_point, location)` pair (A+B+C+D == the sum of every
/// release-sequence property's condition ever merged here). Merging a new
/// property E in one of these four states must rewrite *all four* existing
/// conditions at once: the table below is exactly the one the original's
/// `merge_into` encodes in its switch over the incoming property's state,
/// indexed by `internal_state` (0=A, 1=B, 2=C, 3=D):
///
/// ```text
/// incoming:        0 (A)          1 (B)                2 (C)                3 (D)
/// A (broken/sync)  A + E          A + C*E              A + B*E              A
/// B (clean/sync)   B * !E         B + E*!(A+C)         B * !E               B
/// C (broken/!sync) C * !E         C * !E               C + E*!(A+B)         C
/// D (clean/!sync)  D * !E         D * !E               D * !E               D + E*!(A+B+C)
/// ```
///
/// This preserves the invariant that the four conditions stay pairwise
/// disjoint and their sum equals the sum before the merge plus `incoming`'s
/// condition.
pub fn merge_release_sequence(existing: &mut Vec<Property>, incoming: Property) {
    debug_assert_eq!(incoming.kind, PropertyKind::ReleaseSequence);

    let mut slots: [Option<usize>; 4] = [None, None, None, None];
    for (idx, p) in existing.iter().enumerate() {
        if p.kind == PropertyKind::ReleaseSequence && p.end_point == incoming.end_point && p.location == incoming.location {
            slots[internal_state(p) as usize] = Some(idx);
        }
    }
    let cond_of = |slot: Option<usize>| -> Expression { slot.map(|i| existing[i].path_condition.clone()).unwrap_or_else(Expression::zero) };
    let a = cond_of(slots[0]);
    let b = cond_of(slots[1]);
    let c = cond_of(slots[2]);
    let d = cond_of(slots[3]);
    let e = incoming.path_condition.clone();

    let (new_a, new_b, new_c, new_d) = match internal_state(&incoming) {
        0 => {
            let not_e = e.negate();
            (a.add(&e), b.multiply(&not_e), c.multiply(&not_e), d.multiply(&not_e))
        }
        1 => {
            let not_e = e.negate();
            let not_a_or_c = a.add(&c).negate();
            (a.add(&c.multiply(&e)), b.add(&e.multiply(&not_a_or_c)), c.multiply(&not_e), d.multiply(&not_e))
        }
        2 => {
            let not_e = e.negate();
            let not_a_or_b = a.add(&b).negate();
            (a.add(&b.multiply(&e)), b.multiply(&not_e), c.add(&e.multiply(&not_a_or_b)), d.multiply(&not_e))
        }
        3 => {
            let not_a_or_b_or_c = a.add(&b).add(&c).negate();
            (a, b, c, d.add(&e.multiply(&not_a_or_b_or_c)))
        }
        _ => unreachable!("internal_state is always in 0..=3"),
    };

    let new_conditions = [new_a, new_b, new_c, new_d];
    for (state, condition) in new_conditions.iter().enumerate() {
        match slots[state] {
            Some(idx) => existing[idx].path_condition = condition.clone(),
            None if !condition.is_zero() => {
                let mut fresh = incoming.rescoped(condition.clone());
                fresh.broken_release_sequence = state == 0 || state == 2;
                fresh.not_synced_yet = state == 2 || state == 3;
                existing.push(fresh);
            }
            None => {}
        }
    }
    existing.retain(|p| {
        !(p.kind == PropertyKind::ReleaseSequence && p.end_point == incoming.end_point && p.location == incoming.location && p.path_condition.is_zero())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boolean::VariableRegistry;

    fn dummy_action(id: u32) -> ActionId {
        ActionId(id)
    }

    #[test]
    fn causal_loop_breaks_on_second_distinct_location() {
        let mut registry = VariableRegistry::with_capacity(4);
        let _ = registry.create_variable("v", 0);
        let mut prop = Property::causal_loop(dummy_action(0), Expression::one(), Some(LocationId(0)));
        assert!(prop.advance_causal_loop(LocationId(0), false));
        assert!(!prop.advance_causal_loop(LocationId(1), false));
    }

    #[test]
    fn causal_loop_ignores_release_acquire_crossings() {
        let mut prop = Property::causal_loop(dummy_action(0), Expression::one(), Some(LocationId(0)));
        assert!(prop.advance_causal_loop(LocationId(7), true));
    }

    #[test]
    fn reads_from_becomes_hidden_on_intervening_write() {
        let mut prop = Property::reads_from(dummy_action(5), Expression::one(), LocationId(2));
        prop.advance_reads_from(LocationId(2), dummy_action(9));
        assert!(prop.is_hidden());
        assert!(prop.invalidates(dummy_action(5)));
    }

    #[test]
    fn reads_from_ignores_touches_at_its_own_endpoint() {
        let mut prop = Property::reads_from(dummy_action(5), Expression::one(), LocationId(2));
        prop.advance_reads_from(LocationId(2), dummy_action(5));
        assert!(!prop.is_hidden());
        assert!(!prop.invalidates(dummy_action(5)));
    }

    #[test]
    fn release_sequence_breaks_on_relaxed_write_from_other_thread() {
        let mut prop = Property::release_sequence(dummy_action(0), Expression::one(), LocationId(3), ThreadId(0));
        prop.advance_release_sequence(LocationId(3), false, false);
        assert!(prop.is_broken_release_sequence());
    }

    #[test]
    fn release_sequence_syncs_on_release_write() {
        let mut prop = Property::release_sequence(dummy_action(0), Expression::one(), LocationId(3), ThreadId(0));
        prop.advance_release_sequence(LocationId(3), true, false);
        assert!(!prop.is_not_synced_yet());
        assert!(!prop.is_broken_release_sequence());
    }

    #[test]
    fn merge_two_clean_release_sequences_unions_conditions() {
        let mut registry = VariableRegistry::with_capacity(4);
        let a = registry.create_variable("a", 0).unwrap();
        let b = registry.create_variable("b", 0).unwrap();
        let mut existing = vec![Property::release_sequence(dummy_action(1), Expression::from_variable(a, false), LocationId(0), ThreadId(0))];
        existing[0].not_synced_yet = false;
        let mut incoming = Property::release_sequence(dummy_action(1), Expression::from_variable(b, false), LocationId(0), ThreadId(0));
        incoming.not_synced_yet = false;

        merge_release_sequence(&mut existing, incoming);
        assert_eq!(existing.len(), 1);
        assert!(!existing[0].broken_release_sequence);
        let expected = Expression::from_variable(a, false).add(&Expression::from_variable(b, false));
        assert!(existing[0].path_condition.equivalent(&expected));
    }

    #[test]
    fn merge_broken_into_broken_stays_broken() {
        let mut existing = vec![Property::release_sequence(dummy_action(1), Expression::one(), LocationId(0), ThreadId(0))];
        existing[0].broken_release_sequence = true;
        existing[0].not_synced_yet = false;
        let mut incoming = Property::release_sequence(dummy_action(1), Expression::one(), LocationId(0), ThreadId(0));
        incoming.broken_release_sequence = true;
        incoming.not_synced_yet = false;

        merge_release_sequence(&mut existing, incoming);
        assert_eq!(existing.len(), 1);
        assert!(existing[0].broken_release_sequence);
    }

    #[test]
    fn merge_synced_into_broken_keeps_both_disjoint_and_unions_total() {
        // A (broken/synced) with condition `p`, merging in E in state B
        // (clean/synced) with condition `q`, disjoint from `p`: the table's
        // row 1 says result A = A + C*E = p (C is empty), result B = B +
        // E*!(A+C) = 0 + q*!p = q (since p, q disjoint, !p already covers q).
        let mut registry = VariableRegistry::with_capacity(4);
        let p = registry.create_variable("p", 0).unwrap();
        let q = registry.create_variable("q", 0).unwrap();
        let mut existing = vec![Property::release_sequence(dummy_action(2), Expression::from_variable(p, false), LocationId(1), ThreadId(0))];
        existing[0].broken_release_sequence = true;
        existing[0].not_synced_yet = false;

        let mut incoming = Property::release_sequence(dummy_action(2), Expression::from_variable(q, false), LocationId(1), ThreadId(0));
        incoming.broken_release_sequence = false;
        incoming.not_synced_yet = false;

        merge_release_sequence(&mut existing, incoming);
        // Two surviving rows: one broken (p) and one clean (q).
        assert_eq!(existing.len(), 2);
        let broken_condition = existing.iter().find(|x| x.broken_release_sequence).unwrap().path_condition.clone();
        let clean_condition = existing.iter().find(|x| !x.broken_release_sequence).unwrap().path_condition.clone();
        assert!(broken_condition.equivalent(&Expression::from_variable(p, false)));
        assert!(clean_condition.equivalent(&Expression::from_variable(q, false)));
    }

    #[test]
    fn generic_merge_ors_causal_loop_path_conditions() {
        let mut registry = VariableRegistry::with_capacity(4);
        let a = registry.create_variable("a", 0).unwrap();
        let b = registry.create_variable("b", 0).unwrap();
        let mut existing = vec![Property::causal_loop(dummy_action(3), Expression::from_variable(a, false), Some(LocationId(0)))];
        merge_into(&mut existing, Property::causal_loop(dummy_action(3), Expression::from_variable(b, false), Some(LocationId(0))));
        assert_eq!(existing.len(), 1);
        let expected = Expression::from_variable(a, false).add(&Expression::from_variable(b, false));
        assert!(existing[0].path_condition.equivalent(&expected));
    }
}
