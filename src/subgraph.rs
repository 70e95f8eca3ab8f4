//! Per-location combinatorial choices of reads-from and modification-order
//! edges, combined across locations into whole candidate executions.
//!
//! Ported from `original_source/src/{DirectedSubgraph,ReadFromLocationSubgraphs}.{h,cxx}`:
//! the original builds one `DirectedSubgraph` per relation (rf, mo, sc) by
//! filtering the graph's edge set through an `EdgeMaskType`; here a
//! [`DirectedSubgraph`] is the result of *one full combinatorial choice* for
//! a single location — an rf source for every read, and (for atomics) a
//! total order over the writes — since that's the granularity the driver
//! actually needs to multiply together across locations.

use crate::action::ActionId;
use crate::boolean::Expression;
use crate::location::{LocationId, LocationKind};
use crate::read_from_loop::{self, Candidate};
use crate::graph::Graph;
use std::collections::HashMap;

/// One concrete choice of rf sources (and, for atomics, an mo order) for
/// every read/write at a single location.
#[derive(Debug, Clone)]
pub struct DirectedSubgraph {
    pub location: LocationId,
    /// `read action -> write action` it reads from.
    pub reads_from: HashMap<ActionId, ActionId>,
    /// Total order of writes at this location, oldest first; empty for
    /// non-atomic locations (no `mo` relation applies there).
    pub modification_order: Vec<ActionId>,
    /// The condition under which this entire combination is legal: the
    /// conjunction of every constituent rf edge's condition.
    pub valid: Expression,
}

impl DirectedSubgraph {
    /// The write a given read sees under this subgraph, if any.
    pub fn source_of(&self, read: ActionId) -> Option<ActionId> {
        self.reads_from.get(&read).copied()
    }
}

/// All [`DirectedSubgraph`]s for one location: the cartesian product of each
/// read's candidate rf sources, times every permutation of the location's
/// writes when the location is atomic (mirrors `ReadFromLocationSubgraphs`
/// iterating `MultiLoop` over per-read `ReadFromLoop`s).
pub struct ReadFromLocationSubgraphs {
    pub location: LocationId,
    pub subgraphs: Vec<DirectedSubgraph>,
}

/// Enumerate every [`DirectedSubgraph`] for `location`.
///
/// `rf_cache` must already contain the candidate sets for every read at this
/// location that is sb-before another read at the same location (the driver
/// is expected to call this location-by-location in an order compatible with
/// splicing, or simply precompute `read_from_loop::candidate_writes` for
/// every read up front and pass the full cache).
pub fn enumerate(graph: &Graph, location: LocationId, rf_cache: &HashMap<ActionId, Vec<Candidate>>) -> ReadFromLocationSubgraphs {
    let reads: Vec<ActionId> = graph.actions().iter().filter(|a| a.location() == location && a.is_read()).map(|a| a.id()).collect();
    let writes: Vec<ActionId> = graph.actions().iter().filter(|a| a.location() == location && a.is_write()).map(|a| a.id()).collect();

    let per_read_candidates: Vec<Vec<Candidate>> = reads
        .iter()
        .map(|&r| rf_cache.get(&r).cloned().unwrap_or_else(|| read_from_loop::candidate_writes(graph, r, rf_cache)))
        .collect();

    let mo_orderings: Vec<Vec<ActionId>> = if matches!(graph.location(location).map(|l| l.kind()).unwrap_or(LocationKind::NonAtomic), LocationKind::NonAtomic) {
        vec![Vec::new()]
    } else {
        permutations(&writes)
    };

    let mut subgraphs = Vec::new();
    for rf_choice in cartesian_product(&per_read_candidates) {
        let mut reads_from = HashMap::new();
        let mut valid = Expression::one();
        for (read, candidate) in reads.iter().zip(rf_choice.iter()) {
            reads_from.insert(*read, candidate.write);
            valid = valid.multiply(&candidate.condition);
        }
        for mo in &mo_orderings {
            subgraphs.push(DirectedSubgraph {
                location,
                reads_from: reads_from.clone(),
                modification_order: mo.clone(),
                valid: valid.clone(),
            });
        }
    }

    ReadFromLocationSubgraphs { location, subgraphs }
}

fn cartesian_product(sets: &[Vec<Candidate>]) -> Vec<Vec<Candidate>> {
    let mut result: Vec<Vec<Candidate>> = vec![Vec::new()];
    for set in sets {
        if set.is_empty() {
            return Vec::new();
        }
        let mut next = Vec::with_capacity(result.len() * set.len());
        for partial in &result {
            for candidate in set {
                let mut extended = partial.clone();
                extended.push(candidate.clone());
                next.push(extended);
            }
        }
        result = next;
    }
    result
}

fn permutations(items: &[ActionId]) -> Vec<Vec<ActionId>> {
    if items.is_empty() {
        return vec![Vec::new()];
    }
    let mut result = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let picked = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, picked);
            result.push(tail);
        }
    }
    result
}
