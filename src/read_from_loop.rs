//! Per-read enumeration of legal write sources.
//!
//! Ported from `original_source/src/ReadFromLoop.{h,cxx}`, collapsed from its
//! imperative generation-counter-driven iterator into a single function that
//! returns the full candidate set at once: for a given read action, every
//! write it could legally read from, each paired with the boolean condition
//! under which that particular choice is available.
//!
//! Two phases (spec §4.4):
//! 1. Walk sb/asw predecessors of the read, accumulating a "no intervening
//!    write seen yet" path condition. A same-location write ends that path
//!    (its own existence, conjoined with the accumulated path condition, is
//!    one candidate). A same-location read earlier in program order splices
//!    in whatever *it* could read from, since between `read` and that
//!    earlier read the location truly wasn't touched.
//! 2. Writes to the same location on a different thread, not reachable from
//!    `read` via sb/asw in either direction, are added unconditionally (their
//!    own existence is the only gating condition) — these are the candidates
//!    that an `rf` edge can cross threads for.

use crate::action::ActionId;
use crate::boolean::Expression;
use crate::edge::{EdgeType, EndPointRole};
use crate::graph::Graph;
use std::collections::HashMap;

/// One candidate write source for a read, and the condition under which
/// choosing it is legal.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub write: ActionId,
    pub condition: Expression,
}

/// Compute every legal rf source for `read` against `graph`.
///
/// `rf_cache` supplies the already-computed candidate set of any read
/// earlier in sb order whose own candidates need splicing in during phase 1
/// (mirrors `ReadFromLoop::store_write`'s handling of an intervening read).
pub fn candidate_writes(graph: &Graph, read: ActionId, rf_cache: &HashMap<ActionId, Vec<Candidate>>) -> Vec<Candidate> {
    let location = graph.action(read).location();
    let mut found: HashMap<ActionId, Expression> = HashMap::new();
    let mut phase1_reached_thread_entry = false;

    walk_predecessors(graph, read, location, Expression::one(), &mut found, rf_cache, &mut phase1_reached_thread_entry);

    if phase1_reached_thread_entry {
        // Phase 2: writes to the same location on other threads, unordered
        // with `read` by sb/asw in either direction.
        for other in graph.actions() {
            if other.id() == read || other.location() != location || !other.is_write() {
                continue;
            }
            if graph.sb_reaches(other.id(), read) || graph.sb_reaches(read, other.id()) {
                continue;
            }
            let entry = found.entry(other.id()).or_insert_with(Expression::zero);
            *entry = entry.add(graph.exists(other.id()));
        }
    }

    found.into_iter().map(|(write, condition)| Candidate { write, condition }).collect()
}

fn walk_predecessors(
    graph: &Graph,
    current: ActionId,
    location: crate::location::LocationId,
    path_condition: Expression,
    found: &mut HashMap<ActionId, Expression>,
    rf_cache: &HashMap<ActionId, Vec<Candidate>>,
    reached_thread_entry: &mut bool,
) {
    let predecessors: Vec<(ActionId, Expression)> = graph
        .action(current)
        .endpoints()
        .iter()
        .filter(|ep| matches!(ep.role, EndPointRole::To))
        .filter_map(|ep| {
            let edge = graph.edge(ep.edge);
            edge.edge_type().intersects(EdgeType::SB.union(EdgeType::ASW)).then(|| (ep.other, edge.condition().clone()))
        })
        .collect();

    if predecessors.is_empty() {
        *reached_thread_entry = true;
        return;
    }

    for (predecessor, edge_condition) in predecessors {
        let extended_path = path_condition.multiply(&edge_condition);
        let predecessor_action = graph.action(predecessor);

        if predecessor_action.location() == location {
            if predecessor_action.is_write() {
                let candidate_condition = extended_path.multiply(graph.exists(predecessor));
                let entry = found.entry(predecessor).or_insert_with(Expression::zero);
                *entry = entry.add(&candidate_condition);
                continue; // this path is blocked beyond the write we just found
            }
            if predecessor_action.is_read() {
                // Splice in whatever the earlier read could read from: the
                // location wasn't written between it and `current`.
                if let Some(candidates) = rf_cache.get(&predecessor) {
                    for candidate in candidates {
                        let spliced = extended_path.multiply(&candidate.condition);
                        let entry = found.entry(candidate.write).or_insert_with(Expression::zero);
                        *entry = entry.add(&spliced);
                    }
                    continue; // the earlier read's own candidates subsume further upstream search on this path
                }
            }
        }

        walk_predecessors(graph, predecessor, location, extended_path, found, rf_cache, reached_thread_entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionKind, MemoryOrder};
    use crate::location::LocationKind;

    #[test]
    fn single_write_before_read_is_the_only_candidate() {
        let mut graph = Graph::new();
        let loc = graph.add_location("x", LocationKind::Atomic);
        let t = graph.main_thread();
        let w = graph.add_action(t, loc, ActionKind::AtomicStore, MemoryOrder::Relaxed);
        let r = graph.add_action(t, loc, ActionKind::AtomicLoad, MemoryOrder::Relaxed);
        graph.add_edge(w, r, EdgeType::SB, Expression::one());
        graph.recompute_all_exists();

        let candidates = candidate_writes(&graph, r, &HashMap::new());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].write, w);
        assert!(candidates[0].condition.is_one());
    }

    #[test]
    fn unsequenced_write_on_other_thread_is_a_candidate() {
        let mut graph = Graph::new();
        let loc = graph.add_location("x", LocationKind::Atomic);
        let main = graph.main_thread();
        let other = graph.add_thread(main);
        let w = graph.add_action(other, loc, ActionKind::AtomicStore, MemoryOrder::Relaxed);
        let r = graph.add_action(main, loc, ActionKind::AtomicLoad, MemoryOrder::Relaxed);
        graph.recompute_all_exists();

        let candidates = candidate_writes(&graph, r, &HashMap::new());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].write, w);
    }

    #[test]
    fn earlier_read_candidates_are_spliced_in() {
        let mut graph = Graph::new();
        let loc = graph.add_location("x", LocationKind::Atomic);
        let main = graph.main_thread();
        let other = graph.add_thread(main);
        let w = graph.add_action(other, loc, ActionKind::AtomicStore, MemoryOrder::Relaxed);
        let r1 = graph.add_action(main, loc, ActionKind::AtomicLoad, MemoryOrder::Relaxed);
        let r2 = graph.add_action(main, loc, ActionKind::AtomicLoad, MemoryOrder::Relaxed);
        graph.add_edge(r1, r2, EdgeType::SB, Expression::one());
        graph.recompute_all_exists();

        let mut cache = HashMap::new();
        cache.insert(r1, candidate_writes(&graph, r1, &HashMap::new()));
        let candidates = candidate_writes(&graph, r2, &cache);
        assert!(candidates.iter().any(|c| c.write == w));
    }
}
