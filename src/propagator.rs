//! One backtracking step of the `ReadFromGraph` DFS: a directed move from a
//! child node back to its parent along an opsem or rf edge, together with
//! the predicates the [`crate::property::Property`] state machine needs to
//! decide what that move means.
//!
//! Ported from `original_source/src/Propagator.h`.

use crate::action::{ActionId, MemoryOrder};
use crate::boolean::Expression;
use crate::graph::Graph;
use crate::location::LocationId;
use crate::thread::ThreadId;

/// One edge traversal during the DFS, from `child` back to `current`.
pub struct Propagator<'g> {
    graph: &'g Graph,
    current: ActionId,
    child: ActionId,
    current_location: LocationId,
    current_is_write: bool,
    edge_is_rf: bool,
    condition: Expression,
}

impl<'g> Propagator<'g> {
    /// Build a propagator for the move `child -> current`.
    pub fn new(graph: &'g Graph, current: ActionId, child: ActionId, edge_is_rf: bool, condition: Expression) -> Self {
        let current_action = graph.action(current);
        Propagator {
            graph,
            current,
            child,
            current_location: current_action.location(),
            current_is_write: current_action.is_write(),
            edge_is_rf,
            condition,
        }
    }

    /// The condition under which this propagation step happens.
    pub fn condition(&self) -> &Expression {
        &self.condition
    }

    /// Whether the edge being followed is an `rf` edge (as opposed to an
    /// opsem sb/asw edge).
    pub fn edge_is_rf(&self) -> bool {
        self.edge_is_rf
    }

    /// The location of the current (parent) node.
    pub fn current_location(&self) -> LocationId {
        self.current_location
    }

    /// The node we're moving away from.
    pub fn current(&self) -> ActionId {
        self.current
    }

    /// The node we're moving toward (the one already visited/being visited).
    pub fn child(&self) -> ActionId {
        self.child
    }

    /// The thread of the current node.
    pub fn current_thread(&self) -> ThreadId {
        self.graph.action(self.current).thread()
    }

    /// Whether this step crosses an rf edge from an acquire read to a
    /// non-release write — the crossing that starts a causal-loop property.
    pub fn rf_acq_but_not_rel(&self) -> bool {
        if !self.edge_is_rf {
            return false;
        }
        let child_order = self.graph.action(self.child).memory_order();
        let current_order = self.graph.action(self.current).memory_order();
        child_order.is_acquire() && !current_order.is_release()
    }

    /// Whether this step crosses an rf edge between a release write and an
    /// acquire read (the crossing that keeps a release sequence intact).
    pub fn rf_rel_acq(&self) -> bool {
        if !self.edge_is_rf {
            return false;
        }
        let child_order = self.graph.action(self.child).memory_order();
        let current_order = self.graph.action(self.current).memory_order();
        child_order.is_acquire() && current_order.is_release()
    }

    /// Whether the current node is a write with release semantics on
    /// `location`.
    pub fn is_write_rel_to(&self, location: LocationId) -> bool {
        self.current_location == location && self.current_is_write && self.graph.action(self.current).memory_order().is_release()
    }

    /// Whether the current node is a write to `location` without release
    /// semantics (a relaxed or plain write that can break a release
    /// sequence, or hide an earlier write's visible side effect).
    pub fn is_non_rel_write(&self, location: LocationId) -> bool {
        self.current_location == location
            && self.current_is_write
            && !self.graph.action(self.current).memory_order().is_release()
    }

    /// Whether the current node is any kind of store to `location` (used by
    /// the reads-from property to detect hiding writes regardless of order).
    pub fn is_store_to(&self, location: LocationId) -> bool {
        self.current_location == location && self.current_is_write
    }

    /// The current node's memory order, for diagnostics and table lookups
    /// that need the full order rather than a single predicate.
    pub fn current_memory_order(&self) -> MemoryOrder {
        self.graph.action(self.current).memory_order()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::location::LocationKind;

    #[test]
    fn detects_acquire_from_non_release() {
        let mut graph = Graph::new();
        let loc = graph.add_location("x", LocationKind::Atomic);
        let t = graph.main_thread();
        let w = graph.add_action(t, loc, ActionKind::AtomicStore, MemoryOrder::Relaxed);
        let r = graph.add_action(t, loc, ActionKind::AtomicLoad, MemoryOrder::Acquire);
        graph.recompute_all_exists();

        let prop = Propagator::new(&graph, w, r, true, Expression::one());
        assert!(prop.rf_acq_but_not_rel());
        assert!(!prop.rf_rel_acq());
    }

    #[test]
    fn detects_release_acquire_pair() {
        let mut graph = Graph::new();
        let loc = graph.add_location("x", LocationKind::Atomic);
        let t = graph.main_thread();
        let w = graph.add_action(t, loc, ActionKind::AtomicStore, MemoryOrder::Release);
        let r = graph.add_action(t, loc, ActionKind::AtomicLoad, MemoryOrder::Acquire);
        graph.recompute_all_exists();

        let prop = Propagator::new(&graph, w, r, true, Expression::one());
        assert!(prop.rf_rel_acq());
        assert!(!prop.rf_acq_but_not_rel());
    }

    #[test]
    fn is_non_rel_write_excludes_release() {
        let mut graph = Graph::new();
        let loc = graph.add_location("x", LocationKind::Atomic);
        let t = graph.main_thread();
        let w = graph.add_action(t, loc, ActionKind::AtomicStore, MemoryOrder::Release);
        let r = graph.add_action(t, loc, ActionKind::AtomicLoad, MemoryOrder::Relaxed);
        graph.recompute_all_exists();

        let prop = Propagator::new(&graph, w, r, true, Expression::one());
        assert!(prop.is_write_rel_to(loc));
        assert!(!prop.is_non_rel_write(loc));
    }
}
