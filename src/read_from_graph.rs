//! The depth-first search that decides whether a candidate execution
//! contains a causal loop, and propagates release-sequence / reads-from
//! properties upstream while it does.
//!
//! Ported from `original_source/src/ReadFromGraph.{h,cxx}`: nodes cycle
//! through four logical states (unvisited / followed / visited / processed)
//! without ever re-zeroing a per-node array between runs — [`reset`] just
//! bumps a generation counter by 3 and the accessors compare against it, the
//! same trick the original uses (`m_generation += 3`).
//!
//! The search walks the union of sb/asw edges and the rf edges chosen by one
//! combination of [`crate::subgraph::DirectedSubgraph`]s per location. A
//! back-edge to a node still "being followed" is a cycle; [`ReadFromGraph::dfs`]
//! accumulates the boolean condition under which each such cycle exists into
//! [`ReadFromGraph::loop_condition`], which is the engine's `invalid_condition`
//! (spec §4.6/§4.9).

use crate::action::ActionId;
use crate::boolean::Expression;
use crate::edge::{EdgeType, EndPointRole};
use crate::graph::Graph;
use crate::location::LocationId;
use crate::property::{self, Property, PropertyKind};
use crate::propagator::Propagator;
use crate::subgraph::DirectedSubgraph;
use std::collections::HashMap;
use tracing::trace;

#[derive(Debug, Default, Clone)]
struct NodeData {
    state: u32,
    properties: Vec<Property>,
}

/// The DFS engine for one candidate execution (one choice of
/// [`DirectedSubgraph`] per location).
pub struct ReadFromGraph<'g> {
    graph: &'g Graph,
    /// `location -> chosen subgraph`, giving the rf source for every read.
    subgraphs: HashMap<LocationId, DirectedSubgraph>,
    node_data: Vec<NodeData>,
    generation: u32,
    loop_condition: Expression,
}

impl<'g> ReadFromGraph<'g> {
    /// Build a search engine over `graph` for one candidate execution's
    /// chosen subgraphs (one per location that has reads).
    pub fn new(graph: &'g Graph, subgraphs: Vec<DirectedSubgraph>) -> Self {
        let mut by_location = HashMap::new();
        for subgraph in subgraphs {
            by_location.insert(subgraph.location, subgraph);
        }
        ReadFromGraph {
            graph,
            subgraphs: by_location,
            node_data: vec![NodeData::default(); graph.actions().len()],
            generation: 0,
            loop_condition: Expression::zero(),
        }
    }

    /// Reset every node to "unvisited" in O(1) by bumping the generation.
    pub fn reset(&mut self) {
        self.generation += 3;
    }

    fn is_unvisited(&self, n: ActionId) -> bool {
        self.node_data[n.as_usize()].state <= self.generation
    }

    fn set_followed(&mut self, n: ActionId) {
        self.node_data[n.as_usize()].state = self.generation + 1;
    }

    fn is_followed(&self, n: ActionId) -> bool {
        self.node_data[n.as_usize()].state == self.generation + 1
    }

    fn set_visited(&mut self, n: ActionId) {
        self.node_data[n.as_usize()].state = self.generation + 2;
    }

    fn set_processed(&mut self, n: ActionId) {
        self.node_data[n.as_usize()].state = self.generation + 3;
    }

    fn is_processed(&self, n: ActionId) -> bool {
        self.node_data[n.as_usize()].state == self.generation + 3
    }

    /// Outgoing edges from `node`, following the union of sb/asw/dd/cd
    /// program order and the rf edges implied by the chosen subgraphs:
    /// `(child, is_rf, condition)`.
    fn successors(&self, node: ActionId) -> Vec<(ActionId, bool, Expression)> {
        let mut out = Vec::new();
        // rf edges go first: a read may also be sb-reachable from `node`
        // along the real program-order path (e.g. through an intervening
        // same-location write synchronized back in via release/acquire).
        // Seeding the rf-crossing property before that real path is walked
        // is what lets the intervening write's own node actually see and
        // hide it — discovering the read via sb first would instead leave
        // it fully processed, with nothing yet seeded, by the time the rf
        // edge is considered.
        if self.graph.action(node).is_write() {
            let location = self.graph.action(node).location();
            if let Some(subgraph) = self.subgraphs.get(&location) {
                for (&read, &write) in &subgraph.reads_from {
                    if write == node {
                        out.push((read, true, subgraph.valid.clone()));
                    }
                }
            }
        }
        for ep in self.graph.action(node).endpoints() {
            if !matches!(ep.role, EndPointRole::From) {
                continue;
            }
            let edge = self.graph.edge(ep.edge);
            if edge.edge_type().intersects(EdgeType::SB.union(EdgeType::ASW).union(EdgeType::DD).union(EdgeType::CD)) {
                out.push((ep.other, false, edge.condition().clone()));
            }
        }
        out
    }

    /// Run the DFS over every node, returning the condition under which the
    /// combined sb/rf graph contains a cycle (spec's causal-loop condition).
    pub fn loop_detected(&mut self) -> Expression {
        self.reset();
        self.loop_condition = Expression::zero();
        let nodes: Vec<ActionId> = self.graph.actions().iter().map(|a| a.id()).collect();
        for node in nodes {
            if self.is_unvisited(node) {
                self.dfs(node);
            }
        }
        self.loop_condition.clone()
    }

    /// Visit `node`, seeding and advancing `reads_from`/`release_sequence`/
    /// `causal_loop` properties along the way (spec §4.6-§4.8). Properties
    /// born at an rf edge are seeded directly into the child's (the read's)
    /// `node_data` before the child is recursed into, so they ride along with
    /// whatever that subtree discovers on the way back; every property a
    /// child hands back is rescoped by the edge's condition and folded into
    /// this node's own set via [`crate::property::merge_into`]. A property
    /// that reaches its own `end_point` here is checked against
    /// [`Property::invalidates`] (folding into the global loop condition) and
    /// retired; a release_sequence never retires itself this way since its
    /// travel continues past its own creation point.
    fn dfs(&mut self, node: ActionId) {
        trace!(node = %node, "dfs visit");
        self.set_followed(node);

        let mut gathered: Vec<Property> = std::mem::take(&mut self.node_data[node.as_usize()].properties);

        for (child, is_rf, edge_condition) in self.successors(node) {
            if !self.is_followed(child) && self.is_processed(child) && !contains_relevant_property(self.properties_at(child)) {
                continue;
            }

            if self.is_followed(child) {
                // Back-edge: node -> ... -> child -> node is a cycle. Seed a
                // fresh causal_loop property at `node` for this closed cycle;
                // if the closing edge is itself a non-release/acquire rf
                // crossing, it immediately commits the loop's location.
                let propagator = Propagator::new(self.graph, node, child, is_rf, edge_condition.clone());
                let location = if is_rf && !propagator.rf_rel_acq() { Some(self.graph.action(node).location()) } else { None };
                property::merge_into(&mut gathered, Property::causal_loop(child, edge_condition.clone(), location));
                continue;
            }

            if is_rf {
                let write_location = self.graph.action(node).location();
                let propagator = Propagator::new(self.graph, node, child, true, edge_condition.clone());
                self.node_data[child.as_usize()].properties.push(Property::reads_from(node, Expression::one(), write_location));
                if propagator.rf_acq_but_not_rel() {
                    let store_thread = self.graph.action(node).thread();
                    self.node_data[child.as_usize()].properties.push(Property::release_sequence(child, Expression::one(), write_location, store_thread));
                }
            }

            if self.is_unvisited(child) {
                self.dfs(child);
            }

            for property in self.node_data[child.as_usize()].properties.clone() {
                let mut rescoped = property.rescoped(property.path_condition().multiply(&edge_condition));
                if is_rf && rescoped.kind() == PropertyKind::CausalLoop {
                    let propagator = Propagator::new(self.graph, node, child, true, edge_condition.clone());
                    let crossed_location = self.graph.action(node).location();
                    if !rescoped.advance_causal_loop(crossed_location, propagator.rf_rel_acq()) {
                        continue;
                    }
                }
                property::merge_into(&mut gathered, rescoped);
            }
        }

        let self_propagator = Propagator::new(self.graph, node, node, false, Expression::one());
        let location = self_propagator.current_location();
        if self_propagator.is_store_to(location) {
            let is_release = self_propagator.is_write_rel_to(location);
            debug_assert_eq!(self_propagator.is_non_rel_write(location), !is_release);
            let thread = self_propagator.current_thread();
            for property in gathered.iter_mut() {
                match property.kind() {
                    PropertyKind::ReadsFrom => property.advance_reads_from(location, node),
                    PropertyKind::ReleaseSequence => {
                        let same_thread = property.release_sequence_thread() == Some(thread);
                        property.advance_release_sequence(location, is_release, same_thread);
                    }
                    PropertyKind::CausalLoop => {}
                }
            }
        }

        let mut invalid = Expression::zero();
        for property in &gathered {
            if property.invalidates(node) {
                invalid = invalid.add(property.path_condition());
            }
        }
        self.loop_condition = self.loop_condition.add(&invalid);

        gathered.retain(|p| !(p.end_point() == node && matches!(p.kind(), PropertyKind::CausalLoop | PropertyKind::ReadsFrom)));

        self.node_data[node.as_usize()].properties = gathered;
        self.set_visited(node);
        self.set_processed(node);
    }

    /// The condition accumulated by the last [`Self::loop_detected`] call.
    pub fn loop_condition(&self) -> &Expression {
        &self.loop_condition
    }

    /// Raw access to the properties collected at a node, for diagnostics.
    pub fn properties_at(&self, node: ActionId) -> &[Property] {
        &self.node_data[node.as_usize()].properties
    }
}

/// Whether any property at `node` is still relevant to the search (used to
/// decide whether a visited-but-not-processed node can be skipped).
pub fn contains_relevant_property(properties: &[Property]) -> bool {
    properties.iter().any(Property::is_relevant)
}

/// Convenience: whether any collected property is a broken release sequence,
/// used by the driver to emit a `Verdict::BrokenReleaseSequence` instead of
/// the generic inconsistency verdict.
pub fn has_broken_release_sequence(properties: &[Property]) -> bool {
    properties.iter().any(|p| p.kind() == PropertyKind::ReleaseSequence && p.is_broken_release_sequence())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionKind, MemoryOrder};
    use crate::location::LocationKind;

    #[test]
    fn acyclic_sb_chain_has_no_loop() {
        let mut graph = Graph::new();
        let loc = graph.add_location("x", LocationKind::NonAtomic);
        let t = graph.main_thread();
        let a = graph.add_action(t, loc, ActionKind::NonAtomicWrite, MemoryOrder::SeqCst);
        let b = graph.add_action(t, loc, ActionKind::NonAtomicRead, MemoryOrder::SeqCst);
        graph.add_edge(a, b, EdgeType::SB, Expression::one());
        graph.recompute_all_exists();

        let mut engine = ReadFromGraph::new(&graph, Vec::new());
        assert!(engine.loop_detected().is_zero());
    }

    #[test]
    fn acquire_rf_back_to_dependent_relaxed_write_is_a_loop() {
        // Thread 1: load_relaxed(x) sequenced-before store_release(y).
        // Thread 2: load_acquire(y) sequenced-before store_relaxed(x), with
        // store_release(y) rf-> load_acquire(y) (proper sync, doesn't count)
        // and store_relaxed(x) rf-> load_relaxed(x) (relaxed/relaxed, closes
        // the cycle through a genuine non-release/acquire rf crossing).
        let mut graph = Graph::new();
        let x = graph.add_location("x", LocationKind::Atomic);
        let y = graph.add_location("y", LocationKind::Atomic);
        let t1 = graph.main_thread();
        let t2 = graph.add_thread(t1);

        let load_x = graph.add_action(t1, x, ActionKind::AtomicLoad, MemoryOrder::Relaxed);
        let store_y = graph.add_action(t1, y, ActionKind::AtomicStore, MemoryOrder::Release);
        graph.add_edge(load_x, store_y, EdgeType::SB, Expression::one());

        let load_y = graph.add_action(t2, y, ActionKind::AtomicLoad, MemoryOrder::Acquire);
        let store_x = graph.add_action(t2, x, ActionKind::AtomicStore, MemoryOrder::Relaxed);
        graph.add_edge(load_y, store_x, EdgeType::SB, Expression::one());

        graph.recompute_all_exists();

        let subgraph_x = DirectedSubgraph {
            location: x,
            reads_from: HashMap::from([(load_x, store_x)]),
            modification_order: vec![store_x],
            valid: Expression::one(),
        };
        let subgraph_y = DirectedSubgraph {
            location: y,
            reads_from: HashMap::from([(load_y, store_y)]),
            modification_order: vec![store_y],
            valid: Expression::one(),
        };

        let mut engine = ReadFromGraph::new(&graph, vec![subgraph_x, subgraph_y]);
        let condition = engine.loop_detected();
        assert!(!condition.is_zero());
    }
}
