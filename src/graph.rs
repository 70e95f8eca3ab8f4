//! The opsem graph: an arena of [`Action`]s, [`Edge`]s, [`Location`]s and
//! [`Thread`]s, plus existence-expression propagation.
//!
//! Ported from `original_source/src/Graph.h`, re-architected per spec §9
//! Design Notes: nodes and edges live in flat `Vec`s addressed by stable
//! index-based ids rather than `std::set<Node>` iterators, and each action
//! carries its own small vector of [`EndPoint`]s instead of edges being
//! discovered by re-scanning the node set.

use crate::action::{Action, ActionId, ActionKind, MemoryOrder};
use crate::boolean::{Expression, VariableRegistry};
use crate::edge::{Edge, EdgeId, EdgeType, EndPoint, EndPointRole};
use crate::error::{EngineError, Result};
use crate::location::{Location, LocationId, LocationKind};
use crate::thread::{Thread, ThreadId};
use tracing::trace;

/// The full opsem graph for one subject program.
#[derive(Debug, Default)]
pub struct Graph {
    threads: Vec<Thread>,
    locations: Vec<Location>,
    actions: Vec<Action>,
    edges: Vec<Edge>,
    /// Cached existence expression per action, recomputed by `update_exists`.
    exists: Vec<Expression>,
}

impl Graph {
    /// An empty graph with just the main thread.
    pub fn new() -> Self {
        let mut graph = Graph::default();
        graph.threads.push(Thread::new_root(ThreadId(0)));
        graph
    }

    /// The main thread's id.
    pub fn main_thread(&self) -> ThreadId {
        ThreadId(0)
    }

    /// Fork a new thread as a child of `parent`.
    pub fn add_thread(&mut self, parent: ThreadId) -> ThreadId {
        let id = ThreadId(self.threads.len() as u32);
        self.threads.push(Thread::new_child(id, parent));
        self.threads[parent.as_usize()].record_child(id);
        id
    }

    /// Mark `thread` as joined (its last action gets an asw edge to the join
    /// point; wiring that edge is the caller's job via [`Self::add_edge`]).
    pub fn mark_joined(&mut self, thread: ThreadId) -> Result<()> {
        self.thread_mut(thread)?.mark_joined();
        Ok(())
    }

    fn thread_mut(&mut self, id: ThreadId) -> Result<&mut Thread> {
        self.threads.get_mut(id.as_usize()).ok_or(EngineError::UnknownThread(id))
    }

    /// Read-only access to a thread's bookkeeping.
    pub fn thread(&self, id: ThreadId) -> Result<&Thread> {
        self.threads.get(id.as_usize()).ok_or(EngineError::UnknownThread(id))
    }

    /// Declare a new location.
    pub fn add_location(&mut self, name: impl Into<String>, kind: LocationKind) -> LocationId {
        let id = LocationId(self.locations.len() as u32);
        self.locations.push(Location::new(id, name, kind));
        id
    }

    /// Read-only access to a location.
    pub fn location(&self, id: LocationId) -> Result<&Location> {
        self.locations.get(id.as_usize()).ok_or(EngineError::UnknownLocation(id))
    }

    /// All locations, in creation order.
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    /// Add a new action to `thread` touching `location`, with an initial
    /// existence condition of `one` (the caller multiplies in the enclosing
    /// branch's condition separately via [`Self::set_exists_condition`] if
    /// the action was built inside a conditional branch).
    pub fn add_action(&mut self, thread: ThreadId, location: LocationId, kind: ActionKind, memory_order: MemoryOrder) -> ActionId {
        let id = ActionId(self.actions.len() as u32);
        self.actions.push(Action::new(id, thread, location, kind, memory_order));
        self.exists.push(Expression::zero());
        id
    }

    /// Read-only access to an action.
    pub fn action(&self, id: ActionId) -> &Action {
        &self.actions[id.as_usize()]
    }

    /// All actions, in creation order (also their topological sequence
    /// number within the graph, since sb edges are only ever added forward).
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Add an sb or asw edge from `from` to `to`, gated by `condition`
    /// (typically `Expression::one()` unless the edge was created inside a
    /// conditional branch).
    pub fn add_edge(&mut self, from: ActionId, to: ActionId, edge_type: EdgeType, condition: Expression) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Edge::new(id, from, to, edge_type, condition));

        let from_is_write = self.actions[from.as_usize()].is_write();
        let to_is_write = self.actions[to.as_usize()].is_write();

        if edge_type.intersects(EdgeType::SB.union(EdgeType::ASW)) {
            let from_sb = self.actions[from.as_usize()].sb_info();
            self.actions[to.as_usize()].sb_info_mut().record_sequenced_after(from_is_write, from_sb);
            let to_sb = self.actions[to.as_usize()].sb_info();
            self.actions[from.as_usize()].sb_info_mut().record_sequenced_before(to_is_write, to_sb);
        }

        self.actions[from.as_usize()].push_endpoint(EndPoint { edge: id, role: EndPointRole::From, other: to });
        self.actions[to.as_usize()].push_endpoint(EndPoint { edge: id, role: EndPointRole::To, other: from });
        id
    }

    /// All edges, in creation order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Read-only access to an edge.
    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.0 as usize]
    }

    /// The cached existence expression for `action` (call
    /// [`Self::recompute_all_exists`] first if the graph has just been built
    /// or mutated).
    pub fn exists(&self, action: ActionId) -> &Expression {
        &self.exists[action.as_usize()]
    }

    /// Recompute `exists` for every action in creation order: since sb/asw
    /// edges only ever point from an earlier-created action to a later one,
    /// a single forward pass is a fixed point (spec §4.2). The main thread's
    /// first action always exists unconditionally.
    pub fn recompute_all_exists(&mut self) {
        let ids: Vec<ActionId> = self.actions.iter().map(|a| a.id()).collect();
        for id in ids {
            self.update_exists(id);
        }
    }

    /// Recompute the existence expression of a single action as the
    /// disjunction of `edge.condition ∧ source.exists` over its incoming
    /// sb/asw edges, or `one` if it has none (the thread-entry action).
    fn update_exists(&mut self, action: ActionId) {
        let incoming: Vec<(Expression, ActionId)> = self.actions[action.as_usize()]
            .endpoints()
            .iter()
            .filter(|ep| matches!(ep.role, EndPointRole::To))
            .filter_map(|ep| {
                let edge = &self.edges[ep.edge.0 as usize];
                if edge.edge_type().intersects(EdgeType::SB.union(EdgeType::ASW)) {
                    Some((edge.condition().clone(), ep.other))
                } else {
                    None
                }
            })
            .collect();

        let new_exists = if incoming.is_empty() {
            Expression::one()
        } else {
            let mut sum = Expression::zero();
            for (condition, source) in incoming {
                let source_exists = self.exists[source.as_usize()].clone();
                sum = sum.add(&condition.multiply(&source_exists));
            }
            sum
        };

        let changed = !new_exists.equivalent(&self.exists[action.as_usize()]);
        trace!(action = %action, changed, "update_exists");
        self.exists[action.as_usize()] = new_exists;
        self.actions[action.as_usize()].mark_exists_computed();

        if changed {
            let outgoing: Vec<ActionId> = self.actions[action.as_usize()]
                .endpoints()
                .iter()
                .filter(|ep| matches!(ep.role, EndPointRole::From))
                .filter_map(|ep| {
                    let edge = &self.edges[ep.edge.0 as usize];
                    edge.edge_type().intersects(EdgeType::SB.union(EdgeType::ASW)).then_some(ep.other)
                })
                .collect();
            for next in outgoing {
                self.update_exists(next);
            }
        }
    }

    /// Whether `a` can see `b` via a chain of sb/asw edges (ignoring
    /// conditions) — used by `ReadFromLoop` to decide reachability before it
    /// even needs the finer-grained conditions.
    pub fn sb_reaches(&self, from: ActionId, to: ActionId) -> bool {
        if from == to {
            return true;
        }
        let mut stack = vec![from];
        let mut seen = vec![false; self.actions.len()];
        seen[from.as_usize()] = true;
        while let Some(current) = stack.pop() {
            for ep in self.actions[current.as_usize()].endpoints() {
                if !matches!(ep.role, EndPointRole::From) {
                    continue;
                }
                let edge = &self.edges[ep.edge.0 as usize];
                if !edge.edge_type().intersects(EdgeType::SB.union(EdgeType::ASW)) {
                    continue;
                }
                if ep.other == to {
                    return true;
                }
                if !seen[ep.other.as_usize()] {
                    seen[ep.other.as_usize()] = true;
                    stack.push(ep.other);
                }
            }
        }
        false
    }
}

/// Minimal builder state threaded while constructing a `Graph`: owns the
/// variable registry so conditional branches can allocate fresh variables as
/// they're encountered (spec §4.3).
pub struct GraphBuilder {
    pub graph: Graph,
    pub variables: VariableRegistry,
}

impl GraphBuilder {
    /// A fresh builder with an empty graph and variable registry capped at
    /// `max_variables`.
    pub fn new(max_variables: u32) -> Self {
        GraphBuilder { graph: Graph::new(), variables: VariableRegistry::with_capacity(max_variables) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_action_exists_unconditionally() {
        let mut graph = Graph::new();
        let loc = graph.add_location("x", LocationKind::NonAtomic);
        let a = graph.add_action(graph.main_thread(), loc, ActionKind::NonAtomicWrite, MemoryOrder::SeqCst);
        graph.recompute_all_exists();
        assert!(graph.exists(a).is_one());
    }

    #[test]
    fn conditional_chain_propagates_exists() {
        let mut graph = Graph::new();
        let loc = graph.add_location("x", LocationKind::NonAtomic);
        let mut registry = VariableRegistry::with_capacity(8);
        let var = registry.create_variable("c", 0).unwrap();

        let entry = graph.add_action(graph.main_thread(), loc, ActionKind::NonAtomicWrite, MemoryOrder::SeqCst);
        let inside_branch = graph.add_action(graph.main_thread(), loc, ActionKind::NonAtomicWrite, MemoryOrder::SeqCst);

        let branch_condition = Expression::from_variable(var, false);
        graph.add_edge(entry, inside_branch, EdgeType::SB, branch_condition.clone());
        graph.recompute_all_exists();

        assert!(graph.exists(inside_branch).equivalent(&branch_condition));
    }

    #[test]
    fn sb_reaches_transitively() {
        let mut graph = Graph::new();
        let loc = graph.add_location("x", LocationKind::NonAtomic);
        let a = graph.add_action(graph.main_thread(), loc, ActionKind::NonAtomicWrite, MemoryOrder::SeqCst);
        let b = graph.add_action(graph.main_thread(), loc, ActionKind::NonAtomicRead, MemoryOrder::SeqCst);
        let c = graph.add_action(graph.main_thread(), loc, ActionKind::NonAtomicRead, MemoryOrder::SeqCst);
        graph.add_edge(a, b, EdgeType::SB, Expression::one());
        graph.add_edge(b, c, EdgeType::SB, Expression::one());
        assert!(graph.sb_reaches(a, c));
        assert!(!graph.sb_reaches(c, a));
    }
}
