//! Conditionals and branches: turning `if`/`?:`/loop-exit tests in the
//! subject program into fresh boolean variables that gate whichever actions
//! and edges are created "inside" a branch.
//!
//! Grounded in `original_source/src/{Conditional,Branch,BranchInfo}.h`. Each
//! source conditional expression becomes exactly one [`Conditional`], owning
//! one fresh [`crate::boolean::Variable`]; taking the true/false arm of it is
//! represented by a [`Branch`], which multiplies a literal of that variable
//! into everything built while the branch is "current" (tracked by
//! [`BranchInfo`] for the duration of one selection statement).

use crate::boolean::{Expression, Product, Variable, VariableRegistry};
use crate::error::Result;
use std::fmt;

/// Stable id for a [`Conditional`], assigned in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConditionalId(pub(crate) u32);

impl fmt::Display for ConditionalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cond{}", self.0)
    }
}

/// One source-level conditional expression (the test of an `if`, `?:`, or
/// loop condition), paired with the fresh boolean variable that represents
/// "this test evaluated true" in every existence/validity expression that
/// depends on it.
#[derive(Debug, Clone, Copy)]
pub struct Conditional {
    id: ConditionalId,
    variable: Variable,
}

impl Conditional {
    /// Allocate a new conditional and its backing boolean variable.
    pub fn new(id: ConditionalId, registry: &mut VariableRegistry) -> Result<Self> {
        let variable = registry.create_variable(id.to_string(), id.0 as i64)?;
        Ok(Conditional { id, variable })
    }

    /// This conditional's id.
    pub fn id(&self) -> ConditionalId {
        self.id
    }

    /// The boolean variable representing "this conditional is true".
    pub fn variable(&self) -> Variable {
        self.variable
    }

    /// The [`Branch`] taken when this conditional evaluates to `taken_true`.
    pub fn branch(&self, taken_true: bool) -> Branch {
        Branch { conditional: *self, taken_true }
    }
}

/// A wrapper around a [`Conditional`] plus which arm was taken. Multiplying a
/// [`Branch`]'s [`Product`] into an action's or edge's condition is how the
/// graph builder scopes that action/edge to "only exists inside this arm".
#[derive(Debug, Clone, Copy)]
pub struct Branch {
    conditional: Conditional,
    taken_true: bool,
}

impl Branch {
    /// The conditional this branch depends on.
    pub fn conditional(&self) -> Conditional {
        self.conditional
    }

    /// Whether this is the true arm.
    pub fn is_true_branch(&self) -> bool {
        self.taken_true
    }

    /// The single-literal product representing this branch (the variable, or
    /// its negation for the false arm).
    pub fn boolean_product(&self) -> Product {
        Product::variable(self.conditional.variable(), !self.taken_true)
    }

    /// Same, wrapped as an [`Expression`] for direct use in `add`/`multiply`.
    pub fn boolean_expression(&self) -> Expression {
        Expression::from_product(self.boolean_product())
    }
}

/// Bookkeeping for one selection statement (`if`/`if-else`) while the graph
/// builder is walking its true- and false-branch bodies.
///
/// Mirrors `BranchInfo`'s role: tracks which arm is "current" and whether the
/// edge from the conditional expression into that arm's first action has
/// already been added (so it's added exactly once, at the first action of
/// the branch, not at every action created inside it).
#[derive(Debug, Clone)]
pub struct BranchInfo {
    conditional: Conditional,
    in_true_branch: bool,
    edge_to_true_branch_added: bool,
    edge_to_false_branch_added: bool,
}

impl BranchInfo {
    /// Begin walking the true branch of `conditional`.
    pub fn begin_true_branch(conditional: Conditional) -> Self {
        BranchInfo {
            conditional,
            in_true_branch: true,
            edge_to_true_branch_added: false,
            edge_to_false_branch_added: false,
        }
    }

    /// Switch from the true branch to the false branch of the same
    /// conditional (called when the builder reaches the `else`).
    pub fn begin_false_branch(&mut self) {
        self.in_true_branch = false;
    }

    /// The branch currently being walked.
    pub fn current_branch(&self) -> Branch {
        self.conditional.branch(self.in_true_branch)
    }

    /// The branch that was *not* taken (used when wiring a merge point that
    /// needs both arms' conditions).
    pub fn negated_branch(&self) -> Branch {
        self.conditional.branch(!self.in_true_branch)
    }

    /// Record that the entry edge into the current branch has been added.
    pub fn mark_edge_from_conditional_added(&mut self) {
        if self.in_true_branch {
            self.edge_to_true_branch_added = true;
        } else {
            self.edge_to_false_branch_added = true;
        }
    }

    /// Whether the entry edge for the current branch has already been added.
    pub fn conditional_edge_of_current_branch_added(&self) -> bool {
        if self.in_true_branch { self.edge_to_true_branch_added } else { self.edge_to_false_branch_added }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_products_are_complementary() {
        let mut registry = VariableRegistry::with_capacity(8);
        let cond = Conditional::new(ConditionalId(0), &mut registry).unwrap();
        let true_branch = cond.branch(true);
        let false_branch = cond.branch(false);
        let sum = true_branch.boolean_expression().add(&false_branch.boolean_expression());
        assert!(sum.is_one());
    }

    #[test]
    fn branch_info_tracks_entry_edge_per_arm() {
        let mut registry = VariableRegistry::with_capacity(8);
        let cond = Conditional::new(ConditionalId(0), &mut registry).unwrap();
        let mut info = BranchInfo::begin_true_branch(cond);
        assert!(!info.conditional_edge_of_current_branch_added());
        info.mark_edge_from_conditional_added();
        assert!(info.conditional_edge_of_current_branch_added());

        info.begin_false_branch();
        assert!(!info.conditional_edge_of_current_branch_added());
    }
}
