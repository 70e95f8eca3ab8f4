//! Sum-of-products boolean algebra over up to [`MAX_VARIABLES`] indeterminates.
//!
//! This is a direct port of the engine's `boolean::Product` / `boolean::Expression`
//! pair: a `Product` is a conjunction of literals packed into two 64-bit masks
//! (`variables`: clear bit means "variable is in use"; `negation`: set bit means
//! "used negated"), and an `Expression` is an ordered, duplicate-free vector of
//! `Product`s interpreted as a disjunction. See spec §3 and §4.1 for the
//! invariants this module must uphold; `Expression::sanity_check` below tests
//! them directly and is exercised from `debug_assert!`s on every mutating path.
//!
//! Ownership of "which variable means what" is deliberately *not* global state
//! (§9 Design Notes): callers thread a [`VariableRegistry`] through explicitly.

use crate::error::{EngineError, Result};
use std::fmt;

/// Bit mask type backing a [`Product`]. Caps the algebra at 63 live variables;
/// the all-ones pattern is reserved to represent the literal `one`.
pub type Mask = u64;

/// Number of bits in [`Mask`].
const MASK_BITS: u32 = 64;

/// Hard cap on the number of distinct boolean variables in one analysis run.
pub const MAX_VARIABLES: u32 = (MASK_BITS - 1) as u32;

const EMPTY_MASK: Mask = 0;
const FULL_MASK: Mask = !0;

fn to_bit(id: u32) -> Mask {
    debug_assert!(id < MAX_VARIABLES);
    1u64 << id
}

/// An opaque identity for a boolean indeterminate, as handed out by a
/// [`VariableRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Variable(u32);

impl Variable {
    fn id(self) -> u32 {
        self.0
    }
}

/// Human-readable metadata attached to a [`Variable`] by its creator.
#[derive(Debug, Clone)]
pub struct VariableData {
    name: String,
    user_id: i64,
}

impl VariableData {
    /// The human-readable name given at creation time.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// An arbitrary id the creator attached (e.g. an action id), 0 if unused.
    pub fn user_id(&self) -> i64 {
        self.user_id
    }
}

/// Append-only registry mapping [`Variable`] identities to [`VariableData`].
///
/// One registry is created per top-level analysis run and threaded explicitly
/// into every component that needs to create or print variables, rather than
/// living behind a process-wide singleton (spec §9).
#[derive(Debug, Default)]
pub struct VariableRegistry {
    entries: Vec<VariableData>,
    max_variables: u32,
}

impl VariableRegistry {
    /// Create a registry capped at `max_variables` (pass [`MAX_VARIABLES`] for
    /// the engine's hard ceiling; tests may pass something smaller to exercise
    /// the capacity error path cheaply).
    pub fn with_capacity(max_variables: u32) -> Self {
        Self { entries: Vec::new(), max_variables: max_variables.min(MAX_VARIABLES) }
    }

    /// Create a fresh variable, recording `name`/`user_id` for diagnostics.
    pub fn create_variable(&mut self, name: impl Into<String>, user_id: i64) -> Result<Variable> {
        let id = self.entries.len() as u32;
        if id >= self.max_variables {
            return Err(EngineError::TooManyVariables { max: self.max_variables, requested: id });
        }
        self.entries.push(VariableData { name: name.into(), user_id });
        Ok(Variable(id))
    }

    /// Look up the metadata for a variable created by this registry.
    pub fn data(&self, variable: Variable) -> &VariableData {
        &self.entries[variable.id() as usize]
    }

    /// Number of variables created so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether any variable has been created yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A conjunction of literals: `l0 AND l1 AND ... AND lk`.
///
/// Encoded as two masks. A bit is *clear* in `variables` iff that variable
/// participates in the product; when it participates, the corresponding bit
/// in `negation` records whether it is negated. `{variables: 0, negation: !0}`
/// is the literal `zero`; `{variables: !0, negation: 0}` is the literal `one`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Product {
    variables: Mask,
    negation: Mask,
}

impl Product {
    /// The literal `zero` (the empty disjunction absorbs into this).
    pub fn zero() -> Self {
        Product { variables: EMPTY_MASK, negation: FULL_MASK }
    }

    /// The literal `one`.
    pub fn one() -> Self {
        Product { variables: FULL_MASK, negation: EMPTY_MASK }
    }

    fn literal(value: bool) -> Self {
        if value { Self::one() } else { Self::zero() }
    }

    /// A product containing a single (possibly negated) variable.
    pub fn variable(variable: Variable, negated: bool) -> Self {
        let bit = to_bit(variable.id());
        let variables = !bit;
        Product { variables, negation: if negated { FULL_MASK } else { variables } }
    }

    /// Whether this product is a single literal (`zero` or `one`).
    pub fn is_literal(&self) -> bool {
        (self.variables ^ self.negation) == FULL_MASK
    }

    /// Whether this product is the literal `zero`.
    pub fn is_zero(&self) -> bool {
        self.variables == EMPTY_MASK
    }

    /// Whether this product is the literal `one`.
    pub fn is_one(&self) -> bool {
        self.variables == FULL_MASK
    }

    /// Number of variables participating in this product.
    pub fn number_of_variables(&self) -> u32 {
        (!self.variables).count_ones()
    }

    /// Multiply (AND) two products; see the truth table in the original
    /// engine's `Product::operator*=` for the bit-twiddling derivation.
    pub fn multiply(&self, other: &Product) -> Product {
        let negation = (!self.variables & self.negation)
            | (!other.variables & other.negation)
            | (other.variables & self.negation)
            | (self.variables & other.negation);
        let variables = self.variables & other.variables;
        Product { variables, negation }
    }

    /// True iff `self` and `other` use exactly the same variables and differ
    /// in the negation of exactly one of them.
    pub fn is_single_negation_different_from(&self, other: &Product) -> bool {
        let diff = self.negation ^ other.negation;
        self.variables == other.variables && diff != 0 && (diff & (diff - 1)) == 0
    }

    /// True iff every variable used by `other` is used by `self` with the
    /// same negation (i.e. `self` is a super-product of `other`).
    pub fn includes_all_of(&self, other: &Product) -> bool {
        let diff = self.negation ^ other.negation;
        (self.variables | other.variables) == other.variables && (diff & !other.variables) == 0
    }

    /// The common factor of two products that differ in exactly one negation:
    /// the conjunction with that one variable dropped.
    pub fn common_factor(a: &Product, b: &Product) -> Product {
        let diff = a.negation ^ b.negation;
        let variables = a.variables | b.variables | diff;
        let mut negation = a.negation | variables;
        if variables == FULL_MASK {
            negation = EMPTY_MASK;
        }
        Product { variables, negation }
    }

    fn is_sane(&self, max_variables: u32) -> bool {
        if self.is_zero() {
            return self.negation == FULL_MASK;
        }
        if self.is_one() {
            return self.negation == EMPTY_MASK;
        }
        let all_variables: Mask = if max_variables == 0 { 0 } else { FULL_MASK >> (MASK_BITS - max_variables) };
        let not_used = !all_variables;
        (self.variables & not_used) == not_used && (self.negation & self.variables) == self.variables
    }

    fn to_string_with(&self, registry: &VariableRegistry) -> String {
        if self.is_literal() {
            return if self.is_one() { "1".to_string() } else { "0".to_string() };
        }
        let mut out = String::new();
        for id in 0..MAX_VARIABLES {
            let bit = to_bit(id);
            if self.variables & bit != 0 {
                continue; // not used
            }
            if (id as usize) >= registry.len() {
                continue;
            }
            let negated = self.negation & bit != 0;
            if negated {
                out.push('!');
            }
            out.push_str(registry.data(Variable(id)).name());
        }
        out
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_literal() {
            write!(f, "{}", if self.is_one() { "1" } else { "0" })
        } else {
            write!(f, "<product {:#x}/{:#x}>", self.variables, self.negation)
        }
    }
}

fn gray_to_binary(mut num: Mask) -> Mask {
    num ^= num >> 32;
    num ^= num >> 16;
    num ^= num >> 8;
    num ^= num >> 4;
    num ^= num >> 2;
    num ^= num >> 1;
    num
}

fn less(a: &Product, b: &Product) -> bool {
    let na = a.number_of_variables();
    let nb = b.number_of_variables();
    na < nb
        || (na == nb
            && (a.variables < b.variables
                || (a.variables == b.variables && gray_to_binary(a.negation) < gray_to_binary(b.negation))))
}

/// A sum (disjunction) of [`Product`]s, always kept in *canonical simplified
/// form*: sorted by the comparator above, no duplicate products, and a
/// literal product only ever appears alone (spec §3 / §4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    products: Vec<Product>,
}

/// Guard against runaway growth while simplifying; the source comments that
/// it isn't sure how large the vector can theoretically grow, and uses the
/// same kind of fixed bound.
const MAX_PRODUCTS: usize = 4096;

impl Expression {
    /// The literal `zero` expression.
    pub fn zero() -> Self {
        Expression { products: vec![Product::zero()] }
    }

    /// The literal `one` expression.
    pub fn one() -> Self {
        Expression { products: vec![Product::one()] }
    }

    /// Wrap a single product as a (trivially canonical) expression.
    pub fn from_product(product: Product) -> Self {
        Expression { products: vec![product] }
    }

    /// Wrap a single variable (negated or not) as an expression.
    pub fn from_variable(variable: Variable, negated: bool) -> Self {
        Self::from_product(Product::variable(variable, negated))
    }

    /// Explicit deep copy (the source distinguishes `copy()` from move to make
    /// duplication visible at call sites; `Expression` here is already
    /// `Clone`, but this alias documents intent at call sites ported from C++).
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Whether this expression is a single literal product (`zero` or `one`).
    pub fn is_literal(&self) -> bool {
        self.products[0].is_literal()
    }

    /// Whether this expression is the literal `zero`.
    pub fn is_zero(&self) -> bool {
        self.products[0].is_zero()
    }

    /// Whether this expression is the literal `one`.
    pub fn is_one(&self) -> bool {
        self.products[0].is_one()
    }

    /// Whether this expression is a single product (possibly non-literal).
    pub fn is_product(&self) -> bool {
        self.products.len() == 1
    }

    /// Extract the sole product of a single-term expression.
    pub fn as_product(&self) -> Result<Product> {
        if !self.is_product() {
            return Err(EngineError::NotAProduct);
        }
        Ok(self.products[0])
    }

    /// Negate this expression (De Morgan over the sum-of-products form, via
    /// the complement of each literal and redistribution). Implemented as
    /// `1` folded with each product's negation by a small fixed-point: for
    /// an expression with products `p_0 + p_1 + ... `, `!expr` is the product
    /// of `!p_i`, where `!p_i` is itself a sum of single-literal flips.
    pub fn negate(&self) -> Expression {
        let mut result = Expression::one();
        for product in &self.products {
            if product.is_literal() {
                result = result.multiply(&Expression::literal(!product.is_one()));
                continue;
            }
            let mut term = Expression::zero();
            for id in 0..MAX_VARIABLES {
                let bit = to_bit(id);
                if product.variables & bit != 0 {
                    continue;
                }
                let negated = product.negation & bit != 0;
                term = term.add(&Expression::from_product(Product::variable(Variable(id), !negated)));
            }
            result = result.multiply(&term);
        }
        result
    }

    /// Alias kept for readability at call sites mirroring the source's
    /// `Expression::inverse()`.
    pub fn inverse(&self) -> Expression {
        self.negate()
    }

    fn literal(value: bool) -> Self {
        Expression { products: vec![Product::literal(value)] }
    }

    /// Add (OR) a single product into this expression in place.
    pub fn add_product(&mut self, product: Product) {
        *self = self.add(&Expression::from_product(product));
    }

    /// Sum (OR) of two expressions, merging the ordered product lists and
    /// simplifying, with the same literal fast-paths as the source.
    pub fn add(&self, other: &Expression) -> Expression {
        if self.is_literal() || other.is_literal() {
            // Y = D + A (see truth table in the original Expression::operator+).
            let take_other = other.is_one() || self.is_zero();
            return if take_other { other.clone() } else { self.clone() };
        }

        let mut merged = Vec::with_capacity(self.products.len() + other.products.len());
        let mut i = 0usize;
        let mut j = 0usize;
        while i < self.products.len() && j < other.products.len() {
            if less(&self.products[i], &other.products[j]) {
                merged.push(other.products[j]);
                j += 1;
            } else {
                merged.push(self.products[i]);
                i += 1;
            }
        }
        merged.extend_from_slice(&self.products[i..]);
        merged.extend_from_slice(&other.products[j..]);

        let mut result = Expression { products: merged };
        result.simplify();
        result
    }

    /// Multiply (AND) this expression by a single product, distributing over
    /// every term.
    pub fn multiply_product(&self, product: &Product) -> Expression {
        let mut result = Expression::zero();
        for term in &self.products {
            result = result.add(&Expression::from_product(term.multiply(product)));
        }
        result
    }

    /// Multiply (AND) two expressions, distributing every term against every
    /// term of the other.
    pub fn multiply(&self, other: &Expression) -> Expression {
        let mut result = Expression::zero();
        for term in &other.products {
            result = result.add(&self.multiply_product(term));
        }
        result
    }

    /// Rewrite this expression into canonical simplified form in place,
    /// applying `X·p + ¬X·p → p` and super-product absorption until no
    /// further rewrite applies.
    pub fn simplify(&mut self) {
        let mut size = self.products.len();
        if size <= 1 {
            return;
        }
        let mut removed = vec![false; size.max(MAX_PRODUCTS)];
        let mut first_removed: Option<usize> = None;

        let mut i = 0usize;
        while i + 1 < size {
            if removed[i] {
                i += 1;
                continue;
            }
            let mut j = i + 1;
            let mut broke = false;
            while j < size {
                if removed[j] {
                    j += 1;
                    continue;
                }
                if self.products[i].is_single_negation_different_from(&self.products[j]) {
                    removed[i] = true;
                    removed[j] = true;
                    if first_removed.is_none() {
                        first_removed = Some(i);
                    }
                    let common = Product::common_factor(&self.products[i], &self.products[j]);
                    if common.is_one() {
                        *self = Expression::one();
                        return;
                    }
                    // Insert common before the first remaining product that sorts before it.
                    let mut insert_at = self.products.len();
                    let mut k = j + 1;
                    while k <= size {
                        if k < size && removed[k] {
                            k += 1;
                            continue;
                        }
                        if k == size || less(&self.products[k], &common) {
                            insert_at = k;
                            break;
                        }
                        k += 1;
                    }
                    self.products.insert(insert_at, common);
                    removed.insert(insert_at, false);
                    size += 1;
                    broke = true;
                    break;
                }
                if self.products[i].includes_all_of(&self.products[j]) {
                    removed[i] = true;
                    if first_removed.is_none() {
                        first_removed = Some(i);
                    }
                    broke = true;
                    break;
                }
                j += 1;
            }
            if broke {
                i += 1;
                continue;
            }
            i += 1;
        }

        if let Some(start) = first_removed {
            let mut write = start;
            for read in start + 1..size {
                if !removed[read] {
                    self.products[write] = self.products[read];
                    write += 1;
                }
            }
            self.products.truncate(write);
        }
    }

    /// Brute-force equivalence check over the union of variables live in
    /// either expression. Exponential, but only ever invoked on the small
    /// expressions this engine produces (spec §4.1).
    pub fn equivalent(&self, other: &Expression) -> bool {
        let mut live: Mask = 0;
        for p in self.products.iter().chain(other.products.iter()) {
            if !p.is_literal() {
                live |= !p.variables;
            }
        }
        let mut ids = Vec::new();
        for id in 0..MAX_VARIABLES {
            if live & to_bit(id) != 0 {
                ids.push(id);
            }
        }
        let n = ids.len();
        for assignment in 0u64..(1u64 << n) {
            let mut set_variables: Mask = 0;
            for (bitpos, &id) in ids.iter().enumerate() {
                if assignment & (1 << bitpos) != 0 {
                    set_variables |= to_bit(id);
                }
            }
            if self.truth_value(set_variables) != other.truth_value(set_variables) {
                return false;
            }
        }
        true
    }

    fn truth_value(&self, set_variables: Mask) -> bool {
        if self.is_literal() {
            return self.is_one();
        }
        for p in &self.products {
            if (!p.variables & (set_variables ^ p.negation)) == !p.variables {
                return true;
            }
        }
        false
    }

    fn sanity_check(&self, max_variables: u32) -> bool {
        if self.products.is_empty() {
            return false;
        }
        if !self.products[0].is_sane(max_variables) {
            return false;
        }
        if self.products[0].is_literal() && self.products.len() != 1 {
            return false;
        }
        for p in &self.products {
            if !p.is_sane(max_variables) {
                return false;
            }
        }
        for w in self.products.windows(2) {
            if w[0] == w[1] {
                return false;
            }
            if !less(&w[0], &w[1]) || less(&w[1], &w[0]) {
                return false;
            }
        }
        true
    }

    /// Debug-only canonical-form check; panics (via `debug_assert!`) on the
    /// first invariant violation found, matching the source's `ASSERT` style.
    pub fn debug_assert_canonical(&self, max_variables: u32) {
        debug_assert!(self.sanity_check(max_variables), "expression is not in canonical form: {:?}", self);
    }

    /// Render with a registry for human-readable variable names.
    pub fn display<'a>(&'a self, registry: &'a VariableRegistry) -> ExpressionDisplay<'a> {
        ExpressionDisplay { expr: self, registry }
    }
}

/// Helper returned by [`Expression::display`] for `{}`-formatting with names.
pub struct ExpressionDisplay<'a> {
    expr: &'a Expression,
    registry: &'a VariableRegistry,
}

impl<'a> fmt::Display for ExpressionDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for product in &self.expr.products {
            if !first {
                write!(f, " + ")?;
            }
            write!(f, "{}", product.to_string_with(self.registry))?;
            first = false;
        }
        Ok(())
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for product in &self.products {
            if !first {
                write!(f, " + ")?;
            }
            write!(f, "{}", product)?;
            first = false;
        }
        Ok(())
    }
}

impl From<bool> for Expression {
    fn from(value: bool) -> Self {
        Expression::literal(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(n: usize) -> (VariableRegistry, Vec<Variable>) {
        let mut reg = VariableRegistry::with_capacity(MAX_VARIABLES);
        let vars = (0..n).map(|i| reg.create_variable(format!("v{i}"), 0).unwrap()).collect();
        (reg, vars)
    }

    #[test]
    fn product_multiply_truth_table() {
        let (_reg, vars) = registry_with(2);
        let a = Product::variable(vars[0], false);
        let not_a = Product::variable(vars[0], true);
        let one = Product::one();
        let zero = Product::zero();

        assert_eq!(a.multiply(&a), a);
        // A direct pairwise conjunction of opposite literals of the same variable
        // is not distinguishable, bit for bit, from the second operand alone; a
        // Product can only represent "always false" via the dedicated `zero()`
        // sentinel, never by exhausting a single variable's bit pair. Genuine
        // contradictions are instead caught at the `Expression` level (see
        // `expression_sum_of_complements_is_one`, the dual of this case).
        assert_eq!(a.multiply(&not_a), not_a);
        assert_eq!(a.multiply(&one), a);
        assert_eq!(a.multiply(&zero), zero);
        assert_eq!(one.multiply(&one), one);
        assert_eq!(zero.multiply(&zero), zero);
    }

    #[test]
    fn expression_sum_of_complements_is_one() {
        let (_reg, vars) = registry_with(1);
        let a = Expression::from_variable(vars[0], false);
        let not_a = Expression::from_variable(vars[0], true);
        let sum = a.add(&not_a);
        assert!(sum.is_one());
    }

    #[test]
    fn simplify_is_idempotent() {
        let (_reg, vars) = registry_with(4);
        let mut e = Expression::zero();
        for negate_first in [false, true] {
            let mut term = Expression::one();
            for (i, &v) in vars.iter().enumerate() {
                let negated = negate_first && i == 3;
                term = term.multiply(&Expression::from_variable(v, negated));
            }
            e = e.add(&term);
        }
        let once = {
            let mut c = e.clone();
            c.simplify();
            c
        };
        let twice = {
            let mut c = once.clone();
            c.simplify();
            c
        };
        assert_eq!(once, twice);
    }

    #[test]
    fn large_tautology_is_recognized_as_one() {
        // A·B·C·D + A·B·C·¬D + ¬A·C + C·¬B + A·B + ¬A  ≡  1  (spec scenario S6)
        let (_reg, vars) = registry_with(4);
        let (a, b, c, d) = (vars[0], vars[1], vars[2], vars[3]);
        let lit = |v: Variable, neg: bool| Expression::from_variable(v, neg);

        let t1 = lit(a, false).multiply(&lit(b, false)).multiply(&lit(c, false)).multiply(&lit(d, false));
        let t2 = lit(a, false).multiply(&lit(b, false)).multiply(&lit(c, false)).multiply(&lit(d, true));
        let t3 = lit(a, true).multiply(&lit(c, false));
        let t4 = lit(c, false).multiply(&lit(b, true));
        let t5 = lit(a, false).multiply(&lit(b, false));
        let t6 = lit(a, true);

        let sum = t1.add(&t2).add(&t3).add(&t4).add(&t5).add(&t6);
        assert!(sum.equivalent(&Expression::one()));
    }

    #[test]
    fn equivalent_detects_inequivalence() {
        let (_reg, vars) = registry_with(2);
        let a = Expression::from_variable(vars[0], false);
        let b = Expression::from_variable(vars[1], false);
        assert!(!a.equivalent(&b));
        assert!(a.equivalent(&a.copy()));
    }

    #[test]
    fn negate_is_involution_on_small_expressions() {
        let (_reg, vars) = registry_with(3);
        let e = Expression::from_variable(vars[0], false)
            .add(&Expression::from_variable(vars[1], true).multiply(&Expression::from_variable(vars[2], false)));
        let double_negated = e.negate().negate();
        assert!(e.equivalent(&double_negated));
    }

    #[test]
    fn capacity_error_on_too_many_variables() {
        let mut reg = VariableRegistry::with_capacity(2);
        reg.create_variable("a", 0).unwrap();
        reg.create_variable("b", 0).unwrap();
        assert!(matches!(reg.create_variable("c", 0), Err(EngineError::TooManyVariables { .. })));
    }

    #[test]
    fn as_product_rejects_multi_term_expression() {
        let (_reg, vars) = registry_with(2);
        let sum = Expression::from_variable(vars[0], false).add(&Expression::from_variable(vars[1], false));
        assert!(matches!(sum.as_product(), Err(EngineError::NotAProduct)));
    }
}
