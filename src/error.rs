//! Crate-wide error taxonomy.
//!
//! Mirrors the teacher's per-module `thiserror` enums (`StreamError`,
//! `AirError`, `QuotientError`): usage and capacity errors are things a
//! caller of this crate can hit and must handle; invariant violations
//! indicate a bug in the engine itself rather than in the analyzed program
//! (see spec §7 — analysis verdicts like "causal loop" or "broken release
//! sequence" are *not* errors and never appear here).

/// Errors surfaced by the boolean algebra, graph, and search layers.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// More than [`crate::boolean::MAX_VARIABLES`] boolean variables were requested
    /// in a single analysis run.
    #[error("boolean variable capacity exceeded (max {max}, requested id {requested})")]
    TooManyVariables {
        /// The configured capacity.
        max: u32,
        /// The id that would have been assigned.
        requested: u32,
    },

    /// An `Expression` grew beyond the implementation's product-count guard.
    #[error("expression exceeded the maximum number of products ({max})")]
    TooManyProducts {
        /// The configured capacity.
        max: usize,
    },

    /// `Expression::as_product` was called on a non-product (multi-term) expression.
    #[error("expression is not a single product")]
    NotAProduct,

    /// An `Expression` was used before any term was ever added to it.
    #[error("expression was never initialized")]
    UninitializedExpression,

    /// A location id did not resolve inside the owning `Graph`.
    #[error("unknown location id {0:?}")]
    UnknownLocation(crate::location::LocationId),

    /// A thread id did not resolve inside the owning `Graph`.
    #[error("unknown thread id {0:?}")]
    UnknownThread(crate::thread::ThreadId),

    /// An internal invariant was violated; this is always an engine bug and
    /// never a consequence of the analyzed program's shape.
    #[error("internal invariant violation: {0}")]
    InvariantViolation(String),
}

/// Convenience alias used throughout the engine.
pub type Result<T> = std::result::Result<T, EngineError>;
