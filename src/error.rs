//! # Error types
//!
//! One `thiserror` enum per the error kinds consumed and produced across
//! the engine, following the narrow-struct-plus-umbrella-enum shape used
//! for cooperating subsystem errors: small standalone error structs exist
//! where a call site wants the narrower type before it gets converted at
//! a boundary, and `EngineError` is what `Executor::execute` ultimately
//! returns.

use thiserror::Error;

/// A referenced column was not present on a relation, or the find-list
/// was empty.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("projection error: missing columns {missing:?}")]
pub struct ProjectionError {
    pub missing: Vec<String>,
}

/// The terminal phase of a plan left more than one disjoint relation
/// group after collapse.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cartesian product error: {group_count} disjoint groups remain after final phase")]
pub struct CartesianProductError {
    pub group_count: usize,
}

/// An inner subquery produced a shape incompatible with its binding form.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("subquery binding error: {reason}")]
pub struct SubqueryBindingError {
    pub reason: String,
}

/// A streaming relation was consumed more than once without a prior
/// `materialize()` call.
#[derive(Debug, Clone, Error, PartialEq, Eq, Default)]
#[error("streaming relation iterated twice without materialize()")]
pub struct DoubleIterationError;

/// Propagated from the external pattern matcher.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("pattern matcher error: {0}")]
pub struct PatternMatcherError(pub String);

/// Pass-through from the planner, attached at the query boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("planning error: {0}")]
pub struct PlanningError(pub String);

/// A query declared a `RelationInput` over `symbols`, but the caller's
/// `execute_with_relations` inputs didn't include a relation with
/// exactly that column set.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("missing relation input: no supplied relation has columns {symbols:?}")]
pub struct MissingRelationInputError {
    pub symbols: Vec<String>,
}

/// Execution was cooperatively cancelled via a `CancellationToken`.
#[derive(Debug, Clone, Error, PartialEq, Eq, Default)]
#[error("execution cancelled")]
pub struct CancelledError;

/// The top-level error type returned by `Executor::execute` and
/// `execute_with_relations`. Phase- and clause-level failures are wrapped
/// with their index so a caller can localize the failure without parsing
/// the message.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    CartesianProduct(#[from] CartesianProductError),

    #[error(transparent)]
    SubqueryBinding(#[from] SubqueryBindingError),

    #[error(transparent)]
    DoubleIteration(#[from] DoubleIterationError),

    #[error(transparent)]
    PatternMatcher(#[from] PatternMatcherError),

    #[error(transparent)]
    Planning(#[from] PlanningError),

    #[error(transparent)]
    MissingRelationInput(#[from] MissingRelationInputError),

    #[error(transparent)]
    Cancelled(#[from] CancelledError),

    /// Phase- or clause-level wrapper carrying the failing indices and
    /// the inner cause.
    #[error("execution error at phase {phase}, clause {clause:?}: {source}")]
    Execution {
        phase: usize,
        clause: Option<usize>,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// Wrap `self` with the phase/clause location it failed at, unless it
    /// is already an `Execution` wrapper (avoid nesting wrappers when a
    /// clause-level error bubbles through a phase boundary that doesn't
    /// add new information).
    #[must_use]
    pub fn at(self, phase: usize, clause: Option<usize>) -> Self {
        match self {
            EngineError::Execution { .. } => self,
            other => EngineError::Execution {
                phase,
                clause,
                source: Box::new(other),
            },
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
