//! # Datalog query execution engine
//!
//! The core consumes a `Plan` (an ordered list of phases, §4.7) and an
//! external `PatternMatcher`, and evaluates it into a `Relation` — the
//! engine's sole data currency (§3). It does not parse Datalog source,
//! does not plan (join ordering, subquery decorrelation, recursion) and
//! does not persist anything; those are a planner's and a host's job.
//!
//! ## What lives here
//!
//! - [`value`] — `Value`/`Tuple`, the row currency joins and aggregates
//!   operate on.
//! - [`relation`] — the `Relation` enum (materialized/streaming) and its
//!   iterator combinators (§4.1-4.3).
//! - [`join`] — hash-join cores, natural/semi/anti join, symmetric
//!   streaming join (§4.4).
//! - [`aggregate`] — batch and single-pass streaming aggregation (§4.5).
//! - [`executor`] — the clause engine, phase executor, subquery
//!   executor, and the sequential/parallel per-binding worker pools for
//!   both correlated subqueries and top-level `RelationInput` iteration
//!   (§4.6-4.9).
//! - [`functions`] — the builtin/chained-comparison function registry
//!   clauses call into.
//! - [`pattern_matcher`] — the `PatternMatcher` trait the host
//!   implements, plus an in-memory test double.
//! - [`annotate`] — the `AnnotationCollector` telemetry sink.
//! - [`cancel`] — cooperative cancellation checked at clause and
//!   worker-pool boundaries.
//! - [`options`] / [`error`] — `ExecutorOptions`/`EngineConfig` and the
//!   `EngineError` umbrella.
//!
//! ## Example
//!
//! ```rust,ignore
//! use datalog_engine::{Executor, ExecutorOptions};
//!
//! let executor = Executor::new(&matcher, &planner, ExecutorOptions::default());
//! let relation = executor.execute(&query)?;
//! ```

pub mod aggregate;
pub mod annotate;
pub mod cancel;
pub mod error;
pub mod executor;
pub mod functions;
pub mod join;
pub mod options;
pub mod pattern_matcher;
pub mod relation;
pub mod value;

use annotate::{AnnotationCollector, AnnotationEvent, NullCollector};
use cancel::CancellationToken;
use datalog_ast::{Query, Symbol};
use datalog_ir::Plan;
use error::{EngineResult, MissingRelationInputError};
use executor::phase::{execute_plan, PlanContext};
use executor::relation_input::{run_plan_per_binding, union};
use functions::FunctionRegistry;
use options::ExecutorOptions;
use pattern_matcher::PatternMatcher;
use relation::Relation;
use std::collections::HashSet;

/// Produces a `Plan` for a `Query`. Planning — join ordering, subquery
/// decorrelation, recursion stratification — happens entirely on the
/// other side of this trait; the executor only walks the phases it
/// returns.
pub trait Planner {
    /// `initial_bindings` names the symbols already bound by the
    /// caller's input relations (e.g. a subquery's correlated inputs),
    /// for planners that use it to decide phase boundaries.
    fn plan(&self, query: &Query, initial_bindings: &HashSet<Symbol>) -> EngineResult<Plan>;
}

/// Top-level entry point: wires a `PatternMatcher` and `Planner`
/// together with the executor's tunables (§6).
pub struct Executor<'a> {
    matcher: &'a dyn PatternMatcher,
    planner: &'a dyn Planner,
    registry: FunctionRegistry,
    options: ExecutorOptions,
    annotations: &'a dyn AnnotationCollector,
    cancel: CancellationToken,
}

impl<'a> Executor<'a> {
    pub fn new(matcher: &'a dyn PatternMatcher, planner: &'a dyn Planner, options: ExecutorOptions) -> Self {
        Executor {
            matcher,
            planner,
            registry: FunctionRegistry::new(),
            options,
            annotations: &NullCollector,
            cancel: CancellationToken::none(),
        }
    }

    pub fn with_annotations(mut self, annotations: &'a dyn AnnotationCollector) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_functions(mut self, registry: FunctionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Plan and run `query` with no input relations bound.
    pub fn execute(&self, query: &Query) -> EngineResult<Relation> {
        self.execute_with_relations(query, Vec::new())
    }

    /// Plan and run `query` against a caller-supplied set of starting
    /// relations (a subquery's correlated-input seed, or a test's
    /// pre-bound fixture). If `query`'s `:in` clause declares a
    /// `RelationInput`, the matching relation in `inputs` is iterated
    /// per-tuple per §4.9 rather than seeded directly into the plan.
    pub fn execute_with_relations(&self, query: &Query, inputs: Vec<Relation>) -> EngineResult<Relation> {
        match query.relation_input() {
            Some(relation_input_symbols) => self.execute_relation_input(query, relation_input_symbols, inputs),
            None => {
                let initial_bindings: HashSet<Symbol> = inputs.iter().flat_map(|r| r.columns().iter().cloned()).collect();
                let plan = self.planner.plan(query, &initial_bindings)?;
                let ctx = self.plan_context();
                execute_plan(&ctx, &plan, inputs)
            }
        }
    }

    fn execute_relation_input(&self, query: &Query, relation_input_symbols: &[Symbol], mut inputs: Vec<Relation>) -> EngineResult<Relation> {
        let wanted: HashSet<Symbol> = relation_input_symbols.iter().cloned().collect();
        let position = inputs
            .iter()
            .position(|r| r.columns().iter().cloned().collect::<HashSet<Symbol>>() == wanted)
            .ok_or_else(|| MissingRelationInputError { symbols: relation_input_symbols.iter().map(|s| s.name().to_string()).collect() })?;
        let relation_input = inputs.remove(position).materialize()?;
        let input_symbols = relation_input.columns().to_vec();
        let binding_tuples: Vec<_> = relation_input.iterator()?.collect();

        let initial_bindings: HashSet<Symbol> = inputs
            .iter()
            .flat_map(|r| r.columns().iter().cloned())
            .chain(input_symbols.iter().cloned())
            .collect();
        let plan = self.planner.plan(query, &initial_bindings)?;
        let ctx = self.plan_context();

        let parallel = self.options.parallel_subqueries && binding_tuples.len() > self.options.parallel_subquery_threshold;
        self.annotations.add(
            AnnotationEvent::new("relation_input/strategy")
                .with("strategy", if parallel { "parallel" } else { "sequential" })
                .with("bindings", binding_tuples.len()),
        );

        let per_tuple = run_plan_per_binding(&ctx, &plan, &input_symbols, &binding_tuples, &inputs, parallel)?;
        union(per_tuple, || plan.output_symbols().into_iter().collect())
    }

    fn plan_context(&self) -> PlanContext<'_> {
        PlanContext {
            matcher: self.matcher,
            registry: &self.registry,
            options: &self.options,
            annotations: self.annotations,
            cancel: &self.cancel,
        }
    }
}
