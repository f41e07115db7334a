//! # Per-binding subquery execution (§4.8)
//!
//! Runs a single inner `Query` once per distinct binding of a subquery
//! clause's correlated inputs: bind a row of scalars, recurse into the
//! clause engine, collect. Sequential execution runs bindings one at a
//! time; once the caller's strategy selector picks parallel, a worker
//! pool sized by `ExecutorOptions::worker_count()` processes them with a
//! first-error policy: every worker finishes the bindings already
//! queued for it even after one fails, and the first error by binding
//! order is what's returned once every worker is done.
//!
//! `executor::relation_input` is the same shape one level up — a whole
//! `Plan` run once per tuple of a top-level `RelationInput` (§4.9) —
//! duplicated rather than shared because it recurses into `execute_plan`
//! over a `PlanContext`, not `execute_query` over a `ClauseContext`.

use super::ClauseContext;
use crate::error::EngineResult;
use crate::relation::Relation;
use crate::value::Tuple;
use datalog_ast::{Query, Symbol};
use rayon::prelude::*;

/// One binding's outer tuple paired with the inner query's result for
/// that binding.
pub struct PerBindingResult {
    pub binding: Tuple,
    pub result: Relation,
}

/// Run `inner` once per tuple of `binding_tuples`, each seeded as a
/// single-row relation over `input_symbols`. `parallel` selects the
/// worker-pool strategy; the caller has already applied the threshold
/// check and recorded the strategy choice as an annotation.
pub fn run_per_binding(ctx: &ClauseContext, inner: &Query, input_symbols: &[Symbol], binding_tuples: &[Tuple], parallel: bool) -> EngineResult<Vec<PerBindingResult>> {
    if parallel {
        run_parallel(ctx, inner, input_symbols, binding_tuples)
    } else {
        run_sequential(ctx, inner, input_symbols, binding_tuples)
    }
}

fn run_sequential(ctx: &ClauseContext, inner: &Query, input_symbols: &[Symbol], binding_tuples: &[Tuple]) -> EngineResult<Vec<PerBindingResult>> {
    let mut out = Vec::with_capacity(binding_tuples.len());
    for tuple in binding_tuples {
        ctx.cancel.check()?;
        let result = execute_one(ctx, inner, input_symbols, tuple)?;
        out.push(PerBindingResult { binding: tuple.clone(), result });
    }
    Ok(out)
}

fn run_parallel(ctx: &ClauseContext, inner: &Query, input_symbols: &[Symbol], binding_tuples: &[Tuple]) -> EngineResult<Vec<PerBindingResult>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(ctx.options.worker_count())
        .build()
        .expect("failed to build subquery worker pool");

    let outcomes: Vec<EngineResult<Relation>> = pool.install(|| {
        binding_tuples
            .par_iter()
            .map(|tuple| {
                ctx.cancel.check()?;
                execute_one(ctx, inner, input_symbols, tuple)
            })
            .collect()
    });

    let mut first_error = None;
    let mut out = Vec::with_capacity(outcomes.len());
    for (tuple, outcome) in binding_tuples.iter().zip(outcomes) {
        match outcome {
            Ok(result) => out.push(PerBindingResult { binding: tuple.clone(), result }),
            Err(err) if first_error.is_none() => first_error = Some(err),
            Err(_) => {}
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(out),
    }
}

fn execute_one(ctx: &ClauseContext, inner: &Query, input_symbols: &[Symbol], tuple: &Tuple) -> EngineResult<Relation> {
    let seed = Relation::materialized(input_symbols.to_vec(), vec![tuple.clone()]);
    super::execute_query(ctx, inner, vec![seed])
}
