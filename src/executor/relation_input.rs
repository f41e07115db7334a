//! # Top-level `RelationInput` iteration (§4.9)
//!
//! When a query's `:in` clause declares a `RelationInput`, the engine
//! runs the plan once per tuple of the bound relation, as if `:in` had
//! been rewritten to scalar inputs for each of the relation's symbols,
//! then unions the per-tuple results. Shares the sequential/worker-pool
//! split and first-error policy with `executor::input_binding`'s
//! per-subquery-binding recursion (§5 "worker-pool barriers").

use super::phase::{execute_plan, PlanContext};
use crate::error::EngineResult;
use crate::relation::Relation;
use crate::value::Tuple;
use datalog_ast::Symbol;
use datalog_ir::Plan;
use rayon::prelude::*;

pub fn run_plan_per_binding(
    ctx: &PlanContext,
    plan: &Plan,
    input_symbols: &[Symbol],
    binding_tuples: &[Tuple],
    other_inputs: &[Relation],
    parallel: bool,
) -> EngineResult<Vec<Relation>> {
    if parallel {
        run_parallel(ctx, plan, input_symbols, binding_tuples, other_inputs)
    } else {
        run_sequential(ctx, plan, input_symbols, binding_tuples, other_inputs)
    }
}

fn run_sequential(ctx: &PlanContext, plan: &Plan, input_symbols: &[Symbol], binding_tuples: &[Tuple], other_inputs: &[Relation]) -> EngineResult<Vec<Relation>> {
    let mut results = Vec::with_capacity(binding_tuples.len());
    for tuple in binding_tuples {
        ctx.cancel.check()?;
        results.push(execute_one(ctx, plan, input_symbols, tuple, other_inputs)?);
    }
    Ok(results)
}

fn run_parallel(ctx: &PlanContext, plan: &Plan, input_symbols: &[Symbol], binding_tuples: &[Tuple], other_inputs: &[Relation]) -> EngineResult<Vec<Relation>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(ctx.options.worker_count())
        .build()
        .expect("failed to build relation-input worker pool");

    let outcomes: Vec<EngineResult<Relation>> = pool.install(|| {
        binding_tuples
            .par_iter()
            .map(|tuple| {
                ctx.cancel.check()?;
                execute_one(ctx, plan, input_symbols, tuple, other_inputs)
            })
            .collect()
    });

    let mut first_error = None;
    let mut results = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome {
            Ok(relation) => results.push(relation),
            Err(err) if first_error.is_none() => first_error = Some(err),
            Err(_) => {}
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(results),
    }
}

fn execute_one(ctx: &PlanContext, plan: &Plan, input_symbols: &[Symbol], tuple: &Tuple, other_inputs: &[Relation]) -> EngineResult<Relation> {
    let mut groups: Vec<Relation> = other_inputs.to_vec();
    groups.push(Relation::materialized(input_symbols.to_vec(), vec![tuple.clone()]));
    execute_plan(ctx, plan, groups)
}

/// Flatten the per-tuple results into one relation. A relation is a set
/// by construction, so the union naturally drops duplicate rows produced
/// by distinct bindings.
pub fn union(relations: Vec<Relation>, empty_columns: impl FnOnce() -> Vec<Symbol>) -> EngineResult<Relation> {
    if relations.is_empty() {
        return Ok(Relation::empty(empty_columns()));
    }
    let columns = relations[0].columns().to_vec();
    let mut tuples = Vec::new();
    for relation in relations {
        tuples.extend(relation.iterator()?);
    }
    Ok(Relation::materialized(columns, tuples))
}
