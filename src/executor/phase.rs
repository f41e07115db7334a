//! # Phase executor (§4.7)
//!
//! A `Plan` is an ordered list of phases produced upstream by a planner;
//! this module only walks it. Every phase but the last runs the clause
//! engine's `:where` processing and narrows each returned group down to
//! its `keep` set before handing off to the next phase — bounding how
//! much binding state threads through a multi-phase plan. The last phase
//! also applies `:find`/`:order-by` (via `execute_query`), which already
//! implements the single-group requirement for aggregates and the
//! Cartesian-product-then-project path otherwise (§4.6).

use super::{execute_clauses, execute_query, ClauseContext};
use crate::annotate::AnnotationCollector;
use crate::cancel::CancellationToken;
use crate::error::EngineResult;
use crate::functions::FunctionRegistry;
use crate::options::ExecutorOptions;
use crate::pattern_matcher::PatternMatcher;
use crate::relation::Relation;
use datalog_ir::Plan;

/// Everything a plan run needs beyond the plan and its starting
/// relations; one `ClauseContext` is built per phase from these, varying
/// only the `phase` index so errors self-locate.
pub struct PlanContext<'a> {
    pub matcher: &'a dyn PatternMatcher,
    pub registry: &'a FunctionRegistry,
    pub options: &'a ExecutorOptions,
    pub annotations: &'a dyn AnnotationCollector,
    pub cancel: &'a CancellationToken,
}

/// Run every phase of `plan` in order, starting from `groups`.
pub fn execute_plan(ctx: &PlanContext, plan: &Plan, mut groups: Vec<Relation>) -> EngineResult<Relation> {
    if plan.is_empty() {
        return super::collapse::collapse(groups, ctx.options).and_then(|mut gs| match gs.len() {
            0 => Ok(Relation::empty(Vec::new())),
            1 => Ok(gs.pop().unwrap()),
            n => Err(crate::error::CartesianProductError { group_count: n }.into()),
        });
    }

    let last = plan.phases.len() - 1;
    for (index, phase) in plan.phases.iter().enumerate() {
        let clause_ctx = ClauseContext {
            matcher: ctx.matcher,
            registry: ctx.registry,
            options: ctx.options,
            annotations: ctx.annotations,
            cancel: ctx.cancel,
            phase: index,
        };

        if index == last {
            return execute_query(&clause_ctx, &phase.query, groups);
        }

        groups = execute_clauses(&clause_ctx, &phase.query.where_clauses, groups)?;
        if groups.iter().any(|g| g.size().map(|n| n == 0).unwrap_or(false)) {
            return Ok(Relation::empty(plan.output_symbols().into_iter().collect()));
        }
        groups = groups
            .into_iter()
            .map(|group| {
                let keep: Vec<_> = group.columns().iter().filter(|s| phase.keep.contains(*s)).cloned().collect();
                group.materialize()?.project(&keep)
            })
            .collect::<EngineResult<Vec<_>>>()?;
    }

    unreachable!("loop always returns on the last phase when plan is non-empty")
}
