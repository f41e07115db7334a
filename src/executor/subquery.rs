//! # Subquery execution (§4.8)
//!
//! A `SubqueryPattern` clause is executed once per distinct binding of
//! its correlated inputs: combine the outer groups, project onto the
//! correlated symbols for the distinct binding set, then recurse into
//! the clause engine once per binding (sequentially, or across a
//! worker pool once the binding count crosses
//! `parallel_subquery_threshold`). The strategy choice is itself an
//! annotation event.
//!
//! The `Batched` and `Decorrelated` strategies named in the design are
//! planner-cooperative: batching requires rewriting the inner query's
//! `:in` clause to a `RelationInput` so a single grouped execution
//! covers every binding, and decorrelation requires the planner to have
//! already merged sibling subqueries upstream. Both are out of this
//! crate's reach (planning beyond consuming a `Plan` is out of scope);
//! from here, a decorrelated subquery clause is indistinguishable from
//! an ordinary one, exactly as the design intends ("the executor treats
//! a decorrelated group as one subquery"). What remains is the
//! Sequential/Parallel choice, which this module does implement in
//! full, including the worker pool and first-error policy.

use super::input_binding::{run_per_binding, PerBindingResult};
use super::ClauseContext;
use crate::annotate::AnnotationEvent;
use crate::error::{EngineResult, SubqueryBindingError};
use crate::relation::Relation;
use crate::value::Tuple;
use datalog_ast::{BindingForm, SubqueryPattern, Symbol};

pub fn apply_subquery_clause(ctx: &ClauseContext, subquery: &SubqueryPattern, mut groups: Vec<Relation>, drained: bool) -> EngineResult<Vec<Relation>> {
    let input_symbols = subquery.correlated_symbols();
    let binding_columns = subquery.binding.symbols();
    let new_group = if drained {
        let mut columns = input_symbols.clone();
        columns.extend(binding_columns);
        Relation::empty(columns)
    } else {
        execute(ctx, subquery, &groups, &input_symbols)?
    };
    groups.push(new_group);
    super::collapse::collapse(groups, ctx.options)
}

fn execute(ctx: &ClauseContext, subquery: &SubqueryPattern, outer_groups: &[Relation], input_symbols: &[Symbol]) -> EngineResult<Relation> {
    let combined = if outer_groups.is_empty() {
        Relation::materialized(Vec::new(), vec![Tuple::new(Vec::new())])
    } else {
        Relation::product(outer_groups)?
    };
    let bindings_relation = combined.project(input_symbols)?.materialize()?;
    let binding_tuples: Vec<Tuple> = bindings_relation.iterator()?.collect();

    let parallel = ctx.options.parallel_subqueries && binding_tuples.len() > ctx.options.parallel_subquery_threshold;
    ctx.annotations.add(
        AnnotationEvent::new("subquery/strategy")
            .with("strategy", if parallel { "parallel" } else { "sequential" })
            .with("bindings", binding_tuples.len()),
    );

    let outcomes: Vec<PerBindingResult> = run_per_binding(ctx, &subquery.inner, input_symbols, &binding_tuples, parallel)?;

    let mut columns = input_symbols.to_vec();
    columns.extend(subquery.binding.symbols());
    let mut rows = Vec::new();
    for outcome in outcomes {
        for shaped in shape_binding(&subquery.binding, &outcome.result)? {
            rows.push(outcome.binding.concat(&shaped));
        }
    }
    Ok(Relation::materialized(columns, rows))
}

/// Turn an inner query's result relation into zero or more output row
/// fragments per the binding form's cardinality contract. An empty
/// inner result always yields zero fragments — the pattern is treated
/// as failing for that binding, dropped later by the outer equi-join,
/// never surfaced as a row of nils.
fn shape_binding(binding: &BindingForm, result: &Relation) -> EngineResult<Vec<Tuple>> {
    let rows: Vec<Tuple> = result.iterator()?.collect();
    match binding {
        BindingForm::Scalar(_) => require_single_row(rows, 1, "scalar"),
        BindingForm::Tuple(symbols) => require_single_row(rows, symbols.len(), "tuple"),
        BindingForm::Collection(_) => require_width(rows, 1, "collection"),
        BindingForm::Relation(symbols) => require_width(rows, symbols.len(), "relation"),
    }
}

fn require_single_row(rows: Vec<Tuple>, width: usize, form: &str) -> EngineResult<Vec<Tuple>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    if rows.len() > 1 {
        return Err(SubqueryBindingError { reason: format!("{form} binding expected a single row, got {}", rows.len()) }.into());
    }
    if rows[0].width() != width {
        return Err(SubqueryBindingError { reason: format!("{form} binding expected width {width}, got {}", rows[0].width()) }.into());
    }
    Ok(rows)
}

fn require_width(rows: Vec<Tuple>, width: usize, form: &str) -> EngineResult<Vec<Tuple>> {
    for row in &rows {
        if row.width() != width {
            return Err(SubqueryBindingError { reason: format!("{form} binding expected width {width}, got {}", row.width()) }.into());
        }
    }
    Ok(rows)
}
