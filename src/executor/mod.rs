//! # Query executor: the clause engine (§4.6)
//!
//! Executes one `Query`'s `:where` section against a working list of
//! pairwise symbol-disjoint relation groups, applies the `:find` list,
//! and orders the result. `phase` runs this once per `Plan` phase;
//! `subquery` recurses into it once per correlated binding via
//! `input_binding`; `relation_input` drives a whole `Plan` once per tuple
//! of a top-level `RelationInput`.
//!
//! **Early termination**: once any group in the working set has no
//! tuples, the eventual result is empty regardless of what the
//! remaining clauses would otherwise bind — every combinator here
//! (collapse, product, filter, aggregate) propagates an empty input to
//! an empty, correctly-columned output. Once drained, the engine stops
//! invoking the pattern matcher, function registry, or subquery
//! executor for the rest of the clause list and instead synthesizes the
//! empty relation each remaining clause would have produced from the
//! clause's own AST (its columns don't depend on the data), so the
//! external matcher never pays for work whose result is already known.

pub mod collapse;
pub mod input_binding;
pub mod phase;
pub mod relation_input;
pub mod subquery;

use crate::annotate::AnnotationCollector;
use crate::cancel::CancellationToken;
use crate::error::{EngineError, EngineResult};
use crate::functions::FunctionRegistry;
use crate::options::ExecutorOptions;
use crate::pattern_matcher::PatternMatcher;
use crate::relation::Relation;
use datalog_ast::{Clause, FunctionCall, Pattern, PatternTerm, Predicate, Query, Symbol};
use std::collections::HashSet;

/// Everything a single clause-engine invocation needs that isn't part of
/// the query or the working relation groups themselves.
pub struct ClauseContext<'a> {
    pub matcher: &'a dyn PatternMatcher,
    pub registry: &'a FunctionRegistry,
    pub options: &'a ExecutorOptions,
    pub annotations: &'a dyn AnnotationCollector,
    pub cancel: &'a CancellationToken,
    /// The enclosing phase index, attached to any error this invocation
    /// raises.
    pub phase: usize,
}

/// Run `query`'s `:where` clauses, then apply `:find` and `:order-by`.
/// `groups` is the caller's starting relation set (empty for a
/// top-level query with no `:in` relations already bound).
pub fn execute_query(ctx: &ClauseContext, query: &Query, groups: Vec<Relation>) -> EngineResult<Relation> {
    let groups = execute_clauses(ctx, &query.where_clauses, groups)?;
    finish_query(ctx, query, groups)
}

fn finish_query(ctx: &ClauseContext, query: &Query, groups: Vec<Relation>) -> EngineResult<Relation> {
    let result = apply_find(ctx, query, groups)?;
    match &query.order_by {
        Some(order_by) => result.sort(order_by).map_err(|e| e.at(ctx.phase, None)),
        None => Ok(result),
    }
}

/// Run just the `:where` clauses, returning the resulting disjoint
/// groups without applying `:find`. Used by the subquery executor,
/// which needs the raw groups to apply its own binding-form shaping.
pub fn execute_clauses(ctx: &ClauseContext, clauses: &[Clause], mut groups: Vec<Relation>) -> EngineResult<Vec<Relation>> {
    let mut drained = groups_drained(&groups)?;
    for (index, clause) in clauses.iter().enumerate() {
        ctx.cancel.check().map_err(|e| EngineError::from(e).at(ctx.phase, Some(index)))?;
        groups = apply_clause(ctx, clause, groups, drained).map_err(|e| e.at(ctx.phase, Some(index)))?;
        if !drained {
            drained = groups_drained(&groups)?;
        }
    }
    Ok(groups)
}

fn groups_drained(groups: &[Relation]) -> EngineResult<bool> {
    for group in groups {
        if group.is_empty()? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn apply_clause(ctx: &ClauseContext, clause: &Clause, groups: Vec<Relation>, drained: bool) -> EngineResult<Vec<Relation>> {
    match clause {
        Clause::DataPattern(pattern) => apply_data_pattern(ctx, pattern, groups, drained),
        Clause::Expression(call) => apply_expression(ctx, call, groups, drained),
        Clause::Predicate(predicate) => apply_predicate(predicate, groups, drained),
        Clause::Subquery(subquery_pattern) => subquery::apply_subquery_clause(ctx, subquery_pattern, groups, drained),
    }
}

fn pattern_columns(pattern: &Pattern) -> Vec<Symbol> {
    pattern.terms.iter().filter_map(PatternTerm::as_var).cloned().collect()
}

fn apply_data_pattern(ctx: &ClauseContext, pattern: &Pattern, mut groups: Vec<Relation>, drained: bool) -> EngineResult<Vec<Relation>> {
    let columns = pattern_columns(pattern);
    let new_group = if drained {
        Relation::empty(columns)
    } else {
        let wanted: HashSet<Symbol> = columns.iter().cloned().collect();
        let bindings: Vec<Relation> = groups.iter().filter(|g| intersects(g, &wanted)).cloned().collect();
        ctx.matcher.match_pattern(pattern, &bindings)?
    };
    groups.push(new_group);
    collapse::collapse(groups, ctx.options)
}

fn apply_expression(ctx: &ClauseContext, call: &FunctionCall, groups: Vec<Relation>, drained: bool) -> EngineResult<Vec<Relation>> {
    let wanted = call.input_variables();
    let (relevant, mut rest) = partition(groups, &wanted);
    let merged = if drained {
        let mut columns: Vec<Symbol> = relevant.iter().flat_map(|g| g.columns().to_vec()).collect();
        columns.push(call.out.clone());
        Relation::empty(columns)
    } else {
        let combined = combine(relevant)?;
        combined.evaluate_function(call.name.clone(), call.args.clone(), call.out.clone(), ctx.registry.clone())?
    };
    rest.push(merged);
    collapse::collapse(rest, ctx.options)
}

fn apply_predicate(predicate: &Predicate, groups: Vec<Relation>, drained: bool) -> EngineResult<Vec<Relation>> {
    if drained {
        // Filtering never changes a relation's columns, so a drained
        // predicate clause is a pure no-op: the groups already carry
        // the right (empty) shape.
        return Ok(groups);
    }
    let wanted = predicate.variables();
    let (relevant, mut rest) = partition(groups, &wanted);
    let combined = combine(relevant)?;
    let filtered = combined.filter_with_predicate(predicate.clone())?;
    rest.push(filtered);
    Ok(rest)
}

/// Split `groups` into those with at least one column in `wanted` and
/// the rest.
fn partition(groups: Vec<Relation>, wanted: &HashSet<Symbol>) -> (Vec<Relation>, Vec<Relation>) {
    let mut relevant = Vec::new();
    let mut rest = Vec::new();
    for group in groups {
        if intersects(&group, wanted) {
            relevant.push(group);
        } else {
            rest.push(group);
        }
    }
    (relevant, rest)
}

fn intersects(group: &Relation, wanted: &HashSet<Symbol>) -> bool {
    group.columns().iter().any(|c| wanted.contains(c))
}

/// The single relation a clause operates over: the `Product()` of
/// whatever relevant groups it found, or an empty-column single-row
/// relation when the clause has no input variables at all (a literal
/// expression or predicate).
fn combine(relevant: Vec<Relation>) -> EngineResult<Relation> {
    if relevant.is_empty() {
        return Ok(Relation::materialized(Vec::new(), vec![crate::value::Tuple::new(Vec::new())]));
    }
    Relation::product(&relevant)
}

fn apply_find(ctx: &ClauseContext, query: &Query, groups: Vec<Relation>) -> EngineResult<Relation> {
    if query.find.has_aggregates() {
        let single = require_single_group(groups, ctx.options)?;
        return single.aggregate(&query.find, ctx.options);
    }
    let required: Vec<Symbol> = query
        .find
        .elements
        .iter()
        .flat_map(|e| match e {
            datalog_ast::FindElement::Variable(s) => vec![s.clone()],
            datalog_ast::FindElement::Aggregate { .. } => unreachable!("has_aggregates() already checked"),
        })
        .collect();
    if required.is_empty() {
        return Err(crate::error::ProjectionError { missing: vec!["<find list is empty>".to_string()] }.into());
    }
    let wanted: HashSet<Symbol> = required.iter().cloned().collect();
    let relevant: Vec<Relation> = groups.into_iter().filter(|g| intersects(g, &wanted)).collect();
    let combined = combine(relevant)?;
    combined.project(&required)
}

fn require_single_group(groups: Vec<Relation>, options: &ExecutorOptions) -> EngineResult<Relation> {
    let collapsed = collapse::collapse(groups, options)?;
    let mut iter = collapsed.into_iter();
    let first = iter.next().unwrap_or_else(|| Relation::empty(Vec::new()));
    if iter.next().is_some() {
        return Err(crate::error::CartesianProductError { group_count: 2 }.into());
    }
    Ok(first)
}
