//! A bare-minimum host: one fact table, a single-phase planner, one
//! `:find` with a predicate clause. Run with `cargo run --example simple_query`.

use datalog_ast::builders::{PatternBuilder, QueryBuilder};
use datalog_ast::{ComparisonOp, Constant, Query, Symbol, Term};
use datalog_engine::pattern_matcher::InMemoryPatternMatcher;
use datalog_engine::value::Value;
use datalog_engine::{error::EngineResult, options::ExecutorOptions, Executor, Planner};
use datalog_ir::Plan;
use std::collections::HashSet;

/// Runs every query as a single phase with no projection narrowing.
/// A real host's planner would split multi-clause queries across
/// phases and choose a join order; this demo only needs one phase.
struct SinglePhasePlanner;

impl Planner for SinglePhasePlanner {
    fn plan(&self, query: &Query, _initial_bindings: &HashSet<Symbol>) -> EngineResult<Plan> {
        let keep: HashSet<Symbol> = query
            .find
            .elements
            .iter()
            .filter_map(|e| match e {
                datalog_ast::FindElement::Variable(s) => Some(s.clone()),
                datalog_ast::FindElement::Aggregate { .. } => None,
            })
            .collect();
        Ok(Plan::single(query.clone(), keep))
    }
}

fn main() -> EngineResult<()> {
    let matcher = InMemoryPatternMatcher::new();
    matcher.add_fact("person", vec![Value::Str("alice".into()), Value::Int(30)]);
    matcher.add_fact("person", vec![Value::Str("bob".into()), Value::Int(17)]);
    matcher.add_fact("person", vec![Value::Str("carol".into()), Value::Int(42)]);

    let planner = SinglePhasePlanner;
    let executor = Executor::new(&matcher, &planner, ExecutorOptions::default());

    let pattern = PatternBuilder::new("person").var("name").var("age").build();
    let query = QueryBuilder::new()
        .find_var("name")
        .pattern(pattern)
        .predicate(ComparisonOp::GtEq, vec![Term::var("age"), Term::Const(Constant::Int(18))])
        .order_by_asc("name")
        .build();

    let result = executor.execute(&query)?;
    for tuple in result.iterator()? {
        println!("{:?}", tuple.values());
    }
    Ok(())
}
