//! Per-category max price via a correlated subquery. Run with
//! `cargo run --example correlated_subquery`.

use datalog_ast::builders::{PatternBuilder, QueryBuilder, SubqueryBuilder};
use datalog_ast::{AggregateFunc, Clause, Find, FindElement, Query, Symbol};
use datalog_engine::pattern_matcher::InMemoryPatternMatcher;
use datalog_engine::value::Value;
use datalog_engine::{error::EngineResult, options::ExecutorOptions, Executor, Planner};
use datalog_ir::Plan;
use std::collections::HashSet;

struct SinglePhasePlanner;

impl Planner for SinglePhasePlanner {
    fn plan(&self, query: &Query, _initial_bindings: &HashSet<Symbol>) -> EngineResult<Plan> {
        let keep: HashSet<Symbol> = query
            .find
            .elements
            .iter()
            .filter_map(|e| match e {
                FindElement::Variable(s) => Some(s.clone()),
                FindElement::Aggregate { .. } => None,
            })
            .collect();
        Ok(Plan::single(query.clone(), keep))
    }
}

fn main() -> EngineResult<()> {
    let matcher = InMemoryPatternMatcher::new();
    for (category, label) in [(1, "produce"), (2, "dairy")] {
        matcher.add_fact("category", vec![Value::Int(category), Value::Str(label.into())]);
    }
    matcher.add_fact("price", vec![Value::Int(1), Value::Float(1.50)]);
    matcher.add_fact("price", vec![Value::Int(1), Value::Float(3.25)]);
    matcher.add_fact("price", vec![Value::Int(2), Value::Float(4.00)]);

    let planner = SinglePhasePlanner;
    let executor = Executor::new(&matcher, &planner, ExecutorOptions::default());

    let inner = QueryBuilder::new()
        .find_aggregate(AggregateFunc::Max, "price", None)
        .pattern(PatternBuilder::new("price").var("cat").var("price").build())
        .input_scalar("cat")
        .build();
    let subquery = SubqueryBuilder::new(inner).correlate("cat").bind_scalar("maxprice").build();

    let outer_pattern = PatternBuilder::new("category").var("cat").var("label").build();
    let query = Query::new(
        Find::new(vec![FindElement::Variable(Symbol::new("label")), FindElement::Variable(Symbol::new("maxprice"))]),
        vec![Clause::DataPattern(outer_pattern), Clause::Subquery(subquery)],
    )
    .with_order_by(vec![datalog_ast::OrderBy::asc("label")]);

    let result = executor.execute(&query)?;
    for tuple in result.iterator()? {
        println!("{:?}", tuple.values());
    }
    Ok(())
}
