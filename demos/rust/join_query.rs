//! Two patterns sharing a variable, collapsed into a natural join by
//! the clause engine. Run with `cargo run --example join_query`.

use datalog_ast::builders::{PatternBuilder, QueryBuilder};
use datalog_ast::{Query, Symbol};
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
                datalog_ast::FindElement::Variable(s) => Some(s.clone()),
                datalog_ast::FindElement::Aggregate { .. } => None,
            })
            .collect();
        Ok(Plan::single(query.clone(), keep))
    }
}

fn main() -> EngineResult<()> {
    let matcher = InMemoryPatternMatcher::new();
    matcher.add_fact("person", vec![Value::Str("alice".into())]);
    matcher.add_fact("person", vec![Value::Str("bob".into())]);
    matcher.add_fact("likes", vec![Value::Str("alice".into()), Value::Str("pizza".into())]);
    matcher.add_fact("likes", vec![Value::Str("bob".into()), Value::Str("sushi".into())]);

    let planner = SinglePhasePlanner;
    let executor = Executor::new(&matcher, &planner, ExecutorOptions::default());

    let query = QueryBuilder::new()
        .find_var("name")
        .find_var("food")
        .pattern(PatternBuilder::new("person").var("name").build())
        .pattern(PatternBuilder::new("likes").var("name").var("food").build())
        .order_by_asc("name")
        .build();

    let result = executor.execute(&query)?;
    for tuple in result.iterator()? {
        println!("{:?}", tuple.values());
    }
    Ok(())
}
