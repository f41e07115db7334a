//! End-to-end scenarios, literal inputs to literal outputs.

use datalog_ast::builders::{PatternBuilder, QueryBuilder, SubqueryBuilder};
use datalog_ast::{AggregateFunc, Clause, ComparisonOp, Constant, Find, FindElement, Query, Symbol, Term};
use datalog_engine::error::EngineResult;
use datalog_engine::options::ExecutorOptions;
use datalog_engine::pattern_matcher::InMemoryPatternMatcher;
use datalog_engine::value::Value;
use datalog_engine::{Executor, Planner};
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

fn sym(name: &str) -> Symbol {
    Symbol::new(name)
}

#[test]
fn basic_scan() {
    let matcher = InMemoryPatternMatcher::new();
    matcher.add_fact("user/name", vec![Value::Entity(1), Value::Str("Alice".into())]);
    matcher.add_fact("user/name", vec![Value::Entity(2), Value::Str("Bob".into())]);

    let planner = SinglePhasePlanner;
    let executor = Executor::new(&matcher, &planner, ExecutorOptions::default());
    let query = QueryBuilder::new()
        .find_var("name")
        .pattern(PatternBuilder::new("user/name").var("e").var("name").build())
        .order_by_asc("name")
        .build();

    let result = executor.execute(&query).unwrap();
    let names: Vec<String> = result
        .iterator()
        .unwrap()
        .map(|t| match &t.values()[0] {
            Value::Str(s) => s.to_string(),
            other => panic!("expected string, got {other:?}"),
        })
        .collect();
    assert_eq!(names, vec!["Alice", "Bob"]);
}

#[test]
fn friend_of_friend_join() {
    let matcher = InMemoryPatternMatcher::new();
    matcher.add_fact("user/name", vec![Value::Entity(1), Value::Str("Alice".into())]);
    matcher.add_fact("user/name", vec![Value::Entity(3), Value::Str("Charlie".into())]);
    matcher.add_fact("user/friend", vec![Value::Entity(1), Value::Entity(2)]);
    matcher.add_fact("user/friend", vec![Value::Entity(2), Value::Entity(3)]);

    let planner = SinglePhasePlanner;
    let executor = Executor::new(&matcher, &planner, ExecutorOptions::default());
    let query = QueryBuilder::new()
        .find_var("name")
        .find_var("fofname")
        .pattern(PatternBuilder::new("user/name").var("e").var("name").build())
        .pattern(PatternBuilder::new("user/friend").var("e").var("f").build())
        .pattern(PatternBuilder::new("user/friend").var("f").var("fof").build())
        .pattern(PatternBuilder::new("user/name").var("fof").var("fofname").build())
        .build();

    let result = executor.execute(&query).unwrap();
    assert_eq!(result.size().unwrap(), 1);
    let row = result.iterator().unwrap().next().unwrap();
    assert_eq!(row.values()[0], Value::Str("Alice".into()));
    assert_eq!(row.values()[1], Value::Str("Charlie".into()));
}

#[test]
fn predicate_filters_by_age() {
    let matcher = InMemoryPatternMatcher::new();
    matcher.add_fact("person", vec![Value::Str("Alice".into()), Value::Int(30)]);
    matcher.add_fact("person", vec![Value::Str("Bob".into()), Value::Int(25)]);
    matcher.add_fact("person", vec![Value::Str("Charlie".into()), Value::Int(35)]);

    let planner = SinglePhasePlanner;
    let executor = Executor::new(&matcher, &planner, ExecutorOptions::default());
    let query = QueryBuilder::new()
        .find_var("name")
        .pattern(PatternBuilder::new("person").var("name").var("age").build())
        .predicate(ComparisonOp::Lt, vec![Term::var("age"), Term::Const(Constant::Int(30))])
        .build();

    let result = executor.execute(&query).unwrap();
    assert_eq!(result.size().unwrap(), 1);
    let row = result.iterator().unwrap().next().unwrap();
    assert_eq!(row.values()[0], Value::Str("Bob".into()));
}

#[test]
fn grouped_count_per_customer() {
    let matcher = InMemoryPatternMatcher::new();
    matcher.add_fact("order", vec![Value::Str("Alice".into()), Value::Int(1)]);
    matcher.add_fact("order", vec![Value::Str("Alice".into()), Value::Int(2)]);
    matcher.add_fact("order", vec![Value::Str("Bob".into()), Value::Int(3)]);

    let planner = SinglePhasePlanner;
    let executor = Executor::new(&matcher, &planner, ExecutorOptions::default());
    let query = QueryBuilder::new()
        .find_var("name")
        .find_aggregate(AggregateFunc::Count, "order", None)
        .pattern(PatternBuilder::new("order").var("name").var("order").build())
        .order_by_asc("name")
        .build();

    let result = executor.execute(&query).unwrap();
    let rows: Vec<_> = result.iterator().unwrap().collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].values(), &[Value::Str("Alice".into()), Value::Int(2)]);
    assert_eq!(rows[1].values(), &[Value::Str("Bob".into()), Value::Int(1)]);
}

#[test]
fn empty_inner_subquery_drops_the_outer_person() {
    let matcher = InMemoryPatternMatcher::new();
    matcher.add_fact("person", vec![Value::Str("Alice".into())]);
    matcher.add_fact("person", vec![Value::Str("Bob".into())]);
    matcher.add_fact("order", vec![Value::Str("Bob".into()), Value::Float(100.5)]);

    let planner = SinglePhasePlanner;
    let executor = Executor::new(&matcher, &planner, ExecutorOptions::default());

    let inner = QueryBuilder::new()
        .find_aggregate(AggregateFunc::Max, "price", None)
        .pattern(PatternBuilder::new("order").var("who").var("price").build())
        .input_scalar("who")
        .build();
    let subquery = SubqueryBuilder::new(inner).correlate("who").bind_scalar("maxprice").build();

    let outer_pattern = PatternBuilder::new("person").var("who").build();
    let query = Query::new(
        Find::new(vec![FindElement::Variable(sym("who")), FindElement::Variable(sym("maxprice"))]),
        vec![Clause::DataPattern(outer_pattern), Clause::Subquery(subquery)],
    );

    let result = executor.execute(&query).unwrap();
    assert_eq!(result.size().unwrap(), 1);
    let row = result.iterator().unwrap().next().unwrap();
    assert_eq!(row.values()[0], Value::Str("Bob".into()));
    assert_eq!(row.values()[1], Value::Float(100.5));
}

#[test]
fn correlated_subquery_max_price_per_category() {
    let matcher = InMemoryPatternMatcher::new();
    for category in 0..5i64 {
        matcher.add_fact("category", vec![Value::Int(category)]);
        for product in 0..10i64 {
            matcher.add_fact("price", vec![Value::Int(category), Value::Int(100 + category + product)]);
        }
    }

    let planner = SinglePhasePlanner;
    let executor = Executor::new(&matcher, &planner, ExecutorOptions::default());

    let inner = QueryBuilder::new()
        .find_aggregate(AggregateFunc::Max, "price", None)
        .pattern(PatternBuilder::new("price").var("cat").var("price").build())
        .input_scalar("cat")
        .build();
    let subquery = SubqueryBuilder::new(inner).correlate("cat").bind_scalar("maxprice").build();

    let outer_pattern = PatternBuilder::new("category").var("cat").build();
    let query = Query::new(
        Find::new(vec![FindElement::Variable(sym("cat")), FindElement::Variable(sym("maxprice"))]),
        vec![Clause::DataPattern(outer_pattern), Clause::Subquery(subquery)],
    )
    .with_order_by(vec![datalog_ast::OrderBy::asc("cat")]);

    let result = executor.execute(&query).unwrap();
    let rows: Vec<_> = result.iterator().unwrap().collect();
    assert_eq!(rows.len(), 5);
    for (category, row) in rows.into_iter().enumerate() {
        assert_eq!(row.values()[0], Value::Int(category as i64));
        assert_eq!(row.values()[1], Value::Int(100 + category as i64 + 9));
    }
}

#[test]
fn relation_input_iterates_the_query_once_per_bound_tuple() {
    use datalog_engine::relation::Relation;

    let matcher = InMemoryPatternMatcher::new();
    matcher.add_fact("likes", vec![Value::Str("Alice".into()), Value::Str("pie".into())]);
    matcher.add_fact("likes", vec![Value::Str("Bob".into()), Value::Str("cake".into())]);
    matcher.add_fact("likes", vec![Value::Str("Bob".into()), Value::Str("pie".into())]);

    let planner = SinglePhasePlanner;
    let executor = Executor::new(&matcher, &planner, ExecutorOptions::default());

    let query = QueryBuilder::new()
        .find_var("food")
        .input_relation(vec![sym("who")])
        .pattern(PatternBuilder::new("likes").var("who").var("food").build())
        .build();

    let who_input = Relation::materialized(vec![sym("who")], vec![
        datalog_engine::value::Tuple::new(vec![Value::Str("Alice".into())]),
        datalog_engine::value::Tuple::new(vec![Value::Str("Bob".into())]),
        datalog_engine::value::Tuple::new(vec![Value::Str("Nobody".into())]),
    ]);

    let result = executor.execute_with_relations(&query, vec![who_input]).unwrap();
    let mut foods: Vec<String> = result
        .iterator()
        .unwrap()
        .map(|t| match &t.values()[0] {
            Value::Str(s) => s.to_string(),
            other => panic!("expected string, got {other:?}"),
        })
        .collect();
    foods.sort();
    assert_eq!(foods, vec!["cake", "pie"]);
}
