//! Property-based tests for the invariants in §8: projection
//! idempotence, join-strategy equivalence, semi/anti-join partition,
//! the double-iteration contract, and batch/streaming aggregation
//! equivalence.

use datalog_ast::{AggregateFunc, Find, FindElement, Symbol};
use datalog_engine::error::EngineError;
use datalog_engine::join::{anti_join, hash_join, natural_join, semi_join};
use datalog_engine::options::ExecutorOptions;
use datalog_engine::relation::Relation;
use datalog_engine::value::{Tuple, Value};
use proptest::prelude::*;
use std::collections::HashSet;

fn sym(name: &str) -> Symbol {
    Symbol::new(name)
}

fn sort_tuples(mut tuples: Vec<Tuple>) -> Vec<Tuple> {
    tuples.sort_by(|a, b| a.values().cmp(b.values()));
    tuples
}

fn small_values() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(0i64..20, 0..30)
}

proptest! {
    #[test]
    fn tuple_width_matches_column_count(values in small_values()) {
        let columns: Vec<Symbol> = vec![sym("a")];
        let tuples: Vec<Tuple> = values.iter().map(|v| Tuple::new(vec![Value::Int(*v)])).collect();
        let relation = Relation::materialized(columns.clone(), tuples);
        for tuple in relation.iterator().unwrap() {
            prop_assert_eq!(tuple.width(), relation.columns().len());
        }
    }

    #[test]
    fn projection_onto_same_columns_is_idempotent(values in small_values()) {
        let columns = vec![sym("a")];
        let tuples: Vec<Tuple> = values.iter().map(|v| Tuple::new(vec![Value::Int(*v)])).collect();
        let relation = Relation::materialized(columns.clone(), tuples);
        let once = relation.project(&columns).unwrap().materialize().unwrap();
        let twice = once.project(&columns).unwrap().materialize().unwrap();
        let once_tuples: Vec<Tuple> = once.iterator().unwrap().collect();
        let twice_tuples: Vec<Tuple> = twice.iterator().unwrap().collect();
        prop_assert_eq!(sort_tuples(once_tuples), sort_tuples(twice_tuples));
    }

    #[test]
    fn hash_join_and_natural_join_agree(left_values in small_values(), right_values in small_values()) {
        let left_columns = vec![sym("k"), sym("l")];
        let right_columns = vec![sym("k"), sym("r")];
        let left: Vec<Tuple> = left_values.iter().map(|v| Tuple::new(vec![Value::Int(v % 5), Value::Int(*v)])).collect();
        let right: Vec<Tuple> = right_values.iter().map(|v| Tuple::new(vec![Value::Int(v % 5), Value::Int(*v)])).collect();

        let (natural_columns, natural_tuples) = natural_join(&left_columns, &left, &right_columns, &right);
        let (hash_columns, hash_tuples) = hash_join(&left_columns, &left, &right_columns, &right, &[(sym("k"), sym("k"))], false);

        prop_assert_eq!(natural_columns, hash_columns);
        prop_assert_eq!(sort_tuples(natural_tuples), sort_tuples(hash_tuples));
    }

    #[test]
    fn semi_and_anti_join_partition_left(left_values in small_values(), right_values in small_values()) {
        let left_columns = vec![sym("k")];
        let right_columns = vec![sym("k")];
        let left: Vec<Tuple> = left_values.iter().map(|v| Tuple::new(vec![Value::Int(v % 5)])).collect();
        let right: Vec<Tuple> = right_values.iter().map(|v| Tuple::new(vec![Value::Int(v % 5)])).collect();
        let pairs = [(sym("k"), sym("k"))];

        let kept = semi_join(&left_columns, &left, &right_columns, &right, &pairs);
        let dropped = anti_join(&left_columns, &left, &right_columns, &right, &pairs);

        let mut reunited = kept.clone();
        reunited.extend(dropped.clone());
        prop_assert_eq!(sort_tuples(reunited), sort_tuples(left.clone()));

        let kept_set: HashSet<Tuple> = kept.into_iter().collect();
        let dropped_set: HashSet<Tuple> = dropped.into_iter().collect();
        prop_assert!(kept_set.is_disjoint(&dropped_set));
    }

    #[test]
    fn batch_and_streaming_aggregation_agree(values in small_values()) {
        let columns = vec![sym("group"), sym("amount")];
        let tuples: Vec<Tuple> = values.iter().map(|v| Tuple::new(vec![Value::Int(v % 4), Value::Int(*v)])).collect();
        let find = Find::new(vec![
            FindElement::Variable(sym("group")),
            FindElement::Aggregate { func: AggregateFunc::Sum, arg: sym("amount"), condition: None },
        ]);

        let batch_relation = Relation::materialized(columns.clone(), tuples.clone());
        let batch_result = batch_relation.aggregate(&find, &ExecutorOptions::default()).unwrap().materialize().unwrap();

        let streaming_relation = Relation::streaming(columns.clone(), Box::new(tuples.into_iter()));
        let streaming_result = streaming_relation.aggregate(&find, &ExecutorOptions::default()).unwrap().materialize().unwrap();

        let batch_tuples: Vec<Tuple> = batch_result.iterator().unwrap().collect();
        let streaming_tuples: Vec<Tuple> = streaming_result.iterator().unwrap().collect();
        prop_assert_eq!(sort_tuples(batch_tuples), sort_tuples(streaming_tuples));
    }
}

#[test]
fn double_iteration_without_materialize_errors() {
    let relation = Relation::streaming(vec![sym("a")], Box::new(vec![Tuple::new(vec![Value::Int(1)])].into_iter()));
    let _first = relation.iterator().unwrap();
    let second = relation.iterator();
    assert!(matches!(second, Err(EngineError::DoubleIteration(_))));
}

#[test]
fn materialize_then_iterate_twice_yields_identical_tuples() {
    let relation = Relation::streaming(vec![sym("a")], Box::new(vec![Tuple::new(vec![Value::Int(1)]), Tuple::new(vec![Value::Int(2)])].into_iter()));
    let materialized = relation.materialize().unwrap();
    let first: Vec<Tuple> = materialized.iterator().unwrap().collect();
    let second: Vec<Tuple> = materialized.iterator().unwrap().collect();
    assert_eq!(sort_tuples(first), sort_tuples(second));
}
