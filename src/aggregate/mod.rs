//! # Grouped aggregation
//!
//! Batch aggregation per §4.5: partition tuples by the `:find` list's
//! non-aggregate variables, then fold each aggregate element over its
//! group. A conditional aggregate (`(sum ?amount | ?approved)`) drops
//! rows where the condition column isn't exactly `true` before folding,
//! independently per aggregate element. `streaming` holds the
//! single-pass rolling-state variant used once the input crosses
//! `streaming_aggregation_threshold`.

pub mod streaming;

use crate::value::{Tuple, Value};
use datalog_ast::{AggregateFunc, Find, FindElement, Symbol};
use std::collections::HashMap;

fn column_index(columns: &[Symbol], symbol: &Symbol) -> usize {
    columns
        .iter()
        .position(|s| s == symbol)
        .unwrap_or_else(|| panic!("aggregate references unbound column {symbol}"))
}

pub(crate) fn output_columns(find: &Find) -> Vec<Symbol> {
    find.elements
        .iter()
        .map(|e| match e {
            FindElement::Variable(s) => s.clone(),
            FindElement::Aggregate { .. } => Symbol::new(e.output_name()),
        })
        .collect()
}

/// Rows passing a conditional aggregate's guard column, or every row if
/// there is no condition.
fn passing<'a>(group: &'a [&'a Tuple], condition_index: Option<usize>) -> Vec<&'a Tuple> {
    match condition_index {
        Some(i) => group.iter().filter(|t| matches!(t.values()[i], Value::Bool(true))).copied().collect(),
        None => group.to_vec(),
    }
}

/// Fold a single aggregate element over a group's rows. `None` condition
/// index means the element has no conditional guard.
pub(crate) fn fold_aggregate(func: AggregateFunc, arg_index: usize, condition_index: Option<usize>, group: &[&Tuple]) -> Value {
    let rows = passing(group, condition_index);
    match func {
        AggregateFunc::Count => Value::Int(rows.len() as i64),
        AggregateFunc::Sum => fold_sum(arg_index, &rows),
        AggregateFunc::Avg => fold_avg(arg_index, &rows),
        AggregateFunc::Min => fold_extreme(arg_index, &rows, true),
        AggregateFunc::Max => fold_extreme(arg_index, &rows, false),
    }
}

fn fold_sum(arg_index: usize, rows: &[&Tuple]) -> Value {
    let values: Vec<&Value> = rows.iter().map(|t| &t.values()[arg_index]).collect();
    if values.is_empty() {
        return Value::Nil;
    }
    if values.iter().all(|v| matches!(v, Value::Int(_))) {
        let sum: i64 = values
            .iter()
            .map(|v| match v {
                Value::Int(i) => *i,
                _ => unreachable!(),
            })
            .sum();
        Value::Int(sum)
    } else {
        let sum: f64 = values.iter().filter_map(|v| v.as_numeric()).sum();
        Value::Float(sum)
    }
}

fn fold_avg(arg_index: usize, rows: &[&Tuple]) -> Value {
    let numeric: Vec<f64> = rows.iter().filter_map(|t| t.values()[arg_index].as_numeric()).collect();
    if numeric.is_empty() {
        Value::Nil
    } else {
        Value::Float(numeric.iter().sum::<f64>() / numeric.len() as f64)
    }
}

fn fold_extreme(arg_index: usize, rows: &[&Tuple], want_min: bool) -> Value {
    let values: Vec<&Value> = rows.iter().map(|t| &t.values()[arg_index]).collect();
    let chosen = if want_min {
        values.into_iter().min()
    } else {
        values.into_iter().max()
    };
    chosen.cloned().unwrap_or(Value::Nil)
}

/// Batch-aggregate `tuples` per the find list, returning the output
/// columns and the resulting (possibly empty) rows.
///
/// An empty input always produces zero rows, whether or not the find
/// list has a group-by key — including the pure global-aggregate case
/// (no group-by at all). The aggregation engine never emits a row of
/// `Nil`/`count=0` to stand in for "no contributing values".
pub fn aggregate(columns: &[Symbol], tuples: &[Tuple], find: &Find) -> (Vec<Symbol>, Vec<Tuple>) {
    let group_by = find.group_by_symbols();
    let group_indices: Vec<usize> = group_by.iter().map(|s| column_index(columns, s)).collect();
    let out_columns = output_columns(find);

    if tuples.is_empty() {
        return (out_columns, Vec::new());
    }

    let mut groups: HashMap<Vec<Value>, Vec<&Tuple>> = HashMap::new();
    for tuple in tuples {
        let key: Vec<Value> = group_indices.iter().map(|&i| tuple.values()[i].clone()).collect();
        groups.entry(key).or_default().push(tuple);
    }

    let mut rows: Vec<Tuple> = groups
        .into_values()
        .map(|group| build_row(columns, find, &group_indices, &group))
        .collect();
    rows.sort_by(|a, b| a.values().cmp(b.values()));
    (out_columns, rows)
}

fn build_row(columns: &[Symbol], find: &Find, group_indices: &[usize], group: &[&Tuple]) -> Tuple {
    let group_by = find.group_by_symbols();
    let key: Vec<Value> = if group.is_empty() {
        Vec::new()
    } else {
        group_indices.iter().map(|&i| group[0].values()[i].clone()).collect()
    };
    let values = find
        .elements
        .iter()
        .map(|element| match element {
            FindElement::Variable(s) => {
                let position = group_by.iter().position(|g| g == s).expect("group-by symbol present in key");
                key.get(position).cloned().unwrap_or(Value::Nil)
            }
            FindElement::Aggregate { func, arg, condition } => {
                let arg_index = column_index(columns, arg);
                let condition_index = condition.as_ref().map(|c| column_index(columns, c));
                fold_aggregate(*func, arg_index, condition_index, group)
            }
        })
        .collect();
    Tuple::new(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use datalog_ast::AggregateFunc;

    fn sym(name: &str) -> Symbol {
        Symbol::new(name)
    }

    #[test]
    fn grouped_sum_buckets_by_non_aggregate_variable() {
        let columns = vec![sym("?category"), sym("?amount")];
        let tuples = vec![
            Tuple::new(vec![Value::Str("a".into()), Value::Int(10)]),
            Tuple::new(vec![Value::Str("a".into()), Value::Int(5)]),
            Tuple::new(vec![Value::Str("b".into()), Value::Int(1)]),
        ];
        let find = Find::new(vec![
            FindElement::Variable(sym("?category")),
            FindElement::Aggregate { func: AggregateFunc::Sum, arg: sym("?amount"), condition: None },
        ]);
        let (out_columns, rows) = aggregate(&columns, &tuples, &find);
        assert_eq!(out_columns, vec![sym("?category"), sym("sum(?amount)")]);
        assert_eq!(rows.len(), 2);
        let a_row = rows.iter().find(|r| r.values()[0] == Value::Str("a".into())).unwrap();
        assert_eq!(a_row.values()[1], Value::Int(15));
    }

    #[test]
    fn conditional_aggregate_skips_rows_failing_the_guard() {
        let columns = vec![sym("?amount"), sym("?approved")];
        let tuples = vec![
            Tuple::new(vec![Value::Int(10), Value::Bool(true)]),
            Tuple::new(vec![Value::Int(90), Value::Bool(false)]),
        ];
        let find = Find::new(vec![FindElement::Aggregate {
            func: AggregateFunc::Sum,
            arg: sym("?amount"),
            condition: Some(sym("?approved")),
        }]);
        let (_, rows) = aggregate(&columns, &tuples, &find);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values()[0], Value::Int(10));
    }

    #[test]
    fn empty_input_with_no_group_by_produces_no_rows() {
        let columns = vec![sym("?amount")];
        let find = Find::new(vec![FindElement::Aggregate { func: AggregateFunc::Sum, arg: sym("?amount"), condition: None }]);
        let (_, rows) = aggregate(&columns, &[], &find);
        assert!(rows.is_empty());
    }

    #[test]
    fn empty_input_with_group_by_produces_no_rows() {
        let columns = vec![sym("?category"), sym("?amount")];
        let find = Find::new(vec![
            FindElement::Variable(sym("?category")),
            FindElement::Aggregate { func: AggregateFunc::Sum, arg: sym("?amount"), condition: None },
        ]);
        let (_, rows) = aggregate(&columns, &[], &find);
        assert!(rows.is_empty());
    }

    #[test]
    fn min_and_max_preserve_original_value_kind() {
        let columns = vec![sym("?label")];
        let tuples = vec![
            Tuple::new(vec![Value::Str("banana".into())]),
            Tuple::new(vec![Value::Str("apple".into())]),
        ];
        let find = Find::new(vec![FindElement::Aggregate { func: AggregateFunc::Min, arg: sym("?label"), condition: None }]);
        let (_, rows) = aggregate(&columns, &tuples, &find);
        assert_eq!(rows[0].values()[0], Value::Str("apple".into()));
    }
}
