//! # Single-pass streaming aggregation
//!
//! The rolling-state variant used once an input is large enough that
//! building the full grouped-tuple buffer first (as `aggregate::aggregate`
//! does) is wasteful: one pass over the source iterator updates a
//! per-group, per-aggregate-element `(count, sum, min, max)` accumulator,
//! and the grouped rows are only materialized once the source is
//! exhausted. Activation is threshold-gated by the caller (this module
//! doesn't know or care how large the input is).

use crate::relation::streaming::TupleIter;
use crate::value::{Tuple, Value};
use datalog_ast::{AggregateFunc, Find, FindElement, Symbol};
use std::collections::HashMap;

#[derive(Default)]
struct RollingState {
    count: i64,
    sum_int: i64,
    sum_float: f64,
    saw_float: bool,
    min: Option<Value>,
    max: Option<Value>,
}

impl RollingState {
    fn update(&mut self, value: &Value) {
        self.count += 1;
        match value {
            Value::Int(i) => {
                self.sum_int += i;
                self.sum_float += *i as f64;
            }
            Value::Float(f) => {
                self.saw_float = true;
                self.sum_float += f;
            }
            _ => {}
        }
        if self.min.as_ref().is_none_or(|m| value < m) {
            self.min = Some(value.clone());
        }
        if self.max.as_ref().is_none_or(|m| value > m) {
            self.max = Some(value.clone());
        }
    }

    fn finish(&self, func: AggregateFunc) -> Value {
        if self.count == 0 {
            return match func {
                AggregateFunc::Count => Value::Int(0),
                _ => Value::Nil,
            };
        }
        match func {
            AggregateFunc::Count => Value::Int(self.count),
            AggregateFunc::Sum => {
                if self.saw_float {
                    Value::Float(self.sum_float)
                } else {
                    Value::Int(self.sum_int)
                }
            }
            AggregateFunc::Avg => Value::Float(self.sum_float / self.count as f64),
            AggregateFunc::Min => self.min.clone().unwrap_or(Value::Nil),
            AggregateFunc::Max => self.max.clone().unwrap_or(Value::Nil),
        }
    }
}

/// Aggregate a streaming source in a single pass. Returns the same
/// output column convention as `aggregate::aggregate`.
pub fn aggregate_streaming(columns: &[Symbol], source: TupleIter, find: &Find) -> (Vec<Symbol>, Vec<Tuple>) {
    let group_by = find.group_by_symbols();
    let group_indices: Vec<usize> = group_by
        .iter()
        .map(|s| columns.iter().position(|c| c == s).expect("group-by symbol present"))
        .collect();
    let out_columns = super::output_columns(find);

    let element_specs: Vec<(usize, Option<usize>, AggregateFunc)> = find
        .elements
        .iter()
        .filter_map(|e| match e {
            FindElement::Aggregate { func, arg, condition } => {
                let arg_index = columns.iter().position(|c| c == arg).expect("aggregate arg present");
                let condition_index = condition.as_ref().map(|c| columns.iter().position(|col| col == c).expect("condition column present"));
                Some((arg_index, condition_index, *func))
            }
            FindElement::Variable(_) => None,
        })
        .collect();

    let mut groups: HashMap<Vec<Value>, Vec<RollingState>> = HashMap::new();

    for tuple in source {
        let key: Vec<Value> = group_indices.iter().map(|&i| tuple.values()[i].clone()).collect();
        let states = groups.entry(key).or_insert_with(|| element_specs.iter().map(|_| RollingState::default()).collect());
        for (state, (arg_index, condition_index, _)) in states.iter_mut().zip(element_specs.iter()) {
            let passes = condition_index.is_none_or(|i| matches!(tuple.values()[i], Value::Bool(true)));
            if passes {
                state.update(&tuple.values()[*arg_index]);
            }
        }
    }

    // An empty source produces zero groups even with no group-by key: the
    // aggregation engine never emits a row of `Nil`/`count=0` to stand in
    // for "no contributing values" (matches `aggregate::aggregate`).
    let mut rows: Vec<Tuple> = groups
        .into_iter()
        .map(|(key, states)| build_row(find, &group_by, &key, &states, &element_specs))
        .collect();
    rows.sort_by(|a, b| a.values().cmp(b.values()));
    (out_columns, rows)
}

fn build_row(find: &Find, group_by: &[Symbol], key: &[Value], states: &[RollingState], specs: &[(usize, Option<usize>, AggregateFunc)]) -> Tuple {
    let mut state_iter = states.iter();
    let mut spec_iter = specs.iter();
    let values = find
        .elements
        .iter()
        .map(|element| match element {
            FindElement::Variable(s) => {
                let position = group_by.iter().position(|g| g == s).expect("group-by symbol present");
                key.get(position).cloned().unwrap_or(Value::Nil)
            }
            FindElement::Aggregate { .. } => {
                let (_, _, func) = spec_iter.next().expect("one spec per aggregate element");
                state_iter.next().expect("one state per aggregate element").finish(*func)
            }
        })
        .collect();
    Tuple::new(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> Symbol {
        Symbol::new(name)
    }

    fn iter_of(tuples: Vec<Tuple>) -> TupleIter {
        Box::new(tuples.into_iter())
    }

    #[test]
    fn streaming_aggregation_matches_batch_for_a_simple_sum() {
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
        let (_, rows) = aggregate_streaming(&columns, iter_of(tuples), &find);
        assert_eq!(rows.len(), 2);
        let a_row = rows.iter().find(|r| r.values()[0] == Value::Str("a".into())).unwrap();
        assert_eq!(a_row.values()[1], Value::Int(15));
    }

    #[test]
    fn streaming_empty_global_aggregate_yields_no_rows() {
        let columns = vec![sym("?amount")];
        let find = Find::new(vec![FindElement::Aggregate { func: AggregateFunc::Count, arg: sym("?amount"), condition: None }]);
        let (_, rows) = aggregate_streaming(&columns, iter_of(vec![]), &find);
        assert!(rows.is_empty());
    }

    #[test]
    fn streaming_empty_grouped_aggregate_yields_no_rows() {
        let columns = vec![sym("?category"), sym("?amount")];
        let find = Find::new(vec![
            FindElement::Variable(sym("?category")),
            FindElement::Aggregate { func: AggregateFunc::Sum, arg: sym("?amount"), condition: None },
        ]);
        let (_, rows) = aggregate_streaming(&columns, iter_of(vec![]), &find);
        assert!(rows.is_empty());
    }
}
