//! # Multi-column hash join with aliased equi-join columns
//!
//! The general join core that `join::mod`'s `natural_join`/`hash_join`
//! both reduce to: a list of `(left_column, right_column, op)`
//! conditions where only `Eq` conditions participate in the hash build;
//! any non-equality condition (e.g. a `<` correlation) is retained as a
//! post-probe filter rather than folded into the hash key, per the
//! "non-equality reverts to natural join + filter" rule.

use crate::functions::eval_comparison;
use crate::join::hash::{HashIndex, JoinKeySpec};
use crate::value::{Tuple, Value};
use datalog_ast::ComparisonOp;

/// One column-aliased join condition: `left[left] op right[right]`.
#[derive(Debug, Clone)]
pub struct JoinCondition {
    pub left: usize,
    pub right: usize,
    pub op: ComparisonOp,
}

impl JoinCondition {
    pub fn eq(left: usize, right: usize) -> Self {
        JoinCondition { left, right, op: ComparisonOp::Eq }
    }
}

fn combine(left: &Tuple, right: &Tuple, right_columns_to_skip: &[usize]) -> Tuple {
    let mut values: Vec<Value> = left.values().to_vec();
    for (i, value) in right.values().iter().enumerate() {
        if !right_columns_to_skip.contains(&i) {
            values.push(value.clone());
        }
    }
    Tuple::new(values)
}

/// Run the full multi-column join. `use_bloom` requests a Bloom-filter
/// assisted probe on the build side (only meaningful when at least one
/// equality condition exists).
pub fn multi_column_hash_join(left: &[Tuple], right: &[Tuple], conditions: &[JoinCondition], use_bloom: bool) -> Vec<Tuple> {
    let equalities: Vec<&JoinCondition> = conditions.iter().filter(|c| c.op == ComparisonOp::Eq).collect();
    let residual: Vec<&JoinCondition> = conditions.iter().filter(|c| c.op != ComparisonOp::Eq).collect();

    if equalities.is_empty() {
        return cartesian_then_filter(left, right, conditions);
    }

    let right_key_columns: Vec<usize> = equalities.iter().map(|c| c.right).collect();
    let left_key_columns: Vec<usize> = equalities.iter().map(|c| c.left).collect();

    // Build on the smaller side so the probe loop runs over the larger
    // one; join output order follows the probe side.
    let (build_on_right, build, build_keys, probe, probe_keys) = if right.len() <= left.len() {
        (true, right, right_key_columns.clone(), left, left_key_columns.clone())
    } else {
        (false, left, left_key_columns.clone(), right, right_key_columns.clone())
    };

    let index = HashIndex::build(JoinKeySpec::new(build_keys), build.iter().cloned(), use_bloom);

    let mut output = Vec::new();
    for probe_tuple in probe {
        let key: Vec<Value> = probe_keys.iter().map(|&i| probe_tuple.values()[i].clone()).collect();
        for build_tuple in index.probe(&key) {
            let (left_tuple, right_tuple) = if build_on_right {
                (probe_tuple, build_tuple)
            } else {
                (build_tuple, probe_tuple)
            };
            if residual.iter().all(|c| eval_comparison(c.op, &left_tuple.values()[c.left], &right_tuple.values()[c.right])) {
                output.push(combine(left_tuple, right_tuple, &right_key_columns));
            }
        }
    }
    output
}

fn cartesian_then_filter(left: &[Tuple], right: &[Tuple], conditions: &[JoinCondition]) -> Vec<Tuple> {
    let mut output = Vec::new();
    for left_tuple in left {
        for right_tuple in right {
            if conditions.iter().all(|c| eval_comparison(c.op, &left_tuple.values()[c.left], &right_tuple.values()[c.right])) {
                output.push(combine(left_tuple, right_tuple, &[]));
            }
        }
    }
    output
}
