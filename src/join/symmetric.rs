//! # Symmetric hash join
//!
//! For streaming×streaming inputs where neither side can be fully
//! materialized up front without losing the point of streaming: both
//! sides build their hash table incrementally as they're pulled, and
//! each newly-seen tuple probes the *other* side's table-so-far. Output
//! order is therefore interleaved rather than grouped by build side, but
//! every eventual match is still produced exactly once.

use crate::relation::streaming::TupleIter;
use crate::value::{Tuple, Value};
use std::collections::{HashMap, VecDeque};

fn key_of(tuple: &Tuple, indices: &[usize]) -> Vec<Value> {
    indices.iter().map(|&i| tuple.values()[i].clone()).collect()
}

/// Combine a left tuple with a right tuple, dropping the right side's
/// join columns since they duplicate the left side's (natural join
/// convention, shared with `join::multi`).
fn combine(left: &Tuple, right: &Tuple, right_keys: &[usize]) -> Tuple {
    let mut values: Vec<Value> = left.values().to_vec();
    for (i, value) in right.values().iter().enumerate() {
        if !right_keys.contains(&i) {
            values.push(value.clone());
        }
    }
    Tuple::new(values)
}

pub struct SymmetricHashJoin {
    left: TupleIter,
    right: TupleIter,
    left_keys: Vec<usize>,
    right_keys: Vec<usize>,
    left_table: HashMap<Vec<Value>, Vec<Tuple>>,
    right_table: HashMap<Vec<Value>, Vec<Tuple>>,
    pending: VecDeque<Tuple>,
    left_done: bool,
    right_done: bool,
    pull_left_next: bool,
}

impl SymmetricHashJoin {
    pub fn new(left: TupleIter, right: TupleIter, left_keys: Vec<usize>, right_keys: Vec<usize>) -> Self {
        SymmetricHashJoin {
            left,
            right,
            left_keys,
            right_keys,
            left_table: HashMap::new(),
            right_table: HashMap::new(),
            pending: VecDeque::new(),
            left_done: false,
            right_done: false,
            pull_left_next: true,
        }
    }

    fn pull_left(&mut self) {
        match self.left.next() {
            Some(tuple) => {
                let key = key_of(&tuple, &self.left_keys);
                if let Some(matches) = self.right_table.get(&key) {
                    for right_tuple in matches {
                        self.pending.push_back(combine(&tuple, right_tuple, &self.right_keys));
                    }
                }
                self.left_table.entry(key).or_default().push(tuple);
            }
            None => self.left_done = true,
        }
    }

    fn pull_right(&mut self) {
        match self.right.next() {
            Some(tuple) => {
                let key = key_of(&tuple, &self.right_keys);
                if let Some(matches) = self.left_table.get(&key) {
                    for left_tuple in matches {
                        self.pending.push_back(combine(left_tuple, &tuple, &self.right_keys));
                    }
                }
                self.right_table.entry(key).or_default().push(tuple);
            }
            None => self.right_done = true,
        }
    }
}

impl Iterator for SymmetricHashJoin {
    type Item = Tuple;

    fn next(&mut self) -> Option<Tuple> {
        loop {
            if let Some(tuple) = self.pending.pop_front() {
                return Some(tuple);
            }
            if self.left_done && self.right_done {
                return None;
            }
            let pull_left = self.pull_left_next && !self.left_done || self.right_done;
            self.pull_left_next = !self.pull_left_next;
            if pull_left {
                self.pull_left();
            } else {
                self.pull_right();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iter_of(tuples: Vec<Tuple>) -> TupleIter {
        Box::new(tuples.into_iter())
    }

    #[test]
    fn symmetric_join_finds_matches_regardless_of_arrival_order() {
        let left = iter_of(vec![
            Tuple::new(vec![Value::Int(1), Value::Str("a".into())]),
            Tuple::new(vec![Value::Int(2), Value::Str("b".into())]),
        ]);
        let right = iter_of(vec![
            Tuple::new(vec![Value::Int(2), Value::Str("x".into())]),
            Tuple::new(vec![Value::Int(1), Value::Str("y".into())]),
        ]);
        let join = SymmetricHashJoin::new(left, right, vec![0], vec![0]);
        let mut results: Vec<Tuple> = join.collect();
        results.sort_by(|a, b| a.values()[0].cmp(&b.values()[0]));
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].values()[0], Value::Int(1));
        assert_eq!(results[0].values()[2], Value::Str("y".into()));
    }

    #[test]
    fn symmetric_join_drops_duplicate_right_key_column() {
        let left = iter_of(vec![Tuple::new(vec![Value::Int(1)])]);
        let right = iter_of(vec![Tuple::new(vec![Value::Int(1), Value::Str("z".into())])]);
        let join = SymmetricHashJoin::new(left, right, vec![0], vec![0]);
        let results: Vec<Tuple> = join.collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].width(), 2);
    }

    #[test]
    fn symmetric_join_with_no_overlap_is_empty() {
        let left = iter_of(vec![Tuple::new(vec![Value::Int(1)])]);
        let right = iter_of(vec![Tuple::new(vec![Value::Int(2)])]);
        let join = SymmetricHashJoin::new(left, right, vec![0], vec![0]);
        assert_eq!(join.count(), 0);
    }
}
