//! # Join engine
//!
//! Column-name-aware orchestration over the column-index primitives in
//! [`multi`], [`hash`], and [`symmetric`]: `natural_join` discovers
//! shared symbols between two relations' column lists, `hash_join` takes
//! an explicit symbol-pair equi-join spec, and `semi_join`/`anti_join`
//! partition the left side by match existence without widening its
//! columns. Strategy selection between a materialized build/probe join
//! and a streaming symmetric join lives here too, per the "Strategy
//! selection" rule: symmetric only applies when both inputs are
//! streaming and the option is enabled, otherwise the smaller side is
//! materialized as the build side.

pub mod bloom;
pub mod hash;
pub mod multi;
pub mod symmetric;

use crate::relation::streaming::TupleIter;
use crate::value::Tuple;
use datalog_ast::Symbol;
use hash::{HashIndex, JoinKeySpec};
use multi::{multi_column_hash_join, JoinCondition};
use symmetric::SymmetricHashJoin;

/// Find every column shared by name between two column lists and express
/// it as an equality condition over column indices.
pub fn shared_conditions(left_columns: &[Symbol], right_columns: &[Symbol]) -> Vec<JoinCondition> {
    let mut conditions = Vec::new();
    for (left_index, left_symbol) in left_columns.iter().enumerate() {
        if let Some(right_index) = right_columns.iter().position(|s| s == left_symbol) {
            conditions.push(JoinCondition::eq(left_index, right_index));
        }
    }
    conditions
}

/// The output column list for a join: left columns, then right columns
/// with the ones already covered by an equality condition dropped (they
/// duplicate a left column under the same name).
pub fn output_columns(left_columns: &[Symbol], right_columns: &[Symbol], conditions: &[JoinCondition]) -> Vec<Symbol> {
    let covered: Vec<usize> = conditions.iter().map(|c| c.right).collect();
    let mut columns = left_columns.to_vec();
    for (i, symbol) in right_columns.iter().enumerate() {
        if !covered.contains(&i) {
            columns.push(symbol.clone());
        }
    }
    columns
}

/// Equi-join on every symbol the two relations have in common.
pub fn natural_join(left_columns: &[Symbol], left: &[Tuple], right_columns: &[Symbol], right: &[Tuple]) -> (Vec<Symbol>, Vec<Tuple>) {
    let conditions = shared_conditions(left_columns, right_columns);
    let tuples = multi_column_hash_join(left, right, &conditions, false);
    (output_columns(left_columns, right_columns, &conditions), tuples)
}

/// Equi-join on an explicit `(left_symbol, right_symbol)` pair list,
/// with an optional Bloom-filter-assisted probe.
pub fn hash_join(
    left_columns: &[Symbol],
    left: &[Tuple],
    right_columns: &[Symbol],
    right: &[Tuple],
    pairs: &[(Symbol, Symbol)],
    use_bloom: bool,
) -> (Vec<Symbol>, Vec<Tuple>) {
    let conditions: Vec<JoinCondition> = pairs
        .iter()
        .filter_map(|(l, r)| {
            let left_index = left_columns.iter().position(|s| s == l)?;
            let right_index = right_columns.iter().position(|s| s == r)?;
            Some(JoinCondition::eq(left_index, right_index))
        })
        .collect();
    let tuples = multi_column_hash_join(left, right, &conditions, use_bloom);
    (output_columns(left_columns, right_columns, &conditions), tuples)
}

fn key_indices(columns: &[Symbol], pairs: &[(Symbol, Symbol)], take_left: bool) -> Vec<usize> {
    pairs
        .iter()
        .filter_map(|(l, r)| {
            let symbol = if take_left { l } else { r };
            columns.iter().position(|s| s == symbol)
        })
        .collect()
}

/// Keep left tuples that have at least one matching right tuple. Output
/// columns are unchanged from the left side.
pub fn semi_join(left_columns: &[Symbol], left: &[Tuple], right_columns: &[Symbol], right: &[Tuple], pairs: &[(Symbol, Symbol)]) -> Vec<Tuple> {
    let left_keys = key_indices(left_columns, pairs, true);
    let right_keys = key_indices(right_columns, pairs, false);
    let index = HashIndex::build(JoinKeySpec::new(right_keys), right.iter().cloned(), right.len() > 64);
    left.iter()
        .filter(|tuple| {
            let key: Vec<_> = left_keys.iter().map(|&i| tuple.values()[i].clone()).collect();
            index.probe(&key).next().is_some()
        })
        .cloned()
        .collect()
}

/// Keep left tuples with *no* matching right tuple.
pub fn anti_join(left_columns: &[Symbol], left: &[Tuple], right_columns: &[Symbol], right: &[Tuple], pairs: &[(Symbol, Symbol)]) -> Vec<Tuple> {
    let left_keys = key_indices(left_columns, pairs, true);
    let right_keys = key_indices(right_columns, pairs, false);
    let index = HashIndex::build(JoinKeySpec::new(right_keys), right.iter().cloned(), right.len() > 64);
    left.iter()
        .filter(|tuple| {
            let key: Vec<_> = left_keys.iter().map(|&i| tuple.values()[i].clone()).collect();
            index.probe(&key).next().is_none()
        })
        .cloned()
        .collect()
}

/// Equi-join over two streaming sources without fully materializing
/// either one first. The key index lists must already be resolved
/// against `left_columns`/`right_columns`.
pub fn streaming_join(
    left_columns: &[Symbol],
    left: TupleIter,
    right_columns: &[Symbol],
    right: TupleIter,
    pairs: &[(Symbol, Symbol)],
) -> (Vec<Symbol>, TupleIter) {
    let left_keys = key_indices(left_columns, pairs, true);
    let right_keys = key_indices(right_columns, pairs, false);
    let conditions: Vec<JoinCondition> = left_keys.iter().zip(right_keys.iter()).map(|(&l, &r)| JoinCondition::eq(l, r)).collect();
    let columns = output_columns(left_columns, right_columns, &conditions);
    let join = SymmetricHashJoin::new(left, right, left_keys, right_keys);
    (columns, Box::new(join))
}
