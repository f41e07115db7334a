//! # Relation: the one data type every clause, join, and aggregate passes
//!
//! Per §4.1, a relation is a named column list plus either a fully
//! materialized tuple set or a streaming source with opt-in lazy
//! caching. Represented as a two-variant enum rather than a trait
//! object: there are only ever these two concrete shapes, and an enum
//! lets join/aggregate code match on "do I already have random access"
//! without an extra dynamic dispatch hop.
//!
//! Eagerness is an executor-level decision (`ExecutorOptions`), not a
//! property baked into this type: every transform here (`project`,
//! `filter`, `evaluate_function`) returns a lazy `Streaming` relation by
//! default, and callers opt a relation into caching by calling
//! `materialize()`.

pub mod iterator;
pub mod streaming;

use crate::error::{EngineResult, ProjectionError};
use crate::functions::FunctionRegistry;
use crate::join;
use crate::aggregate;
use crate::options::ExecutorOptions;
use crate::value::{Tuple, Value};
use datalog_ast::{Find, FunctionName, OrderBy, Predicate, Symbol, Term};
use iterator::{FilterIterator, FunctionEvaluatorIterator, PredicateFilterIterator, ProductIterator, ProjectIterator};
use std::sync::Arc;
use streaming::{CacheSlot, TupleIter};

#[derive(Clone)]
pub struct MaterializedRelation {
    columns: Vec<Symbol>,
    tuples: Arc<Vec<Tuple>>,
}

#[derive(Clone)]
pub struct StreamingRelation {
    columns: Vec<Symbol>,
    slot: CacheSlot,
}

#[derive(Clone)]
pub enum Relation {
    Materialized(MaterializedRelation),
    Streaming(StreamingRelation),
}

impl Relation {
    /// Build a materialized relation, deduplicating tuples by equality
    /// (a relation is a set, not a bag) while preserving first-seen
    /// order.
    pub fn materialized(columns: Vec<Symbol>, tuples: Vec<Tuple>) -> Self {
        let mut seen = std::collections::HashSet::with_capacity(tuples.len());
        let deduped: Vec<Tuple> = tuples.into_iter().filter(|t| seen.insert(t.clone())).collect();
        Relation::Materialized(MaterializedRelation { columns, tuples: Arc::new(deduped) })
    }

    pub fn streaming(columns: Vec<Symbol>, source: TupleIter) -> Self {
        Relation::Streaming(StreamingRelation { columns, slot: CacheSlot::new(source) })
    }

    pub fn empty(columns: Vec<Symbol>) -> Self {
        Relation::materialized(columns, Vec::new())
    }

    pub fn columns(&self) -> &[Symbol] {
        match self {
            Relation::Materialized(m) => &m.columns,
            Relation::Streaming(s) => &s.columns,
        }
    }

    /// A fresh iterator over this relation's tuples. On a streaming
    /// relation that was never `materialize()`d, this can only succeed
    /// once.
    pub fn iterator(&self) -> EngineResult<TupleIter> {
        match self {
            Relation::Materialized(m) => {
                let tuples = m.tuples.clone();
                Ok(Box::new((0..tuples.len()).map(move |i| tuples[i].clone())))
            }
            Relation::Streaming(s) => Ok(s.slot.iterator()?),
        }
    }

    /// Opt a streaming relation into replay. A no-op on an already
    /// materialized relation.
    pub fn request_materialize(&self) {
        if let Relation::Streaming(s) = self {
            s.slot.materialize();
        }
    }

    /// Collapse this relation into an in-memory `Materialized` one,
    /// driving the source iterator to completion if necessary.
    pub fn materialize(&self) -> EngineResult<Relation> {
        match self {
            Relation::Materialized(_) => Ok(self.clone()),
            Relation::Streaming(s) => {
                s.slot.materialize();
                let tuples: Vec<Tuple> = s.slot.iterator()?.collect();
                Ok(Relation::materialized(s.columns.clone(), tuples))
            }
        }
    }

    pub fn size(&self) -> EngineResult<usize> {
        match self {
            Relation::Materialized(m) => Ok(m.tuples.len()),
            Relation::Streaming(_) => Ok(self.materialize()?.size()?),
        }
    }

    pub fn is_empty(&self) -> EngineResult<bool> {
        Ok(self.size()? == 0)
    }

    pub fn get(&self, index: usize) -> EngineResult<Option<Tuple>> {
        match self {
            Relation::Materialized(m) => Ok(m.tuples.get(index).cloned()),
            Relation::Streaming(_) => Ok(self.materialize()?.get(index)?),
        }
    }

    fn resolve_indices(&self, symbols: &[Symbol]) -> Result<Vec<usize>, ProjectionError> {
        let mut missing = Vec::new();
        let indices: Vec<usize> = symbols
            .iter()
            .filter_map(|s| match self.columns().iter().position(|c| c == s) {
                Some(i) => Some(i),
                None => {
                    missing.push(s.name().to_string());
                    None
                }
            })
            .collect();
        if !missing.is_empty() {
            return Err(ProjectionError { missing });
        }
        Ok(indices)
    }

    /// Project down to `keep`, in the given order. Lazily streaming.
    pub fn project(&self, keep: &[Symbol]) -> EngineResult<Relation> {
        let indices = self.resolve_indices(keep)?;
        let source = self.iterator()?;
        Ok(Relation::streaming(keep.to_vec(), Box::new(ProjectIterator::new(source, indices))))
    }

    /// Filter with an arbitrary Rust predicate over whole tuples.
    pub fn filter(&self, predicate: impl FnMut(&Tuple) -> bool + Send + 'static) -> EngineResult<Relation> {
        let columns = self.columns().to_vec();
        let source = self.iterator()?;
        Ok(Relation::streaming(columns, Box::new(FilterIterator::new(source, predicate))))
    }

    /// Filter by a `datalog_ast::Predicate` evaluated against this
    /// relation's own columns.
    pub fn filter_with_predicate(&self, predicate: Predicate) -> EngineResult<Relation> {
        let columns = self.columns().to_vec();
        let source = self.iterator()?;
        Ok(Relation::streaming(columns.clone(), Box::new(PredicateFilterIterator::new(source, columns, predicate))))
    }

    /// Evaluate a function over each tuple, appending `out` as a new
    /// trailing column. Tuples where evaluation fails are dropped.
    pub fn evaluate_function(&self, name: FunctionName, args: Vec<Term>, out: Symbol, registry: FunctionRegistry) -> EngineResult<Relation> {
        let columns = self.columns().to_vec();
        let mut out_columns = columns.clone();
        out_columns.push(out);
        let source = self.iterator()?;
        Ok(Relation::streaming(out_columns, Box::new(FunctionEvaluatorIterator::new(source, columns, name, args, registry))))
    }

    /// Equi-join on every symbol shared with `other`. Strategy selection
    /// per §4.4: when both sides are still `Streaming` and
    /// `options.symmetric_hash_join` is enabled, runs a `SymmetricHashJoin`
    /// over both sources without forcing either one to materialize first;
    /// otherwise both sides are materialized and build/probe hash-joined.
    pub fn join(&self, other: &Relation, options: &ExecutorOptions) -> EngineResult<Relation> {
        if options.symmetric_hash_join {
            if let (Relation::Streaming(_), Relation::Streaming(_)) = (self, other) {
                return self.streaming_join(other);
            }
        }
        let pairs = shared_pairs(self.columns(), other.columns());
        self.hash_join(other, &pairs, options)
    }

    fn streaming_join(&self, other: &Relation) -> EngineResult<Relation> {
        let pairs = shared_pairs(self.columns(), other.columns());
        let left = self.iterator()?;
        let right = other.iterator()?;
        let (columns, source) = join::streaming_join(self.columns(), left, other.columns(), right, &pairs);
        Ok(Relation::streaming(columns, source))
    }

    /// Equi-join on an explicit symbol-pair list.
    pub fn hash_join(&self, other: &Relation, pairs: &[(Symbol, Symbol)], options: &ExecutorOptions) -> EngineResult<Relation> {
        let left = self.materialize()?;
        let right = other.materialize()?;
        let use_bloom = left.tuples_ref().len().max(right.tuples_ref().len()) > options.symmetric_hash_join_capacity;
        let (columns, tuples) = join::hash_join(self.columns(), left.tuples_ref(), other.columns(), right.tuples_ref(), pairs, use_bloom);
        Ok(Relation::materialized(columns, tuples))
    }

    pub fn semi_join(&self, other: &Relation, pairs: &[(Symbol, Symbol)]) -> EngineResult<Relation> {
        let left = self.materialize()?;
        let right = other.materialize()?;
        let tuples = join::semi_join(self.columns(), left.tuples_ref(), other.columns(), right.tuples_ref(), pairs);
        Ok(Relation::materialized(self.columns().to_vec(), tuples))
    }

    pub fn anti_join(&self, other: &Relation, pairs: &[(Symbol, Symbol)]) -> EngineResult<Relation> {
        let left = self.materialize()?;
        let right = other.materialize()?;
        let tuples = join::anti_join(self.columns(), left.tuples_ref(), other.columns(), right.tuples_ref(), pairs);
        Ok(Relation::materialized(self.columns().to_vec(), tuples))
    }

    /// Grouped (or single-pass streaming) aggregation over the `:find`
    /// list. Per §4.5/§6, the streaming rolling-state path runs whenever
    /// the relation is already `Streaming`, and also for a `Materialized`
    /// relation whose size meets `options.streaming_aggregation_threshold`
    /// — size alone, not just variant, decides batch vs. streaming.
    pub fn aggregate(&self, find: &Find, options: &ExecutorOptions) -> EngineResult<Relation> {
        if options.streaming_aggregation && self.prefers_streaming_aggregation(options)? {
            let columns = self.columns().to_vec();
            let source = self.iterator()?;
            let (columns, rows) = aggregate::streaming::aggregate_streaming(&columns, source, find);
            return Ok(Relation::materialized(columns, rows));
        }
        let materialized = self.materialize()?;
        let (columns, rows) = aggregate::aggregate(self.columns(), materialized.tuples_ref(), find);
        Ok(Relation::materialized(columns, rows))
    }

    fn prefers_streaming_aggregation(&self, options: &ExecutorOptions) -> EngineResult<bool> {
        match self {
            Relation::Streaming(_) => Ok(true),
            Relation::Materialized(m) => Ok(m.tuples.len() >= options.streaming_aggregation_threshold),
        }
    }

    /// Cartesian product across `relations`, assumed pairwise
    /// symbol-disjoint (the clause engine only calls this on already
    /// `collapse()`d groups). Each side is materialized so the rightmost
    /// factory can be re-walked as the outer cursors advance.
    pub fn product(relations: &[Relation]) -> EngineResult<Relation> {
        if relations.len() == 1 {
            return Ok(relations[0].clone());
        }
        let mut columns = Vec::new();
        let mut factories: Vec<std::sync::Arc<dyn Fn() -> TupleIter + Send + Sync>> = Vec::new();
        for relation in relations {
            columns.extend(relation.columns().iter().cloned());
            let materialized = relation.materialize()?;
            let tuples = materialized.tuples_ref().clone();
            let tuples = Arc::new(tuples);
            factories.push(std::sync::Arc::new(move || {
                let tuples = tuples.clone();
                Box::new((0..tuples.len()).map(move |i| tuples[i].clone())) as TupleIter
            }));
        }
        let source: TupleIter = Box::new(ProductIterator::new(factories));
        Ok(Relation::streaming(columns, source))
    }

    /// Sort by the `:order-by` list, materializing first.
    pub fn sort(&self, order_by: &[OrderBy]) -> EngineResult<Relation> {
        let materialized = self.materialize()?;
        let indices: Vec<(usize, bool)> = order_by
            .iter()
            .map(|o| {
                let index = self
                    .columns()
                    .iter()
                    .position(|c| c == &o.symbol)
                    .ok_or_else(|| ProjectionError { missing: vec![o.symbol.name().to_string()] })?;
                Ok((index, o.descending))
            })
            .collect::<Result<_, ProjectionError>>()?;
        let mut tuples = materialized.tuples_ref().clone();
        tuples.sort_by(|a, b| {
            for &(index, descending) in &indices {
                let ordering = a.values()[index].cmp(&b.values()[index]);
                let ordering = if descending { ordering.reverse() } else { ordering };
                if ordering != std::cmp::Ordering::Equal {
                    return ordering;
                }
            }
            std::cmp::Ordering::Equal
        });
        Ok(Relation::materialized(self.columns().to_vec(), tuples))
    }
}

/// Every column name present in both lists, paired with itself — the
/// equi-join condition a natural join (no explicit pairs) resolves to.
fn shared_pairs(left_columns: &[Symbol], right_columns: &[Symbol]) -> Vec<(Symbol, Symbol)> {
    left_columns.iter().filter(|s| right_columns.contains(s)).map(|s| (s.clone(), s.clone())).collect()
}

impl Relation {
    fn tuples_ref(&self) -> &Vec<Tuple> {
        match self {
            Relation::Materialized(m) => &m.tuples,
            Relation::Streaming(_) => unreachable!("materialize() always returns a Materialized relation"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> Symbol {
        Symbol::new(name)
    }

    #[test]
    fn project_reorders_and_drops_columns() {
        let relation = Relation::materialized(
            vec![sym("?a"), sym("?b")],
            vec![Tuple::new(vec![Value::Int(1), Value::Int(2)])],
        );
        let projected = relation.project(&[sym("?b")]).unwrap();
        assert_eq!(projected.columns(), &[sym("?b")]);
        assert_eq!(projected.get(0).unwrap(), Some(Tuple::new(vec![Value::Int(2)])));
    }

    #[test]
    fn project_missing_column_is_a_projection_error() {
        let relation = Relation::materialized(vec![sym("?a")], vec![]);
        let err = relation.project(&[sym("?missing")]).unwrap_err();
        assert!(matches!(err, crate::error::EngineError::Projection(_)));
    }

    #[test]
    fn natural_join_combines_two_relations_on_shared_symbol() {
        let left = Relation::materialized(vec![sym("?a"), sym("?b")], vec![Tuple::new(vec![Value::Int(1), Value::Int(2)])]);
        let right = Relation::materialized(vec![sym("?a"), sym("?c")], vec![Tuple::new(vec![Value::Int(1), Value::Int(3)])]);
        let joined = left.join(&right, &ExecutorOptions::default()).unwrap();
        assert_eq!(joined.columns(), &[sym("?a"), sym("?b"), sym("?c")]);
        assert_eq!(joined.size().unwrap(), 1);
    }

    #[test]
    fn streaming_relation_requires_materialize_for_double_iteration() {
        let relation = Relation::streaming(vec![sym("?a")], Box::new(vec![Tuple::new(vec![Value::Int(1)])].into_iter()));
        assert!(relation.iterator().is_ok());
        assert!(relation.iterator().is_err());
    }

    #[test]
    fn product_combines_disjoint_relations() {
        let a = Relation::materialized(vec![sym("?a")], vec![Tuple::new(vec![Value::Int(1)]), Tuple::new(vec![Value::Int(2)])]);
        let b = Relation::materialized(vec![sym("?b")], vec![Tuple::new(vec![Value::Int(10)])]);
        let product = Relation::product(&[a, b]).unwrap();
        assert_eq!(product.columns(), &[sym("?a"), sym("?b")]);
        assert_eq!(product.size().unwrap(), 2);
    }

    #[test]
    fn sort_orders_by_descending_value() {
        let relation = Relation::materialized(
            vec![sym("?a")],
            vec![Tuple::new(vec![Value::Int(1)]), Tuple::new(vec![Value::Int(3)]), Tuple::new(vec![Value::Int(2)])],
        );
        let sorted = relation.sort(&[OrderBy::desc("?a")]).unwrap();
        let values: Vec<Value> = sorted.iterator().unwrap().map(|t| t.values()[0].clone()).collect();
        assert_eq!(values, vec![Value::Int(3), Value::Int(2), Value::Int(1)]);
    }

    #[test]
    fn join_dispatches_to_symmetric_join_for_two_streaming_relations() {
        let left = Relation::streaming(vec![sym("?a"), sym("?b")], Box::new(vec![Tuple::new(vec![Value::Int(1), Value::Int(2)])].into_iter()));
        let right = Relation::streaming(vec![sym("?a"), sym("?c")], Box::new(vec![Tuple::new(vec![Value::Int(1), Value::Int(3)])].into_iter()));
        let options = ExecutorOptions { symmetric_hash_join: true, ..ExecutorOptions::default() };
        let joined = left.join(&right, &options).unwrap();
        assert_eq!(joined.columns(), &[sym("?a"), sym("?b"), sym("?c")]);
        assert_eq!(joined.size().unwrap(), 1);
    }

    #[test]
    fn join_falls_back_to_hash_join_when_symmetric_is_disabled() {
        let left = Relation::streaming(vec![sym("?a")], Box::new(vec![Tuple::new(vec![Value::Int(1)])].into_iter()));
        let right = Relation::streaming(vec![sym("?a")], Box::new(vec![Tuple::new(vec![Value::Int(1)])].into_iter()));
        let options = ExecutorOptions { symmetric_hash_join: false, ..ExecutorOptions::default() };
        let joined = left.join(&right, &options).unwrap();
        assert_eq!(joined.size().unwrap(), 1);
    }

    #[test]
    fn aggregate_takes_the_streaming_path_once_materialized_input_crosses_the_threshold() {
        use datalog_ast::{AggregateFunc, FindElement};
        let tuples: Vec<Tuple> = (0..5).map(|i| Tuple::new(vec![Value::Int(i)])).collect();
        let relation = Relation::materialized(vec![sym("?amount")], tuples);
        let find = Find::new(vec![FindElement::Aggregate { func: AggregateFunc::Sum, arg: sym("?amount"), condition: None }]);
        let options = ExecutorOptions { streaming_aggregation: true, streaming_aggregation_threshold: 5, ..ExecutorOptions::default() };
        let result = relation.aggregate(&find, &options).unwrap();
        assert_eq!(result.size().unwrap(), 1);
        assert_eq!(result.get(0).unwrap().unwrap().values()[0], Value::Int(0 + 1 + 2 + 3 + 4));
    }
}
