//! # Iterator combinators (§4.2)
//!
//! Each combinator wraps a source iterator and is itself an iterator;
//! composition is explicit and none of them materializes unless
//! documented. An explicit `Close()` call is modeled by `Drop`: dropping
//! any of these is always safe and idempotent because none of them holds
//! a resource that needs explicit release beyond ordinary Rust drop
//! glue.

use crate::functions::{self, eval_builtin, eval_chained, eval_comparison, Bindings, FunctionRegistry};
use crate::relation::streaming::TupleIter;
use crate::value::{Tuple, Value};
use datalog_ast::{ComparisonOp, FunctionName, Predicate, Symbol};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Applies a tuple-level predicate; required symbols are expected to
/// have been checked once against the source relation's columns before
/// construction.
pub struct FilterIterator {
    source: TupleIter,
    predicate: Box<dyn FnMut(&Tuple) -> bool + Send>,
}

impl FilterIterator {
    pub fn new(source: TupleIter, predicate: impl FnMut(&Tuple) -> bool + Send + 'static) -> Self {
        FilterIterator {
            source,
            predicate: Box::new(predicate),
        }
    }
}

impl Iterator for FilterIterator {
    type Item = Tuple;
    fn next(&mut self) -> Option<Tuple> {
        loop {
            let tuple = self.source.next()?;
            if (self.predicate)(&tuple) {
                return Some(tuple);
            }
        }
    }
}

/// Evaluates a first-class `Predicate` AST node with a binding map built
/// fresh for each tuple.
pub struct PredicateFilterIterator {
    source: TupleIter,
    columns: Vec<Symbol>,
    predicate: Predicate,
}

impl PredicateFilterIterator {
    pub fn new(source: TupleIter, columns: Vec<Symbol>, predicate: Predicate) -> Self {
        PredicateFilterIterator {
            source,
            columns,
            predicate,
        }
    }

    fn matches(&self, tuple: &Tuple) -> bool {
        let bindings: Bindings<'_> = self
            .columns
            .iter()
            .zip(tuple.values())
            .collect::<std::collections::HashMap<_, _>>();
        let resolved: Option<Vec<Value>> = self
            .predicate
            .args
            .iter()
            .map(|term| functions::resolve_term(term, &bindings))
            .collect();
        match resolved {
            Some(values) if self.predicate.is_chained() => eval_chained(self.predicate.op, &values),
            Some(values) if values.len() == 2 => eval_comparison(self.predicate.op, &values[0], &values[1]),
            _ => false,
        }
    }
}

impl Iterator for PredicateFilterIterator {
    type Item = Tuple;
    fn next(&mut self) -> Option<Tuple> {
        loop {
            let tuple = self.source.next()?;
            if self.matches(&tuple) {
                return Some(tuple);
            }
        }
    }
}

/// Projects each tuple onto a pre-computed set of column indices. Must be
/// built from the parent relation's `iterator()` call (not a captured raw
/// iterator) so lazy caching on a streaming parent cooperates with
/// multi-consumer reuse; that invariant is enforced by callers in
/// `relation::Relation::project`, not by this struct itself.
pub struct ProjectIterator {
    source: TupleIter,
    indices: Vec<usize>,
}

impl ProjectIterator {
    pub fn new(source: TupleIter, indices: Vec<usize>) -> Self {
        ProjectIterator { source, indices }
    }
}

impl Iterator for ProjectIterator {
    type Item = Tuple;
    fn next(&mut self) -> Option<Tuple> {
        self.source.next().map(|tuple| tuple.project(&self.indices))
    }
}

/// Evaluates a function node and appends its result as an additional
/// column. Tuples on which evaluation fails are silently dropped (the
/// one documented local-recovery case in the error design).
pub struct FunctionEvaluatorIterator {
    source: TupleIter,
    columns: Vec<Symbol>,
    name: FunctionName,
    args: Vec<datalog_ast::Term>,
    registry: FunctionRegistry,
}

impl FunctionEvaluatorIterator {
    pub fn new(
        source: TupleIter,
        columns: Vec<Symbol>,
        name: FunctionName,
        args: Vec<datalog_ast::Term>,
        registry: FunctionRegistry,
    ) -> Self {
        FunctionEvaluatorIterator {
            source,
            columns,
            name,
            args,
            registry,
        }
    }

    fn evaluate(&self, tuple: &Tuple) -> Option<Value> {
        let bindings: Bindings<'_> = self
            .columns
            .iter()
            .zip(tuple.values())
            .collect::<std::collections::HashMap<_, _>>();
        let resolved: Vec<Value> = self
            .args
            .iter()
            .map(|term| functions::resolve_term(term, &bindings))
            .collect::<Option<Vec<_>>>()?;
        match &self.name {
            FunctionName::Builtin(func) => eval_builtin(func, &resolved),
            FunctionName::Custom(name) => (self.registry.get(name)?)(&resolved),
        }
    }
}

impl Iterator for FunctionEvaluatorIterator {
    type Item = Tuple;
    fn next(&mut self) -> Option<Tuple> {
        loop {
            let tuple = self.source.next()?;
            if let Some(result) = self.evaluate(&tuple) {
                let mut values = tuple.values().to_vec();
                values.push(result);
                return Some(Tuple::new(values));
            }
        }
    }
}

/// Applies a pure tuple-to-tuple function.
pub struct TransformIterator {
    source: TupleIter,
    transform: Box<dyn FnMut(Tuple) -> Tuple + Send>,
}

impl TransformIterator {
    pub fn new(source: TupleIter, transform: impl FnMut(Tuple) -> Tuple + Send + 'static) -> Self {
        TransformIterator {
            source,
            transform: Box::new(transform),
        }
    }
}

impl Iterator for TransformIterator {
    type Item = Tuple;
    fn next(&mut self) -> Option<Tuple> {
        self.source.next().map(|tuple| (self.transform)(tuple))
    }
}

/// Exhausts each input iterator in order.
pub struct ConcatIterator {
    sources: VecDeque<TupleIter>,
}

impl ConcatIterator {
    pub fn new(sources: Vec<TupleIter>) -> Self {
        ConcatIterator {
            sources: sources.into(),
        }
    }
}

impl Iterator for ConcatIterator {
    type Item = Tuple;
    fn next(&mut self) -> Option<Tuple> {
        while let Some(front) = self.sources.front_mut() {
            if let Some(tuple) = front.next() {
                return Some(tuple);
            }
            self.sources.pop_front();
        }
        None
    }
}

/// Deduplicates within a bounded sliding window of seen keys. On
/// overflow the oldest key is evicted from the set as well as the
/// tracking queue, so the window always reflects the most recent
/// `capacity` distinct tuples considered.
pub struct DedupIterator {
    source: TupleIter,
    seen: HashSet<Tuple>,
    order: VecDeque<Tuple>,
    capacity: usize,
}

impl DedupIterator {
    pub fn new(source: TupleIter, capacity: usize) -> Self {
        DedupIterator {
            source,
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }
}

impl Iterator for DedupIterator {
    type Item = Tuple;
    fn next(&mut self) -> Option<Tuple> {
        loop {
            let tuple = self.source.next()?;
            if self.seen.contains(&tuple) {
                continue;
            }
            if self.order.len() >= self.capacity {
                if let Some(evicted) = self.order.pop_front() {
                    self.seen.remove(&evicted);
                }
            }
            self.seen.insert(tuple.clone());
            self.order.push_back(tuple.clone());
            return Some(tuple);
        }
    }
}

/// Streaming nested-loop product over N relations' iterator factories.
/// The rightmost factory advances fastest; as an outer cursor advances,
/// every inner factory to its right is reset by calling it again, so
/// each factory must be able to produce a fresh iterator more than once
/// (a materialized or cached relation).
pub struct ProductIterator {
    factories: Vec<Arc<dyn Fn() -> TupleIter + Send + Sync>>,
    cursors: Vec<Option<TupleIter>>,
    current: Vec<Option<Tuple>>,
    started: bool,
    exhausted: bool,
}

impl ProductIterator {
    pub fn new(factories: Vec<Arc<dyn Fn() -> TupleIter + Send + Sync>>) -> Self {
        let n = factories.len();
        ProductIterator {
            factories,
            cursors: (0..n).map(|_| None).collect(),
            current: (0..n).map(|_| None).collect(),
            started: false,
            exhausted: false,
        }
    }

    fn init(&mut self) -> bool {
        for i in 0..self.factories.len() {
            let mut cursor = (self.factories[i])();
            match cursor.next() {
                Some(tuple) => {
                    self.current[i] = Some(tuple);
                    self.cursors[i] = Some(cursor);
                }
                None => return false,
            }
        }
        true
    }

    /// Advance the rightmost cursor; on its exhaustion, reset it and
    /// carry into the next cursor to the left, recursively.
    fn advance(&mut self, index: usize) -> bool {
        let cursor = self.cursors[index].as_mut().expect("cursor initialized");
        if let Some(tuple) = cursor.next() {
            self.current[index] = Some(tuple);
            return true;
        }
        if index == 0 {
            return false;
        }
        if !self.advance(index - 1) {
            return false;
        }
        let mut fresh = (self.factories[index])();
        let tuple = fresh.next();
        self.cursors[index] = Some(fresh);
        self.current[index] = tuple;
        self.current[index].is_some()
    }

    fn emit(&self) -> Tuple {
        let mut values = Vec::new();
        for tuple in self.current.iter().flatten() {
            values.extend_from_slice(tuple.values());
        }
        Tuple::new(values)
    }
}

impl Iterator for ProductIterator {
    type Item = Tuple;
    fn next(&mut self) -> Option<Tuple> {
        if self.exhausted || self.factories.is_empty() {
            return None;
        }
        if !self.started {
            self.started = true;
            if !self.init() {
                self.exhausted = true;
                return None;
            }
            return Some(self.emit());
        }
        let last = self.factories.len() - 1;
        if self.advance(last) {
            Some(self.emit())
        } else {
            self.exhausted = true;
            None
        }
    }
}

struct BufferState {
    source: Option<TupleIter>,
    buffer: Vec<Tuple>,
    done: bool,
}

/// Wraps any iterator with replay: the first pass through any clone fills
/// a shared buffer; every clone after that (or the same cursor re-walked
/// from position 0) reads from the buffer once it's been filled that far.
/// Thread-safe: multiple clones may race to pull from the shared source.
pub struct BufferedIterator {
    state: Arc<Mutex<BufferState>>,
    position: usize,
}

impl BufferedIterator {
    pub fn new(source: TupleIter) -> Self {
        BufferedIterator {
            state: Arc::new(Mutex::new(BufferState {
                source: Some(source),
                buffer: Vec::new(),
                done: false,
            })),
            position: 0,
        }
    }
}

impl Clone for BufferedIterator {
    fn clone(&self) -> Self {
        BufferedIterator {
            state: self.state.clone(),
            position: 0,
        }
    }
}

impl Iterator for BufferedIterator {
    type Item = Tuple;
    fn next(&mut self) -> Option<Tuple> {
        let mut state = self.state.lock();
        if self.position < state.buffer.len() {
            let tuple = state.buffer[self.position].clone();
            self.position += 1;
            return Some(tuple);
        }
        if state.done {
            return None;
        }
        let next_tuple = state.source.as_mut().and_then(|s| s.next());
        match next_tuple {
            Some(tuple) => {
                state.buffer.push(tuple.clone());
                self.position += 1;
                Some(tuple)
            }
            None => {
                state.done = true;
                state.source = None;
                None
            }
        }
    }
}

/// Transparent wrapper that accumulates a tuple count without buffering
/// tuples, so a `size()` query after exhaustion is cheap.
pub struct CountingIterator {
    source: TupleIter,
    count: Arc<AtomicUsize>,
}

impl CountingIterator {
    pub fn new(source: TupleIter) -> (Self, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        (
            CountingIterator {
                source,
                count: count.clone(),
            },
            count,
        )
    }
}

impl Iterator for CountingIterator {
    type Item = Tuple;
    fn next(&mut self) -> Option<Tuple> {
        let tuple = self.source.next()?;
        self.count.fetch_add(1, Ordering::Relaxed);
        Some(tuple)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn int_tuples(values: &[i64]) -> TupleIter {
        let values: Vec<Tuple> = values.iter().map(|&v| Tuple::new(vec![Value::Int(v)])).collect();
        Box::new(values.into_iter())
    }

    #[test]
    fn filter_iterator_keeps_matching_tuples() {
        let iter = FilterIterator::new(int_tuples(&[1, 2, 3, 4]), |t| t.get(0) == Some(&Value::Int(2)) || t.get(0) == Some(&Value::Int(4)));
        let result: Vec<Tuple> = iter.collect();
        assert_eq!(result, vec![Tuple::new(vec![Value::Int(2)]), Tuple::new(vec![Value::Int(4)])]);
    }

    #[test]
    fn project_iterator_reorders_columns() {
        let iter = ProjectIterator::new(
            Box::new(std::iter::once(Tuple::new(vec![Value::Int(1), Value::Int(2)]))),
            vec![1, 0],
        );
        let result: Vec<Tuple> = iter.collect();
        assert_eq!(result, vec![Tuple::new(vec![Value::Int(2), Value::Int(1)])]);
    }

    #[test]
    fn concat_iterator_exhausts_in_order() {
        let iter = ConcatIterator::new(vec![int_tuples(&[1]), int_tuples(&[2, 3])]);
        let result: Vec<Tuple> = iter.collect();
        assert_eq!(result, vec![Tuple::new(vec![Value::Int(1)]), Tuple::new(vec![Value::Int(2)]), Tuple::new(vec![Value::Int(3)])]);
    }

    #[test]
    fn dedup_iterator_drops_repeats_within_window() {
        let iter = DedupIterator::new(int_tuples(&[1, 1, 2, 1]), 10);
        let result: Vec<Tuple> = iter.collect();
        assert_eq!(result, vec![Tuple::new(vec![Value::Int(1)]), Tuple::new(vec![Value::Int(2)])]);
    }

    #[test]
    fn dedup_iterator_evicts_outside_small_window() {
        // capacity 1: after seeing 2, "1" falls out of the window so a
        // second 1 is emitted again.
        let iter = DedupIterator::new(int_tuples(&[1, 2, 1]), 1);
        let result: Vec<Tuple> = iter.collect();
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn product_iterator_rightmost_advances_fastest() {
        let left: Arc<dyn Fn() -> TupleIter + Send + Sync> = Arc::new(|| int_tuples(&[1, 2]));
        let right: Arc<dyn Fn() -> TupleIter + Send + Sync> = Arc::new(|| int_tuples(&[10, 20]));
        let iter = ProductIterator::new(vec![left, right]);
        let result: Vec<Tuple> = iter.collect();
        assert_eq!(
            result,
            vec![
                Tuple::new(vec![Value::Int(1), Value::Int(10)]),
                Tuple::new(vec![Value::Int(1), Value::Int(20)]),
                Tuple::new(vec![Value::Int(2), Value::Int(10)]),
                Tuple::new(vec![Value::Int(2), Value::Int(20)]),
            ]
        );
    }

    #[test]
    fn buffered_iterator_clones_replay_independently() {
        let buffered = BufferedIterator::new(int_tuples(&[1, 2, 3]));
        let mut a = buffered.clone();
        assert_eq!(a.next(), Some(Tuple::new(vec![Value::Int(1)])));
        let mut b = buffered.clone();
        assert_eq!(b.next(), Some(Tuple::new(vec![Value::Int(1)])));
        assert_eq!(b.next(), Some(Tuple::new(vec![Value::Int(2)])));
        assert_eq!(a.next(), Some(Tuple::new(vec![Value::Int(2)])));
    }

    #[test]
    fn counting_iterator_tracks_count_after_exhaustion() {
        let (iter, count) = CountingIterator::new(int_tuples(&[1, 2, 3]));
        let _: Vec<Tuple> = iter.collect();
        assert_eq!(count.load(Ordering::Relaxed), 3);
    }
}
