//! # Pattern matcher: the external fact-store seam
//!
//! Per §6, the engine consumes facts through a `PatternMatcher` trait
//! rather than owning a storage layer itself — a `DataPattern` clause is
//! handed to the host's implementation, which returns a `Relation` bound
//! to the pattern's non-blank terms. `InMemoryPatternMatcher` is a test
//! double only: it keeps named fact tables in memory and is explicitly
//! not a recommended way to back a production engine.

use crate::error::{EngineResult, PatternMatcherError};
use crate::relation::Relation;
use crate::value::{Tuple, Value};
use datalog_ast::{Pattern, PatternTerm, Symbol};
use std::collections::HashMap;
use std::sync::RwLock;

/// Resolves a `DataPattern` clause against whatever fact storage the
/// host provides.
pub trait PatternMatcher: Send + Sync {
    /// Match `pattern` and return a relation whose columns are the
    /// pattern's variable terms, in positional order (blanks and
    /// constants are not columns — constants are applied as a filter,
    /// blanks are ignored entirely). `bindings` is whatever groups the
    /// caller already has whose columns intersect the pattern's
    /// variables, offered for selectivity heuristics and as join keys;
    /// implementations MUST tolerate an empty list.
    fn match_pattern(&self, pattern: &Pattern, bindings: &[Relation]) -> EngineResult<Relation>;
}

/// An in-memory fact store keyed by relation name, for tests and
/// examples. Each row is a fixed-width tuple matching the relation's
/// declared arity; nothing here is meant to survive past a test.
#[derive(Default)]
pub struct InMemoryPatternMatcher {
    relations: RwLock<HashMap<String, Vec<Vec<Value>>>>,
}

impl InMemoryPatternMatcher {
    pub fn new() -> Self {
        InMemoryPatternMatcher::default()
    }

    /// Register a fact: `relation(v0, v1, ...)`.
    pub fn add_fact(&self, relation: impl Into<String>, values: Vec<Value>) {
        self.relations.write().expect("pattern matcher lock poisoned").entry(relation.into()).or_default().push(values);
    }
}

impl PatternMatcher for InMemoryPatternMatcher {
    fn match_pattern(&self, pattern: &Pattern, _bindings: &[Relation]) -> EngineResult<Relation> {
        let store = self.relations.read().expect("pattern matcher lock poisoned");
        let rows = store.get(&pattern.relation).cloned().unwrap_or_default();
        drop(store);

        if rows.iter().any(|row| row.len() != pattern.terms.len()) {
            return Err(PatternMatcherError(format!(
                "fact arity mismatch for relation {}: pattern has {} terms",
                pattern.relation,
                pattern.terms.len()
            ))
            .into());
        }

        let mut columns: Vec<Symbol> = Vec::new();
        let mut column_positions: Vec<usize> = Vec::new();
        for (i, term) in pattern.terms.iter().enumerate() {
            if let PatternTerm::Var(symbol) = term {
                columns.push(symbol.clone());
                column_positions.push(i);
            }
        }

        let mut tuples = Vec::new();
        'row: for row in &rows {
            for (i, term) in pattern.terms.iter().enumerate() {
                if let PatternTerm::Const(constant) = term {
                    if row[i] != Value::from(constant.clone()) {
                        continue 'row;
                    }
                }
            }
            tuples.push(Tuple::new(column_positions.iter().map(|&i| row[i].clone()).collect()));
        }

        Ok(Relation::materialized(columns, tuples))
    }
}
