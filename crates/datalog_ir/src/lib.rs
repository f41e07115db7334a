//! # Datalog Query Plan IR
//!
//! The intermediate representation a planner hands to the execution
//! engine: a [`Plan`] is an ordered sequence of [`Phase`]s, each carrying
//! the sub-[`Query`](datalog_ast::Query) to run in that phase and the set
//! of symbols that must survive the phase's projection to feed later
//! phases or the final result.
//!
//! This crate is deliberately thin. The planner is responsible for
//! splitting a query into phases (subquery decorrelation, join ordering,
//! and similar planning decisions all happen before this type exists);
//! the executor only walks the phases in order.
//!
//! ## Example
//!
//! ```rust
//! use datalog_ast::{Find, FindElement, Query, Symbol};
//! use datalog_ir::{Phase, Plan};
//! use std::collections::HashSet;
//!
//! let query = Query::new(Find::new(vec![FindElement::Variable(Symbol::new("name"))]), vec![]);
//! let keep: HashSet<Symbol> = [Symbol::new("name")].into_iter().collect();
//! let plan = Plan::new(vec![Phase::new(query, keep)]);
//! assert_eq!(plan.phases.len(), 1);
//! ```

use datalog_ast::{Query, Symbol};
use std::collections::HashSet;
use std::fmt;

/// One stage of a [`Plan`]: a query to evaluate against the relations
/// produced so far, and the symbols to retain once it has been evaluated.
/// Everything not in `keep` is projected away before the next phase runs,
/// bounding how much binding state threads through a multi-phase plan.
#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
    pub query: Query,
    pub keep: HashSet<Symbol>,
}

impl Phase {
    pub fn new(query: Query, keep: HashSet<Symbol>) -> Self {
        Phase { query, keep }
    }

    /// A human-readable rendering of this phase's clause count and
    /// retained symbols, used in plan-tracing annotations rather than in
    /// any machine-consumed path.
    pub fn pretty_print(&self, indent: usize) -> String {
        let pad = " ".repeat(indent);
        let mut kept: Vec<&str> = self.keep.iter().map(Symbol::name).collect();
        kept.sort_unstable();
        format!(
            "{pad}Phase({} clauses, keep=[{}])",
            self.query.where_clauses.len(),
            kept.join(", ")
        )
    }
}

/// An ordered sequence of phases. Phases run in order; a later phase may
/// reference symbols a prior phase kept, but never the reverse.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Plan {
    pub phases: Vec<Phase>,
}

impl Plan {
    pub fn new(phases: Vec<Phase>) -> Self {
        Plan { phases }
    }

    pub fn single(query: Query, keep: HashSet<Symbol>) -> Self {
        Plan {
            phases: vec![Phase::new(query, keep)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn pretty_print(&self) -> String {
        self.phases
            .iter()
            .enumerate()
            .map(|(i, phase)| format!("[{i}] {}", phase.pretty_print(0)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The symbols kept by the final phase: the plan's overall output
    /// schema before the executor applies `:find` projection.
    pub fn output_symbols(&self) -> HashSet<Symbol> {
        self.phases
            .last()
            .map(|p| p.keep.clone())
            .unwrap_or_default()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pretty_print())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datalog_ast::{Find, FindElement};

    fn sample_query() -> Query {
        Query::new(
            Find::new(vec![FindElement::Variable(Symbol::new("x"))]),
            vec![],
        )
    }

    #[test]
    fn single_plan_has_one_phase() {
        let keep: HashSet<Symbol> = [Symbol::new("x")].into_iter().collect();
        let plan = Plan::single(sample_query(), keep);
        assert_eq!(plan.len(), 1);
        assert!(!plan.is_empty());
    }

    #[test]
    fn output_symbols_come_from_last_phase() {
        let keep_a: HashSet<Symbol> = [Symbol::new("x"), Symbol::new("y")].into_iter().collect();
        let keep_b: HashSet<Symbol> = [Symbol::new("x")].into_iter().collect();
        let plan = Plan::new(vec![
            Phase::new(sample_query(), keep_a),
            Phase::new(sample_query(), keep_b.clone()),
        ]);
        assert_eq!(plan.output_symbols(), keep_b);
    }

    #[test]
    fn pretty_print_includes_sorted_symbols() {
        let keep: HashSet<Symbol> = [Symbol::new("b"), Symbol::new("a")].into_iter().collect();
        let phase = Phase::new(sample_query(), keep);
        let rendered = phase.pretty_print(0);
        assert!(rendered.contains("keep=[a, b]"));
    }

    #[test]
    fn empty_plan_has_no_output_symbols() {
        let plan = Plan::default();
        assert!(plan.is_empty());
        assert!(plan.output_symbols().is_empty());
    }
}
