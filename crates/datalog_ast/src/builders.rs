//! Fluent builders for AST construction, particularly useful for tests and
//! for hosts that construct queries programmatically rather than through a
//! text parser.
//!
//! ## Example
//!
//! ```rust
//! use datalog_ast::builders::{PatternBuilder, QueryBuilder};
//! use datalog_ast::{ComparisonOp, FindElement, Symbol, Term};
//!
//! // [?e :user/name ?name]
//! let pattern = PatternBuilder::new("user/name")
//!     .var("e")
//!     .var("name")
//!     .build();
//!
//! // :find ?name :where [?e :user/name ?name] (< ?age 30)
//! let query = QueryBuilder::new()
//!     .find_var("name")
//!     .pattern(pattern)
//!     .predicate(ComparisonOp::Lt, vec![Term::var("age"), Term::var("thirty")])
//!     .build();
//! assert_eq!(query.find.elements.len(), 1);
//! ```

use crate::{
    BindingForm, Clause, Constant, ComparisonOp, Find, FindElement, FunctionCall, FunctionName,
    InputSpec, OrderBy, Pattern, PatternTerm, Predicate, Query, Symbol, SubqueryInput,
    SubqueryPattern, Term,
};

/// Builder for a single [`Pattern`].
#[derive(Debug, Clone)]
pub struct PatternBuilder {
    relation: String,
    terms: Vec<PatternTerm>,
}

impl PatternBuilder {
    pub fn new(relation: impl Into<String>) -> Self {
        PatternBuilder {
            relation: relation.into(),
            terms: Vec::new(),
        }
    }

    #[must_use]
    pub fn var(mut self, name: impl Into<std::sync::Arc<str>>) -> Self {
        self.terms.push(PatternTerm::Var(Symbol::new(name)));
        self
    }

    #[must_use]
    pub fn constant(mut self, value: Constant) -> Self {
        self.terms.push(PatternTerm::Const(value));
        self
    }

    #[must_use]
    pub fn blank(mut self) -> Self {
        self.terms.push(PatternTerm::Blank);
        self
    }

    pub fn build(self) -> Pattern {
        Pattern::new(self.relation, self.terms)
    }
}

/// Builder for a [`SubqueryPattern`], wrapping a nested [`QueryBuilder`].
#[derive(Debug, Clone)]
pub struct SubqueryBuilder {
    inner: Query,
    inputs: Vec<SubqueryInput>,
    binding: Option<BindingForm>,
}

impl SubqueryBuilder {
    pub fn new(inner: Query) -> Self {
        SubqueryBuilder {
            inner,
            inputs: Vec::new(),
            binding: None,
        }
    }

    #[must_use]
    pub fn correlate(mut self, symbol: impl Into<std::sync::Arc<str>>) -> Self {
        self.inputs.push(SubqueryInput::Symbol(Symbol::new(symbol)));
        self
    }

    #[must_use]
    pub fn with_db(mut self) -> Self {
        self.inputs.push(SubqueryInput::DbMarker);
        self
    }

    #[must_use]
    pub fn bind_scalar(mut self, symbol: impl Into<std::sync::Arc<str>>) -> Self {
        self.binding = Some(BindingForm::Scalar(Symbol::new(symbol)));
        self
    }

    #[must_use]
    pub fn bind_collection(mut self, symbol: impl Into<std::sync::Arc<str>>) -> Self {
        self.binding = Some(BindingForm::Collection(Symbol::new(symbol)));
        self
    }

    #[must_use]
    pub fn bind_tuple(mut self, symbols: Vec<Symbol>) -> Self {
        self.binding = Some(BindingForm::Tuple(symbols));
        self
    }

    #[must_use]
    pub fn bind_relation(mut self, symbols: Vec<Symbol>) -> Self {
        self.binding = Some(BindingForm::Relation(symbols));
        self
    }

    /// # Panics
    /// Panics if no binding form was set.
    pub fn build(self) -> SubqueryPattern {
        SubqueryPattern {
            inner: Box::new(self.inner),
            inputs: self.inputs,
            binding: self.binding.expect("subquery binding form must be set"),
        }
    }
}

/// Builder for a complete [`Query`].
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    find: Vec<FindElement>,
    inputs: Vec<InputSpec>,
    clauses: Vec<Clause>,
    order_by: Vec<OrderBy>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        QueryBuilder::default()
    }

    #[must_use]
    pub fn find_var(mut self, name: impl Into<std::sync::Arc<str>>) -> Self {
        self.find.push(FindElement::Variable(Symbol::new(name)));
        self
    }

    #[must_use]
    pub fn find_aggregate(
        mut self,
        func: crate::AggregateFunc,
        arg: impl Into<std::sync::Arc<str>>,
        condition: Option<Symbol>,
    ) -> Self {
        self.find.push(FindElement::Aggregate {
            func,
            arg: Symbol::new(arg),
            condition,
        });
        self
    }

    #[must_use]
    pub fn input_scalar(mut self, name: impl Into<std::sync::Arc<str>>) -> Self {
        self.inputs.push(InputSpec::Scalar(Symbol::new(name)));
        self
    }

    #[must_use]
    pub fn input_relation(mut self, names: Vec<Symbol>) -> Self {
        self.inputs.push(InputSpec::Relation(names));
        self
    }

    #[must_use]
    pub fn input_db(mut self) -> Self {
        self.inputs.push(InputSpec::DbMarker);
        self
    }

    #[must_use]
    pub fn pattern(mut self, pattern: Pattern) -> Self {
        self.clauses.push(Clause::DataPattern(pattern));
        self
    }

    #[must_use]
    pub fn predicate(mut self, op: ComparisonOp, args: Vec<Term>) -> Self {
        self.clauses.push(Clause::Predicate(Predicate::new(op, args)));
        self
    }

    #[must_use]
    pub fn function(mut self, name: FunctionName, args: Vec<Term>, out: Symbol) -> Self {
        self.clauses
            .push(Clause::Expression(FunctionCall { name, args, out }));
        self
    }

    #[must_use]
    pub fn subquery(mut self, subquery: SubqueryPattern) -> Self {
        self.clauses.push(Clause::Subquery(subquery));
        self
    }

    #[must_use]
    pub fn order_by_asc(mut self, name: impl Into<std::sync::Arc<str>>) -> Self {
        self.order_by.push(OrderBy::asc(name));
        self
    }

    #[must_use]
    pub fn order_by_desc(mut self, name: impl Into<std::sync::Arc<str>>) -> Self {
        self.order_by.push(OrderBy::desc(name));
        self
    }

    pub fn build(self) -> Query {
        let mut query = Query::new(Find::new(self.find), self.clauses).with_inputs(self.inputs);
        if !self.order_by.is_empty() {
            query = query.with_order_by(self.order_by);
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AggregateFunc;

    #[test]
    fn pattern_builder_collects_terms_in_order() {
        let pattern = PatternBuilder::new("user/name").var("e").var("name").build();
        assert_eq!(pattern.relation, "user/name");
        assert_eq!(pattern.terms.len(), 2);
    }

    #[test]
    fn query_builder_assembles_find_and_where() {
        let pattern = PatternBuilder::new("user/age").var("e").var("age").build();
        let query = QueryBuilder::new()
            .find_var("e")
            .input_db()
            .pattern(pattern)
            .predicate(ComparisonOp::Gt, vec![Term::var("age"), Term::Const(Constant::Int(18))])
            .build();
        assert_eq!(query.find.elements.len(), 1);
        assert_eq!(query.where_clauses.len(), 2);
        assert_eq!(query.inputs.len(), 1);
    }

    #[test]
    fn query_builder_supports_aggregates_and_order_by() {
        let query = QueryBuilder::new()
            .find_var("category")
            .find_aggregate(AggregateFunc::Sum, "amount", None)
            .order_by_desc("category")
            .build();
        assert!(query.find.has_aggregates());
        assert!(query.order_by.is_some());
    }

    #[test]
    fn subquery_builder_requires_binding_form() {
        let inner = QueryBuilder::new().find_var("x").build();
        let subquery = SubqueryBuilder::new(inner).correlate("outer_e").bind_scalar("x").build();
        assert_eq!(subquery.correlated_symbols(), vec![Symbol::new("outer_e")]);
    }
}
