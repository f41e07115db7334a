//! # Runtime value and tuple types
//!
//! `Value` is the engine's runtime value type — distinct from
//! `datalog_ast::Constant`, which is the smaller syntax-level literal type
//! a parser produces. `Tuple` is a fixed-width, immutable, cheaply
//! cloneable sequence of `Value`s: an `Arc<[Value]>` newtype, so the
//! "callers MUST copy before retaining" discipline around reused iterator
//! buffers is just a bump of a reference count, never a deep copy.

use chrono::{DateTime, Utc};
use datalog_ast::Constant;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A totally-ordered wrapper around `f64` for use as a hash/btree key and
/// in `min`/`max` aggregate state. NaN sorts after every other float,
/// consistent with itself (so it can appear in a `BTreeMap` or a
/// `HashSet` without panicking), but is never produced by ordinary
/// arithmetic in this engine's builtin function set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderedFloat(pub f64);

impl Eq for OrderedFloat {}

impl PartialOrd for OrderedFloat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedFloat {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.0.partial_cmp(&other.0) {
            Some(ord) => ord,
            None => match (self.0.is_nan(), other.0.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => Ordering::Equal,
            },
        }
    }
}

impl std::hash::Hash for OrderedFloat {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        if self.0.is_nan() {
            state.write_u64(0x7ff8_0000_0000_0000);
        } else {
            state.write_u64(self.0.to_bits());
        }
    }
}

/// The sum type of legal tuple values.
///
/// Cross-kind comparisons are intentionally not exposed to user-visible
/// predicates (see `ValueKind` ordering below); within a kind, ordering is
/// the obvious one (numeric, lexicographic, chronological).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(Arc<str>),
    Instant(DateTime<Utc>),
    /// An interned entity identifier (e.g. a fact store's internal row id).
    Entity(u64),
    /// An interned `:keyword` value, distinct from a plain string.
    Keyword(Arc<str>),
    Nil,
}

impl Value {
    fn kind_rank(&self) -> u8 {
        match self {
            Value::Nil => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::Str(_) => 4,
            Value::Keyword(_) => 5,
            Value::Entity(_) => 6,
            Value::Instant(_) => 7,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric value as `f64`, if this value is `Int` or `Float`. Used by
    /// aggregate folding so `sum`/`avg` treat integers and floats
    /// uniformly.
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl Eq for Value {}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.kind_rank().hash(state);
        match self {
            Value::Nil => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => OrderedFloat(*f).hash(state),
            Value::Str(s) => s.hash(state),
            Value::Keyword(k) => k.hash(state),
            Value::Entity(e) => e.hash(state),
            Value::Instant(t) => t.hash(state),
        }
    }
}

/// Total order over `Value`, used by `min`/`max` aggregates and
/// `order-by`. Same-kind values compare naturally; values of different
/// kinds compare by a stable, otherwise-arbitrary kind rank so the
/// comparator never panics, but this ordering is not meant to be
/// meaningful outside of sort stability — see Open Questions.
impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Nil, Value::Nil) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => OrderedFloat(*a).cmp(&OrderedFloat(*b)),
            (Value::Int(a), Value::Float(b)) => OrderedFloat(*a as f64).cmp(&OrderedFloat(*b)),
            (Value::Float(a), Value::Int(b)) => OrderedFloat(*a).cmp(&OrderedFloat(*b as f64)),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Keyword(a), Value::Keyword(b)) => a.cmp(b),
            (Value::Entity(a), Value::Entity(b)) => a.cmp(b),
            (Value::Instant(a), Value::Instant(b)) => a.cmp(b),
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::Instant(v) => write!(f, "{v}"),
            Value::Entity(v) => write!(f, "#{v}"),
            Value::Keyword(v) => write!(f, ":{v}"),
            Value::Nil => write!(f, "nil"),
        }
    }
}

impl From<Constant> for Value {
    fn from(c: Constant) -> Self {
        match c {
            Constant::Int(i) => Value::Int(i),
            Constant::Float(f) => Value::Float(f),
            Constant::Bool(b) => Value::Bool(b),
            Constant::Str(s) => Value::Str(s.into()),
            Constant::Keyword(k) => Value::Keyword(k.into()),
            Constant::Nil => Value::Nil,
        }
    }
}

/// An immutable, fixed-width sequence of values. Clone is an `Arc` bump.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tuple(Arc<[Value]>);

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Tuple(values.into())
    }

    pub fn width(&self) -> usize {
        self.0.len()
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Concatenate this tuple with another, in order.
    pub fn concat(&self, other: &Tuple) -> Tuple {
        let mut values = Vec::with_capacity(self.width() + other.width());
        values.extend_from_slice(&self.0);
        values.extend_from_slice(&other.0);
        Tuple::new(values)
    }

    /// Produce a new tuple containing only the given positions, in the
    /// given order.
    pub fn project(&self, indices: &[usize]) -> Tuple {
        Tuple::new(indices.iter().map(|&i| self.0[i].clone()).collect())
    }
}

impl FromIterator<Value> for Tuple {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Tuple(iter.into_iter().collect::<Vec<_>>().into())
    }
}
