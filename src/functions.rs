//! # Function and predicate evaluation
//!
//! Evaluates `datalog_ast::Term`s against a tuple's binding map, and
//! dispatches `datalog_ast::BuiltinFunc`/`ComparisonOp` nodes plus
//! host-registered custom functions. Exposed as a typed registry
//! (`FunctionRegistry`) passed through executor options rather than a
//! process-global, per the "no global state" design note.

use crate::value::Value;
use datalog_ast::{ArithOp, BuiltinFunc, ComparisonOp, Constant, Symbol, Term};
use std::collections::HashMap;
use std::sync::Arc;

/// A tuple's column bindings, looked up by symbol during clause
/// evaluation.
pub type Bindings<'a> = HashMap<&'a Symbol, &'a Value>;

/// Resolve a `Term` against a binding map: a `Var` looks itself up (and
/// is absent if unbound), a `Const` converts directly.
pub fn resolve_term(term: &Term, bindings: &Bindings<'_>) -> Option<Value> {
    match term {
        Term::Var(symbol) => bindings.get(symbol).map(|v| (*v).clone()),
        Term::Const(constant) => Some(Value::from(constant.clone())),
    }
}

/// A host-registered custom function: takes resolved argument values,
/// returns the result value or `None` if evaluation fails for this input
/// (the caller drops the tuple, per the `FunctionEvaluatorIterator`
/// contract).
pub type CustomFn = Arc<dyn Fn(&[Value]) -> Option<Value> + Send + Sync>;

/// Registry of host-provided custom functions, keyed by the name a
/// `FunctionName::Custom` clause references.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    custom: HashMap<String, CustomFn>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        FunctionRegistry::default()
    }

    pub fn register(&mut self, name: impl Into<String>, f: CustomFn) {
        self.custom.insert(name.into(), f);
    }

    pub fn get(&self, name: &str) -> Option<&CustomFn> {
        self.custom.get(name)
    }
}

/// Apply a built-in arithmetic/string/boolean function to already-resolved
/// argument values. Returns `None` on a type mismatch or arity mismatch,
/// letting the caller drop the offending tuple.
pub fn eval_builtin(func: &BuiltinFunc, args: &[Value]) -> Option<Value> {
    match func {
        BuiltinFunc::Arith(op) => {
            let (a, b) = (args.first()?.as_numeric()?, args.get(1)?.as_numeric()?);
            let result = match op {
                ArithOp::Add => a + b,
                ArithOp::Sub => a - b,
                ArithOp::Mul => a * b,
                ArithOp::Div => {
                    if b == 0.0 {
                        return None;
                    }
                    a / b
                }
                ArithOp::Mod => {
                    if b == 0.0 {
                        return None;
                    }
                    a % b
                }
            };
            if matches!(args[0], Value::Int(_)) && matches!(args[1], Value::Int(_)) && !matches!(op, ArithOp::Div) {
                Some(Value::Int(result as i64))
            } else {
                Some(Value::Float(result))
            }
        }
        BuiltinFunc::Concat => {
            let a = args.first()?;
            let b = args.get(1)?;
            Some(Value::Str(format!("{a}{b}").into()))
        }
        BuiltinFunc::Not => {
            let b = args.first()?.as_bool()?;
            Some(Value::Bool(!b))
        }
    }
}

/// Evaluate a single comparison between two values, per the total-order
/// comparator in `value.rs`.
pub fn eval_comparison(op: ComparisonOp, a: &Value, b: &Value) -> bool {
    use std::cmp::Ordering;
    let ordering = a.cmp(b);
    match op {
        ComparisonOp::Eq => ordering == Ordering::Equal,
        ComparisonOp::NotEq => ordering != Ordering::Equal,
        ComparisonOp::Lt => ordering == Ordering::Less,
        ComparisonOp::LtEq => ordering != Ordering::Greater,
        ComparisonOp::Gt => ordering == Ordering::Greater,
        ComparisonOp::GtEq => ordering != Ordering::Less,
    }
}

/// Evaluate a (possibly chained) predicate: `(< a b c d)` means `a < b`,
/// `b < c`, and `c < d` must all hold. Per the Open Question on
/// short-circuiting, this evaluates left to right and returns on the
/// first failing pair rather than continuing to resolve later operands —
/// the observable result is identical either way since there's no
/// partial side effect, but it avoids needless term resolution.
pub fn eval_chained(op: ComparisonOp, values: &[Value]) -> bool {
    values.windows(2).all(|pair| eval_comparison(op, &pair[0], &pair[1]))
}
