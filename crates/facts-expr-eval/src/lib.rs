//!
//! Runtime evaluator for facts expressions.
//!
//! Responsibilities:
//! - Reduce an `Expression` tree to a number for one security, depth-first.
//! - Resolve attribute operands through a `FactSource` (name -> id -> value).
//! - Pluggable operators via `OperatorRegistry`.
//!
//! Failure model:
//! - Every expected miss (unknown attribute, missing fact, unknown operator,
//!   zero divisor, infinite or NaN arithmetic) becomes `None` at the node
//!   where it happens and propagates to the root. The cause is logged at
//!   `debug` and not returned.
//! - The public entrypoints surface a single `EvaluationFailure`.

use facts_expr_ast::{DslDocument, Expression, Operand, Operator, OperatorSet};
use facts_store::{FactSource, LookupError, SecurityId};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

/// Message shown to users for any failed evaluation.
pub const FAILURE_MESSAGE: &str = "There has been a problem with your Expression or Security";

/// The only failure callers see; it does not say which lookup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{}", FAILURE_MESSAGE)]
pub struct EvaluationFailure;

/// Pluggable operator implementation for `Expression::op`.
///
/// Operators must be deterministic and side-effect free. Returning `None`
/// marks the node as unresolvable.
pub trait OperatorFn: Send + Sync {
    fn symbol(&self) -> &'static str;
    fn apply(&self, a: f64, b: f64) -> Option<f64>;
}

/// Builtin arithmetic. Division by zero yields `None` rather than an infinity.
pub struct Arithmetic(pub Operator);

impl OperatorFn for Arithmetic {
    fn symbol(&self) -> &'static str { self.0.symbol() }

    fn apply(&self, a: f64, b: f64) -> Option<f64> {
        match self.0 {
            Operator::Add => Some(a + b),
            Operator::Sub => Some(a - b),
            Operator::Mul => Some(a * b),
            Operator::Div if b == 0.0 => None,
            Operator::Div => Some(a / b),
        }
    }
}

/// Registry for operators referenced from expressions.
#[derive(Default, Clone)]
pub struct OperatorRegistry {
    ops: HashMap<String, Arc<dyn OperatorFn>>,
}

impl OperatorRegistry {
    pub fn new() -> Self { Self { ops: HashMap::new() } }

    /// `+`, `-`, `*` and `/`.
    pub fn with_builtins() -> Self {
        let mut r = Self::new();
        for op in Operator::ALL {
            r.register(Arc::new(Arithmetic(op)));
        }
        r
    }

    /// Registers `f` under its symbol, replacing any previous operator with that symbol.
    pub fn register(&mut self, f: Arc<dyn OperatorFn>) {
        self.ops.insert(f.symbol().to_string(), f);
    }

    pub fn get(&self, symbol: &str) -> Option<&dyn OperatorFn> {
        self.ops.get(symbol).map(|f| f.as_ref())
    }

    pub fn contains(&self, symbol: &str) -> bool { self.ops.contains_key(symbol) }

    /// Registered symbols, sorted.
    pub fn symbols(&self) -> Vec<&str> {
        let mut v: Vec<&str> = self.ops.keys().map(String::as_str).collect();
        v.sort_unstable();
        v
    }
}

impl OperatorSet for OperatorRegistry {
    fn has_operator(&self, symbol: &str) -> bool { self.contains(symbol) }
}

/// Evaluate using the builtin operators.
///
/// For custom operators, use `evaluate_with_registry`.
pub fn evaluate(doc: &DslDocument, source: &dyn FactSource) -> Result<f64, EvaluationFailure> {
    evaluate_with_registry(doc, source, &OperatorRegistry::with_builtins())
}

/// Evaluate using a caller-provided operator registry.
pub fn evaluate_with_registry(doc: &DslDocument, source: &dyn FactSource, ops: &OperatorRegistry) -> Result<f64, EvaluationFailure> {
    let security_id = source.resolve_security_id(&doc.security).map_err(|e| {
        debug!(error = %e, "security not resolved");
        EvaluationFailure
    })?;
    evaluate_expression(&doc.expression, security_id, source, ops).ok_or(EvaluationFailure)
}

/// Reduces `expr` for an already-resolved security. `None` means no value.
pub fn evaluate_expression(expr: &Expression, security_id: SecurityId, source: &dyn FactSource, ops: &OperatorRegistry) -> Option<f64> {
    let a = resolve_operand(&expr.a, security_id, source, ops);
    let b = resolve_operand(&expr.b, security_id, source, ops);
    let (a, b) = (a?, b?);

    let Some(f) = ops.get(&expr.op) else {
        debug!(op = %expr.op, "unknown operator");
        return None;
    };
    let out = f.apply(a, b).filter(|v| v.is_finite());
    if out.is_none() {
        debug!(op = %expr.op, a, b, "operator produced no finite value");
    }
    trace!(op = %expr.op, a, b, result = ?out, "node evaluated");
    out
}

pub fn resolve_operand(operand: &Operand, security_id: SecurityId, source: &dyn FactSource, ops: &OperatorRegistry) -> Option<f64> {
    match operand {
        Operand::Literal(n) => Some(*n),
        Operand::Attribute(name) => match lookup_attribute(name, security_id, source) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!(attribute = %name, security_id, error = %e, "operand not resolved");
                None
            }
        },
        Operand::Nested(e) => evaluate_expression(e, security_id, source, ops),
    }
}

fn lookup_attribute(name: &str, security_id: SecurityId, source: &dyn FactSource) -> Result<f64, LookupError> {
    let attribute_id = source.resolve_attribute_id(name)?;
    source.lookup_fact_value(security_id, attribute_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use facts_store::AttributeId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// One security ("S", id 1) with `x = 10`, `big = 1e308` and a known-but-empty `gap`.
    #[derive(Default)]
    struct Tiny {
        fact_lookups: AtomicUsize,
    }

    impl FactSource for Tiny {
        fn resolve_security_id(&self, symbol: &str) -> Result<SecurityId, LookupError> {
            match symbol {
                "S" => Ok(1),
                _ => Err(LookupError::UnknownSecurity(symbol.into())),
            }
        }
        fn resolve_attribute_id(&self, name: &str) -> Result<AttributeId, LookupError> {
            match name {
                "x" => Ok(1),
                "gap" => Ok(2),
                "big" => Ok(3),
                _ => Err(LookupError::UnknownAttribute(name.into())),
            }
        }
        fn lookup_fact_value(&self, security_id: SecurityId, attribute_id: AttributeId) -> Result<f64, LookupError> {
            self.fact_lookups.fetch_add(1, Ordering::SeqCst);
            match (security_id, attribute_id) {
                (1, 1) => Ok(10.0),
                (1, 3) => Ok(1e308),
                _ => Err(LookupError::MissingFact { security_id, attribute_id }),
            }
        }
    }

    fn doc(expression: Expression) -> DslDocument {
        DslDocument { expression, security: "S".into() }
    }

    struct Max;
    impl OperatorFn for Max {
        fn symbol(&self) -> &'static str { "max" }
        fn apply(&self, a: f64, b: f64) -> Option<f64> { Some(a.max(b)) }
    }

    #[test]
    fn literal_bypasses_fact_lookup() {
        let src = Tiny::default();
        assert_eq!(evaluate(&doc(Expression::new("+", 1.5, 2.0)), &src), Ok(3.5));
        assert_eq!(src.fact_lookups.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn attribute_resolves_through_source() {
        let src = Tiny::default();
        assert_eq!(evaluate(&doc(Expression::new("*", "x", 3.0)), &src), Ok(30.0));
        assert_eq!(src.fact_lookups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn each_builtin_operator() {
        let src = Tiny::default();
        assert_eq!(evaluate(&doc(Expression::new("+", "x", 4.0)), &src), Ok(14.0));
        assert_eq!(evaluate(&doc(Expression::new("-", "x", 4.0)), &src), Ok(6.0));
        assert_eq!(evaluate(&doc(Expression::new("*", "x", 4.0)), &src), Ok(40.0));
        assert_eq!(evaluate(&doc(Expression::new("/", "x", 4.0)), &src), Ok(2.5));
    }

    #[test]
    fn zero_result_is_a_value() {
        let src = Tiny::default();
        assert_eq!(evaluate(&doc(Expression::new("-", "x", "x")), &src), Ok(0.0));
    }

    #[test]
    fn missing_fact_and_unknown_attribute_are_no_value() {
        let src = Tiny::default();
        assert_eq!(resolve_operand(&Operand::from("gap"), 1, &src, &OperatorRegistry::with_builtins()), None);
        assert_eq!(resolve_operand(&Operand::from("nope"), 1, &src, &OperatorRegistry::with_builtins()), None);
        assert_eq!(evaluate(&doc(Expression::new("+", "x", "gap")), &src), Err(EvaluationFailure));
    }

    #[test]
    fn no_value_propagates_from_deep_leaf() {
        let src = Tiny::default();
        let deep = Expression::new("+", 1.0, Expression::new("*", 2.0, Expression::new("-", "x", "nope")));
        assert_eq!(evaluate_expression(&deep, 1, &src, &OperatorRegistry::with_builtins()), None);
    }

    #[test]
    fn unknown_operator_is_no_value() {
        let src = Tiny::default();
        assert_eq!(evaluate(&doc(Expression::new("%", "x", 3.0)), &src), Err(EvaluationFailure));
    }

    #[test]
    fn division_by_zero_is_no_value() {
        assert_eq!(Arithmetic(Operator::Div).apply(1.0, 0.0), None);
        assert_eq!(Arithmetic(Operator::Div).apply(0.0, -0.0), None);
        let src = Tiny::default();
        assert_eq!(evaluate(&doc(Expression::new("/", "x", Expression::new("-", 2.0, 2.0))), &src), Err(EvaluationFailure));
    }

    #[test]
    fn overflow_to_infinity_is_no_value() {
        let src = Tiny::default();
        assert_eq!(evaluate(&doc(Expression::new("*", "big", 10.0)), &src), Err(EvaluationFailure));
        assert_eq!(evaluate(&doc(Expression::new("+", "big", "big")), &src), Err(EvaluationFailure));
        assert_eq!(evaluate(&doc(Expression::new("*", "big", 1.0)), &src), Ok(1e308));
    }

    #[test]
    fn nan_is_no_value() {
        let src = Tiny::default();
        let inf = Expression::new("*", "big", 10.0);
        assert_eq!(evaluate(&doc(Expression::new("-", inf.clone(), inf)), &src), Err(EvaluationFailure));
        assert_eq!(Arithmetic(Operator::Mul).apply(0.0, f64::INFINITY).map(f64::is_nan), Some(true));
        let ops = OperatorRegistry::with_builtins();
        assert_eq!(resolve_operand(&Operand::Literal(f64::NAN), 1, &src, &ops).map(f64::is_nan), Some(true));
        assert_eq!(evaluate_expression(&Expression::new("+", f64::NAN, 1.0), 1, &src, &ops), None);
    }

    #[test]
    fn unknown_security_fails_before_touching_facts() {
        let src = Tiny::default();
        let d = DslDocument { expression: Expression::new("+", "x", 1.0), security: "ZZZ".into() };
        assert_eq!(evaluate(&d, &src), Err(EvaluationFailure));
        assert_eq!(src.fact_lookups.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn custom_operator_via_registry() {
        let src = Tiny::default();
        let mut reg = OperatorRegistry::with_builtins();
        reg.register(Arc::new(Max));
        let d = doc(Expression::new("max", "x", Expression::new("*", "x", 2.0)));

        assert_eq!(evaluate_with_registry(&d, &src, &reg), Ok(20.0));
        assert_eq!(evaluate(&d, &src), Err(EvaluationFailure));
        assert!(reg.has_operator("max"));
        assert_eq!(reg.symbols(), vec!["*", "+", "-", "/", "max"]);
    }

    #[test]
    fn failure_message_matches_display() {
        assert_eq!(EvaluationFailure.to_string(), FAILURE_MESSAGE);
    }

    #[test]
    fn registry_agrees_with_builtin_operator_set() {
        let reg = OperatorRegistry::with_builtins();
        let as_set: &dyn OperatorSet = &reg;
        for sym in ["+", "-", "*", "/", "max", "%"] {
            assert_eq!(as_set.has_operator(sym), facts_expr_ast::BuiltinOperators.has_operator(sym));
        }
    }
}
