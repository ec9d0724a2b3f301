//!
//! Static validation of DSL documents before evaluation.
//!
//! The evaluator deliberately collapses every miss into one failure. This
//! crate is where callers find out *what* is wrong: an unknown security, an
//! attribute name the catalog has never heard of, or an operator symbol no
//! registry implements. It does not look at fact values, so a document that
//! checks cleanly can still fail to evaluate on a missing fact.

use facts_expr_ast::{DslDocument, Expression, Operand};
use facts_store::FactStore;

pub use facts_expr_ast::{BuiltinOperators, OperatorSet};
use thiserror::Error;

/// Names the checker validates against.
pub trait Catalog {
    fn has_security(&self, symbol: &str) -> bool;
    fn has_attribute(&self, name: &str) -> bool;
}

impl Catalog for FactStore {
    fn has_security(&self, symbol: &str) -> bool { self.contains_security(symbol) }
    fn has_attribute(&self, name: &str) -> bool { self.contains_attribute(name) }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CheckError {
    #[error("unknown security: {0}")]
    UnknownSecurity(String),
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),
    #[error("unknown operator: {0}")]
    UnknownOperator(String),
}

/// Returns the first problem found: security first, then the tree depth-first.
pub fn check_document(doc: &DslDocument, catalog: &dyn Catalog, ops: &dyn OperatorSet) -> Result<(), CheckError> {
    if !catalog.has_security(&doc.security) {
        return Err(CheckError::UnknownSecurity(doc.security.clone()));
    }
    check_expression(&doc.expression, catalog, ops)
}

pub fn check_expression(expr: &Expression, catalog: &dyn Catalog, ops: &dyn OperatorSet) -> Result<(), CheckError> {
    if !ops.has_operator(&expr.op) {
        return Err(CheckError::UnknownOperator(expr.op.clone()));
    }
    check_operand(&expr.a, catalog, ops)?;
    check_operand(&expr.b, catalog, ops)
}

fn check_operand(o: &Operand, catalog: &dyn Catalog, ops: &dyn OperatorSet) -> Result<(), CheckError> {
    match o {
        Operand::Attribute(name) if !catalog.has_attribute(name) => Err(CheckError::UnknownAttribute(name.clone())),
        Operand::Attribute(_) | Operand::Literal(_) => Ok(()),
        Operand::Nested(e) => check_expression(e, catalog, ops),
    }
}

/// Every problem in the document, in the order `check_document` would meet them.
pub fn collect_problems(doc: &DslDocument, catalog: &dyn Catalog, ops: &dyn OperatorSet) -> Vec<CheckError> {
    let mut out = Vec::new();
    if !catalog.has_security(&doc.security) {
        out.push(CheckError::UnknownSecurity(doc.security.clone()));
    }
    collect(&doc.expression, catalog, ops, &mut out);
    out
}

fn collect(expr: &Expression, catalog: &dyn Catalog, ops: &dyn OperatorSet, out: &mut Vec<CheckError>) {
    if !ops.has_operator(&expr.op) {
        out.push(CheckError::UnknownOperator(expr.op.clone()));
    }
    for o in [&expr.a, &expr.b] {
        match o {
            Operand::Attribute(name) if !catalog.has_attribute(name) => out.push(CheckError::UnknownAttribute(name.clone())),
            Operand::Nested(e) => collect(e, catalog, ops, out),
            _ => {}
        }
    }
}
