//!
//! AST types for the facts expression DSL.
//!
//! This crate is intentionally small and shared by:
//! - the document parser (JSON text -> `DslDocument`),
//! - the checker (static validation against a fact catalog),
//! - the evaluator (runtime),
//! - and tooling (dependency extraction, hashing).
//!
//! Key features:
//! - `Expression` / `Operand`: the binary operation tree evaluated per security.
//! - `ast_hash`: stable hash of the canonical JSON representation (dedupe / caching).
//! - `extract_dependencies`: walks the tree and returns referenced attributes and operators.
//!
//! Wire format is the JSON the DSL is written in:
//!
//! ```json
//! { "expression": {"fn": "*", "a": "sales", "b": 2}, "security": "ABC" }
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
/// One side of a binary operation.
///
/// On the wire the variant is implied by the JSON type:
/// string -> `Attribute`, number -> `Literal`, object -> `Nested`.
pub enum Operand {
    Attribute(String),
    Literal(f64),
    Nested(Box<Expression>),
}

impl From<&str> for Operand {
    fn from(name: &str) -> Self { Operand::Attribute(name.to_string()) }
}

impl From<String> for Operand {
    fn from(name: String) -> Self { Operand::Attribute(name) }
}

impl From<f64> for Operand {
    fn from(n: f64) -> Self { Operand::Literal(n) }
}

impl From<Expression> for Operand {
    fn from(e: Expression) -> Self { Operand::Nested(Box::new(e)) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A binary operation node.
///
/// `op` stays as the raw symbol so that unrecognized operators survive parsing
/// and are rejected by the checker or the evaluator instead of the parser.
pub struct Expression {
    #[serde(rename = "fn")]
    pub op: String,
    pub a: Operand,
    pub b: Operand,
}

impl Expression {
    pub fn new(op: impl Into<String>, a: impl Into<Operand>, b: impl Into<Operand>) -> Self {
        Self { op: op.into(), a: a.into(), b: b.into() }
    }

    /// Number of operation nodes on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        1 + operand_depth(&self.a).max(operand_depth(&self.b))
    }
}

fn operand_depth(o: &Operand) -> usize {
    match o {
        Operand::Nested(e) => e.depth(),
        _ => 0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One evaluation request: an expression tree for a single security symbol.
pub struct DslDocument {
    pub expression: Expression,
    pub security: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// The arithmetic operators the DSL defines.
pub enum Operator { Add, Sub, Mul, Div }

impl Operator {
    pub const ALL: [Operator; 4] = [Operator::Add, Operator::Sub, Operator::Mul, Operator::Div];

    pub fn from_symbol(s: &str) -> Option<Self> {
        match s {
            "+" => Some(Operator::Add),
            "-" => Some(Operator::Sub),
            "*" => Some(Operator::Mul),
            "/" => Some(Operator::Div),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.symbol()) }
}

/// Operator symbols an evaluator can apply.
pub trait OperatorSet {
    fn has_operator(&self, symbol: &str) -> bool;
}

/// The four arithmetic operators, without any custom extensions.
pub struct BuiltinOperators;

impl OperatorSet for BuiltinOperators {
    fn has_operator(&self, symbol: &str) -> bool { Operator::from_symbol(symbol).is_some() }
}

pub fn canonical_json(expr: &Expression) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::to_value(expr)
}

pub fn ast_hash(expr: &Expression) -> Result<String, serde_json::Error> {
    let v = canonical_json(expr)?;
    let bytes = serde_json::to_vec(&v)?;
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Dependencies extracted from an expression: attribute names and operator symbols.
///
/// This powers:
/// - static validation (detect unknown attributes/operators before evaluating),
/// - impact analysis ("which expressions read attribute X?").
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Dependencies {
    pub attributes: HashSet<String>,
    pub operators: HashSet<String>,
}

/// Walks the tree and returns the set of attribute names and operator symbols.
pub fn extract_dependencies(expr: &Expression) -> Dependencies {
    let mut d = Dependencies::default();
    walk(expr, &mut d);
    d
}

fn add_operand(d: &mut Dependencies, o: &Operand) {
    match o {
        Operand::Attribute(name) => { d.attributes.insert(name.clone()); }
        Operand::Literal(_) => {}
        Operand::Nested(e) => walk(e, d),
    }
}

fn walk(expr: &Expression, d: &mut Dependencies) {
    d.operators.insert(expr.op.clone());
    add_operand(d, &expr.a);
    add_operand(d, &expr.b);
}
