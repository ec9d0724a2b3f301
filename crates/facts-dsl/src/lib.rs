//!
//! Parser for facts DSL documents.
//!
//! Parses JSON text into the shared AST in `facts-expr-ast`, separating two
//! kinds of rejection so callers can report them differently:
//! - `InvalidJson`: the text is not a JSON object at all,
//! - `InvalidDsl`: it is JSON, but not shaped like a DSL document.
//!
//! Typical pipeline:
//! 1. Author writes a document (e.g. in an editor or a file).
//! 2. Parse document -> `DslDocument` (this crate).
//! 3. Optionally check it against a fact catalog (`facts-expr-check`).
//! 4. Evaluate it against a fact store (`facts-expr-eval`).

use facts_expr_ast::{DslDocument, Expression};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DslError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("invalid DSL: {0}")]
    InvalidDsl(String),
}

const REQUIRED_KEYS: [&str; 2] = ["expression", "security"];

/// Parses a `{"expression": ..., "security": ...}` document.
pub fn parse_document(input: &str) -> Result<DslDocument, DslError> {
    let obj = parse_object(input)?;
    for key in REQUIRED_KEYS {
        if !obj.contains_key(key) {
            return Err(DslError::InvalidDsl(format!("missing `{key}`")));
        }
    }
    serde_json::from_value(Value::Object(obj)).map_err(|e| DslError::InvalidDsl(e.to_string()))
}

/// Parses a bare expression node such as `{"fn": "+", "a": "price", "b": 1}`.
pub fn parse_expression(input: &str) -> Result<Expression, DslError> {
    let obj = parse_object(input)?;
    serde_json::from_value(Value::Object(obj)).map_err(|e| DslError::InvalidDsl(e.to_string()))
}

fn parse_object(input: &str) -> Result<Map<String, Value>, DslError> {
    match serde_json::from_str::<Value>(input) {
        Ok(Value::Object(obj)) => Ok(obj),
        Ok(Value::Array(_)) => Err(DslError::InvalidDsl("expected an object, found an array".into())),
        Ok(other) => Err(DslError::InvalidJson(format!("expected an object, found {}", kind(&other)))),
        Err(e) => Err(DslError::InvalidJson(e.to_string())),
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facts_expr_ast::Operand;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_multiply_document() {
        let doc = parse_document(
            r#"{
  "expression": {"fn": "*", "a": "sales", "b": 2},
  "security": "ABC"
}"#,
        ).unwrap();
        assert_eq!(doc.security, "ABC");
        assert_eq!(doc.expression, Expression::new("*", "sales", 2.0));
    }

    #[test]
    fn parses_nested_document() {
        let doc = parse_document(
            r#"{
  "expression": {
    "fn": "-",
    "a": {"fn": "-", "a": "eps", "b": "shares"},
    "b": {"fn": "-", "a": "assets", "b": "liabilities"}
  },
  "security": "CDE"
}"#,
        ).unwrap();
        assert!(matches!(doc.expression.a, Operand::Nested(_)));
        assert!(matches!(doc.expression.b, Operand::Nested(_)));
    }

    #[test]
    fn truncated_text_is_invalid_json() {
        let err = parse_document(
            r#"{
  "expression": {"fn": "+", "a": "price", "b": "eps"},
  "security": "BCD"
"#,
        ).unwrap_err();
        assert!(matches!(err, DslError::InvalidJson(_)));
    }

    #[test]
    fn array_is_invalid_dsl_and_scalars_invalid_json() {
        assert!(matches!(parse_document("[1, 2]"), Err(DslError::InvalidDsl(m)) if m.contains("array")));
        assert!(matches!(parse_expression("[]"), Err(DslError::InvalidDsl(_))));
        assert!(matches!(parse_document("null"), Err(DslError::InvalidJson(_))));
        assert!(matches!(parse_document("42"), Err(DslError::InvalidJson(m)) if m.contains("number")));
    }

    #[test]
    fn missing_keys_are_invalid_dsl() {
        let err = parse_document(r#"{"wrong": 123, "security": "BCD"}"#).unwrap_err();
        assert!(matches!(err, DslError::InvalidDsl(m) if m.contains("expression")));

        let err = parse_document(r#"{"expression": {"fn": "+", "a": 1, "b": 2}}"#).unwrap_err();
        assert!(matches!(err, DslError::InvalidDsl(m) if m.contains("security")));
    }

    #[test]
    fn malformed_operand_is_invalid_dsl() {
        let err = parse_document(r#"{"expression": {"fn": "+", "a": false, "b": 2}, "security": "ABC"}"#).unwrap_err();
        assert!(matches!(err, DslError::InvalidDsl(_)));

        let err = parse_document(r#"{"expression": {"fn": "+", "a": 1}, "security": "ABC"}"#).unwrap_err();
        assert!(matches!(err, DslError::InvalidDsl(_)));

        let err = parse_document(r#"{"expression": {"fn": "+", "a": 1, "b": 2}, "security": 7}"#).unwrap_err();
        assert!(matches!(err, DslError::InvalidDsl(_)));
    }

    #[test]
    fn unknown_operator_still_parses() {
        let e = parse_expression(r#"{"fn": "^", "a": "price", "b": 2}"#).unwrap();
        assert_eq!(e.op, "^");
    }
}
