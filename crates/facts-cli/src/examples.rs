//! Pre-canned documents, including deliberately broken ones.

#[derive(Debug, Clone, Copy)]
pub struct Example {
    pub id: &'static str,
    pub label: &'static str,
    pub dsl: &'static str,
}

pub const EXAMPLES: &[Example] = &[
    Example {
        id: "multiply",
        label: "Simple multiplication",
        dsl: r#"{
  "expression": {"fn": "*", "a": "sales", "b": 2},
  "security": "ABC"
}"#,
    },
    Example {
        id: "divide",
        label: "Simple division",
        dsl: r#"{
  "expression": {"fn": "/", "a": "price", "b": "eps"},
  "security": "BCD"
}"#,
    },
    Example {
        id: "nested",
        label: "Nested expression",
        dsl: r#"{
  "expression": {
    "fn": "-",
    "a": {"fn": "-", "a": "eps", "b": "shares"},
    "b": {"fn": "-", "a": "assets", "b": "liabilities"}
  },
  "security": "CDE"
}"#,
    },
    Example {
        id: "invalid-json",
        label: "Invalid JSON",
        dsl: r#"{
  "expression": {"fn": "+", "a": "price", "b": "eps"},
  "security": "BCD"
"#,
    },
    Example {
        id: "invalid-dsl",
        label: "Invalid DSL",
        dsl: r#"{
  "wrong": 123,
  "security": "BCD"
}"#,
    },
    Example {
        id: "missing-security",
        label: "Missing security",
        dsl: r#"{
  "expression": {"fn": "*", "a": "sales", "b": 2},
  "security": "ZZZ"
}"#,
    },
];

pub fn find(id: &str) -> Option<&'static Example> {
    EXAMPLES.iter().find(|e| e.id == id)
}
