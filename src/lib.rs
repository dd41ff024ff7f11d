//! A JQ-like filter expression compiler and evaluator for JSON-shaped
//! values.
//!
//! ```
//! use fgh::{compile, Value};
//!
//! let filter = compile(".users[] | select(.age > 18) | .name").unwrap();
//! let input: Value = serde_json::json!({
//!     "users": [{"name": "A", "age": 17}, {"name": "B", "age": 30}]
//! })
//! .into();
//! let names = filter.apply(&input).unwrap();
//! assert_eq!(names, vec![Value::string("B")]);
//! ```
pub mod ast;
pub mod error;
mod eval;
pub mod format;
mod lexer;
mod parser;
pub mod value;
mod value_ops;

pub use ast::Node;
pub use error::{Error, ParseError, RuntimeError, RuntimeErrorKind};
pub use format::{format as format_ast, FormatOptions};
pub use value::Value;

/// A parsed, immutable filter expression. Construction (`compile`) is the
/// only fallible step; `apply` never fails to parse, only to evaluate.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    ast: Node,
}

impl Filter {
    /// Evaluates this filter against `input`, returning every output
    /// value in order. Evaluation holds no shared mutable state — a
    /// `Filter` can be cloned cheaply per thread, though `Value`'s
    /// `Rc`-based sharing keeps it single-threaded within one clone.
    pub fn apply(&self, input: &Value) -> Result<Vec<Value>, RuntimeError> {
        eval::eval(&self.ast, input)
    }

    /// The underlying AST, for tooling that wants to inspect or
    /// re-format a compiled filter.
    pub fn ast(&self) -> &Node {
        &self.ast
    }
}

/// Parses and compiles a filter source string.
pub fn compile(source: &str) -> Result<Filter, ParseError> {
    let ast = parser::parse(source)?;
    Ok(Filter { ast })
}

/// Parses a filter source string into its AST without compiling it
/// further, for tooling that wants to inspect or transform it directly.
pub fn parse(source: &str) -> Result<Node, ParseError> {
    parser::parse(source)
}

/// Compiles `source` and applies it to `input` in one step.
pub fn query(source: &str, input: &Value) -> Result<Vec<Value>, Error> {
    let filter = compile(source)?;
    Ok(filter.apply(input)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_and_apply() {
        let filter = compile(".foo").unwrap();
        let input = Value::object(vec![("foo".to_string(), Value::Number(42.0))]);
        assert_eq!(filter.apply(&input).unwrap(), vec![Value::Number(42.0)]);
    }

    #[test]
    fn compile_parse_error_reports_position() {
        let err = compile(".[").unwrap_err();
        assert!(err.position > 0 || err.position == 0);
    }

    #[test]
    fn apply_runtime_error_on_bad_length() {
        let filter = compile("length").unwrap();
        assert!(filter.apply(&Value::Bool(true)).is_err());
    }

    #[test]
    fn query_convenience_function() {
        let input = Value::object(vec![("a".to_string(), Value::Number(1.0))]);
        let out = query(".a + 1", &input).unwrap();
        assert_eq!(out, vec![Value::Number(2.0)]);
    }

    #[test]
    fn query_propagates_parse_error() {
        assert!(matches!(query("[", &Value::Null), Err(Error::Parse(_))));
    }

    #[test]
    fn query_propagates_runtime_error() {
        assert!(matches!(query("1/0", &Value::Null), Err(Error::Runtime(_))));
    }

    #[test]
    fn end_to_end_scenarios() {
        let input = Value::object(vec![("foo".to_string(), Value::Number(42.0)), ("bar".to_string(), Value::Number(1.0))]);
        assert_eq!(query(".foo", &input).unwrap(), vec![Value::Number(42.0)]);
    }
}
