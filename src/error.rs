//! Error taxonomy for the filter pipeline.
//!
//! `ParseError` carries a byte position into the source and is produced by
//! the lexer and parser. `RuntimeError` is produced by the evaluator and
//! identifies the offending operator via `RuntimeErrorKind`.

use thiserror::Error;

/// A lexing or parsing failure, anchored to a byte offset in the source.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at position {position}")]
pub struct ParseError {
    pub position: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// The category of a runtime failure, per the spec's error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// Operator applied to incompatible types.
    Type,
    /// String-type index on array, or non-integer index.
    Index,
    /// `has` called with a non-string/non-integer argument.
    Key,
    /// Divide or modulo by zero.
    Numeric,
}

impl RuntimeErrorKind {
    fn label(self) -> &'static str {
        match self {
            RuntimeErrorKind::Type => "TypeError",
            RuntimeErrorKind::Index => "IndexError",
            RuntimeErrorKind::Key => "KeyError",
            RuntimeErrorKind::Numeric => "NumericError",
        }
    }
}

/// A failure raised while evaluating a compiled filter against a value.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}: {message}", kind.label())]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::Type, message)
    }

    pub fn index_error(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::Index, message)
    }

    pub fn key_error(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::Key, message)
    }

    pub fn numeric_error(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::Numeric, message)
    }
}

/// The union of everything `compile`/`apply`/`query` can fail with.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
