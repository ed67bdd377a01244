//! Boolean tag queries.
//!
//! # Responsibility
//! - Compile infix expressions over entity names into postfix form.
//! - Evaluate compiled queries against a [`crate::store::RelationStore`].
//!
//! # Invariants
//! - `Err` means the query could not be evaluated; `Ok` with an empty set
//!   means it matched nothing.

use crate::model::elem::ElemKind;
use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod compiler;
pub mod evaluator;

pub use compiler::{compile, compile_to_postfix, is_query, CompiledQuery, OperandScanner, PostfixToken};
pub use evaluator::{evaluate, evaluate_text};

/// Malformed query text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No operand or operator at all.
    Empty,
    /// `)` without a matching `(`, at the given char position.
    UnbalancedClose { position: usize },
    /// `(` never closed.
    UnclosedOpen,
    /// Operator applied with too few operands on the stack.
    MissingOperand { operator: char },
    /// More than one value left at the end of evaluation.
    DanglingOperands { count: usize },
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty query"),
            Self::UnbalancedClose { position } => {
                write!(f, "unbalanced `)` at position {position}")
            }
            Self::UnclosedOpen => write!(f, "unclosed `(`"),
            Self::MissingOperand { operator } => {
                write!(f, "operator `{operator}` is missing an operand")
            }
            Self::DanglingOperands { count } => {
                write!(f, "query leaves {count} values, expected exactly one")
            }
        }
    }
}

impl Error for ParseError {}

pub type QueryResult<T> = Result<T, QueryError>;

/// Query evaluation error.
#[derive(Debug)]
pub enum QueryError {
    Parse(ParseError),
    /// An operand names an entity that does not exist.
    UnknownEntity { kind: ElemKind, name: String },
    Store(StoreError),
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "query parse error: {err}"),
            Self::UnknownEntity { kind, name } => write!(f, "{kind} `{name}` does not exist"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for QueryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::UnknownEntity { .. } => None,
        }
    }
}

impl From<ParseError> for QueryError {
    fn from(value: ParseError) -> Self {
        Self::Parse(value)
    }
}

impl From<StoreError> for QueryError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}
