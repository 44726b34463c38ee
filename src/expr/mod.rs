//! Expressions used as parameter values.
//!
//! Expression text is tokenized with [`logos`] and parsed by a Pratt parser into a [`Node`] tree:
//!
//! ```
//! use evsim::expr::Expression;
//! use evsim::par::Value;
//!
//! let expr = Expression::parse("3 + 4 * 2").unwrap();
//! assert!(expr.is_constant());
//! assert_eq!(expr.evaluate(None).unwrap(), Value::Long(11));
//! assert_eq!(expr.to_string(), "3 + 4 * 2");
//! ```
//!
//! Expressions referencing other parameters, `index`, `sizeof(...)` or random functions are context-dependent
//! and need an [`EvalContext`] to be evaluated.

mod ast;
mod context;
mod error;
mod eval;
pub mod functions;
mod lexer;
mod parser;

use std::cell::OnceCell;
use std::cmp::Ordering;
use std::fmt;

pub use ast::{BinaryOp, Node, UnaryOp};
pub use context::EvalContext;
pub use error::{EvalError, SyntaxError};
pub use lexer::{tokenize, Token};
pub(crate) use lexer::{non_finite_text, quote_string};

use crate::par::Value;

/// Parsed expression.
///
/// The result of a constant expression is computed once and memoized.
#[derive(Debug, Clone)]
pub struct Expression {
    root: Node,
    memo: OnceCell<Value>,
}

impl Expression {
    /// Parses expression text.
    pub fn parse(text: &str) -> Result<Self, SyntaxError> {
        parser::parse(text).map(Self::from_node)
    }

    /// Creates expression from syntax tree.
    pub fn from_node(root: Node) -> Self {
        Self {
            root,
            memo: OnceCell::new(),
        }
    }

    /// Returns the root node.
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Consumes the expression returning its root node.
    pub fn into_root(self) -> Node {
        self.root
    }

    /// Returns true if the expression contains no context-dependent references.
    pub fn is_constant(&self) -> bool {
        self.root.is_constant()
    }

    /// Evaluates the expression.
    ///
    /// The context may be `None` only if the expression is constant, otherwise references fail with
    /// [`EvalError::NoContext`].
    pub fn evaluate(&self, ctx: Option<&dyn EvalContext>) -> Result<Value, EvalError> {
        if let Some(value) = self.memo.get() {
            return Ok(value.clone());
        }
        let value = eval::evaluate(&self.root, ctx)?;
        if self.is_constant() {
            let _ = self.memo.set(value.clone());
        }
        Ok(value)
    }

    /// Returns the canonical text of the expression.
    ///
    /// Parsing the canonical text yields an equal expression.
    pub fn canonical_text(&self) -> String {
        self.root.to_string()
    }

    /// Compares expressions by their canonical text.
    ///
    /// Expressions comparing equal are interchangeable and may share one value cell.
    pub fn compare(&self, other: &Expression) -> Ordering {
        if self.root == other.root {
            return Ordering::Equal;
        }
        self.canonical_text().cmp(&other.canonical_text())
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}

impl From<Node> for Expression {
    fn from(root: Node) -> Self {
        Self::from_node(root)
    }
}
