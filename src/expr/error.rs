//! Expression errors.

use thiserror::Error;

/// Malformed expression text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Syntax error at position {position}: {message}")]
pub struct SyntaxError {
    /// Human-readable description.
    pub message: String,
    /// Byte offset in the expression text where the error was detected.
    pub position: usize,
}

impl SyntaxError {
    pub(crate) fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// Failure during expression evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Name is not known to the evaluation context.
    #[error("Unresolved name '{0}'")]
    UnresolvedName(String),

    /// Expression references a context-dependent name but was evaluated without a context.
    #[error("'{0}' requires an evaluation context")]
    NoContext(String),

    /// Call of an unknown function.
    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    /// Function called with a wrong number of arguments.
    #[error("Function '{function}' expects {expected} argument(s), got {found}")]
    Arity {
        /// Function name.
        function: String,
        /// Accepted argument count, e.g. `2` or `1..2`.
        expected: String,
        /// Number of arguments in the call.
        found: usize,
    },

    /// Operation is not defined for its arguments (division by zero, square root of a negative number, overflow).
    #[error("{operation}: {message}")]
    Domain {
        /// Operator or function name.
        operation: String,
        /// Description of the violated domain.
        message: String,
    },

    /// Operator or function applied to operands of unsupported types.
    #[error("'{operation}' cannot be applied to {operands}")]
    OperandType {
        /// Operator or function name.
        operation: String,
        /// Types of the operands.
        operands: String,
    },

    /// Parameter references itself, directly or through other parameters.
    #[error("Recursive reference to '{0}'")]
    Recursion(String),

    /// Referenced parameter exists but cannot provide a value.
    #[error("Cannot evaluate '{name}': {message}")]
    Parameter {
        /// Parameter name.
        name: String,
        /// Description of the failure.
        message: String,
    },

    /// Random function evaluated in a context without random number generator.
    #[error("No random number generator available")]
    NoRandomSource,
}

impl EvalError {
    pub(crate) fn domain(operation: &str, message: &str) -> Self {
        EvalError::Domain {
            operation: operation.to_owned(),
            message: message.to_owned(),
        }
    }
}
