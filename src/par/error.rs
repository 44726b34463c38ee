//! Parameter errors.

use thiserror::Error;

use super::value::ParType;
use crate::expr::{EvalError, SyntaxError};

/// Kind of parameter failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParErrorKind {
    /// Value of one type was requested from or assigned to a parameter of another type.
    #[error("Cannot cast from {from} to {to}")]
    BadCast {
        /// Actual type.
        from: ParType,
        /// Requested type.
        to: ParType,
    },

    /// Parameter was read before a value or default was established.
    #[error("Parameter not set")]
    NotSet,

    /// Expression evaluated to a value that cannot be converted to the parameter type.
    #[error("Expression result of type {from} cannot be converted to {to}")]
    TypeCast {
        /// Type of the evaluated value.
        from: ParType,
        /// Parameter type.
        to: ParType,
    },

    /// Borrowing accessor used on a string parameter holding an expression.
    #[error("str_value() cannot be used on a volatile string expression, use string_value() instead")]
    VolatileAccess,

    /// Write to a const parameter after finalization.
    #[error("Cannot change the value of a const parameter after initialization")]
    Immutable,

    /// Malformed expression text.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// Expression evaluation failed.
    #[error(transparent)]
    Eval(#[from] EvalError),

    /// No parameter of the given name.
    #[error("Unknown parameter '{0}'")]
    UnknownParameter(String),

    /// Value was configured as `ask`, which needs interactive input.
    #[error("Interactive prompting for the value is not supported")]
    AskNotSupported,
}

/// Parameter failure, optionally naming the parameter.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}{kind}", par_prefix(.par))]
pub struct ParError {
    /// Full name of the parameter, `<owner>.<name>`.
    pub par: Option<String>,
    /// What went wrong.
    pub kind: ParErrorKind,
}

fn par_prefix(par: &Option<String>) -> String {
    match par {
        Some(name) => format!("{}: ", name),
        None => String::new(),
    }
}

impl ParError {
    /// Creates error not tied to a parameter.
    pub fn new(kind: ParErrorKind) -> Self {
        Self { par: None, kind }
    }

    /// Attaches the parameter name unless one is already present.
    pub fn in_par(mut self, name: &str) -> Self {
        if self.par.is_none() {
            self.par = Some(name.to_owned());
        }
        self
    }

    /// Returns the kind of failure.
    pub fn kind(&self) -> &ParErrorKind {
        &self.kind
    }
}

impl From<ParErrorKind> for ParError {
    fn from(kind: ParErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<SyntaxError> for ParError {
    fn from(err: SyntaxError) -> Self {
        Self::new(err.into())
    }
}

impl From<EvalError> for ParError {
    fn from(err: EvalError) -> Self {
        Self::new(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_names_parameter() {
        let err = ParError::from(ParErrorKind::BadCast {
            from: ParType::Long,
            to: ParType::String,
        })
        .in_par("proc1.delay");
        assert_eq!(err.to_string(), "proc1.delay: Cannot cast from long to string");
        assert_eq!(err.in_par("other").par.as_deref(), Some("proc1.delay"));
    }
}
