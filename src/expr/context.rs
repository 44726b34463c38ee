//! Evaluation contexts that resolve names, indices and random numbers.

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::BuildHasher;

use super::error::EvalError;
use crate::par::Value;

/// Environment in which expressions are evaluated.
///
/// Provides values for the context-dependent parts of an expression: references to other parameters, `index`,
/// `sizeof(name)` and random functions. Only [`resolve`](EvalContext::resolve) is mandatory.
pub trait EvalContext {
    /// Returns the value of a named parameter or variable.
    fn resolve(&self, name: &str) -> Result<Value, EvalError>;

    /// Returns the index of the owning entity within its vector.
    fn index(&self) -> Result<i64, EvalError> {
        Err(EvalError::UnresolvedName("index".to_owned()))
    }

    /// Returns the size of a named vector.
    fn size_of(&self, name: &str) -> Result<i64, EvalError> {
        Err(EvalError::UnresolvedName(format!("sizeof({})", name)))
    }

    /// Returns a random float in the range _[0, 1)_.
    fn random(&self) -> Result<f64, EvalError> {
        Err(EvalError::NoRandomSource)
    }
}

impl<S: BuildHasher> EvalContext for HashMap<String, Value, S> {
    fn resolve(&self, name: &str) -> Result<Value, EvalError> {
        self.get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnresolvedName(name.to_owned()))
    }
}

/// Shared context, e.g. a parent entity's parameters used by its children.
impl<T: EvalContext> EvalContext for RefCell<T> {
    fn resolve(&self, name: &str) -> Result<Value, EvalError> {
        borrow(self, name)?.resolve(name)
    }

    fn index(&self) -> Result<i64, EvalError> {
        borrow(self, "index")?.index()
    }

    fn size_of(&self, name: &str) -> Result<i64, EvalError> {
        borrow(self, name)?.size_of(name)
    }

    fn random(&self) -> Result<f64, EvalError> {
        borrow(self, "random")?.random()
    }
}

fn borrow<'a, T>(cell: &'a RefCell<T>, name: &str) -> Result<std::cell::Ref<'a, T>, EvalError> {
    cell.try_borrow().map_err(|_| EvalError::Parameter {
        name: name.to_owned(),
        message: "evaluation context is being modified".to_owned(),
    })
}
