//! Entity parameters.
//!
//! A parameter ([`Par`]) is a typed, named value of an entity. Its value lives in a [`ValueCell`] holding either a
//! literal or an [`Expression`](crate::expr::Expression) and shared between parameters through reference
//! counting. Writing to a parameter whose cell is shared clones the cell first, so other parameters never observe
//! the change.
//!
//! Parameters of one entity are grouped in a [`ParamSet`], which applies configured values and acts as the
//! evaluation context for expressions referencing sibling parameters.

mod cell;
mod error;
mod handle;
mod pool;
mod set;
mod value;

pub use cell::{CellFlags, ValueCell};
pub use error::{ParError, ParErrorKind};
pub use handle::{Par, ParDecl, ParObserver, ParState};
pub use pool::CellPool;
pub use set::ParamSet;
pub use value::{ParType, Value, XmlElement};
