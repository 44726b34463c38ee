use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::cell::{CellFlags, ValueCell};
use super::error::ParError;
use super::handle::ParDecl;
use super::value::ParType;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CellKey {
    kind: ParType,
    unit: Option<String>,
    flags: CellFlags,
    text: String,
}

impl CellKey {
    fn of(cell: &ValueCell) -> Self {
        Self {
            kind: cell.kind(),
            unit: cell.unit().map(str::to_owned),
            flags: cell.flags(),
            text: cell.to_string(),
        }
    }
}

/// Interns value cells so that parameters assigned equivalent values share one cell.
///
/// Two cells are equivalent if they have the same type, unit and flags and their values or expressions have
/// the same canonical text.
#[derive(Default)]
pub struct CellPool {
    cells: FxHashMap<CellKey, Rc<ValueCell>>,
    hits: usize,
}

impl CellPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a cell holding the parsed text for a parameter with the given declaration.
    pub fn intern(&mut self, decl: &ParDecl, text: &str) -> Result<Rc<ValueCell>, ParError> {
        let mut cell = ValueCell::new(decl.kind)
            .with_unit(decl.unit.as_deref())
            .volatile(decl.is_volatile);
        cell.parse(text)?;
        Ok(self.insert(cell))
    }

    /// Returns the pooled cell equivalent to `cell`, adding `cell` if there is none.
    pub fn insert(&mut self, cell: ValueCell) -> Rc<ValueCell> {
        let key = CellKey::of(&cell);
        if let Some(existing) = self.cells.get(&key) {
            self.hits += 1;
            return existing.clone();
        }
        let cell = Rc::new(cell);
        self.cells.insert(key, cell.clone());
        cell
    }

    /// Returns the number of pooled cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Returns how many times an existing cell was reused.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Drops cells no longer referenced by any parameter.
    pub fn purge(&mut self) {
        self.cells.retain(|_, cell| Rc::strong_count(cell) > 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equivalent_values_share_a_cell() {
        let decl = ParDecl::new("delay", ParType::Double);
        let mut pool = CellPool::new();
        let a = pool.intern(&decl, "exponential(2.0) + base").unwrap();
        let b = pool.intern(&decl, "exponential(2.0)+(base)").unwrap();
        let c = pool.intern(&decl, "1 + 2").unwrap();
        let d = pool.intern(&decl, "3").unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert!(Rc::ptr_eq(&c, &d));
        assert!(!Rc::ptr_eq(&a, &c));
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.hits(), 2);

        let long_decl = ParDecl::new("n", ParType::Long);
        let e = pool.intern(&long_decl, "3").unwrap();
        assert!(!Rc::ptr_eq(&c, &e));

        drop((a, b));
        pool.purge();
        assert_eq!(pool.len(), 2);
    }
}
