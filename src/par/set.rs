use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::error::{ParError, ParErrorKind};
use super::handle::{Par, ParDecl, ParObserver};
use super::pool::CellPool;
use super::value::{Value, XmlElement};
use crate::component::Id;
use crate::config::{AssignedValue, ParAssignments};
use crate::context::{RandomSource, SimulationContext};
use crate::expr::{EvalContext, EvalError};

/// Parameters of one entity.
///
/// The set is also the evaluation context of its parameters: names in expressions resolve to sibling
/// parameters, `index` and `sizeof(...)` to the entity's position and vector sizes, random functions draw
/// from the simulation random number generator.
///
/// ```
/// use evsim::par::{ParDecl, ParType, ParamSet};
///
/// let mut params = ParamSet::new(0, "server");
/// params.declare(ParDecl::new("rate", ParType::Double).default_value("2.5")).unwrap();
/// params.declare(ParDecl::new("service_time", ParType::Double)).unwrap();
/// params.parse("service_time", "1 / rate").unwrap();
/// params.finalize().unwrap();
/// assert_eq!(params.double("service_time").unwrap(), 0.4);
/// ```
pub struct ParamSet {
    owner: Id,
    owner_name: String,
    pars: Vec<Par>,
    by_name: FxHashMap<String, usize>,
    index: Option<i64>,
    vector_sizes: FxHashMap<String, i64>,
    random: Option<RandomSource>,
    observer: Option<Rc<dyn ParObserver>>,
    resolving: RefCell<Vec<String>>,
}

impl ParamSet {
    /// Creates an empty set.
    pub fn new(owner: Id, owner_name: &str) -> Self {
        Self {
            owner,
            owner_name: owner_name.to_owned(),
            pars: Vec::new(),
            by_name: FxHashMap::default(),
            index: None,
            vector_sizes: FxHashMap::default(),
            random: None,
            observer: None,
            resolving: RefCell::new(Vec::new()),
        }
    }

    /// Creates an empty set for the component behind the context, drawing random values from the simulation.
    pub fn for_context(ctx: &SimulationContext) -> Self {
        let mut set = Self::new(ctx.id(), ctx.name());
        set.random = Some(ctx.random_source());
        set
    }

    /// Returns the owner entity id.
    pub fn owner(&self) -> Id {
        self.owner
    }

    /// Returns the owner entity name.
    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }

    /// Sets the index of the owner within its vector, available as `index` in expressions.
    pub fn set_index(&mut self, index: i64) {
        self.index = Some(index);
    }

    /// Sets the size of a vector, available as `sizeof(name)` in expressions.
    pub fn set_vector_size(&mut self, name: &str, size: i64) {
        self.vector_sizes.insert(name.to_owned(), size);
    }

    /// Sets the random number source used by random functions.
    pub fn set_random_source(&mut self, random: RandomSource) {
        self.random = Some(random);
    }

    /// Declares a parameter.
    ///
    /// # Panics
    ///
    /// Panics if a parameter with the same name is already declared.
    pub fn declare(&mut self, decl: ParDecl) -> Result<&mut Par, ParError> {
        assert!(
            !self.by_name.contains_key(&decl.name),
            "Parameter {}.{} is already declared",
            self.owner_name,
            decl.name
        );
        let name = decl.name.clone();
        let mut par = Par::new(decl, self.owner, &self.owner_name)?;
        par.set_observer(self.observer.clone());
        let index = self.pars.len();
        self.pars.push(par);
        self.by_name.insert(name, index);
        Ok(&mut self.pars[index])
    }

    /// Returns the number of parameters.
    pub fn len(&self) -> usize {
        self.pars.len()
    }

    /// Returns true if no parameters are declared.
    pub fn is_empty(&self) -> bool {
        self.pars.is_empty()
    }

    /// Iterates over parameters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Par> {
        self.pars.iter()
    }

    fn position(&self, name: &str) -> Result<usize, ParError> {
        self.by_name.get(name).copied().ok_or_else(|| {
            ParError::from(ParErrorKind::UnknownParameter(name.to_owned()))
                .in_par(&format!("{}.{}", self.owner_name, name))
        })
    }

    /// Returns a parameter.
    pub fn par(&self, name: &str) -> Result<&Par, ParError> {
        Ok(&self.pars[self.position(name)?])
    }

    /// Returns a parameter for modification.
    pub fn par_mut(&mut self, name: &str) -> Result<&mut Par, ParError> {
        let index = self.position(name)?;
        Ok(&mut self.pars[index])
    }

    /// Installs the change observer on declared parameters and on parameters declared later.
    pub fn set_observer(&mut self, observer: Rc<dyn ParObserver>) {
        for par in &mut self.pars {
            par.set_observer(Some(observer.clone()));
        }
        self.observer = Some(observer);
    }

    fn context_for<'a>(&'a self, par: &Par) -> Option<&'a dyn EvalContext> {
        if par.eval_context().is_some() {
            None
        } else {
            Some(self as &dyn EvalContext)
        }
    }

    /// Returns the value of a parameter.
    pub fn value(&self, name: &str) -> Result<Value, ParError> {
        let par = self.par(name)?;
        par.value(self.context_for(par))
    }

    /// Returns the value of a `Bool` parameter.
    pub fn bool(&self, name: &str) -> Result<bool, ParError> {
        let par = self.par(name)?;
        par.bool_value(self.context_for(par))
    }

    /// Returns the value of a numeric parameter as integer.
    pub fn long(&self, name: &str) -> Result<i64, ParError> {
        let par = self.par(name)?;
        par.long_value(self.context_for(par))
    }

    /// Returns the value of a numeric parameter as float.
    pub fn double(&self, name: &str) -> Result<f64, ParError> {
        let par = self.par(name)?;
        par.double_value(self.context_for(par))
    }

    /// Returns the value of a `String` parameter.
    pub fn string(&self, name: &str) -> Result<String, ParError> {
        let par = self.par(name)?;
        par.string_value(self.context_for(par))
    }

    /// Borrows the value of a non-volatile `String` parameter.
    pub fn str(&self, name: &str) -> Result<&str, ParError> {
        self.par(name)?.str_value()
    }

    /// Returns the value of an `Xml` parameter.
    pub fn xml(&self, name: &str) -> Result<Rc<XmlElement>, ParError> {
        let par = self.par(name)?;
        par.xml_value(self.context_for(par))
    }

    /// Assigns a value to a parameter.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), ParError> {
        self.par_mut(name)?.set_value(value)
    }

    /// Parses expression text and assigns it to a parameter.
    ///
    /// After finalization the expression is evaluated in this set unless the parameter is volatile.
    pub fn parse(&mut self, name: &str, text: &str) -> Result<(), ParError> {
        let index = self.position(name)?;
        self.update(index, |par, ctx| par.parse_in(text, ctx))
    }

    /// Runs `f` on a copy of the parameter with this set as context, then stores the copy.
    fn update<F>(&mut self, index: usize, f: F) -> Result<(), ParError>
    where
        F: FnOnce(&mut Par, Option<&dyn EvalContext>) -> Result<(), ParError>,
    {
        let mut par = self.pars[index].clone();
        self.resolving.borrow_mut().push(par.name().to_owned());
        let result = {
            let ctx = self.context_for(&par);
            f(&mut par, ctx)
        };
        self.resolving.borrow_mut().pop();
        self.pars[index] = par;
        result
    }

    /// Assigns configured values to parameters that have not been set.
    pub fn apply_config(&mut self, assignments: &ParAssignments) -> Result<(), ParError> {
        self.apply_config_with(assignments, &mut CellPool::new())
    }

    /// Assigns configured values to parameters that have not been set, sharing value cells through the pool.
    ///
    /// The value `default` accepts the declared default, `ask` is not supported.
    pub fn apply_config_with(&mut self, assignments: &ParAssignments, pool: &mut CellPool) -> Result<(), ParError> {
        for index in 0..self.pars.len() {
            let par = &mut self.pars[index];
            if par.is_set() {
                continue;
            }
            let full_name = par.full_name();
            match assignments.lookup(&full_name) {
                None => {}
                Some(AssignedValue::Default) => par.accept_default()?,
                Some(AssignedValue::Ask) => {
                    return Err(ParError::from(ParErrorKind::AskNotSupported).in_par(&full_name));
                }
                Some(AssignedValue::Expr(text)) => {
                    let cell = pool
                        .intern(par.decl(), text)
                        .map_err(|e| e.in_par(&full_name))?;
                    par.set_cell(cell)?;
                }
            }
        }
        Ok(())
    }

    /// Finalizes all parameters in declaration order.
    ///
    /// Non-volatile expressions are evaluated in this set. Fails on the first parameter that has neither a value
    /// nor a default.
    pub fn finalize(&mut self) -> Result<(), ParError> {
        for index in 0..self.pars.len() {
            self.update(index, |par, ctx| par.finalize(ctx))?;
        }
        Ok(())
    }

    /// Applies configuration and finalizes all parameters.
    pub fn initialize(&mut self, assignments: &ParAssignments) -> Result<(), ParError> {
        self.apply_config(assignments)?;
        self.finalize()
    }
}

impl EvalContext for ParamSet {
    fn resolve(&self, name: &str) -> Result<Value, EvalError> {
        let par = match self.by_name.get(name) {
            Some(&index) => &self.pars[index],
            None => return Err(EvalError::UnresolvedName(name.to_owned())),
        };

        if self.resolving.borrow().iter().any(|n| n == name) {
            return Err(EvalError::Recursion(par.full_name()));
        }
        self.resolving.borrow_mut().push(name.to_owned());
        let result = par.value(self.context_for(par));
        self.resolving.borrow_mut().pop();

        result.map_err(|err| match err.kind {
            ParErrorKind::Eval(inner) => inner,
            other => EvalError::Parameter {
                name: par.full_name(),
                message: other.to_string(),
            },
        })
    }

    fn index(&self) -> Result<i64, EvalError> {
        self.index
            .ok_or_else(|| EvalError::UnresolvedName("index".to_owned()))
    }

    fn size_of(&self, name: &str) -> Result<i64, EvalError> {
        self.vector_sizes
            .get(name)
            .copied()
            .ok_or_else(|| EvalError::UnresolvedName(format!("sizeof({})", name)))
    }

    fn random(&self) -> Result<f64, EvalError> {
        self.random
            .as_ref()
            .map(RandomSource::next_f64)
            .ok_or(EvalError::NoRandomSource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::par::ParType;

    fn server() -> ParamSet {
        let mut set = ParamSet::new(1, "server");
        set.declare(ParDecl::new("rate", ParType::Double).default_value("2.0"))
            .unwrap();
        set.declare(ParDecl::new("delay", ParType::Double)).unwrap();
        set.declare(ParDecl::new("name", ParType::String).default_value("\"srv\""))
            .unwrap();
        set
    }

    #[test]
    fn sibling_references_resolve() {
        let mut set = server();
        set.parse("delay", "1 / rate + index").unwrap();
        set.set_index(2);
        set.finalize().unwrap();
        assert_eq!(set.double("delay").unwrap(), 2.5);
        assert!(!set.par("delay").unwrap().is_expression());
        assert_eq!(set.str("name").unwrap(), "srv");
    }

    #[test]
    fn recursive_references_fail() {
        let mut set = ParamSet::new(0, "node");
        set.declare(ParDecl::new("a", ParType::Long)).unwrap();
        set.declare(ParDecl::new("b", ParType::Long)).unwrap();
        set.parse("a", "b + 1").unwrap();
        set.parse("b", "a + 1").unwrap();
        let err = set.finalize().unwrap_err();
        assert_eq!(err.kind, ParErrorKind::Eval(EvalError::Recursion("node.a".into())));
        assert!(set.resolving.borrow().is_empty());
    }

    #[test]
    fn unknown_parameter() {
        let set = server();
        assert_eq!(
            set.double("speed").unwrap_err().kind,
            ParErrorKind::UnknownParameter("speed".into())
        );
    }

    #[test]
    fn config_assignments() {
        let mut assignments = ParAssignments::new();
        assignments.push("server.delay", "rate * 3").unwrap();
        assignments.push("server.rate", "default").unwrap();
        assignments.push("server.*", "ask").unwrap();

        let mut set = server();
        set.initialize(&assignments).unwrap_err();

        let mut set = server();
        set.set("name", "main").unwrap();
        set.initialize(&assignments).unwrap();
        assert_eq!(set.double("delay").unwrap(), 6.0);
        assert_eq!(set.string("name").unwrap(), "main");
    }

    #[test]
    fn ask_is_reported_with_parameter_name() {
        let mut assignments = ParAssignments::new();
        assignments.push("**", "ask").unwrap();
        let mut set = server();
        let err = set.apply_config(&assignments).unwrap_err();
        assert_eq!(err.kind, ParErrorKind::AskNotSupported);
        assert_eq!(err.par.as_deref(), Some("server.rate"));
    }

    #[test]
    fn parse_after_finalize_uses_set_as_context() {
        let mut set = server();
        set.set("delay", 1.0).unwrap();
        set.finalize().unwrap();
        set.parse("delay", "rate / 4").unwrap();
        assert_eq!(set.double("delay").unwrap(), 0.5);
        assert!(!set.par("delay").unwrap().is_expression());
    }
}
