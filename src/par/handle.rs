use std::fmt;
use std::rc::Rc;

use super::cell::{CellFlags, ValueCell};
use super::error::{ParError, ParErrorKind};
use super::value::{ParType, Value, XmlElement};
use crate::component::Id;
use crate::expr::{EvalContext, Expression};

/// Parameter declaration supplied by the owner's interface: name, type and flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParDecl {
    /// Parameter name, unique within the owner.
    pub name: String,
    /// Parameter type.
    pub kind: ParType,
    /// Measurement unit of numeric parameters.
    pub unit: Option<String>,
    /// Value cannot change after finalization.
    pub is_const: bool,
    /// Expression is kept and re-evaluated on every read.
    pub is_volatile: bool,
    /// Default value as expression text.
    pub default: Option<String>,
}

impl ParDecl {
    /// Creates declaration without default value.
    pub fn new(name: &str, kind: ParType) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            unit: None,
            is_const: false,
            is_volatile: false,
            default: None,
        }
    }

    /// Sets the measurement unit.
    pub fn unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_owned());
        self
    }

    /// Marks the parameter const.
    pub fn constant(mut self) -> Self {
        self.is_const = true;
        self
    }

    /// Marks the parameter volatile.
    pub fn volatile(mut self) -> Self {
        self.is_volatile = true;
        self
    }

    /// Sets the default value.
    pub fn default_value(mut self, text: &str) -> Self {
        self.default = Some(text.to_owned());
        self
    }
}

/// Lifecycle state of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParState {
    /// No value assigned yet. A declared default may be present.
    Uninitialized,
    /// Value assigned, owner not initialized yet.
    Set,
    /// Owner initialized, the parameter is guaranteed to contain a value.
    Finalized,
}

/// Receives notifications around every successful parameter change.
///
/// If a change fails, [`before_change`](ParObserver::before_change) has been called but
/// [`after_change`](ParObserver::after_change) is not.
pub trait ParObserver {
    /// Called before the value changes.
    fn before_change(&self, _par: &Par) {}
    /// Called after the value changed.
    fn after_change(&self, _par: &Par) {}
}

/// Parameter handle bound to its owner entity.
///
/// The value lives in a [`ValueCell`] which may be shared with handles of other entities. Writes never affect
/// other handles: a shared cell is cloned before it is modified.
#[derive(Clone)]
pub struct Par {
    decl: Rc<ParDecl>,
    owner: Id,
    owner_name: Rc<str>,
    cell: Rc<ValueCell>,
    eval_context: Option<Rc<dyn EvalContext>>,
    finalized: bool,
    observer: Option<Rc<dyn ParObserver>>,
}

impl Par {
    /// Creates parameter. The declared default, if any, is parsed but not yet accepted as the value.
    pub fn new(decl: ParDecl, owner: Id, owner_name: &str) -> Result<Self, ParError> {
        let full_name = format!("{}.{}", owner_name, decl.name);
        let mut cell = ValueCell::new(decl.kind)
            .with_unit(decl.unit.as_deref())
            .volatile(decl.is_volatile);
        if let Some(default) = &decl.default {
            cell.parse(default).map_err(|e| e.in_par(&full_name))?;
            cell.mark_set(false);
        }
        Ok(Self {
            decl: Rc::new(decl),
            owner,
            owner_name: owner_name.into(),
            cell: Rc::new(cell),
            eval_context: None,
            finalized: false,
            observer: None,
        })
    }

    /// Returns the parameter name.
    pub fn name(&self) -> &str {
        &self.decl.name
    }

    /// Returns `<owner>.<name>`.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.owner_name, self.decl.name)
    }

    /// Returns the declaration.
    pub fn decl(&self) -> &ParDecl {
        &self.decl
    }

    /// Returns the owner entity id.
    pub fn owner(&self) -> Id {
        self.owner
    }

    /// Returns the owner entity name.
    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }

    /// Returns the parameter type, which never changes.
    pub fn kind(&self) -> ParType {
        self.decl.kind
    }

    /// Returns the parameter type name.
    pub fn type_name(&self) -> &'static str {
        self.decl.kind.name()
    }

    /// Returns the measurement unit.
    pub fn unit(&self) -> Option<&str> {
        self.cell.unit()
    }

    /// Returns the value cell.
    pub fn cell(&self) -> &Rc<ValueCell> {
        &self.cell
    }

    /// Returns the cell flags plus [`CellFlags::IS_SHARED`] if the cell is shared.
    pub fn flags(&self) -> CellFlags {
        let mut flags = self.cell.flags();
        flags.set(CellFlags::IS_SHARED, self.is_shared());
        flags
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> ParState {
        if self.finalized {
            ParState::Finalized
        } else if self.cell.is_set() {
            ParState::Set
        } else {
            ParState::Uninitialized
        }
    }

    /// Returns true for `Long` and `Double` parameters.
    pub fn is_numeric(&self) -> bool {
        self.decl.kind.is_numeric()
    }

    /// Returns true if the parameter is declared volatile.
    pub fn is_volatile(&self) -> bool {
        self.decl.is_volatile
    }

    /// Returns true if the parameter is declared const.
    pub fn is_const(&self) -> bool {
        self.decl.is_const
    }

    /// Returns true if the value is an expression.
    pub fn is_expression(&self) -> bool {
        self.cell.is_expression()
    }

    /// Returns true if the value cell is referenced by other parameters.
    pub fn is_shared(&self) -> bool {
        Rc::strong_count(&self.cell) > 1
    }

    /// Returns true if a value was assigned.
    pub fn is_set(&self) -> bool {
        self.cell.is_set()
    }

    /// Returns true if a value was assigned or a default is present.
    pub fn contains_value(&self) -> bool {
        self.cell.contains_value()
    }

    /// Returns true if the parameter was finalized.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Returns the expression, if the value is one.
    pub fn expr(&self) -> Option<&Expression> {
        self.cell.expr()
    }

    /// Returns the context bound for evaluating expressions.
    pub fn eval_context(&self) -> Option<&Rc<dyn EvalContext>> {
        self.eval_context.as_ref()
    }

    /// Binds the context used for evaluating expressions.
    pub fn set_eval_context(&mut self, ctx: Option<Rc<dyn EvalContext>>) {
        self.eval_context = ctx;
    }

    /// Installs the change observer.
    pub fn set_observer(&mut self, observer: Option<Rc<dyn ParObserver>>) {
        self.observer = observer;
    }

    /// Returns the value in text form: quoted strings, expressions as canonical text, no unit.
    pub fn str(&self) -> String {
        self.cell.to_string()
    }

    fn check_writable(&self) -> Result<(), ParError> {
        if self.decl.is_const && self.finalized {
            Err(ParError::from(ParErrorKind::Immutable).in_par(&self.full_name()))
        } else {
            Ok(())
        }
    }

    /// Applies `f` to a private copy of the cell, bracketed by observer notifications.
    fn change<F>(&mut self, f: F) -> Result<(), ParError>
    where
        F: FnOnce(&mut ValueCell) -> Result<(), ParError>,
    {
        let observer = self.observer.clone();
        if let Some(observer) = &observer {
            observer.before_change(self);
        }
        f(Rc::make_mut(&mut self.cell)).map_err(|e| e.in_par(&self.full_name()))?;
        if let Some(observer) = &observer {
            observer.after_change(self);
        }
        Ok(())
    }

    fn write<F>(&mut self, f: F) -> Result<(), ParError>
    where
        F: FnOnce(&mut ValueCell) -> Result<(), ParError>,
    {
        self.check_writable()?;
        self.change(f)
    }

    /// Assigns a value. Numeric values convert between `Long` and `Double`, other type mismatches fail with
    /// [`ParErrorKind::BadCast`].
    pub fn set_value(&mut self, value: impl Into<Value>) -> Result<(), ParError> {
        let value = value.into();
        self.write(|cell| cell.set_value(value))
    }

    /// Assigns a bool value.
    pub fn set_bool(&mut self, b: bool) -> Result<(), ParError> {
        self.set_value(b)
    }

    /// Assigns an integer value.
    pub fn set_long(&mut self, i: i64) -> Result<(), ParError> {
        self.set_value(i)
    }

    /// Assigns a float value.
    pub fn set_double(&mut self, x: f64) -> Result<(), ParError> {
        self.set_value(x)
    }

    /// Assigns a string value.
    pub fn set_string(&mut self, s: &str) -> Result<(), ParError> {
        self.set_value(s)
    }

    /// Assigns an XML value.
    pub fn set_xml(&mut self, e: XmlElement) -> Result<(), ParError> {
        self.set_value(e)
    }

    /// Assigns an expression, optionally binding the context it is evaluated in.
    ///
    /// After finalization a non-volatile parameter stores the result of the expression instead. The context is
    /// bound only if the assignment succeeds.
    pub fn set_expression(&mut self, expr: Expression, ctx: Option<Rc<dyn EvalContext>>) -> Result<(), ParError> {
        self.check_writable()?;
        let ctx = ctx.or_else(|| self.eval_context.clone());
        if self.finalized && !self.decl.is_volatile {
            self.change(|cell| cell.set_evaluated(&expr, ctx.as_deref()))?;
        } else {
            self.change(|cell| {
                cell.set_expression(expr);
                Ok(())
            })?;
        }
        self.eval_context = ctx;
        Ok(())
    }

    /// Parses expression text and assigns it. Constant expressions are stored as their value.
    ///
    /// The special values `default` and `ask` are not handled here.
    pub fn parse(&mut self, text: &str) -> Result<(), ParError> {
        self.parse_in(text, None)
    }

    /// Parses expression text and assigns it. After finalization a non-volatile parameter stores the result of
    /// the expression evaluated in `ctx` or the bound context.
    pub fn parse_in(&mut self, text: &str, ctx: Option<&dyn EvalContext>) -> Result<(), ParError> {
        if self.finalized && !self.decl.is_volatile {
            self.check_writable()?;
            let expr = Expression::parse(text).map_err(|e| ParError::from(e).in_par(&self.full_name()))?;
            let bound = self.eval_context.clone();
            let ctx = ctx.or(bound.as_deref());
            return self.change(|cell| cell.set_evaluated(&expr, ctx));
        }
        self.write(|cell| cell.parse(text))
    }

    /// Replaces the value cell with a shared one of the same type.
    ///
    /// After finalization the cell must contain a value, and an expression cell given to a non-volatile
    /// parameter is replaced by a private copy holding the result evaluated in the bound context.
    pub fn set_cell(&mut self, cell: Rc<ValueCell>) -> Result<(), ParError> {
        let bound = self.eval_context.clone();
        self.install(cell, bound.as_deref())
    }

    fn install(&mut self, mut cell: Rc<ValueCell>, ctx: Option<&dyn EvalContext>) -> Result<(), ParError> {
        self.check_writable()?;
        if cell.kind() != self.decl.kind {
            return Err(ParError::from(ParErrorKind::BadCast {
                from: cell.kind(),
                to: self.decl.kind,
            })
            .in_par(&self.full_name()));
        }
        if self.finalized {
            if !cell.contains_value() {
                return Err(ParError::from(ParErrorKind::NotSet).in_par(&self.full_name()));
            }
            if !self.decl.is_volatile && cell.is_expression() {
                Rc::make_mut(&mut cell)
                    .convert_to_const(ctx)
                    .map_err(|e| e.in_par(&self.full_name()))?;
            }
            if !cell.is_set() {
                Rc::make_mut(&mut cell).mark_set(true);
            }
        }
        let observer = self.observer.clone();
        if let Some(observer) = &observer {
            observer.before_change(self);
        }
        self.cell = cell;
        if let Some(observer) = &observer {
            observer.after_change(self);
        }
        Ok(())
    }

    /// Takes the value of another parameter of the same type. Both parameters share the cell afterwards, unless
    /// the value had to be evaluated because this parameter is finalized and not volatile.
    pub fn assign(&mut self, other: &Par) -> Result<(), ParError> {
        let ctx = other.eval_context.clone().or_else(|| self.eval_context.clone());
        self.install(other.cell.clone(), ctx.as_deref())?;
        if other.eval_context.is_some() {
            self.eval_context = other.eval_context.clone();
        }
        Ok(())
    }

    /// Accepts the declared default as the assigned value.
    pub fn accept_default(&mut self) -> Result<(), ParError> {
        if self.cell.is_set() {
            return Ok(());
        }
        if !self.cell.contains_value() {
            return Err(ParError::from(ParErrorKind::NotSet).in_par(&self.full_name()));
        }
        self.change(|cell| {
            cell.mark_set(true);
            Ok(())
        })
    }

    /// Replaces an expression value with its result.
    pub fn convert_to_const(&mut self, ctx: Option<&dyn EvalContext>) -> Result<(), ParError> {
        if !self.cell.is_expression() {
            return Ok(());
        }
        let bound = self.eval_context.clone();
        let ctx = ctx.or(bound.as_deref());
        self.change(|cell| cell.convert_to_const(ctx))
    }

    /// Completes initialization: applies the default if no value was assigned and evaluates non-volatile
    /// expressions.
    ///
    /// Fails with [`ParErrorKind::NotSet`] if there is neither a value nor a default.
    pub fn finalize(&mut self, ctx: Option<&dyn EvalContext>) -> Result<(), ParError> {
        if self.finalized {
            return Ok(());
        }
        self.accept_default()?;
        if !self.decl.is_volatile {
            self.convert_to_const(ctx)?;
        }
        self.finalized = true;
        Ok(())
    }

    fn context<'a>(&'a self, ctx: Option<&'a dyn EvalContext>) -> Option<&'a dyn EvalContext> {
        ctx.or(self.eval_context.as_deref())
    }

    fn read<T>(&self, result: Result<T, ParError>) -> Result<T, ParError> {
        result.map_err(|e| e.in_par(&self.full_name()))
    }

    /// Returns the value, evaluating the expression in `ctx` or the bound context.
    pub fn value(&self, ctx: Option<&dyn EvalContext>) -> Result<Value, ParError> {
        self.read(self.cell.evaluate(self.context(ctx)))
    }

    /// Returns the value of a `Bool` parameter.
    pub fn bool_value(&self, ctx: Option<&dyn EvalContext>) -> Result<bool, ParError> {
        self.read(self.cell.bool_value(self.context(ctx)))
    }

    /// Returns the value of a numeric parameter as integer.
    pub fn long_value(&self, ctx: Option<&dyn EvalContext>) -> Result<i64, ParError> {
        self.read(self.cell.long_value(self.context(ctx)))
    }

    /// Returns the value of a numeric parameter as float.
    pub fn double_value(&self, ctx: Option<&dyn EvalContext>) -> Result<f64, ParError> {
        self.read(self.cell.double_value(self.context(ctx)))
    }

    /// Borrows the value of a non-volatile `String` parameter.
    pub fn str_value(&self) -> Result<&str, ParError> {
        self.read(self.cell.str_value())
    }

    /// Returns the value of a `String` parameter.
    pub fn string_value(&self, ctx: Option<&dyn EvalContext>) -> Result<String, ParError> {
        self.read(self.cell.string_value(self.context(ctx)))
    }

    /// Returns the value of an `Xml` parameter.
    pub fn xml_value(&self, ctx: Option<&dyn EvalContext>) -> Result<Rc<XmlElement>, ParError> {
        self.read(self.cell.xml_value(self.context(ctx)))
    }
}

impl fmt::Debug for Par {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Par")
            .field("name", &self.full_name())
            .field("kind", &self.decl.kind)
            .field("value", &self.str())
            .field("flags", &self.flags())
            .field("finalized", &self.finalized)
            .finish()
    }
}

impl fmt::Display for Par {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.full_name(), self.str())?;
        if let Some(unit) = self.unit() {
            write!(f, " {}", unit)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<String>>,
    }

    impl ParObserver for Recorder {
        fn before_change(&self, par: &Par) {
            self.calls.borrow_mut().push(format!("before {}", par.str()));
        }

        fn after_change(&self, par: &Par) {
            self.calls.borrow_mut().push(format!("after {}", par.str()));
        }
    }

    fn long_par(name: &str) -> Par {
        Par::new(ParDecl::new(name, ParType::Long), 0, "node").unwrap()
    }

    #[test]
    fn lifecycle() {
        let mut par = Par::new(ParDecl::new("size", ParType::Long).default_value("4"), 0, "node").unwrap();
        assert_eq!(par.state(), ParState::Uninitialized);
        assert!(par.contains_value());
        assert!(!par.is_set());

        par.set_long(8).unwrap();
        assert_eq!(par.state(), ParState::Set);
        par.finalize(None).unwrap();
        assert_eq!(par.state(), ParState::Finalized);
        assert_eq!(par.long_value(None).unwrap(), 8);
    }

    #[test]
    fn finalize_without_value_fails() {
        let mut par = long_par("size");
        let err = par.finalize(None).unwrap_err();
        assert_eq!(err.kind, ParErrorKind::NotSet);
        assert_eq!(err.par.as_deref(), Some("node.size"));
        assert!(!par.is_finalized());
    }

    #[test]
    fn const_par_is_immutable_after_finalize() {
        let mut par = Par::new(ParDecl::new("n", ParType::Long).constant(), 0, "node").unwrap();
        par.set_long(1).unwrap();
        par.set_long(2).unwrap();
        par.finalize(None).unwrap();
        assert_eq!(par.set_long(3).unwrap_err().kind, ParErrorKind::Immutable);
        assert_eq!(par.long_value(None).unwrap(), 2);
    }

    #[test]
    fn setters_reject_other_types() {
        let mut par = long_par("n");
        let err = par.set_string("x").unwrap_err();
        assert_eq!(
            err.kind,
            ParErrorKind::BadCast {
                from: ParType::String,
                to: ParType::Long
            }
        );
        assert_eq!(par.kind(), ParType::Long);
    }

    #[test]
    fn set_expression_copies_shared_cell() {
        let mut a = long_par("n");
        a.set_long(5).unwrap();
        let mut b = long_par("n");
        b.assign(&a).unwrap();
        assert!(a.is_shared() && b.is_shared());
        assert!(b.flags().contains(CellFlags::IS_SHARED));

        a.set_expression(Expression::parse("10 + 1").unwrap(), None).unwrap();
        assert!(!a.is_shared());
        assert_eq!(a.long_value(None).unwrap(), 11);
        assert_eq!(b.long_value(None).unwrap(), 5);
    }

    #[test]
    fn observer_brackets_successful_changes_only() {
        let recorder = Rc::new(Recorder::default());
        let mut par = long_par("n");
        par.set_observer(Some(recorder.clone()));

        par.set_long(1).unwrap();
        assert!(par.set_string("bad").is_err());
        assert_eq!(
            *recorder.calls.borrow(),
            vec!["before ", "after 1", "before 1"]
        );
    }

    #[test]
    fn volatile_keeps_expression_after_finalize() {
        let counter = Rc::new(RefCell::new(HashMap::new()));
        counter.borrow_mut().insert("base".to_owned(), Value::Long(1));

        let mut par = Par::new(ParDecl::new("v", ParType::Long).volatile(), 0, "node").unwrap();
        par.set_expression(Expression::parse("base * 10").unwrap(), Some(counter.clone()))
            .unwrap();
        par.finalize(None).unwrap();
        assert!(par.is_expression());
        assert_eq!(par.long_value(None).unwrap(), 10);

        counter.borrow_mut().insert("base".to_owned(), Value::Long(2));
        assert_eq!(par.long_value(None).unwrap(), 20);
    }

    #[test]
    fn non_volatile_expression_is_evaluated_at_finalize() {
        let mut vars = HashMap::new();
        vars.insert("base".to_owned(), Value::Long(3));
        let mut par = long_par("n");
        par.parse("base + 1").unwrap();
        assert!(par.is_expression());
        par.finalize(Some(&vars as &dyn EvalContext)).unwrap();
        assert!(!par.is_expression());
        assert_eq!(par.str(), "4");

        par.parse("2 * base").unwrap_err();
        par.set_eval_context(Some(Rc::new(vars)));
        par.parse("2 * base").unwrap();
        assert!(!par.is_expression());
        assert_eq!(par.long_value(None).unwrap(), 6);
    }

    #[test]
    fn finalized_par_rejects_unset_cell_and_evaluates_expressions() {
        let mut par = long_par("n");
        par.set_long(5).unwrap();
        par.finalize(None).unwrap();

        let unset = long_par("n");
        assert_eq!(par.assign(&unset).unwrap_err().kind, ParErrorKind::NotSet);
        assert_eq!(par.set_cell(Rc::new(ValueCell::new(ParType::Long))).unwrap_err().kind, ParErrorKind::NotSet);
        assert_eq!(par.long_value(None).unwrap(), 5);

        let mut vars = HashMap::new();
        vars.insert("base".to_owned(), Value::Long(3));
        let mut source = long_par("n");
        source.set_expression(Expression::parse("base * 2").unwrap(), Some(Rc::new(vars)))
            .unwrap();
        par.assign(&source).unwrap();
        assert!(!par.is_expression());
        assert_eq!(par.long_value(None).unwrap(), 6);
        assert!(source.is_expression());
        assert!(!Rc::ptr_eq(par.cell(), source.cell()));

        let shared = Rc::new(ValueCell::expression(ParType::Long, Expression::parse("base + 1").unwrap()));
        assert!(par.set_cell(shared.clone()).is_err());
        assert_eq!(par.long_value(None).unwrap(), 6);
    }

    #[test]
    fn failed_set_expression_keeps_context_unbound() {
        let mut vars = HashMap::new();
        vars.insert("x".to_owned(), Value::String("text".to_owned()));
        let mut par = long_par("n");
        par.set_long(1).unwrap();
        par.finalize(None).unwrap();

        assert!(par
            .set_expression(Expression::parse("x").unwrap(), Some(Rc::new(vars)))
            .is_err());
        assert!(par.eval_context().is_none());
        assert_eq!(par.long_value(None).unwrap(), 1);
    }
}
