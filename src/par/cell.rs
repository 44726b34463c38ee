use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;

use super::error::{ParError, ParErrorKind};
use super::value::{ParType, Value, XmlElement};
use crate::expr::{functions, non_finite_text, quote_string, EvalContext, Expression};

bitflags! {
    /// State flags of a value cell.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct CellFlags: u8 {
        /// Value was assigned explicitly rather than taken from the declared default.
        const IS_SET =         0b0000_0001;
        /// Cell holds a value or an expression.
        const CONTAINS_VALUE = 0b0000_0010;
        /// Cell holds an expression rather than a literal.
        const IS_EXPRESSION =  0b0000_0100;
        /// Expression is re-evaluated on every read.
        const IS_VOLATILE =    0b0000_1000;
        /// Cell is referenced by more than one parameter. Reported by [`Par::flags`](super::Par::flags) only.
        const IS_SHARED =      0b0001_0000;
    }
}

#[derive(Debug, Clone)]
enum Content {
    Empty,
    Literal(Value),
    Expression(Box<Expression>),
}

/// Typed container for a parameter value, shareable between parameters through [`Rc`].
///
/// The type of a cell is fixed at creation. Cells are never mutated while shared: parameters call
/// [`Rc::make_mut`] before writing, which clones a shared cell first.
#[derive(Debug, Clone)]
pub struct ValueCell {
    kind: ParType,
    unit: Option<String>,
    flags: CellFlags,
    content: Content,
}

impl ValueCell {
    /// Creates an empty cell.
    pub fn new(kind: ParType) -> Self {
        Self {
            kind,
            unit: None,
            flags: CellFlags::empty(),
            content: Content::Empty,
        }
    }

    /// Creates a cell holding a literal. The type of the cell is the type of the value.
    pub fn literal(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            kind: value.kind(),
            unit: None,
            flags: CellFlags::IS_SET | CellFlags::CONTAINS_VALUE,
            content: Content::Literal(value),
        }
    }

    /// Creates a cell holding an expression.
    pub fn expression(kind: ParType, expr: Expression) -> Self {
        let mut cell = Self::new(kind);
        cell.set_expression(expr);
        cell
    }

    /// Sets the measurement unit of a numeric cell.
    pub fn with_unit(mut self, unit: Option<&str>) -> Self {
        self.unit = unit.map(str::to_owned);
        self
    }

    /// Marks the cell volatile.
    pub fn volatile(mut self, is_volatile: bool) -> Self {
        self.flags.set(CellFlags::IS_VOLATILE, is_volatile);
        self
    }

    /// Returns the type of the cell.
    pub fn kind(&self) -> ParType {
        self.kind
    }

    /// Returns the measurement unit.
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    /// Returns the state flags.
    pub fn flags(&self) -> CellFlags {
        self.flags
    }

    /// Returns true if the value was assigned explicitly.
    pub fn is_set(&self) -> bool {
        self.flags.contains(CellFlags::IS_SET)
    }

    /// Returns true if the cell holds a value or an expression.
    pub fn contains_value(&self) -> bool {
        self.flags.contains(CellFlags::CONTAINS_VALUE)
    }

    /// Returns true if the cell holds an expression.
    pub fn is_expression(&self) -> bool {
        self.flags.contains(CellFlags::IS_EXPRESSION)
    }

    /// Returns true if the cell is volatile.
    pub fn is_volatile(&self) -> bool {
        self.flags.contains(CellFlags::IS_VOLATILE)
    }

    /// Returns the expression, if the cell holds one.
    pub fn expr(&self) -> Option<&Expression> {
        match &self.content {
            Content::Expression(expr) => Some(expr),
            _ => None,
        }
    }

    /// Stores a literal value.
    ///
    /// Values of the other numeric type are converted, a `Double` stored into a `Long` cell is truncated
    /// toward zero. Any other type mismatch fails with [`ParErrorKind::BadCast`] and leaves the cell unchanged.
    pub fn set_value(&mut self, value: impl Into<Value>) -> Result<(), ParError> {
        let value = value.into();
        let value = match (self.kind, value) {
            (ParType::Long, Value::Double(x)) => Value::Long(to_long(x)?),
            (ParType::Double, Value::Long(i)) => Value::Double(i as f64),
            (kind, value) if value.kind() == kind => value,
            (kind, value) => {
                return Err(ParErrorKind::BadCast {
                    from: value.kind(),
                    to: kind,
                }
                .into())
            }
        };
        self.content = Content::Literal(value);
        self.flags.remove(CellFlags::IS_EXPRESSION);
        self.flags.insert(CellFlags::IS_SET | CellFlags::CONTAINS_VALUE);
        Ok(())
    }

    /// Attaches an expression, replacing the previous content.
    pub fn set_expression(&mut self, expr: Expression) {
        self.content = Content::Expression(Box::new(expr));
        self.flags
            .insert(CellFlags::IS_EXPRESSION | CellFlags::IS_SET | CellFlags::CONTAINS_VALUE);
    }

    /// Evaluates an expression and stores its result as a literal.
    pub(crate) fn set_evaluated(&mut self, expr: &Expression, ctx: Option<&dyn EvalContext>) -> Result<(), ParError> {
        let value = coerce(expr.evaluate(ctx)?, self.kind)?;
        self.set_value(value)
    }

    pub(crate) fn mark_set(&mut self, is_set: bool) {
        self.flags.set(CellFlags::IS_SET, is_set);
    }

    /// Parses expression text and stores it.
    ///
    /// Constant expressions are folded into a literal immediately. The special values `default` and `ask` are
    /// rejected. On failure the cell is left unchanged.
    pub fn parse(&mut self, text: &str) -> Result<(), ParError> {
        let expr = Expression::parse(text)?;
        if expr.is_constant() {
            self.set_evaluated(&expr, None)
        } else {
            self.set_expression(expr);
            Ok(())
        }
    }

    /// Returns the current value, evaluating the expression if there is one.
    pub fn evaluate(&self, ctx: Option<&dyn EvalContext>) -> Result<Value, ParError> {
        match &self.content {
            Content::Empty => Err(ParErrorKind::NotSet.into()),
            Content::Literal(value) => Ok(value.clone()),
            Content::Expression(expr) => coerce(expr.evaluate(ctx)?, self.kind),
        }
    }

    /// Replaces the expression with the result of its evaluation. No-op for literals.
    pub fn convert_to_const(&mut self, ctx: Option<&dyn EvalContext>) -> Result<(), ParError> {
        let value = match &self.content {
            Content::Expression(expr) => coerce(expr.evaluate(ctx)?, self.kind)?,
            _ => return Ok(()),
        };
        self.content = Content::Literal(value);
        self.flags.remove(CellFlags::IS_EXPRESSION);
        Ok(())
    }

    fn expect_kind(&self, requested: ParType) -> Result<(), ParError> {
        let compatible = self.kind == requested || (self.kind.is_numeric() && requested.is_numeric());
        if compatible {
            Ok(())
        } else {
            Err(ParErrorKind::BadCast {
                from: self.kind,
                to: requested,
            }
            .into())
        }
    }

    /// Returns the value of a `Bool` cell.
    pub fn bool_value(&self, ctx: Option<&dyn EvalContext>) -> Result<bool, ParError> {
        self.expect_kind(ParType::Bool)?;
        match self.evaluate(ctx)? {
            Value::Bool(b) => Ok(b),
            other => Err(type_cast(&other, ParType::Bool)),
        }
    }

    /// Returns the value of a numeric cell as integer. `Double` values are truncated toward zero.
    pub fn long_value(&self, ctx: Option<&dyn EvalContext>) -> Result<i64, ParError> {
        self.expect_kind(ParType::Long)?;
        match self.evaluate(ctx)? {
            Value::Long(i) => Ok(i),
            Value::Double(x) => to_long(x),
            other => Err(type_cast(&other, ParType::Long)),
        }
    }

    /// Returns the value of a numeric cell as float.
    pub fn double_value(&self, ctx: Option<&dyn EvalContext>) -> Result<f64, ParError> {
        self.expect_kind(ParType::Double)?;
        let value = self.evaluate(ctx)?;
        value.as_f64().ok_or_else(|| type_cast(&value, ParType::Double))
    }

    /// Borrows the value of a `String` cell holding a literal.
    ///
    /// Fails with [`ParErrorKind::VolatileAccess`] if the cell holds an expression, use
    /// [`string_value`](Self::string_value) instead.
    pub fn str_value(&self) -> Result<&str, ParError> {
        self.expect_kind(ParType::String)?;
        match &self.content {
            Content::Empty => Err(ParErrorKind::NotSet.into()),
            Content::Literal(Value::String(s)) => Ok(s),
            Content::Literal(other) => Err(type_cast(other, ParType::String)),
            Content::Expression(_) => Err(ParErrorKind::VolatileAccess.into()),
        }
    }

    /// Returns the value of a `String` cell, evaluating the expression if there is one.
    pub fn string_value(&self, ctx: Option<&dyn EvalContext>) -> Result<String, ParError> {
        self.expect_kind(ParType::String)?;
        match self.evaluate(ctx)? {
            Value::String(s) => Ok(s),
            other => Err(type_cast(&other, ParType::String)),
        }
    }

    /// Returns the value of an `Xml` cell.
    pub fn xml_value(&self, ctx: Option<&dyn EvalContext>) -> Result<Rc<XmlElement>, ParError> {
        self.expect_kind(ParType::Xml)?;
        match self.evaluate(ctx)? {
            Value::Xml(e) => Ok(e),
            other => Err(type_cast(&other, ParType::Xml)),
        }
    }

    /// Orders cells by type, flags, unit and content. Expressions compare by canonical text.
    ///
    /// Cells comparing equal are interchangeable.
    pub fn compare(&self, other: &ValueCell) -> Ordering {
        self.kind
            .cmp(&other.kind)
            .then_with(|| self.flags.cmp(&other.flags))
            .then_with(|| self.unit.cmp(&other.unit))
            .then_with(|| match (&self.content, &other.content) {
                (Content::Empty, Content::Empty) => Ordering::Equal,
                (Content::Literal(a), Content::Literal(b)) => compare_values(a, b),
                (Content::Expression(a), Content::Expression(b)) => a.compare(b),
                (a, b) => content_rank(a).cmp(&content_rank(b)),
            })
    }
}

fn content_rank(content: &Content) -> u8 {
    match content {
        Content::Empty => 0,
        Content::Literal(_) => 1,
        Content::Expression(_) => 2,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Long(x), Value::Long(y)) => x.cmp(y),
        (Value::Double(x), Value::Double(y)) => x.total_cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Xml(x), Value::Xml(y)) => x.to_string().cmp(&y.to_string()),
        (x, y) => x.kind().cmp(&y.kind()),
    }
}

fn to_long(x: f64) -> Result<i64, ParError> {
    Ok(functions::truncate("long", x)?)
}

fn type_cast(value: &Value, to: ParType) -> ParError {
    ParErrorKind::TypeCast {
        from: value.kind(),
        to,
    }
    .into()
}

/// Converts an evaluated value to the cell type. Only numeric values convert.
fn coerce(value: Value, kind: ParType) -> Result<Value, ParError> {
    match (kind, value) {
        (kind, value) if value.kind() == kind => Ok(value),
        (ParType::Long, Value::Double(x)) => Ok(Value::Long(to_long(x)?)),
        (ParType::Double, Value::Long(i)) => Ok(Value::Double(i as f64)),
        (kind, value) => Err(type_cast(&value, kind)),
    }
}

impl PartialEq for ValueCell {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl fmt::Display for ValueCell {
    /// Writes the value in text form: quoted strings, expressions as canonical text.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.content {
            Content::Empty => Ok(()),
            Content::Literal(Value::String(s)) => write!(f, "{}", quote_string(s)),
            Content::Literal(Value::Double(x)) => match non_finite_text(*x) {
                Some(text) => write!(f, "{}", text),
                None => write!(f, "{}", x),
            },
            Content::Literal(value) => write!(f, "{}", value),
            Content::Expression(expr) => write!(f, "{}", expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::expr::EvalError;

    #[test]
    fn literal_cell_flags() {
        let cell = ValueCell::literal(42);
        assert_eq!(cell.kind(), ParType::Long);
        assert_eq!(cell.flags(), CellFlags::IS_SET | CellFlags::CONTAINS_VALUE);
        assert!(ValueCell::new(ParType::Bool).flags().is_empty());
    }

    #[test]
    fn numeric_cross_reads() {
        let cell = ValueCell::literal(42);
        assert_eq!(cell.double_value(None).unwrap(), 42.0);
        let err = cell.string_value(None).unwrap_err();
        assert_eq!(
            err.kind,
            ParErrorKind::BadCast {
                from: ParType::Long,
                to: ParType::String
            }
        );
        assert!(cell.str_value().is_err());

        let cell = ValueCell::literal(-2.7);
        assert_eq!(cell.long_value(None).unwrap(), -2);
        assert!(ValueCell::literal(1e300).long_value(None).is_err());
    }

    #[test]
    fn read_before_set_fails() {
        let cell = ValueCell::new(ParType::Double);
        assert_eq!(cell.double_value(None).unwrap_err().kind, ParErrorKind::NotSet);
    }

    #[test]
    fn parse_folds_constants() {
        let mut cell = ValueCell::new(ParType::Long);
        cell.parse("2*3").unwrap();
        assert!(!cell.is_expression());
        assert_eq!(cell.long_value(None).unwrap(), 6);

        cell.parse("n + 1").unwrap();
        assert!(cell.is_expression());
        assert_eq!(cell.to_string(), "n + 1");
    }

    #[test]
    fn failed_parse_leaves_cell_unchanged() {
        let mut cell = ValueCell::literal(7);
        assert!(matches!(cell.parse("1 +").unwrap_err().kind, ParErrorKind::Syntax(_)));
        assert!(matches!(cell.parse("1/0").unwrap_err().kind, ParErrorKind::Eval(_)));
        assert!(matches!(cell.parse("\"x\"").unwrap_err().kind, ParErrorKind::TypeCast { .. }));
        assert_eq!(cell.long_value(None).unwrap(), 7);
    }

    #[test]
    fn convert_to_const_replaces_expression() {
        let mut cell = ValueCell::expression(ParType::Long, Expression::parse("2*3").unwrap());
        assert!(cell.is_expression());
        cell.convert_to_const(None).unwrap();
        assert!(!cell.is_expression());
        assert_eq!(cell.evaluate(None).unwrap(), Value::Long(6));
    }

    #[test]
    fn string_expression_needs_evaluating_accessor() {
        let cell = ValueCell::expression(ParType::String, Expression::parse("prefix + \"-x\"").unwrap());
        assert_eq!(cell.str_value().unwrap_err().kind, ParErrorKind::VolatileAccess);

        let empty: HashMap<String, Value> = HashMap::new();
        let err = cell.string_value(Some(&empty as &dyn EvalContext)).unwrap_err();
        assert_eq!(
            err.kind,
            ParErrorKind::Eval(EvalError::UnresolvedName("prefix".into()))
        );

        let mut vars = HashMap::new();
        vars.insert("prefix".to_owned(), Value::from("node"));
        assert_eq!(cell.string_value(Some(&vars as &dyn EvalContext)).unwrap(), "node-x");
    }

    #[test]
    fn evaluated_type_mismatch() {
        let cell = ValueCell::expression(ParType::Bool, Expression::parse("1 + x").unwrap());
        let mut vars = HashMap::new();
        vars.insert("x".to_owned(), Value::Long(1));
        assert_eq!(
            cell.bool_value(Some(&vars as &dyn EvalContext)).unwrap_err().kind,
            ParErrorKind::TypeCast {
                from: ParType::Long,
                to: ParType::Bool
            }
        );
    }

    #[test]
    fn setter_converts_numbers_only() {
        let mut cell = ValueCell::new(ParType::Double);
        cell.set_value(3).unwrap();
        assert_eq!(cell.evaluate(None).unwrap(), Value::Double(3.0));
        assert!(matches!(
            cell.set_value(true).unwrap_err().kind,
            ParErrorKind::BadCast { .. }
        ));
    }

    #[test]
    fn compare_identifies_equivalent_cells() {
        let a = ValueCell::expression(ParType::Double, Expression::parse("x*2").unwrap());
        let b = ValueCell::expression(ParType::Double, Expression::parse("(x) * 2").unwrap());
        let c = ValueCell::expression(ParType::Long, Expression::parse("x*2").unwrap());
        assert_eq!(a.compare(&b), Ordering::Equal);
        assert_ne!(a.compare(&c), Ordering::Equal);
        assert_ne!(ValueCell::literal(1).compare(&ValueCell::literal(2)), Ordering::Equal);
        assert_eq!(ValueCell::literal("a").to_string(), "\"a\"");
    }

    #[test]
    fn non_finite_values_print_parseably() {
        for x in [f64::INFINITY, f64::NEG_INFINITY] {
            let text = ValueCell::literal(x).to_string();
            let mut cell = ValueCell::new(ParType::Double);
            cell.parse(&text).unwrap();
            assert_eq!(cell.double_value(None).unwrap(), x);
        }
        let text = ValueCell::literal(f64::NAN).to_string();
        assert_eq!(text, "double(\"NaN\")");
        let mut cell = ValueCell::new(ParType::Double);
        cell.parse(&text).unwrap();
        assert!(cell.double_value(None).unwrap().is_nan());
    }
}
