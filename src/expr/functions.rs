//! Built-in expression functions.

use super::context::EvalContext;
use super::error::EvalError;
use super::eval::operand_error;
use crate::par::Value;

type FunctionImpl = fn(&str, &[Value], Option<&dyn EvalContext>) -> Result<Value, EvalError>;

/// Built-in function descriptor.
struct Function {
    name: &'static str,
    min_args: usize,
    max_args: usize,
    /// Result depends on the random number generator of the evaluation context.
    random: bool,
    eval: FunctionImpl,
}

const fn math(name: &'static str, args: usize, eval: FunctionImpl) -> Function {
    Function {
        name,
        min_args: args,
        max_args: args,
        random: false,
        eval,
    }
}

const fn random(name: &'static str, min_args: usize, max_args: usize, eval: FunctionImpl) -> Function {
    Function {
        name,
        min_args,
        max_args,
        random: true,
        eval,
    }
}

static FUNCTIONS: &[Function] = &[
    math("sin", 1, |n, a, _| unary_f64(n, a, f64::sin)),
    math("cos", 1, |n, a, _| unary_f64(n, a, f64::cos)),
    math("tan", 1, |n, a, _| unary_f64(n, a, f64::tan)),
    math("asin", 1, |n, a, _| {
        unit_interval(n, a)?;
        unary_f64(n, a, f64::asin)
    }),
    math("acos", 1, |n, a, _| {
        unit_interval(n, a)?;
        unary_f64(n, a, f64::acos)
    }),
    math("atan", 1, |n, a, _| unary_f64(n, a, f64::atan)),
    math("atan2", 2, |n, a, _| binary_f64(n, a, f64::atan2)),
    math("sqrt", 1, |n, a, _| {
        if number(n, &a[0])? < 0.0 {
            return Err(EvalError::domain(n, "negative argument"));
        }
        unary_f64(n, a, f64::sqrt)
    }),
    math("exp", 1, |n, a, _| unary_f64(n, a, f64::exp)),
    math("log", 1, |n, a, _| {
        positive(n, a)?;
        unary_f64(n, a, f64::ln)
    }),
    math("log10", 1, |n, a, _| {
        positive(n, a)?;
        unary_f64(n, a, f64::log10)
    }),
    math("pow", 2, |n, a, _| binary_f64(n, a, f64::powf)),
    math("hypot", 2, |n, a, _| binary_f64(n, a, f64::hypot)),
    math("abs", 1, |n, a, _| match &a[0] {
        Value::Long(i) => i
            .checked_abs()
            .map(Value::Long)
            .ok_or_else(|| EvalError::domain(n, "integer overflow")),
        _ => unary_f64(n, a, f64::abs),
    }),
    math("floor", 1, |n, a, _| unary_f64(n, a, f64::floor)),
    math("ceil", 1, |n, a, _| unary_f64(n, a, f64::ceil)),
    math("fmod", 2, |n, a, _| {
        if number(n, &a[1])? == 0.0 {
            return Err(EvalError::domain(n, "division by zero"));
        }
        binary_f64(n, a, |x, y| x % y)
    }),
    math("min", 2, |n, a, _| match (&a[0], &a[1]) {
        (Value::Long(x), Value::Long(y)) => Ok(Value::Long(*x.min(y))),
        _ => binary_f64(n, a, f64::min),
    }),
    math("max", 2, |n, a, _| match (&a[0], &a[1]) {
        (Value::Long(x), Value::Long(y)) => Ok(Value::Long(*x.max(y))),
        _ => binary_f64(n, a, f64::max),
    }),
    // conversions
    math("int", 1, |n, a, _| match &a[0] {
        Value::Long(i) => Ok(Value::Long(*i)),
        Value::Double(x) => truncate(n, *x).map(Value::Long),
        Value::Bool(b) => Ok(Value::Long(i64::from(*b))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Long)
            .map_err(|_| EvalError::domain(n, &format!("cannot convert \"{}\" to integer", s))),
        other => Err(operand_error(n, &[other])),
    }),
    math("double", 1, |n, a, _| match &a[0] {
        Value::Long(i) => Ok(Value::Double(*i as f64)),
        Value::Double(x) => Ok(Value::Double(*x)),
        Value::Bool(b) => Ok(Value::Double(if *b { 1.0 } else { 0.0 })),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| EvalError::domain(n, &format!("cannot convert \"{}\" to double", s))),
        other => Err(operand_error(n, &[other])),
    }),
    math("string", 1, |_, a, _| match &a[0] {
        Value::String(s) => Ok(Value::String(s.clone())),
        other => Ok(Value::String(other.to_string())),
    }),
    math("bool", 1, |n, a, _| match &a[0] {
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::Long(i) => Ok(Value::Bool(*i != 0)),
        Value::Double(x) => Ok(Value::Bool(*x != 0.0)),
        Value::String(s) => match s.trim() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(EvalError::domain(n, &format!("cannot convert \"{}\" to bool", s))),
        },
        other => Err(operand_error(n, &[other])),
    }),
    math("length", 1, |n, a, _| match &a[0] {
        Value::String(s) => Ok(Value::Long(s.chars().count() as i64)),
        other => Err(operand_error(n, &[other])),
    }),
    // random variates
    random("uniform", 2, 2, |n, a, ctx| {
        let (lo, hi) = (number(n, &a[0])?, number(n, &a[1])?);
        if lo > hi {
            return Err(EvalError::domain(n, "lower bound exceeds upper bound"));
        }
        Ok(Value::Double(lo + (hi - lo) * draw(ctx)?))
    }),
    random("intuniform", 2, 2, |n, a, ctx| match (&a[0], &a[1]) {
        (Value::Long(lo), Value::Long(hi)) => {
            if lo > hi {
                return Err(EvalError::domain(n, "lower bound exceeds upper bound"));
            }
            let span = (*hi as f64) - (*lo as f64) + 1.0;
            let offset = (draw(ctx)? * span).floor() as i64;
            Ok(Value::Long(lo.saturating_add(offset).min(*hi)))
        }
        (x, y) => Err(operand_error(n, &[x, y])),
    }),
    random("exponential", 1, 1, |n, a, ctx| {
        let mean = number(n, &a[0])?;
        if mean < 0.0 {
            return Err(EvalError::domain(n, "negative mean"));
        }
        Ok(Value::Double(-mean * (1.0 - draw(ctx)?).ln()))
    }),
    random("normal", 2, 2, |n, a, ctx| {
        let (mean, stddev) = (number(n, &a[0])?, number(n, &a[1])?);
        if stddev < 0.0 {
            return Err(EvalError::domain(n, "negative standard deviation"));
        }
        // Box-Muller transform
        let u1 = 1.0 - draw(ctx)?;
        let u2 = draw(ctx)?;
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        Ok(Value::Double(mean + stddev * z))
    }),
    random("bernoulli", 1, 1, |n, a, ctx| {
        let p = number(n, &a[0])?;
        if !(0.0..=1.0).contains(&p) {
            return Err(EvalError::domain(n, "probability outside [0, 1]"));
        }
        Ok(Value::Bool(draw(ctx)? < p))
    }),
];

fn lookup(name: &str) -> Option<&'static Function> {
    FUNCTIONS.iter().find(|f| f.name == name)
}

/// Returns true if `name` is a built-in function.
pub fn exists(name: &str) -> bool {
    lookup(name).is_some()
}

/// Returns true if `name` is a built-in function producing random values.
pub fn is_random(name: &str) -> bool {
    lookup(name).map_or(false, |f| f.random)
}

/// Returns the names of all built-in functions.
pub fn names() -> impl Iterator<Item = &'static str> {
    FUNCTIONS.iter().map(|f| f.name)
}

pub(crate) fn call(name: &str, args: &[Value], ctx: Option<&dyn EvalContext>) -> Result<Value, EvalError> {
    let function = lookup(name).ok_or_else(|| EvalError::UnknownFunction(name.to_owned()))?;
    if args.len() < function.min_args || args.len() > function.max_args {
        let expected = if function.min_args == function.max_args {
            function.min_args.to_string()
        } else {
            format!("{}..{}", function.min_args, function.max_args)
        };
        return Err(EvalError::Arity {
            function: name.to_owned(),
            expected,
            found: args.len(),
        });
    }
    (function.eval)(name, args, ctx)
}

fn number(name: &str, value: &Value) -> Result<f64, EvalError> {
    value.as_f64().ok_or_else(|| operand_error(name, &[value]))
}

fn unary_f64(name: &str, args: &[Value], f: fn(f64) -> f64) -> Result<Value, EvalError> {
    Ok(Value::Double(f(number(name, &args[0])?)))
}

fn binary_f64(name: &str, args: &[Value], f: fn(f64, f64) -> f64) -> Result<Value, EvalError> {
    Ok(Value::Double(f(number(name, &args[0])?, number(name, &args[1])?)))
}

fn unit_interval(name: &str, args: &[Value]) -> Result<(), EvalError> {
    if (-1.0..=1.0).contains(&number(name, &args[0])?) {
        Ok(())
    } else {
        Err(EvalError::domain(name, "argument outside [-1, 1]"))
    }
}

fn positive(name: &str, args: &[Value]) -> Result<(), EvalError> {
    if number(name, &args[0])? > 0.0 {
        Ok(())
    } else {
        Err(EvalError::domain(name, "non-positive argument"))
    }
}

/// Converts to integer, truncating toward zero.
pub(crate) fn truncate(name: &str, x: f64) -> Result<i64, EvalError> {
    // i64::MAX as f64 rounds up to 2^63, which is out of range
    if x.is_finite() && x >= i64::MIN as f64 && x < i64::MAX as f64 {
        Ok(x.trunc() as i64)
    } else {
        Err(EvalError::domain(name, &format!("{} is out of integer range", x)))
    }
}

fn draw(ctx: Option<&dyn EvalContext>) -> Result<f64, EvalError> {
    ctx.ok_or(EvalError::NoRandomSource)?.random()
}
