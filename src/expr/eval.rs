//! Tree-walking evaluator.

use std::cmp::Ordering;

use super::ast::{BinaryOp, Node, UnaryOp};
use super::context::EvalContext;
use super::error::EvalError;
use super::functions;
use crate::par::Value;

/// Evaluates a syntax tree.
///
/// Children are evaluated depth-first, left to right, and the first failure is returned. `&&`, `||` and the
/// conditional operator evaluate only the operands they need.
pub fn evaluate(node: &Node, ctx: Option<&dyn EvalContext>) -> Result<Value, EvalError> {
    match node {
        Node::Literal(value) => Ok(value.clone()),
        Node::Name(name) => require(ctx, name)?.resolve(name),
        Node::Index => Ok(Value::Long(require(ctx, "index")?.index()?)),
        Node::SizeOf(name) => Ok(Value::Long(require(ctx, "sizeof")?.size_of(name)?)),
        Node::Unary { op, operand } => {
            let value = evaluate(operand, ctx)?;
            unary(*op, value)
        }
        Node::Binary { op, left, right } => match op {
            BinaryOp::And | BinaryOp::Or => {
                let lhs = expect_bool(op.symbol(), evaluate(left, ctx)?)?;
                if lhs == (*op == BinaryOp::Or) {
                    return Ok(Value::Bool(lhs));
                }
                Ok(Value::Bool(expect_bool(op.symbol(), evaluate(right, ctx)?)?))
            }
            _ => {
                let lhs = evaluate(left, ctx)?;
                let rhs = evaluate(right, ctx)?;
                binary(*op, lhs, rhs)
            }
        },
        Node::Conditional { cond, then, otherwise } => {
            if expect_bool("?:", evaluate(cond, ctx)?)? {
                evaluate(then, ctx)
            } else {
                evaluate(otherwise, ctx)
            }
        }
        Node::Call { function, args } => {
            let values = args
                .iter()
                .map(|arg| evaluate(arg, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            functions::call(function, &values, ctx)
        }
    }
}

fn require<'a>(ctx: Option<&'a dyn EvalContext>, name: &str) -> Result<&'a dyn EvalContext, EvalError> {
    ctx.ok_or_else(|| EvalError::NoContext(name.to_owned()))
}

pub(crate) fn operand_error(operation: &str, values: &[&Value]) -> EvalError {
    let operands = values
        .iter()
        .map(|v| v.kind().name())
        .collect::<Vec<_>>()
        .join(" and ");
    EvalError::OperandType {
        operation: operation.to_owned(),
        operands,
    }
}

fn expect_bool(operation: &str, value: Value) -> Result<bool, EvalError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(operand_error(operation, &[&other])),
    }
}

fn overflow(operation: &str) -> EvalError {
    EvalError::domain(operation, "integer overflow")
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, EvalError> {
    match (op, value) {
        (UnaryOp::Neg, Value::Long(i)) => i.checked_neg().map(Value::Long).ok_or_else(|| overflow("-")),
        (UnaryOp::Neg, Value::Double(x)) => Ok(Value::Double(-x)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (op, value) => Err(operand_error(op.symbol(), &[&value])),
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    let symbol = op.symbol();
    match op {
        BinaryOp::Add => match (&lhs, &rhs) {
            (Value::Long(a), Value::Long(b)) => a.checked_add(*b).map(Value::Long).ok_or_else(|| overflow(symbol)),
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
            _ => numeric(symbol, &lhs, &rhs).map(|(a, b)| Value::Double(a + b)),
        },
        BinaryOp::Sub => match (&lhs, &rhs) {
            (Value::Long(a), Value::Long(b)) => a.checked_sub(*b).map(Value::Long).ok_or_else(|| overflow(symbol)),
            _ => numeric(symbol, &lhs, &rhs).map(|(a, b)| Value::Double(a - b)),
        },
        BinaryOp::Mul => match (&lhs, &rhs) {
            (Value::Long(a), Value::Long(b)) => a.checked_mul(*b).map(Value::Long).ok_or_else(|| overflow(symbol)),
            _ => numeric(symbol, &lhs, &rhs).map(|(a, b)| Value::Double(a * b)),
        },
        BinaryOp::Div => {
            let (a, b) = numeric(symbol, &lhs, &rhs)?;
            if b == 0.0 {
                return Err(EvalError::domain(symbol, "division by zero"));
            }
            Ok(Value::Double(a / b))
        }
        BinaryOp::Mod => match (&lhs, &rhs) {
            (Value::Long(_), Value::Long(0)) => Err(EvalError::domain(symbol, "division by zero")),
            (Value::Long(a), Value::Long(b)) => a.checked_rem(*b).map(Value::Long).ok_or_else(|| overflow(symbol)),
            _ => Err(operand_error(symbol, &[&lhs, &rhs])),
        },
        BinaryOp::Pow => match (&lhs, &rhs) {
            (Value::Long(a), Value::Long(b)) if *b >= 0 => u32::try_from(*b)
                .ok()
                .and_then(|b| a.checked_pow(b))
                .map(Value::Long)
                .ok_or_else(|| overflow(symbol)),
            _ => numeric(symbol, &lhs, &rhs).map(|(a, b)| Value::Double(a.powf(b))),
        },
        BinaryOp::Eq | BinaryOp::Ne => {
            let equal = match (&lhs, &rhs) {
                (Value::Bool(a), Value::Bool(b)) => a == b,
                (Value::String(a), Value::String(b)) => a == b,
                (Value::Xml(a), Value::Xml(b)) => a == b,
                _ => {
                    let (a, b) = numeric(symbol, &lhs, &rhs)?;
                    a == b
                }
            };
            Ok(Value::Bool(equal == (op == BinaryOp::Eq)))
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (&lhs, &rhs) {
                (Value::Long(a), Value::Long(b)) => Some(a.cmp(b)),
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => {
                    let (a, b) = numeric(symbol, &lhs, &rhs)?;
                    a.partial_cmp(&b)
                }
            };
            let result = match ordering {
                // NaN compares false with everything
                None => false,
                Some(ordering) => match op {
                    BinaryOp::Lt => ordering == Ordering::Less,
                    BinaryOp::Le => ordering != Ordering::Greater,
                    BinaryOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                },
            };
            Ok(Value::Bool(result))
        }
        BinaryOp::And | BinaryOp::Or => Ok(Value::Bool(match op {
            BinaryOp::And => expect_bool(symbol, lhs)? && expect_bool(symbol, rhs)?,
            _ => expect_bool(symbol, lhs)? || expect_bool(symbol, rhs)?,
        })),
    }
}

fn numeric(operation: &str, lhs: &Value, rhs: &Value) -> Result<(f64, f64), EvalError> {
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(operand_error(operation, &[lhs, rhs])),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::expr::parser::parse;

    fn eval(text: &str) -> Result<Value, EvalError> {
        evaluate(&parse(text).unwrap(), None)
    }

    #[test]
    fn arithmetic_keeps_integers_when_possible() {
        assert_eq!(eval("3+4").unwrap(), Value::Long(7));
        assert_eq!(eval("2*3-1").unwrap(), Value::Long(5));
        assert_eq!(eval("7/2").unwrap(), Value::Double(3.5));
        assert_eq!(eval("7%3").unwrap(), Value::Long(1));
        assert_eq!(eval("2^10").unwrap(), Value::Long(1024));
        assert_eq!(eval("2^-1").unwrap(), Value::Double(0.5));
        assert_eq!(eval("1+0.5").unwrap(), Value::Double(1.5));
        assert_eq!(eval("-2^2").unwrap(), Value::Long(4));
    }

    #[test]
    fn strings_and_booleans() {
        assert_eq!(eval("\"ab\" + \"cd\"").unwrap(), Value::String("abcd".into()));
        assert_eq!(eval("\"a\" < \"b\"").unwrap(), Value::Bool(true));
        assert_eq!(eval("1 == 1.0").unwrap(), Value::Bool(true));
        assert_eq!(eval("!(3 > 4) && 2 >= 2").unwrap(), Value::Bool(true));
        assert_eq!(eval("1 < 2 ? \"yes\" : \"no\"").unwrap(), Value::String("yes".into()));
    }

    #[test]
    fn domain_errors() {
        assert!(matches!(eval("1/0"), Err(EvalError::Domain { .. })));
        assert!(matches!(eval("1%0"), Err(EvalError::Domain { .. })));
        assert!(matches!(eval("9223372036854775807 + 1"), Err(EvalError::Domain { .. })));
        assert!(matches!(eval("1.5 % 2"), Err(EvalError::OperandType { .. })));
        assert!(matches!(eval("\"a\" * 2"), Err(EvalError::OperandType { .. })));
        assert!(matches!(eval("1 ? 2 : 3"), Err(EvalError::OperandType { .. })));
    }

    #[test]
    fn short_circuit_skips_failing_operand() {
        assert_eq!(eval("false && 1/0 > 0").unwrap(), Value::Bool(false));
        assert_eq!(eval("true || 1/0 > 0").unwrap(), Value::Bool(true));
        assert_eq!(eval("true ? 1 : 1/0").unwrap(), Value::Long(1));
    }

    #[test]
    fn first_failure_wins_left_to_right() {
        let err = eval("max(1/0, undefined_fn())").unwrap_err();
        assert!(matches!(err, EvalError::Domain { .. }));
    }

    #[test]
    fn names_need_a_context() {
        let node = parse("delay * 2").unwrap();
        assert_eq!(evaluate(&node, None).unwrap_err(), EvalError::NoContext("delay".into()));

        let mut vars = HashMap::new();
        vars.insert("delay".to_owned(), Value::Double(1.5));
        assert_eq!(evaluate(&node, Some(&vars as &dyn EvalContext)).unwrap(), Value::Double(3.0));

        let node = parse("rate").unwrap();
        assert_eq!(
            evaluate(&node, Some(&vars as &dyn EvalContext)).unwrap_err(),
            EvalError::UnresolvedName("rate".into())
        );
    }
}
