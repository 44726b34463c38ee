use std::collections::HashMap;

use evsim::expr::{functions, EvalContext, EvalError, Expression};
use evsim::par::Value;

fn eval(text: &str) -> Result<Value, EvalError> {
    Expression::parse(text).unwrap().evaluate(None)
}

#[test]
fn parsed_expression_prints_canonically_and_evaluates() {
    let expr = Expression::parse("3+4").unwrap();
    assert_eq!(expr.canonical_text(), "3 + 4");
    assert_eq!(expr.evaluate(None).unwrap(), Value::Long(7));

    let reparsed = Expression::parse(&expr.canonical_text()).unwrap();
    assert_eq!(reparsed, expr);

    let expr = Expression::parse("(1 + 2) * -x ^ 2").unwrap();
    assert_eq!(Expression::parse(&expr.canonical_text()).unwrap(), expr);
}

#[test]
fn operators_follow_usual_precedence() {
    assert_eq!(eval("2 + 3 * 4").unwrap(), Value::Long(14));
    assert_eq!(eval("(2 + 3) * 4").unwrap(), Value::Long(20));
    assert_eq!(eval("2 ^ 3 ^ 2").unwrap(), Value::Long(512));
    assert_eq!(eval("7 % 3").unwrap(), Value::Long(1));
    assert_eq!(eval("7 / 2").unwrap(), Value::Double(3.5));
    assert_eq!(eval("1 < 2 && !(3 == 4)").unwrap(), Value::Bool(true));
    assert_eq!(eval("1 > 2 ? 10 : 1 < 2 ? 20 : 30").unwrap(), Value::Long(20));
    assert_eq!(eval("\"ab\" + \"cd\"").unwrap(), Value::String("abcd".into()));
}

#[test]
fn syntax_errors_report_position() {
    let err = Expression::parse("3 + * 2").unwrap_err();
    assert_eq!(err.position, 4);

    let err = Expression::parse("(1 + 2").unwrap_err();
    assert_eq!(err.position, 6);
    assert!(err.message.contains("end of expression"));

    let err = Expression::parse("").unwrap_err();
    assert_eq!(err.position, 0);

    let err = Expression::parse("x < 1e400").unwrap_err();
    assert_eq!(err.position, 4);

    assert!(Expression::parse("1 2").is_err());
    assert!(Expression::parse("default").is_err());
}

#[test]
fn evaluation_errors_are_typed() {
    assert!(matches!(eval("1 / 0"), Err(EvalError::Domain { .. })));
    assert!(matches!(eval("sqrt(-1)"), Err(EvalError::Domain { .. })));
    assert!(matches!(eval("9223372036854775807 + 1"), Err(EvalError::Domain { .. })));
    assert!(matches!(eval("true + 1"), Err(EvalError::OperandType { .. })));
    assert!(matches!(eval("nosuch(1)"), Err(EvalError::UnknownFunction(_))));
    assert!(matches!(eval("max(1)"), Err(EvalError::Arity { found: 1, .. })));
    assert_eq!(eval("x + 1"), Err(EvalError::NoContext("x".into())));
    assert_eq!(eval("uniform(0, 1)"), Err(EvalError::NoRandomSource));
}

#[test]
fn names_are_resolved_through_context() {
    let mut vars: HashMap<String, Value> = HashMap::new();
    vars.insert("rate".into(), Value::Double(4.0));
    vars.insert("n".into(), Value::Long(3));
    let ctx: &dyn EvalContext = &vars;

    let expr = Expression::parse("n * (1 / rate)").unwrap();
    assert!(!expr.is_constant());
    assert_eq!(expr.evaluate(Some(ctx)).unwrap(), Value::Double(0.75));
    assert_eq!(
        Expression::parse("missing").unwrap().evaluate(Some(ctx)),
        Err(EvalError::UnresolvedName("missing".into()))
    );
}

#[test]
fn function_table_is_queryable() {
    assert!(functions::exists("sin"));
    assert!(functions::is_random("exponential"));
    assert!(!functions::is_random("sqrt"));
    assert!(functions::names().any(|name| name == "intuniform"));
    assert_eq!(eval("max(2, 7.5)").unwrap(), Value::Double(7.5));
    assert_eq!(eval("int(3.9)").unwrap(), Value::Long(3));
    assert_eq!(eval("length(\"abc\")").unwrap(), Value::Long(3));
}
