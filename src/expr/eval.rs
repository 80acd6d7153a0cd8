//! Evaluation of parameter expressions.
//!
//! A pure evaluator over a fixed function set; no arbitrary code execution.
//! `/` always produces a float, the other operators stay integral when
//! both operands are integers, and `round`/`floor`/`ceil` return
//! integers.

use indexmap::IndexMap;

use crate::error::ExprError;
use crate::expr::parser::{BinaryOp, Expr};
use crate::value::Value;

/// Evaluates a parsed expression against an environment of resolved
/// parameter values.
///
/// `source` is the original expression text, used only for error messages.
pub fn evaluate(
    expr: &Expr,
    env: &IndexMap<String, Value>,
    source: &str,
) -> Result<Value, ExprError> {
    match expr {
        Expr::Int(n) => Ok(Value::Int(*n)),
        Expr::Float(f) => Ok(Value::Float(*f)),
        Expr::Ident(name) => {
            if name == "pi" {
                return Ok(Value::Float(std::f64::consts::PI));
            }
            env.get(name).cloned().ok_or_else(|| ExprError::UnknownName {
                name: name.clone(),
                expression: source.to_string(),
                available: env.keys().cloned().collect(),
            })
        }
        Expr::Neg(inner) => match evaluate(inner, env, source)? {
            Value::Int(n) => Ok(Value::Int(-n)),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(eval_error(
                source,
                format!("cannot negate {}", other.type_name()),
            )),
        },
        Expr::Binary { left, op, right } => {
            let lhs = evaluate(left, env, source)?;
            let rhs = evaluate(right, env, source)?;
            apply_binary(*op, &lhs, &rhs, source)
        }
        Expr::Call { name, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(evaluate(arg, env, source)?);
            }
            call_builtin(name, &values, source)
        }
    }
}

fn eval_error(source: &str, reason: impl Into<String>) -> ExprError {
    ExprError::Eval {
        expression: source.to_string(),
        reason: reason.into(),
    }
}

fn numeric(value: &Value, source: &str) -> Result<f64, ExprError> {
    value
        .as_f64()
        .ok_or_else(|| eval_error(source, format!("expected a number, got {}", value.type_name())))
}

fn both_ints(lhs: &Value, rhs: &Value) -> Option<(i64, i64)> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some((*a, *b)),
        _ => None,
    }
}

fn apply_binary(op: BinaryOp, lhs: &Value, rhs: &Value, source: &str) -> Result<Value, ExprError> {
    match op {
        BinaryOp::Add => {
            if let (Value::Str(a), Value::Str(b)) = (lhs, rhs) {
                return Ok(Value::Str(format!("{}{}", a, b)));
            }
            if let Some((a, b)) = both_ints(lhs, rhs) {
                return Ok(Value::Int(a.wrapping_add(b)));
            }
            Ok(Value::Float(numeric(lhs, source)? + numeric(rhs, source)?))
        }
        BinaryOp::Sub => {
            if let Some((a, b)) = both_ints(lhs, rhs) {
                return Ok(Value::Int(a.wrapping_sub(b)));
            }
            Ok(Value::Float(numeric(lhs, source)? - numeric(rhs, source)?))
        }
        BinaryOp::Mul => {
            if let Some((a, b)) = both_ints(lhs, rhs) {
                return Ok(Value::Int(a.wrapping_mul(b)));
            }
            Ok(Value::Float(numeric(lhs, source)? * numeric(rhs, source)?))
        }
        BinaryOp::Div => {
            let divisor = numeric(rhs, source)?;
            if divisor == 0.0 {
                return Err(ExprError::DivisionByZero {
                    expression: source.to_string(),
                });
            }
            Ok(Value::Float(numeric(lhs, source)? / divisor))
        }
        BinaryOp::Mod => {
            if let Some((a, b)) = both_ints(lhs, rhs) {
                if b == 0 {
                    return Err(ExprError::DivisionByZero {
                        expression: source.to_string(),
                    });
                }
                // Result sign follows the divisor
                return Ok(Value::Int(((a % b) + b) % b));
            }
            let a = numeric(lhs, source)?;
            let b = numeric(rhs, source)?;
            if b == 0.0 {
                return Err(ExprError::DivisionByZero {
                    expression: source.to_string(),
                });
            }
            Ok(Value::Float((a % b + b) % b))
        }
        BinaryOp::Pow => pow_values(lhs, rhs, source),
    }
}

fn pow_values(lhs: &Value, rhs: &Value, source: &str) -> Result<Value, ExprError> {
    if let Some((base, exp)) = both_ints(lhs, rhs) {
        if exp >= 0 {
            if let Ok(exp32) = u32::try_from(exp) {
                if let Some(result) = base.checked_pow(exp32) {
                    return Ok(Value::Int(result));
                }
            }
        }
    }
    Ok(Value::Float(
        numeric(lhs, source)?.powf(numeric(rhs, source)?),
    ))
}

/// Calls a built-in function by name.
fn call_builtin(name: &str, args: &[Value], source: &str) -> Result<Value, ExprError> {
    match name {
        "min" => fold_extremum(args, source, "min", |a, b| a < b),
        "max" => fold_extremum(args, source, "max", |a, b| a > b),
        "abs" => {
            expect_arity(name, args, 1, source)?;
            match &args[0] {
                Value::Int(n) => Ok(Value::Int(n.wrapping_abs())),
                Value::Float(f) => Ok(Value::Float(f.abs())),
                other => Err(eval_error(
                    source,
                    format!("abs expects a number, got {}", other.type_name()),
                )),
            }
        }
        "sqrt" => {
            expect_arity(name, args, 1, source)?;
            let x = numeric(&args[0], source)?;
            if x < 0.0 {
                return Err(eval_error(source, "sqrt of negative number"));
            }
            Ok(Value::Float(x.sqrt()))
        }
        "pow" => {
            expect_arity(name, args, 2, source)?;
            pow_values(&args[0], &args[1], source)
        }
        "round" => {
            expect_arity(name, args, 1, source)?;
            Ok(Value::Int(numeric(&args[0], source)?.round() as i64))
        }
        "floor" => {
            expect_arity(name, args, 1, source)?;
            Ok(Value::Int(numeric(&args[0], source)?.floor() as i64))
        }
        "ceil" => {
            expect_arity(name, args, 1, source)?;
            Ok(Value::Int(numeric(&args[0], source)?.ceil() as i64))
        }
        "sin" => {
            expect_arity(name, args, 1, source)?;
            Ok(Value::Float(numeric(&args[0], source)?.sin()))
        }
        "cos" => {
            expect_arity(name, args, 1, source)?;
            Ok(Value::Float(numeric(&args[0], source)?.cos()))
        }
        "tan" => {
            expect_arity(name, args, 1, source)?;
            Ok(Value::Float(numeric(&args[0], source)?.tan()))
        }
        _ => Err(eval_error(source, format!("unknown function: {}", name))),
    }
}

fn expect_arity(name: &str, args: &[Value], arity: usize, source: &str) -> Result<(), ExprError> {
    if args.len() != arity {
        return Err(eval_error(
            source,
            format!("{} expects {} argument(s), got {}", name, arity, args.len()),
        ));
    }
    Ok(())
}

fn fold_extremum(
    args: &[Value],
    source: &str,
    name: &str,
    wins: fn(f64, f64) -> bool,
) -> Result<Value, ExprError> {
    if args.is_empty() {
        return Err(eval_error(source, format!("{} expects at least 1 argument", name)));
    }
    let mut best = args[0].clone();
    let mut best_num = numeric(&best, source)?;
    for arg in &args[1..] {
        let num = numeric(arg, source)?;
        if wins(num, best_num) {
            best = arg.clone();
            best_num = num;
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::parse;

    fn eval(source: &str, env: &IndexMap<String, Value>) -> Result<Value, ExprError> {
        let expr = parse(source)?;
        evaluate(&expr, env, source)
    }

    fn empty() -> IndexMap<String, Value> {
        IndexMap::new()
    }

    #[test]
    fn test_int_arithmetic_stays_int() {
        assert_eq!(eval("2 + 3 * 4", &empty()).unwrap(), Value::Int(14));
        assert_eq!(eval("10 - 3", &empty()).unwrap(), Value::Int(7));
        assert_eq!(eval("2 ** 10", &empty()).unwrap(), Value::Int(1024));
    }

    #[test]
    fn test_division_always_floats() {
        assert_eq!(eval("10 / 4", &empty()).unwrap(), Value::Float(2.5));
        assert_eq!(eval("10 / 5", &empty()).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(
            eval("1 / 0", &empty()),
            Err(ExprError::DivisionByZero { .. })
        ));
        assert!(matches!(
            eval("1 % 0", &empty()),
            Err(ExprError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_mod_sign_follows_divisor() {
        assert_eq!(eval("-7 % 3", &empty()).unwrap(), Value::Int(2));
        assert_eq!(eval("7 % 3", &empty()).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_identifier_lookup() {
        let mut env = IndexMap::new();
        env.insert("width".to_string(), Value::Int(10));
        assert_eq!(eval("width * 2", &env).unwrap(), Value::Int(20));
    }

    #[test]
    fn test_unknown_name_lists_available() {
        let mut env = IndexMap::new();
        env.insert("width".to_string(), Value::Int(10));
        match eval("height * 2", &env) {
            Err(ExprError::UnknownName { name, available, .. }) => {
                assert_eq!(name, "height");
                assert_eq!(available, vec!["width".to_string()]);
            }
            other => panic!("expected UnknownName, got {:?}", other),
        }
    }

    #[test]
    fn test_builtins() {
        assert_eq!(eval("min(3, 1, 2)", &empty()).unwrap(), Value::Int(1));
        assert_eq!(eval("max(3, 1, 2)", &empty()).unwrap(), Value::Int(3));
        assert_eq!(eval("abs(-4)", &empty()).unwrap(), Value::Int(4));
        assert_eq!(eval("sqrt(16)", &empty()).unwrap(), Value::Float(4.0));
        assert_eq!(eval("round(2.6)", &empty()).unwrap(), Value::Int(3));
        assert_eq!(eval("floor(2.6)", &empty()).unwrap(), Value::Int(2));
        assert_eq!(eval("ceil(2.1)", &empty()).unwrap(), Value::Int(3));
        assert_eq!(eval("pow(2, 3)", &empty()).unwrap(), Value::Int(8));
    }

    #[test]
    fn test_trig_and_pi() {
        let result = eval("sin(pi / 2)", &empty()).unwrap();
        let Value::Float(f) = result else {
            panic!("expected float");
        };
        assert!((f - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_negative_power_is_float() {
        assert_eq!(eval("2 ** -1", &empty()).unwrap(), Value::Float(0.5));
    }

    #[test]
    fn test_string_concat() {
        let mut env = IndexMap::new();
        env.insert("a".to_string(), Value::Str("left".to_string()));
        env.insert("b".to_string(), Value::Str("right".to_string()));
        assert_eq!(
            eval("a + b", &env).unwrap(),
            Value::Str("leftright".to_string())
        );
    }

    #[test]
    fn test_arity_errors() {
        assert!(eval("sqrt(1, 2)", &empty()).is_err());
        assert!(eval("min()", &empty()).is_err());
        assert!(eval("nosuch(1)", &empty()).is_err());
    }
}
