//! Local evaluation of a WHERE predicate against one concrete row, used when
//! nested rows are selected on the client side.

use crate::{
    ast::{ColumnRef, ComparisonOp, Expression, PrettyPrint},
    translator::{expressions::like_pattern, like_to_regex},
    types::Value,
    write::{Error, Result},
};
use regex::Regex;
use std::cmp::Ordering;

/// Evaluates `expr` with SQL three-valued logic; unknown is `Value::Null`.
pub(crate) fn evaluate(
    expr: &Expression,
    column: &dyn Fn(&ColumnRef) -> Result<Value>,
) -> Result<Value> {
    Ok(match expr {
        Expression::Column(c) => column(c)?,
        Expression::Literal(v) => v.clone(),
        Expression::Comparison(c) => {
            let left = evaluate(&c.left, column)?;
            let right = evaluate(&c.right, column)?;
            compare(c.op, &left, &right)
        }
        Expression::And(terms) => {
            let mut unknown = false;
            for term in terms {
                match truth(&evaluate(term, column)?) {
                    Some(false) => return Ok(Value::Boolean(false)),
                    None => unknown = true,
                    Some(true) => {}
                }
            }
            if unknown {
                Value::Null
            } else {
                Value::Boolean(true)
            }
        }
        Expression::Or(terms) => {
            let mut unknown = false;
            for term in terms {
                match truth(&evaluate(term, column)?) {
                    Some(true) => return Ok(Value::Boolean(true)),
                    None => unknown = true,
                    Some(false) => {}
                }
            }
            if unknown {
                Value::Null
            } else {
                Value::Boolean(false)
            }
        }
        Expression::Not(e) => match truth(&evaluate(e, column)?) {
            Some(b) => Value::Boolean(!b),
            None => Value::Null,
        },
        Expression::In(i) => {
            let input = evaluate(&i.expr, column)?;
            if input.is_null() {
                return Ok(Value::Null);
            }
            let mut unknown = false;
            let mut found = false;
            for item in &i.list {
                match input.compare(&evaluate(item, column)?) {
                    Some(Ordering::Equal) => {
                        found = true;
                        break;
                    }
                    None => unknown = true,
                    Some(_) => {}
                }
            }
            match (found, unknown) {
                (true, _) => Value::Boolean(!i.negated),
                (false, true) => Value::Null,
                (false, false) => Value::Boolean(i.negated),
            }
        }
        Expression::IsNull(i) => Value::Boolean(evaluate(&i.expr, column)?.is_null() != i.negated),
        Expression::Like(l) => {
            let input = evaluate(&l.expr, column)?;
            let Some(text) = input.as_text() else {
                return Ok(Value::Null);
            };
            let pattern = like_pattern(&l.pattern)?;
            let re = Regex::new(&format!("(?s){}", like_to_regex(&pattern, l.escape)))
                .map_err(|e| Error::Evaluation(e.to_string()))?;
            Value::Boolean(re.is_match(&text) != l.negated)
        }
        Expression::Function(f) => {
            let args = f
                .args
                .iter()
                .map(|a| evaluate(a, column))
                .collect::<Result<Vec<_>>>()?;
            function(&f.name, args).ok_or_else(|| Error::Evaluation(expr.pretty_print()))?
        }
        Expression::Aggregate(_) => {
            return Err(Error::Unsupported(format!(
                "aggregate {} in a write filter",
                expr.pretty_print()
            )))
        }
    })
}

/// Whether the row passes the predicate; unknown does not pass.
pub(crate) fn matches(
    expr: &Expression,
    column: &dyn Fn(&ColumnRef) -> Result<Value>,
) -> Result<bool> {
    Ok(truth(&evaluate(expr, column)?) == Some(true))
}

fn truth(value: &Value) -> Option<bool> {
    match value {
        Value::Boolean(b) => Some(*b),
        _ => None,
    }
}

fn compare(op: ComparisonOp, left: &Value, right: &Value) -> Value {
    let Some(ordering) = left.compare(right) else {
        return Value::Null;
    };
    Value::Boolean(match op {
        ComparisonOp::Eq => ordering == Ordering::Equal,
        ComparisonOp::Neq => ordering != Ordering::Equal,
        ComparisonOp::Lt => ordering == Ordering::Less,
        ComparisonOp::Lte => ordering != Ordering::Greater,
        ComparisonOp::Gt => ordering == Ordering::Greater,
        ComparisonOp::Gte => ordering != Ordering::Less,
    })
}

/// The scalar functions a nested-row filter may use. None when the function
/// has no local evaluation.
fn function(name: &str, args: Vec<Value>) -> Option<Value> {
    if args.iter().any(Value::is_null) {
        return Some(Value::Null);
    }
    let text = |i: usize| args.get(i).and_then(Value::as_text);
    let number = |i: usize| args.get(i).and_then(Value::as_f64);
    let integral = args.iter().all(|a| {
        matches!(
            a,
            Value::Byte(_) | Value::Short(_) | Value::Integer(_) | Value::Long(_)
        )
    });
    let arithmetic = |f: fn(f64, f64) -> f64| {
        let result = f(number(0)?, number(1)?);
        Some(if integral {
            Value::Long(result as i64)
        } else {
            Value::Double(result)
        })
    };
    Some(match name.to_lowercase().as_str() {
        "upper" | "ucase" => Value::String(text(0)?.to_uppercase()),
        "lower" | "lcase" => Value::String(text(0)?.to_lowercase()),
        "trim" => Value::String(text(0)?.trim().to_string()),
        "ltrim" => Value::String(text(0)?.trim_start().to_string()),
        "rtrim" => Value::String(text(0)?.trim_end().to_string()),
        "length" | "char_length" => Value::Integer(text(0)?.chars().count() as i32),
        "concat" | "||" => Value::String(
            args.iter()
                .map(Value::as_text)
                .collect::<Option<Vec<_>>>()?
                .concat(),
        ),
        "abs" => match &args[..] {
            [Value::Integer(v)] => v
                .checked_abs()
                .map_or(Value::Long((*v as i64).abs()), Value::Integer),
            [Value::Long(v)] => v
                .checked_abs()
                .map_or(Value::Double((*v as f64).abs()), Value::Long),
            _ => Value::Double(number(0)?.abs()),
        },
        "+" | "add" => arithmetic(|a, b| a + b)?,
        "-" | "subtract" => arithmetic(|a, b| a - b)?,
        "*" | "multiply" => arithmetic(|a, b| a * b)?,
        "/" | "divide" => Value::Double(number(0)? / number(1)?),
        _ => return None,
    })
}
