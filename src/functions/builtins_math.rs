//! Math and trig builtins.

use crate::ast::Expr;
use crate::error::{CalcError, CalcResult};
use crate::functions::{self, wildcard, FunctionTable, VAR_ARGS};
use crate::value::Value;
use crate::Engine;

pub(crate) fn register(table: &mut FunctionTable) {
    functions::add(table, "ABS", 1, 1, |e, a| unary(e, a, f64::abs));
    functions::add(table, "ACOS", 1, 1, |e, a| unary(e, a, f64::acos));
    functions::add(table, "ASIN", 1, 1, |e, a| unary(e, a, f64::asin));
    functions::add(table, "ATAN", 1, 1, |e, a| unary(e, a, f64::atan));
    functions::add(table, "ATAN2", 2, 2, atan2);
    functions::add(table, "CEILING", 1, 1, |e, a| unary(e, a, f64::ceil));
    functions::add(table, "COS", 1, 1, |e, a| unary(e, a, f64::cos));
    functions::add(table, "COSH", 1, 1, |e, a| unary(e, a, f64::cosh));
    functions::add(table, "EXP", 1, 1, |e, a| unary(e, a, f64::exp));
    functions::add(table, "FLOOR", 1, 1, |e, a| unary(e, a, f64::floor));
    functions::add(table, "INT", 1, 1, |e, a| unary(e, a, f64::floor));
    functions::add(table, "LN", 1, 1, |e, a| unary(e, a, f64::ln));
    functions::add(table, "LOG", 1, 2, log);
    functions::add(table, "LOG10", 1, 1, |e, a| unary(e, a, f64::log10));
    functions::add(table, "NULLVALUE", 2, 2, null_value);
    functions::add(table, "PI", 0, 0, pi);
    functions::add(table, "POWER", 2, 2, power);
    functions::add_volatile(table, "RAND", 0, 0, rand);
    functions::add_volatile(table, "RANDBETWEEN", 2, 2, rand_between);
    functions::add(table, "ROUND", 1, 2, round);
    functions::add(table, "SIGN", 1, 1, |e, a| unary(e, a, f64::signum));
    functions::add(table, "SIN", 1, 1, |e, a| unary(e, a, f64::sin));
    functions::add(table, "SINH", 1, 1, |e, a| unary(e, a, f64::sinh));
    functions::add(table, "SQRT", 1, 1, |e, a| unary(e, a, f64::sqrt));
    functions::add(table, "SUM", 1, VAR_ARGS, sum);
    functions::add(table, "SUMIF", 2, 3, sum_if);
    functions::add(table, "TAN", 1, 1, |e, a| unary(e, a, f64::tan));
    functions::add(table, "TANH", 1, 1, |e, a| unary(e, a, f64::tanh));
    functions::add(table, "TRUNC", 1, 1, |e, a| unary(e, a, f64::trunc));
}

fn unary(engine: &Engine, args: &[Expr], f: fn(f64) -> f64) -> CalcResult<Value> {
    Ok(Value::Number(f(functions::eval_number(engine, &args[0])?)))
}

fn atan2(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let y = functions::eval_number(engine, &args[0])?;
    let x = functions::eval_number(engine, &args[1])?;
    Ok(Value::Number(y.atan2(x)))
}

fn log(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let n = functions::eval_number(engine, &args[0])?;
    let base = if args.len() > 1 {
        functions::eval_number(engine, &args[1])?
    } else {
        10.0
    };
    Ok(Value::Number(n.log(base)))
}

/// NULLVALUE(value, fallback): the fallback is only evaluated when needed.
fn null_value(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let value = args[0].evaluate(engine)?;
    if value.is_null() {
        args[1].evaluate(engine)
    } else {
        Ok(value)
    }
}

fn pi(_engine: &Engine, _args: &[Expr]) -> CalcResult<Value> {
    Ok(Value::Number(std::f64::consts::PI))
}

fn power(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let base = functions::eval_number(engine, &args[0])?;
    let exponent = functions::eval_number(engine, &args[1])?;
    Ok(Value::Number(base.powf(exponent)))
}

fn rand(engine: &Engine, _args: &[Expr]) -> CalcResult<Value> {
    Ok(Value::Number(engine.next_random()))
}

fn rand_between(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let lo = functions::eval_number(engine, &args[0])?;
    let hi = functions::eval_number(engine, &args[1])?;
    if hi < lo {
        return Err(CalcError::eval("RANDBETWEEN upper bound below lower bound"));
    }
    let span = (hi - lo + 1.0).floor();
    let pick = lo.floor() + (engine.next_random() * span).floor().min(span - 1.0);
    Ok(Value::Number(pick))
}

fn round(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let n = functions::eval_number(engine, &args[0])?;
    let digits = if args.len() > 1 {
        functions::eval_number(engine, &args[1])? as i32
    } else {
        0
    };
    let factor = 10f64.powi(digits);
    Ok(Value::Number((n * factor).round() / factor))
}

fn sum(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let mut total = 0f64;
    for value in functions::collect_values(engine, args)? {
        if value.is_null() {
            continue;
        }
        total += value.to_number_with(engine.locale())?;
    }
    Ok(Value::Number(total))
}

/// SUMIF(values, criteria[, sum_values]): sums the entries of the third
/// argument (or the first, when omitted) at positions where the criteria
/// accepts the corresponding first-argument entry.
fn sum_if(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let tested = functions::collect_values(engine, &args[..1])?;
    let criteria = args[1].evaluate(engine)?;
    let summed = if args.len() > 2 {
        functions::collect_values(engine, &args[2..3])?
    } else {
        tested.clone()
    };
    let mut total = 0f64;
    for (i, candidate) in tested.iter().enumerate() {
        if criteria_matches(engine, &criteria, candidate) {
            if let Some(value) = summed.get(i) {
                if !value.is_null() {
                    total += value.to_number_with(engine.locale())?;
                }
            }
        }
    }
    Ok(Value::Number(total))
}

fn criteria_matches(engine: &Engine, criteria: &Value, candidate: &Value) -> bool {
    let locale = engine.locale();
    if let Value::Text(text) = criteria {
        let text = text.trim();
        for (prefix, check) in [
            ("<=", Check::Le),
            (">=", Check::Ge),
            ("<>", Check::Ne),
            ("=", Check::Eq),
            ("<", Check::Lt),
            (">", Check::Gt),
        ] {
            if let Some(rest) = text.strip_prefix(prefix) {
                let target = match locale.parse_number(rest.trim()) {
                    Some(n) => Value::Number(n),
                    None => Value::Text(rest.trim().to_string()),
                };
                let Ok(ordering) = candidate.compare(&target, locale) else {
                    return false;
                };
                return check.accepts(ordering);
            }
        }
        if text.contains('*') || text.contains('?') {
            return wildcard::matches(text, &candidate.to_text());
        }
        return match locale.parse_number(text) {
            Some(n) => candidate
                .to_number_with(locale)
                .map(|c| c == n)
                .unwrap_or(false),
            None => candidate.to_text().eq_ignore_ascii_case(text),
        };
    }
    candidate.is_same(criteria)
        || matches!(
            (candidate.to_number(), criteria.to_number()),
            (Ok(a), Ok(b)) if a == b
        )
}

#[derive(Clone, Copy)]
enum Check {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl Check {
    fn accepts(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Check::Eq => ordering == Equal,
            Check::Ne => ordering != Equal,
            Check::Lt => ordering == Less,
            Check::Gt => ordering == Greater,
            Check::Le => ordering != Greater,
            Check::Ge => ordering != Less,
        }
    }
}
