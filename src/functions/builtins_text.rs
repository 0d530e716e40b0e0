//! Text builtins. Positions are 1-based and counted in characters, not
//! bytes.

use crate::ast::Expr;
use crate::error::{CalcError, CalcResult};
use crate::functions::{self, FunctionTable, VAR_ARGS};
use crate::value::Value;
use crate::Engine;

pub(crate) fn register(table: &mut FunctionTable) {
    functions::add(table, "CHAR", 1, 1, char_fn);
    functions::add(table, "CONCATENATE", 1, VAR_ARGS, concatenate);
    functions::add(table, "LEFT", 1, 2, left);
    functions::add(table, "LEN", 1, 1, len);
    functions::add(table, "LOWER", 1, 1, lower);
    functions::add(table, "MID", 3, 3, mid);
    functions::add(table, "PROPER", 1, 1, proper);
    functions::add(table, "REPT", 2, 2, rept);
    functions::add(table, "RIGHT", 1, 2, right);
    functions::add(table, "SUBSTITUTE", 3, 4, substitute);
    functions::add(table, "TRIM", 1, 1, trim);
    functions::add(table, "UPPER", 1, 1, upper);
    functions::add(table, "VALUE", 1, 1, value_fn);
}

fn char_fn(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let code = functions::eval_number(engine, &args[0])? as u32;
    match char::from_u32(code) {
        Some(c) => Ok(Value::Text(c.to_string())),
        None => Err(CalcError::eval(format!("invalid character code {code}"))),
    }
}

fn concatenate(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let mut out = String::new();
    for arg in args {
        out.push_str(&functions::eval_text(engine, arg)?);
    }
    Ok(Value::Text(out))
}

fn left(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let text = functions::eval_text(engine, &args[0])?;
    let count = opt_count(engine, args, 1)?;
    Ok(Value::Text(text.chars().take(count).collect()))
}

fn right(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let text = functions::eval_text(engine, &args[0])?;
    let count = opt_count(engine, args, 1)?;
    let total = text.chars().count();
    Ok(Value::Text(text.chars().skip(total.saturating_sub(count)).collect()))
}

fn opt_count(engine: &Engine, args: &[Expr], idx: usize) -> CalcResult<usize> {
    if args.len() > idx {
        Ok(functions::eval_number(engine, &args[idx])?.max(0.0) as usize)
    } else {
        Ok(1)
    }
}

fn len(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let text = functions::eval_text(engine, &args[0])?;
    Ok(Value::Number(text.chars().count() as f64))
}

fn lower(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    Ok(Value::Text(
        functions::eval_text(engine, &args[0])?.to_lowercase(),
    ))
}

fn upper(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    Ok(Value::Text(
        functions::eval_text(engine, &args[0])?.to_uppercase(),
    ))
}

fn mid(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let text = functions::eval_text(engine, &args[0])?;
    let start = functions::eval_number(engine, &args[1])?.max(1.0) as usize;
    let count = functions::eval_number(engine, &args[2])?.max(0.0) as usize;
    Ok(Value::Text(
        text.chars().skip(start - 1).take(count).collect(),
    ))
}

fn proper(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let text = functions::eval_text(engine, &args[0])?;
    let mut out = String::with_capacity(text.len());
    let mut start_of_word = true;
    for c in text.chars() {
        if c.is_alphabetic() {
            if start_of_word {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            start_of_word = false;
        } else {
            out.push(c);
            start_of_word = true;
        }
    }
    Ok(Value::Text(out))
}

fn rept(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let text = functions::eval_text(engine, &args[0])?;
    let count = functions::eval_number(engine, &args[1])?.max(0.0) as usize;
    Ok(Value::Text(text.repeat(count)))
}

/// SUBSTITUTE(text, old, new[, instance]): replaces every occurrence, or
/// only the 1-based `instance`-th one.
fn substitute(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let text = functions::eval_text(engine, &args[0])?;
    let old = functions::eval_text(engine, &args[1])?;
    let new = functions::eval_text(engine, &args[2])?;
    if old.is_empty() {
        return Ok(Value::Text(text));
    }
    if args.len() > 3 {
        let instance = functions::eval_number(engine, &args[3])? as usize;
        let mut seen = 0usize;
        let mut from = 0usize;
        while let Some(at) = text[from..].find(&old) {
            seen += 1;
            let at = from + at;
            if seen == instance {
                let mut out = String::with_capacity(text.len());
                out.push_str(&text[..at]);
                out.push_str(&new);
                out.push_str(&text[at + old.len()..]);
                return Ok(Value::Text(out));
            }
            from = at + old.len();
        }
        return Ok(Value::Text(text));
    }
    Ok(Value::Text(text.replace(&old, &new)))
}

fn trim(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    Ok(Value::Text(
        functions::eval_text(engine, &args[0])?.trim().to_string(),
    ))
}

fn value_fn(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    Ok(Value::Number(functions::eval_number(engine, &args[0])?))
}
