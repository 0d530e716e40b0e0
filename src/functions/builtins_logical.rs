//! Logical and inspection builtins. AND/OR/IF receive their arguments
//! unevaluated and short-circuit.

use crate::ast::Expr;
use crate::error::CalcResult;
use crate::functions::{self, FunctionTable, VAR_ARGS};
use crate::value::Value;
use crate::Engine;

pub(crate) fn register(table: &mut FunctionTable) {
    functions::add(table, "AND", 1, VAR_ARGS, and_fn);
    functions::add(table, "OR", 1, VAR_ARGS, or_fn);
    functions::add(table, "NOT", 1, 1, not_fn);
    functions::add(table, "IF", 2, 3, if_fn);
    functions::add(table, "TRUE", 0, 0, true_fn);
    functions::add(table, "FALSE", 0, 0, false_fn);
    functions::add(table, "ISNULL", 1, 1, is_null);
    functions::add(table, "HASVALUE", 1, 1, has_value);
    functions::add(table, "ISNUMERIC", 1, 1, is_numeric);
    functions::add(table, "CONTAINS", 2, 2, contains);
    functions::add(table, "LISTCOUNT", 1, 1, list_count);
}

fn and_fn(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    for arg in args {
        if !functions::eval_bool(engine, arg)? {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn or_fn(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    for arg in args {
        if functions::eval_bool(engine, arg)? {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

fn not_fn(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    Ok(Value::Bool(!functions::eval_bool(engine, &args[0])?))
}

fn if_fn(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    if functions::eval_bool(engine, &args[0])? {
        args[1].evaluate(engine)
    } else if args.len() > 2 {
        args[2].evaluate(engine)
    } else {
        Ok(Value::Bool(false))
    }
}

fn true_fn(_engine: &Engine, _args: &[Expr]) -> CalcResult<Value> {
    Ok(Value::Bool(true))
}

fn false_fn(_engine: &Engine, _args: &[Expr]) -> CalcResult<Value> {
    Ok(Value::Bool(false))
}

fn is_null(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    Ok(Value::Bool(args[0].evaluate(engine)?.is_null()))
}

/// Null and empty text count as "no value".
fn has_value(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let value = args[0].evaluate(engine)?;
    let has = match &value {
        Value::Null => false,
        Value::Text(s) => !s.trim().is_empty(),
        _ => true,
    };
    Ok(Value::Bool(has))
}

fn is_numeric(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let value = args[0].evaluate(engine)?;
    let numeric = match &value {
        Value::Number(_) => true,
        Value::Text(s) => engine.locale().parse_number(s.trim()).is_some(),
        _ => false,
    };
    Ok(Value::Bool(numeric))
}

/// Substring test for text, membership test for collections.
fn contains(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let haystack = args[0].evaluate(engine)?;
    let needle = args[1].evaluate(engine)?;
    let found = match &haystack {
        Value::Text(s) => s.to_lowercase().contains(&needle.to_text().to_lowercase()),
        _ => functions::collect_values(engine, &args[..1])?
            .iter()
            .any(|v| v.is_same(&needle)),
    };
    Ok(Value::Bool(found))
}

fn list_count(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let value = args[0].evaluate(engine)?;
    let count = match &value {
        Value::Null => 0,
        Value::List(items) => items.len(),
        Value::Object(o) => {
            let items = o.borrow().items();
            items.map(|i| i.len()).unwrap_or(1)
        }
        _ => 1,
    };
    Ok(Value::Number(count as f64))
}
