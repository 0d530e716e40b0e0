//! Per-item evaluation against a derived engine, plus the builtins exposing
//! it (EVALEXPRIF, EXECUTEEXPR, SWITCH, SUMEXPRIF) and the object/utility
//! functions that share its machinery.
//!
//! The derived engine shares the caller's variable and function tables, so
//! statement bodies can accumulate into caller variables; everything else
//! (statement registry, graph, data context) is private to the call.

use crate::ast::Expr;
use crate::engine::{CHANGED, THIS};
use crate::error::{CalcError, CalcResult};
use crate::functions::{self, FunctionDef, FunctionTable, VAR_ARGS};
use crate::host;
use crate::value::Value;
use crate::Engine;

pub(crate) fn register(table: &mut FunctionTable) {
    functions::add_volatile(table, "EVALEXPRIF", 3, 3, eval_expr_if);
    functions::add_volatile(table, "EXECUTEEXPR", 2, 2, execute_expr);
    functions::add_volatile(table, "SWITCH", 3, VAR_ARGS, switch);
    functions::add(table, "LSWITCH", 3, VAR_ARGS, lswitch);
    functions::add_volatile(table, "SUMEXPRIF", 3, 3, sum_expr_if);
    functions::add_volatile(table, "REGISTERFUNCTION", 3, 3, register_function);
    functions::add_volatile(table, "GETPROPERTY", 2, 2, get_property);
    functions::add_volatile(table, "SETPROPERTY", 3, 3, set_property);
    functions::add(table, "ELEMENTAT", 2, 5, element_at);
    functions::add_volatile(table, "THROWEX", 1, VAR_ARGS, throw_ex);
}

/// Expands a source value into the ordered item sequence the protocol walks:
/// scalars become a single item, host mappings become key/value pairs.
pub(crate) fn materialize_collection(value: &Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::List(items) => items.clone(),
        Value::Object(o) => {
            let items = o.borrow().items();
            items.unwrap_or_else(|| vec![value.clone()])
        }
        scalar => vec![scalar.clone()],
    }
}

pub(crate) struct SubContextOutcome {
    pub result: Value,
    /// Items the predicate accepted.
    pub matched: usize,
}

/// Runs `statements` once per item of `source` for which `criteria` holds.
///
/// Statements are parsed on the first item only; later items reuse the
/// parsed trees and just re-evaluate them. Accepted items are appended to
/// the `_changed` accumulator. The prior `this`/`_changed` bindings are
/// restored afterwards and names introduced by the call are discarded.
pub(crate) fn eval_conditional(
    engine: &Engine,
    source: Value,
    criteria: &str,
    statements: &str,
) -> CalcResult<SubContextOutcome> {
    engine.enter_call()?;
    let outcome = eval_conditional_inner(engine, source, criteria, statements);
    engine.exit_call();
    outcome
}

fn eval_conditional_inner(
    engine: &Engine,
    source: Value,
    criteria: &str,
    statements: &str,
) -> CalcResult<SubContextOutcome> {
    let items = materialize_collection(&source);

    let mut sub = engine.derive_subcontext();
    let prior_names = sub.variable_names();
    let saved_this = sub.get_variable(THIS);
    let saved_changed = sub.get_variable(CHANGED);
    sub.set_variable(CHANGED, Value::List(Vec::new()));

    let mut criteria_expr: Option<Expr> = None;
    let mut matched = 0usize;

    let run_result = (|| -> CalcResult<()> {
        for item in &items {
            if item.is_null() {
                continue;
            }
            sub.set_data_context(item.clone());
            if criteria_expr.is_none() {
                sub.load_deferred(statements)?;
                criteria_expr = Some(sub.parse(criteria)?);
            }
            let pass = match &criteria_expr {
                Some(expr) => expr.evaluate(&sub)?.to_bool()?,
                None => false,
            };
            if !pass {
                continue;
            }
            matched += 1;
            for (name, calc) in sub.calculations() {
                let new = calc.expr.evaluate(&sub)?;
                let current = sub.get_value(name).unwrap_or(Value::Null);
                if !new.is_same(&current) {
                    sub.store_result(name, calc, new)?;
                }
            }
            if let Some(Value::List(mut changed)) = sub.get_variable(CHANGED) {
                changed.push(item.clone());
                sub.set_variable(CHANGED, Value::List(changed));
            }
        }
        Ok(())
    })();

    let changed_list = sub.get_variable(CHANGED).unwrap_or(Value::List(Vec::new()));

    // Restore the caller's bindings before computing the result so an error
    // along the way cannot leak iteration state.
    match saved_this {
        Some(v) => sub.set_variable(THIS, v),
        None => {
            sub.remove_variable(THIS);
        }
    }
    match saved_changed {
        Some(v) => sub.set_variable(CHANGED, v),
        None => {
            sub.remove_variable(CHANGED);
        }
    }

    run_result?;

    let result = match pick_return_name(&sub, &prior_names, true) {
        Some(name) if name == CHANGED => changed_list,
        Some(name) => {
            if sub.has_variable(&name) {
                sub.get_variable(&name).unwrap_or(Value::Null)
            } else {
                // Property results read off the last item's context.
                sub.get_value(&name).unwrap_or(Value::Null)
            }
        }
        None => Value::Null,
    };

    discard_new_variables(&sub, &prior_names);

    Ok(SubContextOutcome { result, matched })
}

/// Return-name priority: explicit `@` name, then the changed-items list when
/// that policy is on, then the last named calculation, then the last
/// variable the call introduced. Dynamic function calls track no changed
/// items and pass `use_changed: false`.
fn pick_return_name(sub: &Engine, prior_names: &[String], use_changed: bool) -> Option<String> {
    if let Some(name) = sub.return_property_name() {
        return Some(name.to_string());
    }
    if use_changed && sub.return_changed_collection() {
        return Some(CHANGED.to_string());
    }
    let last_calc = sub
        .calculations()
        .iter()
        .filter(|(_, c)| !c.is_anonymous)
        .map(|(n, _)| n.clone())
        .last();
    if last_calc.is_some() {
        return last_calc;
    }
    sub.variable_names()
        .into_iter()
        .filter(|n| !prior_names.contains(n))
        .last()
}

fn discard_new_variables(sub: &Engine, prior_names: &[String]) {
    for name in sub.variable_names() {
        if !prior_names.contains(&name) {
            sub.remove_variable(&name);
        }
    }
}

/// Runtime-registered function bodies execute as a statement batch against
/// the caller's data context, with parameters bound as shared variables.
/// Saving and restoring shadowed parameter values keeps recursion safe.
pub(crate) fn call_dynamic(
    engine: &Engine,
    name: &str,
    params: &[String],
    code: &str,
    args: &[Expr],
) -> CalcResult<Value> {
    if args.len() != params.len() {
        return Err(CalcError::Arity {
            name: name.to_string(),
            min: params.len(),
            max: params.len(),
            got: args.len(),
        });
    }
    engine.enter_call()?;
    let result = call_dynamic_inner(engine, params, code, args);
    engine.exit_call();
    result
}

fn call_dynamic_inner(
    engine: &Engine,
    params: &[String],
    code: &str,
    args: &[Expr],
) -> CalcResult<Value> {
    let mut bound: Vec<Value> = Vec::with_capacity(args.len());
    for arg in args {
        bound.push(arg.evaluate(engine)?);
    }

    let saved: Vec<(String, Option<Value>)> = params
        .iter()
        .map(|p| (p.clone(), engine.get_variable(p)))
        .collect();
    for (param, value) in params.iter().zip(bound) {
        engine.set_variable(param, value);
    }

    let mut sub = engine.derive_subcontext();
    let prior_names = sub.variable_names();
    let saved_this = sub.get_variable(THIS);
    if let Some(context) = engine.data_context() {
        sub.set_data_context(context);
    }

    let run = (|| -> CalcResult<Value> {
        sub.load_calculations(code)?;
        // Variable statements were initialized by the load; named property
        // calculations still need one evaluation pass.
        for (calc_name, calc) in sub.calculations() {
            if calc.is_variable || calc.is_anonymous {
                continue;
            }
            let value = calc.expr.evaluate(&sub)?;
            sub.store_result(calc_name, calc, value)?;
        }
        let result = match pick_return_name(&sub, &prior_names, false) {
            Some(name) if sub.has_variable(&name) => {
                sub.get_variable(&name).unwrap_or(Value::Null)
            }
            Some(name) => sub.get_value(&name).unwrap_or(Value::Null),
            None => Value::Null,
        };
        Ok(result)
    })();

    match saved_this {
        Some(v) => sub.set_variable(THIS, v),
        None => {
            sub.remove_variable(THIS);
        }
    }
    discard_new_variables(&sub, &prior_names);
    for (param, value) in saved {
        match value {
            Some(v) => engine.set_variable(&param, v),
            None => {
                engine.remove_variable(&param);
            }
        }
    }
    run
}

// Builtins.

fn eval_expr_if(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let source = args[0].evaluate(engine)?;
    let criteria = functions::eval_text(engine, &args[1])?;
    let statements = functions::eval_text(engine, &args[2])?;
    Ok(eval_conditional(engine, source, &criteria, &statements)?.result)
}

fn execute_expr(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let source = args[0].evaluate(engine)?;
    let statements = functions::eval_text(engine, &args[1])?;
    Ok(eval_conditional(engine, source, "true", &statements)?.result)
}

/// SWITCH(source, criteria1, statements1, ..., [default_statements]):
/// the first criteria that accepts at least one item wins.
fn switch(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let source = args[0].evaluate(engine)?;
    let mut i = 1;
    while i + 1 < args.len() {
        let criteria = functions::eval_text(engine, &args[i])?;
        let statements = functions::eval_text(engine, &args[i + 1])?;
        let outcome = eval_conditional(engine, source.clone(), &criteria, &statements)?;
        if outcome.matched > 0 {
            return Ok(outcome.result);
        }
        i += 2;
    }
    if i < args.len() {
        let statements = functions::eval_text(engine, &args[i])?;
        return Ok(eval_conditional(engine, source, "true", &statements)?.result);
    }
    Ok(Value::Null)
}

/// LSWITCH(value, case1, result1, ..., [default]): literal dispatch on the
/// textual form of `value`; only the selected result is evaluated.
fn lswitch(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let subject = args[0].evaluate(engine)?.to_text();
    let mut i = 1;
    while i + 1 < args.len() {
        let case = args[i].evaluate(engine)?.to_text();
        if subject.eq_ignore_ascii_case(&case) {
            return args[i + 1].evaluate(engine);
        }
        i += 2;
    }
    if i < args.len() {
        return args[i].evaluate(engine);
    }
    Ok(Value::Null)
}

fn sum_expr_if(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let source = args[0].evaluate(engine)?;
    let criteria = functions::eval_text(engine, &args[1])?;
    let value_text = functions::eval_text(engine, &args[2])?;

    engine.enter_call()?;
    let result = (|| -> CalcResult<Value> {
        let items = materialize_collection(&source);
        let mut sub = engine.derive_subcontext();
        let saved_this = sub.get_variable(THIS);
        let mut criteria_expr: Option<Expr> = None;
        let mut value_expr: Option<Expr> = None;
        let mut total = 0f64;
        for item in &items {
            if item.is_null() {
                continue;
            }
            sub.set_data_context(item.clone());
            if criteria_expr.is_none() {
                criteria_expr = Some(sub.parse(&criteria)?);
                value_expr = Some(sub.parse(&value_text)?);
            }
            let pass = match &criteria_expr {
                Some(expr) => expr.evaluate(&sub)?.to_bool()?,
                None => false,
            };
            if !pass {
                continue;
            }
            if let Some(expr) = &value_expr {
                total += expr.evaluate(&sub)?.to_number_with(sub.locale())?;
            }
        }
        match saved_this {
            Some(v) => sub.set_variable(THIS, v),
            None => {
                sub.remove_variable(THIS);
            }
        }
        Ok(Value::Number(total))
    })();
    engine.exit_call();
    result
}

fn register_function(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let name = functions::eval_text(engine, &args[0])?;
    let params_text = functions::eval_text(engine, &args[1])?;
    let code = functions::eval_text(engine, &args[2])?;
    let params: Vec<String> = params_text
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    engine.register_def(FunctionDef::dynamic(&name, params, code));
    Ok(Value::Bool(true))
}

fn get_property(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let target = args[0].evaluate(engine)?;
    let path = functions::eval_text(engine, &args[1])?;
    host::get_path(&target, &path)
}

fn set_property(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let target = args[0].evaluate(engine)?;
    let path = functions::eval_text(engine, &args[1])?;
    let value = args[2].evaluate(engine)?;
    host::set_path(&target, &path, value.clone())?;
    Ok(value)
}

/// ELEMENTAT(collection, index) or
/// ELEMENTAT(collection, property, value[, property2, value2]): positional
/// pick, or the first item whose properties match the given values.
fn element_at(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let source = args[0].evaluate(engine)?;
    let items = materialize_collection(&source);

    if args.len() == 2 {
        let selector = args[1].evaluate(engine)?;
        if !matches!(selector, Value::Text(_)) {
            let idx = selector.to_number_with(engine.locale())? as usize;
            return items
                .get(idx)
                .cloned()
                .ok_or_else(|| CalcError::eval(format!("index {idx} out of range")));
        }
    }

    if args.len() < 3 || args.len() % 2 == 0 {
        return Err(CalcError::eval(
            "ELEMENTAT needs an index, or property/value pairs",
        ));
    }
    let mut pairs = Vec::new();
    let mut i = 1;
    while i + 1 < args.len() {
        let property = functions::eval_text(engine, &args[i])?;
        let value = args[i + 1].evaluate(engine)?;
        pairs.push((property, value));
        i += 2;
    }
    for item in items {
        let all_match = pairs.iter().all(|(property, expected)| {
            host::get_path(&item, property)
                .map(|actual| actual.is_same(expected) || loose_eq(&actual, expected))
                .unwrap_or(false)
        });
        if all_match {
            return Ok(item);
        }
    }
    Ok(Value::Null)
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a.to_number(), b.to_number()) {
        (Ok(x), Ok(y)) => x == y,
        _ => a.to_text().eq_ignore_ascii_case(&b.to_text()),
    }
}

/// THROWEX(message, args...): raises an evaluation failure, substituting
/// `{0}`, `{1}`, ... placeholders with the extra arguments.
fn throw_ex(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let mut message = functions::eval_text(engine, &args[0])?;
    for (i, arg) in args[1..].iter().enumerate() {
        let placeholder = format!("{{{i}}}");
        if message.contains(&placeholder) {
            let replacement = arg.evaluate(engine)?.to_text();
            message = message.replace(&placeholder, &replacement);
        }
    }
    Err(CalcError::eval(message))
}
