//! Aggregates over flattened argument streams.

use crate::ast::Expr;
use crate::error::CalcResult;
use crate::functions::{self, FunctionTable, VAR_ARGS};
use crate::value::Value;
use crate::Engine;

pub(crate) fn register(table: &mut FunctionTable) {
    functions::add(table, "AVERAGE", 1, VAR_ARGS, average);
    functions::add(table, "COUNT", 1, VAR_ARGS, count);
    functions::add(table, "COUNTA", 1, VAR_ARGS, count_a);
    functions::add(table, "MAX", 1, VAR_ARGS, max);
    functions::add(table, "MIN", 1, VAR_ARGS, min);
}

/// Running tally over the numeric entries of a value stream. Nulls and
/// non-numeric text are skipped, matching how aggregates treat sparse data.
#[derive(Debug, Default)]
struct Tally {
    sum: f64,
    count: usize,
    min: f64,
    max: f64,
}

impl Tally {
    fn add(&mut self, engine: &Engine, value: &Value) {
        let Ok(n) = value.to_number_with(engine.locale()) else {
            return;
        };
        if value.is_null() {
            return;
        }
        if self.count == 0 {
            self.min = n;
            self.max = n;
        } else {
            self.min = self.min.min(n);
            self.max = self.max.max(n);
        }
        self.sum += n;
        self.count += 1;
    }

    fn collect(engine: &Engine, args: &[Expr]) -> CalcResult<Tally> {
        let mut tally = Tally::default();
        for value in functions::collect_values(engine, args)? {
            tally.add(engine, &value);
        }
        Ok(tally)
    }
}

fn average(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let tally = Tally::collect(engine, args)?;
    if tally.count == 0 {
        Ok(Value::Number(0.0))
    } else {
        Ok(Value::Number(tally.sum / tally.count as f64))
    }
}

fn count(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let tally = Tally::collect(engine, args)?;
    Ok(Value::Number(tally.count as f64))
}

fn count_a(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let non_null = functions::collect_values(engine, args)?
        .iter()
        .filter(|v| !v.is_null())
        .count();
    Ok(Value::Number(non_null as f64))
}

fn max(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let tally = Tally::collect(engine, args)?;
    Ok(Value::Number(if tally.count == 0 { 0.0 } else { tally.max }))
}

fn min(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let tally = Tally::collect(engine, args)?;
    Ok(Value::Number(if tally.count == 0 { 0.0 } else { tally.min }))
}
