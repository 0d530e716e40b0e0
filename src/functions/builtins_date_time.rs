//! Date builtins. Dates coerce from text via the engine locale's format
//! list, and from numbers via the day-serial scheme.

use chrono::{Datelike, NaiveDate};

use crate::ast::Expr;
use crate::error::CalcResult;
use crate::functions::{self, FunctionTable};
use crate::value::{date_to_serial, Value};
use crate::Engine;

pub(crate) fn register(table: &mut FunctionTable) {
    functions::add(table, "DAYS", 2, 2, days);
    functions::add_volatile(table, "NOW", 0, 0, now);
    functions::add(table, "YEARS", 2, 2, years);
    functions::add(table, "NUMBEROFLEAPDAYS", 2, 2, leap_days);
    functions::add(table, "TOSHORTDATESTRING", 1, 1, to_short_date_string);
}

/// DAYS(end, start): signed day count, fractions included.
fn days(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let end = functions::eval_datetime(engine, &args[0])?;
    let start = functions::eval_datetime(engine, &args[1])?;
    Ok(Value::Number(date_to_serial(end) - date_to_serial(start)))
}

fn now(_engine: &Engine, _args: &[Expr]) -> CalcResult<Value> {
    Ok(Value::Date(chrono::Local::now().naive_local()))
}

/// YEARS(start, end): completed years between two dates.
fn years(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let start = functions::eval_datetime(engine, &args[0])?;
    let end = functions::eval_datetime(engine, &args[1])?;
    let mut span = end.year() - start.year();
    if (end.month(), end.day()) < (start.month(), start.day()) {
        span -= 1;
    }
    Ok(Value::Number(span as f64))
}

/// Number of February 29ths that fall within the inclusive date range.
fn leap_days(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let a = functions::eval_datetime(engine, &args[0])?;
    let b = functions::eval_datetime(engine, &args[1])?;
    let (start, end) = if a <= b { (a, b) } else { (b, a) };
    let mut count = 0;
    for year in start.year()..=end.year() {
        if let Some(feb29) = NaiveDate::from_ymd_opt(year, 2, 29) {
            let feb29 = feb29.and_hms_opt(0, 0, 0).unwrap_or_default();
            if feb29 >= start && feb29 <= end {
                count += 1;
            }
        }
    }
    Ok(Value::Number(f64::from(count)))
}

fn to_short_date_string(engine: &Engine, args: &[Expr]) -> CalcResult<Value> {
    let date = functions::eval_datetime(engine, &args[0])?;
    // First date-only format in the locale list is the short form.
    let format = engine
        .locale()
        .date_formats
        .iter()
        .find(|f| !f.contains("%H"))
        .map(String::as_str)
        .unwrap_or("%Y-%m-%d");
    Ok(Value::Text(date.format(format).to_string()))
}
