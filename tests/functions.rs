//! Builtin function packs: logical, math, text, statistical, date.

use calc_engine::{CalcError, Engine, JsonHost, Value};
use pretty_assertions::assert_eq;
use serde_json::json;

fn num(engine: &Engine, text: &str) -> f64 {
    match engine.evaluate(text) {
        Ok(Value::Number(n)) => n,
        other => panic!("expected a number from '{text}', got {other:?}"),
    }
}

fn text(engine: &Engine, text: &str) -> String {
    match engine.evaluate(text) {
        Ok(Value::Text(s)) => s,
        other => panic!("expected text from '{text}', got {other:?}"),
    }
}

fn close(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-9, "{a} != {b}");
}

fn collection_engine() -> Engine {
    Engine::with_data_context(JsonHost::value(json!({
        "Nums": [1, 2, 3],
        "Tags": ["alpha", "beta"],
        "Vals": [10, 20],
        "M": null
    })))
}

#[test]
fn conditional_dispatch() {
    let engine = Engine::new();
    assert_eq!(num(&engine, "IF(5 > 4, 10, 20)"), 10.0);
    assert_eq!(num(&engine, "IF(5 > 14, 10, 20)"), 20.0);
    assert_eq!(
        engine.evaluate("IF(FALSE(), 1)").unwrap(),
        Value::Bool(false)
    );
}

#[test]
fn boolean_connectives_short_circuit() {
    let engine = Engine::new();
    assert_eq!(
        engine.evaluate("AND(TRUE(), FALSE())").unwrap(),
        Value::Bool(false)
    );
    assert_eq!(
        engine.evaluate("OR(TRUE(), FALSE())").unwrap(),
        Value::Bool(true)
    );
    // The second argument would fail if evaluated; short-circuiting skips it.
    assert_eq!(
        engine.evaluate("OR(TRUE(), THROWEX('boom'))").unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        engine.evaluate("AND(FALSE(), THROWEX('boom'))").unwrap(),
        Value::Bool(false)
    );
}

#[test]
fn inspection_functions() {
    let engine = collection_engine();
    assert_eq!(engine.evaluate("ISNULL(M)").unwrap(), Value::Bool(true));
    assert_eq!(engine.evaluate("HASVALUE('')").unwrap(), Value::Bool(false));
    assert_eq!(engine.evaluate("HASVALUE(0)").unwrap(), Value::Bool(true));
    assert_eq!(
        engine.evaluate("ISNUMERIC('1.5')").unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        engine.evaluate("ISNUMERIC('abc')").unwrap(),
        Value::Bool(false)
    );
    assert_eq!(num(&engine, "LISTCOUNT(Nums)"), 3.0);
    assert_eq!(
        engine.evaluate("CONTAINS(Nums, 2)").unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        engine.evaluate("CONTAINS('hello', 'ELL')").unwrap(),
        Value::Bool(true)
    );
    assert_eq!(num(&engine, "NULLVALUE(M, 5)"), 5.0);
    assert_eq!(num(&engine, "NULLVALUE(2, 5)"), 2.0);
}

#[test]
fn math_pack() {
    let engine = Engine::new();
    assert_eq!(num(&engine, "ABS(-2)"), 2.0);
    assert_eq!(num(&engine, "SQRT(9)"), 3.0);
    assert_eq!(num(&engine, "POWER(2, 10)"), 1024.0);
    assert_eq!(num(&engine, "FLOOR(2.7)"), 2.0);
    assert_eq!(num(&engine, "CEILING(2.1)"), 3.0);
    assert_eq!(num(&engine, "INT(-1.5)"), -2.0);
    assert_eq!(num(&engine, "TRUNC(-1.5)"), -1.0);
    assert_eq!(num(&engine, "SIGN(-9)"), -1.0);
    assert_eq!(num(&engine, "ROUND(2.5)"), 3.0);
    assert_eq!(num(&engine, "ROUND(2.344, 2)"), 2.34);
    close(num(&engine, "LOG(100)"), 2.0);
    close(num(&engine, "LOG(8, 2)"), 3.0);
    close(num(&engine, "LN(EXP(1))"), 1.0);
    close(num(&engine, "LOG10(1000)"), 3.0);
    close(num(&engine, "SIN(0)"), 0.0);
    close(num(&engine, "COS(0)"), 1.0);
    close(num(&engine, "ATAN2(1, 1) * 4"), std::f64::consts::PI);
    close(num(&engine, "PI()"), std::f64::consts::PI);
}

#[test]
fn seeded_random_is_reproducible() {
    let engine = Engine::new();
    engine.seed_random(42);
    let first = num(&engine, "RAND()");
    let second = num(&engine, "RAND()");
    assert_ne!(first, second);
    engine.seed_random(42);
    assert_eq!(num(&engine, "RAND()"), first);
    for _ in 0..50 {
        let n = num(&engine, "RANDBETWEEN(1, 6)");
        assert!((1.0..=6.0).contains(&n));
        assert_eq!(n.fract(), 0.0);
    }
}

#[test]
fn sum_and_sumif_over_collections() {
    let engine = collection_engine();
    assert_eq!(num(&engine, "SUM(Nums)"), 6.0);
    assert_eq!(num(&engine, "SUM(Nums, 4)"), 10.0);
    assert_eq!(num(&engine, "SUMIF(Nums, '>1')"), 5.0);
    assert_eq!(num(&engine, "SUMIF(Nums, '<>2')"), 4.0);
    assert_eq!(num(&engine, "SUMIF(Nums, 2)"), 2.0);
    // Wildcard criteria select by tag, summing the parallel values.
    assert_eq!(num(&engine, "SUMIF(Tags, 'a*', Vals)"), 10.0);
}

#[test]
fn text_pack() {
    let engine = Engine::new();
    assert_eq!(text(&engine, "LEFT('hello', 2)"), "he");
    assert_eq!(text(&engine, "RIGHT('hello', 2)"), "lo");
    assert_eq!(text(&engine, "MID('hello', 2, 3)"), "ell");
    assert_eq!(num(&engine, "LEN('héllo')"), 5.0);
    assert_eq!(text(&engine, "UPPER('abc')"), "ABC");
    assert_eq!(text(&engine, "LOWER('ABC')"), "abc");
    assert_eq!(text(&engine, "PROPER('john smith')"), "John Smith");
    assert_eq!(text(&engine, "REPT('ab', 3)"), "ababab");
    assert_eq!(text(&engine, "TRIM('  x  ')"), "x");
    assert_eq!(text(&engine, "CHAR(65)"), "A");
    assert_eq!(text(&engine, "CONCATENATE('a', 1, 'b')"), "a1b");
    assert_eq!(text(&engine, "SUBSTITUTE('aaa', 'a', 'b')"), "bbb");
    assert_eq!(text(&engine, "SUBSTITUTE('aaa', 'a', 'b', 2)"), "aba");
    assert_eq!(num(&engine, "VALUE('2.5')"), 2.5);
}

#[test]
fn statistical_pack() {
    let engine = collection_engine();
    assert_eq!(num(&engine, "AVERAGE(Nums)"), 2.0);
    assert_eq!(num(&engine, "AVERAGE(1, 2, 3, 4)"), 2.5);
    assert_eq!(num(&engine, "COUNT(1, 'x', 2)"), 2.0);
    assert_eq!(num(&engine, "COUNTA(M, 1, 'x')"), 2.0);
    assert_eq!(num(&engine, "MAX(Nums)"), 3.0);
    assert_eq!(num(&engine, "MIN(Nums, 0)"), 0.0);
}

#[test]
fn date_pack() {
    let engine = Engine::new();
    assert_eq!(num(&engine, "DAYS(#2024-03-01#, #2024-02-01#)"), 29.0);
    assert_eq!(num(&engine, "DAYS(#2024-02-01#, #2024-03-01#)"), -29.0);
    assert_eq!(num(&engine, "YEARS(#2000-06-15#, #2020-06-14#)"), 19.0);
    assert_eq!(num(&engine, "YEARS(#2000-06-15#, #2020-06-15#)"), 20.0);
    assert_eq!(
        num(&engine, "NUMBEROFLEAPDAYS(#2000-01-01#, #2001-01-01#)"),
        1.0
    );
    assert_eq!(
        num(&engine, "NUMBEROFLEAPDAYS(#2001-01-01#, #2003-12-31#)"),
        0.0
    );
    assert_eq!(
        text(&engine, "TOSHORTDATESTRING(#2024-01-30#)"),
        "01/30/2024"
    );
}

#[test]
fn lswitch_dispatches_on_literal_cases() {
    let engine = Engine::new();
    assert_eq!(num(&engine, "LSWITCH('b', 'a', 1, 'b', 2, 3)"), 2.0);
    assert_eq!(num(&engine, "LSWITCH('z', 'a', 1, 'b', 2, 3)"), 3.0);
    // Only the selected branch evaluates.
    assert_eq!(
        num(&engine, "LSWITCH('a', 'a', 1, 'b', THROWEX('boom'))"),
        1.0
    );
}

#[test]
fn throwex_formats_placeholders() {
    let engine = Engine::new();
    match engine.evaluate("THROWEX('bad {0} of {1}', 7, 'ten')") {
        Err(CalcError::Eval(message)) => assert_eq!(message, "bad 7 of ten"),
        other => panic!("expected an evaluation failure, got {other:?}"),
    }
}
