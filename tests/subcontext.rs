//! Per-item evaluation: EVALEXPRIF, EXECUTEEXPR, SWITCH, SUMEXPRIF, dynamic
//! functions, and the object utilities built on the same machinery.

use calc_engine::{CalcError, Engine, JsonHost, Value};
use pretty_assertions::assert_eq;
use serde_json::json;

fn items_engine() -> Engine {
    Engine::with_data_context(JsonHost::value(json!({
        "Items": [
            {"Amount": 1, "Sel": true},
            {"Amount": 2, "Sel": false}
        ]
    })))
}

#[test]
fn conditional_accumulation_over_matching_items() {
    let mut engine = items_engine();
    engine.set_return_changed_collection(false);
    let total = engine
        .evaluate("EVALEXPRIF(Items, 'Sel', {*_t = _t + Amount})")
        .unwrap();
    assert_eq!(total, Value::Number(1.0));
    // Names introduced by the body do not leak into the caller.
    assert_eq!(engine.get_variable("_t"), None);
}

#[test]
fn changed_items_collection_is_the_default_result() {
    let engine = items_engine();
    let changed = engine
        .evaluate("EVALEXPRIF(Items, 'Sel', {*_t = _t + Amount})")
        .unwrap();
    match changed {
        Value::List(items) => assert_eq!(items.len(), 1),
        other => panic!("expected the changed-items list, got {other:?}"),
    }
}

#[test]
fn preexisting_body_variables_reinitialize_by_default() {
    let engine = items_engine();
    engine.set_variable("_t", Value::Number(100.0));
    let total = engine
        .evaluate("EVALEXPRIF(Items, 'Sel', {@*_t = _t + Amount})")
        .unwrap();
    assert_eq!(total, Value::Number(1.0));
}

#[test]
fn reinitialization_can_be_disabled() {
    let mut engine = items_engine();
    engine.set_reinit_subcontext_variables(false);
    engine.set_variable("_t", Value::Number(100.0));
    let total = engine
        .evaluate("EVALEXPRIF(Items, 'Sel', {@*_t = _t + Amount})")
        .unwrap();
    assert_eq!(total, Value::Number(101.0));
}

#[test]
fn explicit_return_marker_wins() {
    let engine = items_engine();
    let v = engine
        .evaluate("EVALEXPRIF(Items, 'Sel', {*_t = _t + Amount; @*doubled = _t * 2})")
        .unwrap();
    assert_eq!(v, Value::Number(2.0));
}

#[test]
fn execute_expr_visits_every_item() {
    let mut engine = items_engine();
    engine.set_return_changed_collection(false);
    let count = engine
        .evaluate("EXECUTEEXPR(Items, {*seen = seen + 1})")
        .unwrap();
    assert_eq!(count, Value::Number(2.0));
}

#[test]
fn execute_expr_writes_back_into_items() {
    let ctx = JsonHost::value(json!({"Items": [{"N": 1, "D": 0}, {"N": 2, "D": 0}]}));
    let engine = Engine::with_data_context(ctx.clone());
    engine
        .evaluate("EXECUTEEXPR(Items, {D = N * 2})")
        .unwrap();
    let first = engine.evaluate("GETPROPERTY(ELEMENTAT(Items, 0), 'D')").unwrap();
    let second = engine.evaluate("GETPROPERTY(ELEMENTAT(Items, 1), 'D')").unwrap();
    assert_eq!(first, Value::Number(2.0));
    assert_eq!(second, Value::Number(4.0));
}

#[test]
fn switch_takes_the_first_matching_branch() {
    let mut engine = items_engine();
    engine.set_return_changed_collection(false);
    let v = engine
        .evaluate("SWITCH(Items, 'Amount > 5', {*r = 'big'}, 'Amount > 0', {*r = 'small'})")
        .unwrap();
    assert_eq!(v, Value::Text("small".into()));
}

#[test]
fn switch_falls_back_to_the_default_branch() {
    let mut engine = items_engine();
    engine.set_return_changed_collection(false);
    let v = engine
        .evaluate("SWITCH(Items, 'Amount > 5', {*r = 'big'}, {*r = 'none'})")
        .unwrap();
    assert_eq!(v, Value::Text("none".into()));
}

#[test]
fn sum_expr_if_sums_a_computed_value() {
    let engine = items_engine();
    let v = engine
        .evaluate("SUMEXPRIF(Items, 'Sel', 'Amount')")
        .unwrap();
    assert_eq!(v, Value::Number(1.0));
    let v = engine
        .evaluate("SUMEXPRIF(Items, 'Amount > 0', 'Amount * 10')")
        .unwrap();
    assert_eq!(v, Value::Number(30.0));
}

#[test]
fn scalars_evaluate_as_single_item_collections() {
    let mut engine = Engine::new();
    engine.set_return_changed_collection(false);
    let v = engine
        .evaluate("EVALEXPRIF(5, 'this > 3', {*r = this * 2})")
        .unwrap();
    assert_eq!(v, Value::Number(10.0));
    let v = engine
        .evaluate("EVALEXPRIF(2, 'this > 3', {*r = this * 2})")
        .unwrap();
    assert_eq!(v, Value::Null);
}

#[test]
fn dynamic_functions_are_callable_after_registration() {
    let engine = Engine::new();
    engine
        .evaluate("REGISTERFUNCTION('DOUBLE', 'n', '*r = n * 2')")
        .unwrap();
    assert_eq!(engine.evaluate("DOUBLE(4)").unwrap(), Value::Number(8.0));
    assert_eq!(
        engine.evaluate("DOUBLE(DOUBLE(3))").unwrap(),
        Value::Number(12.0)
    );
    // Declared arity is enforced at parse time.
    assert!(matches!(
        engine.evaluate("DOUBLE(1, 2)"),
        Err(CalcError::Arity { .. })
    ));
}

#[test]
fn dynamic_functions_support_recursion() {
    let engine = Engine::new();
    engine
        .evaluate("REGISTERFUNCTION('FACT', 'n', '*r = IF(n <= 1, 1, n * FACT(n - 1))')")
        .unwrap();
    assert_eq!(engine.evaluate("FACT(5)").unwrap(), Value::Number(120.0));
}

#[test]
fn runaway_recursion_is_cut_off() {
    let engine = Engine::new();
    engine
        .evaluate("REGISTERFUNCTION('LOOP', 'n', '*r = LOOP(n)')")
        .unwrap();
    assert!(engine.evaluate("LOOP(1)").is_err());
}

#[test]
fn property_access_utilities() {
    let ctx = JsonHost::value(json!({"Order": {"Total": 10}}));
    let engine = Engine::with_data_context(ctx.clone());
    assert_eq!(
        engine.evaluate("GETPROPERTY(this, 'Order.Total')").unwrap(),
        Value::Number(10.0)
    );
    assert_eq!(
        engine
            .evaluate("SETPROPERTY(this, 'Order.Total', 42)")
            .unwrap(),
        Value::Number(42.0)
    );
    assert_eq!(
        calc_engine::get_path(&ctx, "Order.Total").unwrap(),
        Value::Number(42.0)
    );
}

#[test]
fn element_at_by_index_and_by_property_match() {
    let engine = items_engine();
    assert_eq!(
        engine
            .evaluate("GETPROPERTY(ELEMENTAT(Items, 1), 'Amount')")
            .unwrap(),
        Value::Number(2.0)
    );
    assert_eq!(
        engine
            .evaluate("GETPROPERTY(ELEMENTAT(Items, 'Sel', TRUE()), 'Amount')")
            .unwrap(),
        Value::Number(1.0)
    );
    // No match yields null rather than an error.
    assert_eq!(
        engine.evaluate("ELEMENTAT(Items, 'Amount', 99)").unwrap(),
        Value::Null
    );
    assert!(engine.evaluate("ELEMENTAT(Items, 9)").is_err());
}
