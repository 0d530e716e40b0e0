//! Dependency wiring and incremental recalculation against a host context.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use calc_engine::{
    get_path, set_path, CalcError, CalcResult, Engine, HostObject, JsonHost, ObjectRef, Value,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn chain_engine() -> (Engine, Value) {
    let ctx = JsonHost::value(json!({"A": 1, "B": 0, "C": 0}));
    let mut engine = Engine::with_data_context(ctx.clone());
    engine.load_calculations("B = A + 1; C = B + 1;").unwrap();
    engine.recalculate_all().unwrap();
    (engine, ctx)
}

#[test]
fn recalculate_all_sweeps_in_load_order() {
    let (_engine, ctx) = chain_engine();
    assert_eq!(get_path(&ctx, "B").unwrap(), Value::Number(2.0));
    assert_eq!(get_path(&ctx, "C").unwrap(), Value::Number(3.0));
}

#[test]
fn recursive_notification_cascades() {
    let (engine, ctx) = chain_engine();
    engine.update("A", Value::Number(2.0)).unwrap();
    assert_eq!(get_path(&ctx, "B").unwrap(), Value::Number(3.0));
    assert_eq!(get_path(&ctx, "C").unwrap(), Value::Number(4.0));
}

#[test]
fn unchanged_values_short_circuit_the_walk() {
    let (engine, ctx) = chain_engine();
    // Poke C out from under the engine; an unchanged B must stop the walk
    // before it repairs C.
    set_path(&ctx, "C", Value::Number(99.0)).unwrap();
    engine.update("A", Value::Number(1.0)).unwrap();
    assert_eq!(get_path(&ctx, "B").unwrap(), Value::Number(2.0));
    assert_eq!(get_path(&ctx, "C").unwrap(), Value::Number(99.0));
}

#[test]
fn shallow_notification_stops_at_direct_dependents() {
    let (engine, ctx) = chain_engine();
    set_path(&ctx, "A", Value::Number(10.0)).unwrap();
    engine.notify("A", false).unwrap();
    assert_eq!(get_path(&ctx, "B").unwrap(), Value::Number(11.0));
    // C depends on B, not on A; a shallow notify never reaches it.
    assert_eq!(get_path(&ctx, "C").unwrap(), Value::Number(3.0));
}

#[test]
fn transitive_dependents_include_the_whole_chain() {
    let (engine, _ctx) = chain_engine();
    let all = engine.graph().all_dependents("A");
    for name in ["A", "B", "C"] {
        assert!(all.contains(&name.to_string()), "missing {name}");
    }
}

#[test]
fn cyclic_statement_batches_are_rejected() {
    let ctx = JsonHost::value(json!({"X": 1, "Y": 1}));
    let mut engine = Engine::with_data_context(ctx);
    let err = engine
        .load_calculations("X = Y + 1; Y = X + 1;")
        .unwrap_err();
    match err {
        CalcError::Statement { name, source, .. } => {
            assert_eq!(name, "Y");
            assert!(matches!(*source, CalcError::CircularReference { .. }));
        }
        other => panic!("expected a wrapped circular reference, got {other:?}"),
    }
    // The rejected edge left the graph as it was.
    assert_eq!(engine.graph().edge_count(), 1);
    assert!(engine.has_calculation("X"));
    assert!(!engine.has_calculation("Y"));
}

#[test]
fn variable_calculations_update_through_the_graph() {
    let ctx = JsonHost::value(json!({"Amount": 5}));
    let mut engine = Engine::with_data_context(ctx);
    engine.load_calculations("*total = Amount * 2;").unwrap();
    assert_eq!(engine.get_variable("total"), Some(Value::Number(10.0)));
    engine.update("Amount", Value::Number(7.0)).unwrap();
    assert_eq!(engine.get_variable("total"), Some(Value::Number(14.0)));
}

#[test]
fn removing_a_calculation_detaches_it() {
    let (mut engine, ctx) = chain_engine();
    assert!(engine.remove_calculation("B"));
    engine.update("A", Value::Number(5.0)).unwrap();
    // B no longer recomputes; C still reads B's stale value.
    assert_eq!(get_path(&ctx, "B").unwrap(), Value::Number(2.0));
}

#[test]
fn add_calculation_registers_a_single_statement() {
    let ctx = JsonHost::value(json!({"A": 2, "B": 0}));
    let mut engine = Engine::with_data_context(ctx.clone());
    engine.add_calculation("B", "A * A").unwrap();
    engine.notify("A", true).unwrap();
    assert_eq!(get_path(&ctx, "B").unwrap(), Value::Number(4.0));
}

/// Host that counts member writes, to observe write-back behavior.
struct CountingHost {
    a: f64,
    b: f64,
    writes: Rc<Cell<usize>>,
}

impl HostObject for CountingHost {
    fn type_name(&self) -> &str {
        "counting"
    }

    fn get_member(&self, name: &str) -> CalcResult<Value> {
        match name {
            "A" => Ok(Value::Number(self.a)),
            "B" => Ok(Value::Number(self.b)),
            _ => Err(CalcError::binding(name, self.type_name())),
        }
    }

    fn set_member(&mut self, name: &str, value: Value) -> CalcResult<()> {
        self.writes.set(self.writes.get() + 1);
        let n = value.to_number()?;
        match name {
            "A" => self.a = n,
            "B" => self.b = n,
            _ => return Err(CalcError::binding(name, self.type_name())),
        }
        Ok(())
    }
}

#[test]
fn recalculate_all_skips_unchanged_values() {
    let writes = Rc::new(Cell::new(0));
    let host = CountingHost {
        a: 1.0,
        b: 2.0,
        writes: Rc::clone(&writes),
    };
    let ctx: ObjectRef = Rc::new(RefCell::new(host));
    let mut engine = Engine::with_data_context(Value::Object(ctx));
    engine.add_calculation("B", "A + 1").unwrap();

    // B already holds A + 1; a sweep has nothing to write back.
    engine.recalculate_all().unwrap();
    assert_eq!(writes.get(), 0);

    engine.set_value("A", Value::Number(5.0)).unwrap();
    engine.recalculate_all().unwrap();
    assert_eq!(writes.get(), 2);
    engine.recalculate_all().unwrap();
    assert_eq!(writes.get(), 2);
}
