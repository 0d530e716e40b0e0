//! Function registry and calling contract.
//!
//! Every engine instance owns its own registry; there is no process-global
//! function table. Functions receive their arguments unevaluated so that
//! conditionals only evaluate the branch they take.

use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::ast::Expr;
use crate::error::CalcResult;
use crate::value::Value;
use crate::Engine;

mod builtins_date_time;
mod builtins_logical;
mod builtins_math;
mod builtins_statistical;
mod builtins_text;
pub(crate) mod subcontext;
pub(crate) mod wildcard;

/// Sentinel for an unbounded maximum argument count.
pub const VAR_ARGS: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Volatility {
    NonVolatile,
    /// Excluded from constant folding: the result may change between calls
    /// with identical arguments, or the call has side effects.
    Volatile,
}

pub type BuiltinFn = fn(&Engine, &[Expr]) -> CalcResult<Value>;

pub enum FunctionBody {
    Builtin(BuiltinFn),
    /// Registered at runtime via REGISTERFUNCTION: a parameter list plus an
    /// unparsed statement body, executed through the sub-context protocol.
    Dynamic { params: Vec<String>, code: String },
}

pub struct FunctionDef {
    pub name: String,
    pub min_args: usize,
    pub max_args: usize,
    pub volatility: Volatility,
    pub body: FunctionBody,
}

impl FunctionDef {
    pub fn builtin(
        name: &str,
        min_args: usize,
        max_args: usize,
        volatility: Volatility,
        implementation: BuiltinFn,
    ) -> Rc<FunctionDef> {
        Rc::new(FunctionDef {
            name: name.to_string(),
            min_args,
            max_args,
            volatility,
            body: FunctionBody::Builtin(implementation),
        })
    }

    pub fn dynamic(name: &str, params: Vec<String>, code: String) -> Rc<FunctionDef> {
        let arity = params.len();
        Rc::new(FunctionDef {
            name: name.to_string(),
            min_args: arity,
            max_args: arity,
            // Dynamic bodies can assign variables; never fold them.
            volatility: Volatility::Volatile,
            body: FunctionBody::Dynamic { params, code },
        })
    }

    pub fn is_foldable(&self) -> bool {
        self.volatility == Volatility::NonVolatile && matches!(self.body, FunctionBody::Builtin(_))
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .field("volatility", &self.volatility)
            .finish_non_exhaustive()
    }
}

pub(crate) type FunctionTable = AHashMap<String, Rc<FunctionDef>>;

pub(crate) fn invoke(engine: &Engine, def: &FunctionDef, args: &[Expr]) -> CalcResult<Value> {
    match &def.body {
        FunctionBody::Builtin(f) => f(engine, args),
        FunctionBody::Dynamic { params, code } => {
            subcontext::call_dynamic(engine, &def.name, params, code, args)
        }
    }
}

/// Installs the default builtin packs into a fresh function table.
pub(crate) fn register_defaults(table: &mut FunctionTable) {
    builtins_logical::register(table);
    builtins_math::register(table);
    builtins_text::register(table);
    builtins_statistical::register(table);
    builtins_date_time::register(table);
    subcontext::register(table);
}

pub(crate) fn add(
    table: &mut FunctionTable,
    name: &str,
    min_args: usize,
    max_args: usize,
    implementation: BuiltinFn,
) {
    table.insert(
        name.to_ascii_uppercase(),
        FunctionDef::builtin(name, min_args, max_args, Volatility::NonVolatile, implementation),
    );
}

pub(crate) fn add_volatile(
    table: &mut FunctionTable,
    name: &str,
    min_args: usize,
    max_args: usize,
    implementation: BuiltinFn,
) {
    table.insert(
        name.to_ascii_uppercase(),
        FunctionDef::builtin(name, min_args, max_args, Volatility::Volatile, implementation),
    );
}

// Argument evaluation helpers shared by the builtin packs.

pub(crate) fn eval_number(engine: &Engine, arg: &Expr) -> CalcResult<f64> {
    arg.evaluate(engine)?.to_number_with(engine.locale())
}

pub(crate) fn eval_text(engine: &Engine, arg: &Expr) -> CalcResult<String> {
    Ok(arg.evaluate(engine)?.to_text())
}

pub(crate) fn eval_bool(engine: &Engine, arg: &Expr) -> CalcResult<bool> {
    arg.evaluate(engine)?.to_bool()
}

pub(crate) fn eval_datetime(engine: &Engine, arg: &Expr) -> CalcResult<chrono::NaiveDateTime> {
    arg.evaluate(engine)?.to_datetime(engine.locale())
}

/// Evaluates every argument and flattens lists and enumerable host objects
/// into one stream of scalars, the way aggregate functions consume values.
pub(crate) fn collect_values(engine: &Engine, args: &[Expr]) -> CalcResult<Vec<Value>> {
    let mut out = Vec::new();
    for arg in args {
        flatten_into(arg.evaluate(engine)?, &mut out);
    }
    Ok(out)
}

fn flatten_into(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::List(items) => {
            for item in items {
                flatten_into(item, out);
            }
        }
        Value::Object(o) => {
            let items = o.borrow().items();
            match items {
                Some(items) => {
                    for item in items {
                        flatten_into(item, out);
                    }
                }
                None => out.push(Value::Object(o)),
            }
        }
        scalar => out.push(scalar),
    }
}
