//! An embeddable formula language with dependency tracking and incremental
//! recalculation.
//!
//! An [`Engine`] parses expression text into an [`Expr`] tree, evaluates it
//! against a variable table and an optional host data context, and keeps a
//! dependency graph between named calculations so a change notification only
//! re-evaluates what actually depends on the changed name.
//!
//! ```
//! use calc_engine::{Engine, Value};
//!
//! let engine = Engine::new();
//! assert_eq!(engine.evaluate("1 + 2 * 3").unwrap(), Value::Number(7.0));
//! assert_eq!(
//!     engine.evaluate("IF(2 > 1, 'yes', 'no')").unwrap(),
//!     Value::Text("yes".into())
//! );
//! ```

pub mod ast;
pub mod engine;
pub mod error;
pub mod functions;
pub mod graph;
pub mod host;
pub mod locale;
pub mod parser;
pub mod value;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use engine::{Calculation, Engine, CHANGED, ROOT, THIS};
pub use error::{CalcError, CalcResult};
pub use functions::{BuiltinFn, FunctionBody, FunctionDef, Volatility, VAR_ARGS};
pub use graph::DependencyGraph;
pub use host::{get_path, set_path, HostObject, JsonHost, ObjectRef};
pub use locale::LocaleConfig;
pub use value::Value;
