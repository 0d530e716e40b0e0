//! Expression tree.
//!
//! Nodes hold everything they need to evaluate except the engine itself,
//! which supplies the variable table, the data context, and the locale.

use std::cmp::Ordering;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::error::{CalcError, CalcResult};
use crate::functions::{self, FunctionDef};
use crate::host::index_value;
use crate::value::Value;
use crate::Engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    /// `\` — division truncated toward zero.
    IntDiv,
    Pow,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge
        )
    }
}

/// One segment of a data-context binding path, with optional indexer
/// arguments (`Orders(3).Total` indexes the `Orders` member first).
#[derive(Debug, Clone)]
pub struct BindingSeg {
    pub name: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub struct BindingPath {
    pub segments: SmallVec<[BindingSeg; 2]>,
}

impl BindingPath {
    /// Dotted path used as the dependency-graph key for this binding.
    pub fn path_string(&self) -> String {
        let names: Vec<&str> = self.segments.iter().map(|s| s.name.as_str()).collect();
        names.join(".")
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Function(Rc<FunctionDef>, Vec<Expr>),
    /// Live reference into the engine's variable table.
    Variable(String),
    /// Member path resolved against the data context on every evaluation.
    Binding(BindingPath),
    /// Host value captured from the external resolver at parse time.
    External(Value),
}

impl Expr {
    pub fn is_literal(&self) -> bool {
        matches!(self, Expr::Literal(_))
    }

    pub fn evaluate(&self, engine: &Engine) -> CalcResult<Value> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Unary(op, operand) => {
                let n = operand.evaluate(engine)?.to_number_with(engine.locale())?;
                Ok(Value::Number(match op {
                    UnaryOp::Plus => n,
                    UnaryOp::Neg => -n,
                }))
            }
            Expr::Binary(op, lhs, rhs) => evaluate_binary(engine, *op, lhs, rhs),
            Expr::Function(def, args) => functions::invoke(engine, def, args),
            Expr::Variable(name) => engine
                .get_variable(name)
                .ok_or_else(|| CalcError::UnknownIdentifier(name.clone())),
            Expr::Binding(path) => evaluate_binding(engine, path),
            Expr::External(v) => Ok(match v {
                Value::Object(o) => o.borrow().materialize().unwrap_or_else(|| v.clone()),
                other => other.clone(),
            }),
        }
    }

    /// Folds literal-only subtrees into [`Expr::Literal`] nodes. Volatile and
    /// side-effecting functions never fold; variables and bindings stay live.
    pub fn optimize(self, engine: &Engine) -> Expr {
        match self {
            Expr::Unary(op, operand) => {
                let operand = operand.optimize(engine);
                let expr = Expr::Unary(op, Box::new(operand));
                fold_if_literal(expr, engine, |e| match e {
                    Expr::Unary(_, operand) => operand.is_literal(),
                    _ => false,
                })
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = lhs.optimize(engine);
                let rhs = rhs.optimize(engine);
                let expr = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
                fold_if_literal(expr, engine, |e| match e {
                    Expr::Binary(_, lhs, rhs) => lhs.is_literal() && rhs.is_literal(),
                    _ => false,
                })
            }
            Expr::Function(def, args) => {
                let args: Vec<Expr> = args.into_iter().map(|a| a.optimize(engine)).collect();
                let foldable = def.is_foldable() && args.iter().all(Expr::is_literal);
                let expr = Expr::Function(def, args);
                if foldable {
                    fold_if_literal(expr, engine, |_| true)
                } else {
                    expr
                }
            }
            other => other,
        }
    }

    /// Dotted binding paths referenced anywhere in this tree, including
    /// inside indexer arguments and function arguments.
    pub fn bindings(&self) -> Vec<String> {
        let mut bindings = Vec::new();
        let mut variables = Vec::new();
        self.collect_refs(&mut bindings, &mut variables);
        bindings
    }

    /// Variable names referenced anywhere in this tree.
    pub fn variables(&self) -> Vec<String> {
        let mut bindings = Vec::new();
        let mut variables = Vec::new();
        self.collect_refs(&mut bindings, &mut variables);
        variables
    }

    fn collect_refs(&self, bindings: &mut Vec<String>, variables: &mut Vec<String>) {
        match self {
            Expr::Literal(_) | Expr::External(_) => {}
            Expr::Unary(_, operand) => operand.collect_refs(bindings, variables),
            Expr::Binary(_, lhs, rhs) => {
                lhs.collect_refs(bindings, variables);
                rhs.collect_refs(bindings, variables);
            }
            Expr::Function(_, args) => {
                for arg in args {
                    arg.collect_refs(bindings, variables);
                }
            }
            Expr::Variable(name) => {
                if !variables.iter().any(|v| v == name) {
                    variables.push(name.clone());
                }
            }
            Expr::Binding(path) => {
                let key = path.path_string();
                if !bindings.iter().any(|b| b == &key) {
                    bindings.push(key);
                }
                for seg in &path.segments {
                    for arg in &seg.args {
                        arg.collect_refs(bindings, variables);
                    }
                }
            }
        }
    }
}

fn fold_if_literal(expr: Expr, engine: &Engine, all_literal: impl Fn(&Expr) -> bool) -> Expr {
    if !all_literal(&expr) {
        return expr;
    }
    match expr.evaluate(engine) {
        Ok(v) => Expr::Literal(v),
        // Leave the node alone so the error surfaces at evaluation time.
        Err(_) => expr,
    }
}

fn evaluate_binary(engine: &Engine, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> CalcResult<Value> {
    let left = lhs.evaluate(engine)?;
    let right = rhs.evaluate(engine)?;

    if op.is_comparison() {
        let ordering = left.compare(&right, engine.locale())?;
        let result = match op {
            BinaryOp::Eq => ordering == Ordering::Equal,
            BinaryOp::Ne => ordering != Ordering::Equal,
            BinaryOp::Lt => ordering == Ordering::Less,
            BinaryOp::Gt => ordering == Ordering::Greater,
            BinaryOp::Le => ordering != Ordering::Greater,
            BinaryOp::Ge => ordering != Ordering::Less,
            _ => unreachable!(),
        };
        return Ok(Value::Bool(result));
    }

    let a = left.to_number_with(engine.locale())?;
    let b = right.to_number_with(engine.locale())?;
    let n = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::IntDiv => (a / b).trunc(),
        BinaryOp::Pow => power(a, b),
        _ => unreachable!(),
    };
    Ok(Value::Number(n))
}

// Common small exponents avoid powf; a zero exponent is always 1 (0^0 included).
fn power(base: f64, exponent: f64) -> f64 {
    if exponent == 0.0 {
        1.0
    } else if exponent == 0.5 {
        base.sqrt()
    } else if exponent == 1.0 {
        base
    } else if exponent == 2.0 {
        base * base
    } else if exponent == 3.0 {
        base * base * base
    } else if exponent == 4.0 {
        let sq = base * base;
        sq * sq
    } else {
        base.powf(exponent)
    }
}

fn evaluate_binding(engine: &Engine, path: &BindingPath) -> CalcResult<Value> {
    let mut current = engine
        .data_context()
        .ok_or_else(|| CalcError::binding(path.path_string(), "missing data context"))?;
    for seg in &path.segments {
        let obj = match &current {
            Value::Object(o) => Rc::clone(o),
            other => return Err(CalcError::binding(path.path_string(), other.kind_name())),
        };
        let member = obj.borrow().get_member(&seg.name)?;
        current = if seg.args.is_empty() {
            member
        } else {
            let args = seg
                .args
                .iter()
                .map(|a| a.evaluate(engine))
                .collect::<CalcResult<Vec<_>>>()?;
            index_value(&member, &args)?
        };
    }
    Ok(current)
}
