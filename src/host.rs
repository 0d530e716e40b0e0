//! Host object integration.
//!
//! The engine reaches into host data through a deliberately narrow capability:
//! member get/set, optional indexing, optional enumeration, and optional
//! materialization into a plain value. Dotted binding paths are resolved one
//! segment at a time against this trait, so hosts never see whole paths.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value as Json;

use crate::error::{CalcError, CalcResult};
use crate::value::Value;

/// Shared, mutable handle to a host-side object.
///
/// Reference identity (`Rc::ptr_eq`) is what value-equality checks use for
/// objects during change propagation.
pub type ObjectRef = Rc<RefCell<dyn HostObject>>;

pub trait HostObject {
    /// Host-side type name, used in diagnostics.
    fn type_name(&self) -> &str;

    /// Reads one member by name. A missing member is a binding error naming
    /// the member and the host type.
    fn get_member(&self, name: &str) -> CalcResult<Value>;

    /// Writes one member by name.
    fn set_member(&mut self, name: &str, value: Value) -> CalcResult<()>;

    /// Indexed access (`name(arg, ...)` on a non-function identifier).
    fn index(&self, _args: &[Value]) -> CalcResult<Value> {
        Err(CalcError::eval(format!(
            "'{}' does not support indexed access",
            self.type_name()
        )))
    }

    /// Enumerates the object as a collection, if it is one. Mappings yield
    /// key/value pair objects; sequences yield their elements.
    fn items(&self) -> Option<Vec<Value>> {
        None
    }

    /// Collapses the object into a plain value, if it wraps one. External
    /// identifiers resolve through this at evaluation time.
    fn materialize(&self) -> Option<Value> {
        None
    }
}

/// Resolves a dotted path against a value, one member per segment.
pub fn get_path(base: &Value, path: &str) -> CalcResult<Value> {
    let mut current = base.clone();
    for segment in path.split('.') {
        let obj = match &current {
            Value::Object(o) => Rc::clone(o),
            other => return Err(CalcError::binding(path, other.kind_name())),
        };
        let next = obj.borrow().get_member(segment)?;
        current = next;
    }
    Ok(current)
}

/// Writes through a dotted path: navigates to the parent of the last segment
/// and assigns the leaf member.
pub fn set_path(base: &Value, path: &str, value: Value) -> CalcResult<()> {
    let (parent_path, leaf) = match path.rsplit_once('.') {
        Some((parent, leaf)) => (Some(parent), leaf),
        None => (None, path),
    };
    let parent = match parent_path {
        Some(p) => get_path(base, p)?,
        None => base.clone(),
    };
    match parent {
        Value::Object(o) => o.borrow_mut().set_member(leaf, value),
        other => Err(CalcError::binding(path, other.kind_name())),
    }
}

/// Applies indexer arguments to a value: positional for lists, host-defined
/// for objects.
pub fn index_value(value: &Value, args: &[Value]) -> CalcResult<Value> {
    match value {
        Value::List(items) => {
            if args.len() != 1 {
                return Err(CalcError::eval("list index takes exactly one argument"));
            }
            let idx = args[0].to_number()? as usize;
            items
                .get(idx)
                .cloned()
                .ok_or_else(|| CalcError::eval(format!("index {idx} out of range")))
        }
        Value::Object(o) => o.borrow().index(args),
        other => Err(CalcError::eval(format!(
            "cannot index into {}",
            other.kind_name()
        ))),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PathSeg {
    Key(String),
    Index(usize),
}

/// [`HostObject`] over a JSON tree.
///
/// Every handle keeps the shared root plus a path into it, so member handles
/// alias the same tree and writes through any handle are visible to all of
/// them. Sub-context evaluation relies on this: statements write into the
/// current item and the caller observes the mutation on its own handle.
pub struct JsonHost {
    root: Rc<RefCell<Json>>,
    path: Vec<PathSeg>,
}

impl JsonHost {
    pub fn new(json: Json) -> ObjectRef {
        Rc::new(RefCell::new(JsonHost {
            root: Rc::new(RefCell::new(json)),
            path: Vec::new(),
        }))
    }

    /// Wraps a JSON tree as a data-context value.
    pub fn value(json: Json) -> Value {
        Value::Object(Self::new(json))
    }

    fn child(&self, seg: PathSeg) -> JsonHost {
        let mut path = self.path.clone();
        path.push(seg);
        JsonHost {
            root: Rc::clone(&self.root),
            path,
        }
    }

    fn with_node<R>(&self, f: impl FnOnce(Option<&Json>) -> R) -> R {
        let root = self.root.borrow();
        let mut node = Some(&*root);
        for seg in &self.path {
            node = node.and_then(|n| match seg {
                PathSeg::Key(k) => n.get(k),
                PathSeg::Index(i) => n.get(*i),
            });
        }
        f(node)
    }

    fn with_node_mut<R>(&self, f: impl FnOnce(Option<&mut Json>) -> R) -> R {
        let mut root = self.root.borrow_mut();
        let mut node = Some(&mut *root);
        for seg in &self.path {
            node = node.and_then(|n| match seg {
                PathSeg::Key(k) => n.get_mut(k),
                PathSeg::Index(i) => n.get_mut(*i),
            });
        }
        f(node)
    }

    /// Clones the subtree this handle points at. Mostly useful for
    /// inspecting results after evaluation.
    pub fn snapshot(&self) -> Json {
        self.with_node(|n| n.cloned().unwrap_or(Json::Null))
    }

    fn convert(&self, seg: PathSeg, node: &Json) -> Value {
        match node {
            Json::Object(_) | Json::Array(_) => {
                Value::Object(Rc::new(RefCell::new(self.child(seg))))
            }
            scalar => json_scalar_to_value(scalar),
        }
    }
}

impl HostObject for JsonHost {
    fn type_name(&self) -> &str {
        "json"
    }

    fn get_member(&self, name: &str) -> CalcResult<Value> {
        self.with_node(|node| {
            let member = node
                .and_then(|n| n.as_object())
                .and_then(|obj| obj.get(name));
            match member {
                Some(child) => Ok(self.convert(PathSeg::Key(name.to_string()), child)),
                None => Err(CalcError::binding(name, self.type_name())),
            }
        })
    }

    fn set_member(&mut self, name: &str, value: Value) -> CalcResult<()> {
        let json = value_to_json(&value)?;
        self.with_node_mut(|node| match node.and_then(|n| n.as_object_mut()) {
            Some(map) => {
                map.insert(name.to_string(), json);
                Ok(())
            }
            None => Err(CalcError::binding(name, "json")),
        })
    }

    fn index(&self, args: &[Value]) -> CalcResult<Value> {
        if args.len() != 1 {
            return Err(CalcError::eval("json index takes exactly one argument"));
        }
        match &args[0] {
            Value::Text(key) => self.get_member(key),
            other => {
                let idx = other.to_number()? as usize;
                self.with_node(|node| {
                    let arr = node.and_then(|n| n.as_array());
                    match arr.and_then(|a| a.get(idx)) {
                        Some(child) => Ok(self.convert(PathSeg::Index(idx), child)),
                        None => Err(CalcError::eval(format!("index {idx} out of range"))),
                    }
                })
            }
        }
    }

    fn items(&self) -> Option<Vec<Value>> {
        self.with_node(|node| match node? {
            Json::Array(arr) => Some(
                (0..arr.len())
                    .map(|i| self.convert(PathSeg::Index(i), &arr[i]))
                    .collect(),
            ),
            Json::Object(map) => {
                // Mappings enumerate as key/value pairs.
                let pairs = map
                    .iter()
                    .map(|(k, child)| {
                        let value = self.convert(PathSeg::Key(k.clone()), child);
                        Value::Object(Rc::new(RefCell::new(MapEntry {
                            key: k.clone(),
                            value,
                        })))
                    })
                    .collect();
                Some(pairs)
            }
            _ => None,
        })
    }

    fn materialize(&self) -> Option<Value> {
        self.with_node(|node| match node? {
            Json::Object(_) | Json::Array(_) => None,
            scalar => Some(json_scalar_to_value(scalar)),
        })
    }
}

/// One key/value pair from an enumerated mapping.
struct MapEntry {
    key: String,
    value: Value,
}

impl HostObject for MapEntry {
    fn type_name(&self) -> &str {
        "entry"
    }

    fn get_member(&self, name: &str) -> CalcResult<Value> {
        if name.eq_ignore_ascii_case("key") {
            Ok(Value::Text(self.key.clone()))
        } else if name.eq_ignore_ascii_case("value") {
            Ok(self.value.clone())
        } else {
            Err(CalcError::binding(name, self.type_name()))
        }
    }

    fn set_member(&mut self, name: &str, _value: Value) -> CalcResult<()> {
        Err(CalcError::eval(format!(
            "cannot assign '{name}' on a key/value pair"
        )))
    }
}

fn json_scalar_to_value(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        Json::String(s) => Value::Text(s.clone()),
        Json::Object(_) | Json::Array(_) => Value::Null,
    }
}

fn value_to_json(value: &Value) -> CalcResult<Json> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::Text(s) => Json::String(s.clone()),
        Value::Date(d) => Json::String(d.format("%Y-%m-%dT%H:%M:%S").to_string()),
        Value::List(items) => Json::Array(
            items
                .iter()
                .map(value_to_json)
                .collect::<CalcResult<Vec<_>>>()?,
        ),
        Value::Object(o) => {
            return Err(CalcError::eval(format!(
                "cannot store a '{}' object into a json tree",
                o.borrow().type_name()
            )))
        }
    })
}
