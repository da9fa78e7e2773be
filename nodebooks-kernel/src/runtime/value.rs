/*
 * nodebooks-kernel
 *
 * Copyright (C) 2024-2026 NodeBooks Contributors
 * SPDX-License-Identifier: GPL-3.0-only
 *
 * This library is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, version 3.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::{cell::RefCell, collections::HashMap, fmt::Write as _, rc::Rc};

use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};

use crate::runtime::{
    ast::{Expr, Param, Stmt},
    interp::Interp,
};

#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<String>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<Obj>>),
    Function(Rc<Callable>),
    Class(Rc<ClassDef>),
    Promise(Rc<PromiseState>),
}

pub enum PromiseState {
    Resolved(Value),
    Rejected(Value),
}

/// Distinguishes object flavors the kernel treats specially during
/// inspection, sanitization, and display coercion.
#[derive(Clone)]
pub enum ObjKind {
    Plain,
    Error,
    Env(Rc<RefCell<IndexMap<String, String>>>),
    Process,
    Global,
    UiDisplay,
}

pub struct Obj {
    pub kind: ObjKind,
    pub props: IndexMap<String, Value>,
    pub class: Option<Rc<ClassDef>>,
}

impl Obj {
    pub fn new() -> Self {
        Self::with_kind(ObjKind::Plain)
    }

    pub fn with_kind(kind: ObjKind) -> Self {
        Self {
            kind,
            props: IndexMap::new(),
            class: None,
        }
    }
}

impl Default for Obj {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ClassDef {
    pub name: String,
    pub constructor: Option<Rc<Callable>>,
    pub methods: IndexMap<String, Rc<Callable>>,
}

pub enum Callable {
    User(UserFn),
    Native(NativeFn),
}

pub struct UserFn {
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub body: Rc<Vec<Stmt>>,
    pub expr_body: Option<Rc<Expr>>,
    pub scope: Scope,
    pub is_arrow: bool,
    pub is_async: bool,
}

pub type NativeHandler = Box<dyn Fn(&mut Interp, &Value, &[Value]) -> Exec<Value>>;

pub struct NativeFn {
    pub name: String,
    pub handler: NativeHandler,
}

impl Callable {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::User(f) => f.name.as_deref(),
            Self::Native(f) => match f.name.is_empty() {
                true => None,
                false => Some(&f.name),
            },
        }
    }
}

// Control flow

#[derive(Debug)]
pub enum AbortReason {
    Timeout,
    Interrupt,
}

pub enum Signal {
    Throw(Value),
    Abort(AbortReason),
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::Throw(_) => write!(f, "Signal::Throw(..)"),
            Signal::Abort(reason) => write!(f, "Signal::Abort({:?})", reason),
        }
    }
}

pub type Exec<T> = Result<T, Signal>;

pub fn make_error(name: &str, message: &str) -> Value {
    let mut obj = Obj::with_kind(ObjKind::Error);

    obj.props.insert("name".into(), Value::string(name));
    obj.props.insert("message".into(), Value::string(message));
    obj.props.insert("stack".into(), Value::string(format!("{name}: {message}")));
    Value::Object(Rc::new(RefCell::new(obj)))
}

pub fn throw(name: &str, message: &str) -> Signal {
    Signal::Throw(make_error(name, message))
}

/// Policy denials raise in-band so user try/catch observes them.
pub fn policy_error(message: &str) -> Signal {
    throw("PolicyError", message)
}

pub fn error_name(value: &Value) -> String {
    match value {
        Value::Object(obj) => match obj.borrow().props.get("name") {
            Some(Value::String(name)) => name.to_string(),
            _ => "Error".into(),
        },
        _ => "Error".into(),
    }
}

pub fn error_message(value: &Value) -> String {
    match value {
        Value::Object(obj) => {
            let obj = obj.borrow();

            match obj.props.get("message") {
                Some(Value::String(message)) => message.to_string(),
                Some(other) => to_display_string(other),
                /* An error object stripped of its message stays an error;
                 * falling back to display coercion here would recurse. */
                None => match obj.kind {
                    ObjKind::Error => String::new(),
                    _ => "[object Object]".into(),
                },
            }
        }
        _ => to_display_string(value),
    }
}

// Scopes

#[derive(Clone)]
pub struct Scope {
    inner: Rc<RefCell<ScopeInner>>,
}

struct ScopeInner {
    vars: HashMap<String, Value>,
    parent: Option<Scope>,
    global: Option<Rc<RefCell<Obj>>>,
}

impl Scope {
    pub fn root(global: Rc<RefCell<Obj>>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ScopeInner {
                vars: HashMap::new(),
                parent: None,
                global: Some(global),
            })),
        }
    }

    pub fn child(&self) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ScopeInner {
                vars: HashMap::new(),
                parent: Some(self.clone()),
                global: None,
            })),
        }
    }

    pub fn declare(&self, name: &str, value: Value) {
        self.inner.borrow_mut().vars.insert(name.into(), value);
    }

    pub fn remove(&self, name: &str) {
        self.inner.borrow_mut().vars.remove(name);
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        let inner = self.inner.borrow();

        if let Some(value) = inner.vars.get(name) {
            return Some(value.clone());
        }

        if let Some(global) = &inner.global {
            return global.borrow().props.get(name).cloned();
        }

        inner.parent.as_ref().and_then(|parent| parent.lookup(name))
    }

    /* Assignment walks the chain; an unresolved name lands on the global
     * store, mirroring sloppy-mode notebook semantics. */
    pub fn assign(&self, name: &str, value: Value) {
        let mut inner = self.inner.borrow_mut();

        if let Some(slot) = inner.vars.get_mut(name) {
            *slot = value;
            return;
        }

        if let Some(global) = &inner.global {
            global.borrow_mut().props.insert(name.into(), value);
            return;
        }

        match &inner.parent {
            Some(parent) => parent.assign(name, value),
            None => {
                inner.vars.insert(name.into(), value);
            }
        }
    }

    pub fn global_obj(&self) -> Option<Rc<RefCell<Obj>>> {
        let inner = self.inner.borrow();

        if let Some(global) = &inner.global {
            return Some(global.clone());
        }

        inner.parent.as_ref().and_then(|parent| parent.global_obj())
    }
}

// Coercions and predicates

impl Value {
    pub fn string(text: impl Into<String>) -> Self {
        Self::String(Rc::new(text.into()))
    }

    pub fn object(obj: Obj) -> Self {
        Self::Object(Rc::new(RefCell::new(obj)))
    }

    pub fn array(elements: Vec<Value>) -> Self {
        Self::Array(Rc::new(RefCell::new(elements)))
    }

    pub fn native(name: impl Into<String>, handler: impl Fn(&mut Interp, &Value, &[Value]) -> Exec<Value> + 'static) -> Self {
        Self::Function(Rc::new(Callable::Native(NativeFn {
            name: name.into(),
            handler: Box::new(handler),
        })))
    }

    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "object",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Function(_) | Self::Class(_) => "function",
            _ => "object",
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Function(_) | Self::Class(_))
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => match b {
                true => 1.0,
                false => 0.0,
            },
            Self::Number(n) => *n,
            Self::String(s) => match s.trim() {
                "" => 0.0,
                text => text.parse().unwrap_or(f64::NAN),
            },
            _ => f64::NAN,
        }
    }
}

pub fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
        (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
        (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
        (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
        (Value::Promise(a), Value::Promise(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

pub fn loose_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) | (Value::Bool(_), _) | (_, Value::Bool(_)) =>
            a.to_number() == b.to_number(),
        _ => strict_equals(a, b),
    }
}

/// Formats a number the way the cell language prints it: integral values
/// without a fractional part, NaN and infinities spelled out.
pub fn js_number_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".into();
    }

    if n.is_infinite() {
        return match n > 0.0 {
            true => "Infinity".into(),
            false => "-Infinity".into(),
        };
    }

    if n == 0.0 {
        return "0".into();
    }

    if n.fract() == 0.0 && n.abs() < 1e21 {
        return format!("{}", n as i64);
    }

    format!("{}", n)
}

/// String(value) coercion.
pub fn to_display_string(value: &Value) -> String {
    display_string_inner(value, &mut Vec::new())
}

fn display_string_inner(value: &Value, seen: &mut Vec<*const ()>) -> String {
    match value {
        Value::Undefined => "undefined".into(),
        Value::Null => "null".into(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => js_number_string(*n),
        Value::String(s) => s.to_string(),
        Value::Array(elements) => {
            let ptr = Rc::as_ptr(elements) as *const ();

            if seen.contains(&ptr) {
                return String::new();
            }

            seen.push(ptr);

            let mut out = String::new();

            for (i, element) in elements.borrow().iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }

                if !matches!(element, Value::Undefined | Value::Null) {
                    let _ = write!(out, "{}", display_string_inner(element, seen));
                }
            }

            seen.pop();
            out
        }
        Value::Object(obj) => match &obj.borrow().kind {
            ObjKind::Process => "[Sandboxed process]".into(),
            ObjKind::Global => "[NotebookGlobal]".into(),
            ObjKind::Error => format!("{}: {}", error_name(value), error_message(value)),
            _ => "[object Object]".into(),
        },
        Value::Function(f) => match f.name() {
            Some(name) => format!("function {name}() {{ [code] }}"),
            None => "function () { [code] }".into(),
        },
        Value::Class(class) => format!("class {}", class.name),
        Value::Promise(_) => "[object Promise]".into(),
    }
}

// JSON bridging

/// Converts a value into JSON when it is JSON-shaped: null, booleans,
/// finite numbers, strings, arrays, and plain objects. Anything else
/// (functions, classes, facades, non-finite numbers) yields None.
pub fn to_json(value: &Value) -> Option<JsonValue> {
    let mut seen = Vec::new();

    to_json_inner(value, &mut seen)
}

fn to_json_inner(value: &Value, seen: &mut Vec<*const ()>) -> Option<JsonValue> {
    match value {
        Value::Null => Some(JsonValue::Null),
        Value::Bool(b) => Some(JsonValue::Bool(*b)),
        Value::Number(n) => match n.is_finite() {
            true => Some(JsonNumber::from_f64(*n).map_or(JsonValue::Null, JsonValue::Number)),
            false => None,
        },
        Value::String(s) => Some(JsonValue::String(s.to_string())),
        Value::Array(elements) => {
            let ptr = Rc::as_ptr(elements) as *const ();

            if seen.contains(&ptr) {
                return None;
            }

            seen.push(ptr);

            let mut array = Vec::new();

            for element in elements.borrow().iter() {
                array.push(to_json_inner(element, seen)?);
            }

            seen.pop();
            Some(JsonValue::Array(array))
        }
        Value::Object(obj) => {
            let ptr = Rc::as_ptr(obj) as *const ();

            if seen.contains(&ptr) {
                return None;
            }

            let obj = obj.borrow();

            /* The env proxy JSON-coerces to a tagged, sorted dump rather
             * than a raw key-value object. */
            if let ObjKind::Env(map) = &obj.kind {
                let mut entries: Vec<(String, String)> = map.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect();

                entries.sort();

                let mut vars = JsonMap::new();

                for (key, value) in entries {
                    vars.insert(key, JsonValue::String(value));
                }

                let mut tagged = JsonMap::new();

                tagged.insert("NotebookEnv".into(), JsonValue::Object(vars));
                return Some(JsonValue::Object(tagged));
            }

            if !matches!(obj.kind, ObjKind::Plain | ObjKind::UiDisplay) || obj.class.is_some() {
                return None;
            }

            seen.push(ptr);

            let mut map = JsonMap::new();

            for (key, prop) in &obj.props {
                match prop {
                    Value::Undefined | Value::Function(_) | Value::Class(_) => continue,
                    _ => map.insert(key.clone(), to_json_inner(prop, seen)?),
                };
            }

            seen.pop();
            Some(JsonValue::Object(map))
        }
        _ => None,
    }
}

pub fn from_json(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        JsonValue::String(s) => Value::string(s.clone()),
        JsonValue::Array(elements) => Value::array(elements.iter().map(from_json).collect()),
        JsonValue::Object(map) => {
            let mut obj = Obj::new();

            for (key, value) in map {
                obj.props.insert(key.clone(), from_json(value));
            }

            Value::object(obj)
        }
    }
}

#[cfg(test)]
mod test {
    use crate::runtime::value::*;

    #[test]
    fn number_formatting() {
        assert_eq!(js_number_string(1.0), "1");
        assert_eq!(js_number_string(1.5), "1.5");
        assert_eq!(js_number_string(-0.0), "0");
        assert_eq!(js_number_string(f64::NAN), "NaN");
        assert_eq!(js_number_string(f64::INFINITY), "Infinity");
    }

    #[test]
    fn json_round_trip() {
        let value = Value::array(vec![Value::Number(1.0), Value::string("two"), Value::Null]);
        let json = to_json(&value).unwrap();

        assert_eq!(json, serde_json::json!([1.0, "two", null]));
    }

    #[test]
    fn json_rejects_callables() {
        let f = Value::native("f", |_, _, _| Ok(Value::Undefined));

        assert!(to_json(&f).is_none());

        let mut obj = Obj::new();

        obj.props.insert("n".into(), Value::Number(f64::NAN));
        assert!(to_json(&Value::object(obj)).is_none());
    }

    #[test]
    fn cyclic_json_is_rejected() {
        let arr = Rc::new(RefCell::new(vec![Value::Number(1.0)]));

        arr.borrow_mut().push(Value::Array(arr.clone()));
        assert!(to_json(&Value::Array(arr)).is_none());
    }

    #[test]
    fn scope_chain_resolution() {
        let global = Rc::new(RefCell::new(Obj::with_kind(ObjKind::Global)));
        let root = Scope::root(global.clone());
        let child = root.child();

        child.declare("a", Value::Number(1.0));
        assert!(matches!(child.lookup("a"), Some(Value::Number(n)) if n == 1.0));
        assert!(child.lookup("b").is_none());

        child.assign("b", Value::Number(2.0));
        assert!(global.borrow().props.contains_key("b"));
        assert!(matches!(root.lookup("b"), Some(Value::Number(n)) if n == 2.0));
    }
}
