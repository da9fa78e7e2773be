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

//! Language-level globals (JSON, Math, Object, error constructors) and
//! method dispatch for primitive receivers.

use std::rc::Rc;

use serde_json::ser::{PrettyFormatter, Serializer};

use crate::runtime::value::*;

pub fn install(global: &Value) {
    let props = match global {
        Value::Object(obj) => obj,
        _ => return,
    };
    let mut props = props.borrow_mut();

    for name in ["Error", "TypeError", "RangeError", "ReferenceError", "SyntaxError"] {
        props.props.insert(name.into(), error_constructor(name));
    }

    props.props.insert("JSON".into(), json_object());
    props.props.insert("Math".into(), math_object());
    props.props.insert("Date".into(), date_object());
    props.props.insert("Object".into(), object_object());
    props.props.insert("Array".into(), array_object());
    props.props.insert("Number".into(), number_object());
    props.props.insert("Promise".into(), promise_object());
    props.props.insert("String".into(), Value::native("String", |_, _, args| {
        Ok(Value::string(args.first().map(to_display_string).unwrap_or_default()))
    }));
    props.props.insert("Boolean".into(), Value::native("Boolean", |_, _, args| {
        Ok(Value::Bool(args.first().map(Value::truthy).unwrap_or(false)))
    }));
    props.props.insert("parseInt".into(), Value::native("parseInt", |_, _, args| {
        let text = args.first().map(to_display_string).unwrap_or_default();
        let radix = match args.get(1) {
            Some(Value::Number(r)) if *r >= 2.0 && *r <= 36.0 => *r as u32,
            _ => 10,
        };
        let trimmed = text.trim();
        let digits: String = trimmed
            .chars()
            .enumerate()
            .take_while(|(i, c)| c.is_digit(radix) || (*i == 0 && (*c == '-' || *c == '+')))
            .map(|(_, c)| c)
            .collect();

        Ok(match i64::from_str_radix(digits.trim_start_matches('+'), radix) {
            Ok(n) => Value::Number(n as f64),
            Err(_) => Value::Number(f64::NAN),
        })
    }));
    props.props.insert("parseFloat".into(), Value::native("parseFloat", |_, _, args| {
        let text = args.first().map(to_display_string).unwrap_or_default();

        Ok(Value::Number(text.trim().parse().unwrap_or(f64::NAN)))
    }));
    props.props.insert("isNaN".into(), Value::native("isNaN", |_, _, args| {
        Ok(Value::Bool(args.first().map_or(true, |v| v.to_number().is_nan())))
    }));
    props.props.insert("isFinite".into(), Value::native("isFinite", |_, _, args| {
        Ok(Value::Bool(args.first().is_some_and(|v| v.to_number().is_finite())))
    }));
}

fn error_constructor(name: &'static str) -> Value {
    Value::native(name, move |_, _, args| {
        let message = args.first().map(to_display_string).unwrap_or_default();

        Ok(make_error(name, &message))
    })
}

fn json_object() -> Value {
    let mut obj = Obj::new();

    obj.props.insert("stringify".into(), Value::native("stringify", |_, _, args| {
        let value = args.first().cloned().unwrap_or(Value::Undefined);
        let json = match to_json(&value) {
            Some(json) => json,
            None => return Ok(Value::Undefined),
        };
        let indent = match args.get(2) {
            Some(Value::Number(n)) if *n >= 1.0 => " ".repeat((*n as usize).min(10)),
            Some(Value::String(s)) => s.to_string(),
            _ => String::new(),
        };

        if indent.is_empty() {
            return match serde_json::to_string(&json) {
                Ok(text) => Ok(Value::string(text)),
                Err(error) => Err(throw("TypeError", &error.to_string())),
            };
        }

        let mut out = Vec::new();
        let formatter = PrettyFormatter::with_indent(indent.as_bytes());
        let mut serializer = Serializer::with_formatter(&mut out, formatter);

        match serde::Serialize::serialize(&json, &mut serializer) {
            Ok(()) => Ok(Value::string(String::from_utf8_lossy(&out).to_string())),
            Err(error) => Err(throw("TypeError", &error.to_string())),
        }
    }));
    obj.props.insert("parse".into(), Value::native("parse", |_, _, args| {
        let text = args.first().map(to_display_string).unwrap_or_default();

        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(json) => Ok(from_json(&json)),
            Err(error) => Err(throw("SyntaxError", &format!("Unexpected token in JSON: {error}"))),
        }
    }));
    Value::object(obj)
}

fn math_object() -> Value {
    let mut obj = Obj::new();

    obj.props.insert("PI".into(), Value::Number(std::f64::consts::PI));
    obj.props.insert("E".into(), Value::Number(std::f64::consts::E));

    let unary: &[(&'static str, fn(f64) -> f64)] = &[
        ("floor", f64::floor),
        ("ceil", f64::ceil),
        ("round", f64::round),
        ("trunc", f64::trunc),
        ("abs", f64::abs),
        ("sqrt", f64::sqrt),
        ("log", f64::ln),
        ("log2", f64::log2),
        ("log10", f64::log10),
        ("exp", f64::exp),
        ("sign", f64::signum),
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
    ];

    for (name, f) in unary {
        let f = *f;

        obj.props.insert((*name).into(), Value::native(*name, move |_, _, args| {
            Ok(Value::Number(f(args.first().map(Value::to_number).unwrap_or(f64::NAN))))
        }));
    }

    obj.props.insert("pow".into(), Value::native("pow", |_, _, args| {
        let base = args.first().map(Value::to_number).unwrap_or(f64::NAN);
        let exp = args.get(1).map(Value::to_number).unwrap_or(f64::NAN);

        Ok(Value::Number(base.powf(exp)))
    }));
    obj.props.insert("min".into(), Value::native("min", |_, _, args| {
        Ok(Value::Number(args.iter().map(Value::to_number).fold(f64::INFINITY, f64::min)))
    }));
    obj.props.insert("max".into(), Value::native("max", |_, _, args| {
        Ok(Value::Number(args.iter().map(Value::to_number).fold(f64::NEG_INFINITY, f64::max)))
    }));
    obj.props.insert("random".into(), Value::native("random", |_, _, _| Ok(Value::Number(rand::random::<f64>()))));
    Value::object(obj)
}

fn date_object() -> Value {
    let mut obj = Obj::new();

    obj.props.insert("now".into(), Value::native("now", |_, _, _| {
        Ok(Value::Number(crate::utils::unix_time_as_millis() as f64))
    }));
    Value::object(obj)
}

fn object_object() -> Value {
    let mut obj = Obj::new();

    obj.props.insert("keys".into(), Value::native("keys", |_, _, args| {
        Ok(Value::array(enumerate_keys(args.first()).into_iter().map(Value::string).collect()))
    }));
    obj.props.insert("values".into(), Value::native("values", |_, _, args| {
        match args.first() {
            Some(Value::Object(obj)) => match &obj.borrow().kind {
                ObjKind::Env(map) => Ok(Value::array(map.borrow().values().cloned().map(Value::string).collect())),
                _ => Ok(Value::array(obj.borrow().props.values().cloned().collect())),
            },
            Some(Value::Array(elements)) => Ok(Value::array(elements.borrow().clone())),
            _ => Ok(Value::array(Vec::new())),
        }
    }));
    obj.props.insert("entries".into(), Value::native("entries", |_, _, args| {
        match args.first() {
            Some(Value::Object(obj)) => {
                let entries = match &obj.borrow().kind {
                    ObjKind::Env(map) => map
                        .borrow()
                        .iter()
                        .map(|(k, v)| Value::array(vec![Value::string(k.clone()), Value::string(v.clone())]))
                        .collect(),
                    _ => obj
                        .borrow()
                        .props
                        .iter()
                        .map(|(k, v)| Value::array(vec![Value::string(k.clone()), v.clone()]))
                        .collect(),
                };

                Ok(Value::array(entries))
            }
            _ => Ok(Value::array(Vec::new())),
        }
    }));
    obj.props.insert("assign".into(), Value::native("assign", |_, _, args| {
        let target = args.first().cloned().unwrap_or(Value::Undefined);

        if let Value::Object(target_obj) = &target {
            for source in &args[1 ..] {
                if let Value::Object(source_obj) = source {
                    let source_props = source_obj.borrow().props.clone();

                    target_obj.borrow_mut().props.extend(source_props);
                }
            }
        }

        Ok(target)
    }));
    obj.props.insert("freeze".into(), Value::native("freeze", |_, _, args| {
        Ok(args.first().cloned().unwrap_or(Value::Undefined))
    }));
    Value::object(obj)
}

/// Key enumeration honors the env facade: the current set of variable
/// names, not the facade's own properties.
fn enumerate_keys(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Object(obj)) => match &obj.borrow().kind {
            ObjKind::Env(map) => map.borrow().keys().cloned().collect(),
            _ => obj.borrow().props.keys().cloned().collect(),
        },
        Some(Value::Array(elements)) => (0 .. elements.borrow().len()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    }
}

fn array_object() -> Value {
    let mut obj = Obj::new();

    obj.props.insert("isArray".into(), Value::native("isArray", |_, _, args| {
        Ok(Value::Bool(matches!(args.first(), Some(Value::Array(_)))))
    }));
    obj.props.insert("from".into(), Value::native("from", |_, _, args| {
        match args.first() {
            Some(Value::Array(elements)) => Ok(Value::array(elements.borrow().clone())),
            Some(Value::String(text)) => Ok(Value::array(text.chars().map(|c| Value::string(c.to_string())).collect())),
            _ => Ok(Value::array(Vec::new())),
        }
    }));
    Value::object(obj)
}

fn number_object() -> Value {
    let mut obj = Obj::new();

    obj.props.insert("isInteger".into(), Value::native("isInteger", |_, _, args| {
        Ok(Value::Bool(matches!(args.first(), Some(Value::Number(n)) if n.fract() == 0.0 && n.is_finite())))
    }));
    obj.props.insert("isFinite".into(), Value::native("isFinite", |_, _, args| {
        Ok(Value::Bool(matches!(args.first(), Some(Value::Number(n)) if n.is_finite())))
    }));
    obj.props.insert("MAX_SAFE_INTEGER".into(), Value::Number(9007199254740991.0));
    Value::object(obj)
}

fn promise_object() -> Value {
    let mut obj = Obj::new();

    obj.props.insert("resolve".into(), Value::native("resolve", |_, _, args| {
        let value = args.first().cloned().unwrap_or(Value::Undefined);

        Ok(match value {
            Value::Promise(_) => value,
            value => Value::Promise(Rc::new(PromiseState::Resolved(value))),
        })
    }));
    obj.props.insert("reject".into(), Value::native("reject", |_, _, args| {
        let value = args.first().cloned().unwrap_or(Value::Undefined);

        Ok(Value::Promise(Rc::new(PromiseState::Rejected(value))))
    }));
    Value::object(obj)
}

// Member dispatch for primitive receivers

pub fn member(receiver: &Value, name: &str) -> Option<Value> {
    match receiver {
        Value::String(text) => string_member(text, name),
        Value::Array(elements) => match name {
            "length" => Some(Value::Number(elements.borrow().len() as f64)),
            name => array_member(name),
        },
        Value::Number(_) => number_member(name),
        Value::Promise(_) => promise_member(name),
        Value::Function(callable) => match name {
            "name" => Some(Value::string(callable.name().unwrap_or_default())),
            _ => None,
        },
        Value::Class(class) => match name {
            "name" => Some(Value::string(class.name.clone())),
            _ => None,
        },
        Value::Object(_) => object_member(name),
        _ => None,
    }
}

fn object_member(name: &str) -> Option<Value> {
    match name {
        "hasOwnProperty" => Some(Value::native("hasOwnProperty", |_, this, args| {
            let key = args.first().map(to_display_string).unwrap_or_default();

            Ok(Value::Bool(match this {
                Value::Object(obj) => match &obj.borrow().kind {
                    ObjKind::Env(map) => map.borrow().contains_key(&key),
                    _ => obj.borrow().props.contains_key(&key),
                },
                _ => false,
            }))
        })),
        "toString" => Some(Value::native("toString", |_, this, _| Ok(Value::string(to_display_string(this))))),
        _ => None,
    }
}

fn string_member(text: &Rc<String>, name: &str) -> Option<Value> {
    if name == "length" {
        return Some(Value::Number(text.chars().count() as f64));
    }

    let method = |f: fn(&str, &[Value]) -> Exec<Value>| {
        Some(Value::native(name.to_string(), move |_, this, args| match this {
            Value::String(text) => f(text, args),
            _ => f("", args),
        }))
    };

    match name {
        "includes" => method(|s, args| Ok(Value::Bool(s.contains(&arg_str(args, 0))))),
        "startsWith" => method(|s, args| Ok(Value::Bool(s.starts_with(&arg_str(args, 0))))),
        "endsWith" => method(|s, args| Ok(Value::Bool(s.ends_with(&arg_str(args, 0))))),
        "indexOf" => method(|s, args| {
            let needle = arg_str(args, 0);

            Ok(Value::Number(match s.find(&needle) {
                Some(byte_idx) => s[.. byte_idx].chars().count() as f64,
                None => -1.0,
            }))
        }),
        "trim" => method(|s, _| Ok(Value::string(s.trim()))),
        "trimStart" => method(|s, _| Ok(Value::string(s.trim_start()))),
        "trimEnd" => method(|s, _| Ok(Value::string(s.trim_end()))),
        "toUpperCase" => method(|s, _| Ok(Value::string(s.to_uppercase()))),
        "toLowerCase" => method(|s, _| Ok(Value::string(s.to_lowercase()))),
        "split" => method(|s, args| {
            let sep = arg_str(args, 0);
            let parts: Vec<Value> = match sep.is_empty() {
                true => s.chars().map(|c| Value::string(c.to_string())).collect(),
                false => s.split(sep.as_str()).map(Value::string).collect(),
            };

            Ok(Value::array(parts))
        }),
        "slice" => method(|s, args| {
            let chars: Vec<char> = s.chars().collect();
            let (start, end) = slice_bounds(args, chars.len());

            Ok(Value::string(chars[start .. end].iter().collect::<String>()))
        }),
        "substring" => method(|s, args| {
            let chars: Vec<char> = s.chars().collect();
            let (start, end) = slice_bounds(args, chars.len());

            Ok(Value::string(chars[start .. end].iter().collect::<String>()))
        }),
        "replace" => method(|s, args| {
            let from = arg_str(args, 0);
            let to = arg_str(args, 1);

            Ok(Value::string(s.replacen(from.as_str(), to.as_str(), 1)))
        }),
        "replaceAll" => method(|s, args| {
            let from = arg_str(args, 0);
            let to = arg_str(args, 1);

            Ok(Value::string(s.replace(from.as_str(), to.as_str())))
        }),
        "repeat" => method(|s, args| {
            let count = args.first().map(Value::to_number).unwrap_or(0.0);

            if !(0.0 ..= 10_000_000.0).contains(&count) {
                return Err(throw("RangeError", "Invalid count value"));
            }

            Ok(Value::string(s.repeat(count as usize)))
        }),
        "padStart" => method(|s, args| Ok(Value::string(pad(s, args, true)))),
        "padEnd" => method(|s, args| Ok(Value::string(pad(s, args, false)))),
        "charAt" => method(|s, args| {
            let idx = args.first().map(Value::to_number).unwrap_or(0.0) as usize;

            Ok(Value::string(s.chars().nth(idx).map(String::from).unwrap_or_default()))
        }),
        "concat" => method(|s, args| {
            let mut out = s.to_string();

            for arg in args {
                out.push_str(&to_display_string(arg));
            }

            Ok(Value::string(out))
        }),
        "toString" => method(|s, _| Ok(Value::string(s))),
        _ => None,
    }
}

fn pad(s: &str, args: &[Value], start: bool) -> String {
    let target = args.first().map(Value::to_number).unwrap_or(0.0) as usize;
    let filler = match args.get(1) {
        Some(value) => to_display_string(value),
        None => " ".into(),
    };
    let len = s.chars().count();

    if target <= len || filler.is_empty() {
        return s.into();
    }

    let mut padding: String = filler.chars().cycle().take(target - len).collect();

    match start {
        true => {
            padding.push_str(s);
            padding
        }
        false => {
            let mut out = s.to_string();

            out.push_str(&padding);
            out
        }
    }
}

fn arg_str(args: &[Value], idx: usize) -> String {
    args.get(idx).map(to_display_string).unwrap_or_default()
}

fn slice_bounds(args: &[Value], len: usize) -> (usize, usize) {
    let resolve = |value: Option<&Value>, default: f64| -> usize {
        let n = value.map(|v| v.to_number()).unwrap_or(default);
        let n = match n.is_nan() {
            true => 0.0,
            false => n,
        };

        match n < 0.0 {
            true => len.saturating_sub((-n) as usize),
            false => (n as usize).min(len),
        }
    };
    let start = resolve(args.first(), 0.0);
    let end = resolve(args.get(1), len as f64);

    (start, end.max(start))
}

fn number_member(name: &str) -> Option<Value> {
    match name {
        "toFixed" => Some(Value::native("toFixed", |_, this, args| {
            let digits = args.first().map(Value::to_number).unwrap_or(0.0) as usize;

            Ok(Value::string(format!("{:.*}", digits.min(100), this.to_number())))
        })),
        "toString" => Some(Value::native("toString", |_, this, _| Ok(Value::string(js_number_string(this.to_number()))))),
        _ => None,
    }
}

fn promise_member(name: &str) -> Option<Value> {
    match name {
        "then" => Some(Value::native("then", |interp, this, args| {
            let state = match this {
                Value::Promise(state) => state.clone(),
                _ => return Err(throw("TypeError", "Receiver is not a promise")),
            };

            match &*state {
                PromiseState::Resolved(value) => {
                    let result = match args.first() {
                        Some(cb) if cb.is_callable() => interp.call_value(cb, &Value::Undefined, &[value.clone()])?,
                        _ => value.clone(),
                    };

                    interp.settle(result).map(|v| Value::Promise(Rc::new(PromiseState::Resolved(v))))
                }
                PromiseState::Rejected(error) => match args.get(1) {
                    Some(cb) if cb.is_callable() => {
                        let result = interp.call_value(cb, &Value::Undefined, &[error.clone()])?;

                        Ok(Value::Promise(Rc::new(PromiseState::Resolved(result))))
                    }
                    _ => Ok(Value::Promise(Rc::new(PromiseState::Rejected(error.clone())))),
                },
            }
        })),
        "catch" => Some(Value::native("catch", |interp, this, args| {
            let state = match this {
                Value::Promise(state) => state.clone(),
                _ => return Err(throw("TypeError", "Receiver is not a promise")),
            };

            match &*state {
                PromiseState::Resolved(_) => Ok(this.clone()),
                PromiseState::Rejected(error) => match args.first() {
                    Some(cb) if cb.is_callable() => {
                        let result = interp.call_value(cb, &Value::Undefined, &[error.clone()])?;

                        Ok(Value::Promise(Rc::new(PromiseState::Resolved(result))))
                    }
                    None | Some(_) => Ok(this.clone()),
                },
            }
        })),
        "finally" => Some(Value::native("finally", |interp, this, args| {
            if let Some(cb) = args.first() {
                if cb.is_callable() {
                    interp.call_value(cb, &Value::Undefined, &[])?;
                }
            }

            Ok(this.clone())
        })),
        _ => None,
    }
}

fn array_member(name: &str) -> Option<Value> {
    let simple = |f: fn(&Rc<std::cell::RefCell<Vec<Value>>>, &[Value]) -> Exec<Value>| {
        Some(Value::native(name.to_string(), move |_, this, args| match this {
            Value::Array(elements) => f(elements, args),
            _ => Err(throw("TypeError", "Receiver is not an array")),
        }))
    };
    let iterating = |f: fn(&mut crate::runtime::interp::Interp, Vec<Value>, &Value, &[Value]) -> Exec<Value>| {
        Some(Value::native(name.to_string(), move |interp, this, args| match this {
            Value::Array(elements) => {
                let snapshot = elements.borrow().clone();
                let callback = args.first().cloned().unwrap_or(Value::Undefined);

                if !callback.is_callable() {
                    return Err(throw("TypeError", "Callback is not a function"));
                }

                f(interp, snapshot, &callback, args)
            }
            _ => Err(throw("TypeError", "Receiver is not an array")),
        }))
    };

    match name {
        "push" => simple(|elements, args| {
            elements.borrow_mut().extend(args.iter().cloned());
            Ok(Value::Number(elements.borrow().len() as f64))
        }),
        "pop" => simple(|elements, _| Ok(elements.borrow_mut().pop().unwrap_or(Value::Undefined))),
        "shift" => simple(|elements, _| {
            let mut elements = elements.borrow_mut();

            Ok(match elements.is_empty() {
                true => Value::Undefined,
                false => elements.remove(0),
            })
        }),
        "unshift" => simple(|elements, args| {
            let mut elements = elements.borrow_mut();

            for (i, arg) in args.iter().enumerate() {
                elements.insert(i, arg.clone());
            }

            Ok(Value::Number(elements.len() as f64))
        }),
        "slice" => simple(|elements, args| {
            let elements = elements.borrow();
            let (start, end) = slice_bounds(args, elements.len());

            Ok(Value::array(elements[start .. end].to_vec()))
        }),
        "indexOf" => simple(|elements, args| {
            let needle = args.first().cloned().unwrap_or(Value::Undefined);

            Ok(Value::Number(
                elements
                    .borrow()
                    .iter()
                    .position(|e| strict_equals(e, &needle))
                    .map_or(-1.0, |i| i as f64),
            ))
        }),
        "includes" => simple(|elements, args| {
            let needle = args.first().cloned().unwrap_or(Value::Undefined);

            Ok(Value::Bool(elements.borrow().iter().any(|e| strict_equals(e, &needle))))
        }),
        "join" => simple(|elements, args| {
            let sep = match args.first() {
                Some(value) => to_display_string(value),
                None => ",".into(),
            };
            let parts: Vec<String> = elements
                .borrow()
                .iter()
                .map(|e| match e {
                    Value::Undefined | Value::Null => String::new(),
                    e => to_display_string(e),
                })
                .collect();

            Ok(Value::string(parts.join(&sep)))
        }),
        "concat" => simple(|elements, args| {
            let mut out = elements.borrow().clone();

            for arg in args {
                match arg {
                    Value::Array(more) => out.extend(more.borrow().iter().cloned()),
                    arg => out.push(arg.clone()),
                }
            }

            Ok(Value::array(out))
        }),
        "reverse" => Some(Value::native("reverse", |_, this, _| match this {
            Value::Array(elements) => {
                elements.borrow_mut().reverse();
                Ok(this.clone())
            }
            _ => Err(throw("TypeError", "Receiver is not an array")),
        })),
        "flat" => simple(|elements, _| {
            let mut out = Vec::new();

            for element in elements.borrow().iter() {
                match element {
                    Value::Array(inner) => out.extend(inner.borrow().iter().cloned()),
                    element => out.push(element.clone()),
                }
            }

            Ok(Value::array(out))
        }),
        "map" => iterating(|interp, snapshot, callback, _| {
            let mut out = Vec::with_capacity(snapshot.len());

            for (i, element) in snapshot.into_iter().enumerate() {
                out.push(interp.call_value(callback, &Value::Undefined, &[element, Value::Number(i as f64)])?);
            }

            Ok(Value::array(out))
        }),
        "filter" => iterating(|interp, snapshot, callback, _| {
            let mut out = Vec::new();

            for (i, element) in snapshot.into_iter().enumerate() {
                if interp
                    .call_value(callback, &Value::Undefined, &[element.clone(), Value::Number(i as f64)])?
                    .truthy()
                {
                    out.push(element);
                }
            }

            Ok(Value::array(out))
        }),
        "forEach" => iterating(|interp, snapshot, callback, _| {
            for (i, element) in snapshot.into_iter().enumerate() {
                interp.call_value(callback, &Value::Undefined, &[element, Value::Number(i as f64)])?;
            }

            Ok(Value::Undefined)
        }),
        "find" => iterating(|interp, snapshot, callback, _| {
            for (i, element) in snapshot.into_iter().enumerate() {
                if interp
                    .call_value(callback, &Value::Undefined, &[element.clone(), Value::Number(i as f64)])?
                    .truthy()
                {
                    return Ok(element);
                }
            }

            Ok(Value::Undefined)
        }),
        "findIndex" => iterating(|interp, snapshot, callback, _| {
            for (i, element) in snapshot.into_iter().enumerate() {
                if interp
                    .call_value(callback, &Value::Undefined, &[element, Value::Number(i as f64)])?
                    .truthy()
                {
                    return Ok(Value::Number(i as f64));
                }
            }

            Ok(Value::Number(-1.0))
        }),
        "some" => iterating(|interp, snapshot, callback, _| {
            for (i, element) in snapshot.into_iter().enumerate() {
                if interp
                    .call_value(callback, &Value::Undefined, &[element, Value::Number(i as f64)])?
                    .truthy()
                {
                    return Ok(Value::Bool(true));
                }
            }

            Ok(Value::Bool(false))
        }),
        "every" => iterating(|interp, snapshot, callback, _| {
            for (i, element) in snapshot.into_iter().enumerate() {
                if !interp
                    .call_value(callback, &Value::Undefined, &[element, Value::Number(i as f64)])?
                    .truthy()
                {
                    return Ok(Value::Bool(false));
                }
            }

            Ok(Value::Bool(true))
        }),
        "reduce" => iterating(|interp, snapshot, callback, args| {
            let mut iter = snapshot.into_iter().enumerate();
            let mut acc = match args.get(1) {
                Some(initial) => initial.clone(),
                None => match iter.next() {
                    Some((_, first)) => first,
                    None => return Err(throw("TypeError", "Reduce of empty array with no initial value")),
                },
            };

            for (i, element) in iter {
                acc = interp.call_value(callback, &Value::Undefined, &[acc, element, Value::Number(i as f64)])?;
            }

            Ok(acc)
        }),
        "toString" => simple(|elements, _| Ok(Value::string(to_display_string(&Value::Array(elements.clone()))))),
        _ => None,
    }
}
