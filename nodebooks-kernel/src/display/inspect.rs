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

//! Deterministic pretty-printer for cell values: no colors, entries break
//! onto their own lines past a fixed width, cycles are preserved as
//! `[Circular]`, and the kernel facades inspect as fixed sentinels so
//! logging the context never dumps their internals.

use std::rc::Rc;

use crate::runtime::value::{error_message, error_name, js_number_string, Callable, ObjKind, Value};

const BREAK_LENGTH: usize = 80;

pub fn inspect(value: &Value, depth: usize) -> String {
    let mut seen = Vec::new();

    inspect_inner(value, depth, 0, &mut seen)
}

/// Formats console arguments: top-level strings print raw, everything else
/// is inspected at the console's depth.
pub fn console_format(args: &[Value]) -> String {
    let parts: Vec<String> = args
        .iter()
        .map(|arg| match arg {
            Value::String(text) => text.to_string(),
            arg => inspect(arg, 2),
        })
        .collect();

    parts.join(" ")
}

fn inspect_inner(value: &Value, depth: usize, indent: usize, seen: &mut Vec<*const ()>) -> String {
    match value {
        Value::Undefined => "undefined".into(),
        Value::Null => "null".into(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => js_number_string(*n),
        Value::String(text) => format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'").replace('\n', "\\n")),
        Value::Function(callable) => match &**callable {
            Callable::User(f) if f.is_arrow => "[Function (anonymous)]".into(),
            callable => match callable.name() {
                Some(name) => format!("[Function: {name}]"),
                None => "[Function (anonymous)]".into(),
            },
        },
        Value::Class(class) => match class.name.is_empty() {
            true => "[class (anonymous)]".into(),
            false => format!("[class {}]", class.name),
        },
        Value::Promise(state) => match &**state {
            crate::runtime::value::PromiseState::Resolved(inner) => {
                format!("Promise {{ {} }}", inspect_inner(inner, depth.saturating_sub(1), indent, seen))
            }
            crate::runtime::value::PromiseState::Rejected(inner) => {
                format!("Promise {{ <rejected> {} }}", inspect_inner(inner, depth.saturating_sub(1), indent, seen))
            }
        },
        Value::Array(elements) => {
            let ptr = Rc::as_ptr(elements) as *const ();

            if seen.contains(&ptr) {
                return "[Circular]".into();
            }

            if depth == 0 {
                return "[Array]".into();
            }

            seen.push(ptr);

            let parts: Vec<String> = elements
                .borrow()
                .iter()
                .map(|element| inspect_inner(element, depth - 1, indent + 2, seen))
                .collect();

            seen.pop();
            wrap_entries("[", parts, "]", indent)
        }
        Value::Object(obj) => {
            let ptr = Rc::as_ptr(obj) as *const ();

            if seen.contains(&ptr) {
                return "[Circular]".into();
            }

            let borrowed = obj.borrow();

            match &borrowed.kind {
                ObjKind::Global => return "[NotebookGlobal]".into(),
                ObjKind::Process => return "[Sandboxed process]".into(),
                ObjKind::Env(map) => {
                    let mut entries: Vec<(String, String)> = map.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect();

                    entries.sort();

                    let parts: Vec<String> = entries.into_iter().map(|(k, v)| format!("{}: '{}'", k, v)).collect();

                    return format!("NotebookEnv {}", wrap_entries("{", parts, "}", indent));
                }
                ObjKind::Error => return format!("{}: {}", error_name(value), error_message(value)),
                _ => {}
            }

            if depth == 0 {
                return "[Object]".into();
            }

            seen.push(ptr);

            let mut parts = Vec::new();

            for (key, prop) in &borrowed.props {
                let key = match is_identifier(key) {
                    true => key.clone(),
                    false => format!("'{key}'"),
                };

                parts.push(format!("{key}: {}", inspect_inner(prop, depth - 1, indent + 2, seen)));
            }

            seen.pop();

            let class_prefix = borrowed.class.as_ref().map(|c| format!("{} ", c.name)).unwrap_or_default();

            match parts.is_empty() {
                true => format!("{class_prefix}{{}}"),
                false => format!("{class_prefix}{}", wrap_entries("{", parts, "}", indent)),
            }
        }
    }
}

/* Entries render on one line while they fit the break length, one per line
 * beyond it. */
fn wrap_entries(open: &str, parts: Vec<String>, close: &str, indent: usize) -> String {
    if parts.is_empty() {
        return format!("{open}{close}");
    }

    let inline = match open {
        "[" => format!("[ {} ]", parts.join(", ")),
        _ => format!("{{ {} }}", parts.join(", ")),
    };

    if indent + inline.len() <= BREAK_LENGTH && !inline.contains('\n') {
        return inline;
    }

    let pad = " ".repeat(indent + 2);
    let body = parts.join(&format!(",\n{pad}"));

    format!("{open}\n{pad}{body}\n{}{close}", " ".repeat(indent))
}

fn is_identifier(key: &str) -> bool {
    !key.is_empty()
        && key.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod test {
    use std::{cell::RefCell, rc::Rc};

    use indexmap::IndexMap;

    use crate::display::inspect::*;
    use crate::runtime::value::{Obj, ObjKind, Value};

    #[test]
    fn primitives() {
        assert_eq!(inspect(&Value::Undefined, 4), "undefined");
        assert_eq!(inspect(&Value::Number(1.5), 4), "1.5");
        assert_eq!(inspect(&Value::string("hi"), 4), "'hi'");
    }

    #[test]
    fn console_strings_are_raw() {
        assert_eq!(console_format(&[Value::string("a"), Value::Number(1.0)]), "a 1");
    }

    #[test]
    fn small_collections_stay_inline() {
        let value = Value::array(vec![Value::Number(1.0), Value::Number(2.0)]);

        assert_eq!(inspect(&value, 4), "[ 1, 2 ]");
    }

    #[test]
    fn cycles_are_preserved() {
        let arr = Rc::new(RefCell::new(Vec::new()));

        arr.borrow_mut().push(Value::Array(arr.clone()));

        let text = inspect(&Value::Array(arr), 4);

        assert!(text.contains("[Circular]"));
    }

    #[test]
    fn env_inspects_with_tag_and_sorted_keys() {
        let map = Rc::new(RefCell::new(IndexMap::new()));

        map.borrow_mut().insert("ZED".to_string(), "1".to_string());
        map.borrow_mut().insert("ALPHA".to_string(), "2".to_string());

        let env = Value::object(Obj::with_kind(ObjKind::Env(map)));
        let text = inspect(&env, 4);

        assert!(text.starts_with("NotebookEnv"));
        assert!(text.find("ALPHA").unwrap() < text.find("ZED").unwrap());
    }

    #[test]
    fn global_and_process_sentinels() {
        let global = Value::object(Obj::with_kind(ObjKind::Global));

        assert_eq!(inspect(&global, 4), "[NotebookGlobal]");

        let process = Value::object(Obj::with_kind(ObjKind::Process));

        assert_eq!(inspect(&process, 4), "[Sandboxed process]");
    }

    #[test]
    fn depth_limit() {
        let inner = Value::array(vec![Value::Number(1.0)]);
        let value = Value::array(vec![Value::array(vec![inner])]);

        assert_eq!(inspect(&value, 1), "[ [Array] ]");
    }
}
