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

//! Long-lived per-notebook execution context: the global declaration
//! store, facades, timer registry, handler table, and the per-cell
//! session that rebinds the console emitter and display hooks.

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    path::PathBuf,
    rc::Rc,
    sync::{atomic::AtomicBool, Arc},
    time::Instant,
};

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::{
    config::{FetchRequest, HostFetch},
    display::{self, OutputChannel, OutputSink},
    interaction::HandlerTable,
    resolver,
    runtime::{
        value::{from_json, throw, to_display_string, Obj, ObjKind, PromiseState, Scope, Value},
        Interp,
    },
    sandbox::process::process_value,
    timers::{self, TimerRegistry},
    ui,
};

/// Shared mutable state reachable from native functions during
/// evaluation. Everything is reference-counted; cloning a realm is cheap
/// and aliases the same context.
#[derive(Clone)]
pub struct Realm {
    pub notebook: Rc<String>,
    pub globals: Scope,
    pub global_obj: Rc<RefCell<Obj>>,
    pub env: Rc<RefCell<IndexMap<String, String>>>,
    pub timers: Rc<RefCell<TimerRegistry>>,
    pub handlers: Rc<RefCell<HandlerTable>>,
    pub modules: Rc<RefCell<HashMap<String, Value>>>,
    pub channel: Rc<RefCell<OutputChannel>>,
    pub sandbox: Rc<RefCell<Option<PathBuf>>>,
    pub cell: Rc<RefCell<String>>,
    pub process: Value,
    counter: Rc<Cell<u64>>,
}

impl Realm {
    pub fn bump_counter(&self) -> u64 {
        let next = self.counter.get() + 1;

        self.counter.set(next);
        next
    }
}

pub struct ExecutionContext {
    realm: Realm,
}

impl ExecutionContext {
    pub fn new(notebook: &str, fetch: Option<HostFetch>) -> Self {
        let global_obj = Rc::new(RefCell::new(Obj::with_kind(ObjKind::Global)));
        let globals = Scope::root(global_obj.clone());
        let env = Rc::new(RefCell::new(IndexMap::new()));
        let process = process_value(env.clone());
        let realm = Realm {
            notebook: Rc::new(notebook.to_owned()),
            globals,
            global_obj: global_obj.clone(),
            env,
            timers: Rc::new(RefCell::new(TimerRegistry::new())),
            handlers: Rc::new(RefCell::new(HandlerTable::new())),
            modules: Rc::new(RefCell::new(HashMap::new())),
            channel: Rc::new(RefCell::new(OutputChannel::default())),
            sandbox: Rc::new(RefCell::new(None)),
            cell: Rc::new(RefCell::new(String::new())),
            process,
            counter: Rc::new(Cell::new(0)),
        };
        let global_value = Value::Object(global_obj);

        crate::runtime::builtins::install(&global_value);
        timers::install(&global_value);
        resolver::install(&global_value);

        {
            let mut obj = realm.global_obj.borrow_mut();

            obj.props.insert("console".into(), display::console_value());
            obj.props.insert("process".into(), realm.process.clone());
            obj.props.insert("fetch".into(), fetch_value(fetch));
            obj.props.insert("__nodebooks_ui__".into(), ui::ui_module());
        }

        Self { realm }
    }

    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    pub fn set_sandbox(&self, root: PathBuf) {
        *self.realm.sandbox.borrow_mut() = Some(root);
    }

    /// Replaces the live environment mapping in place; the env proxy and
    /// every captured closure observe the new variables immediately.
    pub fn update_env(&self, variables: &IndexMap<String, String>) {
        let mut env = self.realm.env.borrow_mut();

        env.clear();

        for (key, value) in variables {
            env.insert(key.clone(), value.clone());
        }
    }

    /// Prepares a cell session: fresh output channel bound to the caller's
    /// sinks, display hooks installed, per-cell bindings declared.
    /// `purge_handlers` is set for cell execution (re-running a cell
    /// replaces its registrations) and clear for interaction dispatch.
    pub fn begin_cell(
        &self,
        cell_id: &str,
        on_stream: Option<OutputSink>,
        on_display: Option<OutputSink>,
        purge_handlers: bool,
        deadline: Option<Instant>,
        interrupt: Arc<AtomicBool>,
    ) -> CellSession {
        *self.realm.channel.borrow_mut() = OutputChannel::new(on_stream, on_display);
        *self.realm.cell.borrow_mut() = cell_id.to_owned();

        if purge_handlers {
            self.realm.handlers.borrow_mut().remove_cell(cell_id);
        }

        {
            let mut obj = self.realm.global_obj.borrow_mut();

            obj.props.insert("__display".into(), Value::native("__display", |interp, _, args| {
                let value = args.first().cloned().unwrap_or(Value::Undefined);
                let id = args.get(1).map(to_display_string);

                ui::emit_display(interp, &value, id)
            }));
            obj.props.insert("__update_display".into(), Value::native("__update_display", |interp, _, args| {
                let id = args.first().map(to_display_string).unwrap_or_default();
                let value = args.get(1).cloned().unwrap_or(Value::Undefined);

                ui::emit_update(interp, &id, &value)
            }));
        }

        let scope = self.realm.globals.child();
        let sandbox = self.realm.sandbox.borrow().clone().unwrap_or_default();
        let mut module = Obj::new();
        let exports = Value::object(Obj::new());

        module.props.insert("exports".into(), exports.clone());
        scope.declare("__filename", Value::string(sandbox.join(crate::constants::ENTRY_MODULE).display().to_string()));
        scope.declare("__dirname", Value::string(sandbox.display().to_string()));
        scope.declare("module", Value::object(module));
        scope.declare("exports", exports);
        scope.declare("this", Value::Object(self.realm.global_obj.clone()));

        CellSession {
            interp: Interp::new(self.realm.clone(), deadline, interrupt),
            scope,
        }
    }

    /// Removed on finally: the display hooks must not outlive the cell.
    pub fn finish_cell(&self) {
        let mut obj = self.realm.global_obj.borrow_mut();

        obj.props.shift_remove("__display");
        obj.props.shift_remove("__update_display");
    }
}

pub struct CellSession {
    pub interp: Interp,
    pub scope: Scope,
}

fn fetch_value(hook: Option<HostFetch>) -> Value {
    let hook = match hook {
        Some(hook) => hook,
        None => {
            return Value::native("fetch", |_, _, _| {
                Err(throw("Error", "fetch is not available: the host provided no fetch hook"))
            })
        }
    };

    Value::native("fetch", move |_, _, args| {
        let url = args.first().map(to_display_string).unwrap_or_default();
        let options = args.get(1).cloned();
        let request = FetchRequest {
            url,
            method: option_string(&options, "method").unwrap_or_else(|| "GET".into()),
            headers: Vec::new(),
            body: option_string(&options, "body"),
        };

        match hook(request) {
            Ok(response) => {
                let mut obj = Obj::new();
                let status = response.status;
                let body = Rc::new(response.body);

                obj.props.insert("status".into(), Value::Number(status as f64));
                obj.props.insert("ok".into(), Value::Bool((200 .. 300).contains(&status)));
                obj.props.insert("text".into(), Value::native("text", {
                    let body = body.clone();

                    move |_, _, _| Ok(Value::Promise(Rc::new(PromiseState::Resolved(Value::string(body.to_string())))))
                }));
                obj.props.insert("json".into(), Value::native("json", move |_, _, _| {
                    Ok(Value::Promise(Rc::new(match serde_json::from_str::<JsonValue>(&body) {
                        Ok(json) => PromiseState::Resolved(from_json(&json)),
                        Err(error) => PromiseState::Rejected(crate::runtime::value::make_error(
                            "SyntaxError",
                            &format!("Unexpected token in JSON: {error}"),
                        )),
                    })))
                }));
                Ok(Value::object(obj))
            }
            Err(message) => Err(throw("TypeError", &format!("fetch failed: {message}"))),
        }
    })
}

fn option_string(options: &Option<Value>, key: &str) -> Option<String> {
    match options {
        Some(Value::Object(obj)) => obj.borrow().props.get(key).map(to_display_string),
        _ => None,
    }
}
