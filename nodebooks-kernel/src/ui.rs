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

//! The injected `@nodebooks/ui` helper package: component constructors
//! whose values display under the reserved UI MIME type, plus streaming
//! display emission and interaction registration.

use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::{
    display::coerce_value,
    interaction::{handler_id, Handler},
    runtime::{
        value::{throw, to_display_string, to_json, Exec, Obj, ObjKind, Value},
        Interp,
    },
};

/// Documented component discriminators.
pub const UI_KINDS: &[&str] = &[
    "text",
    "markdown",
    "html",
    "json",
    "table",
    "dataSummary",
    "image",
    "vegaLite",
    "plotly",
    "heatmap",
    "networkGraph",
    "plot3d",
    "map",
    "geojson",
    "alert",
    "badge",
    "metric",
    "progress",
    "spinner",
    "container",
    "button",
    "slider",
    "textInput",
];

/* Single string-argument components: helper(text) → { ui, <field>: text }. */
const TEXT_COMPONENTS: &[(&str, &str)] = &[
    ("text", "text"),
    ("markdown", "markdown"),
    ("html", "html"),
    ("image", "src"),
    ("spinner", "text"),
    ("badge", "text"),
];

/* Option-object components: helper(opts) → { ui, ...opts }. */
const OPTION_COMPONENTS: &[&str] = &[
    "table",
    "dataSummary",
    "vegaLite",
    "plotly",
    "heatmap",
    "networkGraph",
    "plot3d",
    "map",
    "geojson",
    "alert",
    "metric",
    "progress",
];

const INTERACTIVE_COMPONENTS: &[&str] = &["button", "slider", "textInput"];

pub fn ui_module() -> Value {
    let mut module = Obj::new();

    for (name, field) in TEXT_COMPONENTS {
        module.props.insert((*name).into(), Value::native(*name, {
            let (name, field) = (*name, *field);

            move |_, _, args| {
                let mut payload = component(name);

                payload
                    .props
                    .insert(field.into(), Value::string(args.first().map(to_display_string).unwrap_or_default()));
                merge_options(&mut payload, args.get(1));
                Ok(Value::object(payload))
            }
        }));
    }

    for name in OPTION_COMPONENTS {
        module.props.insert((*name).into(), Value::native(*name, {
            let name = *name;

            move |_, _, args| {
                let mut payload = component(name);

                merge_options(&mut payload, args.first());
                Ok(Value::object(payload))
            }
        }));
    }

    for name in INTERACTIVE_COMPONENTS {
        module.props.insert((*name).into(), Value::native(*name, {
            let name = *name;

            move |interp, _, args| interactive_component(interp, name, args.first())
        }));
    }

    module.props.insert("json".into(), Value::native("json", |_, _, args| {
        let mut payload = component("json");

        payload.props.insert("json".into(), args.first().cloned().unwrap_or(Value::Null));
        Ok(Value::object(payload))
    }));
    module.props.insert("container".into(), Value::native("container", |_, _, args| {
        let mut payload = component("container");

        payload.props.insert("children".into(), args.first().cloned().unwrap_or_else(|| Value::array(Vec::new())));
        merge_options(&mut payload, args.get(1));
        Ok(Value::object(payload))
    }));
    module.props.insert("display".into(), Value::native("display", |interp, _, args| {
        let value = args.first().cloned().unwrap_or(Value::Undefined);
        let id = args.get(1).map(to_display_string);

        emit_display(interp, &value, id)
    }));
    module.props.insert("updateDisplay".into(), Value::native("updateDisplay", |interp, _, args| {
        let id = args.first().map(to_display_string).unwrap_or_default();
        let value = args.get(1).cloned().unwrap_or(Value::Undefined);

        emit_update(interp, &id, &value)
    }));
    Value::object(module)
}

fn component(ui: &str) -> Obj {
    let mut payload = Obj::with_kind(ObjKind::UiDisplay);

    payload.props.insert("ui".into(), Value::string(ui));
    payload
}

fn merge_options(payload: &mut Obj, options: Option<&Value>) {
    if let Some(Value::Object(options)) = options {
        for (key, value) in &options.borrow().props {
            if key == "onEvent" || key == "ui" {
                continue;
            }

            payload.props.insert(key.clone(), value.clone());
        }
    }
}

/// Interactive components carry a component identifier; an `onEvent`
/// callable becomes a handler registration embedded as
/// `action.handlerId`.
fn interactive_component(interp: &mut Interp, name: &str, options: Option<&Value>) -> Exec<Value> {
    let mut payload = component(name);

    merge_options(&mut payload, options);

    let counter = interp.realm.bump_counter();
    let component_id = format!("c{counter}");

    payload.props.insert("componentId".into(), Value::string(component_id.clone()));

    let on_event = match options {
        Some(Value::Object(options)) => options.borrow().props.get("onEvent").cloned(),
        _ => None,
    };

    if let Some(callback) = on_event {
        if !callback.is_callable() {
            return Err(throw("TypeError", &format!("{name} onEvent must be a function")));
        }

        let cell = interp.realm.cell.borrow().clone();
        let id = handler_id(&interp.realm.notebook, &cell, counter);

        interp.realm.handlers.borrow_mut().register(Handler {
            id: id.clone(),
            cell,
            component: Some(component_id),
            callback,
        });

        let mut action = Obj::new();

        action.props.insert("handlerId".into(), Value::string(id));
        payload.props.insert("action".into(), Value::object(action));
    }

    Ok(Value::object(payload))
}

/// Serializes a UI-marked payload, dropping internal keys. Returns None
/// when the value does not validate against the component schema.
pub fn payload_json(value: &Value) -> Option<JsonValue> {
    let json = to_json(value)?;
    let map = json.as_object()?;
    let ui = map.get("ui")?.as_str()?;

    if !UI_KINDS.contains(&ui) {
        return None;
    }

    let stripped: JsonMap<String, JsonValue> = map.iter().filter(|(k, _)| !k.starts_with("__")).map(|(k, v)| (k.clone(), v.clone())).collect();

    Some(JsonValue::Object(stripped))
}

/// Streaming display emission shared by `display`, the `__display` hook,
/// and interaction callbacks. Returns a handle whose `update` rebinds the
/// same display identifier.
pub fn emit_display(interp: &mut Interp, value: &Value, id: Option<String>) -> Exec<Value> {
    let (data, mut metadata) = match coerce_value(value) {
        Some(coerced) => coerced,
        None => return Ok(Value::Undefined),
    };
    let display_id = id.unwrap_or_else(|| format!("d{}", interp.realm.bump_counter()));

    metadata.insert("streamed".into(), JsonValue::Bool(true));
    interp
        .realm
        .channel
        .borrow_mut()
        .display(data, metadata, Some(display_id.clone()));

    let mut handle = Obj::new();

    handle.props.insert("displayId".into(), Value::string(display_id.clone()));
    handle.props.insert("update".into(), Value::native("update", move |interp, _, args| {
        let value = args.first().cloned().unwrap_or(Value::Undefined);

        emit_update(interp, &display_id, &value)
    }));
    Ok(Value::object(handle))
}

pub fn emit_update(interp: &mut Interp, display_id: &str, value: &Value) -> Exec<Value> {
    let (data, mut metadata) = match coerce_value(value) {
        Some(coerced) => coerced,
        None => return Ok(Value::Undefined),
    };

    metadata.insert("streamed".into(), JsonValue::Bool(true));
    interp
        .realm
        .channel
        .borrow_mut()
        .update_display(data, metadata, display_id.to_owned());
    Ok(Value::Undefined)
}

// On-disk injected package

pub const UI_PACKAGE_JSON: &str = r#"{
  "name": "@nodebooks/ui",
  "version": "0.2.1",
  "private": true,
  "main": "index.js",
  "types": "index.d.ts"
}
"#;

pub const UI_INDEX_JS: &str = r#"'use strict';

// Provided by the notebook runtime; resolution is intercepted before this
// file loads, and the module below is the same object the runtime injects.
module.exports = globalThis.__nodebooks_ui__;
"#;

pub const UI_INDEX_DTS: &str = r#"export interface DisplayHandle {
  displayId: string;
  update(value: unknown): void;
}

export interface ActionRef {
  handlerId: string;
}

export function text(text: string): unknown;
export function markdown(markdown: string): unknown;
export function html(html: string): unknown;
export function json(value: unknown): unknown;
export function table(options: { rows: unknown[]; columns?: string[] }): unknown;
export function dataSummary(options: { data: unknown }): unknown;
export function image(src: string, options?: Record<string, unknown>): unknown;
export function vegaLite(options: { spec: unknown }): unknown;
export function plotly(options: { data: unknown; layout?: unknown }): unknown;
export function heatmap(options: Record<string, unknown>): unknown;
export function networkGraph(options: Record<string, unknown>): unknown;
export function plot3d(options: Record<string, unknown>): unknown;
export function map(options: Record<string, unknown>): unknown;
export function geojson(options: Record<string, unknown>): unknown;
export function alert(options: { level?: string; title?: string; text?: string }): unknown;
export function badge(text: string, options?: Record<string, unknown>): unknown;
export function metric(options: { label?: string; value?: unknown }): unknown;
export function progress(options: { value?: number; max?: number }): unknown;
export function spinner(text?: string): unknown;
export function container(children: unknown[], options?: Record<string, unknown>): unknown;
export function button(options: { label?: string; onEvent?: (event: unknown) => void }): unknown;
export function slider(options: {
  min?: number;
  max?: number;
  step?: number;
  value?: number;
  label?: string;
  onEvent?: (event: unknown) => void;
}): unknown;
export function textInput(options: {
  label?: string;
  value?: string;
  placeholder?: string;
  onEvent?: (event: unknown) => void;
}): unknown;
export function display(value: unknown, displayId?: string): DisplayHandle;
export function updateDisplay(displayId: string, value: unknown): void;
"#;

#[cfg(test)]
mod test {
    use crate::runtime::value::Value;
    use crate::ui::*;

    #[test]
    fn payload_requires_known_discriminator() {
        let mut payload = component("markdown");

        payload.props.insert("markdown".into(), Value::string("# hi"));

        let json = payload_json(&Value::object(payload)).unwrap();

        assert_eq!(json["ui"], "markdown");

        let mut bogus = component("markdown");

        bogus.props.insert("ui".into(), Value::string("nonsense"));
        assert!(payload_json(&Value::object(bogus)).is_none());
    }

    #[test]
    fn internal_keys_are_stripped() {
        let mut payload = component("text");

        payload.props.insert("text".into(), Value::string("x"));
        payload.props.insert("__internal".into(), Value::string("y"));

        let json = payload_json(&Value::object(payload)).unwrap();

        assert!(json.get("__internal").is_none());
    }

    #[test]
    fn ui_kind_list_matches_helpers() {
        let module = ui_module();
        let Value::Object(obj) = &module else {
            panic!("ui module is not an object")
        };

        for kind in UI_KINDS {
            assert!(obj.borrow().props.contains_key(*kind), "missing helper for {kind}");
        }
    }
}
