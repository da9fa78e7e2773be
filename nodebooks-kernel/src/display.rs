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

//! Display and console pipeline: output records, the per-cell output
//! channel, console facade, and return-value coercion.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map as JsonMap, Value as JsonValue};

use crate::{
    constants::UI_MIME,
    runtime::value::{to_json, ObjKind, Value},
    ui,
};

pub mod inspect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamName {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub started: i64,
    pub ended: i64,
    pub status: ExecutionStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Output {
    Stream {
        name: StreamName,
        text: String,
    },
    DisplayData {
        data: IndexMap<String, JsonValue>,
        metadata: JsonMap<String, JsonValue>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        display_id: Option<String>,
    },
    UpdateDisplayData {
        data: IndexMap<String, JsonValue>,
        metadata: JsonMap<String, JsonValue>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        display_id: Option<String>,
    },
    Error {
        name: String,
        message: String,
        traceback: Vec<String>,
    },
}

pub type OutputSink = Box<dyn Fn(&Output) + Send>;

/// Ordered output list for the cell currently executing, with optional
/// caller-provided sinks observing streams and displays as they land.
#[derive(Default)]
pub struct OutputChannel {
    outputs: Vec<Output>,
    on_stream: Option<OutputSink>,
    on_display: Option<OutputSink>,
}

impl OutputChannel {
    pub fn new(on_stream: Option<OutputSink>, on_display: Option<OutputSink>) -> Self {
        Self {
            outputs: Vec::new(),
            on_stream,
            on_display,
        }
    }

    pub fn stream(&mut self, name: StreamName, text: &str) {
        let record = Output::Stream {
            name,
            text: text.to_owned(),
        };

        if let Some(sink) = &self.on_stream {
            sink(&record);
        }

        self.outputs.push(record);
    }

    pub fn display(&mut self, data: IndexMap<String, JsonValue>, metadata: JsonMap<String, JsonValue>, display_id: Option<String>) {
        let record = Output::DisplayData {
            data,
            metadata,
            display_id,
        };

        if let Some(sink) = &self.on_display {
            sink(&record);
        }

        self.outputs.push(record);
    }

    pub fn update_display(&mut self, data: IndexMap<String, JsonValue>, mut metadata: JsonMap<String, JsonValue>, display_id: String) {
        metadata.insert("display_id".into(), JsonValue::String(display_id.clone()));

        let record = Output::UpdateDisplayData {
            data,
            metadata,
            display_id: Some(display_id),
        };

        if let Some(sink) = &self.on_display {
            sink(&record);
        }

        self.outputs.push(record);
    }

    pub fn error(&mut self, name: &str, message: &str, traceback: Vec<String>) {
        self.outputs.push(Output::Error {
            name: name.to_owned(),
            message: message.to_owned(),
            traceback,
        });
    }

    pub fn push(&mut self, record: Output) {
        self.outputs.push(record);
    }

    pub fn take(&mut self) -> Vec<Output> {
        std::mem::take(&mut self.outputs)
    }
}

/// Console facade: log/info/debug stream to stdout, warn/error to stderr,
/// arguments formatted by the deterministic pretty-printer.
pub fn console_value() -> Value {
    let mut console = crate::runtime::value::Obj::new();
    let methods: &[(&str, StreamName)] = &[
        ("log", StreamName::Stdout),
        ("info", StreamName::Stdout),
        ("debug", StreamName::Stdout),
        ("warn", StreamName::Stderr),
        ("error", StreamName::Stderr),
    ];

    for (name, stream) in methods {
        let stream = *stream;

        console.props.insert((*name).into(), Value::native(*name, move |interp, _, args| {
            let text = format!("{}\n", inspect::console_format(args));

            interp.realm.channel.borrow_mut().stream(stream, &text);
            Ok(Value::Undefined)
        }));
    }

    Value::object(console)
}

/// Coerces a captured cell value to a display payload:
/// undefined and callables produce nothing, UI-marked values surface under
/// the reserved UI MIME type, JSON-shaped values round-trip into a `json`
/// component, and anything else falls back to a text/plain inspection.
pub fn coerce_value(value: &Value) -> Option<(IndexMap<String, JsonValue>, JsonMap<String, JsonValue>)> {
    if matches!(value, Value::Undefined) || value.is_callable() {
        return None;
    }

    if let Value::Object(obj) = value {
        if matches!(obj.borrow().kind, ObjKind::UiDisplay) {
            if let Some(payload) = ui::payload_json(value) {
                let mut data = IndexMap::new();

                data.insert(UI_MIME.to_owned(), payload);
                return Some((data, JsonMap::new()));
            }
        }
    }

    let mut data = IndexMap::new();

    match to_json(value) {
        Some(json) => {
            data.insert(UI_MIME.to_owned(), json!({ "ui": "json", "json": json }));
        }
        None => {
            data.insert("text/plain".to_owned(), JsonValue::String(inspect::inspect(value, 4)));
        }
    }

    Some((data, JsonMap::new()))
}

pub fn alert_display(level: &str, title: &str, text: &str) -> Output {
    let mut data = IndexMap::new();

    data.insert(UI_MIME.to_owned(), json!({ "ui": "alert", "level": level, "title": title, "text": text }));
    Output::DisplayData {
        data,
        metadata: JsonMap::new(),
        display_id: None,
    }
}

#[cfg(test)]
mod test {
    use crate::constants::UI_MIME;
    use crate::display::*;
    use crate::runtime::value::{make_error, Obj, Value};

    #[test]
    fn undefined_and_callables_produce_no_display() {
        assert!(coerce_value(&Value::Undefined).is_none());
        assert!(coerce_value(&Value::native("f", |_, _, _| Ok(Value::Undefined))).is_none());
    }

    #[test]
    fn json_shaped_values_become_json_components() {
        let value = Value::array(vec![Value::Number(1.0), Value::Number(2.0)]);
        let (data, _) = coerce_value(&value).unwrap();
        let payload = data.get(UI_MIME).unwrap();

        assert_eq!(payload["ui"], "json");
        assert_eq!(payload["json"], serde_json::json!([1.0, 2.0]));
    }

    #[test]
    fn non_json_values_fall_back_to_text() {
        let error = make_error("TypeError", "nope");
        let (data, _) = coerce_value(&error).unwrap();

        assert!(data.contains_key("text/plain"));
        assert!(data.get("text/plain").unwrap().as_str().unwrap().contains("nope"));
    }

    #[test]
    fn stream_records_keep_order() {
        let mut channel = OutputChannel::new(None, None);

        channel.stream(StreamName::Stdout, "a\n");
        channel.stream(StreamName::Stderr, "b\n");

        let outputs = channel.take();

        assert_eq!(outputs.len(), 2);
        assert!(matches!(&outputs[0], Output::Stream { name: StreamName::Stdout, text } if text == "a\n"));
        assert!(matches!(&outputs[1], Output::Stream { name: StreamName::Stderr, text } if text == "b\n"));
    }

    #[test]
    fn plain_object_display() {
        let mut obj = Obj::new();

        obj.props.insert("a".into(), Value::Number(1.0));

        let (data, _) = coerce_value(&Value::object(obj)).unwrap();

        assert_eq!(data.get(UI_MIME).unwrap()["json"], serde_json::json!({ "a": 1.0 }));
    }
}
