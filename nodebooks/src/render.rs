/*
 * nodebooks
 *
 * Copyright (C) 2024-2026 NodeBooks Contributors
 * SPDX-License-Identifier: GPL-3.0-only
 *
 * This program is free software: you can redistribute it and/or modify
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

use std::io::Write;

use nodebooks_kernel::{
    constants::{ARROW_CYAN, ARROW_RED, BOLD, DIM, RESET, UI_MIME},
    display::{Output, OutputSink, StreamName},
};
use serde_json::Value as JsonValue;

/// Live sink wiring stream records straight through to the terminal.
pub fn stream_sink() -> OutputSink {
    Box::new(|output| {
        if let Output::Stream { name, text } = output {
            match name {
                StreamName::Stdout => {
                    print!("{text}");
                    let _ = std::io::stdout().flush();
                }
                StreamName::Stderr => {
                    eprint!("{text}");
                    let _ = std::io::stderr().flush();
                }
            }
        }
    })
}

/// Renders the terminal view of non-stream outputs after a run. Streams
/// were already printed live by the sink.
pub fn render(outputs: &[Output]) {
    for output in outputs {
        match output {
            Output::Stream { .. } => {}
            Output::DisplayData { data, .. } => render_display(data, false),
            Output::UpdateDisplayData { data, .. } => render_display(data, true),
            Output::Error { name, message, .. } => {
                eprintln!("{} {}{name}{}: {message}", *ARROW_RED, *BOLD, *RESET);
            }
        }
    }
}

fn render_display(data: &indexmap::IndexMap<String, JsonValue>, update: bool) {
    let marker = match update {
        true => format!("{} {}update{}", *ARROW_CYAN, *DIM, *RESET),
        false => format!("{}", *ARROW_CYAN),
    };

    if let Some(text) = data.get("text/plain").and_then(|v| v.as_str()) {
        println!("{marker} {text}");
        return;
    }

    let payload = match data.get(UI_MIME) {
        Some(payload) => payload,
        None => return,
    };

    match payload.get("ui").and_then(|ui| ui.as_str()) {
        Some("json") => {
            let json = payload.get("json").unwrap_or(&JsonValue::Null);

            println!("{marker} {}", serde_json::to_string_pretty(json).unwrap_or_default());
        }
        Some("text") => println!("{marker} {}", payload.get("text").and_then(|v| v.as_str()).unwrap_or_default()),
        Some("markdown") => println!("{marker} {}", payload.get("markdown").and_then(|v| v.as_str()).unwrap_or_default()),
        Some("alert") => {
            let title = payload.get("title").and_then(|v| v.as_str()).unwrap_or("Alert");
            let text = payload.get("text").and_then(|v| v.as_str()).unwrap_or_default();

            eprintln!("{} {}{title}{}: {text}", *ARROW_RED, *BOLD, *RESET);
        }
        Some(kind) => println!("{marker} [{kind}] {}", serde_json::to_string(payload).unwrap_or_default()),
        None => {}
    }
}
