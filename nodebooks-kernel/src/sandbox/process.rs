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

//! Process facade: a redacted view of process identity whose environment
//! is a live proxy over the notebook's variable mapping. Lifecycle
//! mutation is a policy denial.

use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::{
    display::StreamName,
    runtime::value::*,
};

pub fn process_value(env: Rc<RefCell<IndexMap<String, String>>>) -> Value {
    let mut process = Obj::with_kind(ObjKind::Process);

    process.props.insert("env".into(), Value::object(Obj::with_kind(ObjKind::Env(env))));
    process.props.insert("platform".into(), Value::string(platform_tag()));
    process.props.insert("cwd".into(), Value::native("cwd", |interp, _, _| {
        let sandbox = interp.realm.sandbox.borrow().clone();

        Ok(match sandbox {
            Some(root) => Value::string(root.display().to_string()),
            None => Value::string(""),
        })
    }));

    for denied in ["chdir", "exit", "kill"] {
        process.props.insert(denied.into(), Value::native(denied, move |_, _, _| {
            Err(policy_error(&format!("process.{denied} is not allowed in notebooks")))
        }));
    }

    process.props.insert("stdout".into(), stream_value(StreamName::Stdout));
    process.props.insert("stderr".into(), stream_value(StreamName::Stderr));
    Value::object(process)
}

/* TTY-like wrapper: capability probes answer true, writes pass through to
 * the cell's output stream. */
fn stream_value(name: StreamName) -> Value {
    let mut stream = Obj::new();

    stream.props.insert("isTTY".into(), Value::Bool(true));
    stream.props.insert("columns".into(), Value::Number(80.0));
    stream.props.insert("write".into(), Value::native("write", move |interp, _, args| {
        let text = args.first().map(to_display_string).unwrap_or_default();

        interp.realm.channel.borrow_mut().stream(name, &text);
        Ok(Value::Bool(true))
    }));
    Value::object(stream)
}

fn platform_tag() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "win32",
        _ => "linux",
    }
}

#[cfg(test)]
mod test {
    use std::{cell::RefCell, rc::Rc};

    use indexmap::IndexMap;

    use crate::runtime::value::{ObjKind, Value};
    use crate::sandbox::process::process_value;

    #[test]
    fn env_is_live_view() {
        let env = Rc::new(RefCell::new(IndexMap::new()));

        env.borrow_mut().insert("API_KEY".to_string(), "secret".to_string());

        let process = process_value(env.clone());
        let Value::Object(obj) = &process else {
            panic!("process is not an object")
        };
        let env_prop = obj.borrow().props.get("env").cloned().unwrap();
        let Value::Object(env_obj) = &env_prop else {
            panic!("env is not an object")
        };

        match &env_obj.borrow().kind {
            ObjKind::Env(map) => assert_eq!(map.borrow().get("API_KEY").unwrap(), "secret"),
            _ => panic!("env proxy lost its kind"),
        };
    }
}
