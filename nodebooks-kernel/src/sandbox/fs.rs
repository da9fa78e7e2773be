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

//! Sandboxed filesystem facade. Every path argument is normalized and
//! proven to lie inside the sandbox before any I/O happens; behavior is
//! otherwise that of the underlying primitives.

use std::{fs, path::PathBuf, rc::Rc};

use crate::{
    runtime::{value::*, Interp},
    sandbox::{normalize_path_arg, resolve_in_sandbox},
};

/* Positional indices of path arguments per operation, shared by the
 * synchronous, callback, and promise variants. */
const PATH_ARGS: &[(&str, &[usize])] = &[
    ("readFile", &[0]),
    ("writeFile", &[0]),
    ("appendFile", &[0]),
    ("exists", &[0]),
    ("mkdir", &[0]),
    ("readdir", &[0]),
    ("stat", &[0]),
    ("unlink", &[0]),
    ("rmdir", &[0]),
    ("rm", &[0]),
    ("access", &[0]),
    ("copyFile", &[0, 1]),
    ("rename", &[0, 1]),
];

const SYNC_OPS: &[&str] = &[
    "readFile", "writeFile", "appendFile", "exists", "mkdir", "readdir", "stat", "unlink", "rmdir", "rm", "copyFile", "rename",
];
const CALLBACK_OPS: &[&str] = &["readFile", "writeFile", "appendFile", "exists", "mkdir", "readdir", "stat", "unlink", "rm"];
const PROMISE_OPS: &[&str] =
    &["readFile", "writeFile", "appendFile", "mkdir", "readdir", "stat", "unlink", "rmdir", "rm", "access", "copyFile", "rename"];

pub fn fs_module() -> Value {
    let mut module = Obj::new();

    for op in SYNC_OPS {
        module.props.insert(format!("{op}Sync"), Value::native(format!("{op}Sync"), {
            let op = *op;

            move |interp, _, args| perform(interp, op, args)
        }));
    }

    for op in CALLBACK_OPS {
        module.props.insert((*op).into(), Value::native(*op, {
            let op = *op;

            move |interp, _, args| {
                let (args, callback) = match args.split_last() {
                    Some((callback, args)) if callback.is_callable() => (args, callback.clone()),
                    _ => return Err(throw("TypeError", "Callback must be a function")),
                };
                let outcome = perform(interp, op, args);

                /* fs.exists is the historical odd one out: a bare boolean,
                 * no error argument. */
                if op == "exists" {
                    let value = outcome?;

                    return interp.call_value(&callback, &Value::Undefined, &[value]);
                }

                match outcome {
                    Ok(value) => interp.call_value(&callback, &Value::Undefined, &[Value::Null, value]),
                    Err(Signal::Throw(error)) => interp.call_value(&callback, &Value::Undefined, &[error]),
                    Err(signal) => Err(signal),
                }
            }
        }));
    }

    module.props.insert("promises".into(), promises_module());
    Value::object(module)
}

pub fn promises_module() -> Value {
    let mut module = Obj::new();

    for op in PROMISE_OPS {
        module.props.insert((*op).into(), Value::native(*op, {
            let op = *op;

            move |interp, _, args| {
                Ok(Value::Promise(Rc::new(match perform(interp, op, args) {
                    Ok(value) => PromiseState::Resolved(value),
                    Err(Signal::Throw(error)) => PromiseState::Rejected(error),
                    Err(signal) => return Err(signal),
                })))
            }
        }));
    }

    Value::object(module)
}

/// Runs one filesystem operation with its path arguments confined to the
/// sandbox root. Policy denials surface before any I/O.
fn perform(interp: &mut Interp, op: &str, args: &[Value]) -> Exec<Value> {
    let root = match interp.realm.sandbox.borrow().clone() {
        Some(root) => root,
        None => return Err(throw("Error", "Sandbox is not ready")),
    };
    let indices = PATH_ARGS.iter().find(|(name, _)| *name == op).map(|(_, idx)| *idx).unwrap_or(&[]);
    let mut paths: Vec<PathBuf> = Vec::new();

    for index in indices {
        let arg = args.get(*index).cloned().unwrap_or(Value::Undefined);

        if matches!(arg, Value::Undefined) {
            return Err(throw("TypeError", &format!("Missing path argument for fs.{op}")));
        }

        paths.push(resolve_in_sandbox(&root, &normalize_path_arg(&arg))?);
    }

    let path = paths.first().cloned().unwrap_or_default();
    let io = |error: std::io::Error| throw("Error", &format!("{op} '{}': {error}", path.display()));

    match op {
        "readFile" => fs::read_to_string(&path).map(Value::string).map_err(io),
        "writeFile" => {
            let data = args.get(1).map(to_display_string).unwrap_or_default();

            fs::write(&path, data).map(|_| Value::Undefined).map_err(io)
        }
        "appendFile" => {
            use std::io::Write;

            let data = args.get(1).map(to_display_string).unwrap_or_default();

            fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .and_then(|mut file| file.write_all(data.as_bytes()))
                .map(|_| Value::Undefined)
                .map_err(io)
        }
        "exists" => Ok(Value::Bool(path.exists())),
        "access" => match path.exists() {
            true => Ok(Value::Undefined),
            false => Err(io(std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"))),
        },
        "mkdir" => {
            let recursive = option_flag(args.get(1), "recursive");
            let result = match recursive {
                true => fs::create_dir_all(&path),
                false => fs::create_dir(&path),
            };

            result.map(|_| Value::Undefined).map_err(io)
        }
        "readdir" => {
            let entries = fs::read_dir(&path).map_err(io)?;
            let mut names = Vec::new();

            for entry in entries {
                names.push(Value::string(entry.map_err(io)?.file_name().to_string_lossy().to_string()));
            }

            Ok(Value::array(names))
        }
        "stat" => {
            let meta = fs::metadata(&path).map_err(io)?;
            let mut stat = Obj::new();
            let is_file = meta.is_file();
            let is_dir = meta.is_dir();

            stat.props.insert("size".into(), Value::Number(meta.len() as f64));
            stat.props.insert("isFile".into(), Value::native("isFile", move |_, _, _| Ok(Value::Bool(is_file))));
            stat.props.insert("isDirectory".into(), Value::native("isDirectory", move |_, _, _| Ok(Value::Bool(is_dir))));
            Ok(Value::object(stat))
        }
        "unlink" => fs::remove_file(&path).map(|_| Value::Undefined).map_err(io),
        "rmdir" => fs::remove_dir(&path).map(|_| Value::Undefined).map_err(io),
        "rm" => {
            let recursive = option_flag(args.get(1), "recursive");
            let force = option_flag(args.get(1), "force");
            let result = match (path.is_dir(), recursive) {
                (true, true) => fs::remove_dir_all(&path),
                (true, false) => fs::remove_dir(&path),
                (false, _) => fs::remove_file(&path),
            };

            match result {
                Ok(()) => Ok(Value::Undefined),
                Err(_) if force => Ok(Value::Undefined),
                Err(error) => Err(io(error)),
            }
        }
        "copyFile" => fs::copy(&paths[0], &paths[1]).map(|_| Value::Undefined).map_err(io),
        "rename" => fs::rename(&paths[0], &paths[1]).map(|_| Value::Undefined).map_err(io),
        _ => Err(throw("Error", &format!("fs.{op} is not implemented"))),
    }
}

fn option_flag(options: Option<&Value>, flag: &str) -> bool {
    match options {
        Some(Value::Object(obj)) => obj.borrow().props.get(flag).map(Value::truthy).unwrap_or(false),
        _ => false,
    }
}
