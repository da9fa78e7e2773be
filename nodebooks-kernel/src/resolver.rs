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

//! Module resolver and policy gate: the only resolver user code can
//! observe. Restricted capabilities resolve to facades, denied modules
//! raise in-band, and everything else goes through the ordinary resolver
//! rooted in the sandbox.

use std::path::{Component, Path};

use crate::{
    constants::UI_PACKAGE,
    runtime::{module, value::*, Interp},
    sandbox::{
        fs as fs_facade,
        net::{dgram_module, net_module, NetKind},
    },
    ui,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Injected,
    WrapFs,
    WrapFsPromises,
    WrapProcess,
    WrapNet(NetKind),
    WrapDgram,
    Deny(&'static str),
    Builtin(&'static str),
    Sandbox,
}

pub fn resolve_name(name: &str) -> Resolution {
    let name = name.strip_prefix("node:").unwrap_or(name);

    match name {
        UI_PACKAGE => Resolution::Injected,
        "fs" => Resolution::WrapFs,
        "fs/promises" => Resolution::WrapFsPromises,
        "process" => Resolution::WrapProcess,
        "child_process" => Resolution::Deny("child_process"),
        "http" => Resolution::WrapNet(NetKind::Http),
        "https" => Resolution::WrapNet(NetKind::Https),
        "http2" => Resolution::WrapNet(NetKind::Http2),
        "net" => Resolution::WrapNet(NetKind::Net),
        "tls" => Resolution::WrapNet(NetKind::Tls),
        "dgram" => Resolution::WrapDgram,
        "path" | "path/posix" => Resolution::Builtin("path"),
        _ => Resolution::Sandbox,
    }
}

pub fn require(interp: &mut Interp, name: &str) -> Exec<Value> {
    let resolution = resolve_name(name);

    if resolution != Resolution::Sandbox {
        let key = format!("gate:{name}");

        if let Some(cached) = interp.realm.modules.borrow().get(&key) {
            return Ok(cached.clone());
        }

        let module = match resolution {
            Resolution::Injected => ui::ui_module(),
            Resolution::WrapFs => fs_facade::fs_module(),
            Resolution::WrapFsPromises => fs_facade::promises_module(),
            Resolution::WrapProcess => interp.realm.process.clone(),
            Resolution::WrapNet(kind) => net_module(kind),
            Resolution::WrapDgram => dgram_module(),
            Resolution::Builtin(_) => path_module(),
            Resolution::Deny(denied) => return Err(policy_error(&format!("Access to module '{denied}' is not allowed"))),
            Resolution::Sandbox => unreachable!(),
        };

        interp.realm.modules.borrow_mut().insert(key, module.clone());
        return Ok(module);
    }

    module::resolve_sandbox(interp, name)
}

/// Binds `require` on the execution context. The gate is consulted for
/// every lookup; before the sandbox is ready, ordinary resolution fails.
pub fn install(global: &Value) {
    if let Value::Object(obj) = global {
        obj.borrow_mut().props.insert("require".into(), Value::native("require", |interp, _, args| {
            let name = match args.first() {
                Some(Value::String(name)) => name.to_string(),
                _ => return Err(throw("TypeError", "Module specifier must be a string")),
            };

            require(interp, &name)
        }));
    }
}

fn path_module() -> Value {
    let mut module = Obj::new();

    module.props.insert("sep".into(), Value::string(std::path::MAIN_SEPARATOR.to_string()));
    module.props.insert("join".into(), Value::native("join", |_, _, args| {
        let mut path = std::path::PathBuf::new();

        for arg in args {
            path.push(to_display_string(arg));
        }

        Ok(Value::string(normalize_lexically(&path)))
    }));
    module.props.insert("resolve".into(), Value::native("resolve", |interp, _, args| {
        let mut path = interp.realm.sandbox.borrow().clone().unwrap_or_default();

        for arg in args {
            let part = to_display_string(arg);

            match Path::new(&part).is_absolute() {
                true => path = std::path::PathBuf::from(part),
                false => path.push(part),
            }
        }

        Ok(Value::string(normalize_lexically(&path)))
    }));
    module.props.insert("dirname".into(), Value::native("dirname", |_, _, args| {
        let path = args.first().map(to_display_string).unwrap_or_default();

        Ok(Value::string(
            Path::new(&path).parent().map(|p| p.display().to_string()).unwrap_or_else(|| ".".into()),
        ))
    }));
    module.props.insert("basename".into(), Value::native("basename", |_, _, args| {
        let path = args.first().map(to_display_string).unwrap_or_default();

        Ok(Value::string(
            Path::new(&path).file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default(),
        ))
    }));
    module.props.insert("extname".into(), Value::native("extname", |_, _, args| {
        let path = args.first().map(to_display_string).unwrap_or_default();

        Ok(Value::string(
            Path::new(&path).extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default(),
        ))
    }));
    Value::object(module)
}

fn normalize_lexically(path: &Path) -> String {
    let mut out = std::path::PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            component => out.push(component),
        }
    }

    out.display().to_string()
}

#[cfg(test)]
mod test {
    use crate::resolver::*;

    #[test]
    fn gate_table() {
        assert_eq!(resolve_name("@nodebooks/ui"), Resolution::Injected);
        assert_eq!(resolve_name("fs"), Resolution::WrapFs);
        assert_eq!(resolve_name("node:fs"), Resolution::WrapFs);
        assert_eq!(resolve_name("fs/promises"), Resolution::WrapFsPromises);
        assert_eq!(resolve_name("child_process"), Resolution::Deny("child_process"));
        assert_eq!(resolve_name("http"), Resolution::WrapNet(NetKind::Http));
        assert_eq!(resolve_name("dgram"), Resolution::WrapDgram);
        assert_eq!(resolve_name("left-pad"), Resolution::Sandbox);
        assert_eq!(resolve_name("./local"), Resolution::Sandbox);
    }
}
