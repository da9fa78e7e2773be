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

//! Ordinary module resolution, rooted in the sandbox directory: relative
//! specifiers against the requiring module, bare specifiers against the
//! installed module tree.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    constants::MODULES_DIR,
    runtime::{parser, value::*, Interp},
    sandbox,
};

pub fn resolve_sandbox(interp: &mut Interp, specifier: &str) -> Exec<Value> {
    let root = match interp.realm.sandbox.borrow().clone() {
        Some(root) => root,
        None => return Err(throw("Error", "Sandbox is not ready")),
    };
    let base = interp.module_dirs.last().cloned().unwrap_or_else(|| root.clone());
    let candidate = match specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/') {
        true => resolve_file(&base.join(specifier)),
        false => resolve_package(&root.join(MODULES_DIR), specifier),
    };
    let path = match candidate {
        Some(path) => path,
        None => return Err(throw("Error", &format!("Cannot find module '{specifier}'"))),
    };
    let path = sandbox::confine(&root, &path)?;

    load_module(interp, &path)
}

fn resolve_file(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }

    for ext in ["js", "cjs", "json"] {
        let with_ext = path.with_extension(ext);

        if with_ext.is_file() {
            return Some(with_ext);
        }
    }

    let index = path.join("index.js");

    match index.is_file() {
        true => Some(index),
        false => None,
    }
}

fn resolve_package(modules: &Path, specifier: &str) -> Option<PathBuf> {
    /* Scoped packages keep their first two segments as the package name. */
    let segments: Vec<&str> = specifier.splitn(3, '/').collect();
    let (name, subpath) = match specifier.starts_with('@') {
        true => match segments.len() {
            0 | 1 => return None,
            2 => (format!("{}/{}", segments[0], segments[1]), None),
            _ => (format!("{}/{}", segments[0], segments[1]), Some(segments[2])),
        },
        false => match specifier.split_once('/') {
            Some((name, subpath)) => (name.to_string(), Some(subpath)),
            None => (specifier.to_string(), None),
        },
    };
    let package_root = modules.join(&name);

    if let Some(subpath) = subpath {
        return resolve_file(&package_root.join(subpath));
    }

    let manifest = package_root.join("package.json");

    if let Ok(text) = fs::read_to_string(&manifest) {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(&text) {
            if let Some(main) = json.get("main").and_then(|m| m.as_str()) {
                if let Some(path) = resolve_file(&package_root.join(main)) {
                    return Some(path);
                }
            }
        }
    }

    resolve_file(&package_root.join("index.js")).or_else(|| resolve_file(&package_root))
}

pub fn load_module(interp: &mut Interp, path: &Path) -> Exec<Value> {
    let key = format!("file:{}", path.display());

    if let Some(cached) = interp.realm.modules.borrow().get(&key) {
        return Ok(cached.clone());
    }

    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(error) => return Err(throw("Error", &format!("Cannot read module '{}': {error}", path.display()))),
    };

    if path.extension().is_some_and(|ext| ext == "json") {
        return match serde_json::from_str::<serde_json::Value>(&source) {
            Ok(json) => {
                let value = from_json(&json);

                interp.realm.modules.borrow_mut().insert(key, value.clone());
                Ok(value)
            }
            Err(error) => Err(throw("SyntaxError", &format!("Invalid JSON module '{}': {error}", path.display()))),
        };
    }

    let program = match parser::parse_program(&source) {
        Ok(program) => program,
        Err(error) => return Err(throw("SyntaxError", &format!("Cannot compile module '{}': {error}", path.display()))),
    };

    /* The partially-built exports object is cached up front so require
     * cycles observe it instead of recursing forever. */
    let exports = Value::object(Obj::new());
    let mut module_obj = Obj::new();

    module_obj.props.insert("exports".into(), exports.clone());

    let module = Value::object(module_obj);

    interp.realm.modules.borrow_mut().insert(key.clone(), exports.clone());

    let scope = interp.realm.globals.child();
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

    scope.declare("module", module.clone());
    scope.declare("exports", exports);
    scope.declare("__filename", Value::string(path.display().to_string()));
    scope.declare("__dirname", Value::string(dir.display().to_string()));
    interp.module_dirs.push(dir);

    let outcome = interp.run_program(&program, &scope);

    interp.module_dirs.pop();

    /* A module whose body fails must not stay cached as empty exports;
     * a later require re-attempts the load instead of seeing stale
     * partial state. */
    if let Err(signal) = outcome {
        interp.realm.modules.borrow_mut().remove(&key);
        return Err(signal);
    }

    let final_exports = interp.get_member(&module, "exports")?;

    interp.realm.modules.borrow_mut().insert(key, final_exports.clone());
    Ok(final_exports)
}

#[cfg(test)]
mod test {
    use std::{
        fs,
        path::Path,
        sync::{atomic::AtomicBool, Arc},
    };

    use crate::context::ExecutionContext;
    use crate::runtime::module::resolve_sandbox;
    use crate::runtime::value::{error_message, Signal, Value};
    use crate::runtime::Interp;

    fn sandbox_interp(root: &Path) -> (ExecutionContext, Interp) {
        let ctx = ExecutionContext::new("module-tests", None);

        ctx.set_sandbox(root.to_path_buf());

        let session = ctx.begin_cell("c1", None, None, true, None, Arc::new(AtomicBool::new(false)));

        (ctx, session.interp)
    }

    fn member(interp: &mut Interp, value: &Value, name: &str) -> Value {
        interp.get_member(value, name).unwrap()
    }

    fn text(value: &Value) -> String {
        match value {
            Value::String(text) => text.to_string(),
            _ => panic!("expected a string export"),
        }
    }

    #[test]
    fn relative_specifiers_fall_back_over_extensions() {
        let tmp = tempfile::tempdir().unwrap();

        fs::create_dir_all(tmp.path().join("lib")).unwrap();
        fs::write(tmp.path().join("lib/util.js"), "exports.answer = 42;").unwrap();

        let (_ctx, mut interp) = sandbox_interp(tmp.path());
        let exports = resolve_sandbox(&mut interp, "./lib/util").unwrap();

        assert!(matches!(member(&mut interp, &exports, "answer"), Value::Number(n) if n == 42.0));
    }

    #[test]
    fn bare_specifiers_resolve_through_the_manifest_main() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg = tmp.path().join("node_modules/demo-pkg");

        fs::create_dir_all(pkg.join("lib")).unwrap();
        fs::write(pkg.join("package.json"), r#"{ "name": "demo-pkg", "main": "lib/entry.js" }"#).unwrap();
        fs::write(pkg.join("lib/entry.js"), "module.exports = 'from-main';").unwrap();

        let (_ctx, mut interp) = sandbox_interp(tmp.path());
        let exports = resolve_sandbox(&mut interp, "demo-pkg").unwrap();

        assert_eq!(text(&exports), "from-main");
    }

    #[test]
    fn scoped_packages_split_name_and_subpath() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg = tmp.path().join("node_modules/@acme/tools");

        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("index.js"), "module.exports = 'tools';").unwrap();
        fs::write(pkg.join("extra.js"), "module.exports = 'extra';").unwrap();

        let (_ctx, mut interp) = sandbox_interp(tmp.path());

        assert_eq!(text(&resolve_sandbox(&mut interp, "@acme/tools").unwrap()), "tools");
        assert_eq!(text(&resolve_sandbox(&mut interp, "@acme/tools/extra").unwrap()), "extra");
    }

    #[test]
    fn json_modules_parse_into_values() {
        let tmp = tempfile::tempdir().unwrap();

        fs::write(tmp.path().join("data.json"), r#"{ "n": 7 }"#).unwrap();

        let (_ctx, mut interp) = sandbox_interp(tmp.path());
        let exports = resolve_sandbox(&mut interp, "./data").unwrap();

        assert!(matches!(member(&mut interp, &exports, "n"), Value::Number(n) if n == 7.0));
    }

    #[test]
    fn require_cycles_observe_partial_exports() {
        let tmp = tempfile::tempdir().unwrap();

        fs::write(
            tmp.path().join("a.js"),
            "exports.name = 'a';\nconst b = require('./b');\nexports.partner = b.name;",
        )
        .unwrap();
        fs::write(
            tmp.path().join("b.js"),
            "const a = require('./a');\nexports.name = 'b';\nexports.sawA = a.name;",
        )
        .unwrap();

        let (_ctx, mut interp) = sandbox_interp(tmp.path());
        let a = resolve_sandbox(&mut interp, "./a").unwrap();

        assert_eq!(text(&member(&mut interp, &a, "partner")), "b");

        let b = resolve_sandbox(&mut interp, "./b").unwrap();

        assert_eq!(text(&member(&mut interp, &b, "sawA")), "a");
    }

    #[test]
    fn failing_modules_are_not_cached() {
        let tmp = tempfile::tempdir().unwrap();

        fs::write(tmp.path().join("flaky.js"), "throw new Error('broken module');").unwrap();

        let (_ctx, mut interp) = sandbox_interp(tmp.path());

        match resolve_sandbox(&mut interp, "./flaky") {
            Err(Signal::Throw(error)) => assert!(error_message(&error).contains("broken module")),
            _ => panic!("first load must surface the module error"),
        }

        /* The failed load must not leave stale empty exports behind; a
         * corrected module loads on retry. */
        fs::write(tmp.path().join("flaky.js"), "module.exports = 'recovered';").unwrap();

        let exports = resolve_sandbox(&mut interp, "./flaky").unwrap();

        assert_eq!(text(&exports), "recovered");
    }

    #[test]
    fn unknown_specifiers_error() {
        let tmp = tempfile::tempdir().unwrap();
        let (_ctx, mut interp) = sandbox_interp(tmp.path());

        match resolve_sandbox(&mut interp, "missing-pkg") {
            Err(Signal::Throw(error)) => assert!(error_message(&error).contains("Cannot find module 'missing-pkg'")),
            _ => panic!("unknown specifiers must fail"),
        }
    }
}
