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

//! Workspace manager: one sandbox directory per notebook under the
//! workspace root, with a package manifest, an install fingerprint, and
//! the injected UI helper package.

use std::{
    fs,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{ENTRY_MODULE, FINGERPRINT_FILE, LOCKFILE, MANIFEST_FILE, MODULES_DIR, UI_PACKAGE},
    err,
    installer::Installer,
    ui,
    Error,
    ErrorKind,
    Result,
};

#[derive(Debug, Serialize, Deserialize)]
struct Fingerprint {
    #[serde(rename = "packagesKey")]
    packages_key: String,
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    name: String,
    version: &'static str,
    private: bool,
    dependencies: &'a IndexMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct SandboxHandle {
    notebook: String,
    root: PathBuf,
}

impl SandboxHandle {
    pub fn notebook(&self) -> &str {
        &self.notebook
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn modules_dir(&self) -> PathBuf {
        self.root.join(MODULES_DIR)
    }

    pub fn fingerprint_file(&self) -> PathBuf {
        self.root.join(FINGERPRINT_FILE)
    }

    pub fn entry(&self) -> PathBuf {
        self.root.join(ENTRY_MODULE)
    }
}

pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: PathBuf) -> Result<Self> {
        if let Err(error) = fs::create_dir_all(&root) {
            err!(ErrorKind::IOError(root.display().to_string(), error.kind()))?
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Prepares the sandbox for a notebook: manifest and entry module in
    /// place, module tree consistent with the declared package set, UI
    /// helper injected. Serialized per kernel by the caller. A failed
    /// install surfaces without touching the stored fingerprint.
    pub fn ensure(&self, notebook: &str, packages: &IndexMap<String, String>, installer: &dyn Installer) -> Result<SandboxHandle> {
        validate_notebook_id(notebook)?;

        let handle = SandboxHandle {
            notebook: notebook.to_owned(),
            root: self.root.join(notebook),
        };

        create_dir(&handle.root)?;

        let packages = sanitize_packages(packages);
        let key = fingerprint(&packages);

        write_file(&handle.manifest(), &manifest_json(notebook, &packages)?)?;

        if !handle.entry().exists() {
            write_file(&handle.entry(), "")?;
        }

        let prior = read_fingerprint(&handle.fingerprint_file());
        let modules_present = handle.modules_dir().is_dir();

        if packages.is_empty() {
            remove_tree(&handle.modules_dir())?;
            remove_file(&handle.root.join(LOCKFILE))?;
            write_fingerprint(&handle.fingerprint_file(), &key)?;
        } else if prior.as_deref() != Some(key.as_str()) || !modules_present {
            installer.install(&handle.root, &packages)?;
            write_fingerprint(&handle.fingerprint_file(), &key)?;
        }

        inject_ui_package(&handle)?;
        Ok(handle)
    }
}

/// Canonical install fingerprint: a JSON array of `[name, version]` pairs
/// sorted lexicographically by name.
pub fn fingerprint(packages: &IndexMap<String, String>) -> String {
    let mut pairs: Vec<(&String, &String)> = packages.iter().collect();

    pairs.sort_by(|a, b| a.0.cmp(b.0));

    let array: Vec<[&String; 2]> = pairs.into_iter().map(|(name, version)| [name, version]).collect();

    serde_json::to_string(&array).unwrap_or_default()
}

/// Trims names and versions; empty names are dropped and empty versions
/// default to "latest".
pub fn sanitize_packages(packages: &IndexMap<String, String>) -> IndexMap<String, String> {
    let mut sanitized = IndexMap::new();

    for (name, version) in packages {
        let name = name.trim();

        if name.is_empty() {
            continue;
        }

        let version = match version.trim() {
            "" => "latest",
            version => version,
        };

        sanitized.insert(name.to_owned(), version.to_owned());
    }

    sanitized
}

fn validate_notebook_id(notebook: &str) -> Result<()> {
    let valid = !notebook.is_empty()
        && notebook.len() <= 128
        && !notebook.starts_with('.')
        && notebook.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    match valid {
        true => Ok(()),
        false => err!(ErrorKind::NotebookIdInvalid(notebook.to_owned())),
    }
}

fn manifest_json(notebook: &str, packages: &IndexMap<String, String>) -> Result<String> {
    let manifest = Manifest {
        name: format!("notebook-{notebook}"),
        version: "0.0.0",
        private: true,
        dependencies: packages,
    };

    match serde_json::to_string_pretty(&manifest) {
        Ok(mut json) => {
            json.push('\n');
            Ok(json)
        }
        Err(error) => err!(ErrorKind::IOError(MANIFEST_FILE.into(), std::io::Error::from(error).kind())),
    }
}

fn read_fingerprint(path: &Path) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    let fingerprint: Fingerprint = serde_json::from_str(&text).ok()?;

    Some(fingerprint.packages_key)
}

fn write_fingerprint(path: &Path, key: &str) -> Result<()> {
    let fingerprint = Fingerprint {
        packages_key: key.to_owned(),
    };
    let json = match serde_json::to_string(&fingerprint) {
        Ok(json) => json,
        Err(error) => err!(ErrorKind::IOError(FINGERPRINT_FILE.into(), std::io::Error::from(error).kind()))?,
    };

    write_file(path, &json)
}

fn inject_ui_package(handle: &SandboxHandle) -> Result<()> {
    let dir = handle.modules_dir().join(UI_PACKAGE);

    create_dir(&dir)?;
    write_file(&dir.join("package.json"), ui::UI_PACKAGE_JSON)?;
    write_file(&dir.join("index.js"), ui::UI_INDEX_JS)?;
    write_file(&dir.join("index.d.ts"), ui::UI_INDEX_DTS)
}

fn create_dir(path: &Path) -> Result<()> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(error) => err!(ErrorKind::IOError(path.display().to_string(), error.kind())),
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    match fs::write(path, contents) {
        Ok(()) => Ok(()),
        Err(error) => err!(ErrorKind::IOError(path.display().to_string(), error.kind())),
    }
}

fn remove_tree(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(error) => err!(ErrorKind::IOError(path.display().to_string(), error.kind())),
    }
}

fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(error) => err!(ErrorKind::IOError(path.display().to_string(), error.kind())),
    }
}

#[cfg(test)]
mod test {
    use std::{
        fs,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use indexmap::IndexMap;

    use crate::installer::{InstallError, Installer};
    use crate::workspace::*;
    use crate::{err, Error};

    #[derive(Default)]
    struct StubInstaller {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Installer for StubInstaller {
        fn install(&self, sandbox: &std::path::Path, _packages: &IndexMap<String, String>) -> crate::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if self.fail {
                return err!(InstallError::Failed("E404 no such package".into()));
            }

            fs::create_dir_all(sandbox.join(MODULES_DIR)).unwrap();
            Ok(())
        }
    }

    fn packages(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs.iter().map(|(n, v)| (n.to_string(), v.to_string())).collect()
    }

    #[test]
    fn fingerprint_is_sorted_and_canonical() {
        let a = packages(&[("zlib", "1"), ("alpha", "2")]);
        let b = packages(&[("alpha", "2"), ("zlib", "1")]);

        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_eq!(fingerprint(&b), r#"[["alpha","2"],["zlib","1"]]"#);
    }

    #[test]
    fn sanitize_trims_and_defaults() {
        let raw = packages(&[(" left-pad ", ""), ("", "1.0.0"), ("chalk", " ^5 ")]);
        let sanitized = sanitize_packages(&raw);

        assert_eq!(sanitized.get("left-pad").unwrap(), "latest");
        assert_eq!(sanitized.get("chalk").unwrap(), "^5");
        assert_eq!(sanitized.len(), 2);
    }

    #[test]
    fn ensure_creates_layout_and_injects_ui() {
        let tmp = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(tmp.path().to_path_buf()).unwrap();
        let installer = StubInstaller::default();
        let handle = workspace.ensure("nb1", &IndexMap::new(), &installer).unwrap();

        assert!(handle.manifest().is_file());
        assert!(handle.entry().is_file());
        assert!(handle.fingerprint_file().is_file());
        assert!(handle.modules_dir().join(UI_PACKAGE).join("package.json").is_file());
        assert_eq!(installer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn fingerprint_change_triggers_reinstall() {
        let tmp = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(tmp.path().to_path_buf()).unwrap();
        let installer = StubInstaller::default();

        workspace.ensure("nb1", &packages(&[("left-pad", "1.3.0")]), &installer).unwrap();
        assert_eq!(installer.calls.load(Ordering::SeqCst), 1);

        workspace.ensure("nb1", &packages(&[("left-pad", "1.3.0")]), &installer).unwrap();
        assert_eq!(installer.calls.load(Ordering::SeqCst), 1);

        workspace.ensure("nb1", &packages(&[("left-pad", "1.3.0"), ("ms", "")]), &installer).unwrap();
        assert_eq!(installer.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn empty_declared_set_removes_module_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(tmp.path().to_path_buf()).unwrap();
        let installer = StubInstaller::default();
        let handle = workspace.ensure("nb1", &packages(&[("ms", "2")]), &installer).unwrap();

        fs::write(handle.root().join(LOCKFILE), "{}").unwrap();

        let handle = workspace.ensure("nb1", &IndexMap::new(), &installer).unwrap();

        assert!(!handle.root().join(LOCKFILE).exists());
        /* The UI helper is re-injected even after the tree is removed. */
        assert!(handle.modules_dir().join(UI_PACKAGE).is_dir());
    }

    #[test]
    fn failed_install_leaves_fingerprint_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(tmp.path().to_path_buf()).unwrap();
        let good = StubInstaller::default();

        workspace.ensure("nb1", &packages(&[("ms", "2")]), &good).unwrap();

        let prior = fs::read_to_string(tmp.path().join("nb1").join(FINGERPRINT_FILE)).unwrap();
        let bad = StubInstaller {
            calls: AtomicUsize::new(0),
            fail: true,
        };
        let result = workspace.ensure("nb1", &packages(&[("ms", "3")]), &bad);

        assert!(result.is_err());
        assert!(result.unwrap_err().downcast::<InstallError>().is_some());
        assert_eq!(fs::read_to_string(tmp.path().join("nb1").join(FINGERPRINT_FILE)).unwrap(), prior);
    }

    #[test]
    fn hostile_notebook_ids_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(tmp.path().to_path_buf()).unwrap();
        let installer = StubInstaller::default();

        for id in ["", "../escape", "a/b", ".hidden"] {
            assert!(workspace.ensure(id, &IndexMap::new(), &installer).is_err(), "accepted {id:?}");
        }
    }
}
