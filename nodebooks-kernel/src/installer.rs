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

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
    process::{Command, Stdio},
};

use indexmap::IndexMap;

use crate::{constants::NPM, err, impl_error, Error, ErrorKind, ErrorTrait, Result};

#[derive(Debug, Clone)]
pub enum InstallError {
    Failed(String),
}

impl_error!(InstallError);

impl Display for InstallError {
    fn fmt(&self, fmter: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Failed(stderr) => match stderr.is_empty() {
                true => write!(fmter, "Dependency installation failed."),
                false => write!(fmter, "Dependency installation failed: {}", stderr.trim_end()),
            },
        }
    }
}

/// Materializes a resolvable module tree for the declared package set of a
/// sandbox. The default implementation shells out to the platform package
/// manager; tests substitute their own.
pub trait Installer: Send + Sync {
    fn install(&self, sandbox: &Path, packages: &IndexMap<String, String>) -> Result<()>;
}

pub struct NpmInstaller {
    executable: &'static str,
}

impl Default for NpmInstaller {
    fn default() -> Self {
        Self::new()
    }
}

impl NpmInstaller {
    pub fn new() -> Self {
        Self { executable: *NPM }
    }
}

impl Installer for NpmInstaller {
    fn install(&self, sandbox: &Path, _packages: &IndexMap<String, String>) -> Result<()> {
        let child = Command::new(self.executable)
            .current_dir(sandbox)
            .arg("install")
            .arg("--no-audit")
            .arg("--no-fund")
            .arg("--loglevel")
            .arg("error")
            .env("CI", "true")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(error) => err!(ErrorKind::ProcessInitFailure(*NPM, error.kind()))?,
        };

        let output = match child.wait_with_output() {
            Ok(output) => output,
            Err(error) => err!(ErrorKind::ProcessWaitFailure(*NPM, error.kind()))?,
        };

        match output.status.success() {
            true => Ok(()),
            false => err!(InstallError::Failed(String::from_utf8_lossy(&output.stderr).to_string())),
        }
    }
}
