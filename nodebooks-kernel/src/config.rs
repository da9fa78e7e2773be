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

use std::{path::PathBuf, result::Result as StdResult, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    constants::{clamp_timeout, KERNEL_TIMEOUT, WORKSPACE_ROOT},
    installer::{Installer, NpmInstaller},
};

/// Request passed to a host-provided fetch hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: String,
}

pub type HostFetch = Arc<dyn Fn(FetchRequest) -> StdResult<FetchResponse, String> + Send + Sync>;

/// Process-global kernel settings. Defaults are resolved from the
/// environment once (see constants); per-kernel overrides land here.
pub struct KernelConfig {
    workspace_root: PathBuf,
    timeout: u64,
    installer: Arc<dyn Installer>,
    fetch: Option<HostFetch>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelConfig {
    pub fn new() -> Self {
        Self {
            workspace_root: PathBuf::from(*WORKSPACE_ROOT),
            timeout: *KERNEL_TIMEOUT,
            installer: Arc::new(NpmInstaller::new()),
            fetch: None,
        }
    }

    pub fn workspace_root(mut self, root: PathBuf) -> Self {
        self.workspace_root = root;
        self
    }

    pub fn timeout(mut self, timeout: u64) -> Self {
        self.timeout = clamp_timeout(timeout);
        self
    }

    pub fn installer(mut self, installer: Arc<dyn Installer>) -> Self {
        self.installer = installer;
        self
    }

    pub fn fetch(mut self, fetch: HostFetch) -> Self {
        self.fetch = Some(fetch);
        self
    }

    pub fn root(&self) -> &PathBuf {
        &self.workspace_root
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout
    }

    pub fn provide_installer(&self) -> Arc<dyn Installer> {
        self.installer.clone()
    }

    pub fn provide_fetch(&self) -> Option<HostFetch> {
        self.fetch.clone()
    }
}
