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

use std::fs;

use nodebooks_kernel::{
    config::KernelConfig,
    display::ExecutionStatus,
    err,
    utils::arguments::{Arguments, Operand as Op},
    Error,
    ErrorGeneric,
    ErrorKind,
    ExecuteRequest,
    Kernel,
    Language,
    NotebookEnvironment,
    Result,
};

use crate::render;

pub struct CommonOptions {
    pub notebook: String,
    pub language: Language,
    pub timeout: Option<u64>,
    pub environment: NotebookEnvironment,
}

impl Default for CommonOptions {
    fn default() -> Self {
        Self {
            notebook: "scratch".into(),
            language: Language::Js,
            timeout: None,
            environment: NotebookEnvironment::default(),
        }
    }
}

pub fn execute(args: &mut Arguments) -> Result<()> {
    let mut options = CommonOptions::default();
    let mut file = None;

    for operand in args.by_ref() {
        match operand {
            Op::Long("notebook") | Op::Long("env") | Op::Long("timeout") => {}
            Op::LongPos("notebook", id) => options.notebook = id.into(),
            Op::LongPos("env", path) => options.environment = read_environment(path)?,
            Op::LongPos("timeout", ms) => options.timeout = ms.parse().ok(),
            Op::Long("ts") => options.language = Language::Ts,
            Op::Value(path) => file = Some(path),
            _ => return args.invalid_operand(),
        }
    }

    let path = match file {
        Some(path) => path,
        None => err!(ErrorKind::Message("No source file specified."))?,
    };

    if path.ends_with(".ts") {
        options.language = Language::Ts;
    }

    let source = fs::read_to_string(path).prepend_io(|| path.into())?;
    let kernel = Kernel::new(KernelConfig::new())?;
    let mut request = ExecuteRequest::new(&options.notebook, "cli-cell", options.language, &source);

    request.environment = options.environment;
    request.timeout_ms = options.timeout;
    request.on_stream = Some(render::stream_sink());

    let reply = kernel.execute(request)?;

    render::render(&reply.outputs);

    match reply.execution.status {
        ExecutionStatus::Ok => Ok(()),
        ExecutionStatus::Error => err!(ErrorKind::Message("Cell execution failed.")),
    }
}

pub fn read_environment(path: &str) -> Result<NotebookEnvironment> {
    let text = fs::read_to_string(path).prepend_io(|| path.into())?;

    serde_yaml::from_str(&text).prepend(|| format!("Failed to parse environment '{path}'"))
}
