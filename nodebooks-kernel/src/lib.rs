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

//! Execution kernel for interactive notebooks: a per-notebook sandboxed
//! runtime that accepts a cell of source code and returns a stream of
//! structured outputs while enforcing resource policies and preserving
//! cross-cell state.

use std::{
    any::Any,
    fmt::{Debug, Display, Formatter, Result as FmtResult},
};

use crate::constants::{BOLD, RESET};

pub mod config;
pub mod constants;
pub mod context;
pub mod display;
pub mod error;
pub mod installer;
pub mod interaction;
pub mod kernel;
pub mod log;
pub mod resolver;
pub mod runtime;
pub mod sandbox;
pub mod timers;
pub mod transform;
pub mod ui;
pub mod utils;
pub mod workspace;

pub use error::*;
pub use kernel::{ExecuteRequest, InteractionRequest, Kernel, KernelReply, Language, NotebookEnvironment};

#[derive(Debug)]
pub enum ErrorKind {
    EnvVarUnset(&'static str),
    IOError(String, std::io::ErrorKind),
    Message(&'static str),
    NotebookIdInvalid(String),
    HandlerNotFound(String),
    ProcessInitFailure(&'static str, std::io::ErrorKind),
    ProcessWaitFailure(&'static str, std::io::ErrorKind),
    WorkerTerminated(String),
}

impl Display for ErrorKind {
    fn fmt(&self, fmter: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Message(err) => write!(fmter, "{}", err),
            Self::EnvVarUnset(var) => write!(fmter, "${}{var}{} is unset.", *BOLD, *RESET),
            Self::IOError(path, error) => write!(fmter, "'{path}': {error}"),
            Self::NotebookIdInvalid(id) => write!(fmter, "Notebook identifier '{}{id}{}' is invalid.", *BOLD, *RESET),
            Self::HandlerNotFound(id) => write!(fmter, "Interaction handler '{}{id}{}' not found.", *BOLD, *RESET),
            Self::ProcessInitFailure(exec, err) => write!(fmter, "Unable to initialize '{exec}': {err}"),
            Self::ProcessWaitFailure(exec, err) => write!(fmter, "Unable to wait on '{exec}': {err}"),
            Self::WorkerTerminated(nb) => write!(fmter, "Worker for notebook '{}{nb}{}' terminated.", *BOLD, *RESET),
        }
    }
}

impl ErrorTrait for ErrorKind {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn code(&self) -> i32 {
        match self {
            ErrorKind::IOError(..) => 2,
            _ => 1,
        }
    }
}
