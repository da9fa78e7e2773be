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

//! Source transformation ahead of evaluation: declaration promotion onto
//! the shared context, then import hoisting and last-expression capture.

use serde::{Deserialize, Serialize};

pub mod capture;
pub mod promote;
pub mod scanner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Js,
    Ts,
}

/// Reserved binding the capture rewrite assigns through; it lands on the
/// shared context and the kernel consumes and removes it after the run.
pub const RESULT_BINDING: &str = "__nb_result__";

/// How the kernel obtains the captured value after evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Read (and clear) the reserved result binding.
    Result,
    /// Use the program's completion value.
    Completion,
    /// Nothing is captured.
    None,
}

#[derive(Debug, Clone)]
pub struct Transformed {
    pub source: String,
    pub capture: CaptureMode,
}

pub fn transform(source: &str, language: Language) -> Transformed {
    capture::wrap(&promote::promote(source), language)
}

#[cfg(test)]
mod test {
    use crate::transform::{transform, CaptureMode, Language};

    #[test]
    fn promotion_feeds_capture() {
        let out = transform("const x = [1,2,3];\nx;", Language::Js);

        assert!(out.source.contains("globalThis.x = [1,2,3]"));
        assert_eq!(out.capture, CaptureMode::Result);
        assert!(out.source.contains("__nb_result__ = (x);"));
    }

    #[test]
    fn ts_call_suppression_survives_both_passes() {
        let out = transform("const add = (a: number, b: number) => a + b;\nadd(1, 2);", Language::Ts);

        assert!(out.source.contains("globalThis.add ="));
        assert_eq!(out.capture, CaptureMode::None);
    }
}
