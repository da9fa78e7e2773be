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

use std::env::var;

use lazy_static::lazy_static;

use crate::utils::ansi::*;

pub const UI_MIME: &str = "application/vnd.nodebooks.ui+json";
pub const UI_PACKAGE: &str = "@nodebooks/ui";
pub const MANIFEST_FILE: &str = "package.json";
pub const LOCKFILE: &str = "package-lock.json";
pub const FINGERPRINT_FILE: &str = ".install-fingerprint";
pub const MODULES_DIR: &str = "node_modules";
pub const ENTRY_MODULE: &str = "__runtime__.cjs";
pub const NPM_EXECUTABLE: &str = "npm";

pub const TIMEOUT_FLOOR: u64 = 1000;
pub const TIMEOUT_CEILING: u64 = 600_000;
pub const DEFAULT_TIMEOUT: u64 = 30_000;

/* Interpreter guard intervals: how many evaluation steps elapse between
 * deadline checks and interrupt-flag checks respectively. */
pub const DEADLINE_CHECK_STEPS: u64 = 64;
pub const INTERRUPT_CHECK_STEPS: u64 = 512;

#[macro_export]
macro_rules! format_str {
    ( $( $x:expr ),+ ) => {
        format!($( $x, )+).leak()
    };
}

lazy_static! {
    pub static ref VERBOSE: bool = var("NODEBOOKS_VERBOSE").is_ok_and(|v| v == "1");
    pub static ref VERSION: &'static str = env!("CARGO_PKG_VERSION");
    pub static ref WORKSPACE_ROOT: &'static str = workspace_root();
    pub static ref LOG_LOCATION: &'static str = format_str!("{}/kernel.log", *WORKSPACE_ROOT);
    pub static ref NPM: &'static str = env_default("NODEBOOKS_NPM", NPM_EXECUTABLE);
    pub static ref KERNEL_TIMEOUT: u64 = kernel_timeout();
    pub static ref IS_COLOR_TERMINAL: bool = is_color_terminal();
    pub static ref BOLD: &'static str = bold();
    pub static ref RESET: &'static str = reset();
    pub static ref DIM: &'static str = dim();
    pub static ref BOLD_WHITE: &'static str = bold_white();
    pub static ref BOLD_YELLOW: &'static str = bold_yellow();
    pub static ref BOLD_RED: &'static str = bold_red();
    pub static ref BOLD_GREEN: &'static str = bold_green();
    pub static ref ARROW_CYAN: &'static str = arrow_cyan();
    pub static ref ARROW_RED: &'static str = arrow_red();
}

pub fn clamp_timeout(timeout: u64) -> u64 {
    timeout.clamp(TIMEOUT_FLOOR, TIMEOUT_CEILING)
}

fn workspace_root() -> &'static str {
    match var("NODEBOOKS_WORKSPACE_ROOT") {
        Ok(root) => root.leak(),
        Err(_) => format_str!("{}/nodebooks", std::env::temp_dir().to_string_lossy()),
    }
}

fn kernel_timeout() -> u64 {
    var("NODEBOOKS_KERNEL_TIMEOUT")
        .ok()
        .and_then(|t| t.parse().ok())
        .map_or(DEFAULT_TIMEOUT, clamp_timeout)
}

fn env_default(env: &str, default: &'static str) -> &'static str {
    var(env).map_or_else(|_| default, |var| var.leak())
}
