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

use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::{BOLD_RED, BOLD_YELLOW, RESET};

pub use arguments::Arguments;

pub mod ansi;
pub mod arguments;

pub fn print_warning(message: &str) {
    eprintln!("{}warning:{} {}", *BOLD_YELLOW, *RESET, message);
}

pub fn print_error(message: &str) {
    eprintln!("{}error:{} {}", *BOLD_RED, *RESET, message);
}

pub fn unix_time_as_millis() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_millis() as i64,
        Err(_) => 0,
    }
}
