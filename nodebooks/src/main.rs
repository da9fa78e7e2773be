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

use nodebooks_kernel::utils::arguments::{Arguments, Operand as Op};

mod manual;
mod render;
mod repl;
mod run;

fn main() {
    let arguments = &mut Arguments::new().populate();
    let result = match arguments.next().unwrap_or_default() {
        Op::Value("run") => run::execute(arguments),
        Op::Value("repl") => repl::repl(arguments),
        Op::Short('h') | Op::Long("help") | Op::Value("help") => manual::help(),
        Op::Short('V') | Op::Long("version") | Op::Value("version") => manual::version(),
        _ => arguments.invalid_operand(),
    };

    if let Err(error) = result {
        error.exit();
    }
}
