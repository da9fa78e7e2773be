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

use nodebooks_kernel::{
    constants::{BOLD, RESET, VERSION},
    Result,
};

pub fn help() -> Result<()> {
    println!(
        "{}USAGE{}
    nodebooks [OPERATION] [ARGUMENTS]

{}OPERATIONS{}
    run <file>      Execute the file's contents as a single notebook cell.
    repl            Line-oriented loop sharing one execution context.
    help    -h      Print this help summary.
    version -V      Print the version string.

{}OPTIONS{}
    --notebook <id>     Notebook identifier (default: scratch).
    --env <file>        YAML notebook environment: packages and variables.
    --timeout <ms>      Hard execution deadline per cell.
    --ts                Treat sources as TypeScript cells.",
        *BOLD, *RESET, *BOLD, *RESET, *BOLD, *RESET
    );
    Ok(())
}

pub fn version() -> Result<()> {
    println!("nodebooks v{} - Sandboxed notebook execution kernel", *VERSION);
    println!("Copyright (C) 2024-2026 NodeBooks Contributors\n\nWebsite: https://github.com/nodebooks/nodebooks");
    Ok(())
}
