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

//! Line-oriented loop: one cell per line, one shared execution context.
//! SIGINT interrupts the running cell instead of killing the session.

use std::{
    io::{BufRead, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use nodebooks_kernel::{
    config::KernelConfig,
    display::ExecutionStatus,
    utils::arguments::{Arguments, Operand as Op},
    ErrorGeneric,
    ExecuteRequest,
    Kernel,
    Language,
    Result,
};

use crate::{render, run::{read_environment, CommonOptions}};

pub fn repl(args: &mut Arguments) -> Result<()> {
    let mut options = CommonOptions::default();

    for operand in args.by_ref() {
        match operand {
            Op::Long("notebook") | Op::Long("env") | Op::Long("timeout") => {}
            Op::LongPos("notebook", id) => options.notebook = id.into(),
            Op::LongPos("env", path) => options.environment = read_environment(path)?,
            Op::LongPos("timeout", ms) => options.timeout = ms.parse().ok(),
            Op::Long("ts") => options.language = Language::Ts,
            _ => return args.invalid_operand(),
        }
    }

    let kernel = Arc::new(Kernel::new(KernelConfig::new())?);
    let current = Arc::new(Mutex::new(None::<String>));
    let sigint = Arc::new(AtomicBool::new(false));

    signal_hook::flag::register(signal_hook::consts::SIGINT, sigint.clone()).generic()?;
    spawn_interrupt_watcher(kernel.clone(), current.clone(), sigint, options.notebook.clone());

    let stdin = std::io::stdin();
    let mut line = String::new();
    let mut counter = 0u64;

    loop {
        print!("> ");
        std::io::stdout().flush().generic()?;
        line.clear();

        if stdin.lock().read_line(&mut line).generic()? == 0 {
            return Ok(());
        }

        let source = line.trim();

        if source.is_empty() {
            continue;
        }

        if source == ".exit" {
            return Ok(());
        }

        counter += 1;

        let cell = format!("repl-{counter}");

        if let Ok(mut slot) = current.lock() {
            *slot = Some(cell.clone());
        }

        let mut request = ExecuteRequest::new(&options.notebook, &cell, options.language, source);

        request.environment = options.environment.clone();
        request.timeout_ms = options.timeout;
        request.on_stream = Some(render::stream_sink());

        let reply = kernel.execute(request)?;

        if let Ok(mut slot) = current.lock() {
            *slot = None;
        }

        render::render(&reply.outputs);

        if reply.execution.status == ExecutionStatus::Error {
            if let Some(error) = &reply.execution.error {
                eprintln!("cell failed: {error}");
            }
        }
    }
}

fn spawn_interrupt_watcher(kernel: Arc<Kernel>, current: Arc<Mutex<Option<String>>>, sigint: Arc<AtomicBool>, notebook: String) {
    std::thread::spawn(move || loop {
        std::thread::sleep(Duration::from_millis(50));

        if sigint.swap(false, Ordering::SeqCst) {
            let cell = current.lock().ok().and_then(|slot| slot.clone());

            if let Some(cell) = cell {
                kernel.interrupt(&notebook, &cell);
            }
        }
    });
}
