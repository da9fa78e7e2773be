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

//! Timer and async coordination: wrapped one-shot and periodic timers,
//! the post-evaluation drain stages, and capture of errors thrown inside
//! timer callbacks.

use std::{
    sync::atomic::Ordering,
    time::{Duration, Instant},
};

use crate::{
    display::StreamName,
    runtime::{
        value::{error_message, error_name, throw, AbortReason, Exec, Signal, Value},
        Interp,
    },
};

const DRAIN_POLL: Duration = Duration::from_millis(20);

struct PendingTimeout {
    id: u64,
    due: Instant,
    callback: Value,
    args: Vec<Value>,
}

struct PendingInterval {
    id: u64,
    due: Instant,
    period: Duration,
    callback: Value,
    args: Vec<Value>,
    first_tick_pending: bool,
}

#[derive(Default)]
pub struct TimerRegistry {
    next_id: u64,
    timeouts: Vec<PendingTimeout>,
    intervals: Vec<PendingInterval>,
    async_errors: Vec<Value>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_timeout(&mut self, callback: Value, args: Vec<Value>, delay: Duration) -> u64 {
        self.next_id += 1;
        self.timeouts.push(PendingTimeout {
            id: self.next_id,
            due: Instant::now() + delay,
            callback,
            args,
        });
        self.next_id
    }

    pub fn set_interval(&mut self, callback: Value, args: Vec<Value>, period: Duration) -> u64 {
        self.next_id += 1;
        self.intervals.push(PendingInterval {
            id: self.next_id,
            due: Instant::now() + period,
            period,
            callback,
            args,
            first_tick_pending: true,
        });
        self.next_id
    }

    /// Cancellation removes the handle from both sets; unknown handles are
    /// a no-op.
    pub fn clear(&mut self, id: u64) {
        self.timeouts.retain(|t| t.id != id);
        self.intervals.retain(|i| i.id != id);
    }

    pub fn clear_all(&mut self) {
        self.timeouts.clear();
        self.intervals.clear();
    }

    pub fn pending(&self) -> usize {
        self.timeouts.len() + self.intervals.len()
    }

    pub fn push_async_error(&mut self, error: Value) {
        self.async_errors.push(error);
    }

    pub fn take_async_errors(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.async_errors)
    }
}

/// Installs the wrapped timer primitives onto the execution context.
pub fn install(global: &Value) {
    let props = match global {
        Value::Object(obj) => obj,
        _ => return,
    };
    let mut props = props.borrow_mut();

    props.props.insert("setTimeout".into(), Value::native("setTimeout", |interp, _, args| {
        let (callback, args, delay) = timer_args(args)?;
        let id = interp.realm.timers.borrow_mut().set_timeout(callback, args, delay);

        Ok(Value::Number(id as f64))
    }));
    props.props.insert("setInterval".into(), Value::native("setInterval", |interp, _, args| {
        let (callback, args, delay) = timer_args(args)?;
        let id = interp.realm.timers.borrow_mut().set_interval(callback, args, delay.max(Duration::from_millis(1)));

        Ok(Value::Number(id as f64))
    }));

    for name in ["clearTimeout", "clearInterval"] {
        props.props.insert(name.into(), Value::native(name, |interp, _, args| {
            if let Some(Value::Number(id)) = args.first() {
                interp.realm.timers.borrow_mut().clear(*id as u64);
            }

            Ok(Value::Undefined)
        }));
    }
}

fn timer_args(args: &[Value]) -> Exec<(Value, Vec<Value>, Duration)> {
    let callback = match args.first() {
        Some(callback) if callback.is_callable() => callback.clone(),
        _ => return Err(throw("TypeError", "Callback must be a function")),
    };
    let delay = args.get(1).map(|v| v.to_number()).unwrap_or(0.0);
    let delay = match delay.is_finite() && delay > 0.0 {
        true => Duration::from_millis(delay as u64),
        false => Duration::ZERO,
    };
    let rest = args.iter().skip(2).cloned().collect();

    Ok((callback, rest, delay))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    Completed,
    TimedOut,
}

/// Drains pending work within the remaining budget: (a) the user promise
/// has already settled when this runs; (b) one-shot timers, including ones
/// their callbacks schedule; (c) first interval ticks; (d) remaining
/// interval work until the set empties or the budget runs out.
pub fn drain(interp: &mut Interp, deadline: Instant) -> Exec<DrainOutcome> {
    loop {
        let next = {
            let timers = interp.realm.timers.borrow();

            timers.timeouts.iter().min_by_key(|t| t.due).map(|t| (t.id, t.due))
        };
        let (id, due) = match next {
            Some(next) => next,
            None => break,
        };

        if wait_until(interp, due, deadline)? == DrainOutcome::TimedOut {
            return Ok(DrainOutcome::TimedOut);
        }

        let fired = {
            let mut timers = interp.realm.timers.borrow_mut();

            match timers.timeouts.iter().position(|t| t.id == id) {
                Some(idx) => Some(timers.timeouts.remove(idx)),
                None => None,
            }
        };

        if let Some(timer) = fired {
            fire(interp, &timer.callback, &timer.args, None)?;
        }
    }

    loop {
        let next = {
            let timers = interp.realm.timers.borrow();

            timers
                .intervals
                .iter()
                .filter(|i| i.first_tick_pending)
                .min_by_key(|i| i.due)
                .map(|i| (i.id, i.due))
        };
        let (id, due) = match next {
            Some(next) => next,
            None => break,
        };

        if wait_until(interp, due, deadline)? == DrainOutcome::TimedOut {
            return Ok(DrainOutcome::TimedOut);
        }

        if let Some((callback, args)) = advance_interval(interp, id) {
            fire(interp, &callback, &args, Some(id))?;
        }
    }

    loop {
        let next = {
            let timers = interp.realm.timers.borrow();

            timers.intervals.iter().min_by_key(|i| i.due).map(|i| (i.id, i.due))
        };
        let (id, due) = match next {
            Some(next) => next,
            None => break,
        };

        if wait_until(interp, due, deadline)? == DrainOutcome::TimedOut {
            return Ok(DrainOutcome::TimedOut);
        }

        if let Some((callback, args)) = advance_interval(interp, id) {
            fire(interp, &callback, &args, Some(id))?;
        }
    }

    Ok(DrainOutcome::Completed)
}

fn advance_interval(interp: &mut Interp, id: u64) -> Option<(Value, Vec<Value>)> {
    let mut timers = interp.realm.timers.borrow_mut();
    let interval = timers.intervals.iter_mut().find(|i| i.id == id)?;

    interval.first_tick_pending = false;
    interval.due += interval.period;
    Some((interval.callback.clone(), interval.args.clone()))
}

/* Sleeps toward `due` in small increments so interrupts and the hard
 * deadline stay responsive while the kernel waits on timers. */
fn wait_until(interp: &mut Interp, due: Instant, deadline: Instant) -> Exec<DrainOutcome> {
    if due > deadline {
        return Ok(DrainOutcome::TimedOut);
    }

    loop {
        if interp.interrupt.load(Ordering::Relaxed) {
            return Err(Signal::Abort(AbortReason::Interrupt));
        }

        let now = Instant::now();

        if now >= due {
            return Ok(DrainOutcome::Completed);
        }

        if now >= deadline {
            return Ok(DrainOutcome::TimedOut);
        }

        std::thread::sleep((due - now).min(DRAIN_POLL));
    }
}

/// Invokes a timer callback; a thrown value is recorded as an async error
/// and echoed to stderr, and a throwing interval is cleared.
fn fire(interp: &mut Interp, callback: &Value, args: &[Value], interval_id: Option<u64>) -> Exec<()> {
    match interp.call_value(callback, &Value::Undefined, args) {
        Ok(_) => Ok(()),
        Err(Signal::Throw(error)) => {
            let text = format!("Uncaught {}: {}\n", error_name(&error), error_message(&error));

            interp.realm.channel.borrow_mut().stream(StreamName::Stderr, &text);

            let mut timers = interp.realm.timers.borrow_mut();

            timers.push_async_error(error);

            if let Some(id) = interval_id {
                timers.intervals.retain(|i| i.id != id);
            }

            Ok(())
        }
        Err(signal) => Err(signal),
    }
}
