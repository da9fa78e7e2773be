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

//! Kernel entry point. One worker thread per notebook owns that
//! notebook's execution context and drains a FIFO job queue; notebooks
//! execute in parallel, cells within a notebook never do. Environment
//! preparation is serialized kernel-wide.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{
    config::KernelConfig,
    constants::clamp_timeout,
    context::ExecutionContext,
    display::{alert_display, coerce_value, ExecutionRecord, ExecutionStatus, Output, OutputSink},
    err,
    installer::InstallError,
    log::{Level, Logger},
    runtime::{
        parser,
        value::{error_message, error_name, from_json, AbortReason, Exec, Signal, Value},
        Interp,
    },
    timers::{self, DrainOutcome},
    transform::{transform, CaptureMode, RESULT_BINDING},
    utils::unix_time_as_millis,
    workspace::Workspace,
    Error,
    ErrorKind,
    Result,
};

pub use crate::transform::Language;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotebookEnvironment {
    #[serde(default = "default_runtime")]
    pub runtime: String,
    #[serde(default)]
    pub packages: IndexMap<String, String>,
    #[serde(default)]
    pub variables: IndexMap<String, String>,
}

fn default_runtime() -> String {
    "node".into()
}

impl Default for NotebookEnvironment {
    fn default() -> Self {
        Self {
            runtime: default_runtime(),
            packages: IndexMap::new(),
            variables: IndexMap::new(),
        }
    }
}

pub struct ExecuteRequest {
    pub cell_id: String,
    pub language: Language,
    pub source: String,
    pub notebook_id: String,
    pub environment: NotebookEnvironment,
    pub timeout_ms: Option<u64>,
    pub on_stream: Option<OutputSink>,
    pub on_display: Option<OutputSink>,
}

impl ExecuteRequest {
    pub fn new(notebook_id: &str, cell_id: &str, language: Language, source: &str) -> Self {
        Self {
            cell_id: cell_id.to_owned(),
            language,
            source: source.to_owned(),
            notebook_id: notebook_id.to_owned(),
            environment: NotebookEnvironment::default(),
            timeout_ms: None,
            on_stream: None,
            on_display: None,
        }
    }
}

pub struct InteractionRequest {
    pub handler_id: String,
    pub notebook_id: String,
    pub environment: NotebookEnvironment,
    pub event: JsonValue,
    pub component_id: Option<String>,
    pub cell_id: Option<String>,
    pub on_stream: Option<OutputSink>,
    pub on_display: Option<OutputSink>,
}

#[derive(Debug)]
pub struct KernelReply {
    pub outputs: Vec<Output>,
    pub execution: ExecutionRecord,
}

enum Job {
    Execute(ExecuteRequest, Sender<KernelReply>),
    Interact(InteractionRequest, Sender<KernelReply>),
    Reset,
}

struct WorkerState {
    current: Mutex<Option<String>>,
    interrupt: Arc<AtomicBool>,
}

struct WorkerHandle {
    jobs: Sender<Job>,
    state: Arc<WorkerState>,
}

struct KernelShared {
    config: KernelConfig,
    workspace: Workspace,
    install_lock: Mutex<()>,
    logger: Mutex<Logger>,
}

impl KernelShared {
    fn log(&self, level: Level, message: &str) {
        if let Ok(mut logger) = self.logger.lock() {
            let _ = logger.log(level, message);
        }
    }
}

pub struct Kernel {
    shared: Arc<KernelShared>,
    workers: Mutex<HashMap<String, WorkerHandle>>,
}

impl Kernel {
    pub fn new(config: KernelConfig) -> Result<Self> {
        let workspace = Workspace::new(config.root().clone())?;
        let logger = Logger::new("kernel", &config.root().join("kernel.log").display().to_string()).init()?;

        Ok(Self {
            shared: Arc::new(KernelShared {
                config,
                workspace,
                install_lock: Mutex::new(()),
                logger: Mutex::new(logger),
            }),
            workers: Mutex::new(HashMap::new()),
        })
    }

    /// Executes one cell. The reply is well-formed even when the cell
    /// fails; `execution.status` is authoritative.
    pub fn execute(&self, request: ExecuteRequest) -> Result<KernelReply> {
        let notebook = request.notebook_id.clone();
        let (reply_tx, reply_rx) = bounded(1);

        self.dispatch(&notebook, Job::Execute(request, reply_tx))?;
        self.receive(&notebook, reply_rx)
    }

    /// Invokes a registered interaction handler with a UI event.
    pub fn invoke_interaction(&self, request: InteractionRequest) -> Result<KernelReply> {
        let notebook = request.notebook_id.clone();
        let (reply_tx, reply_rx) = bounded(1);

        self.dispatch(&notebook, Job::Interact(request, reply_tx))?;
        self.receive(&notebook, reply_rx)
    }

    /// Cancels the evaluation of `cell` if it is the one currently
    /// running in the notebook. Returns whether a cancellation was
    /// signaled.
    pub fn interrupt(&self, notebook: &str, cell: &str) -> bool {
        let workers = match self.workers.lock() {
            Ok(workers) => workers,
            Err(_) => return false,
        };

        if let Some(handle) = workers.get(notebook) {
            if let Ok(current) = handle.state.current.lock() {
                if current.as_deref() == Some(cell) {
                    handle.state.interrupt.store(true, Ordering::SeqCst);
                    return true;
                }
            }
        }

        false
    }

    /// Discards the notebook's execution context; the next execute
    /// recreates it with fresh declarations.
    pub fn reset(&self, notebook: &str) -> Result<()> {
        if let Ok(workers) = self.workers.lock() {
            if let Some(handle) = workers.get(notebook) {
                let _ = handle.jobs.send(Job::Reset);
            }
        }

        Ok(())
    }

    fn dispatch(&self, notebook: &str, job: Job) -> Result<()> {
        let mut workers = match self.workers.lock() {
            Ok(workers) => workers,
            Err(_) => err!(ErrorKind::WorkerTerminated(notebook.to_owned()))?,
        };

        if !workers.contains_key(notebook) {
            workers.insert(notebook.to_owned(), self.spawn(notebook)?);
        }

        let job = match workers.get(notebook) {
            Some(handle) => match handle.jobs.send(job) {
                Ok(()) => return Ok(()),
                Err(failed) => failed.0,
            },
            None => job,
        };

        /* The previous worker died; replace it and retry once. */
        let handle = self.spawn(notebook)?;
        let outcome = handle.jobs.send(job);

        workers.insert(notebook.to_owned(), handle);

        match outcome {
            Ok(()) => Ok(()),
            Err(_) => err!(ErrorKind::WorkerTerminated(notebook.to_owned())),
        }
    }

    fn receive(&self, notebook: &str, reply_rx: Receiver<KernelReply>) -> Result<KernelReply> {
        match reply_rx.recv() {
            Ok(reply) => Ok(reply),
            Err(_) => err!(ErrorKind::WorkerTerminated(notebook.to_owned())),
        }
    }

    fn spawn(&self, notebook: &str) -> Result<WorkerHandle> {
        let (jobs_tx, jobs_rx) = unbounded();
        let state = Arc::new(WorkerState {
            current: Mutex::new(None),
            interrupt: Arc::new(AtomicBool::new(false)),
        });
        let shared = self.shared.clone();
        let thread_state = state.clone();
        let name = notebook.to_owned();
        let spawned = std::thread::Builder::new()
            .name(format!("nb-worker-{notebook}"))
            .spawn(move || worker_main(name, shared, jobs_rx, thread_state));

        match spawned {
            Ok(_) => Ok(WorkerHandle { jobs: jobs_tx, state }),
            Err(error) => err!(ErrorKind::ProcessInitFailure("worker thread", error.kind())),
        }
    }
}

fn worker_main(notebook: String, shared: Arc<KernelShared>, jobs: Receiver<Job>, state: Arc<WorkerState>) {
    let mut ctx = ExecutionContext::new(&notebook, shared.config.provide_fetch());

    while let Ok(job) = jobs.recv() {
        match job {
            Job::Execute(request, reply) => {
                let _ = reply.send(run_execute(&shared, &ctx, &state, request));
            }
            Job::Interact(request, reply) => {
                let _ = reply.send(run_interaction(&shared, &ctx, &state, request));
            }
            Job::Reset => {
                shared.log(Level::Info, &format!("Resetting execution context for notebook '{notebook}'"));
                ctx = ExecutionContext::new(&notebook, shared.config.provide_fetch());
            }
        }
    }
}

fn run_execute(shared: &KernelShared, ctx: &ExecutionContext, state: &WorkerState, request: ExecuteRequest) -> KernelReply {
    let started = unix_time_as_millis();
    let timeout = request.timeout_ms.map(clamp_timeout).unwrap_or_else(|| shared.config.timeout_ms());

    shared.log(
        Level::Info,
        &format!("Executing cell '{}' in notebook '{}'", request.cell_id, request.notebook_id),
    );

    let sandbox = match prepare_environment(shared, &request.notebook_id, &request.environment) {
        Ok(sandbox) => sandbox,
        Err(error) => return environment_failure(shared, started, error),
    };

    ctx.set_sandbox(sandbox);
    ctx.update_env(&request.environment.variables);
    state.interrupt.store(false, Ordering::SeqCst);

    if let Ok(mut current) = state.current.lock() {
        *current = Some(request.cell_id.clone());
    }

    let deadline = Instant::now() + Duration::from_millis(timeout);
    let session = ctx.begin_cell(
        &request.cell_id,
        request.on_stream,
        request.on_display,
        true,
        Some(deadline),
        state.interrupt.clone(),
    );
    let mut interp = session.interp;

    ctx.realm().global_obj.borrow_mut().props.shift_remove(RESULT_BINDING);

    let transformed = transform(&request.source, request.language);
    let (status, error) = match parser::parse_program(&transformed.source) {
        Err(compile) => {
            let message = compile.to_string();

            interp
                .realm
                .channel
                .borrow_mut()
                .error("CompileError", &message, vec![format!("CompileError: {message}")]);
            (ExecutionStatus::Error, Some(message))
        }
        Ok(program) => {
            let main = interp.run_program(&program, &session.scope);

            conclude(ctx, &mut interp, main, transformed.capture, deadline, timeout)
        }
    };

    finish(shared, ctx, state, &mut interp, started, status, error, &request.cell_id)
}

fn run_interaction(shared: &KernelShared, ctx: &ExecutionContext, state: &WorkerState, request: InteractionRequest) -> KernelReply {
    let started = unix_time_as_millis();
    let timeout = shared.config.timeout_ms();
    let handler = ctx
        .realm()
        .handlers
        .borrow()
        .get(&request.handler_id)
        .map(|handler| (handler.callback.clone(), handler.cell.clone()));
    let (callback, owning_cell) = match handler {
        Some(handler) => handler,
        None => {
            let message = format!("Interaction handler '{}' not found", request.handler_id);

            shared.log(Level::Warn, &message);
            return KernelReply {
                outputs: vec![Output::Error {
                    name: "HandlerNotFound".into(),
                    message: message.clone(),
                    traceback: vec![format!("HandlerNotFound: {message}")],
                }],
                execution: record(started, ExecutionStatus::Error, Some(message)),
            };
        }
    };
    let sandbox = match prepare_environment(shared, &request.notebook_id, &request.environment) {
        Ok(sandbox) => sandbox,
        Err(error) => return environment_failure(shared, started, error),
    };

    ctx.set_sandbox(sandbox);
    ctx.update_env(&request.environment.variables);
    state.interrupt.store(false, Ordering::SeqCst);

    let cell = request.cell_id.clone().unwrap_or(owning_cell);

    if let Ok(mut current) = state.current.lock() {
        *current = Some(cell.clone());
    }

    let deadline = Instant::now() + Duration::from_millis(timeout);
    let session = ctx.begin_cell(&cell, request.on_stream, request.on_display, false, Some(deadline), state.interrupt.clone());
    let mut interp = session.interp;
    let event = from_json(&request.event);
    let main = match interp.call_value(&callback, &Value::Undefined, &[event]) {
        Ok(value) => match interp.settle(value) {
            Ok(_) => Ok(Value::Undefined),
            Err(signal) => Err(signal),
        },
        Err(signal) => Err(signal),
    };
    let (status, error) = conclude(ctx, &mut interp, main, CaptureMode::None, deadline, timeout);

    finish(shared, ctx, state, &mut interp, started, status, error, &cell)
}

fn prepare_environment(shared: &KernelShared, notebook: &str, environment: &NotebookEnvironment) -> Result<std::path::PathBuf> {
    let installer = shared.config.provide_installer();
    let _serialized = shared.install_lock.lock();
    let handle = shared.workspace.ensure(notebook, &environment.packages, installer.as_ref())?;

    Ok(handle.root().to_path_buf())
}

fn environment_failure(shared: &KernelShared, started: i64, error: Error) -> KernelReply {
    let name = match error.downcast::<InstallError>() {
        Some(_) => "InstallError",
        None => "Error",
    };
    let message = error.message();

    shared.log(Level::Error, &format!("Environment preparation failed: {message}"));
    KernelReply {
        outputs: vec![Output::Error {
            name: name.into(),
            message: message.clone(),
            traceback: vec![format!("{name}: {message}")],
        }],
        execution: record(started, ExecutionStatus::Error, Some(message)),
    }
}

/// Post-evaluation tail shared by cell execution and interaction
/// dispatch: drain timers within the budget, surface async errors, then
/// coerce and emit the captured value.
fn conclude(
    ctx: &ExecutionContext,
    interp: &mut Interp,
    main: Exec<Value>,
    capture: CaptureMode,
    deadline: Instant,
    timeout: u64,
) -> (ExecutionStatus, Option<String>) {
    let completion = match main {
        Ok(completion) => completion,
        Err(signal) => return fail(interp, signal, timeout),
    };

    match timers::drain(interp, deadline) {
        Err(signal) => fail(interp, signal, timeout),
        Ok(DrainOutcome::TimedOut) => {
            interp.realm.timers.borrow_mut().clear_all();
            interp.realm.channel.borrow_mut().push(timeout_alert());
            (ExecutionStatus::Error, Some("Execution time limit reached".into()))
        }
        Ok(DrainOutcome::Completed) => {
            let async_error = interp.realm.timers.borrow_mut().take_async_errors().into_iter().next();

            if let Some(error) = async_error {
                emit_throw(interp, &error);
                return (ExecutionStatus::Error, Some(error_message(&error)));
            }

            let captured = match capture {
                CaptureMode::None => Value::Undefined,
                CaptureMode::Completion => completion,
                CaptureMode::Result => ctx
                    .realm()
                    .global_obj
                    .borrow_mut()
                    .props
                    .shift_remove(RESULT_BINDING)
                    .unwrap_or(Value::Undefined),
            };

            if let Some((data, metadata)) = coerce_value(&captured) {
                interp.realm.channel.borrow_mut().display(data, metadata, None);
            }

            (ExecutionStatus::Ok, None)
        }
    }
}

fn fail(interp: &mut Interp, signal: Signal, timeout: u64) -> (ExecutionStatus, Option<String>) {
    interp.realm.timers.borrow_mut().clear_all();

    match signal {
        Signal::Throw(error) => {
            let message = error_message(&error);

            emit_throw(interp, &error);
            (ExecutionStatus::Error, Some(message))
        }
        Signal::Abort(AbortReason::Timeout) => {
            let message = format!("Cell execution timed out after {timeout}ms");
            let mut channel = interp.realm.channel.borrow_mut();

            channel.push(timeout_alert());
            channel.error("TimeoutError", &message, vec![format!("TimeoutError: {message}")]);
            (ExecutionStatus::Error, Some(message))
        }
        Signal::Abort(AbortReason::Interrupt) => {
            let message = "Execution interrupted";

            interp
                .realm
                .channel
                .borrow_mut()
                .error("Error", message, vec![format!("Error: {message}")]);
            (ExecutionStatus::Error, Some(message.into()))
        }
    }
}

fn timeout_alert() -> Output {
    alert_display(
        "warn",
        "Execution time limit reached",
        "The cell exceeded its execution time budget. Pending timers were stopped.",
    )
}

fn emit_throw(interp: &mut Interp, error: &Value) {
    let name = error_name(error);
    let message = error_message(error);
    let traceback = match error {
        Value::Object(obj) => match obj.borrow().props.get("stack") {
            Some(Value::String(stack)) => stack.lines().map(str::to_owned).collect(),
            _ => vec![format!("{name}: {message}")],
        },
        _ => vec![format!("{name}: {message}")],
    };

    interp.realm.channel.borrow_mut().error(&name, &message, traceback);
}

#[allow(clippy::too_many_arguments)]
fn finish(
    shared: &KernelShared,
    ctx: &ExecutionContext,
    state: &WorkerState,
    interp: &mut Interp,
    started: i64,
    status: ExecutionStatus,
    error: Option<String>,
    cell: &str,
) -> KernelReply {
    ctx.finish_cell();
    ctx.realm().global_obj.borrow_mut().props.shift_remove(RESULT_BINDING);
    state.interrupt.store(false, Ordering::SeqCst);

    if let Ok(mut current) = state.current.lock() {
        *current = None;
    }

    let outputs = interp.realm.channel.borrow_mut().take();
    let level = match status {
        ExecutionStatus::Ok => Level::Info,
        ExecutionStatus::Error => Level::Warn,
    };

    shared.log(level, &format!("Cell '{cell}' finished with status {:?}", status));
    KernelReply {
        outputs,
        execution: record(started, status, error),
    }
}

fn record(started: i64, status: ExecutionStatus, error: Option<String>) -> ExecutionRecord {
    ExecutionRecord {
        started,
        ended: unix_time_as_millis(),
        status,
        error,
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use indexmap::IndexMap;
    use serde_json::Value as JsonValue;

    use crate::config::KernelConfig;
    use crate::constants::{MODULES_DIR, UI_MIME};
    use crate::display::{ExecutionStatus, Output, StreamName};
    use crate::installer::{InstallError, Installer};
    use crate::kernel::*;
    use crate::{err, Error};

    struct StubInstaller;

    impl Installer for StubInstaller {
        fn install(&self, sandbox: &std::path::Path, _packages: &IndexMap<String, String>) -> crate::Result<()> {
            std::fs::create_dir_all(sandbox.join(MODULES_DIR)).unwrap();
            Ok(())
        }
    }

    fn test_kernel() -> (tempfile::TempDir, Kernel) {
        let tmp = tempfile::tempdir().unwrap();
        let config = KernelConfig::new()
            .workspace_root(tmp.path().to_path_buf())
            .installer(Arc::new(StubInstaller));

        (tmp, Kernel::new(config).unwrap())
    }

    fn run(kernel: &Kernel, notebook: &str, cell: &str, language: Language, source: &str) -> KernelReply {
        let mut request = ExecuteRequest::new(notebook, cell, language, source);

        request.timeout_ms = Some(5000);
        kernel.execute(request).unwrap()
    }

    fn displays(reply: &KernelReply) -> Vec<&Output> {
        reply
            .outputs
            .iter()
            .filter(|o| matches!(o, Output::DisplayData { .. } | Output::UpdateDisplayData { .. }))
            .collect()
    }

    fn ui_payload(output: &Output) -> &JsonValue {
        match output {
            Output::DisplayData { data, .. } | Output::UpdateDisplayData { data, .. } => data.get(UI_MIME).unwrap(),
            _ => panic!("not a display output"),
        }
    }

    #[test]
    fn s1_cross_cell_state() {
        let (_tmp, kernel) = test_kernel();
        let reply = run(&kernel, "n1", "c1", Language::Js, "const x = [1,2,3]; x;");

        assert_eq!(reply.execution.status, ExecutionStatus::Ok);

        let shown = displays(&reply);

        assert_eq!(shown.len(), 1);
        assert_eq!(ui_payload(shown[0])["ui"], "json");
        assert_eq!(ui_payload(shown[0])["json"], serde_json::json!([1.0, 2.0, 3.0]));

        let reply = run(&kernel, "n1", "c2", Language::Js, "x.push(4); x;");
        let shown = displays(&reply);

        assert_eq!(reply.execution.status, ExecutionStatus::Ok);
        assert_eq!(ui_payload(shown[0])["json"], serde_json::json!([1.0, 2.0, 3.0, 4.0]));
    }

    #[test]
    fn s2_policy_denial_is_catchable() {
        let (_tmp, kernel) = test_kernel();
        let source = "const fs = require('fs'); try { fs.writeFileSync('/etc/hosts','nope'); 'allowed'; } catch (e) { e.message; }";
        let reply = run(&kernel, "n1", "c1", Language::Js, source);

        assert_eq!(reply.execution.status, ExecutionStatus::Ok);

        let shown = displays(&reply);

        assert_eq!(shown.len(), 1);
        assert!(ui_payload(shown[0])["json"].as_str().unwrap().contains("not allowed"));
    }

    #[test]
    fn s3_timer_drain_orders_stream_before_display() {
        let (_tmp, kernel) = test_kernel();
        let reply = run(&kernel, "n1", "c1", Language::Js, "setTimeout(() => console.log('hi'), 50); 'done';");

        assert_eq!(reply.execution.status, ExecutionStatus::Ok);

        let stream_idx = reply
            .outputs
            .iter()
            .position(|o| matches!(o, Output::Stream { name: StreamName::Stdout, text } if text == "hi\n"))
            .unwrap();
        let display_idx = reply
            .outputs
            .iter()
            .position(|o| matches!(o, Output::DisplayData { .. }))
            .unwrap();

        assert!(stream_idx < display_idx);
        assert_eq!(ui_payload(&reply.outputs[display_idx])["json"], "done");
    }

    #[test]
    fn s4_async_error_raises_after_settle() {
        let (_tmp, kernel) = test_kernel();
        let reply = run(&kernel, "n1", "c1", Language::Js, "setTimeout(() => { throw new ReferenceError('boom'); }, 0);");

        assert_eq!(reply.execution.status, ExecutionStatus::Error);

        let stderr = reply
            .outputs
            .iter()
            .find_map(|o| match o {
                Output::Stream {
                    name: StreamName::Stderr,
                    text,
                } => Some(text.clone()),
                _ => None,
            })
            .unwrap();

        assert!(stderr.contains("boom"));
        assert!(matches!(
            reply.outputs.last().unwrap(),
            Output::Error { name, message, .. } if name == "ReferenceError" && message.contains("boom")
        ));
    }

    #[test]
    fn s5_ts_capture_suppression() {
        let (_tmp, kernel) = test_kernel();
        let reply = run(
            &kernel,
            "n1",
            "c1",
            Language::Ts,
            "const add = (a: number, b: number) => a + b; add(1,2);",
        );

        assert_eq!(reply.execution.status, ExecutionStatus::Ok);
        assert!(displays(&reply).is_empty());
    }

    #[test]
    fn s6_interaction_round_trip() {
        let (_tmp, kernel) = test_kernel();
        let source = r#"
const ui = require('@nodebooks/ui');
const btn = ui.button({ label: 'Go', onEvent: (ev) => {
  ui.display(ui.markdown('clicked: ' + ev));
  handle.update(ui.button({ label: 'Done' }));
}});
const handle = ui.display(btn);
'ready';
"#;
        let reply = run(&kernel, "n1", "c1", Language::Js, source);

        assert_eq!(reply.execution.status, ExecutionStatus::Ok);

        let button = displays(&reply)
            .into_iter()
            .find(|o| ui_payload(o)["ui"] == "button")
            .unwrap();
        let handler_id = ui_payload(button)["action"]["handlerId"].as_str().unwrap().to_owned();
        let display_id = match button {
            Output::DisplayData { display_id, .. } => display_id.clone().unwrap(),
            _ => unreachable!(),
        };
        let reply = kernel
            .invoke_interaction(InteractionRequest {
                handler_id,
                notebook_id: "n1".into(),
                environment: NotebookEnvironment::default(),
                event: serde_json::json!("click"),
                component_id: None,
                cell_id: None,
                on_stream: None,
                on_display: None,
            })
            .unwrap();

        assert_eq!(reply.execution.status, ExecutionStatus::Ok);

        let markdown = reply
            .outputs
            .iter()
            .find(|o| matches!(o, Output::DisplayData { .. }) && ui_payload(o)["ui"] == "markdown")
            .unwrap();

        assert_eq!(ui_payload(markdown)["markdown"], "clicked: click");

        let update = reply
            .outputs
            .iter()
            .find(|o| matches!(o, Output::UpdateDisplayData { .. }))
            .unwrap();

        assert_eq!(ui_payload(update)["label"], "Done");
        assert!(matches!(update, Output::UpdateDisplayData { display_id: Some(id), .. } if *id == display_id));
    }

    #[test]
    fn streams_precede_the_result_display() {
        let (_tmp, kernel) = test_kernel();
        let reply = run(&kernel, "n1", "c1", Language::Js, "console.log('a');\nconsole.log('b');\n[1];");
        let kinds: Vec<&str> = reply
            .outputs
            .iter()
            .map(|o| match o {
                Output::Stream { .. } => "stream",
                Output::DisplayData { .. } => "display",
                _ => "other",
            })
            .collect();

        assert_eq!(kinds, vec!["stream", "stream", "display"]);
    }

    #[test]
    fn redeclaring_top_level_names_is_allowed() {
        let (_tmp, kernel) = test_kernel();

        run(&kernel, "n1", "c1", Language::Js, "const n = 1; n;");

        let reply = run(&kernel, "n1", "c1", Language::Js, "const n = 2; n;");

        assert_eq!(reply.execution.status, ExecutionStatus::Ok);
        assert_eq!(ui_payload(displays(&reply)[0])["json"], serde_json::json!(2.0));
    }

    #[test]
    fn functions_and_classes_persist_across_cells() {
        let (_tmp, kernel) = test_kernel();

        run(&kernel, "n1", "c1", Language::Js, "function double(n) { return n * 2; }");
        run(&kernel, "n1", "c2", Language::Js, "class Box { constructor(v) { this.v = v; } get() { return this.v; } }");

        let reply = run(&kernel, "n1", "c3", Language::Js, "double(new Box(21).get());");

        assert_eq!(reply.execution.status, ExecutionStatus::Ok);
        assert_eq!(ui_payload(displays(&reply)[0])["json"], serde_json::json!(42.0));
    }

    #[test]
    fn reset_discards_declarations() {
        let (_tmp, kernel) = test_kernel();

        run(&kernel, "n1", "c1", Language::Js, "const gone = 7; gone;");
        kernel.reset("n1").unwrap();

        let reply = run(&kernel, "n1", "c2", Language::Js, "typeof gone;");

        assert_eq!(ui_payload(displays(&reply)[0])["json"], "undefined");
    }

    #[test]
    fn server_creation_is_denied_but_clients_survive() {
        let (_tmp, kernel) = test_kernel();
        let reply = run(
            &kernel,
            "n1",
            "c1",
            Language::Js,
            "const http = require('http'); try { http.createServer(); 'built'; } catch (e) { e.name + ':' + typeof http.request; }",
        );

        assert_eq!(ui_payload(displays(&reply)[0])["json"], "PolicyError:function");
    }

    #[test]
    fn dgram_bind_is_denied() {
        let (_tmp, kernel) = test_kernel();
        let source = "const dgram = require('dgram'); const s = dgram.createSocket('udp4'); try { s.bind(1234); 'bound'; } catch (e) { e.name; }";
        let reply = run(&kernel, "n1", "c1", Language::Js, source);

        assert_eq!(ui_payload(displays(&reply)[0])["json"], "PolicyError");
    }

    #[test]
    fn child_process_is_denied() {
        let (_tmp, kernel) = test_kernel();
        let reply = run(
            &kernel,
            "n1",
            "c1",
            Language::Js,
            "try { require('child_process'); 'loaded'; } catch (e) { e.name; }",
        );

        assert_eq!(ui_payload(displays(&reply)[0])["json"], "PolicyError");
    }

    #[test]
    fn sandboxed_fs_round_trip() {
        let (_tmp, kernel) = test_kernel();
        let source = "const fs = require('fs'); fs.writeFileSync('data.txt', 'payload'); fs.readFileSync('data.txt');";
        let reply = run(&kernel, "n1", "c1", Language::Js, source);

        assert_eq!(reply.execution.status, ExecutionStatus::Ok);
        assert_eq!(ui_payload(displays(&reply)[0])["json"], "payload");
    }

    #[test]
    fn env_variables_are_live_and_redacted() {
        let (_tmp, kernel) = test_kernel();
        let mut request = ExecuteRequest::new("n1", "c1", Language::Js, "process.env.API_KEY;");

        request.environment.variables.insert("API_KEY".into(), "secret".into());
        request.timeout_ms = Some(5000);

        let reply = kernel.execute(request).unwrap();

        assert_eq!(ui_payload(displays(&reply)[0])["json"], "secret");

        let mut request = ExecuteRequest::new("n1", "c2", Language::Js, "JSON.stringify(process.env);");

        request.environment.variables.insert("API_KEY".into(), "secret".into());
        request.timeout_ms = Some(5000);

        let reply = kernel.execute(request).unwrap();
        let text = ui_payload(displays(&reply)[0])["json"].as_str().unwrap().to_owned();

        assert!(text.starts_with("{\"NotebookEnv\""));
    }

    #[test]
    fn soft_timeout_stops_pending_timers() {
        let (_tmp, kernel) = test_kernel();
        let mut request = ExecuteRequest::new("n1", "c1", Language::Js, "setTimeout(() => console.log('late'), 60000); 'x';");

        request.timeout_ms = Some(1000);

        let reply = kernel.execute(request).unwrap();

        assert_eq!(reply.execution.status, ExecutionStatus::Error);

        let alert = displays(&reply)
            .into_iter()
            .find(|o| ui_payload(o)["ui"] == "alert")
            .unwrap();

        assert_eq!(ui_payload(alert)["level"], "warn");
        assert_eq!(ui_payload(alert)["title"], "Execution time limit reached");
    }

    #[test]
    fn hard_timeout_aborts_user_code() {
        let (_tmp, kernel) = test_kernel();
        let mut request = ExecuteRequest::new("n1", "c1", Language::Js, "while (true) {}");

        request.timeout_ms = Some(1000);

        let reply = kernel.execute(request).unwrap();

        assert_eq!(reply.execution.status, ExecutionStatus::Error);
        assert!(matches!(
            reply.outputs.last().unwrap(),
            Output::Error { name, .. } if name == "TimeoutError"
        ));
    }

    #[test]
    fn interrupt_cancels_the_running_cell() {
        let (_tmp, kernel) = test_kernel();
        let kernel = Arc::new(kernel);
        let signaler = kernel.clone();
        let thread = std::thread::spawn(move || {
            for _ in 0 .. 200 {
                std::thread::sleep(std::time::Duration::from_millis(25));

                if signaler.interrupt("n1", "c1") {
                    return true;
                }
            }

            false
        });
        let mut request = ExecuteRequest::new("n1", "c1", Language::Js, "while (true) {}");

        request.timeout_ms = Some(30_000);

        let reply = kernel.execute(request).unwrap();

        assert!(thread.join().unwrap());
        assert_eq!(reply.execution.status, ExecutionStatus::Error);
        assert_eq!(reply.execution.error.as_deref(), Some("Execution interrupted"));
    }

    #[test]
    fn install_failure_is_a_single_error_output() {
        struct FailingInstaller;

        impl Installer for FailingInstaller {
            fn install(&self, _sandbox: &std::path::Path, _packages: &IndexMap<String, String>) -> crate::Result<()> {
                err!(InstallError::Failed("npm ERR! 404 left-padd".into()))
            }
        }

        let tmp = tempfile::tempdir().unwrap();
        let config = KernelConfig::new()
            .workspace_root(tmp.path().to_path_buf())
            .installer(Arc::new(FailingInstaller));
        let kernel = Kernel::new(config).unwrap();
        let mut request = ExecuteRequest::new("n1", "c1", Language::Js, "1;");

        request.environment.packages.insert("left-padd".into(), "1".into());

        let reply = kernel.execute(request).unwrap();

        assert_eq!(reply.execution.status, ExecutionStatus::Error);
        assert_eq!(reply.outputs.len(), 1);
        assert!(matches!(
            &reply.outputs[0],
            Output::Error { name, message, .. } if name == "InstallError" && message.contains("404")
        ));
    }

    #[test]
    fn ui_package_is_always_resolvable() {
        let (_tmp, kernel) = test_kernel();
        let reply = run(&kernel, "n1", "c1", Language::Js, "typeof require('@nodebooks/ui').markdown;");

        assert_eq!(ui_payload(displays(&reply)[0])["json"], "function");
    }

    #[test]
    fn notebooks_are_isolated() {
        let (_tmp, kernel) = test_kernel();

        run(&kernel, "n1", "c1", Language::Js, "const only = 'n1'; only;");

        let reply = run(&kernel, "n2", "c1", Language::Js, "typeof only;");

        assert_eq!(ui_payload(displays(&reply)[0])["json"], "undefined");
    }

    #[test]
    fn uncaught_errors_become_error_records() {
        let (_tmp, kernel) = test_kernel();
        let reply = run(&kernel, "n1", "c1", Language::Js, "throw new TypeError('bad input');");

        assert_eq!(reply.execution.status, ExecutionStatus::Error);
        assert!(matches!(
            reply.outputs.last().unwrap(),
            Output::Error { name, message, .. } if name == "TypeError" && message == "bad input"
        ));
    }

    #[test]
    fn compile_errors_surface_with_status_error() {
        let (_tmp, kernel) = test_kernel();
        let reply = run(&kernel, "n1", "c1", Language::Js, "const = broken");

        assert_eq!(reply.execution.status, ExecutionStatus::Error);
        assert!(matches!(
            reply.outputs.last().unwrap(),
            Output::Error { name, .. } if name == "CompileError"
        ));
    }

    #[test]
    fn interval_first_tick_runs_before_drain_finishes() {
        let (_tmp, kernel) = test_kernel();
        let source =
            "const counter = { n: 0 };\nconst id = setInterval(() => { counter.n += 1; clearInterval(id); }, 20);\n'scheduled';";
        let reply = run(&kernel, "n1", "c1", Language::Js, source);

        assert_eq!(reply.execution.status, ExecutionStatus::Ok);

        let reply = run(&kernel, "n1", "c2", Language::Js, "counter.n;");

        assert_eq!(ui_payload(displays(&reply)[0])["json"], serde_json::json!(1.0));
    }
}
