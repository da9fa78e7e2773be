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

//! Tree-walking evaluator. A cell program runs against the notebook's
//! execution context; the hard deadline and the interrupt flag are
//! enforced through an abort channel that user try/catch cannot observe.

use std::{
    path::PathBuf,
    rc::Rc,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};

use crate::{
    constants::{DEADLINE_CHECK_STEPS, INTERRUPT_CHECK_STEPS},
    context::Realm,
    resolver,
    runtime::{ast::*, builtins, value::*},
};

pub enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

pub struct Interp {
    pub realm: Realm,
    pub deadline: Option<Instant>,
    pub interrupt: Arc<AtomicBool>,
    pub module_dirs: Vec<PathBuf>,
    call_depth: u32,
    steps: u64,
    /* Completion-value tracking mirrors script evaluation semantics:
     * expression statements in the program update the completion value,
     * including inside blocks and try/catch, but never inside function
     * bodies. */
    track_completion: bool,
    completion: Value,
}

const MAX_CALL_DEPTH: u32 = 256;

impl Interp {
    pub fn new(realm: Realm, deadline: Option<Instant>, interrupt: Arc<AtomicBool>) -> Self {
        Self {
            realm,
            deadline,
            interrupt,
            module_dirs: Vec::new(),
            call_depth: 0,
            steps: 0,
            track_completion: false,
            completion: Value::Undefined,
        }
    }

    pub fn checkpoint(&mut self) -> Exec<()> {
        self.steps += 1;

        if self.steps % DEADLINE_CHECK_STEPS == 0 {
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    return Err(Signal::Abort(AbortReason::Timeout));
                }
            }
        }

        if self.steps % INTERRUPT_CHECK_STEPS == 0 && self.interrupt.load(Ordering::Relaxed) {
            return Err(Signal::Abort(AbortReason::Interrupt));
        }

        Ok(())
    }

    /// Runs a program and yields its completion value: the value of the
    /// last expression statement executed outside function bodies.
    pub fn run_program(&mut self, program: &[Stmt], scope: &Scope) -> Exec<Value> {
        let tracked = std::mem::replace(&mut self.track_completion, true);
        let saved = std::mem::replace(&mut self.completion, Value::Undefined);

        self.hoist(program, scope);

        let mut outcome = Ok(());

        for stmt in program {
            if let Err(signal) = self.checkpoint() {
                outcome = Err(signal);
                break;
            }

            match self.exec_stmt(stmt, scope) {
                Ok(Flow::Normal) => {}
                Ok(Flow::Return(value)) => {
                    self.completion = value;
                    break;
                }
                Ok(Flow::Break | Flow::Continue) => {
                    outcome = Err(throw("SyntaxError", "Illegal break/continue at top level"));
                    break;
                }
                Err(signal) => {
                    outcome = Err(signal);
                    break;
                }
            }
        }

        self.track_completion = tracked;

        let completion = std::mem::replace(&mut self.completion, saved);

        outcome?;
        Ok(completion)
    }

    fn hoist(&mut self, stmts: &[Stmt], scope: &Scope) {
        for stmt in stmts {
            if let Stmt::Func(literal) = stmt {
                let func = self.make_function(literal, scope);

                if let Some(name) = &literal.name {
                    scope.declare(name, func);
                }
            }
        }
    }

    fn exec_stmts(&mut self, stmts: &[Stmt], scope: &Scope) -> Exec<Flow> {
        self.hoist(stmts, scope);

        for stmt in stmts {
            self.checkpoint()?;

            match self.exec_stmt(stmt, scope)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }

        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &Scope) -> Exec<Flow> {
        match stmt {
            Stmt::Empty => Ok(Flow::Normal),
            Stmt::Expr(expr) => {
                let value = self.eval(expr, scope)?;

                if self.track_completion {
                    self.completion = value;
                }

                Ok(Flow::Normal)
            }
            Stmt::Decl { declarators, .. } => {
                for (name, init) in declarators {
                    let value = match init {
                        Some(expr) => self.eval(expr, scope)?,
                        None => Value::Undefined,
                    };

                    scope.declare(name, value);
                }

                Ok(Flow::Normal)
            }
            Stmt::Func(literal) => {
                let func = self.make_function(literal, scope);

                if let Some(name) = &literal.name {
                    scope.declare(name, func);
                }

                Ok(Flow::Normal)
            }
            Stmt::Class(literal) => {
                let class = self.make_class(literal, scope);

                if let Some(name) = &literal.name {
                    scope.declare(name, class);
                }

                Ok(Flow::Normal)
            }
            Stmt::Block(stmts) => self.exec_stmts(stmts, &scope.child()),
            Stmt::If { cond, then, alt } => {
                if self.eval(cond, scope)?.truthy() {
                    return self.exec_stmt(then, &scope.child());
                }

                match alt {
                    Some(alt) => self.exec_stmt(alt, &scope.child()),
                    None => Ok(Flow::Normal),
                }
            }
            Stmt::While { cond, body } => {
                while self.eval(cond, scope)?.truthy() {
                    self.checkpoint()?;

                    match self.exec_stmt(body, &scope.child())? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }

                Ok(Flow::Normal)
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => {
                let loop_scope = scope.child();

                if let Some(init) = init {
                    self.exec_stmt(init, &loop_scope)?;
                }

                loop {
                    self.checkpoint()?;

                    if let Some(cond) = cond {
                        if !self.eval(cond, &loop_scope)?.truthy() {
                            break;
                        }
                    }

                    match self.exec_stmt(body, &loop_scope.child())? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        flow => return Ok(flow),
                    }

                    if let Some(update) = update {
                        self.eval(update, &loop_scope)?;
                    }
                }

                Ok(Flow::Normal)
            }
            Stmt::ForOf { name, iterable, body } => {
                let iterable = self.eval(iterable, scope)?;
                let elements: Vec<Value> = match &iterable {
                    Value::Array(elements) => elements.borrow().clone(),
                    Value::String(text) => text.chars().map(|c| Value::string(c.to_string())).collect(),
                    _ => return Err(throw("TypeError", &format!("{} is not iterable", to_display_string(&iterable)))),
                };

                for element in elements {
                    self.checkpoint()?;

                    let iter_scope = scope.child();

                    iter_scope.declare(name, element);

                    match self.exec_stmt(body, &iter_scope)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }

                Ok(Flow::Normal)
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Undefined,
                };

                Ok(Flow::Return(value))
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Throw(expr) => {
                let value = self.eval(expr, scope)?;

                Err(Signal::Throw(value))
            }
            Stmt::Try {
                block,
                param,
                handler,
                finalizer,
            } => {
                let mut flow = match self.exec_stmts(block, &scope.child()) {
                    Ok(flow) => Ok(flow),
                    Err(Signal::Abort(reason)) => return Err(Signal::Abort(reason)),
                    Err(Signal::Throw(error)) => match handler {
                        Some(handler) => {
                            let catch_scope = scope.child();

                            if let Some(param) = param {
                                catch_scope.declare(param, error);
                            }

                            match self.exec_stmts(handler, &catch_scope) {
                                Ok(flow) => Ok(flow),
                                Err(Signal::Abort(reason)) => return Err(Signal::Abort(reason)),
                                Err(signal) => Err(signal),
                            }
                        }
                        None => Err(Signal::Throw(error)),
                    },
                };

                if let Some(finalizer) = finalizer {
                    match self.exec_stmts(finalizer, &scope.child())? {
                        Flow::Normal => {}
                        /* A finalizer completing abruptly overrides the try result. */
                        override_flow => flow = Ok(override_flow),
                    }
                }

                match flow {
                    Ok(flow) => Ok(flow),
                    Err(signal) => Err(signal),
                }
            }
            Stmt::Import { bindings, source } => {
                let exports = resolver::require(self, source)?;

                match bindings {
                    ImportBindings::Bare => {}
                    ImportBindings::Namespace(name) => scope.declare(name, exports),
                    ImportBindings::Default(name) => scope.declare(name, default_export(self, &exports)?),
                    ImportBindings::Named(names) => self.bind_named_imports(names, &exports, scope)?,
                    ImportBindings::DefaultAndNamed(default, names) => {
                        scope.declare(default, default_export(self, &exports)?);
                        self.bind_named_imports(names, &exports, scope)?;
                    }
                }

                Ok(Flow::Normal)
            }
        }
    }

    fn bind_named_imports(&mut self, names: &[(String, String)], exports: &Value, scope: &Scope) -> Exec<()> {
        for (imported, local) in names {
            scope.declare(local, self.get_member(exports, imported)?);
        }

        Ok(())
    }

    // Expressions

    pub fn eval(&mut self, expr: &Expr, scope: &Scope) -> Exec<Value> {
        match expr {
            Expr::Num(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::string(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Template(chunks) => {
                let mut text = String::new();

                for chunk in chunks {
                    match chunk {
                        TplChunk::Str(s) => text.push_str(s),
                        TplChunk::Expr(expr) => {
                            let value = self.eval(expr, scope)?;

                            text.push_str(&to_display_string(&value));
                        }
                    }
                }

                Ok(Value::string(text))
            }
            Expr::Ident(name) => self.eval_ident(name, scope),
            Expr::Array(elements) => {
                let mut array = Vec::with_capacity(elements.len());

                for element in elements {
                    array.push(self.eval(element, scope)?);
                }

                Ok(Value::array(array))
            }
            Expr::Object(entries) => {
                let mut obj = Obj::new();

                for (key, value) in entries {
                    let key = match key {
                        PropKey::Ident(name) => name.clone(),
                        PropKey::Computed(expr) => {
                            let value = self.eval(expr, scope)?;

                            to_display_string(&value)
                        }
                    };
                    let value = self.eval(value, scope)?;

                    obj.props.insert(key, value);
                }

                Ok(Value::object(obj))
            }
            Expr::Func(literal) => Ok(self.make_function(literal, scope)),
            Expr::Class(literal) => Ok(self.make_class(literal, scope)),
            Expr::Member { object, property, .. } => {
                let object = self.eval(object, scope)?;

                self.get_member(&object, property)
            }
            Expr::Index { object, index } => {
                let object = self.eval(object, scope)?;
                let index = self.eval(index, scope)?;

                self.get_index(&object, &index)
            }
            Expr::Call { callee, args } => self.eval_call(callee, args, scope),
            Expr::New { callee, args } => {
                let callee = self.eval(callee, scope)?;
                let args = self.eval_args(args, scope)?;

                self.construct(&callee, &args)
            }
            Expr::Assign { target, op, value } => self.eval_assign(target, *op, value, scope),
            Expr::Update {
                target,
                increment,
                prefix,
            } => self.eval_update(target, *increment, *prefix, scope),
            Expr::Unary { op, operand } => self.eval_unary(*op, operand, scope),
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;

                self.eval_binary(*op, &left, &right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, scope)?;

                match op {
                    LogicalOp::And => match left.truthy() {
                        true => self.eval(right, scope),
                        false => Ok(left),
                    },
                    LogicalOp::Or => match left.truthy() {
                        true => Ok(left),
                        false => self.eval(right, scope),
                    },
                    LogicalOp::Coalesce => match matches!(left, Value::Undefined | Value::Null) {
                        true => self.eval(right, scope),
                        false => Ok(left),
                    },
                }
            }
            Expr::Cond { cond, then, alt } => match self.eval(cond, scope)?.truthy() {
                true => self.eval(then, scope),
                false => self.eval(alt, scope),
            },
            Expr::Await(operand) => {
                let value = self.eval(operand, scope)?;

                self.settle(value)
            }
        }
    }

    pub fn settle(&mut self, value: Value) -> Exec<Value> {
        match value {
            Value::Promise(state) => match &*state {
                PromiseState::Resolved(value) => Ok(value.clone()),
                PromiseState::Rejected(error) => Err(Signal::Throw(error.clone())),
            },
            value => Ok(value),
        }
    }

    fn eval_ident(&mut self, name: &str, scope: &Scope) -> Exec<Value> {
        if name == "globalThis" {
            if let Some(global) = scope.global_obj() {
                return Ok(Value::Object(global));
            }
        }

        match scope.lookup(name) {
            Some(value) => Ok(value),
            None => Err(throw("ReferenceError", &format!("{name} is not defined"))),
        }
    }

    fn eval_args(&mut self, args: &[Expr], scope: &Scope) -> Exec<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());

        for arg in args {
            values.push(self.eval(arg, scope)?);
        }

        Ok(values)
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr], scope: &Scope) -> Exec<Value> {
        let (this, func) = match callee {
            Expr::Member { object, property, .. } => {
                let object = self.eval(object, scope)?;
                let func = self.get_member(&object, property)?;

                (object, func)
            }
            Expr::Index { object, index } => {
                let object = self.eval(object, scope)?;
                let index = self.eval(index, scope)?;
                let func = self.get_index(&object, &index)?;

                (object, func)
            }
            _ => (Value::Undefined, self.eval(callee, scope)?),
        };
        let args = self.eval_args(args, scope)?;

        match func {
            Value::Undefined | Value::Null => Err(throw("TypeError", &format!("{} is not a function", describe_callee(callee)))),
            func => self.call_value(&func, &this, &args),
        }
    }

    pub fn call_value(&mut self, func: &Value, this: &Value, args: &[Value]) -> Exec<Value> {
        self.checkpoint()?;

        match func {
            Value::Function(callable) => self.call_callable(callable.clone(), this, args),
            Value::Class(_) => self.construct(func, args),
            _ => Err(throw("TypeError", &format!("{} is not a function", to_display_string(func)))),
        }
    }

    pub fn call_callable(&mut self, callable: Rc<Callable>, this: &Value, args: &[Value]) -> Exec<Value> {
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(throw("RangeError", "Maximum call stack size exceeded"));
        }

        self.call_depth += 1;

        let result = match &*callable {
            Callable::Native(native) => (native.handler)(self, this, args),
            Callable::User(func) => self.call_user(func, this, args),
        };

        self.call_depth -= 1;
        result
    }

    fn call_user(&mut self, func: &UserFn, this: &Value, args: &[Value]) -> Exec<Value> {
        let tracked = std::mem::replace(&mut self.track_completion, false);
        let outcome = self.call_user_untracked(func, this, args);

        self.track_completion = tracked;
        outcome
    }

    fn call_user_untracked(&mut self, func: &UserFn, this: &Value, args: &[Value]) -> Exec<Value> {
        let call_scope = func.scope.child();

        if !func.is_arrow {
            call_scope.declare("this", this.clone());
        }

        for (i, param) in func.params.iter().enumerate() {
            let mut value = args.get(i).cloned().unwrap_or(Value::Undefined);

            if matches!(value, Value::Undefined) {
                if let Some(default) = &param.default {
                    value = self.eval(default, &call_scope)?;
                }
            }

            call_scope.declare(&param.name, value);
        }

        let outcome = match &func.expr_body {
            Some(expr) => self.eval(expr, &call_scope),
            None => match self.exec_stmts(&func.body, &call_scope) {
                Ok(Flow::Return(value)) => Ok(value),
                Ok(_) => Ok(Value::Undefined),
                Err(signal) => Err(signal),
            },
        };

        match func.is_async {
            false => outcome,
            true => match outcome {
                Ok(value) => Ok(Value::Promise(Rc::new(PromiseState::Resolved(value)))),
                Err(Signal::Throw(error)) => Ok(Value::Promise(Rc::new(PromiseState::Rejected(error)))),
                Err(signal) => Err(signal),
            },
        }
    }

    pub fn construct(&mut self, callee: &Value, args: &[Value]) -> Exec<Value> {
        self.checkpoint()?;

        match callee {
            Value::Class(class) => {
                let instance = Value::object(Obj {
                    kind: ObjKind::Plain,
                    props: indexmap::IndexMap::new(),
                    class: Some(class.clone()),
                });

                if let Some(constructor) = &class.constructor {
                    self.call_callable(constructor.clone(), &instance, args)?;
                }

                Ok(instance)
            }
            Value::Function(callable) => {
                let instance = Value::object(Obj::new());
                let result = self.call_callable(callable.clone(), &instance, args)?;

                match result {
                    Value::Object(_) | Value::Array(_) => Ok(result),
                    _ => Ok(instance),
                }
            }
            _ => Err(throw("TypeError", &format!("{} is not a constructor", to_display_string(callee)))),
        }
    }

    fn make_function(&mut self, literal: &FnLiteral, scope: &Scope) -> Value {
        Value::Function(Rc::new(Callable::User(UserFn {
            name: literal.name.clone(),
            params: literal.params.clone(),
            body: literal.body.clone(),
            expr_body: literal.expr_body.clone(),
            scope: scope.clone(),
            is_arrow: literal.is_arrow,
            is_async: literal.is_async,
        })))
    }

    fn make_class(&mut self, literal: &ClassLiteral, scope: &Scope) -> Value {
        let constructor = literal.constructor.as_ref().map(|ctor| {
            Rc::new(Callable::User(UserFn {
                name: Some("constructor".into()),
                params: ctor.params.clone(),
                body: ctor.body.clone(),
                expr_body: None,
                scope: scope.clone(),
                is_arrow: false,
                is_async: false,
            }))
        });
        let mut methods = indexmap::IndexMap::new();

        for (name, method) in &literal.methods {
            methods.insert(
                name.clone(),
                Rc::new(Callable::User(UserFn {
                    name: Some(name.clone()),
                    params: method.params.clone(),
                    body: method.body.clone(),
                    expr_body: None,
                    scope: scope.clone(),
                    is_arrow: false,
                    is_async: method.is_async,
                })),
            );
        }

        Value::Class(Rc::new(ClassDef {
            name: literal.name.clone().unwrap_or_default(),
            constructor,
            methods,
        }))
    }

    // Property access

    pub fn get_member(&mut self, object: &Value, name: &str) -> Exec<Value> {
        match object {
            Value::Undefined | Value::Null => Err(throw(
                "TypeError",
                &format!("Cannot read properties of {} (reading '{name}')", to_display_string(object)),
            )),
            Value::Object(obj) => {
                {
                    let borrowed = obj.borrow();

                    if let ObjKind::Env(map) = &borrowed.kind {
                        return Ok(match map.borrow().get(name) {
                            Some(value) => Value::string(value.clone()),
                            None => Value::Undefined,
                        });
                    }

                    if let Some(value) = borrowed.props.get(name) {
                        return Ok(value.clone());
                    }

                    if let Some(class) = &borrowed.class {
                        if let Some(method) = class.methods.get(name) {
                            return Ok(Value::Function(method.clone()));
                        }
                    }
                }

                Ok(builtins::member(object, name).unwrap_or(Value::Undefined))
            }
            _ => Ok(builtins::member(object, name).unwrap_or(Value::Undefined)),
        }
    }

    pub fn get_index(&mut self, object: &Value, index: &Value) -> Exec<Value> {
        match (object, index) {
            (Value::Array(elements), Value::Number(n)) => {
                let elements = elements.borrow();
                let idx = *n as usize;

                Ok(match n.fract() == 0.0 && *n >= 0.0 && idx < elements.len() {
                    true => elements[idx].clone(),
                    false => Value::Undefined,
                })
            }
            (Value::String(text), Value::Number(n)) => {
                let idx = *n as usize;

                Ok(match text.chars().nth(idx) {
                    Some(c) if n.fract() == 0.0 && *n >= 0.0 => Value::string(c.to_string()),
                    _ => Value::Undefined,
                })
            }
            _ => {
                let key = to_display_string(index);

                self.get_member(object, &key)
            }
        }
    }

    pub fn set_member(&mut self, object: &Value, name: &str, value: Value) -> Exec<()> {
        match object {
            Value::Undefined | Value::Null => Err(throw(
                "TypeError",
                &format!("Cannot set properties of {} (setting '{name}')", to_display_string(object)),
            )),
            Value::Object(obj) => {
                let env = match &obj.borrow().kind {
                    ObjKind::Env(map) => Some(map.clone()),
                    _ => None,
                };

                match env {
                    Some(map) => {
                        map.borrow_mut().insert(name.into(), to_display_string(&value));
                    }
                    None => {
                        obj.borrow_mut().props.insert(name.into(), value);
                    }
                }

                Ok(())
            }
            Value::Array(elements) => {
                if name == "length" {
                    let len = value.to_number();

                    if len.fract() == 0.0 && len >= 0.0 {
                        elements.borrow_mut().resize(len as usize, Value::Undefined);
                        return Ok(());
                    }

                    return Err(throw("RangeError", "Invalid array length"));
                }

                if let Ok(idx) = name.parse::<usize>() {
                    let mut elements = elements.borrow_mut();

                    if idx >= elements.len() {
                        elements.resize(idx + 1, Value::Undefined);
                    }

                    elements[idx] = value;
                }

                Ok(())
            }
            /* Property writes on other primitives are silently dropped. */
            _ => Ok(()),
        }
    }

    fn eval_assign(&mut self, target: &Expr, op: AssignOp, value: &Expr, scope: &Scope) -> Exec<Value> {
        let next = match op {
            AssignOp::Assign => self.eval(value, scope)?,
            _ => {
                let current = self.eval(target, scope)?;
                let operand = self.eval(value, scope)?;
                let bin = match op {
                    AssignOp::Add => BinOp::Add,
                    AssignOp::Sub => BinOp::Sub,
                    AssignOp::Mul => BinOp::Mul,
                    AssignOp::Div => BinOp::Div,
                    _ => BinOp::Mod,
                };

                self.eval_binary(bin, &current, &operand)?
            }
        };

        self.assign_to(target, next.clone(), scope)?;
        Ok(next)
    }

    fn assign_to(&mut self, target: &Expr, value: Value, scope: &Scope) -> Exec<()> {
        match target {
            Expr::Ident(name) => {
                scope.assign(name, value);
                Ok(())
            }
            Expr::Member { object, property, .. } => {
                let object = self.eval(object, scope)?;

                self.set_member(&object, property, value)
            }
            Expr::Index { object, index } => {
                let object = self.eval(object, scope)?;
                let index = self.eval(index, scope)?;

                match (&object, &index) {
                    (Value::Array(elements), Value::Number(n)) if n.fract() == 0.0 && *n >= 0.0 => {
                        let idx = *n as usize;
                        let mut elements = elements.borrow_mut();

                        if idx >= elements.len() {
                            elements.resize(idx + 1, Value::Undefined);
                        }

                        elements[idx] = value;
                        Ok(())
                    }
                    _ => {
                        let key = to_display_string(&index);

                        self.set_member(&object, &key, value)
                    }
                }
            }
            _ => Err(throw("SyntaxError", "Invalid assignment target")),
        }
    }

    fn eval_update(&mut self, target: &Expr, increment: bool, prefix: bool, scope: &Scope) -> Exec<Value> {
        let current = self.eval(target, scope)?.to_number();
        let next = match increment {
            true => current + 1.0,
            false => current - 1.0,
        };

        self.assign_to(target, Value::Number(next), scope)?;
        Ok(Value::Number(match prefix {
            true => next,
            false => current,
        }))
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr, scope: &Scope) -> Exec<Value> {
        if let UnaryOp::TypeOf = op {
            /* typeof tolerates unresolved identifiers. */
            if let Expr::Ident(name) = operand {
                if scope.lookup(name).is_none() && name != "globalThis" {
                    return Ok(Value::string("undefined"));
                }
            }
        }

        if let UnaryOp::Delete = op {
            return self.eval_delete(operand, scope);
        }

        let value = self.eval(operand, scope)?;

        Ok(match op {
            UnaryOp::Not => Value::Bool(!value.truthy()),
            UnaryOp::Neg => Value::Number(-value.to_number()),
            UnaryOp::Plus => Value::Number(value.to_number()),
            UnaryOp::TypeOf => Value::string(value.type_of()),
            UnaryOp::Void => Value::Undefined,
            UnaryOp::Delete => Value::Bool(true),
        })
    }

    fn eval_delete(&mut self, operand: &Expr, scope: &Scope) -> Exec<Value> {
        let (object, key) = match operand {
            Expr::Member { object, property, .. } => (self.eval(object, scope)?, property.clone()),
            Expr::Index { object, index } => {
                let obj = self.eval(object, scope)?;
                let index = self.eval(index, scope)?;

                (obj, to_display_string(&index))
            }
            _ => return Ok(Value::Bool(true)),
        };

        if let Value::Object(obj) = &object {
            let env = match &obj.borrow().kind {
                ObjKind::Env(map) => Some(map.clone()),
                _ => None,
            };

            match env {
                Some(map) => {
                    map.borrow_mut().shift_remove(&key);
                }
                None => {
                    obj.borrow_mut().props.shift_remove(&key);
                }
            }
        }

        Ok(Value::Bool(true))
    }

    fn eval_binary(&mut self, op: BinOp, left: &Value, right: &Value) -> Exec<Value> {
        Ok(match op {
            BinOp::Add => match (left, right) {
                (Value::String(_), _) | (_, Value::String(_)) | (Value::Array(_), _) | (_, Value::Array(_)) =>
                    Value::string(format!("{}{}", to_display_string(left), to_display_string(right))),
                _ => Value::Number(left.to_number() + right.to_number()),
            },
            BinOp::Sub => Value::Number(left.to_number() - right.to_number()),
            BinOp::Mul => Value::Number(left.to_number() * right.to_number()),
            BinOp::Div => Value::Number(left.to_number() / right.to_number()),
            BinOp::Mod => Value::Number(left.to_number() % right.to_number()),
            BinOp::Pow => Value::Number(left.to_number().powf(right.to_number())),
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                let outcome = match (left, right) {
                    (Value::String(a), Value::String(b)) => match op {
                        BinOp::Lt => a < b,
                        BinOp::Gt => a > b,
                        BinOp::Le => a <= b,
                        _ => a >= b,
                    },
                    _ => {
                        let (a, b) = (left.to_number(), right.to_number());

                        match op {
                            BinOp::Lt => a < b,
                            BinOp::Gt => a > b,
                            BinOp::Le => a <= b,
                            _ => a >= b,
                        }
                    }
                };

                Value::Bool(outcome)
            }
            BinOp::Eq => Value::Bool(loose_equals(left, right)),
            BinOp::Ne => Value::Bool(!loose_equals(left, right)),
            BinOp::StrictEq => Value::Bool(strict_equals(left, right)),
            BinOp::StrictNe => Value::Bool(!strict_equals(left, right)),
            BinOp::InstanceOf => Value::Bool(instance_of(left, right)),
            BinOp::In => match right {
                Value::Object(obj) => Value::Bool(obj.borrow().props.contains_key(&to_display_string(left))),
                Value::Array(elements) => {
                    let idx = left.to_number();

                    Value::Bool(idx.fract() == 0.0 && idx >= 0.0 && (idx as usize) < elements.borrow().len())
                }
                _ => return Err(throw("TypeError", "Cannot use 'in' operator")),
            },
        })
    }
}

fn instance_of(left: &Value, right: &Value) -> bool {
    match right {
        Value::Class(class) => match left {
            Value::Object(obj) => obj.borrow().class.as_ref().is_some_and(|c| Rc::ptr_eq(c, class)),
            _ => false,
        },
        /* Error constructors are natives; any error object is an instance
         * of Error, and of its own constructor by name. */
        Value::Function(callable) => match (&**callable, left) {
            (Callable::Native(native), Value::Object(obj)) if native.name.ends_with("Error") => {
                let obj = obj.borrow();

                matches!(obj.kind, ObjKind::Error)
                    && (native.name == "Error" || matches!(obj.props.get("name"), Some(Value::String(n)) if **n == native.name))
            }
            _ => false,
        },
        _ => false,
    }
}

/* Node interop for default imports: a module with an explicit `default`
 * export provides it, otherwise the exports object itself binds. */
fn default_export(interp: &mut Interp, exports: &Value) -> Exec<Value> {
    let default = interp.get_member(exports, "default")?;

    Ok(match default {
        Value::Undefined => exports.clone(),
        default => default,
    })
}

fn describe_callee(callee: &Expr) -> String {
    match callee {
        Expr::Ident(name) => name.clone(),
        Expr::Member { property, .. } => property.clone(),
        _ => "expression".into(),
    }
}
