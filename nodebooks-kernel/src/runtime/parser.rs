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

//! Recursive-descent parser for the cell language: the JavaScript subset
//! notebook cells practically use, with TypeScript annotations tolerated
//! and discarded. Unsupported constructs fail as compile errors rather
//! than being silently mis-evaluated.

use std::rc::Rc;

use crate::runtime::{
    ast::*,
    lexer::{Lexer, Tok, Token, TplPiece},
    CompileError,
};

pub fn parse_program(source: &str) -> Result<Vec<Stmt>, CompileError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser::new(tokens);
    let mut program = Vec::new();

    while !parser.at_eof() {
        program.push(parser.parse_statement()?);
    }

    Ok(program)
}

pub fn parse_expression(source: &str) -> Result<Expr, CompileError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_assignment()?;

    match parser.at_eof() {
        true => Ok(expr),
        false => Err(parser.unexpected("end of expression")),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Tok {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].tok
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)].tok
    }

    fn line(&self) -> u32 {
        self.tokens[self.pos.min(self.tokens.len() - 1)].line
    }

    fn prev_line(&self) -> u32 {
        self.tokens[self.pos.saturating_sub(1)].line
    }

    fn bump(&mut self) -> Tok {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].tok.clone();

        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }

        tok
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Tok::Eof)
    }

    fn at_punct(&self, punct: &str) -> bool {
        matches!(self.peek(), Tok::Punct(p) if *p == punct)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.at_punct(punct) {
            self.bump();
            return true;
        }

        false
    }

    fn expect_punct(&mut self, punct: &'static str) -> Result<(), CompileError> {
        match self.eat_punct(punct) {
            true => Ok(()),
            false => Err(self.unexpected(punct)),
        }
    }

    fn at_ident(&self, name: &str) -> bool {
        matches!(self.peek(), Tok::Ident(id) if id == name)
    }

    fn eat_ident(&mut self, name: &str) -> bool {
        if self.at_ident(name) {
            self.bump();
            return true;
        }

        false
    }

    fn expect_ident(&mut self) -> Result<String, CompileError> {
        match self.peek().clone() {
            Tok::Ident(name) => {
                self.bump();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        CompileError::new(format!("Expected {} but found {}", expected, describe(self.peek())), self.line())
    }

    fn unsupported(&self, what: &str) -> CompileError {
        CompileError::new(format!("Unsupported syntax: {what}"), self.line())
    }

    /* Automatic semicolon insertion: an explicit semicolon, a closing
     * brace, end of input, or a line break all terminate a statement. */
    fn semicolon(&mut self) -> Result<(), CompileError> {
        if self.eat_punct(";") || self.at_punct("}") || self.at_eof() {
            return Ok(());
        }

        match self.line() > self.prev_line() {
            true => Ok(()),
            false => Err(self.unexpected(";")),
        }
    }

    fn newline_before(&self) -> bool {
        self.line() > self.prev_line()
    }

    // Statements

    fn parse_statement(&mut self) -> Result<Stmt, CompileError> {
        match self.peek().clone() {
            Tok::Punct(";") => {
                self.bump();
                Ok(Stmt::Empty)
            }
            Tok::Punct("{") => {
                self.bump();
                Ok(Stmt::Block(self.parse_block_body()?))
            }
            Tok::Ident(id) => match id.as_str() {
                "var" | "let" | "const" => self.parse_decl(),
                "function" => {
                    self.bump();
                    Ok(Stmt::Func(self.parse_fn_literal(false, true)?))
                }
                "async" if matches!(self.peek_at(1), Tok::Ident(next) if next == "function") => {
                    self.bump();
                    self.bump();
                    Ok(Stmt::Func(self.parse_fn_literal(true, true)?))
                }
                "class" => {
                    self.bump();
                    Ok(Stmt::Class(self.parse_class_literal(true)?))
                }
                "return" => self.parse_return(),
                "if" => self.parse_if(),
                "while" => self.parse_while(),
                "for" => self.parse_for(),
                "break" => {
                    self.bump();
                    self.semicolon()?;
                    Ok(Stmt::Break)
                }
                "continue" => {
                    self.bump();
                    self.semicolon()?;
                    Ok(Stmt::Continue)
                }
                "throw" => {
                    self.bump();

                    let expr = self.parse_expr()?;

                    self.semicolon()?;
                    Ok(Stmt::Throw(expr))
                }
                "try" => self.parse_try(),
                "import" => self.parse_import(),
                "export" => self.parse_export(),
                "interface" if matches!(self.peek_at(1), Tok::Ident(_)) => self.parse_interface(),
                "type" if matches!(self.peek_at(1), Tok::Ident(_)) && matches!(self.peek_at(2), Tok::Punct("=") | Tok::Punct("<")) =>
                    self.parse_type_alias(),
                "switch" | "do" | "with" => Err(self.unsupported(&format!("'{id}' statement"))),
                _ => self.parse_expr_statement(),
            },
            _ => self.parse_expr_statement(),
        }
    }

    fn parse_expr_statement(&mut self) -> Result<Stmt, CompileError> {
        let expr = self.parse_expr()?;

        self.semicolon()?;
        Ok(Stmt::Expr(expr))
    }

    fn parse_block_body(&mut self) -> Result<Vec<Stmt>, CompileError> {
        let mut body = Vec::new();

        while !self.at_punct("}") {
            if self.at_eof() {
                return Err(self.unexpected("}"));
            }

            body.push(self.parse_statement()?);
        }

        self.bump();
        Ok(body)
    }

    fn parse_braced_block(&mut self) -> Result<Vec<Stmt>, CompileError> {
        self.expect_punct("{")?;
        self.parse_block_body()
    }

    fn parse_decl(&mut self) -> Result<Stmt, CompileError> {
        let kind = match self.bump() {
            Tok::Ident(id) if id == "let" => DeclKind::Let,
            Tok::Ident(id) if id == "const" => DeclKind::Const,
            _ => DeclKind::Var,
        };
        let declarators = self.parse_declarators()?;

        self.semicolon()?;
        Ok(Stmt::Decl { kind, declarators })
    }

    fn parse_declarators(&mut self) -> Result<Vec<(String, Option<Expr>)>, CompileError> {
        let mut declarators = Vec::new();

        loop {
            if matches!(self.peek(), Tok::Punct("{") | Tok::Punct("[")) {
                return Err(self.unsupported("destructuring declaration"));
            }

            let name = self.expect_ident()?;

            if self.eat_punct(":") {
                self.skip_type()?;
            }

            let init = match self.eat_punct("=") {
                true => Some(self.parse_assignment()?),
                false => None,
            };

            declarators.push((name, init));

            if !self.eat_punct(",") {
                return Ok(declarators);
            }
        }
    }

    fn parse_return(&mut self) -> Result<Stmt, CompileError> {
        self.bump();

        if self.at_punct(";") || self.at_punct("}") || self.at_eof() || self.newline_before() {
            self.semicolon()?;
            return Ok(Stmt::Return(None));
        }

        let expr = self.parse_expr()?;

        self.semicolon()?;
        Ok(Stmt::Return(Some(expr)))
    }

    fn parse_if(&mut self) -> Result<Stmt, CompileError> {
        self.bump();
        self.expect_punct("(")?;

        let cond = self.parse_expr()?;

        self.expect_punct(")")?;

        let then = Box::new(self.parse_statement()?);
        let alt = match self.eat_ident("else") {
            true => Some(Box::new(self.parse_statement()?)),
            false => None,
        };

        Ok(Stmt::If { cond, then, alt })
    }

    fn parse_while(&mut self) -> Result<Stmt, CompileError> {
        self.bump();
        self.expect_punct("(")?;

        let cond = self.parse_expr()?;

        self.expect_punct(")")?;
        Ok(Stmt::While {
            cond,
            body: Box::new(self.parse_statement()?),
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, CompileError> {
        self.bump();
        self.expect_punct("(")?;

        if matches!(self.peek(), Tok::Ident(id) if id == "var" || id == "let" || id == "const") {
            self.bump();

            let name = self.expect_ident()?;

            if self.eat_ident("of") {
                let iterable = self.parse_expr()?;

                self.expect_punct(")")?;
                return Ok(Stmt::ForOf {
                    name,
                    iterable,
                    body: Box::new(self.parse_statement()?),
                });
            }

            if self.eat_ident("in") {
                return Err(self.unsupported("'for..in' loop"));
            }

            if self.eat_punct(":") {
                self.skip_type()?;
            }

            let init = match self.eat_punct("=") {
                true => Some(self.parse_assignment()?),
                false => None,
            };
            let mut declarators = vec![(name, init)];

            while self.eat_punct(",") {
                declarators.extend(self.parse_declarators()?);
            }

            self.expect_punct(";")?;
            return self.parse_for_tail(Some(Box::new(Stmt::Decl {
                kind: DeclKind::Let,
                declarators,
            })));
        }

        let init = match self.at_punct(";") {
            true => None,
            false => Some(Box::new(Stmt::Expr(self.parse_expr()?))),
        };

        self.expect_punct(";")?;
        self.parse_for_tail(init)
    }

    fn parse_for_tail(&mut self, init: Option<Box<Stmt>>) -> Result<Stmt, CompileError> {
        let cond = match self.at_punct(";") {
            true => None,
            false => Some(self.parse_expr()?),
        };

        self.expect_punct(";")?;

        let update = match self.at_punct(")") {
            true => None,
            false => Some(self.parse_expr()?),
        };

        self.expect_punct(")")?;
        Ok(Stmt::For {
            init,
            cond,
            update,
            body: Box::new(self.parse_statement()?),
        })
    }

    fn parse_try(&mut self) -> Result<Stmt, CompileError> {
        self.bump();

        let block = self.parse_braced_block()?;
        let mut param = None;
        let mut handler = None;

        if self.eat_ident("catch") {
            if self.eat_punct("(") {
                param = Some(self.expect_ident()?);

                if self.eat_punct(":") {
                    self.skip_type()?;
                }

                self.expect_punct(")")?;
            }

            handler = Some(self.parse_braced_block()?);
        }

        let finalizer = match self.eat_ident("finally") {
            true => Some(self.parse_braced_block()?),
            false => None,
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(self.unexpected("catch or finally"));
        }

        Ok(Stmt::Try {
            block,
            param,
            handler,
            finalizer,
        })
    }

    fn parse_import(&mut self) -> Result<Stmt, CompileError> {
        self.bump();

        if let Tok::Str(source) = self.peek().clone() {
            self.bump();
            self.semicolon()?;
            return Ok(Stmt::Import {
                bindings: ImportBindings::Bare,
                source,
            });
        }

        let bindings = if self.eat_punct("*") {
            if !self.eat_ident("as") {
                return Err(self.unexpected("as"));
            }

            ImportBindings::Namespace(self.expect_ident()?)
        } else if self.at_punct("{") {
            ImportBindings::Named(self.parse_named_imports()?)
        } else {
            let default = self.expect_ident()?;

            match self.eat_punct(",") {
                true => ImportBindings::DefaultAndNamed(default, self.parse_named_imports()?),
                false => ImportBindings::Default(default),
            }
        };

        if !self.eat_ident("from") {
            return Err(self.unexpected("from"));
        }

        let source = match self.bump() {
            Tok::Str(source) => source,
            _ => return Err(self.unexpected("module path")),
        };

        self.semicolon()?;
        Ok(Stmt::Import { bindings, source })
    }

    fn parse_named_imports(&mut self) -> Result<Vec<(String, String)>, CompileError> {
        self.expect_punct("{")?;

        let mut names = Vec::new();

        while !self.eat_punct("}") {
            let imported = self.expect_ident()?;
            let local = match self.eat_ident("as") {
                true => self.expect_ident()?,
                false => imported.clone(),
            };

            names.push((imported, local));

            if !self.at_punct("}") {
                self.expect_punct(",")?;
            }
        }

        Ok(names)
    }

    fn parse_export(&mut self) -> Result<Stmt, CompileError> {
        self.bump();
        self.eat_ident("default");

        /* Bare re-export lists carry no runtime meaning for a cell. */
        if self.at_punct("{") {
            self.skip_balanced("{", "}")?;
            self.eat_ident("from");

            if let Tok::Str(_) = self.peek() {
                self.bump();
            }

            self.semicolon()?;
            return Ok(Stmt::Empty);
        }

        self.parse_statement()
    }

    fn parse_interface(&mut self) -> Result<Stmt, CompileError> {
        self.bump();
        self.expect_ident()?;

        if self.at_punct("<") {
            self.skip_type_args()?;
        }

        while self.eat_ident("extends") || self.eat_punct(",") {
            self.skip_type()?;
        }

        self.skip_balanced("{", "}")?;
        Ok(Stmt::Empty)
    }

    fn parse_type_alias(&mut self) -> Result<Stmt, CompileError> {
        self.bump();
        self.expect_ident()?;

        if self.at_punct("<") {
            self.skip_type_args()?;
        }

        self.expect_punct("=")?;
        self.skip_type()?;
        self.semicolon()?;
        Ok(Stmt::Empty)
    }

    // Expressions

    fn parse_expr(&mut self) -> Result<Expr, CompileError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, CompileError> {
        if let Some(arrow) = self.try_parse_arrow()? {
            return Ok(arrow);
        }

        let left = self.parse_conditional()?;
        let op = match self.peek() {
            Tok::Punct("=") => AssignOp::Assign,
            Tok::Punct("+=") => AssignOp::Add,
            Tok::Punct("-=") => AssignOp::Sub,
            Tok::Punct("*=") => AssignOp::Mul,
            Tok::Punct("/=") => AssignOp::Div,
            Tok::Punct("%=") => AssignOp::Mod,
            _ => return Ok(left),
        };

        if !matches!(left, Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. }) {
            return Err(self.unsupported("assignment target"));
        }

        self.bump();
        Ok(Expr::Assign {
            target: Box::new(left),
            op,
            value: Box::new(self.parse_assignment()?),
        })
    }

    fn try_parse_arrow(&mut self) -> Result<Option<Expr>, CompileError> {
        let is_async = self.at_ident("async")
            && matches!(self.peek_at(1), Tok::Ident(_) | Tok::Punct("("))
            && !matches!(self.peek_at(1), Tok::Ident(id) if id == "function");
        let offset = usize::from(is_async);

        if let (Tok::Ident(name), Tok::Punct("=>")) = (self.peek_at(offset), self.peek_at(offset + 1)) {
            let param = Param {
                name: name.clone(),
                default: None,
            };

            for _ in 0 ..= offset {
                self.bump();
            }

            self.bump();
            return Ok(Some(self.parse_arrow_body(vec![param], is_async)?));
        }

        if !matches!(self.peek_at(offset), Tok::Punct("(")) {
            return Ok(None);
        }

        let snapshot = self.pos;

        for _ in 0 .. offset {
            self.bump();
        }

        match self.scan_arrow_params() {
            Ok(Some(params)) => Ok(Some(self.parse_arrow_body(params, is_async)?)),
            Ok(None) | Err(_) => {
                self.pos = snapshot;
                Ok(None)
            }
        }
    }

    /* Attempts to read "( params ) [: type] =>"; the caller rewinds when
     * this is actually a parenthesized expression. */
    fn scan_arrow_params(&mut self) -> Result<Option<Vec<Param>>, CompileError> {
        self.expect_punct("(")?;

        let mut params = Vec::new();

        while !self.eat_punct(")") {
            if self.at_punct("...") {
                return Err(self.unsupported("rest parameter"));
            }

            let name = self.expect_ident()?;

            self.eat_punct("?");

            if self.eat_punct(":") {
                self.skip_type()?;
            }

            let default = match self.eat_punct("=") {
                true => Some(self.parse_assignment()?),
                false => None,
            };

            params.push(Param { name, default });

            if !self.at_punct(")") {
                self.expect_punct(",")?;
            }
        }

        if self.eat_punct(":") {
            self.skip_type()?;
        }

        match self.eat_punct("=>") {
            true => Ok(Some(params)),
            false => Ok(None),
        }
    }

    fn parse_arrow_body(&mut self, params: Vec<Param>, is_async: bool) -> Result<Expr, CompileError> {
        let (body, expr_body) = match self.at_punct("{") {
            true => (self.parse_braced_block()?, None),
            false => (Vec::new(), Some(Rc::new(self.parse_assignment()?))),
        };

        Ok(Expr::Func(Box::new(FnLiteral {
            name: None,
            params,
            body: Rc::new(body),
            expr_body,
            is_arrow: true,
            is_async,
        })))
    }

    fn parse_conditional(&mut self) -> Result<Expr, CompileError> {
        let cond = self.parse_nullish()?;

        if !self.eat_punct("?") {
            return Ok(cond);
        }

        let then = self.parse_assignment()?;

        self.expect_punct(":")?;
        Ok(Expr::Cond {
            cond: Box::new(cond),
            then: Box::new(then),
            alt: Box::new(self.parse_assignment()?),
        })
    }

    fn parse_nullish(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_or()?;

        while self.eat_punct("??") {
            left = Expr::Logical {
                op: LogicalOp::Coalesce,
                left: Box::new(left),
                right: Box::new(self.parse_or()?),
            };
        }

        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_and()?;

        while self.eat_punct("||") {
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(self.parse_and()?),
            };
        }

        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_equality()?;

        while self.eat_punct("&&") {
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(self.parse_equality()?),
            };
        }

        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_relational()?;

        loop {
            let op = match self.peek() {
                Tok::Punct("===") => BinOp::StrictEq,
                Tok::Punct("!==") => BinOp::StrictNe,
                Tok::Punct("==") => BinOp::Eq,
                Tok::Punct("!=") => BinOp::Ne,
                _ => return Ok(left),
            };

            self.bump();
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(self.parse_relational()?),
            };
        }
    }

    fn parse_relational(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_additive()?;

        loop {
            let op = match self.peek() {
                Tok::Punct("<") => BinOp::Lt,
                Tok::Punct(">") => BinOp::Gt,
                Tok::Punct("<=") => BinOp::Le,
                Tok::Punct(">=") => BinOp::Ge,
                Tok::Ident(id) if id == "instanceof" => BinOp::InstanceOf,
                Tok::Ident(id) if id == "in" => BinOp::In,
                _ => return Ok(left),
            };

            self.bump();
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(self.parse_additive()?),
            };
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.peek() {
                Tok::Punct("+") => BinOp::Add,
                Tok::Punct("-") => BinOp::Sub,
                _ => return Ok(left),
            };

            self.bump();
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(self.parse_multiplicative()?),
            };
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_exponent()?;

        loop {
            let op = match self.peek() {
                Tok::Punct("*") => BinOp::Mul,
                Tok::Punct("/") => BinOp::Div,
                Tok::Punct("%") => BinOp::Mod,
                _ => return Ok(left),
            };

            self.bump();
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(self.parse_exponent()?),
            };
        }
    }

    fn parse_exponent(&mut self) -> Result<Expr, CompileError> {
        let left = self.parse_unary()?;

        if !self.eat_punct("**") {
            return Ok(left);
        }

        Ok(Expr::Binary {
            op: BinOp::Pow,
            left: Box::new(left),
            right: Box::new(self.parse_exponent()?),
        })
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        let op = match self.peek() {
            Tok::Punct("!") => Some(UnaryOp::Not),
            Tok::Punct("-") => Some(UnaryOp::Neg),
            Tok::Punct("+") => Some(UnaryOp::Plus),
            Tok::Ident(id) if id == "typeof" => Some(UnaryOp::TypeOf),
            Tok::Ident(id) if id == "void" => Some(UnaryOp::Void),
            Tok::Ident(id) if id == "delete" => Some(UnaryOp::Delete),
            _ => None,
        };

        if let Some(op) = op {
            self.bump();
            return Ok(Expr::Unary {
                op,
                operand: Box::new(self.parse_unary()?),
            });
        }

        if self.eat_ident("await") {
            return Ok(Expr::Await(Box::new(self.parse_unary()?)));
        }

        if self.at_punct("++") || self.at_punct("--") {
            let increment = matches!(self.bump(), Tok::Punct("++"));
            let target = self.parse_unary()?;

            if !matches!(target, Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. }) {
                return Err(self.unsupported("update target"));
            }

            return Ok(Expr::Update {
                target: Box::new(target),
                increment,
                prefix: true,
            });
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_call_member()?;

        if (self.at_punct("++") || self.at_punct("--"))
            && !self.newline_before()
            && matches!(expr, Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. })
        {
            let increment = matches!(self.bump(), Tok::Punct("++"));

            expr = Expr::Update {
                target: Box::new(expr),
                increment,
                prefix: false,
            };
        }

        /* TypeScript cast and non-null suffixes carry no runtime meaning. */
        loop {
            if self.at_ident("as") && !self.newline_before() {
                self.bump();
                self.skip_type()?;
                continue;
            }

            if self.at_punct("!") && !self.newline_before() {
                self.bump();
                continue;
            }

            return Ok(expr);
        }
    }

    fn parse_call_member(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.eat_punct(".") || self.eat_punct("?.") {
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: self.expect_ident()?,
                    optional: false,
                };
            } else if self.eat_punct("[") {
                let index = self.parse_expr()?;

                self.expect_punct("]")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.at_punct("(") {
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args: self.parse_args()?,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, CompileError> {
        self.expect_punct("(")?;

        let mut args = Vec::new();

        while !self.eat_punct(")") {
            if self.at_punct("...") {
                return Err(self.unsupported("spread argument"));
            }

            args.push(self.parse_assignment()?);

            if !self.at_punct(")") {
                self.expect_punct(",")?;
            }
        }

        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        match self.peek().clone() {
            Tok::Num(value) => {
                self.bump();
                Ok(Expr::Num(value))
            }
            Tok::Str(value) => {
                self.bump();
                Ok(Expr::Str(value))
            }
            Tok::Template(pieces) => {
                self.bump();
                self.parse_template(pieces)
            }
            Tok::Punct("(") => {
                self.bump();

                let expr = self.parse_expr()?;

                self.expect_punct(")")?;
                Ok(expr)
            }
            Tok::Punct("[") => self.parse_array_literal(),
            Tok::Punct("{") => self.parse_object_literal(),
            Tok::Ident(id) => match id.as_str() {
                "true" => {
                    self.bump();
                    Ok(Expr::Bool(true))
                }
                "false" => {
                    self.bump();
                    Ok(Expr::Bool(false))
                }
                "null" => {
                    self.bump();
                    Ok(Expr::Null)
                }
                "undefined" => {
                    self.bump();
                    Ok(Expr::Undefined)
                }
                "function" => {
                    self.bump();
                    Ok(Expr::Func(Box::new(self.parse_fn_literal(false, false)?)))
                }
                "async" if matches!(self.peek_at(1), Tok::Ident(next) if next == "function") => {
                    self.bump();
                    self.bump();
                    Ok(Expr::Func(Box::new(self.parse_fn_literal(true, false)?)))
                }
                "class" => {
                    self.bump();
                    Ok(Expr::Class(Box::new(self.parse_class_literal(false)?)))
                }
                "new" => {
                    self.bump();

                    let callee = self.parse_new_callee()?;
                    let args = match self.at_punct("(") {
                        true => self.parse_args()?,
                        false => Vec::new(),
                    };

                    Ok(Expr::New {
                        callee: Box::new(callee),
                        args,
                    })
                }
                _ => {
                    self.bump();
                    Ok(Expr::Ident(id))
                }
            },
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_new_callee(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.eat_punct(".") {
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: self.expect_ident()?,
                    optional: false,
                };
            } else if self.eat_punct("[") {
                let index = self.parse_expr()?;

                self.expect_punct("]")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_template(&mut self, pieces: Vec<TplPiece>) -> Result<Expr, CompileError> {
        let mut chunks = Vec::new();

        for piece in pieces {
            match piece {
                TplPiece::Str(text) => chunks.push(TplChunk::Str(text)),
                TplPiece::Src(src) => {
                    let expr = parse_expression(&src).map_err(|e| CompileError::new(e.message, self.line()))?;

                    chunks.push(TplChunk::Expr(Box::new(expr)));
                }
            }
        }

        Ok(Expr::Template(chunks))
    }

    fn parse_array_literal(&mut self) -> Result<Expr, CompileError> {
        self.expect_punct("[")?;

        let mut elements = Vec::new();

        while !self.eat_punct("]") {
            if self.at_punct("...") {
                return Err(self.unsupported("spread element"));
            }

            elements.push(self.parse_assignment()?);

            if !self.at_punct("]") {
                self.expect_punct(",")?;
            }
        }

        Ok(Expr::Array(elements))
    }

    fn parse_object_literal(&mut self) -> Result<Expr, CompileError> {
        self.expect_punct("{")?;

        let mut entries = Vec::new();

        while !self.eat_punct("}") {
            if self.at_punct("...") {
                return Err(self.unsupported("spread property"));
            }

            let key = match self.peek().clone() {
                Tok::Ident(id) => {
                    self.bump();
                    PropKey::Ident(id)
                }
                Tok::Str(text) => {
                    self.bump();
                    PropKey::Ident(text)
                }
                Tok::Num(value) => {
                    self.bump();
                    PropKey::Ident(crate::runtime::value::js_number_string(value))
                }
                Tok::Punct("[") => {
                    self.bump();

                    let expr = self.parse_assignment()?;

                    self.expect_punct("]")?;
                    PropKey::Computed(Box::new(expr))
                }
                _ => return Err(self.unexpected("property name")),
            };

            let value = if self.at_punct("(") {
                /* Method shorthand. */
                let params = self.parse_fn_params()?;
                let body = self.parse_braced_block()?;

                Expr::Func(Box::new(FnLiteral {
                    name: None,
                    params,
                    body: Rc::new(body),
                    expr_body: None,
                    is_arrow: false,
                    is_async: false,
                }))
            } else if self.eat_punct(":") {
                self.parse_assignment()?
            } else {
                match &key {
                    PropKey::Ident(name) => Expr::Ident(name.clone()),
                    PropKey::Computed(_) => return Err(self.unexpected(":")),
                }
            };

            entries.push((key, value));

            if !self.at_punct("}") {
                self.expect_punct(",")?;
            }
        }

        Ok(Expr::Object(entries))
    }

    /* Parses a function literal with the leading 'function' (and optional
     * 'async') already consumed. */
    fn parse_fn_literal(&mut self, is_async: bool, require_name: bool) -> Result<FnLiteral, CompileError> {
        if self.at_punct("*") {
            return Err(self.unsupported("generator function"));
        }

        let name = match self.peek() {
            Tok::Ident(id) => {
                let name = id.clone();

                self.bump();
                Some(name)
            }
            _ if require_name => return Err(self.unexpected("function name")),
            _ => None,
        };

        if self.at_punct("<") {
            self.skip_type_args()?;
        }

        let params = self.parse_fn_params()?;

        if self.eat_punct(":") {
            self.skip_type()?;
        }

        let body = self.parse_braced_block()?;

        Ok(FnLiteral {
            name,
            params,
            body: Rc::new(body),
            expr_body: None,
            is_arrow: false,
            is_async,
        })
    }

    fn parse_fn_params(&mut self) -> Result<Vec<Param>, CompileError> {
        self.expect_punct("(")?;

        let mut params = Vec::new();

        while !self.eat_punct(")") {
            if self.at_punct("...") {
                return Err(self.unsupported("rest parameter"));
            }

            if matches!(self.peek(), Tok::Punct("{") | Tok::Punct("[")) {
                return Err(self.unsupported("destructuring parameter"));
            }

            let name = self.expect_ident()?;

            self.eat_punct("?");

            if self.eat_punct(":") {
                self.skip_type()?;
            }

            let default = match self.eat_punct("=") {
                true => Some(self.parse_assignment()?),
                false => None,
            };

            params.push(Param { name, default });

            if !self.at_punct(")") {
                self.expect_punct(",")?;
            }
        }

        Ok(params)
    }

    fn parse_class_literal(&mut self, _statement: bool) -> Result<ClassLiteral, CompileError> {
        let name = match self.peek() {
            Tok::Ident(id) if id != "extends" => {
                let name = id.clone();

                self.bump();
                Some(name)
            }
            _ => None,
        };

        if self.at_punct("<") {
            self.skip_type_args()?;
        }

        if self.eat_ident("extends") {
            return Err(self.unsupported("class inheritance"));
        }

        if self.eat_ident("implements") {
            self.skip_type()?;
        }

        self.expect_punct("{")?;

        let mut constructor = None;
        let mut methods = Vec::new();

        while !self.eat_punct("}") {
            if self.eat_punct(";") {
                continue;
            }

            if self.at_ident("static") {
                return Err(self.unsupported("static class member"));
            }

            let is_async = self.at_ident("async") && matches!(self.peek_at(1), Tok::Ident(_));

            if is_async {
                self.bump();
            }

            let name = self.expect_ident()?;

            if !self.at_punct("(") {
                return Err(self.unsupported("class field"));
            }

            let params = self.parse_fn_params()?;

            if self.eat_punct(":") {
                self.skip_type()?;
            }

            let body = self.parse_braced_block()?;
            let method = FnLiteral {
                name: Some(name.clone()),
                params,
                body: Rc::new(body),
                expr_body: None,
                is_arrow: false,
                is_async,
            };

            match name.as_str() {
                "constructor" => constructor = Some(method),
                _ => methods.push((name, method)),
            }
        }

        Ok(ClassLiteral {
            name,
            constructor,
            methods,
        })
    }

    // TypeScript annotation skipping

    fn skip_type(&mut self) -> Result<(), CompileError> {
        self.skip_type_component()?;

        loop {
            if self.eat_punct("|") || self.eat_punct("&") {
                self.skip_type_component()?;
                continue;
            }

            if self.at_punct("[") {
                self.skip_balanced("[", "]")?;
                continue;
            }

            if self.at_ident("extends") {
                self.bump();
                self.skip_type_component()?;
                continue;
            }

            return Ok(());
        }
    }

    fn skip_type_component(&mut self) -> Result<(), CompileError> {
        match self.peek().clone() {
            Tok::Ident(id) if id == "typeof" || id == "keyof" || id == "readonly" => {
                self.bump();
                self.skip_type_component()
            }
            Tok::Ident(_) => {
                self.bump();

                while self.eat_punct(".") {
                    self.expect_ident()?;
                }

                if self.at_punct("<") {
                    self.skip_type_args()?;
                }

                Ok(())
            }
            Tok::Str(_) | Tok::Num(_) => {
                self.bump();
                Ok(())
            }
            Tok::Punct("{") => self.skip_balanced("{", "}"),
            Tok::Punct("[") => self.skip_balanced("[", "]"),
            Tok::Punct("(") => {
                self.skip_balanced("(", ")")?;

                if self.eat_punct("=>") {
                    self.skip_type_component()?;
                }

                Ok(())
            }
            _ => Err(self.unexpected("type")),
        }
    }

    fn skip_type_args(&mut self) -> Result<(), CompileError> {
        self.expect_punct("<")?;

        let mut depth = 1i32;

        while depth > 0 {
            match self.peek() {
                Tok::Eof => return Err(self.unexpected(">")),
                Tok::Punct("<") => depth += 1,
                Tok::Punct(">") => depth -= 1,
                Tok::Punct(">>") => depth -= 2,
                Tok::Punct(">>>") => depth -= 3,
                _ => {}
            }

            self.bump();
        }

        Ok(())
    }

    fn skip_balanced(&mut self, open: &'static str, close: &'static str) -> Result<(), CompileError> {
        self.expect_punct(open)?;

        let mut depth = 1u32;

        while depth > 0 {
            match self.peek() {
                Tok::Eof => return Err(self.unexpected(close)),
                Tok::Punct(p) if *p == open => depth += 1,
                Tok::Punct(p) if *p == close => depth -= 1,
                _ => {}
            }

            self.bump();
        }

        Ok(())
    }
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Ident(id) => format!("'{id}'"),
        Tok::Num(n) => format!("number {n}"),
        Tok::Str(_) => "string literal".into(),
        Tok::Template(_) => "template literal".into(),
        Tok::Punct(p) => format!("'{p}'"),
        Tok::Eof => "end of input".into(),
    }
}
