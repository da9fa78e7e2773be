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

use std::{
    env,
    fmt::{Display, Formatter},
};

use crate::{err, error::*, impl_error};

#[derive(PartialEq, Eq, Copy, Clone, Debug, Default)]
pub enum Operand<'a> {
    Short(char),
    ShortPos(char, &'a str),
    Long(&'a str),
    LongPos(&'a str, &'a str),
    Value(&'a str),
    #[default]
    Nothing,
}

#[derive(Debug)]
pub struct Arguments<'a> {
    operands: Vec<Operand<'a>>,
    cur: usize,
}

#[derive(Debug, Clone)]
pub enum InvalidArgument {
    InvalidOperand(String),
    UnsuppliedOperand(&'static str, &'static str),
    OperationUnspecified,
}

impl_error!(InvalidArgument);

impl Display for InvalidArgument {
    fn fmt(&self, fmter: &mut Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        match self {
            Self::UnsuppliedOperand(params, message) => write!(fmter, "Option '{params}': {message}"),
            Self::InvalidOperand(oper) => write!(fmter, "Invalid option '{oper}'"),
            Self::OperationUnspecified => write!(fmter, "Operation not specified."),
        }?;

        write!(fmter, "\nTry 'nodebooks help' for more information on valid operational parameters.")
    }
}

impl Default for Arguments<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Arguments<'a> {
    pub fn new() -> Self {
        Self {
            operands: Vec::new(),
            cur: 0,
        }
    }

    pub fn populate(mut self) -> Arguments<'a> {
        for string in env::args().skip(1).map(|a| a.leak() as &'a str) {
            match string {
                string if string.starts_with("--") =>
                    if string.contains('=') {
                        let value: Vec<&'a str> = string[2 ..].splitn(2, '=').collect();

                        self.operands.push(Operand::Long(value[0]));
                        self.operands.push(Operand::LongPos(value[0], value[1]));
                    } else {
                        self.operands.push(Operand::Long(&string[2 ..]));
                    },
                string if string.starts_with('-') && string.len() > 1 =>
                    for operand in string[1 ..].chars() {
                        self.operands.push(Operand::Short(operand));
                    },
                _ => self.operands.push(match self.operands.last() {
                    Some(Operand::Short(c)) => Operand::ShortPos(*c, string),
                    Some(Operand::Long(s)) => Operand::LongPos(s, string),
                    _ => Operand::Value(string),
                }),
            }
        }

        self
    }

    pub fn invalid_operand(&self) -> Result<()> {
        match self.operands.get(self.cur.saturating_sub(1)) {
            Some(oper) => err!(InvalidArgument::InvalidOperand(oper.to_string())),
            None => err!(InvalidArgument::OperationUnspecified),
        }
    }
}

impl<'a> Iterator for Arguments<'a> {
    type Item = Operand<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let operand = self.operands.get(self.cur).copied();

        self.cur += 1;
        operand
    }
}

impl Display for Operand<'_> {
    fn fmt(&self, fmter: &mut Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        match self {
            Self::Short(c) => write!(fmter, "-{c}"),
            Self::ShortPos(c, value) => write!(fmter, "-{c} {value}"),
            Self::Long(s) => write!(fmter, "--{s}"),
            Self::LongPos(s, value) => write!(fmter, "--{s} {value}"),
            Self::Value(value) => write!(fmter, "{value}"),
            Self::Nothing => write!(fmter, "None"),
        }
    }
}
