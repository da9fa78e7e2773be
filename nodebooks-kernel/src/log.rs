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
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{create_dir_all, File, OpenOptions},
    io::Write,
    path::Path,
};

use time::{format_description::FormatItem, macros::format_description, OffsetDateTime, UtcOffset};

use crate::{constants::VERBOSE, err, impl_error, Error, ErrorKind, ErrorTrait, Result};

const DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour][offset_minute]");
const UTC_OFFSET: &[FormatItem<'static>] = format_description!("[offset_hour]");

impl_error!(LoggerError);

#[derive(Debug)]
pub enum LoggerError {
    Uninitialized,
}

impl Display for LoggerError {
    fn fmt(&self, fmter: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Uninitialized => write!(fmter, "Logger is uninitialized"),
        }
    }
}

#[derive(PartialEq)]
pub enum Level {
    Info,
    Warn,
    Error,
    Debug,
}

impl Level {
    fn verbosity(&self) -> i8 {
        match self {
            Self::Info => 0,
            Self::Warn => 1,
            Self::Error => 2,
            Self::Debug => 4,
        }
    }
}

impl Display for Level {
    fn fmt(&self, fmter: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Info => write!(fmter, "INFO"),
            Self::Warn => write!(fmter, "WARN"),
            Self::Error => write!(fmter, "ERROR"),
            Self::Debug => write!(fmter, "DEBUG"),
        }
    }
}

pub struct Logger {
    verbosity: i8,
    file: Option<File>,
    location: String,
    module: &'static str,
    offset: UtcOffset,
}

impl Logger {
    pub fn new(module_name: &'static str, location: &str) -> Self {
        let offset = OffsetDateTime::now_local()
            .unwrap_or(OffsetDateTime::now_utc())
            .format(UTC_OFFSET)
            .ok()
            .and_then(|ofs| UtcOffset::parse(ofs.as_str(), UTC_OFFSET).ok())
            .unwrap_or(UtcOffset::UTC);

        Self {
            verbosity: if *VERBOSE { 4 } else { 3 },
            file: None,
            location: location.to_owned(),
            module: module_name,
            offset,
        }
    }

    pub fn init(mut self) -> Result<Self> {
        let path = Path::new(&self.location);

        if let Some(parent) = path.parent() {
            if let Err(error) = create_dir_all(parent) {
                err!(ErrorKind::IOError(parent.to_string_lossy().to_string(), error.kind()))?
            }
        }

        let file = OpenOptions::new().create(true).append(true).truncate(false).open(path);

        self.file = Some(match file {
            Ok(file) => file,
            Err(error) => err!(ErrorKind::IOError(self.location.clone(), error.kind()))?,
        });
        Ok(self)
    }

    pub fn set_verbosity(&mut self, verbosity: i8) {
        self.verbosity = verbosity
    }

    pub fn log(&mut self, level: Level, msg: &str) -> Result<()> {
        if level.verbosity() > self.verbosity {
            return Ok(());
        }

        if let Ok(local) = OffsetDateTime::now_local() {
            if let Ok(ofs) = local.format(UTC_OFFSET) {
                if let Ok(parsed) = UtcOffset::parse(ofs.as_str(), UTC_OFFSET) {
                    self.offset = parsed;
                }
            }
        }

        let time: OffsetDateTime = OffsetDateTime::now_utc().to_offset(self.offset);
        let stamp = time.format(DATE_FORMAT).unwrap_or_default();
        let write = if let Some(file) = self.file.as_mut() {
            file.write(format!("[{}] [{}] [{}] {}\n", stamp, self.module, level, msg).as_bytes())
        } else {
            err!(LoggerError::Uninitialized)?
        };

        if let Level::Debug = level {
            eprintln!("[{}] [{}] {}", stamp, self.module, msg);
        }

        match write {
            Ok(_) => Ok(()),
            Err(error) => err!(ErrorKind::IOError(self.location.clone(), error.kind())),
        }
    }
}
