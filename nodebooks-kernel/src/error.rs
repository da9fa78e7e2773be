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

//! Kernel error type. Modules declare their own error enums and plug them
//! in through `impl_error!`; the kernel folds an `Error` into an error
//! output and execution record via `message`/`downcast`, and the
//! front-end terminates through `exit`.

use std::{
    any::Any,
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    process::exit,
    result::Result as StdResult,
};

use crate::constants::{BOLD_RED, RESET};

pub type Result<T> = StdResult<T, Error>;

#[macro_export]
macro_rules! err {
    ( $x:expr ) => {
        Err(Error::new(Box::new($x)))
    };
}

#[macro_export]
macro_rules! impl_error {
    ( $x:ident ) => {
        impl ErrorTrait for $x {
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
        }
    };
}

pub trait ErrorTrait: Debug + Display {
    fn as_any(&self) -> &dyn Any;

    /// Process exit code when the error terminates a front-end.
    fn code(&self) -> i32 {
        1
    }
}

#[derive(Debug)]
pub struct Error {
    inner: Box<dyn ErrorTrait>,
}

impl Error {
    pub fn new(inner: Box<dyn ErrorTrait>) -> Self {
        Self { inner }
    }

    /// Error text as it lands in error outputs and execution records.
    pub fn message(&self) -> String {
        self.inner.to_string()
    }

    pub fn downcast<T: 'static>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref::<T>()
    }

    /// Reports the error on stderr and terminates with its code.
    pub fn exit(&self) -> ! {
        eprintln!("{}error:{} {}", *BOLD_RED, *RESET, self.inner);
        exit(self.inner.code())
    }
}

impl Display for Error {
    fn fmt(&self, fmter: &mut Formatter<'_>) -> FmtResult {
        write!(fmter, "{}", self.inner)
    }
}

/// Attaches kernel context to foreign error types.
pub trait ErrorGeneric<R> {
    fn prepend<F>(self, f: F) -> Result<R>
    where
        F: FnOnce() -> String;
    fn prepend_io<F>(self, f: F) -> Result<R>
    where
        F: FnOnce() -> String;
    fn generic(self) -> Result<R>;
}

#[derive(Debug)]
struct ContextError {
    context: String,
    error: String,
}

impl Display for ContextError {
    fn fmt(&self, fmter: &mut Formatter<'_>) -> FmtResult {
        write!(fmter, "{}: {}", self.context, self.error)
    }
}

impl_error!(ContextError);

impl<R, E> ErrorGeneric<R> for StdResult<R, E>
where
    E: Display,
{
    fn prepend<F>(self, f: F) -> Result<R>
    where
        F: FnOnce() -> String, {
        match self {
            Ok(value) => Ok(value),
            Err(error) => err!(ContextError {
                context: f(),
                error: error.to_string(),
            }),
        }
    }

    fn prepend_io<F>(self, f: F) -> Result<R>
    where
        F: FnOnce() -> String, {
        self.prepend(|| format!("'{}'", f()))
    }

    fn generic(self) -> Result<R> {
        self.prepend(|| "An error has occurred".into())
    }
}

#[cfg(test)]
mod test {
    use crate::error::*;

    #[derive(Debug)]
    enum ProbeError {
        Broken(&'static str),
    }

    impl std::fmt::Display for ProbeError {
        fn fmt(&self, fmter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::Broken(what) => write!(fmter, "{what} is broken"),
            }
        }
    }

    impl_error!(ProbeError);

    fn probe() -> Result<()> {
        err!(ProbeError::Broken("probe"))
    }

    #[test]
    fn message_carries_the_display_text() {
        assert_eq!(probe().unwrap_err().message(), "probe is broken");
    }

    #[test]
    fn downcast_recovers_the_module_error() {
        let error = probe().unwrap_err();

        assert!(matches!(error.downcast::<ProbeError>(), Some(ProbeError::Broken("probe"))));
        assert!(error.downcast::<std::io::Error>().is_none());
    }

    #[test]
    fn context_adapter_prepends() {
        let failed: std::result::Result<(), &str> = Err("denied");
        let error = failed.prepend(|| "Opening socket".into()).unwrap_err();

        assert_eq!(error.message(), "Opening socket: denied");

        let failed: std::result::Result<(), &str> = Err("denied");

        assert_eq!(failed.prepend_io(|| "/tmp/x".into()).unwrap_err().message(), "'/tmp/x': denied");
    }
}
