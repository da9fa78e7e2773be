use std::{
    env::var,
    io::{stderr, stdout, IsTerminal},
};

use crate::constants::IS_COLOR_TERMINAL;

pub fn is_color_terminal() -> bool {
    let term = var("TERM").unwrap_or_default();

    !term.is_empty() && term.to_lowercase() != "dumb" && stdout().is_terminal() && stderr().is_terminal()
}

pub fn arrow_red() -> &'static str {
    match *IS_COLOR_TERMINAL {
        true => "\x1b[1;31m->\x1b[0m",
        false => "->",
    }
}

pub fn arrow_cyan() -> &'static str {
    match *IS_COLOR_TERMINAL {
        true => "\x1b[1;36m->\x1b[0m",
        false => "->",
    }
}

pub fn bold_white() -> &'static str {
    match *IS_COLOR_TERMINAL {
        true => "\x1b[1;37m",
        false => "",
    }
}

pub fn bold_red() -> &'static str {
    match *IS_COLOR_TERMINAL {
        true => "\x1b[1;31m",
        false => "",
    }
}

pub fn bold_yellow() -> &'static str {
    match *IS_COLOR_TERMINAL {
        true => "\x1b[1;33m",
        false => "",
    }
}

pub fn bold_green() -> &'static str {
    match *IS_COLOR_TERMINAL {
        true => "\x1b[1;32m",
        false => "",
    }
}

pub fn bold() -> &'static str {
    match *IS_COLOR_TERMINAL {
        true => "\x1b[1m",
        false => "",
    }
}

pub fn reset() -> &'static str {
    match *IS_COLOR_TERMINAL {
        true => "\x1b[0m",
        false => "",
    }
}

pub fn dim() -> &'static str {
    match *IS_COLOR_TERMINAL {
        true => "\x1b[2m",
        false => "",
    }
}
