//! Error type shared across the runtime
//!
//! Both kinds are fatal to a run: the first error raised anywhere (load,
//! step, evaluation) terminates execution and becomes the run's rejection
//! value. There is no statement-level recovery.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which stage of the pipeline produced the error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed line text or a duplicate line number, detected at load
    Parse,
    /// Anything that goes wrong while the program is running
    Runtime,
}

/// Terminal error of a run
///
/// Carries the offending line number once the engine knows it; errors raised
/// inside component operations start without one and get decorated at the
/// statement boundary.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{}{message}", fmt_line(.line))]
pub struct Error {
    pub kind: ErrorKind,
    pub line: Option<u32>,
    pub message: String,
}

fn fmt_line(line: &Option<u32>) -> String {
    match line {
        Some(n) => format!("line {n}: "),
        None => String::new(),
    }
}

impl Error {
    pub fn parse(message: impl Into<String>) -> Self {
        Error {
            kind: ErrorKind::Parse,
            line: None,
            message: message.into(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Error {
            kind: ErrorKind::Runtime,
            line: None,
            message: message.into(),
        }
    }

    /// Attach a line number, keeping one already present (the innermost
    /// location wins).
    pub fn at_line(mut self, line: u32) -> Self {
        self.line.get_or_insert(line);
        self
    }
}

pub type Result<T> = std::result::Result<T, Error>;
