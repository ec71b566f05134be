//! Statement model
//!
//! Statements form a closed enumeration so the engine's dispatch is
//! exhaustive: a new kind does not compile until every match arm handles it.
//! Embedded expressions are carried as source text and handed to the external
//! evaluator at execution time.

use serde::{Deserialize, Serialize};

/// One parsed executable unit bound to a line number
///
/// Produced by the external line parser; `lineno` is fixed at parse time and
/// unique within a loaded program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub lineno: u32,
    pub kind: StmtKind,
}

/// Statement kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum StmtKind {
    /// Comment, executes as a no-op
    Rem,
    /// Assign the value of `expr` to a scalar variable
    Let { name: String, expr: String },
    /// Assign into one array slot
    LetIndexed {
        name: String,
        index: String,
        expr: String,
    },
    /// Declare (or reset) `name` as an array
    Dim { name: String },
    /// Evaluate and write to the console; `None` prints a blank line
    Print { expr: Option<String> },
    /// Jump to `target` when the condition is truthy
    If { cond: String, target: u32 },
    Goto { target: u32 },
    /// Subroutine call: push a return address, then jump
    Gosub { target: u32 },
    /// Return to the line after the matching Gosub
    Return,
    /// Counted loop start; `step` defaults to 1
    For {
        var: String,
        from: String,
        to: String,
        step: Option<String>,
    },
    /// Loop jump for the named loop variable
    Next { var: String },
    /// Suspend execution for `millis` milliseconds
    Pause { millis: String },
    /// Read one console line into a variable
    Input { name: String },
    /// Clear the console
    Cls,
    /// Clear the graphics display
    Clg,
    /// Set one pixel
    Plot {
        x: String,
        y: String,
        color: String,
    },
    /// End the run successfully without consuming further lines
    End,
}
