//! # Runtime execution engine
//!
//! Drives a line-numbered BASIC-style program: sequential execution,
//! GOTO/GOSUB/RETURN, counted FOR loops, embedded expression evaluation, and
//! variable/array storage, with re-entrant stepping for paced execution.
//!
//! The line parser, the expression evaluator, the built-in function set, and
//! the I/O sinks are collaborators behind trait seams; the engine calls them
//! but implements none of them.

pub mod control;
pub mod engine;
pub mod env;
pub mod eval;
pub mod io;
pub mod program;
pub mod stmt;


// Re-export commonly used items
pub use engine::{Engine, EngineBuilder, HaltHandle, Outcome, State, Step};
pub use env::{default_constants, Environment, Value};
pub use eval::{Evaluator, FunctionRegistry, Scope};
pub use io::{Console, Display};
pub use program::{LineParser, Program};
pub use stmt::{Statement, StmtKind};
