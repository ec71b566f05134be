//! Execution engine
//!
//! The run loop that fetches the statement at the cursor, executes it,
//! computes the next line, and handles jumps, pauses, and termination.
//!
//! ## Core principles
//!
//! 1. **Explicit resumable state**: everything needed to continue a run lives
//!    in the engine (cursor, jumped flag, pending delay, loop registry, call
//!    stack) — no recursion, no callback scheduling.
//! 2. **Statement-level execution**: `step()` runs exactly one statement;
//!    errors are caught at that granularity and end the run.
//! 3. **Centralized control flow**: every jump (goto, loop jump, call,
//!    return) funnels through `goto()`, which sets the cursor and the jumped
//!    flag.
//! 4. **Pure stepper**: `step()` and `resume()` are synchronous; only the
//!    top-level `run()` driver awaits out pauses.

use crate::error::{Error, Result};
use crate::runtime::control::{CallStack, LoopDescriptor, LoopRegistry};
use crate::runtime::env::{default_constants, Environment, Value};
use crate::runtime::eval::{Evaluator, FunctionRegistry, Scope};
use crate::runtime::io::{Console, Display};
use crate::runtime::program::{LineParser, Program};
use crate::runtime::stmt::{Statement, StmtKind};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/* ===================== Step results ===================== */

/// Result of executing one statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Continue to the next statement immediately
    Continue,
    /// A pause was requested; resume after the delay elapses
    Paused(Duration),
    /// Execution complete
    Done,
}

/// Result of driving the step loop until it suspends (public API)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The run is suspended; call `resume()` again after the delay
    Paused(Duration),
    /// The run completed successfully
    Done,
}

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Running,
    Paused,
    Ended,
}

/// Cloneable external halt request, honored at statement boundaries
#[derive(Debug, Clone, Default)]
pub struct HaltHandle(Arc<AtomicBool>);

impl HaltHandle {
    pub fn halt(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/* ===================== Engine ===================== */

/// The runtime execution engine
///
/// Owns all mutable run state (variables, loops, call stack, cursor) and the
/// collaborator handles. Single-threaded by construction: statements execute
/// one at a time against an exclusive borrow of the engine.
pub struct Engine {
    parser: Box<dyn LineParser>,
    evaluator: Box<dyn Evaluator>,
    console: Box<dyn Console>,
    display: Option<Box<dyn Display>>,
    functions: FunctionRegistry,
    debug_level: u8,

    program: Program,
    env: Environment,
    loops: LoopRegistry,
    calls: CallStack,

    state: State,
    cursor: u32,
    jumped: bool,
    pending_delay: Option<Duration>,
    halted: bool,
    halt_flag: HaltHandle,
}

impl Engine {
    pub fn builder(
        parser: Box<dyn LineParser>,
        evaluator: Box<dyn Evaluator>,
        console: Box<dyn Console>,
    ) -> EngineBuilder {
        EngineBuilder {
            parser,
            evaluator,
            console,
            display: None,
            functions: FunctionRegistry::new(),
            constants: default_constants(),
            debug_level: 0,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Handle for requesting a halt from outside the step loop
    pub fn halt_handle(&self) -> HaltHandle {
        self.halt_flag.clone()
    }

    /* ===================== Run protocol ===================== */

    /// Load a program and prime the cursor
    ///
    /// A load failure ends the run immediately; an empty program ends it
    /// successfully without executing anything.
    pub fn load(&mut self, source: &str) -> Result<()> {
        self.env.reset();
        self.loops = LoopRegistry::default();
        self.calls = CallStack::default();
        self.jumped = false;
        self.pending_delay = None;
        self.halted = false;

        self.program = match Program::load(source, self.parser.as_ref()) {
            Ok(program) => program,
            Err(e) => return Err(self.fail(e)),
        };

        match self.program.first_line() {
            Some(first) => {
                self.cursor = first;
                self.state = State::Running;
            }
            None => self.state = State::Ended,
        }
        Ok(())
    }

    /// Execute one statement
    ///
    /// One iteration of the run loop: fetch the statement at the cursor,
    /// execute it, advance unless it jumped, then honor halt and pause
    /// requests. Any error ends the run.
    pub fn step(&mut self) -> Result<Step> {
        match self.state {
            State::Ended => return Ok(Step::Done),
            State::Idle => return Err(Error::runtime("no program loaded")),
            State::Running | State::Paused => self.state = State::Running,
        }

        let lineno = self.cursor;
        let stmt = match self.program.find(lineno) {
            Some(stmt) => stmt.clone(),
            None => return Err(self.fail(Error::runtime(format!("cannot find line {lineno}")))),
        };

        self.jumped = false;
        if self.debug_level >= 1 {
            tracing::debug!(line = lineno, "executing statement");
        }

        if let Err(e) = self.exec_statement(&stmt) {
            return Err(self.fail(e.at_line(lineno)));
        }

        // Halt requests (END statement or external handle) are honored only
        // at statement boundaries, never mid-statement.
        if self.halted || self.halt_flag.is_set() {
            self.state = State::Ended;
            return Ok(Step::Done);
        }

        if !self.jumped {
            match self.program.line_after(lineno) {
                Some(next) => self.cursor = next,
                None => {
                    self.state = State::Ended;
                    return Ok(Step::Done);
                }
            }
        }

        if let Some(delay) = self.pending_delay.take() {
            self.state = State::Paused;
            return Ok(Step::Paused(delay));
        }

        Ok(Step::Continue)
    }

    /// Drive the step loop until it pauses or completes
    ///
    /// Re-entrant: calling this on a paused engine resumes from the saved
    /// cursor. Absent a pause, the entire remaining program executes within
    /// this one call.
    pub fn resume(&mut self) -> Result<Outcome> {
        loop {
            match self.step()? {
                Step::Continue => continue,
                Step::Paused(delay) => return Ok(Outcome::Paused(delay)),
                Step::Done => return Ok(Outcome::Done),
            }
        }
    }

    /// Load and run a program to completion
    ///
    /// Pauses are awaited out with the tokio timer; everything else runs
    /// synchronously. Resolves to success (no value) or the terminal error.
    pub async fn run(&mut self, source: &str) -> Result<()> {
        self.load(source)?;
        loop {
            match self.resume()? {
                Outcome::Paused(delay) => tokio::time::sleep(delay).await,
                Outcome::Done => return Ok(()),
            }
        }
    }

    /// Transition to the failed end state, passing the error through
    fn fail(&mut self, e: Error) -> Error {
        self.state = State::Ended;
        e
    }

    /* ===================== Statement dispatch ===================== */

    /// Exhaustive dispatch over statement kinds
    fn exec_statement(&mut self, stmt: &Statement) -> Result<()> {
        match &stmt.kind {
            StmtKind::Rem => Ok(()),

            StmtKind::Let { name, expr } => {
                let value = self.evaluate(expr)?;
                self.env.set(name, value);
                Ok(())
            }

            StmtKind::LetIndexed { name, index, expr } => {
                let index = self.evaluate(index)?;
                let value = self.evaluate(expr)?;
                self.env.set_indexed(name, &index, value)
            }

            StmtKind::Dim { name } => {
                self.env.declare_array(name);
                Ok(())
            }

            StmtKind::Print { expr } => {
                match expr {
                    Some(expr) => {
                        let value = self.evaluate(expr)?;
                        self.print(&value);
                    }
                    None => self.console.write("\n"),
                }
                Ok(())
            }

            StmtKind::If { cond, target } => {
                if self.evaluate(cond)?.is_truthy() {
                    self.goto(*target);
                }
                Ok(())
            }

            StmtKind::Goto { target } => {
                self.goto(*target);
                Ok(())
            }

            StmtKind::Gosub { target } => {
                self.call(*target);
                Ok(())
            }

            StmtKind::Return => self.return_from_call(),

            StmtKind::For {
                var,
                from,
                to,
                step,
            } => {
                let from = self.evaluate(from)?.as_num()?;
                let to = self.evaluate(to)?.as_num()?;
                let step = match step {
                    Some(step) => self.evaluate(step)?.as_num()?,
                    None => 1.0,
                };
                self.loop_start(var, from, step, to)
            }

            StmtKind::Next { var } => self.loop_jump(var),

            StmtKind::Pause { millis } => {
                let millis = self.evaluate(millis)?.as_num()?.max(0.0);
                self.sleep(Duration::from_millis(millis as u64));
                Ok(())
            }

            StmtKind::Input { name } => self.request_input(name),

            StmtKind::Cls => {
                self.clear_console();
                Ok(())
            }

            StmtKind::Clg => self.clear_graphics(),

            StmtKind::Plot { x, y, color } => {
                let x = self.evaluate(x)?.as_num()? as i64;
                let y = self.evaluate(y)?.as_num()? as i64;
                let color = self.evaluate(color)?.to_string();
                self.plot(x, y, &color)
            }

            StmtKind::End => {
                self.halt();
                Ok(())
            }
        }
    }

    /* ===================== Control flow ===================== */

    /// The universal jump primitive
    ///
    /// Sets the cursor and the jumped flag; automatic advance is suppressed
    /// for the rest of this step. The last jump within a statement wins.
    pub fn goto(&mut self, lineno: u32) {
        self.cursor = lineno;
        self.jumped = true;
    }

    /// Start (or restart) a counted loop for `var`
    ///
    /// The resume point is the line following the current one; a loop
    /// declared on the final line never iterates and ends the run normally.
    pub fn loop_start(&mut self, var: &str, initial: f64, increment: f64, max: f64) -> Result<()> {
        if increment <= 0.0 {
            return Err(Error::runtime("loop increment must be positive"));
        }
        self.env.set(var, Value::Num(initial));
        match self.program.line_after(self.cursor) {
            Some(resume) => self.loops.insert(
                var,
                LoopDescriptor {
                    current: initial,
                    increment,
                    max,
                    resume_lineno: resume,
                },
            ),
            None => self.halt(),
        }
        Ok(())
    }

    /// Advance the named loop and jump back while it has iterations left
    ///
    /// The loop falls through once the advanced value reaches `max`
    /// (`current >= max` after the increment).
    pub fn loop_jump(&mut self, var: &str) -> Result<()> {
        let descriptor = self.loops.get_mut(var)?;
        descriptor.current += descriptor.increment;
        let (current, max, resume) = (
            descriptor.current,
            descriptor.max,
            descriptor.resume_lineno,
        );
        self.env.set(var, Value::Num(current));
        if current < max {
            self.goto(resume);
        }
        Ok(())
    }

    /// Subroutine call: push the return address, then jump
    pub fn call(&mut self, target: u32) {
        let return_to = self
            .program
            .line_after(self.cursor)
            .unwrap_or(self.cursor + 1);
        self.calls.push(return_to);
        self.goto(target);
    }

    /// Pop the call stack and jump to the saved return address
    pub fn return_from_call(&mut self) -> Result<()> {
        let return_to = self.calls.pop()?;
        self.goto(return_to);
        Ok(())
    }

    /// Request a pause before the next step
    pub fn sleep(&mut self, delay: Duration) {
        self.pending_delay = Some(delay);
    }

    /// Request a successful halt at the end of the current statement
    pub fn halt(&mut self) {
        self.halted = true;
    }

    /* ===================== Variables ===================== */

    pub fn get_var(&self, name: &str) -> Value {
        self.env.get(name)
    }

    pub fn set_var(&mut self, name: &str, value: Value) {
        self.env.set(name, value);
    }

    pub fn declare_array(&mut self, name: &str) {
        self.env.declare_array(name);
    }

    pub fn set_indexed(&mut self, name: &str, index: &Value, value: Value) -> Result<()> {
        self.env.set_indexed(name, index, value)
    }

    pub fn get_indexed(&self, name: &str, index: &Value) -> Result<Value> {
        self.env.get_indexed(name, index)
    }

    pub fn constant(&self, name: &str) -> Result<Value> {
        self.env.constant(name)
    }

    /* ===================== Evaluation bridge ===================== */

    /// Evaluate expression text against the current environment
    ///
    /// Evaluator errors propagate verbatim; the offending expression text is
    /// logged first for diagnosability.
    pub fn evaluate(&mut self, expr: &str) -> Result<Value> {
        if self.debug_level >= 2 {
            tracing::debug!(expr, "evaluating expression");
        }
        let mut scope = Scope::new(&self.env, &self.functions);
        match self.evaluator.evaluate(expr, &mut scope) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::debug!(expr, error = %e, "expression evaluation failed");
                Err(e)
            }
        }
    }

    /* ===================== I/O facade ===================== */

    /// Write one value and a newline to the console
    pub fn print(&mut self, value: &Value) {
        self.console.write(&format!("{value}\n"));
    }

    pub fn clear_console(&mut self) {
        self.console.clear();
    }

    pub fn request_input(&mut self, name: &str) -> Result<()> {
        let line = self.console.input()?;
        let value = match line.trim().parse::<f64>() {
            Ok(n) => Value::Num(n),
            Err(_) => Value::Str(line),
        };
        self.env.set(name, value);
        Ok(())
    }

    fn display_mut(&mut self) -> Result<&mut Box<dyn Display>> {
        self.display
            .as_mut()
            .ok_or_else(|| Error::runtime("no display found"))
    }

    pub fn plot(&mut self, x: i64, y: i64, color: &str) -> Result<()> {
        self.display_mut()?.plot(x, y, color);
        Ok(())
    }

    pub fn color_at(&self, x: i64, y: i64) -> Result<String> {
        match &self.display {
            Some(display) => Ok(display.color_at(x, y)),
            None => Err(Error::runtime("no display found")),
        }
    }

    pub fn clear_graphics(&mut self) -> Result<()> {
        self.display_mut()?.clear();
        Ok(())
    }

    /// Most recently pressed key on the display, if any
    pub fn read_char(&mut self) -> Result<Option<char>> {
        Ok(self.display_mut()?.get_char())
    }
}

/* ===================== Builder ===================== */

/// Construction-time configuration, builder style
pub struct EngineBuilder {
    parser: Box<dyn LineParser>,
    evaluator: Box<dyn Evaluator>,
    console: Box<dyn Console>,
    display: Option<Box<dyn Display>>,
    functions: FunctionRegistry,
    constants: HashMap<String, Value>,
    debug_level: u8,
}

impl EngineBuilder {
    /// Attach an optional pixel display
    pub fn display(mut self, display: Box<dyn Display>) -> Self {
        self.display = Some(display);
        self
    }

    /// Install the built-in function registry
    pub fn functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    /// Replace the whole constants table
    pub fn constants(mut self, constants: HashMap<String, Value>) -> Self {
        self.constants = constants;
        self
    }

    /// Verbosity threshold for diagnostic tracing (0 = off)
    pub fn debug_level(mut self, level: u8) -> Self {
        self.debug_level = level;
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            parser: self.parser,
            evaluator: self.evaluator,
            console: self.console,
            display: self.display,
            functions: self.functions,
            debug_level: self.debug_level,
            program: Program::default(),
            env: Environment::new(self.constants),
            loops: LoopRegistry::default(),
            calls: CallStack::default(),
            state: State::Idle,
            cursor: 0,
            jumped: false,
            pending_delay: None,
            halted: false,
            halt_flag: HaltHandle::default(),
        }
    }
}
