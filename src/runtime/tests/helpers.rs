//! Test helpers
//!
//! The parser, evaluator, console, and display are external collaborators,
//! so the tests supply minimal implementations of the trait contracts: a
//! line parser for a small BASIC-shaped command set, a space-delimited
//! expression evaluator, a recording console, and an in-memory pixel grid.

use crate::error::{Error, Result};
use crate::runtime::engine::Engine;
use crate::runtime::env::Value;
use crate::runtime::eval::{Evaluator, FunctionRegistry, Scope};
use crate::runtime::io::{Console, Display};
use crate::runtime::program::LineParser;
use crate::runtime::stmt::{Statement, StmtKind};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

/* ===================== Line parser fixture ===================== */

pub struct ScriptParser;

fn parse_target(text: &str) -> Result<u32> {
    text.trim()
        .parse()
        .map_err(|_| Error::parse(format!("bad jump target: {text}")))
}

impl LineParser for ScriptParser {
    fn parse_line(&self, text: &str) -> Result<Statement> {
        let (lineno, rest) = text
            .split_once(' ')
            .ok_or_else(|| Error::parse(format!("missing statement: {text}")))?;
        let lineno: u32 = lineno
            .parse()
            .map_err(|_| Error::parse(format!("bad line number: {lineno}")))?;
        let rest = rest.trim();
        let (cmd, args) = rest.split_once(' ').unwrap_or((rest, ""));
        let args = args.trim();

        let kind = match cmd.to_uppercase().as_str() {
            "REM" => StmtKind::Rem,
            "PRINT" if args.is_empty() => StmtKind::Print { expr: None },
            "PRINT" => StmtKind::Print {
                expr: Some(args.to_string()),
            },
            "GOTO" => StmtKind::Goto {
                target: parse_target(args)?,
            },
            "GOSUB" => StmtKind::Gosub {
                target: parse_target(args)?,
            },
            "RETURN" => StmtKind::Return,
            "END" => StmtKind::End,
            "CLS" => StmtKind::Cls,
            "CLG" => StmtKind::Clg,
            "DIM" => StmtKind::Dim {
                name: args.to_string(),
            },
            "INPUT" => StmtKind::Input {
                name: args.to_string(),
            },
            "PAUSE" => StmtKind::Pause {
                millis: args.to_string(),
            },
            "NEXT" => StmtKind::Next {
                var: args.to_string(),
            },
            "LET" => {
                let (target, expr) = args
                    .split_once('=')
                    .ok_or_else(|| Error::parse(format!("LET needs '=': {args}")))?;
                let target = target.trim();
                let expr = expr.trim().to_string();
                match target.split_once('(') {
                    Some((name, index)) => StmtKind::LetIndexed {
                        name: name.trim().to_string(),
                        index: index.trim_end_matches(')').to_string(),
                        expr,
                    },
                    None => StmtKind::Let {
                        name: target.to_string(),
                        expr,
                    },
                }
            }
            "IF" => {
                let (cond, target) = args
                    .split_once(" THEN ")
                    .ok_or_else(|| Error::parse(format!("IF needs THEN: {args}")))?;
                StmtKind::If {
                    cond: cond.trim().to_string(),
                    target: parse_target(target)?,
                }
            }
            "FOR" => {
                let (var, bounds) = args
                    .split_once('=')
                    .ok_or_else(|| Error::parse(format!("FOR needs '=': {args}")))?;
                let (from, rest) = bounds
                    .split_once(" TO ")
                    .ok_or_else(|| Error::parse(format!("FOR needs TO: {args}")))?;
                let (to, step) = match rest.split_once(" STEP ") {
                    Some((to, step)) => (to, Some(step.trim().to_string())),
                    None => (rest, None),
                };
                StmtKind::For {
                    var: var.trim().to_string(),
                    from: from.trim().to_string(),
                    to: to.trim().to_string(),
                    step,
                }
            }
            "PLOT" => {
                let parts: Vec<&str> = args.split(',').collect();
                if parts.len() != 3 {
                    return Err(
                        Error::parse(format!("PLOT needs x,y,color: {args}")).at_line(lineno)
                    );
                }
                StmtKind::Plot {
                    x: parts[0].trim().to_string(),
                    y: parts[1].trim().to_string(),
                    color: parts[2].trim().to_string(),
                }
            }
            other => {
                return Err(Error::parse(format!("unknown statement {other}")).at_line(lineno))
            }
        };

        Ok(Statement { lineno, kind })
    }
}

/* ===================== Evaluator fixture ===================== */

/// Space-delimited infix evaluator: `A + 1`, `I < 3`, `ABS(X)`, `GRID(2)`
pub struct ScriptEvaluator;

impl ScriptEvaluator {
    fn term(&self, expr: &str, scope: &mut Scope<'_>) -> Result<Value> {
        if let Some(inner) = expr.strip_prefix('"') {
            return Ok(Value::Str(inner.trim_end_matches('"').to_string()));
        }
        if let Ok(n) = expr.parse::<f64>() {
            return Ok(Value::Num(n));
        }
        if let Some((name, rest)) = expr.split_once('(') {
            let inner = rest.trim_end_matches(')');
            if let Value::Array(_) = scope.get(name) {
                let index = self.evaluate(inner, scope)?;
                return scope.get_indexed(name, &index);
            }
            let mut args = Vec::new();
            for arg in inner.split(',') {
                args.push(self.evaluate(arg, scope)?);
            }
            return scope.call_function(name, &args);
        }
        match scope.constant(expr) {
            Ok(value) => Ok(value),
            Err(_) => Ok(scope.get(expr)),
        }
    }
}

/// Leftmost occurrence of ` op ` outside parentheses
fn find_top_level_op(expr: &str, op: &str) -> Option<usize> {
    let pattern = format!(" {op} ");
    let mut depth = 0u32;
    for (i, ch) in expr.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if depth == 0 && expr[i..].starts_with(&pattern) {
            return Some(i);
        }
    }
    None
}

impl Evaluator for ScriptEvaluator {
    fn evaluate(&self, expr: &str, scope: &mut Scope<'_>) -> Result<Value> {
        let expr = expr.trim();
        for op in ["<=", ">=", "==", "<>", "<", ">", "+", "-", "*", "/"] {
            if let Some(pos) = find_top_level_op(expr, op) {
                let lhs = self.evaluate(&expr[..pos], scope)?;
                let rhs = self.evaluate(&expr[pos + op.len() + 2..], scope)?;
                return apply_op(op, lhs, rhs);
            }
        }
        self.term(expr, scope)
    }
}

fn apply_op(op: &str, lhs: Value, rhs: Value) -> Result<Value> {
    if op == "+" {
        if let (Value::Str(a), b) = (&lhs, &rhs) {
            return Ok(Value::Str(format!("{a}{b}")));
        }
    }
    if op == "==" {
        return Ok(Value::Num((lhs == rhs) as u8 as f64));
    }
    if op == "<>" {
        return Ok(Value::Num((lhs != rhs) as u8 as f64));
    }
    let a = lhs.as_num()?;
    let b = rhs.as_num()?;
    let result = match op {
        "+" => a + b,
        "-" => a - b,
        "*" => a * b,
        "/" => a / b,
        "<" => (a < b) as u8 as f64,
        ">" => (a > b) as u8 as f64,
        "<=" => (a <= b) as u8 as f64,
        ">=" => (a >= b) as u8 as f64,
        _ => return Err(Error::runtime(format!("unknown operator {op}"))),
    };
    Ok(Value::Num(result))
}

/* ===================== I/O fixtures ===================== */

#[derive(Default)]
pub struct ConsoleState {
    pub output: String,
    pub cleared: u32,
    pub input_queue: VecDeque<String>,
}

/// Recording console, cloneable so tests keep a handle after the engine
/// takes ownership
#[derive(Clone, Default)]
pub struct SharedConsole(pub Rc<RefCell<ConsoleState>>);

impl SharedConsole {
    pub fn output(&self) -> String {
        self.0.borrow().output.clone()
    }

    pub fn queue_input(&self, line: &str) {
        self.0.borrow_mut().input_queue.push_back(line.to_string());
    }
}

impl Console for SharedConsole {
    fn write(&mut self, text: &str) {
        self.0.borrow_mut().output.push_str(text);
    }

    fn clear(&mut self) {
        let mut state = self.0.borrow_mut();
        state.output.clear();
        state.cleared += 1;
    }

    fn input(&mut self) -> Result<String> {
        self.0
            .borrow_mut()
            .input_queue
            .pop_front()
            .ok_or_else(|| Error::runtime("no input available"))
    }
}

#[derive(Default)]
pub struct DisplayState {
    pub pixels: HashMap<(i64, i64), String>,
    pub cleared: u32,
    pub keys: VecDeque<char>,
}

/// In-memory pixel grid with a queued key buffer
#[derive(Clone, Default)]
pub struct SharedDisplay(pub Rc<RefCell<DisplayState>>);

impl SharedDisplay {
    pub fn pixel(&self, x: i64, y: i64) -> Option<String> {
        self.0.borrow().pixels.get(&(x, y)).cloned()
    }

    pub fn queue_key(&self, key: char) {
        self.0.borrow_mut().keys.push_back(key);
    }
}

impl Display for SharedDisplay {
    fn plot(&mut self, x: i64, y: i64, color: &str) {
        self.0.borrow_mut().pixels.insert((x, y), color.to_string());
    }

    fn color_at(&self, x: i64, y: i64) -> String {
        self.0
            .borrow()
            .pixels
            .get(&(x, y))
            .cloned()
            .unwrap_or_default()
    }

    fn clear(&mut self) {
        let mut state = self.0.borrow_mut();
        state.pixels.clear();
        state.cleared += 1;
    }

    fn get_char(&mut self) -> Option<char> {
        self.0.borrow_mut().keys.pop_front()
    }
}

/* ===================== Engine builders ===================== */

/// Install a subscriber so `RUST_LOG` surfaces engine traces in test runs
fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

pub fn build_engine() -> (Engine, SharedConsole) {
    init_tracing();
    let console = SharedConsole::default();
    let engine = Engine::builder(
        Box::new(ScriptParser),
        Box::new(ScriptEvaluator),
        Box::new(console.clone()),
    )
    .debug_level(2)
    .build();
    (engine, console)
}

pub fn build_engine_with_display() -> (Engine, SharedConsole, SharedDisplay) {
    let console = SharedConsole::default();
    let display = SharedDisplay::default();
    let engine = Engine::builder(
        Box::new(ScriptParser),
        Box::new(ScriptEvaluator),
        Box::new(console.clone()),
    )
    .display(Box::new(display.clone()))
    .build();
    (engine, console, display)
}

pub fn build_engine_with_functions(functions: FunctionRegistry) -> (Engine, SharedConsole) {
    let console = SharedConsole::default();
    let engine = Engine::builder(
        Box::new(ScriptParser),
        Box::new(ScriptEvaluator),
        Box::new(console.clone()),
    )
    .functions(functions)
    .build();
    (engine, console)
}

/// Load and run a pause-free program synchronously
pub fn run_source(source: &str) -> (Result<()>, SharedConsole) {
    let (mut engine, console) = build_engine();
    let result = engine.load(source).and_then(|_| engine.resume().map(|_| ()));
    (result, console)
}
