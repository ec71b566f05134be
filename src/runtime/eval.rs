//! Expression evaluation bridge
//!
//! Expressions stay as source text until a statement needs their value; the
//! engine then hands the text to the external evaluator with a scope bound to
//! the current environment, the constants table, and the function registry.
//! Evaluator errors propagate verbatim — the bridge logs context but never
//! translates failures.

use crate::error::{Error, Result};
use crate::runtime::env::{Environment, Value};
use std::collections::HashMap;

/// External expression evaluator contract
pub trait Evaluator {
    fn evaluate(&self, expr: &str, scope: &mut Scope<'_>) -> Result<Value>;
}

/// Built-in function registry: case-insensitive name to callable
///
/// Function semantics are a collaborator concern; the engine only owns the
/// lookup table and the unknown-name failure.
#[derive(Default)]
pub struct FunctionRegistry {
    funcs: HashMap<String, Box<dyn Fn(&[Value]) -> Result<Value>>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: &str,
        func: impl Fn(&[Value]) -> Result<Value> + 'static,
    ) {
        self.funcs.insert(name.to_lowercase(), Box::new(func));
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        match self.funcs.get(&name.to_lowercase()) {
            Some(func) => func(args),
            None => Err(Error::runtime(format!("function {name} does not exist"))),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(&name.to_lowercase())
    }
}

/// Everything an evaluator may see while evaluating one expression
///
/// Borrowed from the engine for the duration of the call; the evaluator reads
/// variables and constants and may invoke registered functions, but cannot
/// touch the cursor, the call stack, or I/O.
pub struct Scope<'a> {
    env: &'a Environment,
    functions: &'a FunctionRegistry,
}

impl<'a> Scope<'a> {
    pub fn new(env: &'a Environment, functions: &'a FunctionRegistry) -> Self {
        Scope { env, functions }
    }

    /// Read a variable; unset scalars read as zero
    pub fn get(&self, name: &str) -> Value {
        self.env.get(name)
    }

    pub fn get_indexed(&self, name: &str, index: &Value) -> Result<Value> {
        self.env.get_indexed(name, index)
    }

    pub fn constant(&self, name: &str) -> Result<Value> {
        self.env.constant(name)
    }

    pub fn call_function(&self, name: &str, args: &[Value]) -> Result<Value> {
        self.functions.call(name, args)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains(name)
    }
}
