//! Runtime values, variable storage, and the constants table

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Runtime value type
///
/// Arrays are a distinct tagged variant: a sparse mapping from subscript to
/// value, created explicitly with `Environment::declare_array` and
/// type-checked on indexed writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Value {
    Num(f64),
    Str(String),
    Array(HashMap<String, Value>),
}

impl Value {
    /// Check if value is truthy (for IF conditions)
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Num(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(_) => true,
        }
    }

    /// Numeric coercion for statement operands (jump targets, loop bounds,
    /// pixel coordinates)
    pub fn as_num(&self) -> Result<f64> {
        match self {
            Value::Num(n) => Ok(*n),
            other => Err(Error::runtime(format!("expected a number, got {other}"))),
        }
    }

    /// Canonical subscript key for array access
    ///
    /// Integral numbers collapse to their integer spelling so that `A(3)`
    /// and `A(3.0)` address the same slot.
    pub fn subscript_key(&self) -> String {
        match self {
            Value::Num(n) if n.fract() == 0.0 => format!("{}", *n as i64),
            Value::Num(n) => format!("{n}"),
            Value::Str(s) => s.clone(),
            Value::Array(_) => "[array]".to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(n) if n.fract() == 0.0 && n.is_finite() => write!(f, "{}", *n as i64),
            Value::Num(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Array(entries) => write!(f, "[array:{}]", entries.len()),
        }
    }
}

/* ===================== Environment ===================== */

/// Scalar and array variable storage plus the read-only constants table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    vars: HashMap<String, Value>,
    constants: HashMap<String, Value>,
}

/// Default constants: π and the display grid dimension
pub fn default_constants() -> HashMap<String, Value> {
    let mut table = HashMap::new();
    table.insert("PI".to_string(), Value::Num(std::f64::consts::PI));
    table.insert("SIZE".to_string(), Value::Num(64.0));
    table
}

impl Environment {
    pub fn new(constants: HashMap<String, Value>) -> Self {
        Environment {
            vars: HashMap::new(),
            constants,
        }
    }

    /// Clear all variables, keeping the constants table
    pub fn reset(&mut self) {
        self.vars.clear();
    }

    /// Read a variable. Unset scalars read as numeric zero, never an error.
    pub fn get(&self, name: &str) -> Value {
        self.vars.get(name).cloned().unwrap_or(Value::Num(0.0))
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    /// (Re)initialize `name` as an empty array value
    pub fn declare_array(&mut self, name: &str) {
        self.vars
            .insert(name.to_string(), Value::Array(HashMap::new()));
    }

    /// Write one array slot. The variable must already hold an array value.
    pub fn set_indexed(&mut self, name: &str, index: &Value, value: Value) -> Result<()> {
        match self.vars.get_mut(name) {
            Some(Value::Array(entries)) => {
                entries.insert(index.subscript_key(), value);
                Ok(())
            }
            _ => Err(Error::runtime(format!(
                "{name} is not an array, did you forget to declare it as an array?"
            ))),
        }
    }

    /// Read one array slot. An unset slot reads as numeric zero, consistent
    /// with unset scalars.
    pub fn get_indexed(&self, name: &str, index: &Value) -> Result<Value> {
        match self.vars.get(name) {
            Some(Value::Array(entries)) => Ok(entries
                .get(&index.subscript_key())
                .cloned()
                .unwrap_or(Value::Num(0.0))),
            _ => Err(Error::runtime(format!(
                "{name} is not an array, did you forget to declare it as an array?"
            ))),
        }
    }

    /// Look up a named constant
    pub fn constant(&self, name: &str) -> Result<Value> {
        self.constants
            .get(name)
            .cloned()
            .ok_or_else(|| Error::runtime(format!("unknown constant {name}")))
    }
}
