//! Control-flow state: the loop registry and the subroutine call stack

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-loop-variable record for a counted loop
///
/// Created by the loop-start operation and mutated only by the matching
/// loop-jump. Never explicitly destroyed; re-entering a loop with the same
/// variable overwrites the previous descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopDescriptor {
    pub current: f64,
    pub increment: f64,
    pub max: f64,
    /// The line immediately following the loop-start statement
    pub resume_lineno: u32,
}

/// Loop descriptors keyed by loop variable
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoopRegistry {
    loops: HashMap<String, LoopDescriptor>,
}

impl LoopRegistry {
    pub fn insert(&mut self, var: &str, descriptor: LoopDescriptor) {
        self.loops.insert(var.to_string(), descriptor);
    }

    /// Look up the loop for `var`; an unknown loop variable is a runtime
    /// error, never a silent no-op.
    pub fn get_mut(&mut self, var: &str) -> Result<&mut LoopDescriptor> {
        self.loops
            .get_mut(var)
            .ok_or_else(|| Error::runtime(format!("unknown loop variable {var}")))
    }
}

/// LIFO stack of return line numbers for subroutine calls
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallStack {
    returns: Vec<u32>,
}

impl CallStack {
    pub fn push(&mut self, lineno: u32) {
        self.returns.push(lineno);
    }

    /// Pop the return address; an empty stack is a runtime error, not an
    /// implementation fault.
    pub fn pop(&mut self) -> Result<u32> {
        self.returns
            .pop()
            .ok_or_else(|| Error::runtime("no call to return from"))
    }

    pub fn depth(&self) -> usize {
        self.returns.len()
    }
}
