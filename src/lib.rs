pub mod error;
pub mod runtime;

// Re-export main types
pub use error::{Error, ErrorKind, Result};
pub use runtime::{Engine, Outcome, State, Step, Value};
