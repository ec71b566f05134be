//! Console and display collaborator contracts
//!
//! The engine delegates all I/O to these traits and implements neither. A
//! blocking collaborator (e.g. `input` waiting for a line) stalls the whole
//! engine, by design — there is no I/O timeout.

use crate::error::Result;

/// Text console contract
pub trait Console {
    fn write(&mut self, text: &str);
    fn clear(&mut self);
    /// Read one line of input. Blocks until the host supplies it.
    fn input(&mut self) -> Result<String>;
}

/// Pixel display contract
///
/// The display is optional at engine construction; engine operations that
/// need it fail with a runtime error when it is absent.
pub trait Display {
    fn plot(&mut self, x: i64, y: i64, color: &str);
    fn color_at(&self, x: i64, y: i64) -> String;
    fn clear(&mut self);
    /// Most recently pressed key, if any
    fn get_char(&mut self) -> Option<char>;
}
