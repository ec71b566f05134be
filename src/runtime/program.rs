//! Program store
//!
//! An ordered, line-number-indexed collection of statements. Built once per
//! run from raw source text, validated, and read-only thereafter.

use crate::error::{Error, Result};
use crate::runtime::stmt::Statement;
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

/// External line parser contract
///
/// Turns one line of source text into a statement node. The parser is a
/// collaborator; this crate never looks at source syntax itself.
pub trait LineParser {
    fn parse_line(&self, text: &str) -> Result<Statement>;
}

/// An ordered sequence of statements keyed by line number
#[derive(Debug, Clone, Default)]
pub struct Program {
    lines: BTreeMap<u32, Statement>,
}

impl Program {
    /// Parse newline-delimited source into a program
    ///
    /// Blank lines are skipped. Any parse failure aborts the whole load —
    /// there is no partial program. After parsing, a duplicate line number is
    /// a load error naming the offending line.
    pub fn load(source: &str, parser: &dyn LineParser) -> Result<Program> {
        let mut lines = BTreeMap::new();
        for text in source.lines() {
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            let stmt = parser.parse_line(text)?;
            let lineno = stmt.lineno;
            if lines.insert(lineno, stmt).is_some() {
                return Err(Error::parse(format!("duplicate line number {lineno}")).at_line(lineno));
            }
        }
        Ok(Program { lines })
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lowest line number, if the program has any statements
    pub fn first_line(&self) -> Option<u32> {
        self.lines.keys().next().copied()
    }

    pub fn find(&self, lineno: u32) -> Option<&Statement> {
        self.lines.get(&lineno)
    }

    /// The line strictly after `lineno` in sorted order
    ///
    /// Line numbers may be sparse, so this is the successor in the store,
    /// not `lineno + 1`.
    pub fn line_after(&self, lineno: u32) -> Option<u32> {
        self.lines
            .range((Excluded(lineno), Unbounded))
            .next()
            .map(|(n, _)| *n)
    }
}
