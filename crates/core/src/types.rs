//! Shared record types: source positions, identifiers, functions.

use serde::{Deserialize, Serialize};

/// A source position as `(file, line)`.
///
/// `file` is an index into the `SourceManager` that produced the tokens;
/// lines are 1-based. `LineInfo` is ordered so it can key the line table and
/// breakpoint sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineInfo {
    pub file: i32,
    pub line: i32,
}

impl LineInfo {
    pub const INVALID: LineInfo = LineInfo { file: -1, line: -1 };

    pub fn new(file: i32, line: i32) -> Self {
        LineInfo { file, line }
    }

    pub fn is_valid(&self) -> bool {
        self.file >= 0 && self.line >= 0
    }
}

impl Default for LineInfo {
    fn default() -> Self {
        LineInfo::INVALID
    }
}

impl std::fmt::Display for LineInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A named variable with its frame or global offset.
///
/// Argument offsets are negative, counted back from the frame base; local
/// offsets and global offsets count up from zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub name: String,
    pub offset: i32,
}

/// An entry in the program's function table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,

    /// Code address range `[code_start, code_end)` in the bytecode vector.
    pub code_start: u32,
    pub code_end: u32,

    /// Function arguments, in declaration order, with negative frame offsets.
    pub args: Vec<Identifier>,

    /// Function locals with their frame offsets.
    pub locals: Vec<Identifier>,
}

impl Function {
    pub fn num_args(&self) -> i32 {
        self.args.len() as i32
    }
}
