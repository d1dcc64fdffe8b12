//! The compiled program: bytecode plus every table the VM and tooling need.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::types::{Function, Identifier, LineInfo};

/// Magic tag at the head of a persisted program image.
const MAGIC: &[u8; 4] = b"NANO";

/// Bumped whenever the image layout changes.
const FORMAT_VERSION: u32 = 1;

/// A compiled Nano program.
///
/// Produced once by the compiler and read-only to the VM. Syscalls are
/// recorded by name only; the host re-binds callbacks on the VM after a
/// build or a load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Ordered syscall names. `SCALL`/`NEW_SCALL` operands index this table.
    pub syscalls: Vec<String>,

    /// Function descriptors with code ranges and frame layouts.
    pub functions: Vec<Function>,

    /// Global variables with their global-table offsets.
    pub globals: Vec<Identifier>,

    /// The bytecode: opcode bytes with little-endian 32-bit operands.
    pub code: Vec<u8>,

    /// Map from code offset to the source position that produced it.
    pub line_table: BTreeMap<u32, LineInfo>,

    /// String literal pool, indexed by `NEW_STR` operands.
    pub strings: Vec<String>,
}

/// Failure while persisting or loading a program image.
#[derive(Debug)]
pub enum ProgramIoError {
    Io(std::io::Error),
    /// The stream does not start with the program magic.
    BadMagic,
    /// The image was written by an incompatible format version.
    BadVersion(u32),
    /// The record payload failed to decode.
    Encoding(String),
}

impl std::fmt::Display for ProgramIoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgramIoError::Io(e) => write!(f, "program io error: {}", e),
            ProgramIoError::BadMagic => write!(f, "not a nano program image"),
            ProgramIoError::BadVersion(v) => write!(f, "unsupported image version {}", v),
            ProgramIoError::Encoding(e) => write!(f, "malformed program image: {}", e),
        }
    }
}

impl std::error::Error for ProgramIoError {}

impl From<std::io::Error> for ProgramIoError {
    fn from(e: std::io::Error) -> Self {
        ProgramIoError::Io(e)
    }
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    /// Clear every table, ready for a fresh build.
    pub fn reset(&mut self) {
        *self = Program::default();
    }

    /// Find a function by name.
    pub fn function_find(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Find the function whose code range contains `pc`.
    pub fn function_at(&self, pc: u32) -> Option<&Function> {
        self.functions
            .iter()
            .find(|f| pc >= f.code_start && pc < f.code_end)
    }

    /// Index of a syscall name in the syscall table.
    pub fn syscall_index(&self, name: &str) -> Option<usize> {
        self.syscalls.iter().position(|s| s == name)
    }

    /// Source position for a code offset.
    ///
    /// Offsets between recorded entries resolve to the nearest entry at or
    /// before `pc`, so instructions emitted without their own token (frame
    /// epilogues) inherit the preceding line.
    pub fn get_line(&self, pc: u32) -> LineInfo {
        self.line_table
            .range(..=pc)
            .next_back()
            .map(|(_, line)| *line)
            .unwrap_or(LineInfo::INVALID)
    }

    /// Persist the program image: magic, version, then the record payload.
    pub fn save<W: Write>(&self, mut w: W) -> Result<(), ProgramIoError> {
        w.write_all(MAGIC)?;
        w.write_all(&FORMAT_VERSION.to_le_bytes())?;
        bincode::serialize_into(&mut w, self).map_err(|e| ProgramIoError::Encoding(e.to_string()))
    }

    /// Load a program image previously written by [`Program::save`].
    ///
    /// Syscall callbacks are not part of the image; the host must re-resolve
    /// them on the VM before execution.
    pub fn load<R: Read>(mut r: R) -> Result<Program, ProgramIoError> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(ProgramIoError::BadMagic);
        }
        let mut version = [0u8; 4];
        r.read_exact(&mut version)?;
        let version = u32::from_le_bytes(version);
        if version != FORMAT_VERSION {
            return Err(ProgramIoError::BadVersion(version));
        }
        bincode::deserialize_from(&mut r).map_err(|e| ProgramIoError::Encoding(e.to_string()))
    }
}
