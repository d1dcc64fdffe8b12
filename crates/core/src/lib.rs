//! Nano Core: the shared program model for the Nano scripting toolchain
//!
//! This crate holds everything the compiler and the virtual machine agree on
//! without depending on each other:
//!
//! - `LineInfo`: a `(file, line)` pair used for diagnostics, breakpoints and
//!   line stepping
//! - `Opcode`: the bytecode instruction set
//! - `Program`: bytecode, function table, globals, syscall names, line table
//!   and string pool, plus the persisted image format
//! - `SourceManager`: loaded source files and import resolution
//!
//! The compiler produces a `Program`; the VM executes it read-only. Host
//! syscall callbacks are bound on the VM side and never stored here, which is
//! what keeps the program image pure data.

pub mod instructions;
pub mod program;
pub mod source;
pub mod types;

pub use instructions::Opcode;
pub use program::{Program, ProgramIoError};
pub use source::{FsLoader, MemoryLoader, SourceFile, SourceLoader, SourceManager};
pub use types::{Function, Identifier, LineInfo};
