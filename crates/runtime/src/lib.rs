//! Nano Runtime
//!
//! A stack-based virtual machine for compiled Nano programs: tagged values
//! over a copying garbage collector, cooperative resumable threads with
//! breakpoints and line stepping, and an indexed syscall table the host
//! binds callbacks into.
//!
//! # Running a program
//!
//! ```rust,ignore
//! use nano_runtime::{builtins, Vm};
//!
//! let mut vm = Vm::new(&program);
//! builtins::resolve(&mut vm);
//! vm.call_init()?;                         // run global initializers
//! let result = vm.call_once("main", &[], 1 << 24)?;
//! println!("{}", nano_runtime::value::to_string(vm.gc(), result));
//! ```
//!
//! Threads suspend only at instruction boundaries: `resume` runs a budget
//! of instructions, syscalls may `halt` to yield, and the host interleaves
//! multiple threads by resuming each in turn. Collections happen at those
//! same boundaries, with every live thread's stack and the globals table as
//! the root set.

pub mod builtins;
pub mod error;
pub mod gc;
pub mod thread;
pub mod value;
pub mod vm;

pub use error::ThreadError;
pub use gc::ValueGc;
pub use thread::{Frame, SyscallCtx, SyscallFn, Thread, ValueStack};
pub use value::{Cell, ValueRef, ValueView};
pub use vm::{ThreadId, Vm};
