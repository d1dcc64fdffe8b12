//! The virtual machine: instruction dispatch, frames, syscalls, GC driving.
//!
//! A `Vm` owns the collector, the globals table, the bound syscall
//! callbacks and the live threads; the program stays read-only. Threads are
//! taken out of their slot while they execute so the interpreter can borrow
//! the rest of the machine freely, and every live thread's stack joins the
//! root set whenever the collector runs.

use nano_core::{Function, LineInfo, Opcode, Program};

use crate::error::ThreadError;
use crate::gc::ValueGc;
use crate::thread::{Frame, SyscallCtx, SyscallFn, Thread, FRAME_LIMIT};
use crate::value::{self, ValueRef, ValueView};

pub type ThreadId = usize;

/// Instructions between collector occupancy checks. Each instruction
/// allocates at most a few cells, so the check interval plus the collect
/// threshold stays comfortably under the arena capacity.
const GC_CHECK_INTERVAL: u64 = 16;

/// Instructions per inner resume chunk in the run-to-completion drivers.
const RESUME_CHUNK: u32 = 128 * 1024;

pub struct Vm<'p> {
    program: &'p Program,
    gc: ValueGc,
    /// Global variable slots, sized by the `GLOBALS` prologue of `@init`.
    globals: Vec<ValueRef>,
    /// Host callbacks, parallel to the program's syscall name table.
    syscalls: Vec<Option<SyscallFn>>,
    threads: Vec<Option<Thread>>,
}

impl<'p> Vm<'p> {
    pub fn new(program: &'p Program) -> Self {
        Vm {
            program,
            gc: ValueGc::new(),
            globals: Vec::new(),
            syscalls: vec![None; program.syscalls.len()],
            threads: Vec::new(),
        }
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    pub fn gc(&self) -> &ValueGc {
        &self.gc
    }

    pub fn gc_mut(&mut self) -> &mut ValueGc {
        &mut self.gc
    }

    pub fn globals(&self) -> &[ValueRef] {
        &self.globals
    }

    /// Value of a global by name, once `@init` has run.
    pub fn global_find(&self, name: &str) -> Option<ValueRef> {
        let ident = self.program.globals.iter().find(|g| g.name == name)?;
        self.globals.get(ident.offset as usize).copied()
    }

    // ---- linking ----

    /// Bind a host callback to a syscall name. Returns false when the
    /// program never declared the name.
    pub fn resolve_syscall(&mut self, name: &str, f: SyscallFn) -> bool {
        match self.program.syscall_index(name) {
            Some(index) => {
                self.syscalls[index] = Some(f);
                true
            }
            None => false,
        }
    }

    /// Syscall names that still have no callback bound.
    pub fn unresolved_syscalls(&self) -> Vec<&str> {
        self.program
            .syscalls
            .iter()
            .enumerate()
            .filter(|(i, _)| self.syscalls[*i].is_none())
            .map(|(_, name)| name.as_str())
            .collect()
    }

    // ---- host-side value construction ----

    pub fn new_int(&mut self, v: i32) -> Option<ValueRef> {
        self.gc.new_int(v)
    }

    pub fn new_float(&mut self, v: f32) -> Option<ValueRef> {
        self.gc.new_float(v)
    }

    pub fn new_string(&mut self, v: impl Into<String>) -> Option<ValueRef> {
        self.gc.new_string(v)
    }

    pub fn view(&self, v: ValueRef) -> ValueView<'_> {
        self.gc.get(v)
    }

    // ---- threads ----

    /// Create a thread prepared to run `func` with `args` already pushed.
    pub fn thread_create(
        &mut self,
        func: &Function,
        args: &[ValueRef],
    ) -> Result<ThreadId, ThreadError> {
        let mut thread = Thread::new();
        self.prepare(&mut thread, func, args)?;
        let id = match self.threads.iter().position(Option::is_none) {
            Some(slot) => {
                self.threads[slot] = Some(thread);
                slot
            }
            None => {
                self.threads.push(Some(thread));
                self.threads.len() - 1
            }
        };
        Ok(id)
    }

    pub fn thread(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.get(id)?.as_ref()
    }

    pub fn thread_mut(&mut self, id: ThreadId) -> Option<&mut Thread> {
        self.threads.get_mut(id)?.as_mut()
    }

    /// Detach a thread from the VM. Its stack stops being a GC root.
    pub fn thread_remove(&mut self, id: ThreadId) -> Option<Thread> {
        self.threads.get_mut(id)?.take()
    }

    /// Run up to `cycles` instructions. Stops early on finish, error, a
    /// syscall halt, or a breakpoint. Returns false once the thread has an
    /// error (or does not exist).
    pub fn resume(&mut self, id: ThreadId, cycles: u32) -> bool {
        let Some(mut thread) = self.threads.get_mut(id).and_then(Option::take) else {
            return false;
        };
        let ok = self.resume_thread(&mut thread, cycles);
        self.threads[id] = Some(thread);
        ok
    }

    /// Execute exactly one instruction, ignoring breakpoints.
    pub fn step_inst(&mut self, id: ThreadId) -> bool {
        let Some(mut thread) = self.threads.get_mut(id).and_then(Option::take) else {
            return false;
        };
        if !thread.finished() {
            self.step_thread(&mut thread);
        }
        let ok = !thread.has_error();
        self.threads[id] = Some(thread);
        ok
    }

    /// Execute until the source line resolved through the line table
    /// changes (or the thread stops).
    pub fn step_line(&mut self, id: ThreadId) -> bool {
        let Some(mut thread) = self.threads.get_mut(id).and_then(Option::take) else {
            return false;
        };
        if !thread.finished() {
            let start = self.program.get_line(thread.pc as u32);
            loop {
                self.step_thread(&mut thread);
                if thread.finished() || thread.halted() {
                    break;
                }
                if self.program.get_line(thread.pc as u32) != start {
                    break;
                }
            }
        }
        let ok = !thread.has_error();
        self.threads[id] = Some(thread);
        ok
    }

    // ---- one-shot drivers ----

    /// Run `@init` to populate the globals table. Must be called once
    /// before user code so global initializers take effect.
    pub fn call_init(&mut self) -> Result<(), ThreadError> {
        let func = match self.program.function_find("@init") {
            Some(f) => f.clone(),
            None => return Ok(()),
        };
        let mut thread = Thread::new();
        self.prepare(&mut thread, &func, &[])?;
        while !thread.finished() {
            self.resume_thread(&mut thread, RESUME_CHUNK);
        }
        match thread.error() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Compile-and-go driver: run one function to completion on a fresh
    /// thread with a cycle budget, returning its value.
    ///
    /// The returned handle is valid until the next collection; read it (or
    /// store it in the globals table) promptly.
    pub fn call_once(
        &mut self,
        name: &str,
        args: &[ValueRef],
        max_cycles: u64,
    ) -> Result<ValueRef, ThreadError> {
        let func = self
            .program
            .function_find(name)
            .cloned()
            .ok_or(ThreadError::BadPrepare)?;
        self.call_function(&func, args, max_cycles)
    }

    pub fn call_function(
        &mut self,
        func: &Function,
        args: &[ValueRef],
        max_cycles: u64,
    ) -> Result<ValueRef, ThreadError> {
        // start from a compacted heap; freshly allocated argument cells
        // stay readable across one collection and are rooted by `prepare`
        self.gc_collect();
        let mut thread = Thread::new();
        thread.set_cycle_limit(Some(max_cycles));
        self.prepare(&mut thread, func, args)?;
        while !thread.finished() {
            self.resume_thread(&mut thread, RESUME_CHUNK);
        }
        if let Some(e) = thread.error() {
            return Err(e);
        }
        Ok(thread.return_value().unwrap_or(ValueRef::NONE))
    }

    // ---- collection ----

    /// Stop-the-world collect with the globals table and every live
    /// thread's stack as roots.
    pub fn gc_collect(&mut self) {
        self.collect_with(None);
    }

    fn collect_with(&mut self, current: Option<&mut Thread>) {
        let mut globals = std::mem::take(&mut self.globals);
        self.gc.trace(&mut globals);
        self.globals = globals;

        let mut threads = std::mem::take(&mut self.threads);
        for thread in threads.iter_mut().flatten() {
            self.gc.trace(thread.stack_mut().data_mut());
        }
        self.threads = threads;

        if let Some(thread) = current {
            self.gc.trace(thread.stack_mut().data_mut());
        }

        self.gc.collect();
    }

    // ---- execution core ----

    fn prepare(
        &mut self,
        thread: &mut Thread,
        func: &Function,
        args: &[ValueRef],
    ) -> Result<(), ThreadError> {
        thread.error = None;
        thread.finished = true;
        thread.halted = false;
        thread.cycles = 0;
        thread.last_line = LineInfo::INVALID;
        thread.stack.clear();
        thread.frames.clear();

        if func.num_args() != args.len() as i32 {
            thread.raise_error(ThreadError::BadNumArgs);
            return Err(ThreadError::BadNumArgs);
        }
        for &arg in args {
            if thread.stack.push(arg).is_err() {
                thread.raise_error(ThreadError::BadPrepare);
                return Err(ThreadError::BadPrepare);
            }
        }
        thread.frames.push(Frame {
            sp: thread.stack.head(),
            return_addr: 0,
            callee: func.code_start as i32,
            terminal: true,
        });
        thread.pc = func.code_start as i32;
        thread.finished = false;
        Ok(())
    }

    fn resume_thread(&mut self, thread: &mut Thread, cycles: u32) -> bool {
        if thread.finished() {
            return false;
        }
        thread.halted = false;

        let mut left = cycles;
        while left > 0 {
            // breakpoints fire when execution moves onto a new source line
            let line = self.program.get_line(thread.pc as u32);
            if line.is_valid() && line != thread.last_line {
                thread.last_line = line;
                if thread.breakpoints.contains(&line) {
                    return !thread.has_error();
                }
            }

            self.step_thread(thread);
            left -= 1;
            if thread.finished() || thread.halted() {
                break;
            }

            if thread.cycles % GC_CHECK_INTERVAL == 0 && self.gc.should_collect() {
                self.collect_with(Some(&mut *thread));
                if self.gc.take_oom() {
                    thread.raise_error(ThreadError::StackOverflow);
                    break;
                }
            }
        }
        !thread.has_error()
    }

    fn step_thread(&mut self, thread: &mut Thread) {
        if let Err(e) = self.step_imp(thread) {
            thread.raise_error(e);
        }
        thread.cycles += 1;
        if let Some(limit) = thread.cycle_limit {
            if thread.cycles > limit && !thread.finished() {
                thread.raise_error(ThreadError::MaxCycleCount);
            }
        }
    }

    fn read_opcode(&self, thread: &mut Thread) -> Result<Opcode, ThreadError> {
        let byte = *self
            .program
            .code
            .get(thread.pc as usize)
            .ok_or(ThreadError::BadOpcode)?;
        thread.pc += 1;
        Opcode::try_from(byte).map_err(|_| ThreadError::BadOpcode)
    }

    fn read_operand(&self, thread: &mut Thread) -> Result<i32, ThreadError> {
        let pc = thread.pc as usize;
        let bytes: [u8; 4] = self
            .program
            .code
            .get(pc..pc + 4)
            .and_then(|s| s.try_into().ok())
            .ok_or(ThreadError::BadOpcode)?;
        thread.pc += 4;
        Ok(i32::from_le_bytes(bytes))
    }

    fn frame(thread: &Thread) -> Result<Frame, ThreadError> {
        thread
            .frames
            .last()
            .copied()
            .ok_or(ThreadError::StackUnderflow)
    }

    fn binop(
        &mut self,
        thread: &mut Thread,
        f: fn(&mut ValueGc, ValueRef, ValueRef) -> Result<ValueRef, ThreadError>,
    ) -> Result<(), ThreadError> {
        let r = thread.stack.pop()?;
        let l = thread.stack.pop()?;
        let v = f(&mut self.gc, l, r)?;
        thread.stack.push(v)
    }

    fn push_new(
        &mut self,
        thread: &mut Thread,
        v: Option<ValueRef>,
    ) -> Result<(), ThreadError> {
        let v = v.ok_or(ThreadError::StackOverflow)?;
        thread.stack.push(v)
    }

    fn enter_frame(
        &mut self,
        thread: &mut Thread,
        argc: i32,
        target: i32,
    ) -> Result<(), ThreadError> {
        if argc < 0 || thread.stack.head() < argc {
            return Err(ThreadError::StackUnderflow);
        }
        if thread.frames.len() >= FRAME_LIMIT {
            return Err(ThreadError::StackOverflow);
        }
        thread.frames.push(Frame {
            sp: thread.stack.head(),
            return_addr: thread.pc,
            callee: target,
            terminal: false,
        });
        thread.pc = target;
        Ok(())
    }

    fn dispatch_syscall(
        &mut self,
        thread: &mut Thread,
        index: i32,
        argc: i32,
    ) -> Result<(), ThreadError> {
        let f = *usize::try_from(index)
            .ok()
            .and_then(|i| self.syscalls.get(i))
            .ok_or(ThreadError::BadSyscall)?;
        let f = f.ok_or(ThreadError::BadSyscall)?;
        let mut ctx = SyscallCtx {
            gc: &mut self.gc,
            thread,
        };
        f(&mut ctx, argc);
        Ok(())
    }

    fn step_imp(&mut self, thread: &mut Thread) -> Result<(), ThreadError> {
        let opcode = self.read_opcode(thread)?;
        match opcode {
            Opcode::Add => self.binop(thread, value::add),
            Opcode::Sub => self.binop(thread, value::sub),
            Opcode::Mul => self.binop(thread, value::mul),
            Opcode::Div => self.binop(thread, value::div),
            Opcode::Mod => self.binop(thread, value::rem),
            Opcode::And => self.binop(thread, value::logical_and),
            Opcode::Or => self.binop(thread, value::logical_or),
            Opcode::Lt => self.binop(thread, value::lt),
            Opcode::Gt => self.binop(thread, value::gt),
            Opcode::Leq => self.binop(thread, value::leq),
            Opcode::Geq => self.binop(thread, value::geq),

            Opcode::Eq => {
                let r = thread.stack.pop()?;
                let l = thread.stack.pop()?;
                let v = value::eq(&self.gc, l, r) as i32;
                let v = self.gc.new_int(v);
                self.push_new(thread, v)
            }

            Opcode::Not => {
                let v = thread.stack.pop()?;
                let v = value::not(&mut self.gc, v)?;
                thread.stack.push(v)
            }
            Opcode::Neg => {
                let v = thread.stack.pop()?;
                let v = value::neg(&mut self.gc, v)?;
                thread.stack.push(v)
            }

            Opcode::Jmp => {
                let target = self.read_operand(thread)?;
                thread.pc = target;
                Ok(())
            }
            Opcode::Tjmp => {
                let target = self.read_operand(thread)?;
                let v = thread.stack.pop()?;
                if value::as_bool(&self.gc, v) {
                    thread.pc = target;
                }
                Ok(())
            }
            Opcode::Fjmp => {
                let target = self.read_operand(thread)?;
                let v = thread.stack.pop()?;
                if !value::as_bool(&self.gc, v) {
                    thread.pc = target;
                }
                Ok(())
            }

            Opcode::Call => {
                let argc = self.read_operand(thread)?;
                let target = self.read_operand(thread)?;
                self.enter_frame(thread, argc, target)
            }
            Opcode::Ret => {
                let operand = self.read_operand(thread)?;
                let result = thread.stack.pop()?;
                thread.stack.discard(operand)?;
                let frame = thread.frames.pop().ok_or(ThreadError::StackUnderflow)?;
                thread.stack.push(result)?;
                thread.pc = frame.return_addr;
                if frame.terminal {
                    thread.finished = true;
                }
                Ok(())
            }
            Opcode::Scall => {
                let argc = self.read_operand(thread)?;
                let index = self.read_operand(thread)?;
                self.dispatch_syscall(thread, index, argc)
            }
            Opcode::Icall => {
                let argc = self.read_operand(thread)?;
                let callee = thread.stack.pop()?;
                match self.gc.get(callee) {
                    ValueView::Func(offset) => self.enter_frame(thread, argc, offset as i32),
                    ValueView::Syscall(index) => {
                        self.dispatch_syscall(thread, index as i32, argc)
                    }
                    _ => Err(ThreadError::BadTypeOperation),
                }
            }
            Opcode::Pop => {
                let count = self.read_operand(thread)?;
                thread
                    .stack
                    .discard(count)
                    .map_err(|_| ThreadError::BadPop)
            }

            Opcode::NewInt => {
                let v = self.read_operand(thread)?;
                let v = self.gc.new_int(v);
                self.push_new(thread, v)
            }
            Opcode::NewFlt => {
                let bits = self.read_operand(thread)?;
                let v = self.gc.new_float(f32::from_bits(bits as u32));
                self.push_new(thread, v)
            }
            Opcode::NewStr => {
                let index = self.read_operand(thread)?;
                let text = usize::try_from(index)
                    .ok()
                    .and_then(|i| self.program.strings.get(i))
                    .ok_or(ThreadError::BadOpcode)?
                    .clone();
                let v = self.gc.new_string(text);
                self.push_new(thread, v)
            }
            Opcode::NewAry => {
                let len = self.read_operand(thread)?;
                if len < 0 {
                    return Err(ThreadError::BadOpcode);
                }
                let v = self.gc.new_array(len as usize);
                self.push_new(thread, v)
            }
            Opcode::NewNone => thread.stack.push(ValueRef::NONE),
            Opcode::NewFunc => {
                let offset = self.read_operand(thread)?;
                let v = self.gc.new_func(offset as u32);
                self.push_new(thread, v)
            }
            Opcode::NewScall => {
                let index = self.read_operand(thread)?;
                let v = self.gc.new_syscall(index as u32);
                self.push_new(thread, v)
            }

            Opcode::Locals => {
                let count = self.read_operand(thread)?;
                if count < 0 {
                    return Err(ThreadError::BadOpcode);
                }
                for _ in 0..count {
                    thread.stack.push(ValueRef::NONE)?;
                }
                Ok(())
            }
            Opcode::Globals => {
                let count = self.read_operand(thread)?;
                if count < 0 {
                    return Err(ThreadError::BadGlobalsSize);
                }
                self.globals.resize(count as usize, ValueRef::NONE);
                Ok(())
            }

            Opcode::Getv => {
                let offset = self.read_operand(thread)?;
                let index = Self::frame(thread)?.sp + offset;
                let v = thread.stack.get(index).ok_or(ThreadError::BadGetv)?;
                thread.stack.push(v)
            }
            Opcode::Setv => {
                let offset = self.read_operand(thread)?;
                let v = thread.stack.pop()?;
                let index = Self::frame(thread)?.sp + offset;
                if !thread.stack.set(index, v) {
                    return Err(ThreadError::BadSetv);
                }
                Ok(())
            }
            Opcode::Getg => {
                let offset = self.read_operand(thread)?;
                let v = *usize::try_from(offset)
                    .ok()
                    .and_then(|i| self.globals.get(i))
                    .ok_or(ThreadError::BadGetGlobal)?;
                thread.stack.push(v)
            }
            Opcode::Setg => {
                let offset = self.read_operand(thread)?;
                let v = thread.stack.pop()?;
                let slot = usize::try_from(offset)
                    .ok()
                    .and_then(|i| self.globals.get_mut(i))
                    .ok_or(ThreadError::BadSetGlobal)?;
                *slot = v;
                Ok(())
            }

            Opcode::Geta => {
                let array = thread.stack.pop()?;
                let index = thread.stack.pop()?;
                let index = match self.gc.get(index) {
                    ValueView::Int(i) => i,
                    _ => return Err(ThreadError::BadArrayIndex),
                };
                match self.gc.get(array) {
                    ValueView::Array(items) => {
                        let v = usize::try_from(index)
                            .ok()
                            .and_then(|i| items.get(i))
                            .copied()
                            .ok_or(ThreadError::BadArrayBounds)?;
                        thread.stack.push(v)
                    }
                    ValueView::Str(s) => {
                        let byte = usize::try_from(index)
                            .ok()
                            .and_then(|i| s.as_bytes().get(i))
                            .copied()
                            .ok_or(ThreadError::BadArrayBounds)?;
                        let v = self.gc.new_string((byte as char).to_string());
                        self.push_new(thread, v)
                    }
                    _ => Err(ThreadError::BadArrayObject),
                }
            }
            Opcode::Seta => {
                let array = thread.stack.pop()?;
                let index = thread.stack.pop()?;
                let value = thread.stack.pop()?;
                let index = match self.gc.get(index) {
                    ValueView::Int(i) => i,
                    _ => return Err(ThreadError::BadArrayIndex),
                };
                if !matches!(self.gc.get(array), ValueView::Array(_)) {
                    return Err(ThreadError::BadArrayObject);
                }
                let index = usize::try_from(index).map_err(|_| ThreadError::BadArrayBounds)?;
                if !self.gc.array_set(array, index, value) {
                    return Err(ThreadError::BadArrayBounds);
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueView;

    /// Hand-assemble a one-function program.
    fn program_with(code: Vec<u8>, num_args: i32) -> Program {
        let mut prog = Program::new();
        let args = (0..num_args)
            .map(|i| nano_core::Identifier {
                name: format!("a{}", i),
                offset: i - num_args,
            })
            .collect();
        prog.functions.push(Function {
            name: "main".to_string(),
            code_start: 0,
            code_end: code.len() as u32,
            args,
            locals: vec![],
        });
        prog.code = code;
        prog
    }

    fn op(code: &mut Vec<u8>, opcode: Opcode) {
        code.push(opcode as u8);
    }

    fn op1(code: &mut Vec<u8>, opcode: Opcode, operand: i32) {
        code.push(opcode as u8);
        code.extend_from_slice(&operand.to_le_bytes());
    }

    #[test]
    fn return_integer_literal() {
        let mut code = Vec::new();
        op1(&mut code, Opcode::NewInt, 123);
        op1(&mut code, Opcode::Ret, 0);
        let prog = program_with(code, 0);

        let mut vm = Vm::new(&prog);
        let result = vm.call_once("main", &[], 1_000).unwrap();
        assert_eq!(vm.view(result), ValueView::Int(123));
    }

    #[test]
    fn arguments_read_back_through_negative_offsets() {
        // return the first of two args
        let mut code = Vec::new();
        op1(&mut code, Opcode::Getv, -2);
        op1(&mut code, Opcode::Ret, 2);
        let prog = program_with(code, 2);

        let mut vm = Vm::new(&prog);
        let a = vm.new_int(41).unwrap();
        let b = vm.new_int(1).unwrap();
        let result = vm.call_once("main", &[a, b], 1_000).unwrap();
        assert_eq!(vm.view(result), ValueView::Int(41));
    }

    #[test]
    fn wrong_argument_count_fails_preparation() {
        let mut code = Vec::new();
        op1(&mut code, Opcode::NewInt, 0);
        op1(&mut code, Opcode::Ret, 1);
        let prog = program_with(code, 1);

        let mut vm = Vm::new(&prog);
        let err = vm.call_once("main", &[], 1_000).unwrap_err();
        assert_eq!(err, ThreadError::BadNumArgs);
    }

    #[test]
    fn divide_by_zero_raises_at_runtime() {
        let mut code = Vec::new();
        op1(&mut code, Opcode::NewInt, 1);
        op1(&mut code, Opcode::NewInt, 0);
        op(&mut code, Opcode::Div);
        op1(&mut code, Opcode::Ret, 0);
        let prog = program_with(code, 0);

        let mut vm = Vm::new(&prog);
        let err = vm.call_once("main", &[], 1_000).unwrap_err();
        assert_eq!(err, ThreadError::BadDivideByZero);
    }

    #[test]
    fn bad_opcode_is_reported() {
        let prog = program_with(vec![0xfe], 0);
        let mut vm = Vm::new(&prog);
        let err = vm.call_once("main", &[], 1_000).unwrap_err();
        assert_eq!(err, ThreadError::BadOpcode);
    }

    #[test]
    fn cycle_budget_is_enforced() {
        // JMP 0: spin forever
        let mut code = Vec::new();
        op1(&mut code, Opcode::Jmp, 0);
        let prog = program_with(code, 0);

        let mut vm = Vm::new(&prog);
        let err = vm.call_once("main", &[], 10_000).unwrap_err();
        assert_eq!(err, ThreadError::MaxCycleCount);
    }

    #[test]
    fn syscalls_pop_args_and_push_one_result() {
        fn double(ctx: &mut SyscallCtx<'_>, nargs: i32) {
            assert_eq!(nargs, 1);
            let v = ctx.pop();
            match ctx.view(v) {
                ValueView::Int(i) => ctx.push_int(i * 2),
                _ => {
                    ctx.raise(ThreadError::BadArgument);
                    ctx.push_none();
                }
            }
        }

        let mut code = Vec::new();
        op1(&mut code, Opcode::NewInt, 21);
        code.push(Opcode::Scall as u8);
        code.extend_from_slice(&1i32.to_le_bytes());
        code.extend_from_slice(&0i32.to_le_bytes());
        op1(&mut code, Opcode::Ret, 0);
        let mut prog = program_with(code, 0);
        prog.syscalls.push("double".to_string());

        let mut vm = Vm::new(&prog);
        assert!(vm.resolve_syscall("double", double));
        assert!(vm.unresolved_syscalls().is_empty());
        let result = vm.call_once("main", &[], 1_000).unwrap();
        assert_eq!(vm.view(result), ValueView::Int(42));
    }

    #[test]
    fn unresolved_syscall_raises() {
        let mut code = Vec::new();
        code.push(Opcode::Scall as u8);
        code.extend_from_slice(&0i32.to_le_bytes());
        code.extend_from_slice(&0i32.to_le_bytes());
        op1(&mut code, Opcode::Ret, 0);
        let mut prog = program_with(code, 0);
        prog.syscalls.push("missing".to_string());

        let mut vm = Vm::new(&prog);
        let err = vm.call_once("main", &[], 1_000).unwrap_err();
        assert_eq!(err, ThreadError::BadSyscall);
    }

    #[test]
    fn halt_suspends_between_instructions() {
        fn pause(ctx: &mut SyscallCtx<'_>, _nargs: i32) {
            ctx.halt();
            ctx.push_none();
        }

        let mut code = Vec::new();
        code.push(Opcode::Scall as u8);
        code.extend_from_slice(&0i32.to_le_bytes());
        code.extend_from_slice(&0i32.to_le_bytes());
        op1(&mut code, Opcode::Pop, 1);
        op1(&mut code, Opcode::NewInt, 5);
        op1(&mut code, Opcode::Ret, 0);
        let mut prog = program_with(code, 0);
        prog.syscalls.push("pause".to_string());

        let mut vm = Vm::new(&prog);
        vm.resolve_syscall("pause", pause);
        let func = prog.function_find("main").unwrap();
        let tid = vm.thread_create(func, &[]).unwrap();

        assert!(vm.resume(tid, 1_000));
        let thread = vm.thread(tid).unwrap();
        assert!(thread.halted());
        assert!(!thread.finished());

        // resuming continues past the halt point
        assert!(vm.resume(tid, 1_000));
        let thread = vm.thread(tid).unwrap();
        assert!(thread.finished());
        let result = thread.return_value().unwrap();
        assert_eq!(vm.view(result), ValueView::Int(5));
    }

    #[test]
    fn step_inst_executes_exactly_one_instruction() {
        let mut code = Vec::new();
        op1(&mut code, Opcode::NewInt, 1);
        op1(&mut code, Opcode::NewInt, 2);
        op(&mut code, Opcode::Add);
        op1(&mut code, Opcode::Ret, 0);
        let prog = program_with(code, 0);

        let mut vm = Vm::new(&prog);
        let func = prog.function_find("main").unwrap();
        let tid = vm.thread_create(func, &[]).unwrap();

        assert!(vm.step_inst(tid));
        assert_eq!(vm.thread(tid).unwrap().cycles(), 1);
        assert_eq!(vm.thread(tid).unwrap().stack().head(), 1);
    }

    #[test]
    fn collections_keep_thread_stacks_alive() {
        // small heap so the loop forces many collections
        let mut code = Vec::new();
        op1(&mut code, Opcode::NewInt, 7);
        // spin allocating: 7 + 1 - 1 + 1 - 1 ... then return
        for _ in 0..200 {
            op1(&mut code, Opcode::NewInt, 1);
            op(&mut code, Opcode::Add);
            op1(&mut code, Opcode::NewInt, 1);
            op(&mut code, Opcode::Sub);
        }
        op1(&mut code, Opcode::Ret, 0);
        let prog = program_with(code, 0);

        let mut vm = Vm::new(&prog);
        *vm.gc_mut() = ValueGc::with_capacity(128);
        let result = vm.call_once("main", &[], 100_000).unwrap();
        assert_eq!(vm.view(result), ValueView::Int(7));
    }

    #[test]
    fn breakpoints_fire_on_new_lines_and_not_on_resume() {
        let mut code = Vec::new();
        op1(&mut code, Opcode::NewInt, 1); // line 1
        op1(&mut code, Opcode::NewInt, 2); // line 2
        op(&mut code, Opcode::Add); // line 2
        op1(&mut code, Opcode::Ret, 0); // line 3
        let mut prog = program_with(code, 0);
        prog.line_table.insert(0, LineInfo::new(0, 1));
        prog.line_table.insert(5, LineInfo::new(0, 2));
        prog.line_table.insert(11, LineInfo::new(0, 3));

        let mut vm = Vm::new(&prog);
        let func = prog.function_find("main").unwrap();
        let tid = vm.thread_create(func, &[]).unwrap();
        vm.thread_mut(tid)
            .unwrap()
            .breakpoint_add(LineInfo::new(0, 2));

        assert!(vm.resume(tid, 1_000));
        {
            let thread = vm.thread(tid).unwrap();
            assert!(!thread.finished());
            assert_eq!(thread.pc(), 5, "stopped before the line-2 instruction");
        }

        // resume runs through: the breakpoint does not re-fire on its line
        assert!(vm.resume(tid, 1_000));
        let thread = vm.thread(tid).unwrap();
        assert!(thread.finished());
    }

    #[test]
    fn step_line_stops_when_the_line_changes() {
        let mut code = Vec::new();
        op1(&mut code, Opcode::NewInt, 1); // line 1
        op1(&mut code, Opcode::NewInt, 2); // line 1
        op(&mut code, Opcode::Add); // line 1
        op1(&mut code, Opcode::Ret, 0); // line 2
        let mut prog = program_with(code, 0);
        prog.line_table.insert(0, LineInfo::new(0, 1));
        prog.line_table.insert(11, LineInfo::new(0, 2));

        let mut vm = Vm::new(&prog);
        let func = prog.function_find("main").unwrap();
        let tid = vm.thread_create(func, &[]).unwrap();

        assert!(vm.step_line(tid));
        let thread = vm.thread(tid).unwrap();
        assert_eq!(thread.pc(), 11, "stopped at the first line-2 instruction");
        assert_eq!(thread.cycles(), 3);
    }

    #[test]
    fn array_instructions_check_types_and_bounds() {
        // a[5] on a 3-element array
        let mut code = Vec::new();
        op1(&mut code, Opcode::NewInt, 5);
        op1(&mut code, Opcode::NewAry, 3);
        op(&mut code, Opcode::Geta);
        op1(&mut code, Opcode::Ret, 0);
        let prog = program_with(code, 0);
        let mut vm = Vm::new(&prog);
        let err = vm.call_once("main", &[], 1_000).unwrap_err();
        assert_eq!(err, ThreadError::BadArrayBounds);

        // indexing an int
        let mut code = Vec::new();
        op1(&mut code, Opcode::NewInt, 0);
        op1(&mut code, Opcode::NewInt, 9);
        op(&mut code, Opcode::Geta);
        op1(&mut code, Opcode::Ret, 0);
        let prog = program_with(code, 0);
        let mut vm = Vm::new(&prog);
        let err = vm.call_once("main", &[], 1_000).unwrap_err();
        assert_eq!(err, ThreadError::BadArrayObject);
    }

    #[test]
    fn strings_index_as_one_character_strings() {
        let mut code = Vec::new();
        op1(&mut code, Opcode::NewInt, 1);
        op1(&mut code, Opcode::NewStr, 0);
        op(&mut code, Opcode::Geta);
        op1(&mut code, Opcode::Ret, 0);
        let mut prog = program_with(code, 0);
        prog.strings.push("abc".to_string());

        let mut vm = Vm::new(&prog);
        let result = vm.call_once("main", &[], 1_000).unwrap();
        assert_eq!(vm.view(result), ValueView::Str("b"));
    }
}
