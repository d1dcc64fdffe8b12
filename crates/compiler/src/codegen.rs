//! Bytecode emission.
//!
//! `ProgramBuilder` owns the raw byte stream; `Codegen` walks the lowered
//! AST and emits instructions. Forward jumps and direct calls write a zero
//! operand and record a fixup that is patched once the target offset is
//! known. Every emitted instruction records its source line so the VM can
//! resolve breakpoints and line steps.

use std::collections::HashMap;

use nano_core::{LineInfo, Opcode, Program};

use crate::ast::{Ast, Node, NodeId, Scope};
use crate::errors::{self, Result};
use crate::token::{Token, TokenKind};

/// Little-endian byte emitter over the program's code vector.
pub struct ProgramBuilder<'a> {
    program: &'a mut Program,
}

impl<'a> ProgramBuilder<'a> {
    pub fn new(program: &'a mut Program) -> Self {
        ProgramBuilder { program }
    }

    pub fn write8(&mut self, data: u8) {
        self.program.code.push(data);
    }

    pub fn write32(&mut self, data: i32) {
        self.program.code.extend_from_slice(&data.to_le_bytes());
    }

    /// Current output head, optionally adjusted backwards.
    pub fn head(&self, adjust: i32) -> u32 {
        debug_assert!(adjust <= 0);
        (self.program.code.len() as i32 + adjust) as u32
    }

    /// Patch a previously emitted 32-bit operand.
    pub fn apply_fixup(&mut self, index: u32, value: i32) {
        let index = index as usize;
        self.program.code[index..index + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Index of `name` in the syscall table, appending it when new.
    pub fn add_syscall(&mut self, name: &str) -> i32 {
        if let Some(i) = self.program.syscall_index(name) {
            return i as i32;
        }
        self.program.syscalls.push(name.to_string());
        self.program.syscalls.len() as i32 - 1
    }

    pub fn add_global(&mut self, name: &str, offset: i32) {
        self.program.globals.push(nano_core::Identifier {
            name: name.to_string(),
            offset,
        });
    }

    fn set_line(&mut self, token: Option<&Token>) {
        if let Some(token) = token {
            let head = self.head(0);
            self.program.line_table.insert(head, token.line);
        }
    }

    pub fn add_string(&mut self, value: &str) -> i32 {
        self.program.strings.push(value.to_string());
        self.program.strings.len() as i32 - 1
    }
}

fn binop_opcode(op: TokenKind) -> Option<Opcode> {
    Some(match op {
        TokenKind::Add => Opcode::Add,
        TokenKind::Sub => Opcode::Sub,
        TokenKind::Mul => Opcode::Mul,
        TokenKind::Div => Opcode::Div,
        TokenKind::Mod => Opcode::Mod,
        TokenKind::And => Opcode::And,
        TokenKind::Or => Opcode::Or,
        TokenKind::Not => Opcode::Not,
        TokenKind::Eq => Opcode::Eq,
        TokenKind::Lt => Opcode::Lt,
        TokenKind::Gt => Opcode::Gt,
        TokenKind::Leq => Opcode::Leq,
        TokenKind::Geq => Opcode::Geq,
        _ => return None,
    })
}

/// AST-to-bytecode pass.
pub struct Codegen<'a> {
    ast: &'a Ast,
    builder: ProgramBuilder<'a>,
    /// Function name -> emitted code start.
    func_map: HashMap<String, i32>,
    /// Call and function-reference operands awaiting a target address.
    call_fixups: Vec<(String, u32, LineInfo)>,
    /// Frame size (args + locals) of the function being emitted.
    frame_size: i32,
}

impl<'a> Codegen<'a> {
    pub fn new(ast: &'a Ast, program: &'a mut Program) -> Self {
        Codegen {
            ast,
            builder: ProgramBuilder::new(program),
            func_map: HashMap::new(),
            call_fixups: Vec::new(),
            frame_size: 0,
        }
    }

    pub fn run(mut self) -> Result<()> {
        for &id in self.ast.top_level() {
            match self.ast.get(id) {
                Node::DeclFunc { .. } => self.gen_func(id)?,
                Node::DeclVar {
                    scope: Scope::Global,
                    is_const,
                    name,
                    offset,
                    ..
                } => {
                    // consts are inlined away and own no global slot
                    if !is_const {
                        let name = name.text.clone();
                        self.builder.add_global(&name, *offset);
                    }
                }
                _ => {}
            }
        }

        // patch direct calls and function references
        for (name, operand, line) in std::mem::take(&mut self.call_fixups) {
            let target = *self
                .func_map
                .get(&name)
                .ok_or_else(|| errors::internal(line, "call target was never emitted"))?;
            self.builder.apply_fixup(operand, target);
        }
        Ok(())
    }

    // ---- emit helpers ----

    fn emit0(&mut self, op: Opcode, token: Option<&Token>) {
        debug_assert_eq!(op.num_operands(), 0);
        self.builder.set_line(token);
        self.builder.write8(op as u8);
    }

    fn emit1(&mut self, op: Opcode, o1: i32, token: Option<&Token>) {
        debug_assert_eq!(op.num_operands(), 1);
        self.builder.set_line(token);
        self.builder.write8(op as u8);
        self.builder.write32(o1);
    }

    fn emit2(&mut self, op: Opcode, o1: i32, o2: i32, token: Option<&Token>) {
        debug_assert_eq!(op.num_operands(), 2);
        self.builder.set_line(token);
        self.builder.write8(op as u8);
        self.builder.write32(o1);
        self.builder.write32(o2);
    }

    /// Operand offset of the most recently written 32-bit value.
    fn last_operand(&self) -> u32 {
        self.builder.head(-4)
    }

    fn pos(&self) -> i32 {
        self.builder.head(0) as i32
    }

    // ---- declaration access ----

    fn var_decl(&self, id: NodeId, at: LineInfo) -> Result<(Scope, i32, bool)> {
        match self.ast.get(id) {
            Node::DeclVar {
                scope,
                offset,
                is_const,
                ..
            } => Ok((*scope, *offset, *is_const)),
            _ => Err(errors::internal(at, "expected a variable declaration")),
        }
    }

    fn set_decl(&mut self, decl: NodeId, token: Option<&Token>) -> Result<()> {
        let at = token.map(|t| t.line).unwrap_or(LineInfo::INVALID);
        let (scope, offset, is_const) = self.var_decl(decl, at)?;
        if is_const {
            return Err(errors::internal(at, "store to a const"));
        }
        match scope {
            Scope::Local | Scope::Arg => self.emit1(Opcode::Setv, offset, token),
            Scope::Global => self.emit1(Opcode::Setg, offset, token),
        }
        Ok(())
    }

    fn get_decl(&mut self, decl: NodeId, token: Option<&Token>) -> Result<()> {
        let at = token.map(|t| t.line).unwrap_or(LineInfo::INVALID);
        let (scope, offset, is_const) = self.var_decl(decl, at)?;
        if is_const {
            return Err(errors::internal(at, "load of a const"));
        }
        match scope {
            Scope::Local | Scope::Arg => self.emit1(Opcode::Getv, offset, token),
            Scope::Global => self.emit1(Opcode::Getg, offset, token),
        }
        Ok(())
    }

    /// Push a reference to a function or syscall as a value.
    fn get_func(&mut self, decl: NodeId, token: &Token) -> Result<()> {
        match self.ast.get(decl) {
            Node::DeclFunc {
                name,
                is_syscall: true,
                ..
            } => {
                let index = self.builder.add_syscall(name);
                self.emit1(Opcode::NewScall, index, Some(token));
                Ok(())
            }
            Node::DeclFunc { name, .. } => {
                let name = name.clone();
                self.emit1(Opcode::NewFunc, 0, Some(token));
                let operand = self.last_operand();
                self.call_fixups.push((name, operand, token.line));
                Ok(())
            }
            _ => Err(errors::internal(token.line, "expected a function declaration")),
        }
    }

    // ---- functions ----

    fn gen_func(&mut self, id: NodeId) -> Result<()> {
        let (name, token, is_syscall, args_len, stack_size, body) = match self.ast.get(id) {
            Node::DeclFunc {
                name,
                token,
                is_syscall,
                args,
                stack_size,
                body,
                ..
            } => (
                name.clone(),
                token.clone(),
                *is_syscall,
                args.len() as i32,
                *stack_size,
                *body,
            ),
            _ => return Ok(()),
        };

        // syscalls live in the syscall table, not the code stream
        if is_syscall {
            return Ok(());
        }

        let code_start = self.pos();
        self.func_map.insert(name.clone(), code_start);
        self.frame_size = args_len + stack_size;

        if name == "@init" {
            self.gen_init(body)?;
        } else {
            if stack_size > 0 {
                self.emit1(Opcode::Locals, stack_size, token.as_ref());
            }
            let mut ends_in_return = false;
            if let Some(body) = body {
                self.gen_stmt(body)?;
                if let Node::Block { nodes } = self.ast.get(body) {
                    ends_in_return = nodes
                        .last()
                        .is_some_and(|&n| matches!(self.ast.get(n), Node::StmtReturn { .. }));
                }
            }
            if !ends_in_return {
                self.emit1(Opcode::NewInt, 0, None);
                self.emit1(Opcode::Ret, self.frame_size, None);
            }
        }

        let code_end = self.pos();
        if let Some(func) = self
            .builder
            .program
            .functions
            .iter_mut()
            .find(|f| f.name == name)
        {
            func.code_start = code_start as u32;
            func.code_end = code_end as u32;
        }
        Ok(())
    }

    /// `@init` prologue: size the global table, allocate every global array
    /// into its slot, then run the synthesized initializer statements.
    fn gen_init(&mut self, body: Option<NodeId>) -> Result<()> {
        let globals: Vec<NodeId> = self
            .ast
            .top_level()
            .iter()
            .copied()
            .filter(|&n| self.ast.is_var_decl(n) && !self.ast.is_const_decl(n))
            .collect();

        self.emit1(Opcode::Globals, globals.len() as i32, None);

        for decl in globals {
            if self.ast.is_array_decl(decl) {
                let count = self.ast.array_count(decl);
                let (name, offset) = match self.ast.get(decl) {
                    Node::DeclVar { name, offset, .. } => (name.clone(), *offset),
                    _ => continue,
                };
                self.emit1(Opcode::NewAry, count, Some(&name));
                self.emit1(Opcode::Setg, offset, Some(&name));
            }
        }

        if let Some(body) = body {
            self.gen_stmt(body)?;
        }

        self.emit1(Opcode::NewInt, 0, None);
        self.emit1(Opcode::Ret, 0, None);
        Ok(())
    }

    // ---- statements ----

    fn gen_stmt(&mut self, id: NodeId) -> Result<()> {
        match self.ast.get(id) {
            Node::Block { nodes } => {
                for n in nodes.clone() {
                    self.gen_stmt(n)?;
                }
                Ok(())
            }
            Node::StmtIf {
                token,
                expr,
                then_block,
                else_block,
            } => {
                let token = token.clone();
                let (expr, then_block, else_block) = (*expr, *then_block, *else_block);

                self.gen_expr(expr)?;
                self.emit1(Opcode::Fjmp, 0, Some(&token));
                let to_else = self.last_operand();

                self.gen_stmt(then_block)?;

                match else_block {
                    None => {
                        let end = self.pos();
                        self.builder.apply_fixup(to_else, end);
                    }
                    Some(else_block) => {
                        self.emit1(Opcode::Jmp, 0, None);
                        let to_end = self.last_operand();

                        let else_pos = self.pos();
                        self.gen_stmt(else_block)?;
                        let end = self.pos();

                        self.builder.apply_fixup(to_else, else_pos);
                        self.builder.apply_fixup(to_end, end);
                    }
                }
                Ok(())
            }
            Node::StmtWhile { token, expr, body } => {
                let token = token.clone();
                let (expr, body) = (*expr, *body);

                self.emit1(Opcode::Jmp, 0, Some(&token));
                let to_cond = self.last_operand();

                let loop_start = self.pos();
                if let Some(body) = body {
                    self.gen_stmt(body)?;
                }

                let cond_pos = self.pos();
                self.gen_expr(expr)?;
                self.emit1(Opcode::Tjmp, 0, Some(&token));
                let to_loop = self.last_operand();

                self.builder.apply_fixup(to_loop, loop_start);
                self.builder.apply_fixup(to_cond, cond_pos);
                Ok(())
            }
            Node::StmtFor {
                token,
                name,
                decl,
                start,
                end,
                body,
                ..
            } => {
                let (token, name) = (token.clone(), name.clone());
                let (start, end, body) = (*start, *end, *body);
                let decl =
                    decl.ok_or_else(|| errors::internal(token.line, "unresolved loop variable"))?;

                self.gen_expr(start)?;
                self.set_decl(decl, Some(&name))?;

                self.emit1(Opcode::Jmp, 0, Some(&token));
                let to_cond = self.last_operand();

                let loop_start = self.pos();
                self.gen_stmt(body)?;

                // increment the loop variable
                self.get_decl(decl, Some(&token))?;
                self.emit1(Opcode::NewInt, 1, Some(&token));
                self.emit0(Opcode::Add, Some(&token));
                self.set_decl(decl, Some(&token))?;

                // loop while the variable is below the end bound
                let cond_pos = self.pos();
                self.get_decl(decl, Some(&token))?;
                self.gen_expr(end)?;
                self.emit0(Opcode::Lt, Some(&token));
                self.emit1(Opcode::Tjmp, 0, Some(&token));
                let to_loop = self.last_operand();

                self.builder.apply_fixup(to_loop, loop_start);
                self.builder.apply_fixup(to_cond, cond_pos);
                Ok(())
            }
            Node::StmtReturn { token, expr } => {
                let token = token.clone();
                match expr {
                    Some(expr) => self.gen_expr(*expr)?,
                    None => self.emit0(Opcode::NewNone, Some(&token)),
                }
                self.emit1(Opcode::Ret, self.frame_size, Some(&token));
                Ok(())
            }
            Node::StmtAssignVar { name, expr, decl } => {
                let name = name.clone();
                let expr = *expr;
                let decl =
                    decl.ok_or_else(|| errors::internal(name.line, "unresolved assignment"))?;
                self.gen_expr(expr)?;
                self.set_decl(decl, Some(&name))
            }
            Node::StmtAssignArray {
                name,
                index,
                expr,
                decl,
            } => {
                let name = name.clone();
                let (index, expr) = (*index, *expr);
                let decl =
                    decl.ok_or_else(|| errors::internal(name.line, "unresolved array store"))?;
                self.gen_expr(expr)?;
                self.gen_expr(index)?;
                self.get_decl(decl, Some(&name))?;
                self.emit0(Opcode::Seta, Some(&name));
                Ok(())
            }
            Node::StmtAssignMember { name, .. } => {
                Err(errors::internal(name.line, "member stores are not lowered"))
            }
            Node::StmtCall { expr } => {
                let expr = *expr;
                let token = match self.ast.get(expr) {
                    Node::ExpCall { token, .. } => token.clone(),
                    _ => return Err(errors::internal(LineInfo::INVALID, "malformed call statement")),
                };
                self.gen_expr(expr)?;
                // discard the call's result
                self.emit1(Opcode::Pop, 1, Some(&token));
                Ok(())
            }
            Node::DeclVar {
                name,
                scope: Scope::Local,
                is_const,
                expr,
                size,
                ..
            } => {
                let name = name.clone();
                let (is_const, expr, is_array) = (*is_const, *expr, size.is_some());
                if is_const {
                    return Ok(());
                }
                if is_array {
                    let count = self.ast.array_count(id);
                    self.emit1(Opcode::NewAry, count, Some(&name));
                    self.set_decl(id, Some(&name))?;
                } else if let Some(expr) = expr {
                    self.gen_expr(expr)?;
                    self.set_decl(id, Some(&name))?;
                }
                Ok(())
            }
            node => Err(errors::internal(
                LineInfo::INVALID,
                &format!("unexpected statement node {:?}", node),
            )),
        }
    }

    // ---- expressions ----

    fn gen_expr(&mut self, id: NodeId) -> Result<()> {
        match self.ast.get(id) {
            Node::ExpLitInt { token, value } => {
                let (token, value) = (token.clone(), *value);
                self.emit1(Opcode::NewInt, value, token.as_ref());
                Ok(())
            }
            Node::ExpLitFloat { token, value } => {
                let (token, value) = (token.clone(), *value);
                self.emit1(Opcode::NewFlt, value.to_bits() as i32, token.as_ref());
                Ok(())
            }
            Node::ExpLitStr { token, value } => {
                let token = token.clone();
                let index = self.builder.add_string(&value.clone());
                self.emit1(Opcode::NewStr, index, token.as_ref());
                Ok(())
            }
            Node::ExpNone { token } => {
                let token = token.clone();
                self.emit0(Opcode::NewNone, token.as_ref());
                Ok(())
            }
            Node::ExpIdent { name, decl } => {
                let name = name.clone();
                let decl =
                    decl.ok_or_else(|| errors::internal(name.line, "unresolved identifier"))?;
                if self.ast.is_func_decl(decl) {
                    self.get_func(decl, &name)
                } else {
                    self.get_decl(decl, Some(&name))
                }
            }
            Node::ExpDeref { name, index, decl } => {
                let name = name.clone();
                let index = *index;
                let decl =
                    decl.ok_or_else(|| errors::internal(name.line, "unresolved subscript"))?;
                self.gen_expr(index)?;
                self.get_decl(decl, Some(&name))?;
                self.emit0(Opcode::Geta, Some(&name));
                Ok(())
            }
            Node::ExpBinOp {
                op, token, left, right,
            } => {
                let token = token.clone();
                let op = *op;
                let (left, right) = (*left, *right);
                self.gen_expr(left)?;
                self.gen_expr(right)?;
                let opcode = binop_opcode(op)
                    .ok_or_else(|| errors::internal(token.line, "unknown binary operator"))?;
                self.emit0(opcode, Some(&token));
                Ok(())
            }
            Node::ExpUnaryOp { op, child } => {
                let op = op.clone();
                let child = *child;
                self.gen_expr(child)?;
                match op.kind {
                    TokenKind::Sub => self.emit0(Opcode::Neg, Some(&op)),
                    TokenKind::Not => self.emit0(Opcode::Not, Some(&op)),
                    _ => return Err(errors::internal(op.line, "unknown unary operator")),
                }
                Ok(())
            }
            Node::ExpCall { token, callee, args } => {
                let token = token.clone();
                let callee = *callee;
                let args = args.clone();
                let num_args = args.len() as i32;

                for arg in args {
                    self.gen_expr(arg)?;
                }

                // direct dispatch when the callee names a function
                if let Node::ExpIdent {
                    name,
                    decl: Some(decl),
                } = self.ast.get(callee)
                {
                    let name = name.clone();
                    let decl = *decl;
                    if let Node::DeclFunc {
                        name: fname,
                        is_syscall,
                        ..
                    } = self.ast.get(decl)
                    {
                        let fname = fname.clone();
                        if *is_syscall {
                            let index = self.builder.add_syscall(&fname);
                            self.emit2(Opcode::Scall, num_args, index, Some(&name));
                        } else {
                            self.emit2(Opcode::Call, num_args, 0, Some(&token));
                            let operand = self.last_operand();
                            self.call_fixups.push((fname, operand, token.line));
                        }
                        return Ok(());
                    }
                }

                // indirect call through a function or syscall value
                self.gen_expr(callee)?;
                self.emit1(Opcode::Icall, num_args, Some(&token));
                Ok(())
            }
            Node::ExpMember { name, .. } => {
                Err(errors::internal(name.line, "member loads are not lowered"))
            }
            node => Err(errors::internal(
                LineInfo::INVALID,
                &format!("unexpected expression node {:?}", node),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::pre_codegen::run_pre_codegen;
    use crate::sema::run_sema;
    use nano_core::SourceManager;

    fn compile(source: &str) -> Program {
        let mut lexer = Lexer::new();
        lexer.lex(source, 0).unwrap();
        let mut stream = lexer.into_stream();
        let mut ast = Ast::new();
        let mut sources = SourceManager::new();
        sources.load_from_string(source);
        Parser::new(&mut stream, &mut ast, &mut sources, 0)
            .parse()
            .unwrap();
        run_sema(&mut ast).unwrap();
        let mut program = Program::new();
        run_pre_codegen(&mut ast, &mut program).unwrap();
        Codegen::new(&ast, &mut program).run().unwrap();
        program
    }

    /// Decode `(opcode, operands)` tuples from a code range.
    fn decode(program: &Program, start: u32, end: u32) -> Vec<(Opcode, Vec<i32>)> {
        let mut out = Vec::new();
        let mut pc = start as usize;
        while pc < end as usize {
            let op = Opcode::try_from(program.code[pc]).expect("valid opcode");
            pc += 1;
            let mut operands = Vec::new();
            for _ in 0..op.num_operands() {
                let bytes: [u8; 4] = program.code[pc..pc + 4].try_into().unwrap();
                operands.push(i32::from_le_bytes(bytes));
                pc += 4;
            }
            out.push((op, operands));
        }
        out
    }

    #[test]
    fn function_ranges_cover_their_bytes() {
        let program = compile(
            "function f(a)\n  return a\nend\nfunction main()\n  return f(1)\nend\n",
        );
        for func in &program.functions {
            assert!(func.code_end > func.code_start, "{} has an empty range", func.name);
            assert!(func.code_end as usize <= program.code.len());
            // ranges decode cleanly from start to end
            let ins = decode(&program, func.code_start, func.code_end);
            assert!(!ins.is_empty());
        }
    }

    #[test]
    fn jump_targets_stay_inside_the_code() {
        let program = compile(
            "function main()\n  var s = 0\n  for (i = 0 to 10)\n    if (i % 2)\n      s += i\n    end\n  end\n  while (s > 100)\n    s = s - 1\n  end\n  return s\nend\n",
        );
        let code_size = program.code.len() as i32;
        for func in &program.functions {
            for (op, operands) in decode(&program, func.code_start, func.code_end) {
                match op {
                    Opcode::Jmp | Opcode::Tjmp | Opcode::Fjmp => {
                        assert!(operands[0] >= 0 && operands[0] < code_size);
                    }
                    Opcode::Call => {
                        assert!(operands[1] >= 0 && operands[1] < code_size);
                    }
                    _ => {}
                }
            }
        }
    }

    #[test]
    fn fallthrough_gets_a_default_return() {
        let program = compile("function main()\n  var x = 1\nend\n");
        let func = program.function_find("main").unwrap();
        let ins = decode(&program, func.code_start, func.code_end);
        let tail: Vec<Opcode> = ins.iter().rev().take(2).map(|(op, _)| *op).collect();
        assert_eq!(tail, vec![Opcode::Ret, Opcode::NewInt]);
        // RET drops the argument and local slots
        assert_eq!(ins.last().unwrap().1[0], 1);
    }

    #[test]
    fn direct_call_carries_argc_and_fixed_up_target() {
        let program = compile(
            "function callee(a, b)\n  return a\nend\nfunction main()\n  return callee(1, 2)\nend\n",
        );
        let main = program.function_find("main").unwrap();
        let callee = program.function_find("callee").unwrap();
        let ins = decode(&program, main.code_start, main.code_end);
        let call = ins
            .iter()
            .find(|(op, _)| *op == Opcode::Call)
            .expect("call emitted");
        assert_eq!(call.1[0], 2);
        assert_eq!(call.1[1], callee.code_start as i32);
    }

    #[test]
    fn syscall_emits_table_index_and_argc() {
        let mut lexer = Lexer::new();
        let source = "function main()\n  return min(1, 2)\nend\n";
        lexer.lex(source, 0).unwrap();
        let mut stream = lexer.into_stream();
        let mut ast = Ast::new();
        let mut sources = SourceManager::new();
        sources.load_from_string(source);

        // register the syscall the way the compile session does
        let args = (0..2)
            .map(|i| {
                ast.alloc(Node::DeclVar {
                    name: Token::with_text(TokenKind::Ident, format!("arg{}", i), LineInfo::INVALID),
                    scope: Scope::Arg,
                    expr: None,
                    size: None,
                    is_const: false,
                    offset: 0,
                })
            })
            .collect();
        let decl = ast.alloc(Node::DeclFunc {
            token: None,
            name: "min".to_string(),
            is_syscall: true,
            is_varargs: false,
            args,
            body: None,
            stack_size: 0,
        });
        ast.push_top_level(decl);

        Parser::new(&mut stream, &mut ast, &mut sources, 0)
            .parse()
            .unwrap();
        run_sema(&mut ast).unwrap();
        let mut program = Program::new();
        run_pre_codegen(&mut ast, &mut program).unwrap();
        Codegen::new(&ast, &mut program).run().unwrap();

        let index = program.syscall_index("min").unwrap() as i32;
        let main = program.function_find("main").unwrap();
        let ins = decode(&program, main.code_start, main.code_end);
        let scall = ins
            .iter()
            .find(|(op, _)| *op == Opcode::Scall)
            .expect("syscall emitted");
        assert_eq!(scall.1, vec![2, index]);
    }

    #[test]
    fn string_literals_land_in_the_pool() {
        let program = compile("function main()\n  return \"hi\"\nend\n");
        assert_eq!(program.strings, vec!["hi".to_string()]);
        let main = program.function_find("main").unwrap();
        let ins = decode(&program, main.code_start, main.code_end);
        assert!(ins.iter().any(|(op, o)| *op == Opcode::NewStr && o[0] == 0));
    }

    #[test]
    fn globals_table_skips_consts() {
        let program = compile("const k = 1\nvar g = 2\n");
        assert_eq!(program.globals.len(), 1);
        assert_eq!(program.globals[0].name, "g");
    }

    #[test]
    fn init_prologue_sizes_globals_and_allocates_arrays() {
        let program = compile("var a = 1\nvar data[3]\n");
        let init = program.function_find("@init").unwrap();
        let ins = decode(&program, init.code_start, init.code_end);
        assert_eq!(ins[0].0, Opcode::Globals);
        assert_eq!(ins[0].1[0], 2);
        assert!(ins
            .iter()
            .any(|(op, o)| *op == Opcode::NewAry && o[0] == 3));
    }

    #[test]
    fn line_table_points_into_the_source() {
        let program = compile("function main()\n  return 7\nend\n");
        let main = program.function_find("main").unwrap();
        let line = program.get_line(main.code_start);
        assert_eq!(line.file, 0);
        assert_eq!(line.line, 2);
    }
}
