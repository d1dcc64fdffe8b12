//! Pre-codegen lowering: `@init` synthesis, frame offset assignment, and
//! gathering the program's function and syscall tables.
//!
//! Passes after this one must not reshape the AST.

use nano_core::{Function, Identifier, Program};

use crate::ast::{Ast, Node, NodeId, Scope};
use crate::errors::Result;
use crate::token::{Token, TokenKind};

pub fn run_pre_codegen(ast: &mut Ast, program: &mut Program) -> Result<()> {
    synthesize_init(ast);
    assign_offsets(ast);
    gather_functions(ast, program);
    Ok(())
}

// ---------------------------------------------------------------------------
// @init synthesis
// ---------------------------------------------------------------------------

/// Build the `@init` function: every non-const global initializer becomes an
/// assignment statement executed before user code. Scalars assign their
/// folded initializer; array initializer items become one indexed store per
/// item. Array allocation itself is emitted by codegen's `@init` prologue.
fn synthesize_init(ast: &mut Ast) {
    let mut body = Vec::new();

    for decl in ast.top_level().to_vec() {
        let (name, expr, is_array) = match ast.get(decl) {
            Node::DeclVar {
                name,
                scope: Scope::Global,
                is_const: false,
                expr: Some(expr),
                size,
                ..
            } => (name.clone(), *expr, size.is_some()),
            _ => continue,
        };

        if is_array {
            let items = match ast.get(expr) {
                Node::ExpArrayInit { items } => items.clone(),
                _ => continue,
            };
            for (i, item) in items.into_iter().enumerate() {
                let index = ast.alloc(Node::ExpLitInt {
                    token: None,
                    value: i as i32,
                });
                let value = ast.alloc(literal_from_token(&item));
                body.push(ast.alloc(Node::StmtAssignArray {
                    name: name.clone(),
                    index,
                    expr: value,
                    decl: Some(decl),
                }));
            }
        } else {
            body.push(ast.alloc(Node::StmtAssignVar {
                name: name.clone(),
                expr,
                decl: Some(decl),
            }));
        }
    }

    let block = ast.alloc(Node::Block { nodes: body });
    let init = ast.alloc(Node::DeclFunc {
        token: None,
        name: "@init".to_string(),
        is_syscall: false,
        is_varargs: false,
        args: Vec::new(),
        body: Some(block),
        stack_size: 0,
    });
    ast.push_top_level(init);
}

/// Literal expression node for an array-initializer token.
fn literal_from_token(item: &Token) -> Node {
    match item.kind {
        TokenKind::Int => Node::ExpLitInt {
            token: Some(item.clone()),
            value: item.int_value,
        },
        TokenKind::Float => Node::ExpLitFloat {
            token: Some(item.clone()),
            value: item.float_value,
        },
        TokenKind::String => Node::ExpLitStr {
            token: Some(item.clone()),
            value: item.text.clone(),
        },
        _ => Node::ExpNone {
            token: Some(item.clone()),
        },
    }
}

// ---------------------------------------------------------------------------
// offset assignment
// ---------------------------------------------------------------------------

/// Assign global offsets to non-const globals and frame offsets to every
/// argument and local. Locals are numbered block-scoped so sibling scopes
/// reuse slots; `stack_size` is the high-water mark. The last argument sits
/// at offset -1, the first at -N.
fn assign_offsets(ast: &mut Ast) {
    let mut global_offset = 0;
    for id in ast.top_level().to_vec() {
        match ast.get(id) {
            Node::DeclVar {
                scope: Scope::Global,
                is_const: false,
                ..
            } => {
                if let Node::DeclVar { offset, .. } = ast.get_mut(id) {
                    *offset = global_offset;
                }
                global_offset += 1;
            }
            Node::DeclFunc {
                is_syscall: false, ..
            } => assign_function_offsets(ast, id),
            _ => {}
        }
    }
}

fn assign_function_offsets(ast: &mut Ast, func: NodeId) {
    let (args, body) = match ast.get(func) {
        Node::DeclFunc { args, body, .. } => (args.clone(), *body),
        _ => return,
    };

    let num_args = args.len() as i32;
    for (i, &arg) in args.iter().enumerate() {
        if let Node::DeclVar { offset, .. } = ast.get_mut(arg) {
            *offset = i as i32 - num_args;
        }
    }

    let mut frame = FrameOffsets {
        levels: vec![0],
        stack_size: 0,
    };
    if let Some(body) = body {
        frame.walk(ast, body);
    }
    if let Node::DeclFunc { stack_size, .. } = ast.get_mut(func) {
        *stack_size = frame.stack_size;
    }
}

struct FrameOffsets {
    levels: Vec<i32>,
    stack_size: i32,
}

impl FrameOffsets {
    fn assign(&mut self, ast: &mut Ast, decl: NodeId) {
        let next = *self.levels.last().expect("offset level");
        if let Node::DeclVar { offset, .. } = ast.get_mut(decl) {
            *offset = next;
        }
        *self.levels.last_mut().expect("offset level") = next + 1;
        self.stack_size = self.stack_size.max(next + 1);
    }

    fn walk(&mut self, ast: &mut Ast, id: NodeId) {
        match ast.get(id).clone() {
            Node::Block { nodes } => {
                let saved = *self.levels.last().expect("offset level");
                self.levels.push(saved);
                for n in nodes {
                    self.walk(ast, n);
                }
                self.levels.pop();
            }
            Node::DeclVar {
                scope: Scope::Local,
                is_const: false,
                ..
            } => {
                self.assign(ast, id);
            }
            Node::StmtIf {
                then_block,
                else_block,
                ..
            } => {
                self.walk(ast, then_block);
                if let Some(else_block) = else_block {
                    self.walk(ast, else_block);
                }
            }
            Node::StmtWhile { body, .. } => {
                if let Some(body) = body {
                    self.walk(ast, body);
                }
            }
            Node::StmtFor {
                var_decl, body, ..
            } => {
                // the synthesized loop variable occupies a slot scoped to
                // the loop itself
                let saved = *self.levels.last().expect("offset level");
                self.levels.push(saved);
                if let Some(var_decl) = var_decl {
                    self.assign(ast, var_decl);
                }
                self.walk(ast, body);
                self.levels.pop();
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// function and syscall tables
// ---------------------------------------------------------------------------

/// Move every non-syscall function into the program's function table with
/// its argument and local layouts; syscall declarations go to the syscall
/// name table instead. Code ranges are filled in by codegen.
fn gather_functions(ast: &Ast, program: &mut Program) {
    for &id in ast.top_level() {
        let (name, is_syscall, args, body) = match ast.get(id) {
            Node::DeclFunc {
                name,
                is_syscall,
                args,
                body,
                ..
            } => (name.clone(), *is_syscall, args.clone(), *body),
            _ => continue,
        };

        if is_syscall {
            if !program.syscalls.iter().any(|s| *s == name) {
                program.syscalls.push(name);
            }
            continue;
        }

        let mut func = Function {
            name,
            ..Function::default()
        };
        for arg in args {
            if let Node::DeclVar { name, offset, .. } = ast.get(arg) {
                func.args.push(Identifier {
                    name: name.text.clone(),
                    offset: *offset,
                });
            }
        }
        if let Some(body) = body {
            collect_locals(ast, body, &mut func.locals);
        }
        program.functions.push(func);
    }
}

fn collect_locals(ast: &Ast, id: NodeId, out: &mut Vec<Identifier>) {
    match ast.get(id) {
        Node::Block { nodes } => {
            for &n in nodes {
                collect_locals(ast, n, out);
            }
        }
        Node::DeclVar {
            name,
            scope: Scope::Local,
            is_const: false,
            offset,
            ..
        } => out.push(Identifier {
            name: name.text.clone(),
            offset: *offset,
        }),
        Node::StmtIf {
            then_block,
            else_block,
            ..
        } => {
            collect_locals(ast, *then_block, out);
            if let Some(else_block) = else_block {
                collect_locals(ast, *else_block, out);
            }
        }
        Node::StmtWhile { body: Some(body), .. } => collect_locals(ast, *body, out),
        Node::StmtFor {
            var_decl, body, ..
        } => {
            if let Some(var_decl) = var_decl {
                collect_locals(ast, *var_decl, out);
            }
            collect_locals(ast, *body, out);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::sema::run_sema;
    use nano_core::SourceManager;

    fn lower(source: &str) -> (Ast, Program) {
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
        (ast, program)
    }

    fn find_func<'a>(program: &'a Program, name: &str) -> &'a Function {
        program.function_find(name).expect("function in table")
    }

    #[test]
    fn init_function_is_synthesized() {
        let (ast, program) = lower("var a = 1\nvar b = 2\n");
        assert!(program.function_find("@init").is_some());
        let init = ast
            .top_level()
            .iter()
            .copied()
            .find(|&n| ast.decl_name(n) == Some("@init"))
            .unwrap();
        match ast.get(init) {
            Node::DeclFunc { body: Some(body), .. } => match ast.get(*body) {
                Node::Block { nodes } => assert_eq!(nodes.len(), 2),
                n => panic!("expected block, got {:?}", n),
            },
            n => panic!("expected function, got {:?}", n),
        }
    }

    #[test]
    fn array_initializer_becomes_indexed_stores() {
        let (ast, _) = lower("var data[4] = 7, 8, 9\n");
        let init = ast
            .top_level()
            .iter()
            .copied()
            .find(|&n| ast.decl_name(n) == Some("@init"))
            .unwrap();
        let body = match ast.get(init) {
            Node::DeclFunc { body: Some(body), .. } => *body,
            n => panic!("expected function, got {:?}", n),
        };
        let nodes = match ast.get(body) {
            Node::Block { nodes } => nodes.clone(),
            n => panic!("expected block, got {:?}", n),
        };
        assert_eq!(nodes.len(), 3);
        for (i, &n) in nodes.iter().enumerate() {
            match ast.get(n) {
                Node::StmtAssignArray { index, .. } => {
                    assert!(matches!(
                        ast.get(*index),
                        Node::ExpLitInt { value, .. } if *value == i as i32
                    ));
                }
                n => panic!("expected array store, got {:?}", n),
            }
        }
    }

    #[test]
    fn argument_offsets_count_back_from_the_frame() {
        let (_, program) = lower("function f(a, b, c)\n  return a\nend\n");
        let func = find_func(&program, "f");
        let offsets: Vec<i32> = func.args.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![-3, -2, -1]);
    }

    #[test]
    fn sibling_scopes_share_slots() {
        let (_, program) = lower(
            "function f()\n  if (1)\n    var a\n  else\n    var b\n  end\nend\n",
        );
        let func = find_func(&program, "f");
        assert_eq!(func.locals.len(), 2);
        assert_eq!(func.locals[0].offset, func.locals[1].offset);
    }

    #[test]
    fn stack_size_is_the_high_water_mark() {
        let (ast, _) = lower(
            "function f()\n  var a\n  if (1)\n    var b\n    var c\n  end\n  var d\nend\n",
        );
        let func = ast
            .top_level()
            .iter()
            .copied()
            .find(|&n| ast.decl_name(n) == Some("f"))
            .unwrap();
        match ast.get(func) {
            // a=0, then {b=1, c=2}, then d=1; the peak is 3
            Node::DeclFunc { stack_size, .. } => assert_eq!(*stack_size, 3),
            n => panic!("expected function, got {:?}", n),
        }
    }

    #[test]
    fn globals_receive_increasing_offsets_and_consts_none() {
        let (ast, program) = lower("const k = 5\nvar a\nvar b\n");
        let mut offsets = Vec::new();
        for &id in ast.top_level() {
            if let Node::DeclVar {
                is_const: false,
                offset,
                ..
            } = ast.get(id)
            {
                offsets.push(*offset);
            }
        }
        assert_eq!(offsets, vec![0, 1]);
        // @init exists even with no initializers
        assert!(program.function_find("@init").is_some());
    }

    #[test]
    fn loop_variable_gets_a_frame_slot() {
        let (_, program) = lower("function f()\n  for (i = 0 to 3)\n  end\nend\n");
        let func = find_func(&program, "f");
        assert_eq!(func.locals.len(), 1);
        assert_eq!(func.locals[0].name, "i");
    }
}
