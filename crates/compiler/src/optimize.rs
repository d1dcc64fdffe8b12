//! AST-level optimizations, run only when the session enables them.
//!
//! Three passes, in order: dead code after `return`, integer constant
//! folding, unreachable branch pruning. All of them preserve observable
//! behavior: folding never crosses a call and pruning never drops a
//! side-effecting condition.

use crate::ast::{Ast, Node, NodeId};
use crate::errors::{self, Result};
use crate::token::TokenKind;

pub fn run_optimize(ast: &mut Ast) -> Result<()> {
    prune_after_return(ast);
    fold_constants(ast)?;
    prune_dead_branches(ast);
    Ok(())
}

// ---------------------------------------------------------------------------
// dead code after return
// ---------------------------------------------------------------------------

/// Statements following a `return` in the same block can never execute.
fn prune_after_return(ast: &mut Ast) {
    for id in 0..ast.len() as u32 {
        let id = NodeId(id);
        let cut = match ast.get(id) {
            Node::Block { nodes } => nodes
                .iter()
                .position(|&n| matches!(ast.get(n), Node::StmtReturn { .. }))
                .map(|i| i + 1),
            _ => None,
        };
        if let Some(cut) = cut {
            if let Node::Block { nodes } = ast.get_mut(id) {
                nodes.truncate(cut);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// constant folding
// ---------------------------------------------------------------------------

/// Fold integer operator trees bottom-up, rewriting folded nodes in place so
/// the literal propagates into `if`/`while` conditions, `return` values and
/// assignment right-hand sides. Division or modulo by a literal zero is a
/// compile error here, before the program can ever run.
fn fold_constants(ast: &mut Ast) -> Result<()> {
    for func in ast.top_level().to_vec() {
        if let Node::DeclFunc { body: Some(body), .. } = ast.get(func) {
            fold_stmt(ast, *body)?;
        }
    }
    Ok(())
}

fn fold_stmt(ast: &mut Ast, id: NodeId) -> Result<()> {
    match ast.get(id).clone() {
        Node::Block { nodes } => {
            for n in nodes {
                fold_stmt(ast, n)?;
            }
        }
        Node::StmtIf {
            expr,
            then_block,
            else_block,
            ..
        } => {
            fold_expr(ast, expr)?;
            fold_stmt(ast, then_block)?;
            if let Some(else_block) = else_block {
                fold_stmt(ast, else_block)?;
            }
        }
        Node::StmtWhile { expr, body, .. } => {
            fold_expr(ast, expr)?;
            if let Some(body) = body {
                fold_stmt(ast, body)?;
            }
        }
        Node::StmtFor {
            start, end, body, ..
        } => {
            fold_expr(ast, start)?;
            fold_expr(ast, end)?;
            fold_stmt(ast, body)?;
        }
        Node::StmtReturn { expr, .. } => {
            if let Some(expr) = expr {
                fold_expr(ast, expr)?;
            }
        }
        Node::StmtAssignVar { expr, .. } => {
            fold_expr(ast, expr)?;
        }
        Node::StmtAssignArray { index, expr, .. } => {
            fold_expr(ast, index)?;
            fold_expr(ast, expr)?;
        }
        Node::StmtAssignMember { expr, .. } => {
            fold_expr(ast, expr)?;
        }
        Node::StmtCall { expr } => {
            fold_expr(ast, expr)?;
        }
        Node::DeclVar { expr, .. } => {
            if let Some(expr) = expr {
                if !matches!(ast.get(expr), Node::ExpArrayInit { .. }) {
                    fold_expr(ast, expr)?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn fold_expr(ast: &mut Ast, id: NodeId) -> Result<()> {
    match ast.get(id).clone() {
        Node::ExpBinOp {
            op, token, left, right,
        } => {
            fold_expr(ast, left)?;
            fold_expr(ast, right)?;
            let (a, b) = match (ast.get(left), ast.get(right)) {
                (Node::ExpLitInt { value: a, .. }, Node::ExpLitInt { value: b, .. }) => (*a, *b),
                _ => return Ok(()),
            };
            if b == 0 && matches!(op, TokenKind::Div | TokenKind::Mod) {
                return Err(errors::constant_divide_by_zero(token.line));
            }
            let value = match op {
                TokenKind::Add => a.wrapping_add(b),
                TokenKind::Sub => a.wrapping_sub(b),
                TokenKind::Mul => a.wrapping_mul(b),
                TokenKind::Div => a.wrapping_div(b),
                TokenKind::Mod => a.wrapping_rem(b),
                TokenKind::And => ((a != 0) && (b != 0)) as i32,
                TokenKind::Or => ((a != 0) || (b != 0)) as i32,
                TokenKind::Lt => (a < b) as i32,
                TokenKind::Gt => (a > b) as i32,
                TokenKind::Leq => (a <= b) as i32,
                TokenKind::Geq => (a >= b) as i32,
                TokenKind::Eq => (a == b) as i32,
                _ => return Ok(()),
            };
            ast.replace(id, Node::ExpLitInt { token: None, value });
        }
        Node::ExpUnaryOp { op, child } => {
            fold_expr(ast, child)?;
            if let Node::ExpLitInt { value, .. } = ast.get(child) {
                let value = match op.kind {
                    TokenKind::Sub => value.wrapping_neg(),
                    TokenKind::Not => (*value == 0) as i32,
                    _ => return Ok(()),
                };
                ast.replace(id, Node::ExpLitInt { token: None, value });
            }
        }
        Node::ExpCall { args, .. } => {
            // fold inside arguments, never across the call itself
            for arg in args {
                fold_expr(ast, arg)?;
            }
        }
        Node::ExpDeref { index, .. } => {
            fold_expr(ast, index)?;
        }
        _ => {}
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// unreachable branches
// ---------------------------------------------------------------------------

/// `if (0) T else E` keeps only `E`; `if (nonzero) T else E` keeps only `T`;
/// `while (0)` loses its body. Conditions that fold to a literal carry no
/// side effects, so dropping the dead arm is safe.
fn prune_dead_branches(ast: &mut Ast) {
    for func in ast.top_level().to_vec() {
        if let Node::DeclFunc { body: Some(body), .. } = ast.get(func) {
            prune_stmt(ast, *body);
        }
    }
}

fn prune_stmt(ast: &mut Ast, id: NodeId) {
    match ast.get(id).clone() {
        Node::Block { nodes } => {
            for n in nodes {
                prune_stmt(ast, n);
            }
        }
        Node::StmtIf {
            expr,
            then_block,
            else_block,
            ..
        } => {
            prune_stmt(ast, then_block);
            if let Some(else_block) = else_block {
                prune_stmt(ast, else_block);
            }
            let cond = match ast.get(expr) {
                Node::ExpLitInt { value, .. } => *value,
                _ => return,
            };
            if cond != 0 {
                if let Node::StmtIf { else_block, .. } = ast.get_mut(id) {
                    *else_block = None;
                }
            } else {
                // only the else arm (or nothing) survives, and it must
                // execute, so the condition flips true
                let surviving = match else_block {
                    Some(e) => e,
                    None => ast.alloc(Node::Block { nodes: Vec::new() }),
                };
                if let Node::StmtIf {
                    then_block,
                    else_block,
                    ..
                } = ast.get_mut(id)
                {
                    *then_block = surviving;
                    *else_block = None;
                }
                ast.replace(expr, Node::ExpLitInt { token: None, value: 1 });
            }
        }
        Node::StmtWhile { expr, body, .. } => {
            if let Some(body) = body {
                prune_stmt(ast, body);
            }
            if let Node::ExpLitInt { value: 0, .. } = ast.get(expr) {
                if let Node::StmtWhile { body, .. } = ast.get_mut(id) {
                    *body = None;
                }
            }
        }
        Node::StmtFor { body, .. } => {
            prune_stmt(ast, body);
        }
        _ => {}
    }
}
