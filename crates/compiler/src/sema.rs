//! Semantic analysis passes.
//!
//! Run order matters and mirrors the build pipeline:
//!
//! 1. declaration annotation (scoped symbol resolution)
//! 2. global initializer folding to literals (iterated to a fixed point)
//! 3. const enforcement and inlining
//! 4. duplicate declaration detection
//! 5. call arity checks
//! 6. scalar/array usage checks
//! 7. array size resolution
//!
//! Each pass walks the arena explicitly and stops at the first error.

use crate::ast::{Ast, Node, NodeId, Scope};
use crate::errors::{self, Result};
use crate::token::TokenKind;

/// Recursive constant evaluator over integer literals, `const` identifiers,
/// binary operators and unary minus.
///
/// `Ok(None)` means "not constant-evaluable"; division or modulo by a known
/// zero is a hard error.
pub fn const_eval(ast: &Ast, id: NodeId) -> Result<Option<i32>> {
    match ast.get(id) {
        Node::ExpLitInt { value, .. } => Ok(Some(*value)),
        Node::ExpIdent { decl: Some(decl), .. } => {
            if let Node::DeclVar {
                is_const: true,
                expr: Some(expr),
                ..
            } = ast.get(*decl)
            {
                if let Node::ExpLitInt { value, .. } = ast.get(*expr) {
                    return Ok(Some(*value));
                }
            }
            Ok(None)
        }
        Node::ExpUnaryOp { op, child } => {
            if op.kind != TokenKind::Sub {
                return Ok(None);
            }
            Ok(const_eval(ast, *child)?.map(i32::wrapping_neg))
        }
        Node::ExpBinOp {
            op, token, left, right,
        } => {
            let (a, b) = match (const_eval(ast, *left)?, const_eval(ast, *right)?) {
                (Some(a), Some(b)) => (a, b),
                _ => return Ok(None),
            };
            if b == 0 && matches!(op, TokenKind::Div | TokenKind::Mod) {
                return Err(errors::constant_divide_by_zero(token.line));
            }
            let v = match op {
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
                _ => return Ok(None),
            };
            Ok(Some(v))
        }
        _ => Ok(None),
    }
}

/// Run every semantic pass in order.
pub fn run_sema(ast: &mut Ast) -> Result<()> {
    DeclAnnotate::default().run(ast)?;
    fold_globals(ast)?;
    check_consts(ast)?;
    MultiDecls::default().run(ast)?;
    check_call_arity(ast)?;
    check_type_uses(ast)?;
    check_array_sizes(ast)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// pass 1: declaration annotation
// ---------------------------------------------------------------------------

/// Attaches the matching declaration to every identifier use. Scopes open on
/// functions, `if`, `while` and `for`.
#[derive(Default)]
struct DeclAnnotate {
    scopes: Vec<Vec<NodeId>>,
}

impl DeclAnnotate {
    fn run(&mut self, ast: &mut Ast) -> Result<()> {
        // top-level declarations are visible everywhere, including before
        // their point of definition
        self.scopes.push(ast.top_level().to_vec());
        for id in ast.top_level().to_vec() {
            self.walk(ast, id)?;
        }
        self.scopes.pop();
        Ok(())
    }

    fn find_decl(&self, ast: &Ast, name: &str) -> Option<NodeId> {
        for scope in self.scopes.iter().rev() {
            for &decl in scope {
                if ast.decl_name(decl) == Some(name) {
                    return Some(decl);
                }
            }
        }
        None
    }

    fn walk(&mut self, ast: &mut Ast, id: NodeId) -> Result<()> {
        match ast.get(id).clone() {
            Node::DeclFunc { args, body, .. } => {
                self.scopes.push(Vec::new());
                for arg in args {
                    self.walk(ast, arg)?;
                }
                if let Some(body) = body {
                    self.walk(ast, body)?;
                }
                self.scopes.pop();
            }
            Node::DeclVar { expr, size, .. } => {
                // the initializer resolves against the outer scope, so
                // `var a = a` is an error
                if let Some(size) = size {
                    self.walk(ast, size)?;
                }
                if let Some(expr) = expr {
                    self.walk(ast, expr)?;
                }
                self.scopes.last_mut().expect("scope stack").push(id);
            }
            Node::Block { nodes } => {
                for n in nodes {
                    self.walk(ast, n)?;
                }
            }
            Node::StmtIf {
                expr,
                then_block,
                else_block,
                ..
            } => {
                self.scopes.push(Vec::new());
                self.walk(ast, expr)?;
                self.walk(ast, then_block)?;
                if let Some(else_block) = else_block {
                    self.walk(ast, else_block)?;
                }
                self.scopes.pop();
            }
            Node::StmtWhile { expr, body, .. } => {
                self.scopes.push(Vec::new());
                self.walk(ast, expr)?;
                if let Some(body) = body {
                    self.walk(ast, body)?;
                }
                self.scopes.pop();
            }
            Node::StmtFor {
                name,
                var_decl,
                start,
                end,
                body,
                ..
            } => {
                self.scopes.push(Vec::new());
                // the loop variable binds to an enclosing declaration when
                // one exists, otherwise to the declaration synthesized by
                // the parser
                let decl = match self.find_decl(ast, &name.text) {
                    Some(found) => {
                        if !ast.is_var_decl(found) {
                            return Err(errors::unknown_variable(&name));
                        }
                        found
                    }
                    None => {
                        let synth = var_decl.expect("parser synthesizes a loop var decl");
                        self.scopes.last_mut().expect("scope stack").push(synth);
                        synth
                    }
                };
                let used_synth = var_decl == Some(decl);
                if let Node::StmtFor {
                    decl: slot,
                    var_decl: synth_slot,
                    ..
                } = ast.get_mut(id)
                {
                    *slot = Some(decl);
                    if !used_synth {
                        *synth_slot = None;
                    }
                }
                self.walk(ast, start)?;
                self.walk(ast, end)?;
                self.walk(ast, body)?;
                self.scopes.pop();
            }
            Node::StmtReturn { expr, .. } => {
                if let Some(expr) = expr {
                    self.walk(ast, expr)?;
                }
            }
            Node::StmtAssignVar { name, expr, .. } => {
                self.walk(ast, expr)?;
                let decl = self
                    .find_decl(ast, &name.text)
                    .filter(|&d| ast.is_var_decl(d))
                    .ok_or_else(|| errors::unknown_variable(&name))?;
                if ast.is_array_decl(decl) {
                    return Err(errors::ident_is_array_not_var(&name));
                }
                if let Node::StmtAssignVar { decl: slot, .. } = ast.get_mut(id) {
                    *slot = Some(decl);
                }
            }
            Node::StmtAssignArray {
                name, index, expr, ..
            } => {
                self.walk(ast, index)?;
                self.walk(ast, expr)?;
                let decl = self
                    .find_decl(ast, &name.text)
                    .filter(|&d| ast.is_var_decl(d))
                    .ok_or_else(|| errors::unknown_array(&name))?;
                if let Node::StmtAssignArray { decl: slot, .. } = ast.get_mut(id) {
                    *slot = Some(decl);
                }
            }
            Node::StmtAssignMember { name, expr, .. } => {
                self.walk(ast, expr)?;
                let decl = self
                    .find_decl(ast, &name.text)
                    .filter(|&d| ast.is_var_decl(d))
                    .ok_or_else(|| errors::unknown_identifier(&name))?;
                if let Node::StmtAssignMember { decl: slot, .. } = ast.get_mut(id) {
                    *slot = Some(decl);
                }
            }
            Node::StmtCall { expr } => {
                self.walk(ast, expr)?;
            }
            Node::ExpIdent { name, .. } => {
                let decl = self
                    .find_decl(ast, &name.text)
                    .ok_or_else(|| errors::unknown_identifier(&name))?;
                if ast.is_var_decl(decl) && ast.is_array_decl(decl) {
                    return Err(errors::array_requires_subscript(&name));
                }
                if let Node::ExpIdent { decl: slot, .. } = ast.get_mut(id) {
                    *slot = Some(decl);
                }
            }
            Node::ExpMember { name, .. } => {
                let decl = self
                    .find_decl(ast, &name.text)
                    .filter(|&d| ast.is_var_decl(d))
                    .ok_or_else(|| errors::unknown_identifier(&name))?;
                if let Node::ExpMember { decl: slot, .. } = ast.get_mut(id) {
                    *slot = Some(decl);
                }
            }
            Node::ExpDeref { name, index, .. } => {
                self.walk(ast, index)?;
                let decl = self
                    .find_decl(ast, &name.text)
                    .ok_or_else(|| errors::unknown_array(&name))?;
                if ast.is_func_decl(decl) {
                    return Err(errors::expected_func_call(&name));
                }
                // a scalar here may still be a string; checked at runtime
                if let Node::ExpDeref { decl: slot, .. } = ast.get_mut(id) {
                    *slot = Some(decl);
                }
            }
            Node::ExpCall { callee, args, .. } => {
                for arg in args {
                    self.walk(ast, arg)?;
                }
                self.walk(ast, callee)?;
            }
            Node::ExpBinOp { left, right, .. } => {
                self.walk(ast, left)?;
                self.walk(ast, right)?;
            }
            Node::ExpUnaryOp { child, .. } => {
                self.walk(ast, child)?;
            }
            Node::ExpLitInt { .. }
            | Node::ExpLitFloat { .. }
            | Node::ExpLitStr { .. }
            | Node::ExpNone { .. }
            | Node::ExpArrayInit { .. }
            | Node::Program { .. } => {}
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// pass 2: global initializer folding
// ---------------------------------------------------------------------------

/// Iteratively fold global initializers to literals; whatever remains
/// non-literal at the fixed point is an error.
fn fold_globals(ast: &mut Ast) -> Result<()> {
    loop {
        let mut change = false;
        for decl in ast.top_level().to_vec() {
            change |= fold_global_decl(ast, decl, false)?;
        }
        if !change {
            break;
        }
    }
    for decl in ast.top_level().to_vec() {
        fold_global_decl(ast, decl, true)?;
    }
    Ok(())
}

fn fold_global_decl(ast: &mut Ast, id: NodeId, strict: bool) -> Result<bool> {
    let (name, expr) = match ast.get(id) {
        Node::DeclVar {
            name,
            expr: Some(expr),
            ..
        } => (name.clone(), *expr),
        _ => return Ok(false),
    };

    match ast.get(expr) {
        // `= none` is the same as no initializer
        Node::ExpNone { .. } => {
            if let Node::DeclVar { expr: slot, .. } = ast.get_mut(id) {
                *slot = None;
            }
            Ok(true)
        }
        Node::ExpArrayInit { items } => {
            for item in items {
                match item.kind {
                    TokenKind::Int | TokenKind::Float | TokenKind::String | TokenKind::None => {}
                    _ => return Err(errors::bad_array_init_value(item)),
                }
            }
            Ok(false)
        }
        Node::ExpLitInt { .. } | Node::ExpLitFloat { .. } | Node::ExpLitStr { .. } => Ok(false),
        Node::ExpBinOp { .. } | Node::ExpUnaryOp { .. } | Node::ExpIdent { .. } => {
            match const_eval(ast, expr)? {
                Some(value) => {
                    ast.replace(expr, Node::ExpLitInt { token: None, value });
                    Ok(true)
                }
                None => {
                    if strict {
                        Err(errors::global_var_const_expr(&name))
                    } else {
                        Ok(false)
                    }
                }
            }
        }
        _ => Err(errors::global_var_const_expr(&name)),
    }
}

// ---------------------------------------------------------------------------
// pass 3: const enforcement and inlining
// ---------------------------------------------------------------------------

/// Enforce const rules and inline every use of a const as its literal.
fn check_consts(ast: &mut Ast) -> Result<()> {
    // decl-level checks
    for id in 0..ast.len() as u32 {
        let id = NodeId(id);
        match ast.get(id) {
            Node::DeclVar {
                name,
                is_const: true,
                expr,
                size,
                ..
            } => {
                if size.is_some() {
                    return Err(errors::const_array_invalid(name));
                }
                if expr.is_none() {
                    return Err(errors::const_needs_init(name));
                }
            }
            Node::StmtAssignVar {
                name,
                decl: Some(decl),
                ..
            } => {
                if ast.is_const_decl(*decl) {
                    return Err(errors::cant_assign_const(name));
                }
            }
            _ => {}
        }
    }

    // inline const uses in place
    for id in 0..ast.len() as u32 {
        let id = NodeId(id);
        let (name, decl) = match ast.get(id) {
            Node::ExpIdent {
                name,
                decl: Some(decl),
            } => (name.clone(), *decl),
            _ => continue,
        };
        if !ast.is_const_decl(decl) {
            continue;
        }
        let init = match ast.get(decl) {
            Node::DeclVar { expr: Some(expr), .. } => *expr,
            _ => continue,
        };
        match ast.get(init).clone() {
            lit @ (Node::ExpLitInt { .. }
            | Node::ExpLitFloat { .. }
            | Node::ExpLitStr { .. }
            | Node::ExpNone { .. }) => ast.replace(id, lit),
            _ => return Err(errors::cant_evaluate_constant(&name)),
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// pass 4: duplicate declarations
// ---------------------------------------------------------------------------

/// Reject a name declared twice in the same visibility chain.
#[derive(Default)]
struct MultiDecls {
    scopes: Vec<Vec<String>>,
}

impl MultiDecls {
    fn run(&mut self, ast: &Ast) -> Result<()> {
        self.scopes.push(Vec::new());
        for id in ast.top_level().to_vec() {
            self.walk(ast, id)?;
        }
        self.scopes.pop();
        Ok(())
    }

    fn is_defined(&self, name: &str) -> bool {
        self.scopes.iter().any(|s| s.iter().any(|n| n == name))
    }

    fn add(&mut self, name: &str) {
        self.scopes
            .last_mut()
            .expect("scope stack")
            .push(name.to_string());
    }

    fn walk(&mut self, ast: &Ast, id: NodeId) -> Result<()> {
        match ast.get(id) {
            Node::DeclVar { name, .. } => {
                if self.is_defined(&name.text) {
                    return Err(errors::var_already_exists(name));
                }
                let text = name.text.clone();
                self.add(&text);
            }
            Node::DeclFunc {
                token, name, args, body, ..
            } => {
                if self.is_defined(name) {
                    if let Some(token) = token {
                        return Err(errors::function_already_exists(token));
                    }
                }
                let name = name.clone();
                self.add(&name);
                self.scopes.push(Vec::new());
                for &arg in args {
                    self.walk(ast, arg)?;
                }
                if let Some(body) = body {
                    self.walk(ast, *body)?;
                }
                self.scopes.pop();
            }
            Node::StmtIf {
                then_block,
                else_block,
                ..
            } => {
                self.scopes.push(Vec::new());
                self.walk(ast, *then_block)?;
                self.scopes.pop();
                if let Some(else_block) = else_block {
                    self.scopes.push(Vec::new());
                    self.walk(ast, *else_block)?;
                    self.scopes.pop();
                }
            }
            Node::StmtWhile { body, .. } => {
                if let Some(body) = body {
                    self.scopes.push(Vec::new());
                    self.walk(ast, *body)?;
                    self.scopes.pop();
                }
            }
            Node::StmtFor { body, .. } => {
                self.scopes.push(Vec::new());
                self.walk(ast, *body)?;
                self.scopes.pop();
            }
            Node::Block { nodes } => {
                for n in nodes.clone() {
                    self.walk(ast, n)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// pass 5: call arity
// ---------------------------------------------------------------------------

/// Direct calls must pass the declared number of arguments, varargs
/// syscalls excepted. Indirect calls are checked at runtime.
fn check_call_arity(ast: &Ast) -> Result<()> {
    for id in 0..ast.len() as u32 {
        let (callee, args, _token) = match ast.get(NodeId(id)) {
            Node::ExpCall {
                callee, args, token, ..
            } => (*callee, args.len(), token.clone()),
            _ => continue,
        };
        let (name, decl) = match ast.get(callee) {
            Node::ExpIdent {
                name,
                decl: Some(decl),
            } => (name.clone(), *decl),
            _ => continue,
        };
        if let Node::DeclFunc {
            is_syscall,
            is_varargs,
            args: params,
            ..
        } = ast.get(decl)
        {
            if *is_syscall && *is_varargs {
                continue;
            }
            if args > params.len() {
                return Err(errors::too_many_args(&name));
            }
            if args < params.len() {
                return Err(errors::not_enought_args(&name));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// pass 6: type usage
// ---------------------------------------------------------------------------

/// Array declarations cannot be assigned as scalars and scalars cannot be
/// subscripted on the assignment side. Read-side subscripts stay legal for
/// scalars because strings are indexable at runtime.
fn check_type_uses(ast: &Ast) -> Result<()> {
    for id in 0..ast.len() as u32 {
        match ast.get(NodeId(id)) {
            Node::StmtAssignArray {
                name,
                decl: Some(decl),
                ..
            } => {
                if !ast.is_array_decl(*decl) {
                    return Err(errors::variable_is_not_array(name));
                }
            }
            Node::StmtAssignVar {
                name,
                decl: Some(decl),
                ..
            } => {
                if ast.is_array_decl(*decl) {
                    return Err(errors::ident_is_array_not_var(name));
                }
            }
            Node::DeclVar {
                name,
                scope,
                size: Some(_),
                expr: Some(expr),
                ..
            } => {
                // initializer lists are only meaningful for globals, where
                // `@init` can fill the array before user code runs
                if *scope != Scope::Global && matches!(ast.get(*expr), Node::ExpArrayInit { .. })
                {
                    return Err(errors::array_init_in_func(name));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// pass 7: array sizes
// ---------------------------------------------------------------------------

/// Resolve every array size to a literal integer constant >= 2 and bound the
/// initializer item count by it.
fn check_array_sizes(ast: &mut Ast) -> Result<()> {
    for id in 0..ast.len() as u32 {
        let id = NodeId(id);
        let (name, size, expr) = match ast.get(id) {
            Node::DeclVar {
                name,
                size: Some(size),
                expr,
                ..
            } => (name.clone(), *size, *expr),
            _ => continue,
        };

        let count = match const_eval(ast, size)? {
            Some(v) => v,
            None => return Err(errors::global_var_const_expr(&name)),
        };
        ast.replace(size, Node::ExpLitInt { token: None, value: count });

        if count <= 1 {
            return Err(errors::array_size_must_be_greater_than(&name));
        }
        if let Some(expr) = expr {
            if let Node::ExpArrayInit { items } = ast.get(expr) {
                if (items.len() as i32) > count {
                    return Err(errors::too_many_array_inits(&name, items.len(), count));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use nano_core::SourceManager;

    fn analyze(source: &str) -> Result<Ast> {
        let mut lexer = Lexer::new();
        lexer.lex(source, 0).unwrap();
        let mut stream = lexer.into_stream();
        let mut ast = Ast::new();
        let mut sources = SourceManager::new();
        sources.load_from_string(source);
        Parser::new(&mut stream, &mut ast, &mut sources, 0).parse()?;
        run_sema(&mut ast)?;
        Ok(ast)
    }

    fn analyze_err(source: &str) -> ErrorKind {
        analyze(source).unwrap_err().kind
    }

    #[test]
    fn every_ident_gets_a_decl() {
        let ast = analyze("function f(a)\n  var b = a\n  return b\nend\n").unwrap();
        for i in 0..ast.len() as u32 {
            match ast.get(NodeId(i)) {
                Node::ExpIdent { decl, name } => {
                    assert!(decl.is_some(), "unresolved identifier '{}'", name.text)
                }
                Node::StmtAssignVar { decl, .. } => assert!(decl.is_some()),
                _ => {}
            }
        }
    }

    #[test]
    fn unknown_identifier_is_reported() {
        assert_eq!(
            analyze_err("function f()\n  var a = b\nend\n"),
            ErrorKind::UnknownIdentifier
        );
    }

    #[test]
    fn var_cannot_reference_itself() {
        assert_eq!(
            analyze_err("function f()\n  var a = a\nend\n"),
            ErrorKind::UnknownIdentifier
        );
    }

    #[test]
    fn duplicate_var_in_scope_is_reported() {
        assert_eq!(
            analyze_err("function f()\n  var a\n  var a\nend\n"),
            ErrorKind::VarAlreadyExists
        );
    }

    #[test]
    fn duplicate_function_is_reported() {
        assert_eq!(
            analyze_err("function f()\nend\nfunction f()\nend\n"),
            ErrorKind::FunctionAlreadyExists
        );
    }

    #[test]
    fn shadowing_in_inner_scope_is_also_a_duplicate() {
        assert_eq!(
            analyze_err("function f()\n  var a\n  if (1)\n    var a\n  end\nend\n"),
            ErrorKind::VarAlreadyExists
        );
    }

    #[test]
    fn sibling_scopes_may_reuse_names() {
        analyze(
            "function f()\n  if (1)\n    var a\n  else\n    var a\n  end\nend\n",
        )
        .unwrap();
    }

    #[test]
    fn call_arity_is_checked() {
        assert_eq!(
            analyze_err("function g(a, b)\n  return a\nend\nfunction f()\n  return g(1)\nend\n"),
            ErrorKind::NotEnoughtArgs
        );
        assert_eq!(
            analyze_err(
                "function g(a)\n  return a\nend\nfunction f()\n  return g(1, 2)\nend\n"
            ),
            ErrorKind::TooManyArgs
        );
    }

    #[test]
    fn array_without_subscript_is_rejected() {
        assert_eq!(
            analyze_err("function f()\n  var a[4]\n  var b = a\nend\n"),
            ErrorKind::ArrayRequiresSubscript
        );
    }

    #[test]
    fn scalar_on_array_assignment_lhs_is_rejected() {
        assert_eq!(
            analyze_err("function f()\n  var a\n  a[0] = 1\nend\n"),
            ErrorKind::VariableIsNotArray
        );
    }

    #[test]
    fn array_size_must_be_at_least_two() {
        assert_eq!(
            analyze_err("function f()\n  var a[1]\nend\n"),
            ErrorKind::ArraySizeMustBeGreaterThan
        );
    }

    #[test]
    fn array_size_may_be_a_const_expression() {
        let ast = analyze("const n = 2\nvar a[n * 2]\n").unwrap();
        let decl = ast
            .top_level()
            .iter()
            .copied()
            .find(|&d| ast.is_array_decl(d))
            .unwrap();
        assert_eq!(ast.array_count(decl), 4);
    }

    #[test]
    fn too_many_array_inits_are_rejected() {
        assert_eq!(
            analyze_err("var a[2] = 1, 2, 3\n"),
            ErrorKind::TooManyArrayInits
        );
    }

    #[test]
    fn local_array_initializer_is_rejected() {
        assert_eq!(
            analyze_err("function f()\n  var a[2] = 1, 2\nend\n"),
            ErrorKind::ArrayInitInFunc
        );
    }

    #[test]
    fn const_uses_are_inlined() {
        let ast = analyze("const k = 7\nfunction f()\n  return k\nend\n").unwrap();
        let mut saw_literal = false;
        for i in 0..ast.len() as u32 {
            if let Node::StmtReturn { expr: Some(e), .. } = ast.get(NodeId(i)) {
                if let Node::ExpLitInt { value: 7, .. } = ast.get(*e) {
                    saw_literal = true;
                }
            }
        }
        assert!(saw_literal, "const use was not inlined");
    }

    #[test]
    fn assigning_a_const_is_rejected() {
        assert_eq!(
            analyze_err("const k = 1\nfunction f()\n  k = 2\nend\n"),
            ErrorKind::CantAssignConst
        );
    }

    #[test]
    fn const_without_initializer_is_rejected() {
        assert_eq!(analyze_err("const k\n"), ErrorKind::ConstNeedsInit);
    }

    #[test]
    fn global_initializers_fold_to_literals() {
        let ast = analyze("const n = 3\nvar g = n * 2 + 1\n").unwrap();
        let decl = ast
            .top_level()
            .iter()
            .copied()
            .find(|&d| ast.is_var_decl(d) && !ast.is_const_decl(d))
            .unwrap();
        match ast.get(decl) {
            Node::DeclVar { expr: Some(e), .. } => {
                assert!(matches!(ast.get(*e), Node::ExpLitInt { value: 7, .. }))
            }
            n => panic!("expected global decl, got {:?}", n),
        }
    }

    #[test]
    fn non_constant_global_initializer_is_rejected() {
        assert_eq!(
            analyze_err("function f()\n  return 1\nend\nvar g = f()\n"),
            ErrorKind::GlobalVarConstExpr
        );
    }

    #[test]
    fn constant_divide_by_zero_in_global() {
        assert_eq!(analyze_err("var g = 1 / 0\n"), ErrorKind::ConstantDivideByZero);
    }

    #[test]
    fn for_loop_var_without_decl_is_synthesized() {
        let ast = analyze("function f()\n  for (i = 0 to 3)\n  end\nend\n").unwrap();
        for i in 0..ast.len() as u32 {
            if let Node::StmtFor { decl, var_decl, .. } = ast.get(NodeId(i)) {
                assert!(decl.is_some());
                assert_eq!(*decl, *var_decl);
            }
        }
    }

    #[test]
    fn for_loop_var_prefers_enclosing_decl() {
        let ast = analyze("function f()\n  var i\n  for (i = 0 to 3)\n  end\nend\n").unwrap();
        for n in 0..ast.len() as u32 {
            if let Node::StmtFor { decl, var_decl, .. } = ast.get(NodeId(n)) {
                assert!(decl.is_some());
                assert!(var_decl.is_none(), "synthesized decl should be dropped");
            }
        }
    }

    #[test]
    fn calling_a_variable_is_allowed_for_indirect_dispatch() {
        // function references flow through variables; arity is runtime-checked
        analyze(
            "function g()\n  return 1\nend\nfunction f()\n  var h = g\n  return h()\nend\n",
        )
        .unwrap();
    }
}
