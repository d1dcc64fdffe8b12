//! Recursive-descent parser with an operator-stack expression parser.
//!
//! Grammar:
//!
//! ```text
//! program   := ( 'var' vardecl | 'const' vardecl | 'function' funcdecl
//!              | 'import' STRING | EOL )*
//! vardecl   := IDENT ( '[' expr ']' ( '=' arrayinit )? | '=' expr )?
//! arrayinit := literal ( ',' literal )*        # newlines allowed
//! funcdecl  := IDENT '(' ( IDENT ( ',' IDENT )* )? ')' EOL stmt* 'end'
//! stmt      := ( IDENT '=' expr
//!              | IDENT '[' expr ']' '=' expr
//!              | IDENT '(' args ')'
//!              | IDENT ('+'|'-'|'*'|'/') '=' expr
//!              | 'if' '(' expr ')' EOL stmt* ( 'else' EOL stmt* )? 'end'
//!              | 'while' '(' expr ')' EOL stmt* 'end'
//!              | 'for' '(' IDENT '=' expr 'to' expr ')' EOL stmt* 'end'
//!              | 'var' vardecl
//!              | 'return' expr? ) EOL
//! ```
//!
//! Expressions use precedence climbing over an explicit operator stack:
//! `and`/`or` bind loosest, then `not`, comparisons, `+ -`, `* / %`. Binary
//! operators are left-associative. A postfix `(` on any expression becomes a
//! call with that expression as the callee.

use crate::ast::{Ast, Node, NodeId, Scope};
use crate::errors::{self, Result};
use crate::token::{Token, TokenKind, TokenStream};
use nano_core::SourceManager;

/// Operator precedence; higher binds tighter. Zero marks a non-operator.
fn op_precedence(kind: TokenKind) -> i32 {
    use TokenKind::*;
    match kind {
        And | Or => 1,
        Not => 2,
        Lt | Gt | Leq | Geq | Eq => 3,
        Add | Sub => 4,
        Mul | Div | Mod => 5,
        _ => 0,
    }
}

pub struct Parser<'a> {
    stream: &'a mut TokenStream,
    ast: &'a mut Ast,
    sources: &'a mut SourceManager,
    /// Index of the file being parsed, for import resolution.
    file_no: usize,

    op_stack: Vec<Token>,
    exp_stack: Vec<NodeId>,
}

impl<'a> Parser<'a> {
    pub fn new(
        stream: &'a mut TokenStream,
        ast: &'a mut Ast,
        sources: &'a mut SourceManager,
        file_no: usize,
    ) -> Self {
        Parser {
            stream,
            ast,
            sources,
            file_no,
            op_stack: Vec::new(),
            exp_stack: Vec::new(),
        }
    }

    /// Parse one file's token stream into the shared AST.
    pub fn parse(&mut self) -> Result<()> {
        while self.stream.found(TokenKind::Eof).is_none() {
            let t = self.stream.pop();
            match t.kind {
                TokenKind::Eol => continue,
                TokenKind::Var => {
                    let node = self.parse_global()?;
                    self.ast.push_top_level(node);
                }
                TokenKind::Const => {
                    let node = self.parse_const()?;
                    self.ast.push_top_level(node);
                }
                TokenKind::Func => {
                    let node = self.parse_function()?;
                    self.ast.push_top_level(node);
                }
                TokenKind::Import => {
                    self.parse_import()?;
                }
                _ => return Err(errors::unexpected_token(&t)),
            }
        }
        Ok(())
    }

    /// `import "path"`: queue the file on the source manager, relative to
    /// the importing file. Duplicates are suppressed by the manager.
    fn parse_import(&mut self) -> Result<()> {
        let s = self.stream.pop_kind(TokenKind::String)?;
        let path = self.sources.imported_path(self.file_no, &s.text);
        if !self.sources.load(&path) {
            return Err(errors::bad_import(&s));
        }
        Ok(())
    }

    // ---- expressions ----

    fn parse_expr(&mut self) -> Result<NodeId> {
        let tide = self.op_stack.len();
        self.parse_expr_ex(tide)?;
        self.op_pop_all(tide);
        Ok(self.exp_stack.pop().expect("expression stack"))
    }

    fn parse_expr_ex(&mut self, tide: usize) -> Result<()> {
        // prefix 'not'
        if let Some(n) = self.stream.found(TokenKind::Not) {
            self.parse_expr_ex(tide)?;
            self.op_push(n, tide);
            return Ok(());
        }

        // prefix unary minus binds to the following operand
        if let Some(n) = self.stream.found(TokenKind::Sub) {
            self.parse_expr_ex(tide)?;
            let child = self.exp_stack.pop().expect("expression stack");
            let op = self.ast.alloc(Node::ExpUnaryOp { op: n, child });
            self.exp_stack.push(op);
            return Ok(());
        }

        self.parse_lhs()?;

        // postfix call: the parsed expression becomes the callee
        while let Some(t) = self.stream.found(TokenKind::LParen) {
            let mut call = self.parse_call(t)?;
            let callee = self.exp_stack.pop().expect("expression stack");
            if let Node::ExpCall { callee: slot, .. } = &mut call {
                *slot = callee;
            }
            let id = self.ast.alloc(call);
            self.exp_stack.push(id);
        }

        if op_precedence(self.stream.kind()) > 0 {
            let op = self.stream.pop();
            self.op_push(op, tide);
            self.parse_expr_ex(tide)?;
        }
        Ok(())
    }

    fn parse_lhs(&mut self) -> Result<()> {
        if self.stream.found(TokenKind::LParen).is_some() {
            let expr = self.parse_expr()?;
            self.exp_stack.push(expr);
            self.stream.pop_kind(TokenKind::RParen)?;
            return Ok(());
        }

        if let Some(t) = self.stream.found(TokenKind::Ident) {
            if self.stream.found(TokenKind::LBracket).is_some() {
                let index = self.parse_expr()?;
                let id = self.ast.alloc(Node::ExpDeref {
                    name: t,
                    index,
                    decl: None,
                });
                self.exp_stack.push(id);
                self.stream.pop_kind(TokenKind::RBracket)?;
            } else {
                let id = self.ast.alloc(Node::ExpIdent { name: t, decl: None });
                self.exp_stack.push(id);
            }
            return Ok(());
        }

        if let Some(t) = self.stream.found(TokenKind::Int) {
            let value = t.int_value;
            let id = self.ast.alloc(Node::ExpLitInt {
                token: Some(t),
                value,
            });
            self.exp_stack.push(id);
            return Ok(());
        }

        if let Some(t) = self.stream.found(TokenKind::Float) {
            let value = t.float_value;
            let id = self.ast.alloc(Node::ExpLitFloat {
                token: Some(t),
                value,
            });
            self.exp_stack.push(id);
            return Ok(());
        }

        if let Some(t) = self.stream.found(TokenKind::String) {
            let value = t.text.clone();
            let id = self.ast.alloc(Node::ExpLitStr {
                token: Some(t),
                value,
            });
            self.exp_stack.push(id);
            return Ok(());
        }

        if let Some(t) = self.stream.found(TokenKind::None) {
            let id = self.ast.alloc(Node::ExpNone { token: Some(t) });
            self.exp_stack.push(id);
            return Ok(());
        }

        Err(errors::expecting_lit_or_ident(&self.stream.pop()))
    }

    /// Argument list after a consumed `(`; the callee slot is patched by the
    /// caller.
    fn parse_call(&mut self, token: Token) -> Result<Node> {
        let mut args = Vec::new();
        if self.stream.found(TokenKind::RParen).is_none() {
            loop {
                args.push(self.parse_expr()?);
                if self.stream.found(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.stream.pop_kind(TokenKind::RParen)?;
        }
        Ok(Node::ExpCall {
            token,
            callee: NodeId(0),
            args,
        })
    }

    // ---- operator stack ----

    fn op_push(&mut self, op: Token, tide: usize) {
        while self.op_stack.len() > tide {
            let top = self.op_stack.last().expect("operator stack");
            if op_precedence(op.kind) > op_precedence(top.kind) {
                break;
            }
            self.op_reduce();
        }
        self.op_stack.push(op);
    }

    fn op_pop_all(&mut self, tide: usize) {
        while self.op_stack.len() > tide {
            self.op_reduce();
        }
    }

    fn op_reduce(&mut self) {
        let op = self.op_stack.pop().expect("operator stack");
        if op.kind.is_binary_op() {
            let right = self.exp_stack.pop().expect("expression stack");
            let left = self.exp_stack.pop().expect("expression stack");
            let kind = op.kind;
            let id = self.ast.alloc(Node::ExpBinOp {
                op: kind,
                token: op,
                left,
                right,
            });
            self.exp_stack.push(id);
        } else {
            let child = self.exp_stack.pop().expect("expression stack");
            let id = self.ast.alloc(Node::ExpUnaryOp { op, child });
            self.exp_stack.push(id);
        }
    }

    // ---- declarations ----

    /// `var NAME [...]` after the `var` keyword, local scope.
    fn parse_decl_var(&mut self) -> Result<NodeId> {
        let name = self.stream.pop_kind(TokenKind::Ident)?;

        if self.stream.found(TokenKind::LBracket).is_some() {
            return self.parse_decl_array(name);
        }

        let expr = if self.stream.found(TokenKind::Assign).is_some() {
            Some(self.parse_expr()?)
        } else {
            None
        };

        Ok(self.ast.alloc(Node::DeclVar {
            name,
            scope: Scope::Local,
            expr,
            size: None,
            is_const: false,
            offset: 0,
        }))
    }

    /// `var NAME [ expr ] ( = literal, literal, ... )?`
    fn parse_decl_array(&mut self, name: Token) -> Result<NodeId> {
        let size = self.parse_expr()?;
        self.stream.pop_kind(TokenKind::RBracket)?;

        let expr = if self.stream.found(TokenKind::Assign).is_some() {
            let mut items = Vec::new();
            loop {
                while self.stream.found(TokenKind::Eol).is_some() {}
                let item = self.stream.pop();
                match item.kind {
                    TokenKind::Int
                    | TokenKind::Float
                    | TokenKind::String
                    | TokenKind::None => items.push(item),
                    _ => return Err(errors::bad_array_init_value(&item)),
                }
                if self.stream.found(TokenKind::Comma).is_none() {
                    break;
                }
            }
            Some(self.ast.alloc(Node::ExpArrayInit { items }))
        } else {
            None
        };

        Ok(self.ast.alloc(Node::DeclVar {
            name,
            scope: Scope::Local,
            expr,
            size: Some(size),
            is_const: false,
            offset: 0,
        }))
    }

    fn parse_global(&mut self) -> Result<NodeId> {
        let decl = self.parse_decl_var()?;
        if let Node::DeclVar { scope, is_const, .. } = self.ast.get_mut(decl) {
            *scope = Scope::Global;
            *is_const = false;
        }
        Ok(decl)
    }

    fn parse_const(&mut self) -> Result<NodeId> {
        let decl = self.parse_decl_var()?;
        if let Node::DeclVar { scope, is_const, .. } = self.ast.get_mut(decl) {
            *scope = Scope::Global;
            *is_const = true;
        }
        Ok(decl)
    }

    fn parse_function(&mut self) -> Result<NodeId> {
        let name = self.stream.pop_kind(TokenKind::Ident)?;

        let mut args = Vec::new();
        self.stream.pop_kind(TokenKind::LParen)?;
        if self.stream.found(TokenKind::RParen).is_none() {
            loop {
                let arg = self.stream.pop_kind(TokenKind::Ident)?;
                args.push(self.ast.alloc(Node::DeclVar {
                    name: arg,
                    scope: Scope::Arg,
                    expr: None,
                    size: None,
                    is_const: false,
                    offset: 0,
                }));
                if self.stream.found(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.stream.pop_kind(TokenKind::RParen)?;
        }
        self.stream.pop_kind(TokenKind::Eol)?;

        let mut body = Vec::new();
        while self.stream.found(TokenKind::End).is_none() {
            body.push(self.parse_stmt()?);
        }
        let body = self.ast.alloc(Node::Block { nodes: body });

        let func_name = name.text.clone();
        Ok(self.ast.alloc(Node::DeclFunc {
            token: Some(name),
            name: func_name,
            is_syscall: false,
            is_varargs: false,
            args,
            body: Some(body),
            stack_size: 0,
        }))
    }

    // ---- statements ----

    fn parse_stmt(&mut self) -> Result<NodeId> {
        // consume blank lines
        while self.stream.found(TokenKind::Eol).is_some() {}

        let t = self.stream.pop();
        let stmt = match t.kind {
            TokenKind::Var => self.parse_decl_var()?,
            TokenKind::Ident => match self.stream.kind() {
                TokenKind::Add | TokenKind::Sub | TokenKind::Mul | TokenKind::Div => {
                    self.parse_compound(t)?
                }
                TokenKind::Assign => {
                    self.stream.pop();
                    self.parse_assign(t)?
                }
                TokenKind::LParen => {
                    let paren = self.stream.pop();
                    let mut call = self.parse_call(paren)?;
                    let callee = self.ast.alloc(Node::ExpIdent { name: t, decl: None });
                    if let Node::ExpCall { callee: slot, .. } = &mut call {
                        *slot = callee;
                    }
                    let expr = self.ast.alloc(call);
                    self.ast.alloc(Node::StmtCall { expr })
                }
                TokenKind::LBracket => {
                    self.stream.pop();
                    self.parse_array_set(t)?
                }
                _ => return Err(errors::assign_or_call_expected_after(&t)),
            },
            TokenKind::If => self.parse_if(t)?,
            TokenKind::While => self.parse_while(t)?,
            TokenKind::For => self.parse_for(t)?,
            TokenKind::Return => self.parse_return(t)?,
            _ => return Err(errors::statement_expected(&t)),
        };

        // every statement sits on its own line
        self.stream.pop_kind(TokenKind::Eol)?;
        while self.stream.found(TokenKind::Eol).is_some() {}

        Ok(stmt)
    }

    fn parse_assign(&mut self, name: Token) -> Result<NodeId> {
        let expr = self.parse_expr()?;
        Ok(self.ast.alloc(Node::StmtAssignVar {
            name,
            expr,
            decl: None,
        }))
    }

    /// `x <op>= e` desugars to `x = x <op> e`.
    fn parse_compound(&mut self, name: Token) -> Result<NodeId> {
        let op = self.stream.pop();
        if self.stream.found(TokenKind::Assign).is_none() {
            return Err(errors::equals_expected_after_operator(
                self.stream.line_number(),
            ));
        }

        let left = self.ast.alloc(Node::ExpIdent {
            name: name.clone(),
            decl: None,
        });
        let right = self.parse_expr()?;
        let kind = op.kind;
        let expr = self.ast.alloc(Node::ExpBinOp {
            op: kind,
            token: op,
            left,
            right,
        });
        Ok(self.ast.alloc(Node::StmtAssignVar {
            name,
            expr,
            decl: None,
        }))
    }

    fn parse_array_set(&mut self, name: Token) -> Result<NodeId> {
        let index = self.parse_expr()?;
        self.stream.pop_kind(TokenKind::RBracket)?;
        self.stream.pop_kind(TokenKind::Assign)?;
        let expr = self.parse_expr()?;
        Ok(self.ast.alloc(Node::StmtAssignArray {
            name,
            index,
            expr,
            decl: None,
        }))
    }

    fn parse_if(&mut self, token: Token) -> Result<NodeId> {
        self.stream.pop_kind(TokenKind::LParen)?;
        let expr = self.parse_expr()?;
        self.stream.pop_kind(TokenKind::RParen)?;
        self.stream.pop_kind(TokenKind::Eol)?;

        let mut then_nodes = Vec::new();
        let mut has_else = false;
        while self.stream.found(TokenKind::End).is_none() {
            if self.stream.found(TokenKind::Else).is_some() {
                self.stream.pop_kind(TokenKind::Eol)?;
                has_else = true;
                break;
            }
            then_nodes.push(self.parse_stmt()?);
        }
        let then_block = self.ast.alloc(Node::Block { nodes: then_nodes });

        let else_block = if has_else {
            let mut else_nodes = Vec::new();
            while self.stream.found(TokenKind::End).is_none() {
                else_nodes.push(self.parse_stmt()?);
            }
            Some(self.ast.alloc(Node::Block { nodes: else_nodes }))
        } else {
            None
        };

        Ok(self.ast.alloc(Node::StmtIf {
            token,
            expr,
            then_block,
            else_block,
        }))
    }

    fn parse_while(&mut self, token: Token) -> Result<NodeId> {
        self.stream.pop_kind(TokenKind::LParen)?;
        let expr = self.parse_expr()?;
        self.stream.pop_kind(TokenKind::RParen)?;
        self.stream.pop_kind(TokenKind::Eol)?;

        let mut nodes = Vec::new();
        while self.stream.found(TokenKind::End).is_none() {
            nodes.push(self.parse_stmt()?);
        }
        let body = self.ast.alloc(Node::Block { nodes });

        Ok(self.ast.alloc(Node::StmtWhile {
            token,
            expr,
            body: Some(body),
        }))
    }

    fn parse_for(&mut self, token: Token) -> Result<NodeId> {
        self.stream.pop_kind(TokenKind::LParen)?;
        let name = self.stream.pop_kind(TokenKind::Ident)?;
        self.stream.pop_kind(TokenKind::Assign)?;
        let start = self.parse_expr()?;
        self.stream.pop_kind(TokenKind::To)?;
        let end = self.parse_expr()?;
        self.stream.pop_kind(TokenKind::RParen)?;
        self.stream.pop_kind(TokenKind::Eol)?;

        let mut nodes = Vec::new();
        while self.stream.found(TokenKind::End).is_none() {
            nodes.push(self.parse_stmt()?);
        }
        let body = self.ast.alloc(Node::Block { nodes });

        // a local declaration for the loop variable, used by sema when the
        // name does not resolve to an enclosing declaration
        let var_decl = self.ast.alloc(Node::DeclVar {
            name: name.clone(),
            scope: Scope::Local,
            expr: None,
            size: None,
            is_const: false,
            offset: 0,
        });

        Ok(self.ast.alloc(Node::StmtFor {
            token,
            name,
            decl: None,
            var_decl: Some(var_decl),
            start,
            end,
            body,
        }))
    }

    fn parse_return(&mut self, token: Token) -> Result<NodeId> {
        let expr = if self.stream.kind() == TokenKind::Eol {
            None
        } else {
            Some(self.parse_expr()?)
        };
        Ok(self.ast.alloc(Node::StmtReturn { token, expr }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse_source(source: &str) -> (Ast, Result<()>) {
        let mut lexer = Lexer::new();
        lexer.lex(source, 0).unwrap();
        let mut stream = lexer.into_stream();
        let mut ast = Ast::new();
        let mut sources = SourceManager::new();
        sources.load_from_string(source);
        let result = Parser::new(&mut stream, &mut ast, &mut sources, 0).parse();
        (ast, result)
    }

    fn parse_ok(source: &str) -> Ast {
        let (ast, result) = parse_source(source);
        result.unwrap();
        ast
    }

    #[test]
    fn parses_function_with_args() {
        let ast = parse_ok("function add(a, b)\n  return a + b\nend\n");
        let top = ast.top_level().to_vec();
        assert_eq!(top.len(), 1);
        match ast.get(top[0]) {
            Node::DeclFunc { name, args, .. } => {
                assert_eq!(name, "add");
                assert_eq!(args.len(), 2);
            }
            n => panic!("expected function, got {:?}", n),
        }
    }

    #[test]
    fn mul_binds_tighter_than_add() {
        let ast = parse_ok("function main()\n  return 1 + 2 * 3\nend\n");
        // find the return statement's expression
        let ret = find_return(&ast);
        match ast.get(ret) {
            Node::ExpBinOp { op: TokenKind::Add, right, .. } => match ast.get(*right) {
                Node::ExpBinOp { op: TokenKind::Mul, .. } => {}
                n => panic!("expected mul on the right, got {:?}", n),
            },
            n => panic!("expected add at the root, got {:?}", n),
        }
    }

    #[test]
    fn binary_ops_are_left_associative() {
        let ast = parse_ok("function main()\n  return 1 - 2 - 3\nend\n");
        let ret = find_return(&ast);
        match ast.get(ret) {
            Node::ExpBinOp { op: TokenKind::Sub, left, right, .. } => {
                assert!(matches!(ast.get(*left), Node::ExpBinOp { op: TokenKind::Sub, .. }));
                assert!(matches!(ast.get(*right), Node::ExpLitInt { value: 3, .. }));
            }
            n => panic!("expected sub at the root, got {:?}", n),
        }
    }

    #[test]
    fn unary_minus_wraps_the_operand() {
        let ast = parse_ok("function main()\n  return -3 - -5\nend\n");
        let ret = find_return(&ast);
        match ast.get(ret) {
            Node::ExpBinOp { op: TokenKind::Sub, left, right, .. } => {
                assert!(matches!(ast.get(*left), Node::ExpUnaryOp { .. }));
                assert!(matches!(ast.get(*right), Node::ExpUnaryOp { .. }));
            }
            n => panic!("expected sub at the root, got {:?}", n),
        }
    }

    #[test]
    fn compound_assignment_desugars() {
        let ast = parse_ok("function main()\n  var x = 1\n  x += 2\nend\n");
        let assign = last_stmt_of_main(&ast);
        match ast.get(assign) {
            Node::StmtAssignVar { expr, .. } => {
                assert!(matches!(ast.get(*expr), Node::ExpBinOp { op: TokenKind::Add, .. }));
            }
            n => panic!("expected assignment, got {:?}", n),
        }
    }

    #[test]
    fn compound_without_equals_is_an_error() {
        let (_, result) = parse_source("function main()\n  x + 2\nend\n");
        let err = result.unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::EqualsExpectedAfterOperator);
    }

    #[test]
    fn statement_call_builds_ident_callee() {
        let ast = parse_ok("function main()\n  foo(1, 2)\nend\n");
        let stmt = last_stmt_of_main(&ast);
        match ast.get(stmt) {
            Node::StmtCall { expr } => match ast.get(*expr) {
                Node::ExpCall { callee, args, .. } => {
                    assert_eq!(args.len(), 2);
                    assert!(matches!(ast.get(*callee), Node::ExpIdent { .. }));
                }
                n => panic!("expected call, got {:?}", n),
            },
            n => panic!("expected call statement, got {:?}", n),
        }
    }

    #[test]
    fn if_else_blocks() {
        let ast = parse_ok("function main()\n  if (1)\n    return 1\n  else\n    return 2\n  end\nend\n");
        let stmt = last_stmt_of_main(&ast);
        match ast.get(stmt) {
            Node::StmtIf { else_block, .. } => assert!(else_block.is_some()),
            n => panic!("expected if, got {:?}", n),
        }
    }

    #[test]
    fn for_synthesizes_a_loop_var_decl() {
        let ast = parse_ok("function main()\n  for (i = 0 to 4)\n  end\nend\n");
        let stmt = last_stmt_of_main(&ast);
        match ast.get(stmt) {
            Node::StmtFor { var_decl, decl, .. } => {
                assert!(var_decl.is_some());
                assert!(decl.is_none());
            }
            n => panic!("expected for, got {:?}", n),
        }
    }

    #[test]
    fn global_array_with_initializer() {
        let ast = parse_ok("var data[4] = 1, 2,\n  3\n");
        let top = ast.top_level().to_vec();
        match ast.get(top[0]) {
            Node::DeclVar { scope: Scope::Global, size: Some(_), expr: Some(init), .. } => {
                match ast.get(*init) {
                    Node::ExpArrayInit { items } => assert_eq!(items.len(), 3),
                    n => panic!("expected array init, got {:?}", n),
                }
            }
            n => panic!("expected global array decl, got {:?}", n),
        }
    }

    #[test]
    fn bad_array_init_item_is_an_error() {
        let (_, result) = parse_source("var data[4] = 1, x\n");
        let err = result.unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::BadArrayInitValue);
    }

    #[test]
    fn stray_token_after_ident_is_an_error() {
        let (_, result) = parse_source("function main()\n  x\nend\n");
        let err = result.unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::AssignOrCallExpectedAfter);
    }

    // walk helpers for the tests above

    fn find_return(ast: &Ast) -> NodeId {
        for &top in ast.top_level() {
            if let Node::DeclFunc { body: Some(body), .. } = ast.get(top) {
                if let Node::Block { nodes } = ast.get(*body) {
                    for &n in nodes {
                        if let Node::StmtReturn { expr: Some(e), .. } = ast.get(n) {
                            return *e;
                        }
                    }
                }
            }
        }
        panic!("no return statement found");
    }

    fn last_stmt_of_main(ast: &Ast) -> NodeId {
        for &top in ast.top_level() {
            if let Node::DeclFunc { name, body: Some(body), .. } = ast.get(top) {
                if name == "main" {
                    if let Node::Block { nodes } = ast.get(*body) {
                        return *nodes.last().expect("main has statements");
                    }
                }
            }
        }
        panic!("no main function");
    }
}
