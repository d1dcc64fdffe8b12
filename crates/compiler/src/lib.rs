//! Nano Compiler Library
//!
//! Compiles Nano source text into a [`nano_core::Program`] the VM can
//! execute. The pipeline is: lex -> parse -> semantic passes -> optimize
//! (optional) -> pre-codegen lowering -> bytecode emission.
//!
//! # Embedding
//!
//! ```rust
//! use nanoc::{Compiler, CompilerConfig};
//! use nano_core::SourceManager;
//!
//! let mut sources = SourceManager::new();
//! sources.load_from_string("function main()\n  return 123\nend\n");
//!
//! let mut compiler = Compiler::with_config(&CompilerConfig::standard());
//! let program = compiler.build(&mut sources).expect("compile");
//! assert!(program.function_find("main").is_some());
//! ```
//!
//! Hosts extend the language surface by registering syscalls before the
//! build; see [`CompilerConfig`].

pub mod ast;
pub mod codegen;
pub mod config;
pub mod disassembler;
pub mod errors;
pub mod lexer;
pub mod optimize;
pub mod parser;
pub mod pre_codegen;
pub mod sema;
pub mod token;

pub use config::{CompilerConfig, SyscallDecl, STANDARD_SYSCALLS};
pub use disassembler::Disassembler;
pub use errors::{CompileError, ErrorKind};
pub use lexer::Lexer;
pub use parser::Parser;

use nano_core::{LineInfo, Program, SourceManager};
use tracing::debug;

use crate::ast::{Ast, Node, Scope};
use crate::token::{Token, TokenKind};

/// One compile session: registered syscalls, the AST arena and the phase
/// driver. Create, register syscalls, then [`Compiler::build`].
pub struct Compiler {
    /// Enable the AST optimizer for this session.
    pub optimize: bool,
    ast: Ast,
}

impl Compiler {
    pub fn new() -> Self {
        Compiler {
            optimize: true,
            ast: Ast::new(),
        }
    }

    /// Session configured from a [`CompilerConfig`], syscalls included.
    pub fn with_config(config: &CompilerConfig) -> Self {
        let mut compiler = Compiler::new();
        compiler.optimize = config.optimize;
        for syscall in &config.syscalls {
            compiler.syscall_register(&syscall.name, syscall.num_args);
        }
        compiler
    }

    /// Register a host syscall visible to compiled code.
    ///
    /// A negative `num_args` declares a varargs syscall; arity checking is
    /// skipped for those call sites.
    pub fn syscall_register(&mut self, name: &str, num_args: i32) {
        let is_varargs = num_args < 0;
        let args = (0..num_args.max(0))
            .map(|i| {
                self.ast.alloc(Node::DeclVar {
                    name: Token::with_text(TokenKind::Ident, format!("arg{}", i), LineInfo::INVALID),
                    scope: Scope::Arg,
                    expr: None,
                    size: None,
                    is_const: false,
                    offset: 0,
                })
            })
            .collect();
        let decl = self.ast.alloc(Node::DeclFunc {
            token: None,
            name: name.to_string(),
            is_syscall: true,
            is_varargs,
            args,
            body: None,
            stack_size: 0,
        });
        self.ast.push_top_level(decl);
    }

    /// Drop all parsed state, keeping nothing from previous builds.
    pub fn reset(&mut self) {
        self.ast = Ast::new();
    }

    /// Compile every queued source into a program.
    ///
    /// Imports encountered during parsing append files to the source
    /// manager; the loop keeps going until the whole closure is parsed.
    pub fn build(&mut self, sources: &mut SourceManager) -> Result<Program, CompileError> {
        let mut index = 0;
        while index < sources.count() {
            let text = sources
                .get(index)
                .map(|s| s.text().to_string())
                .unwrap_or_default();
            debug!(file = index, "lexing");
            let mut lexer = Lexer::new();
            lexer.lex(&text, index as i32)?;
            let mut stream = lexer.into_stream();
            debug!(file = index, "parsing");
            Parser::new(&mut stream, &mut self.ast, sources, index).parse()?;
            index += 1;
        }

        debug!("semantic analysis");
        sema::run_sema(&mut self.ast)?;

        if self.optimize {
            debug!("optimizing");
            optimize::run_optimize(&mut self.ast)?;
        }

        debug!("pre-codegen lowering");
        let mut program = Program::new();
        pre_codegen::run_pre_codegen(&mut self.ast, &mut program)?;

        debug!("code generation");
        codegen::Codegen::new(&self.ast, &mut program).run()?;

        debug!(
            code_bytes = program.code.len(),
            functions = program.functions.len(),
            "build finished"
        );
        Ok(program)
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}

/// Compile a single source string with the standard syscall set.
pub fn compile_source(source: &str) -> Result<Program, CompileError> {
    let mut sources = SourceManager::new();
    sources.load_from_string(source);
    Compiler::with_config(&CompilerConfig::standard()).build(&mut sources)
}
