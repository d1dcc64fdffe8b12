//! Compile-time error reporting.
//!
//! Every front-end failure funnels into one `CompileError` carrying a
//! `(file, line)`, an enumerated kind and a rendered message. The helper
//! constructors keep the message wording in one place so the parser and the
//! semantic passes stay terse.

use nano_core::LineInfo;

use crate::token::{Token, TokenKind};

/// Enumerated compile error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    // lexer
    UnexpectedCharacter,
    StringQuoteMismatch,
    // parser
    UnexpectedToken,
    AssignOrCallExpectedAfter,
    StatementExpected,
    BadImport,
    ExpectingLitOrIdent,
    BadArrayInitValue,
    EqualsExpectedAfterOperator,
    // sema
    UnknownIdentifier,
    UnknownVariable,
    UnknownArray,
    ArrayRequiresSubscript,
    IdentIsArrayNotVar,
    ExpectedFuncCall,
    GlobalVarConstExpr,
    CantAssignConst,
    ConstNeedsInit,
    ConstArrayInvalid,
    VarAlreadyExists,
    FunctionAlreadyExists,
    TooManyArgs,
    NotEnoughtArgs,
    VariableIsNotArray,
    ArraySizeMustBeGreaterThan,
    TooManyArrayInits,
    ArrayInitInFunc,
    ConstantDivideByZero,
    CantEvaluateConstant,
    // codegen
    Internal,
}

/// A compile failure with its source position.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub line: LineInfo,
    pub message: String,
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.line, self.message)
    }
}

impl std::error::Error for CompileError {}

impl CompileError {
    pub fn new(kind: ErrorKind, line: LineInfo, message: impl Into<String>) -> Self {
        CompileError {
            kind,
            line,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;

pub fn unexpected_character(line: LineInfo, ch: char) -> CompileError {
    CompileError::new(
        ErrorKind::UnexpectedCharacter,
        line,
        format!("unexpected character '{}' in source", ch),
    )
}

pub fn string_quote_mismatch(line: LineInfo) -> CompileError {
    CompileError::new(
        ErrorKind::StringQuoteMismatch,
        line,
        "string missing closing quote \"",
    )
}

pub fn unexpected_token(t: &Token) -> CompileError {
    CompileError::new(
        ErrorKind::UnexpectedToken,
        t.line,
        format!("unexpected token '{}'", t),
    )
}

pub fn unexpected_token_expecting(t: &Token, want: TokenKind) -> CompileError {
    CompileError::new(
        ErrorKind::UnexpectedToken,
        t.line,
        format!("unexpected token '{}' expecting '{}'", t, want.name()),
    )
}

pub fn assign_or_call_expected_after(t: &Token) -> CompileError {
    CompileError::new(
        ErrorKind::AssignOrCallExpectedAfter,
        t.line,
        format!("assignment or call expected after '{}'", t),
    )
}

pub fn statement_expected(t: &Token) -> CompileError {
    CompileError::new(
        ErrorKind::StatementExpected,
        t.line,
        format!("statement expected, but got '{}'", t),
    )
}

pub fn bad_import(t: &Token) -> CompileError {
    CompileError::new(
        ErrorKind::BadImport,
        t.line,
        format!("unable to import '{}'", t),
    )
}

pub fn expecting_lit_or_ident(t: &Token) -> CompileError {
    CompileError::new(
        ErrorKind::ExpectingLitOrIdent,
        t.line,
        format!("expecting literal or identifier, found '{}' instead", t),
    )
}

pub fn bad_array_init_value(t: &Token) -> CompileError {
    CompileError::new(
        ErrorKind::BadArrayInitValue,
        t.line,
        format!("bad array initalizer value '{}'", t),
    )
}

pub fn equals_expected_after_operator(line: LineInfo) -> CompileError {
    CompileError::new(
        ErrorKind::EqualsExpectedAfterOperator,
        line,
        "equals expected after operator for compound assignment",
    )
}

pub fn unknown_identifier(t: &Token) -> CompileError {
    CompileError::new(
        ErrorKind::UnknownIdentifier,
        t.line,
        format!("unknown identifier '{}'", t),
    )
}

pub fn unknown_variable(t: &Token) -> CompileError {
    CompileError::new(
        ErrorKind::UnknownVariable,
        t.line,
        format!("unknown variable '{}'", t),
    )
}

pub fn unknown_array(t: &Token) -> CompileError {
    CompileError::new(
        ErrorKind::UnknownArray,
        t.line,
        format!("unknown array '{}'", t),
    )
}

pub fn array_requires_subscript(t: &Token) -> CompileError {
    CompileError::new(
        ErrorKind::ArrayRequiresSubscript,
        t.line,
        format!("array '{}' requires subscript []", t),
    )
}

pub fn ident_is_array_not_var(t: &Token) -> CompileError {
    CompileError::new(
        ErrorKind::IdentIsArrayNotVar,
        t.line,
        format!("identifier '{}' an array type not variable", t),
    )
}

pub fn expected_func_call(t: &Token) -> CompileError {
    CompileError::new(
        ErrorKind::ExpectedFuncCall,
        t.line,
        format!("expected function call with '{}'", t),
    )
}

pub fn global_var_const_expr(t: &Token) -> CompileError {
    CompileError::new(
        ErrorKind::GlobalVarConstExpr,
        t.line,
        "can only assign constant expressions to globals",
    )
}

pub fn cant_assign_const(t: &Token) -> CompileError {
    CompileError::new(
        ErrorKind::CantAssignConst,
        t.line,
        format!("cant assign to constant variable '{}'", t),
    )
}

pub fn const_needs_init(t: &Token) -> CompileError {
    CompileError::new(
        ErrorKind::ConstNeedsInit,
        t.line,
        format!("constant '{}' must be initalized", t),
    )
}

pub fn const_array_invalid(t: &Token) -> CompileError {
    CompileError::new(
        ErrorKind::ConstArrayInvalid,
        t.line,
        "constant arrays are not supported",
    )
}

pub fn var_already_exists(t: &Token) -> CompileError {
    CompileError::new(
        ErrorKind::VarAlreadyExists,
        t.line,
        format!("var '{}' already exists in this scope", t),
    )
}

pub fn function_already_exists(t: &Token) -> CompileError {
    CompileError::new(
        ErrorKind::FunctionAlreadyExists,
        t.line,
        format!("function '{}' already exists", t),
    )
}

pub fn too_many_args(t: &Token) -> CompileError {
    CompileError::new(
        ErrorKind::TooManyArgs,
        t.line,
        format!("too many arguments given to '{}'", t),
    )
}

pub fn not_enought_args(t: &Token) -> CompileError {
    CompileError::new(
        ErrorKind::NotEnoughtArgs,
        t.line,
        format!("not enough arguments given to '{}'", t),
    )
}

pub fn variable_is_not_array(t: &Token) -> CompileError {
    CompileError::new(
        ErrorKind::VariableIsNotArray,
        t.line,
        format!("variable '{}' was not declared as an array", t),
    )
}

pub fn array_size_must_be_greater_than(t: &Token) -> CompileError {
    CompileError::new(
        ErrorKind::ArraySizeMustBeGreaterThan,
        t.line,
        format!("size of array '{}' must be >= 2", t),
    )
}

pub fn too_many_array_inits(t: &Token, got: usize, want: i32) -> CompileError {
    CompileError::new(
        ErrorKind::TooManyArrayInits,
        t.line,
        format!("too many array initalizers, got {} needs {}", got, want),
    )
}

pub fn array_init_in_func(t: &Token) -> CompileError {
    CompileError::new(
        ErrorKind::ArrayInitInFunc,
        t.line,
        "array initalizers only valid for globals",
    )
}

pub fn constant_divide_by_zero(line: LineInfo) -> CompileError {
    CompileError::new(ErrorKind::ConstantDivideByZero, line, "constant divide by zero")
}

pub fn cant_evaluate_constant(t: &Token) -> CompileError {
    CompileError::new(
        ErrorKind::CantEvaluateConstant,
        t.line,
        format!("error evaluating const expression for '{}'", t),
    )
}

pub fn internal(line: LineInfo, what: &str) -> CompileError {
    CompileError::new(ErrorKind::Internal, line, format!("internal error: {}", what))
}
