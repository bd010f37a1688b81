//! Typed errors for every stage of the pipeline.
//!
//! The reference implementation prints a message and aborts (or, for
//! compile-time limit violations, prints and silently continues). This
//! implementation surfaces every failure as a `Result` instead: parse
//! failures halt the parse (no statement-boundary recovery — the first
//! error wins, matching the reference's control flow even though the
//! mechanism changed), compiler limit violations are hard errors, and
//! runtime errors are shared between the tree-walk interpreter and the VM so
//! the two back ends can be compared not just on stdout but on whether they
//! failed at all.

use thiserror::Error;

use crate::token::TokenKind;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("expected token `{expected:?}`, found `{found:?}` on line {line}")]
    UnexpectedToken { expected: TokenKind, found: TokenKind, line: u32 },

    #[error("unexpected token `{found:?}` on line {line}")]
    UnexpectedStart { found: TokenKind, line: u32 },

    #[error("unterminated string literal on line {line}")]
    UnterminatedString { line: u32 },

    #[error("invalid escape sequence `\\{escape}` on line {line}")]
    InvalidEscape { escape: char, line: u32 },

    #[error("invalid assignment target on line {line}")]
    InvalidAssignmentTarget { line: u32 },

    #[error("too many call arguments on line {line} (max 255)")]
    TooManyArguments { line: u32 },

    #[error("too many function parameters on line {line} (max 255)")]
    TooManyParameters { line: u32 },
}

#[derive(Debug, Error, PartialEq)]
pub enum CompileError {
    #[error("too many constants in one chunk (max 256)")]
    TooManyConstants,

    #[error("too many local variables in one scope (max 256)")]
    TooManyLocals,

    #[error("jump offset {offset} out of range for a 16-bit operand")]
    JumpTooFar { offset: i64 },

    #[error("a local variable cannot reference itself in its own initializer")]
    SelfReferentialInitializer,

    #[error("{0} is not supported by the bytecode compiler; run this program with the tree-walk interpreter instead")]
    Unsupported(&'static str),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("operand must be a number")]
    ExpectedNumber,

    #[error("operand must be a boolean")]
    ExpectedBool,

    #[error("undefined variable `{name}`")]
    UndefinedVariable { name: String },

    #[error("cannot assign {new_type} to variable `{name}` previously bound to {old_type}")]
    TypeMismatchOnAssign { name: String, old_type: &'static str, new_type: &'static str },

    #[error("value of type {0} is not callable")]
    NotCallable(&'static str),

    #[error("expected {expected} arguments, got {got}")]
    WrongArity { expected: usize, got: usize },

    #[error("stack overflow")]
    StackOverflow,
}
