//! The abstract syntax tree produced by the parser.
//!
//! Nodes are owned via `Box`, rooted at a [`Program`]; the tree is immutable
//! once built and acyclic, so no arena or reference counting is needed for
//! expressions and statements themselves. A function's body is the one
//! exception: it is wrapped in `Rc` so that a [`crate::value::Value::Function`]
//! can share it cheaply across calls without re-walking or cloning the AST.

use std::rc::Rc;

use crate::intern::StringRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

pub enum Expr {
    Number(f64),
    Boolean(bool),
    Nil,
    StringLiteral(StringRef),
    Identifier(StringRef),
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    Unary { op: UnaryOp, right: Box<Expr> },
    Grouping(Box<Expr>),
    Assignment { name: StringRef, value: Box<Expr> },
    Call { callee: Box<Expr>, arguments: Vec<Expr> },
}

#[derive(Debug)]
pub enum Stmt {
    Expr(Expr),
    VarDecl { name: StringRef, init: Option<Expr> },
    FunctionDecl { name: StringRef, params: Vec<StringRef>, body: Rc<Stmt> },
    Block(Vec<Stmt>),
    If { cond: Expr, then_branch: Box<Stmt>, else_branch: Option<Box<Stmt>> },
    While { cond: Expr, body: Box<Stmt> },
    Return(Option<Expr>),
}

/// A fully parsed program: its top-level statements.
///
/// Interning is threaded through the parser rather than stored on `Program`,
/// since the caller (tree-walk interpreter or compiler) needs the same
/// `Interner` alive to resolve `StringRef`s back to text for printing.
#[derive(Debug, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl std::fmt::Debug for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{n}"),
            Expr::Boolean(b) => write!(f, "{b}"),
            Expr::Nil => write!(f, "nil"),
            Expr::StringLiteral(s) => write!(f, "{:?}", s.as_str()),
            Expr::Identifier(name) => write!(f, "{}", name.as_str()),
            Expr::Binary { op, left, right } => write!(f, "({op:?} {left:?} {right:?})"),
            Expr::Unary { op, right } => write!(f, "({op:?} {right:?})"),
            Expr::Grouping(inner) => write!(f, "(group {inner:?})"),
            Expr::Assignment { name, value } => write!(f, "(= {} {value:?})", name.as_str()),
            Expr::Call { callee, arguments } => write!(f, "(call {callee:?} {arguments:?})"),
        }
    }
}
