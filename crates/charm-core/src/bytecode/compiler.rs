//! Single-pass AST-to-bytecode compiler.
//!
//! Resolves identifiers to local stack slots or global names as it goes,
//! tracks scope depth to know when a block's locals fall out of scope, and
//! patches forward jumps for `if`/`while`/short-circuit `and`/`or` as their
//! targets become known.
//!
//! Function declarations and calls are parsed and tree-walked, but the
//! instruction set this compiler targets has no call opcode (see
//! [`crate::bytecode::op::Opcode`]) — compiling one is a hard
//! [`CompileError::Unsupported`], not a silent no-op.

use crate::ast::{BinaryOp, Expr, Program, Stmt, UnaryOp};
use crate::bytecode::chunk::{Chunk, ChunkBuilder, JumpPatch};
use crate::bytecode::op::Opcode;
use crate::error::CompileError;
use crate::intern::StringRef;
use crate::value::Value;

const MAX_LOCALS: usize = 256;

struct Local {
    name: StringRef,
    /// -1 while declared but not yet initialized (its initializer is still
    /// being compiled and must not be able to see its own slot).
    depth: i32,
}

pub struct Compiler {
    builder: ChunkBuilder,
    locals: Vec<Local>,
    scope_depth: i32,
}

impl Compiler {
    pub fn new() -> Self {
        Self { builder: ChunkBuilder::new(), locals: Vec::new(), scope_depth: 0 }
    }

    pub fn compile(program: &Program) -> Result<Chunk, CompileError> {
        let mut compiler = Self::new();
        for stmt in &program.statements {
            compiler.compile_stmt(stmt)?;
        }
        compiler.builder.emit(Opcode::Return);
        Ok(compiler.builder.build())
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Expr(expr) => {
                self.compile_expr(expr)?;
                self.builder.emit(Opcode::Pop);
                Ok(())
            }
            Stmt::VarDecl { name, init } => self.compile_var_decl(*name, init.as_ref()),
            Stmt::FunctionDecl { .. } => Err(CompileError::Unsupported("function declarations")),
            Stmt::Block(stmts) => {
                self.begin_scope();
                for stmt in stmts {
                    self.compile_stmt(stmt)?;
                }
                self.end_scope();
                Ok(())
            }
            Stmt::If { cond, then_branch, else_branch } => self.compile_if(cond, then_branch, else_branch.as_deref()),
            Stmt::While { cond, body } => self.compile_while(cond, body),
            Stmt::Return(_) => Err(CompileError::Unsupported("return statements")),
        }
    }

    fn compile_var_decl(&mut self, name: StringRef, init: Option<&Expr>) -> Result<(), CompileError> {
        if self.scope_depth == 0 {
            let idx = self.builder.add_constant(Value::Cell(name))?;
            match init {
                Some(expr) => self.compile_expr(expr)?,
                None => self.builder.emit(Opcode::Nil),
            }
            self.builder.emit_u8(Opcode::DefineGlobal, idx);
            Ok(())
        } else {
            self.declare_local(name)?;
            match init {
                Some(expr) => self.compile_expr(expr)?,
                None => self.builder.emit(Opcode::Nil),
            }
            self.mark_initialized();
            Ok(())
        }
    }

    fn declare_local(&mut self, name: StringRef) -> Result<(), CompileError> {
        if self.locals.len() >= MAX_LOCALS {
            return Err(CompileError::TooManyLocals);
        }
        self.locals.push(Local { name, depth: -1 });
        Ok(())
    }

    fn mark_initialized(&mut self) {
        if let Some(local) = self.locals.last_mut() {
            local.depth = self.scope_depth;
        }
    }

    fn begin_scope(&mut self) {
        self.scope_depth += 1;
    }

    /// Pops every local declared in the scope just closed, one `POP` each.
    fn end_scope(&mut self) {
        self.scope_depth -= 1;
        while let Some(local) = self.locals.last() {
            if local.depth <= self.scope_depth {
                break;
            }
            self.builder.emit(Opcode::Pop);
            self.locals.pop();
        }
    }

    /// Resolves `name` against the locals array, from the top down.
    ///
    /// A local whose `depth` is still `-1` is mid-declaration: its own
    /// initializer is being compiled and must not be able to see it. That
    /// case is reported to the caller instead of silently skipped, so a
    /// self-referential initializer (`var a = a;`) is a compile error rather
    /// than a resolve to whatever `a` means in an enclosing scope.
    fn resolve_local(&self, name: StringRef) -> Result<Option<u8>, CompileError> {
        for (idx, local) in self.locals.iter().enumerate().rev() {
            if local.name == name {
                if local.depth == -1 {
                    return Err(CompileError::SelfReferentialInitializer);
                }
                return Ok(Some(idx as u8));
            }
        }
        Ok(None)
    }

    fn compile_if(&mut self, cond: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>) -> Result<(), CompileError> {
        self.compile_expr(cond)?;
        let then_jump = self.builder.emit_jump(Opcode::JumpIfFalse);
        self.builder.emit(Opcode::Pop);
        self.compile_stmt(then_branch)?;
        let else_jump = self.builder.emit_jump(Opcode::Jump);
        self.builder.patch_jump(then_jump)?;
        self.builder.emit(Opcode::Pop);
        if let Some(else_branch) = else_branch {
            self.compile_stmt(else_branch)?;
        }
        self.builder.patch_jump(else_jump)?;
        Ok(())
    }

    fn compile_while(&mut self, cond: &Expr, body: &Stmt) -> Result<(), CompileError> {
        let loop_start = self.builder.current_offset();
        self.compile_expr(cond)?;
        let exit_jump = self.builder.emit_jump(Opcode::JumpIfFalse);
        self.builder.emit(Opcode::Pop);
        self.compile_stmt(body)?;
        self.builder.emit_loop(loop_start)?;
        self.builder.patch_jump(exit_jump)?;
        self.builder.emit(Opcode::Pop);
        Ok(())
    }

    fn compile_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Number(n) => self.builder.emit_constant(Value::Number(*n)),
            Expr::Boolean(true) => {
                self.builder.emit(Opcode::True);
                Ok(())
            }
            Expr::Boolean(false) => {
                self.builder.emit(Opcode::False);
                Ok(())
            }
            Expr::Nil => {
                self.builder.emit(Opcode::Nil);
                Ok(())
            }
            Expr::StringLiteral(s) => self.builder.emit_constant(Value::Cell(*s)),
            Expr::Identifier(name) => self.compile_named_variable_get(*name),
            Expr::Grouping(inner) => self.compile_expr(inner),
            Expr::Unary { op, right } => {
                self.compile_expr(right)?;
                self.builder.emit(match op {
                    UnaryOp::Negate => Opcode::Negate,
                    UnaryOp::Not => Opcode::Not,
                });
                Ok(())
            }
            Expr::Binary { op: BinaryOp::And, left, right } => self.compile_and(left, right),
            Expr::Binary { op: BinaryOp::Or, left, right } => self.compile_or(left, right),
            Expr::Binary { op, left, right } => self.compile_binary(*op, left, right),
            Expr::Assignment { name, value } => {
                self.compile_expr(value)?;
                self.compile_named_variable_set(*name)
            }
            Expr::Call { .. } => Err(CompileError::Unsupported("function calls")),
        }
    }

    fn compile_named_variable_get(&mut self, name: StringRef) -> Result<(), CompileError> {
        match self.resolve_local(name)? {
            Some(slot) => {
                self.builder.emit_u8(Opcode::GetLocal, slot);
                Ok(())
            }
            None => {
                let idx = self.builder.add_constant(Value::Cell(name))?;
                self.builder.emit_u8(Opcode::GetGlobal, idx);
                Ok(())
            }
        }
    }

    fn compile_named_variable_set(&mut self, name: StringRef) -> Result<(), CompileError> {
        match self.resolve_local(name)? {
            Some(slot) => {
                self.builder.emit_u8(Opcode::SetLocal, slot);
                Ok(())
            }
            None => {
                let idx = self.builder.add_constant(Value::Cell(name))?;
                self.builder.emit_u8(Opcode::SetGlobal, idx);
                Ok(())
            }
        }
    }

    /// `!=` is `EQUAL` then `NOT`; `>=` is `LESS` then `NOT`; `<=` is
    /// `GREATER` then `NOT` — there are no dedicated opcodes for them.
    fn compile_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<(), CompileError> {
        self.compile_expr(left)?;
        self.compile_expr(right)?;
        match op {
            BinaryOp::Add => self.builder.emit(Opcode::Add),
            BinaryOp::Sub => self.builder.emit(Opcode::Sub),
            BinaryOp::Mul => self.builder.emit(Opcode::Mul),
            BinaryOp::Div => self.builder.emit(Opcode::Div),
            BinaryOp::Equal => self.builder.emit(Opcode::Equal),
            BinaryOp::NotEqual => {
                self.builder.emit(Opcode::Equal);
                self.builder.emit(Opcode::Not);
            }
            BinaryOp::Greater => self.builder.emit(Opcode::Greater),
            BinaryOp::GreaterEqual => {
                self.builder.emit(Opcode::Less);
                self.builder.emit(Opcode::Not);
            }
            BinaryOp::Less => self.builder.emit(Opcode::Less),
            BinaryOp::LessEqual => {
                self.builder.emit(Opcode::Greater);
                self.builder.emit(Opcode::Not);
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("handled by dedicated compile_and/compile_or"),
        }
        Ok(())
    }

    /// `left and right` compiles as: left; `JUMP_IF_FALSE end`; `POP`;
    /// right; patch `end`. If `left` is false, control jumps straight past
    /// the `POP` and `right`, leaving `left`'s `false` on the stack as the
    /// overall result — that's the short circuit.
    fn compile_and(&mut self, left: &Expr, right: &Expr) -> Result<(), CompileError> {
        self.compile_expr(left)?;
        let end_jump = self.builder.emit_jump(Opcode::JumpIfFalse);
        self.builder.emit(Opcode::Pop);
        self.compile_expr(right)?;
        self.builder.patch_jump(end_jump)?;
        Ok(())
    }

    /// `left or right` compiles as: left; `JUMP_IF_FALSE else`; `JUMP end`;
    /// patch `else`; `POP`; right; patch `end`.
    fn compile_or(&mut self, left: &Expr, right: &Expr) -> Result<(), CompileError> {
        self.compile_expr(left)?;
        let else_jump = self.builder.emit_jump(Opcode::JumpIfFalse);
        let end_jump = self.builder.emit_jump(Opcode::Jump);
        self.builder.patch_jump(else_jump)?;
        self.builder.emit(Opcode::Pop);
        self.compile_expr(right)?;
        self.builder.patch_jump(end_jump)?;
        Ok(())
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
