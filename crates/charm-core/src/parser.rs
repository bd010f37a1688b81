//! Recursive-descent parser with Pratt-style precedence climbing for binary
//! operators.
//!
//! The parser owns the [`Interner`] for the duration of the parse: every
//! identifier and string literal is interned as it's recognized, so the
//! resulting [`Program`] only ever carries canonical [`StringRef`]s.

use crate::ast::{BinaryOp, Expr, Program, Stmt, UnaryOp};
use crate::error::ParseError;
use crate::intern::{sanitize_string, Interner, StringRef};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

const MAX_ARGS: usize = 255;
const MAX_PARAMS: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

impl Precedence {
    fn next(self) -> Self {
        match self {
            Precedence::None => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call | Precedence::Primary => Precedence::Primary,
        }
    }
}

fn infix_precedence(kind: TokenKind) -> Precedence {
    match kind {
        TokenKind::Or => Precedence::Or,
        TokenKind::And => Precedence::And,
        TokenKind::EqualEqual | TokenKind::BangEqual => Precedence::Equality,
        TokenKind::Greater | TokenKind::GreaterEqual | TokenKind::Less | TokenKind::LessEqual => {
            Precedence::Comparison
        }
        TokenKind::Plus | TokenKind::Minus => Precedence::Term,
        TokenKind::Star | TokenKind::Slash => Precedence::Factor,
        _ => Precedence::None,
    }
}

pub struct Parser<'src> {
    lexer: Lexer<'src>,
    previous: Token<'src>,
    current: Token<'src>,
    interner: &'src mut Interner,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str, interner: &'src mut Interner) -> Self {
        let mut lexer = Lexer::new(source);
        let mut first = lexer.next_token();
        // Comments never reach the parser.
        while first.kind == TokenKind::Comment {
            first = lexer.next_token();
        }
        Self { lexer, previous: first, current: first, interner }
    }

    pub fn parse_program(mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::Eof) {
            statements.push(self.declaration()?);
        }
        Ok(Program { statements })
    }

    // ---- token plumbing ----

    fn advance(&mut self) -> Token<'src> {
        self.previous = self.current;
        loop {
            self.current = self.lexer.next_token();
            if self.current.kind != TokenKind::Comment {
                break;
            }
        }
        self.previous
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token<'src>, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(ParseError::UnexpectedToken { expected: kind, found: self.current.kind, line: self.current.line })
        }
    }

    fn intern_current_lexeme(&mut self) -> StringRef {
        self.interner.intern(self.previous.lexeme)
    }

    // ---- declarations & statements ----

    fn declaration(&mut self) -> Result<Stmt, ParseError> {
        if self.match_token(TokenKind::Var) {
            self.var_decl()
        } else if self.match_token(TokenKind::Function) {
            self.function_decl()
        } else {
            self.statement()
        }
    }

    fn var_decl(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::Identifier)?;
        let name = self.intern_current_lexeme();
        let init = if self.match_token(TokenKind::Equal) { Some(self.expression()?) } else { None };
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::VarDecl { name, init })
    }

    fn function_decl(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::Identifier)?;
        let name = self.intern_current_lexeme();
        self.expect(TokenKind::LeftParen)?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_PARAMS {
                    return Err(ParseError::TooManyParameters { line: self.current.line });
                }
                self.expect(TokenKind::Identifier)?;
                params.push(self.intern_current_lexeme());
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen)?;
        self.expect(TokenKind::LeftBrace)?;
        let body = std::rc::Rc::new(self.block()?);
        Ok(Stmt::FunctionDecl { name, params, body })
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        if self.match_token(TokenKind::If) {
            self.if_stmt()
        } else if self.match_token(TokenKind::While) {
            self.while_stmt()
        } else if self.match_token(TokenKind::For) {
            self.for_stmt()
        } else if self.match_token(TokenKind::Return) {
            self.return_stmt()
        } else if self.match_token(TokenKind::LeftBrace) {
            self.block()
        } else {
            self.expr_stmt()
        }
    }

    fn block(&mut self) -> Result<Stmt, ParseError> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            statements.push(self.declaration()?);
        }
        self.expect(TokenKind::RightBrace)?;
        Ok(Stmt::Block(statements))
    }

    fn if_stmt(&mut self) -> Result<Stmt, ParseError> {
        let cond = self.expression()?;
        self.expect(TokenKind::LeftBrace)?;
        let then_branch = Box::new(self.block()?);
        let else_branch = if self.match_token(TokenKind::Else) {
            if self.match_token(TokenKind::If) {
                Some(Box::new(self.if_stmt()?))
            } else {
                self.expect(TokenKind::LeftBrace)?;
                Some(Box::new(self.block()?))
            }
        } else {
            None
        };
        Ok(Stmt::If { cond, then_branch, else_branch })
    }

    fn while_stmt(&mut self) -> Result<Stmt, ParseError> {
        let cond = self.expression()?;
        self.expect(TokenKind::LeftBrace)?;
        let body = Box::new(self.block()?);
        Ok(Stmt::While { cond, body })
    }

    /// Desugars `for init; cond; incr { body }` into
    /// `{ init; while (cond) { body; incr; } }`, building the nodes
    /// bottom-up rather than mutating an already constructed `While` in
    /// place, since AST nodes here are immutable once built.
    ///
    /// The clauses are not parenthesized: `for` takes no `(`/`)`, matching
    /// how `if`/`while` take none.
    fn for_stmt(&mut self) -> Result<Stmt, ParseError> {
        let init = if self.match_token(TokenKind::Semicolon) {
            None
        } else if self.match_token(TokenKind::Var) {
            Some(self.var_decl()?)
        } else {
            Some(self.expr_stmt()?)
        };

        let cond = if self.check(TokenKind::Semicolon) { Expr::Boolean(true) } else { self.expression()? };
        self.expect(TokenKind::Semicolon)?;

        let incr = if self.check(TokenKind::LeftBrace) { None } else { Some(self.expression()?) };

        self.expect(TokenKind::LeftBrace)?;
        let body = self.block()?;

        let mut loop_body = match body {
            Stmt::Block(stmts) => stmts,
            other => vec![other],
        };
        if let Some(incr) = incr {
            loop_body.push(Stmt::Expr(incr));
        }
        let while_stmt = Stmt::While { cond, body: Box::new(Stmt::Block(loop_body)) };

        Ok(match init {
            Some(init) => Stmt::Block(vec![init, while_stmt]),
            None => while_stmt,
        })
    }

    fn return_stmt(&mut self) -> Result<Stmt, ParseError> {
        let expr = if self.check(TokenKind::Semicolon) { None } else { Some(self.expression()?) };
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::Return(expr))
    }

    fn expr_stmt(&mut self) -> Result<Stmt, ParseError> {
        let expr = self.expression()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::Expr(expr))
    }

    // ---- expressions ----

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, ParseError> {
        let expr = self.precedence(Precedence::Or)?;
        if self.match_token(TokenKind::Equal) {
            let line = self.previous.line;
            let value = self.assignment()?;
            return match expr {
                Expr::Identifier(name) => Ok(Expr::Assignment { name, value: Box::new(value) }),
                _ => Err(ParseError::InvalidAssignmentTarget { line }),
            };
        }
        Ok(expr)
    }

    fn precedence(&mut self, min: Precedence) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;
        while infix_precedence(self.current.kind) >= min && infix_precedence(self.current.kind) != Precedence::None {
            let op_token = self.advance();
            let op = binary_op(op_token.kind);
            let next_min = infix_precedence(op_token.kind).next();
            let right = self.precedence(next_min)?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.match_token(TokenKind::Not) {
            let right = self.unary()?;
            return Ok(Expr::Unary { op: UnaryOp::Not, right: Box::new(right) });
        }
        if self.match_token(TokenKind::Minus) {
            let right = self.unary()?;
            return Ok(Expr::Unary { op: UnaryOp::Negate, right: Box::new(right) });
        }
        self.call()
    }

    fn call(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        while self.match_token(TokenKind::LeftParen) {
            expr = self.finish_call(expr)?;
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, ParseError> {
        let mut arguments = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if arguments.len() >= MAX_ARGS {
                    return Err(ParseError::TooManyArguments { line: self.current.line });
                }
                arguments.push(self.expression()?);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen)?;
        Ok(Expr::Call { callee: Box::new(callee), arguments })
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        if self.match_token(TokenKind::Number) {
            let text = self.previous.lexeme;
            let value: f64 = text.parse().expect("lexer only produces well-formed number lexemes");
            return Ok(Expr::Number(value));
        }
        if self.match_token(TokenKind::True) {
            return Ok(Expr::Boolean(true));
        }
        if self.match_token(TokenKind::False) {
            return Ok(Expr::Boolean(false));
        }
        if self.match_token(TokenKind::Nil) {
            return Ok(Expr::Nil);
        }
        if self.match_token(TokenKind::String) {
            let line = self.previous.line;
            let sanitized =
                sanitize_string(self.previous.lexeme).map_err(|escape| ParseError::InvalidEscape { escape, line })?;
            let interned = self.interner.intern(&sanitized);
            return Ok(Expr::StringLiteral(interned));
        }
        if self.match_token(TokenKind::Identifier) {
            let name = self.intern_current_lexeme();
            return Ok(Expr::Identifier(name));
        }
        if self.match_token(TokenKind::LeftParen) {
            let inner = self.expression()?;
            self.expect(TokenKind::RightParen)?;
            return Ok(Expr::Grouping(Box::new(inner)));
        }
        if self.check(TokenKind::Invalid) {
            let line = self.current.line;
            return Err(ParseError::UnterminatedString { line });
        }
        Err(ParseError::UnexpectedStart { found: self.current.kind, line: self.current.line })
    }
}

fn binary_op(kind: TokenKind) -> BinaryOp {
    match kind {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::EqualEqual => BinaryOp::Equal,
        TokenKind::BangEqual => BinaryOp::NotEqual,
        TokenKind::Greater => BinaryOp::Greater,
        TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
        TokenKind::Less => BinaryOp::Less,
        TokenKind::LessEqual => BinaryOp::LessEqual,
        TokenKind::And => BinaryOp::And,
        TokenKind::Or => BinaryOp::Or,
        other => unreachable!("{other:?} is not a binary operator token"),
    }
}

pub fn parse(source: &str, interner: &mut Interner) -> Result<Program, ParseError> {
    Parser::new(source, interner).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Program {
        let mut interner = Interner::new();
        parse(src, &mut interner).expect("should parse")
    }

    #[test]
    fn parses_arithmetic_precedence() {
        let program = parse_ok("1 + 2 * 3;");
        assert_eq!(program.statements.len(), 1);
        match &program.statements[0] {
            Stmt::Expr(Expr::Binary { op: BinaryOp::Add, right, .. }) => {
                assert!(matches!(**right, Expr::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn for_loop_desugars_to_block_while() {
        let program = parse_ok("for var i = 0; i < 3; i = i + 1 { print(i); }");
        assert_eq!(program.statements.len(), 1);
        assert!(matches!(program.statements[0], Stmt::Block(_)));
    }

    #[test]
    fn assignment_to_non_identifier_is_a_parse_error() {
        let mut interner = Interner::new();
        let err = parse("1 + 1 = 2;", &mut interner).unwrap_err();
        assert!(matches!(err, ParseError::InvalidAssignmentTarget { .. }));
    }

    #[test]
    fn and_or_are_left_associative_binary_exprs() {
        let program = parse_ok("true and false or true;");
        match &program.statements[0] {
            Stmt::Expr(Expr::Binary { op: BinaryOp::Or, .. }) => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn function_decl_parses_params_and_body() {
        let program = parse_ok("function add(a, b) { return a + b; }");
        match &program.statements[0] {
            Stmt::FunctionDecl { params, .. } => assert_eq!(params.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }
}
