//! Recursive-descent parser building the syntax tree inside an arena.
//!
//! Statements are told apart with at most three tokens of lookahead and no
//! backtracking. Binary expressions use precedence climbing: after a term,
//! every operator whose precedence reaches the current minimum is consumed,
//! its right-hand side is parsed with the minimum raised by one, and the two
//! sides are folded into a new left-hand side. That keeps equal-precedence
//! operators left-associative.
//!
//! Parsing stops at the first error. Diagnostics point at the line of the
//! last token successfully consumed.

use tracing::debug;

use crate::arena::Arena;
use crate::ast::{BinaryOp, ElseChain, Expr, Program, Scope, Stmt, StmtList, Term};
use crate::error::{ExpectedSnafu, NestingTooDeepSnafu, ParseError};
use crate::tokenizer::{Token, TokenKind, describe_token};

type ParseResult<T> = Result<T, ParseError>;

/// How many scopes and parentheses may enclose each other.
pub const MAX_NESTING: usize = 256;

/// Parse a whole program, allocating its nodes in `arena`.
pub fn parse<'a>(tokens: &'a [Token], arena: &'a Arena) -> ParseResult<Program<'a>> {
  let mut parser = Parser::new(tokens, arena);
  let mut stmts = Vec::new();

  while !parser.stream.is_eof() {
    match parser.parse_stmt()? {
      Some(stmt) => stmts.push(stmt),
      None => return parser.stream.error("statement"),
    }
  }

  debug!(
    statements = stmts.len(),
    arena_bytes = arena.allocated_bytes(),
    "parsed program"
  );
  Ok(Program::new(StmtList::new_in(arena, stmts)?))
}

fn binary_op(kind: TokenKind) -> Option<BinaryOp> {
  match kind {
    TokenKind::Plus => Some(BinaryOp::Add),
    TokenKind::Minus => Some(BinaryOp::Sub),
    TokenKind::Star => Some(BinaryOp::Mul),
    TokenKind::FSlash => Some(BinaryOp::Div),
    _ => None,
  }
}

struct Parser<'a> {
  stream: TokenStream<'a>,
  arena: &'a Arena,
  depth: usize,
}

impl<'a> Parser<'a> {
  fn new(tokens: &'a [Token], arena: &'a Arena) -> Self {
    Self {
      stream: TokenStream::new(tokens),
      arena,
      depth: 0,
    }
  }

  fn enter(&mut self) -> ParseResult<()> {
    self.depth += 1;
    if self.depth > MAX_NESTING {
      return NestingTooDeepSnafu {
        limit: MAX_NESTING,
        line: self.stream.line(),
      }
      .fail();
    }
    Ok(())
  }

  fn leave(&mut self) {
    self.depth -= 1;
  }

  /// Returns `Ok(None)` when the upcoming tokens start no statement.
  fn parse_stmt(&mut self) -> ParseResult<Option<&'a Stmt<'a>>> {
    let stmt = match (
      self.stream.peek_kind(0),
      self.stream.peek_kind(1),
      self.stream.peek_kind(2),
    ) {
      (Some(TokenKind::Exit), Some(TokenKind::OpenParen), _) => self.parse_exit()?,
      (Some(TokenKind::Let), Some(TokenKind::Ident), Some(TokenKind::Eq)) => self.parse_let()?,
      (Some(TokenKind::Ident), Some(TokenKind::Eq), _) => self.parse_assign()?,
      (Some(TokenKind::OpenCurly), _, _) => Stmt::Scope(self.parse_scope()?),
      (Some(TokenKind::If), _, _) => self.parse_if()?,
      _ => return Ok(None),
    };
    Ok(Some(self.arena.alloc(stmt)?))
  }

  fn parse_exit(&mut self) -> ParseResult<Stmt<'a>> {
    self.stream.skip(TokenKind::Exit)?;
    self.stream.skip(TokenKind::OpenParen)?;
    let expr = self.parse_expr(0)?;
    self.stream.skip(TokenKind::CloseParen)?;
    self.stream.skip(TokenKind::Semi)?;
    Ok(Stmt::Exit(expr))
  }

  fn parse_let(&mut self) -> ParseResult<Stmt<'a>> {
    self.stream.skip(TokenKind::Let)?;
    let name = self.stream.skip(TokenKind::Ident)?;
    self.stream.skip(TokenKind::Eq)?;
    let expr = self.parse_expr(0)?;
    self.stream.skip(TokenKind::Semi)?;
    Ok(Stmt::Let { name, expr })
  }

  fn parse_assign(&mut self) -> ParseResult<Stmt<'a>> {
    let name = self.stream.skip(TokenKind::Ident)?;
    self.stream.skip(TokenKind::Eq)?;
    let expr = self.parse_expr(0)?;
    self.stream.skip(TokenKind::Semi)?;
    Ok(Stmt::Assign { name, expr })
  }

  fn parse_if(&mut self) -> ParseResult<Stmt<'a>> {
    self.stream.skip(TokenKind::If)?;
    let (cond, body) = self.parse_guarded_scope()?;
    let chain = self.parse_else_chain()?;
    Ok(Stmt::If { cond, body, chain })
  }

  /// `"(" expr ")" scope`, shared by `if` and `elif`.
  fn parse_guarded_scope(&mut self) -> ParseResult<(&'a Expr<'a>, &'a Scope<'a>)> {
    self.stream.skip(TokenKind::OpenParen)?;
    let cond = self.parse_expr(0)?;
    self.stream.skip(TokenKind::CloseParen)?;
    let body = self.parse_scope()?;
    Ok((cond, body))
  }

  /// Branches are collected first and linked back to front, so a long
  /// `elif` run does not nest calls.
  fn parse_else_chain(&mut self) -> ParseResult<Option<&'a ElseChain<'a>>> {
    let mut branches = Vec::new();
    let mut chain = None;
    loop {
      if self.stream.equal(TokenKind::Elif) {
        branches.push(self.parse_guarded_scope()?);
      } else {
        if self.stream.equal(TokenKind::Else) {
          let body = self.parse_scope()?;
          chain = Some(self.arena.alloc(ElseChain::Else(body))?);
        }
        break;
      }
    }

    for (cond, body) in branches.into_iter().rev() {
      chain = Some(self.arena.alloc(ElseChain::ElseIf {
        cond,
        body,
        next: chain,
      })?);
    }
    Ok(chain)
  }

  fn parse_scope(&mut self) -> ParseResult<&'a Scope<'a>> {
    if !self.stream.equal(TokenKind::OpenCurly) {
      return self.stream.error("scope");
    }
    self.enter()?;
    let mut stmts = Vec::new();
    while let Some(stmt) = self.parse_stmt()? {
      stmts.push(stmt);
    }
    self.stream.skip(TokenKind::CloseCurly)?;
    self.leave();
    let stmts = StmtList::new_in(self.arena, stmts)?;
    Ok(self.arena.alloc(Scope { stmts })?)
  }

  fn parse_expr(&mut self, min_prec: u8) -> ParseResult<&'a Expr<'a>> {
    let mut lhs = self.parse_term()?;

    while let Some(kind) = self.stream.peek_kind(0)
      && let Some(prec) = kind.binary_precedence()
      && prec >= min_prec
      && let Some(op) = binary_op(kind)
    {
      self.stream.advance();
      let rhs = self.parse_expr(prec + 1)?;
      lhs = self.arena.alloc(Expr::Binary { op, lhs, rhs })?;
    }

    Ok(lhs)
  }

  fn parse_term(&mut self) -> ParseResult<&'a Expr<'a>> {
    let term = match self.stream.peek_kind(0) {
      Some(TokenKind::IntLit) => Term::IntLit(self.stream.advance()),
      Some(TokenKind::Ident) => Term::Ident(self.stream.advance()),
      Some(TokenKind::OpenParen) => {
        self.stream.advance();
        self.enter()?;
        let inner = self.parse_expr(0)?;
        self.stream.skip(TokenKind::CloseParen)?;
        self.leave();
        Term::Paren(inner)
      }
      _ => return self.stream.error("expression"),
    };
    Ok(self.arena.alloc(Expr::Term(term))?)
  }
}

/// Lightweight cursor over the token slice.
struct TokenStream<'a> {
  tokens: &'a [Token],
  pos: usize,
}

impl<'a> TokenStream<'a> {
  fn new(tokens: &'a [Token]) -> Self {
    Self { tokens, pos: 0 }
  }

  fn peek(&self, offset: usize) -> Option<&'a Token> {
    self.tokens.get(self.pos + offset)
  }

  fn peek_kind(&self, offset: usize) -> Option<TokenKind> {
    self.peek(offset).map(|token| token.kind)
  }

  /// Consume the current token. Callers check that one exists first.
  fn advance(&mut self) -> &'a Token {
    let tokens = self.tokens;
    let token = &tokens[self.pos];
    self.pos += 1;
    token
  }

  /// Consume the current token if it has the given kind.
  fn equal(&mut self, kind: TokenKind) -> bool {
    if self.peek_kind(0) == Some(kind) {
      self.pos += 1;
      return true;
    }
    false
  }

  fn skip(&mut self, kind: TokenKind) -> ParseResult<&'a Token> {
    if self.peek_kind(0) == Some(kind) {
      Ok(self.advance())
    } else {
      self.error(kind.describe())
    }
  }

  /// Line of the last consumed token, falling back to the upcoming one.
  fn line(&self) -> usize {
    self
      .pos
      .checked_sub(1)
      .and_then(|last| self.tokens.get(last))
      .or_else(|| self.peek(0))
      .map_or(1, |token| token.line)
  }

  fn error<T>(&self, expected: &str) -> ParseResult<T> {
    ExpectedSnafu {
      expected,
      got: describe_token(self.peek(0)),
      line: self.line(),
    }
    .fail()
  }

  fn is_eof(&self) -> bool {
    self.pos >= self.tokens.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ast::expr_to_string;
  use crate::error::ArenaError;
  use crate::tokenizer::tokenize;

  fn parse_source(source: &str) -> ParseResult<String> {
    let tokens = tokenize(source).expect("source should tokenize");
    let arena = Arena::default();
    parse(&tokens, &arena).map(|program| program.to_string())
  }

  fn dump(source: &str) -> String {
    parse_source(source).expect("source should parse")
  }

  fn expected(expected: &str, got: &str, line: usize) -> ParseError {
    ParseError::Expected {
      expected: expected.to_string(),
      got: got.to_string(),
      line,
    }
  }

  #[test]
  fn multiplication_binds_tighter_than_addition() {
    assert_eq!(dump("exit(1+2*3);"), "(exit (+ 1 (* 2 3)))\n");
    assert_eq!(dump("exit(1*2+3);"), "(exit (+ (* 1 2) 3))\n");
  }

  #[test]
  fn equal_precedence_folds_left() {
    assert_eq!(dump("exit(8-4-2);"), "(exit (- (- 8 4) 2))\n");
    assert_eq!(dump("exit(8/4*2);"), "(exit (* (/ 8 4) 2))\n");
  }

  #[test]
  fn parentheses_override_precedence() {
    assert_eq!(dump("exit((1+2)*3);"), "(exit (* (paren (+ 1 2)) 3))\n");
  }

  #[test]
  fn binary_node_holds_both_operands() {
    let tokens = tokenize("exit(1+2*3);").unwrap();
    let arena = Arena::default();
    let program = parse(&tokens, &arena).unwrap();
    let Some(Stmt::Exit(expr)) = program.statements().iter().next() else {
      panic!("expected exit statement");
    };
    let Expr::Binary { op, lhs, rhs } = expr else {
      panic!("expected binary expression");
    };
    assert_eq!(*op, BinaryOp::Add);
    assert_eq!(expr_to_string(lhs), "1");
    assert_eq!(expr_to_string(rhs), "(* 2 3)");
  }

  #[test]
  fn statements_and_nested_scopes() {
    assert_eq!(
      dump("let x = 1; x = x + 1; { let y = x; { } } exit(x);"),
      "(let x 1)\n(assign x (+ x 1))\n(scope (let y x) (scope))\n(exit x)\n"
    );
  }

  #[test]
  fn if_elif_else_chain() {
    assert_eq!(
      dump("if (x) { exit(1); } elif (y) { exit(2); } elif (z) { } else { exit(3); }"),
      "(if x (scope (exit 1)) (elif y (scope (exit 2)) (elif z (scope) (else (scope (exit 3))))))\n"
    );
    assert_eq!(dump("if (1) {}"), "(if 1 (scope))\n");
  }

  #[test]
  fn empty_program_parses() {
    let tokens = tokenize("").unwrap();
    let arena = Arena::default();
    assert!(parse(&tokens, &arena).unwrap().statements().is_empty());
  }

  #[test]
  fn missing_semicolon_reports_last_consumed_line() {
    let err = parse_source("let x = 1\nexit(x);").unwrap_err();
    assert_eq!(err, expected("`;`", "`exit`", 1));
  }

  #[test]
  fn unmatched_paren_reports_end_of_input() {
    let err = parse_source("exit((1 + 2);").unwrap_err();
    assert_eq!(err, expected("`)`", "`;`", 1));
    let err = parse_source("exit(1").unwrap_err();
    assert_eq!(err, expected("`)`", "end of input", 1));
  }

  #[test]
  fn unknown_statement_start_is_rejected() {
    let err = parse_source("exit(0);\n\n5;").unwrap_err();
    assert_eq!(err, expected("statement", "int literal `5`", 1));
    let err = parse_source("let = 4;").unwrap_err();
    assert_eq!(err, expected("statement", "`let`", 1));
  }

  #[test]
  fn malformed_if_is_rejected() {
    let err = parse_source("if x { }").unwrap_err();
    assert_eq!(err, expected("`(`", "identifier `x`", 1));
    let err = parse_source("if (x)\nexit(1);").unwrap_err();
    assert_eq!(err, expected("scope", "`exit`", 1));
    let err = parse_source("if (x) { } else exit(1);").unwrap_err();
    assert_eq!(err, expected("scope", "`exit`", 1));
  }

  #[test]
  fn unclosed_scope_is_rejected() {
    let err = parse_source("{ let x = 1;\n").unwrap_err();
    assert_eq!(err, expected("`}`", "end of input", 1));
  }

  #[test]
  fn dangling_operator_needs_an_expression() {
    let err = parse_source("exit(1 +);").unwrap_err();
    assert_eq!(err, expected("expression", "`)`", 1));
  }

  #[test]
  fn unary_minus_is_not_part_of_the_grammar() {
    let err = parse_source("exit(-1);").unwrap_err();
    assert_eq!(err, expected("expression", "`-`", 1));
  }

  #[test]
  fn tiny_arena_reports_exhaustion() {
    let tokens = tokenize("exit(1 + 2 + 3 + 4);").unwrap();
    let arena = Arena::with_capacity(std::mem::size_of::<Expr>() * 2);
    let err = parse(&tokens, &arena).unwrap_err();
    assert!(matches!(
      err,
      ParseError::Arena {
        source: ArenaError::Exhausted { .. }
      }
    ));
  }

  #[test]
  fn deep_parentheses_hit_the_nesting_limit() {
    let source = format!("exit({}1{});", "(".repeat(30_000), ")".repeat(30_000));
    assert_eq!(
      parse_source(&source).unwrap_err(),
      ParseError::NestingTooDeep {
        limit: MAX_NESTING,
        line: 1
      }
    );

    let depth = MAX_NESTING - 1;
    let source = format!("exit({}1{});", "(".repeat(depth), ")".repeat(depth));
    assert!(parse_source(&source).is_ok());
  }

  #[test]
  fn deep_scopes_hit_the_nesting_limit() {
    let source = format!("{}{}", "{".repeat(10_000), "}".repeat(10_000));
    assert!(matches!(
      parse_source(&source).unwrap_err(),
      ParseError::NestingTooDeep { .. }
    ));
  }

  #[test]
  fn long_operator_chains_are_not_nesting() {
    let source = format!("exit(1{});", " + 1".repeat(20_000));
    let text = dump(&source);
    assert!(text.starts_with("(exit (+ (+ "));
  }

  #[test]
  fn long_elif_runs_are_not_nesting() {
    let source = format!("if (0) {{ }}{} else {{ exit(1); }}", " elif (0) { }".repeat(5_000));
    let text = dump(&source);
    assert_eq!(text.matches("(elif 0 (scope)").count(), 5_000);
    let tail = format!("(else (scope (exit 1))){}\n", ")".repeat(5_001));
    assert!(text.ends_with(&tail));
  }
}
