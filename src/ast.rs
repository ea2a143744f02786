//! Syntax tree node families.
//!
//! Every node lives in an [`Arena`] and links to its children through
//! `&'a` references, so a [`Program`] borrows both the arena and the token
//! vector it was parsed from. Each family is a closed enum. Statement lists
//! are singly linked through the arena as well.

use std::fmt::{self, Write};

use crate::arena::Arena;
use crate::error::ArenaError;
use crate::tokenizer::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
}

impl BinaryOp {
  pub fn symbol(self) -> char {
    match self {
      BinaryOp::Add => '+',
      BinaryOp::Sub => '-',
      BinaryOp::Mul => '*',
      BinaryOp::Div => '/',
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Term<'a> {
  IntLit(&'a Token),
  Ident(&'a Token),
  Paren(&'a Expr<'a>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expr<'a> {
  Term(Term<'a>),
  Binary {
    op: BinaryOp,
    lhs: &'a Expr<'a>,
    rhs: &'a Expr<'a>,
  },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scope<'a> {
  pub stmts: StmtList<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElseChain<'a> {
  ElseIf {
    cond: &'a Expr<'a>,
    body: &'a Scope<'a>,
    next: Option<&'a ElseChain<'a>>,
  },
  Else(&'a Scope<'a>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stmt<'a> {
  Exit(&'a Expr<'a>),
  Let {
    name: &'a Token,
    expr: &'a Expr<'a>,
  },
  Assign {
    name: &'a Token,
    expr: &'a Expr<'a>,
  },
  Scope(&'a Scope<'a>),
  If {
    cond: &'a Expr<'a>,
    body: &'a Scope<'a>,
    chain: Option<&'a ElseChain<'a>>,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StmtLink<'a> {
  stmt: &'a Stmt<'a>,
  next: Option<&'a StmtLink<'a>>,
}

/// Statements in source order, linked through the arena.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StmtList<'a> {
  head: Option<&'a StmtLink<'a>>,
}

impl<'a> StmtList<'a> {
  /// Link `stmts` in the arena, keeping their order.
  pub fn new_in(arena: &'a Arena, stmts: Vec<&'a Stmt<'a>>) -> Result<Self, ArenaError> {
    let mut head = None;
    for stmt in stmts.into_iter().rev() {
      head = Some(arena.alloc(StmtLink { stmt, next: head })?);
    }
    Ok(Self { head })
  }

  pub fn iter(&self) -> StmtIter<'a> {
    StmtIter { current: self.head }
  }

  pub fn is_empty(&self) -> bool {
    self.head.is_none()
  }

  pub fn len(&self) -> usize {
    self.iter().count()
  }

  pub fn last(&self) -> Option<&'a Stmt<'a>> {
    self.iter().last()
  }
}

impl<'a> IntoIterator for StmtList<'a> {
  type Item = &'a Stmt<'a>;
  type IntoIter = StmtIter<'a>;

  fn into_iter(self) -> StmtIter<'a> {
    self.iter()
  }
}

pub struct StmtIter<'a> {
  current: Option<&'a StmtLink<'a>>,
}

impl<'a> Iterator for StmtIter<'a> {
  type Item = &'a Stmt<'a>;

  fn next(&mut self) -> Option<Self::Item> {
    let link = self.current?;
    self.current = link.next;
    Some(link.stmt)
  }
}

/// A parsed program. Its nodes live in the arena it was parsed into.
#[derive(Debug, Clone, Copy)]
pub struct Program<'a> {
  stmts: StmtList<'a>,
}

impl<'a> Program<'a> {
  pub fn new(stmts: StmtList<'a>) -> Self {
    Self { stmts }
  }

  /// Top-level statements in source order.
  pub fn statements(&self) -> StmtList<'a> {
    self.stmts
  }
}

/// S-expression rendering of one expression, e.g. `(+ 1 (* 2 3))`.
pub fn expr_to_string(expr: &Expr<'_>) -> String {
  let mut out = String::new();
  write_expr(&mut out, expr).expect("writing to a String cannot fail");
  out
}

enum Pending<'e, 'a> {
  Expr(&'e Expr<'a>),
  Text(&'static str),
}

/// Walks with an explicit stack; operator chains are as deep as they are long.
fn write_expr(out: &mut impl Write, root: &Expr<'_>) -> fmt::Result {
  let mut pending = vec![Pending::Expr(root)];
  while let Some(item) = pending.pop() {
    match item {
      Pending::Text(text) => out.write_str(text)?,
      Pending::Expr(Expr::Term(Term::IntLit(token) | Term::Ident(token))) => {
        out.write_str(token.text())?
      }
      Pending::Expr(Expr::Term(Term::Paren(inner))) => {
        out.write_str("(paren ")?;
        pending.push(Pending::Text(")"));
        pending.push(Pending::Expr(*inner));
      }
      Pending::Expr(Expr::Binary { op, lhs, rhs }) => {
        write!(out, "({} ", op.symbol())?;
        pending.push(Pending::Text(")"));
        pending.push(Pending::Expr(*rhs));
        pending.push(Pending::Text(" "));
        pending.push(Pending::Expr(*lhs));
      }
    }
  }
  Ok(())
}

fn write_scope(out: &mut impl Write, scope: &Scope<'_>) -> fmt::Result {
  out.write_str("(scope")?;
  for stmt in scope.stmts {
    out.write_char(' ')?;
    write_stmt(out, stmt)?;
  }
  out.write_char(')')
}

fn write_chain<'a>(out: &mut impl Write, chain: &'a ElseChain<'a>) -> fmt::Result {
  let mut open = 0;
  let mut link = Some(chain);
  while let Some(chain) = link {
    match chain {
      ElseChain::ElseIf { cond, body, next } => {
        out.write_str("(elif ")?;
        write_expr(out, cond)?;
        out.write_char(' ')?;
        write_scope(out, body)?;
        if next.is_some() {
          out.write_char(' ')?;
        }
        link = *next;
      }
      ElseChain::Else(body) => {
        out.write_str("(else ")?;
        write_scope(out, body)?;
        link = None;
      }
    }
    open += 1;
  }
  for _ in 0..open {
    out.write_char(')')?;
  }
  Ok(())
}

fn write_stmt(out: &mut impl Write, stmt: &Stmt<'_>) -> fmt::Result {
  match stmt {
    Stmt::Exit(expr) => {
      out.write_str("(exit ")?;
      write_expr(out, expr)?;
      out.write_char(')')
    }
    Stmt::Let { name, expr } => {
      write!(out, "(let {} ", name.text())?;
      write_expr(out, expr)?;
      out.write_char(')')
    }
    Stmt::Assign { name, expr } => {
      write!(out, "(assign {} ", name.text())?;
      write_expr(out, expr)?;
      out.write_char(')')
    }
    Stmt::Scope(scope) => write_scope(out, scope),
    Stmt::If { cond, body, chain } => {
      out.write_str("(if ")?;
      write_expr(out, cond)?;
      out.write_char(' ')?;
      write_scope(out, body)?;
      if let Some(chain) = chain {
        out.write_char(' ')?;
        write_chain(out, chain)?;
      }
      out.write_char(')')
    }
  }
}

/// One top-level statement per line.
impl fmt::Display for Program<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for stmt in self.stmts {
      write_stmt(f, stmt)?;
      f.write_char('\n')?;
    }
    Ok(())
  }
}
