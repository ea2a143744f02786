//! Code generation: lower the syntax tree into x86-64 NASM assembly.
//!
//! The emitter is a stack machine. Every evaluated expression leaves exactly
//! one 8-byte value on the hardware stack, and `push`/`pop` go through helpers
//! that keep a virtual depth counter in lockstep with the real stack. Locals
//! are the values a `let` left behind, addressed relative to `rsp` from
//! their recorded slot. Leaving a scope releases its locals with a single
//! `add rsp`.

use tracing::{debug, trace};

use crate::ast::{BinaryOp, ElseChain, Expr, Program, Scope, Stmt, Term};
use crate::error::{DuplicateIdentifierSnafu, GenError, UndeclaredIdentifierSnafu};
use crate::tokenizer::Token;

type GenResult<T> = Result<T, GenError>;

/// Width of one stack slot in bytes.
const SLOT_SIZE: usize = 8;

const SYS_EXIT: u32 = 60;

/// Emit the assembly for a whole program.
pub fn generate(program: &Program<'_>) -> GenResult<String> {
  let asm = Generator::default().generate(program)?;
  debug!(lines = asm.lines().count(), "generated assembly");
  Ok(asm)
}

#[derive(Debug)]
struct Var {
  name: String,
  stack_slot: usize,
}

/// Pending step of an expression walk.
enum Work<'a> {
  Eval(&'a Expr<'a>),
  Apply(BinaryOp),
}

#[derive(Default)]
struct Generator {
  asm: String,
  stack_size: usize,
  vars: Vec<Var>,
  scopes: Vec<usize>,
  label_count: usize,
}

impl Generator {
  fn generate(mut self, program: &Program<'_>) -> GenResult<String> {
    self.asm.push_str("global _start\n");
    self.asm.push_str("_start:\n");

    for stmt in program.statements() {
      self.emit_stmt(stmt)?;
    }

    let ends_with_exit = matches!(program.statements().last(), Some(Stmt::Exit(_)));
    if !ends_with_exit {
      self.asm.push_str(&format!("    mov rax, {SYS_EXIT}\n"));
      self.asm.push_str("    mov rdi, 0\n");
      self.asm.push_str("    syscall\n");
    }

    Ok(self.asm)
  }

  fn instr(&mut self, text: &str) {
    self.asm.push_str("    ");
    self.asm.push_str(text);
    self.asm.push('\n');
  }

  fn push(&mut self, operand: &str) {
    self.instr(&format!("push {operand}"));
    self.stack_size += 1;
  }

  fn pop(&mut self, reg: &str) {
    self.instr(&format!("pop {reg}"));
    self.stack_size -= 1;
  }

  fn label(&mut self, label: &str) {
    trace!(label, "placed label");
    self.asm.push_str(label);
    self.asm.push_str(":\n");
  }

  fn create_label(&mut self) -> String {
    let label = format!("label{}", self.label_count);
    self.label_count += 1;
    label
  }

  /// Innermost visible variable with this name.
  fn lookup(&self, name: &Token) -> GenResult<&Var> {
    match self.vars.iter().rev().find(|var| var.name == name.text()) {
      Some(var) => Ok(var),
      None => UndeclaredIdentifierSnafu {
        name: name.text(),
        line: name.line,
      }
      .fail(),
    }
  }

  /// Byte offset from `rsp` to the variable's slot.
  fn offset_of(&self, var: &Var) -> usize {
    (self.stack_size - var.stack_slot - 1) * SLOT_SIZE
  }

  /// Post-order walk over an explicit work list: the right operand is
  /// evaluated before the left, then both are popped and combined.
  fn emit_expr<'a>(&mut self, expr: &'a Expr<'a>) -> GenResult<()> {
    let mut work = vec![Work::Eval(expr)];
    while let Some(step) = work.pop() {
      match step {
        Work::Eval(Expr::Term(Term::IntLit(token))) => {
          self.instr(&format!("mov rax, {}", token.text()));
          self.push("rax");
        }
        Work::Eval(Expr::Term(Term::Ident(token))) => {
          let offset = self.offset_of(self.lookup(token)?);
          self.push(&format!("QWORD [rsp + {offset}]"));
        }
        Work::Eval(Expr::Term(Term::Paren(inner))) => work.push(Work::Eval(*inner)),
        Work::Eval(Expr::Binary { op, lhs, rhs }) => {
          work.push(Work::Apply(*op));
          work.push(Work::Eval(*lhs));
          work.push(Work::Eval(*rhs));
        }
        Work::Apply(op) => {
          self.pop("rax");
          self.pop("rbx");
          match op {
            BinaryOp::Add => self.instr("add rax, rbx"),
            BinaryOp::Sub => self.instr("sub rax, rbx"),
            BinaryOp::Mul => self.instr("imul rax, rbx"),
            BinaryOp::Div => {
              self.instr("cqo");
              self.instr("idiv rbx");
            }
          }
          self.push("rax");
        }
      }
    }
    Ok(())
  }

  fn emit_scope(&mut self, scope: &Scope<'_>) -> GenResult<()> {
    self.begin_scope();
    for stmt in scope.stmts {
      self.emit_stmt(stmt)?;
    }
    self.end_scope();
    Ok(())
  }

  fn begin_scope(&mut self) {
    self.scopes.push(self.vars.len());
  }

  fn end_scope(&mut self) {
    let start = self.scopes.pop().unwrap_or(0);
    let pop_count = self.vars.len() - start;
    if pop_count != 0 {
      self.instr(&format!("add rsp, {}", pop_count * SLOT_SIZE));
    }
    self.stack_size -= pop_count;
    self.vars.truncate(start);
  }

  /// `test`/`jz` against a fresh label, returning that label.
  fn emit_branch(&mut self, cond: &Expr<'_>) -> GenResult<String> {
    self.emit_expr(cond)?;
    self.pop("rax");
    let label = self.create_label();
    self.instr("test rax, rax");
    self.instr(&format!("jz {label}"));
    Ok(label)
  }

  fn emit_else_chain<'a>(&mut self, chain: &'a ElseChain<'a>, end_label: &str) -> GenResult<()> {
    let mut link = Some(chain);
    while let Some(chain) = link {
      match chain {
        ElseChain::ElseIf { cond, body, next } => {
          self.instr(";; elif");
          let label = self.emit_branch(cond)?;
          self.emit_scope(body)?;
          self.instr(&format!("jmp {end_label}"));
          self.label(&label);
          link = *next;
        }
        ElseChain::Else(body) => {
          self.instr(";; else");
          self.emit_scope(body)?;
          link = None;
        }
      }
    }
    Ok(())
  }

  fn emit_stmt(&mut self, stmt: &Stmt<'_>) -> GenResult<()> {
    match stmt {
      Stmt::Exit(expr) => {
        self.instr(";; exit");
        self.emit_expr(expr)?;
        self.instr(&format!("mov rax, {SYS_EXIT}"));
        self.pop("rdi");
        self.instr("syscall");
        self.instr(";; /exit");
      }
      Stmt::Let { name, expr } => {
        self.instr(";; let");
        let scope_start = self.scopes.last().copied().unwrap_or(0);
        if self.vars[scope_start..]
          .iter()
          .any(|var| var.name == name.text())
        {
          return DuplicateIdentifierSnafu {
            name: name.text(),
            line: name.line,
          }
          .fail();
        }
        // The slot is fixed now; the name becomes visible once the
        // initializer's value occupies it.
        let stack_slot = self.stack_size;
        self.emit_expr(expr)?;
        self.vars.push(Var {
          name: name.text().to_string(),
          stack_slot,
        });
        self.instr(";; /let");
      }
      Stmt::Assign { name, expr } => {
        self.instr(";; assign");
        self.lookup(name)?;
        self.emit_expr(expr)?;
        self.pop("rax");
        let offset = self.offset_of(self.lookup(name)?);
        self.instr(&format!("mov [rsp + {offset}], rax"));
        self.instr(";; /assign");
      }
      Stmt::Scope(scope) => {
        self.instr(";; scope");
        self.emit_scope(scope)?;
        self.instr(";; /scope");
      }
      Stmt::If { cond, body, chain } => {
        self.instr(";; if");
        let label = self.emit_branch(cond)?;
        self.emit_scope(body)?;
        match chain {
          Some(chain) => {
            let end_label = self.create_label();
            self.instr(&format!("jmp {end_label}"));
            self.label(&label);
            self.emit_else_chain(chain, &end_label)?;
            self.label(&end_label);
          }
          None => self.label(&label),
        }
        self.instr(";; /if");
      }
    }
    Ok(())
  }
}
