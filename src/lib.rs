//! Crate root: wires together the compilation pipeline.
//!
//! Data flows one way, each stage running to completion before the next:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` builds the syntax tree inside an `arena` the caller owns.
//! - `codegen` lowers the tree into x86-64 NASM assembly.
//! - `error` holds the error taxonomy and the diagnostic renderer.
//!
//! `toolchain` (assembling and linking) is only used by the driver.

pub mod arena;
pub mod ast;
pub mod codegen;
pub mod error;
pub mod parser;
pub mod tokenizer;
pub mod toolchain;

use tracing::debug;

pub use arena::Arena;
pub use ast::Program;
pub use error::{CompileError, CompileResult};
pub use tokenizer::{Token, TokenKind};

/// Knobs for a single compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
  /// Byte budget of the arena holding the syntax tree.
  pub arena_capacity: usize,
}

impl Default for CompileOptions {
  fn default() -> Self {
    Self {
      arena_capacity: arena::DEFAULT_CAPACITY,
    }
  }
}

/// Split `source` into tokens, stopping at the first character that starts
/// none or at an integer literal outside the `i64` range.
pub fn tokenize(source: &str) -> CompileResult<Vec<Token>> {
  let tokens = tokenizer::tokenize(source)?;
  debug!(tokens = tokens.len(), "tokenized source");
  Ok(tokens)
}

/// Build the syntax tree for `tokens`. Nodes are allocated in `arena`, and
/// the program borrows both the arena and the tokens.
pub fn parse<'a>(tokens: &'a [Token], arena: &'a Arena) -> CompileResult<Program<'a>> {
  Ok(parser::parse(tokens, arena)?)
}

/// Lower a parsed program to NASM assembly for x86-64 Linux.
pub fn generate(program: &Program<'_>) -> CompileResult<String> {
  Ok(codegen::generate(program)?)
}

/// Compile a source string into NASM assembly.
///
/// Every call builds a fresh arena and generator, so a failed compilation
/// leaves nothing behind for the next one.
pub fn compile(source: &str, options: &CompileOptions) -> CompileResult<String> {
  let tokens = tokenize(source)?;
  let arena = Arena::with_capacity(options.arena_capacity);
  let program = parse(&tokens, &arena)?;
  generate(&program)
}
