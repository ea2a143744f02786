//! Error taxonomy shared across the compilation pipeline.
//!
//! Every stage reports the first problem it finds as an ordinary value and
//! stops; only the driver decides how to present it. `render` formats a
//! diagnostic that quotes the offending source line with a marker under it.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

/// Raised by the tokenizer on a character that starts no token.
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum LexError {
  #[snafu(display("invalid token '{character}' on line {line}"))]
  UnexpectedCharacter { character: char, line: usize },
  #[snafu(display("invalid number '{text}' on line {line}"))]
  InvalidNumber { text: String, line: usize },
}

/// The arena refused an allocation.
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum ArenaError {
  #[snafu(display(
    "arena exhausted: no room for {requested} more bytes within the {limit}-byte limit"
  ))]
  Exhausted { requested: usize, limit: usize },
}

#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum ParseError {
  #[snafu(display("expected {expected} on line {line}, got {got}"))]
  Expected {
    expected: String,
    got: String,
    line: usize,
  },
  #[snafu(display("nesting deeper than {limit} levels on line {line}"))]
  NestingTooDeep { limit: usize, line: usize },
  #[snafu(context(false), display("{source}"))]
  Arena { source: ArenaError },
}

#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum GenError {
  #[snafu(display("undeclared identifier '{name}' on line {line}"))]
  UndeclaredIdentifier { name: String, line: usize },
  #[snafu(display("identifier '{name}' already declared in this scope on line {line}"))]
  DuplicateIdentifier { name: String, line: usize },
}

/// Top-level error returned by [`crate::compile`].
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
pub enum CompileError {
  #[snafu(context(false), display("{source}"))]
  Lex { source: LexError },
  #[snafu(context(false), display("{source}"))]
  Parse { source: ParseError },
  #[snafu(context(false), display("{source}"))]
  Generate { source: GenError },
}

impl CompileError {
  /// Source line the error points at, if it has one.
  pub fn line(&self) -> Option<usize> {
    match self {
      Self::Lex {
        source: LexError::UnexpectedCharacter { line, .. } | LexError::InvalidNumber { line, .. },
      } => Some(*line),
      Self::Parse {
        source: ParseError::Expected { line, .. } | ParseError::NestingTooDeep { line, .. },
      } => Some(*line),
      Self::Parse {
        source: ParseError::Arena { .. },
      } => None,
      Self::Generate {
        source:
          GenError::UndeclaredIdentifier { line, .. } | GenError::DuplicateIdentifier { line, .. },
      } => Some(*line),
    }
  }
}

/// Format `err` for a terminal, quoting the source line it refers to.
pub fn render(source: &str, err: &CompileError) -> String {
  let mut out = format!("error: {err}\n");
  let Some(line) = err.line() else {
    return out;
  };
  let Some(text) = source.lines().nth(line.saturating_sub(1)) else {
    return out;
  };

  let gutter = line.to_string();
  let indent = text.len() - text.trim_start().len();
  let width = text.trim().chars().count().max(1);
  out.push_str(&format!("{gutter} | {text}\n"));
  out.push_str(&format!(
    "{} | {}{}\n",
    " ".repeat(gutter.len()),
    " ".repeat(indent),
    "^".repeat(width)
  ));
  out
}
