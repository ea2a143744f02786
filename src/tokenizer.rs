//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! A single left-to-right scan with at most two characters of lookahead.
//! Keywords and identifiers use maximal munch over ASCII alphanumerics;
//! comments are dropped here and never reach the parser. Unterminated block
//! comments are accepted and run to the end of input.

use std::fmt;

use crate::error::{InvalidNumberSnafu, LexError, UnexpectedCharacterSnafu};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Exit,
  IntLit,
  Semi,
  OpenParen,
  CloseParen,
  Ident,
  Let,
  Eq,
  Plus,
  Star,
  Minus,
  FSlash,
  OpenCurly,
  CloseCurly,
  If,
  Elif,
  Else,
}

/// Reserved words, checked after an alphanumeric run has been consumed.
pub const KEYWORDS: [(&str, TokenKind); 5] = [
  ("exit", TokenKind::Exit),
  ("let", TokenKind::Let),
  ("if", TokenKind::If),
  ("elif", TokenKind::Elif),
  ("else", TokenKind::Else),
];

/// Single-character punctuators. `/` is absent because it needs lookahead
/// to tell it apart from a comment opener.
pub const PUNCTUATORS: [(char, TokenKind); 9] = [
  ('(', TokenKind::OpenParen),
  (')', TokenKind::CloseParen),
  (';', TokenKind::Semi),
  ('=', TokenKind::Eq),
  ('+', TokenKind::Plus),
  ('*', TokenKind::Star),
  ('-', TokenKind::Minus),
  ('{', TokenKind::OpenCurly),
  ('}', TokenKind::CloseCurly),
];

impl TokenKind {
  /// Binding power of a binary operator; `None` for everything else.
  pub fn binary_precedence(self) -> Option<u8> {
    match self {
      TokenKind::Plus | TokenKind::Minus => Some(0),
      TokenKind::Star | TokenKind::FSlash => Some(1),
      _ => None,
    }
  }

  /// Human-friendly name used in diagnostics.
  pub fn describe(self) -> &'static str {
    match self {
      TokenKind::Exit => "`exit`",
      TokenKind::IntLit => "int literal",
      TokenKind::Semi => "`;`",
      TokenKind::OpenParen => "`(`",
      TokenKind::CloseParen => "`)`",
      TokenKind::Ident => "identifier",
      TokenKind::Let => "`let`",
      TokenKind::Eq => "`=`",
      TokenKind::Plus => "`+`",
      TokenKind::Star => "`*`",
      TokenKind::Minus => "`-`",
      TokenKind::FSlash => "`/`",
      TokenKind::OpenCurly => "`{`",
      TokenKind::CloseCurly => "`}`",
      TokenKind::If => "`if`",
      TokenKind::Elif => "`elif`",
      TokenKind::Else => "`else`",
    }
  }
}

/// A lexeme with the line it started on. Only identifiers and integer
/// literals carry text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub line: usize,
  pub text: Option<String>,
}

impl Token {
  pub fn new(kind: TokenKind, line: usize) -> Self {
    Self {
      kind,
      line,
      text: None,
    }
  }

  pub fn with_text(kind: TokenKind, line: usize, text: impl Into<String>) -> Self {
    Self {
      kind,
      line,
      text: Some(text.into()),
    }
  }

  /// The token's text, or an empty string for tokens that carry none.
  pub fn text(&self) -> &str {
    self.text.as_deref().unwrap_or("")
  }
}

impl fmt::Display for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.text {
      Some(text) => write!(f, "{}:{} {}", self.line, self.kind.describe(), text),
      None => write!(f, "{}:{}", self.line, self.kind.describe()),
    }
  }
}

/// Lex the input into a flat vector of tokens in source order.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
  let chars: Vec<char> = input.chars().collect();
  let peek = |i: usize| chars.get(i).copied();
  let mut tokens = Vec::new();
  let mut line = 1;
  let mut i = 0;

  while let Some(c) = peek(i) {
    if c.is_whitespace() {
      if c == '\n' {
        line += 1;
      }
      i += 1;
      continue;
    }

    if c.is_ascii_alphabetic() {
      let start = i;
      while peek(i).is_some_and(|c| c.is_ascii_alphanumeric()) {
        i += 1;
      }
      let word: String = chars[start..i].iter().collect();
      match KEYWORDS.iter().find(|(keyword, _)| *keyword == word) {
        Some(&(_, kind)) => tokens.push(Token::new(kind, line)),
        None => tokens.push(Token::with_text(TokenKind::Ident, line, word)),
      }
      continue;
    }

    if c.is_ascii_digit() {
      let start = i;
      while peek(i).is_some_and(|c| c.is_ascii_digit()) {
        i += 1;
      }
      let digits: String = chars[start..i].iter().collect();
      digits
        .parse::<i64>()
        .map_err(|_| InvalidNumberSnafu { text: &digits, line }.build())?;
      tokens.push(Token::with_text(TokenKind::IntLit, line, digits));
      continue;
    }

    if c == '/' {
      match peek(i + 1) {
        Some('/') => {
          i += 2;
          while peek(i).is_some_and(|c| c != '\n') {
            i += 1;
          }
        }
        Some('*') => {
          i += 2;
          while let Some(c) = peek(i) {
            if c == '*' && peek(i + 1) == Some('/') {
              i += 2;
              break;
            }
            if c == '\n' {
              line += 1;
            }
            i += 1;
          }
        }
        _ => {
          tokens.push(Token::new(TokenKind::FSlash, line));
          i += 1;
        }
      }
      continue;
    }

    if let Some(&(_, kind)) = PUNCTUATORS.iter().find(|(symbol, _)| *symbol == c) {
      tokens.push(Token::new(kind, line));
      i += 1;
      continue;
    }

    return UnexpectedCharacterSnafu { character: c, line }.fail();
  }

  Ok(tokens)
}

/// Description of an optional token for diagnostics.
pub fn describe_token(token: Option<&Token>) -> String {
  match token {
    Some(t) => match &t.text {
      Some(text) => format!("{} `{text}`", t.kind.describe()),
      None => t.kind.describe().to_string(),
    },
    None => "end of input".to_string(),
  }
}
