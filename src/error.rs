use std::fmt;
use std::ops::Range;
use grammar::GrammarError;
use lr::TableError;
use thiserror::Error;
use crate::length::Point;

/// Failure to turn a grammar into a compiled artifact.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileError {
  #[error(transparent)]
  Grammar(#[from] GrammarError),
  #[error(transparent)]
  Table(#[from] TableError),
  #[error("too many symbols: {0}")]
  TooManySymbols(usize),
  #[error("failed to encode grammar: {0}")]
  Encode(String),
}

/// Failure to load a compiled artifact. Nothing is parsed when loading fails.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
  #[error("incompatible grammar version {found}, this runtime supports {min_supported} to {supported}")]
  IncompatibleGrammarVersion {
    found: u32,
    min_supported: u32,
    supported: u32,
  },
  #[error("not a grammar artifact")]
  BadMagic,
  #[error("malformed grammar artifact: {0}")]
  Malformed(String),
  #[error("grammar {0} declares external tokens but no external scanner was supplied")]
  MissingExternalScanner(String),
  #[error(transparent)]
  Compile(#[from] CompileError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxErrorKind {
  /// bytes that no token matches.
  Lex,
  /// tokens that could not be parsed and were skipped.
  Unexpected,
  /// a zero-width token inserted to continue parsing.
  Missing(String),
}

/// An error recorded in a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
  pub kind: SyntaxErrorKind,
  pub byte_range: Range<usize>,
  pub start_point: Point,
}

impl fmt::Display for SyntaxError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match &self.kind {
      SyntaxErrorKind::Lex => write!(f, "unrecognized text")?,
      SyntaxErrorKind::Unexpected => write!(f, "unexpected tokens")?,
      SyntaxErrorKind::Missing(kind) => write!(f, "missing {}", kind)?,
    }
    write!(f, " at {}..{} {}", self.byte_range.start, self.byte_range.end, self.start_point)
  }
}
