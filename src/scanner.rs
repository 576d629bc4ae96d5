//! Hand-written scanners for context-sensitive tokens.

use std::fmt;
use std::sync::Arc;
use crate::length::next_char;

/// Serialized state of an external scanner.
///
/// The parser stores the state reached after every external token, so that
/// lexing can resume from any token boundary when a tree is reused.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ScannerState(Arc<[u8]>);

impl ScannerState {
  pub fn new(bytes: Vec<u8>) -> Self {
    ScannerState(bytes.into())
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl fmt::Debug for ScannerState {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "ScannerState({:02x?})", &*self.0)
  }
}

/// A scanner for tokens that the lexical automaton cannot recognize.
///
/// `valid` is indexed by external token, in declaration order. On success
/// the scanner returns the external token index and its new state; the
/// token spans from the last skipped character to the last `mark_end` (or
/// the cursor position if `mark_end` was never called).
pub trait ExternalScanner: Send + Sync {
  fn scan(
    &self,
    state: &ScannerState,
    cursor: &mut ScanCursor,
    valid: &[bool],
  ) -> Option<(usize, ScannerState)>;
}

/// Character-level access to the text for an [`ExternalScanner`].
pub struct ScanCursor<'a> {
  text: &'a [u8],
  pos: usize,
  token_start: usize,
  token_end: Option<usize>,
  max_peek: usize,
}

impl<'a> ScanCursor<'a> {
  pub(crate) fn new(text: &'a [u8], pos: usize) -> Self {
    ScanCursor {
      text,
      pos,
      token_start: pos,
      token_end: None,
      max_peek: pos,
    }
  }

  /// The next character, `None` at the end of the text. Invalid UTF-8
  /// reads as [`char::REPLACEMENT_CHARACTER`].
  pub fn lookahead(&mut self) -> Option<char> {
    self.peek().map(|(c, _)| c)
  }

  pub fn advance(&mut self) {
    if let Some((_, len)) = self.peek() {
      self.pos += len;
    }
  }

  fn peek(&mut self) -> Option<(char, usize)> {
    let (c, len) = next_char(self.text, self.pos)?;
    self.max_peek = self.max_peek.max(self.pos + len);
    Some((c.unwrap_or(char::REPLACEMENT_CHARACTER), len))
  }

  /// Advances past a character that is not part of the token.
  pub fn skip(&mut self) {
    self.advance();
    self.token_start = self.pos;
  }

  pub fn mark_end(&mut self) {
    self.token_end = Some(self.pos);
  }

  pub fn eof(&self) -> bool {
    self.pos >= self.text.len()
  }

  pub fn position(&self) -> usize {
    self.pos
  }

  pub(crate) fn token_start(&self) -> usize {
    self.token_start
  }

  pub(crate) fn token_end(&self) -> usize {
    self.token_end.unwrap_or(self.pos).max(self.token_start)
  }

  pub(crate) fn max_peek(&self) -> usize {
    self.max_peek
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cursor_tracks_token_bounds() {
    let mut cursor = ScanCursor::new(b"  <!-- x -->", 0);
    while cursor.lookahead().map_or(false, char::is_whitespace) {
      cursor.skip();
    }
    assert_eq!(cursor.token_start(), 2);
    cursor.mark_end();
    cursor.advance();
    assert_eq!(cursor.token_end(), 2);
    assert_eq!(cursor.max_peek(), 3);
    assert!(!cursor.eof());
  }

  #[test]
  fn invalid_bytes_read_as_replacement() {
    let mut cursor = ScanCursor::new(b"\xe2\x82<", 0);
    assert_eq!(cursor.lookahead(), Some(char::REPLACEMENT_CHARACTER));
    cursor.advance();
    assert_eq!(cursor.position(), 2);
    assert_eq!(cursor.lookahead(), Some('<'));
  }
}
