//! Token patterns.
//!
//! Supported syntax: literals, `.`, `[...]`, `[^...]`, `\d \w \s \D \W \S`,
//! escapes, groups `( )` and `(?: )`, alternation and the `? * +` operators.

use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

pub const MAX_CHAR: u32 = 0x10ffff;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Regex {
  Empty,
  /// sorted, non-overlapping inclusive code point ranges.
  Set(Vec<(u32, u32)>),
  Alt(Vec<Regex>),
  Concat(Vec<Regex>),
  Optional(Box<Regex>),
  Many(Box<Regex>),
  Many1(Box<Regex>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at offset {offset}")]
pub struct RegexError {
  pub kind: RegexErrorKind,
  pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegexErrorKind {
  #[error("syntax error")]
  SyntaxError,
  #[error("unclosed group")]
  UnclosedGroup,
  #[error("unclosed character set")]
  UnclosedSet,
  #[error("invalid escape")]
  InvalidEscape,
  #[error("pattern accepts the empty string")]
  Empty,
}

impl Regex {
  pub fn literal(text: &str) -> Regex {
    let mut chars = text.chars()
      .map(|c| Regex::Set(vec![(c as u32, c as u32)]))
      .collect::<Vec<_>>();
    match chars.len() {
      0 => Regex::Empty,
      1 => chars.pop().unwrap_or(Regex::Empty),
      _ => Regex::Concat(chars),
    }
  }

  pub fn parse(source: &str) -> Result<Regex, RegexError> {
    let mut parser = RegexParser {
      chars: source.char_indices().peekable(),
      len: source.len(),
    };
    let regex = parser.alt()?;
    match parser.chars.next() {
      None => Ok(regex),
      Some((offset, _)) => Err(RegexError {
        kind: RegexErrorKind::SyntaxError,
        offset,
      }),
    }
  }

  pub fn accepts_empty(&self) -> bool {
    match self {
      Regex::Empty => true,
      Regex::Set(_) => false,
      Regex::Alt(alts) => alts.iter().any(Regex::accepts_empty),
      Regex::Concat(items) => items.iter().all(Regex::accepts_empty),
      Regex::Many(_) | Regex::Optional(_) => true,
      Regex::Many1(item) => item.accepts_empty(),
    }
  }

  /// Returns the literal text if the pattern matches exactly one string.
  pub fn as_literal(&self) -> Option<String> {
    match self {
      Regex::Set(ranges) if ranges.len() == 1 && ranges[0].0 == ranges[0].1 => {
        std::char::from_u32(ranges[0].0).map(|c| c.to_string())
      }
      Regex::Concat(items) => {
        items.iter().map(Regex::as_literal).collect::<Option<String>>()
      }
      _ => None,
    }
  }
}

struct RegexParser<'a> {
  chars: Peekable<CharIndices<'a>>,
  len: usize,
}

impl<'a> RegexParser<'a> {
  fn offset(&mut self) -> usize {
    self.chars.peek().map(|&(i, _)| i).unwrap_or(self.len)
  }

  fn error(&mut self, kind: RegexErrorKind) -> RegexError {
    RegexError { kind, offset: self.offset() }
  }

  fn alt(&mut self) -> Result<Regex, RegexError> {
    let mut alts = vec![self.concat()?];
    while let Some(&(_, '|')) = self.chars.peek() {
      self.chars.next();
      alts.push(self.concat()?);
    }
    Ok(if alts.len() == 1 { alts.remove(0) } else { Regex::Alt(alts) })
  }

  fn concat(&mut self) -> Result<Regex, RegexError> {
    let mut items = vec![];
    loop {
      match self.chars.peek() {
        None | Some(&(_, '|')) | Some(&(_, ')')) => break,
        _ => items.push(self.repetition()?),
      }
    }
    Ok(match items.len() {
      0 => Regex::Empty,
      1 => items.remove(0),
      _ => Regex::Concat(items),
    })
  }

  fn repetition(&mut self) -> Result<Regex, RegexError> {
    let mut atom = self.atom()?;
    loop {
      atom = match self.chars.peek() {
        Some(&(_, '*')) => Regex::Many(Box::new(atom)),
        Some(&(_, '+')) => Regex::Many1(Box::new(atom)),
        Some(&(_, '?')) => Regex::Optional(Box::new(atom)),
        _ => return Ok(atom),
      };
      self.chars.next();
    }
  }

  fn atom(&mut self) -> Result<Regex, RegexError> {
    let (offset, c) = match self.chars.next() {
      Some(x) => x,
      None => return Err(self.error(RegexErrorKind::SyntaxError)),
    };

    match c {
      '(' => {
        if let Some(&(_, '?')) = self.chars.peek() {
          self.chars.next();
          match self.chars.next() {
            Some((_, ':')) => {}
            _ => return Err(RegexError { kind: RegexErrorKind::SyntaxError, offset }),
          }
        }
        let inner = self.alt()?;
        match self.chars.next() {
          Some((_, ')')) => Ok(inner),
          _ => Err(RegexError { kind: RegexErrorKind::UnclosedGroup, offset }),
        }
      }
      '[' => self.set(offset),
      '.' => Ok(Regex::Set(complement(&[('\n' as u32, '\n' as u32)]))),
      '\\' => {
        let ranges = self.escape()?;
        Ok(Regex::Set(ranges))
      }
      '*' | '+' | '?' | ')' => Err(RegexError { kind: RegexErrorKind::SyntaxError, offset }),
      c => Ok(Regex::Set(vec![(c as u32, c as u32)])),
    }
  }

  fn set(&mut self, start: usize) -> Result<Regex, RegexError> {
    let mut negated = false;
    if let Some(&(_, '^')) = self.chars.peek() {
      self.chars.next();
      negated = true;
    }

    let mut ranges = vec![];
    let mut first = true;
    loop {
      let (_, c) = match self.chars.next() {
        Some(x) => x,
        None => return Err(RegexError { kind: RegexErrorKind::UnclosedSet, offset: start }),
      };

      let lower = match c {
        ']' if !first => break,
        '\\' => {
          let escaped = self.escape()?;
          if escaped.len() != 1 || escaped[0].0 != escaped[0].1 {
            ranges.extend(escaped);
            first = false;
            continue;
          }
          escaped[0].0
        }
        c => c as u32,
      };
      first = false;

      let is_range = {
        let mut lookahead = self.chars.clone();
        matches!(lookahead.next(), Some((_, '-')))
          && !matches!(lookahead.next(), Some((_, ']')) | None)
      };

      if is_range {
        self.chars.next();
        let upper = match self.chars.next() {
          Some((_, '\\')) => {
            let escaped = self.escape()?;
            if escaped.len() != 1 || escaped[0].0 != escaped[0].1 {
              return Err(self.error(RegexErrorKind::InvalidEscape));
            }
            escaped[0].0
          }
          Some((_, c)) => c as u32,
          None => return Err(RegexError { kind: RegexErrorKind::UnclosedSet, offset: start }),
        };
        if upper < lower {
          return Err(RegexError { kind: RegexErrorKind::SyntaxError, offset: start });
        }
        ranges.push((lower, upper));
      } else {
        ranges.push((lower, lower));
      }
    }

    let ranges = normalize(ranges);
    Ok(Regex::Set(if negated { complement(&ranges) } else { ranges }))
  }

  fn escape(&mut self) -> Result<Vec<(u32, u32)>, RegexError> {
    let c = match self.chars.next() {
      Some((_, c)) => c,
      None => return Err(self.error(RegexErrorKind::InvalidEscape)),
    };

    let single = |c: char| Ok(vec![(c as u32, c as u32)]);
    match c {
      'd' => Ok(digit()),
      'w' => Ok(word()),
      's' => Ok(space()),
      'D' => Ok(complement(&digit())),
      'W' => Ok(complement(&word())),
      'S' => Ok(complement(&space())),
      'n' => single('\n'),
      't' => single('\t'),
      'r' => single('\r'),
      'f' => single('\x0c'),
      'v' => single('\x0b'),
      '0' => single('\0'),
      c if c.is_ascii_alphanumeric() => Err(self.error(RegexErrorKind::InvalidEscape)),
      c => single(c),
    }
  }
}

fn digit() -> Vec<(u32, u32)> {
  vec![('0' as u32, '9' as u32)]
}

fn word() -> Vec<(u32, u32)> {
  normalize(vec![
    ('0' as u32, '9' as u32),
    ('A' as u32, 'Z' as u32),
    ('_' as u32, '_' as u32),
    ('a' as u32, 'z' as u32),
  ])
}

fn space() -> Vec<(u32, u32)> {
  normalize(vec![
    ('\t' as u32, '\r' as u32),
    (' ' as u32, ' ' as u32),
  ])
}

/// Sorts and merges overlapping or adjacent ranges.
pub fn normalize(mut ranges: Vec<(u32, u32)>) -> Vec<(u32, u32)> {
  ranges.sort();
  let mut result: Vec<(u32, u32)> = Vec::with_capacity(ranges.len());
  for (lo, hi) in ranges {
    match result.last_mut() {
      Some(last) if lo <= last.1.saturating_add(1) => {
        last.1 = last.1.max(hi);
      }
      _ => result.push((lo, hi)),
    }
  }
  result
}

/// Complement of normalized ranges over all code points.
pub fn complement(ranges: &[(u32, u32)]) -> Vec<(u32, u32)> {
  let mut result = vec![];
  let mut next = 0;
  for &(lo, hi) in ranges {
    if lo > next {
      result.push((next, lo - 1));
    }
    next = hi + 1;
  }
  if next <= MAX_CHAR {
    result.push((next, MAX_CHAR));
  }
  result
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn literal_round_trip() {
    let regex = Regex::literal("{%");
    assert_eq!(regex.as_literal(), Some("{%".to_owned()));
    assert_eq!(Regex::parse("abc").unwrap().as_literal(), Some("abc".to_owned()));
  }

  #[test]
  fn negated_set() {
    let regex = Regex::parse(r"[^<>&\{\s]").unwrap();
    match regex {
      Regex::Set(ranges) => {
        let contains = |c: char| ranges.iter().any(|&(lo, hi)| lo <= c as u32 && c as u32 <= hi);
        assert!(contains('a'));
        assert!(contains('}'));
        assert!(!contains('<'));
        assert!(!contains('{'));
        assert!(!contains(' '));
        assert!(!contains('\n'));
      }
      _ => panic!("expected a set"),
    }
  }

  #[test]
  fn groups_and_operators() {
    let regex = Regex::parse(r"&#(?:[xX][0-9a-fA-F]+|[0-9]+);").unwrap();
    assert!(!regex.accepts_empty());
    assert_eq!(regex.as_literal(), None);
    assert!(Regex::parse("a*").unwrap().accepts_empty());
  }

  #[test]
  fn dash_at_end_of_set_is_literal() {
    let regex = Regex::parse(r"[a\-]").unwrap();
    assert_eq!(regex, Regex::Set(vec![('-' as u32, '-' as u32), ('a' as u32, 'a' as u32)]));
    let regex = Regex::parse(r"[a-]").unwrap();
    assert_eq!(regex, Regex::Set(vec![('-' as u32, '-' as u32), ('a' as u32, 'a' as u32)]));
  }

  #[test]
  fn errors() {
    assert_eq!(Regex::parse("(ab").unwrap_err().kind, RegexErrorKind::UnclosedGroup);
    assert_eq!(Regex::parse("[ab").unwrap_err().kind, RegexErrorKind::UnclosedSet);
    assert_eq!(Regex::parse("*a").unwrap_err().kind, RegexErrorKind::SyntaxError);
    assert_eq!(Regex::parse(r"\q").unwrap_err().kind, RegexErrorKind::InvalidEscape);
  }
}
