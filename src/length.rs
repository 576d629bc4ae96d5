use std::fmt;
use std::ops::{Add, Sub};

/// A row and a byte column, both zero-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Point {
  pub row: usize,
  pub column: usize,
}

impl Point {
  pub fn new(row: usize, column: usize) -> Self {
    Point { row, column }
  }
}

impl fmt::Display for Point {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "({}, {})", self.row, self.column)
  }
}

/// A span of text measured both in bytes and as a row/column extent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Length {
  pub bytes: usize,
  pub extent: Point,
}

impl Length {
  pub const ZERO: Length = Length {
    bytes: 0,
    extent: Point { row: 0, column: 0 },
  };

  pub fn of(text: &str) -> Length {
    Length::of_bytes(text.as_bytes())
  }

  /// Like [`Length::of`], with each invalid UTF-8 sequence counted as one
  /// column per byte.
  pub fn of_bytes(text: &[u8]) -> Length {
    let mut length = Length::ZERO;
    let mut pos = 0;
    while let Some((c, len)) = next_char(text, pos) {
      match c {
        Some(c) => length.advance(c),
        None => {
          length.bytes += len;
          length.extent.column += len;
        }
      }
      pos += len;
    }
    length
  }

  pub fn advance(&mut self, c: char) {
    self.bytes += c.len_utf8();
    if c == '\n' {
      self.extent.row += 1;
      self.extent.column = 0;
    } else {
      self.extent.column += c.len_utf8();
    }
  }

  /// `self - other`, or zero if `other` is longer.
  pub fn saturating_sub(self, other: Length) -> Length {
    if self.bytes > other.bytes {
      self - other
    } else {
      Length::ZERO
    }
  }
}

impl Add for Length {
  type Output = Length;

  fn add(self, other: Length) -> Length {
    Length {
      bytes: self.bytes + other.bytes,
      extent: if other.extent.row > 0 {
        Point::new(self.extent.row + other.extent.row, other.extent.column)
      } else {
        Point::new(self.extent.row, self.extent.column + other.extent.column)
      },
    }
  }
}

impl Sub for Length {
  type Output = Length;

  fn sub(self, other: Length) -> Length {
    Length {
      bytes: self.bytes.saturating_sub(other.bytes),
      extent: if self.extent.row > other.extent.row {
        Point::new(self.extent.row - other.extent.row, self.extent.column)
      } else {
        Point::new(0, self.extent.column.saturating_sub(other.extent.column))
      },
    }
  }
}

/// Decodes the character at byte `pos` of `text` and returns it with its
/// length. An invalid UTF-8 sequence decodes as `None` spanning its bytes.
/// Returns `None` at the end of the text.
pub(crate) fn next_char(text: &[u8], pos: usize) -> Option<(Option<char>, usize)> {
  let rest = text.get(pos..).filter(|rest| !rest.is_empty())?;
  let head = &rest[..rest.len().min(4)];
  let valid = match std::str::from_utf8(head) {
    Ok(valid) => valid,
    Err(e) if e.valid_up_to() > 0 => std::str::from_utf8(&head[..e.valid_up_to()]).unwrap_or(""),
    Err(e) => return Some((None, e.error_len().unwrap_or(head.len()))),
  };
  valid.chars().next().map(|c| (Some(c), c.len_utf8()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn arithmetic() {
    let a = Length::of("ab\ncd");
    assert_eq!(a, Length { bytes: 5, extent: Point::new(1, 2) });
    let b = Length::of("e\nf");
    assert_eq!(a + b, Length { bytes: 8, extent: Point::new(2, 1) });
    assert_eq!((a + b) - a, b);
    assert_eq!(Length::of("xyz") - Length::of("x"), Length::of("yz"));
    assert_eq!(Length::of("x").saturating_sub(Length::of("xyz")), Length::ZERO);
  }

  #[test]
  fn invalid_bytes_keep_offsets() {
    assert_eq!(next_char(b"\xffa", 0), Some((None, 1)));
    assert_eq!(next_char(b"\xffa", 1), Some((Some('a'), 1)));
    assert_eq!(next_char("\u{e9}".as_bytes(), 0), Some((Some('\u{e9}'), 2)));
    assert_eq!(next_char(b"\xe2\x82", 0), Some((None, 2)));
    assert_eq!(next_char(b"a", 1), None);
    assert_eq!(Length::of_bytes(b"a\xff\nb\xc3"), Length { bytes: 5, extent: Point::new(1, 2) });
  }
}
