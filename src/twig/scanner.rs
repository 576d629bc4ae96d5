//! HTML tag structure for the Twig grammar.
//!
//! The scanner keeps a stack of open elements. It names start and end tags,
//! closes elements the markup leaves open (void elements, `<li>` followed by
//! `<li>`, an outer end tag, the end of the text) and recognizes comments and
//! the contents of `<style>` elements.

use crate::scanner::{ExternalScanner, ScanCursor, ScannerState};

pub(crate) const START_TAG_NAME: usize = 0;
pub(crate) const STYLE_START_TAG_NAME: usize = 1;
pub(crate) const END_TAG_NAME: usize = 2;
pub(crate) const ERRONEOUS_END_TAG_NAME: usize = 3;
pub(crate) const SELF_CLOSING_TAG_DELIMITER: usize = 4;
pub(crate) const IMPLICIT_END_TAG: usize = 5;
pub(crate) const RAW_TEXT: usize = 6;
pub(crate) const COMMENT: usize = 7;

/// Upper bound of a serialized tag stack.
const MAX_STATE_BYTES: usize = 1024;

const STYLE_END: &[u8] = b"</STYLE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
  Custom,
  Html,
  Head,
  Body,
  Table,
  Tbody,
  Thead,
  Tfoot,
  Tr,
  Td,
  Th,
  Ul,
  Ol,
  Li,
  Dl,
  Dt,
  Dd,
  P,
  Div,
  Span,
  H1,
  H2,
  H3,
  H4,
  H5,
  H6,
  Script,
  Style,
  Colgroup,
  Col,
  Rb,
  Rt,
  Rp,
  Ruby,
}

impl TagKind {
  const ALL: [TagKind; 34] = [
    TagKind::Custom, TagKind::Html, TagKind::Head, TagKind::Body,
    TagKind::Table, TagKind::Tbody, TagKind::Thead, TagKind::Tfoot,
    TagKind::Tr, TagKind::Td, TagKind::Th, TagKind::Ul, TagKind::Ol,
    TagKind::Li, TagKind::Dl, TagKind::Dt, TagKind::Dd, TagKind::P,
    TagKind::Div, TagKind::Span, TagKind::H1, TagKind::H2, TagKind::H3,
    TagKind::H4, TagKind::H5, TagKind::H6, TagKind::Script, TagKind::Style,
    TagKind::Colgroup, TagKind::Col, TagKind::Rb, TagKind::Rt, TagKind::Rp,
    TagKind::Ruby,
  ];

  /// `name` is upper case.
  fn from_name(name: &str) -> TagKind {
    match name {
      "HTML" => TagKind::Html,
      "HEAD" => TagKind::Head,
      "BODY" => TagKind::Body,
      "TABLE" => TagKind::Table,
      "TBODY" => TagKind::Tbody,
      "THEAD" => TagKind::Thead,
      "TFOOT" => TagKind::Tfoot,
      "TR" => TagKind::Tr,
      "TD" => TagKind::Td,
      "TH" => TagKind::Th,
      "UL" => TagKind::Ul,
      "OL" => TagKind::Ol,
      "LI" => TagKind::Li,
      "DL" => TagKind::Dl,
      "DT" => TagKind::Dt,
      "DD" => TagKind::Dd,
      "P" => TagKind::P,
      "DIV" => TagKind::Div,
      "SPAN" => TagKind::Span,
      "H1" => TagKind::H1,
      "H2" => TagKind::H2,
      "H3" => TagKind::H3,
      "H4" => TagKind::H4,
      "H5" => TagKind::H5,
      "H6" => TagKind::H6,
      "SCRIPT" => TagKind::Script,
      "STYLE" => TagKind::Style,
      "COLGROUP" => TagKind::Colgroup,
      "COL" => TagKind::Col,
      "RB" => TagKind::Rb,
      "RT" => TagKind::Rt,
      "RP" => TagKind::Rp,
      "RUBY" => TagKind::Ruby,
      _ => TagKind::Custom,
    }
  }

  fn from_byte(byte: u8) -> TagKind {
    TagKind::ALL.get(byte as usize).copied().unwrap_or(TagKind::Custom)
  }

  fn is_heading(self) -> bool {
    matches!(self, TagKind::H1 | TagKind::H2 | TagKind::H3 | TagKind::H4 | TagKind::H5 | TagKind::H6)
  }
}

/// An open element. Custom elements keep their upper-cased name.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Tag {
  kind: TagKind,
  name: String,
}

const VOID_ELEMENTS: &[&str] = &[
  "AREA", "BASE", "BR", "COL", "EMBED", "HR", "IMG", "INPUT", "LINK", "META",
  "PARAM", "SOURCE", "TRACK", "WBR",
];

impl Tag {
  fn for_name(name: String) -> Tag {
    let kind = TagKind::from_name(&name);
    Tag {
      kind,
      name: if kind == TagKind::Custom { name } else { String::new() },
    }
  }

  fn is_void(&self) -> bool {
    match self.kind {
      TagKind::Col => true,
      TagKind::Custom => VOID_ELEMENTS.contains(&self.name.as_str()),
      _ => false,
    }
  }

  fn can_contain(&self, child: &Tag) -> bool {
    use TagKind::*;
    let child = child.kind;
    match self.kind {
      Tr => matches!(child, Td | Th),
      Table => matches!(child, Tr | Tbody | Thead | Tfoot | Colgroup),
      Ul | Ol => child == Li,
      Dl => matches!(child, Dt | Dd),
      Ruby => matches!(child, Rb | Rt | Rp),
      Colgroup => child == Col,
      Td | Th => !matches!(child, Td | Th | Tr),
      Rb | Rt | Rp => !matches!(child, Rb | Rt | Rp),
      Li => child != Li,
      Dt | Dd => !matches!(child, Dt | Dd),
      P => !matches!(child, P | Div | Table) && !child.is_heading(),
      _ => true,
    }
  }
}

/// Stack of open elements, innermost last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct TagStack(Vec<Tag>);

impl TagStack {
  /// Layout: serialized count (u16 LE), total count (u16 LE), then per tag
  /// its kind byte, and for custom tags a length byte and the name. Tags
  /// that do not fit are restored as unnamed custom tags.
  fn serialize(&self) -> ScannerState {
    if self.0.is_empty() {
      return ScannerState::default();
    }
    let total = self.0.len().min(u16::MAX as usize) as u16;
    let mut bytes = vec![0, 0];
    bytes.extend_from_slice(&total.to_le_bytes());
    let mut serialized = 0u16;
    for tag in self.0.iter().take(total as usize) {
      if tag.kind == TagKind::Custom {
        let name = &tag.name.as_bytes()[..tag.name.len().min(u8::MAX as usize)];
        if bytes.len() + 2 + name.len() >= MAX_STATE_BYTES {
          break;
        }
        bytes.push(tag.kind as u8);
        bytes.push(name.len() as u8);
        bytes.extend_from_slice(name);
      } else {
        if bytes.len() + 1 >= MAX_STATE_BYTES {
          break;
        }
        bytes.push(tag.kind as u8);
      }
      serialized += 1;
    }
    bytes[..2].copy_from_slice(&serialized.to_le_bytes());
    ScannerState::new(bytes)
  }

  fn deserialize(bytes: &[u8]) -> TagStack {
    let read_u16 = |at: usize| {
      bytes.get(at..at + 2).map_or(0, |b| u16::from_le_bytes([b[0], b[1]]))
    };
    let serialized = read_u16(0) as usize;
    let total = read_u16(2) as usize;
    let mut tags = Vec::with_capacity(total);
    let mut at = 4;
    while tags.len() < serialized {
      let kind = match bytes.get(at) {
        Some(&byte) => TagKind::from_byte(byte),
        None => break,
      };
      at += 1;
      let mut name = String::new();
      if kind == TagKind::Custom {
        let len = bytes.get(at).copied().unwrap_or(0) as usize;
        at += 1;
        let end = (at + len).min(bytes.len());
        name = String::from_utf8_lossy(&bytes[at.min(end)..end]).into_owned();
        at = end;
      }
      tags.push(Tag { kind, name });
    }
    while tags.len() < total {
      tags.push(Tag { kind: TagKind::Custom, name: String::new() });
    }
    TagStack(tags)
  }

  fn top(&self) -> Option<&Tag> {
    self.0.last()
  }

  fn pop(&mut self) {
    self.0.pop();
  }
}

/// External scanner of the Twig grammar.
#[derive(Debug, Default, Clone, Copy)]
pub struct TwigScanner;

impl ExternalScanner for TwigScanner {
  fn scan(
    &self,
    state: &ScannerState,
    cursor: &mut ScanCursor,
    valid: &[bool],
  ) -> Option<(usize, ScannerState)> {
    let mut tags = TagStack::deserialize(state.as_bytes());
    let valid = |token: usize| valid.get(token).copied().unwrap_or(false);
    let token = scan(&mut tags, cursor, &valid)?;
    Some((token, tags.serialize()))
  }
}

fn scan(tags: &mut TagStack, cursor: &mut ScanCursor, valid: &dyn Fn(usize) -> bool) -> Option<usize> {
  if valid(RAW_TEXT) && !valid(START_TAG_NAME) && !valid(END_TAG_NAME) {
    return scan_raw_text(tags, cursor);
  }

  while cursor.lookahead().map_or(false, char::is_whitespace) {
    cursor.skip();
  }

  match cursor.lookahead() {
    Some('<') => {
      cursor.mark_end();
      cursor.advance();
      if cursor.lookahead() == Some('!') {
        cursor.advance();
        return scan_comment(cursor);
      }
      if valid(IMPLICIT_END_TAG) {
        return scan_implicit_end_tag(tags, cursor);
      }
      None
    }
    None => {
      if valid(IMPLICIT_END_TAG) && tags.top().is_some() {
        tags.pop();
        return Some(IMPLICIT_END_TAG);
      }
      None
    }
    Some('/') if valid(SELF_CLOSING_TAG_DELIMITER) => scan_self_closing_delimiter(tags, cursor),
    Some(_) => {
      if valid(START_TAG_NAME) || valid(STYLE_START_TAG_NAME) {
        return scan_start_tag_name(tags, cursor, valid);
      }
      if valid(END_TAG_NAME) || valid(ERRONEOUS_END_TAG_NAME) {
        return scan_end_tag_name(tags, cursor, valid);
      }
      // text right after a void element
      if valid(IMPLICIT_END_TAG) && tags.top().map_or(false, Tag::is_void) {
        cursor.mark_end();
        tags.pop();
        return Some(IMPLICIT_END_TAG);
      }
      None
    }
  }
}

fn scan_tag_name(cursor: &mut ScanCursor) -> String {
  let mut name = String::new();
  while let Some(c) = cursor.lookahead() {
    if !(c.is_ascii_alphanumeric() || c == '-' || c == ':') {
      break;
    }
    name.push(c.to_ascii_uppercase());
    cursor.advance();
  }
  name
}

/// After `<!`.
fn scan_comment(cursor: &mut ScanCursor) -> Option<usize> {
  for _ in 0..2 {
    if cursor.lookahead() != Some('-') {
      return None;
    }
    cursor.advance();
  }
  let mut dashes = 0;
  while let Some(c) = cursor.lookahead() {
    match c {
      '-' => dashes += 1,
      '>' if dashes >= 2 => {
        cursor.advance();
        cursor.mark_end();
        return Some(COMMENT);
      }
      _ => dashes = 0,
    }
    cursor.advance();
  }
  None
}

/// After `<`, with the token end marked before it. The end tag is empty.
fn scan_implicit_end_tag(tags: &mut TagStack, cursor: &mut ScanCursor) -> Option<usize> {
  let is_closing = cursor.lookahead() == Some('/');
  if is_closing {
    cursor.advance();
  } else if tags.top().map_or(false, Tag::is_void) {
    tags.pop();
    return Some(IMPLICIT_END_TAG);
  }

  let name = scan_tag_name(cursor);
  if name.is_empty() {
    if cursor.eof() && tags.top().is_some() {
      tags.pop();
      return Some(IMPLICIT_END_TAG);
    }
    return None;
  }

  let next = Tag::for_name(name);
  if is_closing {
    if tags.top() == Some(&next) {
      return None;
    }
    if tags.0.contains(&next) {
      tags.pop();
      return Some(IMPLICIT_END_TAG);
    }
    None
  } else if tags.top().map_or(false, |parent| !parent.can_contain(&next)) {
    tags.pop();
    Some(IMPLICIT_END_TAG)
  } else {
    None
  }
}

fn scan_raw_text(tags: &TagStack, cursor: &mut ScanCursor) -> Option<usize> {
  if tags.top().map(|t| t.kind) != Some(TagKind::Style) {
    return None;
  }

  let start = cursor.position();
  let mut end = start;
  cursor.mark_end();
  let mut matched = 0;
  while let Some(c) = cursor.lookahead() {
    if c.is_ascii() && c.to_ascii_uppercase() as u8 == STYLE_END[matched] {
      matched += 1;
      if matched == STYLE_END.len() {
        break;
      }
      cursor.advance();
    } else if matched > 0 {
      // the partial delimiter is text; look at `c` again
      matched = 0;
      cursor.mark_end();
      end = cursor.position();
    } else {
      cursor.advance();
      cursor.mark_end();
      end = cursor.position();
    }
  }
  if matched < STYLE_END.len() && cursor.eof() {
    cursor.mark_end();
    end = cursor.position();
  }

  if end == start { None } else { Some(RAW_TEXT) }
}

fn scan_start_tag_name(
  tags: &mut TagStack,
  cursor: &mut ScanCursor,
  valid: &dyn Fn(usize) -> bool,
) -> Option<usize> {
  let name = scan_tag_name(cursor);
  if name.is_empty() {
    return None;
  }
  let tag = Tag::for_name(name);
  let token = if tag.kind == TagKind::Style && valid(STYLE_START_TAG_NAME) {
    STYLE_START_TAG_NAME
  } else if valid(START_TAG_NAME) {
    START_TAG_NAME
  } else {
    return None;
  };
  tags.0.push(tag);
  Some(token)
}

fn scan_end_tag_name(
  tags: &mut TagStack,
  cursor: &mut ScanCursor,
  valid: &dyn Fn(usize) -> bool,
) -> Option<usize> {
  let name = scan_tag_name(cursor);
  if name.is_empty() {
    return None;
  }
  let tag = Tag::for_name(name);
  if valid(END_TAG_NAME) && tags.top() == Some(&tag) {
    tags.pop();
    Some(END_TAG_NAME)
  } else if valid(ERRONEOUS_END_TAG_NAME) {
    Some(ERRONEOUS_END_TAG_NAME)
  } else {
    None
  }
}

fn scan_self_closing_delimiter(tags: &mut TagStack, cursor: &mut ScanCursor) -> Option<usize> {
  cursor.advance();
  if cursor.lookahead() != Some('>') {
    return None;
  }
  cursor.advance();
  if tags.top().is_none() {
    return None;
  }
  tags.pop();
  Some(SELF_CLOSING_TAG_DELIMITER)
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn stack(names: &[&str]) -> TagStack {
    TagStack(names.iter().map(|n| Tag::for_name(n.to_string())).collect())
  }

  fn only(tokens: &[usize]) -> Vec<bool> {
    let mut valid = vec![false; 8];
    for &t in tokens {
      valid[t] = true;
    }
    valid
  }

  /// Scans `text` from the start; returns the token, its byte range and
  /// the resulting stack.
  fn run(tags: &TagStack, text: &str, valid: &[bool]) -> Option<(usize, usize, usize, TagStack)> {
    let mut cursor = ScanCursor::new(text.as_bytes(), 0);
    let (token, state) = TwigScanner.scan(&tags.serialize(), &mut cursor, valid)?;
    Some((token, cursor.token_start(), cursor.token_end(), TagStack::deserialize(state.as_bytes())))
  }

  #[test]
  fn state_survives_serialization() {
    let tags = stack(&["DIV", "MY-WIDGET", "UL", "LI"]);
    assert_eq!(TagStack::deserialize(tags.serialize().as_bytes()), tags);
    assert!(TagStack::default().serialize().is_empty());
    assert_eq!(TagStack::deserialize(&[]), TagStack::default());
  }

  #[test]
  fn oversized_state_is_truncated() {
    let name = "X".repeat(300);
    let tags = TagStack((0..10).map(|_| Tag::for_name(name.clone())).collect());
    let state = tags.serialize();
    assert!(state.as_bytes().len() < MAX_STATE_BYTES);
    let restored = TagStack::deserialize(state.as_bytes());
    assert_eq!(restored.0.len(), 10);
    assert_eq!(restored.0[0].name.len(), 255);
    assert_eq!(restored.0[9], Tag { kind: TagKind::Custom, name: String::new() });
  }

  #[test]
  fn start_and_end_tag_names() {
    let (token, start, end, tags) =
      run(&TagStack::default(), "div class", &only(&[START_TAG_NAME, STYLE_START_TAG_NAME])).unwrap();
    assert_eq!((token, start, end), (START_TAG_NAME, 0, 3));
    assert_eq!(tags, stack(&["DIV"]));

    let (token, ..) = run(&TagStack::default(), "style>", &only(&[START_TAG_NAME, STYLE_START_TAG_NAME])).unwrap();
    assert_eq!(token, STYLE_START_TAG_NAME);

    let (token, _, _, tags) = run(&stack(&["DIV"]), "Div>", &only(&[END_TAG_NAME, ERRONEOUS_END_TAG_NAME])).unwrap();
    assert_eq!(token, END_TAG_NAME);
    assert_eq!(tags, TagStack::default());

    let (token, _, _, tags) = run(&stack(&["DIV"]), "span>", &only(&[END_TAG_NAME, ERRONEOUS_END_TAG_NAME])).unwrap();
    assert_eq!(token, ERRONEOUS_END_TAG_NAME);
    assert_eq!(tags, stack(&["DIV"]));

    let (token, ..) = run(&TagStack::default(), "div>", &only(&[ERRONEOUS_END_TAG_NAME])).unwrap();
    assert_eq!(token, ERRONEOUS_END_TAG_NAME);
  }

  #[test]
  fn implicit_end_tags() {
    let valid = only(&[IMPLICIT_END_TAG]);
    // sibling list item
    let (token, start, end, tags) = run(&stack(&["UL", "LI"]), " <li>", &valid).unwrap();
    assert_eq!((token, start, end), (IMPLICIT_END_TAG, 1, 1));
    assert_eq!(tags, stack(&["UL"]));
    // nested content is allowed
    assert_eq!(run(&stack(&["UL", "LI"]), "<b>", &valid), None);
    // end tag of an outer element
    let (_, _, _, tags) = run(&stack(&["DIV", "P"]), "</div>", &valid).unwrap();
    assert_eq!(tags, stack(&["DIV"]));
    // matching end tag is left to the grammar
    assert_eq!(run(&stack(&["DIV", "P"]), "</p>", &valid), None);
    // void element followed by text
    let (_, start, end, tags) = run(&stack(&["DIV", "BR"]), "text", &valid).unwrap();
    assert_eq!((start, end), (0, 0));
    assert_eq!(tags, stack(&["DIV"]));
    // end of input
    let (_, _, _, tags) = run(&stack(&["DIV"]), "  ", &valid).unwrap();
    assert_eq!(tags, TagStack::default());
    assert_eq!(run(&TagStack::default(), "", &valid), None);
    // plain text inside a list is not a tag
    assert_eq!(run(&stack(&["UL"]), "text", &valid), None);
  }

  #[test]
  fn self_closing_delimiter() {
    let valid = only(&[SELF_CLOSING_TAG_DELIMITER]);
    let (token, start, end, tags) = run(&stack(&["IMG"]), "/>", &valid).unwrap();
    assert_eq!((token, start, end), (SELF_CLOSING_TAG_DELIMITER, 0, 2));
    assert_eq!(tags, TagStack::default());
    assert_eq!(run(&TagStack::default(), "/>", &valid), None);
  }

  #[test]
  fn comments() {
    let valid = only(&[COMMENT]);
    let (token, start, end, _) = run(&TagStack::default(), " <!-- a -- b --> x", &valid).unwrap();
    assert_eq!((token, start, end), (COMMENT, 1, 16));
    assert_eq!(run(&TagStack::default(), "<!-- open", &valid), None);
    assert_eq!(run(&TagStack::default(), "<!DOCTYPE html>", &valid), None);
  }

  #[test]
  fn raw_text_in_style() {
    let valid = only(&[RAW_TEXT]);
    let (token, start, end, _) = run(&stack(&["STYLE"]), "a < b </ c</style>", &valid).unwrap();
    assert_eq!((token, start, end), (RAW_TEXT, 0, 10));
    let (_, _, end, _) = run(&stack(&["STYLE"]), "x{}", &valid).unwrap();
    assert_eq!(end, 3);
    assert_eq!(run(&stack(&["STYLE"]), "</STYLE>", &valid), None);
    assert_eq!(run(&stack(&["DIV"]), "x", &valid), None);
  }
}
