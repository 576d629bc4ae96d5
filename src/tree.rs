use std::fmt;
use itertools::Itertools;
use once_cell::sync::OnceCell;
use crate::error::{SyntaxError, SyntaxErrorKind};
use crate::language::Language;
use crate::length::{Length, Point};
use crate::node::{Node, TreeCursor};
use crate::subtree::Subtree;
use crate::{HashMap, HashSet};

/// The result of a parse. A tree does not keep the text it was parsed from;
/// pass the text to [`Node::utf8_text`] to read it back.
#[derive(Clone)]
pub struct Tree {
  root: Subtree,
  language: Language,
  /// parent of every visible node, built on first use.
  parents: OnceCell<HashMap<NodeKey, (Subtree, Length)>>,
}

/// Subtree identity and start offset of a visible node.
pub(crate) type NodeKey = (usize, usize);

/// A span of text, in bytes and in rows and columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
  pub start_byte: usize,
  pub end_byte: usize,
  pub start_point: Point,
  pub end_point: Point,
}

/// A text replacement, described in both the old and the new coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEdit {
  pub start_byte: usize,
  pub old_end_byte: usize,
  pub new_end_byte: usize,
  pub start_point: Point,
  pub old_end_point: Point,
  pub new_end_point: Point,
}

impl InputEdit {
  /// The edit replacing `old_text[start..old_end]` by `new_text`.
  pub fn replace(old_text: &str, start: usize, old_end: usize, new_text: &str) -> InputEdit {
    let start_length = Length::of(&old_text[..start]);
    let old_end_length = start_length + Length::of(&old_text[start..old_end]);
    let new_end_length = start_length + Length::of(new_text);
    InputEdit {
      start_byte: start,
      old_end_byte: old_end,
      new_end_byte: new_end_length.bytes,
      start_point: start_length.extent,
      old_end_point: old_end_length.extent,
      new_end_point: new_end_length.extent,
    }
  }

  /// Applies the edit to the text it was computed from.
  pub fn apply(&self, old_text: &str, new_text: &str) -> String {
    let mut result = String::with_capacity(old_text.len() + new_text.len());
    result.push_str(&old_text[..self.start_byte]);
    result.push_str(new_text);
    result.push_str(&old_text[self.old_end_byte..]);
    result
  }
}

#[derive(Debug, Clone, Copy)]
struct Edit {
  start: Length,
  old_end: Length,
  new_end: Length,
}

impl Tree {
  pub(crate) fn new(root: Subtree, language: Language) -> Tree {
    Tree { root, language, parents: OnceCell::new() }
  }

  pub(crate) fn parent_of(&self, node: NodeKey) -> Option<(&Subtree, Length)> {
    let parents = self.parents.get_or_init(|| {
      let mut parents = HashMap::default();
      let mut stack = vec![self.root_node()];
      while let Some(node) = stack.pop() {
        let (subtree, offset) = node.parts();
        for child in node.children() {
          parents.insert(child.key(), (subtree.clone(), offset));
          stack.push(child);
        }
      }
      parents
    });
    parents.get(&node).map(|(subtree, offset)| (subtree, *offset))
  }

  pub(crate) fn root(&self) -> &Subtree {
    &self.root
  }

  pub fn language(&self) -> &Language {
    &self.language
  }

  pub fn root_node(&self) -> Node {
    Node::new(self, &self.root, Length::ZERO)
  }

  /// The smallest node containing `byte`.
  pub fn node_at(&self, byte: usize) -> Option<Node> {
    self.root_node().descendant_for_byte_range(byte, byte)
  }

  pub fn walk(&self) -> TreeCursor {
    self.root_node().walk()
  }

  pub fn has_error(&self) -> bool {
    self.root.has_error()
  }

  /// Every error region, outermost only, in text order.
  pub fn errors(&self) -> Vec<SyntaxError> {
    let mut errors = vec![];
    let mut stack = vec![self.root_node()];
    while let Some(node) = stack.pop() {
      if node.is_missing() {
        errors.push(SyntaxError {
          kind: SyntaxErrorKind::Missing(node.kind().to_owned()),
          byte_range: node.byte_range(),
          start_point: node.start_point(),
        });
      } else if node.is_error() {
        errors.push(SyntaxError {
          kind: if node.raw_child_count() == 0 {
            SyntaxErrorKind::Lex
          } else {
            SyntaxErrorKind::Unexpected
          },
          byte_range: node.byte_range(),
          start_point: node.start_point(),
        });
      } else if node.has_error() {
        stack.extend(node.children().into_iter().rev());
      }
    }
    errors
  }

  pub fn error_count(&self) -> usize {
    self.errors().len()
  }

  pub fn to_sexp(&self) -> String {
    self.root_node().to_sexp()
  }

  /// Returns a copy of the tree adjusted to an edit of its text. Nodes the
  /// edit touches are marked as changed and will not be reused verbatim by
  /// the next parse.
  pub fn edit(&self, edit: &InputEdit) -> Tree {
    let mut root = self.root.clone();
    edit_subtree(&mut root, Edit {
      start: Length { bytes: edit.start_byte, extent: edit.start_point },
      old_end: Length { bytes: edit.old_end_byte, extent: edit.old_end_point },
      new_end: Length { bytes: edit.new_end_byte, extent: edit.new_end_point },
    });
    let data = root.make_mut();
    data.size = data.padding + data.size;
    data.padding = Length::ZERO;
    Tree::new(root, self.language.clone())
  }

  /// Ranges whose syntactic structure differs between two trees of the same
  /// text.
  pub fn changed_ranges(&self, other: &Tree) -> Vec<Range> {
    let old = visible_spans(self);
    let new = visible_spans(other);
    old.symmetric_difference(&new)
      .map(|span| span.range)
      .sorted_by_key(|r| (r.start_byte, r.end_byte))
      .coalesce(|a, b| {
        if b.start_byte <= a.end_byte {
          if b.end_byte > a.end_byte {
            Ok(Range { end_byte: b.end_byte, end_point: b.end_point, ..a })
          } else {
            Ok(a)
          }
        } else {
          Err((a, b))
        }
      })
      .collect()
  }
}

#[derive(PartialEq, Eq, Hash)]
struct Span {
  kind: u16,
  depth: usize,
  range: Range,
}

fn visible_spans(tree: &Tree) -> HashSet<Span> {
  let mut spans = HashSet::default();
  let mut stack = vec![(tree.root_node(), 0)];
  while let Some((node, depth)) = stack.pop() {
    spans.insert(Span {
      kind: node.kind_id(),
      depth,
      range: node.range(),
    });
    stack.extend(node.children().into_iter().map(|child| (child, depth + 1)));
  }
  spans
}

fn edit_subtree(tree: &mut Subtree, mut edit: Edit) {
  let is_noop = edit.old_end.bytes == edit.start.bytes && edit.new_end.bytes == edit.start.bytes;
  let is_pure_insertion = edit.old_end.bytes == edit.start.bytes;

  let mut padding = tree.padding;
  let mut size = tree.size;
  let total_size = padding + size;
  let end_byte = total_size.bytes + tree.lookahead_bytes;
  if edit.start.bytes > end_byte || (is_noop && edit.start.bytes == end_byte) {
    return;
  }

  if edit.old_end.bytes <= padding.bytes {
    // entirely before the content
    padding = edit.new_end + (padding - edit.old_end);
  } else if edit.start.bytes < padding.bytes {
    // starts before the content and extends into it
    size = size.saturating_sub(edit.old_end - padding);
    padding = edit.new_end;
  } else if edit.start.bytes == padding.bytes && is_pure_insertion {
    padding = edit.new_end;
  } else if edit.start.bytes < total_size.bytes
    || (edit.start.bytes == total_size.bytes && is_pure_insertion)
  {
    size = (edit.new_end - padding) + total_size.saturating_sub(edit.old_end);
  }

  let data = tree.make_mut();
  data.padding = padding;
  data.size = size;
  data.has_changes = true;

  let mut child_right = Length::ZERO;
  for (i, child) in data.children.iter_mut().enumerate() {
    let child_size = child.total_size();
    let child_left = child_right;
    child_right = child_left + child_size;

    if child_right.bytes + child.lookahead_bytes < edit.start.bytes {
      continue;
    }
    if child_left.bytes > edit.old_end.bytes
      || (child_left.bytes == edit.old_end.bytes && child_size.bytes > 0 && i > 0)
    {
      break;
    }

    let mut child_edit = Edit {
      start: edit.start.saturating_sub(child_left),
      old_end: edit.old_end.saturating_sub(child_left),
      new_end: edit.new_end.saturating_sub(child_left),
    };

    // inserted text belongs to the first child touching the edit
    if child_right.bytes > edit.start.bytes
      || (child_right.bytes == edit.start.bytes && is_pure_insertion)
    {
      edit.new_end = edit.start;
    } else {
      child_edit.old_end = child_edit.start;
      child_edit.new_end = child_edit.start;
    }

    edit_subtree(child, child_edit);
  }
}

impl fmt::Debug for Tree {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "Tree {{ language: {}, root: {} }}", self.language.name(), self.to_sexp())
  }
}
