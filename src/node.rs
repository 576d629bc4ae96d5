use std::fmt;
use std::ops;
use crate::language::Symbol;
use crate::length::{Length, Point};
use crate::subtree::Subtree;
use crate::tree::{NodeKey, Range, Tree};

/// A visible node of a [`Tree`], with its absolute position.
///
/// Invisible nodes (hidden rules and repetition helpers) are never exposed;
/// their children are reported as children of the nearest visible ancestor.
#[derive(Clone, Copy)]
pub struct Node<'tree> {
  tree: &'tree Tree,
  subtree: &'tree Subtree,
  /// start of the padding before the node.
  offset: Length,
}

impl<'tree> Node<'tree> {
  pub(crate) fn new(tree: &'tree Tree, subtree: &'tree Subtree, offset: Length) -> Self {
    Node { tree, subtree, offset }
  }

  pub(crate) fn key(&self) -> NodeKey {
    (self.subtree.id(), self.offset.bytes)
  }

  pub(crate) fn parts(&self) -> (&'tree Subtree, Length) {
    (self.subtree, self.offset)
  }

  /// Stable identity of the node's subtree. Unchanged subtrees reused by an
  /// incremental parse keep their id.
  pub fn id(&self) -> usize {
    self.subtree.id()
  }

  pub fn kind(&self) -> &'tree str {
    self.tree.language().symbol_name(self.subtree.kind_symbol())
  }

  pub fn kind_id(&self) -> Symbol {
    self.subtree.kind_symbol()
  }

  pub fn is_named(&self) -> bool {
    self.subtree.named
  }

  pub fn is_extra(&self) -> bool {
    self.subtree.extra
  }

  pub fn is_error(&self) -> bool {
    self.subtree.is_error()
  }

  pub fn is_missing(&self) -> bool {
    self.subtree.missing
  }

  pub fn has_error(&self) -> bool {
    self.subtree.has_error()
  }

  pub fn has_changes(&self) -> bool {
    self.subtree.has_changes
  }

  pub fn start_byte(&self) -> usize {
    self.offset.bytes + self.subtree.padding.bytes
  }

  pub fn end_byte(&self) -> usize {
    self.start_byte() + self.subtree.size.bytes
  }

  pub fn byte_range(&self) -> ops::Range<usize> {
    self.start_byte()..self.end_byte()
  }

  pub fn start_point(&self) -> Point {
    (self.offset + self.subtree.padding).extent
  }

  pub fn end_point(&self) -> Point {
    (self.offset + self.subtree.total_size()).extent
  }

  pub fn range(&self) -> Range {
    Range {
      start_byte: self.start_byte(),
      end_byte: self.end_byte(),
      start_point: self.start_point(),
      end_point: self.end_point(),
    }
  }

  pub fn utf8_text<'a>(&self, source: &'a str) -> &'a str {
    &source[self.byte_range()]
  }

  /// The node's text in a source parsed with [`Parser::parse_bytes`](crate::Parser::parse_bytes).
  pub fn bytes<'a>(&self, source: &'a [u8]) -> &'a [u8] {
    &source[self.byte_range()]
  }

  pub(crate) fn raw_child_count(&self) -> usize {
    self.subtree.children.len()
  }

  pub fn children(&self) -> Vec<Node<'tree>> {
    let mut children = vec![];
    push_visible_children(self.tree, self.subtree, self.offset, &mut children);
    children
  }

  pub fn child_count(&self) -> usize {
    self.children().len()
  }

  pub fn child(&self, index: usize) -> Option<Node<'tree>> {
    self.children().into_iter().nth(index)
  }

  pub fn named_children(&self) -> Vec<Node<'tree>> {
    self.children().into_iter().filter(Node::is_named).collect()
  }

  pub fn named_child_count(&self) -> usize {
    self.named_children().len()
  }

  pub fn named_child(&self, index: usize) -> Option<Node<'tree>> {
    self.named_children().into_iter().nth(index)
  }

  pub fn parent(&self) -> Option<Node<'tree>> {
    let (subtree, offset) = self.tree.parent_of(self.key())?;
    Some(Node::new(self.tree, subtree, offset))
  }

  pub fn next_sibling(&self) -> Option<Node<'tree>> {
    let siblings = self.parent()?.children();
    let index = siblings.iter().position(|n| n == self)?;
    siblings.get(index + 1).copied()
  }

  pub fn next_named_sibling(&self) -> Option<Node<'tree>> {
    let siblings = self.parent()?.children();
    let index = siblings.iter().position(|n| n == self)?;
    siblings[index + 1..].iter().find(|n| n.is_named()).copied()
  }

  pub fn prev_sibling(&self) -> Option<Node<'tree>> {
    let siblings = self.parent()?.children();
    let index = siblings.iter().position(|n| n == self)?;
    index.checked_sub(1).map(|i| siblings[i])
  }

  /// The smallest node spanning `start..end`.
  pub fn descendant_for_byte_range(&self, start: usize, end: usize) -> Option<Node<'tree>> {
    if start < self.start_byte() || end > self.end_byte() {
      return None;
    }
    let mut node = *self;
    'descend: loop {
      for child in node.children() {
        let contains = if start == end {
          child.start_byte() <= start && start < child.end_byte()
        } else {
          child.start_byte() <= start && end <= child.end_byte()
        };
        if contains {
          node = child;
          continue 'descend;
        }
      }
      return Some(node);
    }
  }

  /// The smallest named node spanning `start..end`.
  pub fn named_descendant_for_byte_range(&self, start: usize, end: usize) -> Option<Node<'tree>> {
    let mut node = self.descendant_for_byte_range(start, end)?;
    while !node.is_named() {
      node = node.parent()?;
    }
    Some(node)
  }

  pub fn walk(&self) -> TreeCursor<'tree> {
    TreeCursor {
      stack: vec![(vec![*self], 0)],
    }
  }

  /// Named nodes as an S-expression. Missing nodes are written as
  /// `(MISSING kind)`.
  pub fn to_sexp(&self) -> String {
    let mut result = String::new();
    write_sexp(self, &mut result, true);
    result
  }

  /// Like [`Node::to_sexp`], with the byte range of every node.
  pub fn to_sexp_with_ranges(&self) -> String {
    let mut result = String::new();
    write_sexp_with_ranges(self, &mut result);
    result
  }
}

fn push_visible_children<'tree>(
  tree: &'tree Tree,
  subtree: &'tree Subtree,
  offset: Length,
  out: &mut Vec<Node<'tree>>,
) {
  let mut position = offset;
  for child in &subtree.children {
    if child.visible {
      out.push(Node::new(tree, child, position));
    } else if !child.children.is_empty() {
      push_visible_children(tree, child, position, out);
    }
    position = position + child.total_size();
  }
}

fn write_sexp(node: &Node, out: &mut String, is_root: bool) {
  if !is_root && !node.is_named() && !node.is_missing() {
    return;
  }
  if !out.is_empty() {
    out.push(' ');
  }
  if node.is_missing() {
    if node.is_named() {
      out.push_str(&format!("(MISSING {})", node.kind()));
    } else {
      out.push_str(&format!("(MISSING {:?})", node.kind()));
    }
    return;
  }
  out.push('(');
  out.push_str(node.kind());
  for child in node.children() {
    write_sexp(&child, out, false);
  }
  out.push(')');
}

fn write_sexp_with_ranges(node: &Node, out: &mut String) {
  if !out.is_empty() {
    out.push(' ');
  }
  out.push_str(&format!("({:?} {}..{}", node.kind(), node.start_byte(), node.end_byte()));
  if node.is_missing() {
    out.push_str(" MISSING");
  }
  for child in node.children() {
    write_sexp_with_ranges(&child, out);
  }
  out.push(')');
}

impl PartialEq for Node<'_> {
  fn eq(&self, other: &Self) -> bool {
    self.subtree.ptr_eq(other.subtree) && self.offset == other.offset
  }
}

impl fmt::Debug for Node<'_> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(
      f,
      "{{Node {} {} - {}}}",
      self.kind(),
      self.start_point(),
      self.end_point()
    )
  }
}

/// Depth-first walk over the visible nodes below a starting node.
#[derive(Clone)]
pub struct TreeCursor<'tree> {
  /// siblings at each depth, with the index of the current one.
  stack: Vec<(Vec<Node<'tree>>, usize)>,
}

impl<'tree> TreeCursor<'tree> {
  pub fn node(&self) -> Node<'tree> {
    let (siblings, index) = &self.stack[self.stack.len() - 1];
    siblings[*index]
  }

  pub fn depth(&self) -> usize {
    self.stack.len() - 1
  }

  pub fn goto_first_child(&mut self) -> bool {
    let children = self.node().children();
    if children.is_empty() {
      return false;
    }
    self.stack.push((children, 0));
    true
  }

  pub fn goto_next_sibling(&mut self) -> bool {
    if self.stack.len() == 1 {
      return false;
    }
    let last = self.stack.len() - 1;
    let (siblings, index) = &mut self.stack[last];
    if *index + 1 < siblings.len() {
      *index += 1;
      true
    } else {
      false
    }
  }

  pub fn goto_parent(&mut self) -> bool {
    if self.stack.len() == 1 {
      return false;
    }
    self.stack.pop();
    true
  }

  /// The current node and everything below it, in pre-order.
  pub fn descendants(&self) -> Descendants<'tree> {
    Descendants {
      stack: vec![self.node()],
    }
  }
}

pub struct Descendants<'tree> {
  stack: Vec<Node<'tree>>,
}

impl<'tree> Iterator for Descendants<'tree> {
  type Item = Node<'tree>;

  fn next(&mut self) -> Option<Node<'tree>> {
    let node = self.stack.pop()?;
    self.stack.extend(node.children().into_iter().rev());
    Some(node)
  }
}
