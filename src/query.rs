//! Structural pattern matching over trees.
//!
//! A query is a list of patterns written as S-expressions:
//!
//! ```text
//! ; an output with its variable
//! (output_directive (variable) @name)
//! ; anonymous nodes and wildcards
//! (html_start_tag "<" (_) @tag_name _)
//! ; predicates restrict captured text
//! ((variable) @v (#match? @v "^is_"))
//! ```
//!
//! Child patterns match an ordered subsequence of the visible children.

use std::collections::VecDeque;
use std::fmt;
use std::ops;
use regex::Regex;
use thiserror::Error;
use crate::language::Language;
use crate::node::Node;
use crate::Set;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
  #[error("invalid query syntax at offset {offset}")]
  Syntax { offset: usize },
  #[error("unknown node type {name} at offset {offset}")]
  NodeType { name: String, offset: usize },
  #[error("unknown capture @{name} at offset {offset}")]
  Capture { name: String, offset: usize },
  #[error("invalid predicate at offset {offset}: {message}")]
  Predicate { message: String, offset: usize },
}

pub struct Query {
  language: Language,
  patterns: Vec<Pattern>,
  capture_names: Set<String>,
}

#[derive(Debug)]
struct Pattern {
  root: PatternNode,
  predicates: Vec<Predicate>,
  start_byte: usize,
}

#[derive(Debug)]
struct PatternNode {
  kind: KindPattern,
  captures: Vec<u32>,
  children: Vec<PatternNode>,
}

#[derive(Debug)]
enum KindPattern {
  /// `_`
  Any,
  /// `(_)`
  AnyNamed,
  Named(String),
  Anonymous(String),
}

#[derive(Debug)]
enum Predicate {
  Eq { capture: u32, value: Argument, negate: bool },
  Match { capture: u32, regex: Regex, negate: bool },
}

#[derive(Debug)]
enum Argument {
  Capture(u32),
  Text(String),
}

#[derive(Debug, Clone, Copy)]
pub struct QueryCapture<'tree> {
  pub index: u32,
  pub node: Node<'tree>,
}

#[derive(Debug, Clone)]
pub struct QueryMatch<'tree> {
  pub pattern_index: usize,
  pub captures: Vec<QueryCapture<'tree>>,
}

impl<'tree> QueryMatch<'tree> {
  pub fn nodes_for_capture_index(&self, index: u32) -> impl Iterator<Item = Node<'tree>> + '_ {
    self.captures.iter()
      .filter(move |c| c.index == index)
      .map(|c| c.node)
  }
}

impl Query {
  pub fn new(language: &Language, source: &str) -> Result<Query, QueryError> {
    let mut parser = QueryParser {
      language,
      source,
      pos: 0,
      capture_names: Set::default(),
      predicates: vec![],
    };
    let mut patterns = vec![];
    loop {
      parser.skip_trivia();
      if parser.pos >= source.len() {
        break;
      }
      patterns.push(parser.pattern()?);
    }
    Ok(Query {
      language: language.clone(),
      patterns,
      capture_names: parser.capture_names,
    })
  }

  pub fn language(&self) -> &Language {
    &self.language
  }

  pub fn pattern_count(&self) -> usize {
    self.patterns.len()
  }

  pub fn start_byte_for_pattern(&self, index: usize) -> usize {
    self.patterns[index].start_byte
  }

  pub fn capture_names(&self) -> Vec<&str> {
    self.capture_names.iter().map(String::as_str).collect()
  }

  pub fn capture_index_for_name(&self, name: &str) -> Option<u32> {
    self.capture_names.get_index_of(name).map(|i| i as u32)
  }

  /// Every distinct binding of the pattern's captures rooted at `node`.
  fn match_pattern<'tree>(
    &self,
    pattern: &Pattern,
    node: Node<'tree>,
    source: &str,
  ) -> Vec<Vec<QueryCapture<'tree>>> {
    let mut found: Vec<Vec<QueryCapture<'tree>>> = vec![];
    let mut captures = vec![];
    match_node(&pattern.root, node, &mut captures, &mut |captures| {
      let holds = pattern.predicates.iter().all(|p| predicate_holds(p, captures, source));
      if holds && !found.iter().any(|other| same_captures(other, captures)) {
        found.push(captures.clone());
      }
      // keep backtracking into the remaining bindings
      false
    });
    found
  }
}

impl fmt::Debug for Query {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("Query")
      .field("language", &self.language.name())
      .field("patterns", &self.patterns)
      .field("capture_names", &self.capture_names)
      .finish()
  }
}

type Continuation<'a, 'tree> = &'a mut dyn FnMut(&mut Vec<QueryCapture<'tree>>) -> bool;

fn kind_matches(kind: &KindPattern, node: &Node) -> bool {
  match kind {
    KindPattern::Any => true,
    KindPattern::AnyNamed => node.is_named(),
    KindPattern::Named(name) => node.is_named() && node.kind() == name,
    KindPattern::Anonymous(text) => !node.is_named() && node.kind() == text,
  }
}

fn match_node<'tree>(
  pattern: &PatternNode,
  node: Node<'tree>,
  captures: &mut Vec<QueryCapture<'tree>>,
  rest: Continuation<'_, 'tree>,
) -> bool {
  if !kind_matches(&pattern.kind, &node) {
    return false;
  }
  let mark = captures.len();
  captures.extend(pattern.captures.iter().map(|&index| QueryCapture { index, node }));
  let children = if pattern.children.is_empty() { vec![] } else { node.children() };
  if match_sequence(&pattern.children, &children, captures, rest) {
    true
  } else {
    captures.truncate(mark);
    false
  }
}

fn match_sequence<'tree>(
  patterns: &[PatternNode],
  nodes: &[Node<'tree>],
  captures: &mut Vec<QueryCapture<'tree>>,
  rest: Continuation<'_, 'tree>,
) -> bool {
  let (first, others) = match patterns.split_first() {
    Some(split) => split,
    None => return rest(captures),
  };
  for (i, &node) in nodes.iter().enumerate() {
    let siblings = &nodes[i + 1..];
    let matched = match_node(first, node, captures, &mut |captures| {
      match_sequence(others, siblings, captures, &mut *rest)
    });
    if matched {
      return true;
    }
  }
  false
}

fn same_captures(a: &[QueryCapture], b: &[QueryCapture]) -> bool {
  a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.index == b.index && a.node == b.node)
}

fn captured_text<'a>(captures: &[QueryCapture], index: u32, source: &'a str) -> Option<&'a str> {
  captures.iter()
    .find(|c| c.index == index)
    .map(|c| c.node.utf8_text(source))
}

fn predicate_holds(predicate: &Predicate, captures: &[QueryCapture], source: &str) -> bool {
  match predicate {
    Predicate::Eq { capture, value, negate } => {
      let left = match captured_text(captures, *capture, source) {
        Some(text) => text,
        None => return true,
      };
      let right = match value {
        Argument::Text(text) => Some(text.as_str()),
        Argument::Capture(other) => captured_text(captures, *other, source),
      };
      match right {
        Some(right) => (left == right) != *negate,
        None => true,
      }
    }
    Predicate::Match { capture, regex, negate } => match captured_text(captures, *capture, source) {
      Some(text) => regex.is_match(text) != *negate,
      None => true,
    },
  }
}

struct QueryParser<'a> {
  language: &'a Language,
  source: &'a str,
  pos: usize,
  capture_names: Set<String>,
  /// predicates of the pattern being parsed, wherever they are written.
  predicates: Vec<Predicate>,
}

impl<'a> QueryParser<'a> {
  fn peek(&self) -> Option<char> {
    self.source[self.pos..].chars().next()
  }

  fn bump(&mut self) {
    if let Some(c) = self.peek() {
      self.pos += c.len_utf8();
    }
  }

  fn expect(&mut self, c: char) -> Result<(), QueryError> {
    self.skip_trivia();
    if self.peek() == Some(c) {
      self.bump();
      Ok(())
    } else {
      Err(self.syntax_error())
    }
  }

  fn syntax_error(&self) -> QueryError {
    QueryError::Syntax { offset: self.pos }
  }

  fn skip_trivia(&mut self) {
    while let Some(c) = self.peek() {
      if c.is_whitespace() {
        self.bump();
      } else if c == ';' {
        while !matches!(self.peek(), None | Some('\n')) {
          self.bump();
        }
      } else {
        break;
      }
    }
  }

  fn identifier(&mut self) -> Result<String, QueryError> {
    let start = self.pos;
    while let Some(c) = self.peek() {
      if c.is_whitespace() || "()\"@#;".contains(c) {
        break;
      }
      self.bump();
    }
    if self.pos == start {
      return Err(self.syntax_error());
    }
    Ok(self.source[start..self.pos].to_owned())
  }

  fn string(&mut self) -> Result<String, QueryError> {
    self.expect('"')?;
    let mut text = String::new();
    loop {
      match self.peek() {
        None => return Err(self.syntax_error()),
        Some('"') => {
          self.bump();
          return Ok(text);
        }
        Some('\\') => {
          self.bump();
          let escaped = match self.peek() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some(c) => c,
            None => return Err(self.syntax_error()),
          };
          text.push(escaped);
          self.bump();
        }
        Some(c) => {
          text.push(c);
          self.bump();
        }
      }
    }
  }

  fn pattern(&mut self) -> Result<Pattern, QueryError> {
    self.skip_trivia();
    let start_byte = self.pos;

    let is_group = self.peek() == Some('(') && {
      let rest = self.source[self.pos + 1..].trim_start();
      rest.starts_with('(') || rest.starts_with('"')
    };
    let root = if is_group {
      self.bump();
      let mut root = None;
      loop {
        self.skip_trivia();
        match self.peek() {
          Some(')') => {
            self.bump();
            break;
          }
          None => return Err(self.syntax_error()),
          _ => {
            let offset = self.pos;
            match self.item()? {
              Some(node) if root.is_none() => root = Some(node),
              Some(_) => return Err(QueryError::Syntax { offset }),
              None => {}
            }
          }
        }
      }
      root.ok_or(QueryError::Syntax { offset: start_byte })?
    } else {
      self.item()?.ok_or(QueryError::Syntax { offset: start_byte })?
    };

    Ok(Pattern {
      root,
      predicates: std::mem::take(&mut self.predicates),
      start_byte,
    })
  }

  /// A node pattern with its captures. Predicates are collected on the
  /// parser and yield `None`.
  fn item(&mut self) -> Result<Option<PatternNode>, QueryError> {
    self.skip_trivia();
    let start = self.pos;
    let kind = match self.peek() {
      Some('"') => {
        let text = self.string()?;
        if !self.language.has_kind(&text, false) {
          return Err(QueryError::NodeType { name: text, offset: start });
        }
        KindPattern::Anonymous(text)
      }
      Some('_') if self.is_bare_wildcard() => {
        self.bump();
        KindPattern::Any
      }
      Some('(') => {
        self.bump();
        self.skip_trivia();
        if self.peek() == Some('#') {
          let predicate = self.predicate(start)?;
          self.predicates.push(predicate);
          return Ok(None);
        }
        return self.node_body().map(Some);
      }
      _ => return Err(self.syntax_error()),
    };
    let captures = self.captures()?;
    Ok(Some(PatternNode {
      kind,
      captures,
      children: vec![],
    }))
  }

  fn is_bare_wildcard(&self) -> bool {
    let next = self.source[self.pos + 1..].chars().next();
    next.map_or(true, |c| c.is_whitespace() || "()@;".contains(c))
  }

  /// The rest of `(kind children...)` after the opening parenthesis.
  fn node_body(&mut self) -> Result<PatternNode, QueryError> {
    let name_offset = self.pos;
    let name = self.identifier()?;
    let kind = if name == "_" {
      KindPattern::AnyNamed
    } else if self.language.has_kind(&name, true) {
      KindPattern::Named(name)
    } else {
      return Err(QueryError::NodeType { name, offset: name_offset });
    };

    let mut children = vec![];
    loop {
      self.skip_trivia();
      match self.peek() {
        Some(')') => {
          self.bump();
          break;
        }
        None => return Err(self.syntax_error()),
        _ => children.extend(self.item()?),
      }
    }

    let captures = self.captures()?;
    Ok(PatternNode { kind, captures, children })
  }

  fn captures(&mut self) -> Result<Vec<u32>, QueryError> {
    let mut captures = vec![];
    loop {
      self.skip_trivia();
      if self.peek() != Some('@') {
        return Ok(captures);
      }
      self.bump();
      let name = self.identifier()?;
      let (index, _) = self.capture_names.insert_full(name);
      captures.push(index as u32);
    }
  }

  fn capture_reference(&mut self) -> Result<u32, QueryError> {
    self.skip_trivia();
    let offset = self.pos;
    if self.peek() != Some('@') {
      return Err(self.syntax_error());
    }
    self.bump();
    let name = self.identifier()?;
    self.capture_names.get_index_of(&name)
      .map(|i| i as u32)
      .ok_or(QueryError::Capture { name, offset })
  }

  /// `(#name? args...)`, after the opening parenthesis.
  fn predicate(&mut self, offset: usize) -> Result<Predicate, QueryError> {
    self.bump();
    let name = self.identifier()?;
    let capture = self.capture_reference()?;
    self.skip_trivia();
    let predicate = match name.as_str() {
      "eq?" | "not-eq?" => {
        let value = if self.peek() == Some('@') {
          Argument::Capture(self.capture_reference()?)
        } else {
          Argument::Text(self.string()?)
        };
        Predicate::Eq { capture, value, negate: name == "not-eq?" }
      }
      "match?" | "not-match?" => {
        let source = self.string()?;
        let regex = Regex::new(&source).map_err(|e| QueryError::Predicate {
          message: e.to_string(),
          offset,
        })?;
        Predicate::Match { capture, regex, negate: name == "not-match?" }
      }
      _ => {
        return Err(QueryError::Predicate {
          message: format!("unknown predicate #{}", name),
          offset,
        })
      }
    };
    self.expect(')')?;
    Ok(predicate)
  }
}

/// Runs queries over a tree, optionally restricted to a byte range.
#[derive(Debug, Clone, Default)]
pub struct QueryCursor {
  byte_range: Option<ops::Range<usize>>,
}

impl QueryCursor {
  pub fn new() -> Self {
    Self::default()
  }

  /// Only nodes intersecting `range` are matched.
  pub fn set_byte_range(&mut self, range: ops::Range<usize>) -> &mut Self {
    self.byte_range = Some(range);
    self
  }

  /// Matches of every pattern against `node` and its descendants, in
  /// pre-order. A pattern yields one match per distinct way its captures
  /// bind at a node, in the order the children are visited.
  pub fn matches<'a, 'tree>(
    &self,
    query: &'a Query,
    node: Node<'tree>,
    source: &'a str,
  ) -> QueryMatches<'a, 'tree> {
    QueryMatches {
      query,
      source,
      byte_range: self.byte_range.clone(),
      stack: vec![node],
      pending: VecDeque::new(),
    }
  }
}

/// Lazy iterator over query matches. Cloning it restarts from the same
/// point.
#[derive(Clone)]
pub struct QueryMatches<'a, 'tree> {
  query: &'a Query,
  source: &'a str,
  byte_range: Option<ops::Range<usize>>,
  stack: Vec<Node<'tree>>,
  pending: VecDeque<QueryMatch<'tree>>,
}

impl QueryMatches<'_, '_> {
  fn intersects(&self, node: &Node) -> bool {
    match &self.byte_range {
      None => true,
      Some(range) => {
        (node.start_byte() < range.end && range.start < node.end_byte())
          || node.start_byte() == range.start
      }
    }
  }
}

impl<'a, 'tree> Iterator for QueryMatches<'a, 'tree> {
  type Item = QueryMatch<'tree>;

  fn next(&mut self) -> Option<QueryMatch<'tree>> {
    loop {
      if let Some(m) = self.pending.pop_front() {
        return Some(m);
      }
      let node = self.stack.pop()?;
      if !self.intersects(&node) {
        continue;
      }
      self.stack.extend(node.children().into_iter().rev());
      for (pattern_index, pattern) in self.query.patterns.iter().enumerate() {
        for captures in self.query.match_pattern(pattern, node, self.source) {
          self.pending.push_back(QueryMatch { pattern_index, captures });
        }
      }
    }
  }
}

impl fmt::Debug for QueryMatches<'_, '_> {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("QueryMatches")
      .field("byte_range", &self.byte_range)
      .field("pending", &self.pending)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use grammar::GrammarBuilder;
  use grammar::rule::*;
  use crate::parser::Parser;
  use crate::tree::Tree;

  const SOURCE: &str = "{{ foo }} {{ bar }}";

  fn language() -> Language {
    let mut builder = GrammarBuilder::new("output");
    builder
      .rule("source", repeat(sym("output-statement")))
      .rule("output-statement", seq(vec![string("{{"), sym("identifier"), string("}}")]))
      .rule("identifier", pattern("[a-z]+"))
      .extra(pattern(r"\s"));
    Language::compile(&builder, None).unwrap()
  }

  fn parse(language: &Language, text: &str) -> Tree {
    Parser::new(language).parse(text, None).into_tree()
  }

  fn captured(query: &Query, tree: &Tree, text: &str) -> Vec<(usize, String)> {
    QueryCursor::new()
      .matches(query, tree.root_node(), text)
      .flat_map(|m| {
        let pattern = m.pattern_index;
        m.captures.into_iter().map(move |c| (pattern, c.node.utf8_text(text).to_owned()))
      })
      .collect()
  }

  #[test]
  fn captures_in_document_order() {
    let language = language();
    let tree = parse(&language, SOURCE);
    let query = Query::new(&language, "(output-statement (identifier) @name)").unwrap();
    assert_eq!(query.capture_names(), vec!["name"]);
    assert_eq!(captured(&query, &tree, SOURCE), vec![
      (0, "foo".to_owned()),
      (0, "bar".to_owned()),
    ]);
  }

  #[test]
  fn anonymous_nodes_and_wildcards() {
    let language = language();
    let tree = parse(&language, SOURCE);
    let query = Query::new(&language, r#"
      ; opening braces
      "{{" @open
      (output-statement _ @first (_) @named)
    "#).unwrap();
    let found = captured(&query, &tree, SOURCE);
    assert_eq!(found, vec![
      (1, "{{".to_owned()),
      (1, "foo".to_owned()),
      (0, "{{".to_owned()),
      (1, "{{".to_owned()),
      (1, "bar".to_owned()),
      (0, "{{".to_owned()),
    ]);
  }

  #[test]
  fn predicates_filter_matches() {
    let language = language();
    let tree = parse(&language, SOURCE);
    let eq = Query::new(&language, r#"((identifier) @id (#eq? @id "bar"))"#).unwrap();
    assert_eq!(captured(&eq, &tree, SOURCE), vec![(0, "bar".to_owned())]);
    let not_eq = Query::new(&language, r#"((identifier) @id (#not-eq? @id "bar"))"#).unwrap();
    assert_eq!(captured(&not_eq, &tree, SOURCE), vec![(0, "foo".to_owned())]);
    let re = Query::new(&language, r#"((identifier) @id (#match? @id "^f"))"#).unwrap();
    assert_eq!(captured(&re, &tree, SOURCE), vec![(0, "foo".to_owned())]);
  }

  #[test]
  fn every_binding_is_a_match() {
    let language = language();
    let text = "{{ a }} {{ b }} {{ c }}";
    let tree = parse(&language, text);
    let nested = Query::new(&language, "(source (output-statement (identifier) @name))").unwrap();
    assert_eq!(captured(&nested, &tree, text), vec![
      (0, "a".to_owned()),
      (0, "b".to_owned()),
      (0, "c".to_owned()),
    ]);

    let pairs = Query::new(&language, r#"
      (source
        (output-statement (identifier) @first)
        (output-statement (identifier) @second))
    "#).unwrap();
    let found = QueryCursor::new()
      .matches(&pairs, tree.root_node(), text)
      .map(|m| m.captures.iter().map(|c| c.node.utf8_text(text)).collect::<Vec<_>>().join(""))
      .collect::<Vec<_>>();
    assert_eq!(found, vec!["ab", "ac", "bc"]);

    let uncaptured = Query::new(&language, "(source (output-statement))").unwrap();
    assert_eq!(QueryCursor::new().matches(&uncaptured, tree.root_node(), text).count(), 1);
  }

  #[test]
  fn byte_range_restricts_matches() {
    let language = language();
    let tree = parse(&language, SOURCE);
    let query = Query::new(&language, "(identifier) @id").unwrap();
    let mut cursor = QueryCursor::new();
    cursor.set_byte_range(10..19);
    let names: Vec<_> = cursor.matches(&query, tree.root_node(), SOURCE)
      .map(|m| m.captures[0].node.utf8_text(SOURCE))
      .collect();
    assert_eq!(names, vec!["bar"]);
  }

  #[test]
  fn matches_are_restartable() {
    let language = language();
    let tree = parse(&language, SOURCE);
    let query = Query::new(&language, "(identifier) @id").unwrap();
    let cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, tree.root_node(), SOURCE);
    let first = matches.next().unwrap();
    let rest = matches.clone().count();
    assert_eq!(first.captures[0].node.utf8_text(SOURCE), "foo");
    assert_eq!(rest, 1);
    assert_eq!(matches.count(), 1);
  }

  #[test]
  fn invalid_queries() {
    let language = language();
    assert_eq!(Query::new(&language, "(nope)").unwrap_err(),
      QueryError::NodeType { name: "nope".to_owned(), offset: 1 });
    assert_eq!(Query::new(&language, "(identifier").unwrap_err(),
      QueryError::Syntax { offset: 11 });
    assert_eq!(Query::new(&language, r#"((identifier) (#eq? @x "a"))"#).unwrap_err(),
      QueryError::Capture { name: "x".to_owned(), offset: 20 });
    assert!(matches!(
      Query::new(&language, r#"((identifier) @i (#frob? @i "a"))"#),
      Err(QueryError::Predicate { .. })
    ));
    assert!(matches!(
      Query::new(&language, r#"((identifier) @i (#match? @i "("))"#),
      Err(QueryError::Predicate { .. })
    ));
  }
}
