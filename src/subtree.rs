//! Immutable, shareable syntax tree nodes.
//!
//! Subtrees are reference counted so that an edited tree and a re-parsed
//! tree can share every node the edit did not touch. A subtree stores only
//! lengths, never absolute positions.

use std::ops::Deref;
use std::sync::Arc;
use crate::language::{Language, StateId, Symbol, ERROR};
use crate::length::Length;
use crate::lexer::Lexed;
use crate::scanner::ScannerState;

pub(crate) const ERROR_COST_PER_RECOVERY: u32 = 500;
pub(crate) const ERROR_COST_PER_MISSING_TREE: u32 = 110;
pub(crate) const ERROR_COST_PER_SKIPPED_TREE: u32 = 100;
pub(crate) const ERROR_COST_PER_SKIPPED_LINE: u32 = 30;
pub(crate) const ERROR_COST_PER_SKIPPED_CHAR: u32 = 1;

#[derive(Clone)]
pub struct Subtree(Arc<SubtreeData>);

#[derive(Debug, Clone)]
pub struct SubtreeData {
  pub symbol: Symbol,
  /// name the node is exposed under, set by the production that owns it.
  pub alias: Option<Symbol>,
  pub padding: Length,
  pub size: Length,
  pub lookahead_bytes: usize,
  /// state of the parse stack before this subtree was pushed.
  pub parse_state: StateId,
  pub production: Option<u32>,
  pub children: Vec<Subtree>,
  pub extra: bool,
  /// zero-width token inserted by error recovery.
  pub missing: bool,
  pub has_changes: bool,
  /// built while several stack versions were alive, so it may depend on
  /// how an ambiguity was resolved.
  pub fragile: bool,
  pub error_cost: u32,
  pub dynamic_precedence: i32,
  /// scanner state after the last external token inside this subtree.
  pub external_state: Option<ScannerState>,
  pub visible: bool,
  pub named: bool,
}

impl Deref for Subtree {
  type Target = SubtreeData;

  fn deref(&self) -> &SubtreeData {
    &self.0
  }
}

impl std::fmt::Debug for Subtree {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    f.debug_struct("Subtree")
      .field("symbol", &self.symbol)
      .field("padding", &self.padding.bytes)
      .field("size", &self.size.bytes)
      .field("children", &self.children)
      .finish()
  }
}

impl Subtree {
  pub(crate) fn leaf(language: &Language, lexed: &Lexed, parse_state: StateId) -> Subtree {
    let is_error = lexed.symbol == ERROR;
    let error_cost = if is_error {
      ERROR_COST_PER_RECOVERY
        + ERROR_COST_PER_SKIPPED_CHAR * lexed.size.bytes as u32
        + ERROR_COST_PER_SKIPPED_LINE * lexed.size.extent.row as u32
    } else {
      0
    };
    Subtree(Arc::new(SubtreeData {
      symbol: lexed.symbol,
      alias: None,
      padding: lexed.padding,
      size: lexed.size,
      lookahead_bytes: lexed.lookahead_bytes,
      parse_state,
      production: None,
      children: vec![],
      extra: language.symbol_is_extra(lexed.symbol),
      missing: false,
      has_changes: false,
      fragile: false,
      error_cost,
      dynamic_precedence: 0,
      external_state: lexed.external_state.clone(),
      visible: language.symbol_is_visible(lexed.symbol),
      named: language.symbol_is_named(lexed.symbol),
    }))
  }

  /// Missing leaves are always visible, so that every inserted token shows
  /// up when the tree is inspected.
  pub(crate) fn missing_leaf(language: &Language, symbol: Symbol, parse_state: StateId) -> Subtree {
    Subtree(Arc::new(SubtreeData {
      symbol,
      alias: None,
      padding: Length::ZERO,
      size: Length::ZERO,
      lookahead_bytes: 1,
      parse_state,
      production: None,
      children: vec![],
      extra: false,
      missing: true,
      has_changes: false,
      fragile: false,
      error_cost: ERROR_COST_PER_MISSING_TREE,
      dynamic_precedence: 0,
      external_state: None,
      visible: true,
      named: language.symbol_is_named(symbol),
    }))
  }

  /// Builds an interior node and summarizes its children.
  pub(crate) fn node(
    language: &Language,
    symbol: Symbol,
    children: Vec<Subtree>,
    production: Option<u32>,
    parse_state: StateId,
    fragile: bool,
  ) -> Subtree {
    let mut data = SubtreeData {
      symbol,
      alias: None,
      padding: Length::ZERO,
      size: Length::ZERO,
      lookahead_bytes: 0,
      parse_state,
      production,
      children,
      extra: false,
      missing: false,
      has_changes: false,
      fragile,
      error_cost: 0,
      dynamic_precedence: production
        .map_or(0, |p| language.production(p).dynamic_precedence),
      external_state: None,
      visible: language.symbol_is_visible(symbol),
      named: language.symbol_is_named(symbol),
    };
    data.summarize();
    Subtree(Arc::new(data))
  }

  /// Returns a copy exposed under `alias`, sharing the children.
  pub(crate) fn with_alias(&self, language: &Language, alias: Option<Symbol>) -> Subtree {
    if self.alias == alias {
      return self.clone();
    }
    let mut data = (*self.0).clone();
    let exposed = alias.unwrap_or(data.symbol);
    data.alias = alias;
    data.visible = language.symbol_is_visible(exposed);
    data.named = language.symbol_is_named(exposed);
    Subtree(Arc::new(data))
  }

  pub(crate) fn with_extra(&self, extra: bool) -> Subtree {
    if self.extra == extra {
      return self.clone();
    }
    let mut data = (*self.0).clone();
    data.extra = extra;
    Subtree(Arc::new(data))
  }

  pub(crate) fn make_mut(&mut self) -> &mut SubtreeData {
    Arc::make_mut(&mut self.0)
  }

  /// The symbol the node is exposed under.
  pub fn kind_symbol(&self) -> Symbol {
    self.alias.unwrap_or(self.symbol)
  }

  pub fn total_size(&self) -> Length {
    self.padding + self.size
  }

  pub fn is_error(&self) -> bool {
    self.symbol == ERROR
  }

  pub fn has_error(&self) -> bool {
    self.error_cost > 0
  }

  /// Extras and error nodes may sit between the children of any production.
  pub(crate) fn is_extra_like(&self) -> bool {
    self.extra || self.is_error()
  }

  pub(crate) fn is_leaf(&self) -> bool {
    self.children.is_empty()
  }

  pub fn ptr_eq(&self, other: &Subtree) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }

  pub(crate) fn id(&self) -> usize {
    Arc::as_ptr(&self.0) as usize
  }
}

impl SubtreeData {
  pub(crate) fn summarize(&mut self) {
    let mut total = Length::ZERO;
    let mut lookahead_end = 0;
    let mut error_cost = 0;
    let mut dynamic_precedence = 0;
    let mut external_state = None;
    let mut skipped_trees = 0;

    for (i, child) in self.children.iter().enumerate() {
      if i == 0 {
        self.padding = child.padding;
      }
      let end = total + child.total_size();
      lookahead_end = lookahead_end.max(end.bytes + child.lookahead_bytes);
      total = end;
      error_cost += child.error_cost;
      dynamic_precedence += child.dynamic_precedence;
      if child.external_state.is_some() {
        external_state = child.external_state.clone();
      }
      if child.visible && !child.extra {
        skipped_trees += 1;
      }
    }

    if self.children.is_empty() {
      self.padding = Length::ZERO;
    }
    self.size = total - self.padding;
    self.lookahead_bytes = lookahead_end.saturating_sub(total.bytes);
    self.dynamic_precedence += dynamic_precedence;
    self.external_state = external_state;
    self.error_cost = error_cost;
    if self.symbol == ERROR {
      self.error_cost += ERROR_COST_PER_RECOVERY
        + ERROR_COST_PER_SKIPPED_CHAR * self.size.bytes as u32
        + ERROR_COST_PER_SKIPPED_LINE * self.size.extent.row as u32
        + ERROR_COST_PER_SKIPPED_TREE * skipped_trees;
    }
  }
}
