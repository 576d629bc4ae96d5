//! Generalized LR parsing.
//!
//! The parser runs the LR automaton over tokens requested from the lexer.
//! A table cell with several actions forks the parse into versions that
//! advance in lockstep by text position; versions that reach identical
//! stacks are merged, keeping the one with fewer errors and then the higher
//! dynamic precedence.
//!
//! Syntax errors never abort a parse. A lone version that cannot continue
//! first tries to insert one missing token, then skips the lookahead into an
//! ERROR node, and at the end of input wraps whatever it has into an ERROR
//! root.

use std::time::Instant;
use smallvec::SmallVec;
use tracing::{debug, trace};
use crate::language::{Language, ParseAction, StateId, Symbol, END, ERROR, SymbolKind};
use crate::length::Length;
use crate::lexer::{self, Lexed};
use crate::scanner::ScannerState;
use crate::subtree::Subtree;
use crate::tree::Tree;
use self::reusable::ReusableNodes;
use self::stack::Stack;

pub use self::options::*;

mod options;
mod reusable;
mod stack;

/// Reductions tried when checking that an inserted token lets parsing go on.
const MAX_SIMULATED_REDUCTIONS: usize = 64;
const MAX_MISSING_IN_A_ROW: u32 = 3;
const MAX_MISSING_AT_END: u32 = 8;

/// What a parse version did in one step, for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
  Shifting,
  Reducing,
  ConflictForked,
  ErrorRecovering,
  Accepted,
}

pub struct Parser {
  language: Language,
  options: ParseOptions,
}

impl Parser {
  pub fn new(language: &Language) -> Self {
    Parser {
      language: language.clone(),
      options: ParseOptions::default(),
    }
  }

  pub fn language(&self) -> &Language {
    &self.language
  }

  pub fn options(&self) -> &ParseOptions {
    &self.options
  }

  pub fn set_options(&mut self, options: ParseOptions) {
    self.options = options;
  }

  /// Parses `text`. If `old_tree` is the tree of the previous text, edited
  /// with [`Tree::edit`] to match `text`, its unchanged subtrees are reused.
  pub fn parse(&mut self, text: &str, old_tree: Option<&Tree>) -> ParseOutcome {
    self.parse_bytes(text.as_bytes(), old_tree)
  }

  /// Parses text that may not be valid UTF-8. Invalid sequences become
  /// ERROR leaves; node ranges are byte offsets into `text` either way.
  pub fn parse_bytes(&mut self, text: &[u8], old_tree: Option<&Tree>) -> ParseOutcome {
    debug!(
      language = self.language.name(),
      bytes = text.len(),
      incremental = old_tree.is_some(),
      "parse"
    );
    let old_tree = old_tree.filter(|tree| tree.language() == &self.language);
    let run = Run {
      language: &self.language,
      text,
      options: &self.options,
      stack: Stack::new(),
      versions: vec![Version::new()],
      finished: None,
      reusable: old_tree.map(|tree| ReusableNodes::new(tree.root())),
      total: Length::of_bytes(text),
    };
    run.run()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
  Active,
  Halted,
  Done,
}

#[derive(Debug, Clone)]
struct Version {
  head: usize,
  status: Status,
  lookahead: Option<Lookahead>,
  scanner_state: ScannerState,
  missing_in_a_row: u32,
  /// (position, recoveries there)
  recoveries: (usize, usize),
}

#[derive(Debug, Clone)]
struct Lookahead {
  leaf: Subtree,
  lex_state: StateId,
}

impl Version {
  fn new() -> Self {
    Version {
      head: 0,
      status: Status::Active,
      lookahead: None,
      scanner_state: ScannerState::default(),
      missing_in_a_row: 0,
      recoveries: (0, 0),
    }
  }
}

struct Run<'a> {
  language: &'a Language,
  text: &'a [u8],
  options: &'a ParseOptions,
  stack: Stack,
  versions: Vec<Version>,
  finished: Option<Subtree>,
  reusable: Option<ReusableNodes>,
  total: Length,
}

impl<'a> Run<'a> {
  fn run(mut self) -> ParseOutcome {
    let started = Instant::now();
    let mut steps = 0u64;

    while let Some(v) = self.next_version() {
      steps += 1;
      let out_of_steps = self.options.max_steps.map_or(false, |max| steps > max);
      let out_of_time = self.options.deadline.map_or(false, |d| started.elapsed() >= d);
      if out_of_steps || out_of_time {
        debug!(steps, "parse budget exceeded");
        let budget_exceeded = self.finished.is_none();
        let root = match self.finished.take() {
          Some(root) => root,
          None => self.partial_root(),
        };
        return ParseOutcome {
          tree: Tree::new(root, self.language.clone()),
          budget_exceeded,
        };
      }
      self.advance(v);
      self.condense();
    }

    let root = match self.finished.take() {
      Some(root) => root,
      None => self.partial_root(),
    };
    debug!(steps, errors = root.error_cost, "parse finished");
    ParseOutcome {
      tree: Tree::new(root, self.language.clone()),
      budget_exceeded: false,
    }
  }

  /// The active version furthest behind in the text.
  fn next_version(&self) -> Option<usize> {
    self.versions.iter()
      .enumerate()
      .filter(|(_, v)| v.status == Status::Active)
      .min_by_key(|(i, v)| (self.stack.node(v.head).position.bytes, *i))
      .map(|(i, _)| i)
  }

  fn advance(&mut self, v: usize) {
    let language = self.language;
    let head = self.versions[v].head;
    let state = self.stack.node(head).state;
    let position = self.stack.node(head).position;

    if self.versions.len() == 1 {
      if let Some(subtree) = self.reuse_node(v, state, position.bytes) {
        if let Some(next) = language.goto(state, subtree.symbol) {
          trace!(version = v, state, symbol = language.symbol_name(subtree.symbol), "reuse");
          let version = &mut self.versions[v];
          if let Some(external_state) = &subtree.external_state {
            version.scanner_state = external_state.clone();
          }
          version.lookahead = None;
          version.missing_in_a_row = 0;
          version.head = self.stack.push(head, next, subtree, true);
          return;
        }
      }
    }

    let lookahead = self.lookahead(v, state, position);
    let actions = language.actions(state, lookahead.symbol)
      .iter()
      .copied()
      .collect::<SmallVec<[ParseAction; 4]>>();

    if actions.is_empty() {
      if lookahead.extra && !lookahead.is_error() {
        trace!(version = v, state, engine = ?EngineState::Shifting, extra = true);
        let leaf = with_parse_state(lookahead, state);
        self.shift(v, state, leaf);
        return;
      }
      self.handle_error(v, state, lookahead);
      return;
    }

    for &action in &actions[1..] {
      let mut fork = self.versions[v].clone();
      fork.status = Status::Active;
      self.versions.push(fork);
      let w = self.versions.len() - 1;
      trace!(version = v, fork = w, state, engine = ?EngineState::ConflictForked);
      self.apply(w, state, &lookahead, action);
    }
    self.apply(v, state, &lookahead, actions[0]);
  }

  fn lookahead(&mut self, v: usize, state: StateId, position: Length) -> Subtree {
    let language = self.language;
    let version = &mut self.versions[v];
    if let Some(cached) = &version.lookahead {
      if cached.lex_state == state || !language.actions(state, cached.leaf.symbol).is_empty() {
        return cached.leaf.clone();
      }
    }
    let lexed = lexer::lex(language, self.text, position, state, &version.scanner_state);
    let leaf = Subtree::leaf(language, &lexed, state);
    version.lookahead = Some(Lookahead {
      leaf: leaf.clone(),
      lex_state: state,
    });
    leaf
  }

  fn apply(&mut self, v: usize, state: StateId, lookahead: &Subtree, action: ParseAction) {
    match action {
      ParseAction::Shift(next) => {
        trace!(version = v, state, next, engine = ?EngineState::Shifting);
        let leaf = with_parse_state(lookahead.with_extra(false), state);
        self.shift(v, next, leaf);
      }
      ParseAction::Reduce { symbol, child_count, production, .. } => {
        trace!(
          version = v,
          state,
          symbol = self.language.symbol_name(symbol),
          child_count,
          engine = ?EngineState::Reducing
        );
        self.reduce(v, symbol, child_count as usize, production);
      }
      ParseAction::Accept => {
        trace!(version = v, state, engine = ?EngineState::Accepted);
        self.accept(v);
      }
    }
  }

  fn shift(&mut self, v: usize, next: StateId, leaf: Subtree) {
    let version = &mut self.versions[v];
    if let Some(external_state) = &leaf.external_state {
      version.scanner_state = external_state.clone();
    }
    if !leaf.extra {
      version.missing_in_a_row = 0;
    }
    version.lookahead = None;
    version.head = self.stack.push(version.head, next, leaf, false);
  }

  fn reduce(&mut self, v: usize, symbol: Symbol, child_count: usize, production: u32) {
    let language = self.language;
    let fragile = self.versions.len() > 1;
    let mut head = self.versions[v].head;

    let mut trailing = vec![];
    if child_count > 0 {
      while let (Some(subtree), Some(prev)) = (&self.stack.node(head).subtree, self.stack.node(head).prev) {
        if !subtree.is_extra_like() {
          break;
        }
        trailing.push(subtree.clone());
        head = prev;
      }
    }

    let mut children = vec![];
    let mut count = 0;
    while count < child_count {
      let node = self.stack.node(head);
      match (&node.subtree, node.prev) {
        (Some(subtree), Some(prev)) => {
          if !subtree.is_extra_like() {
            count += 1;
          }
          children.push(subtree.clone());
          head = prev;
        }
        _ => {
          self.versions[v].status = Status::Halted;
          return;
        }
      }
    }
    children.reverse();

    let aliases = &language.production(production).aliases;
    let mut index = 0;
    for child in &mut children {
      if child.is_extra_like() {
        continue;
      }
      let alias = aliases.get(index).copied().flatten();
      *child = child.with_alias(language, alias);
      index += 1;
    }

    let base = self.stack.node(head).state;
    let next = match language.goto(base, symbol) {
      Some(next) => next,
      None => {
        self.versions[v].status = Status::Halted;
        return;
      }
    };
    let node = Subtree::node(language, symbol, children, Some(production), base, fragile);
    head = self.stack.push(head, next, node, false);
    for subtree in trailing.into_iter().rev() {
      head = self.stack.push(head, next, subtree, false);
    }
    self.versions[v].head = head;
  }

  fn accept(&mut self, v: usize) {
    let language = self.language;
    let subtrees = self.stack.subtrees(self.versions[v].head);
    let start_symbol = language.data().start_symbol;
    let root = match subtrees.iter().rposition(|s| !s.is_extra_like()) {
      Some(i) if subtrees[i].symbol == start_symbol => {
        let start = &subtrees[i];
        let mut children = subtrees[..i].to_vec();
        children.extend(start.children.iter().cloned());
        children.extend(subtrees[i + 1..].iter().cloned());
        Subtree::node(language, start_symbol, children, start.production, 0, start.fragile)
      }
      _ => Subtree::node(language, ERROR, subtrees, None, 0, false),
    };
    self.finish(v, root);
  }

  fn finish(&mut self, v: usize, root: Subtree) {
    let root = self.complete_root(root);
    self.versions[v].status = Status::Done;
    let better = match &self.finished {
      None => true,
      Some(best) => {
        root.error_cost < best.error_cost
          || (root.error_cost == best.error_cost && root.dynamic_precedence > best.dynamic_precedence)
      }
    };
    if better {
      self.finished = Some(root);
    }
  }

  /// The root always spans the whole text.
  fn complete_root(&self, mut root: Subtree) -> Subtree {
    let data = root.make_mut();
    data.padding = Length::ZERO;
    data.size = self.total;
    root
  }

  /// An ERROR root over the best version's stack and the unparsed rest.
  fn partial_root(&mut self) -> Subtree {
    let language = self.language;
    let best = self.versions.iter()
      .enumerate()
      .filter(|(_, v)| v.status != Status::Done)
      .min_by_key(|(i, v)| {
        let node = self.stack.node(v.head);
        (node.error_cost, -node.dynamic_precedence, *i)
      })
      .map(|(_, v)| v.head)
      .unwrap_or_else(|| self.stack.base());
    let mut children = self.stack.subtrees(best);
    let position = self.stack.node(best).position;
    if position.bytes < self.text.len() {
      let rest = Lexed {
        symbol: ERROR,
        padding: Length::ZERO,
        size: self.total - position,
        lookahead_bytes: 1,
        external_state: None,
      };
      children.push(Subtree::leaf(language, &rest, 0));
    }
    self.complete_root(Subtree::node(language, ERROR, children, None, 0, false))
  }

  fn handle_error(&mut self, v: usize, state: StateId, lookahead: Subtree) {
    if self.breakdown_top(v) {
      return;
    }

    let others_active = self.versions.iter()
      .enumerate()
      .any(|(i, other)| i != v && other.status == Status::Active);
    if others_active {
      trace!(version = v, state, "halted");
      self.versions[v].status = Status::Halted;
      return;
    }

    let language = self.language;
    let head = self.versions[v].head;
    let position = self.stack.node(head).position.bytes;
    trace!(
      version = v,
      state,
      position,
      lookahead = language.symbol_name(lookahead.symbol),
      engine = ?EngineState::ErrorRecovering
    );

    let recoveries = &mut self.versions[v].recoveries;
    if recoveries.0 == position {
      recoveries.1 += 1;
    } else {
      *recoveries = (position, 1);
    }
    if recoveries.1 > self.options.max_recovery_skips {
      debug!(position, "too many recoveries, giving up on the rest of the text");
      let root = self.abandon(v);
      self.finish(v, root);
      return;
    }

    if !lookahead.is_error() {
      let limit = if lookahead.symbol == END { MAX_MISSING_AT_END } else { MAX_MISSING_IN_A_ROW };
      if self.versions[v].missing_in_a_row < limit {
        if let Some((symbol, next)) = self.find_missing(head, state, lookahead.symbol) {
          trace!(version = v, missing = language.symbol_name(symbol));
          let missing = Subtree::missing_leaf(language, symbol, state);
          let version = &mut self.versions[v];
          version.missing_in_a_row += 1;
          version.head = self.stack.push(head, next, missing, false);
          return;
        }
      }
    }

    if lookahead.symbol == END {
      let subtrees = self.stack.subtrees(head);
      let root = Subtree::node(language, ERROR, subtrees, None, 0, false);
      self.finish(v, root);
      return;
    }

    let leaf = with_parse_state(lookahead.with_extra(false), state);
    let mut head = head;
    let error = if leaf.is_error() {
      leaf.clone()
    } else {
      let node = self.stack.node(head);
      match (&node.subtree, node.prev) {
        (Some(top), Some(prev)) if top.is_error() && !top.is_leaf() => {
          let mut children = top.children.clone();
          children.push(leaf.clone());
          head = prev;
          Subtree::node(language, ERROR, children, None, state, false)
        }
        _ => Subtree::node(language, ERROR, vec![leaf.clone()], None, state, false),
      }
    };

    let version = &mut self.versions[v];
    if let Some(external_state) = &leaf.external_state {
      version.scanner_state = external_state.clone();
    }
    version.lookahead = None;
    version.missing_in_a_row = 0;
    version.head = self.stack.push(head, state, error, false);
  }

  /// Replaces a reused subtree on top of the stack by its children, so that
  /// the tokens after it can be parsed as they would be without reuse.
  fn breakdown_top(&mut self, v: usize) -> bool {
    let language = self.language;
    let head = self.versions[v].head;
    let node = self.stack.node(head);
    let (subtree, prev) = match (&node.subtree, node.prev) {
      (Some(subtree), Some(prev)) if node.reused && !subtree.is_leaf() => (subtree.clone(), prev),
      _ => return false,
    };

    let mut state = self.stack.node(prev).state;
    let mut pushes = Vec::with_capacity(subtree.children.len());
    for child in &subtree.children {
      let next = if child.is_extra_like() {
        Some(state)
      } else if language.is_token(child.symbol) {
        language.actions(state, child.symbol).iter().find_map(|action| match action {
          ParseAction::Shift(next) => Some(*next),
          _ => None,
        })
      } else {
        language.goto(state, child.symbol)
      };
      match next {
        Some(next) => {
          pushes.push((next, child.clone()));
          state = next;
        }
        None => return false,
      }
    }

    trace!(version = v, symbol = language.symbol_name(subtree.symbol), "breakdown");
    let mut head = prev;
    for (next, child) in pushes {
      let reused = !child.is_leaf();
      head = self.stack.push(head, next, child, reused);
    }
    self.versions[v].head = head;
    true
  }

  /// The cheapest token whose insertion lets `lookahead` be shifted.
  fn find_missing(&self, head: usize, state: StateId, lookahead: Symbol) -> Option<(Symbol, StateId)> {
    let language = self.language;
    let data = language.data();
    let mut candidates = (1..data.token_count as Symbol)
      .filter(|&symbol| {
        let info = &data.symbols[symbol as usize];
        !info.extra && info.kind != SymbolKind::Skip
      })
      .filter_map(|symbol| {
        language.actions(state, symbol).iter().find_map(|action| match action {
          ParseAction::Shift(next) => Some((symbol, *next)),
          _ => None,
        })
      })
      .collect::<Vec<_>>();
    candidates.sort_by_key(|&(symbol, _)| (!language.symbol_is_visible(symbol), symbol));

    let states = self.stack.real_states(head);
    candidates.into_iter()
      .find(|&(_, next)| self.can_continue(&states, next, lookahead))
  }

  fn can_continue(&self, states: &[StateId], next: StateId, lookahead: Symbol) -> bool {
    let language = self.language;
    let mut states = states.to_vec();
    states.push(next);
    for _ in 0..MAX_SIMULATED_REDUCTIONS {
      let top = match states.last() {
        Some(&top) => top,
        None => return false,
      };
      match language.actions(top, lookahead).first() {
        Some(ParseAction::Shift(_)) | Some(ParseAction::Accept) => return true,
        Some(&ParseAction::Reduce { symbol, child_count, .. }) => {
          let count = child_count as usize;
          if count >= states.len() {
            return false;
          }
          states.truncate(states.len() - count);
          let base = states[states.len() - 1];
          match language.goto(base, symbol) {
            Some(goto) => states.push(goto),
            None => return false,
          }
        }
        None => return false,
      }
    }
    false
  }

  /// Stops parsing the version: everything on its stack and the rest of
  /// the text go into an ERROR root.
  fn abandon(&mut self, v: usize) -> Subtree {
    let language = self.language;
    let head = self.versions[v].head;
    let mut children = self.stack.subtrees(head);
    let position = self.stack.node(head).position;
    if position.bytes < self.text.len() {
      let rest = Lexed {
        symbol: ERROR,
        padding: Length::ZERO,
        size: self.total - position,
        lookahead_bytes: 1,
        external_state: None,
      };
      children.push(Subtree::leaf(language, &rest, 0));
    }
    Subtree::node(language, ERROR, children, None, 0, false)
  }

  fn reuse_node(&mut self, v: usize, state: StateId, position: usize) -> Option<Subtree> {
    let language = self.language;
    let scanner_state = &self.versions[v].scanner_state;
    let reusable = self.reusable.as_mut()?;

    loop {
      let subtree = reusable.tree()?.clone();
      let offset = reusable.byte_offset();
      if offset > position {
        return None;
      }
      if offset < position {
        if offset + subtree.total_size().bytes <= position || !reusable.descend() {
          reusable.advance();
        }
        continue;
      }
      if &reusable.last_external_state() != scanner_state {
        reusable.advance();
        continue;
      }

      let unchanged = !subtree.has_changes
        && !subtree.has_error()
        && !subtree.fragile
        && subtree.size.bytes > 0;
      let fits = subtree.parse_state == state && language.goto(state, subtree.symbol).is_some();
      if subtree.is_leaf() {
        return None;
      }
      if !unchanged || !fits {
        if !reusable.descend() {
          reusable.advance();
        }
        continue;
      }

      reusable.advance();
      return Some(subtree);
    }
  }

  /// Drops finished and halted versions, merges versions with identical
  /// stacks and enforces the version limit.
  fn condense(&mut self) {
    self.versions.retain(|v| v.status == Status::Active);

    if let Some(best) = &self.finished {
      let stack = &self.stack;
      let best_cost = best.error_cost;
      self.versions.retain(|v| stack.node(v.head).error_cost <= best_cost);
    }

    let mut i = 0;
    while i < self.versions.len() {
      let mut j = i + 1;
      while j < self.versions.len() {
        let (a, b) = (&self.versions[i], &self.versions[j]);
        let same = self.stack.node(a.head).position == self.stack.node(b.head).position
          && self.stack.node(a.head).state == self.stack.node(b.head).state
          && a.scanner_state == b.scanner_state
          && self.stack.same_states(a.head, b.head);
        if same {
          if self.rank(j) < self.rank(i) {
            self.versions.swap(i, j);
          }
          self.versions.remove(j);
        } else {
          j += 1;
        }
      }
      i += 1;
    }

    if self.versions.len() > self.options.max_versions {
      let mut order = (0..self.versions.len()).collect::<Vec<_>>();
      order.sort_by_key(|&i| self.rank(i));
      let keep = order[..self.options.max_versions].to_vec();
      let mut index = 0;
      self.versions.retain(|_| {
        let kept = keep.contains(&index);
        index += 1;
        kept
      });
    }
  }

  fn rank(&self, v: usize) -> (u32, i32, usize) {
    let node = self.stack.node(self.versions[v].head);
    (node.error_cost, -node.dynamic_precedence, v)
  }
}

fn with_parse_state(mut leaf: Subtree, state: StateId) -> Subtree {
  if leaf.parse_state != state {
    leaf.make_mut().parse_state = state;
  }
  leaf
}
