use std::fmt::{self, Write};
use bit_set::BitSet;
use fnv::FnvBuildHasher;
use grammar::{Map, Symbol};
use indexmap::IndexMap;
use crate::augment::AugmentedGrammar;

pub mod states;
pub mod tables;

/// kernel item keys -> state
pub type StateStore = IndexMap<Vec<u32>, State, FnvBuildHasher>;

pub struct Builder<'a> {
  pub grammar: &'a AugmentedGrammar<'a>,
  pub states: StateStore,
  /// max number of symbols in a production, plus one.
  pub max_nsym_p1: usize,
}

#[derive(Debug, Clone)]
pub struct State {
  pub items: Vec<Item>,
  /// the first `kernel_len` items are the kernel items, sorted by key.
  pub kernel_len: usize,
  pub transitions: Map<Symbol, u32>,
}

#[derive(Debug, Clone)]
pub struct Item {
  pub key: u32,
  pub lookaheads: BitSet,
}

impl State {
  pub fn new(kernel: Vec<Item>) -> Self {
    State {
      kernel_len: kernel.len(),
      items: kernel,
      transitions: Map::default(),
    }
  }
}

impl<'a> Builder<'a> {
  pub fn new(grammar: &'a AugmentedGrammar<'a>) -> Self {
    let max_nsym_p1 = grammar.prods.iter()
      .map(|prod| prod.symbols.len())
      .max()
      .unwrap_or(0) + 1;

    Builder {
      grammar,
      states: StateStore::default(),
      max_nsym_p1,
    }
  }

  /// Renders the items of every state, for debugging.
  #[allow(dead_code)]
  pub fn states_string(&self) -> String {
    let mut s = String::new();
    let _ = self.fmt_states(&mut s);
    s
  }

  fn fmt_states(&self, f: &mut impl Write) -> fmt::Result {
    for (i, state) in self.states.values().enumerate() {
      writeln!(f, "State {}:", i)?;
      for item in &state.items {
        write!(f, "  ")?;
        self.fmt_item(item, f)?;
        writeln!(f)?;
      }
      writeln!(f)?;
    }
    Ok(())
  }

  pub fn fmt_item(&self, item: &Item, f: &mut impl Write) -> fmt::Result {
    let (prod_ix, dot) = decode_item(self.max_nsym_p1, item.key);
    let prod = &self.grammar.prods[prod_ix];
    write!(f, "{} →", self.nt_name(prod.nt.index()))?;
    for (i, sym) in prod.symbols.iter().enumerate() {
      if i == dot {
        write!(f, " .")?;
      }
      write!(f, " {}", self.symbol_name(*sym))?;
    }
    if dot == prod.symbols.len() {
      write!(f, " .")?;
    }
    write!(f, "  [")?;
    for (i, la) in item.lookaheads.iter().enumerate() {
      if i != 0 {
        write!(f, " ")?;
      }
      write!(f, "{}", self.token_name(la))?;
    }
    write!(f, "]")
  }

  pub fn symbol_name(&self, sym: Symbol) -> String {
    match sym {
      Symbol::Token(token) => self.token_name(token.index()),
      Symbol::Nonterminal(nt) => self.nt_name(nt.index()),
    }
  }

  pub fn token_name(&self, token: usize) -> String {
    if token == self.grammar.eof.index() {
      "$".to_owned()
    } else {
      format!("'{}'", self.grammar.grammar.tokens[token].name)
    }
  }

  fn nt_name(&self, nt: usize) -> String {
    match self.grammar.grammar.nts.get(nt) {
      Some(nt) => nt.name.clone(),
      None => "S'".to_owned(),
    }
  }
}

pub fn encode_item(max_nsym_p1: usize, prod_ix: usize, dot_ix: usize) -> u32 {
  (prod_ix * max_nsym_p1 + dot_ix) as u32
}

pub fn decode_item(max_nsym_p1: usize, key: u32) -> (usize, usize) {
  let key = key as usize;
  (key / max_nsym_p1, key % max_nsym_p1)
}
