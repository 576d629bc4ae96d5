use serde::{Serialize, Deserialize};
use tabular_dfa::TabularDfa;
use super::regex::Regex;

pub use tokens::Tokens;
pub use build::LexicalToken;

mod nfa;
mod nfa_builder;
mod dfa;
mod dfa_builder;
mod powerset_cons;
mod util;
pub mod tabular_dfa;
pub mod build;
pub mod tokens;

pub use util::find_char_interval;

/// Lexical automaton shared by every token of a grammar. Accepting states
/// carry all tokens matched there, highest priority first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lexer {
  pub dfa: TabularDfa<Vec<TokenId>>,
  /// per DFA state, every token still matchable from it.
  pub reachable: Vec<Vec<TokenId>>,
  pub char_intervals: Vec<u32>,
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TokenId(pub(crate) u32);

#[derive(Debug)]
pub struct Token<'input> {
  pub kind: TokenId,
  pub text: &'input str,
  pub start: usize,
  pub end: usize,
}

impl TokenId {
  pub fn new(id: u32) -> Self {
    TokenId(id)
  }

  pub fn id(&self) -> u32 {
    self.0
  }

  pub fn index(&self) -> usize {
    self.0 as usize
  }
}

impl Lexer {
  pub fn new(tokens: &[LexicalToken]) -> Self {
    build::build(tokens)
  }

  pub fn char_class(&self, c: char) -> u32 {
    util::find_char_interval(c as u32, &self.char_intervals)
  }

  /// Whether some token satisfying `accept` can still be matched from `state`.
  pub fn can_reach(&self, state: tabular_dfa::State, mut accept: impl FnMut(TokenId) -> bool) -> bool {
    self.reachable.get(state.0 as usize)
      .map_or(false, |tokens| tokens.iter().any(|&token| accept(token)))
  }

  /// Longest match over all tokens, for inspection and tests.
  pub fn lex<'lexer, 'input>(
    &'lexer self,
    input: &'input str
  ) -> Tokens<'lexer, 'input> {
    Tokens::new(self, input)
  }
}
